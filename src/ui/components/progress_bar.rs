use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::widgets::{Block, Widget};

use crate::session::quiz::QuizSession;
use crate::ui::theme::Theme;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Segment {
    Correct,
    Incorrect,
    Done,
    Pending,
}

/// One cell group per question or exercise, coloured by outcome.
pub struct ProgressBar<'a> {
    pub label: String,
    pub segments: Vec<Segment>,
    pub theme: &'a Theme,
}

impl<'a> ProgressBar<'a> {
    pub fn for_quiz(session: &QuizSession, theme: &'a Theme) -> Self {
        let mut segments = vec![Segment::Pending; session.total()];
        for record in &session.answers {
            if let Some(slot) = segments.get_mut(record.question_index) {
                *slot = if record.is_correct {
                    Segment::Correct
                } else {
                    Segment::Incorrect
                };
            }
        }
        Self {
            label: session.title.clone(),
            segments,
            theme,
        }
    }

    pub fn for_count(label: &str, done: usize, total: usize, theme: &'a Theme) -> Self {
        let segments = (0..total)
            .map(|i| if i < done { Segment::Done } else { Segment::Pending })
            .collect();
        Self {
            label: label.to_string(),
            segments,
            theme,
        }
    }

    fn finished(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| **s != Segment::Pending)
            .count()
    }

    fn color(&self, segment: Segment) -> Color {
        let colors = &self.theme.colors;
        match segment {
            Segment::Correct => colors.correct(),
            Segment::Incorrect => colors.incorrect(),
            Segment::Done => colors.bar_filled(),
            Segment::Pending => colors.bar_empty(),
        }
    }
}

/// Column range of segment `index` when `count` segments share `width` cells.
fn segment_span(index: usize, count: usize, width: u16) -> (u16, u16) {
    let width = width as usize;
    let start = index * width / count;
    let end = (index + 1) * width / count;
    (start as u16, end as u16)
}

impl Widget for ProgressBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let colors = &self.theme.colors;

        let block = Block::bordered()
            .title(format!(" {} ", self.label))
            .border_style(Style::default().fg(colors.border()));
        let inner = block.inner(area);
        block.render(area, buf);

        if inner.width == 0 || inner.height == 0 {
            return;
        }

        let count = self.segments.len();
        if count > 0 {
            for (i, segment) in self.segments.iter().enumerate() {
                let (start, end) = segment_span(i, count, inner.width);
                let style = Style::default().bg(self.color(*segment));
                for x in start..end {
                    buf[(inner.x + x, inner.y)].set_style(style);
                }
            }
        }

        let label = format!("{}/{}", self.finished(), count);
        let label_x = inner.x + (inner.width.saturating_sub(label.len() as u16)) / 2;
        buf.set_string(label_x, inner.y, &label, Style::default().fg(colors.fg()));
    }
}
