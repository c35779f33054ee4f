use ratatui::buffer::Buffer;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph, Widget};

use crate::session::result::QuizSummary;
use crate::ui::theme::Theme;

pub struct Summary<'a> {
    pub summary: &'a QuizSummary,
    pub theme: &'a Theme,
}

impl<'a> Summary<'a> {
    pub fn new(summary: &'a QuizSummary, theme: &'a Theme) -> Self {
        Self { summary, theme }
    }
}

impl Widget for Summary<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let colors = &self.theme.colors;
        let s = self.summary;

        let title = if s.mistakes_only {
            " Retry Complete "
        } else {
            " Quiz Complete "
        };
        let block = Block::bordered()
            .title(title)
            .border_style(Style::default().fg(colors.accent()))
            .style(Style::default().bg(colors.bg()));
        let inner = block.inner(area);
        block.render(area, buf);

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(2),
                Constraint::Length(2),
                Constraint::Length(2),
                Constraint::Min(0),
                Constraint::Length(2),
            ])
            .split(inner);

        Paragraph::new(Line::from(Span::styled(
            s.title.as_str(),
            Style::default()
                .fg(colors.accent())
                .add_modifier(Modifier::BOLD),
        )))
        .alignment(Alignment::Center)
        .render(layout[0], buf);

        let score_color = if s.percentage >= 80 {
            colors.success()
        } else if s.percentage >= 50 {
            colors.warning()
        } else {
            colors.error()
        };
        Paragraph::new(Line::from(vec![
            Span::styled("  Score:    ", Style::default().fg(colors.fg())),
            Span::styled(
                format!("{}%", s.percentage),
                Style::default().fg(score_color).add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!("  ({}/{} correct)", s.score, s.total),
                Style::default().fg(colors.muted()),
            ),
        ]))
        .render(layout[1], buf);

        let mistakes_text = if s.total == 0 {
            "no questions to answer".to_string()
        } else {
            s.mistakes.to_string()
        };
        Paragraph::new(Line::from(vec![
            Span::styled("  Mistakes: ", Style::default().fg(colors.fg())),
            Span::styled(
                mistakes_text,
                Style::default().fg(if s.mistakes == 0 {
                    colors.success()
                } else {
                    colors.error()
                }),
            ),
        ]))
        .render(layout[2], buf);

        let mut help = vec![Span::styled(
            "  [Enter] Done  ",
            Style::default().fg(colors.accent()),
        )];
        if s.has_mistakes() {
            help.push(Span::styled(
                "[m] Retry mistakes",
                Style::default().fg(colors.accent()),
            ));
        }
        Paragraph::new(Line::from(help)).render(layout[4], buf);
    }
}
