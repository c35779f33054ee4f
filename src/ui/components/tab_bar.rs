use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph, Widget};

use crate::tabs::Tab;
use crate::ui::theme::Theme;

pub struct TabBar<'a> {
    pub tabs: &'a [Tab],
    pub selected: usize,
    /// Right-aligned status, e.g. the signed-in user.
    pub status: String,
    pub theme: &'a Theme,
}

impl<'a> TabBar<'a> {
    pub fn new(tabs: &'a [Tab], selected: usize, status: String, theme: &'a Theme) -> Self {
        Self {
            tabs,
            selected,
            status,
            theme,
        }
    }
}

impl Widget for TabBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let colors = &self.theme.colors;

        let block = Block::bordered()
            .title(Span::styled(
                " quizdeck ",
                Style::default()
                    .fg(colors.accent())
                    .add_modifier(Modifier::BOLD),
            ))
            .border_style(Style::default().fg(colors.border()))
            .style(Style::default().bg(colors.header_bg()));
        let inner = block.inner(area);
        block.render(area, buf);

        let mut spans = Vec::new();
        for (i, tab) in self.tabs.iter().enumerate() {
            let style = if i == self.selected {
                Style::default()
                    .fg(colors.accent())
                    .bg(colors.selection_bg())
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(colors.header_fg())
            };
            spans.push(Span::styled(format!(" {} ", tab.label()), style));
            spans.push(Span::raw(" "));
        }
        Paragraph::new(Line::from(spans)).render(inner, buf);

        let status_width = self.status.chars().count() as u16;
        if status_width + 1 < inner.width {
            let x = inner.x + inner.width - status_width - 1;
            buf.set_string(x, inner.y, &self.status, Style::default().fg(colors.muted()));
        }
    }
}
