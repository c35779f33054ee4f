use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph, Widget, Wrap};

use crate::ui::theme::Theme;

/// Selectable list of (title, description) rows for one tab.
pub struct ActivityList<'a> {
    pub title: &'a str,
    pub items: &'a [(String, String)],
    pub selected: usize,
    /// Render descriptions under each title instead of in a side panel.
    pub inline_descriptions: bool,
    pub empty_text: &'a str,
    pub theme: &'a Theme,
}

impl Widget for ActivityList<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let colors = &self.theme.colors;

        let block = Block::bordered()
            .title(format!(" {} ", self.title))
            .border_style(Style::default().fg(colors.border_focused()))
            .style(Style::default().bg(colors.bg()));
        let inner = block.inner(area);
        block.render(area, buf);

        if self.items.is_empty() {
            Paragraph::new(Line::from(Span::styled(
                format!(" {}", self.empty_text),
                Style::default().fg(colors.muted()),
            )))
            .render(inner, buf);
            return;
        }

        let rows_per_item = if self.inline_descriptions { 2 } else { 1 };
        let visible = (inner.height as usize / rows_per_item).max(1);
        let first = self.selected.saturating_sub(visible - 1);

        let mut lines = Vec::new();
        for (i, (title, description)) in self.items.iter().enumerate().skip(first).take(visible) {
            let is_selected = i == self.selected;
            let indicator = if is_selected { ">" } else { " " };
            let style = if is_selected {
                Style::default()
                    .fg(colors.accent())
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(colors.fg())
            };
            lines.push(Line::from(Span::styled(format!(" {indicator} {title}"), style)));
            if self.inline_descriptions {
                lines.push(Line::from(Span::styled(
                    format!("     {description}"),
                    Style::default().fg(colors.muted()),
                )));
            }
        }
        Paragraph::new(lines).render(inner, buf);
    }
}

/// Side panel with the selected row's description or an article body.
pub struct DetailPanel<'a> {
    pub title: &'a str,
    pub body: &'a str,
    pub theme: &'a Theme,
}

impl Widget for DetailPanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let colors = &self.theme.colors;
        let block = Block::bordered()
            .title(format!(" {} ", self.title))
            .border_style(Style::default().fg(colors.border()))
            .style(Style::default().bg(colors.bg()));
        Paragraph::new(self.body)
            .style(Style::default().fg(colors.fg()))
            .wrap(Wrap { trim: false })
            .block(block)
            .render(area, buf);
    }
}
