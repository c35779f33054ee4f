use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph, Widget, Wrap};

use crate::app::{MatchingInput, QuizStage};
use crate::quiz::question::{Question, QuestionBody};
use crate::ui::theme::Theme;

pub struct QuestionView<'a> {
    pub question: &'a Question,
    pub number: usize,
    pub total: usize,
    pub mistakes_only: bool,
    pub stage: &'a QuizStage,
    pub text_input: &'a str,
    pub choice_selected: usize,
    pub matching: &'a MatchingInput,
    pub theme: &'a Theme,
}

impl QuestionView<'_> {
    fn input_lines(&self) -> Vec<Line<'static>> {
        let colors = &self.theme.colors;
        let answering = matches!(self.stage, QuizStage::Answering);
        let normal = Style::default().fg(colors.fg());
        let highlight = Style::default()
            .fg(colors.accent())
            .add_modifier(Modifier::BOLD);

        match &self.question.body {
            QuestionBody::MultipleChoice { options, .. } => options
                .iter()
                .enumerate()
                .map(|(i, option)| {
                    let selected = i == self.choice_selected;
                    let marker = if selected { ">" } else { " " };
                    Line::from(Span::styled(
                        format!(" {marker} [{}] {option}", i + 1),
                        if selected { highlight } else { normal },
                    ))
                })
                .collect(),
            QuestionBody::TrueFalse { .. } => vec![Line::from(Span::styled(
                "   [t] True    [f] False",
                normal,
            ))],
            QuestionBody::FillInTheBlank { .. } | QuestionBody::Listening { .. } => {
                let cursor = if answering { "_" } else { "" };
                let mut lines = Vec::new();
                if let QuestionBody::Listening { audio_text, .. } = &self.question.body {
                    // No audio output; the phrase is shown once the answer is in.
                    if !answering {
                        lines.push(Line::from(Span::styled(
                            format!("   Audio: {audio_text}"),
                            Style::default().fg(colors.muted()),
                        )));
                    }
                }
                lines.push(Line::from(vec![
                    Span::styled("   > ", highlight),
                    Span::styled(format!("{}{cursor}", self.text_input), normal),
                ]));
                lines
            }
            QuestionBody::Matching { .. } => {
                let m = self.matching;
                m.items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| {
                        let current = i == m.cursor && answering;
                        let assigned = m
                            .assignments
                            .get(i)
                            .copied()
                            .flatten()
                            .and_then(|c| m.choices.get(c))
                            .map(String::as_str)
                            .unwrap_or("?");
                        let marker = if current { ">" } else { " " };
                        Line::from(Span::styled(
                            format!(" {marker} {item}  \u{2192}  {assigned}"),
                            if current { highlight } else { normal },
                        ))
                    })
                    .collect()
            }
        }
    }

    fn feedback_lines(&self) -> Vec<Line<'static>> {
        let QuizStage::Feedback(outcome) = self.stage else {
            return Vec::new();
        };
        let colors = &self.theme.colors;
        let mut lines = vec![Line::from("")];
        if outcome.is_correct {
            lines.push(Line::from(Span::styled(
                " Correct!",
                Style::default()
                    .fg(colors.correct())
                    .add_modifier(Modifier::BOLD),
            )));
        } else {
            lines.push(Line::from(vec![
                Span::styled(
                    " Not quite. ",
                    Style::default()
                        .fg(colors.incorrect())
                        .add_modifier(Modifier::BOLD),
                ),
                Span::styled(
                    format!("Answer: {}", outcome.correct_answer),
                    Style::default().fg(colors.fg()),
                ),
            ]));
        }
        if let Some(explanation) = &outcome.explanation {
            lines.push(Line::from(Span::styled(
                format!(" {explanation}"),
                Style::default().fg(colors.muted()),
            )));
        }
        lines
    }
}

impl Widget for QuestionView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let colors = &self.theme.colors;

        let mode = if self.mistakes_only { " \u{b7} retrying mistakes" } else { "" };
        let block = Block::bordered()
            .title(format!(
                " Question {} of {} \u{b7} {}{mode} ",
                self.number,
                self.total,
                self.question.kind()
            ))
            .border_style(Style::default().fg(colors.border_focused()))
            .style(Style::default().bg(colors.bg()));

        let mut lines = vec![
            Line::from(Span::styled(
                format!(" {}", self.question.prompt),
                Style::default()
                    .fg(colors.fg())
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
        ];
        lines.extend(self.input_lines());
        lines.extend(self.feedback_lines());

        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .block(block)
            .render(area, buf);
    }
}
