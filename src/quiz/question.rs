use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::quiz::normalize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchPair {
    pub item: String,
    #[serde(rename = "match")]
    pub matched: String,
}

impl MatchPair {
    pub fn new(item: impl Into<String>, matched: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            matched: matched.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionKind {
    MultipleChoice,
    TrueFalse,
    FillInTheBlank,
    Matching,
    Listening,
}

impl QuestionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionKind::MultipleChoice => "multiple-choice",
            QuestionKind::TrueFalse => "true-false",
            QuestionKind::FillInTheBlank => "fill-in-the-blank",
            QuestionKind::Matching => "matching",
            QuestionKind::Listening => "listening",
        }
    }
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum QuestionBody {
    MultipleChoice {
        options: Vec<String>,
        correct_answer_index: usize,
    },
    TrueFalse {
        is_correct: bool,
    },
    FillInTheBlank {
        correct_answer: String,
    },
    Matching {
        pairs: Vec<MatchPair>,
    },
    Listening {
        audio_text: String,
        correct_answer: String,
        #[serde(default)]
        acceptable_answers: Vec<String>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(flatten)]
    pub body: QuestionBody,
}

/// What the user submitted for one question.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "kebab-case")]
pub enum Response {
    Choice(usize),
    TrueFalse(bool),
    Text(String),
    Matches(Vec<MatchPair>),
}

impl Question {
    pub fn kind(&self) -> QuestionKind {
        match self.body {
            QuestionBody::MultipleChoice { .. } => QuestionKind::MultipleChoice,
            QuestionBody::TrueFalse { .. } => QuestionKind::TrueFalse,
            QuestionBody::FillInTheBlank { .. } => QuestionKind::FillInTheBlank,
            QuestionBody::Matching { .. } => QuestionKind::Matching,
            QuestionBody::Listening { .. } => QuestionKind::Listening,
        }
    }

    /// Grade a response. `None` when the response shape does not fit this
    /// question's kind.
    pub fn grade(&self, response: &Response) -> Option<bool> {
        match (&self.body, response) {
            (
                QuestionBody::MultipleChoice {
                    correct_answer_index,
                    ..
                },
                Response::Choice(choice),
            ) => Some(choice == correct_answer_index),
            (QuestionBody::TrueFalse { is_correct }, Response::TrueFalse(answer)) => {
                Some(answer == is_correct)
            }
            (QuestionBody::FillInTheBlank { correct_answer }, Response::Text(text)) => {
                Some(normalize::compare(text, correct_answer))
            }
            (
                QuestionBody::Listening {
                    correct_answer,
                    acceptable_answers,
                    ..
                },
                Response::Text(text),
            ) => Some(
                std::iter::once(correct_answer)
                    .chain(acceptable_answers.iter())
                    .any(|accepted| normalize::compare(text, accepted)),
            ),
            (QuestionBody::Matching { pairs }, Response::Matches(given)) => {
                Some(same_pairs(pairs, given))
            }
            _ => None,
        }
    }

    /// Human-readable correct answer for feedback.
    pub fn correct_answer_text(&self) -> String {
        match &self.body {
            QuestionBody::MultipleChoice {
                options,
                correct_answer_index,
            } => options
                .get(*correct_answer_index)
                .cloned()
                .unwrap_or_default(),
            QuestionBody::TrueFalse { is_correct: true } => "True".to_string(),
            QuestionBody::TrueFalse { is_correct: false } => "False".to_string(),
            QuestionBody::FillInTheBlank { correct_answer }
            | QuestionBody::Listening { correct_answer, .. } => correct_answer.clone(),
            QuestionBody::Matching { pairs } => pairs
                .iter()
                .map(|p| format!("{} → {}", p.item, p.matched))
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    /// Audio reference of a listening question stored in the media store.
    pub fn media_file(&self) -> Option<&str> {
        match &self.body {
            QuestionBody::Listening { audio_text, .. } => audio_text.strip_prefix("media:"),
            _ => None,
        }
    }
}

fn same_pairs(expected: &[MatchPair], given: &[MatchPair]) -> bool {
    if expected.len() != given.len() {
        return false;
    }
    let expected: HashSet<(&str, &str)> = expected
        .iter()
        .map(|p| (p.item.as_str(), p.matched.as_str()))
        .collect();
    let given: HashSet<(&str, &str)> = given
        .iter()
        .map(|p| (p.item.as_str(), p.matched.as_str()))
        .collect();
    expected == given
}
