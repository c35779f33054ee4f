use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::quiz::question::{Question, QuestionBody, QuestionKind};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizDefinition {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub language: String,
    #[serde(default)]
    pub questions: Vec<Question>,
}

/// `^[a-z]{2}-[A-Z]{2}$`
pub fn is_locale_code(code: &str) -> bool {
    let bytes = code.as_bytes();
    bytes.len() == 5
        && bytes[0].is_ascii_lowercase()
        && bytes[1].is_ascii_lowercase()
        && bytes[2] == b'-'
        && bytes[3].is_ascii_uppercase()
        && bytes[4].is_ascii_uppercase()
}

impl QuizDefinition {
    pub fn from_json(json: &str) -> AppResult<Self> {
        serde_json::from_str(json).map_err(|e| AppError::validation(format!("malformed quiz: {e}")))
    }

    pub fn count_of(&self, kind: QuestionKind) -> usize {
        self.questions.iter().filter(|q| q.kind() == kind).count()
    }

    /// Collect every violation instead of stopping at the first one, so an
    /// imported file can be fixed in one go.
    pub fn violations(&self) -> Vec<String> {
        let mut out = Vec::new();

        if self.title.trim().is_empty() {
            out.push("title is empty".to_string());
        }
        if !is_locale_code(&self.language) {
            out.push(format!(
                "language {:?} is not a locale code like \"en-US\"",
                self.language
            ));
        }

        let mut seen = HashSet::new();
        for (i, q) in self.questions.iter().enumerate() {
            let at = format!("question {} ({})", i + 1, q.id);
            if q.id.trim().is_empty() {
                out.push(format!("question {} has an empty id", i + 1));
            } else if !seen.insert(q.id.as_str()) {
                out.push(format!("{at}: duplicate id"));
            }
            if q.prompt.trim().is_empty() {
                out.push(format!("{at}: prompt is empty"));
            }
            match &q.body {
                QuestionBody::MultipleChoice {
                    options,
                    correct_answer_index,
                } => {
                    if options.is_empty() {
                        out.push(format!("{at}: no options"));
                    } else if *correct_answer_index >= options.len() {
                        out.push(format!(
                            "{at}: correctAnswerIndex {correct_answer_index} out of range for {} options",
                            options.len()
                        ));
                    }
                }
                QuestionBody::TrueFalse { .. } => {}
                QuestionBody::FillInTheBlank { correct_answer } => {
                    if correct_answer.trim().is_empty() {
                        out.push(format!("{at}: correctAnswer is empty"));
                    }
                }
                QuestionBody::Matching { pairs } => {
                    if pairs.is_empty() {
                        out.push(format!("{at}: no pairs"));
                    }
                }
                QuestionBody::Listening {
                    audio_text,
                    correct_answer,
                    ..
                } => {
                    if audio_text.trim().is_empty() {
                        out.push(format!("{at}: audioText is empty"));
                    }
                    if correct_answer.trim().is_empty() {
                        out.push(format!("{at}: correctAnswer is empty"));
                    }
                }
            }
        }

        out
    }

    pub fn validate(&self) -> AppResult<()> {
        let violations = self.violations();
        if violations.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(violations))
        }
    }
}
