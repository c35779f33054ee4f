use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::quiz::QuizSession;

/// Whole-number percentage; zero for an empty quiz.
pub fn percentage(score: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (score as f64 / total as f64 * 100.0).round() as u32
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizSummary {
    pub quiz_id: String,
    pub title: String,
    pub score: usize,
    pub total: usize,
    pub percentage: u32,
    pub mistakes: usize,
    #[serde(default)]
    pub mistakes_only: bool,
    pub timestamp: DateTime<Utc>,
}

impl QuizSummary {
    pub fn from_session(session: &QuizSession) -> Self {
        Self {
            quiz_id: session.quiz_id.clone(),
            title: session.title.clone(),
            score: session.score,
            total: session.total(),
            percentage: session.percentage(),
            mistakes: session.mistakes.len(),
            mistakes_only: session.mistakes_only,
            timestamp: Utc::now(),
        }
    }

    pub fn has_mistakes(&self) -> bool {
        self.mistakes > 0
    }
}
