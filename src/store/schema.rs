use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::session::result::QuizSummary;

const SCHEMA_VERSION: u32 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    Quiz,
    Workout,
}

impl SessionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionKind::Quiz => "quiz",
            SessionKind::Workout => "workout",
        }
    }
}

/// The single resumable activity: `{id, type, timestamp, ...session fields}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PersistedSession {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: SessionKind,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    #[serde(default)]
    pub skip_listening: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizHistoryData {
    pub schema_version: u32,
    pub results: Vec<QuizSummary>,
}

impl Default for QuizHistoryData {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            results: Vec::new(),
        }
    }
}

impl QuizHistoryData {
    pub fn needs_reset(&self) -> bool {
        self.schema_version != SCHEMA_VERSION
    }
}
