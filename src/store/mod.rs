pub mod json_store;
pub mod schema;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde_json::{Map, Value};

use crate::session::result::QuizSummary;
use crate::store::schema::{PersistedSession, Preferences, QuizHistoryData, SessionKind};

/// Sessions older than this are never offered for resume.
pub const SESSION_TTL_HOURS: i64 = 24;

/// Keep at most this many attempts in history.
const HISTORY_LIMIT: usize = 500;

const RESERVED_KEYS: [&str; 3] = ["id", "type", "timestamp"];

fn is_expired(session: &PersistedSession, now: DateTime<Utc>) -> bool {
    now.timestamp_millis() - session.timestamp >= Duration::hours(SESSION_TTL_HOURS).num_milliseconds()
}

/// The one durable slot holding the in-progress activity.
///
/// Implementors provide raw string access; the session protocol (matching,
/// expiry, malformed data handling) lives in the provided methods so every
/// backend behaves the same.
pub trait SessionSlot {
    fn read_raw(&self) -> Option<String>;
    fn write_raw(&mut self, raw: &str) -> Result<()>;
    fn remove_raw(&mut self) -> Result<()>;

    /// The stored session regardless of id, type or age. Malformed data reads
    /// as no session.
    fn peek(&self) -> Option<PersistedSession> {
        let raw = self.read_raw()?;
        match serde_json::from_str(&raw) {
            Ok(session) => Some(session),
            Err(e) => {
                log::debug!("ignoring unreadable persisted session: {e}");
                None
            }
        }
    }

    fn save_at(
        &mut self,
        id: &str,
        kind: SessionKind,
        mut data: Map<String, Value>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        for key in RESERVED_KEYS {
            data.remove(key);
        }
        let session = PersistedSession {
            id: id.to_string(),
            kind,
            timestamp: now.timestamp_millis(),
            data,
        };
        let json = serde_json::to_string(&session)?;
        self.write_raw(&json)
    }

    fn save(&mut self, id: &str, kind: SessionKind, data: Map<String, Value>) -> Result<()> {
        self.save_at(id, kind, data, Utc::now())
    }

    /// Matching, unexpired session or `None`. Never deletes anything.
    fn load_at(&self, id: &str, kind: SessionKind, now: DateTime<Utc>) -> Option<PersistedSession> {
        self.peek()
            .filter(|s| s.id == id && s.kind == kind && !is_expired(s, now))
    }

    fn load(&self, id: &str, kind: SessionKind) -> Option<PersistedSession> {
        self.load_at(id, kind, Utc::now())
    }

    /// Delete the stored session if it is at least a day old. Returns whether
    /// anything was deleted.
    fn check_and_expire_at(&mut self, now: DateTime<Utc>) -> Result<bool> {
        match self.peek() {
            Some(session) if is_expired(&session, now) => {
                log::info!(
                    "expiring stale {} session {}",
                    session.kind.as_str(),
                    session.id
                );
                self.remove_raw()?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn check_and_expire(&mut self) -> Result<bool> {
        self.check_and_expire_at(Utc::now())
    }

    fn clear(&mut self) -> Result<()> {
        self.remove_raw()
    }
}

/// Everything the app persists: the session slot, standing preferences and
/// attempt history.
pub trait ProgressStore: SessionSlot {
    fn load_preferences(&self) -> Preferences;
    fn save_preferences(&mut self, prefs: &Preferences) -> Result<()>;
    fn load_quiz_history(&self) -> QuizHistoryData;
    fn append_quiz_result(&mut self, result: QuizSummary) -> Result<()>;
}

/// Append `result`, dropping the oldest entries past the history limit.
pub(crate) fn push_capped(history: &mut QuizHistoryData, result: QuizSummary) {
    history.results.push(result);
    if history.results.len() > HISTORY_LIMIT {
        let overflow = history.results.len() - HISTORY_LIMIT;
        history.results.drain(..overflow);
    }
}

/// Store kept in memory only.
#[derive(Debug, Default)]
pub struct MemorySlot {
    raw: Option<String>,
    preferences: Preferences,
    history: QuizHistoryData,
}

impl MemorySlot {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionSlot for MemorySlot {
    fn read_raw(&self) -> Option<String> {
        self.raw.clone()
    }

    fn write_raw(&mut self, raw: &str) -> Result<()> {
        self.raw = Some(raw.to_string());
        Ok(())
    }

    fn remove_raw(&mut self) -> Result<()> {
        self.raw = None;
        Ok(())
    }
}

impl ProgressStore for MemorySlot {
    fn load_preferences(&self) -> Preferences {
        self.preferences.clone()
    }

    fn save_preferences(&mut self, prefs: &Preferences) -> Result<()> {
        self.preferences = prefs.clone();
        Ok(())
    }

    fn load_quiz_history(&self) -> QuizHistoryData {
        self.history.clone()
    }

    fn append_quiz_result(&mut self, result: QuizSummary) -> Result<()> {
        push_capped(&mut self.history, result);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(score: i64) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("score".to_string(), Value::from(score));
        map
    }

    #[test]
    fn save_then_load_matching_session() {
        let mut slot = MemorySlot::new();
        let now = Utc::now();
        slot.save_at("quiz-1", SessionKind::Quiz, data(3), now).unwrap();

        let loaded = slot.load_at("quiz-1", SessionKind::Quiz, now).unwrap();
        assert_eq!(loaded.timestamp, now.timestamp_millis());
        assert_eq!(loaded.data.get("score"), Some(&Value::from(3)));
    }

    #[test]
    fn load_rejects_mismatch_without_deleting() {
        let mut slot = MemorySlot::new();
        let now = Utc::now();
        slot.save_at("quiz-1", SessionKind::Quiz, data(1), now).unwrap();

        assert!(slot.load_at("quiz-2", SessionKind::Quiz, now).is_none());
        assert!(slot.load_at("quiz-1", SessionKind::Workout, now).is_none());
        assert!(slot.peek().is_some(), "mismatch must not delete");
    }

    #[test]
    fn saving_overwrites_the_single_slot() {
        let mut slot = MemorySlot::new();
        let now = Utc::now();
        slot.save_at("quiz-1", SessionKind::Quiz, data(1), now).unwrap();
        slot.save_at("legs", SessionKind::Workout, data(0), now).unwrap();

        assert!(slot.load_at("quiz-1", SessionKind::Quiz, now).is_none());
        assert!(slot.load_at("legs", SessionKind::Workout, now).is_some());
    }

    #[test]
    fn reserved_keys_in_data_do_not_clobber_header() {
        let mut slot = MemorySlot::new();
        let mut d = data(1);
        d.insert("id".to_string(), Value::from("other"));
        d.insert("type".to_string(), Value::from("workout"));
        slot.save("quiz-1", SessionKind::Quiz, d).unwrap();

        let stored = slot.peek().unwrap();
        assert_eq!(stored.id, "quiz-1");
        assert_eq!(stored.kind, SessionKind::Quiz);
    }

    #[test]
    fn load_ignores_stale_session_but_keeps_it() {
        let mut slot = MemorySlot::new();
        let now = Utc::now();
        slot.save_at("quiz-1", SessionKind::Quiz, data(1), now - Duration::hours(25))
            .unwrap();

        assert!(slot.load_at("quiz-1", SessionKind::Quiz, now).is_none());
        assert!(slot.peek().is_some());
    }

    #[test]
    fn check_and_expire_deletes_25h_old_session() {
        let mut slot = MemorySlot::new();
        let now = Utc::now();
        slot.save_at("quiz-1", SessionKind::Quiz, data(1), now - Duration::hours(25))
            .unwrap();

        assert!(slot.check_and_expire_at(now).unwrap());
        assert!(slot.peek().is_none());
    }

    #[test]
    fn check_and_expire_keeps_1h_old_session() {
        let mut slot = MemorySlot::new();
        let now = Utc::now();
        slot.save_at("quiz-1", SessionKind::Quiz, data(1), now - Duration::hours(1))
            .unwrap();

        assert!(!slot.check_and_expire_at(now).unwrap());
        assert!(slot.load_at("quiz-1", SessionKind::Quiz, now).is_some());
    }

    #[test]
    fn exactly_24h_counts_as_expired() {
        let mut slot = MemorySlot::new();
        let now = Utc::now();
        slot.save_at("quiz-1", SessionKind::Quiz, data(1), now - Duration::hours(24))
            .unwrap();
        assert!(slot.load_at("quiz-1", SessionKind::Quiz, now).is_none());
        assert!(slot.check_and_expire_at(now).unwrap());
    }

    #[test]
    fn malformed_data_reads_as_no_session() {
        let mut slot = MemorySlot::new();
        slot.write_raw("{ definitely not json").unwrap();

        assert!(slot.peek().is_none());
        assert!(slot.load("quiz-1", SessionKind::Quiz).is_none());
        assert!(!slot.check_and_expire().unwrap());
    }

    fn summary(score: usize) -> QuizSummary {
        QuizSummary {
            quiz_id: "quiz-1".to_string(),
            title: "Quiz".to_string(),
            score,
            total: 3,
            percentage: crate::session::result::percentage(score, 3),
            mistakes: 3 - score,
            mistakes_only: false,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn memory_store_keeps_preferences_and_history_apart_from_slot() {
        let mut store = MemorySlot::new();
        store.save_preferences(&Preferences { skip_listening: true }).unwrap();
        store.append_quiz_result(summary(2)).unwrap();
        store.save("quiz-1", SessionKind::Quiz, data(1)).unwrap();
        store.clear().unwrap();

        assert!(store.load_preferences().skip_listening);
        assert_eq!(store.load_quiz_history().results.len(), 1);
    }

    #[test]
    fn history_drops_oldest_past_the_limit() {
        let mut history = QuizHistoryData::default();
        for i in 0..HISTORY_LIMIT + 2 {
            push_capped(&mut history, summary(i % 4));
        }
        assert_eq!(history.results.len(), HISTORY_LIMIT);
        assert_eq!(history.results[0].score, 2);
    }

    #[test]
    fn clear_is_unconditional_and_idempotent() {
        let mut slot = MemorySlot::new();
        slot.save("quiz-1", SessionKind::Quiz, data(1)).unwrap();
        slot.clear().unwrap();
        assert!(slot.peek().is_none());
        slot.clear().unwrap();
    }
}
