use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Serialize, de::DeserializeOwned};

use crate::session::result::QuizSummary;
use crate::store::{ProgressStore, SessionSlot, push_capped};
use crate::store::schema::{Preferences, QuizHistoryData};

const ACTIVE_SESSION: &str = "active_session.json";
const PREFERENCES: &str = "preferences.json";
const QUIZ_HISTORY: &str = "quiz_history.json";

pub struct JsonStore {
    base_dir: PathBuf,
}

impl JsonStore {
    pub fn new() -> Result<Self> {
        Self::with_base_dir(Self::default_dir())
    }

    pub fn with_base_dir(base_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    pub fn default_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("quizdeck")
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn file_path(&self, name: &str) -> PathBuf {
        self.base_dir.join(name)
    }

    fn load_file<T: DeserializeOwned + Default>(&self, name: &str) -> T {
        let path = self.file_path(name);
        if path.exists() {
            match fs::read_to_string(&path) {
                Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
                Err(_) => T::default(),
            }
        } else {
            T::default()
        }
    }

    fn save_file<T: Serialize>(&self, name: &str, data: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(data)?;
        self.write_atomic(name, &json)
    }

    fn write_atomic(&self, name: &str, content: &str) -> Result<()> {
        let path = self.file_path(name);
        let tmp_path = path.with_extension("tmp");

        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;

        fs::rename(&tmp_path, &path)?;
        Ok(())
    }
}

impl SessionSlot for JsonStore {
    fn read_raw(&self) -> Option<String> {
        fs::read_to_string(self.file_path(ACTIVE_SESSION)).ok()
    }

    fn write_raw(&mut self, raw: &str) -> Result<()> {
        self.write_atomic(ACTIVE_SESSION, raw)
    }

    fn remove_raw(&mut self) -> Result<()> {
        match fs::remove_file(self.file_path(ACTIVE_SESSION)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl ProgressStore for JsonStore {
    fn load_preferences(&self) -> Preferences {
        self.load_file(PREFERENCES)
    }

    fn save_preferences(&mut self, prefs: &Preferences) -> Result<()> {
        self.save_file(PREFERENCES, prefs)
    }

    fn load_quiz_history(&self) -> QuizHistoryData {
        let history: QuizHistoryData = self.load_file(QUIZ_HISTORY);
        if history.needs_reset() {
            log::warn!("discarding quiz history with unknown schema version");
            return QuizHistoryData::default();
        }
        history
    }

    fn append_quiz_result(&mut self, result: QuizSummary) -> Result<()> {
        let mut history = self.load_quiz_history();
        push_capped(&mut history, result);
        self.save_file(QUIZ_HISTORY, &history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::schema::SessionKind;
    use chrono::{Duration, Utc};
    use serde_json::{Map, Value};
    use tempfile::TempDir;

    fn make_test_store() -> (TempDir, JsonStore) {
        let dir = TempDir::new().unwrap();
        let store = JsonStore::with_base_dir(dir.path().to_path_buf()).unwrap();
        (dir, store)
    }

    fn summary(score: usize, total: usize) -> QuizSummary {
        QuizSummary {
            quiz_id: "q".to_string(),
            title: "Quiz".to_string(),
            score,
            total,
            percentage: crate::session::result::percentage(score, total),
            mistakes: total - score,
            mistakes_only: false,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn session_survives_a_new_store_instance() {
        let (dir, mut store) = make_test_store();
        let mut data = Map::new();
        data.insert("currentIndex".to_string(), Value::from(4));
        store.save("spanish", SessionKind::Quiz, data).unwrap();

        let reopened = JsonStore::with_base_dir(dir.path().to_path_buf()).unwrap();
        let loaded = reopened.load("spanish", SessionKind::Quiz).unwrap();
        assert_eq!(loaded.data.get("currentIndex"), Some(&Value::from(4)));
    }

    #[test]
    fn stored_layout_is_a_single_flat_object() {
        let (_dir, mut store) = make_test_store();
        let mut data = Map::new();
        data.insert("score".to_string(), Value::from(2));
        store.save("legs", SessionKind::Workout, data).unwrap();

        let raw = fs::read_to_string(store.file_path(ACTIVE_SESSION)).unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["id"], "legs");
        assert_eq!(value["type"], "workout");
        assert!(value["timestamp"].is_i64());
        assert_eq!(value["score"], 2);
    }

    #[test]
    fn corrupt_file_reads_as_no_session() {
        let (_dir, store) = make_test_store();
        fs::write(store.file_path(ACTIVE_SESSION), "garbage{").unwrap();
        assert!(store.load("spanish", SessionKind::Quiz).is_none());
    }

    #[test]
    fn expire_removes_the_file() {
        let (_dir, mut store) = make_test_store();
        let now = Utc::now();
        store
            .save_at("spanish", SessionKind::Quiz, Map::new(), now - Duration::hours(25))
            .unwrap();
        assert!(store.check_and_expire_at(now).unwrap());
        assert!(!store.file_path(ACTIVE_SESSION).exists());
    }

    #[test]
    fn clear_without_session_is_ok() {
        let (_dir, mut store) = make_test_store();
        store.clear().unwrap();
    }

    #[test]
    fn no_residual_tmp_files_after_save() {
        let (dir, mut store) = make_test_store();
        store.save("spanish", SessionKind::Quiz, Map::new()).unwrap();
        store.save_preferences(&Preferences { skip_listening: true }).unwrap();
        let tmp_files: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("tmp"))
            .collect();
        assert!(tmp_files.is_empty(), "no residual .tmp files");
    }

    #[test]
    fn preferences_are_independent_of_the_session() {
        let (_dir, mut store) = make_test_store();
        assert!(!store.load_preferences().skip_listening);

        store.save_preferences(&Preferences { skip_listening: true }).unwrap();
        store.save("spanish", SessionKind::Quiz, Map::new()).unwrap();
        store.clear().unwrap();

        assert!(store.load_preferences().skip_listening);
    }

    #[test]
    fn history_appends_and_caps() {
        let (_dir, mut store) = make_test_store();
        store.append_quiz_result(summary(1, 3)).unwrap();
        store.append_quiz_result(summary(3, 3)).unwrap();

        let history = store.load_quiz_history();
        assert_eq!(history.results.len(), 2);
        assert_eq!(history.results[1].percentage, 100);
    }
}
