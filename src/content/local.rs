use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use rust_embed::Embed;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::content::{Article, ContentSource, QuizListing, WorkoutListing};
use crate::error::{AppError, AppResult};
use crate::quiz::definition::QuizDefinition;
use crate::quiz::question::QuestionKind;
use crate::session::workout::WorkoutDefinition;
use crate::tabs::AuthState;

#[derive(Embed)]
#[folder = "assets/content/"]
struct SampleContent;

const QUIZZES: &str = "quizzes";
const LISTENING: &str = "listening";
const WORKOUTS: &str = "workouts";
const ARTICLES: &str = "articles";
const MEDIA: &str = "media";

/// Directory-backed library. Bundled samples are served read-only next to
/// whatever the user has created under `base_dir`.
pub struct LocalLibrary {
    base_dir: PathBuf,
}

fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn slugify(title: &str) -> String {
    let mut slug = String::new();
    for ch in title.to_lowercase().chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch);
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-').to_string();
    if slug.is_empty() { "quiz".to_string() } else { slug }
}

fn sample<T: DeserializeOwned>(kind: &str, id: &str) -> Option<T> {
    let file = SampleContent::get(&format!("{kind}/{id}.json"))?;
    match serde_json::from_slice(file.data.as_ref()) {
        Ok(value) => Some(value),
        Err(e) => {
            log::warn!("bundled {kind}/{id}.json is unreadable: {e}");
            None
        }
    }
}

fn samples<T: DeserializeOwned>(kind: &str) -> Vec<(String, T)> {
    let prefix = format!("{kind}/");
    let mut ids: Vec<String> = SampleContent::iter()
        .filter_map(|path| {
            path.strip_prefix(&prefix)
                .and_then(|rest| rest.strip_suffix(".json"))
                .map(|id| id.to_string())
        })
        .collect();
    ids.sort();
    ids.into_iter()
        .filter_map(|id| sample(kind, &id).map(|value| (id, value)))
        .collect()
}

impl LocalLibrary {
    pub fn new(base_dir: PathBuf) -> AppResult<Self> {
        for sub in [QUIZZES, LISTENING, WORKOUTS, ARTICLES, MEDIA] {
            fs::create_dir_all(base_dir.join(sub))?;
        }
        Ok(Self { base_dir })
    }

    fn entry_path(&self, kind: &str, id: &str) -> PathBuf {
        self.base_dir
            .join(kind)
            .join(format!("{}.json", sanitize_key(id)))
    }

    pub fn media_path(&self, file: &str) -> PathBuf {
        self.base_dir.join(MEDIA).join(sanitize_key(file))
    }

    fn read_entry<T: DeserializeOwned>(&self, path: &Path) -> AppResult<Option<T>> {
        match fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content)
                .map(Some)
                .map_err(|e| AppError::validation(format!("{}: {e}", path.display()))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn user_entries<T: DeserializeOwned>(&self, kind: &str) -> AppResult<Vec<(String, T)>> {
        let mut out = Vec::new();
        for entry in fs::read_dir(self.base_dir.join(kind))? {
            let path = entry?.path();
            if path.extension().and_then(|x| x.to_str()) != Some("json") {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            match self.read_entry::<T>(&path) {
                Ok(Some(value)) => out.push((id, value)),
                Ok(None) => {}
                Err(e) => log::warn!("skipping unreadable library entry: {e}"),
            }
        }
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }

    fn write_entry<T: Serialize>(&self, kind: &str, id: &str, value: &T) -> AppResult<()> {
        let path = self.entry_path(kind, id);
        let tmp_path = path.with_extension("tmp");
        let json = serde_json::to_string_pretty(value)
            .map_err(|e| AppError::Unexpected(e.to_string()))?;

        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    fn lookup<T: DeserializeOwned>(&self, kind: &str, id: &str) -> AppResult<T> {
        if let Some(value) = self.read_entry(&self.entry_path(kind, id))? {
            return Ok(value);
        }
        sample(kind, id).ok_or_else(|| AppError::NotFound(format!("{} {id}", kind.trim_end_matches('s'))))
    }

    fn listings(&self, kind: &str, include_user: bool) -> AppResult<Vec<QuizListing>> {
        let mut out: Vec<QuizListing> = samples::<QuizDefinition>(kind)
            .into_iter()
            .map(|(id, quiz)| QuizListing {
                id,
                title: quiz.title,
                description: quiz.description,
                is_sample: true,
            })
            .collect();
        if include_user {
            out.extend(
                self.user_entries::<QuizDefinition>(kind)?
                    .into_iter()
                    .map(|(id, quiz)| QuizListing {
                        id,
                        title: quiz.title,
                        description: quiz.description,
                        is_sample: false,
                    }),
            );
        }
        Ok(out)
    }

    fn is_sample_quiz(id: &str) -> bool {
        SampleContent::get(&format!("{QUIZZES}/{id}.json")).is_some()
    }

    fn unique_id(&self, title: &str) -> String {
        let base = slugify(title);
        let mut candidate = base.clone();
        let mut n = 2;
        while self.entry_path(QUIZZES, &candidate).exists() || Self::is_sample_quiz(&candidate) {
            candidate = format!("{base}-{n}");
            n += 1;
        }
        candidate
    }

    /// Media cleanup never fails the delete it belongs to.
    fn remove_media(&self, quiz: &QuizDefinition) {
        for file in quiz.questions.iter().filter_map(|q| q.media_file()) {
            let path = self.media_path(file);
            match fs::remove_file(&path) {
                Ok(()) => log::info!("removed media {}", path.display()),
                Err(e) => log::warn!("could not remove media {}: {e}", path.display()),
            }
        }
    }
}

impl ContentSource for LocalLibrary {
    fn fetch_quizzes(&self, sample_only: bool) -> AppResult<Vec<QuizListing>> {
        self.listings(QUIZZES, !sample_only)
    }

    fn fetch_quiz_by_id(&self, id: &str) -> AppResult<QuizDefinition> {
        self.lookup(QUIZZES, id)
    }

    fn fetch_listening_sets(&self) -> AppResult<Vec<QuizListing>> {
        self.listings(LISTENING, true)
    }

    fn fetch_listening_set_by_id(&self, id: &str) -> AppResult<QuizDefinition> {
        let set: QuizDefinition = self.lookup(LISTENING, id)?;
        let stray = set.questions.len() - set.count_of(QuestionKind::Listening);
        if stray > 0 {
            log::warn!("listening set {id} contains {stray} non-listening question(s)");
        }
        Ok(set)
    }

    fn fetch_workouts(&self) -> AppResult<Vec<WorkoutListing>> {
        let mut all = samples::<WorkoutDefinition>(WORKOUTS);
        all.extend(self.user_entries::<WorkoutDefinition>(WORKOUTS)?);
        Ok(all
            .into_iter()
            .map(|(id, w)| WorkoutListing {
                id,
                title: w.title,
                description: w.description,
            })
            .collect())
    }

    fn fetch_workout_by_id(&self, id: &str) -> AppResult<WorkoutDefinition> {
        let mut workout: WorkoutDefinition = self.lookup(WORKOUTS, id)?;
        workout.id = id.to_string();
        Ok(workout)
    }

    fn fetch_articles(&self, auth: &AuthState) -> AppResult<Vec<Article>> {
        if !auth.is_signed_in() {
            return Err(AppError::Auth("the knowledge base requires a signed-in user".to_string()));
        }
        let mut all = samples::<Article>(ARTICLES);
        all.extend(self.user_entries::<Article>(ARTICLES)?);
        Ok(all.into_iter().map(|(_, article)| article).collect())
    }

    fn create_quiz(&self, quiz: &QuizDefinition) -> AppResult<String> {
        quiz.validate()?;
        let id = self.unique_id(&quiz.title);
        self.write_entry(QUIZZES, &id, quiz)?;
        log::info!("created quiz {id}");
        Ok(id)
    }

    fn update_quiz(&self, id: &str, quiz: &QuizDefinition) -> AppResult<()> {
        quiz.validate()?;
        if !self.entry_path(QUIZZES, id).exists() {
            if Self::is_sample_quiz(id) {
                return Err(AppError::validation("sample quizzes are read-only"));
            }
            return Err(AppError::NotFound(format!("quiz {id}")));
        }
        self.write_entry(QUIZZES, id, quiz)
    }

    fn delete_quiz(&self, id: &str) -> AppResult<()> {
        let path = self.entry_path(QUIZZES, id);
        let quiz: Option<QuizDefinition> = match self.read_entry(&path) {
            Ok(quiz) => quiz,
            Err(e) => {
                log::warn!("deleting unreadable quiz {id}: {e}");
                None
            }
        };
        if quiz.is_none() && !path.exists() {
            if Self::is_sample_quiz(id) {
                return Err(AppError::validation("sample quizzes are read-only"));
            }
            return Err(AppError::NotFound(format!("quiz {id}")));
        }
        fs::remove_file(&path)?;
        log::info!("deleted quiz {id}");
        if let Some(quiz) = quiz {
            self.remove_media(&quiz);
        }
        Ok(())
    }
}
