pub mod fetch;
pub mod local;
#[cfg(feature = "network")]
pub mod remote;

use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::quiz::definition::QuizDefinition;
use crate::session::workout::WorkoutDefinition;
use crate::tabs::AuthState;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizListing {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_sample: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkoutListing {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub body: String,
}

/// The data layer. Every call may fail; none of them retry.
pub trait ContentSource: Send + Sync {
    fn fetch_quizzes(&self, sample_only: bool) -> AppResult<Vec<QuizListing>>;
    fn fetch_quiz_by_id(&self, id: &str) -> AppResult<QuizDefinition>;
    fn fetch_listening_sets(&self) -> AppResult<Vec<QuizListing>>;
    fn fetch_listening_set_by_id(&self, id: &str) -> AppResult<QuizDefinition>;
    fn fetch_workouts(&self) -> AppResult<Vec<WorkoutListing>>;
    fn fetch_workout_by_id(&self, id: &str) -> AppResult<WorkoutDefinition>;
    fn fetch_articles(&self, auth: &AuthState) -> AppResult<Vec<Article>>;

    fn create_quiz(&self, quiz: &QuizDefinition) -> AppResult<String>;
    fn update_quiz(&self, id: &str, quiz: &QuizDefinition) -> AppResult<()>;
    fn delete_quiz(&self, id: &str) -> AppResult<()>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContentRequest {
    Quizzes { sample_only: bool },
    Quiz(String),
    ListeningSets,
    ListeningSet(String),
    Workouts,
    Workout(String),
    Articles(AuthState),
}

#[derive(Debug)]
pub enum ContentResponse {
    Quizzes(AppResult<Vec<QuizListing>>),
    Quiz(String, AppResult<QuizDefinition>),
    ListeningSets(AppResult<Vec<QuizListing>>),
    ListeningSet(String, AppResult<QuizDefinition>),
    Workouts(AppResult<Vec<WorkoutListing>>),
    Workout(String, AppResult<WorkoutDefinition>),
    Articles(AppResult<Vec<Article>>),
}

/// Run one request against `source`. Blocking; callers decide the thread.
pub fn fetch(source: &dyn ContentSource, request: ContentRequest) -> ContentResponse {
    match request {
        ContentRequest::Quizzes { sample_only } => {
            ContentResponse::Quizzes(source.fetch_quizzes(sample_only))
        }
        ContentRequest::Quiz(id) => {
            let result = source.fetch_quiz_by_id(&id);
            ContentResponse::Quiz(id, result)
        }
        ContentRequest::ListeningSets => {
            ContentResponse::ListeningSets(source.fetch_listening_sets())
        }
        ContentRequest::ListeningSet(id) => {
            let result = source.fetch_listening_set_by_id(&id);
            ContentResponse::ListeningSet(id, result)
        }
        ContentRequest::Workouts => ContentResponse::Workouts(source.fetch_workouts()),
        ContentRequest::Workout(id) => {
            let result = source.fetch_workout_by_id(&id);
            ContentResponse::Workout(id, result)
        }
        ContentRequest::Articles(auth) => ContentResponse::Articles(source.fetch_articles(&auth)),
    }
}
