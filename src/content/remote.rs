use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::content::{Article, ContentSource, QuizListing, WorkoutListing};
use crate::error::{AppError, AppResult};
use crate::quiz::definition::QuizDefinition;
use crate::session::workout::WorkoutDefinition;
use crate::tabs::AuthState;

const TIMEOUT: Duration = Duration::from_secs(10);
const USER_HEADER: &str = "X-Quizdeck-User";

/// Content served by an HTTP backend. Paths are relative to `base_url`:
/// `quizzes`, `listening`, `workouts` (each with `/{id}`) and `articles`.
pub struct RemoteLibrary {
    base_url: String,
    client: Client,
}

#[derive(Deserialize)]
struct Created {
    id: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Translate a non-success status into the error category the app reports.
pub fn error_for_status(status: u16, body: &str) -> AppError {
    let parsed = serde_json::from_str::<ErrorBody>(body).ok();
    let detail = parsed
        .as_ref()
        .and_then(|b| b.message.clone())
        .unwrap_or_else(|| body.trim().to_string());
    match status {
        401 | 403 => AppError::Auth(detail),
        404 => AppError::NotFound(if detail.is_empty() {
            "the requested content".to_string()
        } else {
            detail
        }),
        400 | 422 => match parsed {
            Some(b) if !b.errors.is_empty() => AppError::Validation(b.errors),
            _ => AppError::validation(detail),
        },
        _ => AppError::Unexpected(format!("server answered {status}: {detail}")),
    }
}

fn transport(err: reqwest::Error) -> AppError {
    if err.is_decode() {
        AppError::Unexpected(err.to_string())
    } else {
        AppError::Network(err.to_string())
    }
}

impl RemoteLibrary {
    pub fn new(base_url: &str) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(TIMEOUT)
            .build()
            .map_err(|e| AppError::Unexpected(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    fn send(&self, request: RequestBuilder) -> AppResult<Response> {
        let response = request.send().map_err(transport)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        log::debug!("content server answered {status}: {body}");
        Err(error_for_status(status.as_u16(), &body))
    }

    fn get<T: DeserializeOwned>(&self, path: &str) -> AppResult<T> {
        self.send(self.client.get(self.url(path)))?
            .json()
            .map_err(transport)
    }
}

impl ContentSource for RemoteLibrary {
    fn fetch_quizzes(&self, sample_only: bool) -> AppResult<Vec<QuizListing>> {
        let request = self
            .client
            .get(self.url("quizzes"))
            .query(&[("sampleOnly", sample_only)]);
        self.send(request)?.json().map_err(transport)
    }

    fn fetch_quiz_by_id(&self, id: &str) -> AppResult<QuizDefinition> {
        self.get(&format!("quizzes/{id}"))
    }

    fn fetch_listening_sets(&self) -> AppResult<Vec<QuizListing>> {
        self.get("listening")
    }

    fn fetch_listening_set_by_id(&self, id: &str) -> AppResult<QuizDefinition> {
        self.get(&format!("listening/{id}"))
    }

    fn fetch_workouts(&self) -> AppResult<Vec<WorkoutListing>> {
        self.get("workouts")
    }

    fn fetch_workout_by_id(&self, id: &str) -> AppResult<WorkoutDefinition> {
        self.get(&format!("workouts/{id}"))
    }

    fn fetch_articles(&self, auth: &AuthState) -> AppResult<Vec<Article>> {
        let Some(user) = &auth.current_user else {
            return Err(AppError::Auth("the knowledge base requires a signed-in user".to_string()));
        };
        let request = self
            .client
            .get(self.url("articles"))
            .header(USER_HEADER, &user.id);
        self.send(request)?.json().map_err(transport)
    }

    fn create_quiz(&self, quiz: &QuizDefinition) -> AppResult<String> {
        quiz.validate()?;
        let created: Created = self
            .send(self.client.post(self.url("quizzes")).json(quiz))?
            .json()
            .map_err(transport)?;
        Ok(created.id)
    }

    fn update_quiz(&self, id: &str, quiz: &QuizDefinition) -> AppResult<()> {
        quiz.validate()?;
        self.send(self.client.put(self.url(&format!("quizzes/{id}"))).json(quiz))?;
        Ok(())
    }

    fn delete_quiz(&self, id: &str) -> AppResult<()> {
        self.send(self.client.delete(self.url(&format!("quizzes/{id}"))))?;
        Ok(())
    }
}
