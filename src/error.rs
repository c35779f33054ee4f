use thiserror::Error;

/// Failures surfaced by the content layer and the app context.
///
/// The quiz state machine never catches these; they travel up to the app
/// context, which turns them into a footer notice via [`report`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    #[error("network error: {0}")]
    Network(String),

    #[error("invalid content: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("not authorized: {0}")]
    Auth(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unexpected error: {0}")]
    Unexpected(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(vec![message.into()])
    }

    /// Text shown to the user. Never includes raw internals for
    /// uncategorized failures.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Network(_) => {
                "Could not reach the content server. Check your connection and try again.".to_string()
            }
            AppError::Validation(violations) => {
                if violations.is_empty() {
                    "The content is invalid.".to_string()
                } else {
                    format!("The content is invalid: {}", violations.join("; "))
                }
            }
            AppError::Auth(_) => "Sign in to access this content.".to_string(),
            AppError::NotFound(what) => format!("Could not find {what}."),
            AppError::Unexpected(_) => "Sorry, something went wrong.".to_string(),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Unexpected(err.to_string())
    }
}

/// Log an error with the detail appropriate to its category and return the
/// message to present.
pub fn report(err: &AppError) -> String {
    match err {
        AppError::Unexpected(detail) => log::error!("unexpected failure: {detail} ({err:?})"),
        other => log::warn!("{other}"),
    }
    err.user_message()
}
