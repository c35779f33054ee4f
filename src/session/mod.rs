pub mod quiz;
pub mod result;
pub mod retry;
pub mod workout;

pub use quiz::{AnswerOutcome, AnswerRecord, QuizSession, SessionError, SessionPhase};
pub use result::{QuizSummary, percentage};
pub use retry::{apply_type_exclusion, build_retry_session, type_exclusion_applies};
pub use workout::{WorkoutDefinition, WorkoutSession};
