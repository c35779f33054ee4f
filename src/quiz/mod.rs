pub mod definition;
pub mod normalize;
pub mod question;

pub use definition::QuizDefinition;
pub use question::{MatchPair, Question, QuestionBody, QuestionKind, Response};
