use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::quiz::definition::QuizDefinition;
use crate::quiz::question::{Question, QuestionKind, Response};
use crate::session::result;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    NotStarted,
    InProgress,
    Completed,
    Finished,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("no quiz is in progress")]
    NotInProgress,
    #[error("question {} has already been answered", .0 + 1)]
    AlreadyAnswered(usize),
    #[error("expected a {expected} answer")]
    ResponseMismatch { expected: QuestionKind },
    #[error("the quiz is not complete")]
    NotCompleted,
    #[error("questions cannot be filtered once the quiz is underway")]
    AlreadyUnderway,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRecord {
    pub question_index: usize,
    pub user_input: Response,
    pub is_correct: bool,
}

/// Feedback for the answer just submitted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnswerOutcome {
    pub is_correct: bool,
    pub correct_answer: String,
    pub explanation: Option<String>,
}

/// One pass over a question set.
///
/// `0 <= score <= answers.len() <= questions.len()` and
/// `current_index <= questions.len()` hold after every operation.
#[derive(Clone, Debug)]
pub struct QuizSession {
    pub quiz_id: String,
    pub title: String,
    pub questions: Vec<Question>,
    pub current_index: usize,
    pub answers: Vec<AnswerRecord>,
    pub score: usize,
    pub mistakes: Vec<Question>,
    pub mistakes_only: bool,
    pub original_questions: Option<Vec<Question>>,
    pub phase: SessionPhase,
    pub started_at: DateTime<Utc>,
}

/// Fields written into the session slot next to `{id, type, timestamp}`.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuizSnapshot {
    title: String,
    questions: Vec<Question>,
    current_index: usize,
    answers: Vec<AnswerRecord>,
    score: usize,
    mistakes: Vec<Question>,
    is_mistakes_only_mode: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    original_questions: Option<Vec<Question>>,
    started_at: DateTime<Utc>,
}

impl Default for QuizSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Answer indices strictly increase, and only the newest answer may belong to
/// the question still on screen.
fn answers_in_order(answers: &[AnswerRecord], current_index: usize) -> bool {
    let last = answers.len().saturating_sub(1);
    answers
        .windows(2)
        .all(|pair| pair[0].question_index < pair[1].question_index)
        && answers.iter().enumerate().all(|(i, a)| {
            a.question_index < current_index || (i == last && a.question_index == current_index)
        })
}

impl QuizSession {
    pub fn new() -> Self {
        Self {
            quiz_id: String::new(),
            title: String::new(),
            questions: Vec::new(),
            current_index: 0,
            answers: Vec::new(),
            score: 0,
            mistakes: Vec::new(),
            mistakes_only: false,
            original_questions: None,
            phase: SessionPhase::NotStarted,
            started_at: Utc::now(),
        }
    }

    /// A fresh, in-progress pass over `definition`.
    pub fn started(definition: &QuizDefinition, id: &str) -> Self {
        let mut session = Self::new();
        session.start(definition, id);
        session
    }

    pub(crate) fn with_questions(
        quiz_id: String,
        title: String,
        questions: Vec<Question>,
        mistakes_only: bool,
        original_questions: Option<Vec<Question>>,
    ) -> Self {
        let phase = if questions.is_empty() {
            SessionPhase::Completed
        } else {
            SessionPhase::InProgress
        };
        Self {
            quiz_id,
            title,
            questions,
            current_index: 0,
            answers: Vec::new(),
            score: 0,
            mistakes: Vec::new(),
            mistakes_only,
            original_questions,
            phase,
            started_at: Utc::now(),
        }
    }

    /// Begin a normal pass. Discards any in-memory attempt. An empty question
    /// list completes immediately.
    pub fn start(&mut self, definition: &QuizDefinition, id: &str) {
        *self = Self::with_questions(
            id.to_string(),
            definition.title.clone(),
            definition.questions.clone(),
            false,
            None,
        );
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn total(&self) -> usize {
        self.questions.len()
    }

    pub fn is_complete(&self) -> bool {
        self.current_index >= self.questions.len()
    }

    pub fn current_question(&self) -> Option<&Question> {
        if self.phase != SessionPhase::InProgress {
            return None;
        }
        self.questions.get(self.current_index)
    }

    pub fn is_answered(&self, index: usize) -> bool {
        self.answers.iter().any(|a| a.question_index == index)
    }

    pub fn current_answer(&self) -> Option<&AnswerRecord> {
        self.answers
            .iter()
            .find(|a| a.question_index == self.current_index)
    }

    pub fn percentage(&self) -> u32 {
        result::percentage(self.score, self.total())
    }

    /// Grade and record the answer for the current question. Each question
    /// accepts exactly one answer per pass; a rejected submission leaves the
    /// session untouched.
    pub fn submit_answer(&mut self, response: Response) -> Result<AnswerOutcome, SessionError> {
        if self.phase != SessionPhase::InProgress {
            return Err(SessionError::NotInProgress);
        }
        let index = self.current_index;
        let question = self
            .questions
            .get(index)
            .ok_or(SessionError::NotInProgress)?;
        if self.is_answered(index) {
            return Err(SessionError::AlreadyAnswered(index));
        }
        let is_correct = question
            .grade(&response)
            .ok_or(SessionError::ResponseMismatch {
                expected: question.kind(),
            })?;

        let outcome = AnswerOutcome {
            is_correct,
            correct_answer: question.correct_answer_text(),
            explanation: question.explanation.clone(),
        };
        if is_correct {
            self.score += 1;
        } else {
            self.mistakes.push(question.clone());
        }
        self.answers.push(AnswerRecord {
            question_index: index,
            user_input: response,
            is_correct,
        });
        Ok(outcome)
    }

    /// Move to the next question, completing the pass after the last one.
    pub fn advance(&mut self) -> Result<SessionPhase, SessionError> {
        if self.phase != SessionPhase::InProgress {
            return Err(SessionError::NotInProgress);
        }
        self.current_index = (self.current_index + 1).min(self.questions.len());
        if self.is_complete() {
            self.phase = SessionPhase::Completed;
        }
        Ok(self.phase)
    }

    /// Leave the summary. Clearing the persisted copy is the caller's call.
    pub fn finish(&mut self) -> Result<(), SessionError> {
        match self.phase {
            SessionPhase::Completed => {
                self.phase = SessionPhase::Finished;
                Ok(())
            }
            SessionPhase::Finished => Ok(()),
            _ => Err(SessionError::NotCompleted),
        }
    }

    /// Drop every question of `kind`. Only allowed before the first answer.
    /// A mistakes-only pass is the definitive retry list and is never
    /// filtered.
    pub fn exclude_kind(&mut self, kind: QuestionKind) -> Result<usize, SessionError> {
        if self.mistakes_only {
            return Ok(0);
        }
        if self.phase != SessionPhase::InProgress && self.phase != SessionPhase::Completed {
            return Err(SessionError::NotInProgress);
        }
        if self.current_index > 0 || !self.answers.is_empty() {
            return Err(SessionError::AlreadyUnderway);
        }
        let before = self.questions.len();
        self.questions.retain(|q| q.kind() != kind);
        if self.questions.is_empty() {
            self.phase = SessionPhase::Completed;
        }
        Ok(before - self.questions.len())
    }

    pub fn snapshot(&self) -> serde_json::Result<Map<String, Value>> {
        let snapshot = QuizSnapshot {
            title: self.title.clone(),
            questions: self.questions.clone(),
            current_index: self.current_index,
            answers: self.answers.clone(),
            score: self.score,
            mistakes: self.mistakes.clone(),
            is_mistakes_only_mode: self.mistakes_only,
            original_questions: self.original_questions.clone(),
            started_at: self.started_at,
        };
        match serde_json::to_value(snapshot)? {
            Value::Object(map) => Ok(map),
            _ => Ok(Map::new()),
        }
    }

    /// Rebuild a session from slot data. `None` when the data is unreadable
    /// or breaks the session bounds.
    pub fn restore(quiz_id: &str, data: Map<String, Value>) -> Option<Self> {
        let snapshot: QuizSnapshot = match serde_json::from_value(Value::Object(data)) {
            Ok(s) => s,
            Err(e) => {
                log::warn!("cannot restore quiz session {quiz_id}: {e}");
                return None;
            }
        };
        let total = snapshot.questions.len();
        let consistent = snapshot.current_index <= total
            && snapshot.answers.len() <= total
            && snapshot.score <= snapshot.answers.len()
            && snapshot.answers.iter().all(|a| a.question_index < total)
            && answers_in_order(&snapshot.answers, snapshot.current_index)
            && snapshot.score == snapshot.answers.iter().filter(|a| a.is_correct).count();
        if !consistent {
            log::warn!("discarding inconsistent quiz session {quiz_id}");
            return None;
        }

        let phase = if snapshot.current_index >= total {
            SessionPhase::Completed
        } else {
            SessionPhase::InProgress
        };
        Some(Self {
            quiz_id: quiz_id.to_string(),
            title: snapshot.title,
            questions: snapshot.questions,
            current_index: snapshot.current_index,
            answers: snapshot.answers,
            score: snapshot.score,
            mistakes: snapshot.mistakes,
            mistakes_only: snapshot.is_mistakes_only_mode,
            original_questions: snapshot.original_questions,
            phase,
            started_at: snapshot.started_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::question::{MatchPair, QuestionBody};

    fn q(id: &str, body: QuestionBody) -> Question {
        Question {
            id: id.to_string(),
            prompt: format!("prompt {id}"),
            explanation: None,
            body,
        }
    }

    fn definition() -> QuizDefinition {
        QuizDefinition {
            title: "Mixed".to_string(),
            description: String::new(),
            language: "es-ES".to_string(),
            questions: vec![
                q(
                    "mc",
                    QuestionBody::MultipleChoice {
                        options: vec!["uno".into(), "dos".into()],
                        correct_answer_index: 1,
                    },
                ),
                q("tf", QuestionBody::TrueFalse { is_correct: true }),
                q(
                    "fill",
                    QuestionBody::FillInTheBlank {
                        correct_answer: "adiós".into(),
                    },
                ),
                q(
                    "match",
                    QuestionBody::Matching {
                        pairs: vec![MatchPair::new("red", "rojo")],
                    },
                ),
                q(
                    "listen",
                    QuestionBody::Listening {
                        audio_text: "gracias".into(),
                        correct_answer: "gracias".into(),
                        acceptable_answers: vec![],
                    },
                ),
            ],
        }
    }

    fn assert_bounds(session: &QuizSession) {
        assert!(session.score <= session.answers.len());
        assert!(session.answers.len() <= session.questions.len());
        assert!(session.current_index <= session.questions.len());
    }

    #[test]
    fn new_session_is_not_started() {
        let mut session = QuizSession::new();
        assert_eq!(session.phase, SessionPhase::NotStarted);
        assert_eq!(
            session.submit_answer(Response::TrueFalse(true)),
            Err(SessionError::NotInProgress)
        );
        assert_eq!(session.advance(), Err(SessionError::NotInProgress));
    }

    #[test]
    fn start_initializes_state() {
        let session = QuizSession::started(&definition(), "mixed");
        assert_eq!(session.phase, SessionPhase::InProgress);
        assert_eq!(session.quiz_id, "mixed");
        assert_eq!(session.total(), 5);
        assert_eq!(session.current_index, 0);
        assert!(session.answers.is_empty());
        assert!(session.mistakes.is_empty());
        assert_eq!(session.score, 0);
        assert!(!session.mistakes_only);
    }

    #[test]
    fn full_pass_tracks_score_and_mistakes() {
        let mut session = QuizSession::started(&definition(), "mixed");
        let responses = [
            Response::Choice(1),
            Response::TrueFalse(false),
            Response::Text("Adios!".into()),
            Response::Matches(vec![MatchPair::new("red", "azul")]),
            Response::Text("gracias".into()),
        ];
        for response in responses {
            session.submit_answer(response).unwrap();
            assert_bounds(&session);
            session.advance().unwrap();
            assert_bounds(&session);
        }

        assert_eq!(session.phase, SessionPhase::Completed);
        assert_eq!(session.score, 3);
        assert_eq!(session.answers.len(), 5);
        let mistake_ids: Vec<&str> = session.mistakes.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(mistake_ids, vec!["tf", "match"]);
        assert_eq!(session.percentage(), 60);
    }

    #[test]
    fn second_answer_for_same_question_is_rejected() {
        let mut session = QuizSession::started(&definition(), "mixed");
        let first = session.submit_answer(Response::Choice(0)).unwrap();
        assert!(!first.is_correct);
        assert_eq!(first.correct_answer, "dos");

        assert_eq!(
            session.submit_answer(Response::Choice(1)),
            Err(SessionError::AlreadyAnswered(0))
        );
        assert_eq!(session.score, 0);
        assert_eq!(session.answers.len(), 1);
        assert_eq!(session.mistakes.len(), 1);
    }

    #[test]
    fn mismatched_response_leaves_state_untouched() {
        let mut session = QuizSession::started(&definition(), "mixed");
        let err = session.submit_answer(Response::Text("dos".into())).unwrap_err();
        assert_eq!(
            err,
            SessionError::ResponseMismatch {
                expected: QuestionKind::MultipleChoice
            }
        );
        assert!(session.answers.is_empty());
        assert!(!session.is_answered(0));
    }

    #[test]
    fn empty_quiz_is_complete_at_start() {
        let mut def = definition();
        def.questions.clear();
        let mut session = QuizSession::started(&def, "empty");
        assert!(session.is_complete());
        assert_eq!(session.phase, SessionPhase::Completed);
        assert_eq!(session.percentage(), 0);
        assert!(session.current_question().is_none());
        session.finish().unwrap();
        assert_eq!(session.phase, SessionPhase::Finished);
    }

    #[test]
    fn skipping_without_answering_keeps_bounds() {
        let mut session = QuizSession::started(&definition(), "mixed");
        for _ in 0..5 {
            session.advance().unwrap();
        }
        assert_eq!(session.phase, SessionPhase::Completed);
        assert_eq!(session.current_index, 5);
        assert!(session.answers.is_empty());
        assert_eq!(session.advance(), Err(SessionError::NotInProgress));
        assert_bounds(&session);
    }

    #[test]
    fn finish_requires_completion() {
        let mut session = QuizSession::started(&definition(), "mixed");
        assert_eq!(session.finish(), Err(SessionError::NotCompleted));
    }

    #[test]
    fn reset_discards_everything() {
        let mut session = QuizSession::started(&definition(), "mixed");
        session.submit_answer(Response::Choice(1)).unwrap();
        session.reset();
        assert_eq!(session.phase, SessionPhase::NotStarted);
        assert!(session.questions.is_empty());
        assert_eq!(session.score, 0);
    }

    #[test]
    fn exclude_kind_only_before_first_answer() {
        let mut session = QuizSession::started(&definition(), "mixed");
        assert_eq!(session.exclude_kind(QuestionKind::Listening), Ok(1));
        assert_eq!(session.total(), 4);

        session.submit_answer(Response::Choice(1)).unwrap();
        assert_eq!(
            session.exclude_kind(QuestionKind::Matching),
            Err(SessionError::AlreadyUnderway)
        );
        assert_eq!(session.total(), 4);
    }

    #[test]
    fn excluding_every_question_completes_the_session() {
        let def = QuizDefinition {
            questions: definition()
                .questions
                .into_iter()
                .filter(|q| q.kind() == QuestionKind::Listening)
                .collect(),
            ..definition()
        };
        let mut session = QuizSession::started(&def, "listening");
        assert_eq!(session.exclude_kind(QuestionKind::Listening), Ok(1));
        assert_eq!(session.phase, SessionPhase::Completed);
    }

    #[test]
    fn snapshot_restores_mid_quiz() {
        let mut session = QuizSession::started(&definition(), "mixed");
        session.submit_answer(Response::Choice(0)).unwrap();
        session.advance().unwrap();
        session.submit_answer(Response::TrueFalse(true)).unwrap();

        let data = session.snapshot().unwrap();
        assert_eq!(data["currentIndex"], 1);
        assert_eq!(data["isMistakesOnlyMode"], false);

        let restored = QuizSession::restore("mixed", data).unwrap();
        assert_eq!(restored.phase, SessionPhase::InProgress);
        assert_eq!(restored.current_index, 1);
        assert_eq!(restored.score, 1);
        assert_eq!(restored.answers, session.answers);
        assert_eq!(restored.mistakes, session.mistakes);
        assert!(restored.is_answered(1));
    }

    #[test]
    fn restore_rejects_inconsistent_data() {
        let session = QuizSession::started(&definition(), "mixed");
        let mut data = session.snapshot().unwrap();
        data.insert("score".to_string(), Value::from(3));
        assert!(QuizSession::restore("mixed", data).is_none());

        let mut data = session.snapshot().unwrap();
        data.insert("currentIndex".to_string(), Value::from(99));
        assert!(QuizSession::restore("mixed", data).is_none());

        assert!(QuizSession::restore("mixed", Map::new()).is_none());
    }

    #[test]
    fn restore_rejects_duplicate_or_future_answers() {
        let mut session = QuizSession::started(&definition(), "mixed");
        session.submit_answer(Response::Choice(0)).unwrap();
        session.advance().unwrap();
        session.submit_answer(Response::TrueFalse(true)).unwrap();
        assert!(QuizSession::restore("mixed", session.snapshot().unwrap()).is_some());

        let with_index = |pos: usize, index: usize| {
            let mut data = session.snapshot().unwrap();
            data["answers"][pos]["questionIndex"] = Value::from(index);
            data
        };
        assert!(QuizSession::restore("mixed", with_index(0, 1)).is_none());
        assert!(QuizSession::restore("mixed", with_index(1, 3)).is_none());
        assert!(QuizSession::restore("mixed", with_index(0, 2)).is_none());
    }

    #[test]
    fn restore_at_end_is_completed() {
        let mut session = QuizSession::started(&definition(), "mixed");
        for _ in 0..5 {
            session.advance().unwrap();
        }
        let restored = QuizSession::restore("mixed", session.snapshot().unwrap()).unwrap();
        assert_eq!(restored.phase, SessionPhase::Completed);
    }
}
