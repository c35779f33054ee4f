use crate::quiz::question::QuestionKind;
use crate::session::quiz::QuizSession;
use crate::store::schema::Preferences;

/// The kind removed by the "skip listening questions" preference.
pub const EXCLUDABLE_KIND: QuestionKind = QuestionKind::Listening;

/// New mistakes-only pass over `prior`'s mistakes, in the order they were
/// made. `prior` is left as it was.
pub fn build_retry_session(prior: &QuizSession) -> QuizSession {
    let original = prior
        .original_questions
        .clone()
        .unwrap_or_else(|| prior.questions.clone());
    QuizSession::with_questions(
        prior.quiz_id.clone(),
        prior.title.clone(),
        prior.mistakes.clone(),
        true,
        Some(original),
    )
}

/// Type exclusion only ever applies to fresh passes. A retry pass is already
/// the exact set of questions the user must re-attempt.
pub fn type_exclusion_applies(preference_enabled: bool, session: &QuizSession) -> bool {
    preference_enabled && !session.mistakes_only
}

/// Apply the user's standing exclusion to a just-started session. Returns how
/// many questions were dropped.
pub fn apply_type_exclusion(session: &mut QuizSession, preferences: &Preferences) -> usize {
    if !type_exclusion_applies(preferences.skip_listening, session) {
        return 0;
    }
    match session.exclude_kind(EXCLUDABLE_KIND) {
        Ok(removed) => {
            if removed > 0 {
                log::info!(
                    "skipping {removed} {EXCLUDABLE_KIND} question(s) in {}",
                    session.quiz_id
                );
            }
            removed
        }
        Err(e) => {
            log::warn!("type exclusion not applied to {}: {e}", session.quiz_id);
            0
        }
    }
}
