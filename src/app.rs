use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::thread;

use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;

use crate::config::Config;
use crate::content::fetch::{FetchGuard, FetchTicket};
use crate::content::{
    self, Article, ContentRequest, ContentResponse, ContentSource, QuizListing, WorkoutListing,
};
use crate::error::{self, AppError};
use crate::event::AppEvent;
use crate::quiz::definition::QuizDefinition;
use crate::quiz::question::{MatchPair, Question, QuestionBody, QuestionKind, Response};
use crate::session::quiz::{AnswerOutcome, QuizSession, SessionPhase};
use crate::session::result::QuizSummary;
use crate::session::retry::{apply_type_exclusion, build_retry_session};
use crate::session::workout::{WorkoutDefinition, WorkoutSession};
use crate::store::{ProgressStore, SessionSlot};
use crate::store::schema::{Preferences, SessionKind};
use crate::tabs::{AuthState, FeatureFlags, Tab, enabled_tabs};
use crate::ui::theme::Theme;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppScreen {
    Home,
    Loading,
    ResumePrompt,
    Quiz,
    QuizSummary,
    Workout,
    Article,
}

/// Something the user can open from the home screen.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Activity {
    Quiz(String),
    Listening(String),
    Workout(String),
}

impl Activity {
    /// Key under which this activity is checkpointed.
    pub fn slot_id(&self) -> String {
        match self {
            Activity::Quiz(id) | Activity::Workout(id) => id.clone(),
            Activity::Listening(id) => format!("listening/{id}"),
        }
    }

    pub fn session_kind(&self) -> SessionKind {
        match self {
            Activity::Workout(_) => SessionKind::Workout,
            _ => SessionKind::Quiz,
        }
    }

    fn request(&self) -> ContentRequest {
        match self {
            Activity::Quiz(id) => ContentRequest::Quiz(id.clone()),
            Activity::Listening(id) => ContentRequest::ListeningSet(id.clone()),
            Activity::Workout(id) => ContentRequest::Workout(id.clone()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// Footer message shown until the next action replaces it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub text: String,
    pub level: NoticeLevel,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QuizStage {
    Answering,
    Feedback(AnswerOutcome),
}

/// Assignment state for a matching question. `choices` is the display order
/// of the right-hand column.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MatchingInput {
    pub items: Vec<String>,
    pub choices: Vec<String>,
    pub assignments: Vec<Option<usize>>,
    pub cursor: usize,
}

impl MatchingInput {
    fn new(pairs: &[MatchPair], rng: Option<&mut SmallRng>) -> Self {
        let mut choices: Vec<String> = pairs.iter().map(|p| p.matched.clone()).collect();
        if let Some(rng) = rng {
            choices.shuffle(rng);
        }
        Self {
            items: pairs.iter().map(|p| p.item.clone()).collect(),
            choices,
            assignments: vec![None; pairs.len()],
            cursor: 0,
        }
    }

    pub fn cycle(&mut self, forward: bool) {
        let n = self.choices.len();
        if n == 0 {
            return;
        }
        let Some(slot) = self.assignments.get_mut(self.cursor) else {
            return;
        };
        *slot = Some(match (*slot, forward) {
            (None, true) => 0,
            (None, false) => n - 1,
            (Some(i), true) => (i + 1) % n,
            (Some(i), false) => (i + n - 1) % n,
        });
    }

    pub fn move_cursor(&mut self, down: bool) {
        if self.items.is_empty() {
            return;
        }
        self.cursor = if down {
            (self.cursor + 1).min(self.items.len() - 1)
        } else {
            self.cursor.saturating_sub(1)
        };
    }

    fn response(&self) -> Option<Vec<MatchPair>> {
        self.items
            .iter()
            .zip(&self.assignments)
            .map(|(item, choice)| {
                let matched = self.choices.get((*choice)?)?;
                Some(MatchPair::new(item.clone(), matched.clone()))
            })
            .collect()
    }
}

enum Pending {
    Quiz(Activity, QuizDefinition),
    Workout(WorkoutDefinition),
}

enum Resumable {
    Quiz(QuizSession),
    Workout(WorkoutSession),
}

pub struct App {
    pub screen: AppScreen,
    pub theme: &'static Theme,
    pub config: Config,
    pub flags: FeatureFlags,
    pub auth: AuthState,
    pub user_name: String,
    pub preferences: Preferences,
    pub store: Box<dyn ProgressStore>,
    pub tab_index: usize,
    pub list_selected: usize,
    pub quiz_list: Vec<QuizListing>,
    pub listening_list: Vec<QuizListing>,
    pub workout_list: Vec<WorkoutListing>,
    pub articles: Vec<Article>,
    pub loading_what: String,
    pub quiz: Option<QuizSession>,
    pub quiz_stage: QuizStage,
    pub last_summary: Option<QuizSummary>,
    pub text_input: String,
    pub choice_selected: usize,
    pub matching: MatchingInput,
    pub workout: Option<(WorkoutDefinition, WorkoutSession)>,
    pub notice: Option<Notice>,
    pub should_quit: bool,
    content: Arc<dyn ContentSource>,
    events: Option<Sender<AppEvent>>,
    list_fetch: FetchGuard,
    open_fetch: FetchGuard,
    pending: Option<Pending>,
    resumable: Option<Resumable>,
    rng: SmallRng,
}

impl App {
    /// Without an event sender every fetch runs inline, which is what tests
    /// and one-shot commands want.
    pub fn new(
        config: Config,
        store: impl ProgressStore + 'static,
        content: Arc<dyn ContentSource>,
        user_name: Option<String>,
        events: Option<Sender<AppEvent>>,
    ) -> Self {
        let loaded_theme = Theme::load(&config.theme).unwrap_or_default();
        let theme: &'static Theme = Box::leak(Box::new(loaded_theme));

        let mut store: Box<dyn ProgressStore> = Box::new(store);
        match store.check_and_expire() {
            Ok(true) => log::info!("removed a session older than a day"),
            Ok(false) => {}
            Err(e) => log::warn!("could not expire stale session: {e}"),
        }
        let preferences = store.load_preferences();

        let auth = match &user_name {
            Some(name) => AuthState::signed_in(name),
            None => AuthState::default(),
        };

        let mut app = Self {
            screen: AppScreen::Home,
            theme,
            flags: config.feature_flags(),
            config,
            auth,
            user_name: user_name.unwrap_or_else(|| "guest".to_string()),
            preferences,
            store,
            tab_index: 0,
            list_selected: 0,
            quiz_list: Vec::new(),
            listening_list: Vec::new(),
            workout_list: Vec::new(),
            articles: Vec::new(),
            loading_what: String::new(),
            quiz: None,
            quiz_stage: QuizStage::Answering,
            last_summary: None,
            text_input: String::new(),
            choice_selected: 0,
            matching: MatchingInput::default(),
            workout: None,
            notice: None,
            should_quit: false,
            content,
            events,
            list_fetch: FetchGuard::new(),
            open_fetch: FetchGuard::new(),
            pending: None,
            resumable: None,
            rng: SmallRng::from_entropy(),
        };
        app.tab_index = app
            .tabs()
            .iter()
            .position(|t| *t == Tab::Quizzes)
            .unwrap_or(0);
        app.refresh_list();
        app
    }

    // --- notices ---

    pub fn info(&mut self, text: impl Into<String>) {
        self.notice = Some(Notice {
            text: text.into(),
            level: NoticeLevel::Info,
        });
    }

    fn fail(&mut self, err: &AppError) {
        self.notice = Some(Notice {
            text: error::report(err),
            level: NoticeLevel::Error,
        });
    }

    // --- tabs & lists ---

    pub fn tabs(&self) -> Vec<Tab> {
        enabled_tabs(&self.auth, &self.flags)
    }

    pub fn current_tab(&self) -> Tab {
        let tabs = self.tabs();
        tabs.get(self.tab_index)
            .copied()
            .unwrap_or(Tab::Quizzes)
    }

    pub fn next_tab(&mut self) {
        let n = self.tabs().len();
        self.tab_index = (self.tab_index + 1) % n;
        self.list_selected = 0;
        self.refresh_list();
    }

    pub fn prev_tab(&mut self) {
        let n = self.tabs().len();
        self.tab_index = (self.tab_index + n - 1) % n;
        self.list_selected = 0;
        self.refresh_list();
    }

    /// (title, description) rows for the current tab.
    pub fn home_items(&self) -> Vec<(String, String)> {
        match self.current_tab() {
            Tab::Quizzes => self
                .quiz_list
                .iter()
                .map(|q| {
                    let title = if q.is_sample {
                        format!("{} (sample)", q.title)
                    } else {
                        q.title.clone()
                    };
                    (title, q.description.clone())
                })
                .collect(),
            Tab::Listening => self
                .listening_list
                .iter()
                .map(|q| (q.title.clone(), q.description.clone()))
                .collect(),
            Tab::Workouts => self
                .workout_list
                .iter()
                .map(|w| (w.title.clone(), w.description.clone()))
                .collect(),
            Tab::KnowledgeBase => self
                .articles
                .iter()
                .map(|a| (a.title.clone(), String::new()))
                .collect(),
        }
    }

    pub fn select_next(&mut self) {
        let len = self.home_items().len();
        if len > 0 {
            self.list_selected = (self.list_selected + 1).min(len - 1);
        }
    }

    pub fn select_prev(&mut self) {
        self.list_selected = self.list_selected.saturating_sub(1);
    }

    pub fn refresh_list(&mut self) {
        let request = match self.current_tab() {
            Tab::Quizzes => ContentRequest::Quizzes {
                sample_only: self.flags.sample_quizzes_only,
            },
            Tab::Listening => ContentRequest::ListeningSets,
            Tab::Workouts => ContentRequest::Workouts,
            Tab::KnowledgeBase => ContentRequest::Articles(self.auth.clone()),
        };
        let ticket = self.list_fetch.issue();
        self.dispatch(ticket, request);
    }

    // --- fetching ---

    fn dispatch(&mut self, ticket: FetchTicket, request: ContentRequest) {
        match &self.events {
            Some(tx) => {
                let tx = tx.clone();
                let source = Arc::clone(&self.content);
                log::debug!("fetching {request:?}");
                thread::spawn(move || {
                    let response = content::fetch(source.as_ref(), request);
                    let _ = tx.send(AppEvent::Content(ticket, response));
                });
            }
            None => {
                let response = content::fetch(self.content.as_ref(), request);
                self.apply_response(ticket, response);
            }
        }
    }

    /// Deliver a finished fetch. Responses for a screen the user already left
    /// are dropped.
    pub fn apply_response(&mut self, ticket: FetchTicket, response: ContentResponse) {
        let guard = match response {
            ContentResponse::Quiz(..)
            | ContentResponse::ListeningSet(..)
            | ContentResponse::Workout(..) => &self.open_fetch,
            _ => &self.list_fetch,
        };
        if !guard.is_current(ticket) {
            log::debug!("dropping stale content response");
            return;
        }

        match response {
            ContentResponse::Quizzes(result) => match result {
                Ok(list) => self.quiz_list = list,
                Err(e) => self.fail(&e),
            },
            ContentResponse::ListeningSets(result) => match result {
                Ok(list) => self.listening_list = list,
                Err(e) => self.fail(&e),
            },
            ContentResponse::Workouts(result) => match result {
                Ok(list) => self.workout_list = list,
                Err(e) => self.fail(&e),
            },
            ContentResponse::Articles(result) => match result {
                Ok(list) => self.articles = list,
                Err(e) => {
                    self.articles.clear();
                    self.fail(&e);
                }
            },
            ContentResponse::Quiz(id, result) => self.opened_quiz(Activity::Quiz(id), result),
            ContentResponse::ListeningSet(id, result) => {
                self.opened_quiz(Activity::Listening(id), result)
            }
            ContentResponse::Workout(_, result) => match result {
                Ok(workout) => self.begin_workout(workout),
                Err(e) => {
                    self.screen = AppScreen::Home;
                    self.fail(&e);
                }
            },
        }
        let len = self.home_items().len();
        self.list_selected = self.list_selected.min(len.saturating_sub(1));
    }

    // --- opening activities ---

    pub fn open_selected(&mut self) {
        let idx = self.list_selected;
        let activity = match self.current_tab() {
            Tab::Quizzes => self.quiz_list.get(idx).map(|q| Activity::Quiz(q.id.clone())),
            Tab::Listening => self
                .listening_list
                .get(idx)
                .map(|q| Activity::Listening(q.id.clone())),
            Tab::Workouts => self
                .workout_list
                .get(idx)
                .map(|w| Activity::Workout(w.id.clone())),
            Tab::KnowledgeBase => {
                if idx < self.articles.len() {
                    self.screen = AppScreen::Article;
                }
                None
            }
        };
        if let Some(activity) = activity {
            self.open(activity);
        }
    }

    pub fn open(&mut self, activity: Activity) {
        self.notice = None;
        self.loading_what = activity.slot_id();
        self.screen = AppScreen::Loading;
        let ticket = self.open_fetch.issue();
        self.dispatch(ticket, activity.request());
    }

    fn opened_quiz(&mut self, activity: Activity, result: Result<QuizDefinition, AppError>) {
        let definition = match result.and_then(|d| d.validate().map(|()| d)) {
            Ok(d) => d,
            Err(e) => {
                self.screen = AppScreen::Home;
                self.fail(&e);
                return;
            }
        };

        let slot_id = activity.slot_id();
        let restored = self
            .store
            .load(&slot_id, activity.session_kind())
            .and_then(|s| QuizSession::restore(&slot_id, s.data));
        self.pending = Some(Pending::Quiz(activity, definition));
        match restored {
            Some(session) => {
                self.resumable = Some(Resumable::Quiz(session));
                self.screen = AppScreen::ResumePrompt;
            }
            None => self.begin_pending(),
        }
    }

    fn begin_workout(&mut self, workout: WorkoutDefinition) {
        let restored = self
            .store
            .load(&workout.id, SessionKind::Workout)
            .and_then(|s| WorkoutSession::restore(&workout, s.data));
        self.pending = Some(Pending::Workout(workout));
        match restored {
            Some(session) => {
                self.resumable = Some(Resumable::Workout(session));
                self.screen = AppScreen::ResumePrompt;
            }
            None => self.begin_pending(),
        }
    }

    /// Title of the activity waiting behind the resume prompt.
    pub fn resume_title(&self) -> Option<String> {
        match self.pending.as_ref()? {
            Pending::Quiz(_, def) => Some(def.title.clone()),
            Pending::Workout(w) => Some(w.title.clone()),
        }
    }

    /// Progress line for the resume prompt.
    pub fn resume_progress(&self) -> Option<String> {
        match (self.resumable.as_ref()?, self.pending.as_ref()?) {
            (Resumable::Quiz(q), _) => Some(format!(
                "{} of {} answered, {} correct",
                q.answers.len(),
                q.total(),
                q.score
            )),
            (Resumable::Workout(w), Pending::Workout(def)) => Some(format!(
                "{} of {} exercises done",
                w.completed_exercises,
                def.total_exercises()
            )),
            _ => None,
        }
    }

    pub fn resume(&mut self) {
        match self.resumable.take() {
            Some(Resumable::Quiz(session)) => {
                self.pending = None;
                log::info!("resuming quiz {}", session.quiz_id);
                self.enter_quiz(session);
            }
            Some(Resumable::Workout(session)) => {
                if let Some(Pending::Workout(def)) = self.pending.take() {
                    log::info!("resuming workout {}", def.id);
                    self.workout = Some((def, session));
                    self.screen = AppScreen::Workout;
                }
            }
            None => self.begin_pending(),
        }
    }

    /// The user chose to start over: drop the checkpoint for the pending
    /// activity, then begin it.
    pub fn start_fresh(&mut self) {
        self.resumable = None;
        if let Some(previous) = self.store.peek() {
            log::info!(
                "discarding unfinished {} session {}",
                previous.kind.as_str(),
                previous.id
            );
        }
        if let Err(e) = self.store.clear() {
            log::warn!("could not clear session slot: {e}");
        }
        self.begin_pending();
    }

    /// Id of an unexpired checkpoint belonging to some other activity. It is
    /// only overwritten once the new activity makes progress.
    fn unfinished_elsewhere(&self, slot_id: &str, kind: SessionKind) -> Option<String> {
        let previous = self.store.peek()?;
        if previous.id == slot_id && previous.kind == kind {
            return None;
        }
        self.store.load(&previous.id, previous.kind).map(|s| s.id)
    }

    /// Begin the pending activity from the start. The slot is left alone.
    fn begin_pending(&mut self) {
        self.resumable = None;
        let mut notes = Vec::new();

        match self.pending.take() {
            Some(Pending::Quiz(activity, definition)) => {
                let slot_id = activity.slot_id();
                if let Some(other) = self.unfinished_elsewhere(&slot_id, SessionKind::Quiz) {
                    notes.push(format!("Answering will replace your unfinished {other}"));
                }
                let mut session = QuizSession::started(&definition, &slot_id);
                if matches!(activity, Activity::Quiz(_)) {
                    let skipped = apply_type_exclusion(&mut session, &self.preferences);
                    if skipped > 0 {
                        notes.push(format!("Skipping {skipped} listening question(s)"));
                    }
                }
                self.enter_quiz(session);
            }
            Some(Pending::Workout(def)) => {
                let session = WorkoutSession::start(&def);
                if session.is_complete(&def) {
                    self.info("This workout has no exercises");
                    self.screen = AppScreen::Home;
                    return;
                }
                if let Some(other) = self.unfinished_elsewhere(&def.id, SessionKind::Workout) {
                    notes.push(format!(
                        "Finishing an exercise will replace your unfinished {other}"
                    ));
                }
                self.workout = Some((def, session));
                self.screen = AppScreen::Workout;
            }
            None => self.screen = AppScreen::Home,
        }

        if !notes.is_empty() {
            self.info(notes.join(". "));
        }
    }

    /// Clear the slot only if it still holds `id`.
    fn release_slot(&mut self, id: &str, kind: SessionKind) {
        if !self.store.peek().is_some_and(|s| s.id == id && s.kind == kind) {
            return;
        }
        if let Err(e) = self.store.clear() {
            log::warn!("could not clear session slot: {e}");
        }
    }

    fn enter_quiz(&mut self, session: QuizSession) {
        let completed = session.phase == SessionPhase::Completed;
        self.quiz = Some(session);
        if completed {
            self.show_summary();
            return;
        }
        self.screen = AppScreen::Quiz;
        self.prepare_question();
    }

    /// Reset per-question input. A question already answered (resumed right
    /// after submitting) comes back showing its feedback.
    fn prepare_question(&mut self) {
        self.text_input.clear();
        self.choice_selected = 0;
        self.quiz_stage = QuizStage::Answering;

        let Some(session) = &self.quiz else {
            return;
        };
        let Some(question) = session.current_question() else {
            return;
        };
        if let Some(record) = session.current_answer() {
            self.quiz_stage = QuizStage::Feedback(AnswerOutcome {
                is_correct: record.is_correct,
                correct_answer: question.correct_answer_text(),
                explanation: question.explanation.clone(),
            });
        }
        self.matching = match &question.body {
            QuestionBody::Matching { pairs } => {
                let rng = self.config.shuffle_matching.then_some(&mut self.rng);
                MatchingInput::new(pairs, rng)
            }
            _ => MatchingInput::default(),
        };
    }

    // --- answering ---

    pub fn current_question(&self) -> Option<&Question> {
        self.quiz.as_ref()?.current_question()
    }

    pub fn current_kind(&self) -> Option<QuestionKind> {
        self.current_question().map(Question::kind)
    }

    /// Build a response from the input state for the current question.
    fn pending_response(&self) -> Option<Response> {
        match &self.current_question()?.body {
            QuestionBody::MultipleChoice { .. } => Some(Response::Choice(self.choice_selected)),
            QuestionBody::TrueFalse { .. } => None,
            QuestionBody::FillInTheBlank { .. } | QuestionBody::Listening { .. } => {
                Some(Response::Text(self.text_input.clone()))
            }
            QuestionBody::Matching { .. } => self.matching.response().map(Response::Matches),
        }
    }

    pub fn submit_current(&mut self) {
        match self.pending_response() {
            Some(response) => self.submit(response),
            None if self.current_kind() == Some(QuestionKind::Matching) => {
                self.info("Match every item before submitting");
            }
            None => {}
        }
    }

    pub fn submit(&mut self, response: Response) {
        let Some(session) = self.quiz.as_mut() else {
            return;
        };
        match session.submit_answer(response) {
            Ok(outcome) => {
                self.notice = None;
                self.quiz_stage = QuizStage::Feedback(outcome);
                self.checkpoint();
            }
            Err(e) => self.info(e.to_string()),
        }
    }

    fn option_count(&self) -> Option<usize> {
        match &self.current_question()?.body {
            QuestionBody::MultipleChoice { options, .. } => Some(options.len()),
            _ => None,
        }
    }

    pub fn choose(&mut self, index: usize) {
        if self.option_count().is_some_and(|n| index < n) {
            self.choice_selected = index;
            self.submit(Response::Choice(index));
        }
    }

    pub fn move_choice(&mut self, down: bool) {
        if let Some(n) = self.option_count() {
            self.choice_selected = if down {
                (self.choice_selected + 1).min(n.saturating_sub(1))
            } else {
                self.choice_selected.saturating_sub(1)
            };
        }
    }

    /// Move past the feedback for the current question.
    pub fn next_question(&mut self) {
        if !matches!(self.quiz_stage, QuizStage::Feedback(_)) {
            return;
        }
        let Some(session) = self.quiz.as_mut() else {
            return;
        };
        match session.advance() {
            Ok(SessionPhase::Completed) => {
                self.checkpoint();
                self.show_summary();
            }
            Ok(_) => {
                self.checkpoint();
                self.prepare_question();
            }
            Err(e) => self.info(e.to_string()),
        }
    }

    fn show_summary(&mut self) {
        if let Some(session) = &self.quiz {
            self.last_summary = Some(QuizSummary::from_session(session));
        }
        self.screen = AppScreen::QuizSummary;
    }

    /// Write the in-progress quiz to the slot. Failures never interrupt the
    /// quiz.
    fn checkpoint(&mut self) {
        let Some(session) = &self.quiz else {
            return;
        };
        let result = session
            .snapshot()
            .map_err(anyhow::Error::from)
            .and_then(|data| self.store.save(&session.quiz_id, SessionKind::Quiz, data));
        if let Err(e) = result {
            log::warn!("checkpoint of {} failed: {e}", session.quiz_id);
        }
    }

    // --- summary ---

    /// Start a pass over the mistakes of the pass just completed.
    pub fn retry_mistakes(&mut self) {
        let Some(prior) = &self.quiz else {
            return;
        };
        let mut retry = build_retry_session(prior);
        // Inert for a retry pass; kept so the gate is the only place deciding.
        apply_type_exclusion(&mut retry, &self.preferences);
        if retry.total() == 0 {
            self.info("Nothing to retry: no mistakes in this round");
            return;
        }
        self.record_history();
        log::info!(
            "retrying {} mistake(s) from {}",
            retry.total(),
            retry.quiz_id
        );
        self.quiz = Some(retry);
        self.checkpoint();
        self.screen = AppScreen::Quiz;
        self.prepare_question();
    }

    /// The user has seen the summary: finish the pass and forget the
    /// checkpoint.
    pub fn acknowledge_summary(&mut self) {
        if let Some(session) = self.quiz.as_mut() {
            if let Err(e) = session.finish() {
                log::warn!("finishing quiz: {e}");
            }
        }
        self.record_history();
        if let Some(session) = self.quiz.take() {
            self.release_slot(&session.quiz_id, SessionKind::Quiz);
        }
        self.go_home();
    }

    fn record_history(&mut self) {
        let Some(summary) = self.last_summary.take() else {
            return;
        };
        if let Err(e) = self.store.append_quiz_result(summary) {
            log::warn!("could not save quiz result: {e}");
        }
    }

    // --- workouts ---

    pub fn complete_exercise(&mut self) {
        let Some((def, session)) = self.workout.as_mut() else {
            return;
        };
        let done = session.complete_exercise(def);
        if done {
            log::info!("workout {} complete", def.id);
            let title = def.title.clone();
            let id = def.id.clone();
            self.workout = None;
            self.release_slot(&id, SessionKind::Workout);
            self.go_home();
            self.info(format!("Finished {title}"));
            return;
        }
        let result = session
            .snapshot()
            .map_err(anyhow::Error::from)
            .and_then(|data| self.store.save(&def.id, SessionKind::Workout, data));
        if let Err(e) = result {
            log::warn!("checkpoint of workout {} failed: {e}", def.id);
        }
    }

    // --- navigation & settings ---

    /// Back to the home screen. Any checkpoint stays in the slot and any
    /// fetch still in flight for the old screen is ignored.
    pub fn go_home(&mut self) {
        self.open_fetch.invalidate();
        self.pending = None;
        self.resumable = None;
        self.screen = AppScreen::Home;
        self.refresh_list();
    }

    pub fn leave_activity(&mut self) {
        self.quiz = None;
        self.workout = None;
        self.go_home();
    }

    pub fn toggle_skip_listening(&mut self) {
        self.preferences.skip_listening = !self.preferences.skip_listening;
        if let Err(e) = self.store.save_preferences(&self.preferences) {
            self.fail(&AppError::Unexpected(e.to_string()));
            return;
        }
        self.info(if self.preferences.skip_listening {
            "Listening questions will be skipped in new quizzes"
        } else {
            "Listening questions will be included"
        });
    }

    pub fn toggle_sign_in(&mut self) {
        let tab = self.current_tab();
        if self.auth.is_signed_in() {
            self.auth = AuthState::default();
            self.articles.clear();
            self.info("Signed out");
        } else {
            self.auth = AuthState::signed_in(&self.user_name);
            self.info(format!("Signed in as {}", self.user_name));
        }
        let tabs = self.tabs();
        self.tab_index = tabs
            .iter()
            .position(|t| *t == tab)
            .or_else(|| tabs.iter().position(|t| *t == Tab::Quizzes))
            .unwrap_or(0);
        self.list_selected = 0;
        self.refresh_list();
    }

    pub fn delete_selected_quiz(&mut self) {
        if !self.flags.content_editing || self.current_tab() != Tab::Quizzes {
            return;
        }
        let Some(listing) = self.quiz_list.get(self.list_selected).cloned() else {
            return;
        };
        if listing.is_sample {
            self.info("Sample quizzes cannot be deleted");
            return;
        }
        match self.content.delete_quiz(&listing.id) {
            Ok(()) => {
                self.release_slot(&listing.id, SessionKind::Quiz);
                self.info(format!("Deleted {}", listing.title));
                self.refresh_list();
            }
            Err(e) => self.fail(&e),
        }
    }

    pub fn selected_article(&self) -> Option<&Article> {
        self.articles.get(self.list_selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppResult;
    use crate::session::workout::{Exercise, WorkoutPhase};
    use crate::store::MemorySlot;
    use crate::store::json_store::JsonStore;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn mc(id: &str, correct: usize) -> Question {
        Question {
            id: id.to_string(),
            prompt: format!("{id}?"),
            explanation: Some(format!("because {id}")),
            body: QuestionBody::MultipleChoice {
                options: vec!["a".into(), "b".into(), "c".into()],
                correct_answer_index: correct,
            },
        }
    }

    fn listening(id: &str, answer: &str) -> Question {
        Question {
            id: id.to_string(),
            prompt: "Type what you hear".to_string(),
            explanation: None,
            body: QuestionBody::Listening {
                audio_text: answer.to_string(),
                correct_answer: answer.to_string(),
                acceptable_answers: vec![],
            },
        }
    }

    fn quiz(questions: Vec<Question>) -> QuizDefinition {
        QuizDefinition {
            title: "Mixed".to_string(),
            description: String::new(),
            language: "es-ES".to_string(),
            questions,
        }
    }

    /// Serves one quiz and counts deletes.
    struct StubSource {
        quiz: QuizDefinition,
        deleted: Mutex<Vec<String>>,
    }

    impl ContentSource for StubSource {
        fn fetch_quizzes(&self, _sample_only: bool) -> AppResult<Vec<QuizListing>> {
            Ok(vec![QuizListing {
                id: "mixed".to_string(),
                title: self.quiz.title.clone(),
                description: String::new(),
                is_sample: false,
            }])
        }
        fn fetch_quiz_by_id(&self, id: &str) -> AppResult<QuizDefinition> {
            match id {
                "mixed" => Ok(self.quiz.clone()),
                "other" => Ok(quiz(vec![mc("o1", 0), mc("o2", 0)])),
                _ => Err(AppError::NotFound(format!("quiz {id}"))),
            }
        }
        fn fetch_listening_sets(&self) -> AppResult<Vec<QuizListing>> {
            Ok(vec![])
        }
        fn fetch_listening_set_by_id(&self, id: &str) -> AppResult<QuizDefinition> {
            Err(AppError::NotFound(id.to_string()))
        }
        fn fetch_workouts(&self) -> AppResult<Vec<WorkoutListing>> {
            Err(AppError::Network("offline".to_string()))
        }
        fn fetch_workout_by_id(&self, id: &str) -> AppResult<WorkoutDefinition> {
            if id != "stretch" {
                return Err(AppError::NotFound(id.to_string()));
            }
            let exercise = |name: &str| Exercise {
                name: name.to_string(),
                duration_secs: Some(30),
                reps: None,
                notes: None,
            };
            Ok(WorkoutDefinition {
                id: id.to_string(),
                title: "Stretch".to_string(),
                description: String::new(),
                phases: vec![WorkoutPhase {
                    name: "Main".to_string(),
                    exercises: vec![exercise("reach"), exercise("fold")],
                }],
            })
        }
        fn fetch_articles(&self, auth: &AuthState) -> AppResult<Vec<Article>> {
            if auth.is_signed_in() {
                Ok(vec![Article {
                    id: "a".to_string(),
                    title: "A".to_string(),
                    body: "body".to_string(),
                }])
            } else {
                Err(AppError::Auth("no user".to_string()))
            }
        }
        fn create_quiz(&self, _quiz: &QuizDefinition) -> AppResult<String> {
            Ok("new".to_string())
        }
        fn update_quiz(&self, _id: &str, _quiz: &QuizDefinition) -> AppResult<()> {
            Ok(())
        }
        fn delete_quiz(&self, id: &str) -> AppResult<()> {
            self.deleted.lock().unwrap().push(id.to_string());
            Ok(())
        }
    }

    fn make_app(dir: &TempDir, questions: Vec<Question>) -> App {
        let store = JsonStore::with_base_dir(dir.path().to_path_buf()).unwrap();
        app_over(store, questions)
    }

    fn app_over(store: impl ProgressStore + 'static, questions: Vec<Question>) -> App {
        let source = Arc::new(StubSource {
            quiz: quiz(questions),
            deleted: Mutex::new(Vec::new()),
        });
        let config = Config {
            shuffle_matching: false,
            ..Config::default()
        };
        App::new(config, store, source, None, None)
    }

    fn reopen(dir: &TempDir) -> JsonStore {
        JsonStore::with_base_dir(dir.path().to_path_buf()).unwrap()
    }

    #[test]
    fn starts_on_quizzes_tab_with_list_loaded() {
        let dir = TempDir::new().unwrap();
        let app = make_app(&dir, vec![mc("q1", 0)]);
        assert_eq!(app.current_tab(), Tab::Quizzes);
        assert_eq!(app.home_items().len(), 1);
    }

    #[test]
    fn answering_checkpoints_and_completion_shows_summary() {
        let dir = TempDir::new().unwrap();
        let mut app = make_app(&dir, vec![mc("q1", 0), mc("q2", 1)]);
        app.open(Activity::Quiz("mixed".into()));
        assert_eq!(app.screen, AppScreen::Quiz);

        app.choose(0);
        assert!(matches!(app.quiz_stage, QuizStage::Feedback(ref o) if o.is_correct));
        let saved = reopen(&dir).load("mixed", SessionKind::Quiz).unwrap();
        assert_eq!(saved.data["answers"].as_array().unwrap().len(), 1);

        app.next_question();
        app.choose(0);
        app.next_question();
        assert_eq!(app.screen, AppScreen::QuizSummary);
        let summary = app.last_summary.clone().unwrap();
        assert_eq!((summary.score, summary.total, summary.percentage), (1, 2, 50));

        // Slot is kept until the summary is acknowledged.
        assert!(reopen(&dir).peek().is_some());
        app.acknowledge_summary();
        assert_eq!(app.screen, AppScreen::Home);
        assert!(reopen(&dir).peek().is_none());
        assert_eq!(app.store.load_quiz_history().results.len(), 1);
    }

    #[test]
    fn second_submit_on_same_question_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut app = make_app(&dir, vec![mc("q1", 0), mc("q2", 0)]);
        app.open(Activity::Quiz("mixed".into()));
        app.choose(1);
        app.choose(0);
        let session = app.quiz.as_ref().unwrap();
        assert_eq!(session.answers.len(), 1);
        assert_eq!(session.score, 0);
        assert!(app.notice.is_some());
    }

    #[test]
    fn leaving_keeps_checkpoint_and_reopening_offers_resume() {
        let dir = TempDir::new().unwrap();
        let mut app = make_app(&dir, vec![mc("q1", 0), mc("q2", 0), mc("q3", 0)]);
        app.open(Activity::Quiz("mixed".into()));
        app.choose(0);
        app.next_question();
        app.leave_activity();
        assert!(app.quiz.is_none());

        app.open(Activity::Quiz("mixed".into()));
        assert_eq!(app.screen, AppScreen::ResumePrompt);
        assert_eq!(app.resume_progress().unwrap(), "1 of 3 answered, 1 correct");
        app.resume();
        let session = app.quiz.as_ref().unwrap();
        assert_eq!(session.current_index, 1);
        assert_eq!(session.score, 1);
        assert_eq!(app.quiz_stage, QuizStage::Answering);
    }

    #[test]
    fn opening_another_quiz_keeps_unfinished_checkpoint() {
        let dir = TempDir::new().unwrap();
        let mut app = make_app(&dir, vec![mc("q1", 0), mc("q2", 0)]);
        app.open(Activity::Quiz("mixed".into()));
        app.choose(0);
        app.leave_activity();

        app.open(Activity::Quiz("other".into()));
        assert_eq!(app.screen, AppScreen::Quiz);
        assert!(app.notice.as_ref().unwrap().text.contains("unfinished mixed"));
        app.leave_activity();
        assert!(reopen(&dir).load("mixed", SessionKind::Quiz).is_some());

        app.open(Activity::Quiz("mixed".into()));
        assert_eq!(app.screen, AppScreen::ResumePrompt);
        app.resume();
        assert_eq!(app.quiz.as_ref().unwrap().score, 1);
    }

    #[test]
    fn opening_a_workout_keeps_unfinished_quiz() {
        let dir = TempDir::new().unwrap();
        let mut app = make_app(&dir, vec![mc("q1", 0), mc("q2", 0)]);
        app.open(Activity::Quiz("mixed".into()));
        app.choose(0);
        app.leave_activity();

        app.open(Activity::Workout("stretch".into()));
        assert_eq!(app.screen, AppScreen::Workout);
        assert!(app.notice.as_ref().unwrap().text.contains("unfinished mixed"));
        app.leave_activity();

        app.open(Activity::Quiz("mixed".into()));
        assert_eq!(app.screen, AppScreen::ResumePrompt);

        // Progress in the workout is what finally takes the slot.
        app.go_home();
        app.open(Activity::Workout("stretch".into()));
        app.complete_exercise();
        assert!(reopen(&dir).load("mixed", SessionKind::Quiz).is_none());
        assert!(reopen(&dir).load("stretch", SessionKind::Workout).is_some());
    }

    #[test]
    fn in_memory_store_drives_the_same_lifecycle() {
        let mut app = app_over(MemorySlot::new(), vec![mc("q1", 0), mc("q2", 0)]);
        app.toggle_skip_listening();
        assert!(app.store.load_preferences().skip_listening);

        app.open(Activity::Quiz("mixed".into()));
        app.choose(0);
        app.leave_activity();
        assert!(app.store.load("mixed", SessionKind::Quiz).is_some());

        app.open(Activity::Quiz("mixed".into()));
        app.resume();
        app.next_question();
        app.choose(0);
        app.next_question();
        app.acknowledge_summary();
        assert!(app.store.peek().is_none());
        assert_eq!(app.store.load_quiz_history().results.len(), 1);
    }

    #[test]
    fn resume_right_after_submitting_shows_feedback() {
        let dir = TempDir::new().unwrap();
        let mut app = make_app(&dir, vec![mc("q1", 2), mc("q2", 0)]);
        app.open(Activity::Quiz("mixed".into()));
        app.choose(0);
        app.leave_activity();

        app.open(Activity::Quiz("mixed".into()));
        app.resume();
        assert!(matches!(app.quiz_stage, QuizStage::Feedback(ref o) if !o.is_correct));
        app.next_question();
        assert_eq!(app.quiz.as_ref().unwrap().current_index, 1);
    }

    #[test]
    fn start_fresh_discards_checkpoint() {
        let dir = TempDir::new().unwrap();
        let mut app = make_app(&dir, vec![mc("q1", 0), mc("q2", 0)]);
        app.open(Activity::Quiz("mixed".into()));
        app.choose(0);
        app.leave_activity();

        app.open(Activity::Quiz("mixed".into()));
        app.start_fresh();
        assert_eq!(app.screen, AppScreen::Quiz);
        assert!(app.quiz.as_ref().unwrap().answers.is_empty());
        assert!(reopen(&dir).peek().is_none());
    }

    #[test]
    fn skip_listening_applies_to_fresh_quiz_only() {
        let dir = TempDir::new().unwrap();
        let questions = vec![mc("q1", 0), listening("l1", "hola"), mc("q2", 0)];
        let mut app = make_app(&dir, questions);
        app.toggle_skip_listening();
        assert!(reopen(&dir).load_preferences().skip_listening);

        app.open(Activity::Quiz("mixed".into()));
        assert_eq!(app.quiz.as_ref().unwrap().total(), 2);
    }

    #[test]
    fn retry_keeps_listening_mistakes_with_skip_enabled() {
        let dir = TempDir::new().unwrap();
        let questions = vec![mc("q1", 0), listening("l1", "hola"), listening("l2", "adios")];
        let mut app = make_app(&dir, questions);

        app.open(Activity::Quiz("mixed".into()));
        app.choose(1);
        app.next_question();
        app.submit(Response::Text("nope".into()));
        app.next_question();
        app.submit(Response::Text("adiós".into()));
        app.next_question();
        assert_eq!(app.screen, AppScreen::QuizSummary);

        app.toggle_skip_listening();
        app.retry_mistakes();
        let retry = app.quiz.as_ref().unwrap();
        assert!(retry.mistakes_only);
        let ids: Vec<&str> = retry.questions.iter().map(|q| q.id.as_str()).collect();
        assert_eq!(ids, vec!["q1", "l1"]);
        assert_eq!(app.screen, AppScreen::Quiz);
        assert_eq!(app.store.load_quiz_history().results.len(), 1);
    }

    #[test]
    fn retry_with_no_mistakes_reports_nothing_to_retry() {
        let dir = TempDir::new().unwrap();
        let mut app = make_app(&dir, vec![mc("q1", 0)]);
        app.open(Activity::Quiz("mixed".into()));
        app.choose(0);
        app.next_question();
        app.retry_mistakes();
        assert_eq!(app.screen, AppScreen::QuizSummary);
        assert!(app.notice.as_ref().unwrap().text.contains("Nothing to retry"));
    }

    #[test]
    fn invalid_quiz_is_reported_not_started() {
        let dir = TempDir::new().unwrap();
        let mut app = make_app(&dir, vec![mc("q1", 7)]);
        app.open(Activity::Quiz("mixed".into()));
        assert_eq!(app.screen, AppScreen::Home);
        assert!(app.quiz.is_none());
        assert_eq!(app.notice.as_ref().unwrap().level, NoticeLevel::Error);
    }

    #[test]
    fn stale_open_response_is_dropped() {
        let dir = TempDir::new().unwrap();
        let mut app = make_app(&dir, vec![mc("q1", 0)]);
        let ticket = app.open_fetch.issue();
        app.go_home();
        app.apply_response(ticket, ContentResponse::Quiz("mixed".into(), Ok(quiz(vec![mc("q1", 0)]))));
        assert_eq!(app.screen, AppScreen::Home);
        assert!(app.quiz.is_none());
    }

    #[test]
    fn failed_fetch_leaves_session_untouched() {
        let dir = TempDir::new().unwrap();
        let mut app = make_app(&dir, vec![mc("q1", 0)]);
        app.open(Activity::Workout("legs".into()));
        assert_eq!(app.screen, AppScreen::Home);
        assert!(app.workout.is_none());
        assert!(app.notice.is_some());
    }

    #[test]
    fn sign_in_and_out_toggle_knowledge_base() {
        let dir = TempDir::new().unwrap();
        let mut app = make_app(&dir, vec![mc("q1", 0)]);
        assert!(!app.tabs().contains(&Tab::KnowledgeBase));
        app.toggle_sign_in();
        assert!(app.tabs().contains(&Tab::KnowledgeBase));
        assert_eq!(app.current_tab(), Tab::Quizzes);

        app.prev_tab();
        assert_eq!(app.current_tab(), Tab::KnowledgeBase);
        assert_eq!(app.articles.len(), 1);

        app.toggle_sign_in();
        assert!(!app.tabs().contains(&Tab::KnowledgeBase));
        assert!(app.articles.is_empty());
        assert_eq!(app.current_tab(), Tab::Quizzes);
    }

    #[test]
    fn network_error_on_list_shows_notice() {
        let dir = TempDir::new().unwrap();
        let mut app = make_app(&dir, vec![mc("q1", 0)]);
        while app.current_tab() != Tab::Workouts {
            app.next_tab();
        }
        let notice = app.notice.clone().unwrap();
        assert_eq!(notice.level, NoticeLevel::Error);
        assert!(notice.text.contains("try again"));
    }

    #[test]
    fn deleting_quiz_clears_its_checkpoint() {
        let dir = TempDir::new().unwrap();
        let mut app = make_app(&dir, vec![mc("q1", 0), mc("q2", 0)]);
        app.open(Activity::Quiz("mixed".into()));
        app.choose(0);
        app.leave_activity();
        assert!(reopen(&dir).peek().is_some());

        app.delete_selected_quiz();
        assert!(reopen(&dir).peek().is_none());
    }

    #[test]
    fn matching_requires_every_item() {
        let dir = TempDir::new().unwrap();
        let matching = Question {
            id: "m".to_string(),
            prompt: "Match".to_string(),
            explanation: None,
            body: QuestionBody::Matching {
                pairs: vec![MatchPair::new("uno", "one"), MatchPair::new("dos", "two")],
            },
        };
        let mut app = make_app(&dir, vec![matching]);
        app.open(Activity::Quiz("mixed".into()));

        app.matching.cycle(true);
        app.submit_current();
        assert_eq!(app.quiz_stage, QuizStage::Answering);

        app.matching.move_cursor(true);
        app.matching.cycle(true);
        app.matching.cycle(true);
        app.submit_current();
        assert!(matches!(app.quiz_stage, QuizStage::Feedback(ref o) if o.is_correct));
    }
}
