use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub display_name: String,
}

/// Identity as reported by the auth provider at the moment of the call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuthState {
    pub current_user: Option<User>,
}

impl AuthState {
    pub fn signed_in(name: &str) -> Self {
        Self {
            current_user: Some(User {
                id: name.to_lowercase(),
                display_name: name.to_string(),
            }),
        }
    }

    pub fn is_signed_in(&self) -> bool {
        self.current_user.is_some()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeatureFlags {
    pub knowledge_base: bool,
    pub content_editing: bool,
    pub sample_quizzes_only: bool,
}

/// The flags a default configuration produces.
impl Default for FeatureFlags {
    fn default() -> Self {
        crate::config::Config::default().feature_flags()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tab {
    Workouts,
    KnowledgeBase,
    Quizzes,
    Listening,
}

impl Tab {
    pub fn id(self) -> &'static str {
        match self {
            Tab::Workouts => "workouts",
            Tab::KnowledgeBase => "knowledge-base",
            Tab::Quizzes => "quizzes",
            Tab::Listening => "listening",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Tab::Workouts => "Workouts",
            Tab::KnowledgeBase => "Knowledge Base",
            Tab::Quizzes => "Quizzes",
            Tab::Listening => "Listening",
        }
    }

    pub fn is_core(self) -> bool {
        !matches!(self, Tab::KnowledgeBase)
    }
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Visible tabs in display order. Recomputed on every call so sign-in and
/// sign-out take effect immediately.
pub fn enabled_tabs(auth: &AuthState, flags: &FeatureFlags) -> Vec<Tab> {
    let mut tabs = vec![Tab::Workouts];
    if auth.is_signed_in() && flags.knowledge_base {
        tabs.push(Tab::KnowledgeBase);
    }
    tabs.push(Tab::Quizzes);
    tabs.push(Tab::Listening);
    tabs
}

/// Enabled tabs that host practice activities.
pub fn active_core_tabs(auth: &AuthState, flags: &FeatureFlags) -> Vec<Tab> {
    enabled_tabs(auth, flags)
        .into_iter()
        .filter(|t| t.is_core())
        .collect()
}
