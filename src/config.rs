use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::tabs::FeatureFlags;
use crate::ui::theme::{DEFAULT_THEME, Theme};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default = "default_knowledge_base_enabled")]
    pub knowledge_base_enabled: bool,
    #[serde(default = "default_content_editing_enabled")]
    pub content_editing_enabled: bool,
    #[serde(default = "default_sample_quizzes_only")]
    pub sample_quizzes_only: bool,
    /// Base URL of an HTTP content server. Empty means the local library.
    #[serde(default)]
    pub remote_url: String,
    #[serde(default = "default_shuffle_matching")]
    pub shuffle_matching: bool,
}

fn default_theme() -> String {
    DEFAULT_THEME.to_string()
}
fn default_knowledge_base_enabled() -> bool {
    true
}
fn default_content_editing_enabled() -> bool {
    true
}
fn default_sample_quizzes_only() -> bool {
    false
}
fn default_shuffle_matching() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            theme: default_theme(),
            knowledge_base_enabled: default_knowledge_base_enabled(),
            content_editing_enabled: default_content_editing_enabled(),
            sample_quizzes_only: default_sample_quizzes_only(),
            remote_url: String::new(),
            shuffle_matching: default_shuffle_matching(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        if path.exists() {
            let content = fs::read_to_string(&path)?;
            let mut config: Config = toml::from_str(&content)?;
            config.validate(&Theme::available_themes());
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    #[allow(dead_code)]
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        Ok(())
    }

    fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("quizdeck")
            .join("config.toml")
    }

    /// Reset values a hand-edited file may have broken. User themes are
    /// checked at load time by the theme loader, so an unknown theme name is
    /// kept only if a user theme file of that name exists.
    pub fn validate(&mut self, bundled_themes: &[String]) {
        let user_theme_exists = dirs::config_dir()
            .map(|d| {
                d.join("quizdeck")
                    .join("themes")
                    .join(format!("{}.toml", self.theme))
                    .exists()
            })
            .unwrap_or(false);
        if !bundled_themes.contains(&self.theme) && !user_theme_exists {
            log::warn!("unknown theme {:?}, using {DEFAULT_THEME}", self.theme);
            self.theme = default_theme();
        }

        let url = self.remote_url.trim();
        if !url.is_empty() && !(url.starts_with("http://") || url.starts_with("https://")) {
            log::warn!("ignoring remote_url {url:?}: not an http(s) URL");
            self.remote_url.clear();
        } else {
            self.remote_url = url.to_string();
        }
    }

    pub fn feature_flags(&self) -> FeatureFlags {
        FeatureFlags {
            knowledge_base: self.knowledge_base_enabled,
            content_editing: self.content_editing_enabled,
            sample_quizzes_only: self.sample_quizzes_only,
        }
    }
}
