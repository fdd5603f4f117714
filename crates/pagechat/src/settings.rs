//! Persistent user settings
//!
//! Stored as pretty-printed JSON. Fields missing from an older file take
//! their defaults, and `PAGECHAT_API_KEY` / `PAGECHAT_BASE_URL` override
//! whatever the file says.

use crate::error::SettingsError;
use crate::DEFAULT_BASE_URL;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, error};

/// Default settings file, relative to the working directory
pub const DEFAULT_SETTINGS_PATH: &str = "settings.json";

pub const API_KEY_ENV: &str = "PAGECHAT_API_KEY";
pub const BASE_URL_ENV: &str = "PAGECHAT_BASE_URL";

/// User settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// OpenRouter API key; empty means not configured
    pub api_key: String,
    pub base_url: String,
    /// Prepended as a system message when non-empty
    pub system_prompt: String,
    /// Honor `search:` and `url:` commands
    pub enable_web_search: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            system_prompt: String::new(),
            enable_web_search: true,
        }
    }
}

impl Settings {
    /// Load settings from `path`
    ///
    /// A missing file yields defaults. So does an unreadable or corrupt one,
    /// after logging the problem.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "No settings file, using defaults");
            return Self::default();
        }

        match Self::read(path) {
            Ok(settings) => settings,
            Err(e) => {
                error!(path = %path.display(), error = %e, "Error loading settings");
                Self::default()
            }
        }
    }

    fn read(path: &Path) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Write settings to `path`
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// [`save`](Self::save), reported as a status line for the user
    pub fn save_message(&self, path: impl AsRef<Path>) -> String {
        match self.save(path) {
            Ok(()) => "Settings saved successfully!".to_string(),
            Err(e) => format!("Error saving settings: {e}"),
        }
    }

    /// Apply `PAGECHAT_API_KEY` and `PAGECHAT_BASE_URL` from the environment
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides from `lookup`; unset or empty values are ignored
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty(API_KEY_ENV) {
            debug!("API key taken from environment");
            self.api_key = key;
        }
        if let Some(url) = non_empty(BASE_URL_ENV) {
            debug!(base_url = %url, "Base URL taken from environment");
            self.base_url = url;
        }
        self
    }

    pub fn has_api_key(&self) -> bool {
        is_api_key_set(&self.api_key)
    }
}

/// Whether `key` holds anything besides whitespace
pub fn is_api_key_set(key: &str) -> bool {
    !key.trim().is_empty()
}
