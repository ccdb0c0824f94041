//! Runtime configuration.
//!
//! Values come from built-in defaults, then an optional TOML file, then
//! environment variables, each layer overriding the previous one.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "branchcanvas.toml";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-3-pro-image-preview";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_USER_ID: &str = "local";

#[derive(Debug, Clone, PartialEq)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_GEMINI_MODEL.to_string(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Database path or URL; `None` uses `branchcanvas.db`.
    pub database: Option<String>,
    /// Profile charged for generations.
    pub user_id: String,
    pub gemini: GeminiConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: None,
            user_id: DEFAULT_USER_ID.to_string(),
            gemini: GeminiConfig::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    database: Option<String>,
    user_id: Option<String>,
    gemini: FileGeminiConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileGeminiConfig {
    api_key: Option<String>,
    model: Option<String>,
    base_url: Option<String>,
    timeout_secs: Option<u64>,
}

impl AppConfig {
    /// Load defaults, the config file and the environment.
    ///
    /// An explicit `path` must exist; otherwise `branchcanvas.toml` in the
    /// working directory is read when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let base = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        Ok(base.with_overrides(&Self::env_values()))
    }

    pub fn from_env() -> Self {
        Self::from_map(&Self::env_values())
    }

    pub fn from_map(values: &HashMap<String, String>) -> Self {
        Self::default().with_overrides(values)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let file: FileConfig = toml::from_str(raw)?;
        let defaults = Self::default();

        Ok(Self {
            database: file.database.or(defaults.database),
            user_id: file.user_id.unwrap_or(defaults.user_id),
            gemini: GeminiConfig {
                api_key: file.gemini.api_key.filter(|key| !key.is_empty()),
                model: file.gemini.model.unwrap_or(defaults.gemini.model),
                base_url: file.gemini.base_url.unwrap_or(defaults.gemini.base_url),
                timeout_secs: file
                    .gemini
                    .timeout_secs
                    .unwrap_or(defaults.gemini.timeout_secs),
            },
        })
    }

    /// Apply non-empty values from `values` on top of `self`.
    pub fn with_overrides(mut self, values: &HashMap<String, String>) -> Self {
        fn read(values: &HashMap<String, String>, key: &str) -> Option<String> {
            values.get(key).cloned().filter(|value| !value.is_empty())
        }

        if let Some(database) = read(values, "BRANCHCANVAS_DATABASE") {
            self.database = Some(database);
        }
        if let Some(user_id) = read(values, "BRANCHCANVAS_USER_ID") {
            self.user_id = user_id;
        }
        if let Some(key) = read(values, "GEMINI_API_KEY").or_else(|| read(values, "API_KEY")) {
            self.gemini.api_key = Some(key);
        }
        if let Some(model) = read(values, "BRANCHCANVAS_GEMINI_MODEL") {
            self.gemini.model = model;
        }
        if let Some(base_url) = read(values, "BRANCHCANVAS_GEMINI_BASE_URL") {
            self.gemini.base_url = base_url;
        }
        if let Some(timeout) = read(values, "BRANCHCANVAS_GENERATION_TIMEOUT_SECS")
            .and_then(|value| value.parse().ok())
        {
            self.gemini.timeout_secs = timeout;
        }
        self
    }

    fn env_values() -> HashMap<String, String> {
        Self::tracked_keys()
            .into_iter()
            .filter_map(|key| std::env::var(key).ok().map(|value| (key.to_string(), value)))
            .collect()
    }

    fn tracked_keys() -> Vec<&'static str> {
        vec![
            "BRANCHCANVAS_DATABASE",
            "BRANCHCANVAS_USER_ID",
            "GEMINI_API_KEY",
            "API_KEY",
            "BRANCHCANVAS_GEMINI_MODEL",
            "BRANCHCANVAS_GEMINI_BASE_URL",
            "BRANCHCANVAS_GENERATION_TIMEOUT_SECS",
        ]
    }
}
