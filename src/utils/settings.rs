//! Settings and configuration utilities.
//!
//! This module reads `$HOME/.autoprompt/settings.json`, which stores the
//! provider credentials, prompt configuration, templates, app switches and
//! history, plus an `env` map used as a fallback for environment variables.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::ProviderConfig;
use crate::config::{AppSettings, InjectContext, PromptTemplate};
use crate::history::HistoryItem;
use crate::prompts::UserPromptConfig;

/// Environment variable overriding the API key.
pub const API_KEY_VAR: &str = "AUTOPROMPT_API_KEY";
/// Environment variable overriding the provider id.
pub const PROVIDER_VAR: &str = "AUTOPROMPT_PROVIDER";
/// Environment variable overriding the endpoint.
pub const ENDPOINT_VAR: &str = "AUTOPROMPT_ENDPOINT";
/// Environment variable overriding the model.
pub const MODEL_VAR: &str = "AUTOPROMPT_MODEL";

/// Provider id assumed when none is configured.
pub const DEFAULT_PROVIDER_ID: &str = "openai";

/// Settings loaded from $HOME/.autoprompt/settings.json.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Environment variable overrides.
    pub env: HashMap<String, String>,
    /// Provider credentials as saved by the options page.
    pub provider: ProviderConfig,
    /// Strategy selection, overrides and custom strategies.
    pub prompts: UserPromptConfig,
    /// Saved prompt snippets.
    pub templates: Vec<PromptTemplate>,
    /// Application switches.
    pub app: AppSettings,
    /// Optimization history, newest first.
    pub history: Vec<HistoryItem>,
}

impl Settings {
    /// Loads settings from the default location.
    pub fn load() -> Result<Self> {
        let settings_path = Self::get_settings_path()?;
        Self::load_from_path(&settings_path)
    }

    /// Loads settings from a specific path.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        // A missing file means defaults
        if !path.exists() {
            return Ok(Settings::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;

        serde_json::from_str::<Settings>(&content)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))
    }

    /// Writes settings to a specific path, creating parent directories.
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write settings file: {}", path.display()))
    }

    /// Returns the default settings path.
    pub fn get_settings_path() -> Result<PathBuf> {
        let home_dir = dirs::home_dir().context("Failed to determine home directory")?;

        Ok(home_dir.join(".autoprompt").join("settings.json"))
    }

    /// Returns an environment variable with fallback to settings.
    pub fn get_env_var(&self, key: &str) -> Option<String> {
        match env::var(key) {
            Ok(value) => Some(value),
            Err(_) => self.env.get(key).cloned(),
        }
    }

    /// Provider config with `AUTOPROMPT_*` overrides applied.
    pub fn provider_config(&self) -> ProviderConfig {
        self.provider_config_with(|key| self.get_env_var(key))
    }

    fn provider_config_with(&self, lookup: impl Fn(&str) -> Option<String>) -> ProviderConfig {
        let pick = |key: &str, saved: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| saved.to_string())
        };

        let mut provider_id = pick(PROVIDER_VAR, &self.provider.provider_id);
        if provider_id.trim().is_empty() {
            provider_id = DEFAULT_PROVIDER_ID.to_string();
        }

        ProviderConfig {
            api_key: pick(API_KEY_VAR, &self.provider.api_key),
            provider_id,
            endpoint: pick(ENDPOINT_VAR, &self.provider.endpoint),
            model: pick(MODEL_VAR, &self.provider.model),
        }
    }

    /// Snapshot handed to an injection session.
    pub fn inject_context(&self) -> InjectContext {
        InjectContext {
            provider: self.provider_config(),
            prompts: self.prompts.clone(),
            templates: self.templates.clone(),
            skip_preview: self.app.skip_preview,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn settings_load_from_path() {
        let temp_dir = TempDir::new().unwrap();
        let settings_path = temp_dir.path().join("settings.json");

        let settings_json = r#"{
            "env": { "TEST_VAR": "test_value" },
            "provider": {
                "apiKey": "sk-file",
                "providerId": "anthropic",
                "endpoint": "https://api.anthropic.com/v1",
                "model": "claude-sonnet-4-5"
            },
            "prompts": { "selectedStrategyId": "coding" },
            "app": { "skipPreview": true }
        }"#;
        fs::write(&settings_path, settings_json).unwrap();

        let settings = Settings::load_from_path(&settings_path).unwrap();

        assert_eq!(settings.env.get("TEST_VAR").unwrap(), "test_value");
        assert_eq!(settings.provider.provider_id, "anthropic");
        assert_eq!(settings.prompts.selected_strategy_id, "coding");
        assert!(settings.app.skip_preview);
        assert_eq!(settings.app.max_history_count, 50);
        assert!(settings.templates.is_empty());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let settings = Settings::load_from_path(temp_dir.path().join("absent.json")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn malformed_file_reports_path() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        let err = Settings::load_from_path(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse settings file"));
    }

    #[test]
    fn save_then_load_preserves_settings() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("settings.json");
        let mut settings = Settings::default();
        settings.prompts.selected_strategy_id = "writing".into();
        settings.save_to_path(&path).unwrap();

        assert_eq!(Settings::load_from_path(&path).unwrap(), settings);
    }

    #[test]
    fn settings_get_env_var() {
        let mut settings = Settings::default();
        settings
            .env
            .insert("AUTOPROMPT_TEST_FALLBACK".into(), "from_settings".into());

        env::set_var("AUTOPROMPT_TEST_ENV_ONLY", "from_env");
        assert_eq!(
            settings.get_env_var("AUTOPROMPT_TEST_ENV_ONLY").unwrap(),
            "from_env"
        );
        assert_eq!(
            settings.get_env_var("AUTOPROMPT_TEST_FALLBACK").unwrap(),
            "from_settings"
        );
        assert!(settings.get_env_var("AUTOPROMPT_TEST_ABSENT").is_none());
        env::remove_var("AUTOPROMPT_TEST_ENV_ONLY");
    }

    #[test]
    fn provider_overrides_win_over_file_values() {
        let mut settings = Settings::default();
        settings.provider = ProviderConfig {
            api_key: "sk-file".into(),
            provider_id: "deepseek".into(),
            endpoint: "https://api.deepseek.com".into(),
            model: "deepseek-chat".into(),
        };

        let config = settings.provider_config_with(|key| match key {
            API_KEY_VAR => Some("sk-env".into()),
            MODEL_VAR => Some("  ".into()),
            _ => None,
        });

        assert_eq!(config.api_key, "sk-env");
        assert_eq!(config.provider_id, "deepseek");
        assert_eq!(config.model, "deepseek-chat");
    }

    #[test]
    fn empty_provider_id_defaults_to_openai() {
        let config = Settings::default().provider_config_with(|_| None);
        assert_eq!(config.provider_id, DEFAULT_PROVIDER_ID);
    }
}
