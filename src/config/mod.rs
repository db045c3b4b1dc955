//! Configuration management for reasoning-tap
//!
//! Layers, lowest priority first:
//! 1. Built-in defaults
//! 2. Global config (`<config dir>/reasoning-tap/config.json`)
//! 3. Project config (`./.reasoning-tap.json`)
//! 4. Environment variables
//! 5. CLI parameters (applied by the binary)

pub mod settings;

use std::path::{Path, PathBuf};

pub use self::settings::TapSettings;
use crate::error::{Result, TapError};

/// Default endpoint: OpenRouter streams reasoning in `delta.reasoning`
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Default model
pub const DEFAULT_MODEL: &str = "deepseek/deepseek-r1";

/// Resolved configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TapConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub default_model: String,
    pub show_reasoning: bool,
    pub echo_payloads: bool,
    pub verbose: bool,
}

impl Default for TapConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            default_model: DEFAULT_MODEL.to_string(),
            show_reasoning: true,
            echo_payloads: false,
            verbose: false,
        }
    }
}

impl TapConfig {
    /// Load configuration from the standard files and the environment
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file cannot be read or parsed
    pub fn load() -> Result<Self> {
        let mut config =
            Self::load_from(&Self::global_config_path(), &Self::project_config_path())?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load configuration from explicit global and project files
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file cannot be read or parsed
    pub fn load_from(global: &Path, project: &Path) -> Result<Self> {
        let settings =
            TapSettings::load_from_path(global)?.merge(TapSettings::load_from_path(project)?);
        Ok(Self::default().with_settings(settings))
    }

    /// Apply a settings layer on top of this configuration
    #[must_use]
    pub fn with_settings(self, settings: TapSettings) -> Self {
        Self {
            base_url: settings.base_url.unwrap_or(self.base_url),
            api_key: settings.api_key.or(self.api_key),
            default_model: settings.default_model.unwrap_or(self.default_model),
            show_reasoning: settings.show_reasoning.unwrap_or(self.show_reasoning),
            echo_payloads: settings.echo_payloads.unwrap_or(self.echo_payloads),
            verbose: settings.verbose.unwrap_or(self.verbose),
        }
    }

    /// Apply environment overrides through `lookup`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(base_url) = lookup("REASONING_TAP_BASE_URL") {
            self.base_url = base_url;
        }
        if let Some(api_key) = lookup("REASONING_TAP_API_KEY").or_else(|| lookup("OPENAI_API_KEY")) {
            self.api_key = Some(api_key);
        }
        if let Some(model) = lookup("REASONING_TAP_MODEL") {
            self.default_model = model;
        }
    }

    /// Check the configuration is usable for a request
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL or model is empty
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(TapError::ConfigValidation("base URL is empty".to_string()));
        }
        if self.default_model.trim().is_empty() {
            return Err(TapError::ConfigValidation("model is empty".to_string()));
        }
        Ok(())
    }

    /// Get the configuration directory path
    #[must_use]
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("reasoning-tap")
    }

    /// Get the global config file path
    #[must_use]
    pub fn global_config_path() -> PathBuf {
        Self::config_dir().join("config.json")
    }

    /// Get the project config file path in the current directory
    #[must_use]
    pub fn project_config_path() -> PathBuf {
        PathBuf::from(".reasoning-tap.json")
    }
}
