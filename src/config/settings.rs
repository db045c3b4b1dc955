//! On-disk settings layers

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TapError};

/// One layer of settings as stored in a JSON file.
///
/// Every field is optional; a field that is present overrides the layers
/// below it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TapSettings {
    /// Base URL of the OpenAI-compatible endpoint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// API key for authentication
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model used when none is given on the command line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,

    /// Report reasoning text as it streams
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_reasoning: Option<bool>,

    /// Echo every raw payload to stderr
    #[serde(skip_serializing_if = "Option::is_none")]
    pub echo_payloads: Option<bool>,

    /// Verbose logging enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verbose: Option<bool>,
}

impl TapSettings {
    /// Load settings from a specific path
    ///
    /// A missing file is an empty layer.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|e| TapError::ConfigParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        serde_json::from_str(&contents).map_err(|e| TapError::ConfigParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Overlay `other` on top of `self`
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            base_url: other.base_url.or(self.base_url),
            api_key: other.api_key.or(self.api_key),
            default_model: other.default_model.or(self.default_model),
            show_reasoning: other.show_reasoning.or(self.show_reasoning),
            echo_payloads: other.echo_payloads.or(self.echo_payloads),
            verbose: other.verbose.or(self.verbose),
        }
    }
}
