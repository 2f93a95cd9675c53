//! Runtime configuration.
//!
//! Values are layered: built-in defaults, then an optional JSON file, then
//! environment variables. The CLI applies its flags on top.

use crate::error::{MergeError, Result};
use crate::image::{ImageIntake, DEFAULT_MAX_IMAGE_BYTES};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding the Google API key.
pub const API_KEY_ENV: &str = "GOOGLE_API_KEY";

const MODEL_ENV: &str = "MEMORY_MERGE_MODEL";
const BASE_URL_ENV: &str = "MEMORY_MERGE_BASE_URL";
const MAX_IMAGE_BYTES_ENV: &str = "MEMORY_MERGE_MAX_IMAGE_BYTES";
const TIMEOUT_SECS_ENV: &str = "MEMORY_MERGE_TIMEOUT_SECS";

/// Settings for a merge session and its provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// API key; `GOOGLE_API_KEY` wins when set.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Model identifier or alias (`flash`, `pro`).
    pub model: String,
    /// Endpoint override.
    pub base_url: Option<String>,
    /// Largest accepted photo in bytes.
    pub max_image_bytes: u64,
    /// Whole-request timeout for the provider client. `0` disables it.
    pub timeout_secs: u64,
    /// Where results are downloaded.
    pub output_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-2.5-flash-image".into(),
            base_url: None,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            timeout_secs: 120,
            output_dir: PathBuf::from("."),
        }
    }
}

impl Config {
    /// Loads defaults, the optional JSON file at `path`, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Reads a JSON config file. Missing keys take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MergeError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Overrides fields from environment lookups.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(key) = lookup(API_KEY_ENV).filter(|k| !k.is_empty()) {
            self.api_key = Some(key);
        }
        if let Some(model) = lookup(MODEL_ENV) {
            self.model = model;
        }
        if let Some(url) = lookup(BASE_URL_ENV) {
            self.base_url = Some(url);
        }
        if let Some(raw) = lookup(MAX_IMAGE_BYTES_ENV) {
            self.max_image_bytes = parse_number(MAX_IMAGE_BYTES_ENV, &raw)?;
        }
        if let Some(raw) = lookup(TIMEOUT_SECS_ENV) {
            self.timeout_secs = parse_number(TIMEOUT_SECS_ENV, &raw)?;
        }
        Ok(())
    }

    /// Provider client timeout, if enabled.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    /// Photo validation rules derived from this config.
    pub fn intake(&self) -> ImageIntake {
        ImageIntake::new().with_max_bytes(self.max_image_bytes)
    }

    /// Builds a Gemini provider from this config.
    #[cfg(feature = "gemini-image")]
    pub fn gemini_provider(&self) -> Result<crate::image::providers::GeminiProvider> {
        let mut builder = crate::image::providers::GeminiProvider::builder()
            .model(self.model.parse()?);
        if let Some(key) = &self.api_key {
            builder = builder.api_key(key);
        }
        if let Some(url) = &self.base_url {
            builder = builder.base_url(url);
        }
        if let Some(timeout) = self.timeout() {
            builder = builder.timeout(timeout);
        }
        builder.build()
    }
}

fn parse_number(key: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse()
        .map_err(|_| MergeError::Config(format!("{key} must be a non-negative integer, got {raw:?}")))
}
