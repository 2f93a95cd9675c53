//! Error types for photo intake and merge generation.

use std::path::PathBuf;
use std::time::Duration;

/// Message shown when a merge is attempted before both photos are uploaded.
pub const MISSING_IMAGES_MESSAGE: &str = "Please upload both photos first.";

/// Message shown when a generation failure carries no text of its own.
pub const GENERIC_FAILURE_MESSAGE: &str = "An unexpected error occurred during generation.";

/// Upstream error bodies are cut to this many characters before surfacing.
const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// Errors that can occur while preparing or running a merge.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    /// A merge was attempted with an empty upload slot.
    #[error("{}", MISSING_IMAGES_MESSAGE)]
    MissingImages,

    /// The selected file is not a supported image.
    #[error("unsupported image type: {0}")]
    UnsupportedImageType(String),

    /// The selected file exceeds the configured size limit.
    #[error("image too large: {size} bytes (limit {limit} bytes)")]
    ImageTooLarge { size: u64, limit: u64 },

    /// The selected file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// API key missing or invalid.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Billing is not enabled for the API key.
    #[error("billing error: {0}")]
    Billing(String),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Rate limit exceeded.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    /// Request timed out inside the provider client.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// Content was blocked by safety filters.
    #[error("content blocked: {0}")]
    ContentBlocked(String),

    /// Invalid request parameters.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The provider answered, but not with an image.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Opaque failure reported by a generation capability. May be empty.
    #[error("{0}")]
    Generation(String),

    /// Network or HTTP error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Failed to decode base64 or data URL content.
    #[error("failed to decode: {0}")]
    Decode(String),

    /// I/O error (e.g., saving the result).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Config(String),
}

impl MergeError {
    /// Returns true for errors raised before any request is issued.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::MissingImages
                | Self::UnsupportedImageType(_)
                | Self::ImageTooLarge { .. }
                | Self::Read { .. }
        )
    }

    /// Returns true if this error is likely transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Timeout(_) => true,
            Self::Network(e) => !e.is_builder() && !e.is_decode(),
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns the suggested retry delay, if available.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            Self::Timeout(_) => Some(Duration::from_secs(1)),
            Self::Network(_) | Self::Api { .. } => Some(Duration::from_secs(2)),
            _ => None,
        }
    }

    /// Message to surface to the user for a failed attempt.
    ///
    /// Falls back to [`GENERIC_FAILURE_MESSAGE`] when the error has no text.
    pub fn user_message(&self) -> String {
        let message = self.to_string();
        if message.trim().is_empty() {
            GENERIC_FAILURE_MESSAGE.to_string()
        } else {
            message
        }
    }
}

/// Result type alias for merge operations.
pub type Result<T> = std::result::Result<T, MergeError>;

/// Cleans an upstream error body for display.
///
/// Redacts anything that looks like a Google API key and truncates long bodies.
pub(crate) fn sanitize_error_message(text: &str) -> String {
    let redacted: Vec<String> = text
        .split_whitespace()
        .map(|word| {
            if let Some(pos) = word.find("AIza") {
                format!("{}[REDACTED]", &word[..pos])
            } else {
                word.to_string()
            }
        })
        .collect();
    let joined = redacted.join(" ");

    if joined.chars().count() > MAX_ERROR_MESSAGE_LEN {
        let truncated: String = joined.chars().take(MAX_ERROR_MESSAGE_LEN).collect();
        format!("{truncated}...")
    } else {
        joined
    }
}

/// Reads a `Retry-After` header expressed in whole seconds.
pub(crate) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}
