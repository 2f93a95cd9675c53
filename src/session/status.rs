//! The status record of the current or most recent merge attempt.

use serde::{Deserialize, Serialize};

/// User-visible phase of a merge attempt.
///
/// Always replaced as a whole; the constructors below are the only transitions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationStatus {
    /// A request is in flight.
    pub is_loading: bool,
    /// Message of the last failure.
    pub error: Option<String>,
    /// Reference to the last merged image.
    pub result_url: Option<String>,
}

impl GenerationStatus {
    /// Nothing attempted yet, or reset.
    pub fn idle() -> Self {
        Self::default()
    }

    /// A request has been issued and not yet resolved.
    pub fn loading() -> Self {
        Self {
            is_loading: true,
            error: None,
            result_url: None,
        }
    }

    /// The capability returned an image.
    pub fn succeeded(result_url: impl Into<String>) -> Self {
        Self {
            is_loading: false,
            error: None,
            result_url: Some(result_url.into()),
        }
    }

    /// The attempt failed, before or during the request.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            is_loading: false,
            error: Some(message.into()),
            result_url: None,
        }
    }

    /// True for the initial `{false, None, None}` record.
    pub fn is_idle(&self) -> bool {
        *self == Self::idle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions_are_exclusive() {
        assert!(GenerationStatus::idle().is_idle());

        let loading = GenerationStatus::loading();
        assert!(loading.is_loading && loading.error.is_none() && loading.result_url.is_none());

        let done = GenerationStatus::succeeded("blob:xyz");
        assert!(!done.is_loading && done.error.is_none());
        assert_eq!(done.result_url.as_deref(), Some("blob:xyz"));

        let failed = GenerationStatus::failed("quota exceeded");
        assert!(!failed.is_loading && failed.result_url.is_none());
        assert_eq!(failed.error.as_deref(), Some("quota exceeded"));
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_value(GenerationStatus::succeeded("blob:xyz")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"isLoading": false, "error": null, "resultUrl": "blob:xyz"})
        );
    }
}
