//! Maps a status record onto what the user sees, and saves results.

use crate::error::{MergeError, Result};
use crate::image::DataUrl;
use crate::session::status::GenerationStatus;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// File name used for every downloaded result.
pub const DOWNLOAD_FILE_NAME: &str = "ai-memory.png";

/// One of the four mutually exclusive result views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "view", rename_all = "lowercase")]
pub enum View {
    /// Nothing to show yet.
    Idle,
    /// A request is in flight.
    Loading,
    /// The merged image is ready.
    Success {
        /// Reference to display.
        result_url: String,
    },
    /// The last attempt failed; the form stays usable.
    Failure {
        /// Message for the error banner.
        message: String,
    },
}

/// Actions offered alongside a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Start (or restart) a merge attempt.
    Merge,
    /// Save the result as [`DOWNLOAD_FILE_NAME`].
    Download,
    /// Clear both photos and the status.
    Reset,
}

impl View {
    /// Selects the view for `status`. Loading wins, then a result, then an error.
    pub fn from_status(status: &GenerationStatus) -> Self {
        if status.is_loading {
            return Self::Loading;
        }
        if let Some(url) = &status.result_url {
            return Self::Success {
                result_url: url.clone(),
            };
        }
        if let Some(message) = &status.error {
            return Self::Failure {
                message: message.clone(),
            };
        }
        Self::Idle
    }

    /// Actions available from this view.
    pub fn actions(&self) -> &'static [Action] {
        match self {
            Self::Idle | Self::Failure { .. } => &[Action::Merge],
            Self::Loading => &[],
            Self::Success { .. } => &[Action::Merge, Action::Download, Action::Reset],
        }
    }

    /// Short label for terminal output.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Success { .. } => "success",
            Self::Failure { .. } => "failure",
        }
    }
}

impl std::fmt::Display for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Upload both photos and merge to see the result here."),
            Self::Loading => write!(f, "Merging memories..."),
            Self::Success { result_url } => {
                if DataUrl::parse(result_url).is_some() {
                    write!(f, "Memories through time... (image ready)")
                } else {
                    write!(f, "Memories through time... {result_url}")
                }
            }
            Self::Failure { message } => write!(f, "Error: {message}"),
        }
    }
}

/// Writes the image behind `reference` to `dir/ai-memory.png`.
///
/// Data URLs are decoded locally; `http(s)` references are fetched with `client`.
pub(crate) async fn save_reference(
    client: &reqwest::Client,
    reference: &str,
    dir: &Path,
) -> Result<PathBuf> {
    let bytes = if let Some(data_url) = DataUrl::parse(reference) {
        data_url.decode()?
    } else if reference.starts_with("http://") || reference.starts_with("https://") {
        let response = client.get(reference).send().await?.error_for_status()?;
        response.bytes().await?.to_vec()
    } else {
        return Err(MergeError::InvalidRequest(format!(
            "cannot download result reference: {}",
            reference.split(':').next().unwrap_or(reference)
        )));
    };

    write_download(dir, &bytes).await
}

/// Writes `bytes` to `dir/ai-memory.png`, creating `dir` if needed.
pub(crate) async fn write_download(dir: &Path, bytes: &[u8]) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(DOWNLOAD_FILE_NAME);
    tokio::fs::write(&path, bytes).await?;
    tracing::debug!(path = %path.display(), size = bytes.len(), "saved merged image");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{to_data_url, ImageFormat};

    #[test]
    fn test_view_selection() {
        assert_eq!(View::from_status(&GenerationStatus::idle()), View::Idle);
        assert_eq!(View::from_status(&GenerationStatus::loading()), View::Loading);
        assert_eq!(
            View::from_status(&GenerationStatus::succeeded("blob:xyz")),
            View::Success {
                result_url: "blob:xyz".into()
            }
        );
        assert_eq!(
            View::from_status(&GenerationStatus::failed("quota exceeded")),
            View::Failure {
                message: "quota exceeded".into()
            }
        );
    }

    #[test]
    fn test_loading_takes_precedence() {
        let status = GenerationStatus {
            is_loading: true,
            error: Some("old".into()),
            result_url: Some("blob:old".into()),
        };
        assert_eq!(View::from_status(&status), View::Loading);
    }

    #[test]
    fn test_actions_per_view() {
        assert_eq!(View::Idle.actions(), &[Action::Merge]);
        assert!(View::Loading.actions().is_empty());
        assert_eq!(
            View::Success {
                result_url: "blob:xyz".into()
            }
            .actions(),
            &[Action::Merge, Action::Download, Action::Reset]
        );
        assert_eq!(
            View::Failure {
                message: "quota exceeded".into()
            }
            .actions(),
            &[Action::Merge]
        );
    }

    #[tokio::test]
    async fn test_save_data_url_reference() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        let reference = to_data_url(ImageFormat::Png, &bytes);

        let path = save_reference(&reqwest::Client::new(), &reference, dir.path())
            .await
            .unwrap();
        assert_eq!(path, dir.path().join("ai-memory.png"));
        assert_eq!(std::fs::read(path).unwrap(), bytes);
    }

    #[tokio::test]
    async fn test_save_rejects_unknown_scheme() {
        let dir = tempfile::tempdir().unwrap();
        let err = save_reference(&reqwest::Client::new(), "blob:xyz", dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, MergeError::InvalidRequest(_)));
        assert!(!dir.path().join(DOWNLOAD_FILE_NAME).exists());
    }
}
