#![warn(missing_docs)]
//! Memory Merge - put your younger and current self in one Polaroid.
//!
//! A [`MergeSession`] holds two photo slots and a prompt. It sends them to
//! an image-generation capability (any [`MergeProvider`], with
//! [`GeminiProvider`] built in) and tracks the request in a
//! [`GenerationStatus`] record.
//!
//! # Quick Start
//!
//! ```no_run
//! use memory_merge::{GeminiProvider, MergeSession, Slot, View};
//!
//! #[tokio::main]
//! async fn main() -> memory_merge::Result<()> {
//!     let session = MergeSession::new(GeminiProvider::builder().build()?);
//!     session.select_image(Slot::Before, "me-at-six.jpg").await?;
//!     session.select_image(Slot::After, "me-today.jpg").await?;
//!
//!     session.attempt_merge().await;
//!     match session.view() {
//!         View::Success { .. } => {
//!             session.download(".").await?;
//!         }
//!         View::Failure { message } => eprintln!("{message}"),
//!         _ => {}
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `gemini-image`: Gemini (Google) provider
//! - `cli`: Command-line interface

pub mod config;
mod error;
pub mod image;
pub mod session;

// Re-export error types at crate root
pub use error::{MergeError, Result, GENERIC_FAILURE_MESSAGE, MISSING_IMAGES_MESSAGE};

pub use config::Config;
pub use image::{
    EncodedImage, GeneratedImage, ImageFormat, ImageIntake, MergeProvider, MergeProviderExt,
    MergeRequest, ProviderKind, Retrying, Slot,
};
pub use session::{
    Action, GenerationStatus, MergeOutcome, MergeSession, Prompt, SelectionOutcome, View,
    DEFAULT_PROMPT, DOWNLOAD_FILE_NAME,
};

#[cfg(feature = "gemini-image")]
pub use image::providers::{GeminiModel, GeminiProvider, GeminiProviderBuilder};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::error::{MergeError, Result};
    pub use crate::image::{EncodedImage, GeneratedImage, MergeProvider, MergeRequest, Slot};
    pub use crate::session::{GenerationStatus, MergeOutcome, MergeSession, View};

    #[cfg(feature = "gemini-image")]
    pub use crate::image::providers::GeminiProvider;
}
