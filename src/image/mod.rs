//! Photo intake, merge request types and generation providers.

pub mod intake;
mod provider;
pub mod providers;
mod types;

pub use intake::{ImageIntake, DEFAULT_MAX_IMAGE_BYTES};
pub use provider::{MergeProvider, MergeProviderExt, Retrying};
pub use types::{
    to_data_url, DataUrl, EncodedImage, GeneratedImage, GenerationMetadata, ImageFormat,
    MergeRequest, ProviderKind, Slot,
};
