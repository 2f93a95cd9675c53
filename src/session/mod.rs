//! The merge session: upload slots, prompt, request lifecycle and result views.

mod orchestrator;
mod presenter;
mod prompt;
mod status;

pub use orchestrator::{MergeOutcome, MergeSession, SelectionOutcome};
pub use presenter::{Action, View, DOWNLOAD_FILE_NAME};
pub use prompt::{Prompt, DEFAULT_PROMPT};
pub use status::GenerationStatus;
