//! The merge session: two upload slots, a prompt and the request lifecycle.
//!
//! Every status transition is a whole-record replace made while holding the
//! session lock. Each merge attempt and each photo selection carries a
//! monotonically increasing id, and a resolution is applied only if its id is
//! still current. A `reset()` or a newer attempt therefore turns any in-flight
//! response into a no-op instead of a stale overwrite.

use crate::error::{MergeError, Result, MISSING_IMAGES_MESSAGE};
use crate::image::{
    EncodedImage, GeneratedImage, ImageIntake, MergeProvider, MergeRequest, Slot,
};
use crate::session::presenter::{self, View};
use crate::session::prompt::Prompt;
use crate::session::status::GenerationStatus;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

/// How a call to [`MergeSession::attempt_merge`] ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// A slot was empty; no request was issued.
    MissingImages,
    /// The capability returned an image; carries its reference.
    Completed(String),
    /// The capability failed; carries the message now shown in the status.
    Failed(String),
    /// The response arrived after a reset or a newer attempt and was dropped.
    Stale,
}

impl MergeOutcome {
    /// Converts the outcome into the result reference or the matching error.
    pub fn into_result(self) -> Result<String> {
        match self {
            Self::Completed(reference) => Ok(reference),
            Self::MissingImages => Err(MergeError::MissingImages),
            Self::Failed(message) => Err(MergeError::Generation(message)),
            Self::Stale => Err(MergeError::Generation(
                "merge was superseded by a newer request".into(),
            )),
        }
    }
}

/// How a photo selection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionOutcome {
    /// The photo now occupies the slot.
    Stored,
    /// A newer selection or a reset happened while this one was reading.
    Superseded,
}

#[derive(Debug, Default)]
struct SessionState {
    before: Option<EncodedImage>,
    after: Option<EncodedImage>,
    prompt: Prompt,
    attempt: u64,
    selection: [u64; 2],
    result: Option<GeneratedImage>,
}

impl SessionState {
    fn slot_mut(&mut self, slot: Slot) -> &mut Option<EncodedImage> {
        match slot {
            Slot::Before => &mut self.before,
            Slot::After => &mut self.after,
        }
    }

    fn slot(&self, slot: Slot) -> Option<&EncodedImage> {
        match slot {
            Slot::Before => self.before.as_ref(),
            Slot::After => self.after.as_ref(),
        }
    }

    fn ticket_mut(&mut self, slot: Slot) -> &mut u64 {
        match slot {
            Slot::Before => &mut self.selection[0],
            Slot::After => &mut self.selection[1],
        }
    }
}

/// A merge session shared between the UI and background tasks.
///
/// Cloning is cheap; all clones drive the same session.
#[derive(Clone)]
pub struct MergeSession {
    state: Arc<Mutex<SessionState>>,
    status: Arc<watch::Sender<GenerationStatus>>,
    provider: Arc<dyn MergeProvider>,
    intake: ImageIntake,
    http: reqwest::Client,
}

impl std::fmt::Debug for MergeSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MergeSession")
            .field("provider", &self.provider.name())
            .field("status", &*self.status.borrow())
            .finish_non_exhaustive()
    }
}

impl MergeSession {
    /// Creates an idle session backed by `provider`.
    pub fn new(provider: impl MergeProvider + 'static) -> Self {
        Self::from_shared(Arc::new(provider))
    }

    /// Creates an idle session backed by a shared provider.
    pub fn from_shared(provider: Arc<dyn MergeProvider>) -> Self {
        let (status, _) = watch::channel(GenerationStatus::idle());
        Self {
            state: Arc::new(Mutex::new(SessionState::default())),
            status: Arc::new(status),
            provider,
            intake: ImageIntake::default(),
            http: reqwest::Client::new(),
        }
    }

    /// Replaces the photo validation rules.
    pub fn with_intake(mut self, intake: ImageIntake) -> Self {
        self.intake = intake;
        self
    }

    /// Uses `client` to fetch remote results on download.
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    /// Reads the photo at `path` into `slot`.
    ///
    /// On failure the slot keeps its previous photo. If a newer selection for
    /// the same slot, or a reset, happens while the file is being read, the
    /// result is discarded.
    pub async fn select_image(&self, slot: Slot, path: impl AsRef<Path>) -> Result<SelectionOutcome> {
        let ticket = self.begin_selection(slot).await;
        let read = self.intake.read(path).await;
        self.finish_selection(slot, ticket, read).await
    }

    /// Stores an already-encoded photo in `slot`, superseding pending reads.
    pub async fn set_image(&self, slot: Slot, image: EncodedImage) -> Result<()> {
        let image = self.intake.accept(image)?;
        let mut state = self.state.lock().await;
        *state.ticket_mut(slot) += 1;
        tracing::debug!(%slot, file = image.file_name(), "photo selected");
        *state.slot_mut(slot) = Some(image);
        Ok(())
    }

    async fn begin_selection(&self, slot: Slot) -> u64 {
        let mut state = self.state.lock().await;
        let ticket = state.ticket_mut(slot);
        *ticket += 1;
        *ticket
    }

    async fn finish_selection(
        &self,
        slot: Slot,
        ticket: u64,
        read: Result<EncodedImage>,
    ) -> Result<SelectionOutcome> {
        let image = read?;
        let mut state = self.state.lock().await;
        if *state.ticket_mut(slot) != ticket {
            tracing::debug!(%slot, file = image.file_name(), "discarding superseded photo read");
            return Ok(SelectionOutcome::Superseded);
        }
        tracing::debug!(%slot, file = image.file_name(), "photo selected");
        *state.slot_mut(slot) = Some(image);
        Ok(SelectionOutcome::Stored)
    }

    /// The photo currently held by `slot`.
    pub async fn image(&self, slot: Slot) -> Option<EncodedImage> {
        self.state.lock().await.slot(slot).cloned()
    }

    /// The current prompt text.
    pub async fn prompt(&self) -> String {
        self.state.lock().await.prompt.as_str().to_string()
    }

    /// Replaces the prompt text verbatim.
    pub async fn set_prompt(&self, text: impl Into<String>) {
        self.state.lock().await.prompt.set(text);
    }

    /// A snapshot of the status record.
    pub fn status(&self) -> GenerationStatus {
        self.status.borrow().clone()
    }

    /// The view for the current status.
    pub fn view(&self) -> View {
        View::from_status(&self.status.borrow())
    }

    /// Receives every status transition.
    pub fn subscribe(&self) -> watch::Receiver<GenerationStatus> {
        self.status.subscribe()
    }

    /// True when both slots are filled and no request is in flight.
    pub async fn can_merge(&self) -> bool {
        let state = self.state.lock().await;
        !self.status.borrow().is_loading && state.before.is_some() && state.after.is_some()
    }

    /// Runs one merge attempt over the current photos and prompt.
    ///
    /// Failures are recorded in the status rather than returned; the outcome
    /// only tells the caller which transition happened.
    pub async fn attempt_merge(&self) -> MergeOutcome {
        let (attempt, request) = {
            let mut state = self.state.lock().await;
            state.attempt += 1;
            let attempt = state.attempt;

            let (Some(before), Some(after)) = (&state.before, &state.after) else {
                tracing::debug!(attempt, "merge attempted without both photos");
                self.status
                    .send_replace(GenerationStatus::failed(MISSING_IMAGES_MESSAGE));
                return MergeOutcome::MissingImages;
            };

            let request = MergeRequest::new(before.data(), after.data(), state.prompt.as_str());
            state.result = None;
            self.status.send_replace(GenerationStatus::loading());
            (attempt, request)
        };

        tracing::info!(attempt, provider = self.provider.name(), "merge started");
        let result = self.provider.merge(&request).await;

        let mut state = self.state.lock().await;
        if state.attempt != attempt {
            tracing::warn!(
                attempt,
                current = state.attempt,
                "discarding stale merge response"
            );
            return MergeOutcome::Stale;
        }

        match result {
            Ok(image) => {
                let reference = image.reference();
                tracing::info!(attempt, size = image.size(), "merge complete");
                state.result = Some(image);
                self.status
                    .send_replace(GenerationStatus::succeeded(reference.clone()));
                MergeOutcome::Completed(reference)
            }
            Err(e) => {
                let message = e.user_message();
                tracing::warn!(attempt, error = %e, "merge failed");
                self.status
                    .send_replace(GenerationStatus::failed(message.clone()));
                MergeOutcome::Failed(message)
            }
        }
    }

    /// Clears both photos and the status, and invalidates in-flight work.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        state.attempt += 1;
        for slot in Slot::ALL {
            *state.ticket_mut(slot) += 1;
            *state.slot_mut(slot) = None;
        }
        state.result = None;
        self.status.send_replace(GenerationStatus::idle());
        tracing::debug!("session reset");
    }

    /// Saves the current result as `dir/ai-memory.png`.
    ///
    /// Returns `None` without touching the filesystem when there is no result.
    pub async fn download(&self, dir: impl AsRef<Path>) -> Result<Option<PathBuf>> {
        // Status is only written under the state lock, so both reads see the same attempt.
        let (reference, bytes) = {
            let state = self.state.lock().await;
            let Some(reference) = self.status.borrow().result_url.clone() else {
                return Ok(None);
            };
            let bytes = state
                .result
                .as_ref()
                .filter(|image| !image.data.is_empty())
                .map(|image| image.data.clone());
            (reference, bytes)
        };

        let path = match bytes {
            Some(bytes) => presenter::write_download(dir.as_ref(), &bytes).await?,
            None => presenter::save_reference(&self.http, &reference, dir.as_ref()).await?,
        };
        Ok(Some(path))
    }
}
