//! The generation capability trait and utilities.

use crate::error::Result;
use crate::image::types::{GeneratedImage, MergeRequest, ProviderKind};
use async_trait::async_trait;

/// A remote capability that merges two photos according to a prompt.
#[async_trait]
pub trait MergeProvider: Send + Sync {
    /// Merges the two images of `request` into one.
    async fn merge(&self, request: &MergeRequest) -> Result<GeneratedImage>;

    /// Returns the kind of this provider.
    fn kind(&self) -> ProviderKind;

    /// Returns the name of this provider for display.
    fn name(&self) -> &str {
        match self.kind() {
            ProviderKind::Gemini => "Gemini (Google)",
            ProviderKind::Custom => "custom provider",
        }
    }

    /// Checks if the provider is reachable and authenticated.
    async fn health_check(&self) -> Result<()>;
}

/// Extension trait for providers with retry logic.
#[async_trait]
pub trait MergeProviderExt: MergeProvider {
    /// Merges with automatic retries on transient failures.
    async fn merge_with_retries(
        &self,
        request: &MergeRequest,
        max_retries: u32,
    ) -> Result<GeneratedImage> {
        let mut attempt = 0;
        loop {
            match self.merge(request).await {
                Ok(image) => return Ok(image),
                Err(e) if e.is_retryable() && attempt < max_retries => {
                    attempt += 1;
                    let delay = e.retry_after().unwrap_or(std::time::Duration::from_secs(1));
                    tracing::warn!(
                        attempt,
                        max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "retrying after transient error: {e}"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl<T: MergeProvider + ?Sized> MergeProviderExt for T {}

/// Wraps a provider so that every merge goes through [`MergeProviderExt::merge_with_retries`].
pub struct Retrying<P> {
    inner: P,
    max_retries: u32,
}

impl<P: MergeProvider> Retrying<P> {
    /// Wraps `inner`, retrying transient failures up to `max_retries` times.
    pub fn new(inner: P, max_retries: u32) -> Self {
        Self { inner, max_retries }
    }
}

#[async_trait]
impl<P: MergeProvider> MergeProvider for Retrying<P> {
    async fn merge(&self, request: &MergeRequest) -> Result<GeneratedImage> {
        self.inner
            .merge_with_retries(request, self.max_retries)
            .await
    }

    fn kind(&self) -> ProviderKind {
        self.inner.kind()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn health_check(&self) -> Result<()> {
        self.inner.health_check().await
    }
}
