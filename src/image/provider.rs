//! Edit provider trait and utilities.

use crate::error::Result;
use crate::image::types::{EditRequest, EditSource, EditedImage};
use async_trait::async_trait;

/// Trait for remote image editing providers.
#[async_trait]
pub trait EditProvider: Send + Sync {
    /// Applies the request's instruction to its source image.
    async fn edit(&self, request: &EditRequest) -> Result<EditedImage>;

    /// Returns where images from this provider come from.
    fn kind(&self) -> EditSource;

    /// Returns the name of this provider for display.
    fn name(&self) -> &str {
        match self.kind() {
            EditSource::Replicate => "Replicate (Flux Kontext)",
            EditSource::HuggingFace => "Hugging Face (Stable Diffusion inpainting)",
            EditSource::Simulated => "Local simulation",
        }
    }

    /// Checks that the provider is reachable with the given credential.
    async fn health_check(&self, credential: &str) -> Result<()>;
}

/// Extension trait for providers with retry logic.
#[async_trait]
pub trait EditProviderExt: EditProvider {
    /// Edits with automatic retries on transient failures.
    async fn edit_with_retries(
        &self,
        request: &EditRequest,
        max_retries: u32,
    ) -> Result<EditedImage> {
        let mut attempt = 0;
        loop {
            match self.edit(request).await {
                Ok(image) => return Ok(image),
                Err(e) if e.is_retryable() && attempt < max_retries => {
                    attempt += 1;
                    let delay = e.retry_after().unwrap_or(std::time::Duration::from_secs(1));
                    tracing::warn!(
                        attempt,
                        max_retries,
                        delay_ms = delay.as_millis(),
                        "retrying after transient error: {e}"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl<T: EditProvider> EditProviderExt for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RetouchError;
    use crate::image::types::{EditMetadata, ImageFormat};
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Flaky {
        failures: u32,
        calls: AtomicU32,
        status: u16,
    }

    #[async_trait]
    impl EditProvider for Flaky {
        async fn edit(&self, _request: &EditRequest) -> Result<EditedImage> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return Err(RetouchError::Submission {
                    status: self.status,
                    detail: "upstream busy".into(),
                });
            }
            Ok(EditedImage::new(
                vec![1],
                ImageFormat::Png,
                EditSource::Replicate,
                EditMetadata::default(),
            ))
        }

        fn kind(&self) -> EditSource {
            EditSource::Replicate
        }

        async fn health_check(&self, _credential: &str) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_errors() {
        let provider = Flaky {
            failures: 2,
            calls: AtomicU32::new(0),
            status: 503,
        };
        let req = EditRequest::new(vec![], "x");
        let image = provider.edit_with_retries(&req, 3).await.unwrap();
        assert_eq!(image.data, vec![1]);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_does_not_retry_client_errors() {
        let provider = Flaky {
            failures: 5,
            calls: AtomicU32::new(0),
            status: 422,
        };
        let req = EditRequest::new(vec![], "x");
        assert!(provider.edit_with_retries(&req, 3).await.is_err());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_default_name() {
        let provider = Flaky {
            failures: 0,
            calls: AtomicU32::new(0),
            status: 200,
        };
        assert_eq!(provider.name(), "Replicate (Flux Kontext)");
    }
}
