//! Replicate (Flux Kontext) image editing provider.

use crate::error::{RetouchError, Result};
use crate::image::codec;
use crate::image::provider::EditProvider;
use crate::image::types::{EditMetadata, EditRequest, EditSource, EditedImage, ImageFormat};
use crate::poll::{JobPoller, PollPolicy, Sleeper};
use crate::prediction::{JobSubmitter, PredictionApi, ProxyApi, ReplicateApi};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

/// Builder for [`ReplicateProvider`].
#[derive(Default)]
pub struct ReplicateProviderBuilder {
    api: Option<Arc<dyn PredictionApi>>,
    via_proxy: bool,
    version: Option<String>,
    policy: PollPolicy,
    sleeper: Option<Arc<dyn Sleeper>>,
    client: Option<reqwest::Client>,
}

impl ReplicateProviderBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls Replicate directly through the given client.
    pub fn api(mut self, api: ReplicateApi) -> Self {
        self.api = Some(Arc::new(api));
        self.via_proxy = false;
        self
    }

    /// Routes submissions and status checks through the relay at `base_url`.
    pub fn proxy(mut self, base_url: impl Into<String>) -> Self {
        self.api = Some(Arc::new(ProxyApi::new(base_url)));
        self.via_proxy = true;
        self
    }

    /// Uses any [`PredictionApi`] implementation.
    pub fn prediction_api(mut self, api: Arc<dyn PredictionApi>) -> Self {
        self.api = Some(api);
        self
    }

    /// Overrides the model version (ignored when going through the relay).
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Sets the polling policy.
    pub fn poll_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the sleeper used between status checks.
    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    /// Sets the HTTP client used to download outputs.
    pub fn client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Builds the provider.
    pub fn build(self) -> ReplicateProvider {
        let api = self
            .api
            .unwrap_or_else(|| Arc::new(ReplicateApi::builder().build()));

        let mut submitter = JobSubmitter::new(api.clone());
        if let Some(version) = self.version {
            submitter = submitter.with_version(version);
        }

        let mut poller = JobPoller::new(api.clone()).with_policy(self.policy);
        if let Some(sleeper) = self.sleeper {
            poller = poller.with_sleeper(sleeper);
        }

        ReplicateProvider {
            client: self.client.unwrap_or_default(),
            api,
            submitter,
            poller,
            via_proxy: self.via_proxy,
        }
    }
}

/// Replicate image editing provider: submit, poll, download.
pub struct ReplicateProvider {
    client: reqwest::Client,
    api: Arc<dyn PredictionApi>,
    submitter: JobSubmitter,
    poller: JobPoller,
    via_proxy: bool,
}

impl ReplicateProvider {
    /// Creates a new [`ReplicateProviderBuilder`].
    pub fn builder() -> ReplicateProviderBuilder {
        ReplicateProviderBuilder::new()
    }

    /// Fetches the output image. Data URLs are decoded in place.
    async fn download(&self, output: &str) -> Result<Vec<u8>> {
        if output.starts_with("data:") {
            return Ok(codec::parse_data_url(output)?.1);
        }

        let response = self.client.get(output).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RetouchError::UnexpectedResponse(format!(
                "failed to download output image: {}",
                status.as_u16()
            )));
        }

        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl EditProvider for ReplicateProvider {
    async fn edit(&self, request: &EditRequest) -> Result<EditedImage> {
        let start = Instant::now();
        let credential = request.require_credential()?;

        let (handle, seed) = self.submitter.submit(request).await?;
        let job_id = handle.id().to_string();

        let output = self.poller.await_handle(handle, credential).await?;
        tracing::debug!(job_id = %job_id, output = %output, "edit job complete");

        let data = self.download(&output).await?;

        let format = ImageFormat::from_magic_bytes(&data).unwrap_or(ImageFormat::Png);

        Ok(EditedImage::new(
            data,
            format,
            EditSource::Replicate,
            EditMetadata {
                model: (!self.via_proxy).then(|| self.submitter.version().to_string()),
                seed: (!self.via_proxy).then_some(seed),
                duration_ms: Some(start.elapsed().as_millis() as u64),
                job_id: Some(job_id),
                fallback: None,
            },
        ))
    }

    fn kind(&self) -> EditSource {
        EditSource::Replicate
    }

    async fn health_check(&self, credential: &str) -> Result<()> {
        let credential = credential.trim();
        if credential.is_empty() {
            return Err(RetouchError::Validation("API key is required".into()));
        }
        self.api.check_credential(credential).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poll::tests::{RecordingSleeper, ScriptedApi};
    use crate::test_support::spawn;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use image::{Rgba, RgbaImage};
    use serde_json::json;

    fn png() -> Vec<u8> {
        codec::encode_png(&RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 255]))).unwrap()
    }

    fn provider(api: Arc<ScriptedApi>) -> ReplicateProvider {
        ReplicateProvider::builder()
            .prediction_api(api)
            .sleeper(Arc::new(RecordingSleeper::default()))
            .build()
    }

    #[tokio::test]
    async fn test_edit_decodes_data_url_output() {
        let output = png();
        let api = Arc::new(ScriptedApi::with_statuses(vec![
            json!({"id": "job-1", "status": "processing"}),
            json!({"id": "job-1", "status": "succeeded", "output": codec::image_data_url(&output)}),
        ]));

        let image = provider(api.clone())
            .edit(&EditRequest::new(png(), "add snow").with_credential("r8_key"))
            .await
            .unwrap();

        assert_eq!(image.data, output);
        assert_eq!(image.format, ImageFormat::Png);
        assert_eq!(image.source, EditSource::Replicate);
        assert_eq!(image.metadata.job_id.as_deref(), Some("job-1"));
        assert!(image.metadata.seed.is_some());
        assert_eq!(api.status_calls(), 2);
    }

    #[tokio::test]
    async fn test_edit_surfaces_job_failure() {
        let api = Arc::new(ScriptedApi::with_statuses(vec![
            json!({"id": "job-1", "status": "failed", "error": "prompt flagged"}),
        ]));

        let err = provider(api)
            .edit(&EditRequest::new(png(), "x").with_credential("r8_key"))
            .await
            .unwrap_err();

        assert!(matches!(err, RetouchError::Poll(ref m) if m == "prompt flagged"));
    }

    #[tokio::test]
    async fn test_edit_without_credential_is_validation_error() {
        let api = Arc::new(ScriptedApi::default());
        let err = provider(api.clone())
            .edit(&EditRequest::new(png(), "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, RetouchError::Validation(_)));
        assert!(api.submissions.lock().unwrap().is_empty());
        assert_eq!(api.status_calls(), 0);
    }

    #[tokio::test]
    async fn test_health_check_requires_credential() {
        let p = provider(Arc::new(ScriptedApi::default()));
        assert!(p.health_check("").await.is_err());
        assert!(p.health_check("r8_key").await.is_ok());
    }

    #[tokio::test]
    async fn test_health_check_asks_the_api() {
        let p = provider(Arc::new(ScriptedApi::default()));
        let err = p.health_check("r8_revoked").await.unwrap_err();
        assert!(matches!(err, RetouchError::Validation(_)));
    }

    #[tokio::test]
    async fn test_health_check_against_replicate() {
        async fn account(headers: HeaderMap) -> StatusCode {
            match headers.get("authorization").and_then(|v| v.to_str().ok()) {
                Some("Token r8_good") => StatusCode::OK,
                _ => StatusCode::UNAUTHORIZED,
            }
        }
        let base = spawn(Router::new().route("/account", get(account))).await;
        let p = ReplicateProvider::builder()
            .api(ReplicateApi::builder().api_base(base).build())
            .build();

        assert!(p.health_check("r8_good").await.is_ok());
        let err = p.health_check("r8_wrong").await.unwrap_err();
        assert!(matches!(err, RetouchError::Validation(_)));
    }

    #[tokio::test]
    async fn test_proxy_metadata_omits_model_and_seed() {
        let output = png();
        let upstream = Router::new()
            .route(
                "/api/replicate",
                post(|| async { Json(json!({"id": "job-9", "status": "starting"})) }),
            )
            .route(
                "/api/replicate/:id",
                get(move || {
                    let output = codec::image_data_url(&output);
                    async move {
                        Json(json!({"id": "job-9", "status": "succeeded", "output": output}))
                    }
                }),
            );
        let relay = spawn(upstream).await;

        let image = ReplicateProvider::builder()
            .proxy(relay)
            .sleeper(Arc::new(RecordingSleeper::default()))
            .build()
            .edit(&EditRequest::new(png(), "add snow").with_credential("r8_key"))
            .await
            .unwrap();

        assert_eq!(image.metadata.job_id.as_deref(), Some("job-9"));
        assert!(image.metadata.model.is_none());
        assert!(image.metadata.seed.is_none());
    }
}
