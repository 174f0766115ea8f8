//! Direct Replicate predictions API client.

use super::{PredictionApi, PredictionRequest};
use crate::error::{sanitize_error_message, RetouchError, Result};
use crate::job::Prediction;
use async_trait::async_trait;

const DEFAULT_API_BASE: &str = "https://api.replicate.com/v1";

/// Status and body of an upstream response, kept verbatim for relaying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body text.
    pub body: String,
}

impl RawResponse {
    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Builder for [`ReplicateApi`].
#[derive(Debug, Clone, Default)]
pub struct ReplicateApiBuilder {
    api_base: Option<String>,
    client: Option<reqwest::Client>,
}

impl ReplicateApiBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API base URL. Falls back to `REPLICATE_API_BASE`, then the public endpoint.
    pub fn api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = Some(base.into());
        self
    }

    /// Reuses an existing HTTP client.
    pub fn client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Builds the client.
    pub fn build(self) -> ReplicateApi {
        let api_base = self
            .api_base
            .or_else(|| std::env::var("REPLICATE_API_BASE").ok())
            .map(|b| b.trim().trim_end_matches('/').to_string())
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        ReplicateApi {
            client: self.client.unwrap_or_default(),
            api_base,
        }
    }
}

/// Talks to `api.replicate.com` with `Authorization: Token <credential>`.
#[derive(Debug, Clone)]
pub struct ReplicateApi {
    client: reqwest::Client,
    api_base: String,
}

impl ReplicateApi {
    /// Creates a new [`ReplicateApiBuilder`].
    pub fn builder() -> ReplicateApiBuilder {
        ReplicateApiBuilder::new()
    }

    /// Base URL requests go to.
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn predictions_url(&self) -> String {
        format!("{}/predictions", self.api_base)
    }

    /// Posts a prediction and returns the upstream response untouched.
    ///
    /// Only transport failures are errors; HTTP error statuses are returned as data.
    pub async fn forward_create(
        &self,
        body: &PredictionRequest,
        credential: &str,
    ) -> Result<RawResponse> {
        let response = self
            .client
            .post(self.predictions_url())
            .header("Authorization", format!("Token {}", credential))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(RawResponse { status, body })
    }

    /// Fetches a prediction and returns the upstream response untouched.
    pub async fn forward_get(&self, id: &str, credential: &str) -> Result<RawResponse> {
        validate_job_id(id)?;

        let response = self
            .client
            .get(format!("{}/{}", self.predictions_url(), id))
            .header("Authorization", format!("Token {}", credential))
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(RawResponse { status, body })
    }
}

#[async_trait]
impl PredictionApi for ReplicateApi {
    async fn create_prediction(
        &self,
        request: &PredictionRequest,
        credential: &str,
    ) -> Result<Prediction> {
        let raw = self.forward_create(request, credential).await?;
        if !raw.is_success() {
            return Err(RetouchError::Submission {
                status: raw.status,
                detail: sanitize_error_message(&raw.body),
            });
        }
        Ok(serde_json::from_str(&raw.body)?)
    }

    async fn get_prediction(&self, id: &str, credential: &str) -> Result<Prediction> {
        let raw = self.forward_get(id, credential).await?;
        if !raw.is_success() {
            return Err(RetouchError::UnexpectedResponse(format!(
                "status check failed: {} - {}",
                raw.status,
                sanitize_error_message(&raw.body)
            )));
        }
        Ok(serde_json::from_str(&raw.body)?)
    }

    async fn check_credential(&self, credential: &str) -> Result<()> {
        let response = self
            .client
            .get(format!("{}/account", self.api_base))
            .header("Authorization", format!("Token {}", credential))
            .send()
            .await?;

        match response.status().as_u16() {
            401 | 403 => Err(RetouchError::Validation("Invalid Replicate API key".into())),
            _ => Ok(()),
        }
    }
}

/// Rejects job ids that could escape the predictions path.
pub(crate) fn validate_job_id(id: &str) -> Result<()> {
    let valid = !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(RetouchError::Validation(format!("invalid job id: {id:?}")))
    }
}
