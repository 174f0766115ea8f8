//! Client for the credential-holding relay (`/api/replicate`).

use super::{replicate::validate_job_id, PredictionApi, PredictionRequest};
use crate::error::{sanitize_error_message, ErrorKind, RetouchError, Result};
use crate::job::Prediction;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Reaches Replicate through a running relay instead of calling it directly.
///
/// The relay picks the model version and seed itself; only the prompt and the
/// image travel from here.
#[derive(Debug, Clone)]
pub struct ProxyApi {
    client: reqwest::Client,
    base_url: String,
}

impl ProxyApi {
    /// Creates a client for the relay at `base_url` (e.g. `http://127.0.0.1:8787`).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Creates a client reusing an existing HTTP client.
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    /// Relay base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self) -> String {
        format!("{}/api/replicate", self.base_url)
    }

    fn relay_error(status: u16, text: &str, fallback: ErrorKind) -> RetouchError {
        let (kind, detail) = match serde_json::from_str::<RelayErrorBody>(text) {
            Ok(body) => (body.kind.unwrap_or(fallback), body.error),
            Err(_) => (fallback, sanitize_error_message(text)),
        };

        match kind {
            ErrorKind::Validation => RetouchError::Validation(detail),
            ErrorKind::Poll => RetouchError::Poll(detail),
            ErrorKind::Provider | ErrorKind::Network | ErrorKind::Internal => {
                RetouchError::UnexpectedResponse(format!("relay error {status}: {detail}"))
            }
            _ => RetouchError::Submission { status, detail },
        }
    }
}

#[async_trait]
impl PredictionApi for ProxyApi {
    async fn create_prediction(
        &self,
        request: &PredictionRequest,
        credential: &str,
    ) -> Result<Prediction> {
        let body = RelaySubmitBody {
            prompt: &request.input.prompt,
            input_image: &request.input.input_image,
            api_key: credential,
        };

        let response = self.client.post(self.endpoint()).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Self::relay_error(
                status.as_u16(),
                &text,
                ErrorKind::Submission,
            ));
        }

        Ok(response.json().await?)
    }

    async fn get_prediction(&self, id: &str, credential: &str) -> Result<Prediction> {
        validate_job_id(id)?;

        let response = self
            .client
            .get(format!("{}/{}", self.endpoint(), id))
            .query(&[("api_key", credential)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Self::relay_error(
                status.as_u16(),
                &text,
                ErrorKind::Provider,
            ));
        }

        Ok(response.json().await?)
    }

    /// The relay keeps no credential of its own and checks the key on every
    /// request, so this only confirms the relay answers.
    async fn check_credential(&self, _credential: &str) -> Result<()> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RetouchError::UnexpectedResponse(format!(
                "relay health check failed: {}",
                status.as_u16()
            )));
        }
        Ok(())
    }
}

/// Body accepted by the relay's submit endpoint.
#[derive(Debug, Serialize)]
struct RelaySubmitBody<'a> {
    prompt: &'a str,
    input_image: &'a str,
    api_key: &'a str,
}

#[derive(Debug, Deserialize)]
struct RelayErrorBody {
    error: String,
    #[serde(default)]
    kind: Option<ErrorKind>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trimmed() {
        let api = ProxyApi::new("http://localhost:8787/");
        assert_eq!(api.endpoint(), "http://localhost:8787/api/replicate");
    }

    #[test]
    fn test_relay_error_uses_kind() {
        let err = ProxyApi::relay_error(
            400,
            r#"{"error": "API key is required", "kind": "validation"}"#,
            ErrorKind::Submission,
        );
        assert!(matches!(err, RetouchError::Validation(ref m) if m == "API key is required"));
    }

    #[test]
    fn test_relay_error_without_kind_uses_fallback() {
        let err = ProxyApi::relay_error(
            422,
            r#"{"error": "Replicate API failed: 422 - bad version"}"#,
            ErrorKind::Submission,
        );
        assert!(matches!(err, RetouchError::Submission { status: 422, .. }));

        let err = ProxyApi::relay_error(404, "not json", ErrorKind::Provider);
        assert_eq!(err.kind(), ErrorKind::Provider);
        assert!(err.to_string().contains("not json"));
    }

    #[test]
    fn test_submit_body_shape() {
        let body = RelaySubmitBody {
            prompt: "p",
            input_image: "data:image/png;base64,AA==",
            api_key: "k",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["prompt"], "p");
        assert_eq!(json["api_key"], "k");
        assert!(json.get("version").is_none());
    }
}
