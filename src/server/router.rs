//! Relay router.

use super::handlers;
use crate::prediction::{ReplicateApi, DEFAULT_MODEL_VERSION};
use axum::routing::{get, post};
use axum::Router;

/// Shared state of the relay: an upstream client and the pinned model version.
#[derive(Debug, Clone)]
pub struct ProxyState {
    pub(crate) api: ReplicateApi,
    pub(crate) version: String,
}

impl ProxyState {
    /// Creates state forwarding to `api` with the default model version.
    pub fn new(api: ReplicateApi) -> Self {
        Self {
            api,
            version: DEFAULT_MODEL_VERSION.to_string(),
        }
    }

    /// Pins a different model version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }
}

/// Builds the relay router.
///
/// - `POST /api/replicate` submits a prediction
/// - `GET /api/replicate/:id?api_key=` checks its status
/// - `GET /health`
pub fn proxy_router(state: ProxyState) -> Router {
    Router::new()
        .route("/api/replicate", post(handlers::submit))
        .route("/api/replicate/:id", get(handlers::status))
        .route("/health", get(handlers::health))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, RetouchError};
    use crate::prediction::{PredictionApi, PredictionRequest, ProxyApi};
    use crate::test_support::spawn;
    use axum::body::Body;
    use axum::extract::Path;
    use axum::http::{HeaderMap, Request, StatusCode};
    use axum::Json;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app(api_base: &str) -> Router {
        proxy_router(ProxyState::new(
            ReplicateApi::builder().api_base(api_base).build(),
        ))
    }

    /// Stand-in for the Replicate API: echoes what it received.
    fn fake_upstream() -> Router {
        async fn create(headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
            let auth = headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            (
                StatusCode::CREATED,
                Json(json!({
                    "id": "abc123",
                    "status": "starting",
                    "echo_auth": auth,
                    "echo_version": body["version"],
                    "echo_prompt": body["input"]["prompt"],
                    "echo_aspect_ratio": body["input"]["aspect_ratio"],
                })),
            )
        }

        async fn get_one(Path(id): Path<String>) -> (StatusCode, String) {
            if id == "abc123" {
                (
                    StatusCode::OK,
                    json!({"id": "abc123", "status": "succeeded", "output": "https://cdn/x.png"})
                        .to_string(),
                )
            } else {
                (StatusCode::NOT_FOUND, "not found".to_string())
            }
        }

        Router::new()
            .route("/predictions", post(create))
            .route("/predictions/:id", get(get_one))
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/replicate")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn submit_without_api_key_is_rejected() {
        let response = app("http://127.0.0.1:1")
            .oneshot(post_json(r#"{"prompt": "x", "input_image": "data:,"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"], "API key is required");
        assert_eq!(body["kind"], "validation");
    }

    #[tokio::test]
    async fn submit_with_blank_api_key_is_rejected() {
        let response = app("http://127.0.0.1:1")
            .oneshot(post_json(r#"{"prompt": "x", "input_image": "", "api_key": "  "}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn status_without_api_key_is_rejected() {
        let response = app("http://127.0.0.1:1")
            .oneshot(get_req("/api/replicate/abc123"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "API key is required");
    }

    #[tokio::test]
    async fn malformed_json_is_validation_error() {
        let response = app("http://127.0.0.1:1")
            .oneshot(post_json("{not json"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["kind"], "validation");
    }

    #[tokio::test]
    async fn submit_ignores_content_type() {
        let plain = |body: &str| {
            Request::builder()
                .method("POST")
                .uri("/api/replicate")
                .header("content-type", "text/plain")
                .body(Body::from(body.to_string()))
                .unwrap()
        };

        let response = app("http://127.0.0.1:1")
            .oneshot(plain(r#"{"prompt": "x", "input_image": ""}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "API key is required");

        let upstream = spawn(fake_upstream()).await;
        let response = app(&upstream)
            .oneshot(plain(
                r#"{"prompt": "add snow", "input_image": "data:,", "api_key": "r8_key"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(json_body(response).await["echo_prompt"], "add snow");
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let response = app("http://127.0.0.1:1")
            .oneshot(get_req("/health"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn submit_relays_upstream_reply() {
        let upstream = spawn(fake_upstream()).await;
        let response = app(&upstream)
            .oneshot(post_json(
                r#"{"prompt": "add snow", "input_image": "data:image/png;base64,AA==", "api_key": "r8_key"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = json_body(response).await;
        assert_eq!(body["id"], "abc123");
        assert_eq!(body["echo_auth"], "Token r8_key");
        assert_eq!(body["echo_version"], DEFAULT_MODEL_VERSION);
        assert_eq!(body["echo_prompt"], "add snow");
        assert_eq!(body["echo_aspect_ratio"], "1:1");
    }

    #[tokio::test]
    async fn status_relays_upstream_reply() {
        let upstream = spawn(fake_upstream()).await;
        let response = app(&upstream)
            .oneshot(get_req("/api/replicate/abc123?api_key=r8_key"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "succeeded");
    }

    #[tokio::test]
    async fn status_failure_keeps_upstream_status() {
        let upstream = spawn(fake_upstream()).await;
        let response = app(&upstream)
            .oneshot(get_req("/api/replicate/missing?api_key=r8_key"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = json_body(response).await;
        assert_eq!(
            body["error"],
            "Failed to check prediction status: 404 - not found"
        );
        assert_eq!(body["kind"], "provider");
    }

    #[tokio::test]
    async fn unreachable_upstream_is_internal_error() {
        let response = app("http://127.0.0.1:1")
            .oneshot(post_json(r#"{"prompt": "x", "input_image": "", "api_key": "r8_key"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        assert_eq!(body["error"], "Internal server error");
        assert_eq!(body["kind"], "network");
    }

    #[tokio::test]
    async fn proxy_client_round_trip() {
        let upstream = spawn(fake_upstream()).await;
        let relay = spawn(app(&upstream)).await;
        let client = ProxyApi::new(relay);

        let request = PredictionRequest::new(DEFAULT_MODEL_VERSION, "add snow", "data:,");
        let created = client.create_prediction(&request, "r8_key").await.unwrap();
        assert_eq!(created.id, "abc123");
        assert_eq!(created.status, "starting");

        let polled = client.get_prediction("abc123", "r8_key").await.unwrap();
        assert_eq!(polled.status, "succeeded");

        let err = client.create_prediction(&request, "").await.unwrap_err();
        assert!(matches!(err, RetouchError::Validation(ref m) if m == "API key is required"));
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = client.get_prediction("missing", "r8_key").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Provider);
    }

    #[tokio::test]
    async fn proxy_client_checks_relay_health() {
        let relay = spawn(app("http://127.0.0.1:1")).await;
        assert!(ProxyApi::new(relay).check_credential("r8_key").await.is_ok());

        let not_a_relay = spawn(Router::new()).await;
        let err = ProxyApi::new(not_a_relay)
            .check_credential("r8_key")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Provider);
    }
}
