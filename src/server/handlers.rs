//! Relay handlers. The credential lives only for the duration of a request.

use super::error::ApiError;
use super::router::ProxyState;
use crate::error::ErrorKind;
use crate::prediction::{PredictionRequest, RawResponse};
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

/// Body of `POST /api/replicate`.
#[derive(Debug, Deserialize)]
pub struct SubmitBody {
    /// Editing instruction.
    #[serde(default)]
    pub prompt: String,
    /// Source image as a data URL.
    #[serde(default)]
    pub input_image: String,
    /// Caller's Replicate token.
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Query of `GET /api/replicate/:id`.
#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    /// Caller's Replicate token.
    #[serde(default)]
    pub api_key: Option<String>,
}

fn require_key(api_key: Option<&str>) -> Result<&str, ApiError> {
    api_key
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| ApiError::Validation("API key is required".into()))
}

/// Passes the upstream reply through unchanged.
fn relay(raw: RawResponse) -> Response {
    let status = StatusCode::from_u16(raw.status).unwrap_or(StatusCode::BAD_GATEWAY);
    (status, [(header::CONTENT_TYPE, "application/json")], raw.body).into_response()
}

/// `POST /api/replicate`
///
/// The body is read as JSON whatever its declared content type.
pub(crate) async fn submit(
    State(state): State<ProxyState>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let body: SubmitBody = serde_json::from_slice(&body)
        .map_err(|e| ApiError::Validation(format!("invalid request body: {e}")))?;
    let api_key = require_key(body.api_key.as_deref())?;

    let request = PredictionRequest::new(&state.version, body.prompt, body.input_image);
    tracing::info!(seed = request.seed(), "relaying prediction submission");

    let raw = state.api.forward_create(&request, api_key).await?;
    if !raw.is_success() {
        return Err(ApiError::upstream(
            raw.status,
            "Replicate API failed",
            &raw.body,
            ErrorKind::Submission,
        ));
    }

    Ok(relay(raw))
}

/// `GET /api/replicate/:id?api_key=...`
pub(crate) async fn status(
    State(state): State<ProxyState>,
    Path(id): Path<String>,
    Query(query): Query<StatusQuery>,
) -> Result<Response, ApiError> {
    let api_key = require_key(query.api_key.as_deref())?;

    let raw = state.api.forward_get(&id, api_key).await?;
    if !raw.is_success() {
        return Err(ApiError::upstream(
            raw.status,
            "Failed to check prediction status",
            &raw.body,
            ErrorKind::Provider,
        ));
    }

    tracing::debug!(job_id = %id, "relayed prediction status");
    Ok(relay(raw))
}

/// `GET /health`
pub(crate) async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
