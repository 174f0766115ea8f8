//! Provider job tracking.
//!
//! A [`JobHandle`] mirrors one prediction on the provider side. It is created
//! from the submission response and only changes through [`JobHandle::advance`],
//! which refuses to move a handle out of a terminal state.

use crate::error::{sanitize_error_message, RetouchError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle state of a provider job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Accepted, waiting for a worker.
    Queued,
    /// Running.
    Processing,
    /// Finished with output.
    Succeeded,
    /// Finished without output (failed or canceled).
    Failed,
}

impl JobStatus {
    /// Maps a provider status string onto the lifecycle.
    pub fn from_provider(status: &str) -> Option<Self> {
        match status.trim().to_ascii_lowercase().as_str() {
            "starting" | "queued" => Some(Self::Queued),
            "processing" => Some(Self::Processing),
            "succeeded" => Some(Self::Succeeded),
            "failed" | "canceled" | "cancelled" | "aborted" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns true for states no further transition leaves.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Processing => write!(f, "processing"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Prediction record as returned by Replicate (and relayed by the proxy).
#[derive(Debug, Clone, Deserialize)]
pub struct Prediction {
    /// Provider job id.
    pub id: String,
    /// Raw provider status string.
    pub status: String,
    /// Output, a URL or a list of URLs once succeeded.
    #[serde(default)]
    pub output: Option<Value>,
    /// Error detail when failed.
    #[serde(default)]
    pub error: Option<Value>,
}

/// Local view of a provider job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    id: String,
    status: JobStatus,
    output: Option<String>,
    error: Option<String>,
}

impl JobHandle {
    /// Builds a handle from a provider prediction.
    pub fn from_prediction(prediction: Prediction) -> Result<Self> {
        let status = JobStatus::from_provider(&prediction.status).ok_or_else(|| {
            RetouchError::UnexpectedResponse(format!(
                "unknown job status: {}",
                prediction.status
            ))
        })?;

        Ok(Self {
            id: prediction.id,
            status,
            output: prediction.output.as_ref().and_then(first_output_url),
            error: prediction.error.as_ref().and_then(error_text),
        })
    }

    /// Provider job id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current status.
    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// Output reference, once succeeded.
    pub fn output(&self) -> Option<&str> {
        self.output.as_deref()
    }

    /// Error detail, once failed.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Returns true once the job reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Applies a freshly polled prediction.
    pub fn advance(&mut self, prediction: Prediction) -> Result<()> {
        if self.is_terminal() {
            return Err(RetouchError::UnexpectedResponse(format!(
                "job {} already {}",
                self.id, self.status
            )));
        }
        if prediction.id != self.id {
            return Err(RetouchError::UnexpectedResponse(format!(
                "status for job {} returned while polling {}",
                prediction.id, self.id
            )));
        }

        *self = Self::from_prediction(prediction)?;
        Ok(())
    }

    /// Converts a terminal handle into its outcome.
    ///
    /// Succeeded yields the output reference; failed yields a `Poll` error
    /// carrying the provider's detail.
    pub fn into_outcome(self) -> Result<String> {
        match self.status {
            JobStatus::Succeeded => self.output.ok_or_else(|| {
                RetouchError::Poll(format!("job {} succeeded without output", self.id))
            }),
            JobStatus::Failed => Err(RetouchError::Poll(
                self.error.unwrap_or_else(|| "job failed without detail".into()),
            )),
            JobStatus::Queued | JobStatus::Processing => Err(RetouchError::UnexpectedResponse(
                format!("job {} is still {}", self.id, self.status),
            )),
        }
    }
}

fn first_output_url(output: &Value) -> Option<String> {
    match output {
        Value::String(url) if !url.trim().is_empty() => Some(url.trim().to_string()),
        Value::Array(items) => items.iter().find_map(first_output_url),
        Value::Object(obj) => obj.get("url").and_then(first_output_url),
        _ => None,
    }
}

fn error_text(error: &Value) -> Option<String> {
    match error {
        Value::Null => None,
        Value::String(s) => Some(sanitize_error_message(s)),
        other => Some(sanitize_error_message(&other.to_string())),
    }
}
