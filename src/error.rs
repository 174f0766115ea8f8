//! Error types for image editing.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Maximum length of provider text carried in an error.
const MAX_DETAIL_LEN: usize = 500;

/// Errors that can occur while editing an image.
#[derive(Debug, thiserror::Error)]
pub enum RetouchError {
    /// Missing credential or undecodable image.
    #[error("invalid request: {0}")]
    Validation(String),

    /// Provider rejected the submission.
    #[error("submission failed: {status} - {detail}")]
    Submission {
        /// HTTP status returned by the provider.
        status: u16,
        /// Sanitized provider response text.
        detail: String,
    },

    /// Provider reported the job as failed.
    #[error("job failed: {0}")]
    Poll(String),

    /// Attempt budget exhausted before the job reached a terminal state.
    #[error("job did not finish after {attempts} status checks")]
    PollTimeout {
        /// Status checks made.
        attempts: u32,
    },

    /// Transport-level failure.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Provider answered with something we could not interpret.
    #[error("unexpected provider response: {0}")]
    UnexpectedResponse(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error (e.g., saving file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Image encoding or drawing error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Stable discriminator for [`RetouchError`], suitable for branching in callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// See [`RetouchError::Validation`].
    Validation,
    /// See [`RetouchError::Submission`].
    Submission,
    /// See [`RetouchError::Poll`].
    Poll,
    /// See [`RetouchError::PollTimeout`].
    PollTimeout,
    /// See [`RetouchError::Network`].
    Network,
    /// See [`RetouchError::UnexpectedResponse`].
    Provider,
    /// Local failures (I/O, JSON, image encoding).
    Internal,
}

impl ErrorKind {
    /// Returns the wire name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Submission => "submission",
            Self::Poll => "poll",
            Self::PollTimeout => "poll_timeout",
            Self::Network => "network",
            Self::Provider => "provider",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured error carried across process boundaries: a kind plus opaque detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// What went wrong.
    pub kind: ErrorKind,
    /// Human-readable detail. Not meant to be parsed.
    pub detail: String,
}

impl RetouchError {
    /// Returns the stable kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Submission { .. } => ErrorKind::Submission,
            Self::Poll(_) => ErrorKind::Poll,
            Self::PollTimeout { .. } => ErrorKind::PollTimeout,
            Self::Network(_) => ErrorKind::Network,
            Self::UnexpectedResponse(_) => ErrorKind::Provider,
            Self::Json(_) | Self::Io(_) | Self::Image(_) => ErrorKind::Internal,
        }
    }

    /// Converts this error into a serializable envelope.
    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            kind: self.kind(),
            detail: self.to_string(),
        }
    }

    /// Returns true if this error is likely transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Submission { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Returns the suggested retry delay, if available.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Submission { status: 429, .. } => Some(Duration::from_secs(5)),
            Self::Submission { .. } => Some(Duration::from_secs(1)),
            Self::Network(_) => Some(Duration::from_secs(2)),
            _ => None,
        }
    }
}

/// Result type alias for editing operations.
pub type Result<T> = std::result::Result<T, RetouchError>;

/// Trims provider text and redacts anything that looks like a credential.
pub fn sanitize_error_message(text: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    let mut redact_next = false;

    for word in text.split_whitespace() {
        if redact_next {
            words.push("[REDACTED]".into());
            redact_next = false;
            continue;
        }
        let bare = word.trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '_');
        if bare.eq_ignore_ascii_case("token") || bare.eq_ignore_ascii_case("bearer") {
            redact_next = true;
            words.push(word.to_string());
        } else if looks_like_key(bare) {
            words.push(word.replace(bare, "[REDACTED]"));
        } else {
            words.push(word.to_string());
        }
    }

    let joined = words.join(" ");
    if joined.chars().count() > MAX_DETAIL_LEN {
        let truncated: String = joined.chars().take(MAX_DETAIL_LEN).collect();
        format!("{truncated}...")
    } else {
        joined
    }
}

fn looks_like_key(word: &str) -> bool {
    (word.starts_with("r8_") || word.starts_with("hf_")) && word.len() > 8
}
