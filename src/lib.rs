#![warn(missing_docs)]
//! Retouch - prompt-driven image editing with a local fallback.
//!
//! An [`EditRequest`] (image bytes, a natural-language instruction, and an
//! optional API key) is sent to a remote provider. Replicate jobs are submitted
//! and polled until they finish; Hugging Face inpainting answers in one call.
//! When no key is given or anything on the remote path fails, the
//! [`Editor`] renders a local simulated edit instead.
//!
//! # Quick Start
//!
//! ```no_run
//! use retouch::{EditRequest, Editor, ReplicateProvider, SimulationOptions};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> retouch::Result<()> {
//!     let editor = Editor::new(SimulationOptions::default())
//!         .with_provider(Arc::new(ReplicateProvider::builder().build()));
//!
//!     let source = std::fs::read("photo.png")?;
//!     let request = EditRequest::new(source, "make it a snowy evening")
//!         .with_credential(std::env::var("REPLICATE_API_TOKEN").unwrap_or_default());
//!
//!     let outcome = editor.edit(&request).await?;
//!     outcome.image.save("edited.png")?;
//!     Ok(())
//! }
//! ```
//!
//! # Relay
//!
//! With the `server` feature, [`server::proxy_router`] exposes
//! `POST /api/replicate` and `GET /api/replicate/:id` so that clients can reach
//! Replicate without calling it directly. [`prediction::ProxyApi`] is the matching client.
//!
//! # Features
//!
//! - `huggingface`: Hugging Face inpainting provider
//! - `server`: axum relay
//! - `cli`: Command-line interface

mod error;

pub mod editor;
pub mod image;
pub mod job;
pub mod poll;
pub mod prediction;
pub mod simulate;

#[cfg(feature = "server")]
pub mod server;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export error types at crate root
pub use error::{sanitize_error_message, ErrorEnvelope, ErrorKind, Result, RetouchError};

pub use editor::{EditOutcome, Editor, Progress};
pub use crate::image::{
    EditMetadata, EditProvider, EditProviderExt, EditRequest, EditSource, EditedImage,
    ImageFormat, ReplicateProvider, ReplicateProviderBuilder,
};
pub use job::{JobHandle, JobStatus};
pub use poll::{Backoff, JobPoller, PollPolicy, Sleeper, TokioSleeper};
pub use prediction::{JobSubmitter, PredictionApi, ProxyApi, ReplicateApi};
pub use simulate::{SimulationOptions, Simulator};

#[cfg(feature = "huggingface")]
pub use crate::image::{HuggingFaceProvider, HuggingFaceProviderBuilder};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::editor::{EditOutcome, Editor};
    pub use crate::error::{Result, RetouchError};
    pub use crate::image::{
        EditProvider, EditProviderExt, EditRequest, EditedImage, ReplicateProvider,
    };
    pub use crate::simulate::SimulationOptions;

    #[cfg(feature = "huggingface")]
    pub use crate::image::HuggingFaceProvider;
}
