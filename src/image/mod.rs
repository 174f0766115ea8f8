//! Image editing: request/result types, the provider seam, and providers.

pub mod codec;
mod provider;
pub mod providers;
mod types;

pub use provider::{EditProvider, EditProviderExt};
pub use providers::{ReplicateProvider, ReplicateProviderBuilder};
pub use types::{EditMetadata, EditRequest, EditSource, EditedImage, ImageFormat};

#[cfg(feature = "huggingface")]
pub use providers::{circular_mask, HuggingFaceProvider, HuggingFaceProviderBuilder};
