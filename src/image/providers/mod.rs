//! Image editing providers.

#[cfg(feature = "huggingface")]
mod huggingface;
mod replicate;

pub use replicate::{ReplicateProvider, ReplicateProviderBuilder};

#[cfg(feature = "huggingface")]
pub use huggingface::{circular_mask, HuggingFaceProvider, HuggingFaceProviderBuilder};
