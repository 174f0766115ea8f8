//! Prediction submission: payload construction and the transport seam.
//!
//! [`PredictionApi`] abstracts the two ways to reach Replicate: directly
//! ([`ReplicateApi`]) or through the credential-holding relay ([`ProxyApi`]).
//! [`JobSubmitter`] validates an [`EditRequest`] and turns it into a [`JobHandle`].

mod proxy;
mod replicate;

pub use proxy::ProxyApi;
pub use replicate::{RawResponse, ReplicateApi, ReplicateApiBuilder};

use crate::error::Result;
use crate::image::codec;
use crate::image::EditRequest;
use crate::job::{JobHandle, Prediction};
use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Flux Kontext model version used for edits.
pub const DEFAULT_MODEL_VERSION: &str =
    "85723d503c17da3f9fd9cecfb9987a8bf60ef747fd8f68a25d7636f88260eb59";

/// Exclusive upper bound of generated seeds.
pub const SEED_RANGE: u64 = 1_000_000;

const ASPECT_RATIO: &str = "1:1";
const OUTPUT_FORMAT: &str = "png";
const SAFETY_TOLERANCE: u8 = 2;

/// Transport for creating and querying predictions.
#[async_trait]
pub trait PredictionApi: Send + Sync {
    /// Submits a prediction and returns the provider's initial record.
    async fn create_prediction(
        &self,
        request: &PredictionRequest,
        credential: &str,
    ) -> Result<Prediction>;

    /// Fetches the current record of a prediction.
    async fn get_prediction(&self, id: &str, credential: &str) -> Result<Prediction>;

    /// Makes one cheap authenticated request to confirm the service answers.
    ///
    /// A rejected credential (401/403) is a validation error.
    async fn check_credential(&self, credential: &str) -> Result<()>;
}

/// Model input. Everything but `prompt` and `input_image` is fixed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionInput {
    /// Editing instruction.
    pub prompt: String,
    /// Source image, usually a data URL.
    pub input_image: String,
    /// Always `1:1`.
    pub aspect_ratio: String,
    /// Always `png`.
    pub output_format: String,
    /// Always `2`.
    pub safety_tolerance: u8,
    /// Random in `[0, SEED_RANGE)`.
    pub seed: u64,
}

/// Body of a prediction submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRequest {
    /// Model version hash.
    pub version: String,
    /// Model input.
    pub input: PredictionInput,
}

impl PredictionRequest {
    /// Builds a submission with fixed generation parameters and a fresh random seed.
    pub fn new(version: &str, prompt: impl Into<String>, input_image: impl Into<String>) -> Self {
        Self {
            version: version.to_string(),
            input: PredictionInput {
                prompt: prompt.into(),
                input_image: input_image.into(),
                aspect_ratio: ASPECT_RATIO.to_string(),
                output_format: OUTPUT_FORMAT.to_string(),
                safety_tolerance: SAFETY_TOLERANCE,
                seed: random_seed(),
            },
        }
    }

    /// Seed chosen for this submission.
    pub fn seed(&self) -> u64 {
        self.input.seed
    }
}

/// Draws a seed uniformly from `[0, SEED_RANGE)`.
pub fn random_seed() -> u64 {
    rand::thread_rng().gen_range(0..SEED_RANGE)
}

/// Validates edit requests and submits them as predictions.
#[derive(Clone)]
pub struct JobSubmitter {
    api: Arc<dyn PredictionApi>,
    version: String,
}

impl JobSubmitter {
    /// Creates a submitter for the default model version.
    pub fn new(api: Arc<dyn PredictionApi>) -> Self {
        Self {
            api,
            version: DEFAULT_MODEL_VERSION.to_string(),
        }
    }

    /// Overrides the model version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Model version submitted.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Submits the request and returns the job handle plus the seed that was sent.
    ///
    /// Fails with `Validation` before any network call when the credential is
    /// missing or the image cannot be decoded.
    pub async fn submit(&self, request: &EditRequest) -> Result<(JobHandle, u64)> {
        let credential = request.require_credential()?;
        codec::ensure_decodable(request.source_image())?;

        let body = PredictionRequest::new(
            &self.version,
            request.instruction(),
            codec::image_data_url(request.source_image()),
        );
        let seed = body.seed();

        let prediction = self.api.create_prediction(&body, credential).await?;
        let handle = JobHandle::from_prediction(prediction)?;
        tracing::debug!(job_id = %handle.id(), status = %handle.status(), seed, "submitted edit job");

        Ok((handle, seed))
    }
}
