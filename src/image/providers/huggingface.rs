//! Hugging Face (Stable Diffusion inpainting) image editing provider.

use crate::error::{sanitize_error_message, RetouchError, Result};
use crate::image::codec;
use crate::image::provider::EditProvider;
use crate::image::types::{EditMetadata, EditRequest, EditSource, EditedImage, ImageFormat};
use async_trait::async_trait;
use image::{GrayImage, Luma};
use serde::Serialize;
use std::time::Instant;

const DEFAULT_MODEL: &str = "runwayml/stable-diffusion-inpainting";
const DEFAULT_API_BASE: &str = "https://api-inference.huggingface.co/models";

/// Builder for [`HuggingFaceProvider`].
#[derive(Debug, Clone, Default)]
pub struct HuggingFaceProviderBuilder {
    api_base: Option<String>,
    model: Option<String>,
}

impl HuggingFaceProviderBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the inference API base URL.
    pub fn api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = Some(base.into());
        self
    }

    /// Sets the model repository id.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Builds the provider.
    pub fn build(self) -> HuggingFaceProvider {
        let api_base = self
            .api_base
            .map(|b| b.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        HuggingFaceProvider {
            client: reqwest::Client::new(),
            api_base,
            model: self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        }
    }
}

/// Inpaints a centred circular region of the source image.
///
/// Unlike Replicate this is a single synchronous request; the response body is
/// the edited image itself.
pub struct HuggingFaceProvider {
    client: reqwest::Client,
    api_base: String,
    model: String,
}

impl HuggingFaceProvider {
    /// Creates a new [`HuggingFaceProviderBuilder`].
    pub fn builder() -> HuggingFaceProviderBuilder {
        HuggingFaceProviderBuilder::new()
    }

    fn url(&self) -> String {
        format!("{}/{}", self.api_base, self.model)
    }
}

#[async_trait]
impl EditProvider for HuggingFaceProvider {
    async fn edit(&self, request: &EditRequest) -> Result<EditedImage> {
        let start = Instant::now();
        let credential = request.require_credential()?;
        let (width, height) = codec::ensure_decodable(request.source_image())?;

        let mask = circular_mask(width, height);
        let body = InpaintingRequest {
            inputs: InpaintingInputs {
                prompt: request.instruction().to_string(),
                image: codec::encode_base64(request.source_image()),
                mask: codec::encode_base64(&codec::encode_png(&mask)?),
            },
        };

        let response = self
            .client
            .post(self.url())
            .header("Authorization", format!("Bearer {}", credential))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(RetouchError::Submission {
                status: status.as_u16(),
                detail: sanitize_error_message(&text),
            });
        }

        let data = response.bytes().await?.to_vec();
        tracing::debug!(model = %self.model, bytes = data.len(), "inpainting complete");

        let format = ImageFormat::from_magic_bytes(&data).ok_or_else(|| {
            RetouchError::UnexpectedResponse("inference API did not return an image".into())
        })?;

        Ok(EditedImage::new(
            data,
            format,
            EditSource::HuggingFace,
            EditMetadata {
                model: Some(self.model.clone()),
                seed: None,
                duration_ms: Some(start.elapsed().as_millis() as u64),
                job_id: None,
                fallback: None,
            },
        ))
    }

    fn kind(&self) -> EditSource {
        EditSource::HuggingFace
    }

    async fn health_check(&self, credential: &str) -> Result<()> {
        let credential = credential.trim();
        if credential.is_empty() {
            return Err(RetouchError::Validation(
                "Hugging Face API key is required".into(),
            ));
        }

        let response = self
            .client
            .get(self.url())
            .header("Authorization", format!("Bearer {}", credential))
            .send()
            .await?;

        match response.status().as_u16() {
            401 | 403 => Err(RetouchError::Validation(
                "Invalid Hugging Face API key".into(),
            )),
            _ => Ok(()),
        }
    }
}

/// Black keeps, white repaints: a white disc of radius `min(w, h) / 4` at the centre.
pub fn circular_mask(width: u32, height: u32) -> GrayImage {
    let cx = width as f64 / 2.0;
    let cy = height as f64 / 2.0;
    let radius = width.min(height) as f64 / 4.0;
    let r2 = radius * radius;

    GrayImage::from_fn(width, height, |x, y| {
        let dx = x as f64 + 0.5 - cx;
        let dy = y as f64 + 0.5 - cy;
        if dx * dx + dy * dy <= r2 {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

#[derive(Debug, Serialize)]
struct InpaintingRequest {
    inputs: InpaintingInputs,
}

#[derive(Debug, Serialize)]
struct InpaintingInputs {
    prompt: String,
    image: String,
    mask: String,
}
