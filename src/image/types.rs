//! Core types for image editing.

use crate::error::{ErrorEnvelope, RetouchError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Supported image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG format (lossless).
    #[default]
    Png,
    /// JPEG format (lossy).
    Jpeg,
    /// WebP format (modern, efficient).
    WebP,
    /// GIF format (first frame only is used).
    Gif,
}

impl ImageFormat {
    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::WebP => "webp",
            Self::Gif => "gif",
        }
    }

    /// Returns the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
            Self::Gif => "image/gif",
        }
    }

    /// Attempts to detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "webp" => Some(Self::WebP),
            "gif" => Some(Self::Gif),
            _ => None,
        }
    }

    /// Parses a MIME type such as `image/png`.
    pub fn from_mime_type(mime: &str) -> Option<Self> {
        match mime.trim().to_lowercase().as_str() {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/webp" => Some(Self::WebP),
            "image/gif" => Some(Self::Gif),
            _ => None,
        }
    }

    /// Detects image format from magic bytes.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 12 {
            return None;
        }

        // PNG: 89 50 4E 47 0D 0A 1A 0A
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(Self::Png);
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }

        // WebP: RIFF....WEBP
        if data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            return Some(Self::WebP);
        }

        if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
            return Some(Self::Gif);
        }

        None
    }
}

/// Where an edited image came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditSource {
    /// Replicate prediction (Flux Kontext).
    Replicate,
    /// Hugging Face inference (Stable Diffusion inpainting).
    HuggingFace,
    /// Local simulation fallback.
    Simulated,
}

impl std::fmt::Display for EditSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Replicate => write!(f, "replicate"),
            Self::HuggingFace => write!(f, "huggingface"),
            Self::Simulated => write!(f, "simulated"),
        }
    }
}

/// A request to edit an image. Immutable once handed to a provider.
#[derive(Clone)]
pub struct EditRequest {
    source_image: Vec<u8>,
    instruction: String,
    credential: Option<String>,
}

impl EditRequest {
    /// Creates a new request from raw image bytes and an instruction.
    pub fn new(source_image: Vec<u8>, instruction: impl Into<String>) -> Self {
        Self {
            source_image,
            instruction: instruction.into(),
            credential: None,
        }
    }

    /// Sets the provider credential for this request.
    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }

    /// Raw bytes of the image being edited.
    pub fn source_image(&self) -> &[u8] {
        &self.source_image
    }

    /// Natural-language editing instruction.
    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    /// Returns the credential, treating blank strings as absent.
    pub fn credential(&self) -> Option<&str> {
        self.credential
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    /// Returns the credential or a validation error if none was supplied.
    pub fn require_credential(&self) -> Result<&str> {
        self.credential()
            .ok_or_else(|| RetouchError::Validation("API key is required".into()))
    }
}

impl std::fmt::Debug for EditRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditRequest")
            .field("source_image_len", &self.source_image.len())
            .field("instruction", &self.instruction)
            .field("credential", &self.credential.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Metadata about how an edit was produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EditMetadata {
    /// Model or model version used.
    pub model: Option<String>,
    /// Seed used, when known.
    pub seed: Option<u64>,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: Option<u64>,
    /// Provider job identifier.
    pub job_id: Option<String>,
    /// Remote failure that caused a fallback to simulation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<ErrorEnvelope>,
}

/// An edited image with its data and metadata.
#[derive(Debug, Clone)]
#[must_use = "edited image should be saved or processed"]
pub struct EditedImage {
    /// Raw image bytes.
    pub data: Vec<u8>,
    /// Image format.
    pub format: ImageFormat,
    /// Where the image came from.
    pub source: EditSource,
    /// Edit metadata.
    pub metadata: EditMetadata,
}

impl EditedImage {
    /// Creates a new edited image.
    pub fn new(
        data: Vec<u8>,
        format: ImageFormat,
        source: EditSource,
        metadata: EditMetadata,
    ) -> Self {
        Self {
            data,
            format,
            source,
            metadata,
        }
    }

    /// Creates an edited image, detecting format from magic bytes.
    pub fn from_bytes(data: Vec<u8>, source: EditSource, metadata: EditMetadata) -> Result<Self> {
        let format = ImageFormat::from_magic_bytes(&data)
            .ok_or_else(|| RetouchError::UnexpectedResponse("unknown image format".into()))?;
        Ok(Self::new(data, format, source, metadata))
    }

    /// Returns the size of the image data in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Saves the image to the specified path.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, &self.data)?;
        Ok(())
    }

    /// Returns the image as a data URL.
    pub fn to_data_url(&self) -> String {
        crate::image::codec::to_data_url(&self.data, self.format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: [u8; 12] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
    const JPEG_MAGIC: [u8; 12] = [0xFF, 0xD8, 0xFF, 0xE0, 0, 0, 0, 0, 0, 0, 0, 0];
    const WEBP_MAGIC: [u8; 12] = *b"RIFF\x00\x00\x00\x00WEBP";
    const GIF_MAGIC: [u8; 12] = *b"GIF89a\x01\x00\x01\x00\x00\x00";

    #[test]
    fn test_format_from_magic_bytes() {
        assert_eq!(
            ImageFormat::from_magic_bytes(&PNG_MAGIC),
            Some(ImageFormat::Png)
        );
        assert_eq!(
            ImageFormat::from_magic_bytes(&JPEG_MAGIC),
            Some(ImageFormat::Jpeg)
        );
        assert_eq!(
            ImageFormat::from_magic_bytes(&WEBP_MAGIC),
            Some(ImageFormat::WebP)
        );
        assert_eq!(
            ImageFormat::from_magic_bytes(&GIF_MAGIC),
            Some(ImageFormat::Gif)
        );
        assert_eq!(ImageFormat::from_magic_bytes(b"short"), None);
    }

    #[test]
    fn test_format_from_mime_type() {
        assert_eq!(
            ImageFormat::from_mime_type("image/jpeg"),
            Some(ImageFormat::Jpeg)
        );
        assert_eq!(ImageFormat::from_mime_type("text/plain"), None);
    }

    #[test]
    fn test_blank_credential_is_absent() {
        let req = EditRequest::new(vec![1, 2, 3], "make it blue").with_credential("   ");
        assert!(req.credential().is_none());
        assert!(matches!(
            req.require_credential(),
            Err(RetouchError::Validation(_))
        ));
    }

    #[test]
    fn test_credential_is_trimmed() {
        let req = EditRequest::new(vec![], "x").with_credential(" r8_key ");
        assert_eq!(req.credential(), Some("r8_key"));
    }

    #[test]
    fn test_debug_redacts_credential() {
        let req = EditRequest::new(vec![0; 4], "x").with_credential("r8_supersecret");
        let debug = format!("{req:?}");
        assert!(!debug.contains("r8_supersecret"));
        assert!(debug.contains("source_image_len: 4"));
    }

    #[test]
    fn test_edit_source_display() {
        assert_eq!(EditSource::Replicate.to_string(), "replicate");
        assert_eq!(EditSource::HuggingFace.to_string(), "huggingface");
        assert_eq!(EditSource::Simulated.to_string(), "simulated");
    }
}
