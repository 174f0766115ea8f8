//! Conversions between binary image data and the text forms used on JSON wires.

use crate::error::{RetouchError, Result};
use crate::image::types::ImageFormat;
use base64::Engine;
use image::{DynamicImage, EncodableLayout, ImageBuffer, Pixel, PixelWithColorType};
use std::io::Cursor;

/// Largest image, in pixels, accepted for upload.
pub const MAX_PIXELS: u64 = 64 * 1024 * 1024;

/// Encodes raw bytes as standard, padded base64.
pub fn encode_base64(data: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(data)
}

/// Decodes a base64 string that may be imperfectly formatted.
///
/// Accepts a `data:` URL prefix, embedded whitespace, and missing `=` padding.
pub fn decode_base64(input: &str) -> Result<Vec<u8>> {
    let b64 = match input.find(";base64,") {
        Some(pos) => &input[pos + 8..],
        None => input,
    };

    let cleaned: String = b64.chars().filter(|c| !c.is_ascii_whitespace()).collect();

    if let Ok(data) = base64::engine::general_purpose::STANDARD.decode(&cleaned) {
        return Ok(data);
    }

    base64::engine::general_purpose::STANDARD_NO_PAD
        .decode(cleaned.trim_end_matches('='))
        .map_err(|e| RetouchError::Validation(format!("invalid base64 image data: {e}")))
}

/// Formats bytes as a `data:<mime>;base64,...` URL.
pub fn to_data_url(data: &[u8], format: ImageFormat) -> String {
    format!("data:{};base64,{}", format.mime_type(), encode_base64(data))
}

/// Splits a data URL into its MIME type and decoded payload.
pub fn parse_data_url(url: &str) -> Result<(String, Vec<u8>)> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| RetouchError::Validation("not a data URL".into()))?;
    let (mime, _) = rest
        .split_once(";base64,")
        .ok_or_else(|| RetouchError::Validation("data URL is not base64-encoded".into()))?;
    Ok((mime.to_string(), decode_base64(url)?))
}

/// Builds a data URL for an image, sniffing its MIME type from magic bytes.
pub fn image_data_url(data: &[u8]) -> String {
    let format = ImageFormat::from_magic_bytes(data).unwrap_or(ImageFormat::Png);
    to_data_url(data, format)
}

/// Reads the image header and returns its dimensions.
///
/// Nothing is allocated for the pixels, so the claimed size is checked against
/// [`MAX_PIXELS`] before any caller builds a buffer from it.
pub fn ensure_decodable(data: &[u8]) -> Result<(u32, u32)> {
    let (width, height) = image::ImageReader::new(Cursor::new(data))
        .with_guessed_format()?
        .into_dimensions()
        .map_err(|e| RetouchError::Validation(format!("image could not be decoded: {e}")))?;
    check_dimensions(width, height)?;
    Ok((width, height))
}

fn check_dimensions(width: u32, height: u32) -> Result<()> {
    if u64::from(width) * u64::from(height) > MAX_PIXELS {
        return Err(RetouchError::Validation(format!(
            "image is too large: {width}x{height}"
        )));
    }
    Ok(())
}

/// Fully decodes an image.
pub fn decode_image(data: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(data)
        .map_err(|e| RetouchError::Validation(format!("image could not be decoded: {e}")))
}

/// Encodes a pixel buffer (RGBA surface, grayscale mask, ...) as PNG.
pub fn encode_png<P>(surface: &ImageBuffer<P, Vec<P::Subpixel>>) -> Result<Vec<u8>>
where
    P: Pixel + PixelWithColorType,
    [P::Subpixel]: EncodableLayout,
{
    let mut buf = Vec::new();
    surface.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}
