use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};

use crate::errors::PilotResult;
use crate::perception::types::ScaleFactor;

/// A screenshot re-encoded for the vision model.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub jpeg_bytes: Vec<u8>,
    pub scale: ScaleFactor,
    pub original_size: (u32, u32),
    pub compressed_size: (u32, u32),
}

/// Decodes `screenshot`, shrinks it to fit `max_dimension` (aspect kept,
/// never enlarged) and re-encodes it as JPEG. The returned scale maps
/// coordinates on the compressed image back to the original.
pub fn prepare_for_model(
    screenshot: &[u8],
    max_dimension: u32,
    jpeg_quality: u8,
) -> PilotResult<PreparedImage> {
    let decoded = image::load_from_memory(screenshot)?;
    let original_size = decoded.dimensions();

    let rgb = DynamicImage::ImageRgb8(decoded.to_rgb8());
    let resized = if original_size.0 > max_dimension || original_size.1 > max_dimension {
        rgb.resize(max_dimension, max_dimension, FilterType::Lanczos3)
    } else {
        rgb
    };
    let compressed_size = resized.dimensions();

    let mut jpeg_bytes = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut jpeg_bytes, jpeg_quality);
    resized.write_with_encoder(encoder)?;

    let scale = ScaleFactor::from_dimensions(original_size, compressed_size);
    tracing::debug!(
        original = %format!("{}x{}", original_size.0, original_size.1),
        compressed = %format!("{}x{}", compressed_size.0, compressed_size.1),
        width_ratio = scale.width_ratio,
        height_ratio = scale.height_ratio,
        bytes = jpeg_bytes.len(),
        "screenshot prepared for vision model"
    );

    Ok(PreparedImage {
        jpeg_bytes,
        scale,
        original_size,
        compressed_size,
    })
}
