use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Local};
use image::codecs::jpeg::JpegEncoder;
use image::{imageops, ImageFormat, Rgb, RgbImage, RgbaImage};

use crate::clipboard::Bitmap;
use crate::error::CodecError;

pub const DEFAULT_QUALITY: u8 = 85;
pub const DEFAULT_THUMBNAIL_SIZE: u32 = 128;

/// Hands out unique, timestamped names for encoded captures.
pub struct ImageCodec {
    sequence: AtomicU64,
}

impl ImageCodec {
    pub fn new() -> Self {
        Self {
            sequence: AtomicU64::new(0),
        }
    }

    /// `screenshot_YYYYmmdd_HHMMSS_NNNN.jpg`; the counter separates captures
    /// taken within the same second.
    pub fn next_filename(&self, captured_at: DateTime<Local>) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        format!(
            "screenshot_{}_{:04}.jpg",
            captured_at.format("%Y%m%d_%H%M%S"),
            seq
        )
    }
}

impl Default for ImageCodec {
    fn default() -> Self {
        Self::new()
    }
}

/// JPEG-encodes a bitmap. Identical input and quality give identical bytes.
pub fn encode_jpeg(bitmap: &Bitmap, quality: u8) -> Result<Vec<u8>, CodecError> {
    if !(1..=100).contains(&quality) {
        return Err(CodecError::InvalidQuality(quality));
    }
    let rgba = bitmap.to_image()?;
    let rgb = flatten_onto_white(&rgba);

    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality)
        .encode_image(&rgb)
        .map_err(CodecError::Encode)?;
    Ok(bytes)
}

/// Decodes a stored JPEG payload back into a clipboard bitmap.
pub fn decode_jpeg(bytes: &[u8]) -> Result<Bitmap, CodecError> {
    let image = image::load_from_memory_with_format(bytes, ImageFormat::Jpeg)
        .map_err(CodecError::Decode)?;
    Ok(Bitmap::from(image.to_rgba8()))
}

/// Downscales into a `size`x`size` box keeping the aspect ratio. Sources that
/// already fit are returned at their own resolution.
pub fn thumbnail(bitmap: &Bitmap, size: u32) -> Result<RgbaImage, CodecError> {
    let image = bitmap.to_image()?;
    let (width, height) = image.dimensions();
    let size = size.max(1);
    if width <= size && height <= size {
        return Ok(image);
    }

    let scale = f64::min(size as f64 / width as f64, size as f64 / height as f64);
    let target_w = ((width as f64 * scale).round() as u32).clamp(1, size);
    let target_h = ((height as f64 * scale).round() as u32).clamp(1, size);
    Ok(imageops::thumbnail(&image, target_w, target_h))
}

// JPEG has no alpha channel; composite over white like a screenshot viewer would.
fn flatten_onto_white(image: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b, a] = image.get_pixel(x, y).0;
        let alpha = a as u32;
        let blend = |c: u8| ((c as u32 * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        Rgb([blend(r), blend(g), blend(b)])
    })
}
