//! Image preparation for OCR.
//!
//! Receipts arrive as phone photos: the EXIF orientation is applied first,
//! then the image is reduced to a single luminance channel and re-encoded
//! as lossless PNG for the OCR engine. No other enhancement is performed.

use std::io::Cursor;

use image::{DynamicImage, GenericImageView, GrayImage, ImageOutputFormat};
use tracing::debug;

use super::types::PreparedImage;
use super::ExtractionError;

/// Anything larger is not a phone photo and is refused before decoding.
const MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;

/// No supported container fits in fewer bytes than a 1x1 PNG.
const MIN_IMAGE_BYTES: usize = 67;

/// EXIF orientation meaning "stored upright".
const UPRIGHT: u32 = 1;

/// Validate, decode, orient and grayscale a receipt photo.
pub fn prepare_for_ocr(image_bytes: &[u8]) -> Result<PreparedImage, ExtractionError> {
    validate_image_bytes(image_bytes)?;

    let decoded = image::load_from_memory(image_bytes).map_err(|e| {
        ExtractionError::ImageProcessing(format!("Failed to decode receipt photo: {e}"))
    })?;

    let orientation = read_exif_orientation(image_bytes);
    let upright = apply_orientation(decoded, orientation);
    let (width, height) = upright.dimensions();
    let png_bytes = encode_png(&upright.to_luma8())?;

    debug!(width, height, orientation, png_len = png_bytes.len(), "Receipt photo ready for OCR");

    Ok(PreparedImage {
        png_bytes,
        width,
        height,
        orientation,
    })
}

/// Size gate applied before any decoding work.
pub fn validate_image_bytes(bytes: &[u8]) -> Result<(), ExtractionError> {
    match bytes.len() {
        n if n < MIN_IMAGE_BYTES => Err(ExtractionError::ImageProcessing(format!(
            "Receipt photo too small to be an image ({n} bytes)"
        ))),
        n if n > MAX_IMAGE_BYTES => Err(ExtractionError::ImageProcessing(format!(
            "Receipt photo is {n} bytes, limit is {MAX_IMAGE_BYTES}"
        ))),
        _ => Ok(()),
    }
}

/// EXIF orientation tag of the photo, or upright when absent or unreadable.
pub fn read_exif_orientation(bytes: &[u8]) -> u32 {
    exif::Reader::new()
        .read_from_container(&mut Cursor::new(bytes))
        .ok()
        .and_then(|data| {
            data.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
                .and_then(|field| field.value.get_uint(0))
        })
        .unwrap_or(UPRIGHT)
}

/// Undo the camera rotation described by an EXIF orientation value (1..=8).
/// Out-of-range values leave the image untouched.
pub fn apply_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}

pub fn encode_png(img: &GrayImage) -> Result<Vec<u8>, ExtractionError> {
    let mut out = Cursor::new(Vec::with_capacity(img.as_raw().len() / 2));
    DynamicImage::ImageLuma8(img.clone())
        .write_to(&mut out, ImageOutputFormat::Png)
        .map_err(|e| ExtractionError::ImageProcessing(format!("PNG re-encode failed: {e}")))?;
    Ok(out.into_inner())
}
