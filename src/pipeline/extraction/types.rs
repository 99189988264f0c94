use std::path::Path;

use serde::{Deserialize, Serialize};

use super::ExtractionError;

/// Text extracted from a single receipt photo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedText {
    pub text: String,
    /// Dimensions after orientation correction.
    pub width: u32,
    pub height: u32,
}

impl ExtractedText {
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// Raw OCR result from the engine
#[derive(Debug)]
pub struct OcrPageResult {
    pub text: String,
}

/// Grayscale image ready for OCR.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub png_bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub orientation: u32,
}

/// OCR engine abstraction (allows mocking for tests).
/// Language selection belongs to the engine's own configuration.
pub trait OcrEngine {
    fn ocr_image(&self, image_bytes: &[u8]) -> Result<OcrPageResult, ExtractionError>;
}

/// Image file → text. The first step of the receipt pipeline.
pub trait TextExtractor {
    fn extract(&self, image_path: &Path) -> Result<ExtractedText, ExtractionError>;
}
