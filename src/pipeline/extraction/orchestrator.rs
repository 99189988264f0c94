use std::path::Path;

use super::preprocess::prepare_for_ocr;
use super::types::{ExtractedText, OcrEngine, TextExtractor};
use super::ExtractionError;

/// Photo → grayscale → OCR → trimmed text.
pub struct ReceiptTextExtractor {
    ocr: Box<dyn OcrEngine + Send + Sync>,
}

impl ReceiptTextExtractor {
    pub fn new(ocr: Box<dyn OcrEngine + Send + Sync>) -> Self {
        Self { ocr }
    }
}

impl TextExtractor for ReceiptTextExtractor {
    fn extract(&self, image_path: &Path) -> Result<ExtractedText, ExtractionError> {
        if !image_path.exists() {
            return Err(ExtractionError::NotFound(image_path.to_path_buf()));
        }

        let bytes = std::fs::read(image_path)?;
        let prepared = prepare_for_ocr(&bytes)?;
        let page = self.ocr.ocr_image(&prepared.png_bytes)?;

        let text = page.text.trim().to_string();
        if text.is_empty() {
            tracing::warn!(
                size = format!("{}x{}", prepared.width, prepared.height),
                "OCR produced no text"
            );
            return Err(ExtractionError::BlankText);
        }

        tracing::debug!(chars = text.chars().count(), "Receipt text extracted");

        Ok(ExtractedText {
            text,
            width: prepared.width,
            height: prepared.height,
        })
    }
}
