//! Receipt processing orchestrator.
//!
//! Drives one attachment through extract → classify → archive. Each step
//! short-circuits: nothing downstream runs once a step has failed. The
//! result is folded into a [`PipelineOutcome`] for the batch coordinator;
//! error detail goes to the log only.

use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::config::AppConfig;
use crate::pipeline::archive::{
    ArchiveError, Archiver, ExpenseRecord, HttpLedgerClient, HttpObjectStore, ImageUploader,
};
use crate::pipeline::extraction::{
    ExtractionError, ReceiptTextExtractor, TesseractCli, TextExtractor,
};
use crate::pipeline::structuring::{
    GeminiClient, LlmClient, LlmReceiptClassifier, ReceiptClassifier, StructuringError,
};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Classification failed: {0}")]
    Classification(#[from] StructuringError),

    #[error("Persistence failed: {0}")]
    Persistence(#[from] ArchiveError),

    #[error("Service setup failed: {0}")]
    Setup(String),
}

impl ProcessingError {
    pub fn failure_reason(&self) -> FailureReason {
        match self {
            ProcessingError::Extraction(_) => FailureReason::ExtractionFailed,
            ProcessingError::Classification(_) => FailureReason::ClassificationFailed,
            ProcessingError::Persistence(_) => FailureReason::PersistenceFailed,
            ProcessingError::Setup(_) => FailureReason::Unexpected,
        }
    }
}

// ---------------------------------------------------------------------------
// Outcome types
// ---------------------------------------------------------------------------

/// Why an attachment did not make it into the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    DownloadFailed,
    ExtractionFailed,
    ClassificationFailed,
    PersistenceFailed,
    Unexpected,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureReason::DownloadFailed => "download_failed",
            FailureReason::ExtractionFailed => "extraction_failed",
            FailureReason::ClassificationFailed => "classification_failed",
            FailureReason::PersistenceFailed => "persistence_failed",
            FailureReason::Unexpected => "unexpected",
        };
        f.write_str(s)
    }
}

/// Result of one attachment, as reported to the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PipelineOutcome {
    Success,
    Failure(FailureReason),
}

impl PipelineOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PipelineOutcome::Success)
    }
}

// ---------------------------------------------------------------------------
// Processor
// ---------------------------------------------------------------------------

pub struct ReceiptProcessor {
    extractor: Box<dyn TextExtractor + Send + Sync>,
    classifier: Box<dyn ReceiptClassifier + Send + Sync>,
    archiver: Archiver,
}

impl ReceiptProcessor {
    pub fn new(
        extractor: Box<dyn TextExtractor + Send + Sync>,
        classifier: Box<dyn ReceiptClassifier + Send + Sync>,
        archiver: Archiver,
    ) -> Self {
        Self {
            extractor,
            classifier,
            archiver,
        }
    }

    /// Run the pipeline and collapse the result into an outcome.
    pub fn process(&self, image_path: &Path) -> PipelineOutcome {
        match self.run(image_path) {
            Ok(_) => PipelineOutcome::Success,
            Err(e) => {
                let reason = e.failure_reason();
                tracing::warn!(error = %e, %reason, "Receipt pipeline failed");
                PipelineOutcome::Failure(reason)
            }
        }
    }

    /// Extract → classify → archive, stopping at the first error.
    pub fn run(&self, image_path: &Path) -> Result<ExpenseRecord, ProcessingError> {
        tracing::info!(path = %image_path.display(), "Processing: extracting text");
        let extracted = self.extractor.extract(image_path)?;

        tracing::info!(chars = extracted.char_count(), "Processing: classifying");
        let receipt = self.classifier.classify(&extracted.text)?;

        tracing::info!(total = receipt.total, category = %receipt.category, "Processing: archiving");
        let record = self.archiver.archive(&receipt, image_path)?;

        Ok(record)
    }
}

/// Build the production processor from configuration.
///
/// Creates blocking HTTP clients, so it must run outside any async runtime.
pub fn build_processor(config: &AppConfig) -> Result<ReceiptProcessor, ProcessingError> {
    let ocr = TesseractCli::new(&config.ocr.command, config.http_timeout)
        .with_languages(&config.ocr.language);
    match ocr.probe() {
        Ok(version) => tracing::info!(%version, "Tesseract available"),
        Err(e) => return Err(ProcessingError::Setup(e.to_string())),
    }
    let extractor = ReceiptTextExtractor::new(Box::new(ocr));

    let gemini = GeminiClient::new(
        &config.gemini.base_url,
        &config.gemini.api_key,
        config.http_timeout,
    )
    .map_err(|e| ProcessingError::Setup(e.to_string()))?;
    match gemini.is_model_available(&config.gemini.model) {
        Ok(true) => tracing::info!(model = %config.gemini.model, "Gemini model available"),
        Ok(false) => tracing::warn!(model = %config.gemini.model, "Gemini model not found"),
        Err(e) => tracing::warn!(error = %e, "Could not verify Gemini model"),
    }
    let classifier = LlmReceiptClassifier::new(Box::new(gemini), &config.gemini.model);

    let uploader: Option<Box<dyn ImageUploader + Send + Sync>> = match &config.storage {
        Some(storage) => Some(Box::new(
            HttpObjectStore::new(
                &storage.upload_base_url,
                &storage.public_base_url,
                storage.api_token.as_deref(),
                config.http_timeout,
            )
            .map_err(|e| ProcessingError::Setup(e.to_string()))?,
        )),
        None => {
            tracing::info!("No object storage configured, records will carry a placeholder reference");
            None
        }
    };
    let ledger = HttpLedgerClient::new(
        &config.ledger.base_url,
        &config.ledger.api_token,
        config.http_timeout,
    )
    .map_err(|e| ProcessingError::Setup(e.to_string()))?;

    Ok(ReceiptProcessor::new(
        Box::new(extractor),
        Box::new(classifier),
        Archiver::new(uploader, Box::new(ledger)),
    ))
}
