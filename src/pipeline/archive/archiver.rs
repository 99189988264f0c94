use std::path::Path;

use chrono::{Local, NaiveDate};
use uuid::Uuid;

use super::types::{ExpenseRecord, ImageUploader, LedgerClient, REFERENCE_PLACEHOLDER};
use super::ArchiveError;
use crate::pipeline::structuring::ClassifiedReceipt;

/// Optional image upload followed by the ledger write.
pub struct Archiver {
    uploader: Option<Box<dyn ImageUploader + Send + Sync>>,
    ledger: Box<dyn LedgerClient + Send + Sync>,
}

impl Archiver {
    pub fn new(
        uploader: Option<Box<dyn ImageUploader + Send + Sync>>,
        ledger: Box<dyn LedgerClient + Send + Sync>,
    ) -> Self {
        Self { uploader, ledger }
    }

    /// Persist a classified receipt. Only the ledger write can fail the call;
    /// a failed upload leaves the placeholder reference.
    pub fn archive(
        &self,
        receipt: &ClassifiedReceipt,
        image_path: &Path,
    ) -> Result<ExpenseRecord, ArchiveError> {
        let today = Local::now().date_naive();
        let reference = self.reference_for(image_path, today);
        let record = ExpenseRecord::from_receipt(receipt, reference, today);

        self.ledger.submit(&record)?;

        tracing::info!(
            date = %record.date,
            amount = record.amount,
            category = %record.category,
            reference = %record.reference,
            "Expense recorded"
        );
        Ok(record)
    }

    fn reference_for(&self, image_path: &Path, today: NaiveDate) -> String {
        let Some(uploader) = &self.uploader else {
            return REFERENCE_PLACEHOLDER.to_string();
        };

        let result = std::fs::read(image_path)
            .map_err(ArchiveError::from)
            .and_then(|bytes| {
                let (content_type, ext) = sniff_image_type(&bytes);
                let key = format!("receipts/{}/{}.{}", today.format("%Y-%m-%d"), Uuid::new_v4(), ext);
                uploader.upload(&bytes, content_type, &key)
            });

        match result {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(error = %e, "Image upload failed, using placeholder reference");
                REFERENCE_PLACEHOLDER.to_string()
            }
        }
    }
}

/// MIME type and file extension from the image's magic bytes.
fn sniff_image_type(bytes: &[u8]) -> (&'static str, &'static str) {
    match image::guess_format(bytes) {
        Ok(image::ImageFormat::Jpeg) => ("image/jpeg", "jpg"),
        Ok(image::ImageFormat::Png) => ("image/png", "png"),
        Ok(image::ImageFormat::Tiff) => ("image/tiff", "tiff"),
        _ => ("application/octet-stream", "bin"),
    }
}
