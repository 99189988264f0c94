use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::ArchiveError;
use crate::pipeline::structuring::{ClassifiedReceipt, ExpenseCategory, LineItem};

/// Stored in place of the image URL when no upload happened.
pub const REFERENCE_PLACEHOLDER: &str = "N/A";

/// An expense ready for the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseRecord {
    pub date: NaiveDate,
    pub amount: f64,
    pub category: ExpenseCategory,
    /// Public image URL, or [`REFERENCE_PLACEHOLDER`].
    pub reference: String,
    pub merchant: Option<String>,
    pub items: Vec<LineItem>,
}

impl ExpenseRecord {
    /// The receipt's own date wins; `fallback_date` is used when the model
    /// could not read one.
    pub fn from_receipt(
        receipt: &ClassifiedReceipt,
        reference: String,
        fallback_date: NaiveDate,
    ) -> Self {
        Self {
            date: receipt.date.unwrap_or(fallback_date),
            amount: receipt.total,
            category: receipt.category,
            reference,
            merchant: receipt.merchant.clone(),
            items: receipt.items.clone(),
        }
    }
}

/// Wire body for `POST /api/gastos`.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct LedgerEntry {
    pub fecha: String,
    pub concepto: String,
    pub categoria: String,
    pub monto: f64,
}

impl From<&ExpenseRecord> for LedgerEntry {
    fn from(record: &ExpenseRecord) -> Self {
        Self {
            fecha: record.date.format("%Y-%m-%d").to_string(),
            concepto: record.reference.clone(),
            categoria: record.category.label().to_string(),
            monto: record.amount,
        }
    }
}

/// Durable storage for receipt photos.
pub trait ImageUploader {
    /// Store `bytes` under `key` and return its public URL.
    fn upload(&self, bytes: &[u8], content_type: &str, key: &str) -> Result<String, ArchiveError>;
}

/// Downstream system of record.
pub trait LedgerClient {
    fn submit(&self, record: &ExpenseRecord) -> Result<(), ArchiveError>;
}
