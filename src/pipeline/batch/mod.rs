//! Batch fan-out and aggregation.
//!
//! One inbound WhatsApp message becomes one batch. Each image attachment
//! runs through the receipt pipeline on its own blocking worker; the
//! coordinator counts completions and sends exactly one summary when the
//! last worker of the batch reports.
//!
//! ```text
//! webhook → BatchDispatcher::dispatch → register_batch
//!                                     → ack message
//!                                     → JoinSet[worker × N] → report_completion → summary
//! ```

pub mod types;
pub mod coordinator;
pub mod runner;

pub use types::*;
pub use coordinator::*;
pub use runner::*;

use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum CoordinatorError {
    #[error("A batch must contain at least one attachment")]
    EmptyBatch,
}
