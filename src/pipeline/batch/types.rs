use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pipeline::processor::PipelineOutcome;

/// Identifies one inbound message's attachments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchId(Uuid);

impl BatchId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub(crate) fn shard_index(&self, shard_count: usize) -> usize {
        (self.0.as_u128() % shard_count as u128) as usize
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One attachment's work order. Consumed by exactly one worker.
#[derive(Debug, Clone)]
pub struct AttachmentJob {
    pub batch_id: BatchId,
    pub sender: String,
    /// Zero-based position within the inbound message.
    pub index: usize,
    pub media_url: String,
}

/// Counters for an in-flight batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchState {
    pub sender: String,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchState {
    pub fn new(sender: &str, total: usize) -> Self {
        Self {
            sender: sender.to_string(),
            total,
            succeeded: 0,
            failed: 0,
        }
    }

    pub fn record(&mut self, outcome: &PipelineOutcome) {
        match outcome {
            PipelineOutcome::Success => self.succeeded += 1,
            PipelineOutcome::Failure(_) => self.failed += 1,
        }
    }

    pub fn completed(&self) -> usize {
        self.succeeded + self.failed
    }

    pub fn is_complete(&self) -> bool {
        self.completed() >= self.total
    }
}

/// Final tally for a batch, sent once to the sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub batch_id: BatchId,
    pub sender: String,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn from_state(batch_id: BatchId, state: BatchState) -> Self {
        Self {
            batch_id,
            sender: state.sender,
            total: state.total,
            succeeded: state.succeeded,
            failed: state.failed,
        }
    }

    /// User-facing text. Counts only; never error detail.
    pub fn message(&self) -> String {
        let (icon, headline) = if self.failed == 0 {
            ("✅", "All done!")
        } else if self.succeeded == 0 {
            ("❌", "Nothing could be recorded.")
        } else {
            ("⚠️", "Done, with problems.")
        };
        let mut text = format!(
            "{icon} {headline} {} {}: {} succeeded, {} failed.",
            self.total,
            receipts_noun(self.total),
            self.succeeded,
            self.failed
        );
        if self.failed > 0 {
            text.push_str(" Failed receipts were not recorded; try sending a clearer photo.");
        }
        text
    }
}

/// Sent as soon as a batch is accepted.
pub fn acknowledgement_message(attachments: usize) -> String {
    format!(
        "Got {attachments} {}. Analysing, hang tight...",
        receipts_noun(attachments)
    )
}

fn receipts_noun(n: usize) -> &'static str {
    if n == 1 {
        "receipt"
    } else {
        "receipts"
    }
}
