use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::types::{BatchId, BatchState, BatchSummary};
use super::CoordinatorError;
use crate::messaging::Messenger;
use crate::pipeline::processor::PipelineOutcome;

pub const DEFAULT_SHARD_COUNT: usize = 16;

type Shard = Mutex<HashMap<BatchId, BatchState>>;

/// Tracks in-flight batches and emits one summary per batch.
///
/// State is spread over independently locked shards keyed by [`BatchId`].
/// Counting, the completion check and removal of a finished batch happen
/// in one critical section; the summary is sent after the lock is dropped.
pub struct BatchCoordinator {
    shards: Vec<Shard>,
    messenger: Arc<dyn Messenger + Send + Sync>,
}

impl BatchCoordinator {
    pub fn new(messenger: Arc<dyn Messenger + Send + Sync>) -> Self {
        Self::with_shards(messenger, DEFAULT_SHARD_COUNT)
    }

    pub fn with_shards(messenger: Arc<dyn Messenger + Send + Sync>, shard_count: usize) -> Self {
        let shard_count = shard_count.max(1);
        Self {
            shards: (0..shard_count).map(|_| Mutex::new(HashMap::new())).collect(),
            messenger,
        }
    }

    /// Start tracking a new batch. Must run before any of its workers start.
    pub fn register_batch(&self, sender: &str, total: usize) -> Result<BatchId, CoordinatorError> {
        if total == 0 {
            return Err(CoordinatorError::EmptyBatch);
        }
        let batch_id = BatchId::new();
        self.lock_shard(batch_id)
            .insert(batch_id, BatchState::new(sender, total));

        tracing::info!(%batch_id, sender, total, "Batch registered");
        Ok(batch_id)
    }

    /// Count one finished attachment. Returns the summary when this was the
    /// batch's last attachment, after handing it to the messenger.
    pub fn report_completion(
        &self,
        batch_id: BatchId,
        outcome: &PipelineOutcome,
    ) -> Option<BatchSummary> {
        let finished = {
            let mut shard = self.lock_shard(batch_id);
            let Some(state) = shard.get_mut(&batch_id) else {
                tracing::warn!(%batch_id, ?outcome, "Completion for unknown batch ignored");
                return None;
            };
            state.record(outcome);
            tracing::debug!(
                %batch_id,
                completed = state.completed(),
                total = state.total,
                "Attachment completed"
            );
            if state.is_complete() {
                shard.remove(&batch_id)
            } else {
                None
            }
        };

        let summary = BatchSummary::from_state(batch_id, finished?);
        tracing::info!(
            %batch_id,
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Batch finished"
        );
        self.deliver(&summary);
        Some(summary)
    }

    /// Number of batches still waiting for workers.
    pub fn in_flight(&self) -> usize {
        (0..self.shards.len())
            .map(|i| lock_recovering(&self.shards[i], i).len())
            .sum()
    }

    fn deliver(&self, summary: &BatchSummary) {
        if let Err(e) = self.messenger.send_text(&summary.sender, &summary.message()) {
            tracing::error!(batch_id = %summary.batch_id, error = %e, "Failed to deliver batch summary");
        }
    }

    fn lock_shard(&self, batch_id: BatchId) -> MutexGuard<'_, HashMap<BatchId, BatchState>> {
        let index = batch_id.shard_index(self.shards.len());
        lock_recovering(&self.shards[index], index)
    }
}

/// A panic while holding a shard must not wedge every batch on it.
fn lock_recovering(shard: &Shard, index: usize) -> MutexGuard<'_, HashMap<BatchId, BatchState>> {
    shard.lock().unwrap_or_else(|poisoned| {
        tracing::warn!(shard = index, "Batch shard lock was poisoned, recovering");
        poisoned.into_inner()
    })
}
