use std::any::Any;
use std::io::Write;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex, PoisonError};

use tokio::task::{JoinHandle, JoinSet};

use super::coordinator::BatchCoordinator;
use super::types::{acknowledgement_message, AttachmentJob, BatchId};
use super::CoordinatorError;
use crate::messaging::{MediaFetcher, Messenger};
use crate::pipeline::processor::{FailureReason, PipelineOutcome, ReceiptProcessor};

/// Handle to a dispatched batch. Awaiting `supervisor` waits for every worker.
pub struct BatchHandle {
    pub batch_id: BatchId,
    pub supervisor: JoinHandle<()>,
}

/// Everything a worker needs, shared across the batch.
struct WorkerContext {
    coordinator: Arc<BatchCoordinator>,
    processor: Arc<ReceiptProcessor>,
    fetcher: Arc<dyn MediaFetcher + Send + Sync>,
    temp_dir: PathBuf,
}

/// Fans a batch out to one blocking worker per attachment.
pub struct BatchDispatcher {
    ctx: Arc<WorkerContext>,
    messenger: Arc<dyn Messenger + Send + Sync>,
}

impl BatchDispatcher {
    pub fn new(
        coordinator: Arc<BatchCoordinator>,
        processor: Arc<ReceiptProcessor>,
        messenger: Arc<dyn Messenger + Send + Sync>,
        fetcher: Arc<dyn MediaFetcher + Send + Sync>,
        temp_dir: PathBuf,
    ) -> Self {
        Self {
            ctx: Arc::new(WorkerContext {
                coordinator,
                processor,
                fetcher,
                temp_dir,
            }),
            messenger,
        }
    }

    pub fn coordinator(&self) -> &Arc<BatchCoordinator> {
        &self.ctx.coordinator
    }

    /// Register the batch and start its supervisor. Returns immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn dispatch(
        &self,
        sender: &str,
        media_urls: Vec<String>,
    ) -> Result<BatchHandle, CoordinatorError> {
        let batch_id = self.ctx.coordinator.register_batch(sender, media_urls.len())?;
        let jobs: Vec<AttachmentJob> = media_urls
            .into_iter()
            .enumerate()
            .map(|(index, media_url)| AttachmentJob {
                batch_id,
                sender: sender.to_string(),
                index,
                media_url,
            })
            .collect();

        let ctx = self.ctx.clone();
        let messenger = self.messenger.clone();
        let sender = sender.to_string();
        let supervisor = tokio::spawn(async move {
            supervise(ctx, messenger, sender, batch_id, jobs).await;
        });

        Ok(BatchHandle {
            batch_id,
            supervisor,
        })
    }
}

async fn supervise(
    ctx: Arc<WorkerContext>,
    messenger: Arc<dyn Messenger + Send + Sync>,
    sender: String,
    batch_id: BatchId,
    jobs: Vec<AttachmentJob>,
) {
    // Workers start right away; only their completion reports wait for the
    // ack attempt, so the ack always precedes the summary.
    let gate = Arc::new(AckGate::default());
    let open_on_drop = OpenOnDrop(gate.clone());
    let ack = acknowledgement_message(jobs.len());
    let ack_task = tokio::task::spawn_blocking(move || {
        let _open = open_on_drop;
        messenger.send_text(&sender, &ack)
    });

    let mut workers = JoinSet::new();
    for job in jobs {
        let ctx = ctx.clone();
        let gate = gate.clone();
        workers.spawn_blocking(move || run_worker(&ctx, &gate, job));
    }

    match ack_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(%batch_id, error = %e, "Acknowledgement not delivered"),
        Err(e) => tracing::warn!(%batch_id, error = %e, "Acknowledgement task failed"),
    }

    while let Some(joined) = workers.join_next().await {
        if let Err(e) = joined {
            // Panics are caught inside the worker; this is a cancelled task.
            tracing::error!(%batch_id, error = %e, "Receipt worker did not complete");
        }
    }
    tracing::debug!(%batch_id, "All receipt workers joined");
}

/// Blocks completion reports until the acknowledgement attempt is over,
/// whether it was delivered or not.
#[derive(Default)]
struct AckGate {
    done: Mutex<bool>,
    cond: Condvar,
}

impl AckGate {
    fn open(&self) {
        let mut done = self.done.lock().unwrap_or_else(PoisonError::into_inner);
        *done = true;
        self.cond.notify_all();
    }

    fn wait(&self) {
        let mut done = self.done.lock().unwrap_or_else(PoisonError::into_inner);
        while !*done {
            done = self.cond.wait(done).unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Opens the gate when the ack task ends, including by panic or cancellation.
struct OpenOnDrop(Arc<AckGate>);

impl Drop for OpenOnDrop {
    fn drop(&mut self) {
        self.0.open();
    }
}

/// Runs on the blocking pool. Always reports exactly once.
fn run_worker(ctx: &WorkerContext, ack_gate: &AckGate, job: AttachmentJob) {
    let _span = tracing::info_span!(
        "receipt_pipeline",
        batch_id = %job.batch_id,
        index = job.index
    )
    .entered();

    let outcome = catch_unwind(AssertUnwindSafe(|| process_attachment(ctx, &job)))
        .unwrap_or_else(|panic| {
            tracing::error!(panic = %panic_message(panic.as_ref()), "Receipt worker panicked");
            PipelineOutcome::Failure(FailureReason::Unexpected)
        });

    tracing::info!(success = outcome.is_success(), "Attachment finished");
    ack_gate.wait();
    ctx.coordinator.report_completion(job.batch_id, &outcome);
}

fn process_attachment(ctx: &WorkerContext, job: &AttachmentJob) -> PipelineOutcome {
    let bytes = match ctx.fetcher.fetch(&job.media_url) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "Attachment download failed");
            return PipelineOutcome::Failure(FailureReason::DownloadFailed);
        }
    };

    // Deleted when dropped, including during unwinding.
    let staged = match stage_attachment(ctx, &bytes) {
        Ok(file) => file,
        Err(e) => {
            tracing::error!(error = %e, dir = %ctx.temp_dir.display(), "Could not stage attachment");
            return PipelineOutcome::Failure(FailureReason::Unexpected);
        }
    };

    ctx.processor.process(staged.path())
}

fn stage_attachment(
    ctx: &WorkerContext,
    bytes: &[u8],
) -> std::io::Result<tempfile::NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("receipt-")
        .suffix(".img")
        .tempfile_in(&ctx.temp_dir)?;
    file.write_all(bytes)?;
    file.flush()?;
    Ok(file)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
