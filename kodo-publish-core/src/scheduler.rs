//! Bounded-concurrency dispatch of upload tasks.
//!
//! Tasks are submitted in plan order to a fixed number of worker slots. The
//! batch fails as soon as one task runs out of retries: the failure signal
//! fires right away and nothing new is dispatched. Uploads already in flight
//! are never cancelled; they are drained before the batch returns.

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::contract::Reporter;
use crate::error::PublishError;
use crate::executor::UploadReceipt;
use crate::plan::UploadTask;
use crate::uploader::Uploader;

/// Receipts of every task on success, or the error that failed the batch.
pub type BatchResult = Result<Vec<UploadReceipt>, PublishError>;

/// Run all `tasks` with at most `concurrency` uploads in flight.
///
/// On failure `reporter.on_batch_failed` is called exactly once, before the
/// in-flight uploads are drained. Success is not signalled here; the caller
/// still has post-processing to do.
pub async fn run_batch(
    uploader: &Uploader,
    reporter: &Arc<dyn Reporter>,
    tasks: Vec<UploadTask>,
    concurrency: usize,
) -> BatchResult {
    let slots = concurrency.max(1);
    let total = tasks.len();
    info!(total, concurrency = slots, "[PUBLISH] Dispatching uploads");

    let mut queue = tasks.into_iter();
    let mut in_flight = JoinSet::new();
    let mut receipts = Vec::with_capacity(total);
    let mut failure: Option<PublishError> = None;

    loop {
        while failure.is_none() && in_flight.len() < slots {
            let Some(task) = queue.next() else { break };
            let uploader = uploader.clone();
            debug!(key = %task.destination_key, "[PUBLISH] Submitting task");
            in_flight.spawn(async move { uploader.upload(&task).await });
        }

        let Some(joined) = in_flight.join_next().await else {
            break;
        };

        let outcome = match joined {
            Ok(Ok(receipt)) => {
                receipts.push(receipt);
                continue;
            }
            Ok(Err(e)) => PublishError::Upload(e),
            Err(e) => PublishError::Worker(e.to_string()),
        };

        if failure.is_none() {
            error!(error = %outcome, in_flight = in_flight.len(), "[PUBLISH][ERROR] Batch failed");
            reporter.on_batch_failed(&outcome);
            failure = Some(outcome);
        } else {
            warn!(error = %outcome, "[PUBLISH] Additional failure after batch already failed");
        }
    }

    match failure {
        Some(e) => {
            let skipped = queue.len();
            if skipped > 0 {
                warn!(skipped, "[PUBLISH] Tasks not dispatched after failure");
            }
            Err(e)
        }
        None => {
            info!(uploaded = receipts.len(), "[PUBLISH] All uploads succeeded");
            Ok(receipts)
        }
    }
}
