//! Single upload attempt: transfer one file and classify the outcome.

use std::path::PathBuf;

use tracing::{debug, error};

use crate::contract::{ObjectStore, RemoteResponse, Reporter, ServiceError, UploadToken};
use crate::error::UploadError;
use crate::plan::UploadTask;

/// Proof that a file reached the bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub source_path: PathBuf,
    pub destination_key: String,
}

/// Classify the result of a put call. First match wins:
/// transport error, missing response info, status 200, any other status.
pub fn classify(
    task: &UploadTask,
    result: Result<RemoteResponse, ServiceError>,
) -> Result<UploadReceipt, UploadError> {
    let response = match result {
        Ok(response) => response,
        Err(e) => {
            return Err(UploadError::Transport {
                task: task.clone(),
                message: e.message,
                trace: e.trace,
            })
        }
    };

    match response.status_code {
        None => Err(UploadError::NoResponseInfo { task: task.clone() }),
        Some(200) => Ok(UploadReceipt {
            source_path: task.source_path.clone(),
            destination_key: task.destination_key.clone(),
        }),
        Some(status_code) => Err(UploadError::Status {
            task: task.clone(),
            status_code,
            body: response.body,
        }),
    }
}

/// Put `task`'s file with `token` and report it once it is confirmed.
///
/// The progress notification is emitted before this future resolves.
pub async fn execute(
    store: &dyn ObjectStore,
    reporter: &dyn Reporter,
    token: &UploadToken,
    task: &UploadTask,
) -> Result<UploadReceipt, UploadError> {
    debug!(file = %task.source_path.display(), key = %task.destination_key, "[UPLOAD] Putting object");
    let result = store
        .put_object(token, &task.destination_key, &task.source_path)
        .await;

    match classify(task, result) {
        Ok(receipt) => {
            reporter.on_file_uploaded(&receipt.source_path, &receipt.destination_key);
            Ok(receipt)
        }
        Err(e) => {
            error!(key = %task.destination_key, error = %e, "[UPLOAD] Attempt failed");
            Err(e)
        }
    }
}
