//! Error types for the publish pipeline.
//!
//! Per-file failures ([`UploadError`]) carry structured fields; the human
//! readable message is only produced by `Display`, at the reporting boundary.

use serde_json::Value;

use crate::contract::ServiceError;
use crate::plan::{PlanError, UploadTask};

/// Classified failure of a single upload attempt.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UploadError {
    #[error("Upload failed - {task}, reason: token issuance failed: {}", .source.message)]
    Token { task: UploadTask, source: ServiceError },

    #[error(
        "Upload failed - {task}, error: {message}, stack: {}",
        .trace.as_deref().unwrap_or("no stack")
    )]
    Transport {
        task: UploadTask,
        message: String,
        trace: Option<String>,
    },

    #[error("Upload failed - {task}, reason: no response info received")]
    NoResponseInfo { task: UploadTask },

    #[error("Upload failed - {task}, status code: {status_code}{}", render_body(.body))]
    Status {
        task: UploadTask,
        status_code: u16,
        body: Option<Value>,
    },
}

impl UploadError {
    pub fn task(&self) -> &UploadTask {
        match self {
            UploadError::Token { task, .. }
            | UploadError::Transport { task, .. }
            | UploadError::NoResponseInfo { task }
            | UploadError::Status { task, .. } => task,
        }
    }
}

/// What the failure signal of a run carries.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Upload(#[from] UploadError),
    /// An upload worker panicked or was aborted by the runtime.
    #[error("upload worker failed: {0}")]
    Worker(String),
}

/// Suffix describing a response body, empty when there is none.
pub(crate) fn render_body(body: &Option<Value>) -> String {
    match body {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) if text.is_empty() => String::new(),
        Some(Value::String(text)) => format!(", response body: {text}"),
        Some(other) => match serde_json::to_string(other) {
            Ok(json) => format!(", response body: {json}"),
            Err(_) => ", response body: [unable to serialize]".to_string(),
        },
    }
}
