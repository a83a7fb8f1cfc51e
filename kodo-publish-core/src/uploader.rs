//! Retried upload of a single task against the configured capabilities.

use std::sync::Arc;

use tracing::{error, info};

use crate::contract::{Credentials, ObjectStore, Reporter, TokenProvider, TokenScope};
use crate::error::UploadError;
use crate::executor::{execute, UploadReceipt};
use crate::plan::UploadTask;
use crate::retry::{retry, RetryPolicy};

/// Bundles what every upload attempt needs. Cheap to clone into workers.
#[derive(Clone)]
pub struct Uploader {
    bucket: String,
    credentials: Credentials,
    tokens: Arc<dyn TokenProvider>,
    store: Arc<dyn ObjectStore>,
    reporter: Arc<dyn Reporter>,
    retry: RetryPolicy,
}

impl Uploader {
    pub fn new(
        bucket: impl Into<String>,
        credentials: Credentials,
        tokens: Arc<dyn TokenProvider>,
        store: Arc<dyn ObjectStore>,
        reporter: Arc<dyn Reporter>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            credentials,
            tokens,
            store,
            reporter,
            retry,
        }
    }

    /// One attempt: issue a fresh token for this attempt, then put the file.
    pub async fn attempt(&self, task: &UploadTask) -> Result<UploadReceipt, UploadError> {
        let scope = TokenScope::for_upload(task.overwrite, &task.destination_key);
        let token = self
            .tokens
            .issue_token(&self.bucket, &self.credentials, &scope)
            .await
            .map_err(|source| UploadError::Token {
                task: task.clone(),
                source,
            })?;

        execute(self.store.as_ref(), self.reporter.as_ref(), &token, task).await
    }

    /// Upload `task`, retrying every kind of failure up to the policy bound.
    pub async fn upload(&self, task: &UploadTask) -> Result<UploadReceipt, UploadError> {
        let result = retry(&self.retry, &task.destination_key, |_| self.attempt(task)).await;
        match &result {
            Ok(_) => info!(key = %task.destination_key, "[UPLOAD] Upload succeeded"),
            Err(e) => error!(
                key = %task.destination_key,
                attempts = self.retry.retries + 1,
                error = %e,
                "[UPLOAD][ERROR] Giving up on file"
            ),
        }
        result
    }
}
