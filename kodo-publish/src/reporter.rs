//! Reporter that turns publish progress into log lines.

use std::path::Path;

use kodo_publish_core::contract::Reporter;
use kodo_publish_core::error::PublishError;

pub struct LogReporter {
    bucket: String,
}

impl LogReporter {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
        }
    }
}

impl Reporter for LogReporter {
    fn on_file_uploaded(&self, source_path: &Path, destination_key: &str) {
        tracing::info!(
            "[UPLOAD] Success: {} => [{}]: {}",
            source_path.display(),
            self.bucket,
            destination_key
        );
    }

    fn on_batch_complete(&self) {
        tracing::info!("[PUBLISH] Done!");
    }

    fn on_batch_failed(&self, error: &PublishError) {
        tracing::error!(error = %error, "[PUBLISH] {error}");
    }
}
