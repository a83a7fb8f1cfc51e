//! High-level pipeline: plan → upload → HTML maintenance → report.
//!
//! [`publish`] is the single entrypoint used by the CLI and the integration
//! tests. It owns the terminal signal: exactly one of
//! [`Reporter::on_batch_complete`] or [`Reporter::on_batch_failed`] fires per run.
//!
//! # Error Handling
//! - Planning errors (missing source directory, unmappable path) are fatal and
//!   are signalled before any upload starts.
//! - An upload that exhausts its retries fails the batch.
//! - HTML maintenance failures are logged and recorded in the report only.

use std::sync::Arc;

use tracing::{error, info};

use crate::config::PublishConfig;
use crate::contract::{CdnRefresher, ObjectStore, Reporter, TokenProvider};
use crate::error::PublishError;
use crate::executor::UploadReceipt;
use crate::plan::plan_uploads;
use crate::postprocess::{HtmlMaintenance, PostProcessReport};
use crate::scheduler::run_batch;
use crate::uploader::Uploader;

/// The remote capabilities and the reporting sink for a run.
#[derive(Clone)]
pub struct Services {
    pub tokens: Arc<dyn TokenProvider>,
    pub store: Arc<dyn ObjectStore>,
    pub cdn: Arc<dyn CdnRefresher>,
    pub reporter: Arc<dyn Reporter>,
}

#[derive(Debug)]
pub struct PublishReport {
    pub uploaded: Vec<UploadReceipt>,
    pub html_keys: Vec<String>,
    /// `None` when HTML maintenance did not run.
    pub post_process: Option<PostProcessReport>,
}

pub async fn publish(config: &PublishConfig, services: &Services) -> Result<PublishReport, PublishError> {
    info!(bucket = %config.bucket, "[PUBLISH] Starting publish run");

    let plan = match plan_uploads(config) {
        Ok(plan) => plan,
        Err(e) => {
            let e = PublishError::from(e);
            error!(error = %e, "[PUBLISH][ERROR] Planning failed, nothing uploaded");
            services.reporter.on_batch_failed(&e);
            return Err(e);
        }
    };

    let uploader = Uploader::new(
        config.bucket.clone(),
        config.credentials.clone(),
        services.tokens.clone(),
        services.store.clone(),
        services.reporter.clone(),
        config.retry.clone(),
    );

    let uploaded = run_batch(&uploader, &services.reporter, plan.tasks, config.concurrency).await?;

    let post_process = match config.cdn_base_url() {
        Some(cdn_base_url) if !plan.html_keys.is_empty() => {
            let maintenance = HtmlMaintenance {
                bucket: config.bucket.clone(),
                credentials: config.credentials.clone(),
                cdn_base_url,
                concurrency: config.concurrency,
                store: services.store.clone(),
                cdn: services.cdn.clone(),
            };
            Some(maintenance.run(&plan.html_keys).await)
        }
        Some(_) => None,
        None => {
            info!(
                html = plan.html_keys.len(),
                "[PUBLISH] No CDN domain configured, skipping HTML maintenance"
            );
            None
        }
    };

    services.reporter.on_batch_complete();
    info!(uploaded = uploaded.len(), "[PUBLISH] Publish run complete");

    Ok(PublishReport {
        uploaded,
        html_keys: plan.html_keys,
        post_process,
    })
}
