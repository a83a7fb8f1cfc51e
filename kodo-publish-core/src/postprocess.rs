//! HTML maintenance after a successful batch.
//!
//! Three stages, always in this order:
//! 1. set `Cache-Control` on every HTML object,
//! 2. refresh the CDN URL of every HTML object,
//! 3. refresh the CDN root directory.
//!
//! Each stage returns its own result. [`run`] logs stage failures and moves
//! on; nothing here can fail the publish run.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{error, info, warn};

use crate::config::HTML_CACHE_CONTROL;
use crate::contract::{CdnRefresher, Credentials, ObjectStore, RemoteResponse, ServiceError};

/// Most URLs the CDN accepts in a single refresh request.
pub const MAX_URLS_PER_REFRESH: usize = 60;

/// Failure of one post-processing stage.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StageError {
    #[error("failed to set headers on {} of {total} objects: {}", .failures.len(), describe(.failures))]
    Headers {
        total: usize,
        failures: Vec<(String, String)>,
    },
    #[error("CDN refresh of {target} failed: {reason}")]
    Refresh { target: String, reason: String },
}

fn describe(failures: &[(String, String)]) -> String {
    failures
        .iter()
        .map(|(key, reason)| format!("{key} ({reason})"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Outcome of each stage that ran.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostProcessReport {
    pub headers: Option<Result<usize, StageError>>,
    pub url_refresh: Option<Result<usize, StageError>>,
    pub root_refresh: Option<Result<(), StageError>>,
}

/// Inputs for the HTML stages.
#[derive(Clone)]
pub struct HtmlMaintenance {
    pub bucket: String,
    pub credentials: Credentials,
    /// Scheme and host, no trailing slash.
    pub cdn_base_url: String,
    pub concurrency: usize,
    pub store: Arc<dyn ObjectStore>,
    pub cdn: Arc<dyn CdnRefresher>,
}

fn response_reason(result: Result<RemoteResponse, ServiceError>) -> Result<(), String> {
    match result {
        Ok(response) if response.is_ok() => Ok(()),
        Ok(RemoteResponse {
            status_code: Some(code),
            ..
        }) => Err(format!("status code {code}")),
        Ok(_) => Err("no response info received".to_string()),
        Err(e) => Err(e.message),
    }
}

impl HtmlMaintenance {
    /// Stage 1. Every key is attempted even when others fail.
    pub async fn set_cache_headers(&self, keys: &[String]) -> Result<usize, StageError> {
        let headers = BTreeMap::from([("Cache-Control".to_string(), HTML_CACHE_CONTROL.to_string())]);

        let failures: Vec<(String, String)> = stream::iter(keys)
            .map(|key| {
                let headers = &headers;
                async move {
                    let result = self
                        .store
                        .set_object_headers(&self.bucket, &self.credentials, key, headers)
                        .await;
                    match response_reason(result) {
                        Ok(()) => {
                            info!(key = %key, "[HTML] Cache-Control updated");
                            None
                        }
                        Err(reason) => {
                            warn!(key = %key, %reason, "[HTML] Failed to update Cache-Control");
                            Some((key.clone(), reason))
                        }
                    }
                }
            })
            .buffer_unordered(self.concurrency.max(1))
            .filter_map(|failure| async move { failure })
            .collect()
            .await;

        if failures.is_empty() {
            Ok(keys.len())
        } else {
            Err(StageError::Headers {
                total: keys.len(),
                failures,
            })
        }
    }

    pub fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.cdn_base_url, key)
    }

    /// Stage 2. URLs go out in chunks the CDN accepts.
    pub async fn refresh_urls(&self, keys: &[String]) -> Result<usize, StageError> {
        let urls: Vec<String> = keys.iter().map(|key| self.url_for(key)).collect();
        for chunk in urls.chunks(MAX_URLS_PER_REFRESH) {
            let result = self.cdn.invalidate_urls(&self.credentials, chunk).await;
            response_reason(result).map_err(|reason| StageError::Refresh {
                target: format!("{} url(s) starting with {}", chunk.len(), chunk[0]),
                reason,
            })?;
            info!(count = chunk.len(), "[HTML] CDN URL refresh requested");
        }
        Ok(urls.len())
    }

    /// Stage 3.
    pub async fn refresh_root(&self) -> Result<(), StageError> {
        let root = format!("{}/", self.cdn_base_url);
        let result = self
            .cdn
            .invalidate_directories(&self.credentials, std::slice::from_ref(&root))
            .await;
        response_reason(result).map_err(|reason| StageError::Refresh {
            target: root.clone(),
            reason,
        })?;
        info!(dir = %root, "[HTML] CDN root refresh requested");
        Ok(())
    }

    /// Run all stages in order. Failures are logged, never returned.
    pub async fn run(&self, html_keys: &[String]) -> PostProcessReport {
        let mut report = PostProcessReport::default();
        if html_keys.is_empty() {
            info!("[HTML] No HTML files published, skipping cache maintenance");
            return report;
        }

        let headers = self.set_cache_headers(html_keys).await;
        if let Err(e) = &headers {
            error!(error = %e, "[HTML][ERROR] Setting cache headers failed");
        }
        report.headers = Some(headers);

        let urls = self.refresh_urls(html_keys).await;
        if let Err(e) = &urls {
            error!(error = %e, "[HTML][ERROR] CDN URL refresh failed");
        }
        report.url_refresh = Some(urls);

        let root = self.refresh_root().await;
        if let Err(e) = &root {
            error!(error = %e, "[HTML][ERROR] CDN root refresh failed");
        }
        report.root_refresh = Some(root);

        report
    }
}
