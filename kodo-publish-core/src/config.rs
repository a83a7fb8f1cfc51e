use std::path::PathBuf;

use tracing::{debug, info};

use crate::contract::Credentials;
use crate::retry::RetryPolicy;

/// Maximum number of uploads in flight at once.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// `Cache-Control` value applied to published HTML pages.
pub const HTML_CACHE_CONTROL: &str = "public, max-age=1800";

/// Everything one publish run needs.
#[derive(Debug, Clone)]
pub struct PublishConfig {
    pub credentials: Credentials,
    pub bucket: String,
    /// Local directory to scan. Resolved by the caller.
    pub source_dir: PathBuf,
    /// Remote key prefix.
    pub dest_dir: String,
    pub overwrite: bool,
    pub ignore_source_map: bool,
    /// CDN domain for HTML maintenance. `None` disables headers and refresh.
    pub cdn_domain: Option<String>,
    pub concurrency: usize,
    pub retry: RetryPolicy,
}

impl PublishConfig {
    pub fn new(
        credentials: Credentials,
        bucket: impl Into<String>,
        source_dir: impl Into<PathBuf>,
        dest_dir: impl Into<String>,
    ) -> Self {
        Self {
            credentials,
            bucket: bucket.into(),
            source_dir: source_dir.into(),
            dest_dir: dest_dir.into(),
            overwrite: false,
            ignore_source_map: false,
            cdn_domain: None,
            concurrency: DEFAULT_CONCURRENCY,
            retry: RetryPolicy::default(),
        }
    }

    /// CDN base URL with scheme and without trailing slash, if a domain is set.
    pub fn cdn_base_url(&self) -> Option<String> {
        let domain = self.cdn_domain.as_deref()?.trim().trim_end_matches('/');
        if domain.is_empty() {
            return None;
        }
        if domain.starts_with("http://") || domain.starts_with("https://") {
            Some(domain.to_string())
        } else {
            Some(format!("https://{domain}"))
        }
    }

    pub fn trace_loaded(&self) {
        info!(
            bucket = %self.bucket,
            source_dir = %self.source_dir.display(),
            dest_dir = %self.dest_dir,
            overwrite = self.overwrite,
            ignore_source_map = self.ignore_source_map,
            cdn_domain = self.cdn_domain.as_deref().unwrap_or(""),
            concurrency = self.concurrency,
            retries = self.retry.retries,
            "Loaded PublishConfig"
        );
        debug!(?self, "PublishConfig loaded (full debug)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(domain: Option<&str>) -> PublishConfig {
        let mut config = PublishConfig::new(Credentials::new("ak", "sk"), "b", "/tmp", "out");
        config.cdn_domain = domain.map(str::to_string);
        config
    }

    #[test]
    fn cdn_base_url_adds_scheme_and_trims_slash() {
        assert_eq!(
            config(Some("cdn.example.com/")).cdn_base_url().as_deref(),
            Some("https://cdn.example.com")
        );
        assert_eq!(
            config(Some("http://cdn.example.com")).cdn_base_url().as_deref(),
            Some("http://cdn.example.com")
        );
    }

    #[test]
    fn blank_cdn_domain_disables_cdn() {
        assert_eq!(config(Some("  ")).cdn_base_url(), None);
        assert_eq!(config(None).cdn_base_url(), None);
    }
}
