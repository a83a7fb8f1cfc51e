/// `load_config` module: loads a static YAML publish config and injects the Qiniu
/// secrets from the environment, producing a core [`PublishConfig`].
///
/// The YAML file never carries secrets. `QINIU_ACCESS_KEY` and `QINIU_SECRET_KEY`
/// must be present in the environment (a `.env` file is honoured by the binary).
///
/// # Errors
/// All failures are `anyhow::Error`s with the offending path or variable named,
/// surfaced at the CLI boundary.
use anyhow::Result;
use kodo_publish_core::config::{PublishConfig, DEFAULT_CONCURRENCY};
use kodo_publish_core::contract::Credentials;
use kodo_publish_core::retry::{RetryPolicy, DEFAULT_RETRIES};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

pub const ACCESS_KEY_ENV: &str = "QINIU_ACCESS_KEY";
pub const SECRET_KEY_ENV: &str = "QINIU_SECRET_KEY";

/// YAML-side shape of the config file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PublishSection {
    pub bucket: String,
    pub source_dir: PathBuf,
    #[serde(default)]
    pub dest_dir: String,
    #[serde(default)]
    pub overwrite: bool,
    #[serde(default)]
    pub ignore_source_map: bool,
    #[serde(default)]
    pub cdn_domain: Option<String>,
    #[serde(default)]
    pub concurrency: Option<usize>,
    #[serde(default)]
    pub retries: Option<u32>,
}

/// Resolves a relative source directory against the current working directory.
pub fn resolve_source_dir(dir: &Path) -> Result<PathBuf> {
    if dir.is_absolute() {
        return Ok(dir.to_path_buf());
    }
    let cwd = std::env::current_dir()
        .map_err(|e| anyhow::anyhow!("Failed to determine current directory: {e}"))?;
    Ok(cwd.join(dir))
}

fn credentials_from_env() -> Result<Credentials> {
    let read = |name: &str| {
        std::env::var(name)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| {
                error!(env_var = name, "Required environment variable missing");
                anyhow::anyhow!("{name} must be set in the environment")
            })
    };
    Ok(Credentials::new(read(ACCESS_KEY_ENV)?, read(SECRET_KEY_ENV)?))
}

/// Loads a static YAML config file (no secrets) and injects required env vars for secrets.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<PublishConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let raw: PublishSection = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    if raw.bucket.trim().is_empty() {
        return Err(anyhow::anyhow!("bucket must not be empty"));
    }
    if raw.concurrency == Some(0) {
        return Err(anyhow::anyhow!("concurrency must be at least 1"));
    }

    let credentials = credentials_from_env()?;
    let mut config = PublishConfig::new(
        credentials,
        raw.bucket,
        resolve_source_dir(&raw.source_dir)?,
        raw.dest_dir,
    );
    config.overwrite = raw.overwrite;
    config.ignore_source_map = raw.ignore_source_map;
    config.cdn_domain = raw.cdn_domain.filter(|domain| !domain.trim().is_empty());
    config.concurrency = raw.concurrency.unwrap_or(DEFAULT_CONCURRENCY);
    config.retry = RetryPolicy {
        retries: raw.retries.unwrap_or(DEFAULT_RETRIES),
        ..RetryPolicy::default()
    };

    config.trace_loaded();
    Ok(config)
}
