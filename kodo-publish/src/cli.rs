/// # kodo-publish CLI interface
///
/// Command parsing and orchestration only. Planning, uploading and CDN
/// maintenance live in [`kodo_publish_core`]; this module loads the config,
/// applies command-line overrides, wires the Qiniu client and the log
/// reporter into [`Services`], and runs [`publish`].
///
/// For programmatic or integration use, call [`run`] with a constructed [`Cli`].
use crate::kodo::KodoClient;
use crate::load_config::{load_config, resolve_source_dir};
use crate::reporter::LogReporter;
use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use kodo_publish_core::config::PublishConfig;
use kodo_publish_core::publish::{publish, Services};
use std::path::PathBuf;
use std::sync::Arc;

/// CLI for kodo-publish: upload a built site to Qiniu Kodo.
#[derive(Parser)]
#[clap(
    name = "kodo-publish",
    version,
    about = "Publish a local directory to a Qiniu Kodo bucket and refresh the CDN for HTML pages"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Upload every file under the source directory using the given config file
    Publish {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        #[clap(flatten)]
        overrides: Overrides,
    },
}

/// Command-line values that take precedence over the config file.
#[derive(Args, Debug, Default, Clone)]
pub struct Overrides {
    /// Local directory to publish
    #[clap(long)]
    pub source_dir: Option<PathBuf>,
    /// Remote key prefix
    #[clap(long)]
    pub dest_dir: Option<String>,
    /// Replace objects that already exist in the bucket (`--overwrite=false` turns it off)
    #[clap(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub overwrite: Option<bool>,
    /// Skip `.map` files (`--ignore-source-map=false` uploads them)
    #[clap(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub ignore_source_map: Option<bool>,
    /// CDN domain used for HTML header and refresh maintenance
    #[clap(long)]
    pub cdn_domain: Option<String>,
}

impl Overrides {
    pub fn apply(self, config: &mut PublishConfig) -> Result<()> {
        if let Some(dir) = self.source_dir {
            config.source_dir = resolve_source_dir(&dir)?;
        }
        if let Some(dest_dir) = self.dest_dir {
            config.dest_dir = dest_dir;
        }
        if let Some(overwrite) = self.overwrite {
            config.overwrite = overwrite;
        }
        if let Some(ignore) = self.ignore_source_map {
            config.ignore_source_map = ignore;
        }
        if let Some(domain) = self.cdn_domain {
            config.cdn_domain = Some(domain).filter(|d| !d.trim().is_empty());
        }
        Ok(())
    }
}

/// Async CLI entrypoint shared by `main()` and the integration tests.
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Publish { config, overrides } => {
            let mut config = load_config(config)?;
            overrides.apply(&mut config)?;
            tracing::info!(
                command = "publish",
                bucket = %config.bucket,
                source_dir = %config.source_dir.display(),
                "[PUBLISH] Starting publish"
            );

            let client = Arc::new(
                KodoClient::from_env()
                    .map_err(|e| anyhow::anyhow!("Failed to construct Qiniu client: {e}"))?,
            );
            let services = Services {
                tokens: client.clone(),
                store: client.clone(),
                cdn: client,
                reporter: Arc::new(LogReporter::new(config.bucket.clone())),
            };

            match publish(&config, &services).await {
                Ok(report) => {
                    tracing::info!(
                        command = "publish",
                        uploaded = report.uploaded.len(),
                        html_pages = report.html_keys.len(),
                        post_process = ?report.post_process,
                        "[PUBLISH] Publish complete"
                    );
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(command = "publish", error = %e, "[PUBLISH] Publish failed");
                    Err(anyhow::Error::new(e))
                }
            }
        }
    }
}
