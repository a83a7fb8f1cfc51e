//! Enumeration of the source tree into upload tasks.
//!
//! Planning happens once, single-threaded, before anything is dispatched. That
//! is also where the HTML keys are recorded, so the concurrent workers never
//! share mutable state.

use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info};

use crate::config::PublishConfig;
use crate::keys::{destination_key, KeyError};

/// One file to publish. Immutable once planned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTask {
    pub source_path: PathBuf,
    /// Never starts with `/`.
    pub destination_key: String,
    pub overwrite: bool,
}

impl fmt::Display for UploadTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "file: {}, key: {}, overwrite: {}",
            self.source_path.display(),
            self.destination_key,
            self.overwrite
        )
    }
}

/// Everything a run will attempt, in submission order.
#[derive(Debug, Clone, Default)]
pub struct UploadPlan {
    pub tasks: Vec<UploadTask>,
    /// Keys of planned `.html` files, recorded whether or not their upload succeeds later.
    pub html_keys: Vec<String>,
}

/// Fatal configuration or enumeration failure. No task runs when planning fails.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("source directory {} does not exist", .0.display())]
    SourceMissing(PathBuf),
    #[error("source path {} is not a directory", .0.display())]
    NotADirectory(PathBuf),
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Key(#[from] KeyError),
}

/// Whether a path is excluded by the `ignore_source_map` option.
pub fn is_source_map(path: &Path) -> bool {
    path.to_string_lossy().ends_with(".map")
}

pub fn is_html(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some("html")
}

/// Dotfiles and dot-directories below the scan root are never published.
pub fn is_hidden(name: &OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

/// List all regular files under `root`, recursively, sorted by path.
///
/// Symlinks to files are included; symlinked directories are not descended.
/// Hidden entries are skipped, hidden directories are not descended.
pub fn list_files(root: &Path) -> Result<Vec<PathBuf>, PlanError> {
    if !root.exists() {
        error!(path = %root.display(), "[PLAN] Source directory does not exist");
        return Err(PlanError::SourceMissing(root.to_path_buf()));
    }
    if !root.is_dir() {
        error!(path = %root.display(), "[PLAN] Source path is not a directory");
        return Err(PlanError::NotADirectory(root.to_path_buf()));
    }

    fn visit_dir(dir: &Path, results: &mut Vec<PathBuf>) -> Result<(), PlanError> {
        let io_err = |source| PlanError::Io {
            path: dir.to_path_buf(),
            source,
        };
        let mut entries = std::fs::read_dir(dir)
            .map_err(io_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(io_err)?;
        entries.sort_by_key(|entry| entry.file_name());

        for entry in entries {
            let path = entry.path();
            if is_hidden(&entry.file_name()) {
                debug!(path = %path.display(), "[PLAN] Skipping hidden entry");
                continue;
            }
            let file_type = entry.file_type().map_err(|source| PlanError::Io {
                path: path.clone(),
                source,
            })?;
            if file_type.is_dir() {
                visit_dir(&path, results)?;
            } else if path.is_file() {
                results.push(path);
            } else {
                debug!(path = %path.display(), "[PLAN] Skipping non-regular entry");
            }
        }
        Ok(())
    }

    let mut files = Vec::new();
    visit_dir(root, &mut files)?;
    Ok(files)
}

/// Build the upload plan for `config`: one task per file, minus ignored source maps.
pub fn plan_uploads(config: &PublishConfig) -> Result<UploadPlan, PlanError> {
    let root = config.source_dir.as_path();
    info!(source_dir = %root.display(), dest_dir = %config.dest_dir, "[PLAN] Enumerating source files");

    let files = list_files(root)?;
    let mut plan = UploadPlan::default();

    for file in files {
        if config.ignore_source_map && is_source_map(&file) {
            debug!(file = %file.display(), "[PLAN] Ignoring source map");
            continue;
        }

        let key = destination_key(root, &file, &config.dest_dir).map_err(|e| {
            error!(file = %file.display(), error = %e, "[PLAN] Could not derive object key");
            e
        })?;

        if is_html(&file) {
            plan.html_keys.push(key.clone());
        }
        plan.tasks.push(UploadTask {
            source_path: file,
            destination_key: key,
            overwrite: config.overwrite,
        });
    }

    info!(
        tasks = plan.tasks.len(),
        html = plan.html_keys.len(),
        "[PLAN] Upload plan built"
    );
    Ok(plan)
}
