//! Mapping of local file paths to remote object keys.

use std::path::{Component, Path};

/// Why a local path could not be turned into an object key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("file {file} is not under source directory {base}")]
    OutsideBase { base: String, file: String },
    #[error("path {0} is not valid UTF-8")]
    NonUtf8(String),
    #[error("path {0} has no file name")]
    NoFileName(String),
}

/// Derive the object key for `file`, found while scanning `base_path`.
///
/// The key is `dest_dir`, the file's directory relative to `base_path` and
/// its base name, joined with `/` on every platform and normalized like a
/// POSIX path join. One leading `/` is stripped so keys never start with a
/// separator.
///
/// ```
/// use std::path::Path;
/// use kodo_publish_core::keys::destination_key;
///
/// let key = destination_key(Path::new("/a/b"), Path::new("/a/b/c/d.js"), "out").unwrap();
/// assert_eq!(key, "out/c/d.js");
/// ```
pub fn destination_key(base_path: &Path, file: &Path, dest_dir: &str) -> Result<String, KeyError> {
    let file_name = file
        .file_name()
        .ok_or_else(|| KeyError::NoFileName(file.display().to_string()))?;
    let file_name = file_name
        .to_str()
        .ok_or_else(|| KeyError::NonUtf8(file.display().to_string()))?;

    let parent = file.parent().unwrap_or_else(|| Path::new(""));
    let relative = parent
        .strip_prefix(base_path)
        .map_err(|_| KeyError::OutsideBase {
            base: base_path.display().to_string(),
            file: file.display().to_string(),
        })?;

    let mut joined = String::from(dest_dir);
    for component in relative.components() {
        match component {
            Component::Normal(segment) => {
                let segment = segment
                    .to_str()
                    .ok_or_else(|| KeyError::NonUtf8(file.display().to_string()))?;
                joined.push('/');
                joined.push_str(segment);
            }
            Component::ParentDir => joined.push_str("/.."),
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }
    joined.push('/');
    joined.push_str(file_name);

    let normalized = normalize(&joined);
    Ok(normalized
        .strip_prefix('/')
        .map(str::to_string)
        .unwrap_or(normalized))
}

/// POSIX-style normalization of a `/`-separated path.
fn normalize(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ if absolute => {}
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }

    let body = segments.join("/");
    if absolute {
        format!("/{body}")
    } else if body.is_empty() {
        ".".to_string()
    } else {
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_separators_and_dots() {
        assert_eq!(normalize("out//c/./d.js"), "out/c/d.js");
        assert_eq!(normalize("/out/c/../d.js"), "/out/d.js");
        assert_eq!(normalize("../x"), "../x");
        assert_eq!(normalize("/../x"), "/x");
    }
}
