#![allow(unused)]

//! # contract: capability interfaces consumed by the publish pipeline
//!
//! The pipeline never talks to the storage or CDN service directly. Everything
//! remote goes through the traits in this module so the real Qiniu client, a
//! test double or a `mockall` mock can be plugged in interchangeably.
//!
//! ## Traits
//! - [`TokenProvider`]: issues a signed, time-scoped upload token.
//! - [`ObjectStore`]: puts objects and changes object headers.
//! - [`CdnRefresher`]: triggers URL and directory invalidation on the CDN.
//! - [`Reporter`]: passive sink for per-file progress and the terminal signal.
//!
//! ## Mocking & Testing
//! - Every trait is annotated for `mockall`, and the mocks are exported behind
//!   the `test-export-mocks` feature so downstream crates can use them too.
//!
//! All remote calls return either a [`RemoteResponse`] (status code plus an
//! optional body) or a [`ServiceError`] for transport-level failures. Deciding
//! whether a response counts as success is the caller's job.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use mockall::{automock, predicate::*};
use serde_json::Value;

use crate::error::PublishError;

/// Access/secret key pair for the storage account.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key: String,
    pub secret_key: String,
}

impl Credentials {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// What an upload token is allowed to write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenScope {
    /// Any new key in the bucket. The service rejects writes to existing keys.
    Bucket,
    /// Create or overwrite exactly this key.
    Key(String),
}

impl TokenScope {
    /// Scope used for a task: key-scoped when overwriting, bucket-scoped otherwise.
    pub fn for_upload(overwrite: bool, key: &str) -> Self {
        if overwrite {
            TokenScope::Key(key.to_string())
        } else {
            TokenScope::Bucket
        }
    }
}

/// Opaque, short-lived upload authorization.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadToken(String);

impl UploadToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for UploadToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("UploadToken(..)")
    }
}

/// Response metadata returned by the remote service.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteResponse {
    /// `None` when the service gave no response info at all.
    pub status_code: Option<u16>,
    pub body: Option<Value>,
}

impl RemoteResponse {
    pub fn with_status(status_code: u16) -> Self {
        Self {
            status_code: Some(status_code),
            body: None,
        }
    }

    pub fn with_body(status_code: u16, body: Value) -> Self {
        Self {
            status_code: Some(status_code),
            body: Some(body),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status_code == Some(200)
    }
}

/// Transport or protocol failure reported by a remote call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ServiceError {
    pub message: String,
    /// Diagnostic trace, when the transport layer provides one.
    pub trace: Option<String>,
}

impl ServiceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            trace: None,
        }
    }

    pub fn with_trace(message: impl Into<String>, trace: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            trace: Some(trace.into()),
        }
    }
}

/// Issues upload tokens. Must be called once per upload attempt.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn issue_token(
        &self,
        bucket: &str,
        credentials: &Credentials,
        scope: &TokenScope,
    ) -> Result<UploadToken, ServiceError>;
}

/// Object writes against the storage bucket.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload the file at `local_path` under `key`, authorized by `token`.
    async fn put_object(
        &self,
        token: &UploadToken,
        key: &str,
        local_path: &Path,
    ) -> Result<RemoteResponse, ServiceError>;

    /// Replace response headers (e.g. `Cache-Control`) stored with an object.
    async fn set_object_headers(
        &self,
        bucket: &str,
        credentials: &Credentials,
        key: &str,
        headers: &BTreeMap<String, String>,
    ) -> Result<RemoteResponse, ServiceError>;
}

/// CDN cache invalidation. Fire-and-forget: completion is never polled.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait CdnRefresher: Send + Sync {
    async fn invalidate_urls(
        &self,
        credentials: &Credentials,
        urls: &[String],
    ) -> Result<RemoteResponse, ServiceError>;

    async fn invalidate_directories(
        &self,
        credentials: &Credentials,
        dirs: &[String],
    ) -> Result<RemoteResponse, ServiceError>;
}

/// Receives progress and the single terminal signal of a run.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait Reporter: Send + Sync {
    fn on_file_uploaded(&self, source_path: &Path, destination_key: &str);

    fn on_batch_complete(&self);

    fn on_batch_failed(&self, error: &PublishError);
}
