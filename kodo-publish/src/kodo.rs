//! # Qiniu client
//!
//! This module wires the capability traits from [`kodo_publish_core::contract`]
//! to the real Qiniu services:
//!
//! - upload tokens are signed locally from the access/secret key pair,
//! - objects are sent with a multipart form upload,
//! - object headers are changed through the RS `chgm` operation,
//! - CDN URLs and directories are refreshed through the fusion API.
//!
//! Every call reports back a [`RemoteResponse`]; deciding what counts as
//! success stays in the core pipeline.

use std::collections::BTreeMap;
use std::env;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use kodo_publish_core::contract::{
    CdnRefresher, Credentials, ObjectStore, RemoteResponse, ServiceError, TokenProvider,
    TokenScope, UploadToken,
};
use serde_json::{json, Value};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

pub const DEFAULT_UPLOAD_HOST: &str = "https://upload.qiniup.com";
pub const DEFAULT_RS_HOST: &str = "https://rs.qiniuapi.com";
pub const DEFAULT_FUSION_HOST: &str = "https://fusion.qiniuapi.com";

/// Lifetime of an upload token.
pub const TOKEN_TTL: Duration = Duration::from_secs(3600);

/// Hosts of the three Qiniu APIs used by the publisher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub upload_host: String,
    pub rs_host: String,
    pub fusion_host: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            upload_host: DEFAULT_UPLOAD_HOST.to_string(),
            rs_host: DEFAULT_RS_HOST.to_string(),
            fusion_host: DEFAULT_FUSION_HOST.to_string(),
        }
    }
}

impl Endpoints {
    /// Defaults, overridden by `QINIU_UPLOAD_HOST`, `QINIU_RS_HOST` and `QINIU_FUSION_HOST`.
    pub fn from_env() -> Self {
        let pick = |var: &str, default: &str| {
            env::var(var)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .unwrap_or_else(|| default.to_string())
        };
        Self {
            upload_host: pick("QINIU_UPLOAD_HOST", DEFAULT_UPLOAD_HOST),
            rs_host: pick("QINIU_RS_HOST", DEFAULT_RS_HOST),
            fusion_host: pick("QINIU_FUSION_HOST", DEFAULT_FUSION_HOST),
        }
    }
}

/// URL-safe base64 of the HMAC-SHA1 of `data` under `secret_key`.
pub fn sign(secret_key: &str, data: &[u8]) -> String {
    // HMAC accepts keys of any length, so this cannot fail.
    let mut mac = match HmacSha1::new_from_slice(secret_key.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => unreachable!("HMAC-SHA1 accepts any key length"),
    };
    mac.update(data);
    URL_SAFE.encode(mac.finalize().into_bytes())
}

/// Signed upload token for `scope`, valid until `deadline` (unix seconds).
pub fn upload_token(credentials: &Credentials, bucket: &str, scope: &TokenScope, deadline: u64) -> String {
    let scope = match scope {
        TokenScope::Bucket => bucket.to_string(),
        TokenScope::Key(key) => format!("{bucket}:{key}"),
    };
    let policy = json!({ "scope": scope, "deadline": deadline }).to_string();
    let encoded_policy = URL_SAFE.encode(policy.as_bytes());
    let signature = sign(&credentials.secret_key, encoded_policy.as_bytes());
    format!("{}:{}:{}", credentials.access_key, signature, encoded_policy)
}

/// `Authorization` header value for management APIs signing `path` with an empty body.
pub fn qbox_authorization(credentials: &Credentials, path: &str) -> String {
    let signing_str = format!("{path}\n");
    format!(
        "QBox {}:{}",
        credentials.access_key,
        sign(&credentials.secret_key, signing_str.as_bytes())
    )
}

pub fn encoded_entry(bucket: &str, key: &str) -> String {
    URL_SAFE.encode(format!("{bucket}:{key}"))
}

/// RS path that replaces the stored response headers of `bucket:key`.
pub fn change_headers_path(bucket: &str, key: &str, headers: &BTreeMap<String, String>) -> String {
    let mut path = format!("/chgm/{}", encoded_entry(bucket, key));
    for (name, value) in headers {
        path.push_str(&format!("/x-qn-meta-!{}/{}", name, URL_SAFE.encode(value)));
    }
    path
}

fn transport_error(context: &str, e: reqwest::Error) -> ServiceError {
    ServiceError::with_trace(format!("{context}: {e}"), format!("{e:?}"))
}

/// Status plus body, JSON when it parses, raw text otherwise.
async fn into_remote_response(response: reqwest::Response) -> RemoteResponse {
    let status_code = response.status().as_u16();
    let body = match response.text().await {
        Ok(text) if text.trim().is_empty() => None,
        Ok(text) => Some(serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text))),
        Err(e) => {
            tracing::warn!(error = %e, status_code, "Failed to read response body");
            None
        }
    };
    RemoteResponse {
        status_code: Some(status_code),
        body,
    }
}

pub struct KodoClient {
    http: reqwest::Client,
    endpoints: Endpoints,
}

impl KodoClient {
    pub fn new(endpoints: Endpoints) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("kodo-publish/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| transport_error("failed to build HTTP client", e))?;
        tracing::info!(
            upload_host = %endpoints.upload_host,
            rs_host = %endpoints.rs_host,
            fusion_host = %endpoints.fusion_host,
            "Initialized KodoClient"
        );
        Ok(Self { http, endpoints })
    }

    pub fn from_env() -> Result<Self, ServiceError> {
        dotenvy::dotenv().ok();
        Self::new(Endpoints::from_env())
    }

    async fn refresh(&self, credentials: &Credentials, payload: Value) -> Result<RemoteResponse, ServiceError> {
        let path = "/v2/tune/refresh";
        let url = format!("{}{}", self.endpoints.fusion_host, path);
        let response = self
            .http
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, qbox_authorization(credentials, path))
            .json(&payload)
            .send()
            .await
            .map_err(|e| transport_error("CDN refresh request failed", e))?;

        let mut remote = into_remote_response(response).await;
        // The fusion API reports its own result code in the JSON body.
        if remote.is_ok() {
            if let Some(code) = remote
                .body
                .as_ref()
                .and_then(|body| body.get("code"))
                .and_then(Value::as_u64)
            {
                remote.status_code = u16::try_from(code).ok();
            }
        }
        Ok(remote)
    }
}

#[async_trait]
impl TokenProvider for KodoClient {
    async fn issue_token(
        &self,
        bucket: &str,
        credentials: &Credentials,
        scope: &TokenScope,
    ) -> Result<UploadToken, ServiceError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| ServiceError::new(format!("system clock before unix epoch: {e}")))?;
        let deadline = (now + TOKEN_TTL).as_secs();
        Ok(UploadToken::new(upload_token(credentials, bucket, scope, deadline)))
    }
}

#[async_trait]
impl ObjectStore for KodoClient {
    async fn put_object(
        &self,
        token: &UploadToken,
        key: &str,
        local_path: &Path,
    ) -> Result<RemoteResponse, ServiceError> {
        let content = tokio::fs::read(local_path).await.map_err(|e| {
            ServiceError::new(format!("failed to read {}: {e}", local_path.display()))
        })?;
        let file_name = local_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| key.to_string());
        tracing::debug!(key, size = content.len(), "Form upload");

        let form = reqwest::multipart::Form::new()
            .text("token", token.as_str().to_string())
            .text("key", key.to_string())
            .part("file", reqwest::multipart::Part::bytes(content).file_name(file_name));

        let response = self
            .http
            .post(&self.endpoints.upload_host)
            .multipart(form)
            .send()
            .await
            .map_err(|e| transport_error("upload request failed", e))?;

        Ok(into_remote_response(response).await)
    }

    async fn set_object_headers(
        &self,
        bucket: &str,
        credentials: &Credentials,
        key: &str,
        headers: &BTreeMap<String, String>,
    ) -> Result<RemoteResponse, ServiceError> {
        let path = change_headers_path(bucket, key, headers);
        let url = format!("{}{}", self.endpoints.rs_host, path);
        tracing::debug!(key, "Changing object headers");

        let response = self
            .http
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, qbox_authorization(credentials, &path))
            .header(reqwest::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .send()
            .await
            .map_err(|e| transport_error("change headers request failed", e))?;

        Ok(into_remote_response(response).await)
    }
}

#[async_trait]
impl CdnRefresher for KodoClient {
    async fn invalidate_urls(
        &self,
        credentials: &Credentials,
        urls: &[String],
    ) -> Result<RemoteResponse, ServiceError> {
        tracing::debug!(count = urls.len(), "Refreshing CDN URLs");
        self.refresh(credentials, json!({ "urls": urls })).await
    }

    async fn invalidate_directories(
        &self,
        credentials: &Credentials,
        dirs: &[String],
    ) -> Result<RemoteResponse, ServiceError> {
        tracing::debug!(count = dirs.len(), "Refreshing CDN directories");
        self.refresh(credentials, json!({ "dirs": dirs })).await
    }
}
