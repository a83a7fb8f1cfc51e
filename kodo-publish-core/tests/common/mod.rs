#![allow(dead_code)]

//! Hand-written capability doubles shared by the integration tests.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fs::{create_dir_all, write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use kodo_publish_core::config::PublishConfig;
use kodo_publish_core::contract::{
    CdnRefresher, Credentials, ObjectStore, RemoteResponse, Reporter, ServiceError, TokenProvider,
    TokenScope, UploadToken,
};
use kodo_publish_core::error::PublishError;
use kodo_publish_core::publish::Services;
use kodo_publish_core::retry::RetryPolicy;

pub fn write_tree(root: &Path, files: &[&str]) {
    for file in files {
        let path = root.join(file);
        if let Some(parent) = path.parent() {
            create_dir_all(parent).unwrap();
        }
        write(&path, format!("contents of {file}")).unwrap();
    }
}

pub fn test_config(source_dir: &Path) -> PublishConfig {
    let mut config = PublishConfig::new(Credentials::new("ak", "sk"), "site-bucket", source_dir, "web");
    config.retry = RetryPolicy::immediate(3);
    config
}

/// Records every token request in order.
#[derive(Default)]
pub struct RecordingTokens {
    pub scopes: Mutex<Vec<TokenScope>>,
}

#[async_trait]
impl TokenProvider for RecordingTokens {
    async fn issue_token(
        &self,
        _bucket: &str,
        _credentials: &Credentials,
        scope: &TokenScope,
    ) -> Result<UploadToken, ServiceError> {
        let mut scopes = self.scopes.lock().unwrap();
        scopes.push(scope.clone());
        Ok(UploadToken::new(format!("token-{}", scopes.len())))
    }
}

type PutScript = Result<RemoteResponse, ServiceError>;

/// Object store with per-key scripted put responses (200 when unscripted),
/// an optional delay, and a high-water mark of concurrent puts.
#[derive(Default)]
pub struct ScriptedStore {
    scripts: Mutex<HashMap<String, VecDeque<PutScript>>>,
    pub puts: Mutex<Vec<String>>,
    pub header_calls: Mutex<Vec<(String, BTreeMap<String, String>)>>,
    pub header_failures: Mutex<Vec<String>>,
    pub delay: Duration,
    slow_keys: Mutex<HashMap<String, Duration>>,
    active: AtomicUsize,
    pub max_active: AtomicUsize,
}

impl ScriptedStore {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn script(&self, key: &str, responses: Vec<PutScript>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(key.to_string(), responses.into());
    }

    pub fn slow_down(&self, key: &str, delay: Duration) {
        self.slow_keys.lock().unwrap().insert(key.to_string(), delay);
    }

    pub fn fail_headers_for(&self, key: &str) {
        self.header_failures.lock().unwrap().push(key.to_string());
    }

    pub fn put_count(&self, key: &str) -> usize {
        self.puts.lock().unwrap().iter().filter(|k| *k == key).count()
    }
}

#[async_trait]
impl ObjectStore for ScriptedStore {
    async fn put_object(
        &self,
        _token: &UploadToken,
        key: &str,
        _local_path: &Path,
    ) -> Result<RemoteResponse, ServiceError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        self.puts.lock().unwrap().push(key.to_string());

        let delay = self
            .slow_keys
            .lock()
            .unwrap()
            .get(key)
            .copied()
            .unwrap_or(self.delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(key)
            .and_then(|queue| queue.pop_front());

        self.active.fetch_sub(1, Ordering::SeqCst);
        scripted.unwrap_or_else(|| Ok(RemoteResponse::with_status(200)))
    }

    async fn set_object_headers(
        &self,
        _bucket: &str,
        _credentials: &Credentials,
        key: &str,
        headers: &BTreeMap<String, String>,
    ) -> Result<RemoteResponse, ServiceError> {
        self.header_calls
            .lock()
            .unwrap()
            .push((key.to_string(), headers.clone()));
        if self.header_failures.lock().unwrap().iter().any(|k| k == key) {
            return Ok(RemoteResponse::with_status(612));
        }
        Ok(RemoteResponse::with_status(200))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CdnCall {
    Urls(Vec<String>),
    Dirs(Vec<String>),
}

#[derive(Default)]
pub struct RecordingCdn {
    pub calls: Mutex<Vec<CdnCall>>,
    pub fail_urls: bool,
}

#[async_trait]
impl CdnRefresher for RecordingCdn {
    async fn invalidate_urls(
        &self,
        _credentials: &Credentials,
        urls: &[String],
    ) -> Result<RemoteResponse, ServiceError> {
        self.calls.lock().unwrap().push(CdnCall::Urls(urls.to_vec()));
        if self.fail_urls {
            return Err(ServiceError::new("refresh quota exceeded"));
        }
        Ok(RemoteResponse::with_status(200))
    }

    async fn invalidate_directories(
        &self,
        _credentials: &Credentials,
        dirs: &[String],
    ) -> Result<RemoteResponse, ServiceError> {
        self.calls.lock().unwrap().push(CdnCall::Dirs(dirs.to_vec()));
        Ok(RemoteResponse::with_status(200))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Uploaded(PathBuf, String),
    Complete,
    Failed(String),
}

#[derive(Default)]
pub struct RecordingReporter {
    pub events: Mutex<Vec<Event>>,
}

impl RecordingReporter {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn uploaded_keys(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Uploaded(_, key) => Some(key),
                _ => None,
            })
            .collect()
    }

    pub fn terminal_events(&self) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|event| !matches!(event, Event::Uploaded(..)))
            .collect()
    }
}

impl Reporter for RecordingReporter {
    fn on_file_uploaded(&self, source_path: &Path, destination_key: &str) {
        self.events.lock().unwrap().push(Event::Uploaded(
            source_path.to_path_buf(),
            destination_key.to_string(),
        ));
    }

    fn on_batch_complete(&self) {
        self.events.lock().unwrap().push(Event::Complete);
    }

    fn on_batch_failed(&self, error: &PublishError) {
        self.events
            .lock()
            .unwrap()
            .push(Event::Failed(error.to_string()));
    }
}

pub struct Harness {
    pub tokens: Arc<RecordingTokens>,
    pub store: Arc<ScriptedStore>,
    pub cdn: Arc<RecordingCdn>,
    pub reporter: Arc<RecordingReporter>,
}

impl Harness {
    pub fn new(store: ScriptedStore, cdn: RecordingCdn) -> Self {
        Self {
            tokens: Arc::new(RecordingTokens::default()),
            store: Arc::new(store),
            cdn: Arc::new(cdn),
            reporter: Arc::new(RecordingReporter::default()),
        }
    }

    pub fn services(&self) -> Services {
        Services {
            tokens: self.tokens.clone(),
            store: self.store.clone(),
            cdn: self.cdn.clone(),
            reporter: self.reporter.clone(),
        }
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new(ScriptedStore::default(), RecordingCdn::default())
    }
}
