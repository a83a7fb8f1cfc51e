use serial_test::serial;
use std::env;
use std::fs::write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

use kodo_publish::load_config::{load_config, ACCESS_KEY_ENV, SECRET_KEY_ENV};

fn config_file(yaml: &str) -> NamedTempFile {
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), yaml).unwrap();
    config_file
}

fn set_secrets() {
    env::set_var(ACCESS_KEY_ENV, "test-ak");
    env::set_var(SECRET_KEY_ENV, "test-sk");
}

/// A full static config plus env secrets produces a ready PublishConfig.
#[tokio::test]
#[serial]
async fn test_load_config_full_file_with_env_secrets() {
    let file = config_file(
        r#"
bucket: site-bucket
source_dir: /srv/dist
dest_dir: web
overwrite: true
ignore_source_map: true
cdn_domain: cdn.example.com
concurrency: 8
retries: 2
"#,
    );
    set_secrets();

    let config = load_config(file.path()).expect("Config should load");

    assert_eq!(config.bucket, "site-bucket");
    assert_eq!(config.source_dir, PathBuf::from("/srv/dist"));
    assert_eq!(config.dest_dir, "web");
    assert!(config.overwrite);
    assert!(config.ignore_source_map);
    assert_eq!(config.cdn_base_url().as_deref(), Some("https://cdn.example.com"));
    assert_eq!(config.concurrency, 8);
    assert_eq!(config.retry.retries, 2);
    assert_eq!(config.credentials.access_key, "test-ak");
    assert_eq!(config.credentials.secret_key, "test-sk");
}

#[tokio::test]
#[serial]
async fn test_load_config_defaults_and_relative_source_dir() {
    let file = config_file("bucket: b\nsource_dir: dist\n");
    set_secrets();

    let config = load_config(file.path()).expect("Config should load");

    assert_eq!(config.source_dir, env::current_dir().unwrap().join("dist"));
    assert_eq!(config.dest_dir, "");
    assert!(!config.overwrite);
    assert!(!config.ignore_source_map);
    assert_eq!(config.cdn_domain, None);
    assert_eq!(config.concurrency, 5);
    assert_eq!(config.retry.retries, 3);
}

#[tokio::test]
#[serial]
async fn test_load_config_errors_on_missing_secret() {
    let file = config_file("bucket: b\nsource_dir: /srv/dist\n");
    env::set_var(ACCESS_KEY_ENV, "test-ak");
    env::remove_var(SECRET_KEY_ENV);

    let err = load_config(file.path()).unwrap_err();

    assert!(err.to_string().contains(SECRET_KEY_ENV), "got: {err}");
}

#[tokio::test]
#[serial]
async fn test_load_config_errors_on_missing_fields() {
    let file = config_file("source_dir: /srv/dist\n");
    set_secrets();

    let err = load_config(file.path()).unwrap_err();

    assert!(err.to_string().contains("Failed to parse config YAML"), "got: {err}");
}

#[tokio::test]
#[serial]
async fn test_load_config_rejects_zero_concurrency() {
    let file = config_file("bucket: b\nsource_dir: /srv/dist\nconcurrency: 0\n");
    set_secrets();

    assert!(load_config(file.path()).is_err());
}

#[tokio::test]
#[serial]
async fn test_load_config_errors_on_missing_file() {
    let err = load_config("/definitely/not/here.yaml").unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}
