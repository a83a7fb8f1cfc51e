mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use kodo_publish_core::config::DEFAULT_CONCURRENCY;
use kodo_publish_core::publish::publish;
use tempfile::tempdir;

use common::{test_config, write_tree, Event, Harness, RecordingCdn, ScriptedStore};

fn many_files(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("dir{}/file{i:03}.txt", i % 4)).collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_never_more_than_five_puts_in_flight() {
    let tmp = tempdir().unwrap();
    let files = many_files(40);
    let names: Vec<&str> = files.iter().map(String::as_str).collect();
    write_tree(tmp.path(), &names);

    let config = test_config(tmp.path());
    assert_eq!(config.concurrency, DEFAULT_CONCURRENCY);
    let harness = Harness::new(
        ScriptedStore::with_delay(Duration::from_millis(10)),
        RecordingCdn::default(),
    );

    let report = publish(&config, &harness.services()).await.unwrap();

    assert_eq!(report.uploaded.len(), 40);
    let max_active = harness.store.max_active.load(Ordering::SeqCst);
    assert!(max_active <= 5, "saw {max_active} concurrent puts");
    assert_eq!(max_active, 5, "pool should fill all slots with 40 tasks");
    assert_eq!(harness.reporter.terminal_events(), vec![Event::Complete]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_custom_concurrency_cap_is_honoured() {
    let tmp = tempdir().unwrap();
    let files = many_files(12);
    let names: Vec<&str> = files.iter().map(String::as_str).collect();
    write_tree(tmp.path(), &names);

    let mut config = test_config(tmp.path());
    config.concurrency = 2;
    let harness = Harness::new(
        ScriptedStore::with_delay(Duration::from_millis(10)),
        RecordingCdn::default(),
    );

    publish(&config, &harness.services()).await.unwrap();

    assert!(harness.store.max_active.load(Ordering::SeqCst) <= 2);
    assert_eq!(harness.store.puts.lock().unwrap().len(), 12);
}
