//! End-to-end scenarios against the public API.
//!
//! TTLs are shortened from their production scale so the suite stays fast;
//! the ratios between TTL and wait are kept.

use sqlkv::{KvStore, ReadOptions, SqlStore, StoreConfig};
use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tempfile::TempDir;

async fn file_store(tmp: &TempDir, database: &str) -> SqlStore {
    let path = tmp.path().join("scenarios.db");
    SqlStore::open(StoreConfig::new(database).with_node(path.to_string_lossy()))
        .await
        .unwrap()
}

#[tokio::test]
async fn list_reflects_writes_and_deletes() {
    let tmp = TempDir::new().unwrap();
    let store = file_store(&tmp, "list").await;

    store.write("test", b"foo", Duration::ZERO).await.unwrap();
    store.write("bar", b"baz", Duration::ZERO).await.unwrap();
    store.write("qux", b"aasad", Duration::ZERO).await.unwrap();
    store.delete("qux").await.unwrap();

    let listed: HashMap<String, Vec<u8>> = store
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|r| (r.key, r.value))
        .collect();

    assert_eq!(listed.len(), 2);
    assert_eq!(listed["test"], b"foo");
    assert_eq!(listed["bar"], b"baz");
    assert!(!listed.contains_key("qux"));
}

#[tokio::test]
async fn exact_read_expires() {
    let tmp = TempDir::new().unwrap();
    let store = file_store(&tmp, "exact").await;

    store
        .write("test", b"bar", Duration::from_secs(2))
        .await
        .unwrap();
    let records = store.read("test", ReadOptions::exact()).await.unwrap();
    assert_eq!(records[0].value, b"bar");

    tokio::time::sleep(Duration::from_millis(2500)).await;

    let err = store.read("test", ReadOptions::exact()).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn prefix_read_expires() {
    let tmp = TempDir::new().unwrap();
    let store = file_store(&tmp, "prefix").await;

    for key in ["aaa", "aaaa", "aaaaa"] {
        store
            .write(key, b"bbb", Duration::from_secs(1))
            .await
            .unwrap();
    }
    let records = store.read("a", ReadOptions::prefix()).await.unwrap();
    assert_eq!(records.len(), 3);

    tokio::time::sleep(Duration::from_millis(1200)).await;

    let records = store.read("a", ReadOptions::prefix()).await.unwrap();
    assert!(records.is_empty());
}

#[tokio::test]
async fn prefix_read_limit_sorted() {
    let tmp = TempDir::new().unwrap();
    let store = file_store(&tmp, "limit").await;

    // xorshift seeded from the clock; keys only need to arrive unordered.
    let mut state = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos() as u64
        | 1;
    for _ in 0..100 {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        let key = format!("key{}", state % 1_000_000);
        store.write(&key, b"v", Duration::ZERO).await.unwrap();
    }

    let records = store
        .read("key", ReadOptions::prefix().limit(99))
        .await
        .unwrap();
    assert!(!records.is_empty());
    assert!(records.len() <= 99);
    assert!(records.windows(2).all(|w| w[0].key < w[1].key));
    assert!(records.iter().all(|r| r.key.starts_with("key")));
}

#[tokio::test]
async fn stores_reopen_with_data_intact() {
    let tmp = TempDir::new().unwrap();

    let store = file_store(&tmp, "reopen").await;
    store.write("kept", b"v", Duration::ZERO).await.unwrap();
    store
        .write("gone", b"v", Duration::from_millis(200))
        .await
        .unwrap();
    store.close();

    tokio::time::sleep(Duration::from_millis(400)).await;

    let store = file_store(&tmp, "reopen").await;
    assert_eq!(store.list_keys().await.unwrap(), vec!["kept".to_string()]);
    assert_eq!(store.purge_expired().await.unwrap(), 1);
}
