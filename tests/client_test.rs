//! Store client tests against an in-memory transport
//!
//! The transport double behaves like the service: a form POST stores every
//! field, a GET returns the stored payload or an empty body.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use openkeyval::{BlockingStoreClient, Error, Result, StoreClient, Transport};
use serde::{Deserialize, Serialize};
use tokio_test::{assert_err, assert_ok};

const BASE_URL: &str = "http://okv.test/";

#[derive(Default)]
struct MemoryTransport {
    values: Mutex<HashMap<String, String>>,
    posts: AtomicUsize,
    gets: AtomicUsize,
}

impl MemoryTransport {
    fn raw(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().get(key).cloned()
    }

    fn post_count(&self) -> usize {
        self.posts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn post_form(&self, url: &str, fields: &[(String, String)]) -> Result<String> {
        assert_eq!(url, BASE_URL);
        self.posts.fetch_add(1, Ordering::SeqCst);

        let mut values = self.values.lock().unwrap();
        for (key, value) in fields {
            values.insert(key.clone(), value.clone());
        }
        Ok(format!("{{\"status\":\"multiset\",\"count\":{}}}", fields.len()))
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        let key = url
            .strip_prefix(BASE_URL)
            .ok_or_else(|| Error::InvalidUrl(url.to_string()))?;
        Ok(self.raw(key).unwrap_or_default())
    }
}

fn get_client() -> StoreClient<MemoryTransport> {
    StoreClient::with_transport(BASE_URL, MemoryTransport::default()).expect("Failed to create client")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct TestClass {
    name_of_tallest_person: String,
    number_of_scuba_tanks: u32,
    drawer_contents: Vec<String>,
}

fn test_class() -> TestClass {
    TestClass {
        name_of_tallest_person: "Boburto".to_string(),
        number_of_scuba_tanks: 7,
        drawer_contents: vec![
            "Eights".to_string(),
            "Eights".to_string(),
            "Barbque chips".to_string(),
        ],
    }
}

// ========== Save / Get ==========

#[tokio::test]
async fn test_save_and_get_string() {
    let client = get_client();

    client.save_string("loc-123", "Reno, NV, USA", false).await.unwrap();
    let value = client.get_string("loc-123", false).await.unwrap();

    assert_eq!(value, "Reno, NV, USA");
    assert_eq!(client.transport().raw("loc-123").unwrap(), "\"Reno, NV, USA\"");
}

#[tokio::test]
async fn test_save_and_get_string_with_compression() {
    let client = get_client();

    client.save_string("loc-123", "Reno, NV, USA", true).await.unwrap();
    let value = client.get_string("loc-123", true).await.unwrap();
    assert_eq!(value, "Reno, NV, USA");

    let wire = client.transport().raw("loc-123").unwrap();
    assert_ne!(wire, "\"Reno, NV, USA\"");
    assert!(wire.len() > "\"Reno, NV, USA\"".len());
    assert!(wire.starts_with("H4sI")); // base64 of the gzip magic
}

#[tokio::test]
async fn test_save_and_get_type() {
    let client = get_client();

    client.save("drawer", &test_class(), false).await.unwrap();
    let actual: TestClass = client.get("drawer", false).await.unwrap();

    assert_eq!(actual, test_class());
}

#[tokio::test]
async fn test_save_and_get_type_with_compression() {
    let client = get_client();

    client.save("drawer", &test_class(), true).await.unwrap();
    let actual: TestClass = client.get("drawer", true).await.unwrap();

    assert_eq!(actual, test_class());
}

#[tokio::test]
async fn test_save_returns_service_response() {
    let client = get_client();
    let reply = client.save("n", &42u64, false).await.unwrap();
    assert_eq!(reply, "{\"status\":\"multiset\",\"count\":1}");
}

#[tokio::test]
async fn test_overwrite_last_write_wins() {
    let client = get_client();
    client.save("counter", &1, false).await.unwrap();
    client.save("counter", &2, false).await.unwrap();
    assert_eq!(client.get::<i32>("counter", false).await.unwrap(), 2);
}

// ========== Compression flag mismatch ==========

#[tokio::test]
async fn test_compressed_save_plain_get_fails() {
    let client = get_client();
    client.save("drawer", &test_class(), true).await.unwrap();

    let err = client.get::<TestClass>("drawer", false).await.unwrap_err();
    assert!(matches!(err, Error::Decoding(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_plain_save_compressed_get_fails() {
    let client = get_client();
    client.save_string("loc-123", "Reno, NV, USA", false).await.unwrap();

    let err = client.get_string("loc-123", true).await.unwrap_err();
    assert!(matches!(err, Error::Decompression(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_wrong_type_fails() {
    let client = get_client();
    client.save_string("loc-123", "Reno, NV, USA", false).await.unwrap();

    let err = client.get::<TestClass>("loc-123", false).await.unwrap_err();
    assert!(err.is_payload_mismatch());
    assert!(!err.is_transport());
}

// ========== Delete ==========

#[tokio::test]
async fn test_delete_then_get_string_is_empty() {
    let client = get_client();

    client.save_string("gone", "x", false).await.unwrap();
    client.delete("gone").await.unwrap();

    assert_eq!(client.get_string("gone", false).await.unwrap(), "");
}

#[tokio::test]
async fn test_get_unset_key() {
    let client = get_client();

    assert_eq!(client.get_string("never-set", false).await.unwrap(), "");
    assert_eq!(client.get_optional::<TestClass>("never-set", true).await.unwrap(), None);
    assert!(client.get::<TestClass>("never-set", false).await.is_err());
}

// ========== Batch ==========

#[tokio::test]
async fn test_save_many_single_request() {
    let client = get_client();

    let mut entries = HashMap::new();
    entries.insert("k1".to_string(), test_class());
    entries.insert("k2".to_string(), TestClass {
        number_of_scuba_tanks: 0,
        ..test_class()
    });

    client.save_many(&entries, false).await.unwrap();
    assert_eq!(client.transport().post_count(), 1);

    let v1: TestClass = client.get("k1", false).await.unwrap();
    let v2: TestClass = client.get("k2", false).await.unwrap();
    assert_eq!(v1, entries["k1"]);
    assert_eq!(v2, entries["k2"]);
}

#[tokio::test]
async fn test_save_many_with_compression() {
    let client = get_client();

    client
        .save_many([("a", "first"), ("b", "second")], true)
        .await
        .unwrap();
    assert_eq!(client.transport().post_count(), 1);

    assert_eq!(client.get_string("a", true).await.unwrap(), "first");
    assert_eq!(client.get_string("b", true).await.unwrap(), "second");
}

#[tokio::test]
async fn test_save_many_rejects_empty_key() {
    let client = get_client();

    let result = client.save_many([("ok", 1), ("", 2)], false).await;
    assert!(matches!(result, Err(Error::InvalidRequest(_))));
    assert_eq!(client.transport().post_count(), 0);
}

// ========== Concurrency ==========

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_clones() {
    let client = get_client();

    let mut handles = Vec::new();
    for i in 0..16u32 {
        let client = client.clone();
        handles.push(tokio::spawn(async move {
            let key = format!("key-{}", i);
            client.save(&key, &i, i % 2 == 0).await?;
            client.get::<u32>(&key, i % 2 == 0).await
        }));
    }

    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.await.unwrap().unwrap(), i as u32);
    }
    assert_eq!(client.transport().post_count(), 16);
}

// ========== Blocking forms ==========

#[test]
fn test_blocking_round_trip() {
    let client = BlockingStoreClient::with_transport(BASE_URL, MemoryTransport::default()).unwrap();

    assert_ok!(client.save("drawer", &test_class(), true));
    let actual: TestClass = assert_ok!(client.get("drawer", true));
    assert_eq!(actual, test_class());

    assert_ok!(client.save_string("loc-123", "Reno, NV, USA", false));
    assert_eq!(assert_ok!(client.get_string("loc-123", false)), "Reno, NV, USA");

    assert_ok!(client.delete("loc-123"));
    assert_eq!(assert_ok!(client.get_string("loc-123", false)), "");

    assert_ok!(client.save_many(vec![("x", 1), ("y", 2)], false));
    assert_eq!(client.as_async().transport().post_count(), 4);
    assert_eq!(assert_ok!(client.get_optional::<i32>("y", false)), Some(2));
}

#[test]
fn test_blocking_mismatch_surfaces_error() {
    let client = BlockingStoreClient::with_transport(BASE_URL, MemoryTransport::default()).unwrap();
    client.save_string("loc-123", "Reno, NV, USA", true).unwrap();
    assert_err!(client.get_string("loc-123", false));
}

#[tokio::test]
async fn test_blocking_client_created_and_dropped_inside_runtime() {
    let client = BlockingStoreClient::with_transport(BASE_URL, MemoryTransport::default()).unwrap();

    assert_ok!(client.save_string("loc-123", "Reno, NV, USA", false));
    assert_eq!(assert_ok!(client.get_string("loc-123", false)), "Reno, NV, USA");
    drop(client);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_blocking_client_on_spawn_blocking() {
    let client = BlockingStoreClient::with_transport(BASE_URL, MemoryTransport::default()).unwrap();

    let fetched = tokio::task::spawn_blocking(move || {
        client.save("drawer", &test_class(), true)?;
        client.get::<TestClass>("drawer", true)
    })
    .await
    .unwrap();
    assert_eq!(fetched.unwrap(), test_class());
}

#[test]
fn test_blocking_client_shared_between_threads() {
    let client = BlockingStoreClient::with_transport(BASE_URL, MemoryTransport::default()).unwrap();

    std::thread::scope(|scope| {
        for i in 0..4u32 {
            let client = &client;
            scope.spawn(move || {
                let key = format!("thread-{}", i);
                client.save(&key, &i, false).unwrap();
                assert_eq!(client.get::<u32>(&key, false).unwrap(), i);
            });
        }
    });
    assert_eq!(client.as_async().transport().post_count(), 4);
}

#[test]
fn test_async_client_from_sync_code() {
    let client = get_client();
    tokio_test::block_on(async {
        client.save_string("loc-123", "Reno, NV, USA", false).await.unwrap();
        assert_eq!(client.get_string("loc-123", false).await.unwrap(), "Reno, NV, USA");
    });
}
