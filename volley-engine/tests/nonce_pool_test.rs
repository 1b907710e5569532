//! Nonce pool ordering, contention and refill behaviour

use std::collections::HashSet;
use std::sync::Arc;
use volley_engine::{LatencyRecorder, LoadError, NoncePool};
use volley_http::{HttpConfig, TargetClient};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn pool_for(api_base: &str) -> (NoncePool, Arc<LatencyRecorder>) {
    let latency = Arc::new(LatencyRecorder::new());
    let client = TargetClient::with_config(&HttpConfig::default()).unwrap();
    (NoncePool::new(client, api_base, latency.clone()), latency)
}

#[tokio::test]
async fn test_single_consumer_gets_fifo_order() {
    // Seeded pools never touch the network, so the base URL is never dialled
    let (pool, _) = pool_for("http://127.0.0.1:9");

    pool.add("a");
    pool.add("b");
    assert_eq!(pool.get().await.unwrap(), "a");
    pool.add("c");
    assert_eq!(pool.get().await.unwrap(), "b");
    assert_eq!(pool.get().await.unwrap(), "c");
    assert!(pool.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_consumers_never_share_a_nonce() {
    let (pool, _) = pool_for("http://127.0.0.1:9");
    let pool = Arc::new(pool);

    for i in 0..64 {
        pool.add(format!("nonce-{i}"));
    }

    let mut handles = Vec::new();
    for _ in 0..48 {
        let pool = pool.clone();
        handles.push(tokio::spawn(async move { pool.get().await.unwrap() }));
    }

    let mut seen = HashSet::new();
    for handle in handles {
        assert!(seen.insert(handle.await.unwrap()), "nonce handed out twice");
    }
    assert_eq!(seen.len(), 48);
    assert_eq!(pool.len(), 16);
}

#[tokio::test]
async fn test_empty_pool_fetches_from_directory() {
    let mock_server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/directory"))
        .respond_with(ResponseTemplate::new(200).insert_header("Replay-Nonce", "fresh"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (pool, latency) = pool_for(&mock_server.uri());

    assert_eq!(pool.get().await.unwrap(), "fresh");
    // The refill nonce is handed out directly, not queued
    assert!(pool.is_empty());
    assert_eq!(latency.count("HEAD /directory"), 1);
}

#[tokio::test]
async fn test_missing_nonce_header_is_protocol_error() {
    let mock_server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/directory"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let (pool, _) = pool_for(&mock_server.uri());

    let result = pool.get().await;
    assert!(matches!(result, Err(LoadError::Protocol(_))));
    assert!(pool.is_empty());
}

#[tokio::test]
async fn test_unreachable_target_is_network_error() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let (pool, latency) = pool_for(&format!("http://127.0.0.1:{port}"));

    let result = pool.get().await;
    assert!(matches!(result, Err(LoadError::Network(_))));
    // The failed refill still shows up in the latency report
    assert_eq!(latency.count("HEAD /directory"), 1);
}
