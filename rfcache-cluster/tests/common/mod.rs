//! Common test utilities for rfcache-cluster tests.

use rfcache_cluster::{CacheNode, NodeConfig};
use std::path::Path;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::{Duration, Instant};

/// Atomic counter for allocating unique ports.
static PORT_COUNTER: AtomicU16 = AtomicU16::new(17300);

/// Get a unique port for testing.
pub fn get_test_port() -> u16 {
    PORT_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Node configuration on fresh ports with test-friendly timeouts.
#[allow(dead_code)]
pub fn test_config(name: &str, data_dir: &Path, bootstrap: bool) -> NodeConfig {
    test_config_on(name, data_dir, bootstrap, get_test_port(), get_test_port())
}

/// Node configuration on the given ports.
pub fn test_config_on(
    name: &str,
    data_dir: &Path,
    bootstrap: bool,
    api_port: u16,
    raft_port: u16,
) -> NodeConfig {
    NodeConfig::builder()
        .node_name(name)
        .addr("127.0.0.1")
        .api_port(api_port)
        .raft_port(raft_port)
        .bootstrap(bootstrap)
        .data_dir(data_dir)
        .join_timeout(Duration::from_secs(5))
        .build()
        .expect("Invalid config")
}

/// Start a node, panicking on failure.
pub async fn start_node(config: NodeConfig) -> CacheNode {
    CacheNode::start(config)
        .await
        .expect("Failed to start node")
}

/// Base URL of a node's API.
pub fn api_url(node: &CacheNode) -> String {
    format!("http://{}", node.api_addr())
}

/// Wait until `node` is the leader.
pub async fn wait_for_leader(node: &CacheNode, timeout_ms: u64) -> bool {
    let start = Instant::now();
    let timeout = Duration::from_millis(timeout_ms);

    while start.elapsed() < timeout {
        if node.is_leader().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    false
}

/// `GET /get?key=<key>`, returning the status and JSON body.
pub async fn get_key(
    client: &reqwest::Client,
    base: &str,
    key: &str,
) -> (u16, serde_json::Value) {
    let response = client
        .get(format!("{}/get", base))
        .query(&[("key", key)])
        .send()
        .await
        .expect("Failed to send get");
    let status = response.status().as_u16();
    let body = response.json().await.expect("Failed to decode body");
    (status, body)
}

/// `POST <path>` with a JSON body, returning the status and JSON body.
pub async fn post_json(
    client: &reqwest::Client,
    base: &str,
    path: &str,
    body: serde_json::Value,
) -> (u16, serde_json::Value) {
    let response = client
        .post(format!("{}{}", base, path))
        .json(&body)
        .send()
        .await
        .expect("Failed to send post");
    let status = response.status().as_u16();
    let body = response.json().await.expect("Failed to decode body");
    (status, body)
}

/// Poll `GET /get` until `key` reads `expected`.
#[allow(dead_code)]
pub async fn wait_for_value(
    client: &reqwest::Client,
    base: &str,
    key: &str,
    expected: &str,
    timeout_ms: u64,
) -> bool {
    let start = Instant::now();
    let timeout = Duration::from_millis(timeout_ms);

    while start.elapsed() < timeout {
        let (_, body) = get_key(client, base, key).await;
        if body["data"] == expected {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    false
}
