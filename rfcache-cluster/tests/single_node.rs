//! Single-node cluster tests.
//!
//! Drives one bootstrapped node through its HTTP surface.

mod common;

use serde_json::json;
use tempfile::TempDir;

/// A bootstrapped node elects itself and serves writes and reads.
#[tokio::test]
async fn test_single_node_set_then_get() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let mut node = common::start_node(common::test_config("node1", temp_dir.path(), true)).await;

    assert!(
        common::wait_for_leader(&node, 3000).await,
        "Single node should become leader"
    );

    let client = reqwest::Client::new();
    let base = common::api_url(&node);

    let (status, body) =
        common::post_json(&client, &base, "/set", json!({"key": "a", "value": "1"})).await;
    assert_eq!(status, 200);
    assert_eq!(body["code"], 0, "set failed: {}", body);

    let (status, body) = common::get_key(&client, &base, "a").await;
    assert_eq!(status, 200);
    assert_eq!(body["code"], 0);
    assert_eq!(body["data"], "1");

    // Absent keys read as empty
    let (status, body) = common::get_key(&client, &base, "missing").await;
    assert_eq!(status, 200);
    assert_eq!(body["data"], "");

    node.shutdown().await.expect("Failed to shutdown");
}

/// Empty keys and values are rejected with 400 and never applied.
#[tokio::test]
async fn test_single_node_validation() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let mut node = common::start_node(common::test_config("node1", temp_dir.path(), true)).await;
    assert!(common::wait_for_leader(&node, 3000).await);

    let client = reqwest::Client::new();
    let base = common::api_url(&node);

    let (status, body) =
        common::post_json(&client, &base, "/set", json!({"key": "", "value": "1"})).await;
    assert_eq!(status, 400);
    assert_eq!(body["code"], 1);
    assert!(body["error_message"].as_str().unwrap().contains("key is empty"));

    let (status, body) =
        common::post_json(&client, &base, "/set", json!({"key": "a", "value": ""})).await;
    assert_eq!(status, 400);
    assert!(body["error_message"].as_str().unwrap().contains("value is empty"));

    let (status, body) = common::post_json(&client, &base, "/join", json!({})).await;
    assert_eq!(status, 400);
    assert_eq!(body["error_message"], "peer_address is empty");

    let response = client
        .get(format!("{}/get", base))
        .send()
        .await
        .expect("Failed to send get");
    assert_eq!(response.status().as_u16(), 400);

    assert!(node.store().is_empty(), "Rejected writes must not be applied");

    node.shutdown().await.expect("Failed to shutdown");
}

/// Unknown paths and wrong methods are answered, not dropped.
#[tokio::test]
async fn test_single_node_routing_errors() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let mut node = common::start_node(common::test_config("node1", temp_dir.path(), true)).await;

    let client = reqwest::Client::new();
    let base = common::api_url(&node);

    let response = client
        .get(format!("{}/nope", base))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status().as_u16(), 404);

    let response = client
        .get(format!("{}/set", base))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status().as_u16(), 405);
    assert_eq!(response.headers()["allow"], "POST");

    node.shutdown().await.expect("Failed to shutdown");
}

/// The status endpoint reports the node as sole voter and leader.
#[tokio::test]
async fn test_single_node_status() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let mut node = common::start_node(common::test_config("node1", temp_dir.path(), true)).await;
    assert!(common::wait_for_leader(&node, 3000).await);

    let client = reqwest::Client::new();
    let body: serde_json::Value = client
        .get(format!("{}/status", common::api_url(&node)))
        .send()
        .await
        .expect("Failed to send status")
        .json()
        .await
        .expect("Failed to decode status");

    assert_eq!(body["code"], 0);
    assert_eq!(body["data"]["state"], "Leader");
    assert_eq!(body["data"]["leader_id"], node.node_id());
    let members = body["data"]["members"].as_array().expect("members array");
    assert_eq!(members.len(), 1);
    assert_eq!(members[0]["address"], node.member().address);
    assert_eq!(members[0]["is_leader"], true);

    // Identity is the advertised address with the port actually bound
    assert_eq!(
        node.member().address,
        format!("127.0.0.1:{}", node.raft_addr().port())
    );

    node.shutdown().await.expect("Failed to shutdown");
}

/// State survives a restart: snapshots plus committed log are replayed.
#[tokio::test]
async fn test_single_node_restart_recovers_state() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let api_port = common::get_test_port();
    let raft_port = common::get_test_port();

    let client = reqwest::Client::new();

    {
        let config = common::test_config_on("node1", temp_dir.path(), true, api_port, raft_port);
        let mut node = common::start_node(config).await;
        assert!(common::wait_for_leader(&node, 3000).await);

        let base = common::api_url(&node);
        for i in 0..10 {
            let (status, body) = common::post_json(
                &client,
                &base,
                "/set",
                json!({"key": format!("k{}", i), "value": format!("v{}", i)}),
            )
            .await;
            assert_eq!(status, 200, "set failed: {}", body);
        }

        node.shutdown().await.expect("Failed to shutdown");
    }

    // Same identity, same data dir. Bootstrapping again is refused and ignored.
    // A fresh client keeps pooled connections to the old server out of the way.
    let client = reqwest::Client::new();
    let config = common::test_config_on("node1", temp_dir.path(), true, api_port, raft_port);
    let mut node = common::start_node(config).await;
    assert!(common::wait_for_leader(&node, 3000).await);

    let base = common::api_url(&node);
    assert!(
        common::wait_for_value(&client, &base, "k9", "v9", 3000).await,
        "State should be recovered after restart"
    );
    let (_, body) = common::get_key(&client, &base, "k0").await;
    assert_eq!(body["data"], "v0");

    node.shutdown().await.expect("Failed to shutdown");
}
