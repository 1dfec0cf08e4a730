//! Multi-node cluster tests.
//!
//! Nodes join a bootstrapped leader through `POST /join` and receive its
//! writes through the replicated log.

mod common;

use serde_json::json;
use std::time::Duration;
use tempfile::TempDir;

/// A joined node eventually serves the leader's writes.
#[tokio::test]
async fn test_join_then_replicate() {
    let leader_dir = TempDir::new().expect("Failed to create temp dir");
    let follower_dir = TempDir::new().expect("Failed to create temp dir");

    let mut leader = common::start_node(common::test_config("node1", leader_dir.path(), true)).await;
    assert!(common::wait_for_leader(&leader, 3000).await);

    let mut follower =
        common::start_node(common::test_config("node2", follower_dir.path(), false)).await;

    let client = reqwest::Client::new();
    let leader_api = common::api_url(&leader);
    let follower_api = common::api_url(&follower);

    let (status, body) = common::post_json(
        &client,
        &leader_api,
        "/join",
        json!({"peer_address": follower.member().address}),
    )
    .await;
    assert_eq!(status, 200, "join failed: {}", body);
    assert_eq!(body["code"], 0);

    let (status, body) =
        common::post_json(&client, &leader_api, "/set", json!({"key": "a", "value": "1"})).await;
    assert_eq!(status, 200, "set failed: {}", body);

    assert!(
        common::wait_for_value(&client, &follower_api, "a", "1", 5000).await,
        "Joined node should see the replicated write"
    );

    // Both nodes agree on the leader
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(follower.leader().await, Some(leader.node_id()));

    follower.shutdown().await.expect("Failed to shutdown follower");
    leader.shutdown().await.expect("Failed to shutdown leader");
}

/// Writes sent to a follower are refused with the leader hint.
#[tokio::test]
async fn test_follower_refuses_writes() {
    let leader_dir = TempDir::new().expect("Failed to create temp dir");
    let follower_dir = TempDir::new().expect("Failed to create temp dir");

    let mut leader = common::start_node(common::test_config("node1", leader_dir.path(), true)).await;
    assert!(common::wait_for_leader(&leader, 3000).await);
    let mut follower =
        common::start_node(common::test_config("node2", follower_dir.path(), false)).await;

    let client = reqwest::Client::new();
    let (status, _) = common::post_json(
        &client,
        &common::api_url(&leader),
        "/join",
        json!({"peer_address": follower.member().address}),
    )
    .await;
    assert_eq!(status, 200);

    let (status, body) = common::post_json(
        &client,
        &common::api_url(&follower),
        "/set",
        json!({"key": "a", "value": "1"}),
    )
    .await;
    assert_eq!(status, 503);
    assert_eq!(body["code"], 1);
    assert!(body["error_message"]
        .as_str()
        .unwrap()
        .contains("Not the leader"));
    assert_eq!(follower.store().get("a"), "");

    follower.shutdown().await.expect("Failed to shutdown follower");
    leader.shutdown().await.expect("Failed to shutdown leader");
}

/// A node joining after many writes (and snapshots) catches up fully.
#[tokio::test]
async fn test_late_joiner_catches_up() {
    let leader_dir = TempDir::new().expect("Failed to create temp dir");
    let follower_dir = TempDir::new().expect("Failed to create temp dir");

    let mut leader = common::start_node(common::test_config("node1", leader_dir.path(), true)).await;
    assert!(common::wait_for_leader(&leader, 3000).await);

    let client = reqwest::Client::new();
    let leader_api = common::api_url(&leader);
    for i in 0..20 {
        let (status, body) = common::post_json(
            &client,
            &leader_api,
            "/set",
            json!({"key": format!("k{}", i), "value": format!("v{}", i)}),
        )
        .await;
        assert_eq!(status, 200, "set failed: {}", body);
    }

    let mut follower =
        common::start_node(common::test_config("node2", follower_dir.path(), false)).await;
    let (status, body) = common::post_json(
        &client,
        &leader_api,
        "/join",
        json!({"peer_address": follower.member().address}),
    )
    .await;
    assert_eq!(status, 200, "join failed: {}", body);

    let follower_api = common::api_url(&follower);
    assert!(common::wait_for_value(&client, &follower_api, "k19", "v19", 5000).await);
    let (_, body) = common::get_key(&client, &follower_api, "k0").await;
    assert_eq!(body["data"], "v0");

    follower.shutdown().await.expect("Failed to shutdown follower");
    leader.shutdown().await.expect("Failed to shutdown leader");
}
