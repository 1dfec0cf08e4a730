//! HTTP endpoint for incoming Raft RPCs.
//!
//! Each RPC body is the JSON-encoded OpenRaft request; the response body is
//! the JSON-encoded `Result` returned by the local Raft instance, so remote
//! errors reach the caller intact.

use super::client::{APPEND_PATH, SNAPSHOT_PATH, VOTE_PATH};
use crate::api::{read_body, response};
use crate::types::{ClusterNodeId, ClusterRaft, TypeConfig};
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use openraft::raft::{AppendEntriesRequest, InstallSnapshotRequest, VoteRequest};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Largest accepted Raft RPC body. Snapshot chunks are JSON-encoded bytes.
pub const MAX_RPC_BODY: usize = 64 * 1024 * 1024;

/// Raft RPC handler bound to the local Raft instance.
#[derive(Clone)]
pub struct RaftServer {
    /// Reference to the Raft instance.
    raft: Arc<ClusterRaft>,
}

impl RaftServer {
    /// Create a new Raft server.
    pub fn new(raft: Arc<ClusterRaft>) -> Self {
        Self { raft }
    }

    /// Dispatch one RPC.
    pub async fn handle(&self, req: Request<Incoming>) -> Response<Full<Bytes>> {
        if req.method() != Method::POST {
            return response::method_not_allowed(&["POST"]);
        }

        let path = req.uri().path().to_string();
        let body = match read_body(req, MAX_RPC_BODY).await {
            Ok(body) => body,
            Err(r) => return r,
        };

        match path.as_str() {
            APPEND_PATH => match decode::<AppendEntriesRequest<TypeConfig>>(&body) {
                Ok(rpc) => reply(&self.raft.append_entries(rpc).await),
                Err(r) => r,
            },
            VOTE_PATH => match decode::<VoteRequest<ClusterNodeId>>(&body) {
                Ok(rpc) => reply(&self.raft.vote(rpc).await),
                Err(r) => r,
            },
            SNAPSHOT_PATH => match decode::<InstallSnapshotRequest<TypeConfig>>(&body) {
                Ok(rpc) => reply(&self.raft.install_snapshot(rpc).await),
                Err(r) => r,
            },
            _ => response::not_found(),
        }
    }
}

#[allow(clippy::result_large_err)]
fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, Response<Full<Bytes>>> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::warn!(error = %e, "malformed raft rpc");
        response::error(StatusCode::BAD_REQUEST, format!("json parse err: {}", e))
    })
}

fn reply<T: Serialize>(result: &T) -> Response<Full<Bytes>> {
    response::json_response(StatusCode::OK, result)
}
