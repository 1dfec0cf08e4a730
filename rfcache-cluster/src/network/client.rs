//! Network client implementing OpenRaft's RaftNetwork trait.

use crate::error::{ClusterError, RPCError, RaftError};
use crate::types::{ClusterNodeId, TypeConfig};
use openraft::BasicNode;
use openraft::error::{InstallSnapshotError, NetworkError, RemoteError, Unreachable};
use openraft::network::{RPCOption, RaftNetwork, RaftNetworkFactory};
use openraft::raft::{
    AppendEntriesRequest, AppendEntriesResponse, InstallSnapshotRequest, InstallSnapshotResponse,
    VoteRequest, VoteResponse,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Path of the AppendEntries RPC.
pub const APPEND_PATH: &str = "/raft/append";
/// Path of the RequestVote RPC.
pub const VOTE_PATH: &str = "/raft/vote";
/// Path of the InstallSnapshot RPC.
pub const SNAPSHOT_PATH: &str = "/raft/snapshot";

/// Factory for creating network connections to other nodes.
///
/// All connections share one pooled HTTP client.
#[derive(Clone)]
pub struct NetworkClient {
    http: reqwest::Client,
}

impl NetworkClient {
    /// Create a new network client with a per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self, ClusterError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }
}

impl RaftNetworkFactory<TypeConfig> for NetworkClient {
    type Network = NetworkConnection;

    async fn new_client(&mut self, target: ClusterNodeId, node: &BasicNode) -> Self::Network {
        NetworkConnection {
            target,
            addr: node.addr.clone(),
            http: self.http.clone(),
        }
    }
}

/// A connection to a specific node.
pub struct NetworkConnection {
    /// Target node ID.
    target: ClusterNodeId,
    /// Target address.
    addr: String,
    http: reqwest::Client,
}

impl NetworkConnection {
    /// POST `req` as JSON and decode the peer's `Result` envelope.
    async fn call<Req, Resp, E>(&self, path: &str, req: &Req) -> Result<Resp, RPCError<E>>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
        E: std::error::Error + DeserializeOwned,
    {
        let url = format!("http://{}{}", self.addr, path);

        let response = self
            .http
            .post(&url)
            .json(req)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    openraft::error::RPCError::Unreachable(Unreachable::new(&e))
                } else {
                    openraft::error::RPCError::Network(NetworkError::new(&e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let err = ClusterError::Network(format!("{} returned {}", url, status));
            return Err(openraft::error::RPCError::Network(NetworkError::new(&err)));
        }

        let result: Result<Resp, RaftError<E>> = response
            .json()
            .await
            .map_err(|e| openraft::error::RPCError::Network(NetworkError::new(&e)))?;

        result.map_err(|e| openraft::error::RPCError::RemoteError(RemoteError::new(self.target, e)))
    }
}

impl RaftNetwork<TypeConfig> for NetworkConnection {
    async fn append_entries(
        &mut self,
        req: AppendEntriesRequest<TypeConfig>,
        _option: RPCOption,
    ) -> Result<AppendEntriesResponse<ClusterNodeId>, RPCError> {
        self.call(APPEND_PATH, &req).await
    }

    async fn install_snapshot(
        &mut self,
        req: InstallSnapshotRequest<TypeConfig>,
        _option: RPCOption,
    ) -> Result<InstallSnapshotResponse<ClusterNodeId>, RPCError<InstallSnapshotError>> {
        self.call(SNAPSHOT_PATH, &req).await
    }

    async fn vote(
        &mut self,
        req: VoteRequest<ClusterNodeId>,
        _option: RPCOption,
    ) -> Result<VoteResponse<ClusterNodeId>, RPCError> {
        self.call(VOTE_PATH, &req).await
    }
}
