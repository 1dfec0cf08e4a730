//! Request gateway: client requests to store reads and log proposals.

use crate::command::Command;
use crate::error::{ClusterError, ClusterResult};
use crate::membership::MembershipController;
use crate::raft::{ConsensusEngine, EngineStatus};
use crate::store::Store;
use std::sync::Arc;
use std::time::Duration;

/// Stateless mediator between the HTTP surface and the cluster.
///
/// Reads go straight to the local store. Writes and joins go through the
/// replicated log and block until they commit, fail, or time out. Nothing is
/// retried here.
#[derive(Clone)]
pub struct RequestGateway {
    store: Arc<Store>,
    engine: Arc<dyn ConsensusEngine>,
    membership: MembershipController,
    apply_timeout: Duration,
}

impl RequestGateway {
    /// Create a gateway.
    pub fn new(
        store: Arc<Store>,
        engine: Arc<dyn ConsensusEngine>,
        membership: MembershipController,
        apply_timeout: Duration,
    ) -> Self {
        Self {
            store,
            engine,
            membership,
            apply_timeout,
        }
    }

    /// Read `key` from local state. Absent keys read as empty.
    pub fn handle_get(&self, key: &str) -> ClusterResult<String> {
        if key.is_empty() {
            return Err(ClusterError::validation("key is empty"));
        }
        Ok(self.store.get(key))
    }

    /// Replicate `key = value` and wait for it to be applied.
    pub async fn handle_set(&self, key: &str, value: &str) -> ClusterResult<()> {
        if key.is_empty() {
            return Err(ClusterError::validation("key is empty"));
        }
        if value.is_empty() {
            return Err(ClusterError::validation("value is empty"));
        }

        let command = Command::set(key, value).encode()?;

        match tokio::time::timeout(self.apply_timeout, self.engine.apply(command)).await {
            Ok(result) => result,
            Err(_) => Err(ClusterError::Timeout {
                operation: "set",
                timeout_ms: self.apply_timeout.as_millis() as u64,
            }),
        }
    }

    /// Add the node at `peer_address` as a voter.
    pub async fn handle_join(&self, peer_address: &str) -> ClusterResult<()> {
        self.membership.join(peer_address).await
    }

    /// Engine status for operators.
    pub fn status(&self) -> EngineStatus {
        self.engine.status()
    }
}
