//! Cluster membership requests.

use crate::error::{ClusterError, ClusterResult};
use crate::raft::ConsensusEngine;
use crate::types::ClusterMember;
use std::sync::Arc;
use std::time::Duration;

/// Bootstraps a new cluster or adds voters to an existing one.
#[derive(Clone)]
pub struct MembershipController {
    engine: Arc<dyn ConsensusEngine>,
    join_timeout: Duration,
}

impl MembershipController {
    /// Create a controller whose joins give up after `join_timeout`.
    pub fn new(engine: Arc<dyn ConsensusEngine>, join_timeout: Duration) -> Self {
        Self {
            engine,
            join_timeout,
        }
    }

    /// Form a single-member cluster containing only `member`.
    ///
    /// Must only be used on the one node that starts a brand-new cluster.
    pub async fn bootstrap(&self, member: ClusterMember) -> ClusterResult<()> {
        tracing::info!(%member, "bootstrapping cluster");
        self.engine.bootstrap(vec![member]).await
    }

    /// Add the node listening on `peer_address` as a voter.
    ///
    /// Returns once the membership change is committed, or fails on timeout.
    pub async fn join(&self, peer_address: &str) -> ClusterResult<()> {
        if peer_address.is_empty() {
            return Err(ClusterError::validation("peer_address is empty"));
        }

        let member = ClusterMember::from_address(peer_address);
        tracing::info!(%member, "joining peer");

        match tokio::time::timeout(self.join_timeout, self.engine.add_voter(&member)).await {
            Ok(result) => result,
            Err(_) => Err(ClusterError::Timeout {
                operation: "join",
                timeout_ms: self.join_timeout.as_millis() as u64,
            }),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::LocalEngine;
    use super::*;
    use crate::state::CacheStateMachine;
    use crate::store::Store;

    fn engine() -> LocalEngine {
        LocalEngine::new(Arc::new(CacheStateMachine::new(Arc::new(Store::new()))))
    }

    #[tokio::test]
    async fn join_uses_address_as_identity() {
        let engine = Arc::new(engine());
        let controller = MembershipController::new(engine.clone(), Duration::from_secs(1));

        controller.join("127.0.0.1:7101").await.expect("join");

        let voters = engine.voters.lock();
        assert_eq!(voters.len(), 1);
        assert_eq!(voters[0].id, "127.0.0.1:7101");
        assert_eq!(voters[0].address, "127.0.0.1:7101");
    }

    #[tokio::test]
    async fn empty_address_is_rejected() {
        let engine = Arc::new(engine());
        let controller = MembershipController::new(engine.clone(), Duration::from_secs(1));

        let err = controller.join("").await.unwrap_err();
        assert!(err.is_client_error());
        assert!(engine.voters.lock().is_empty());
    }

    #[tokio::test]
    async fn slow_join_times_out() {
        let mut engine = engine();
        engine.delay = Some(Duration::from_millis(200));
        let controller = MembershipController::new(Arc::new(engine), Duration::from_millis(20));

        let err = controller.join("127.0.0.1:7101").await.unwrap_err();
        assert!(matches!(err, ClusterError::Timeout { operation: "join", .. }));
    }

    #[tokio::test]
    async fn engine_failure_is_surfaced() {
        let mut engine = engine();
        engine.fail_with = Some(|| ClusterError::Membership("no quorum".to_string()));
        let controller = MembershipController::new(Arc::new(engine), Duration::from_secs(1));

        let err = controller.join("127.0.0.1:7101").await.unwrap_err();
        assert!(matches!(err, ClusterError::Membership(_)));
    }

    #[tokio::test]
    async fn bootstrap_registers_self() {
        let engine = Arc::new(engine());
        let controller = MembershipController::new(engine.clone(), Duration::from_secs(1));

        controller
            .bootstrap(ClusterMember::from_address("127.0.0.1:7100"))
            .await
            .expect("bootstrap");
        assert_eq!(engine.voters.lock().len(), 1);
    }
}
