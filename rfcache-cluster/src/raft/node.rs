//! CacheNode - one running member of the replicated cache.

use crate::api::{self, RequestGateway, ServerHandle};
use crate::config::NodeConfig;
use crate::error::{ClusterError, ClusterResult};
use crate::membership::MembershipController;
use crate::network::{NetworkClient, RaftServer};
use crate::raft::adapter::StateMachineStore;
use crate::raft::engine::RaftEngine;
use crate::raft::snapshot_store::FileSnapshotStore;
use crate::raft::storage::LogStorage;
use crate::state::CacheStateMachine;
use crate::store::Store;
use crate::types::{ClusterMember, ClusterNodeId, ClusterRaft};
use openraft::{BasicNode, Config, Raft};
use std::net::SocketAddr;
use std::sync::Arc;

/// A running cache node: store, consensus engine, Raft RPC server and API
/// server.
pub struct CacheNode {
    node_id: ClusterNodeId,
    member: ClusterMember,
    store: Arc<Store>,
    raft: Arc<ClusterRaft>,
    engine: Arc<RaftEngine>,
    gateway: Arc<RequestGateway>,
    raft_server: ServerHandle,
    api_server: ServerHandle,
}

impl CacheNode {
    /// Start a node.
    ///
    /// Restores the newest local snapshot, opens the Raft log, starts both
    /// listeners, and bootstraps a new cluster when configured to.
    pub async fn start(config: NodeConfig) -> ClusterResult<Self> {
        config.validate().map_err(ClusterError::Config)?;

        // Bind first so a port of 0 resolves before the identity is derived.
        let raft_listener = api::server::bind(&config.raft_addr()).await?;
        let raft_port = raft_listener.local_addr()?.port();
        let member = ClusterMember::from_address(format!("{}:{}", config.addr, raft_port));
        let node_id = member.node_id();

        let data_dir = config.data_dir();
        tracing::info!(
            node = %config.node_name,
            node_id,
            %member,
            data_dir = %data_dir.display(),
            "starting cache node"
        );

        // Create storage
        let log_storage = LogStorage::open(data_dir.join("raft"))?;
        let snapshots = FileSnapshotStore::open(data_dir.join("snapshots"), config.snapshot.retain)?;

        // Create state machine
        let store = Arc::new(Store::new());
        let machine = Arc::new(CacheStateMachine::new(Arc::clone(&store)));
        let state_machine = Arc::new(StateMachineStore::open(machine, snapshots)?);

        // Create network client
        let network = NetworkClient::new(config.rpc_timeout())?;

        // Create Raft config
        let raft_config = Config {
            cluster_name: "rfcache".to_string(),
            election_timeout_min: config.raft.election_timeout_ms.0,
            election_timeout_max: config.raft.election_timeout_ms.1,
            heartbeat_interval: config.raft.heartbeat_interval_ms,
            max_payload_entries: config.raft.max_entries_per_append,
            snapshot_policy: openraft::SnapshotPolicy::LogsSinceLast(config.snapshot.threshold),
            ..Default::default()
        };

        let raft_config = Arc::new(
            raft_config
                .validate()
                .map_err(|e| ClusterError::Config(e.to_string()))?,
        );

        // Create Raft instance
        let raft = Raft::new(node_id, raft_config, network, log_storage, state_machine)
            .await
            .map_err(|e| ClusterError::Storage(format!("Failed to create Raft: {}", e)))?;
        let raft = Arc::new(raft);

        let engine = Arc::new(RaftEngine::new(node_id, Arc::clone(&raft)));
        let membership = MembershipController::new(engine.clone(), config.join_timeout());
        let gateway = Arc::new(RequestGateway::new(
            Arc::clone(&store),
            engine.clone(),
            membership.clone(),
            config.apply_timeout(),
        ));

        let rpc = RaftServer::new(Arc::clone(&raft));
        let raft_server = api::server::serve("raft", raft_listener, move |req| {
            let rpc = rpc.clone();
            async move { rpc.handle(req).await }
        })?;

        let api_listener = api::server::bind(&config.api_addr()).await?;
        let api_gateway = Arc::clone(&gateway);
        let api_server = api::server::serve("api", api_listener, move |req| {
            let gateway = Arc::clone(&api_gateway);
            async move { api::route(req, gateway).await }
        })?;

        if config.bootstrap {
            // A node restarting with existing state is already initialized.
            if let Err(e) = membership.bootstrap(member.clone()).await {
                tracing::warn!(node_id, error = %e, "bootstrap failed, continuing");
            }
        }

        tracing::info!(
            node_id,
            api_addr = %api_server.local_addr(),
            raft_addr = %raft_server.local_addr(),
            "cache node started"
        );

        Ok(Self {
            node_id,
            member,
            store,
            raft,
            engine,
            gateway,
            raft_server,
            api_server,
        })
    }

    /// Get this node's engine ID.
    pub fn node_id(&self) -> ClusterNodeId {
        self.node_id
    }

    /// This node as a cluster member.
    pub fn member(&self) -> &ClusterMember {
        &self.member
    }

    /// Address the API server listens on.
    pub fn api_addr(&self) -> SocketAddr {
        self.api_server.local_addr()
    }

    /// Address the Raft RPC server listens on.
    pub fn raft_addr(&self) -> SocketAddr {
        self.raft_server.local_addr()
    }

    /// The local store, for read-only inspection.
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// The consensus engine.
    pub fn engine(&self) -> &Arc<RaftEngine> {
        &self.engine
    }

    /// The request gateway.
    pub fn gateway(&self) -> &Arc<RequestGateway> {
        &self.gateway
    }

    /// Check if this node is the leader.
    pub async fn is_leader(&self) -> bool {
        self.raft.current_leader().await == Some(self.node_id)
    }

    /// Get the current leader's node ID.
    pub async fn leader(&self) -> Option<ClusterNodeId> {
        self.raft.current_leader().await
    }

    /// Get cluster metrics.
    pub fn metrics(&self) -> openraft::RaftMetrics<ClusterNodeId, BasicNode> {
        self.raft.metrics().borrow().clone()
    }

    /// Shutdown the node gracefully.
    pub async fn shutdown(&mut self) -> ClusterResult<()> {
        self.api_server.shutdown().await;
        self.raft_server.shutdown().await;

        self.raft
            .shutdown()
            .await
            .map_err(|e| ClusterError::Storage(format!("Shutdown error: {}", e)))?;

        tracing::info!(node_id = self.node_id, "cache node shutdown");
        Ok(())
    }
}
