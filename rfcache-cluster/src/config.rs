//! Node configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for a cache node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Human-readable node name. Also names the default data directory.
    pub node_name: String,

    /// Address both listeners bind to and advertise (e.g., "127.0.0.1").
    pub addr: String,

    /// Port for the HTTP control surface. 0 picks a free port.
    pub api_port: u16,

    /// Port for Raft RPC. 0 picks a free port.
    pub raft_port: u16,

    /// Form a new single-member cluster at startup.
    ///
    /// Set on exactly one node of a brand-new cluster; every other node joins.
    pub bootstrap: bool,

    /// Directory for the Raft log, stable state and snapshots.
    /// If not set, uses `./<node_name>`.
    pub data_dir: Option<PathBuf>,

    /// Deadline for a write to commit, in milliseconds.
    pub apply_timeout_ms: u64,

    /// Deadline for a membership change to commit, in milliseconds.
    pub join_timeout_ms: u64,

    /// Raft timing configuration.
    pub raft: RaftConfig,

    /// Snapshot configuration.
    pub snapshot: SnapshotConfig,
}

/// Raft timing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaftConfig {
    /// Election timeout range (min, max) in milliseconds.
    pub election_timeout_ms: (u64, u64),

    /// Heartbeat interval in milliseconds.
    pub heartbeat_interval_ms: u64,

    /// Maximum entries per AppendEntries RPC.
    pub max_entries_per_append: u64,

    /// Timeout for a single Raft RPC to a peer, in milliseconds.
    pub rpc_timeout_ms: u64,
}

/// Snapshot configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// Create a snapshot after this many log entries since the last one.
    pub threshold: u64,

    /// Number of snapshots kept on disk.
    pub retain: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_name: "node1".to_string(),
            addr: "127.0.0.1".to_string(),
            api_port: 7000,
            raft_port: 7100,
            bootstrap: false,
            data_dir: None,
            apply_timeout_ms: 5_000,
            join_timeout_ms: 1_000,
            raft: RaftConfig::default(),
            snapshot: SnapshotConfig::default(),
        }
    }
}

impl Default for RaftConfig {
    fn default() -> Self {
        Self {
            election_timeout_ms: (150, 300),
            heartbeat_interval_ms: 50,
            max_entries_per_append: 100,
            rpc_timeout_ms: 10_000,
        }
    }
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            threshold: 2,
            retain: 1,
        }
    }
}

impl NodeConfig {
    /// Create a new configuration builder.
    pub fn builder() -> NodeConfigBuilder {
        NodeConfigBuilder::default()
    }

    /// Directory holding this node's persistent state.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("./{}", self.node_name)))
    }

    /// `addr:api_port`.
    pub fn api_addr(&self) -> String {
        format!("{}:{}", self.addr, self.api_port)
    }

    /// `addr:raft_port`.
    pub fn raft_addr(&self) -> String {
        format!("{}:{}", self.addr, self.raft_port)
    }

    /// Deadline for writes.
    pub fn apply_timeout(&self) -> Duration {
        Duration::from_millis(self.apply_timeout_ms)
    }

    /// Deadline for joins.
    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    /// Timeout for peer RPCs.
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.raft.rpc_timeout_ms)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.node_name.is_empty() {
            return Err("node_name is required".to_string());
        }

        if self.addr.is_empty() {
            return Err("addr is required".to_string());
        }

        if self.api_port != 0 && self.api_port == self.raft_port {
            return Err(format!(
                "api_port and raft_port must differ (both {})",
                self.api_port
            ));
        }

        if self.apply_timeout_ms == 0 || self.join_timeout_ms == 0 {
            return Err("apply and join timeouts must be > 0".to_string());
        }

        let (min_election, max_election) = self.raft.election_timeout_ms;
        if min_election >= max_election {
            return Err(format!(
                "election_timeout_ms min ({}) must be < max ({})",
                min_election, max_election
            ));
        }

        // Heartbeat should be much less than election timeout
        if self.raft.heartbeat_interval_ms >= min_election / 2 {
            return Err(format!(
                "heartbeat_interval_ms ({}) should be << election_timeout_ms ({})",
                self.raft.heartbeat_interval_ms, min_election
            ));
        }

        if self.snapshot.threshold == 0 || self.snapshot.retain == 0 {
            return Err("snapshot threshold and retain must be > 0".to_string());
        }

        Ok(())
    }
}

/// Builder for NodeConfig.
#[derive(Debug, Default)]
pub struct NodeConfigBuilder {
    config: NodeConfig,
}

impl NodeConfigBuilder {
    /// Set the node name.
    pub fn node_name(mut self, name: impl Into<String>) -> Self {
        self.config.node_name = name.into();
        self
    }

    /// Set the bind/advertise address.
    pub fn addr(mut self, addr: impl Into<String>) -> Self {
        self.config.addr = addr.into();
        self
    }

    /// Set the API port.
    pub fn api_port(mut self, port: u16) -> Self {
        self.config.api_port = port;
        self
    }

    /// Set the Raft port.
    pub fn raft_port(mut self, port: u16) -> Self {
        self.config.raft_port = port;
        self
    }

    /// Bootstrap a new cluster on startup.
    pub fn bootstrap(mut self, bootstrap: bool) -> Self {
        self.config.bootstrap = bootstrap;
        self
    }

    /// Set the data directory.
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = Some(path.into());
        self
    }

    /// Set the write deadline.
    pub fn apply_timeout(mut self, timeout: Duration) -> Self {
        self.config.apply_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the join deadline.
    pub fn join_timeout(mut self, timeout: Duration) -> Self {
        self.config.join_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set election timeout range in milliseconds.
    pub fn election_timeout_ms(mut self, min: u64, max: u64) -> Self {
        self.config.raft.election_timeout_ms = (min, max);
        self
    }

    /// Set heartbeat interval in milliseconds.
    pub fn heartbeat_interval_ms(mut self, ms: u64) -> Self {
        self.config.raft.heartbeat_interval_ms = ms;
        self
    }

    /// Set snapshot threshold.
    pub fn snapshot_threshold(mut self, entries: u64) -> Self {
        self.config.snapshot.threshold = entries;
        self
    }

    /// Set how many snapshots are kept.
    pub fn snapshot_retain(mut self, count: usize) -> Self {
        self.config.snapshot.retain = count;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> Result<NodeConfig, String> {
        self.config.validate()?;
        Ok(self.config)
    }
}
