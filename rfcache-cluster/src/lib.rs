//! Replicated key-value cache built on Raft consensus via OpenRaft.
//!
//! Writes are admitted only after they commit through the replicated log and
//! are then applied to an in-memory store on every node. Reads are served from
//! the local store without touching the log.
//!
//! # Architecture
//!
//! ```text
//!  client ──HTTP──► RequestGateway ──read──► Store
//!                        │                    ▲
//!                        │ propose / join     │ apply / restore
//!                        ▼                    │
//!                  ConsensusEngine ──────► StateMachine
//!                  (OpenRaft, log,          (CacheStateMachine)
//!                   snapshots, RPC)
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use rfcache_cluster::{CacheNode, NodeConfig};
//!
//! let config = NodeConfig::builder()
//!     .node_name("node1")
//!     .api_port(7000)
//!     .raft_port(7100)
//!     .bootstrap(true)
//!     .build()?;
//!
//! let mut node = CacheNode::start(config).await?;
//! // ... serve until shutdown
//! node.shutdown().await?;
//! ```

pub mod api;
pub mod command;
pub mod config;
pub mod error;
pub mod membership;
pub mod network;
pub mod raft;
pub mod state;
pub mod store;
pub mod types;

// Re-export main types
pub use api::{ApiError, RequestGateway};
pub use command::{Command, LogPayload};
pub use config::NodeConfig;
pub use error::{ClusterError, ClusterResult};
pub use membership::MembershipController;
pub use raft::{CacheNode, ConsensusEngine, EngineStatus, RaftEngine};
pub use state::{ApplyResponse, CacheStateMachine, StateMachine};
pub use store::Store;
pub use types::{ClusterMember, ClusterNodeId, TypeConfig};
