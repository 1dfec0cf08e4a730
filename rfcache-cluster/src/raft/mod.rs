//! Raft consensus implementation.
//!
//! - `storage`: Raft log and vote persistence
//! - `snapshot_store`: finalized snapshots on disk
//! - `adapter`: OpenRaft state machine over the cache [`StateMachine`](crate::state::StateMachine)
//! - `engine`: the [`ConsensusEngine`] seam and its OpenRaft implementation
//! - `node`: wiring everything into a running [`CacheNode`]

pub mod adapter;
pub mod engine;
pub mod node;
pub mod snapshot_store;
pub mod storage;

pub use adapter::StateMachineStore;
pub use engine::{ConsensusEngine, EngineStatus, MemberStatus, RaftEngine};
pub use node::CacheNode;
pub use snapshot_store::{FileSnapshotSink, FileSnapshotStore, SnapshotRecord};
pub use storage::LogStorage;
