//! Type definitions for OpenRaft integration.
//!
//! OpenRaft requires a type configuration that specifies all the concrete types
//! used in the Raft implementation. This module defines the cache's type
//! configuration along with cluster member identity.

use crate::command::LogPayload;
use crate::state::ApplyResponse;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::Cursor;

/// Node ID type used by the consensus engine.
///
/// Derived from the member's transport address, see [`ClusterMember::node_id`].
pub type ClusterNodeId = u64;

openraft::declare_raft_types!(
    /// OpenRaft type configuration for the replicated cache.
    pub TypeConfig:
        D = LogPayload,
        R = ApplyResponse,
);

/// Type alias for Raft instance.
pub type ClusterRaft = openraft::Raft<TypeConfig>;

/// Type alias for log entry.
pub type ClusterEntry = openraft::Entry<TypeConfig>;

/// Type alias for vote.
pub type ClusterVote = openraft::Vote<ClusterNodeId>;

/// Type alias for log ID.
pub type ClusterLogId = openraft::LogId<ClusterNodeId>;

/// Type alias for stored membership.
pub type ClusterStoredMembership = openraft::StoredMembership<ClusterNodeId, openraft::BasicNode>;

/// Type alias for snapshot metadata.
pub type ClusterSnapshotMeta = openraft::SnapshotMeta<ClusterNodeId, openraft::BasicNode>;

/// Type alias for snapshot.
pub type ClusterSnapshot = openraft::storage::Snapshot<TypeConfig>;

/// Type alias for storage error.
pub type ClusterStorageError = openraft::StorageError<ClusterNodeId>;

/// Type alias for client write error.
pub type ClusterClientWriteError =
    openraft::error::ClientWriteError<ClusterNodeId, openraft::BasicNode>;

/// Type alias for raft error with client write error.
pub type ClusterRaftWriteError = openraft::error::RaftError<ClusterNodeId, ClusterClientWriteError>;

/// A voting member of the cluster.
///
/// The member's transport address doubles as its identity, so joining a node
/// only requires knowing where it listens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClusterMember {
    /// Member identity.
    pub id: String,
    /// Raft transport address (`host:port`).
    pub address: String,
}

impl ClusterMember {
    /// Create a member whose identity is its address.
    pub fn from_address(address: impl Into<String>) -> Self {
        let address = address.into();
        Self {
            id: address.clone(),
            address,
        }
    }

    /// Numeric id handed to the consensus engine.
    pub fn node_id(&self) -> ClusterNodeId {
        node_id_for(&self.id)
    }
}

impl fmt::Display for ClusterMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.id == self.address {
            write!(f, "{}", self.address)
        } else {
            write!(f, "{}@{}", self.id, self.address)
        }
    }
}

/// Derive the engine's numeric node id from a member identity.
///
/// Takes the first 8 bytes of the SHA-256 digest, big-endian. Every node
/// computes the same id for the same address, with no coordination.
pub fn node_id_for(identity: &str) -> ClusterNodeId {
    let digest = Sha256::digest(identity.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    ClusterNodeId::from_be_bytes(prefix)
}

/// Information about the leader to forward requests to.
#[derive(Debug, Clone)]
pub struct LeaderInfo {
    /// The leader's node ID.
    pub leader_id: Option<ClusterNodeId>,
    /// The leader's address if known.
    pub leader_addr: Option<String>,
}

/// Extract forward-to-leader info from a client write error.
///
/// Returns `Some(LeaderInfo)` if the error is a ForwardToLeader error,
/// `None` otherwise.
pub fn extract_forward_to_leader(error: &ClusterRaftWriteError) -> Option<LeaderInfo> {
    use openraft::error::RaftError;

    match error {
        RaftError::APIError(ClusterClientWriteError::ForwardToLeader(forward)) => Some(LeaderInfo {
            leader_id: forward.leader_id,
            leader_addr: forward
                .leader_node
                .as_ref()
                .map(|n| n.addr.clone())
                .filter(|a| !a.is_empty()),
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_is_stable_per_address() {
        let a = ClusterMember::from_address("127.0.0.1:7100");
        let b = ClusterMember::from_address("127.0.0.1:7100");
        let c = ClusterMember::from_address("127.0.0.1:7101");

        assert_eq!(a.node_id(), b.node_id());
        assert_ne!(a.node_id(), c.node_id());
        assert_eq!(a.node_id(), node_id_for("127.0.0.1:7100"));
    }

    #[test]
    fn snapshot_data_is_in_memory_cursor() {
        use std::io::Read;

        let snapshot = ClusterSnapshot {
            meta: ClusterSnapshotMeta {
                last_log_id: None,
                last_membership: ClusterStoredMembership::default(),
                snapshot_id: "s-1".to_string(),
            },
            snapshot: Box::new(Cursor::new(b"{\"a\":\"1\"}".to_vec())),
        };

        let mut data = String::new();
        let mut cursor = snapshot.snapshot;
        cursor.read_to_string(&mut data).expect("read snapshot data");
        assert_eq!(data, r#"{"a":"1"}"#);
    }

    #[test]
    fn member_display() {
        let m = ClusterMember::from_address("10.0.0.1:7100");
        assert_eq!(m.to_string(), "10.0.0.1:7100");

        let m = ClusterMember {
            id: "node-a".to_string(),
            address: "10.0.0.1:7100".to_string(),
        };
        assert_eq!(m.to_string(), "node-a@10.0.0.1:7100");
    }
}
