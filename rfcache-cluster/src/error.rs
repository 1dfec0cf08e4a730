//! Error types for cache and cluster operations.

use crate::types::ClusterNodeId;
use openraft::BasicNode;
use thiserror::Error;

/// Result type for cluster operations.
pub type ClusterResult<T> = std::result::Result<T, ClusterError>;

/// Type alias for OpenRaft Raft errors.
pub type RaftError<E = openraft::error::Infallible> = openraft::error::RaftError<ClusterNodeId, E>;

/// Type alias for OpenRaft RPC errors.
pub type RPCError<E = openraft::error::Infallible> =
    openraft::error::RPCError<ClusterNodeId, BasicNode, RaftError<E>>;

/// Errors that can occur in cache and cluster operations.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// Empty or malformed client input. Never reaches the log.
    #[error("{0}")]
    Validation(String),

    /// Command or snapshot encode/decode failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The engine rejected the proposal or lost it mid-flight.
    #[error("Replication error: {0}")]
    Replication(String),

    /// This node cannot accept writes; the leader hint is included when known.
    #[error("Not the leader, leader is {}", leader_hint(.leader, .address))]
    NotLeader {
        /// The current leader if known.
        leader: Option<ClusterNodeId>,
        /// The leader's transport address if known.
        address: Option<String>,
    },

    /// The operation did not resolve before its deadline.
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        /// Name of the operation that timed out.
        operation: &'static str,
        /// Deadline in milliseconds.
        timeout_ms: u64,
    },

    /// Bootstrap or membership change failure.
    #[error("Membership error: {0}")]
    Membership(String),

    /// Storage error.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Network/RPC error.
    #[error("Network error: {0}")]
    Network(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn leader_hint(leader: &Option<ClusterNodeId>, address: &Option<String>) -> String {
    match (leader, address) {
        (Some(id), Some(addr)) => format!("node {} at {}", id, addr),
        (Some(id), None) => format!("node {}", id),
        _ => "unknown".to_string(),
    }
}

impl ClusterError {
    /// Shorthand for a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        ClusterError::Validation(msg.into())
    }

    /// Whether this error was caused by client input rather than cluster state.
    pub fn is_client_error(&self) -> bool {
        matches!(self, ClusterError::Validation(_))
    }
}

impl From<serde_json::Error> for ClusterError {
    fn from(e: serde_json::Error) -> Self {
        ClusterError::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for ClusterError {
    fn from(e: reqwest::Error) -> Self {
        ClusterError::Network(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_leader_message_includes_hint() {
        let err = ClusterError::NotLeader {
            leader: Some(7),
            address: Some("10.0.0.2:7100".to_string()),
        };
        assert_eq!(err.to_string(), "Not the leader, leader is node 7 at 10.0.0.2:7100");

        let err = ClusterError::NotLeader {
            leader: None,
            address: None,
        };
        assert_eq!(err.to_string(), "Not the leader, leader is unknown");
    }

    #[test]
    fn serde_errors_become_serialization() {
        let err: ClusterError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, ClusterError::Serialization(_)));
        assert!(!err.is_client_error());
    }
}
