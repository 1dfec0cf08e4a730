//! Consensus engine seam.
//!
//! Everything above this module (gateway, membership) talks to the replicated
//! log through [`ConsensusEngine`]. [`RaftEngine`] is the OpenRaft-backed
//! implementation.

use crate::command::LogPayload;
use crate::error::{ClusterError, ClusterResult};
use crate::types::{
    ClusterMember, ClusterNodeId, ClusterRaft, ClusterRaftWriteError, extract_forward_to_leader,
};
use async_trait::async_trait;
use openraft::{BasicNode, ChangeMembers};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Operations the cache needs from the replicated log.
#[async_trait]
pub trait ConsensusEngine: Send + Sync {
    /// Propose an encoded command and wait until it is committed and applied.
    async fn apply(&self, command: Vec<u8>) -> ClusterResult<()>;

    /// Add `member` as a voter and wait until the change is committed.
    async fn add_voter(&self, member: &ClusterMember) -> ClusterResult<()>;

    /// Form a brand-new cluster from `members`.
    async fn bootstrap(&self, members: Vec<ClusterMember>) -> ClusterResult<()>;

    /// Leadership signal: `true` while this node leads.
    fn leadership(&self) -> watch::Receiver<bool>;

    /// Point-in-time view of the engine for operators.
    fn status(&self) -> EngineStatus;
}

/// Operator view of a node's consensus state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngineStatus {
    /// This node's engine id.
    pub node_id: ClusterNodeId,
    /// Role: Leader, Follower, Candidate, Learner or Shutdown.
    pub state: String,
    /// Current leader, if known.
    pub leader_id: Option<ClusterNodeId>,
    /// Current term.
    pub term: u64,
    /// Index of the last applied log entry.
    pub last_applied: Option<u64>,
    /// Members of the current configuration.
    pub members: Vec<MemberStatus>,
}

/// One member in [`EngineStatus`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemberStatus {
    /// Engine id.
    pub node_id: ClusterNodeId,
    /// Raft address, which is also the member identity.
    pub address: String,
    /// Whether the member votes.
    pub voter: bool,
    /// Whether the member is the current leader.
    pub is_leader: bool,
}

/// [`ConsensusEngine`] backed by an OpenRaft instance.
pub struct RaftEngine {
    node_id: ClusterNodeId,
    raft: Arc<ClusterRaft>,
    leadership: watch::Receiver<bool>,
    watcher: JoinHandle<()>,
}

impl RaftEngine {
    /// Wrap `raft`, watching its metrics for leadership changes.
    pub fn new(node_id: ClusterNodeId, raft: Arc<ClusterRaft>) -> Self {
        let (tx, rx) = watch::channel(false);
        let mut metrics = raft.metrics();

        let watcher = tokio::spawn(async move {
            loop {
                let is_leader = metrics.borrow_and_update().current_leader == Some(node_id);
                let changed = tx.send_if_modified(|current| {
                    if *current == is_leader {
                        return false;
                    }
                    *current = is_leader;
                    true
                });
                if changed {
                    if is_leader {
                        tracing::info!(node_id, "became leader");
                    } else {
                        tracing::info!(node_id, "lost leadership");
                    }
                }

                if metrics.changed().await.is_err() {
                    break;
                }
            }
        });

        Self {
            node_id,
            raft,
            leadership: rx,
            watcher,
        }
    }

    /// The wrapped OpenRaft instance.
    pub fn raft(&self) -> &Arc<ClusterRaft> {
        &self.raft
    }

    /// This node's engine id.
    pub fn node_id(&self) -> ClusterNodeId {
        self.node_id
    }
}

impl Drop for RaftEngine {
    fn drop(&mut self) {
        self.watcher.abort();
    }
}

#[async_trait]
impl ConsensusEngine for RaftEngine {
    async fn apply(&self, command: Vec<u8>) -> ClusterResult<()> {
        let response = self
            .raft
            .client_write(LogPayload::new(command))
            .await
            .map_err(|e| write_error(e, ClusterError::Replication))?;

        if response.data.success {
            Ok(())
        } else {
            Err(ClusterError::Replication(
                response
                    .data
                    .error
                    .unwrap_or_else(|| "entry rejected by state machine".to_string()),
            ))
        }
    }

    async fn add_voter(&self, member: &ClusterMember) -> ClusterResult<()> {
        let id = member.node_id();
        let node = BasicNode {
            addr: member.address.clone(),
        };

        self.raft
            .add_learner(id, node, true)
            .await
            .map_err(|e| write_error(e, ClusterError::Membership))?;
        tracing::debug!(node_id = id, %member, "learner caught up");

        let voters: BTreeSet<ClusterNodeId> = [id].into_iter().collect();
        self.raft
            .change_membership(ChangeMembers::AddVoterIds(voters), false)
            .await
            .map_err(|e| write_error(e, ClusterError::Membership))?;

        tracing::info!(node_id = id, %member, "added voter");
        Ok(())
    }

    async fn bootstrap(&self, members: Vec<ClusterMember>) -> ClusterResult<()> {
        let nodes: BTreeMap<ClusterNodeId, BasicNode> = members
            .iter()
            .map(|m| {
                (
                    m.node_id(),
                    BasicNode {
                        addr: m.address.clone(),
                    },
                )
            })
            .collect();

        self.raft
            .initialize(nodes)
            .await
            .map_err(|e| ClusterError::Membership(e.to_string()))?;

        tracing::info!(node_id = self.node_id, members = members.len(), "cluster bootstrapped");
        Ok(())
    }

    fn leadership(&self) -> watch::Receiver<bool> {
        self.leadership.clone()
    }

    fn status(&self) -> EngineStatus {
        let metrics = self.raft.metrics().borrow().clone();
        let membership = metrics.membership_config.membership();
        let voters: BTreeSet<ClusterNodeId> = membership.voter_ids().collect();

        let members = membership
            .nodes()
            .map(|(id, node)| MemberStatus {
                node_id: *id,
                address: node.addr.clone(),
                voter: voters.contains(id),
                is_leader: metrics.current_leader == Some(*id),
            })
            .collect();

        EngineStatus {
            node_id: self.node_id,
            state: format!("{:?}", metrics.state),
            leader_id: metrics.current_leader,
            term: metrics.current_term,
            last_applied: metrics.last_applied.map(|id| id.index),
            members,
        }
    }
}

/// Map a write-path error, keeping the leader hint when there is one.
fn write_error(e: ClusterRaftWriteError, other: fn(String) -> ClusterError) -> ClusterError {
    match extract_forward_to_leader(&e) {
        Some(info) => ClusterError::NotLeader {
            leader: info.leader_id,
            address: info.leader_addr,
        },
        None => other(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openraft::error::{ClientWriteError, ForwardToLeader, RaftError};

    #[test]
    fn forward_to_leader_becomes_not_leader() {
        let err: ClusterRaftWriteError = RaftError::APIError(ClientWriteError::ForwardToLeader(
            ForwardToLeader::new(
                42,
                BasicNode {
                    addr: "127.0.0.1:7101".to_string(),
                },
            ),
        ));

        match write_error(err, ClusterError::Replication) {
            ClusterError::NotLeader { leader, address } => {
                assert_eq!(leader, Some(42));
                assert_eq!(address.as_deref(), Some("127.0.0.1:7101"));
            }
            other => panic!("expected NotLeader, got {:?}", other),
        }
    }

    #[test]
    fn unknown_leader_still_not_leader() {
        let err: ClusterRaftWriteError = RaftError::APIError(ClientWriteError::ForwardToLeader(
            ForwardToLeader::empty(),
        ));

        assert!(matches!(
            write_error(err, ClusterError::Membership),
            ClusterError::NotLeader {
                leader: None,
                address: None
            }
        ));
    }
}
