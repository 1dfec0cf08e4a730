//! OpenRaft state machine adapter.
//!
//! Binds a [`StateMachine`] to OpenRaft's `RaftStateMachine` and
//! `RaftSnapshotBuilder` interfaces. Committed entries are decoded from the
//! log payload and handed to the state machine; snapshots go through the
//! [`FileSnapshotStore`].

use crate::error::ClusterResult;
use crate::raft::snapshot_store::FileSnapshotStore;
use crate::state::{ApplyResponse, SnapshotSink, StateMachine};
use crate::types::{
    ClusterEntry, ClusterLogId, ClusterSnapshot, ClusterSnapshotMeta, ClusterStorageError,
    ClusterStoredMembership, TypeConfig,
};
use openraft::storage::RaftStateMachine;
use openraft::{EntryPayload, RaftSnapshotBuilder, RaftTypeConfig, StorageIOError, StoredMembership};
use parking_lot::Mutex;
use std::io::{Cursor, Write};
use std::sync::Arc;

/// Log position and membership as of the last applied entry.
#[derive(Debug, Default, Clone)]
struct AppliedState {
    last_applied: Option<ClusterLogId>,
    membership: ClusterStoredMembership,
}

/// The state machine as seen by OpenRaft.
pub struct StateMachineStore {
    machine: Arc<dyn StateMachine>,
    snapshots: FileSnapshotStore,
    applied: Mutex<AppliedState>,
}

impl StateMachineStore {
    /// Wrap `machine`, restoring it from the newest snapshot in `snapshots`.
    pub fn open(machine: Arc<dyn StateMachine>, snapshots: FileSnapshotStore) -> ClusterResult<Self> {
        let mut applied = AppliedState::default();

        if let Some((meta, data)) = snapshots.latest()? {
            machine.restore(&mut data.as_slice())?;
            tracing::info!(
                snapshot_id = %meta.snapshot_id,
                last_log_id = ?meta.last_log_id,
                "restored state from snapshot"
            );
            applied.last_applied = meta.last_log_id;
            applied.membership = meta.last_membership;
        }

        Ok(Self {
            machine,
            snapshots,
            applied: Mutex::new(applied),
        })
    }

    /// Last applied log id.
    pub fn last_applied(&self) -> Option<ClusterLogId> {
        self.applied.lock().last_applied
    }

    fn apply_entry(&self, entry: ClusterEntry) -> ApplyResponse {
        let log_id = entry.log_id;
        tracing::debug!(%log_id, "applying to state machine");

        let response = match entry.payload {
            EntryPayload::Blank => ApplyResponse::ok(),
            EntryPayload::Normal(payload) => {
                let result = self.machine.apply(&payload.data);
                if let Err(e) = &result {
                    tracing::warn!(%log_id, error = %e, "rejected log entry");
                }
                result.into()
            }
            EntryPayload::Membership(membership) => {
                self.applied.lock().membership = StoredMembership::new(Some(log_id), membership);
                ApplyResponse::ok()
            }
        };

        self.applied.lock().last_applied = Some(log_id);
        response
    }
}

impl RaftSnapshotBuilder<TypeConfig> for Arc<StateMachineStore> {
    async fn build_snapshot(&mut self) -> Result<ClusterSnapshot, ClusterStorageError> {
        let applied = self.applied.lock().clone();

        // Entries applied after this point may land in the image too; replaying
        // them on restore overwrites the same keys with the same values.
        let handle = self
            .machine
            .snapshot()
            .map_err(|e| StorageIOError::read_state_machine(&e))?;

        let sink = self
            .snapshots
            .create(applied.last_applied, applied.membership)
            .map_err(|e| StorageIOError::write_snapshot(None, &e))?;
        let meta = sink.meta().clone();

        let persisted = tokio::task::spawn_blocking(move || {
            let mut sink = sink;
            let mut handle = handle;
            let result = handle.persist(&mut sink);
            handle.release();
            result
        })
        .await
        .map_err(|e| StorageIOError::write_snapshot(Some(meta.signature()), &e))?;
        persisted.map_err(|e| StorageIOError::write_snapshot(Some(meta.signature()), &e))?;

        let (meta, data) = self
            .snapshots
            .read(&meta.snapshot_id)
            .map_err(|e| StorageIOError::read_snapshot(Some(meta.signature()), &e))?;

        Ok(ClusterSnapshot {
            meta,
            snapshot: Box::new(Cursor::new(data)),
        })
    }
}

impl RaftStateMachine<TypeConfig> for Arc<StateMachineStore> {
    type SnapshotBuilder = Self;

    async fn applied_state(
        &mut self,
    ) -> Result<(Option<ClusterLogId>, ClusterStoredMembership), ClusterStorageError> {
        let applied = self.applied.lock();
        Ok((applied.last_applied, applied.membership.clone()))
    }

    async fn apply<I>(&mut self, entries: I) -> Result<Vec<ApplyResponse>, ClusterStorageError>
    where
        I: IntoIterator<Item = ClusterEntry> + Send,
    {
        Ok(entries.into_iter().map(|e| self.apply_entry(e)).collect())
    }

    async fn get_snapshot_builder(&mut self) -> Self::SnapshotBuilder {
        Arc::clone(self)
    }

    async fn begin_receiving_snapshot(
        &mut self,
    ) -> Result<Box<<TypeConfig as RaftTypeConfig>::SnapshotData>, ClusterStorageError> {
        Ok(Box::new(Cursor::new(Vec::new())))
    }

    async fn install_snapshot(
        &mut self,
        meta: &ClusterSnapshotMeta,
        snapshot: Box<<TypeConfig as RaftTypeConfig>::SnapshotData>,
    ) -> Result<(), ClusterStorageError> {
        let data = snapshot.into_inner();
        tracing::info!(
            snapshot_id = %meta.snapshot_id,
            snapshot_size = data.len(),
            "installing snapshot"
        );

        self.machine
            .restore(&mut data.as_slice())
            .map_err(|e| StorageIOError::read_snapshot(Some(meta.signature()), &e))?;

        {
            let mut applied = self.applied.lock();
            applied.last_applied = meta.last_log_id;
            applied.membership = meta.last_membership.clone();
        }

        let mut sink = self
            .snapshots
            .create(meta.last_log_id, meta.last_membership.clone())
            .map_err(|e| StorageIOError::write_snapshot(Some(meta.signature()), &e))?;
        sink.write_all(&data)
            .and_then(|_| sink.close())
            .map_err(|e| StorageIOError::write_snapshot(Some(meta.signature()), &e))?;

        Ok(())
    }

    async fn get_current_snapshot(
        &mut self,
    ) -> Result<Option<ClusterSnapshot>, ClusterStorageError> {
        let latest = self
            .snapshots
            .latest()
            .map_err(|e| StorageIOError::read_snapshot(None, &e))?;

        Ok(latest.map(|(meta, data)| ClusterSnapshot {
            meta,
            snapshot: Box::new(Cursor::new(data)),
        }))
    }
}
