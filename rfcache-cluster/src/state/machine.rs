//! State machine binding the cache store to the replicated log.

use crate::command::Command;
use crate::error::ClusterResult;
use crate::store::Store;
use std::io::Read;
use std::sync::Arc;

use super::snapshot::CacheSnapshot;
use super::{SnapshotHandle, StateMachine};

/// Applies committed [`Command`]s to a shared [`Store`].
#[derive(Debug, Clone)]
pub struct CacheStateMachine {
    store: Arc<Store>,
}

impl CacheStateMachine {
    /// Create a state machine over `store`.
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// The store this machine mutates.
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }
}

impl StateMachine for CacheStateMachine {
    fn apply(&self, entry: &[u8]) -> ClusterResult<()> {
        let cmd = Command::decode(entry)?;
        tracing::trace!(key = %cmd.key, "applying set");
        self.store.set(cmd.key, cmd.value);
        Ok(())
    }

    fn snapshot(&self) -> ClusterResult<Box<dyn SnapshotHandle>> {
        Ok(Box::new(CacheSnapshot::new(Arc::clone(&self.store))))
    }

    fn restore(&self, reader: &mut dyn Read) -> ClusterResult<()> {
        self.store.deserialize(reader)?;
        tracing::info!(entries = self.store.len(), "restored store from snapshot");
        Ok(())
    }
}
