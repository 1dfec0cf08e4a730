//! Raft log and stable storage.
//!
//! Implements OpenRaft's `RaftLogStorage` with two files under one directory:
//!
//! ```text
//! raft/
//! ├── raft-log.ndjson     # Log entries, one JSON document per line
//! └── raft-stable.json    # Vote, committed and last purged log ids
//! ```
//!
//! Entries are also kept in memory for reads. Appends go to the end of the log
//! file; truncate and purge rewrite it atomically.

mod log_file;
mod stable;

pub use stable::StableState;

use crate::types::{ClusterEntry, ClusterLogId, ClusterStorageError, ClusterVote, TypeConfig};
use log_file::LogFile;
use openraft::storage::{LogFlushed, RaftLogStorage};
use openraft::{LogState, RaftLogReader, StorageIOError};
use stable::StableStore;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::fs;
use std::ops::RangeBounds;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

const LOG_FILE: &str = "raft-log.ndjson";
const STABLE_FILE: &str = "raft-stable.json";

/// Persistent storage for Raft logs and vote state.
#[derive(Clone)]
pub struct LogStorage {
    inner: Arc<RwLock<LogStorageInner>>,
}

struct LogStorageInner {
    log: LogFile,
    stable: StableStore,
    state: StableState,
    entries: BTreeMap<u64, ClusterEntry>,
}

impl LogStorageInner {
    fn save_state(&self) -> std::io::Result<()> {
        self.stable.save(&self.state)
    }
}

impl LogStorage {
    /// Create or open log storage in the given directory.
    pub fn open(dir: PathBuf) -> Result<Self, std::io::Error> {
        fs::create_dir_all(&dir)?;

        let stable = StableStore::new(dir.join(STABLE_FILE));
        let state = stable.load()?;
        let (log, loaded) = LogFile::open(dir.join(LOG_FILE))?;

        // A crash between saving the purge point and rewriting the log can
        // leave purged entries behind.
        let purged_up_to = state.last_purged_log_id.map(|id| id.index);
        let entries: BTreeMap<u64, ClusterEntry> = loaded
            .into_iter()
            .filter(|e| purged_up_to.map_or(true, |p| e.log_id.index > p))
            .map(|e| (e.log_id.index, e))
            .collect();

        tracing::debug!(
            dir = %dir.display(),
            entries = entries.len(),
            "opened raft log storage"
        );

        Ok(Self {
            inner: Arc::new(RwLock::new(LogStorageInner {
                log,
                stable,
                state,
                entries,
            })),
        })
    }
}

impl RaftLogReader<TypeConfig> for LogStorage {
    async fn try_get_log_entries<RB: RangeBounds<u64> + Clone + Debug>(
        &mut self,
        range: RB,
    ) -> Result<Vec<ClusterEntry>, ClusterStorageError> {
        let inner = self.inner.read().await;
        Ok(inner.entries.range(range).map(|(_, e)| e.clone()).collect())
    }
}

impl RaftLogStorage<TypeConfig> for LogStorage {
    type LogReader = Self;

    async fn get_log_state(&mut self) -> Result<LogState<TypeConfig>, ClusterStorageError> {
        let inner = self.inner.read().await;

        let last_purged_log_id = inner.state.last_purged_log_id;
        let last_log_id = inner
            .entries
            .values()
            .next_back()
            .map(|e| e.log_id)
            .or(last_purged_log_id);

        Ok(LogState {
            last_purged_log_id,
            last_log_id,
        })
    }

    async fn save_committed(
        &mut self,
        committed: Option<ClusterLogId>,
    ) -> Result<(), ClusterStorageError> {
        let mut inner = self.inner.write().await;
        inner.state.committed = committed;
        inner
            .save_state()
            .map_err(|e| StorageIOError::write_logs(&e))?;
        Ok(())
    }

    async fn read_committed(&mut self) -> Result<Option<ClusterLogId>, ClusterStorageError> {
        Ok(self.inner.read().await.state.committed)
    }

    async fn save_vote(&mut self, vote: &ClusterVote) -> Result<(), ClusterStorageError> {
        let mut inner = self.inner.write().await;
        inner.state.vote = Some(*vote);
        inner
            .save_state()
            .map_err(|e| StorageIOError::write_vote(&e))?;
        Ok(())
    }

    async fn read_vote(&mut self) -> Result<Option<ClusterVote>, ClusterStorageError> {
        Ok(self.inner.read().await.state.vote)
    }

    async fn append<I>(
        &mut self,
        entries: I,
        callback: LogFlushed<TypeConfig>,
    ) -> Result<(), ClusterStorageError>
    where
        I: IntoIterator<Item = ClusterEntry>,
    {
        let mut inner = self.inner.write().await;

        let entries: Vec<ClusterEntry> = entries.into_iter().collect();
        inner
            .log
            .append(&entries)
            .map_err(|e| StorageIOError::write_logs(&e))?;

        for entry in entries {
            inner.entries.insert(entry.log_id.index, entry);
        }

        callback.log_io_completed(Ok(()));
        Ok(())
    }

    async fn truncate(&mut self, log_id: ClusterLogId) -> Result<(), ClusterStorageError> {
        tracing::debug!(%log_id, "truncating raft log");

        let mut inner = self.inner.write().await;
        inner.entries.split_off(&log_id.index);

        let LogStorageInner { log, entries, .. } = &mut *inner;
        log.rewrite(entries.values())
            .map_err(|e| StorageIOError::write_logs(&e))?;
        Ok(())
    }

    async fn purge(&mut self, log_id: ClusterLogId) -> Result<(), ClusterStorageError> {
        tracing::debug!(%log_id, "purging raft log");

        let mut inner = self.inner.write().await;
        inner.state.last_purged_log_id = Some(log_id);
        inner
            .save_state()
            .map_err(|e| StorageIOError::write_logs(&e))?;

        let kept = inner.entries.split_off(&(log_id.index + 1));
        inner.entries = kept;

        let LogStorageInner { log, entries, .. } = &mut *inner;
        log.rewrite(entries.values())
            .map_err(|e| StorageIOError::write_logs(&e))?;
        Ok(())
    }

    async fn get_log_reader(&mut self) -> Self::LogReader {
        self.clone()
    }
}
