//! Stable metadata store: vote, committed and purged log ids.

use crate::types::{ClusterLogId, ClusterVote};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::PathBuf;

/// Metadata the engine must never lose across restarts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StableState {
    /// Last vote cast or granted.
    pub vote: Option<ClusterVote>,
    /// Last log id known to be committed.
    pub committed: Option<ClusterLogId>,
    /// Last log id removed by compaction.
    pub last_purged_log_id: Option<ClusterLogId>,
}

/// JSON file holding [`StableState`], replaced atomically on every save.
pub struct StableStore {
    path: PathBuf,
}

impl StableStore {
    /// Create a store backed by `path`.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Load the saved state, or defaults if nothing was saved yet.
    pub fn load(&self) -> io::Result<StableState> {
        if !self.path.exists() {
            return Ok(StableState::default());
        }

        let reader = BufReader::new(File::open(&self.path)?);
        serde_json::from_reader(reader).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Persist `state` with write-to-temp, fsync, rename.
    pub fn save(&self, state: &StableState) -> io::Result<()> {
        let temp_path = self.path.with_extension("json.tmp");

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&temp_path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, state)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        writer.flush()?;
        writer.get_ref().sync_all()?;

        fs::rename(&temp_path, &self.path)
    }
}
