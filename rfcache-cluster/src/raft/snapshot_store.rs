//! On-disk snapshot store.
//!
//! ```text
//! snapshots/
//! ├── 12-1760000000000-1/
//! │   ├── meta.json
//! │   └── state.bin
//! └── 14-1760000005000-2.tmp/     # being written, invisible to readers
//! ```
//!
//! A snapshot is written into a `.tmp` directory and becomes visible only when
//! its sink is closed, which renames the directory into place.

use crate::state::SnapshotSink;
use crate::types::{ClusterLogId, ClusterSnapshotMeta, ClusterStoredMembership};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

const META_FILE: &str = "meta.json";
const STATE_FILE: &str = "state.bin";
const TMP_SUFFIX: &str = ".tmp";

/// Metadata stored beside each snapshot image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotRecord {
    /// Engine metadata for the snapshot.
    pub meta: ClusterSnapshotMeta,
    /// Creation time, milliseconds since the Unix epoch.
    pub created_at_ms: u64,
    /// Size of `state.bin` in bytes.
    pub size: u64,
}

impl SnapshotRecord {
    fn sort_key(&self) -> (u64, u64) {
        let index = self.meta.last_log_id.map(|id| id.index).unwrap_or(0);
        (index, self.created_at_ms)
    }
}

/// Directory of finalized snapshots, newest `retain` kept.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    inner: Arc<StoreInner>,
}

#[derive(Debug)]
struct StoreInner {
    dir: PathBuf,
    retain: usize,
    seq: AtomicU64,
}

impl FileSnapshotStore {
    /// Open the store, removing any snapshot left half-written by a crash.
    pub fn open(dir: PathBuf, retain: usize) -> io::Result<Self> {
        fs::create_dir_all(&dir)?;

        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if is_tmp(&path) {
                tracing::debug!(path = %path.display(), "removing unfinished snapshot");
                fs::remove_dir_all(&path)?;
            }
        }

        Ok(Self {
            inner: Arc::new(StoreInner {
                dir,
                retain: retain.max(1),
                seq: AtomicU64::new(0),
            }),
        })
    }

    /// Start writing a new snapshot covering the log up to `last_log_id`.
    pub fn create(
        &self,
        last_log_id: Option<ClusterLogId>,
        last_membership: ClusterStoredMembership,
    ) -> io::Result<FileSnapshotSink> {
        let created_at_ms = now_ms();
        let seq = self.inner.seq.fetch_add(1, Ordering::Relaxed) + 1;
        let index = last_log_id.map(|id| id.index).unwrap_or(0);
        let id = format!("{}-{}-{}", index, created_at_ms, seq);

        let final_dir = self.inner.dir.join(&id);
        let tmp_dir = self.inner.dir.join(format!("{}{}", id, TMP_SUFFIX));
        fs::create_dir_all(&tmp_dir)?;

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(tmp_dir.join(STATE_FILE))?;

        Ok(FileSnapshotSink {
            store: self.clone(),
            record: SnapshotRecord {
                meta: ClusterSnapshotMeta {
                    last_log_id,
                    last_membership,
                    snapshot_id: id.clone(),
                },
                created_at_ms,
                size: 0,
            },
            id,
            tmp_dir,
            final_dir,
            writer: Some(BufWriter::new(file)),
        })
    }

    /// Finalized snapshots, newest first.
    pub fn list(&self) -> io::Result<Vec<SnapshotRecord>> {
        let mut records = Vec::new();
        for entry in fs::read_dir(&self.inner.dir)? {
            let path = entry?.path();
            if !path.is_dir() || is_tmp(&path) {
                continue;
            }
            match read_record(&path) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable snapshot")
                }
            }
        }
        records.sort_by_key(|r| std::cmp::Reverse(r.sort_key()));
        Ok(records)
    }

    /// Read a snapshot's metadata and image by id.
    pub fn read(&self, id: &str) -> io::Result<(ClusterSnapshotMeta, Vec<u8>)> {
        let dir = self.inner.dir.join(id);
        let record = read_record(&dir)?;
        let mut data = Vec::with_capacity(record.size as usize);
        BufReader::new(File::open(dir.join(STATE_FILE))?).read_to_end(&mut data)?;
        Ok((record.meta, data))
    }

    /// The newest finalized snapshot, if any.
    pub fn latest(&self) -> io::Result<Option<(ClusterSnapshotMeta, Vec<u8>)>> {
        match self.list()?.first() {
            Some(record) => self.read(&record.meta.snapshot_id).map(Some),
            None => Ok(None),
        }
    }

    fn reap(&self) -> io::Result<()> {
        for stale in self.list()?.iter().skip(self.inner.retain) {
            let path = self.inner.dir.join(&stale.meta.snapshot_id);
            tracing::debug!(snapshot_id = %stale.meta.snapshot_id, "removing old snapshot");
            fs::remove_dir_all(path)?;
        }
        Ok(())
    }
}

/// Sink for one snapshot being written.
///
/// Dropping a sink that was neither closed nor cancelled cancels it.
#[derive(Debug)]
pub struct FileSnapshotSink {
    store: FileSnapshotStore,
    record: SnapshotRecord,
    id: String,
    tmp_dir: PathBuf,
    final_dir: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl FileSnapshotSink {
    /// Metadata the snapshot is being written under.
    pub fn meta(&self) -> &ClusterSnapshotMeta {
        &self.record.meta
    }

    fn finish(&mut self) -> io::Result<()> {
        let mut writer = self
            .writer
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "snapshot sink already finished"))?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        drop(writer);

        let meta_file = File::create(self.tmp_dir.join(META_FILE))?;
        let mut meta_writer = BufWriter::new(meta_file);
        serde_json::to_writer_pretty(&mut meta_writer, &self.record)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        meta_writer.flush()?;
        meta_writer.get_ref().sync_all()?;

        fs::rename(&self.tmp_dir, &self.final_dir)?;
        tracing::info!(
            snapshot_id = %self.id,
            size = self.record.size,
            "snapshot finalized"
        );

        // The new snapshot is durable at this point; old ones are retried on
        // the next close.
        if let Err(e) = self.store.reap() {
            tracing::warn!(snapshot_id = %self.id, error = %e, "failed to remove old snapshots");
        }
        Ok(())
    }
}

impl Write for FileSnapshotSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "snapshot sink already finished"))?;
        let n = writer.write(buf)?;
        self.record.size += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.writer.as_mut() {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }
}

impl SnapshotSink for FileSnapshotSink {
    fn id(&self) -> &str {
        &self.id
    }

    fn cancel(&mut self) -> io::Result<()> {
        self.writer = None;
        if self.tmp_dir.exists() {
            fs::remove_dir_all(&self.tmp_dir)?;
        }
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        let result = self.finish();
        if result.is_err() && self.tmp_dir.exists() {
            let _ = fs::remove_dir_all(&self.tmp_dir);
        }
        result
    }
}

impl Drop for FileSnapshotSink {
    fn drop(&mut self) {
        if self.writer.is_some() {
            let _ = self.cancel();
        }
    }
}

fn is_tmp(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(TMP_SUFFIX))
}

fn read_record(dir: &Path) -> io::Result<SnapshotRecord> {
    let reader = BufReader::new(File::open(dir.join(META_FILE))?);
    serde_json::from_reader(reader).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
