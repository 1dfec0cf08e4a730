//! Snapshot handles and persistence glue.

use crate::error::ClusterResult;
use crate::store::Store;
use std::io::Write;
use std::sync::Arc;

use super::{SnapshotHandle, SnapshotSink};

/// Snapshot handle holding a reference to the live store.
///
/// Capturing the handle is just an `Arc` clone; the image is produced when the
/// engine asks for it to be persisted.
#[derive(Debug)]
pub struct CacheSnapshot {
    store: Arc<Store>,
}

impl CacheSnapshot {
    /// Capture a handle over `store`.
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    fn write_to(&self, sink: &mut dyn SnapshotSink) -> ClusterResult<()> {
        let bytes = self.store.serialize()?;
        sink.write_all(&bytes)?;
        sink.close()?;
        Ok(())
    }
}

impl SnapshotHandle for CacheSnapshot {
    fn persist(&self, sink: &mut dyn SnapshotSink) -> ClusterResult<()> {
        let result = self.write_to(sink);
        if let Err(e) = &result {
            tracing::warn!(snapshot_id = %sink.id(), error = %e, "snapshot persist failed, cancelling");
            if let Err(cancel_err) = sink.cancel() {
                tracing::warn!(snapshot_id = %sink.id(), error = %cancel_err, "snapshot cancel failed");
            }
        }
        result
    }
}

/// A sink that buffers the image in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    id: String,
    buf: Vec<u8>,
    closed: bool,
    cancelled: bool,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Whether `close` succeeded.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Whether `cancel` was called.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Take the buffered bytes.
    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

impl Write for MemorySink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buf.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl SnapshotSink for MemorySink {
    fn id(&self) -> &str {
        &self.id
    }

    fn cancel(&mut self) -> std::io::Result<()> {
        self.buf.clear();
        self.cancelled = true;
        Ok(())
    }

    fn close(&mut self) -> std::io::Result<()> {
        self.closed = true;
        Ok(())
    }
}
