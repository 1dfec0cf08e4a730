//! Replicated state machine.
//!
//! The consensus engine drives the cache through the narrow [`StateMachine`]
//! interface: committed entries go to `apply`, compaction asks for a
//! `snapshot`, and a node catching up from a peer's image calls `restore`.
//!
//! Concurrency contract expected from the engine:
//! - `apply` calls are serialized in committed-log order.
//! - `apply` may overlap a [`SnapshotHandle::persist`] in progress.
//! - `restore` never overlaps `apply` or `snapshot`.

mod machine;
mod snapshot;

pub use machine::CacheStateMachine;
pub use snapshot::{CacheSnapshot, MemorySink};

use crate::error::ClusterResult;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// Callbacks the consensus engine invokes on the local replica.
pub trait StateMachine: Send + Sync {
    /// Apply one committed log entry.
    ///
    /// A malformed entry yields an error and leaves state unchanged; it does
    /// not poison the log.
    fn apply(&self, entry: &[u8]) -> ClusterResult<()>;

    /// Capture a handle that can later write a point-in-time image.
    fn snapshot(&self) -> ClusterResult<Box<dyn SnapshotHandle>>;

    /// Discard all state and load the image read from `reader`.
    fn restore(&self, reader: &mut dyn Read) -> ClusterResult<()>;
}

/// A captured snapshot, ready to be written out.
pub trait SnapshotHandle: Send + Sync {
    /// Write the image to `sink` and close it, or cancel it on any failure.
    fn persist(&self, sink: &mut dyn SnapshotSink) -> ClusterResult<()>;

    /// Called once the engine is done with the handle.
    fn release(&mut self) {}
}

/// Destination for snapshot bytes, provided by the snapshot store.
pub trait SnapshotSink: Write + Send {
    /// Identifier of the snapshot being written.
    fn id(&self) -> &str;

    /// Abandon the snapshot. Nothing written so far becomes visible.
    fn cancel(&mut self) -> std::io::Result<()>;

    /// Finalize the snapshot.
    fn close(&mut self) -> std::io::Result<()>;
}

/// Result of applying a log entry, returned to the proposer.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ApplyResponse {
    /// Whether the entry was applied.
    pub success: bool,
    /// Error message if not.
    pub error: Option<String>,
}

impl ApplyResponse {
    /// Create a success response.
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    /// Create an error response.
    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(msg.into()),
        }
    }
}

impl From<ClusterResult<()>> for ApplyResponse {
    fn from(result: ClusterResult<()>) -> Self {
        match result {
            Ok(()) => Self::ok(),
            Err(e) => Self::err(e.to_string()),
        }
    }
}
