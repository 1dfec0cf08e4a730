//! Cache commands - the only mutations that go through Raft consensus.
//!
//! A [`Command`] is encoded by the gateway and carried through the log as an
//! opaque [`LogPayload`]. The log never looks inside; the state machine is the
//! only place that decodes it.

use crate::error::{ClusterError, ClusterResult};
use serde::{Deserialize, Serialize};

/// Set `key` to `value` on every replica.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    /// Key to write.
    pub key: String,
    /// Value to store.
    pub value: String,
}

impl Command {
    /// Build a set command.
    pub fn set(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Encode for proposal to the log.
    pub fn encode(&self) -> ClusterResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(ClusterError::from)
    }

    /// Decode a committed log entry.
    pub fn decode(data: &[u8]) -> ClusterResult<Self> {
        serde_json::from_slice(data).map_err(ClusterError::from)
    }
}

/// Opaque bytes stored in a Raft log entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogPayload {
    /// Encoded command.
    pub data: Vec<u8>,
}

impl LogPayload {
    /// Wrap encoded command bytes.
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl From<Vec<u8>> for LogPayload {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_rejects_malformed_payload() {
        assert!(matches!(
            Command::decode(b"\x00\x01garbage"),
            Err(ClusterError::Serialization(_))
        ));
        assert!(Command::decode(br#"{"key":"a"}"#).is_err());
    }

    #[test]
    fn encoded_command_is_plain_json() {
        let bytes = Command::set("a", "1").encode().expect("encode");
        let value: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(value, serde_json::json!({"key": "a", "value": "1"}));
    }
}
