//! In-memory key-value store.
//!
//! The store is the only mutable state shared between request handlers and the
//! state machine. All access goes through its synchronized operations; the
//! underlying map is never handed out by reference.

use crate::error::{ClusterError, ClusterResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::io::Read;

/// A string-to-string map guarded by a reader/writer lock.
#[derive(Debug, Default)]
pub struct Store {
    data: RwLock<HashMap<String, String>>,
}

impl Store {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the value for `key`, or an empty string if it was never set.
    pub fn get(&self, key: &str) -> String {
        self.data.read().get(key).cloned().unwrap_or_default()
    }

    /// Overwrite the value for `key`.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.data.write().insert(key.into(), value.into());
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Encode the whole map as a JSON object.
    ///
    /// Holds the write lock for the duration of the encode so the image is
    /// never interleaved with a concurrent `set`.
    pub fn serialize(&self) -> ClusterResult<Vec<u8>> {
        let data = self.data.write();
        serde_json::to_vec(&*data).map_err(ClusterError::from)
    }

    /// Replace the whole map with the decoded contents of `reader`.
    ///
    /// Decoding happens before the lock is taken; on failure the store is
    /// left untouched.
    pub fn deserialize(&self, reader: impl Read) -> ClusterResult<()> {
        let decoded: HashMap<String, String> = serde_json::from_reader(reader)?;
        *self.data.write() = decoded;
        Ok(())
    }

    /// Copy of the current contents.
    pub fn entries(&self) -> HashMap<String, String> {
        self.data.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn missing_key_reads_empty() {
        let store = Store::new();
        assert_eq!(store.get("absent"), "");
        assert!(store.is_empty());
    }

    #[test]
    fn set_then_get() {
        let store = Store::new();
        store.set("a", "1");
        store.set("a", "2");
        assert_eq!(store.get("a"), "2");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn serialize_deserialize_hundred_keys() {
        let store = Store::new();
        for i in 0..100 {
            store.set(format!("key-{}", i), format!("value-{}", i));
        }

        let bytes = store.serialize().expect("serialize");
        let restored = Store::new();
        restored.deserialize(bytes.as_slice()).expect("deserialize");

        assert_eq!(restored.len(), 100);
        assert_eq!(restored.entries(), store.entries());
    }

    #[test]
    fn deserialize_replaces_rather_than_merges() {
        let store = Store::new();
        store.set("stale", "x");

        let source = Store::new();
        source.set("fresh", "y");
        let bytes = source.serialize().expect("serialize");

        store.deserialize(bytes.as_slice()).expect("deserialize");
        assert_eq!(store.get("stale"), "");
        assert_eq!(store.get("fresh"), "y");
    }

    #[test]
    fn failed_deserialize_leaves_store_unchanged() {
        let store = Store::new();
        store.set("a", "1");

        let err = store.deserialize(&b"{not json"[..]).unwrap_err();
        assert!(matches!(err, ClusterError::Serialization(_)));
        assert_eq!(store.get("a"), "1");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn concurrent_sets_on_distinct_keys_are_all_visible() {
        let store = Arc::new(Store::new());
        let handles: Vec<_> = (0..16)
            .map(|t| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        store.set(format!("t{}-k{}", t, i), format!("{}", i));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("writer thread");
        }

        assert_eq!(store.len(), 16 * 100);
        assert_eq!(store.get("t7-k42"), "42");
    }

    #[test]
    fn serialize_never_observes_torn_values() {
        let store = Arc::new(Store::new());
        let long_a = "a".repeat(4096);
        let long_b = "b".repeat(4096);
        store.set("k", long_a.clone());

        let writer = {
            let store = Arc::clone(&store);
            let (a, b) = (long_a.clone(), long_b.clone());
            std::thread::spawn(move || {
                for i in 0..500 {
                    store.set("k", if i % 2 == 0 { b.clone() } else { a.clone() });
                }
            })
        };

        for _ in 0..200 {
            let bytes = store.serialize().expect("serialize");
            let image: HashMap<String, String> =
                serde_json::from_slice(&bytes).expect("valid image");
            let v = &image["k"];
            assert!(v == &long_a || v == &long_b, "torn value observed");
        }

        writer.join().expect("writer thread");
    }
}
