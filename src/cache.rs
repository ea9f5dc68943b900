//! Persistent caches backing pipeline idempotency.
//!
//! Each stage talks to a narrow [`CacheStore`] capability so the backing store can be swapped
//! without touching map or reduce logic. Keys are derived deterministically from the document id:
//!
//! - `{doc_id}_chunks` holds the full ordered chunk list (overwritten on every chunk run).
//! - `{doc_id}_chunk_{index}` holds one [`crate::document::ChunkSummary`].
//! - `{doc_id}_final` holds one [`crate::document::FinalSummary`].
//!
//! A key maps to at most one entry; `put` always overwrites. Concurrent writers from separate
//! processes are not coordinated and resolve as last-writer-wins.

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;

/// Errors raised while reading or writing cache entries.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Filesystem access failed.
    #[error("cache I/O failed for '{key}': {source}")]
    Io {
        /// Cache key being accessed.
        key: String,
        /// Underlying filesystem error.
        #[source]
        source: std::io::Error,
    },
    /// Entry contents could not be encoded or decoded.
    #[error("cache entry '{key}' is malformed: {source}")]
    Serialization {
        /// Cache key being accessed.
        key: String,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
    /// Key cannot be mapped onto the backing store.
    #[error("invalid cache key '{0}'")]
    InvalidKey(String),
}

/// Minimal key-value capability used by the pipeline stages.
pub trait CacheStore: Send + Sync {
    /// Fetch the entry stored under `key`, or `None` when absent.
    fn get(&self, key: &str) -> Result<Option<Value>, CacheError>;

    /// Store `value` under `key`, replacing any prior entry.
    fn put(&self, key: &str, value: &Value) -> Result<(), CacheError>;
}

/// Key for the chunk list of a document.
pub fn chunks_key(doc_id: &str) -> String {
    format!("{doc_id}_chunks")
}

/// Key for the summary of one chunk.
pub fn chunk_summary_key(doc_id: &str, chunk_index: usize) -> String {
    format!("{doc_id}_chunk_{chunk_index}")
}

/// Key for the final summary of a document.
pub fn final_summary_key(doc_id: &str) -> String {
    format!("{doc_id}_final")
}

/// Fetch and decode a typed entry.
pub fn load<T: DeserializeOwned>(
    store: &dyn CacheStore,
    key: &str,
) -> Result<Option<T>, CacheError> {
    match store.get(key)? {
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|source| CacheError::Serialization {
                key: key.to_string(),
                source,
            }),
        None => Ok(None),
    }
}

/// Encode and store a typed entry.
pub fn save<T: Serialize>(
    store: &dyn CacheStore,
    key: &str,
    value: &T,
) -> Result<(), CacheError> {
    let value = serde_json::to_value(value).map_err(|source| CacheError::Serialization {
        key: key.to_string(),
        source,
    })?;
    store.put(key, &value)
}

/// One pretty-printed JSON file per key under a root directory.
#[derive(Debug, Clone)]
pub struct FsCacheStore {
    root: PathBuf,
}

impl FsCacheStore {
    /// Create a store rooted at `root`; the directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, CacheError> {
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            return Err(CacheError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(format!("{key}.json")))
    }
}

impl CacheStore for FsCacheStore {
    fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let path = self.path_for(key)?;
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(CacheError::Io {
                    key: key.to_string(),
                    source,
                });
            }
        };
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|source| CacheError::Serialization {
                key: key.to_string(),
                source,
            })
    }

    fn put(&self, key: &str, value: &Value) -> Result<(), CacheError> {
        let path = self.path_for(key)?;
        let io_error = |source| CacheError::Io {
            key: key.to_string(),
            source,
        };
        fs::create_dir_all(&self.root).map_err(io_error)?;
        let body = serde_json::to_string_pretty(value).map_err(|source| {
            CacheError::Serialization {
                key: key.to_string(),
                source,
            }
        })?;
        fs::write(&path, body).map_err(io_error)?;
        tracing::debug!(path = %path.display(), "Wrote cache entry");
        Ok(())
    }
}

/// In-process store for tests and short-lived runs.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryCacheStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Value>> {
        // A poisoned map is still structurally valid.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CacheStore for MemoryCacheStore {
    fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        Ok(self.lock().get(key).cloned())
    }

    fn put(&self, key: &str, value: &Value) -> Result<(), CacheError> {
        self.lock().insert(key.to_string(), value.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::FinalSummary;
    use serde_json::json;

    #[test]
    fn keys_follow_naming_scheme() {
        assert_eq!(chunks_key("doc_abc"), "doc_abc_chunks");
        assert_eq!(chunk_summary_key("doc_abc", 3), "doc_abc_chunk_3");
        assert_eq!(final_summary_key("doc_abc"), "doc_abc_final");
    }

    #[test]
    fn fs_store_misses_then_hits() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsCacheStore::new(dir.path().join("summaries"));
        assert!(store.get("doc_x_final").expect("get").is_none());

        store
            .put("doc_x_final", &json!({"doc_id": "doc_x", "summary": "hi"}))
            .expect("put");
        let value = store.get("doc_x_final").expect("get").expect("entry");
        assert_eq!(value["summary"], "hi");
        assert!(dir.path().join("summaries/doc_x_final.json").exists());
    }

    #[test]
    fn fs_store_overwrites_existing_entry() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsCacheStore::new(dir.path());
        save(&store, "k", &FinalSummary { doc_id: "d".into(), summary: "old".into() })
            .expect("save");
        save(&store, "k", &FinalSummary { doc_id: "d".into(), summary: "new".into() })
            .expect("save");
        let loaded: FinalSummary = load(&store, "k").expect("load").expect("entry");
        assert_eq!(loaded.summary, "new");
    }

    #[test]
    fn fs_store_reports_malformed_entries() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("broken.json"), "{not json").expect("write");
        let store = FsCacheStore::new(dir.path());
        let error = store.get("broken").expect_err("malformed entry");
        assert!(matches!(error, CacheError::Serialization { .. }));
    }

    #[test]
    fn fs_store_rejects_path_like_keys() {
        let store = FsCacheStore::new("unused");
        assert!(matches!(
            store.get("../escape"),
            Err(CacheError::InvalidKey(_))
        ));
    }

    #[test]
    fn typed_load_rejects_wrong_shape() {
        let store = MemoryCacheStore::new();
        store.put("k", &json!({"unexpected": true})).expect("put");
        let error = load::<FinalSummary>(&store, "k").expect_err("shape mismatch");
        assert!(matches!(error, CacheError::Serialization { .. }));
    }
}
