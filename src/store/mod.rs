//! Device-local key-value store.
//!
//! The analogue of a browser's localStorage: one JSON document on disk,
//! loaded at open, written back whole on every mutation. Holds the identity
//! record, the stamp pool, draft polls and their tallies, and per-poll
//! credentials under fixed, namespaced keys.
//!
//! Known race, by decision and documented: the store assumes one foreground
//! process per device. Two concurrent processes doing read-modify-write on
//! the stamp pool or tallies can lose updates; there is no file lock.

pub mod keys;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{AgoraError, AgoraResult};

/// Namespaced JSON key-value store, cheap to clone.
#[derive(Clone)]
pub struct KvStore {
    inner: Arc<Mutex<Inner>>,
}

struct Inner {
    /// None means in-memory only (tests).
    path: Option<PathBuf>,
    map: BTreeMap<String, serde_json::Value>,
}

impl KvStore {
    /// Open (or create) the store file at `path`.
    pub fn open(path: &Path) -> AgoraResult<Self> {
        let map = if path.exists() {
            let raw = fs::read_to_string(path)
                .map_err(|e| AgoraError::Store(format!("read {}: {e}", path.display())))?;
            serde_json::from_str(&raw)
                .map_err(|e| AgoraError::Store(format!("parse {}: {e}", path.display())))?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            inner: Arc::new(Mutex::new(Inner {
                path: Some(path.to_path_buf()),
                map,
            })),
        })
    }

    /// In-memory store, nothing touches disk.
    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                path: None,
                map: BTreeMap::new(),
            })),
        }
    }

    /// Read and deserialize the value under `key`, if present.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> AgoraResult<Option<T>> {
        let inner = self.inner.lock().expect("store lock poisoned");
        match inner.map.get(key) {
            None => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| AgoraError::Store(format!("decode {key}: {e}"))),
        }
    }

    /// Serialize and persist `value` under `key`.
    pub fn put<T: Serialize>(&self, key: &str, value: &T) -> AgoraResult<()> {
        let json = serde_json::to_value(value)
            .map_err(|e| AgoraError::Store(format!("encode {key}: {e}")))?;
        let mut inner = self.inner.lock().expect("store lock poisoned");
        inner.map.insert(key.to_string(), json);
        persist(&inner)
    }

    /// Remove the value under `key`, if any.
    pub fn remove(&self, key: &str) -> AgoraResult<()> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        if inner.map.remove(key).is_some() {
            persist(&inner)?;
        }
        Ok(())
    }

    /// True if the store holds a value under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.inner
            .lock()
            .expect("store lock poisoned")
            .map
            .contains_key(key)
    }
}

/// Write the whole document back to disk via a temp file + rename, so a
/// crash mid-write never leaves a truncated store behind.
fn persist(inner: &Inner) -> AgoraResult<()> {
    let Some(path) = &inner.path else {
        return Ok(());
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| AgoraError::Store(format!("mkdir {}: {e}", parent.display())))?;
    }
    let raw = serde_json::to_string_pretty(&inner.map)
        .map_err(|e| AgoraError::Store(format!("serialize store: {e}")))?;
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, raw).map_err(|e| AgoraError::Store(format!("write {}: {e}", tmp.display())))?;
    fs::rename(&tmp, path)
        .map_err(|e| AgoraError::Store(format!("rename to {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_remove_roundtrip() {
        let store = KvStore::in_memory();
        store.put(keys::STAMP_POOL, &vec!["s1", "s2"]).unwrap();
        let pool: Option<Vec<String>> = store.get(keys::STAMP_POOL).unwrap();
        assert_eq!(pool.unwrap(), vec!["s1", "s2"]);

        store.remove(keys::STAMP_POOL).unwrap();
        let pool: Option<Vec<String>> = store.get(keys::STAMP_POOL).unwrap();
        assert!(pool.is_none());
    }

    #[test]
    fn missing_key_is_none_not_error() {
        let store = KvStore::in_memory();
        let value: Option<String> = store.get("absent").unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agora.json");

        let store = KvStore::open(&path).unwrap();
        store.put("alpha", &42u32).unwrap();
        drop(store);

        let store = KvStore::open(&path).unwrap();
        let value: Option<u32> = store.get("alpha").unwrap();
        assert_eq!(value, Some(42));
    }

    #[test]
    fn corrupt_file_is_a_store_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agora.json");
        fs::write(&path, "{not json").unwrap();
        assert!(KvStore::open(&path).is_err());
    }
}
