//! Persistent key/value state scoped to a user and a string prefix.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

/// Flat string store. Last write wins; there is no locking across processes.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    /// `None` removes the key.
    fn set(&self, key: &str, value: Option<&str>) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let values = values
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            values: Mutex::new(values),
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: Option<&str>) -> Result<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store poisoned"))?;
        match value {
            Some(v) => values.insert(key.to_string(), v.to_string()),
            None => values.remove(key),
        };
        Ok(())
    }
}

/// Whole-map JSON document on disk, rewritten atomically on every change.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl JsonFileStore {
    /// Opens the store; a missing file starts empty, a corrupt one is logged and ignored.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(map) => map,
                Err(err) => {
                    warn!(path = %path.display(), "ignoring unreadable state file: {err}");
                    BTreeMap::new()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "state file missing; starting empty");
                BTreeMap::new()
            }
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", path.display()));
            }
        };
        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, values: &BTreeMap<String, String>) -> Result<()> {
        let body = serde_json::to_vec_pretty(values)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body).with_context(|| format!("failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: Option<&str>) -> Result<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| anyhow::anyhow!("state file lock poisoned"))?;
        match value {
            Some(v) => values.insert(key.to_string(), v.to_string()),
            None => values.remove(key),
        };
        self.flush(&values)
    }
}

/// A [`KeyValueStore`] view namespaced by `<user>/<prefix>/`.
#[derive(Clone)]
pub struct UserStorage {
    store: Arc<dyn KeyValueStore>,
    namespace: String,
}

impl UserStorage {
    pub fn new(store: Arc<dyn KeyValueStore>, user: &str, prefix: &str) -> Self {
        Self {
            store,
            namespace: format!("{user}/{prefix}"),
        }
    }

    fn scoped(&self, key: &str) -> String {
        format!("{}/{}", self.namespace, key)
    }

    pub fn get_item(&self, key: &str) -> Option<String> {
        self.store.get(&self.scoped(key))
    }

    /// Writes never fail the caller; errors go to the log.
    pub fn set_item(&self, key: &str, value: Option<&str>) {
        let scoped = self.scoped(key);
        if let Err(err) = self.store.set(&scoped, value) {
            warn!(key = %scoped, "failed to persist value: {err:#}");
        }
    }

    /// Serializes `value` as JSON; `None` is written as JSON `null`.
    pub fn set_json<T: Serialize>(&self, key: &str, value: Option<&T>) {
        match serde_json::to_string(&value) {
            Ok(raw) => self.set_item(key, Some(&raw)),
            Err(err) => warn!(key, "failed to serialize value: {err}"),
        }
    }

    /// Reads a JSON value. Absent keys and JSON `null` both yield `Ok(None)`.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get_item(key) {
            None => Ok(None),
            Some(raw) => serde_json::from_str::<Option<T>>(&raw)
                .with_context(|| format!("stored value for {key} is malformed")),
        }
    }
}

impl std::fmt::Debug for UserStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserStorage")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scopes_keys_by_user_and_prefix() {
        let store = Arc::new(MemoryStore::new());
        let photos = UserStorage::new(store.clone(), "alice", "PHOTOS");
        let notes = UserStorage::new(store.clone(), "alice", "NOTES");
        photos.set_item("ALBUM", Some("x"));
        assert_eq!(photos.get_item("ALBUM").as_deref(), Some("x"));
        assert_eq!(notes.get_item("ALBUM"), None);
        assert_eq!(store.get("alice/PHOTOS/ALBUM").as_deref(), Some("x"));
    }

    #[test]
    fn json_null_reads_back_as_none() {
        let storage = UserStorage::new(Arc::new(MemoryStore::new()), "u", "P");
        storage.set_json::<String>("K", None);
        assert_eq!(storage.get_item("K").as_deref(), Some("null"));
        assert_eq!(storage.get_json::<String>("K").unwrap(), None);
    }

    #[test]
    fn malformed_json_is_an_error() {
        let store = MemoryStore::with_values([("u/P/K", "{not json")]);
        let storage = UserStorage::new(Arc::new(store), "u", "P");
        assert!(storage.get_json::<Vec<String>>("K").is_err());
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        {
            let store = JsonFileStore::open(&path).unwrap();
            store.set("a", Some("1")).unwrap();
            store.set("b", Some("2")).unwrap();
            store.set("b", None).unwrap();
        }
        let store = JsonFileStore::open(&path).unwrap();
        assert_eq!(store.get("a").as_deref(), Some("1"));
        assert_eq!(store.get("b"), None);
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "garbage").unwrap();
        let store = JsonFileStore::open(&path).unwrap();
        assert_eq!(store.get("anything"), None);
    }
}
