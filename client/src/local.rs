//! String key/value store with the semantics of browser `localStorage`,
//! optionally persisted to a JSON file.

use crate::{Error, Result};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::warn;

#[derive(Debug, Default)]
pub struct LocalStore {
    path: Option<PathBuf>,
    entries: BTreeMap<String, String>,
    changed: BTreeSet<String>,
    notify: Arc<Notify>,
}

impl LocalStore {
    /// Store that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Opens (or starts) a store persisted at `path`.
    ///
    /// A missing file is an empty store. Non-string values in the file are
    /// kept as their JSON text.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => BTreeMap::new(),
            Ok(raw) => {
                let object: Map<String, Value> = serde_json::from_str(&raw)?;
                object
                    .into_iter()
                    .map(|(key, value)| (key, raw_text(&value)))
                    .collect()
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(err.into()),
        };
        Ok(Self {
            path: Some(path),
            entries,
            ..Self::default()
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get_item(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Writes a raw string and records the key as changed.
    pub fn set_item(&mut self, key: &str, value: impl Into<String>) -> Result<()> {
        self.entries.insert(key.to_string(), value.into());
        self.changed.insert(key.to_string());
        self.persist()?;
        self.notify.notify_one();
        Ok(())
    }

    pub fn remove_item(&mut self, key: &str) -> Result<()> {
        if self.entries.remove(key).is_some() {
            self.persist()?;
        }
        Ok(())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Value of `key` parsed as JSON, falling back to the raw string.
    pub fn read_value(&self, key: &str) -> Option<Value> {
        let raw = self.get_item(key)?;
        Some(serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string())))
    }

    /// Value of `key` decoded as `T`; `None` when absent or malformed.
    pub fn read_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get_item(key)?;
        match serde_json::from_str(raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(key, ?err, "ignoring malformed local value");
                None
            }
        }
    }

    /// Value of `key` decoded as `T`; `None` when absent, blank or `null`.
    ///
    /// A value that is present but does not decode is an error, so callers
    /// that rewrite a document never start over from an empty one.
    pub fn load_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.get_item(key).filter(|raw| !raw.trim().is_empty()) else {
            return Ok(None);
        };
        let malformed = |source| Error::MalformedDocument {
            key: key.to_string(),
            source,
        };
        let value: Value = serde_json::from_str(raw).map_err(malformed)?;
        if value.is_null() {
            return Ok(None);
        }
        serde_json::from_value(value).map(Some).map_err(malformed)
    }

    /// Stores `value` as JSON text.
    pub fn write_json<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.set_item(key, raw)
    }

    /// Applies a value fetched from the server without marking it changed.
    ///
    /// Strings are stored as-is, everything else as JSON text.
    pub fn apply_remote(&mut self, key: &str, value: &Value) -> Result<()> {
        self.entries.insert(key.to_string(), raw_text(value));
        self.persist()
    }

    /// Drains the keys written since the last call.
    pub fn take_changed(&mut self) -> Vec<String> {
        std::mem::take(&mut self.changed).into_iter().collect()
    }

    /// Signalled after every local write.
    pub fn change_notifier(&self) -> Arc<Notify> {
        self.notify.clone()
    }

    fn persist(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let object: Map<String, Value> = self
            .entries
            .iter()
            .map(|(key, raw)| (key.clone(), Value::String(raw.clone())))
            .collect();
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(&object)?)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

fn raw_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn values_read_back_as_json_or_string() {
        let mut store = LocalStore::in_memory();
        store.set_item("balance:alice", "525").unwrap();
        store.set_item("username", "alice").unwrap();
        store.write_json("demo_users", &json!([{ "id": 1 }])).unwrap();

        assert_eq!(store.read_value("balance:alice"), Some(json!(525)));
        assert_eq!(store.read_value("username"), Some(json!("alice")));
        assert_eq!(store.read_value("demo_users"), Some(json!([{ "id": 1 }])));
        assert_eq!(store.read_value("missing"), None);
        assert_eq!(store.read_as::<Vec<u64>>("username"), None);
    }

    #[test]
    fn load_as_rejects_undecodable_documents() {
        let mut store = LocalStore::in_memory();
        assert_eq!(store.load_as::<Vec<u64>>("demo_users").unwrap(), None);
        store.set_item("demo_users", "null").unwrap();
        assert_eq!(store.load_as::<Vec<u64>>("demo_users").unwrap(), None);
        store.set_item("demo_users", "[1, 2]").unwrap();
        assert_eq!(store.load_as::<Vec<u64>>("demo_users").unwrap(), Some(vec![1, 2]));

        store.set_item("demo_users", "[1, \"two\"]").unwrap();
        assert!(matches!(
            store.load_as::<Vec<u64>>("demo_users"),
            Err(Error::MalformedDocument { ref key, .. }) if key == "demo_users"
        ));
        store.set_item("demo_users", "{not json").unwrap();
        assert!(store.load_as::<Vec<u64>>("demo_users").is_err());
        assert_eq!(store.read_as::<Vec<u64>>("demo_users"), None);
    }

    #[test]
    fn changes_are_drained_once() {
        let mut store = LocalStore::in_memory();
        store.set_item("a", "1").unwrap();
        store.set_item("b", "2").unwrap();
        store.set_item("a", "3").unwrap();
        store.apply_remote("c", &json!({ "x": 1 })).unwrap();

        assert_eq!(store.take_changed(), vec!["a".to_string(), "b".to_string()]);
        assert!(store.take_changed().is_empty());
        assert_eq!(store.get_item("c"), Some(r#"{"x":1}"#));
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("local.json");

        let mut store = LocalStore::open(&path).unwrap();
        assert!(store.is_empty());
        store.set_item("sec_code:alice", "1234").unwrap();
        store.write_json("notifications", &json!(["hi"])).unwrap();
        store.remove_item("missing").unwrap();

        let store = LocalStore::open(&path).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.get_item("sec_code:alice"), Some("1234"));
        assert_eq!(store.read_value("notifications"), Some(json!(["hi"])));
        assert_eq!(store.path(), Some(path.as_path()));
    }

    #[test]
    fn non_string_file_values_are_kept_as_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local.json");
        std::fs::write(&path, r#"{"balance:bob": 10, "username": "bob"}"#).unwrap();

        let store = LocalStore::open(&path).unwrap();
        assert_eq!(store.get_item("balance:bob"), Some("10"));
        assert_eq!(store.get_item("username"), Some("bob"));
    }
}
