//! Key/value JSON storage backends.
//!
//! Every backend stores whole JSON documents by string key with last-write-wins
//! semantics. Allowlist rules live in [`StorageService`], not in the backends.

use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

mod document;
mod file;
mod memory;
mod service;
mod sqlite;

pub use document::DocumentBackend;
pub use file::FileBackend;
pub use memory::MemoryBackend;
pub use service::{StorageError, StorageService};
pub use sqlite::SqliteBackend;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("store lock poisoned")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, Error>;

/// A stored document.
///
/// `Raw` holds file contents that are not valid JSON; they are returned to
/// callers rather than dropped.
#[derive(Clone, Debug, PartialEq)]
pub enum StoredValue {
    Json(Value),
    Raw(String),
}

impl StoredValue {
    pub fn from_raw(raw: String) -> Self {
        match serde_json::from_str(&raw) {
            Ok(value) => Self::Json(value),
            Err(_) => Self::Raw(raw),
        }
    }

    /// Value as returned by `get`: raw contents are wrapped as `{"raw": ...}`.
    pub fn into_get_value(self) -> Value {
        match self {
            Self::Json(value) => value,
            Self::Raw(raw) => serde_json::json!({ "raw": raw }),
        }
    }

    /// Value as returned by `get_all`: raw contents are returned as a string.
    pub fn into_listed_value(self) -> Value {
        match self {
            Self::Json(value) => value,
            Self::Raw(raw) => Value::String(raw),
        }
    }
}

pub trait KvBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn get(&self, key: &str) -> Result<Option<StoredValue>>;

    fn set(&self, key: &str, value: &Value) -> Result<()>;

    /// Writes several keys. Document-shaped backends override this to write once.
    fn set_many(&self, items: &[(String, Value)]) -> Result<()> {
        for (key, value) in items {
            self.set(key, value)?;
        }
        Ok(())
    }

    fn entries(&self) -> Result<Vec<(String, StoredValue)>>;

    fn keys(&self) -> Result<Vec<String>>;

    /// Checks that the backend can still be written.
    fn probe(&self) -> Result<()>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// One file per key.
    #[default]
    File,
    /// One JSON object in a single file.
    Document,
    /// Process memory only.
    Memory,
    /// SQLite table.
    Sqlite,
}

impl std::str::FromStr for BackendKind {
    type Err = &'static str;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "file" => Ok(Self::File),
            "document" => Ok(Self::Document),
            "memory" => Ok(Self::Memory),
            "sqlite" => Ok(Self::Sqlite),
            _ => Err("valid values: file, document, memory, sqlite"),
        }
    }
}

/// Opens the backend selected by `kind`.
///
/// File and document backends live under `data_dir/keys`; the SQLite backend
/// uses `sqlite_path` or `data_dir/kv.sqlite`.
pub fn open_backend(
    kind: BackendKind,
    data_dir: &Path,
    sqlite_path: Option<&Path>,
) -> Result<Arc<dyn KvBackend>> {
    let keys_dir = data_dir.join("keys");
    Ok(match kind {
        BackendKind::File => Arc::new(FileBackend::open(&keys_dir)?),
        BackendKind::Document => Arc::new(DocumentBackend::open(&keys_dir.join("storage.json"))?),
        BackendKind::Memory => Arc::new(MemoryBackend::default()),
        BackendKind::Sqlite => {
            let path = sqlite_path
                .map(Path::to_path_buf)
                .unwrap_or_else(|| data_dir.join("kv.sqlite"));
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            Arc::new(SqliteBackend::open(&path)?)
        }
    })
}
