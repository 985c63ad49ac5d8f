use super::{Error, KvBackend};
use casino_types::Allowlist;
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error as ThisError;
use tracing::{debug, error};

#[derive(Debug, ThisError)]
pub enum StorageError {
    #[error("Key not allowed")]
    KeyNotAllowed,
    #[error("Missing value")]
    MissingValue,
    #[error("items must be an object map")]
    InvalidItems,
    #[error("Unknown action")]
    UnknownAction,
    #[error("Invalid JSON")]
    InvalidJson,
    #[error("Failed to read")]
    Read(#[source] Error),
    #[error("Failed to write")]
    Write(#[source] Error),
}

/// Storage operations with the key allowlist applied in front of a backend.
#[derive(Clone)]
pub struct StorageService {
    backend: Arc<dyn KvBackend>,
    allowlist: Arc<Allowlist>,
}

impl StorageService {
    pub fn new(backend: Arc<dyn KvBackend>, allowlist: Allowlist) -> Self {
        Self {
            backend,
            allowlist: Arc::new(allowlist),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn allowlist(&self) -> &Allowlist {
        &self.allowlist
    }

    fn check_key<'a>(&self, key: Option<&'a str>) -> Result<&'a str, StorageError> {
        match key {
            Some(key) if self.allowlist.is_allowed(key) => Ok(key),
            _ => Err(StorageError::KeyNotAllowed),
        }
    }

    /// Stored value of `key`, or `null` when absent.
    pub fn get(&self, key: Option<&str>) -> Result<Value, StorageError> {
        let key = self.check_key(key)?;
        let stored = self.backend.get(key).map_err(|err| {
            error!(?err, key, "failed to read key");
            StorageError::Read(err)
        })?;
        Ok(stored.map(|value| value.into_get_value()).unwrap_or(Value::Null))
    }

    pub fn set(&self, key: Option<&str>, value: Option<&Value>) -> Result<(), StorageError> {
        let key = self.check_key(key)?;
        let value = match value {
            Some(value) if !value.is_null() => value,
            _ => return Err(StorageError::MissingValue),
        };
        self.backend.set(key, value).map_err(|err| {
            error!(?err, key, "failed to write key");
            StorageError::Write(err)
        })?;
        debug!(key, backend = self.backend.name(), "stored key");
        Ok(())
    }

    /// Every stored allowed key with its value.
    pub fn get_all(&self) -> Result<Map<String, Value>, StorageError> {
        let entries = self.backend.entries().map_err(|err| {
            error!(?err, "failed to read entries");
            StorageError::Read(err)
        })?;
        Ok(entries
            .into_iter()
            .filter(|(key, _)| self.allowlist.is_allowed(key))
            .map(|(key, value)| (key, value.into_listed_value()))
            .collect())
    }

    /// Writes every allowed key of `items`, skipping the rest.
    ///
    /// Returns the number of keys written.
    pub fn set_batch(&self, items: Option<&Value>) -> Result<usize, StorageError> {
        let Some(Value::Object(items)) = items else {
            return Err(StorageError::InvalidItems);
        };
        let accepted: Vec<(String, Value)> = items
            .iter()
            .filter(|(key, _)| {
                let allowed = self.allowlist.is_allowed(key);
                if !allowed {
                    debug!(key = key.as_str(), "skipping disallowed key in batch");
                }
                allowed
            })
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        if accepted.is_empty() {
            return Ok(0);
        }
        self.backend.set_many(&accepted).map_err(|err| {
            error!(?err, count = accepted.len(), "failed to write batch");
            StorageError::Write(err)
        })?;
        Ok(accepted.len())
    }

    /// Stored allowed keys, sorted.
    pub fn list(&self) -> Result<Vec<String>, StorageError> {
        let mut keys: Vec<String> = self
            .backend
            .keys()
            .map_err(|err| {
                error!(?err, "failed to list keys");
                StorageError::Read(err)
            })?
            .into_iter()
            .filter(|key| self.allowlist.is_allowed(key))
            .collect();
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    pub fn probe(&self) -> Result<(), StorageError> {
        self.backend.probe().map_err(StorageError::Write)
    }
}
