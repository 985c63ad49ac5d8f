use super::{Error, KvBackend, Result, StoredValue};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::RwLock;

/// Process-local store. Contents are lost on restart.
#[derive(Default)]
pub struct MemoryBackend {
    entries: RwLock<BTreeMap<String, Value>>,
}

impl KvBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn get(&self, key: &str) -> Result<Option<StoredValue>> {
        let entries = self.entries.read().map_err(|_| Error::Poisoned)?;
        Ok(entries.get(key).cloned().map(StoredValue::Json))
    }

    fn set(&self, key: &str, value: &Value) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| Error::Poisoned)?;
        entries.insert(key.to_string(), value.clone());
        Ok(())
    }

    fn set_many(&self, items: &[(String, Value)]) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| Error::Poisoned)?;
        for (key, value) in items {
            entries.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    fn entries(&self) -> Result<Vec<(String, StoredValue)>> {
        let entries = self.entries.read().map_err(|_| Error::Poisoned)?;
        Ok(entries
            .iter()
            .map(|(key, value)| (key.clone(), StoredValue::Json(value.clone())))
            .collect())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let entries = self.entries.read().map_err(|_| Error::Poisoned)?;
        Ok(entries.keys().cloned().collect())
    }

    fn probe(&self) -> Result<()> {
        let _entries = self.entries.write().map_err(|_| Error::Poisoned)?;
        Ok(())
    }
}
