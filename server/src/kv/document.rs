use super::{Error, KvBackend, Result, StoredValue};
use serde_json::{Map, Value};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

/// Every key in one pretty-printed JSON object on disk.
///
/// The document is re-read on every call so edits made by other processes are
/// picked up. A missing or corrupt document reads as empty.
pub struct DocumentBackend {
    path: PathBuf,
    lock: Mutex<()>,
}

impl DocumentBackend {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(Self {
            path: path.to_path_buf(),
            lock: Mutex::new(()),
        })
    }

    fn read_document(&self) -> Map<String, Value> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) => {
                if err.kind() != ErrorKind::NotFound {
                    warn!(?err, path = %self.path.display(), "failed to read document");
                }
                return Map::new();
            }
        };
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(map)) => map,
            Ok(_) | Err(_) => {
                warn!(path = %self.path.display(), "document is not a JSON object; treating as empty");
                Map::new()
            }
        }
    }

    fn write_document(&self, document: &Map<String, Value>) -> Result<()> {
        let mut tmp = self.path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, serde_json::to_vec_pretty(document)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KvBackend for DocumentBackend {
    fn name(&self) -> &'static str {
        "document"
    }

    fn get(&self, key: &str) -> Result<Option<StoredValue>> {
        let _guard = self.lock.lock().map_err(|_| Error::Poisoned)?;
        Ok(self.read_document().remove(key).map(StoredValue::Json))
    }

    fn set(&self, key: &str, value: &Value) -> Result<()> {
        let _guard = self.lock.lock().map_err(|_| Error::Poisoned)?;
        let mut document = self.read_document();
        document.insert(key.to_string(), value.clone());
        self.write_document(&document)
    }

    fn set_many(&self, items: &[(String, Value)]) -> Result<()> {
        let _guard = self.lock.lock().map_err(|_| Error::Poisoned)?;
        let mut document = self.read_document();
        for (key, value) in items {
            document.insert(key.clone(), value.clone());
        }
        self.write_document(&document)
    }

    fn entries(&self) -> Result<Vec<(String, StoredValue)>> {
        let _guard = self.lock.lock().map_err(|_| Error::Poisoned)?;
        Ok(self
            .read_document()
            .into_iter()
            .map(|(key, value)| (key, StoredValue::Json(value)))
            .collect())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let _guard = self.lock.lock().map_err(|_| Error::Poisoned)?;
        Ok(self.read_document().into_iter().map(|(key, _)| key).collect())
    }

    fn probe(&self) -> Result<()> {
        let _guard = self.lock.lock().map_err(|_| Error::Poisoned)?;
        let mut path = self.path.as_os_str().to_owned();
        path.push(".probe");
        let path = PathBuf::from(path);
        fs::write(&path, b"ok")?;
        fs::remove_file(&path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn falsy_values_are_returned_as_stored() {
        let dir = tempfile::tempdir().unwrap();
        let backend = DocumentBackend::open(&dir.path().join("storage.json")).unwrap();
        backend.set("balance:zed", &json!(0)).unwrap();
        backend.set("sec_code:zed", &json!("")).unwrap();
        assert_eq!(
            backend.get("balance:zed").unwrap(),
            Some(StoredValue::Json(json!(0)))
        );
        assert_eq!(
            backend.get("sec_code:zed").unwrap(),
            Some(StoredValue::Json(json!("")))
        );
    }

    #[test]
    fn corrupt_document_reads_as_empty_and_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        fs::write(&path, "[1, 2").unwrap();
        let backend = DocumentBackend::open(&path).unwrap();

        assert!(backend.keys().unwrap().is_empty());
        backend
            .set_many(&[
                ("demo_users".to_string(), json!([])),
                ("demo_wallets".to_string(), json!({})),
            ])
            .unwrap();

        let on_disk: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk, json!({ "demo_users": [], "demo_wallets": {} }));
    }
}
