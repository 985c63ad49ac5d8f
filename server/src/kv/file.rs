use super::{Error, KvBackend, Result, StoredValue};
use casino_types::sanitize_key;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

const INDEX_FILE: &str = "_index.json";
const PROBE_FILE: &str = ".probe";

/// One `<sanitized key>.json` file per key.
///
/// Sanitizing is lossy, so an index of sanitized name to original key is kept
/// next to the values. Files written without an index entry list under their
/// sanitized name.
pub struct FileBackend {
    dir: PathBuf,
    index: Mutex<BTreeMap<String, String>>,
}

impl FileBackend {
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let index = match fs::read_to_string(dir.join(INDEX_FILE)) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                warn!(?err, dir = %dir.display(), "key index is corrupt; rebuilding");
                BTreeMap::new()
            }),
            Err(err) if err.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(err.into()),
        };
        Ok(Self {
            dir: dir.to_path_buf(),
            index: Mutex::new(index),
        })
    }

    fn path_for(&self, sanitized: &str) -> PathBuf {
        self.dir.join(format!("{sanitized}.json"))
    }

    fn stored_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if file_name == INDEX_FILE {
                continue;
            }
            if let Some(stem) = file_name.strip_suffix(".json") {
                names.push(stem.to_string());
            }
        }
        Ok(names)
    }

    fn original_key(index: &BTreeMap<String, String>, sanitized: String) -> String {
        index.get(&sanitized).cloned().unwrap_or(sanitized)
    }
}

/// Writes `contents` to a sibling temp file and renames it over `path`.
fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

impl KvBackend for FileBackend {
    fn name(&self) -> &'static str {
        "file"
    }

    fn get(&self, key: &str) -> Result<Option<StoredValue>> {
        match fs::read_to_string(self.path_for(&sanitize_key(key))) {
            Ok(raw) => Ok(Some(StoredValue::from_raw(raw))),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set(&self, key: &str, value: &Value) -> Result<()> {
        let sanitized = sanitize_key(key);
        let mut index = self.index.lock().map_err(|_| Error::Poisoned)?;
        write_atomic(&self.path_for(&sanitized), &serde_json::to_vec(value)?)?;

        if index.get(&sanitized).map(String::as_str) != Some(key) {
            index.insert(sanitized, key.to_string());
            write_atomic(
                &self.dir.join(INDEX_FILE),
                &serde_json::to_vec_pretty(&*index)?,
            )?;
        }
        Ok(())
    }

    fn entries(&self) -> Result<Vec<(String, StoredValue)>> {
        let index = self.index.lock().map_err(|_| Error::Poisoned)?;
        let mut entries = Vec::new();
        for name in self.stored_names()? {
            let raw = match fs::read_to_string(self.path_for(&name)) {
                Ok(raw) => raw,
                // Removed between listing and reading.
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => return Err(err.into()),
            };
            entries.push((
                Self::original_key(&index, name),
                StoredValue::from_raw(raw),
            ));
        }
        Ok(entries)
    }

    fn keys(&self) -> Result<Vec<String>> {
        let index = self.index.lock().map_err(|_| Error::Poisoned)?;
        Ok(self
            .stored_names()?
            .into_iter()
            .map(|name| Self::original_key(&index, name))
            .collect())
    }

    fn probe(&self) -> Result<()> {
        let path = self.dir.join(PROBE_FILE);
        fs::write(&path, b"ok")?;
        fs::remove_file(&path)?;
        Ok(())
    }
}
