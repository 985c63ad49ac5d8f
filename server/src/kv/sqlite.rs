use super::{Error, KvBackend, Result, StoredValue};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use std::sync::Mutex;

/// Key/value rows in a `kv_entries` table.
pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv_entries (
                 key TEXT PRIMARY KEY,
                 value TEXT NOT NULL,
                 updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
             );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

const UPSERT: &str = "INSERT INTO kv_entries (key, value, updated_at)
     VALUES (?1, ?2, CURRENT_TIMESTAMP)
     ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at";

impl KvBackend for SqliteBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn get(&self, key: &str) -> Result<Option<StoredValue>> {
        let conn = self.conn.lock().map_err(|_| Error::Poisoned)?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT value FROM kv_entries WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(raw.map(StoredValue::from_raw))
    }

    fn set(&self, key: &str, value: &Value) -> Result<()> {
        let encoded = serde_json::to_string(value)?;
        let conn = self.conn.lock().map_err(|_| Error::Poisoned)?;
        conn.execute(UPSERT, params![key, encoded])?;
        Ok(())
    }

    fn set_many(&self, items: &[(String, Value)]) -> Result<()> {
        let encoded = items
            .iter()
            .map(|(key, value)| Ok((key.as_str(), serde_json::to_string(value)?)))
            .collect::<Result<Vec<_>>>()?;
        let mut conn = self.conn.lock().map_err(|_| Error::Poisoned)?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(UPSERT)?;
            for (key, value) in &encoded {
                stmt.execute(params![key, value])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn entries(&self) -> Result<Vec<(String, StoredValue)>> {
        let conn = self.conn.lock().map_err(|_| Error::Poisoned)?;
        let mut stmt = conn.prepare("SELECT key, value FROM kv_entries ORDER BY key")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut entries = Vec::new();
        for row in rows {
            let (key, raw) = row?;
            entries.push((key, StoredValue::from_raw(raw)));
        }
        Ok(entries)
    }

    fn keys(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().map_err(|_| Error::Poisoned)?;
        let mut stmt = conn.prepare("SELECT key FROM kv_entries ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(keys)
    }

    fn probe(&self) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| Error::Poisoned)?;
        conn.execute_batch("BEGIN IMMEDIATE; ROLLBACK;")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn batch_writes_overwrite_existing_rows() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        backend.set("demo_users", &json!([1])).unwrap();
        backend
            .set_many(&[
                ("demo_users".to_string(), json!([1, 2])),
                ("notifications".to_string(), json!(null)),
            ])
            .unwrap();

        assert_eq!(
            backend.get("demo_users").unwrap(),
            Some(StoredValue::Json(json!([1, 2])))
        );
        assert_eq!(
            backend.get("notifications").unwrap(),
            Some(StoredValue::Json(json!(null)))
        );
        assert_eq!(backend.keys().unwrap(), vec!["demo_users", "notifications"]);
    }
}
