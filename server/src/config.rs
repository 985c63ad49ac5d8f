use crate::kv::BackendKind;
use serde::Serialize;
use std::path::PathBuf;

const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_BACKUP_DIR: &str = "backups";
const DEFAULT_HTTP_RATE_LIMIT_PER_SECOND: u64 = 100;
const DEFAULT_HTTP_RATE_LIMIT_BURST: u32 = 200;
const DEFAULT_HTTP_BODY_LIMIT_BYTES: usize = 2 * 1024 * 1024;

#[derive(Clone, Debug, Serialize)]
pub struct ServerConfig {
    pub kv_backend: BackendKind,
    pub data_dir: PathBuf,
    pub kv_sqlite_path: Option<PathBuf>,
    /// SQLite file of the admin database; in-memory when `None`.
    pub admin_db_path: Option<PathBuf>,
    pub seed_demo: bool,
    pub static_dir: Option<PathBuf>,
    pub backup_dir: PathBuf,
    pub http_rate_limit_per_second: Option<u64>,
    pub http_rate_limit_burst: Option<u32>,
    pub http_body_limit_bytes: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            kv_backend: BackendKind::default(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            kv_sqlite_path: None,
            admin_db_path: None,
            seed_demo: false,
            static_dir: None,
            backup_dir: PathBuf::from(DEFAULT_BACKUP_DIR),
            http_rate_limit_per_second: Some(DEFAULT_HTTP_RATE_LIMIT_PER_SECOND),
            http_rate_limit_burst: Some(DEFAULT_HTTP_RATE_LIMIT_BURST),
            http_body_limit_bytes: Some(DEFAULT_HTTP_BODY_LIMIT_BYTES),
        }
    }
}

impl ServerConfig {
    /// Everything in memory, no rate limiting. Used by tests and embedded servers.
    pub fn ephemeral() -> Self {
        Self {
            kv_backend: BackendKind::Memory,
            http_rate_limit_per_second: None,
            http_rate_limit_burst: None,
            ..Self::default()
        }
    }
}

/// Parses `sqlite://path` (or `sqlite:path`) connection strings into a file path.
pub fn sqlite_path_from_url(url: &str) -> Option<PathBuf> {
    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))?;
    let path = path.split('?').next().unwrap_or_default();
    (!path.is_empty()).then(|| PathBuf::from(path))
}
