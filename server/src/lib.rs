//! Storage and admin backend of the casino demo.
//!
//! [`Server`] owns the key/value store, the admin database and the HTTP
//! metrics; [`Api`] turns it into an axum router.

use casino_types::Allowlist;
use std::sync::Arc;
use thiserror::Error;

mod api;
pub use api::Api;

pub mod admin;
mod config;
pub use config::{sqlite_path_from_url, ServerConfig};
pub mod kv;
mod metrics;
pub use metrics::{HttpMetricsSnapshot, LatencySnapshot};

use admin::AdminDb;
use kv::StorageService;
use metrics::HttpMetrics;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to open key/value store: {0}")]
    Store(#[from] kv::Error),
    #[error("failed to open admin database: {0}")]
    Admin(#[from] admin::Error),
}

pub struct Server {
    config: ServerConfig,
    storage: StorageService,
    admin: Arc<AdminDb>,
    http_metrics: HttpMetrics,
}

impl Server {
    pub fn new(config: ServerConfig, storage: StorageService, admin: AdminDb) -> Self {
        Self {
            config,
            storage,
            admin: Arc::new(admin),
            http_metrics: HttpMetrics::default(),
        }
    }

    /// Opens the configured store and admin database, seeding demo rows when asked.
    pub fn open(config: ServerConfig) -> Result<Self, StartupError> {
        let backend = kv::open_backend(
            config.kv_backend,
            &config.data_dir,
            config.kv_sqlite_path.as_deref(),
        )?;
        tracing::info!(
            backend = backend.name(),
            data_dir = %config.data_dir.display(),
            "key/value store opened"
        );
        let storage = StorageService::new(backend, Allowlist::default());

        let admin = match &config.admin_db_path {
            Some(path) => {
                tracing::info!(path = %path.display(), "admin database opened");
                AdminDb::open(path)?
            }
            None => {
                tracing::warn!("admin database path not set; using in-memory database");
                AdminDb::open_in_memory()?
            }
        };
        if config.seed_demo {
            let summary = admin.seed_demo()?;
            tracing::info!(
                admin_created = summary.admin_created,
                demo_user_created = summary.demo_user_created,
                transactions = summary.transactions_created,
                game_sessions = summary.game_sessions_created,
                "demo data seeded"
            );
        }

        Ok(Self::new(config, storage, admin))
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn storage(&self) -> &StorageService {
        &self.storage
    }

    pub fn admin(&self) -> Arc<AdminDb> {
        Arc::clone(&self.admin)
    }

    pub(crate) fn http_metrics(&self) -> &HttpMetrics {
        &self.http_metrics
    }

    pub fn http_metrics_snapshot(&self) -> HttpMetricsSnapshot {
        self.http_metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::BackendKind;
    use serde_json::json;

    #[test]
    fn open_creates_store_and_seeds() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            kv_backend: BackendKind::File,
            data_dir: dir.path().join("data"),
            admin_db_path: Some(dir.path().join("db").join("casino.sqlite")),
            seed_demo: true,
            ..ServerConfig::default()
        };
        let server = Server::open(config).unwrap();
        server
            .storage()
            .set(Some("demo_users"), Some(&json!([{ "id": 1 }])))
            .unwrap();
        assert!(dir.path().join("data/keys/demo_users.json").exists());

        let stats = server.admin().stats().unwrap();
        assert_eq!(stats.total_users, 1);
    }

    #[test]
    fn ephemeral_server_uses_memory() {
        let server = Server::open(ServerConfig::ephemeral()).unwrap();
        assert_eq!(server.storage().backend_name(), "memory");
        assert!(server.storage().list().unwrap().is_empty());
    }
}
