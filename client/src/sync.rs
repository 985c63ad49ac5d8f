//! Mirrors tracked local keys to the server's storage API.
//!
//! Pulls server state once at start, then pushes local writes as they happen
//! and reconciles every tracked key on an interval.

use crate::{Client, LocalStore, Result};
use casino_types::Allowlist;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Delay between the initial pull and the first full push.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(500);

/// Interval between full reconciliation passes.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyncConfig {
    pub initial_delay: Duration,
    pub interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            initial_delay: DEFAULT_INITIAL_DELAY,
            interval: DEFAULT_INTERVAL,
        }
    }
}

/// Outcome of a push pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub pushed: usize,
    pub failed: usize,
}

impl SyncReport {
    fn record(&mut self, result: Result<bool>) {
        match result {
            Ok(true) => self.pushed += 1,
            Ok(false) => {}
            Err(_) => self.failed += 1,
        }
    }
}

pub struct SyncMirror {
    client: Client,
    store: Arc<Mutex<LocalStore>>,
    allowlist: Allowlist,
    config: SyncConfig,
}

impl SyncMirror {
    pub fn new(client: Client, store: Arc<Mutex<LocalStore>>) -> Self {
        Self {
            client,
            store,
            allowlist: Allowlist::default(),
            config: SyncConfig::default(),
        }
    }

    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    pub fn store(&self) -> &Arc<Mutex<LocalStore>> {
        &self.store
    }

    /// Exact allowlisted keys and `balance:`/`sec_code:` prefixed keys.
    pub fn is_tracked(&self, key: &str) -> bool {
        self.allowlist.is_allowed(key)
    }

    /// Copies every exact tracked key that the server holds into the local store.
    ///
    /// Keys that fail to load are logged and skipped. Returns the number of
    /// keys written locally.
    pub async fn pull_initial(&self) -> usize {
        let mut pulled = 0;
        for key in self.allowlist.exact() {
            let value = match self.client.storage_get(key).await {
                Ok(Some(value)) => value,
                Ok(None) => continue,
                Err(err) => {
                    warn!(key = key.as_str(), ?err, "storage get failed");
                    continue;
                }
            };
            let mut store = self.store.lock().await;
            match store.apply_remote(key, &value) {
                Ok(()) => pulled += 1,
                Err(err) => warn!(key = key.as_str(), ?err, "failed to write pulled value"),
            }
        }
        pulled
    }

    /// Pushes one local key to the server.
    ///
    /// Returns `Ok(false)` for untracked keys and keys absent locally.
    pub async fn push_key(&self, key: &str) -> Result<bool> {
        if !self.is_tracked(key) {
            return Ok(false);
        }
        let Some(value) = self.store.lock().await.read_value(key) else {
            return Ok(false);
        };
        match self.client.storage_set(key, &value).await {
            Ok(()) => {
                debug!(key, "pushed local value");
                Ok(true)
            }
            Err(err) => {
                warn!(key, ?err, "storage set failed");
                Err(err)
            }
        }
    }

    /// Pushes keys written locally since the last push.
    pub async fn push_changed(&self) -> SyncReport {
        let changed = self.store.lock().await.take_changed();
        let mut report = SyncReport::default();
        for key in changed {
            report.record(self.push_key(&key).await);
        }
        report
    }

    /// Pushes every tracked key present locally.
    pub async fn reconcile(&self) -> SyncReport {
        let keys: Vec<String> = {
            let store = self.store.lock().await;
            store
                .keys()
                .filter(|key| self.is_tracked(key))
                .map(str::to_string)
                .collect()
        };
        let mut report = SyncReport::default();
        for key in keys {
            report.record(self.push_key(&key).await);
        }
        report
    }

    /// Pulls, waits the initial delay, then keeps the server in step until
    /// `shutdown` resolves.
    pub async fn run<F: Future<Output = ()>>(&self, shutdown: F) {
        tokio::pin!(shutdown);
        let notify = self.store.lock().await.change_notifier();

        let pulled = tokio::select! {
            _ = &mut shutdown => return,
            pulled = self.pull_initial() => pulled,
        };
        info!(pulled, "pulled server state");

        tokio::select! {
            _ = &mut shutdown => return,
            _ = sleep(self.config.initial_delay) => {}
        }
        // Reconcile covers everything written so far
        self.store.lock().await.take_changed();
        let report = self.reconcile().await;
        info!(pushed = report.pushed, failed = report.failed, "initial push");

        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = notify.notified() => {
                    let report = self.push_changed().await;
                    debug!(pushed = report.pushed, failed = report.failed, "pushed local changes");
                }
                _ = ticker.tick() => {
                    let report = self.reconcile().await;
                    if report.failed > 0 {
                        warn!(pushed = report.pushed, failed = report.failed, "reconcile incomplete");
                    } else {
                        debug!(pushed = report.pushed, "reconciled");
                    }
                }
            }
        }
        info!("sync mirror stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::TestContext;
    use serde_json::json;

    fn mirror(ctx: &TestContext, store: LocalStore) -> SyncMirror {
        SyncMirror::new(ctx.create_client(), Arc::new(Mutex::new(store)))
    }

    #[tokio::test]
    async fn test_tracked_keys() {
        let ctx = TestContext::new().await;
        let mirror = mirror(&ctx, LocalStore::in_memory());
        assert!(mirror.is_tracked("demo_users"));
        assert!(mirror.is_tracked("balance:alice"));
        assert!(mirror.is_tracked("sec_code:alice"));
        assert!(!mirror.is_tracked("username"));
        assert!(!mirror.is_tracked("action_history"));
    }

    #[tokio::test]
    async fn test_pull_initial_writes_non_null_values() {
        let ctx = TestContext::new().await;
        let client = ctx.create_client();
        client
            .storage_set("demo_users", &json!([{ "id": 1, "username": "alice" }]))
            .await
            .unwrap();
        client.storage_set("notifications", &json!("hello")).await.unwrap();

        let mirror = mirror(&ctx, LocalStore::in_memory());
        assert_eq!(mirror.pull_initial().await, 2);

        let mut store = mirror.store().lock().await;
        assert_eq!(
            store.read_value("demo_users"),
            Some(json!([{ "id": 1, "username": "alice" }]))
        );
        assert_eq!(store.get_item("notifications"), Some("hello"));
        assert!(store.get_item("demo_wallets").is_none());
        // Pulled values are not queued for push
        assert!(store.take_changed().is_empty());
    }

    #[tokio::test]
    async fn test_push_key_rules() {
        let ctx = TestContext::new().await;
        let mut store = LocalStore::in_memory();
        store.set_item("balance:alice", "525").unwrap();
        store.set_item("username", "alice").unwrap();
        let mirror = mirror(&ctx, store);

        assert!(mirror.push_key("balance:alice").await.unwrap());
        assert!(!mirror.push_key("username").await.unwrap());
        assert!(!mirror.push_key("demo_users").await.unwrap());

        let stored = ctx.server.storage().get(Some("balance:alice")).unwrap();
        assert_eq!(stored, json!(525));
        assert_eq!(ctx.server.storage().list().unwrap(), vec!["balance:alice"]);
    }

    #[tokio::test]
    async fn test_push_changed_and_reconcile() {
        let ctx = TestContext::new().await;
        let mirror = mirror(&ctx, LocalStore::in_memory());
        {
            let mut store = mirror.store().lock().await;
            store.write_json("demo_wallets", &json!({ "1": { "balance": 5 } })).unwrap();
            store.set_item("sec_code:bob", "9999").unwrap();
            store.set_item("loggedIn", "true").unwrap();
        }

        let report = mirror.push_changed().await;
        assert_eq!(report, SyncReport { pushed: 2, failed: 0 });
        assert_eq!(mirror.push_changed().await, SyncReport::default());

        let report = mirror.reconcile().await;
        assert_eq!(report.pushed, 2);
        assert_eq!(
            ctx.server.storage().get(Some("demo_wallets")).unwrap(),
            json!({ "1": { "balance": 5 } })
        );
        assert_eq!(ctx.server.storage().get(Some("sec_code:bob")).unwrap(), json!(9999));
    }

    #[tokio::test]
    async fn test_push_failure_is_reported() {
        let mut store = LocalStore::in_memory();
        store.set_item("balance:carol", "12").unwrap();
        let client = Client::new("http://127.0.0.1:9").unwrap();
        let mirror = SyncMirror::new(client, Arc::new(Mutex::new(store)));

        assert!(mirror.push_key("balance:carol").await.is_err());
        assert_eq!(mirror.reconcile().await, SyncReport { pushed: 0, failed: 1 });
    }

    #[tokio::test]
    async fn test_run_pushes_local_writes_until_shutdown() {
        let ctx = TestContext::new().await;
        let mut store = LocalStore::in_memory();
        store.set_item("balance:dave", "7").unwrap();
        let mirror = Arc::new(mirror(&ctx, store).with_config(SyncConfig {
            initial_delay: Duration::from_millis(10),
            interval: Duration::from_secs(60),
        }));

        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let runner = {
            let mirror = mirror.clone();
            tokio::spawn(async move {
                mirror
                    .run(async {
                        let _ = stop_rx.await;
                    })
                    .await;
            })
        };

        // Initial push lands after the initial delay
        sleep(Duration::from_millis(300)).await;
        assert_eq!(ctx.server.storage().get(Some("balance:dave")).unwrap(), json!(7));

        // Local write is pushed without waiting for the interval
        mirror.store().lock().await.set_item("balance:dave", "8").unwrap();
        sleep(Duration::from_millis(300)).await;
        assert_eq!(ctx.server.storage().get(Some("balance:dave")).unwrap(), json!(8));

        stop_tx.send(()).unwrap();
        runner.await.unwrap();
    }
}
