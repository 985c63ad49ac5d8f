use crate::{Error, Result};
use casino_types::admin::{
    ActivityLogPage, ActivityLogQuery, AddBalanceRequest, AdminAction, AdminQuery,
    BackupSummary, BalanceUpdate, ExportRequest, RegisteredUser, RegistrationRequest,
    RepairSummary, ReportRequest, UpdateUserStatusRequest,
};
use casino_types::api::HealthResponse;
use casino_types::model::{
    ActivityLog, DashboardStats, GameStats, Transaction, UserDetails, UserSummary, VipLevelStats,
};
use casino_types::{MessageResponse, PageQuery, PagedResponse, StorageAction, StorageRequest};
use reqwest::Client as HttpClient;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;
use url::Url;

/// Timeout for connections and requests
const TIMEOUT: Duration = Duration::from_secs(30);

const STORAGE_PATH: &str = "storage_api.php";
const ADMIN_PATH: &str = "admin_api.php";
const REGISTER_PATH: &str = "user_registration.php";
const NO_QUERY: [(&str, &str); 0] = [];

/// Retry policy for transient HTTP failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per request (including the first attempt).
    pub max_attempts: usize,
    /// Initial backoff delay after the first retryable failure.
    pub initial_backoff: Duration,
    /// Maximum backoff delay between attempts.
    pub max_backoff: Duration,
    /// Whether non-idempotent requests (e.g., POST) may be retried.
    pub retry_non_idempotent: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(2),
            retry_non_idempotent: false,
        }
    }
}

/// Casino demo API client
#[derive(Clone)]
pub struct Client {
    pub base_url: Url,
    pub http_client: HttpClient,

    retry_policy: RetryPolicy,
}

impl Client {
    /// Create a new client
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)?;
        match base_url.scheme() {
            "http" | "https" => {}
            scheme => return Err(Error::InvalidScheme(scheme.to_string())),
        }

        let http_client = HttpClient::builder()
            .timeout(TIMEOUT)
            .pool_max_idle_per_host(100)
            .pool_idle_timeout(Duration::from_secs(60))
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            base_url,
            http_client,
            retry_policy: RetryPolicy::default(),
        })
    }

    /// Returns a copy of the current retry policy.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry_policy
    }

    /// Sets the retry policy for subsequent HTTP requests.
    pub fn set_retry_policy(&mut self, retry_policy: RetryPolicy) {
        self.retry_policy = retry_policy;
    }

    /// Returns a new client with the provided retry policy.
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    async fn get_query<Q: Serialize + ?Sized>(&self, path: &str, query: &Q) -> Result<Value> {
        let url = self.base_url.join(path)?;
        debug!(%url, "GET");
        let response = self
            .send_with_retry(reqwest::Method::GET, || {
                self.http_client.get(url.clone()).query(query)
            })
            .await?;
        read_envelope(response).await
    }

    async fn post_query<Q, B>(&self, path: &str, query: &Q, body: &B) -> Result<Value>
    where
        Q: Serialize + ?Sized,
        B: Serialize + ?Sized,
    {
        let url = self.base_url.join(path)?;
        debug!(%url, "POST");
        let response = self
            .send_with_retry(reqwest::Method::POST, || {
                self.http_client.post(url.clone()).query(query).json(body)
            })
            .await?;
        read_envelope(response).await
    }

    async fn send_with_retry(
        &self,
        method: reqwest::Method,
        make_request: impl Fn() -> reqwest::RequestBuilder,
    ) -> Result<reqwest::Response> {
        let max_attempts =
            if method == reqwest::Method::GET || self.retry_policy.retry_non_idempotent {
                self.retry_policy.max_attempts.max(1)
            } else {
                1
            };

        let mut attempt = 0usize;
        let mut backoff = self.retry_policy.initial_backoff;
        loop {
            attempt += 1;
            let result = make_request().send().await;
            match result {
                Ok(response) => {
                    let status = response.status();
                    if !is_retryable_status(status) || attempt >= max_attempts {
                        return Ok(response);
                    }
                }
                Err(err) => {
                    if attempt >= max_attempts || !is_retryable_error(&err) {
                        return Err(Error::Reqwest(err));
                    }
                }
            }

            if backoff > Duration::ZERO {
                sleep(backoff).await;
                backoff = std::cmp::min(backoff.saturating_mul(2), self.retry_policy.max_backoff);
            }
        }
    }

    /// Liveness and storage write probe.
    pub async fn health(&self) -> Result<HealthResponse> {
        let url = self.base_url.join("healthz")?;
        let response = self.get_with_retry(url).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Failed(status));
        }
        Ok(response.json().await?)
    }

    async fn get_with_retry(&self, url: Url) -> Result<reqwest::Response> {
        self.send_with_retry(reqwest::Method::GET, || self.http_client.get(url.clone()))
            .await
    }

    /// Reads one storage key; `None` when the key was never written.
    pub async fn storage_get(&self, key: &str) -> Result<Option<Value>> {
        let query = [("action", StorageAction::Get.as_str()), ("key", key)];
        let data = data_field(self.get_query(STORAGE_PATH, &query).await?);
        Ok((!data.is_null()).then_some(data))
    }

    pub async fn storage_set(&self, key: &str, value: &Value) -> Result<()> {
        let body = StorageRequest {
            key: Some(key.to_string()),
            value: Some(value.clone()),
            ..StorageRequest::default()
        };
        let query = [("action", StorageAction::Set.as_str())];
        self.post_query(STORAGE_PATH, &query, &body).await?;
        Ok(())
    }

    pub async fn storage_get_all(&self) -> Result<Map<String, Value>> {
        let query = [("action", StorageAction::GetAll.as_str())];
        match data_field(self.get_query(STORAGE_PATH, &query).await?) {
            Value::Object(map) => Ok(map),
            _ => Err(Error::UnexpectedResponse),
        }
    }

    /// Writes several keys at once; keys the server does not allow are skipped.
    pub async fn storage_set_batch(&self, items: &Map<String, Value>) -> Result<()> {
        let body = StorageRequest {
            items: Some(Value::Object(items.clone())),
            ..StorageRequest::default()
        };
        let query = [("action", StorageAction::SetBatch.as_str())];
        self.post_query(STORAGE_PATH, &query, &body).await?;
        Ok(())
    }

    pub async fn storage_list(&self) -> Result<Vec<String>> {
        let query = [("action", StorageAction::List.as_str())];
        let data = data_field(self.get_query(STORAGE_PATH, &query).await?);
        Ok(serde_json::from_value(data)?)
    }

    fn admin_query(action: AdminAction) -> AdminQuery {
        AdminQuery {
            action: Some(action.as_str().to_string()),
            ..AdminQuery::default()
        }
    }

    async fn admin_get(&self, query: &AdminQuery) -> Result<Value> {
        self.get_query(ADMIN_PATH, query).await
    }

    async fn admin_post<B: Serialize + ?Sized>(&self, action: AdminAction, body: &B) -> Result<Value> {
        self.post_query(ADMIN_PATH, &Self::admin_query(action), body)
            .await
    }

    pub async fn get_stats(&self) -> Result<DashboardStats> {
        let value = self.admin_get(&Self::admin_query(AdminAction::GetStats)).await?;
        decode_data(value)
    }

    pub async fn get_users(&self, page: PageQuery) -> Result<PagedResponse<UserSummary>> {
        let query = AdminQuery {
            page: page.page,
            limit: page.limit,
            ..Self::admin_query(AdminAction::GetUsers)
        };
        Ok(serde_json::from_value(self.admin_get(&query).await?)?)
    }

    pub async fn get_user_details(&self, user_id: i64) -> Result<UserDetails> {
        let query = AdminQuery {
            user_id: Some(user_id),
            ..Self::admin_query(AdminAction::GetUserDetails)
        };
        decode_data(self.admin_get(&query).await?)
    }

    pub async fn get_vip_stats(&self) -> Result<Vec<VipLevelStats>> {
        let value = self.admin_get(&Self::admin_query(AdminAction::GetVipStats)).await?;
        decode_data(value)
    }

    /// Paged transactions, optionally filtered by type and status.
    pub async fn get_transactions(
        &self,
        page: PageQuery,
        kind: Option<&str>,
        status: Option<&str>,
    ) -> Result<PagedResponse<Transaction>> {
        let query = AdminQuery {
            page: page.page,
            limit: page.limit,
            kind: kind.map(str::to_string),
            status: status.map(str::to_string),
            ..Self::admin_query(AdminAction::GetTransactions)
        };
        Ok(serde_json::from_value(self.admin_get(&query).await?)?)
    }

    pub async fn get_game_stats(&self) -> Result<Vec<GameStats>> {
        let value = self.admin_get(&Self::admin_query(AdminAction::GetGameStats)).await?;
        decode_data(value)
    }

    pub async fn update_user_status(&self, user_id: i64, active: bool) -> Result<MessageResponse> {
        let body = UpdateUserStatusRequest {
            user_id: Some(user_id),
            status: Some(Value::Bool(active)),
        };
        let value = self.admin_post(AdminAction::UpdateUserStatus, &body).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Credits a wallet and returns the new balance.
    pub async fn add_user_balance(&self, request: &AddBalanceRequest) -> Result<BalanceUpdate> {
        let value = self.admin_post(AdminAction::AddUserBalance, request).await?;
        decode_data(value)
    }

    pub async fn reset_all_balances(&self) -> Result<MessageResponse> {
        let value = self
            .admin_post(AdminAction::ResetAllBalances, &json!({}))
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn get_user_activity(
        &self,
        user_id: Option<i64>,
        limit: Option<u32>,
    ) -> Result<Vec<ActivityLog>> {
        let query = AdminQuery {
            user_id,
            limit,
            ..Self::admin_query(AdminAction::GetUserActivity)
        };
        decode_data(self.admin_get(&query).await?)
    }

    pub async fn search_users(&self, q: &str, limit: Option<u32>) -> Result<Vec<UserSummary>> {
        let query = AdminQuery {
            q: Some(q.to_string()),
            limit,
            ..Self::admin_query(AdminAction::SearchUsers)
        };
        decode_data(self.admin_get(&query).await?)
    }

    pub async fn register(&self, request: &RegistrationRequest) -> Result<RegisteredUser> {
        let value = self.post_query(REGISTER_PATH, &NO_QUERY, request).await?;
        decode_data(value)
    }

    pub async fn activity_logs(&self, query: &ActivityLogQuery) -> Result<ActivityLogPage> {
        Ok(serde_json::from_value(self.get_query("logs", query).await?)?)
    }

    pub async fn backup(&self) -> Result<BackupSummary> {
        decode_data(self.post_query("backup", &NO_QUERY, &json!({})).await?)
    }

    pub async fn repair(&self) -> Result<RepairSummary> {
        decode_data(self.post_query("repair", &NO_QUERY, &json!({})).await?)
    }

    /// Downloads a report as raw text (JSON or CSV, per the requested format).
    pub async fn report(&self, request: &ReportRequest) -> Result<String> {
        self.download("reports", request).await
    }

    /// Downloads a data export as raw text (JSON or CSV, per the requested format).
    pub async fn export(&self, request: &ExportRequest) -> Result<String> {
        self.download("export", request).await
    }

    async fn download<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<String> {
        let url = self.base_url.join(path)?;
        let response = self
            .send_with_retry(reqwest::Method::POST, || {
                self.http_client.post(url.clone()).json(body)
            })
            .await?;
        let status = response.status();
        let text = response.text().await?;
        if status.is_success() {
            return Ok(text);
        }
        Err(error_from_body(status, text))
    }
}

/// Reads a JSON response and turns `{success:false, error}` into [`Error::Api`].
async fn read_envelope(response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    let text = response.text().await?;
    let value: Value = match serde_json::from_str(&text) {
        Ok(value) => value,
        Err(_) if !status.is_success() => {
            return Err(Error::FailedWithBody { status, body: text })
        }
        Err(err) => return Err(err.into()),
    };
    if value.get("success").and_then(Value::as_bool) == Some(true) && status.is_success() {
        return Ok(value);
    }
    Err(error_from_value(status, &value, text))
}

fn error_from_body(status: reqwest::StatusCode, text: String) -> Error {
    match serde_json::from_str::<Value>(&text) {
        Ok(value) => error_from_value(status, &value, text),
        Err(_) => Error::FailedWithBody { status, body: text },
    }
}

fn error_from_value(status: reqwest::StatusCode, value: &Value, text: String) -> Error {
    match value.get("error").and_then(Value::as_str) {
        Some(message) => Error::Api {
            status,
            message: message.to_string(),
        },
        None if status.is_success() => Error::UnexpectedResponse,
        None => Error::FailedWithBody { status, body: text },
    }
}

fn data_field(mut value: Value) -> Value {
    value
        .get_mut("data")
        .map(Value::take)
        .unwrap_or(Value::Null)
}

fn decode_data<T: DeserializeOwned>(value: Value) -> Result<T> {
    Ok(serde_json::from_value(data_field(value))?)
}

fn is_retryable_status(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 408 | 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout()
}
