use axum::{
    body::Bytes,
    extract::{ConnectInfo, DefaultBodyLimit, Request, State as AxumState},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, MethodRouter},
    Json, Router,
};
use casino_types::ApiResponse;
use governor::middleware::NoOpMiddleware;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::admin;
use crate::kv::StorageError;
use crate::Server;

mod admin_api;
mod http;
mod storage;

pub struct Api {
    server: Arc<Server>,
}

#[derive(Clone)]
struct OriginConfig {
    allowed_origins: Arc<HashSet<String>>,
    allow_any_origin: bool,
    allow_no_origin: bool,
}

type IpGovernorConfig =
    tower_governor::governor::GovernorConfig<SmartIpKeyExtractor, NoOpMiddleware>;

fn default_governor_config() -> Option<IpGovernorConfig> {
    GovernorConfigBuilder::default()
        .key_extractor(SmartIpKeyExtractor)
        .finish()
}

/// Handler for methods a route does not accept.
async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

fn post_only<H, T>(handler: H) -> MethodRouter<Arc<Server>>
where
    H: axum::handler::Handler<T, Arc<Server>>,
    T: 'static,
{
    post(handler).fallback(method_not_allowed)
}

impl Api {
    pub fn new(server: Arc<Server>) -> Self {
        Self { server }
    }

    pub fn router(&self) -> Router {
        let allowed_origins = parse_allowed_origins("ALLOWED_HTTP_ORIGINS");
        let allow_any_origin = allowed_origins.contains("*");
        let allow_no_origin = parse_allow_no_origin("ALLOW_HTTP_NO_ORIGIN");
        if allowed_origins.is_empty() {
            tracing::warn!("ALLOWED_HTTP_ORIGINS is empty; all browser origins will be rejected");
        }
        let cors_origins = allowed_origins
            .iter()
            .filter(|origin| *origin != "*")
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!("Invalid origin in ALLOWED_HTTP_ORIGINS: {}", origin);
                    None
                }
            })
            .collect::<Vec<_>>();
        let origin_config = OriginConfig {
            allowed_origins: Arc::new(allowed_origins),
            allow_any_origin,
            allow_no_origin,
        };

        let cors = if allow_any_origin {
            CorsLayer::new().allow_origin(AllowOrigin::any())
        } else {
            CorsLayer::new().allow_origin(AllowOrigin::list(cors_origins))
        }
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::HeaderName::from_static("x-request-id"),
        ])
        .expose_headers([
            header::HeaderName::from_static("x-request-id"),
            header::CONTENT_DISPOSITION,
        ]);

        // Environment variables override config
        let config = self.server.config();
        let http_rate_per_sec =
            parse_env_u64("RATE_LIMIT_HTTP_PER_SEC").or(config.http_rate_limit_per_second);
        let http_rate_burst =
            parse_env_u32("RATE_LIMIT_HTTP_BURST").or(config.http_rate_limit_burst);

        let governor_conf = match (http_rate_per_sec, http_rate_burst) {
            (Some(rate_per_second), Some(burst_size))
                if rate_per_second > 0 && burst_size > 0 =>
            {
                let nanos_per_request = (1_000_000_000u64 / rate_per_second).max(1);
                let period = Duration::from_nanos(nanos_per_request);
                let config = GovernorConfigBuilder::default()
                    .period(period)
                    .burst_size(burst_size)
                    .key_extractor(SmartIpKeyExtractor)
                    .finish()
                    .or_else(|| {
                        tracing::warn!("invalid rate-limit config; falling back to defaults");
                        default_governor_config()
                    });
                config.map(Arc::new)
            }
            _ => None,
        };

        let storage_route = get(storage::handle).post(storage::handle);
        let admin_route = get(admin_api::dispatch).post(admin_api::dispatch);
        let register_route = post_only(admin_api::register);

        let router = Router::new()
            .route("/healthz", get(http::healthz))
            .route("/metrics/http", get(http::http_metrics))
            .route("/storage_api.php", storage_route.clone())
            .route("/storage", storage_route)
            .route("/admin_api.php", admin_route.clone())
            .route("/admin", admin_route)
            .route("/user_registration.php", register_route.clone())
            .route("/register", register_route)
            .route("/reports", post_only(admin_api::report))
            .route("/export", post_only(admin_api::export))
            .route("/backup", post_only(admin_api::backup))
            .route("/repair", post_only(admin_api::repair))
            .route(
                "/logs",
                get(admin_api::activity_logs).fallback(method_not_allowed),
            );

        let router = match &config.static_dir {
            Some(dir) => {
                tracing::info!(dir = %dir.display(), "serving static files");
                router.fallback_service(ServeDir::new(dir))
            }
            None => router.fallback(not_found),
        };

        let router = match governor_conf {
            Some(config) => router.layer(GovernorLayer { config }),
            None => router,
        };

        let router = router.layer(cors);
        let router = router.layer(middleware::from_fn(move |req, next| {
            let origin_config = origin_config.clone();
            async move { enforce_origin(origin_config, req, next).await }
        }));
        let router = match config.http_body_limit_bytes {
            Some(limit) if limit > 0 => router.layer(DefaultBodyLimit::max(limit)),
            _ => router,
        };
        let router = router.layer(middleware::from_fn_with_state(
            self.server.clone(),
            request_id_middleware,
        ));
        let router = router.layer(TraceLayer::new_for_http());

        router.with_state(self.server.clone())
    }
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}

/// Errors returned by handlers, rendered as `{ "success": false, "error": .. }`.
#[derive(Debug, Error)]
pub(crate) enum ApiError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Admin(#[from] admin::Error),
    #[error("{0}")]
    BadRequest(String),
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("Not found")]
    NotFound,
    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Storage(err) => match err {
                StorageError::KeyNotAllowed => StatusCode::FORBIDDEN,
                StorageError::MissingValue
                | StorageError::InvalidItems
                | StorageError::InvalidJson => StatusCode::BAD_REQUEST,
                StorageError::UnknownAction => StatusCode::NOT_FOUND,
                StorageError::Read(_) | StorageError::Write(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Admin(err) => match err {
                admin::Error::BadRequest(_) => StatusCode::BAD_REQUEST,
                admin::Error::NotFound(_) => StatusCode::NOT_FOUND,
                admin::Error::Conflict(_) => StatusCode::CONFLICT,
                admin::Error::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Join(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to callers. Internal failures are logged, not echoed.
    fn message(&self) -> String {
        match self {
            Self::Admin(err) if self.status().is_server_error() => {
                tracing::error!(%err, "admin database failure");
                "Database error".to_string()
            }
            Self::Join(err) => {
                tracing::error!(%err, "request task failed");
                "Internal error".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(ApiResponse::<()>::error(self.message()))).into_response()
    }
}

/// Runs blocking store work off the async runtime.
async fn blocking<T, E, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Into<ApiError> + Send + 'static,
{
    tokio::task::spawn_blocking(work).await?.map_err(Into::into)
}

/// Decodes an optional JSON body; an empty body yields the default value.
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Option<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Some(T::default());
    }
    serde_json::from_slice(body).ok()
}

/// Caller address: first `X-Forwarded-For` hop, else the socket peer.
fn client_ip(headers: &HeaderMap, connect: Option<&ConnectInfo<SocketAddr>>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .or_else(|| connect.map(|ConnectInfo(addr)| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

fn parse_allowed_origins(var: &str) -> HashSet<String> {
    match std::env::var(var) {
        Ok(value) => value
            .split(',')
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .collect(),
        Err(_) => HashSet::from(["*".to_string()]),
    }
}

/// Requests without an `Origin` header (CLI and server-to-server callers) are
/// allowed unless explicitly disabled.
fn parse_allow_no_origin(var: &str) -> bool {
    !matches!(
        std::env::var(var).as_deref(),
        Ok("0") | Ok("false") | Ok("FALSE") | Ok("no") | Ok("NO")
    )
}

fn parse_env_u64(var: &str) -> Option<u64> {
    std::env::var(var).ok().and_then(|v| v.parse().ok())
}

fn parse_env_u32(var: &str) -> Option<u32> {
    std::env::var(var).ok().and_then(|v| v.parse().ok())
}

async fn enforce_origin(config: OriginConfig, req: Request, next: Next) -> Response {
    let origin = req
        .headers()
        .get(header::ORIGIN)
        .and_then(|value| value.to_str().ok());
    if let Some(origin) = origin {
        if !config.allow_any_origin && !config.allowed_origins.contains(origin) {
            return (
                StatusCode::FORBIDDEN,
                Json(ApiResponse::<()>::error("Origin not allowed")),
            )
                .into_response();
        }
    } else if !config.allow_no_origin {
        return (
            StatusCode::FORBIDDEN,
            Json(ApiResponse::<()>::error("Origin required")),
        )
            .into_response();
    }
    next.run(req).await
}

async fn request_id_middleware(
    AxumState(server): AxumState<Arc<Server>>,
    req: Request,
    next: Next,
) -> Response {
    let request_id = req
        .headers()
        .get(header::HeaderName::from_static("x-request-id"))
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = Instant::now();
    let mut response = next.run(req).await;
    match response.status() {
        StatusCode::FORBIDDEN if !is_storage_path(&path) => {
            server.http_metrics().inc_reject_origin()
        }
        StatusCode::PAYLOAD_TOO_LARGE => server.http_metrics().inc_reject_body_limit(),
        StatusCode::TOO_MANY_REQUESTS => server.http_metrics().inc_reject_rate_limit(),
        _ => {}
    }
    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(
            header::HeaderName::from_static("x-request-id"),
            header_value,
        );
    }
    tracing::info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "http.request"
    );
    response
}

/// Storage answers 403 for disallowed keys, which is not an origin rejection.
fn is_storage_path(path: &str) -> bool {
    matches!(path, "/storage" | "/storage_api.php")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::ServerConfig;
    use axum::body::Body;
    use serde_json::Value;
    use tower::ServiceExt;

    pub(crate) fn test_router() -> (Arc<Server>, Router) {
        let server = Arc::new(Server::open(ServerConfig::ephemeral()).unwrap());
        let router = Api::new(server.clone()).router();
        (server, router)
    }

    pub(crate) async fn send(router: &Router, request: axum::http::Request<Body>) -> (StatusCode, Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, body)
    }

    pub(crate) fn get_request(uri: &str) -> axum::http::Request<Body> {
        axum::http::Request::get(uri).body(Body::empty()).unwrap()
    }

    pub(crate) fn post_json(uri: &str, body: Value) -> axum::http::Request<Body> {
        axum::http::Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn unknown_route_is_enveloped_404() {
        let (_, router) = test_router();
        let (status, body) = send(&router, get_request("/nope")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Not found");
    }

    #[tokio::test]
    async fn post_only_routes_reject_get() {
        let (_, router) = test_router();
        for uri in ["/register", "/user_registration.php", "/reports", "/backup"] {
            let (status, body) = send(&router, get_request(uri)).await;
            assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED, "{uri}");
            assert_eq!(body["error"], "Method not allowed");
        }
    }

    #[tokio::test]
    async fn request_id_is_echoed() {
        let (_, router) = test_router();
        let request = axum::http::Request::get("/healthz")
            .header("x-request-id", "abc-123")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.headers()["x-request-id"], "abc-123");
    }

    #[tokio::test]
    async fn body_limit_rejects_large_payloads() {
        let config = ServerConfig {
            http_body_limit_bytes: Some(64),
            ..ServerConfig::ephemeral()
        };
        let server = Arc::new(Server::open(config).unwrap());
        let router = Api::new(server.clone()).router();
        let payload = serde_json::json!({
            "action": "set",
            "key": "notifications",
            "value": "x".repeat(256),
        });
        let (status, _) = send(&router, post_json("/storage", payload)).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(server.http_metrics_snapshot().reject_body_limit, 1);
    }

    #[tokio::test]
    async fn static_dir_serves_index() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>casino</h1>").unwrap();
        let config = ServerConfig {
            static_dir: Some(dir.path().to_path_buf()),
            ..ServerConfig::ephemeral()
        };
        let server = Arc::new(Server::open(config).unwrap());
        let router = Api::new(server).router();
        let (status, body) = send(&router, get_request("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Value::String("<h1>casino</h1>".to_string()));
    }

    #[test]
    fn client_ip_prefers_forwarded_header() {
        let mut headers = HeaderMap::new();
        let peer = ConnectInfo(SocketAddr::from(([10, 0, 0, 1], 4000)));
        assert_eq!(client_ip(&headers, Some(&peer)), "10.0.0.1");
        assert_eq!(client_ip(&headers, None), "unknown");
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9, 10.0.0.1"));
        assert_eq!(client_ip(&headers, Some(&peer)), "203.0.113.9");
    }
}
