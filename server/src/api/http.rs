use axum::{
    extract::State as AxumState,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use casino_types::api::HealthResponse;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::Server;

/// Liveness plus a write probe against the key/value backend.
pub(super) async fn healthz(AxumState(server): AxumState<Arc<Server>>) -> Response {
    let storage = server.storage().clone();
    let probe = tokio::task::spawn_blocking(move || storage.probe()).await;
    let time = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default();
    let error = match probe {
        Ok(Ok(())) => None,
        Ok(Err(err)) => {
            tracing::warn!(?err, "storage probe failed");
            Some(err.to_string())
        }
        Err(err) => {
            tracing::warn!(%err, "storage probe task failed");
            Some("probe task failed".to_string())
        }
    };
    Json(HealthResponse {
        ok: true,
        writable: error.is_none(),
        time,
        error,
    })
    .into_response()
}

pub(super) async fn http_metrics(
    headers: HeaderMap,
    AxumState(server): AxumState<Arc<Server>>,
) -> Response {
    if let Some(status) = metrics_auth_error(&headers) {
        return status.into_response();
    }
    Json(server.http_metrics_snapshot()).into_response()
}

fn metrics_auth_error(headers: &HeaderMap) -> Option<StatusCode> {
    let token = std::env::var("METRICS_AUTH_TOKEN").unwrap_or_default();
    token_mismatch(headers, &token)
}

fn token_mismatch(headers: &HeaderMap, token: &str) -> Option<StatusCode> {
    if token.is_empty() {
        return None;
    }
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));
    let header_token = headers
        .get("x-metrics-token")
        .and_then(|value| value.to_str().ok());
    if bearer == Some(token) || header_token == Some(token) {
        None
    } else {
        Some(StatusCode::UNAUTHORIZED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::tests::{get_request, send, test_router};
    use axum::http::HeaderValue;

    #[tokio::test]
    async fn healthz_reports_writable_store() {
        let (_, router) = test_router();
        let (status, body) = send(&router, get_request("/healthz")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["writable"], true);
        assert!(body["time"].as_u64().unwrap() > 0);
        assert!(body.get("error").is_none());
    }

    #[tokio::test]
    async fn metrics_track_storage_latency() {
        let (_, router) = test_router();
        send(&router, get_request("/storage?action=list")).await;
        send(&router, get_request("/storage?action=get&key=notifications")).await;
        let (status, body) = send(&router, get_request("/metrics/http")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["storage"]["count"], 2);
        assert_eq!(body["admin"]["count"], 0);
        assert_eq!(body["storage"]["buckets_ms"].as_array().unwrap().len(), 12);
    }

    #[test]
    fn metrics_token_via_bearer_or_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(token_mismatch(&headers, ""), None);
        assert_eq!(
            token_mismatch(&headers, "secret"),
            Some(StatusCode::UNAUTHORIZED)
        );

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer secret"));
        assert_eq!(token_mismatch(&headers, "secret"), None);

        let mut headers = HeaderMap::new();
        headers.insert("x-metrics-token", HeaderValue::from_static("secret"));
        assert_eq!(token_mismatch(&headers, "secret"), None);
        assert_eq!(
            token_mismatch(&headers, "other"),
            Some(StatusCode::UNAUTHORIZED)
        );
    }
}
