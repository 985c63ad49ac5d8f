use axum::{body::Bytes, extract::Query, extract::State as AxumState, Json};
use casino_types::{ApiResponse, StorageAction, StorageRequest};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

use super::{blocking, parse_body, ApiError};
use crate::kv::StorageError;
use crate::metrics::RouteGroup;
use crate::Server;

#[derive(Debug, Default, Deserialize)]
pub(super) struct StorageParams {
    action: Option<String>,
    key: Option<String>,
}

/// `?action=get|set|get_all|set_batch|list`, with `action` and `key` read from
/// the query string first and the JSON body second.
pub(super) async fn handle(
    AxumState(server): AxumState<Arc<Server>>,
    Query(params): Query<StorageParams>,
    body: Bytes,
) -> Result<Json<ApiResponse<Value>>, ApiError> {
    let start = Instant::now();
    let result = run(&server, params, &body).await;
    server
        .http_metrics()
        .record(RouteGroup::Storage, start.elapsed());
    result.map(|data| Json(ApiResponse::ok(data)))
}

async fn run(server: &Server, params: StorageParams, body: &Bytes) -> Result<Value, ApiError> {
    let request: StorageRequest = parse_body(body).ok_or(StorageError::InvalidJson)?;
    let action: StorageAction = params
        .action
        .or(request.action)
        .unwrap_or_default()
        .parse()
        .map_err(|_| StorageError::UnknownAction)?;
    let key = params.key.or(request.key);
    let value = request.value;
    let items = request.items;
    let storage = server.storage().clone();

    blocking(move || match action {
        StorageAction::Get => storage.get(key.as_deref()),
        StorageAction::Set => storage
            .set(key.as_deref(), value.as_ref())
            .map(|()| Value::Bool(true)),
        StorageAction::GetAll => storage.get_all().map(Value::Object),
        StorageAction::SetBatch => storage
            .set_batch(items.as_ref())
            .map(|_| Value::Bool(true)),
        StorageAction::List => storage
            .list()
            .map(|keys| Value::Array(keys.into_iter().map(Value::String).collect())),
    })
    .await
}
