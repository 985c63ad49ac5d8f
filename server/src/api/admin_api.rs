use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, ConnectInfo, Query, State as AxumState},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use casino_types::admin::{
    ActivityLogQuery, AddBalanceRequest, AdminAction, AdminQuery, BalanceUpdate, ExportKind,
    ExportRequest, OutputFormat, RegistrationRequest, ReportKind, ReportRequest,
    UpdateUserStatusRequest,
};
use casino_types::{ApiResponse, MessageResponse, MessageWithData, PageQuery};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use super::{blocking, client_ip, parse_body, ApiError};
use crate::admin::{Rendered, DEFAULT_ACTIVITY_LIMIT};
use crate::metrics::RouteGroup;
use crate::Server;

const DEFAULT_SEARCH_LIMIT: u32 = 20;

fn ok<T: Serialize>(data: T) -> Response {
    Json(ApiResponse::ok(data)).into_response()
}

fn json_body(body: &Bytes) -> Result<Value, ApiError> {
    parse_body(body).ok_or_else(|| ApiError::BadRequest("Invalid JSON".to_string()))
}

/// Decodes an action body; a missing body decodes as the default request.
fn decode<T: DeserializeOwned + Default>(body: &Value) -> Result<T, ApiError> {
    if body.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(body.clone())
        .map_err(|_| ApiError::BadRequest("Invalid request body".to_string()))
}

fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
    query
        .map(|Query(query)| query)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

/// `?action=...` dispatch of the admin dashboard API.
pub(super) async fn dispatch(
    AxumState(server): AxumState<Arc<Server>>,
    method: Method,
    headers: HeaderMap,
    connect: Option<ConnectInfo<SocketAddr>>,
    query: Result<Query<AdminQuery>, QueryRejection>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let start = Instant::now();
    let ip = client_ip(&headers, connect.as_ref());
    let result = run_action(&server, &method, ip, query, &body).await;
    server
        .http_metrics()
        .record(RouteGroup::Admin, start.elapsed());
    result
}

async fn run_action(
    server: &Server,
    method: &Method,
    ip: String,
    query: Result<Query<AdminQuery>, QueryRejection>,
    body: &Bytes,
) -> Result<Response, ApiError> {
    let query = query_params(query)?;
    let body = json_body(body)?;
    let action = query
        .action
        .clone()
        .or_else(|| body.get("action").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_default();
    let action: AdminAction = action
        .parse()
        .map_err(|err: &str| ApiError::BadRequest(err.to_string()))?;
    if action.requires_post() && *method != Method::POST {
        return Err(ApiError::MethodNotAllowed);
    }

    let db = server.admin();
    let page = PageQuery {
        page: query.page,
        limit: query.limit,
    };
    let response = match action {
        AdminAction::GetStats => ok(blocking(move || db.stats()).await?),
        AdminAction::GetUsers => Json(blocking(move || db.users(&page)).await?).into_response(),
        AdminAction::GetUserDetails => {
            let user_id = query.user_id;
            ok(blocking(move || db.user_details(user_id)).await?)
        }
        AdminAction::GetVipStats => ok(blocking(move || db.vip_stats()).await?),
        AdminAction::GetTransactions => {
            let (kind, status) = (query.kind, query.status);
            Json(
                blocking(move || db.transactions(&page, kind.as_deref(), status.as_deref()))
                    .await?,
            )
            .into_response()
        }
        AdminAction::GetGameStats => ok(blocking(move || db.game_stats()).await?),
        AdminAction::UpdateUserStatus => {
            let request: UpdateUserStatusRequest = decode(&body)?;
            blocking(move || db.update_user_status(request.user_id, request.status_flag()))
                .await?;
            Json(MessageResponse::new("User status updated successfully")).into_response()
        }
        AdminAction::AddUserBalance => {
            let request: AddBalanceRequest = decode(&body)?;
            let user_id = request.user_id.unwrap_or_default();
            let balance = blocking(move || db.add_user_balance(&request)).await?;
            Json(MessageWithData::new(
                "Balance added successfully",
                BalanceUpdate { user_id, balance },
            ))
            .into_response()
        }
        AdminAction::ResetAllBalances => {
            let affected = blocking(move || db.reset_all_balances(&ip)).await?;
            let mut message =
                MessageResponse::new(format!("Successfully reset {affected} user balances to $0.00"));
            message.affected_users = Some(affected);
            Json(message).into_response()
        }
        AdminAction::GetUserActivity => {
            let user_id = query.user_id;
            let limit = query.limit.unwrap_or(DEFAULT_ACTIVITY_LIMIT);
            ok(blocking(move || db.user_activity(user_id, limit)).await?)
        }
        AdminAction::SearchUsers => {
            let q = query.q;
            let limit = query.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
            ok(blocking(move || db.search_users(q.as_deref(), limit)).await?)
        }
    };
    Ok(response)
}

pub(super) async fn register(
    AxumState(server): AxumState<Arc<Server>>,
    headers: HeaderMap,
    connect: Option<ConnectInfo<SocketAddr>>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let start = Instant::now();
    let ip = client_ip(&headers, connect.as_ref());
    let result = async {
        let request: RegistrationRequest = decode(&json_body(&body)?)?;
        let db = server.admin();
        let user = blocking(move || db.register_user(&request, &ip)).await?;
        let response = MessageWithData::new("User registered successfully", user);
        Ok::<_, ApiError>(Json(response).into_response())
    }
    .await;
    server
        .http_metrics()
        .record(RouteGroup::Registration, start.elapsed());
    result
}

/// Serves a rendered report or export as a download.
fn download(rendered: Rendered) -> Response {
    let disposition = format!("attachment; filename=\"{}\"", rendered.filename);
    let mut response = (
        StatusCode::OK,
        [(header::CONTENT_TYPE, rendered.content_type)],
        rendered.body,
    )
        .into_response();
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        response
            .headers_mut()
            .insert(header::CONTENT_DISPOSITION, value);
    }
    response
}

async fn timed_tool<F>(server: &Server, work: F) -> Result<Response, ApiError>
where
    F: std::future::Future<Output = Result<Response, ApiError>>,
{
    let start = Instant::now();
    let result = work.await;
    server
        .http_metrics()
        .record(RouteGroup::Tools, start.elapsed());
    result
}

/// JSON unless the request names another format.
fn output_format(format: Option<&str>) -> Result<OutputFormat, ApiError> {
    format
        .map(str::parse::<OutputFormat>)
        .transpose()
        .map_err(|err: &str| ApiError::BadRequest(err.to_string()))
        .map(Option::unwrap_or_default)
}

pub(super) async fn report(
    AxumState(server): AxumState<Arc<Server>>,
    body: Bytes,
) -> Result<Response, ApiError> {
    timed_tool(&server, async {
        let request: ReportRequest = decode(&json_body(&body)?)?;
        let kind: ReportKind = request
            .kind
            .as_deref()
            .unwrap_or("user")
            .parse()
            .map_err(|err: &str| ApiError::BadRequest(err.to_string()))?;
        let format = output_format(request.format.as_deref())?;
        let db = server.admin();
        let rendered = blocking(move || {
            db.report(kind, request.date_from.as_deref(), request.date_to.as_deref())?
                .render(format)
        })
        .await?;
        Ok::<_, ApiError>(download(rendered))
    })
    .await
}

pub(super) async fn export(
    AxumState(server): AxumState<Arc<Server>>,
    body: Bytes,
) -> Result<Response, ApiError> {
    timed_tool(&server, async {
        let request: ExportRequest = decode(&json_body(&body)?)?;
        let kind: ExportKind = request
            .kind
            .as_deref()
            .unwrap_or("all")
            .parse()
            .map_err(|err: &str| ApiError::BadRequest(err.to_string()))?;
        let format = output_format(request.format.as_deref())?;
        let db = server.admin();
        let rendered = blocking(move || db.export(kind)?.render(format)).await?;
        Ok::<_, ApiError>(download(rendered))
    })
    .await
}

pub(super) async fn backup(AxumState(server): AxumState<Arc<Server>>) -> Result<Response, ApiError> {
    timed_tool(&server, async {
        let db = server.admin();
        let dir = server.config().backup_dir.clone();
        let summary = blocking(move || db.backup(&dir)).await?;
        Ok::<_, ApiError>(Json(MessageWithData::new(
            "Database backup created successfully",
            summary,
        ))
        .into_response())
    })
    .await
}

pub(super) async fn repair(AxumState(server): AxumState<Arc<Server>>) -> Result<Response, ApiError> {
    timed_tool(&server, async {
        let db = server.admin();
        let summary = blocking(move || db.repair_wallets()).await?;
        let response = MessageWithData::new("Wallet repair completed", summary);
        Ok::<_, ApiError>(Json(response).into_response())
    })
    .await
}

pub(super) async fn activity_logs(
    AxumState(server): AxumState<Arc<Server>>,
    query: Result<Query<ActivityLogQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    timed_tool(&server, async {
        let query = query_params(query)?;
        let db = server.admin();
        let page = blocking(move || db.activity_logs(&query)).await?;
        Ok::<_, ApiError>(Json(page).into_response())
    })
    .await
}
