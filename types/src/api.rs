use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default page size for paged admin listings.
pub const DEFAULT_PAGE_LIMIT: u32 = 20;

/// Upper bound on page size for paged admin listings.
pub const MAX_PAGE_LIMIT: u32 = 200;

/// Standard response envelope: `{success, data}` or `{success, error}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn into_result(self) -> Result<Option<T>, String> {
        if self.success {
            Ok(self.data)
        } else {
            Err(self
                .error
                .unwrap_or_else(|| "request failed".to_string()))
        }
    }
}

impl ApiResponse<()> {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Paged listing envelope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PagedResponse<T> {
    pub success: bool,
    pub data: Vec<T>,
    pub pagination: Pagination,
}

impl<T> PagedResponse<T> {
    pub fn new(data: Vec<T>, pagination: Pagination) -> Self {
        Self {
            success: true,
            data,
            pagination,
        }
    }
}

/// Response for mutations that report a message instead of data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affected_users: Option<u64>,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            affected_users: None,
        }
    }
}

/// Mutation response carrying a message and a payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageWithData<T> {
    pub success: bool,
    pub message: String,
    pub data: T,
}

impl<T> MessageWithData<T> {
    pub fn new(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub pages: u64,
}

impl Pagination {
    pub fn new(page: u32, limit: u32, total: u64) -> Self {
        let limit = limit.max(1);
        Self {
            page,
            limit,
            total,
            pages: total.div_ceil(u64::from(limit)),
        }
    }

    /// Same as [`Pagination::new`] but never reports fewer than one page.
    pub fn at_least_one_page(page: u32, limit: u32, total: u64) -> Self {
        let mut pagination = Self::new(page, limit, total);
        pagination.pages = pagination.pages.max(1);
        pagination
    }
}

/// Raw `page`/`limit` query parameters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageQuery {
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: Some(page),
            limit: Some(limit),
        }
    }

    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> u32 {
        self.limit_or(DEFAULT_PAGE_LIMIT)
    }

    pub fn limit_or(&self, default: u32) -> u32 {
        self.limit.unwrap_or(default).clamp(1, MAX_PAGE_LIMIT)
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page() - 1) * u64::from(self.limit())
    }
}

/// Actions understood by the key/value storage API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageAction {
    Get,
    Set,
    GetAll,
    SetBatch,
    List,
}

impl StorageAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Set => "set",
            Self::GetAll => "get_all",
            Self::SetBatch => "set_batch",
            Self::List => "list",
        }
    }
}

impl std::str::FromStr for StorageAction {
    type Err = &'static str;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "get" => Ok(Self::Get),
            "set" => Ok(Self::Set),
            "get_all" => Ok(Self::GetAll),
            "set_batch" => Ok(Self::SetBatch),
            "list" => Ok(Self::List),
            _ => Err("Unknown action"),
        }
    }
}

impl std::fmt::Display for StorageAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JSON body accepted by the storage API on POST.
///
/// A JSON `null` in `value` deserializes as `None` and is treated as missing.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Value>,
}

/// Health probe payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub writable: bool,
    pub time: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pagination_rounds_pages_up() {
        let pagination = Pagination::new(1, 20, 41);
        assert_eq!(pagination.pages, 3);
        assert_eq!(Pagination::new(1, 20, 40).pages, 2);
        assert_eq!(Pagination::new(1, 20, 0).pages, 0);
        assert_eq!(Pagination::at_least_one_page(1, 20, 0).pages, 1);
    }

    #[test]
    fn page_query_clamps_values() {
        let query = PageQuery {
            page: Some(0),
            limit: Some(10_000),
        };
        assert_eq!(query.page(), 1);
        assert_eq!(query.limit(), MAX_PAGE_LIMIT);
        assert_eq!(query.offset(), 0);

        let query = PageQuery::new(3, 25);
        assert_eq!(query.offset(), 50);
        assert_eq!(PageQuery::default().limit_or(50), 50);
    }

    #[test]
    fn storage_action_parses_known_values() {
        for action in [
            StorageAction::Get,
            StorageAction::Set,
            StorageAction::GetAll,
            StorageAction::SetBatch,
            StorageAction::List,
        ] {
            assert_eq!(action.as_str().parse::<StorageAction>(), Ok(action));
        }
        assert_eq!("delete".parse::<StorageAction>(), Err("Unknown action"));
        assert!("GET".parse::<StorageAction>().is_err());
    }

    #[test]
    fn envelope_shapes_match_wire_format() {
        let ok = serde_json::to_value(ApiResponse::ok(json!(null))).unwrap();
        assert_eq!(ok, json!({ "success": true, "data": null }));

        let err = serde_json::to_value(ApiResponse::error("Key not allowed")).unwrap();
        assert_eq!(err, json!({ "success": false, "error": "Key not allowed" }));

        let decoded: ApiResponse<Value> =
            serde_json::from_value(json!({ "success": false, "error": "nope" })).unwrap();
        assert_eq!(decoded.into_result(), Err("nope".to_string()));
    }

    #[test]
    fn null_value_reads_as_missing() {
        let request: StorageRequest =
            serde_json::from_value(json!({ "key": "demo_users", "value": null })).unwrap();
        assert_eq!(request.value, None);
        let request: StorageRequest =
            serde_json::from_value(json!({ "key": "demo_users", "value": false })).unwrap();
        assert_eq!(request.value, Some(json!(false)));
    }
}
