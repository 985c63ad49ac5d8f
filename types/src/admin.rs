//! Request and response bodies of the admin API.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Actions dispatched by the admin endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminAction {
    GetStats,
    GetUsers,
    GetUserDetails,
    GetVipStats,
    GetTransactions,
    GetGameStats,
    UpdateUserStatus,
    AddUserBalance,
    ResetAllBalances,
    GetUserActivity,
    SearchUsers,
}

impl AdminAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GetStats => "get_stats",
            Self::GetUsers => "get_users",
            Self::GetUserDetails => "get_user_details",
            Self::GetVipStats => "get_vip_stats",
            Self::GetTransactions => "get_transactions",
            Self::GetGameStats => "get_game_stats",
            Self::UpdateUserStatus => "update_user_status",
            Self::AddUserBalance => "add_user_balance",
            Self::ResetAllBalances => "reset_all_balances",
            Self::GetUserActivity => "get_user_activity",
            Self::SearchUsers => "search_users",
        }
    }

    /// Mutating actions only accept POST.
    pub fn requires_post(&self) -> bool {
        matches!(
            self,
            Self::UpdateUserStatus | Self::AddUserBalance | Self::ResetAllBalances
        )
    }
}

impl std::str::FromStr for AdminAction {
    type Err = &'static str;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "get_stats" => Ok(Self::GetStats),
            "get_users" => Ok(Self::GetUsers),
            "get_user_details" => Ok(Self::GetUserDetails),
            "get_vip_stats" => Ok(Self::GetVipStats),
            "get_transactions" => Ok(Self::GetTransactions),
            "get_game_stats" => Ok(Self::GetGameStats),
            "update_user_status" => Ok(Self::UpdateUserStatus),
            "add_user_balance" => Ok(Self::AddUserBalance),
            "reset_all_balances" => Ok(Self::ResetAllBalances),
            "get_user_activity" => Ok(Self::GetUserActivity),
            "search_users" => Ok(Self::SearchUsers),
            _ => Err("Invalid action"),
        }
    }
}

/// Query string of the admin endpoint. Unused fields are ignored per action.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AdminQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
}

/// Body of `update_user_status`.
///
/// `status` accepts booleans, numbers and the strings `"true"`/`"false"`/`"1"`/`"0"`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateUserStatusRequest {
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub status: Option<Value>,
}

impl UpdateUserStatusRequest {
    pub fn status_flag(&self) -> Option<bool> {
        self.status.as_ref().and_then(parse_flag)
    }
}

/// Body of `add_user_balance`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AddBalanceRequest {
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Wallet state after `add_user_balance`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BalanceUpdate {
    pub user_id: i64,
    pub balance: f64,
}

/// Body of the registration endpoint. Missing fields are reported by name.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistrationRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegisteredUser {
    pub user_id: i64,
    pub username: String,
    pub email: String,
    pub balance: f64,
    pub vip_level: String,
    pub points: i64,
}

/// Filters of the activity log viewer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityLogQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub activity_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_to: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActivityLogStats {
    pub total_logs: u64,
    pub type_distribution: Vec<crate::model::ActivityTypeCount>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActivityLogPage {
    pub success: bool,
    pub data: Vec<crate::model::ActivityLog>,
    pub pagination: crate::api::Pagination,
    pub stats: ActivityLogStats,
}

/// Outcome of the wallet repair pass.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairSummary {
    pub balances_reset: u64,
    pub wallets_created: u64,
    pub vip_records_created: u64,
}

/// Outcome of seeding demo rows.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedSummary {
    pub admin_created: bool,
    pub demo_user_created: bool,
    pub transactions_created: u64,
    pub game_sessions_created: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupSummary {
    pub file: String,
    pub size_bytes: u64,
    pub timestamp: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    User,
    Vip,
    Financial,
    Game,
}

impl ReportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Vip => "vip",
            Self::Financial => "financial",
            Self::Game => "game",
        }
    }
}

impl std::str::FromStr for ReportKind {
    type Err = &'static str;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(Self::User),
            "vip" => Ok(Self::Vip),
            "financial" => Ok(Self::Financial),
            "game" => Ok(Self::Game),
            _ => Err("Invalid report type"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportKind {
    Users,
    Transactions,
    VipStats,
    GameSessions,
    All,
}

impl ExportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Transactions => "transactions",
            Self::VipStats => "vip_stats",
            Self::GameSessions => "game_sessions",
            Self::All => "all",
        }
    }
}

impl std::str::FromStr for ExportKind {
    type Err = &'static str;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "users" => Ok(Self::Users),
            "transactions" => Ok(Self::Transactions),
            "vip_stats" => Ok(Self::VipStats),
            "game_sessions" => Ok(Self::GameSessions),
            "all" => Ok(Self::All),
            _ => Err("Invalid export type"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = &'static str;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            _ => Err("Invalid format"),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportRequest {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_to: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportRequest {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

/// Interprets a loosely typed flag the way form posts send it.
pub fn parse_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::Number(number) => number.as_f64().map(|n| n != 0.0),
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "active" => Some(true),
            "0" | "false" | "no" | "inactive" | "banned" => Some(false),
            _ => None,
        },
        _ => None,
    }
}
