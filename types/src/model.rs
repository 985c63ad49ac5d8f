//! Records exchanged by the admin API and stored in the key/value documents.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Name of the VIP level every new account starts at.
pub const STARTING_VIP_LEVEL: &str = "Bronze";

/// Id of the starting VIP level row.
pub const STARTING_VIP_LEVEL_ID: i64 = 1;

/// Loose email shape check: one `@`, a non-empty local part and a dotted domain.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !email.chars().any(char::is_whitespace)
        && domain.contains('.')
        && domain.split('.').all(|part| !part.is_empty() && !part.contains('@'))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    Bet,
    Win,
    Bonus,
    Refund,
    Transfer,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Withdrawal => "withdrawal",
            Self::Bet => "bet",
            Self::Win => "win",
            Self::Bonus => "bonus",
            Self::Refund => "refund",
            Self::Transfer => "transfer",
        }
    }
}

impl std::str::FromStr for TransactionType {
    type Err = &'static str;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "deposit" => Ok(Self::Deposit),
            "withdrawal" => Ok(Self::Withdrawal),
            "bet" => Ok(Self::Bet),
            "win" => Ok(Self::Win),
            "bonus" => Ok(Self::Bonus),
            "refund" => Ok(Self::Refund),
            "transfer" => Ok(Self::Transfer),
            _ => Err("unknown transaction type"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for TransactionStatus {
    type Err = &'static str;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err("unknown transaction status"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_verified: bool,
    pub is_active: bool,
    pub created_at: String,
    pub last_login: Option<String>,
}

/// Row returned by user listings and search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    #[serde(flatten)]
    pub user: User,
    pub total_points: Option<i64>,
    pub vip_level: Option<String>,
    pub balance: Option<f64>,
    pub bonus_balance: Option<f64>,
    pub total_deposited: Option<f64>,
    pub total_withdrawn: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserDetails {
    #[serde(flatten)]
    pub user: User,
    pub total_points: Option<i64>,
    pub lifetime_wagered: Option<f64>,
    pub lifetime_won: Option<f64>,
    pub lifetime_lost: Option<f64>,
    pub vip_level: Option<String>,
    pub cashback_percentage: Option<f64>,
    pub bonus_multiplier: Option<f64>,
    pub balance: Option<f64>,
    pub bonus_balance: Option<f64>,
    pub locked_balance: Option<f64>,
    pub total_deposited: Option<f64>,
    pub total_withdrawn: Option<f64>,
    pub recent_transactions: Vec<Transaction>,
    pub game_stats: Vec<UserGameStats>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub user_id: i64,
    pub transaction_type: TransactionType,
    pub amount: f64,
    pub balance_before: Option<f64>,
    pub balance_after: Option<f64>,
    pub status: TransactionStatus,
    pub description: Option<String>,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VipLevel {
    pub id: i64,
    pub level_name: String,
    pub min_points_required: i64,
    pub cashback_percentage: f64,
    pub bonus_multiplier: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VipLevelStats {
    pub level_name: String,
    pub min_points_required: i64,
    pub cashback_percentage: f64,
    pub user_count: i64,
    pub avg_points: Option<f64>,
    pub total_wagered: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameStats {
    pub game_type: String,
    pub total_sessions: i64,
    pub unique_players: i64,
    pub total_wagered: f64,
    pub total_won: f64,
    pub total_lost: f64,
    pub avg_wagered: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserGameStats {
    pub game_type: String,
    pub games_played: i64,
    pub total_wagered: f64,
    pub total_won: f64,
    pub total_lost: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActivityLog {
    pub id: i64,
    pub user_id: Option<i64>,
    pub activity_type: String,
    pub description: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityTypeCount {
    pub activity_type: String,
    pub count: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_users: i64,
    pub vip_users: i64,
    pub total_deposits: i64,
    pub total_deposits_amount: f64,
    pub total_withdrawals: i64,
    pub total_withdrawals_amount: f64,
    pub pending_requests: i64,
    pub today_new_users: i64,
}

/// User record kept in the `demo_users` document.
///
/// The demo stores passwords as given; the document is not an auth store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DemoUser {
    #[serde(deserialize_with = "loose_id")]
    pub id: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub username: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub first_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub last_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_verified: bool,
    #[serde(default = "default_true", deserialize_with = "null_as_true")]
    pub is_active: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: String,
    #[serde(default)]
    pub last_login: Option<String>,
}

fn default_true() -> bool {
    true
}

fn null_as_true<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(true))
}

/// Reads `null` as the type's default; documents written by the browser
/// leave unset fields as `null`.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Ids are numbers, or numeric strings when a form field wrote them.
fn loose_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Number(u64),
        Text(String),
    }

    match Id::deserialize(deserializer)? {
        Id::Number(id) => Ok(id),
        Id::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid id: {text:?}"))),
    }
}

/// Wallet entry in the `demo_wallets` document (keyed by user id).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DemoWallet {
    #[serde(default, deserialize_with = "null_as_default")]
    pub balance: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub bonus_balance: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub locked_balance: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_deposited: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_withdrawn: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub updated_at: String,
}

impl DemoWallet {
    pub fn empty(now: &str) -> Self {
        Self {
            updated_at: now.to_string(),
            ..Self::default()
        }
    }
}

/// Transaction entry in the `demo_transactions` document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DemoTransaction {
    #[serde(deserialize_with = "loose_id")]
    pub id: u64,
    #[serde(deserialize_with = "loose_id")]
    pub user_id: u64,
    pub transaction_type: TransactionType,
    pub amount: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub balance_before: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub balance_after: f64,
    pub status: TransactionStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: String,
}

/// Cross-tab balance change notice written next to `balance:<username>`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BalanceSync {
    pub username: String,
    pub balance: f64,
    pub ts: u64,
}

/// One player action in the game action history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    #[serde(deserialize_with = "loose_id")]
    pub id: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub game: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub action: String,
    #[serde(default)]
    pub details: Value,
    #[serde(default, deserialize_with = "null_as_default")]
    pub timestamp: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub username: String,
}
