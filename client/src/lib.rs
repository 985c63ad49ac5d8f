pub mod accounts;
pub mod client;
pub mod demo;
pub mod history;
pub mod local;
pub mod sync;

pub use client::Client;
pub use client::RetryPolicy;
pub use demo::LocalAdminDatabase;
pub use local::LocalStore;
pub use sync::{SyncConfig, SyncMirror, SyncReport};
use thiserror::Error;

/// Error type for client operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("failed: {0}")]
    Failed(reqwest::StatusCode),
    #[error("failed: {status}: {body}")]
    FailedWithBody {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("api error ({status}): {message}")]
    Api {
        status: reqwest::StatusCode,
        message: String,
    },
    #[error("unexpected response")]
    UnexpectedResponse,
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),
    #[error("invalid URL scheme: {0} (expected http or https)")]
    InvalidScheme(String),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed local document {key}: {source}")]
    MalformedDocument {
        key: String,
        source: serde_json::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Please enter a valid email address")]
    InvalidEmail,
    #[error("Username already taken. Please choose another.")]
    UsernameTaken,
    #[error("Email already in use. Please use a different email.")]
    EmailTaken,
    #[error("Wrong credentials. Please check your username/email and password.")]
    WrongCredentials,
    #[error("Your account is banned. Please contact support.")]
    Banned,
    #[error("Username required")]
    UsernameRequired,
    #[error("User not found")]
    UserNotFound,
    #[error("Amount must be greater than 0")]
    InvalidAmount,
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Current time as an RFC 3339 timestamp with millisecond precision.
pub(crate) fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
