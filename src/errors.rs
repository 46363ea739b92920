//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Persistence failure when interacting with `SQLite`.
    Db(String),
    /// File-system or I/O operation failure.
    Io(String),
    /// Caller supplied malformed input (empty vendor list, bad SKU record).
    Input(String),
    /// Requested entity does not exist, has expired, or was already resolved.
    NotFound(String),
    /// Caller presented an invalid shared secret.
    Unauthorized(String),
    /// An external collaborator (supplier, pages, sheet, notifier) failed.
    Downstream(String),
    /// An external collaborator did not answer within its time budget.
    Timeout(String),
    /// The recompute outbox could not be written or read.
    Outbox(String),
}

impl AppError {
    /// HTTP-equivalent status code for this error when surfaced by a
    /// callback endpoint.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Input(_) => 400,
            Self::Unauthorized(_) => 403,
            Self::NotFound(_) => 404,
            Self::Config(_)
            | Self::Db(_)
            | Self::Io(_)
            | Self::Downstream(_)
            | Self::Timeout(_)
            | Self::Outbox(_) => 500,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Db(msg) => write!(f, "db: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
            Self::Input(msg) => write!(f, "input: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::Unauthorized(msg) => write!(f, "unauthorized: {msg}"),
            Self::Downstream(msg) => write!(f, "downstream: {msg}"),
            Self::Timeout(msg) => write!(f, "timeout: {msg}"),
            Self::Outbox(msg) => write!(f, "outbox: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Db(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Io(format!("json: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
