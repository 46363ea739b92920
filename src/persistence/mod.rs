//! Persistence layer for pending approval actions.
//!
//! [`PendingActionStore`] is implemented by the `SQLite` repository and by a
//! JSON document fallback used when the database cannot be opened.

pub mod db;
pub mod json_store;
pub mod pending_repo;
pub mod schema;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use tracing::{info, info_span, warn, Instrument};

use crate::models::pending::{ActionStatus, PendingAction};
use crate::{AppError, GlobalConfig, Result};

pub use json_store::JsonPendingStore;
pub use pending_repo::SqlitePendingStore;

/// Boxed future returned by store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Durable, token-addressed storage for pending actions.
///
/// Expiry is evaluated lazily against the `now` supplied by the caller;
/// nothing is purged unless [`purge_expired`](Self::purge_expired) is called.
pub trait PendingActionStore: Send + Sync {
    /// Short backend name for logs.
    fn backend(&self) -> &'static str;

    /// Insert or replace `action` under its token.
    ///
    /// Overwrites `created_at = now`, `expires_at = now + ttl`,
    /// `status = pending` and `attempts = 0`, and returns the stored record.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` or `AppError::Io` if the write fails.
    fn store(
        &self,
        action: PendingAction,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> StoreFuture<'_, PendingAction>;

    /// Fetch the action only while it is pending and `expires_at > now`.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the read fails.
    fn fetch_active(&self, token: &str, now: DateTime<Utc>)
        -> StoreFuture<'_, Option<PendingAction>>;

    /// Set the status without any existence or state check.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the write fails.
    fn transition(&self, token: &str, status: ActionStatus) -> StoreFuture<'_, ()>;

    /// Atomically move an active action from `pending` to `in_progress`.
    ///
    /// Increments `attempts`. Returns `None` when the action is missing,
    /// expired or already claimed.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the write fails.
    fn claim(&self, token: &str, now: DateTime<Utc>) -> StoreFuture<'_, Option<PendingAction>>;

    /// Hand a claimed action back after a failed side effect.
    ///
    /// The action returns to `pending` while `attempts < max_attempts`,
    /// otherwise it becomes `failed`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the action is not `in_progress`.
    fn release(&self, token: &str, max_attempts: u32) -> StoreFuture<'_, ActionStatus>;

    /// Raw read regardless of status or expiry.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the read fails.
    fn lookup(&self, token: &str) -> StoreFuture<'_, Option<PendingAction>>;

    /// Delete every action whose `expires_at <= now`. Returns the count removed.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the delete fails.
    fn purge_expired(&self, now: DateTime<Utc>) -> StoreFuture<'_, u64>;
}

/// Open the configured store, falling back to the JSON document.
///
/// # Errors
///
/// Returns `AppError::Io` if neither backend can be opened.
pub async fn open_store(config: &GlobalConfig) -> Result<Arc<dyn PendingActionStore>> {
    let db_path = config.db_path();
    let span = info_span!("open_store", path = %db_path.display());

    async {
        match db::connect(&db_path).await {
            Ok(pool) => {
                info!("pending action store: sqlite");
                Ok(Arc::new(SqlitePendingStore::new(Arc::new(pool))) as Arc<dyn PendingActionStore>)
            }
            Err(err) => {
                let fallback = config.json_fallback_path();
                warn!(%err, fallback = %fallback.display(), "sqlite unavailable, using json store");
                let store = JsonPendingStore::open(&fallback)?;
                Ok(Arc::new(store) as Arc<dyn PendingActionStore>)
            }
        }
    }
    .instrument(span)
    .await
}

/// Fixed-width RFC 3339 encoding; lexical order equals chronological order.
pub(crate) fn timestamp_str(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(crate) fn parse_timestamp(field: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::Db(format!("invalid {field}: {e}")))
}

/// Status a released action moves to.
pub(crate) fn released_status(attempts: u32, max_attempts: u32) -> ActionStatus {
    if attempts >= max_attempts {
        ActionStatus::Failed
    } else {
        ActionStatus::Pending
    }
}
