//! Pending action repository for `SQLite` persistence.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::models::pending::{ActionKind, ActionStatus, BatchLineItem, PendingAction};
use crate::{AppError, Result};

use super::db::Database;
use super::{parse_timestamp, timestamp_str, PendingActionStore, StoreFuture};

/// Repository wrapper around `SQLite` for pending action records.
#[derive(Clone)]
pub struct SqlitePendingStore {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct PendingRow {
    token: String,
    sku: String,
    kind: String,
    vendor: String,
    quantity: i64,
    total_cost: f64,
    rationale: String,
    external_ref: Option<String>,
    items: String,
    created_at: String,
    expires_at: String,
    status: String,
    attempts: i64,
}

impl PendingRow {
    /// Convert a database row into the domain model.
    fn into_action(self) -> Result<PendingAction> {
        let kind = ActionKind::parse(&self.kind)
            .ok_or_else(|| AppError::Db(format!("invalid kind: {}", self.kind)))?;
        let status = ActionStatus::parse(&self.status)
            .ok_or_else(|| AppError::Db(format!("invalid status: {}", self.status)))?;
        let items: Vec<BatchLineItem> = serde_json::from_str(&self.items)
            .map_err(|e| AppError::Db(format!("invalid items: {e}")))?;
        let quantity = u64::try_from(self.quantity)
            .map_err(|_| AppError::Db(format!("invalid quantity: {}", self.quantity)))?;
        let attempts = u32::try_from(self.attempts)
            .map_err(|_| AppError::Db(format!("invalid attempts: {}", self.attempts)))?;

        Ok(PendingAction {
            token: self.token,
            sku: self.sku,
            kind,
            vendor: self.vendor,
            quantity,
            total_cost: self.total_cost,
            rationale: self.rationale,
            external_ref: self.external_ref,
            items,
            created_at: parse_timestamp("created_at", &self.created_at)?,
            expires_at: parse_timestamp("expires_at", &self.expires_at)?,
            status,
            attempts,
        })
    }
}

impl SqlitePendingStore {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    async fn insert(&self, action: &PendingAction) -> Result<()> {
        let quantity = i64::try_from(action.quantity)
            .map_err(|_| AppError::Input(format!("quantity out of range: {}", action.quantity)))?;
        let items = serde_json::to_string(&action.items)?;

        sqlx::query(
            "INSERT OR REPLACE INTO pending_action (token, sku, kind, vendor, quantity,
             total_cost, rationale, external_ref, items, created_at, expires_at, status, attempts)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        )
        .bind(&action.token)
        .bind(&action.sku)
        .bind(action.kind.as_str())
        .bind(&action.vendor)
        .bind(quantity)
        .bind(action.total_cost)
        .bind(&action.rationale)
        .bind(&action.external_ref)
        .bind(&items)
        .bind(timestamp_str(action.created_at))
        .bind(timestamp_str(action.expires_at))
        .bind(action.status.as_str())
        .bind(i64::from(action.attempts))
        .execute(self.db.as_ref())
        .await?;

        Ok(())
    }
}

impl PendingActionStore for SqlitePendingStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    fn store(
        &self,
        action: PendingAction,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> StoreFuture<'_, PendingAction> {
        Box::pin(async move {
            let stored = PendingAction {
                created_at: now,
                expires_at: now + ttl,
                status: ActionStatus::Pending,
                attempts: 0,
                ..action
            };
            self.insert(&stored).await?;
            Ok(stored)
        })
    }

    fn fetch_active(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> StoreFuture<'_, Option<PendingAction>> {
        let token = token.to_owned();
        Box::pin(async move {
            let row: Option<PendingRow> = sqlx::query_as(
                "SELECT * FROM pending_action
                 WHERE token = ?1 AND status = 'pending' AND expires_at > ?2",
            )
            .bind(&token)
            .bind(timestamp_str(now))
            .fetch_optional(self.db.as_ref())
            .await?;

            row.map(PendingRow::into_action).transpose()
        })
    }

    fn transition(&self, token: &str, status: ActionStatus) -> StoreFuture<'_, ()> {
        let token = token.to_owned();
        Box::pin(async move {
            sqlx::query("UPDATE pending_action SET status = ?1 WHERE token = ?2")
                .bind(status.as_str())
                .bind(&token)
                .execute(self.db.as_ref())
                .await?;
            Ok(())
        })
    }

    fn claim(&self, token: &str, now: DateTime<Utc>) -> StoreFuture<'_, Option<PendingAction>> {
        let token = token.to_owned();
        Box::pin(async move {
            let row: Option<PendingRow> = sqlx::query_as(
                "UPDATE pending_action SET status = 'in_progress', attempts = attempts + 1
                 WHERE token = ?1 AND status = 'pending' AND expires_at > ?2
                 RETURNING *",
            )
            .bind(&token)
            .bind(timestamp_str(now))
            .fetch_optional(self.db.as_ref())
            .await?;

            row.map(PendingRow::into_action).transpose()
        })
    }

    fn release(&self, token: &str, max_attempts: u32) -> StoreFuture<'_, ActionStatus> {
        let token = token.to_owned();
        Box::pin(async move {
            let row: Option<(String,)> = sqlx::query_as(
                "UPDATE pending_action
                 SET status = CASE WHEN attempts >= ?2 THEN 'failed' ELSE 'pending' END
                 WHERE token = ?1 AND status = 'in_progress'
                 RETURNING status",
            )
            .bind(&token)
            .bind(i64::from(max_attempts))
            .fetch_optional(self.db.as_ref())
            .await?;

            let (status,) =
                row.ok_or_else(|| AppError::NotFound(format!("no claimed action {token}")))?;
            ActionStatus::parse(&status)
                .ok_or_else(|| AppError::Db(format!("invalid status: {status}")))
        })
    }

    fn lookup(&self, token: &str) -> StoreFuture<'_, Option<PendingAction>> {
        let token = token.to_owned();
        Box::pin(async move {
            let row: Option<PendingRow> =
                sqlx::query_as("SELECT * FROM pending_action WHERE token = ?1")
                    .bind(&token)
                    .fetch_optional(self.db.as_ref())
                    .await?;

            row.map(PendingRow::into_action).transpose()
        })
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> StoreFuture<'_, u64> {
        Box::pin(async move {
            let result = sqlx::query("DELETE FROM pending_action WHERE expires_at <= ?1")
                .bind(timestamp_str(now))
                .execute(self.db.as_ref())
                .await?;
            Ok(result.rows_affected())
        })
    }
}
