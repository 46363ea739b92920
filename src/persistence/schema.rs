//! `SQLite` schema bootstrap logic.
//!
//! Table definitions use `CREATE TABLE IF NOT EXISTS` and are re-run on
//! every startup.

use sqlx::SqlitePool;

use crate::Result;

/// Apply all table definitions to the connected `SQLite` database.
///
/// # Errors
///
/// Returns `AppError::Db` if any DDL statement fails.
pub async fn bootstrap_schema(pool: &SqlitePool) -> Result<()> {
    let ddl = r"
CREATE TABLE IF NOT EXISTS pending_action (
    token           TEXT PRIMARY KEY NOT NULL,
    sku             TEXT NOT NULL,
    kind            TEXT NOT NULL CHECK(kind IN ('single_reorder','batch_reorder')),
    vendor          TEXT NOT NULL,
    quantity        INTEGER NOT NULL,
    total_cost      REAL NOT NULL,
    rationale       TEXT NOT NULL,
    external_ref    TEXT,
    items           TEXT NOT NULL DEFAULT '[]',
    created_at      TEXT NOT NULL,
    expires_at      TEXT NOT NULL,
    status          TEXT NOT NULL CHECK(status IN ('pending','in_progress','approved','rejected','failed')),
    attempts        INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_pending_expires ON pending_action(expires_at);
CREATE INDEX IF NOT EXISTS idx_pending_status ON pending_action(status);
";

    sqlx::raw_sql(ddl).execute(pool).await?;
    Ok(())
}
