//! Inventory source backed by a JSON snapshot file.
//!
//! A file-backed source re-reads the file on every fetch, so a long-running
//! server picks up a refreshed snapshot on its next cycle without a restart.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Days, NaiveDate, Utc};
use serde::Deserialize;
use tracing::{debug, info};

use super::{CallFuture, InventorySource};
use crate::models::inventory::{InventoryItem, Transaction};
use crate::models::vendor::Vendor;
use crate::{AppError, Result};

/// On-disk snapshot layout. Unknown fields are rejected.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Snapshot {
    /// Reference date for the transaction window; defaults to today.
    #[serde(default)]
    pub as_of: Option<NaiveDate>,
    /// Stock records.
    #[serde(default)]
    pub inventory: Vec<InventoryItem>,
    /// Stock movements.
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    /// Vendor catalog.
    #[serde(default)]
    pub vendors: Vec<Vendor>,
}

/// Serves a [`Snapshot`], either held in memory or read from a file.
#[derive(Debug, Clone)]
pub struct SnapshotSource {
    origin: Origin,
}

#[derive(Debug, Clone)]
enum Origin {
    Fixed(Snapshot),
    File(PathBuf),
}

impl Default for SnapshotSource {
    fn default() -> Self {
        Self::new(Snapshot::default())
    }
}

impl SnapshotSource {
    /// Wrap an in-memory snapshot.
    #[must_use]
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            origin: Origin::Fixed(snapshot),
        }
    }

    /// Source with no records.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Validate the snapshot at `path` and serve it, re-reading on each fetch.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or does not
    /// match the snapshot layout.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("failed to read snapshot {}: {e}", path.display()))
        })?;
        let snapshot = parse(path, &raw).map_err(AppError::Config)?;
        info!(
            path = %path.display(),
            items = snapshot.inventory.len(),
            transactions = snapshot.transactions.len(),
            vendors = snapshot.vendors.len(),
            "inventory snapshot loaded"
        );
        Ok(Self {
            origin: Origin::File(path.to_path_buf()),
        })
    }

    /// The snapshot as it stands now.
    async fn current(&self) -> Result<Snapshot> {
        match self.origin {
            Origin::Fixed(ref snapshot) => Ok(snapshot.clone()),
            Origin::File(ref path) => {
                let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
                    AppError::Downstream(format!(
                        "failed to read snapshot {}: {e}",
                        path.display()
                    ))
                })?;
                let snapshot = parse(path, &raw).map_err(AppError::Downstream)?;
                debug!(
                    path = %path.display(),
                    items = snapshot.inventory.len(),
                    "inventory snapshot re-read"
                );
                Ok(snapshot)
            }
        }
    }
}

fn parse(path: &Path, raw: &str) -> std::result::Result<Snapshot, String> {
    serde_json::from_str(raw).map_err(|e| format!("invalid snapshot {}: {e}", path.display()))
}

fn window_start(snapshot: &Snapshot, window_days: u32) -> Option<NaiveDate> {
    let as_of = snapshot.as_of.unwrap_or_else(|| Utc::now().date_naive());
    as_of.checked_sub_days(Days::new(u64::from(window_days)))
}

impl InventorySource for SnapshotSource {
    fn fetch_inventory(&self) -> CallFuture<'_, Vec<InventoryItem>> {
        Box::pin(async move { Ok(self.current().await?.inventory) })
    }

    fn fetch_transactions(&self, window_days: u32) -> CallFuture<'_, Vec<Transaction>> {
        Box::pin(async move {
            let snapshot = self.current().await?;
            let start = window_start(&snapshot, window_days);
            Ok(snapshot
                .transactions
                .into_iter()
                .filter(|t| start.is_none_or(|s| t.date > s))
                .collect())
        })
    }

    fn fetch_vendors(&self) -> CallFuture<'_, Vec<Vendor>> {
        Box::pin(async move { Ok(self.current().await?.vendors) })
    }
}
