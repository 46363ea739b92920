//! External collaborators of the decision engine.
//!
//! Each trait isolates one outside system: the inventory data source, the
//! supplier ordering API, the document pages and spreadsheet that mirror
//! order status, and the channel that asks a human for approval. The
//! workflow and the decision cycle only talk to these traits.

pub mod http;
pub mod logging;
pub mod snapshot;

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::decision::ReorderDecision;
use crate::models::inventory::{InventoryItem, Transaction};
use crate::models::pending::PendingAction;
use crate::models::vendor::Vendor;
use crate::{AppError, GlobalConfig, Result};

pub use http::HttpNotifier;
pub use logging::{LoggingNotifier, LoggingPages, LoggingSheets, LoggingSupplier};
pub use snapshot::SnapshotSource;

/// Boxed future returned by collaborator calls.
pub type CallFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Await a collaborator call for at most `limit`.
///
/// # Errors
///
/// Returns the call's own error, or `AppError::Timeout` naming `what`.
pub async fn bounded<T>(what: &str, limit: Duration, call: CallFuture<'_, T>) -> Result<T> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(AppError::Timeout(format!(
            "{what} exceeded {}s",
            limit.as_secs()
        ))),
    }
}

/// Supplier acknowledgement of a placed order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderConfirmation {
    /// Supplier-side order identifier.
    pub order_id: String,
    /// Promised delivery date, when the supplier gives one.
    pub delivery_date: Option<NaiveDate>,
}

/// Status labels written to pages and sheets.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Awaiting human approval.
    PendingApproval,
    /// Placed without approval.
    AutoOrdered,
    /// Approved and placed.
    Ordered,
    /// Approved but placement failed.
    OrderFailed,
    /// Rejected by a human.
    Rejected,
}

impl OrderStatus {
    /// Display label used in external documents.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::PendingApproval => "Pending Approval",
            Self::AutoOrdered => "Auto-Ordered",
            Self::Ordered => "Ordered",
            Self::OrderFailed => "Order Failed",
            Self::Rejected => "Rejected",
        }
    }
}

/// One row update for the tracking spreadsheet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SheetStatusUpdate {
    /// SKU row to update.
    pub sku: String,
    /// New status.
    pub status: OrderStatus,
    /// Vendor involved.
    pub vendor: String,
    /// Units involved.
    pub quantity: u64,
    /// Supplier order identifier, once placed.
    pub order_id: Option<String>,
    /// Free-form note.
    pub note: Option<String>,
}

/// Source of inventory, demand history and vendor catalog.
pub trait InventorySource: Send + Sync {
    /// Current stock records.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Downstream` if the source cannot be read.
    fn fetch_inventory(&self) -> CallFuture<'_, Vec<InventoryItem>>;

    /// Transactions dated within the last `window_days` days.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Downstream` if the source cannot be read.
    fn fetch_transactions(&self, window_days: u32) -> CallFuture<'_, Vec<Transaction>>;

    /// Vendor catalog.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Downstream` if the source cannot be read.
    fn fetch_vendors(&self) -> CallFuture<'_, Vec<Vendor>>;
}

/// Supplier ordering API.
pub trait Supplier: Send + Sync {
    /// Place an order for `quantity` units of `sku` with `vendor`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Downstream` if the supplier refuses or is unreachable.
    fn place_order(&self, vendor: &str, sku: &str, quantity: u64)
        -> CallFuture<'_, OrderConfirmation>;
}

/// Document pages tracking each reorder.
pub trait PageStatusUpdater: Send + Sync {
    /// Create or update the page for `decision`, returning its reference.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Downstream` on failure.
    fn upsert_reorder_page(&self, decision: &ReorderDecision) -> CallFuture<'_, String>;

    /// Set the status and extra fields on an existing page.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Downstream` on failure.
    fn update_page_status(
        &self,
        page_ref: &str,
        status: OrderStatus,
        fields: BTreeMap<String, String>,
    ) -> CallFuture<'_, ()>;
}

/// Tracking spreadsheet.
pub trait SheetStatusUpdater: Send + Sync {
    /// Apply one row update.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Downstream` on failure.
    fn update_sheet_status(&self, update: SheetStatusUpdate) -> CallFuture<'_, ()>;
}

/// Channel that asks a human to approve or reject a request.
pub trait ApprovalNotifier: Send + Sync {
    /// Send the approval request with its one-click links. Returns a message id.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Downstream` if the message cannot be delivered.
    fn notify_approval_required(
        &self,
        recipient: &str,
        request: &PendingAction,
        approve_url: &str,
        reject_url: &str,
    ) -> CallFuture<'_, String>;
}

/// Shared handles to every collaborator.
#[derive(Clone)]
pub struct Collaborators {
    /// Inventory data source.
    pub inventory: Arc<dyn InventorySource>,
    /// Supplier ordering API.
    pub supplier: Arc<dyn Supplier>,
    /// Document pages.
    pub pages: Arc<dyn PageStatusUpdater>,
    /// Tracking spreadsheet.
    pub sheets: Arc<dyn SheetStatusUpdater>,
    /// Approval channel.
    pub notifier: Arc<dyn ApprovalNotifier>,
}

impl Collaborators {
    /// Build the shipped stand-ins from configuration.
    ///
    /// Uses the snapshot file as inventory source when configured and the
    /// HTTP notifier when a webhook URL is set; everything else logs.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the snapshot cannot be loaded or the
    /// HTTP client cannot be built.
    pub fn from_config(config: &GlobalConfig) -> Result<Self> {
        let inventory: Arc<dyn InventorySource> = match config.snapshot_path {
            Some(ref path) => Arc::new(SnapshotSource::load(path)?),
            None => {
                warn!("no snapshot_path configured, inventory source is empty");
                Arc::new(SnapshotSource::empty())
            }
        };

        let notifier: Arc<dyn ApprovalNotifier> = match config.notifier.webhook_url {
            Some(ref url) => Arc::new(HttpNotifier::new(url, config.timeouts.collaborator())?),
            None => Arc::new(LoggingNotifier),
        };

        Ok(Self {
            inventory,
            supplier: Arc::new(LoggingSupplier),
            pages: Arc::new(LoggingPages),
            sheets: Arc::new(LoggingSheets),
            notifier,
        })
    }
}
