//! Durable record of every reorder action the service takes.
//!
//! Provides the [`ActionLog`] trait and [`ActionEntry`] records. The
//! shipped implementation, [`JsonlActionLog`], appends JSONL records to
//! daily-rotating files under `<data_dir>/actions/`.

pub mod writer;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::Result;

/// What happened to a SKU.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActionEvent {
    /// Order placed without human approval.
    AutoOrderPlaced,
    /// Auto-order attempt failed; the line falls back to approval.
    AutoOrderFailed,
    /// Line sent to a human in a batch approval request.
    ApprovalRequested,
    /// SKU could not be evaluated or routed.
    ProcessError,
    /// Order placed after human approval.
    OrderApproved,
    /// Approved order could not be placed.
    OrderFailed,
    /// Human rejected the line.
    Rejected,
}

impl ActionEvent {
    /// Stable snake_case name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AutoOrderPlaced => "auto_order_placed",
            Self::AutoOrderFailed => "auto_order_failed",
            Self::ApprovalRequested => "approval_requested",
            Self::ProcessError => "process_error",
            Self::OrderApproved => "order_approved",
            Self::OrderFailed => "order_failed",
            Self::Rejected => "rejected",
        }
    }

    /// Whether the event records a failure.
    #[must_use]
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            Self::AutoOrderFailed | Self::ProcessError | Self::OrderFailed
        )
    }
}

/// One recorded action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionEntry {
    /// Time the action was recorded.
    pub timestamp: DateTime<Utc>,
    /// Event classification.
    pub event: ActionEvent,
    /// `success` or `failed`.
    pub status: String,
    /// Affected SKU.
    pub sku: String,
    /// Vendor the order was addressed to.
    pub vendor: Option<String>,
    /// Ordered quantity.
    pub quantity: Option<u64>,
    /// Order cost.
    pub cost: Option<f64>,
    /// Supplier order id.
    pub order_id: Option<String>,
    /// Pending-action token, for approval events.
    pub token: Option<String>,
    /// Error text or other free-form detail.
    pub detail: Option<String>,
}

impl ActionEntry {
    /// Minimal entry for `event` on `sku`.
    #[must_use]
    pub fn new(event: ActionEvent, sku: impl Into<String>) -> Self {
        let status = if event.is_failure() { "failed" } else { "success" };
        Self {
            timestamp: Utc::now(),
            event,
            status: status.to_owned(),
            sku: sku.into(),
            vendor: None,
            quantity: None,
            cost: None,
            order_id: None,
            token: None,
            detail: None,
        }
    }

    /// Set vendor, quantity and cost of the order line.
    #[must_use]
    pub fn with_order_line(mut self, vendor: &str, quantity: u64, cost: f64) -> Self {
        self.vendor = Some(vendor.to_owned());
        self.quantity = Some(quantity);
        self.cost = Some(cost);
        self
    }

    /// Set the supplier order id.
    #[must_use]
    pub fn with_order_id(mut self, order_id: String) -> Self {
        self.order_id = Some(order_id);
        self
    }

    /// Set the pending-action token.
    #[must_use]
    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_owned());
        self
    }

    /// Set the detail text.
    #[must_use]
    pub fn with_detail(mut self, detail: String) -> Self {
        self.detail = Some(detail);
        self
    }
}

/// Persists [`ActionEntry`] records.
///
/// Implementations must be [`Send`] and [`Sync`] to allow sharing across
/// async task boundaries via [`std::sync::Arc`].
pub trait ActionLog: Send + Sync {
    /// Record a single entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying write fails.
    fn record(&self, entry: ActionEntry) -> Result<()>;
}

/// Record `entry`, logging a warning instead of failing the caller.
pub fn record_or_warn(log: &dyn ActionLog, entry: ActionEntry) {
    let event = entry.event;
    let sku = entry.sku.clone();
    if let Err(err) = log.record(entry) {
        warn!(%err, %sku, event = event.as_str(), "failed to record action");
    }
}

pub use writer::JsonlActionLog;
