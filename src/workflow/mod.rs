//! Human-in-the-loop approval workflow.
//!
//! Pending actions are stored with a token and resolved by one-click
//! approve or reject callbacks carrying that token and a shared secret.

pub mod approval;

use serde::Serialize;

use crate::collaborators::OrderConfirmation;
use crate::models::pending::BatchLineItem;

pub use approval::{ApprovalWorkflow, WorkflowSettings};

/// Result of approving a single-SKU action.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SingleOutcome {
    /// Token that was resolved.
    pub token: String,
    /// SKU ordered.
    pub sku: String,
    /// Vendor ordered from.
    pub vendor: String,
    /// Units ordered.
    pub quantity: u64,
    /// Supplier confirmation.
    pub order: OrderConfirmation,
}

/// A batch line that was ordered.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ApprovedLine {
    /// Line item as requested.
    pub item: BatchLineItem,
    /// Supplier confirmation.
    pub order: OrderConfirmation,
}

/// A batch line whose order could not be placed.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FailedLine {
    /// Line item as requested.
    pub item: BatchLineItem,
    /// Why placement failed.
    pub error: String,
}

/// Result of approving a batch action; lines succeed or fail independently.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BatchOutcome {
    /// Token that was resolved.
    pub token: String,
    /// Lines ordered successfully, in request order.
    pub approved: Vec<ApprovedLine>,
    /// Lines that failed, in request order.
    pub failed: Vec<FailedLine>,
}

/// Result of rejecting an action.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RejectOutcome {
    /// Token that was resolved.
    pub token: String,
    /// SKUs covered by the rejection.
    pub skus: Vec<String>,
    /// Recompute tasks written to the outbox.
    pub recompute_enqueued: usize,
}

/// Operator view of an action's state.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ActionView {
    /// Action token.
    pub token: String,
    /// SKU or batch sentinel.
    pub sku: String,
    /// `pending`, `in_progress`, `approved`, `rejected`, `failed` or `expired`.
    pub status: String,
    /// Expiry instant.
    pub expires_at: chrono::DateTime<chrono::Utc>,
}
