//! Pending approval action awaiting a human decision.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::decision::ReorderDecision;

/// SKU sentinel used by batch actions.
pub const BATCH_SKU: &str = "BATCH";

/// Vendor sentinel used by batch actions.
pub const BATCH_VENDOR: &str = "MULTIPLE";

/// Fixed lifetime of a pending action.
#[must_use]
pub fn default_ttl() -> Duration {
    Duration::hours(24)
}

/// Shape of the request awaiting approval.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// One SKU from one vendor.
    SingleReorder,
    /// Several SKUs approved with a single gesture.
    BatchReorder,
}

impl ActionKind {
    /// Stable storage representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SingleReorder => "single_reorder",
            Self::BatchReorder => "batch_reorder",
        }
    }

    /// Parse the storage representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "single_reorder" => Some(Self::SingleReorder),
            "batch_reorder" => Some(Self::BatchReorder),
            _ => None,
        }
    }
}

/// Lifecycle status for a pending action.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    /// Awaiting a decision.
    Pending,
    /// Claimed by a callback that is executing side effects.
    InProgress,
    /// Approved; orders were attempted.
    Approved,
    /// Rejected; no orders were placed.
    Rejected,
    /// Order placement kept failing until attempts ran out.
    Failed,
}

impl ActionStatus {
    /// Stable storage representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Failed => "failed",
        }
    }

    /// Parse the storage representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Whether no further transition is expected.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected | Self::Failed)
    }
}

/// One SKU-level request inside a batch action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct BatchLineItem {
    /// SKU to order.
    pub sku: String,
    /// Vendor to order from.
    pub vendor: String,
    /// Units to order.
    pub quantity: u64,
    /// Order value of this line.
    pub total_cost: f64,
    /// External document page tracking this line.
    pub external_ref: Option<String>,
}

impl BatchLineItem {
    /// Build a line item from a decision that needs a reorder.
    ///
    /// Returns `None` when the decision carries no vendor.
    #[must_use]
    pub fn from_decision(decision: &ReorderDecision, external_ref: Option<String>) -> Option<Self> {
        let vendor = decision.vendor.clone()?;
        Some(Self {
            sku: decision.sku.clone(),
            vendor,
            quantity: decision.quantity,
            total_cost: decision.order_value,
            external_ref,
        })
    }
}

/// A token-addressed request awaiting approval or rejection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct PendingAction {
    /// Opaque unique token (UUIDv4 recommended).
    pub token: String,
    /// SKU, or [`BATCH_SKU`] for batches.
    pub sku: String,
    /// Single or batch.
    pub kind: ActionKind,
    /// Vendor, or [`BATCH_VENDOR`] for batches.
    pub vendor: String,
    /// Units requested (sum of lines for batches).
    pub quantity: u64,
    /// Order value requested (sum of lines for batches).
    pub total_cost: f64,
    /// Human-readable justification.
    pub rationale: String,
    /// External document page reference.
    pub external_ref: Option<String>,
    /// Ordered line items; empty for single actions.
    #[serde(default)]
    pub items: Vec<BatchLineItem>,
    /// Time the action was stored.
    pub created_at: DateTime<Utc>,
    /// Time after which the action is no longer retrievable.
    pub expires_at: DateTime<Utc>,
    /// Current lifecycle status.
    pub status: ActionStatus,
    /// Number of times the action has been claimed.
    #[serde(default)]
    pub attempts: u32,
}

impl PendingAction {
    /// Construct a single-SKU action ordering `line`.
    ///
    /// Timestamps are provisional; the store overwrites them.
    #[must_use]
    pub fn single(token: String, line: BatchLineItem, rationale: String) -> Self {
        let now = Utc::now();
        Self {
            token,
            sku: line.sku,
            kind: ActionKind::SingleReorder,
            vendor: line.vendor,
            quantity: line.quantity,
            total_cost: line.total_cost.max(0.0),
            rationale,
            external_ref: line.external_ref,
            items: Vec::new(),
            created_at: now,
            expires_at: now + default_ttl(),
            status: ActionStatus::Pending,
            attempts: 0,
        }
    }

    /// Construct a batch action aggregating `items` in order.
    #[must_use]
    pub fn batch(token: String, items: Vec<BatchLineItem>) -> Self {
        let now = Utc::now();
        let quantity = items.iter().map(|i| i.quantity).sum();
        let total_cost = items.iter().map(|i| i.total_cost.max(0.0)).sum();
        Self {
            token,
            sku: BATCH_SKU.to_owned(),
            kind: ActionKind::BatchReorder,
            vendor: BATCH_VENDOR.to_owned(),
            quantity,
            total_cost,
            rationale: format!("Batch approval for {} items", items.len()),
            external_ref: None,
            items,
            created_at: now,
            expires_at: now + default_ttl(),
            status: ActionStatus::Pending,
            attempts: 0,
        }
    }

    /// Line items the workflow iterates over.
    ///
    /// Single actions expose themselves as one synthetic line.
    #[must_use]
    pub fn lines(&self) -> Vec<BatchLineItem> {
        match self.kind {
            ActionKind::BatchReorder => self.items.clone(),
            ActionKind::SingleReorder => vec![BatchLineItem {
                sku: self.sku.clone(),
                vendor: self.vendor.clone(),
                quantity: self.quantity,
                total_cost: self.total_cost,
                external_ref: self.external_ref.clone(),
            }],
        }
    }

    /// Whether the action is retrievable at `now`.
    #[must_use]
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.status == ActionStatus::Pending && self.expires_at > now
    }
}
