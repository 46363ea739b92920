//! Durable outbox for recompute notifications.
//!
//! A rejected approval asks the next decision cycle to re-evaluate the
//! affected SKUs, preferably with a different vendor. Tasks are appended
//! to daily JSONL files and stay visible to readers until acknowledged,
//! giving at-least-once delivery.

pub mod writer;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Result;

/// Reason attached to tasks raised by a human rejection.
pub const MANUAL_REJECTION: &str = "manual_rejection";

/// Request to re-evaluate one SKU.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecomputeTask {
    /// Unique task identifier used for acknowledgement.
    pub id: String,
    /// Message discriminator, always `recompute`.
    pub action: String,
    /// SKU to re-evaluate.
    pub sku: String,
    /// Why the task was raised.
    pub reason: String,
    /// Token of the rejected action.
    pub token: String,
    /// Vendor the rejected order was addressed to.
    pub original_vendor: String,
    /// Quantity of the rejected order.
    pub original_quantity: u64,
    /// Time the task was raised.
    pub timestamp: DateTime<Utc>,
}

impl RecomputeTask {
    /// Construct a task for a manually rejected line.
    #[must_use]
    pub fn rejected(token: &str, sku: &str, vendor: &str, quantity: u64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            action: "recompute".to_owned(),
            sku: sku.to_owned(),
            reason: MANUAL_REJECTION.to_owned(),
            token: token.to_owned(),
            original_vendor: vendor.to_owned(),
            original_quantity: quantity,
            timestamp: Utc::now(),
        }
    }
}

/// Append-only queue of recompute tasks with acknowledgement.
pub trait RecomputeOutbox: Send + Sync {
    /// Durably append `task`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Outbox` if the task cannot be written.
    fn enqueue(&self, task: &RecomputeTask) -> Result<()>;

    /// Every task not yet acknowledged, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Outbox` if the queue cannot be read.
    fn read_unacknowledged(&self) -> Result<Vec<RecomputeTask>>;

    /// Mark tasks as consumed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Outbox` if the acknowledgement cannot be written.
    fn acknowledge(&self, ids: &[String]) -> Result<()>;

    /// Drop storage held only by acknowledged tasks.
    ///
    /// Returns the number of acknowledged tasks removed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Outbox` if the queue cannot be read or rewritten.
    fn compact(&self) -> Result<usize>;
}
