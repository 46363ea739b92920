//! Inventory snapshot records produced by the external data source.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

fn default_reorder_quantity() -> u64 {
    10
}

/// Current stock position of a single SKU.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct InventoryItem {
    /// Stock keeping unit, unique within a snapshot.
    pub sku: String,
    /// Units currently on hand.
    pub on_hand: u64,
    /// Stock level at or below which a reorder is due.
    #[serde(default)]
    pub reorder_point: i64,
    /// Quantity used when no demand history exists.
    #[serde(default = "default_reorder_quantity")]
    pub reorder_quantity: u64,
    /// Preferred vendor recorded alongside the item.
    #[serde(default)]
    pub vendor_hint: Option<String>,
    /// Last known unit cost.
    #[serde(default)]
    pub unit_cost: Option<f64>,
}

impl InventoryItem {
    /// Construct an item with default reorder quantity and no hints.
    #[must_use]
    pub fn new(sku: impl Into<String>, on_hand: u64, reorder_point: i64) -> Self {
        Self {
            sku: sku.into(),
            on_hand,
            reorder_point,
            reorder_quantity: default_reorder_quantity(),
            vendor_hint: None,
            unit_cost: None,
        }
    }

    /// Whether stock sits at or below the reorder point.
    #[must_use]
    pub fn below_reorder_point(&self) -> bool {
        i128::from(self.on_hand) <= i128::from(self.reorder_point)
    }
}

/// A single stock movement. Negative quantities are consumption.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct Transaction {
    /// SKU the movement applies to.
    pub sku: String,
    /// Signed quantity; negative values are outbound.
    pub quantity: i64,
    /// Calendar date of the movement.
    pub date: NaiveDate,
}

impl Transaction {
    /// Construct a transaction record.
    #[must_use]
    pub fn new(sku: impl Into<String>, quantity: i64, date: NaiveDate) -> Self {
        Self {
            sku: sku.into(),
            quantity,
            date,
        }
    }
}
