//! Vendor pricing snapshot supplied per evaluation call.

use serde::{Deserialize, Serialize};

/// Commercial terms offered by one supplier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct Vendor {
    /// Vendor name, unique within an evaluation call.
    pub name: String,
    /// Price per unit.
    pub unit_price: f64,
    /// Annual holding cost as a fraction of unit price.
    pub holding_rate: f64,
    /// Fixed cost incurred per order.
    pub order_cost: f64,
    /// Days between order placement and delivery.
    pub lead_time_days: u32,
}

impl Vendor {
    /// Construct a vendor snapshot.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        unit_price: f64,
        holding_rate: f64,
        order_cost: f64,
        lead_time_days: u32,
    ) -> Self {
        Self {
            name: name.into(),
            unit_price,
            holding_rate,
            order_cost,
            lead_time_days,
        }
    }

    /// Whether the unit price alone is usable (finite and positive).
    #[must_use]
    pub fn has_unit_price(&self) -> bool {
        self.unit_price.is_finite() && self.unit_price > 0.0
    }

    /// Whether every input of the EOQ formula is usable.
    #[must_use]
    pub fn has_eoq_pricing(&self) -> bool {
        self.has_unit_price()
            && self.holding_rate.is_finite()
            && self.holding_rate > 0.0
            && self.order_cost.is_finite()
            && self.order_cost > 0.0
    }
}
