//! Reorder decision produced by one policy evaluation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Coarse classification of how soon a SKU is expected to stock out.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UrgencyTier {
    /// Stockout predicted within the safety margin.
    Urgent,
    /// Stockout predicted within lead time plus safety margin.
    High,
    /// Triggered only by a reorder-point breach.
    Medium,
    /// No reorder needed.
    None,
}

impl UrgencyTier {
    /// Upper-case label used in summaries and rendered pages.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Urgent => "URGENT",
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::None => "NONE",
        }
    }
}

/// What the `total_cost` figure of a decision measures.
///
/// The demand-driven path reports an annualized cost that is comparable
/// across vendors; the zero-demand fallback reports the cost of a single
/// purchase. The two are never mixed in one field without this label.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CostBasis {
    /// Purchase, ordering and holding cost over one year of demand.
    Annualized,
    /// Price of one order at the fallback quantity.
    OneShotPurchase,
    /// No vendor was resolved.
    None,
}

/// Annualized saving of the chosen vendor against the runner-up.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CostSavings {
    /// Vendor the saving is measured against.
    pub vs_vendor: String,
    /// Absolute annual saving.
    pub amount: f64,
    /// Saving as a percentage of the runner-up's annual cost.
    pub percentage: f64,
}

/// Structured diagnostics behind a decision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecisionFactors {
    /// Units on hand at evaluation time.
    pub current_stock: u64,
    /// Trailing average daily consumption.
    pub avg_daily_usage: f64,
    /// `avg_daily_usage * 365`.
    pub annual_demand: f64,
    /// Days until stockout; `None` when no stockout is predictable.
    pub days_until_stockout: Option<f64>,
    /// Lead time of the chosen vendor, if any.
    pub lead_time_days: Option<u32>,
    /// Configured safety margin.
    pub safety_margin_days: u32,
    /// Lead time plus safety margin, if a vendor was chosen.
    pub reorder_threshold_days: Option<u32>,
    /// Item reorder point.
    pub reorder_point: i64,
    /// `avg_daily_usage * target_stock_days`.
    pub target_stock_level: f64,
    /// Rounded economic order quantity (or fallback quantity).
    pub eoq: u64,
    /// Whether predicted stockout falls inside the reorder threshold.
    pub stockout_risk: bool,
    /// Whether stock sits at or below the reorder point.
    pub below_reorder_point: bool,
    /// Whether the SKU had no consumption in the window.
    pub zero_demand: bool,
    /// Meaning of the decision's `total_cost`.
    pub cost_basis: CostBasis,
}

/// Outcome of evaluating one SKU. Created fresh per evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReorderDecision {
    /// SKU evaluated.
    pub sku: String,
    /// Whether a replenishment order is recommended.
    pub needs_reorder: bool,
    /// Chosen vendor name.
    pub vendor: Option<String>,
    /// Unit price of the chosen vendor (zero when none).
    pub unit_price: f64,
    /// Recommended order quantity (zero when no reorder).
    pub quantity: u64,
    /// Economic order quantity of the chosen vendor.
    pub eoq: u64,
    /// Cost figure described by `cost_basis`.
    pub total_cost: f64,
    /// Meaning of `total_cost`.
    pub cost_basis: CostBasis,
    /// `quantity * unit_price`: what an approver is asked to spend.
    pub order_value: f64,
    /// Predicted stockout date, if demand is non-zero.
    pub stockout_date: Option<NaiveDate>,
    /// Urgency classification.
    pub urgency: UrgencyTier,
    /// Single-sentence human-readable justification.
    pub evidence_summary: String,
    /// Saving against the runner-up vendor on the annualized path.
    pub savings: Option<CostSavings>,
    /// Structured diagnostics.
    pub factors: DecisionFactors,
}
