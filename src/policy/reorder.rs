//! Reorder decision engine.
//!
//! Combines current stock, trailing demand and vendor economics into a
//! [`ReorderDecision`]. Evaluation is a pure function of its inputs
//! (including the reference date), so identical inputs always yield
//! identical decisions.
//!
//! Expected-negative outcomes (zero demand, no trigger, no usable vendor)
//! are encoded in the decision. Only malformed input is an error.

use chrono::{Days, NaiveDate};
use tracing::{info, info_span, warn};

use crate::config::PolicyConfig;
use crate::models::decision::{
    CostBasis, CostSavings, DecisionFactors, ReorderDecision, UrgencyTier,
};
use crate::models::inventory::{InventoryItem, Transaction};
use crate::models::vendor::Vendor;
use crate::policy::forecast::ForecastEstimator;
use crate::policy::optimizer::{VendorEvaluation, VendorOptimizer};
use crate::{AppError, Result};

/// Result of evaluating one SKU inside a batch pass.
#[derive(Debug)]
pub struct SkuEvaluation {
    /// SKU of the inventory record (may be empty for malformed records).
    pub sku: String,
    /// Decision, or the input error that prevented one.
    pub outcome: Result<ReorderDecision>,
}

impl SkuEvaluation {
    fn sort_key(&self) -> (bool, f64) {
        match &self.outcome {
            Ok(d) => (
                !d.needs_reorder,
                d.factors.days_until_stockout.unwrap_or(f64::INFINITY),
            ),
            Err(_) => (true, f64::INFINITY),
        }
    }
}

/// Vendor resolved for a SKU by either the EOQ or the zero-demand path.
struct VendorChoice {
    name: String,
    unit_price: f64,
    lead_time_days: u32,
    eoq: u64,
    total_cost: f64,
    basis: CostBasis,
    savings: Option<CostSavings>,
}

/// Per-SKU reorder policy.
#[derive(Debug, Clone)]
pub struct ReorderPolicy {
    config: PolicyConfig,
    forecast: ForecastEstimator,
}

impl ReorderPolicy {
    /// Construct a policy from explicit thresholds.
    #[must_use]
    pub fn new(config: PolicyConfig) -> Self {
        let forecast = ForecastEstimator::new(config.transaction_window_days);
        info!(
            safety_margin_days = config.safety_margin_days,
            min_order_qty = config.min_order_qty,
            target_stock_days = config.target_stock_days,
            "reorder policy initialised"
        );
        Self { config, forecast }
    }

    /// Thresholds in effect.
    #[must_use]
    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// Decide whether, how much and from whom to reorder `item`.
    ///
    /// `today` anchors the predicted stockout date.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Input` if the SKU is empty, `vendors` is empty,
    /// or the chosen vendor's lead time plus the safety margin overflows.
    pub fn evaluate(
        &self,
        item: &InventoryItem,
        transactions: &[Transaction],
        vendors: &[Vendor],
        today: NaiveDate,
    ) -> Result<ReorderDecision> {
        let _span = info_span!("reorder_evaluate", sku = %item.sku).entered();

        if item.sku.trim().is_empty() {
            return Err(AppError::Input("inventory record has an empty sku".into()));
        }
        if vendors.is_empty() {
            return Err(AppError::Input(format!(
                "no vendors provided for {}",
                item.sku
            )));
        }

        let avg_daily = self.forecast.daily_average(transactions, &item.sku);
        let annual_demand = avg_daily * 365.0;
        let zero_demand = annual_demand <= 0.0;
        let below_reorder_point = item.below_reorder_point();
        let days_until_stockout = ForecastEstimator::days_until_stockout(item.on_hand, avg_daily);
        let stockout_date = stockout_date(today, days_until_stockout);

        // ── Vendor resolution ────────────────────────────────
        let choice = if !zero_demand {
            let ranked = VendorOptimizer::rank_vendors(vendors, annual_demand);
            ranked.first().map(|best| VendorChoice {
                name: best.vendor.name.clone(),
                unit_price: best.vendor.unit_price,
                lead_time_days: best.vendor.lead_time_days,
                eoq: best.order_quantity,
                total_cost: best.total_annual_cost,
                basis: CostBasis::Annualized,
                savings: savings_vs_runner_up(&ranked),
            })
        } else if below_reorder_point {
            info!("zero-demand item below reorder point, using lowest unit price vendor");
            VendorOptimizer::lowest_unit_price(vendors).map(|v| {
                let eoq = self.config.min_order_qty.max(item.reorder_quantity);
                VendorChoice {
                    name: v.name.clone(),
                    unit_price: v.unit_price,
                    lead_time_days: v.lead_time_days,
                    eoq,
                    total_cost: as_f64(eoq) * v.unit_price,
                    basis: CostBasis::OneShotPurchase,
                    savings: None,
                }
            })
        } else {
            info!("zero-demand item above reorder point, no action");
            let summary = format!(
                "NO ACTION NEEDED: {} has no recorded demand and {} units on hand above reorder point {}.",
                item.sku, item.on_hand, item.reorder_point
            );
            return Ok(self.vendorless_decision(item, avg_daily, summary));
        };

        let Some(choice) = choice else {
            warn!("no valid vendor available");
            let summary = format!("No valid vendors available for {}.", item.sku);
            return Ok(self.vendorless_decision(item, avg_daily, summary));
        };

        // ── Trigger ──────────────────────────────────────────
        let threshold_days = choice
            .lead_time_days
            .checked_add(self.config.safety_margin_days)
            .ok_or_else(|| {
                AppError::Input(format!(
                    "lead time {} days of vendor {} is out of range",
                    choice.lead_time_days, choice.name
                ))
            })?;
        let stockout_risk = days_until_stockout <= f64::from(threshold_days);
        let needs_reorder = if zero_demand {
            below_reorder_point
        } else {
            stockout_risk || below_reorder_point
        };

        // ── Quantity ─────────────────────────────────────────
        let target_stock = avg_daily * f64::from(self.config.target_stock_days);
        let quantity = if needs_reorder {
            let gap = ceil_units(target_stock - as_f64(item.on_hand));
            choice.eoq.max(self.config.min_order_qty).max(gap)
        } else {
            0
        };

        // ── Urgency ──────────────────────────────────────────
        let urgency = if !needs_reorder {
            UrgencyTier::None
        } else if days_until_stockout <= f64::from(self.config.safety_margin_days) {
            UrgencyTier::Urgent
        } else if stockout_risk {
            UrgencyTier::High
        } else {
            UrgencyTier::Medium
        };

        let evidence_summary = self.summarize(
            item,
            avg_daily,
            days_until_stockout,
            urgency,
            quantity,
            threshold_days,
            &choice,
        );

        let decision = ReorderDecision {
            sku: item.sku.clone(),
            needs_reorder,
            vendor: Some(choice.name.clone()),
            unit_price: choice.unit_price,
            quantity,
            eoq: choice.eoq,
            total_cost: choice.total_cost,
            cost_basis: choice.basis,
            order_value: as_f64(quantity) * choice.unit_price,
            stockout_date,
            urgency,
            evidence_summary,
            savings: choice.savings,
            factors: DecisionFactors {
                current_stock: item.on_hand,
                avg_daily_usage: avg_daily,
                annual_demand,
                days_until_stockout: finite(days_until_stockout),
                lead_time_days: Some(choice.lead_time_days),
                safety_margin_days: self.config.safety_margin_days,
                reorder_threshold_days: Some(threshold_days),
                reorder_point: item.reorder_point,
                target_stock_level: target_stock,
                eoq: choice.eoq,
                stockout_risk: !zero_demand && stockout_risk,
                below_reorder_point,
                zero_demand,
                cost_basis: choice.basis,
            },
        };

        info!(
            needs_reorder = decision.needs_reorder,
            urgency = decision.urgency.label(),
            quantity = decision.quantity,
            "reorder evaluation complete"
        );
        Ok(decision)
    }

    /// Evaluate every item, isolating per-SKU failures.
    ///
    /// Transactions are filtered per SKU. Results are ordered with
    /// reorders first, most urgent (fewest days to stockout) first;
    /// failed evaluations sort last.
    #[must_use]
    pub fn evaluate_all(
        &self,
        items: &[InventoryItem],
        transactions: &[Transaction],
        vendors: &[Vendor],
        today: NaiveDate,
    ) -> Vec<SkuEvaluation> {
        self.evaluate_all_with(items, transactions, |_| vendors.to_vec(), today)
    }

    /// Like [`Self::evaluate_all`], with the vendor list chosen per item.
    #[must_use]
    pub fn evaluate_all_with<F>(
        &self,
        items: &[InventoryItem],
        transactions: &[Transaction],
        vendors_for: F,
        today: NaiveDate,
    ) -> Vec<SkuEvaluation>
    where
        F: Fn(&InventoryItem) -> Vec<Vendor>,
    {
        let mut results: Vec<SkuEvaluation> = items
            .iter()
            .map(|item| {
                let own: Vec<Transaction> = transactions
                    .iter()
                    .filter(|t| t.sku == item.sku)
                    .cloned()
                    .collect();
                let outcome = self.evaluate(item, &own, &vendors_for(item), today);
                if let Err(ref err) = outcome {
                    warn!(sku = %item.sku, %err, "sku evaluation failed");
                }
                SkuEvaluation {
                    sku: item.sku.clone(),
                    outcome,
                }
            })
            .collect();

        results.sort_by(|a, b| {
            let (ra, da) = a.sort_key();
            let (rb, db) = b.sort_key();
            ra.cmp(&rb).then(da.total_cmp(&db))
        });
        results
    }

    fn vendorless_decision(
        &self,
        item: &InventoryItem,
        avg_daily: f64,
        evidence_summary: String,
    ) -> ReorderDecision {
        let days = ForecastEstimator::days_until_stockout(item.on_hand, avg_daily);
        ReorderDecision {
            sku: item.sku.clone(),
            needs_reorder: false,
            vendor: None,
            unit_price: 0.0,
            quantity: 0,
            eoq: 0,
            total_cost: 0.0,
            cost_basis: CostBasis::None,
            order_value: 0.0,
            stockout_date: None,
            urgency: UrgencyTier::None,
            evidence_summary,
            savings: None,
            factors: DecisionFactors {
                current_stock: item.on_hand,
                avg_daily_usage: avg_daily,
                annual_demand: avg_daily * 365.0,
                days_until_stockout: finite(days),
                lead_time_days: None,
                safety_margin_days: self.config.safety_margin_days,
                reorder_threshold_days: None,
                reorder_point: item.reorder_point,
                target_stock_level: avg_daily * f64::from(self.config.target_stock_days),
                eoq: 0,
                stockout_risk: false,
                below_reorder_point: item.below_reorder_point(),
                zero_demand: avg_daily <= 0.0,
                cost_basis: CostBasis::None,
            },
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn summarize(
        &self,
        item: &InventoryItem,
        avg_daily: f64,
        days: f64,
        urgency: UrgencyTier,
        quantity: u64,
        threshold_days: u32,
        choice: &VendorChoice,
    ) -> String {
        let cost_label = match choice.basis {
            CostBasis::OneShotPurchase => "purchase cost",
            CostBasis::Annualized | CostBasis::None => "annual cost",
        };
        let reason = match urgency {
            UrgencyTier::Urgent => format!("stockout predicted in {days:.1} days"),
            UrgencyTier::High => format!(
                "stockout within lead time + safety margin ({days:.1} days, threshold {threshold_days} days)"
            ),
            UrgencyTier::Medium => format!(
                "stock at or below reorder point {}",
                item.reorder_point
            ),
            UrgencyTier::None => {
                let horizon = if days.is_finite() {
                    format!("{days:.1} days until stockout")
                } else {
                    "no predicted stockout".to_owned()
                };
                return format!(
                    "NO ACTION NEEDED: {} has sufficient stock; current {} units, {horizon}, daily usage {avg_daily:.1} units.",
                    item.sku, item.on_hand
                );
            }
        };

        format!(
            "{} PRIORITY: {} needs reordering ({reason}); current stock {} units, daily usage {avg_daily:.1} units, recommend {quantity} units from {} (EOQ {}, {cost_label} ${:.2}).",
            urgency.label(),
            item.sku,
            item.on_hand,
            choice.name,
            choice.eoq,
            choice.total_cost,
        )
    }
}

fn savings_vs_runner_up(ranked: &[VendorEvaluation]) -> Option<CostSavings> {
    let (best, runner_up) = (ranked.first()?, ranked.get(1)?);
    let amount = runner_up.total_annual_cost - best.total_annual_cost;
    let percentage = if runner_up.total_annual_cost > 0.0 {
        amount / runner_up.total_annual_cost * 100.0
    } else {
        0.0
    };
    Some(CostSavings {
        vs_vendor: runner_up.vendor.name.clone(),
        amount,
        percentage,
    })
}

fn stockout_date(today: NaiveDate, days: f64) -> Option<NaiveDate> {
    if !days.is_finite() {
        return None;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // Finite and non-negative.
    let whole = days.trunc().max(0.0) as u64;
    today.checked_add_days(Days::new(whole))
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn ceil_units(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        value.ceil() as u64
    } else {
        0
    }
}

#[allow(clippy::cast_precision_loss)]
fn as_f64(units: u64) -> f64 {
    units as f64
}
