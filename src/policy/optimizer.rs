//! Economic Order Quantity evaluation and vendor selection.
//!
//! For each vendor with usable pricing the optimizer computes
//! `EOQ = sqrt(2 * D * S / (h * p))` and the total annual cost
//! `D * p + D / EOQ * S + EOQ / 2 * h * p`, then picks the cheapest vendor.
//! Ties fall back to shorter lead time and finally to vendor name so the
//! selection is deterministic.

use std::cmp::Ordering;

use serde::Serialize;

use crate::models::vendor::Vendor;

/// EOQ cost breakdown for one vendor at a given annual demand.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VendorEvaluation {
    /// Vendor evaluated.
    pub vendor: Vendor,
    /// Continuous economic order quantity.
    pub eoq: f64,
    /// EOQ rounded to a whole, positive order quantity.
    pub order_quantity: u64,
    /// Annual fixed ordering cost implied by `eoq`.
    pub ordering_cost: f64,
    /// Annual holding cost implied by `eoq`.
    pub holding_cost: f64,
    /// Annual purchase cost.
    pub purchase_cost: f64,
    /// `purchase_cost + ordering_cost + holding_cost`.
    pub total_annual_cost: f64,
}

/// Stateless EOQ optimizer.
#[derive(Debug, Clone, Copy, Default)]
pub struct VendorOptimizer;

impl VendorOptimizer {
    /// Evaluate one vendor. Returns `None` for unusable pricing or demand.
    #[must_use]
    pub fn evaluate(vendor: &Vendor, annual_demand: f64) -> Option<VendorEvaluation> {
        if !(annual_demand.is_finite() && annual_demand > 0.0) || !vendor.has_eoq_pricing() {
            return None;
        }

        let unit_holding = vendor.holding_rate * vendor.unit_price;
        let eoq = (2.0 * annual_demand * vendor.order_cost / unit_holding).sqrt();
        if !(eoq.is_finite() && eoq > 0.0) {
            return None;
        }

        let ordering_cost = annual_demand / eoq * vendor.order_cost;
        let holding_cost = eoq / 2.0 * unit_holding;
        let purchase_cost = annual_demand * vendor.unit_price;

        Some(VendorEvaluation {
            vendor: vendor.clone(),
            eoq,
            order_quantity: round_quantity(eoq),
            ordering_cost,
            holding_cost,
            purchase_cost,
            total_annual_cost: purchase_cost + ordering_cost + holding_cost,
        })
    }

    /// Evaluate every usable vendor and return them in selection order.
    #[must_use]
    pub fn rank_vendors(vendors: &[Vendor], annual_demand: f64) -> Vec<VendorEvaluation> {
        let mut ranked: Vec<VendorEvaluation> = vendors
            .iter()
            .filter_map(|v| Self::evaluate(v, annual_demand))
            .collect();
        ranked.sort_by(compare_evaluations);
        ranked
    }

    /// Select the vendor with the minimum total annual cost.
    ///
    /// Returns `None` when `vendors` is empty, no vendor has usable pricing,
    /// or `annual_demand` is not positive.
    #[must_use]
    pub fn select_best_vendor(vendors: &[Vendor], annual_demand: f64) -> Option<VendorEvaluation> {
        Self::rank_vendors(vendors, annual_demand).into_iter().next()
    }

    /// Cheapest vendor by unit price, used when there is no demand history.
    #[must_use]
    pub fn lowest_unit_price(vendors: &[Vendor]) -> Option<&Vendor> {
        vendors
            .iter()
            .filter(|v| v.has_unit_price())
            .min_by(|a, b| {
                a.unit_price
                    .total_cmp(&b.unit_price)
                    .then(a.lead_time_days.cmp(&b.lead_time_days))
                    .then_with(|| a.name.cmp(&b.name))
            })
    }
}

fn compare_evaluations(a: &VendorEvaluation, b: &VendorEvaluation) -> Ordering {
    a.total_annual_cost
        .total_cmp(&b.total_annual_cost)
        .then(a.vendor.lead_time_days.cmp(&b.vendor.lead_time_days))
        .then_with(|| a.vendor.name.cmp(&b.vendor.name))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // eoq is finite and positive.
fn round_quantity(eoq: f64) -> u64 {
    (eoq.round() as u64).max(1)
}
