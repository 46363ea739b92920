//! Auto-order gate.
//!
//! Decides whether a reorder recommendation may be placed without a
//! human in the loop. Anything not explicitly allowed falls through to
//! the approval workflow.

use tracing::{info, info_span};

use crate::config::AutoOrderConfig;
use crate::models::decision::ReorderDecision;

/// Result of an auto-order evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct AutoOrderResult {
    /// Whether the order may be placed immediately.
    pub auto_approved: bool,
    /// Short reason for the outcome, suitable for logs and page fields.
    pub reason: String,
    /// Trust score used for the vendor, if one was looked up.
    pub trust: Option<f64>,
}

/// Evaluates the auto-order rule against a decision.
pub struct AutoOrderEvaluator;

impl AutoOrderEvaluator {
    /// Check whether `decision` qualifies for automatic placement.
    ///
    /// Evaluation order:
    /// 1. Dry run or disabled gate → deny.
    /// 2. Decision without reorder or vendor → deny.
    /// 3. Order value must be strictly below the threshold.
    /// 4. Vendor trust must meet the trust threshold.
    #[must_use]
    pub fn check(
        decision: &ReorderDecision,
        config: &AutoOrderConfig,
        dry_run: bool,
    ) -> AutoOrderResult {
        let _span = info_span!("auto_order_evaluate", sku = %decision.sku).entered();

        // ── 1. Gate switched off ─────────────────────────────
        if dry_run || config.dry_run {
            return deny("dry run", None);
        }
        if !config.enabled {
            return deny("auto-ordering disabled", None);
        }

        // ── 2. Nothing to order ──────────────────────────────
        let Some(ref vendor) = decision.vendor else {
            return deny("no vendor selected", None);
        };
        if !decision.needs_reorder || decision.quantity == 0 {
            return deny("no reorder needed", None);
        }

        // ── 3. Value threshold ───────────────────────────────
        if decision.order_value.is_nan() || decision.order_value >= config.order_value_threshold {
            info!(
                order_value = decision.order_value,
                threshold = config.order_value_threshold,
                "order value at or above threshold, approval required"
            );
            return deny(
                &format!(
                    "order value ${:.2} not below ${:.2}",
                    decision.order_value, config.order_value_threshold
                ),
                None,
            );
        }

        // ── 4. Vendor trust ──────────────────────────────────
        let trust = config.trust_for(vendor);
        if trust < config.trust_threshold {
            info!(
                vendor = %vendor,
                trust,
                threshold = config.trust_threshold,
                "vendor trust below threshold, approval required"
            );
            return deny(
                &format!("vendor trust {trust:.2} below {:.2}", config.trust_threshold),
                Some(trust),
            );
        }

        info!(vendor = %vendor, trust, "auto-order approved");
        AutoOrderResult {
            auto_approved: true,
            reason: format!(
                "order value ${:.2} below ${:.2} and vendor trust {trust:.2}",
                decision.order_value, config.order_value_threshold
            ),
            trust: Some(trust),
        }
    }
}

fn deny(reason: &str, trust: Option<f64>) -> AutoOrderResult {
    AutoOrderResult {
        auto_approved: false,
        reason: reason.to_owned(),
        trust,
    }
}
