//! Trailing-average demand estimation.

use crate::models::inventory::Transaction;

/// Estimates daily demand from a trailing window of transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForecastEstimator {
    window_days: u32,
}

impl ForecastEstimator {
    /// Construct an estimator over a window of `window_days` (at least one).
    #[must_use]
    pub fn new(window_days: u32) -> Self {
        Self {
            window_days: window_days.max(1),
        }
    }

    /// Length of the trailing window in days.
    #[must_use]
    pub fn window_days(&self) -> u32 {
        self.window_days
    }

    /// Average daily consumption of `sku` across the window.
    ///
    /// Only outbound movements (negative quantities) count as demand.
    /// Returns exactly `0.0` when `sku` has no consumption, which marks a
    /// zero-demand item rather than an error.
    #[must_use]
    pub fn daily_average(&self, transactions: &[Transaction], sku: &str) -> f64 {
        let consumed: u64 = transactions
            .iter()
            .filter(|t| t.sku == sku && t.quantity < 0)
            .map(|t| t.quantity.unsigned_abs())
            .sum();

        if consumed == 0 {
            return 0.0;
        }

        #[allow(clippy::cast_precision_loss)] // Unit counts stay far below 2^52.
        let consumed = consumed as f64;
        consumed / f64::from(self.window_days)
    }

    /// Days until `on_hand` is exhausted at `daily_average`.
    ///
    /// Returns `f64::INFINITY` when demand is zero or negative.
    #[must_use]
    pub fn days_until_stockout(on_hand: u64, daily_average: f64) -> f64 {
        if daily_average <= 0.0 || !daily_average.is_finite() {
            return f64::INFINITY;
        }
        #[allow(clippy::cast_precision_loss)]
        let on_hand = on_hand as f64;
        on_hand / daily_average
    }
}
