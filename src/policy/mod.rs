//! Reorder policy modules.
//!
//! Provides demand forecasting, EOQ vendor selection, the per-SKU reorder
//! decision and the auto-order gate.

pub mod auto_order;
pub mod forecast;
pub mod optimizer;
pub mod reorder;
