//! Decision cycle orchestration.
//!
//! Covers a single evaluation pass over the inventory and the periodic
//! scheduler that repeats it.

pub mod cycle;
pub mod scheduler;

pub use cycle::{CycleSummary, ReorderCycle};
