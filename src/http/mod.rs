//! HTTP surface: health probe, one-click approval callbacks and the
//! operator status probe.

pub mod render;
pub mod server;

use std::sync::Arc;

use crate::workflow::ApprovalWorkflow;
use crate::GlobalConfig;

pub use server::{router, serve, serve_listener};

/// Shared state for request handlers.
pub struct AppState {
    /// Loaded configuration.
    pub config: Arc<GlobalConfig>,
    /// Approval workflow executing callbacks.
    pub workflow: Arc<ApprovalWorkflow>,
}
