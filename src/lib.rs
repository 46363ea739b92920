#![forbid(unsafe_code)]

pub mod actions;
pub mod collaborators;
pub mod config;
pub mod errors;
pub mod http;
pub mod models;
pub mod orchestrator;
pub mod outbox;
pub mod persistence;
pub mod policy;
pub mod workflow;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
