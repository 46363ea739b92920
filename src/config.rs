//! Global configuration parsing, validation, and credential loading.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::{AppError, Result};

/// Keychain service name used for runtime secrets.
pub const KEYRING_SERVICE: &str = "reorder-gate";

/// Environment variable consulted when the keychain has no webhook secret.
pub const WEBHOOK_SECRET_ENV: &str = "REORDER_GATE_WEBHOOK_SECRET";

/// Reorder decision thresholds.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct PolicyConfig {
    /// Buffer days added to vendor lead time before a reorder triggers.
    #[serde(default = "default_safety_margin_days")]
    pub safety_margin_days: u32,
    /// Smallest quantity ever recommended.
    #[serde(default = "default_min_order_qty")]
    pub min_order_qty: u64,
    /// Days of demand a replenishment should cover.
    #[serde(default = "default_target_stock_days")]
    pub target_stock_days: u32,
    /// Trailing window of transaction history used for demand estimation.
    #[serde(default = "default_transaction_window_days")]
    pub transaction_window_days: u32,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            safety_margin_days: default_safety_margin_days(),
            min_order_qty: default_min_order_qty(),
            target_stock_days: default_target_stock_days(),
            transaction_window_days: default_transaction_window_days(),
        }
    }
}

fn default_safety_margin_days() -> u32 {
    7
}

fn default_min_order_qty() -> u64 {
    1
}

fn default_target_stock_days() -> u32 {
    30
}

fn default_transaction_window_days() -> u32 {
    90
}

/// Automatic-approval rule thresholds.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct AutoOrderConfig {
    /// Whether orders may be placed without human approval at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Orders whose value is strictly below this amount may be auto-placed.
    #[serde(default = "default_auto_order_threshold")]
    pub order_value_threshold: f64,
    /// Minimum vendor trust score for auto-placement.
    #[serde(default = "default_trust_threshold")]
    pub trust_threshold: f64,
    /// Trust score assumed for vendors absent from `vendor_trust`.
    #[serde(default = "default_trust_threshold")]
    pub default_trust: f64,
    /// Per-vendor trust scores keyed by lowercase vendor name.
    #[serde(default)]
    pub vendor_trust: HashMap<String, f64>,
    /// Evaluate and collect approvals but never place orders automatically.
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for AutoOrderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            order_value_threshold: default_auto_order_threshold(),
            trust_threshold: default_trust_threshold(),
            default_trust: default_trust_threshold(),
            vendor_trust: HashMap::new(),
            dry_run: false,
        }
    }
}

impl AutoOrderConfig {
    /// Trust score for `vendor`, falling back to `default_trust`.
    #[must_use]
    pub fn trust_for(&self, vendor: &str) -> f64 {
        self.vendor_trust
            .get(&vendor.to_lowercase())
            .copied()
            .unwrap_or(self.default_trust)
    }
}

fn default_true() -> bool {
    true
}

fn default_auto_order_threshold() -> f64 {
    500.0
}

fn default_trust_threshold() -> f64 {
    0.8
}

/// Configurable timeout values (seconds).
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct TimeoutConfig {
    /// Upper bound for any single call into an external collaborator.
    #[serde(default = "default_collaborator_seconds")]
    pub collaborator_seconds: u64,
    /// Interval between scheduled decision cycles.
    #[serde(default = "default_cycle_interval_seconds")]
    pub cycle_interval_seconds: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            collaborator_seconds: default_collaborator_seconds(),
            cycle_interval_seconds: default_cycle_interval_seconds(),
        }
    }
}

impl TimeoutConfig {
    /// Collaborator call budget as a [`Duration`].
    #[must_use]
    pub fn collaborator(&self) -> Duration {
        Duration::from_secs(self.collaborator_seconds)
    }

    /// Scheduler interval as a [`Duration`].
    #[must_use]
    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.cycle_interval_seconds)
    }
}

fn default_collaborator_seconds() -> u64 {
    10
}

fn default_cycle_interval_seconds() -> u64 {
    3600
}

/// Approval gate settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ApprovalConfig {
    /// Total order-placement attempts allowed per single-item token.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_max_attempts() -> u32 {
    2
}

/// Outbound approval notification settings.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct NotifierConfig {
    /// When set, approval requests are POSTed as JSON to this URL.
    #[serde(default)]
    pub webhook_url: Option<String>,
}

fn default_http_port() -> u16 {
    8080
}

fn default_webhook_base_url() -> String {
    "http://localhost:8080".into()
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Directory holding the pending-action database, JSON fallback and outbox.
    pub data_dir: PathBuf,
    /// JSON snapshot consumed by the file-backed inventory source.
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
    /// HTTP port for the approval callback server.
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Public base URL used when building approve/reject links.
    #[serde(default = "default_webhook_base_url")]
    pub webhook_base_url: String,
    /// Recipient of approval notifications.
    pub approval_recipient: String,
    /// Reorder decision thresholds.
    #[serde(default)]
    pub policy: PolicyConfig,
    /// Automatic-approval rule.
    #[serde(default)]
    pub auto_order: AutoOrderConfig,
    /// Timeout configuration.
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    /// Approval gate settings.
    #[serde(default)]
    pub approval: ApprovalConfig,
    /// Notification settings.
    #[serde(default)]
    pub notifier: NotifierConfig,
    /// Shared secret presented by approval callbacks (populated at runtime).
    #[serde(skip)]
    pub webhook_secret: String,
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string and validate it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the webhook secret from OS keychain with env-var fallback.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if neither source provides a non-empty value.
    pub async fn load_credentials(&mut self) -> Result<()> {
        self.webhook_secret = load_credential("webhook_secret", WEBHOOK_SECRET_ENV).await?;
        Ok(())
    }

    /// Path of the primary `SQLite` database.
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("pending_actions.db")
    }

    /// Path of the JSON fallback document.
    #[must_use]
    pub fn json_fallback_path(&self) -> PathBuf {
        self.data_dir.join("pending_actions.json")
    }

    /// Directory of the recompute outbox.
    #[must_use]
    pub fn outbox_dir(&self) -> PathBuf {
        self.data_dir.join("outbox")
    }

    /// Directory of the daily action log files.
    #[must_use]
    pub fn actions_dir(&self) -> PathBuf {
        self.data_dir.join("actions")
    }

    fn validate(&self) -> Result<()> {
        if self.approval_recipient.trim().is_empty() {
            return Err(AppError::Config(
                "approval_recipient must not be empty".into(),
            ));
        }

        if self.policy.transaction_window_days == 0 {
            return Err(AppError::Config(
                "policy.transaction_window_days must be greater than zero".into(),
            ));
        }

        if self.approval.max_attempts == 0 {
            return Err(AppError::Config(
                "approval.max_attempts must be greater than zero".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.auto_order.trust_threshold) {
            return Err(AppError::Config(
                "auto_order.trust_threshold must be within 0.0..=1.0".into(),
            ));
        }

        if self.auto_order.order_value_threshold < 0.0 {
            return Err(AppError::Config(
                "auto_order.order_value_threshold must not be negative".into(),
            ));
        }

        if self.timeouts.collaborator_seconds == 0 || self.timeouts.cycle_interval_seconds == 0 {
            return Err(AppError::Config(
                "timeouts must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}

/// Load a single credential from OS keychain with env-var fallback.
async fn load_credential(keyring_key: &str, env_key: &str) -> Result<String> {
    let key = keyring_key.to_owned();

    // keyring is synchronous I/O.
    let keychain_result = tokio::task::spawn_blocking(move || {
        keyring::Entry::new(KEYRING_SERVICE, &key).and_then(|entry| entry.get_password())
    })
    .await
    .map_err(|err| AppError::Config(format!("keychain task panicked: {err}")))?;

    match keychain_result {
        Ok(value) if !value.is_empty() => return Ok(value),
        Ok(_) => {
            warn!(key = keyring_key, "keychain entry is empty, trying env var");
        }
        Err(err) => {
            warn!(
                key = keyring_key,
                ?err,
                "keychain lookup failed, trying env var"
            );
        }
    }

    match env::var(env_key) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(AppError::Config(format!(
            "credential {keyring_key} not found in keychain or {env_key} env var"
        ))),
    }
}
