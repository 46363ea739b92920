use std::time::Duration;

use reorder_gate::config::{GlobalConfig, WEBHOOK_SECRET_ENV};

fn minimal_toml(data_dir: &str) -> String {
    format!(
        r#"
data_dir = '{data_dir}'
approval_recipient = "ops@example.com"
"#
    )
}

fn sample_toml(data_dir: &str) -> String {
    format!(
        r#"
data_dir = '{data_dir}'
snapshot_path = '{data_dir}/snapshot.json'
http_port = 9090
webhook_base_url = "https://reorder.example.com/"
approval_recipient = "ops@example.com"

[policy]
safety_margin_days = 5
min_order_qty = 12
target_stock_days = 45
transaction_window_days = 60

[auto_order]
enabled = true
order_value_threshold = 250.0
trust_threshold = 0.9
default_trust = 0.5

[auto_order.vendor_trust]
acme = 0.95

[timeouts]
collaborator_seconds = 3
cycle_interval_seconds = 900

[approval]
max_attempts = 3

[notifier]
webhook_url = "https://hooks.example.com/approvals"
"#
    )
}

#[test]
fn minimal_config_uses_defaults() {
    let temp = tempfile::tempdir().expect("tempdir");
    let toml = minimal_toml(temp.path().to_str().expect("utf8 path"));

    let config = GlobalConfig::from_toml_str(&toml).expect("config parses");

    assert_eq!(config.http_port, 8080);
    assert_eq!(config.webhook_base_url, "http://localhost:8080");
    assert_eq!(config.policy.safety_margin_days, 7);
    assert_eq!(config.policy.min_order_qty, 1);
    assert_eq!(config.policy.target_stock_days, 30);
    assert_eq!(config.policy.transaction_window_days, 90);
    assert!(config.auto_order.enabled);
    assert!((config.auto_order.order_value_threshold - 500.0).abs() < f64::EPSILON);
    assert_eq!(config.approval.max_attempts, 2);
    assert_eq!(config.timeouts.collaborator(), Duration::from_secs(10));
    assert_eq!(config.timeouts.cycle_interval(), Duration::from_secs(3600));
    assert!(config.snapshot_path.is_none());
    assert!(config.notifier.webhook_url.is_none());
    assert!(
        config.webhook_secret.is_empty(),
        "webhook_secret is not populated from TOML"
    );
}

#[test]
fn parses_full_config() {
    let temp = tempfile::tempdir().expect("tempdir");
    let toml = sample_toml(temp.path().to_str().expect("utf8 path"));

    let config = GlobalConfig::from_toml_str(&toml).expect("config parses");

    assert_eq!(config.http_port, 9090);
    assert_eq!(config.policy.safety_margin_days, 5);
    assert_eq!(config.policy.min_order_qty, 12);
    assert_eq!(config.approval.max_attempts, 3);
    assert_eq!(config.timeouts.collaborator(), Duration::from_secs(3));
    assert_eq!(
        config.notifier.webhook_url.as_deref(),
        Some("https://hooks.example.com/approvals")
    );
    assert!((config.auto_order.trust_for("ACME") - 0.95).abs() < f64::EPSILON);
    assert!((config.auto_order.trust_for("Unknown") - 0.5).abs() < f64::EPSILON);
}

#[test]
fn derived_paths_live_under_data_dir() {
    let temp = tempfile::tempdir().expect("tempdir");
    let toml = minimal_toml(temp.path().to_str().expect("utf8 path"));
    let config = GlobalConfig::from_toml_str(&toml).expect("config parses");

    assert!(config.db_path().starts_with(temp.path()));
    assert!(config.json_fallback_path().starts_with(temp.path()));
    assert!(config.outbox_dir().starts_with(temp.path()));
    assert_ne!(config.db_path(), config.json_fallback_path());
}

#[test]
fn load_from_path_reads_file() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("config.toml");
    std::fs::write(&path, minimal_toml(temp.path().to_str().expect("utf8 path")))
        .expect("write config");

    let config = GlobalConfig::load_from_path(&path).expect("config loads");
    assert_eq!(config.approval_recipient, "ops@example.com");
}

#[test]
fn load_from_missing_path_is_config_error() {
    let temp = tempfile::tempdir().expect("tempdir");
    let err = GlobalConfig::load_from_path(temp.path().join("missing.toml"))
        .expect_err("missing file");
    assert!(err.to_string().starts_with("config:"));
}

#[test]
fn rejects_missing_recipient() {
    let result = GlobalConfig::from_toml_str("data_dir = '/tmp/reorder'\n");
    assert!(result.is_err());
}

#[test]
fn rejects_blank_recipient() {
    let toml = "data_dir = '/tmp/reorder'\napproval_recipient = '  '\n";
    let err = GlobalConfig::from_toml_str(toml).expect_err("blank recipient");
    assert!(err.to_string().contains("approval_recipient"));
}

#[test]
fn rejects_invalid_field_type() {
    let toml = "data_dir = '/tmp/reorder'\napproval_recipient = 'ops'\nhttp_port = 'eighty'\n";
    assert!(GlobalConfig::from_toml_str(toml).is_err());
}

#[test]
fn rejects_out_of_range_values() {
    let base = "data_dir = '/tmp/reorder'\napproval_recipient = 'ops'\n";
    for extra in [
        "[policy]\ntransaction_window_days = 0\n",
        "[approval]\nmax_attempts = 0\n",
        "[auto_order]\ntrust_threshold = 1.5\n",
        "[auto_order]\norder_value_threshold = -1.0\n",
        "[timeouts]\ncollaborator_seconds = 0\n",
    ] {
        let toml = format!("{base}{extra}");
        let err = GlobalConfig::from_toml_str(&toml).expect_err(extra);
        assert!(err.to_string().starts_with("config:"), "{extra}: {err}");
    }
}

/// Env-var fallback when the keychain has no entry for the service.
///
/// Mutates process-global env vars, so it runs serially.
#[tokio::test]
#[serial_test::serial]
#[allow(unsafe_code)]
async fn webhook_secret_falls_back_to_env() {
    let temp = tempfile::tempdir().expect("tempdir");
    let toml = minimal_toml(temp.path().to_str().expect("utf8 path"));
    let mut config = GlobalConfig::from_toml_str(&toml).expect("config parses");

    unsafe {
        std::env::set_var(WEBHOOK_SECRET_ENV, "s3cret");
    }
    let result = config.load_credentials().await;
    unsafe {
        std::env::remove_var(WEBHOOK_SECRET_ENV);
    }

    result.expect("credentials load");
    assert_eq!(config.webhook_secret, "s3cret");
}

#[tokio::test]
#[serial_test::serial]
#[allow(unsafe_code)]
async fn missing_webhook_secret_names_env_var() {
    let temp = tempfile::tempdir().expect("tempdir");
    let toml = minimal_toml(temp.path().to_str().expect("utf8 path"));
    let mut config = GlobalConfig::from_toml_str(&toml).expect("config parses");

    unsafe {
        std::env::set_var(WEBHOOK_SECRET_ENV, "");
    }
    let err = config.load_credentials().await.expect_err("no secret");
    unsafe {
        std::env::remove_var(WEBHOOK_SECRET_ENV);
    }

    assert!(err.to_string().contains(WEBHOOK_SECRET_ENV));
}
