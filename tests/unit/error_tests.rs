//! Unit tests for `AppError` display format and status mapping.

use reorder_gate::AppError;

#[test]
fn display_prefixes_each_kind() {
    let cases = [
        (AppError::Config("x".into()), "config: x"),
        (AppError::Db("x".into()), "db: x"),
        (AppError::Io("x".into()), "io: x"),
        (AppError::Input("x".into()), "input: x"),
        (AppError::NotFound("x".into()), "not found: x"),
        (AppError::Unauthorized("x".into()), "unauthorized: x"),
        (AppError::Downstream("x".into()), "downstream: x"),
        (AppError::Timeout("x".into()), "timeout: x"),
        (AppError::Outbox("x".into()), "outbox: x"),
    ];
    for (err, expected) in cases {
        assert_eq!(err.to_string(), expected);
    }
}

#[test]
fn error_message_no_trailing_period() {
    let err = AppError::Downstream("supplier unavailable".into());
    let s = err.to_string();
    assert!(!s.ends_with('.'), "error message must not end with a period: {s}");
}

#[test]
fn http_status_mapping() {
    assert_eq!(AppError::Input("bad".into()).http_status(), 400);
    assert_eq!(AppError::Unauthorized("bad".into()).http_status(), 403);
    assert_eq!(AppError::NotFound("gone".into()).http_status(), 404);
    assert_eq!(AppError::Downstream("boom".into()).http_status(), 500);
    assert_eq!(AppError::Timeout("slow".into()).http_status(), 500);
    assert_eq!(AppError::Db("locked".into()).http_status(), 500);
}

#[test]
fn converts_from_library_errors() {
    let toml_err = toml::from_str::<toml::Value>("= nope").expect_err("invalid toml");
    assert!(AppError::from(toml_err).to_string().starts_with("config:"));

    let json_err = serde_json::from_str::<serde_json::Value>("{").expect_err("invalid json");
    assert!(AppError::from(json_err).to_string().starts_with("io: json:"));

    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
    assert_eq!(AppError::from(io_err).to_string(), "io: missing");
}

#[test]
fn implements_std_error_trait() {
    fn assert_error<E: std::error::Error>(_: &E) {}
    let err = AppError::Timeout("place_order".into());
    assert_error(&err);
    assert!(format!("{err:?}").contains("Timeout"));
}
