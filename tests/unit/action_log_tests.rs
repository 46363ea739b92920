//! Unit tests for the JSONL action log.

use std::fs;

use chrono::Utc;

use reorder_gate::actions::{
    record_or_warn, ActionEntry, ActionEvent, ActionLog, JsonlActionLog,
};

fn action_log() -> (tempfile::TempDir, JsonlActionLog) {
    let dir = tempfile::tempdir().expect("tempdir");
    let log = JsonlActionLog::new(dir.path().join("actions")).expect("action log");
    (dir, log)
}

#[test]
fn failure_events_are_marked_failed() {
    let placed = ActionEntry::new(ActionEvent::AutoOrderPlaced, "A");
    let failed = ActionEntry::new(ActionEvent::AutoOrderFailed, "A");
    let error = ActionEntry::new(ActionEvent::ProcessError, "A");
    assert_eq!(placed.status, "success");
    assert_eq!(failed.status, "failed");
    assert_eq!(error.status, "failed");
    assert_eq!(ActionEntry::new(ActionEvent::Rejected, "A").status, "success");
}

#[test]
fn entries_are_appended_to_todays_file() {
    let (_dir, log) = action_log();
    let first = ActionEntry::new(ActionEvent::AutoOrderPlaced, "SKU-1")
        .with_order_line("Acme", 10, 100.0)
        .with_order_id("PO-1".to_owned());
    let second = ActionEntry::new(ActionEvent::ApprovalRequested, "SKU-2")
        .with_order_line("Acme", 209, 2090.0)
        .with_token("tok-1");
    log.record(first.clone()).expect("record");
    log.record(second.clone()).expect("record");

    let today = Utc::now().date_naive();
    let path = log.file_for(today);
    assert_eq!(
        path.file_name().and_then(|n| n.to_str()),
        Some(format!("actions-{today}.jsonl").as_str())
    );
    assert_eq!(log.read_day(today).expect("read"), vec![first, second]);
}

#[test]
fn events_serialize_in_snake_case() {
    let (_dir, log) = action_log();
    log.record(
        ActionEntry::new(ActionEvent::ProcessError, "SKU-3").with_detail("no vendors".to_owned()),
    )
    .expect("record");

    let raw = fs::read_to_string(log.file_for(Utc::now().date_naive())).expect("file");
    let value: serde_json::Value = serde_json::from_str(raw.trim()).expect("json line");
    assert_eq!(value["event"], "process_error");
    assert_eq!(value["status"], "failed");
    assert_eq!(value["sku"], "SKU-3");
    assert_eq!(value["detail"], "no vendors");
}

#[test]
fn missing_day_reads_empty_and_malformed_lines_are_skipped() {
    let (_dir, log) = action_log();
    let today = Utc::now().date_naive();
    assert!(log.read_day(today).expect("read").is_empty());

    let entry = ActionEntry::new(ActionEvent::Rejected, "SKU-4");
    let line = serde_json::to_string(&entry).expect("json");
    fs::write(log.file_for(today), format!("garbage\n\n{line}\n")).expect("write");
    assert_eq!(log.read_day(today).expect("read"), vec![entry]);
}

#[test]
fn record_or_warn_swallows_write_failures() {
    let (dir, log) = action_log();
    // Replace the directory with a file so the day file cannot be opened.
    fs::remove_dir_all(dir.path().join("actions")).expect("remove dir");
    fs::write(dir.path().join("actions"), "not a dir").expect("block dir");

    assert!(log
        .record(ActionEntry::new(ActionEvent::OrderFailed, "SKU-5"))
        .is_err());
    record_or_warn(&log, ActionEntry::new(ActionEvent::OrderFailed, "SKU-5"));
}
