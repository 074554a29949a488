//! End-to-end tests for the `billing` CLI.
//!
//! Each test points the binary at its own database through
//! `BILLING__DATABASE__PATH` and runs inside a temporary directory.

use assert_cmd::Command;
use chrono::Local;
use medicaid_billing::{
    export_filename, insert_billing_entries, list_billing_entries, open_database,
    ContractConstants, RawBillingEntry, RECORD_LENGTH,
};
use predicates::prelude::*;
use serde_json::json;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const RECIPIENTS_CSV: &str = "\
Last_Name,First_Name,Medicaid_ID,Work_Service_Code,Trip_Service_Code
Smith,Jane,123456789012,ADF,ATB
Jones,Bo,210987654321,fvf,
Brown,Al,999,ADF,
";

fn billing(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("billing").unwrap();
    cmd.current_dir(dir.path())
        .env("BILLING__DATABASE__PATH", dir.path().join("billing.db"))
        .env_remove("RUST_LOG");
    cmd
}

fn import_recipients(dir: &TempDir) {
    let csv_path = dir.path().join("recipients.csv");
    fs::write(&csv_path, RECIPIENTS_CSV).unwrap();
    billing(dir)
        .arg("import-recipients")
        .arg(&csv_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported 2 recipients"))
        .stdout(predicate::str::contains("Rejected 1 rows"));
}

fn add_entries(db_path: &Path, entries: serde_json::Value) {
    let conn = open_database(db_path).unwrap();
    let entries: Vec<RawBillingEntry> = serde_json::from_value(entries).unwrap();
    insert_billing_entries(&conn, entries).unwrap();
}

#[test]
fn test_no_arguments_prints_usage() {
    let dir = TempDir::new().unwrap();
    billing(&dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage: billing"));
}

#[test]
fn test_unknown_command_fails() {
    let dir = TempDir::new().unwrap();
    billing(&dir)
        .arg("frobnicate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown command 'frobnicate'"));
}

#[test]
fn test_init_creates_database() {
    let dir = TempDir::new().unwrap();
    billing(&dir).arg("init").assert().success();
    assert!(dir.path().join("billing.db").exists());
}

#[test]
fn test_preview_prints_records_and_skips() {
    let dir = TempDir::new().unwrap();
    import_recipients(&dir);
    add_entries(
        &dir.path().join("billing.db"),
        json!([
            {"recipient_id": 1, "date": "03/15/24", "work_units": "5", "trip_units": "1"},
            {"recipient_id": 1, "date": "2024-03-16", "work_units": "5"},
            {"recipient_id": 40, "date": "03/17/24", "work_units": "5"}
        ]),
    );

    let output = billing(&dir).arg("preview").assert().success().get_output().clone();
    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines.iter().all(|l| l.len() == RECORD_LENGTH));
    assert!(lines[0].contains("SMITHJ"));

    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("skipped entry 2"));
    assert!(stderr.contains("missing recipient 40"));
}

#[test]
fn test_export_writes_named_file_and_clears() {
    let dir = TempDir::new().unwrap();
    import_recipients(&dir);
    let db_path = dir.path().join("billing.db");
    add_entries(
        &db_path,
        json!([
            {"recipient_id": 1, "date": "03/15/24", "work_units": 5},
            {"recipient_id": 2, "date": "03/15/24", "work_units": 3, "trip_units": ""}
        ]),
    );

    billing(&dir)
        .args(["export", "out", "--clear"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote 2 records"))
        .stdout(predicate::str::contains("Cleared 2 billing entries"));

    let filename = export_filename(Local::now().date_naive(), &ContractConstants::default());
    let content = fs::read_to_string(dir.path().join("out").join(filename)).unwrap();
    assert_eq!(content.lines().count(), 2);
    assert!(content.ends_with('\n'));

    let conn = open_database(&db_path).unwrap();
    assert!(list_billing_entries(&conn).unwrap().is_empty());
}

#[test]
fn test_export_without_clear_keeps_entries() {
    let dir = TempDir::new().unwrap();
    import_recipients(&dir);
    let db_path = dir.path().join("billing.db");
    add_entries(&db_path, json!([{"recipient_id": 1, "date": "03/15/24", "trip_units": 2}]));

    billing(&dir).arg("export").assert().success();
    billing(&dir)
        .arg("clear")
        .assert()
        .success()
        .stdout(predicate::str::contains("Cleared 1 billing entries"));
}

#[test]
fn test_contract_number_from_environment() {
    let dir = TempDir::new().unwrap();
    billing(&dir)
        .env("BILLING__CONTRACT__CONTRACT_NUMBER", "123")
        .arg("preview")
        .assert()
        .failure()
        .stderr(predicate::str::contains("contract_number"));
}
