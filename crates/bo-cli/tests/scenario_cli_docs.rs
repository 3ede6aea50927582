//! `bo docs ...` renders PDFs from JSON records.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

#[test]
fn collaborator_sheet_pdf_is_written() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("lea.json");
    let output = dir.path().join("lea.pdf");
    std::fs::write(
        &input,
        r#"{"first_name": "Léa", "last_name": "Martin", "job_title": "Comptable", "email": "lea@example.fr"}"#,
    )
    .unwrap();

    Command::cargo_bin("bo")
        .unwrap()
        .env_remove("BO_CONFIG")
        .args([
            "docs",
            "collaborator",
            "--input",
            input.to_str().unwrap(),
            "--output",
            output.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("document=collaborator"))
        .stdout(predicate::str::contains("pages=1"));

    let bytes = std::fs::read(&output).unwrap();
    let doc = lopdf::Document::load_mem(&bytes).expect("valid pdf");
    assert_eq!(doc.get_pages().len(), 1);
}

#[test]
fn contract_rejects_malformed_json() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("k.json");
    std::fs::write(&input, "{ not json").unwrap();

    Command::cargo_bin("bo")
        .unwrap()
        .env_remove("BO_CONFIG")
        .args([
            "docs",
            "contract",
            "--input",
            input.to_str().unwrap(),
            "--output",
            dir.path().join("k.pdf").to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid contract json"));
}

#[test]
fn unknown_timezone_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("k.json");
    let cfg = dir.path().join("docs.yaml");
    std::fs::write(&input, "{}").unwrap();
    std::fs::write(&cfg, "documents:\n  timezone: Mars/Olympus\n").unwrap();

    Command::cargo_bin("bo")
        .unwrap()
        .env_remove("BO_CONFIG")
        .args([
            "docs",
            "contract",
            "--input",
            input.to_str().unwrap(),
            "--output",
            dir.path().join("k.pdf").to_str().unwrap(),
            "--config",
            cfg.to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown timezone 'Mars/Olympus'"));
}
