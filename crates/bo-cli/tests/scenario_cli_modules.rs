//! `bo modules ...` end to end through the binary.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

fn bo() -> Command {
    let mut cmd = Command::cargo_bin("bo").expect("bo binary");
    cmd.env_remove("BO_CONFIG");
    cmd
}

fn stdout_json(cmd: &mut Command) -> serde_json::Value {
    let out = cmd.output().expect("run bo");
    assert!(
        out.status.success(),
        "bo failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    serde_json::from_slice(&out.stdout).expect("stdout is json")
}

#[test]
fn reconcile_turns_mapped_feature_on_and_keeps_unrelated_prior() {
    let v = stdout_json(bo().args([
        "modules",
        "reconcile",
        "--features",
        r#"{"accounting": true, "payroll": false}"#,
        "--prior",
        r#"{"finance": false, "clients": true, "collaborators": true}"#,
        "--plan",
        "Pro",
    ]));

    assert_eq!(v["outcome"], "changed");
    assert_eq!(
        v["result"],
        serde_json::json!({"clients": true, "collaborators": true, "finance": true})
    );
    assert_eq!(v["changes"].as_array().map(Vec::len), Some(1));
    assert_eq!(v["changes"][0]["code"], "finance");
}

#[test]
fn reconcile_without_features_is_no_plan() {
    let v = stdout_json(bo().args([
        "modules",
        "reconcile",
        "--prior",
        r#"{"finance": true}"#,
        "--plan",
        "Enterprise",
    ]));
    assert_eq!(v["outcome"], "no_plan");
    assert_eq!(v["result"], serde_json::json!({"finance": true}));
}

#[test]
fn reconcile_non_object_features_is_no_plan() {
    for bad in [r#""corrupted""#, r#"["finance"]"#, "7"] {
        let v = stdout_json(bo().args([
            "modules",
            "reconcile",
            "--features",
            bad,
            "--prior",
            r#"{"finance": false}"#,
            "--plan",
            "Enterprise",
        ]));
        assert_eq!(v["outcome"], "no_plan", "--features {bad}");
        assert_eq!(v["result"], serde_json::json!({"finance": false}));
    }
}

#[test]
fn reconcile_enterprise_plan_never_sets_settings() {
    let v = stdout_json(bo().args([
        "modules",
        "reconcile",
        "--features",
        "{}",
        "--plan",
        "Entreprise",
    ]));
    assert_eq!(v["enterprise_override"], true);
    assert_eq!(v["result"]["collaborators"], true);
    assert!(v["result"].get("settings").is_none());
}

#[test]
fn reconcile_reads_feature_map_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = dir.path().join("modules.yaml");
    std::fs::write(
        &cfg,
        "modules:\n  feature_map:\n    crm: clients\n",
    )
    .unwrap();

    let v = stdout_json(bo().args([
        "modules",
        "reconcile",
        "--features",
        r#"{"crm": true}"#,
        "--config",
        cfg.to_str().unwrap(),
    ]));
    assert_eq!(v["result"]["clients"], true);
    assert!(v["result"].get("crm").is_none());
}

#[test]
fn reconcile_rejects_invalid_json() {
    bo().args(["modules", "reconcile", "--features", "{oops"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--features must be valid JSON"));
}

#[test]
fn migrate_folds_legacy_keys() {
    let v = stdout_json(bo().args([
        "modules",
        "migrate",
        "--modules",
        r#"{"collaborateurs": true, "clients": false}"#,
    ]));
    assert_eq!(
        v["modules"],
        serde_json::json!({"clients": false, "collaborators": true})
    );
    assert_eq!(v["renamed"][0]["from"], "collaborateurs");
}

#[test]
fn sync_rejects_bad_client_id() {
    bo().args(["modules", "sync", "--client-id", "not-a-uuid", "--config", "unused.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid client_id uuid"));
}

#[test]
fn sync_fails_closed_without_backend_credentials() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = dir.path().join("base.yaml");
    std::fs::write(
        &cfg,
        "backend:\n  keys_env:\n    api_key: BO_CLI_SENTINEL_APIKEY_MISSING_C7\n    database_url: BO_CLI_SENTINEL_DBURL_MISSING_C7\n",
    )
    .unwrap();

    bo().args([
        "modules",
        "sync",
        "--client-id",
        "6f1c2d8e-5b1a-4c3e-9d2f-0a1b2c3d4e5f",
        "--config",
        cfg.to_str().unwrap(),
    ])
    .assert()
    .failure()
    .stderr(predicate::str::contains("SECRETS_MISSING mode=SYNC"));
}

#[test]
fn config_hash_is_stable_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("base.yaml");
    std::fs::write(&base, "sync:\n  write_back: true\nmodules:\n  reserved: [settings]\n").unwrap();

    let run = || {
        let out = bo()
            .args(["config-hash", base.to_str().unwrap()])
            .output()
            .unwrap();
        assert!(out.status.success());
        String::from_utf8(out.stdout).unwrap()
    };
    let a = run();
    assert!(a.starts_with("config_hash="));
    assert_eq!(a, run());
}

#[test]
fn sync_write_back_failure_is_reported_once() {
    use httpmock::prelude::*;

    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/rest/v1/rpc/get_active_subscription");
        then.status(200).json_body(serde_json::json!([{
            "plan_id": "9a2e4d6c-1b3f-4e5a-8c7d-6f0e1a2b3c4d",
            "plan_name": "Basic",
            "features": { "accounting": true }
        }]));
    });
    server.mock(|when, then| {
        when.method(POST).path("/rest/v1/rpc/get_member_space_modules");
        then.status(200).json_body(serde_json::json!({ "clients": true }));
    });
    server.mock(|when, then| {
        when.method(POST).path("/rest/v1/rpc/sync_modules_from_plan");
        then.status(500)
            .json_body(serde_json::json!({ "code": "XX000", "message": "boom" }));
    });

    let dir = tempfile::tempdir().unwrap();
    let cfg = dir.path().join("base.yaml");
    std::fs::write(
        &cfg,
        format!(
            "backend:\n  url: {}\n  keys_env:\n    api_key: BO_CLI_SENTINEL_APIKEY_SYNC_D4\n    database_url: BO_CLI_SENTINEL_DBURL_MISSING_D4\n",
            server.base_url()
        ),
    )
    .unwrap();

    let out = bo()
        .env_remove("RUST_LOG")
        .env("BO_CLI_SENTINEL_APIKEY_SYNC_D4", "test-anon-key")
        .args([
            "modules",
            "sync",
            "--client-id",
            "6f1c2d8e-5b1a-4c3e-9d2f-0a1b2c3d4e5f",
            "--config",
            cfg.to_str().unwrap(),
        ])
        .output()
        .expect("run bo");
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("stdout is json");
    assert_eq!(v["write_back"]["status"], "failed");
    assert_eq!(v["modules"]["finance"], true);
    assert_eq!(v["modules"]["clients"], true);

    let stderr = String::from_utf8_lossy(&out.stderr);
    assert_eq!(stderr.matches("module write-back failed").count(), 1, "{stderr}");
}
