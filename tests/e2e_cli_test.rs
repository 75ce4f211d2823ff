//! E2E tests for the autocost binary.
//!
//! Covers:
//! - Quickstart and invalid command handling
//! - Status, profiles and probe in JSON mode
//! - Trend over a billing export
//! - Error rendering and exit codes

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;

mod common;

use common::fixtures::{Workspace, day, export_row, export_series};
use common::logger::TestLogger;

fn autocost(ws: &Workspace) -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("autocost").unwrap();
    cmd.env_clear().envs(ws.vars());
    cmd
}

fn json_stdout(cmd: &mut Command) -> Value {
    let output = cmd.assert().success().get_output().stdout.clone();
    serde_json::from_slice(&output).unwrap()
}

#[test]
fn no_command_prints_quickstart() {
    let ws = Workspace::new();
    autocost(&ws)
        .assert()
        .success()
        .stdout(predicate::str::contains("QUICK START"));
}

#[test]
fn invalid_command_is_rejected() {
    let ws = Workspace::new();
    autocost(&ws)
        .arg("notacommand")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized").or(predicate::str::contains("error")));
}

#[test]
fn status_json_reports_ready_provider() {
    let log = TestLogger::new("status_json_reports_ready_provider");
    let ws = Workspace::new().with_aws_profiles();

    log.phase("execute");
    let json = json_stdout(autocost(&ws).args(["--json", "status"]));

    log.phase("verify");
    assert_eq!(json["schemaVersion"], "autocost.v1");
    assert_eq!(json["command"], "status");
    let providers = json["data"]["providers"].as_array().unwrap();
    assert_eq!(providers.len(), 1);
    assert_eq!(providers[0]["provider"], "aws");
    assert_eq!(providers[0]["state"], "ready");
    log.finish_ok();
}

#[test]
fn status_without_credentials_is_disabled() {
    let ws = Workspace::new();
    autocost(&ws)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("disabled"));
}

#[test]
fn profiles_list_marks_current_profile() {
    let ws = Workspace::new().with_aws_profiles();
    autocost(&ws)
        .args(["profiles", "list", "--provider", "aws"])
        .assert()
        .success()
        .stdout(predicate::str::contains("* default"))
        .stdout(predicate::str::contains("broken"));
}

#[test]
fn unknown_profile_exits_with_config_error() {
    let ws = Workspace::new().with_aws_profiles();
    autocost(&ws)
        .args(["--json", "probe", "--provider", "aws", "--profile", "nonexistent-profile"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("ACST-C001"));
}

#[test]
fn probe_reads_capabilities_from_export_datasets() {
    let ws = Workspace::new().with_aws_profiles();
    ws.write_export("aws", &export_series("service:AmazonEC2", &[1.0]));

    let json = json_stdout(autocost(&ws).args(["--json", "probe", "--provider", "aws"]));
    let verdicts = json["data"]["verdicts"].as_array().unwrap();
    assert_eq!(verdicts[0]["capability"], "cost_explorer");
    assert_eq!(verdicts[0]["outcome"], "allowed");
    assert!(verdicts[1..].iter().all(|v| v["outcome"] == "indeterminate"));
}

#[test]
fn trend_over_export_is_rising() {
    let log = TestLogger::new("trend_over_export_is_rising");
    let ws = Workspace::new().with_aws_profiles();
    let mut rows = export_series("service:AmazonEC2", &[10.0, 10.0, 10.0]);
    rows.push(export_row("service:AmazonEC2", day(3), 30.0));
    ws.write_export("aws", &rows);

    log.phase("execute");
    let json = json_stdout(autocost(&ws).args([
        "--json",
        "trend",
        "--provider",
        "aws",
        "--window",
        "3",
        "--as-of",
        day(3).to_string().as_str(),
    ]));

    log.phase("verify");
    assert_eq!(json["command"], "trend");
    assert_eq!(json["data"]["records"], 4);
    assert_eq!(json["data"]["result"]["direction"], "rising");
    assert_eq!(json["data"]["context"]["profile"], "default");
    log.finish_ok();
}

#[test]
fn trend_with_too_little_history_suggests_more_days() {
    let ws = Workspace::new().with_aws_profiles();
    ws.write_export("aws", &export_series("service:AmazonEC2", &[10.0, 10.0]));

    autocost(&ws)
        .args([
            "trend",
            "--provider",
            "aws",
            "--window",
            "3",
            "--as-of",
            day(1).to_string().as_str(),
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--days"));
}

#[test]
fn session_capture_then_clear() {
    let ws = Workspace::new().with_aws_profiles();

    autocost(&ws)
        .args(["session", "capture", "--provider", "aws", "--profile", "dev"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Captured"));
    assert!(ws.sessions_dir().join("aws-session.json").exists());

    let json = json_stdout(autocost(&ws).args(["--json", "session", "status"]));
    assert_eq!(json["data"]["present"], true);

    autocost(&ws)
        .args(["session", "clear"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cleared"));
    assert!(!ws.sessions_dir().join("aws-session.json").exists());
}

#[test]
fn disabled_provider_is_rejected() {
    let ws = Workspace::new().with_aws_profiles();
    autocost(&ws)
        .args(["profiles", "list", "--provider", "gcp"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("AUTOCOST_PROVIDERS"));
}
