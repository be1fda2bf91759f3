//! CLI integration tests using assert_cmd.
//!
//! These tests invoke the actual `jobc` binary and verify its output.

use assert_cmd::Command;
use predicates::prelude::*;

#[allow(deprecated)]
fn jobc_cmd() -> Command {
    Command::cargo_bin("jobc").expect("binary should exist")
}

#[test]
fn test_version_flag() {
    jobc_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.1.0"));
}

#[test]
fn test_help_flag() {
    jobc_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Job Collector"))
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("ingest"))
        .stdout(predicate::str::contains("jobs"))
        .stdout(predicate::str::contains("search"))
        .stdout(predicate::str::contains("searches"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("new"));
}

#[test]
fn test_serve_help() {
    jobc_cmd()
        .args(["serve", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--config"))
        .stdout(predicate::str::contains("--data-dir"));
}

#[test]
fn test_search_help_shows_filters() {
    jobc_cmd()
        .args(["search", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--q"))
        .stdout(predicate::str::contains("--source"))
        .stdout(predicate::str::contains("--location"))
        .stdout(predicate::str::contains("--posted-after"))
        .stdout(predicate::str::contains("--json"));
}

#[test]
fn test_searches_help_lists_actions() {
    jobc_cmd()
        .args(["searches", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("show"))
        .stdout(predicate::str::contains("add"));
}

#[test]
fn test_no_subcommand_shows_help() {
    jobc_cmd()
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"));
}

#[test]
fn test_run_without_target_is_usage_error() {
    jobc_cmd()
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));
}

#[test]
fn test_status_without_daemon_fails() {
    jobc_cmd()
        .args(["--port", "1", "status"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Could not connect"));
}
