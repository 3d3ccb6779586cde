//! CLI integration tests
//!
//! Smoke tests for the agent's flag surface using assert_cmd. The agent
//! itself is never started here; running it would hit the network.

use assert_cmd::Command;
use predicates::prelude::*;

fn sl_agent() -> Command {
    Command::cargo_bin("sl-agent")
        .expect("Failed to locate sl-agent binary - ensure it's built before running tests")
}

#[test]
fn test_cli_help() {
    sl_agent()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("screenlink agent"))
        .stdout(predicate::str::contains("--config"))
        .stdout(predicate::str::contains("--setup"));
}

#[test]
fn test_cli_help_lists_service_flags() {
    sl_agent()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--install-service"))
        .stdout(predicate::str::contains("--remove-service"))
        .stdout(predicate::str::contains("--start-service"))
        .stdout(predicate::str::contains("--stop-service"));
}

#[test]
fn test_cli_version() {
    sl_agent()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("sl-agent"));
}

#[test]
fn test_cli_unknown_flag() {
    sl_agent()
        .arg("--nonsense")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unexpected argument"));
}
