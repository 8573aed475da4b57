//! Integration tests for the `airctl` CLI binary.
//!
//! These tests validate argument parsing, help output, shell completions,
//! config handling and error exit codes without a live broker.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `airctl` binary with env isolation.
///
/// Clears all `AIRCTL_*` env vars and points config directories at `home`
/// so tests never touch the user's real configuration.
fn airctl_cmd(home: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("airctl");
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env("NO_COLOR", "1")
        .env_remove("AIRCTL_PROFILE")
        .env_remove("AIRCTL_BROKER")
        .env_remove("AIRCTL_OUTPUT")
        .env_remove("AIRCTL_TIMEOUT")
        .env_remove("AIRCTL_USERNAME")
        .env_remove("AIRCTL_PASSWORD")
        .env_remove("AIRCTL_DEFAULT_PROFILE")
        .env_remove("RUST_LOG");
    cmd
}

fn write_config(home: &Path, contents: &str) {
    let dir = home.join(".config").join("airctl");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("config.toml"), contents).unwrap();
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let home = tempfile::tempdir().unwrap();
    let output = airctl_cmd(home.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    let home = tempfile::tempdir().unwrap();
    airctl_cmd(home.path()).arg("--help").assert().success().stdout(
        predicate::str::contains("control")
            .and(predicate::str::contains("schedules"))
            .and(predicate::str::contains("watch"))
            .and(predicate::str::contains("monitor")),
    );
}

#[test]
fn test_version_flag() {
    let home = tempfile::tempdir().unwrap();
    airctl_cmd(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("airctl"));
}

#[test]
fn test_schedules_subcommands_exist() {
    let home = tempfile::tempdir().unwrap();
    airctl_cmd(home.path())
        .args(["schedules", "--help"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("list")
                .and(predicate::str::contains("add"))
                .and(predicate::str::contains("edit"))
                .and(predicate::str::contains("enable"))
                .and(predicate::str::contains("disable"))
                .and(predicate::str::contains("delete")),
        );
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    let home = tempfile::tempdir().unwrap();
    airctl_cmd(home.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_completions_zsh() {
    let home = tempfile::tempdir().unwrap();
    airctl_cmd(home.path())
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

// ── Argument validation ─────────────────────────────────────────────

#[test]
fn test_invalid_subcommand() {
    let home = tempfile::tempdir().unwrap();
    let output = airctl_cmd(home.path()).arg("foobar").output().unwrap();
    assert!(!output.status.success(), "Expected failure for invalid subcommand");
    let text = combined_output(&output);
    assert!(
        text.contains("unrecognized") || text.contains("foobar"),
        "Expected error mentioning invalid subcommand:\n{text}"
    );
}

#[test]
fn test_control_rejects_unsupported_temperature() {
    let home = tempfile::tempdir().unwrap();
    airctl_cmd(home.path())
        .args(["control", "--power", "on", "--temp", "24"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("23, 25"));
}

#[test]
fn test_control_requires_power() {
    let home = tempfile::tempdir().unwrap();
    airctl_cmd(home.path())
        .args(["control", "--mode", "heat"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--power"));
}

#[test]
fn test_schedule_time_must_be_hh_mm() {
    let home = tempfile::tempdir().unwrap();
    airctl_cmd(home.path())
        .args(["schedules", "add", "--time", "7pm"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("HH:MM"));
}

#[test]
fn test_invalid_output_format() {
    let home = tempfile::tempdir().unwrap();
    let output = airctl_cmd(home.path())
        .args(["--output", "xml", "schedules", "list"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    let text = combined_output(&output);
    assert!(
        text.contains("invalid value") || text.contains("possible values"),
        "Expected error about valid output formats:\n{text}"
    );
}

// ── Missing or bad configuration ────────────────────────────────────

#[test]
fn test_schedules_list_without_config() {
    let home = tempfile::tempdir().unwrap();
    airctl_cmd(home.path())
        .args(["schedules", "list"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("airctl config init"));
}

#[test]
fn test_unknown_profile_lists_available() {
    let home = tempfile::tempdir().unwrap();
    write_config(
        home.path(),
        "[profiles.home]\nbroker = \"mqtts://broker.local:8883\"\nusername = \"remote\"\n",
    );
    airctl_cmd(home.path())
        .args(["--profile", "attic", "schedules", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("attic").and(predicate::str::contains("home")));
}

#[test]
fn test_missing_credentials_exit_code() {
    let home = tempfile::tempdir().unwrap();
    airctl_cmd(home.path())
        .args(["--broker", "mqtt://127.0.0.1:1", "schedules", "list"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("No credentials"));
}

#[test]
fn test_unsupported_broker_scheme() {
    let home = tempfile::tempdir().unwrap();
    airctl_cmd(home.path())
        .env("AIRCTL_PASSWORD", "secret")
        .args(["--broker", "ftp://broker.local", "-u", "remote", "schedules", "list"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unsupported scheme"));
}

#[test]
fn test_unreachable_broker_is_a_connection_error() {
    let home = tempfile::tempdir().unwrap();
    airctl_cmd(home.path())
        .env("AIRCTL_PASSWORD", "secret")
        .args([
            "--broker",
            "mqtt://127.0.0.1:1",
            "-u",
            "remote",
            "--connect-timeout",
            "1",
            "control",
            "--power",
            "off",
        ])
        .assert()
        .code(7)
        .stderr(predicate::str::contains("Could not reach broker"));
}

// ── Config subcommands ──────────────────────────────────────────────

#[test]
fn test_config_path_is_under_config_home() {
    let home = tempfile::tempdir().unwrap();
    let expected = home.path().join(".config").join("airctl").join("config.toml");
    airctl_cmd(home.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains(expected.display().to_string()));
}

#[test]
fn test_config_show_redacts_passwords() {
    let home = tempfile::tempdir().unwrap();
    write_config(
        home.path(),
        concat!(
            "default_profile = \"home\"\n\n",
            "[profiles.home]\n",
            "broker = \"wss://broker.example.com/mqtt\"\n",
            "username = \"remote\"\n",
            "password = \"hunter2\"\n",
        ),
    );
    airctl_cmd(home.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("wss://broker.example.com/mqtt")
                .and(predicate::str::contains("********"))
                .and(predicate::str::contains("hunter2").not()),
        );
}

#[test]
fn test_config_show_plain_lists_profiles() {
    let home = tempfile::tempdir().unwrap();
    write_config(
        home.path(),
        "[profiles.home]\nbroker = \"mqtt://a\"\n\n[profiles.lab]\nbroker = \"mqtt://b\"\n",
    );
    airctl_cmd(home.path())
        .args(["-o", "plain", "config", "show"])
        .assert()
        .success()
        .stdout("home\nlab\n");
}
