//! Integration tests for the `uhppoted` CLI binary.
//!
//! These exercise argument parsing, config handling and error exit codes
//! without talking to a real controller.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a command for the `uhppoted` binary with env isolation.
///
/// Clears `UHPPOTED_*` variables and points config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn uhppoted_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("uhppoted");
    cmd.env("HOME", "/tmp/uhppoted-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/uhppoted-cli-test-nonexistent")
        .env_remove("UHPPOTED_CONFIG")
        .env_remove("UHPPOTED_BIND")
        .env_remove("UHPPOTED_BROADCAST")
        .env_remove("UHPPOTED_LISTEN")
        .env_remove("UHPPOTED_TIMEOUT")
        .env_remove("UHPPOTED_OUTPUT")
        .env_remove("RUST_LOG");
    cmd
}

const CONFIG: &str = r#"
[transport]
timeout_ms = 200

[[controllers]]
serial = 405419896
name = "Alpha"
address = "127.0.0.1:1"

[[doors]]
name = "front"
controller = 405419896
door = 1
"#;

fn write_config(dir: &Path, contents: &str) -> std::path::PathBuf {
    let path = dir.join("config.toml");
    std::fs::write(&path, contents).unwrap();
    path
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = uhppoted_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    let text = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_lists_commands() {
    uhppoted_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("controllers")
            .and(predicate::str::contains("doors"))
            .and(predicate::str::contains("events"))
            .and(predicate::str::contains("watch")),
    );
}

#[test]
fn test_version_flag() {
    uhppoted_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("uhppoted"));
}

#[test]
fn test_completions_bash() {
    uhppoted_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path_honours_flag() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("custom.toml");
    uhppoted_cmd()
        .arg("--config")
        .arg(&path)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("custom.toml"));
}

#[test]
fn test_config_init_refuses_to_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");

    uhppoted_cmd()
        .arg("--config")
        .arg(&path)
        .args(["config", "init"])
        .assert()
        .success();
    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("405419896"));

    uhppoted_cmd()
        .arg("--config")
        .arg(&path)
        .args(["config", "init"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("already exists"));

    uhppoted_cmd()
        .arg("--config")
        .arg(&path)
        .args(["config", "init", "--force"])
        .assert()
        .success();
}

#[test]
fn test_config_show_applies_flag_overrides() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), CONFIG);

    uhppoted_cmd()
        .arg("--config")
        .arg(&path)
        .args(["--timeout", "750", "-o", "json", "config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("\"timeout_ms\": 750")
                .and(predicate::str::contains("\"name\": \"front\"")),
        );
}

#[test]
fn test_invalid_config_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        dir.path(),
        r#"
[[doors]]
name = "front"
controller = 1
door = 1
"#,
    );

    uhppoted_cmd()
        .arg("--config")
        .arg(&path)
        .args(["doors", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown controller"));
}

// ── Doors ───────────────────────────────────────────────────────────

#[test]
fn test_unknown_door_exits_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), CONFIG);

    uhppoted_cmd()
        .arg("--config")
        .arg(&path)
        .args(["doors", "unlock", "cellar"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("cellar"));
}

#[test]
fn test_delay_out_of_range_is_a_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), CONFIG);

    uhppoted_cmd()
        .arg("--config")
        .arg(&path)
        .args(["doors", "delay", "front", "61"])
        .assert()
        .code(2);
}

#[test]
fn test_unknown_mode_is_rejected() {
    uhppoted_cmd()
        .args(["doors", "mode", "front", "ajar"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("controlled"));
}
