//! Integration tests for the transient CLI surface: help, argument parsing
//! and configuration errors.

#![allow(clippy::expect_used)]

use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;

fn transient() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("transient"));
    cmd.env("NO_COLOR", "1")
        .env_remove("TRANSIENT_CONFIG")
        .env_remove("RUST_LOG");
    cmd
}

// --- Help and version tests ---

#[test]
fn test_cli_no_args_shows_help() {
    transient()
        .env_remove("NO_COLOR")
        .assert()
        .code(2)
        .stderr(predicate::str::contains(
            "Run throwaway QEMU virtual machines",
        ));
}

#[test]
fn test_no_color_accepts_conventional_values() {
    let store = tempfile::tempdir().expect("tempdir");
    for value in ["1", "true", "yes", ""] {
        transient()
            .env("NO_COLOR", value)
            .args(["list", "--json", "--image-backend"])
            .arg(store.path().join("backend"))
            .arg("--image-frontend")
            .arg(store.path().join("frontend"))
            .assert()
            .success()
            .stdout(predicate::str::diff("[]\n"));
    }
}

#[test]
fn test_cli_help_lists_subcommands() {
    transient()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("delete"));
}

#[test]
fn test_cli_version_flag_shows_version() {
    transient()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("transient"));
}

#[test]
fn test_run_help_documents_options() {
    transient()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--ssh-console"))
        .stdout(predicate::str::contains("--shared-folder"))
        .stdout(predicate::str::contains("--prepare-only"));
}

#[test]
fn test_unknown_subcommand_fails() {
    transient()
        .arg("destroy")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

// --- Configuration errors ---

#[test]
fn test_invalid_config_file_reports_line() {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    write!(
        file,
        "[transient]\nname = \"db\"\nssh-port = \"twenty-two\"\n"
    )
    .expect("write");

    transient()
        .args(["run", "--prepare-only", "--config"])
        .arg(file.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("line 3"))
        .stderr(predicate::str::contains("ssh-port"));
}

#[test]
fn test_config_file_from_environment() {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    write!(file, "[transient\n").expect("write");

    transient()
        .env("TRANSIENT_CONFIG", file.path())
        .args(["run", "--prepare-only"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to parse configuration file"));
}

#[test]
fn test_missing_config_file_fails() {
    transient()
        .args(["run", "--config", "/nonexistent/transient.toml"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to read configuration file"));
}

#[test]
fn test_out_of_range_port_is_rejected() {
    transient()
        .args(["run", "--prepare-only", "--ssh-port", "70000"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid command line arguments"))
        .stderr(predicate::str::contains("ssh_port"));
}

#[test]
fn test_malformed_shared_folder_is_rejected() {
    transient()
        .args(["run", "--prepare-only", "--shared-folder", "no-separator"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("shared_folder"));
}

#[test]
fn test_non_numeric_timeout_is_a_usage_error() {
    transient()
        .args(["run", "--ssh-timeout", "soon"])
        .assert()
        .code(2);
}
