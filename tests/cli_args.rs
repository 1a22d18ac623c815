//! Integration tests for the command-line binary
//!
//! Runs the compiled binary against a temporary cache directory and an
//! upstream URL nothing listens on.

use std::process::Command;
use tempfile::TempDir;

const OFFLINE_URL: &str = "http://127.0.0.1:9/";

/// Helper to run the CLI with given args and capture output
fn run_cli(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_mp-challenge"))
        .args(args)
        .env_remove("MP_CHALLENGE_UPSTREAM_URL")
        .env_remove("MP_CHALLENGE_CACHE_DIR")
        .env_remove("MP_CHALLENGE_LOG_FILE")
        .output()
        .expect("Failed to execute mp-challenge")
}

#[test]
fn test_help_flag_exits_successfully() {
    let output = run_cli(&["--help"]);
    assert!(output.status.success(), "Expected --help to exit successfully");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("mp-challenge"), "Help should mention mp-challenge");
    assert!(stdout.contains("purge"), "Help should list the purge command");
    assert!(stdout.contains("export"), "Help should list the export command");
}

#[test]
fn test_missing_command_fails() {
    let output = run_cli(&[]);
    assert!(!output.status.success());
}

#[test]
fn test_purge_succeeds_on_empty_cache() {
    let dir = TempDir::new().unwrap();
    let output = run_cli(&["purge", "--cache-dir", dir.path().to_str().unwrap()]);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Success"));
}

#[test]
fn test_status_without_cache() {
    let dir = TempDir::new().unwrap();
    let output = run_cli(&["status", "--cache-dir", dir.path().to_str().unwrap()]);

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("cached: no"));
}

#[test]
fn test_export_without_ids_prints_error_and_exits() {
    let dir = TempDir::new().unwrap();
    let output = run_cli(&["export", "--cache-dir", dir.path().to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("You must select at least one item"),
        "Should explain the empty selection: {}",
        stderr
    );
}

#[test]
fn test_unreachable_upstream_exits_with_error() {
    let dir = TempDir::new().unwrap();
    let output = run_cli(&[
        "get-data",
        "--upstream-url",
        OFFLINE_URL,
        "--cache-dir",
        dir.path().to_str().unwrap(),
    ]);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error"));
}

#[test]
fn test_invalid_upstream_url_is_rejected() {
    let dir = TempDir::new().unwrap();
    let output = run_cli(&[
        "status",
        "--upstream-url",
        "not a url",
        "--cache-dir",
        dir.path().to_str().unwrap(),
    ]);

    assert!(!output.status.success());
}

#[cfg(test)]
mod unit_tests {
    //! Unit tests for CLI parsing that don't require running the binary

    use clap::Parser;
    use mp_challenge::cli::{Cli, Command};
    use std::path::PathBuf;

    #[test]
    fn test_cli_export_collects_repeated_ids() {
        let cli = Cli::parse_from(["mp-challenge", "export", "--id", "3", "--id", "1"]);
        assert_eq!(
            cli.command,
            Command::Export {
                ids: vec![3, 1],
                output: None
            }
        );
    }

    #[test]
    fn test_cli_export_output_file() {
        let cli = Cli::parse_from(["mp-challenge", "export", "--id", "1", "-o", "rows.csv"]);
        match cli.command {
            Command::Export { output, .. } => assert_eq!(output, Some(PathBuf::from("rows.csv"))),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_rejects_non_numeric_id() {
        assert!(Cli::try_parse_from(["mp-challenge", "export", "--id", "abc"]).is_err());
    }

    #[test]
    fn test_cli_global_flags_before_command() {
        let cli = Cli::parse_from([
            "mp-challenge",
            "--upstream-url",
            "http://localhost:8080/",
            "--cache-dir",
            "/tmp/mp",
            "get-data",
            "--reset",
        ]);
        assert_eq!(cli.upstream_url.as_deref(), Some("http://localhost:8080/"));
        assert_eq!(cli.cache_dir, Some(PathBuf::from("/tmp/mp")));
        match cli.command {
            Command::GetData { cache } => {
                assert!(cache.reset);
                assert!(!cache.refresh);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_unknown_command_is_error() {
        assert!(Cli::try_parse_from(["mp-challenge", "frobnicate"]).is_err());
    }
}
