//! Startup behavior of the patrol binary.
//!
//! These tests never launch a browser: they exercise the paths that must
//! fail (or answer) before any session work starts.

use std::path::PathBuf;
use std::process::Command;

/// Helper to get the patrol binary path
fn patrol_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // Remove test binary name
    path.pop(); // Remove deps
    path.push("patrol");
    path
}

#[test]
fn run_without_accounts_exits_nonzero() {
    let output = Command::new(patrol_binary())
        .arg("run")
        .arg("--accounts")
        .arg("/nonexistent/patrol-accounts.json")
        .env_remove("PATROL_ACCOUNTS")
        .output()
        .expect("patrol binary should run");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("no accounts configured"),
        "stderr was: {stderr}"
    );
}

#[test]
fn malformed_accounts_env_exits_nonzero() {
    let output = Command::new(patrol_binary())
        .arg("run")
        .env("PATROL_ACCOUNTS", "not json")
        .output()
        .expect("patrol binary should run");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("PATROL_ACCOUNTS"), "stderr was: {stderr}");
}

#[test]
fn schedule_rejects_unknown_time_zone() {
    let output = Command::new(patrol_binary())
        .arg("schedule")
        .arg("--timezone")
        .arg("Mars/Olympus_Mons")
        .output()
        .expect("patrol binary should run");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown time zone"), "stderr was: {stderr}");
}

#[test]
fn help_lists_the_entry_points() {
    let output = Command::new(patrol_binary())
        .arg("--help")
        .output()
        .expect("patrol binary should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for subcommand in ["run", "schedule", "queue"] {
        assert!(stdout.contains(subcommand), "missing {subcommand}");
    }
}
