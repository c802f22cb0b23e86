// Integration tests for CLI commands
// These run the built binary against a temporary config and database.
// No command here contacts the chain or the node registry.

use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const TXID: &str = "a3f1c2d4e5b6a7980112233445566778899aabbccddeeff00112233445566778";

fn snov(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_snov"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute command")
}

fn config_arg(dir: &Path) -> String {
    dir.join("config.toml").to_string_lossy().to_string()
}

#[test]
fn test_cli_help() {
    let output = snov(&["--help"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Operator CLI for the sentry node owner verification daemon"));
    for command in ["run", "challenge", "verify", "sweep", "status", "revoke", "version"] {
        assert!(stdout.contains(command), "help is missing {}", command);
    }
}

#[test]
fn test_cli_version() {
    let output = snov(&["version"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(&format!("snov {}", env!("CARGO_PKG_VERSION"))));
}

#[test]
fn test_cli_challenge_prints_message() {
    let output = snov(&["challenge", "--txid", TXID, "--requester", "alice"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(&format!("txid: {}", TXID)));
    assert!(stdout.contains("requester: alice"));
}

#[test]
fn test_cli_challenge_rejects_bad_txid() {
    let output = snov(&["challenge", "--txid", "1234", "--requester", "alice"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Invalid transaction id"));
}

#[test]
fn test_cli_verify_requires_signature() {
    let output = snov(&["verify", "--txid", TXID, "--requester", "alice"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("signature") || stderr.contains("required"));
}

#[test]
fn test_cli_verify_bad_txid_exits_with_fail_status() {
    let temp_dir = TempDir::new().unwrap();
    let config = config_arg(temp_dir.path());

    let output = snov(&[
        "verify",
        "--txid",
        "nothex",
        "--requester",
        "alice",
        "--signature",
        "H+c2lnbmF0dXJl",
        "--config",
        &config,
    ]);

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("FAIL: "));
    assert!(stdout.contains("not a valid transaction id"));
}

#[test]
fn test_cli_verify_bad_config_exits_with_error_status() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    std::fs::write(&config_path, "[network]\nname = \"regtest\"\n\n[store]\ndatabase_path = \"snov.db\"\n").unwrap();

    let output = snov(&[
        "verify",
        "--txid",
        TXID,
        "--requester",
        "alice",
        "--signature",
        "H+c2lnbmF0dXJl",
        "--config",
        &config_path.to_string_lossy(),
    ]);

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("ERROR: "));
}

#[test]
fn test_cli_status_creates_default_config() {
    let temp_dir = TempDir::new().unwrap();
    let config = config_arg(temp_dir.path());

    let output = snov(&["status", "--config", &config]);

    assert!(output.status.success());
    assert!(temp_dir.path().join("config.toml").exists());
    assert!(temp_dir.path().join("snov.db").exists());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Records: 0 (0 active, 0 revoked)"));
}

#[test]
fn test_cli_sweep_on_empty_database() {
    let temp_dir = TempDir::new().unwrap();
    let config = config_arg(temp_dir.path());

    let output = snov(&["sweep", "--config", &config]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("checked 0"));
}

#[test]
fn test_cli_revoke_unknown_requester_fails() {
    let temp_dir = TempDir::new().unwrap();
    let config = config_arg(temp_dir.path());

    let output = snov(&["revoke", "--requester", "ghost", "--config", &config]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ghost"));
}

#[test]
fn test_cli_rejects_invalid_config() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    std::fs::write(
        &config_path,
        "[store]\ndatabase_path = \"snov.db\"\n\n[sweep]\ninterval = \"whenever\"\n",
    )
    .unwrap();

    let output = snov(&["status", "--config", &config_path.to_string_lossy()]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("sweep.interval"));
}
