//! ---
//! arb_section: "07-testing"
//! arb_subsection: "test"
//! arb_type: "source"
//! arb_scope: "test"
//! arb_description: "CLI surfaces that need no container engine."
//! arb_version: "v0.1.0"
//! arb_owner: "ops"
//! ---
use std::fs;
use std::path::Path;

use assert_cmd::Command;
use tempfile::tempdir;

fn deployctl(cwd: &Path) -> Command {
    let mut cmd = Command::cargo_bin("arb-deployctl").expect("binary builds");
    cmd.current_dir(cwd)
        .env_remove("ARB_DEPLOY_CONFIG")
        .env("ARB_DEPLOY_LOG", "error");
    cmd
}

fn stdout_of(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr_of(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn version_flag_prints_banner() {
    let dir = tempdir().unwrap();
    let output = deployctl(dir.path()).arg("--version").output().unwrap();
    assert!(output.status.success());
    assert!(stdout_of(&output).starts_with("arb-deploy v"));
}

#[test]
fn missing_subcommand_is_a_usage_error() {
    let dir = tempdir().unwrap();
    let output = deployctl(dir.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn prepare_creates_placeholder_and_state_files() {
    let dir = tempdir().unwrap();
    let output = deployctl(dir.path()).arg("prepare").output().unwrap();

    assert!(output.status.success(), "{}", stderr_of(&output));
    assert!(stderr_of(&output).contains("WARNING: Created empty"));
    assert_eq!(fs::metadata(dir.path().join(".env")).unwrap().len(), 0);
    for name in ["bot_execution.log", "active_trades.json", "trade_history.csv"] {
        assert_eq!(fs::metadata(dir.path().join(name)).unwrap().len(), 0);
    }
}

#[test]
fn prepare_is_idempotent_and_keeps_content() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join(".env"), "BINANCE_API_KEY=abc\n").unwrap();
    fs::write(dir.path().join("trade_history.csv"), "ts,pair,pnl\n").unwrap();

    for _ in 0..2 {
        let output = deployctl(dir.path()).arg("prepare").output().unwrap();
        assert!(output.status.success(), "{}", stderr_of(&output));
    }

    assert_eq!(
        fs::read_to_string(dir.path().join(".env")).unwrap(),
        "BINANCE_API_KEY=abc\n"
    );
    assert_eq!(
        fs::read_to_string(dir.path().join("trade_history.csv")).unwrap(),
        "ts,pair,pnl\n"
    );
}

#[test]
fn working_dir_flag_redirects_files() {
    let cwd = tempdir().unwrap();
    let target = tempdir().unwrap();
    let output = deployctl(cwd.path())
        .args(["prepare", "--working-dir"])
        .arg(target.path())
        .output()
        .unwrap();

    assert!(output.status.success(), "{}", stderr_of(&output));
    assert!(target.path().join("active_trades.json").is_file());
    assert!(!cwd.path().join("active_trades.json").exists());
}

#[test]
fn config_file_in_working_directory_is_picked_up() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("arb-deploy.toml"),
        "[launcher]\nstate_files = [\"positions.json\"]\n",
    )
    .unwrap();

    let output = deployctl(dir.path()).arg("prepare").output().unwrap();

    assert!(output.status.success(), "{}", stderr_of(&output));
    assert!(dir.path().join("positions.json").is_file());
    assert!(!dir.path().join("trade_history.csv").exists());
}

#[test]
fn invalid_config_fails_with_generic_status() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("broken.toml");
    fs::write(&config, "[launcher\nservice_name = ").unwrap();

    let output = deployctl(dir.path())
        .args(["prepare", "--config"])
        .arg(&config)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr_of(&output).contains("failed to parse configuration"));
    assert!(!dir.path().join(".env").exists());
}

#[test]
fn doctor_reports_without_mutating() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join(".env"), "BINANCE_API_KEY=abc\n").unwrap();

    let output = deployctl(dir.path()).arg("doctor").output().unwrap();

    assert!(output.status.success(), "{}", stderr_of(&output));
    let stdout = stdout_of(&output);
    assert!(stdout.contains("config:       built-in defaults"), "{stdout}");
    assert!(stdout.contains("credentials:  missing BINANCE_SECRET"), "{stdout}");
    assert!(stdout.contains("bot_execution.log (missing)"), "{stdout}");
    assert!(stdout.contains("engine:"), "{stdout}");
    assert!(!dir.path().join("bot_execution.log").exists());
}

#[test]
fn final_log_event_reaches_stderr_before_exit() {
    let dir = tempdir().unwrap();
    let output = deployctl(dir.path())
        .env("ARB_DEPLOY_LOG", "info")
        .arg("prepare")
        .output()
        .unwrap();

    assert!(output.status.success(), "{}", stderr_of(&output));
    let stderr = stderr_of(&output);
    assert!(
        stderr.contains("state NOT_STARTED -> PRECONDITIONS_CHECKED"),
        "{stderr}"
    );
}

#[test]
fn log_file_holds_every_event_after_exit() {
    let dir = tempdir().unwrap();
    let logs = dir.path().join("logs");
    fs::write(
        dir.path().join("arb-deploy.toml"),
        format!("[logging]\ndirectory = {:?}\n", logs.display().to_string()),
    )
    .unwrap();

    let output = deployctl(dir.path())
        .env("ARB_DEPLOY_LOG", "info")
        .arg("prepare")
        .output()
        .unwrap();

    assert!(output.status.success(), "{}", stderr_of(&output));
    let written: String = fs::read_dir(&logs)
        .unwrap()
        .map(|entry| fs::read_to_string(entry.unwrap().path()).unwrap())
        .collect();
    assert!(written.contains("PRECONDITIONS_CHECKED"), "{written}");
}
