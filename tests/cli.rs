use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("novel-navigator").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage: novel-navigator [OPTIONS] <COMMAND>"))
        .stdout(predicate::str::contains("Commands:"))
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("recommend"))
        .stdout(predicate::str::contains("chat"))
        .stdout(predicate::str::contains("--api-key <API_KEY>"))
        .stdout(predicate::str::contains("--version"));
}

#[test]
fn test_cli_serve_help() {
    let mut cmd = Command::cargo_bin("novel-navigator").unwrap();
    cmd.arg("serve")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage: novel-navigator serve"))
        .stdout(predicate::str::contains("--host <HOST>"))
        .stdout(predicate::str::contains("--port <PORT>"))
        .stdout(predicate::str::contains("[default: 9900]"));
}

#[test]
fn test_cli_recommend_help() {
    let mut cmd = Command::cargo_bin("novel-navigator").unwrap();
    cmd.arg("recommend")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage: novel-navigator recommend"));
}

#[test]
fn test_cli_no_command() {
    // Running without a command should show help/usage
    let mut cmd = Command::cargo_bin("novel-navigator").unwrap();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage: novel-navigator [OPTIONS] <COMMAND>"));
}

#[test]
fn test_cli_chat_without_api_key_fails() {
    let mut cmd = Command::cargo_bin("novel-navigator").unwrap();
    cmd.current_dir(tempfile::tempdir().unwrap().path())
        .env_remove("GEMINI_API_KEY")
        .env_remove("API_KEY")
        .arg("chat")
        .write_stdin("")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No API key configured"));
}
