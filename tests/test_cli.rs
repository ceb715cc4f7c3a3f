//! Basic binary invocation tests (assert_cmd).

mod common;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

use mailsift::reputation::ReputationStore;

fn mailsift_cmd() -> Command {
    let mut cmd = cargo_bin_cmd!("mailsift");
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_cli_version() {
    let mut cmd = mailsift_cmd();
    cmd.arg("--version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("mailsift"));
}

#[test]
fn test_cli_help() {
    let mut cmd = mailsift_cmd();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("sender reputation"));
}

#[test]
fn test_cli_no_args_shows_error() {
    let mut cmd = mailsift_cmd();
    cmd.assert().failure();
}

#[test]
fn test_cli_init_then_reinit_fails() {
    let (tmp, _paths) = common::temp_data_dir();
    let path = tmp.path().join("data");

    mailsift_cmd()
        .args(["init", "--user", "me@gmail.com"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Created"));

    mailsift_cmd()
        .args(["init", "--user", "me@gmail.com"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_cli_reputation_lookup() {
    let (tmp, paths) = common::temp_data_dir();
    let mut store = ReputationStore::default();
    store.record("unknown.com", "new", 8);
    store.save(&paths.reputation()).unwrap();

    mailsift_cmd()
        .arg("--data-dir")
        .arg(tmp.path())
        .args(["reputation", "New <NEW@unknown.com>"])
        .assert()
        .success()
        .stdout(predicate::str::contains("new@unknown.com: 8 (valid)"));

    mailsift_cmd()
        .arg("--data-dir")
        .arg(tmp.path())
        .args(["reputation", "stranger@unknown.com"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no reputation yet"));
}

#[test]
fn test_cli_show_missing_conversation_fails() {
    let (tmp, _paths) = common::temp_data_dir();
    mailsift_cmd()
        .arg("--data-dir")
        .arg(tmp.path())
        .args(["show", "nobody@x.com"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No conversation"));
}

#[test]
fn test_cli_run_without_config_fails() {
    let (tmp, _paths) = common::temp_data_dir();
    mailsift_cmd()
        .arg("--data-dir")
        .arg(tmp.path())
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("mailsift init"));
}
