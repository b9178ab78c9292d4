use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use tempfile::TempDir;

/// Command wired to offline providers with a SQLite file inside `dir`
fn offline_cmd(dir: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("chirp");
    cmd.current_dir(dir.path())
        .env("CHIRP__STORE__PROVIDER", "sqlite")
        .env("CHIRP__STORE__DB_PATH", dir.path().join("posts.sqlite"))
        .env("CHIRP__IDENTITY__PROVIDER", "stub")
        .env("CHIRP__RATELIMIT__PROVIDER", "memory");
    cmd
}

#[test]
fn config_init_writes_example_file() {
    let dir = TempDir::new().expect("temp dir");
    let config_path = dir.path().join("config.toml");

    let mut cmd = cargo_bin_cmd!("chirp");
    cmd.args(["config", "init", "--path"])
        .arg(&config_path)
        .assert()
        .success();

    let content = fs::read_to_string(&config_path).expect("read config");
    assert!(content.contains("[ratelimit]"));
    assert!(content.contains("capacity = 5"));
}

#[test]
fn config_init_refuses_to_overwrite() {
    let dir = TempDir::new().expect("temp dir");
    let config_path = dir.path().join("config.toml");
    fs::write(&config_path, "# existing").expect("write config");

    let mut cmd = cargo_bin_cmd!("chirp");
    cmd.args(["config", "init", "--path"])
        .arg(&config_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn created_post_is_listed_with_author() {
    let dir = TempDir::new().expect("temp dir");

    let output = offline_cmd(&dir)
        .args(["create", "--actor", "user_1", "--content", "hello", "--json"])
        .output()
        .expect("run create");
    assert!(output.status.success());

    let created: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    assert_eq!(created["authorId"], "user_1");
    assert_eq!(created["content"], "hello");
    assert!(created["id"].as_str().is_some_and(|id| !id.is_empty()));
    assert!(created["createdAt"].is_string());

    let output = offline_cmd(&dir)
        .args(["list", "--json"])
        .output()
        .expect("run list");
    assert!(output.status.success());

    let listed: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    let entries = listed.as_array().expect("array");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["post"]["id"], created["id"]);
    assert_eq!(entries[0]["author"]["id"], "user_1");
    assert_eq!(entries[0]["author"]["username"], "user_1");
}

#[test]
fn empty_content_is_a_bad_request() {
    let dir = TempDir::new().expect("temp dir");

    offline_cmd(&dir)
        .args(["create", "--actor", "user_1", "--content", ""])
        .assert()
        .failure()
        .stderr(predicate::str::contains("BAD_REQUEST"))
        .stderr(predicate::str::contains(
            "Content must be at least 1 character long.",
        ));
}

#[test]
fn exhausted_quota_is_too_many_requests() {
    let dir = TempDir::new().expect("temp dir");

    offline_cmd(&dir)
        .env("CHIRP__RATELIMIT__CAPACITY", "0")
        .args(["create", "--actor", "user_1", "--content", "hello"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("TOO_MANY_REQUESTS"));

    offline_cmd(&dir)
        .args(["list", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[]"));
}

#[test]
fn missing_identity_secret_fails_before_listing() {
    let dir = TempDir::new().expect("temp dir");

    offline_cmd(&dir)
        .env("CHIRP__IDENTITY__PROVIDER", "clerk")
        .env_remove("CLERK_SECRET_KEY")
        .args(["list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("CLERK_SECRET_KEY"));
}

#[test]
fn doctor_reports_offline_setup() {
    let dir = TempDir::new().expect("temp dir");

    let output = offline_cmd(&dir)
        .args(["doctor", "--json"])
        .output()
        .expect("run doctor");
    assert!(output.status.success());

    let report: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    assert_eq!(report["config"]["status"], "ok");
    assert_eq!(report["store"]["status"], "ok");
    assert_eq!(report["overall"], "warn");
}
