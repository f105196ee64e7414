//! Integration tests for the `playhouse` binary.
//!
//! Argument parsing and config commands run offline; bridge-bound commands
//! run against a wiremock bridge.
#![allow(clippy::unwrap_used)]

use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SERIAL: &str = "001788fffe000001";

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a command with env isolation: config and setup files live in
/// `dir`, and no `PLAYHOUSE_*` variable leaks in from the caller.
fn playhouse_cmd(dir: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("playhouse");
    cmd.env("HOME", dir)
        .env("XDG_CONFIG_HOME", dir)
        .env("XDG_DATA_HOME", dir)
        .env_remove("PLAYHOUSE_CONFIG")
        .env_remove("PLAYHOUSE_SETUP_FILE")
        .env_remove("RUST_LOG")
        .arg("--config")
        .arg(dir.join("config.toml"))
        .arg("--setup-file")
        .arg(setup_path(dir));
    cmd
}

fn setup_path(dir: &Path) -> PathBuf {
    dir.join("bridge_setup.json")
}

fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

async fn fake_bridge() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/none/config"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "Philips hue"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/description.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            "<root><device><modelDescription>Philips hue Personal Wireless Lighting\
             </modelDescription><serialNumber>{SERIAL}</serialNumber></device></root>"
        )))
        .mount(&server)
        .await;
    server
}

async fn mount_user(server: &MockServer, user: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/api/{user}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "config": {"name": "Living room"},
            "lights": {"1": {"state": {"on": true, "bri": 10}}},
            "groups": {}
        })))
        .mount(server)
        .await;
}

/// Run a prepared command off the async runtime so wiremock keeps serving.
async fn run(mut cmd: assert_cmd::Command) -> std::process::Output {
    tokio::task::spawn_blocking(move || cmd.output().unwrap())
        .await
        .unwrap()
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let dir = tempfile::tempdir().unwrap();
    let output = playhouse_cmd(dir.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_lists_commands() {
    cargo_bin_cmd!("playhouse").arg("--help").assert().success().stdout(
        predicate::str::contains("discover")
            .and(predicate::str::contains("pair"))
            .and(predicate::str::contains("reset-bulb"))
            .and(predicate::str::contains("lights"))
            .and(predicate::str::contains("run")),
    );
}

#[test]
fn test_version_flag() {
    cargo_bin_cmd!("playhouse")
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("playhouse"));
}

#[test]
fn test_invalid_subcommand() {
    let dir = tempfile::tempdir().unwrap();
    let output = playhouse_cmd(dir.path()).arg("foobar").output().unwrap();
    assert!(!output.status.success());
    assert!(combined_output(&output).contains("foobar"));
}

#[test]
fn test_invalid_output_format() {
    let dir = tempfile::tempdir().unwrap();
    let output = playhouse_cmd(dir.path())
        .args(["--output", "yaml", "config", "show"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(combined_output(&output).contains("possible values"));
}

#[test]
fn test_lights_search_and_new_conflict() {
    let dir = tempfile::tempdir().unwrap();
    playhouse_cmd(dir.path())
        .args(["lights", "10.0.0.2", "--new", "--search"])
        .assert()
        .code(2);
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_show_defaults() {
    let dir = tempfile::tempdir().unwrap();
    playhouse_cmd(dir.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("[monitor]")
                .and(predicate::str::contains("max_strikes = 3"))
                .and(predicate::str::contains("port = 30000")),
        );
}

#[test]
fn test_config_show_reads_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("config.toml"),
        "[monitor]\ninterval_secs = 42\n",
    )
    .unwrap();

    playhouse_cmd(dir.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("interval_secs = 42"));
}

#[test]
fn test_config_path_reports_setup_file() {
    let dir = tempfile::tempdir().unwrap();
    playhouse_cmd(dir.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("bridge_setup.json"));
}

#[test]
fn test_invalid_lookup_url_is_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("config.toml"),
        "[discovery]\nlookup_url = \"not a url\"\n",
    )
    .unwrap();

    playhouse_cmd(dir.path())
        .args(["discover", "--attempts", "0"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("lookup_url"));
}

#[test]
fn test_zero_monitor_interval_is_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("config.toml"),
        "[monitor]\ninterval_secs = 0\n",
    )
    .unwrap();

    playhouse_cmd(dir.path())
        .arg("run")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("monitor.interval_secs"));
}

// ── Bridge-bound commands ───────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_pair_without_link_button() {
    let server = fake_bridge().await;
    Mock::given(method("POST"))
        .and(path("/api"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"error": {"type": 101, "address": "", "description": "link button not pressed"}}
        ])))
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();
    let mut cmd = playhouse_cmd(dir.path());
    cmd.args(["pair", &server.address().to_string()]);

    let output = run(cmd).await;

    assert_eq!(output.status.code(), Some(3));
    assert!(combined_output(&output).contains("Link button"));
    assert!(!setup_path(dir.path()).exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_pair_saves_username() {
    let server = fake_bridge().await;
    Mock::given(method("POST"))
        .and(path("/api"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{"success": {"username": "newuser"}}])),
        )
        .mount(&server)
        .await;
    mount_user(&server, "newuser").await;
    let dir = tempfile::tempdir().unwrap();
    let address = server.address().to_string();
    let mut cmd = playhouse_cmd(dir.path());
    cmd.args(["--output", "plain", "pair", &address]);

    let output = run(cmd).await;

    assert!(output.status.success(), "{}", combined_output(&output));
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "newuser");
    let saved: Value =
        serde_json::from_str(&std::fs::read_to_string(setup_path(dir.path())).unwrap()).unwrap();
    assert_eq!(saved["usernames"][SERIAL], "newuser");
    assert_eq!(saved["ips"], json!([address]));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_lights_uses_saved_username() {
    let server = fake_bridge().await;
    mount_user(&server, "alice").await;
    Mock::given(method("GET"))
        .and(path("/api/alice/lights"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "2": {"state": {"on": false, "reachable": false}, "name": "Desk", "type": "Dimmable light"},
            "1": {"state": {"on": true, "bri": 10, "reachable": true}, "name": "Hall", "type": "Extended color light"}
        })))
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        setup_path(dir.path()),
        json!({"grid": [], "usernames": {SERIAL: "alice"}, "ips": []}).to_string(),
    )
    .unwrap();
    let mut cmd = playhouse_cmd(dir.path());
    cmd.args(["--output", "json-compact", "lights", &server.address().to_string()]);

    let output = run(cmd).await;

    assert!(output.status.success(), "{}", combined_output(&output));
    let lights: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(lights[0]["id"], 1);
    assert_eq!(lights[0]["name"], "Hall");
    assert_eq!(lights[1]["reachable"], false);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_lights_without_username_is_auth_error() {
    let server = fake_bridge().await;
    let dir = tempfile::tempdir().unwrap();
    let mut cmd = playhouse_cmd(dir.path());
    cmd.args(["lights", &server.address().to_string()]);

    let output = run(cmd).await;

    assert_eq!(output.status.code(), Some(3));
    assert!(combined_output(&output).contains("playhouse pair"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_non_bridge_is_not_found() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let mut cmd = playhouse_cmd(dir.path());
    cmd.args(["reset-bulb", &server.address().to_string()]);

    let output = run(cmd).await;

    assert_eq!(output.status.code(), Some(4));
    assert!(combined_output(&output).contains("No bridge found"));
}
