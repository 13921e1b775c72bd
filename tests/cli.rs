//! CLI smoke tests for the `cmon` binary.

use std::path::Path;

use assert_cmd::Command;
use chrono::{TimeZone, Utc};
use predicates::prelude::*;

use claude_monitor::daemon::SnapshotStore;
use claude_monitor::{
    ActivitySnapshot, ActivityStatus, BillingSummary, MonitoringSnapshot, DAEMON_VERSION,
};

fn cmon() -> Command {
    Command::cargo_bin("cmon").expect("binary should build")
}

/// Write a config file pointing every path into `dir`.
fn write_config(dir: &Path) -> std::path::PathBuf {
    let config_path = dir.join("config.toml");
    let content = format!(
        r#"
[activity]
log_path = "{log}"

[daemon]
snapshot_path = "{snapshot}"
"#,
        log = dir.join("hook_events.jsonl").display(),
        snapshot = dir.join("monitor_data.json").display(),
    );
    std::fs::write(&config_path, content).expect("write config");
    config_path
}

fn write_snapshot(dir: &Path) {
    let now = Utc.with_ymd_and_hms(2025, 3, 14, 10, 0, 0).unwrap();
    let snapshot = MonitoringSnapshot {
        daemon_version: DAEMON_VERSION.to_string(),
        generated_at: now,
        last_collection_at: Some(now),
        billing: BillingSummary {
            period_start: Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap(),
            period_end: Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap(),
            session_count: 2,
            total_cost_usd: 1.5,
            total_tokens: 4000,
            max_tokens_per_session: 3000,
        },
        sessions: vec![],
        activity: vec![ActivitySnapshot {
            project_name: "demo".to_string(),
            status: ActivityStatus::Idle,
            started_at: now,
            last_event_at: now,
            event_count: 1,
        }],
        resolver: None,
    };
    SnapshotStore::new(dir.join("monitor_data.json"), None)
        .write(&snapshot)
        .expect("write snapshot");
}

#[test]
fn status_prints_summary_from_snapshot() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_config(dir.path());
    write_snapshot(dir.path());

    cmon()
        .args(["status", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Sessions: 2"))
        .stdout(predicate::str::contains("2025-03-01"))
        .stdout(predicate::str::contains("demo"));
}

#[test]
fn status_without_snapshot_fails_helpfully() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_config(dir.path());

    cmon()
        .args(["status", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("is the daemon running?"));
}

#[test]
fn dump_prints_raw_snapshot_json() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_config(dir.path());
    write_snapshot(dir.path());

    cmon()
        .args(["dump", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"daemonVersion\""))
        .stdout(predicate::str::contains("\"maxTokensPerSession\": 3000"));
}

#[test]
fn hook_appends_event_to_log() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_config(dir.path());

    cmon()
        .args(["hook", "stop", "--project-path", "/home/user/demo", "--config"])
        .arg(&config)
        .write_stdin("")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let events = claude_monitor::daemon::hook_log::read_events(&dir.path().join("hook_events.jsonl"));
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, claude_monitor::HookEventKind::Stop);
    assert_eq!(events[0].project_path, Path::new("/home/user/demo"));
}

#[test]
fn hook_reads_cwd_from_stdin_json() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_config(dir.path());

    cmon()
        .args(["hook", "pre-tool-use", "--config"])
        .arg(&config)
        .write_stdin(r#"{"session_id":"abc","cwd":"/home/user/from-hook"}"#)
        .assert()
        .success();

    let events = claude_monitor::daemon::hook_log::read_events(&dir.path().join("hook_events.jsonl"));
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, claude_monitor::HookEventKind::PreToolUse);
    assert_eq!(events[0].project_path, Path::new("/home/user/from-hook"));
}

#[test]
fn hook_rejects_unknown_kind() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_config(dir.path());

    cmon()
        .args(["hook", "notification", "--config"])
        .arg(&config)
        .write_stdin("")
        .assert()
        .failure();
}

#[test]
fn config_path_prints_a_toml_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    cmon()
        .env("XDG_CONFIG_HOME", dir.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("claude-monitor"))
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn config_init_then_validate() {
    let dir = tempfile::tempdir().expect("tempdir");

    cmon()
        .env("XDG_CONFIG_HOME", dir.path())
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created configuration"));

    cmon()
        .env("XDG_CONFIG_HOME", dir.path())
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"));
}
