//! Integration tests for the sqlite-pg-migrate CLI.

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, Connection};
use tempfile::TempDir;

fn cmd() -> Command {
    Command::cargo_bin("sqlite-pg-migrate").unwrap()
}

fn write_config(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, content).unwrap();
    path
}

async fn make_sqlite(path: &Path) {
    let mut conn = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .connect()
        .await
        .unwrap();
    sqlx::query("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT NOT NULL, seen DATETIME)")
        .execute(&mut conn)
        .await
        .unwrap();
    sqlx::query("INSERT INTO t (name) VALUES ('a'), ('b')")
        .execute(&mut conn)
        .await
        .unwrap();
    conn.close().await.unwrap();
}

#[test]
fn test_help() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("SQLite"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("generate-schema"))
        .stdout(predicate::str::contains("apply-schema"));
}

#[test]
fn test_version() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("sqlite-pg-migrate"));
}

#[test]
fn test_global_flag_defaults_in_help() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--log-format"))
        .stdout(predicate::str::contains("[default: text]"))
        .stdout(predicate::str::contains("--verbosity"))
        .stdout(predicate::str::contains("[default: info]"))
        .stdout(predicate::str::contains("--shutdown-timeout"))
        .stdout(predicate::str::contains("[default: 60]"));
}

#[test]
fn test_run_help_lists_overrides() {
    cmd()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--source"))
        .stdout(predicate::str::contains("--target"))
        .stdout(predicate::str::contains("--batch-size"))
        .stdout(predicate::str::contains("--ssl-mode"));
}

#[test]
fn test_no_subcommand_is_usage_error() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_missing_config_file() {
    cmd()
        .args(["--config", "/nonexistent/config.yaml", "run"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("IO error"));
}

#[test]
fn test_invalid_yaml() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "source: [unclosed");

    cmd()
        .args(["--config", config.to_str().unwrap(), "run"])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn test_missing_required_fields() {
    let dir = TempDir::new().unwrap();
    let config = write_config(
        &dir,
        "source:\n  path: ''\ntarget:\n  host: localhost\n  database: db\n  user: u\n",
    );

    cmd()
        .args(["--config", config.to_str().unwrap(), "run"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("source.path is required"));
}

#[test]
fn test_run_without_endpoints() {
    cmd()
        .arg("run")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("source and target are required"));
}

#[test]
fn test_run_rejects_zero_batch_size() {
    cmd()
        .args([
            "run",
            "--source",
            "/tmp/whatever.db",
            "--target",
            "host=localhost dbname=x user=u",
            "--batch-size",
            "0",
        ])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("batch_size must be positive"));
}

#[test]
fn test_run_rejects_unknown_ssl_mode() {
    cmd()
        .args([
            "run",
            "--source",
            "/tmp/whatever.db",
            "--target",
            "host=localhost dbname=x user=u",
            "--ssl-mode",
            "sometimes",
        ])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn test_run_missing_source_reports_failed_job() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing.db");

    cmd()
        .args([
            "--output-json",
            "run",
            "--source",
            missing.to_str().unwrap(),
            "--target",
            "host=127.0.0.1 port=1 dbname=x user=u password=hunter2",
            "--poll-interval-ms",
            "20",
        ])
        .assert()
        .failure()
        .code(5)
        .stdout(predicate::str::contains("\"FAILED\""))
        .stdout(predicate::str::contains("Pool error"))
        .stdout(predicate::str::contains("hunter2").not());
}

#[tokio::test]
async fn test_generate_schema_to_stdout() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("source.db");
    make_sqlite(&db).await;

    cmd()
        .args(["generate-schema", "--source", db.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("CREATE TABLE IF NOT EXISTS \"t\""))
        .stdout(predicate::str::contains("\"id\" BIGINT"))
        .stdout(predicate::str::contains("\"name\" TEXT,"))
        .stdout(predicate::str::contains("\"seen\" TIMESTAMP"))
        .stdout(predicate::str::contains("PRIMARY KEY (\"id\")"));
}

#[tokio::test]
async fn test_generate_schema_to_file() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("source.db");
    make_sqlite(&db).await;
    let out = dir.path().join("schema.sql");

    cmd()
        .args([
            "generate-schema",
            "--source",
            db.to_str().unwrap(),
            "--output",
            out.to_str().unwrap(),
        ])
        .assert()
        .success();

    let script = std::fs::read_to_string(&out).unwrap();
    assert!(script.starts_with("CREATE TABLE IF NOT EXISTS \"t\""));
}

#[test]
fn test_generate_schema_uses_config_source() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.db");
    let config = write_config(
        &dir,
        &format!(
            "source:\n  path: {}\ntarget:\n  host: localhost\n  database: db\n  user: u\n",
            missing.display()
        ),
    );

    // The config's source is used, and a missing file is never created.
    cmd()
        .args(["--config", config.to_str().unwrap(), "generate-schema"])
        .assert()
        .failure()
        .code(4);
    assert!(!missing.exists());
}

#[test]
fn test_apply_schema_rejects_empty_script() {
    let dir = TempDir::new().unwrap();
    let script = dir.path().join("empty.sql");
    std::fs::write(&script, "\n").unwrap();

    cmd()
        .args([
            "apply-schema",
            "--target",
            "host=localhost dbname=x user=u",
            "--file",
            script.to_str().unwrap(),
        ])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("schema script is empty"));
}
