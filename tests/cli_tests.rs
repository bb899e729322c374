//! End-to-end CLI tests using `assert_cmd`.
//!
//! These tests invoke the actual compiled binary and verify exit codes and
//! output. They do NOT require Redis, Postgres or an LLM to be running.

use assert_cmd::Command;
use predicates::prelude::*;

fn cmd() -> Command {
    Command::cargo_bin("licitacheck").unwrap()
}

// ─── Help / version ─────────────────────────────────────────────────────

#[test]
fn test_help_shows_commands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("worker"))
        .stdout(predicate::str::contains("ingest"));
}

#[test]
fn test_version_shows_name() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("licitacheck"));
}

// ─── Ingest subcommand argument validation ──────────────────────────────

#[test]
fn test_ingest_help() {
    cmd()
        .args(["ingest", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("PATH"))
        .stdout(predicate::str::contains("--pdf-native"))
        .stdout(predicate::str::contains("--dump-dir"));
}

#[test]
fn test_ingest_requires_path() {
    cmd().arg("ingest").assert().failure();
}

#[test]
fn test_ingest_without_api_key_fails_cleanly() {
    cmd()
        .args(["ingest", "/tmp/nonexistent.pdf"])
        .env_remove("OPENAI_API_KEY")
        .current_dir(std::env::temp_dir())
        .assert()
        .failure()
        .stderr(predicate::str::contains("OPENAI_API_KEY"));
}

// ─── Worker subcommand ──────────────────────────────────────────────────

#[test]
fn test_worker_requires_database_url() {
    cmd()
        .arg("worker")
        .env("OPENAI_API_KEY", "test-key")
        .env_remove("DATABASE_URL")
        .current_dir(std::env::temp_dir())
        .assert()
        .failure()
        .stderr(predicate::str::contains("DATABASE_URL"));
}

#[test]
fn test_unknown_subcommand_rejected() {
    cmd().arg("frobnicate").assert().failure();
}
