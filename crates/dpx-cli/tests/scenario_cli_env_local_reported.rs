//! `.env.local` bootstrap.
//!
//! Invariants under test:
//! - a missing `.env.local` is silent
//! - a malformed `.env.local` is reported on stderr and the command still runs

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;

#[test]
fn missing_env_local_is_silent() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    fs::write(dir.path().join("run.yaml"), "schema:\n  path: s.yaml\n")?;

    Command::cargo_bin("dpx")?
        .current_dir(dir.path())
        .arg("config-hash")
        .arg("run.yaml")
        .env("RUST_LOG", "warn")
        .assert()
        .success()
        .stderr(predicate::str::contains(".env.local").not());
    Ok(())
}

#[test]
fn malformed_env_local_is_reported() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    fs::write(dir.path().join("run.yaml"), "schema:\n  path: s.yaml\n")?;
    fs::write(dir.path().join(".env.local"), "DPX_SITE lab\n")?;

    Command::cargo_bin("dpx")?
        .current_dir(dir.path())
        .arg("config-hash")
        .arg("run.yaml")
        .env("RUST_LOG", "warn")
        .assert()
        .success()
        .stdout(predicate::str::contains("config_hash="))
        .stderr(predicate::str::contains("failed to load .env.local"));
    Ok(())
}
