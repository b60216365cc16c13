//! CLI surface tests.
//!
//! These drive the real binary. Launch paths are pointed at an empty `PATH`
//! so no test depends on (or accidentally starts) an installed Open MPI.

#![allow(clippy::expect_used)]

use assert_cmd::Command;
use predicates::prelude::*;

fn mpiports() -> Command {
    Command::cargo_bin("mpiports").expect("mpiports binary should exist")
}

#[test]
fn missing_output_flag_is_an_error() {
    mpiports()
        .assert()
        .failure()
        .stderr(predicate::str::contains("--output-filename"));
}

#[test]
fn help_documents_the_output_flag_and_passthrough() {
    mpiports()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--output-filename"))
        .stdout(predicate::str::contains("MPIRUN_ARGS"));
}

#[test]
fn version_flag_prints_the_version() {
    mpiports()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("mpiports"));
}

#[test]
fn launch_fails_fast_without_open_mpi_v4() {
    let dir = tempfile::TempDir::new().expect("tempdir");

    mpiports()
        .env("PATH", "")
        .env_remove("LSB_HOSTS")
        .arg("--output-filename")
        .arg(dir.path().join("out"))
        .assert()
        .failure()
        .stdout(predicate::str::contains("working with 0 host(s)"))
        .stderr(predicate::str::contains("Open MPI"));
}

#[test]
fn host_count_comes_from_the_lsf_environment() {
    let dir = tempfile::TempDir::new().expect("tempdir");

    mpiports()
        .env("PATH", "")
        .env("LSB_HOSTS", "nodeA nodeA nodeB")
        .arg("--output-filename")
        .arg(dir.path().join("out"))
        .assert()
        .failure()
        .stdout(predicate::str::contains("working with 3 host(s)"));
}

#[test]
fn quiet_suppresses_progress_reporting() {
    let dir = tempfile::TempDir::new().expect("tempdir");

    mpiports()
        .env("PATH", "")
        .env_remove("LSB_HOSTS")
        .arg("--quiet")
        .arg("--output-filename")
        .arg(dir.path().join("out"))
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Open MPI"));
}
