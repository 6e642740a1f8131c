//! Command-line behavior that must hold on any machine: argument errors
//! exit 2, pipeline errors exit 1, and every case here fails before the
//! first bpf syscall, so no root is needed.

use std::fs;
use std::path::PathBuf;
use std::process;

use assert_cmd::Command;
use predicates::prelude::*;

fn err_inject() -> Command {
    Command::cargo_bin("err-inject").expect("binary built")
}

fn scratch_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("err-inject-cli-{tag}-{}", process::id()));
    fs::create_dir_all(&dir).expect("scratch dir");
    dir
}

#[test]
fn no_arguments_is_a_usage_error() {
    err_inject()
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn help_describes_the_tool() {
    err_inject()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Inject syscall failures"));
}

#[test]
fn unknown_errno_name_is_a_usage_error() {
    err_inject()
        .args(["read", "EBOGUS", "100"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("unknown errno name"));
}

#[test]
fn errno_zero_is_a_usage_error() {
    err_inject()
        .args(["read", "0", "100"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("1..=4095"));
}

#[test]
fn pid_zero_is_a_usage_error() {
    err_inject()
        .args(["read", "5", "0"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn a_syscall_name_with_a_path_separator_is_refused() {
    err_inject()
        .args(["../evil", "5", "100"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("not a plausible syscall name"));
}

#[test]
fn too_many_distinct_pids_is_refused_before_any_bpf_work() {
    let pids: Vec<String> = (1..=257).map(|pid| pid.to_string()).collect();
    err_inject()
        .args(["read", "5"])
        .args(&pids)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("at most 256"));
}

#[test]
fn a_missing_bpffs_directory_is_refused() {
    let missing = std::env::temp_dir().join(format!("err-inject-cli-missing-{}", process::id()));
    err_inject()
        .args(["read", "5", "100", "--bpffs"])
        .arg(&missing)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("bpffs mount not found"));
}

#[test]
fn a_taken_pin_path_is_refused() {
    let dir = scratch_dir("collision");
    fs::write(dir.join("err_inject-read"), b"").expect("seed pin file");

    err_inject()
        .args(["read", "5", "100", "--bpffs"])
        .arg(&dir)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("already exists"));

    fs::remove_dir_all(&dir).expect("cleanup");
}

#[test]
fn the_bpffs_directory_can_come_from_the_environment() {
    let missing = std::env::temp_dir().join(format!("err-inject-cli-env-{}", process::id()));
    err_inject()
        .env("ERR_INJECT_BPFFS", &missing)
        .args(["read", "5", "100"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("bpffs mount not found"));
}
