//! End-to-end scenarios that attach a real probe. They need root, a bpffs
//! mount at /sys/fs/bpf and a kernel built with CONFIG_BPF_KPROBE_OVERRIDE.
//! Run them explicitly: `cargo test --test e2e -- --ignored`.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command as StdCommand};
use std::thread;
use std::time::Duration;

use assert_cmd::Command;
use predicates::prelude::*;

fn gettid() -> i32 {
    (unsafe { libc::syscall(libc::SYS_gettid) }) as i32
}

/// Removes the pin file even when an assertion panics mid-test, so one
/// failure does not poison later runs with a stale attachment.
struct PinGuard(PathBuf);

impl Drop for PinGuard {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.0);
    }
}

/// A shell that sleeps past the attach window, then tries to chdir.
/// Exit 42 means the injected errno reached it.
fn sleeper_shell() -> Child {
    StdCommand::new("/bin/sh")
        .args(["-c", "sleep 2; cd / || exit 42; exit 0"])
        .spawn()
        .expect("spawn sleeper shell")
}

#[test]
#[ignore = "needs root, bpffs and CONFIG_BPF_KPROBE_OVERRIDE=y"]
fn chdir_fails_for_allowlisted_threads_until_unpinned() {
    let pin = PathBuf::from("/sys/fs/bpf/err_inject-chdir");
    assert!(
        !pin.exists(),
        "stale pin from an earlier run, remove {} first",
        pin.display()
    );
    let _guard = PinGuard(pin.clone());

    let mut sleeper_a = sleeper_shell();
    let mut sleeper_b = sleeper_shell();
    let tid = gettid();

    Command::cargo_bin("err-inject")
        .expect("binary built")
        .args([
            "chdir",
            "EIO",
            &tid.to_string(),
            &sleeper_a.id().to_string(),
            &sleeper_b.id().to_string(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "pinned: /sys/fs/bpf/err_inject-chdir",
        ));
    assert!(pin.exists(), "pin file must exist after success");

    // The injector process is gone; the pinned probe must keep firing.
    let err = std::env::set_current_dir(".").expect_err("chdir should now fail");
    assert_eq!(err.raw_os_error(), Some(libc::EIO));

    // A process outside the allowlist is untouched.
    let control = StdCommand::new("/bin/sh")
        .args(["-c", "cd / && exit 0"])
        .status()
        .expect("run control shell");
    assert!(control.success(), "non-allowlisted process must chdir freely");

    // Both allowlisted shells hit the injected errno when they wake up.
    for sleeper in [&mut sleeper_a, &mut sleeper_b] {
        let status = sleeper.wait().expect("wait for sleeper shell");
        assert_eq!(status.code(), Some(42), "allowlisted shell must fail its cd");
    }

    // Same syscall again: the pin path is taken, the run must refuse.
    Command::cargo_bin("err-inject")
        .expect("binary built")
        .args(["chdir", "5", "4190000"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("already exists"));

    // Unpinning drops the last reference; the injection dies shortly after.
    fs::remove_file(&pin).expect("unpin");
    let mut recovered = false;
    for _ in 0..100 {
        if std::env::set_current_dir(".").is_ok() {
            recovered = true;
            break;
        }
        thread::sleep(Duration::from_millis(20));
    }
    assert!(recovered, "chdir must work again after unpinning");
}

#[test]
#[ignore = "needs root, bpffs and CONFIG_BPF_KPROBE_OVERRIDE=y"]
fn an_unknown_syscall_attaches_nothing_and_pins_nothing() {
    let pin = Path::new("/sys/fs/bpf/err_inject-frobnicate");
    Command::cargo_bin("err-inject")
        .expect("binary built")
        .args(["frobnicate", "5", "4190000"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("attaching"));
    assert!(!pin.exists(), "a failed attach must not leave a pin behind");
}
