#![no_std]

//! Contract shared between the kernel probe and the control program.
//!
//! The probe (`err-inject-ebpf`) and the loader (`err-inject`) only meet
//! through the loaded image: two maps and one program, looked up by name.
//! The names, capacities and the per-entry decision rule live here so both
//! sides agree on them.

/// Name of the single-slot array holding the value to inject.
///
/// Must match the `#[map(name = ...)]` declaration in `err-inject-ebpf`.
pub const ERR_MAP: &str = "err_map";

/// Name of the hash map holding the target process ids.
///
/// Must match the `#[map(name = ...)]` declaration in `err-inject-ebpf`.
pub const PID_MAP: &str = "pid_map";

/// Name of the probe program inside the image (the `#[kprobe]` fn).
pub const PROG_NAME: &str = "prog1";

/// Slot in [`ERR_MAP`] where the error code is stored. The map has exactly
/// one slot; the constant exists so both sides spell the key the same way.
pub const ERR_CODE_SLOT: u32 = 0;

/// Capacity of [`PID_MAP`]. The control program must refuse longer
/// allowlists up front; the kernel would otherwise reject the overflowing
/// insert and leave a half-written table behind.
pub const MAX_TARGET_PIDS: u32 = 256;

/// Value stored for every allowlisted pid. Only membership matters; the
/// probe never reads the byte.
pub const ALLOWLISTED: u8 = 1;

/// What the probe does for one entry to the attached syscall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Let the syscall run unmodified.
    Pass,
    /// Force an immediate return with this value (a negative errno).
    Override(i32),
}

/// Decide what to do for a single syscall entry.
///
/// `allowlisted` is the result of the [`PID_MAP`] lookup for the calling
/// thread, `err_code` the content of [`ERR_MAP`] (None when the slot was
/// never written). A missing or zero error code means "nothing configured"
/// and passes the call through; it is never treated as "inject 0".
///
/// This is the whole decision logic of the probe, kept free of map and
/// context plumbing so it can be exercised on the host.
#[inline(always)]
pub fn injection_action(allowlisted: bool, err_code: Option<i32>) -> Action {
    if !allowlisted {
        return Action::Pass;
    }
    match err_code {
        Some(code) if code != 0 => Action::Override(code),
        _ => Action::Pass,
    }
}
