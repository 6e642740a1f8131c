#![no_std]
#![no_main]

use aya_ebpf::{
    helpers::{bpf_get_current_pid_tgid, gen::bpf_override_return},
    macros::{kprobe, map},
    maps::{Array, HashMap},
    programs::ProbeContext,
};
use aya_log_ebpf::debug;
use err_inject_common::{injection_action, Action, ERR_CODE_SLOT, MAX_TARGET_PIDS};

// ============================== CONFIG MAPS =================================

/// Value to force the syscall to return, as a negative errno. One slot,
/// written once by the loader before attach. Zero means nothing configured.
#[map(name = "err_map")]
static ERR_CODE: Array<i32> = Array::with_max_entries(1, 0);

/// Ids eligible for injection (key = id, val = 1). The probe fires for every
/// process on the system; this map is what keeps the blast radius small.
#[map(name = "pid_map")]
static TARGET_PIDS: HashMap<i32, u8> = HashMap::with_max_entries(MAX_TARGET_PIDS, 0);

// ================================ PROBE =====================================

// Runs on every entry to whichever syscall the loader attached us to.
// Two lookups and, for matching ids, one override; everything else falls
// through untouched.
#[kprobe]
pub fn prog1(ctx: ProbeContext) -> u32 {
    // low 32 bits = the per-thread id, the width the allowlist is keyed on
    let pid = bpf_get_current_pid_tgid() as i32;

    let allowlisted = unsafe { TARGET_PIDS.get(&pid) }.is_some();
    let err_code = ERR_CODE.get(ERR_CODE_SLOT).copied();

    match injection_action(allowlisted, err_code) {
        Action::Pass => 0,
        Action::Override(code) => {
            debug!(&ctx, "id {} gets {} instead of the real syscall", pid, code);
            unsafe { bpf_override_return(ctx.regs, code as u64) };
            0
        }
    }
}

// =========== BOILERPLATE ===============

#[cfg(not(test))]
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    loop {}
}

#[unsafe(link_section = "license")]
#[unsafe(no_mangle)]
static LICENSE: [u8; 13] = *b"Dual MIT/GPL\0";
