//! Control program for the syscall error injector.
//!
//! The pipeline: validate the request, load the embedded probe, write the
//! errno and pid allowlist into its maps, attach it to the target syscall's
//! entry point, and pin the attachment under bpffs. Configuration lands in
//! the maps before the probe goes live, so no call is ever intercepted in a
//! half-configured state.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use aya::{
    maps::{Array, HashMap},
    programs::{kprobe::KProbeLink, links::FdLink, KProbe},
    Ebpf,
};
use log::{debug, info, warn};
use nix::unistd::Uid;

use err_inject_common::{ALLOWLISTED, ERR_CODE_SLOT, ERR_MAP, MAX_TARGET_PIDS, PID_MAP, PROG_NAME};

pub mod cli;
pub mod errno;

use cli::Cli;

/// Pin files are named `err_inject-<syscall>`, one per intercepted syscall.
pub const PIN_PREFIX: &str = "err_inject-";

/// Kernel entry symbols for syscalls carry an arch-specific wrapper prefix.
#[cfg(target_arch = "x86_64")]
pub const SYSCALL_SYMBOL_PREFIX: &str = "__x64_sys_";
#[cfg(target_arch = "aarch64")]
pub const SYSCALL_SYMBOL_PREFIX: &str = "__arm64_sys_";

/// Symbol the probe attaches to for a syscall name, e.g. `__x64_sys_read`.
pub fn syscall_symbol(name: &str) -> String {
    format!("{SYSCALL_SYMBOL_PREFIX}{name}")
}

/// A validated injection request: which syscall fails, with what return
/// value, for which process ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectionSpec {
    pub syscall: String,
    /// Value the probe forces into the intercepted call's return slot.
    /// Always negative; userspace sees the magnitude as errno.
    pub retval: i32,
    pub pids: Vec<i32>,
}

impl InjectionSpec {
    pub fn new(syscall: &str, error_code: i32, pids: &[i32]) -> Result<Self> {
        // The name feeds both the attach symbol and the pin file name, so
        // reject anything that could smuggle a path separator through.
        if syscall.is_empty()
            || !syscall
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            bail!("`{syscall}` is not a plausible syscall name");
        }
        if !(1..=errno::MAX_ERRNO).contains(&error_code) {
            bail!(
                "errno magnitude must be within 1..={}, got {error_code}",
                errno::MAX_ERRNO
            );
        }
        let mut pids_seen: Vec<i32> = Vec::with_capacity(pids.len());
        for &pid in pids {
            if pid <= 0 {
                bail!("process ids must be positive, got {pid}");
            }
            if !pids_seen.contains(&pid) {
                pids_seen.push(pid);
            }
        }
        if pids_seen.is_empty() {
            bail!("at least one process id is required");
        }
        if pids_seen.len() > MAX_TARGET_PIDS as usize {
            bail!(
                "the allowlist holds at most {MAX_TARGET_PIDS} pids, got {}",
                pids_seen.len()
            );
        }
        Ok(Self {
            syscall: syscall.to_owned(),
            retval: -error_code,
            pids: pids_seen,
        })
    }

    /// Where the attachment gets pinned under the given bpffs directory.
    pub fn pin_path(&self, bpffs: &Path) -> PathBuf {
        bpffs.join(format!("{PIN_PREFIX}{}", self.syscall))
    }
}

/// Checks everything that can fail before any bpf syscall is made: the
/// bpffs directory must exist and the pin path must be free. A taken pin
/// path means an injection for this syscall is already live; overwriting
/// it would silently orphan the old attachment.
pub fn preflight(pin_path: &Path) -> Result<()> {
    let bpffs = pin_path
        .parent()
        .ok_or_else(|| anyhow!("pin path {} has no parent directory", pin_path.display()))?;
    if !bpffs.is_dir() {
        bail!(
            "bpffs mount not found at {} (is the bpf filesystem mounted there?)",
            bpffs.display()
        );
    }
    if pin_path.exists() {
        bail!(
            "{} already exists: an injection for this syscall is already pinned, remove it first",
            pin_path.display()
        );
    }
    if !Uid::effective().is_root() {
        warn!("running without root, the kernel will likely refuse the probe");
    }
    Ok(())
}

/// Lifts the locked-memory rlimit. Kernels before 5.11 account bpf map
/// memory against RLIMIT_MEMLOCK instead of the memory cgroup.
pub fn remove_locked_mem_limit() {
    let rlim = libc::rlimit {
        rlim_cur: libc::RLIM_INFINITY,
        rlim_max: libc::RLIM_INFINITY,
    };
    let ret = unsafe { libc::setrlimit(libc::RLIMIT_MEMLOCK, &rlim) };
    if ret != 0 {
        debug!("remove limit on locked memory failed, ret is: {ret}");
    }
}

/// Loads the embedded probe object into the kernel and wires its log
/// records into our logger. A logger init failure is not fatal, the
/// injection works without it.
pub fn load_image() -> Result<Ebpf> {
    let mut ebpf = Ebpf::load(aya::include_bytes_aligned!(concat!(
        env!("OUT_DIR"),
        "/err-inject"
    )))
    .context("loading the eBPF image into the kernel")?;
    if let Err(e) = aya_log::EbpfLogger::init(&mut ebpf) {
        warn!("failed to initialize eBPF logger: {e}");
    }
    Ok(ebpf)
}

/// Writes the forced return value into the probe's single-slot config map.
pub fn write_error_code(ebpf: &mut Ebpf, retval: i32) -> Result<()> {
    let map = ebpf
        .map_mut(ERR_MAP)
        .ok_or_else(|| anyhow!("map not found: {ERR_MAP}"))?;
    let mut err_code: Array<_, i32> = Array::try_from(map)?;
    err_code
        .set(ERR_CODE_SLOT, retval, 0)
        .context("updating the error-code map")?;
    debug!("{ERR_MAP}[{ERR_CODE_SLOT}] = {retval}");
    Ok(())
}

/// Marks each target pid in the probe's allowlist map.
pub fn seed_allowlist(ebpf: &mut Ebpf, pids: &[i32]) -> Result<()> {
    let map = ebpf
        .map_mut(PID_MAP)
        .ok_or_else(|| anyhow!("map not found: {PID_MAP}"))?;
    let mut allowlist: HashMap<_, i32, u8> = HashMap::try_from(map)?;
    for &pid in pids {
        allowlist
            .insert(pid, ALLOWLISTED, 0)
            .with_context(|| format!("adding pid {pid} to the allowlist"))?;
    }
    debug!("allowlisted {} pid(s)", pids.len());
    Ok(())
}

/// Attaches the probe to the syscall's kernel entry symbol. The returned
/// link is the only handle on the attachment.
pub fn attach_syscall(ebpf: &mut Ebpf, syscall: &str) -> Result<KProbeLink> {
    let symbol = syscall_symbol(syscall);
    let program: &mut KProbe = ebpf
        .program_mut(PROG_NAME)
        .ok_or_else(|| anyhow!("program not found: {PROG_NAME}"))?
        .try_into()?;
    program.load().context("loading the probe program")?;
    let link_id = program
        .attach(&symbol, 0)
        .with_context(|| format!("attaching {PROG_NAME} to {symbol} (does the syscall exist?)"))?;
    info!("attached {PROG_NAME} to {symbol}");
    Ok(program.take_link(link_id)?)
}

/// Pins the attachment under bpffs, handing ownership to the filesystem
/// entry. A failure here means the injection dies with this process, so it
/// is an error, not a shrug.
pub fn pin_attachment(link: KProbeLink, pin_path: &Path) -> Result<()> {
    let fd_link: FdLink = link
        .try_into()
        .context("attachment is not backed by a bpf_link, kernel too old to pin kprobes")?;
    let pinned = fd_link
        .pin(pin_path)
        .with_context(|| format!("pinning the attachment at {}", pin_path.display()))?;
    // The bpffs entry now owns the attachment; dropping our handle must not
    // detach it.
    drop(pinned);
    info!("pinned the attachment at {}", pin_path.display());
    Ok(())
}

/// Runs the whole injection pipeline and returns the pin path on success.
pub fn run(cli: &Cli) -> Result<PathBuf> {
    let spec = InjectionSpec::new(&cli.target_syscall, cli.error_code, &cli.pids)?;
    let pin_path = spec.pin_path(&cli.bpffs);
    preflight(&pin_path)?;
    remove_locked_mem_limit();

    info!(
        "configuring `{}` to fail with {} for {} pid(s)",
        spec.syscall,
        errno::describe(-spec.retval),
        spec.pids.len()
    );
    let mut ebpf = load_image()?;
    // Maps are populated before attach so the first intercepted call
    // already sees the full configuration.
    write_error_code(&mut ebpf, spec.retval)?;
    seed_allowlist(&mut ebpf, &spec.pids)?;
    let link = attach_syscall(&mut ebpf, &spec.syscall)?;
    pin_attachment(link, &pin_path)?;

    // `ebpf` drops here. That closes our descriptors but cannot tear down
    // the injection: the pinned link keeps the program alive and the
    // program keeps its maps.
    Ok(pin_path)
}
