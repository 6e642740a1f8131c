use std::path::PathBuf;

use clap::Parser;

use crate::errno;

/// Force a chosen syscall to fail for chosen processes.
///
/// Loads a kernel probe, points it at the syscall's entry, tells it which
/// errno to return and which process ids to target, then pins the
/// attachment under bpffs so the injection outlives this command. Remove
/// the pin file to stop injecting.
#[derive(Parser, Debug)]
#[command(
    name = "err-inject",
    version = env!("CARGO_PKG_VERSION"),
    about = "Inject syscall failures into running processes"
)]
pub struct Cli {
    /// Syscall to intercept, by name (`read`, `openat`, ...)
    pub target_syscall: String,

    /// Errno to inject: a positive magnitude like `5` or a name like `EIO`
    #[arg(value_parser = errno::parse_errno)]
    pub error_code: i32,

    /// Ids of the processes to target (at most 256)
    #[arg(required = true, value_parser = clap::value_parser!(i32).range(1..))]
    pub pids: Vec<i32>,

    /// Bpf filesystem directory the attachment is pinned under
    #[arg(long, env = "ERR_INJECT_BPFFS", default_value = "/sys/fs/bpf")]
    pub bpffs: PathBuf,
}
