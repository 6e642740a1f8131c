use which::which;

/// Building this crate depends on the `bpf-linker` binary being in `PATH`,
/// which cargo cannot express as a real dependency yet (see
/// https://github.com/rust-lang/cargo/issues/12385). Failing here gives a
/// clearer message than the linker error would.
fn main() {
    let bpf_linker = which("bpf-linker").unwrap();
    println!("cargo:rerun-if-changed={}", bpf_linker.to_str().unwrap());
}
