use anyhow::{anyhow, Context as _};
use aya_build::cargo_metadata;

/// Compiles the probe crate for the bpf target and drops the object file in
/// OUT_DIR, where `include_bytes_aligned!` picks it up.
fn main() -> anyhow::Result<()> {
    let cargo_metadata::Metadata { packages, .. } = cargo_metadata::MetadataCommand::new()
        .no_deps()
        .exec()
        .context("MetadataCommand::exec")?;
    let ebpf_package = packages
        .into_iter()
        .find(|cargo_metadata::Package { name, .. }| name == "err-inject-ebpf")
        .ok_or_else(|| anyhow!("err-inject-ebpf package not found"))?;
    aya_build::build_ebpf([ebpf_package], aya_build::Toolchain::default())
}
