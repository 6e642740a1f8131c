use anyhow::Result;
use clap::Parser;

use err_inject::{cli::Cli, run};

// aya-log reads probe records off a perf buffer from spawned tasks, so the
// binary runs inside a tokio runtime even though the pipeline itself is
// synchronous.
#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let pin_path = run(&cli)?;
    println!("pinned: {}", pin_path.display());
    Ok(())
}
