use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use kbak::{
	commands::{self, backup::BackupArgs, util::BrokenPipeGuard},
	telemetry,
};
use tracing::Level;

#[cfg(all(
	target_os = "linux",
	feature = "mimalloc",
	not(feature = "system-alloc")
))]
#[global_allocator]
static GLOBAL: mimallocator::Mimalloc = mimallocator::Mimalloc;

#[derive(Parser)]
#[command(name = "kbak")]
#[command(about = "Backup the resources of a Kubernetes namespace as clean YAML manifests", long_about = None)]
#[command(version = env!("KBAK_VERSION"))]
struct Cli {
	#[command(flatten)]
	args: BackupArgs,
}

fn main() -> Result<ExitCode> {
	let cli = Cli::parse();

	let default_level = if cli.args.verbose {
		Level::DEBUG
	} else {
		Level::INFO
	};
	telemetry::init(cli.args.log_level, default_level);

	let stdout = BrokenPipeGuard::new(std::io::stdout());
	commands::backup::run(cli.args, stdout)
}
