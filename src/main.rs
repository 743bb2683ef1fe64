//! Command-line entry point for the amplicon read-count filter.

use amplicon_filter::cli::{run_cli, Cli};
use anyhow::Result;
use clap::Parser;
use log::info;

fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logger; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    // Configure Rayon thread pool
    rayon::ThreadPoolBuilder::new()
        .num_threads(cli.threads)
        .build_global()?;
    info!("Using {} threads.", cli.threads);

    run_cli(cli)
}
