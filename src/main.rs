mod cache;
mod cli;
mod config;
mod depth;
mod error;
mod models;
mod output;
mod plugins;
mod providers;
mod query;
mod workspace;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::{info, LevelFilter};
use plugins::Registry;

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    // RUST_LOG still takes precedence over -v
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    output::print_banner();

    // Plugins register here before anything is classified or fetched
    let registry = Registry::new();

    info!("Starting citree - CI hierarchy explorer");
    cli.execute(&registry).await?;

    Ok(())
}
