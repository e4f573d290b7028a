mod app;
mod cli;
mod commands;
mod types;
mod util;

use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Main entry point for the `geoshape` CLI.
///
/// Installs a stderr log subscriber (`RUST_LOG`, default `geoshape_format=warn`)
/// so stdout stays clean for `--json` output, then dispatches the subcommand.
fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("geoshape_format=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = cli::Cli::parse();
    app::run(cli)
}
