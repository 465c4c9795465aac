//! Tabula CLI entry point.
//!
//! Binary name: `tabula`
//!
//! Parses CLI arguments, sets up tracing, opens the configured database and
//! dispatches to the command handlers.

mod cli;
mod state;

use anyhow::Context;
use clap::Parser;
use clap_complete::generate;

use tabula_observe::tracing_setup::{filter_for_verbosity, init_tracing, shutdown_tracing};

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(filter_for_verbosity(cli.verbose, cli.quiet), cli.otel)
        .map_err(|e| anyhow::anyhow!(e))
        .context("Failed to initialise tracing")?;

    let result = run(cli).await;

    shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Shell completions don't need a database
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "tabula", &mut std::io::stdout());
        return Ok(());
    }

    let state = AppState::init(cli.data_dir.clone()).await?;
    cli::dispatch(cli.command, &state, cli.json).await
}
