mod api;
mod cli;
mod config;
mod schema;
mod sync;
mod translator;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Sync(args) => cli::commands::sync::handle_sync_command(args).await,
        Commands::Dump(args) => cli::commands::dump::handle_dump_command(args).await,
    }
}
