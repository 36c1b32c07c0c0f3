//! Command-line interface

pub mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "bibsync",
    about = "Synchronize a Bookends library with a Zotero library",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Synchronize the Bookends library with a Zotero library
    Sync(commands::sync::SyncArgs),
    /// Translate one Bookends reference and print every translation stage
    Dump(commands::dump::DumpArgs),
}
