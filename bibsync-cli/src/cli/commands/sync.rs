//! Sync command handler

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use colored::*;

use crate::api::{BookendsClient, WRITE_BATCH_SIZE, ZoteroClient};
use crate::config::Config;
use crate::sync::{SyncOptions, SyncReport, Synchronizer};

#[derive(Args)]
pub struct SyncArgs {
    /// Path to the Zotero library, "groups/<group id>" or "users/<user id>".
    /// Falls back to the configured prefix.
    pub path: Option<String>,

    /// Synchronize in one direction only, towards this side
    #[arg(long, value_enum)]
    pub target: Option<SyncTarget>,

    /// Zotero API key (overrides config and ZOTERO_API_KEY)
    #[arg(long)]
    pub key: Option<String>,

    /// Bookends group to synchronize (overrides config)
    #[arg(long)]
    pub group: Option<String>,

    /// Discard recorded sync state and treat every reference as new
    #[arg(long)]
    pub reset_sync_data: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SyncTarget {
    Zotero,
    Bookends,
}

pub async fn handle_sync_command(args: SyncArgs) -> Result<()> {
    let config = Config::load()?;

    let prefix = args
        .path
        .or(config.zotero.prefix)
        .context("no Zotero library given: pass groups/<id> or users/<id>")?;
    let api_key = args
        .key
        .or(config.zotero.api_key)
        .context("no Zotero API key: pass --key or set ZOTERO_API_KEY")?;

    let remote = ZoteroClient::new(&prefix, &api_key)?;
    let local = BookendsClient::new();

    let version = local
        .version()
        .await
        .context("cannot reach Bookends; is it running with a library window open?")?;
    println!("{}", format!("Connected to Bookends {}", version).dimmed());

    let options = SyncOptions {
        sync_id: format!("zotero:{}", prefix.replace('/', ":")),
        group: args.group.unwrap_or(config.bookends.group),
        sync_data_field: config.bookends.sync_data_field,
        attachment_path: config.bookends.attachment_path,
        reset_sync_data: args.reset_sync_data,
        batch_size: WRITE_BATCH_SIZE,
    };

    let mut session = Synchronizer::new(&local, &remote, options);
    session.prepare().await?;

    match args.target {
        Some(SyncTarget::Zotero) => session.sync_to_remote().await?,
        Some(SyncTarget::Bookends) => session.sync_to_local().await?,
        None => {
            session.sync_to_remote().await?;
            session.sync_to_local().await?;
        }
    }

    print_report(session.report());
    Ok(())
}

fn print_report(report: &SyncReport) {
    println!(
        "{}",
        format!(
            "Zotero: created {} and updated {} items; Bookends: created {} and updated {} references ({} unmodified).",
            report.remote_created,
            report.remote_updated,
            report.local_created,
            report.local_updated,
            report.unmodified
        )
        .green()
    );

    if !report.missing_attachments.is_empty() {
        eprintln!(
            "{}",
            format!(
                "The following attachments were not found and could not be uploaded:\n - {}",
                report.missing_attachments.join("\n - ")
            )
            .yellow()
        );
    }

    if !report.failed.is_empty() {
        eprintln!(
            "{}",
            "The following errors occurred when saving items to the Zotero server:".red()
        );
        for failure in &report.failed {
            match failure.code {
                Some(code) => eprintln!("  [{}] {} ({})", code, failure.message, failure.payload),
                None => eprintln!("  {} ({})", failure.message, failure.payload),
            }
        }
    }
}
