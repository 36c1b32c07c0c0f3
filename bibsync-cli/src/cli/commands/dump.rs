//! Dump command handler: show every stage of a reference's translation

use anyhow::{Context, Result};
use clap::Args;
use colored::*;

use crate::api::BookendsClient;
use crate::schema::{bookends, zotero};
use crate::sync::LocalStore;
use crate::translator;

#[derive(Args)]
pub struct DumpArgs {
    /// Unique id of the Bookends reference
    pub id: i64,
}

pub async fn handle_dump_command(args: DumpArgs) -> Result<()> {
    let local = BookendsClient::new();
    let records = local
        .read_references(&[args.id], &bookends::FIELDS)
        .await?;
    let reference = records
        .first()
        .with_context(|| format!("no reference with id {}", args.id))?;

    let pivot = translator::to_global(bookends::dictionary(), reference)?;
    let item = translator::to_local(zotero::dictionary(), &pivot)?;

    println!("{}", "Source reference (Bookends)".bold());
    println!("{}", serde_json::to_string_pretty(&reference.to_json())?);
    println!();
    println!("{}", "Exchange format".bold());
    println!("{}", serde_json::to_string_pretty(&pivot.to_json())?);
    println!();
    println!("{}", "Target item (Zotero)".bold());
    println!("{}", serde_json::to_string_pretty(&item.to_json())?);
    Ok(())
}
