//! `stowage show` command implementation.

use anyhow::{Context as _, Result, bail};
use colored::Colorize;
use stowage::Note;

use super::Context;

/// Run the show command.
pub fn run(ctx: &Context, id: u64, json: bool) -> Result<()> {
    let provider = ctx.open()?;
    let item = provider.load_item(id);
    provider.stop();

    let Some(item) = item else {
        bail!("no readable item with id {id}");
    };

    if json {
        let payload = item.to_payload().context("failed to serialize item")?;
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    println!("{} {}", "Id:".white().bold(), item.id());
    println!("{} {}", "Name:".white().bold(), item.name());
    println!("{} {}", "Kind:".white().bold(), item.kind());
    if let Some(note) = item.downcast_ref::<Note>()
        && !note.body.is_empty()
    {
        println!();
        println!("{}", note.body);
    }
    Ok(())
}
