//! `stowage mv` command implementation.

use std::sync::Arc;

use anyhow::{Result, bail};
use colored::Colorize;
use stowage::{Note, naming};

use super::{Context, finish};

/// Run the mv command.
///
/// Moves the file, then rewrites it so the stored note carries its new name.
pub fn run(ctx: &Context, id: u64, new_name: &str) -> Result<()> {
    let provider = ctx.open()?;
    let Some(item) = provider.load_item(id) else {
        provider.stop();
        bail!("no readable item with id {id}");
    };
    let renamed = item.downcast_ref::<Note>().map(|note| note.renamed(new_name));

    if !provider.rename_item(item, new_name) {
        provider.stop();
        bail!("rename of item {id} was rejected: {new_name:?} cannot be used as a stored name");
    }
    if let Some(note) = renamed
        && !provider.update_item(Arc::new(note))
    {
        provider.stop();
        bail!("update of item {id} was rejected: queue full");
    }
    finish(&provider)?;

    println!(
        "{} {}",
        "Renamed to".green().bold(),
        naming::file_name(new_name, id)
    );
    Ok(())
}
