//! `stowage rm` command implementation.

use anyhow::{Result, bail};
use colored::Colorize;

use super::{Context, finish};

/// Run the rm command.
pub fn run(ctx: &Context, id: u64) -> Result<()> {
    let provider = ctx.open()?;
    let Some(item) = provider.load_item(id) else {
        provider.stop();
        bail!("no readable item with id {id}");
    };

    if !provider.delete_item(item) {
        provider.stop();
        bail!("delete of item {id} was rejected: queue full");
    }
    finish(&provider)?;

    println!("{} item {}", "Deleted".green().bold(), id);
    Ok(())
}
