//! `stowage put` command implementation.

use std::sync::Arc;

use anyhow::{Result, bail};
use colored::Colorize;
use stowage::{Note, naming};

use super::{Context, finish};

/// Run the put command.
pub fn run(ctx: &Context, id: u64, name: &str, body: &str) -> Result<()> {
    let provider = ctx.open()?;
    let note = Note::new(id, name, body);
    let file = naming::file_name(name, id);

    if !provider.persist_item(Arc::new(note)) {
        provider.stop();
        bail!("note {id} was rejected: {name:?} cannot be used as a stored name");
    }
    finish(&provider)?;

    println!("{} {}", "Stored".green().bold(), file);
    Ok(())
}
