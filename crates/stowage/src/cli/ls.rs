//! `stowage ls` command implementation.

use anyhow::Result;
use colored::Colorize;

use super::Context;

/// Run the ls command.
pub fn run(ctx: &Context) -> Result<()> {
    let provider = ctx.open()?;
    let entries = provider.indexed_entries();

    if entries.is_empty() {
        println!("{}", "No stored items".dimmed());
    }
    for (id, file) in &entries {
        let name = match provider.load_item(*id) {
            Some(item) => item.name().to_string(),
            None => "(unreadable)".red().to_string(),
        };
        println!("{:>8}  {}  {}", id.to_string().green(), file, name.white().bold());
    }

    provider.stop();
    Ok(())
}
