//! Stowage CLI - inspect and edit an item store from the command line.
//!
//! Every command opens the store directory, starts a persistence provider
//! (which rebuilds the index from the file names), does its work through
//! the provider, waits for queued writes, and stops it again.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use colored::Colorize;
use stowage::ItemId;
use tracing_subscriber::EnvFilter;

mod cli;

/// Stowage: write-behind item storage, one file per item.
#[derive(Parser)]
#[command(name = "stowage")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Store directory (created if missing)
    #[arg(short, long, global = true, default_value = ".")]
    store: PathBuf,

    /// Provider configuration file (defaults to <store>/stowage.yaml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List stored items recovered from the store's file names
    Ls,

    /// Create or overwrite a note
    Put {
        /// Note id
        #[arg(long)]
        id: ItemId,

        /// Note name (whitespace becomes '_' in the file name)
        #[arg(long)]
        name: String,

        /// Note text
        #[arg(long, default_value = "")]
        body: String,
    },

    /// Print a stored note
    Show {
        /// Note id
        id: ItemId,

        /// Print the raw JSON payload
        #[arg(long)]
        json: bool,
    },

    /// Delete a stored item
    Rm {
        /// Item id
        id: ItemId,
    },

    /// Rename a stored note (moves its file)
    Mv {
        /// Note id
        id: ItemId,

        /// New name
        new_name: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let ctx = cli::Context {
        store: cli.store,
        config: cli.config,
    };

    let result = match cli.command {
        Commands::Ls => cli::ls::run(&ctx),
        Commands::Put { id, name, body } => cli::put::run(&ctx, id, &name, &body),
        Commands::Show { id, json } => cli::show::run(&ctx, id, json),
        Commands::Rm { id } => cli::rm::run(&ctx, id),
        Commands::Mv { id, new_name } => cli::mv::run(&ctx, id, &new_name),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {e}", "error".red().bold());
            for cause in e.chain().skip(1) {
                eprintln!("  {}: {cause}", "caused by".dimmed());
            }
            ExitCode::FAILURE
        }
    }
}
