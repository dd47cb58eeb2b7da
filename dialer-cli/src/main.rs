//! Dialer: sheet-to-store lead sync.
//!
//! # Usage
//!
//! ```text
//! dialer sync [--sheet-name <tab>] [--batch-size <n>] [--force-full-sync] [--json]
//! dialer serve [--bind <addr>]
//! dialer leads list [--page <n>] [--per-page <n>] [--json]
//! dialer leads show <sheet_row_id> [--json]
//! dialer config check
//! ```
//!
//! Every command reads its configuration from the environment. A `.env` in
//! the working directory is loaded when present; `--env-file` names another.

mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use commands::{
    config::ConfigCommand, leads::LeadsCommand, serve::ServeArgs, sync::SyncArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "dialer",
    version,
    about = "Sync dialer leads from a spreadsheet into the lead store",
    long_about = None,
)]
struct Cli {
    /// Load environment variables from this file instead of `./.env`.
    #[arg(long, global = true, value_name = "PATH")]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run exactly one sync pass and report the result.
    Sync(SyncArgs),

    /// Run the HTTP trigger and scheduler in the foreground.
    Serve(ServeArgs),

    /// Read leads back from the store.
    Leads {
        #[command(subcommand)]
        command: LeadsCommand,
    },

    /// Inspect the resolved configuration.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    load_env(cli.env_file.as_deref())?;

    match cli.command {
        Commands::Sync(args) => args.run(),
        Commands::Serve(args) => args.run(),
        Commands::Leads { command } => commands::leads::run(command),
        Commands::Config { command } => commands::config::run(command),
    }
}

fn load_env(path: Option<&std::path::Path>) -> Result<()> {
    match path {
        Some(path) => {
            dotenvy::from_path(path)
                .with_context(|| format!("failed to load env file {}", path.display()))?;
        }
        None => match dotenvy::dotenv() {
            Ok(_) => {}
            Err(err) if err.not_found() => {}
            Err(err) => return Err(err).context("failed to load .env"),
        },
    }
    Ok(())
}
