//! `dialer sync`: run one pass and report it.

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use dialer_core::SyncResult;
use dialer_sync::{pipeline, SyncOptions};

use super::load_config;

/// Arguments for `dialer sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Sheet tab to read (defaults to DIALER_SHEET_NAME or "Leads").
    #[arg(long)]
    pub sheet_name: Option<String>,

    /// Rows per data read (defaults to DIALER_BATCH_SIZE or 50).
    #[arg(long)]
    pub batch_size: Option<u32>,

    /// Accepted for compatibility; every pass is a full re-read.
    #[arg(long)]
    pub force_full_sync: bool,

    /// Emit the sync result as JSON.
    #[arg(long)]
    pub json: bool,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        dialer_daemon::init_tracing();
        let config = load_config()?;

        let defaults = SyncOptions::from(&config.sync);
        let options = SyncOptions {
            sheet_name: self.sheet_name.unwrap_or(defaults.sheet_name),
            batch_size: self.batch_size.unwrap_or(defaults.batch_size),
            force_full_sync: self.force_full_sync,
            on_error: None,
        };

        let result = pipeline::run(&config, &options);
        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&result).context("failed to render sync result")?
            );
        } else {
            print_result(&options.sheet_name, &result);
        }

        if !result.success {
            bail!(
                "sync failed: {}",
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
        Ok(())
    }
}

fn print_result(sheet: &str, result: &SyncResult) {
    if result.success {
        println!(
            "{} synced {} leads from '{sheet}' in {} ms",
            "✓".green().bold(),
            result.rows_processed.unwrap_or(0),
            result.duration_ms(),
        );
    } else {
        println!("{} sync of '{sheet}' failed", "✗".red().bold());
    }
    println!(
        "  {} {}",
        "started".bright_black(),
        result.sync_start_time.to_rfc3339()
    );
    println!(
        "  {} {}",
        "ended  ".bright_black(),
        result.sync_end_time.to_rfc3339()
    );
}
