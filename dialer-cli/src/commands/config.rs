//! `dialer config`: configuration inspection.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;

use super::load_config;

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Validate the environment and print the resolved configuration with
    /// secrets redacted.
    Check,
}

pub fn run(command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Check => {
            let config = load_config()?;
            println!(
                "{}",
                serde_json::to_string_pretty(&config).context("failed to render configuration")?
            );
            eprintln!("{} configuration is valid", "✓".green().bold());
        }
    }
    Ok(())
}
