pub mod config;
pub mod leads;
pub mod serve;
pub mod sync;

use anyhow::{Context, Result};
use dialer_core::Config;

/// Resolve configuration from the process environment.
pub(crate) fn load_config() -> Result<Config> {
    Config::from_env().context("invalid configuration")
}
