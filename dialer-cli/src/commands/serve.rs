//! `dialer serve`: foreground daemon.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::Args;

use super::load_config;

/// Arguments for `dialer serve`.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on (overrides DIALER_BIND).
    #[arg(long)]
    pub bind: Option<SocketAddr>,

    /// Seconds between scheduled passes; 0 disables the scheduler
    /// (overrides DIALER_SYNC_INTERVAL_SECS).
    #[arg(long, value_name = "SECS")]
    pub interval: Option<u64>,
}

impl ServeArgs {
    pub fn run(self) -> Result<()> {
        let mut config = load_config()?;
        if let Some(bind) = self.bind {
            config.server.bind = bind;
        }
        if let Some(secs) = self.interval {
            config.server.sync_interval =
                (secs > 0).then(|| std::time::Duration::from_secs(secs));
        }
        dialer_daemon::start_blocking(config).context("daemon exited with error")
    }
}
