//! In-process interval trigger.
//!
//! Runs one pass per period until shutdown. The first tick is skipped so a
//! daemon restart does not immediately sync; a tick that arrives while the
//! previous pass is still running is dropped rather than queued.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

use dialer_sync::SyncOptions;

use crate::error::DaemonError;
use crate::state::{AppState, TriggerSource};

pub async fn scheduler_task(
    state: Arc<AppState>,
    period: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval.tick().await;
    tracing::info!(period_secs = period.as_secs(), "sync scheduler started");

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = interval.tick() => {
                let options = SyncOptions::from(&state.defaults);
                match state.run_pass(options, TriggerSource::Scheduler).await {
                    Ok(result) if result.success => {
                        tracing::info!(
                            rows_processed = result.rows_processed.unwrap_or(0),
                            duration_ms = result.duration_ms(),
                            "scheduled sync completed",
                        );
                    }
                    Ok(result) => {
                        tracing::error!(
                            error = result.error.as_deref().unwrap_or("unknown"),
                            "scheduled sync failed",
                        );
                    }
                    Err(err) => {
                        tracing::error!(error = %err, "scheduled sync could not run");
                    }
                }
            }
        }
    }

    Ok(())
}
