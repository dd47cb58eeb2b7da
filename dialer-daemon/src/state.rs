//! Shared daemon state and the one place a pass is dispatched from.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;

use dialer_core::{SyncDefaults, SyncResult};
use dialer_sync::{SyncEngine, SyncOptions};

use crate::error::DaemonError;

/// Which surface asked for a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerSource {
    Http,
    Scheduler,
}

/// The most recent pass, whoever triggered it.
#[derive(Debug, Clone, Serialize)]
pub struct LastSync {
    pub source: TriggerSource,
    pub result: SyncResult,
}

pub struct AppState {
    pub engine: SyncEngine,
    pub defaults: SyncDefaults,
    pub sync_interval: Option<Duration>,
    pub started_at: DateTime<Utc>,
    last_sync: RwLock<Option<LastSync>>,
}

impl AppState {
    pub fn new(engine: SyncEngine, defaults: SyncDefaults, sync_interval: Option<Duration>) -> Self {
        Self {
            engine,
            defaults,
            sync_interval,
            started_at: Utc::now(),
            last_sync: RwLock::new(None),
        }
    }

    /// Run one pass on the blocking pool and record its result.
    ///
    /// Passes are not serialised: two triggers arriving together run two
    /// passes side by side.
    pub async fn run_pass(
        &self,
        options: SyncOptions,
        source: TriggerSource,
    ) -> Result<SyncResult, DaemonError> {
        let engine = self.engine.clone();
        let result = tokio::task::spawn_blocking(move || engine.run(&options))
            .await
            .map_err(|err| DaemonError::Task(format!("sync task join error: {err}")))?;

        *self.last_sync.write().await = Some(LastSync {
            source,
            result: result.clone(),
        });
        Ok(result)
    }

    pub async fn last_sync(&self) -> Option<LastSync> {
        self.last_sync.read().await.clone()
    }

    pub async fn status_payload(&self) -> Value {
        let last = self.last_sync().await;
        json!({
            "running": true,
            "started_at": self.started_at,
            "sync_interval_secs": self.sync_interval.map(|d| d.as_secs()),
            "sheet_name": self.defaults.sheet_name,
            "batch_size": self.defaults.batch_size,
            "last_sync": last,
        })
    }
}
