//! Shared sync entrypoint used by the CLI and the daemon.

use std::sync::Arc;

use dialer_core::{Config, SyncResult};

use crate::engine::{SyncEngine, SyncOptions};
use crate::error::SyncError;
use crate::postgrest::PostgrestStore;
use crate::sheets::GoogleSheets;

/// Build an engine wired to the Google Sheets source and the PostgREST store
/// described by `config`.
pub fn engine_from_config(config: &Config) -> Result<SyncEngine, SyncError> {
    let source = GoogleSheets::new(&config.sheets, config.http_timeout)?;
    let store = PostgrestStore::new(&config.store, config.http_timeout);
    Ok(SyncEngine::new(Arc::new(source), Arc::new(store)))
}

/// Run exactly one pass against the configured collaborators.
///
/// A client that cannot even be built (unusable key material) is reported
/// the same way as a failure during the pass.
pub fn run(config: &Config, options: &SyncOptions) -> SyncResult {
    match engine_from_config(config) {
        Ok(engine) => engine.run(options),
        Err(err) => {
            let now = chrono::Utc::now();
            tracing::error!(error = %err, "could not build sync clients");
            if let Some(hook) = &options.on_error {
                hook(&err);
            }
            SyncResult::failed(now, now, err.to_string())
        }
    }
}
