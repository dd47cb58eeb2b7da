use thiserror::Error;

/// Error surface for the daemon runtime and HTTP server.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error ({context}): {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("sync error: {0}")]
    Sync(#[from] dialer_sync::SyncError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("task failure: {0}")]
    Task(String),
}

pub(crate) fn io_err(context: impl Into<String>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        context: context.into(),
        source,
    }
}
