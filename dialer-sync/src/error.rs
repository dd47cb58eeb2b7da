//! Error types for dialer-sync.

use thiserror::Error;

/// Boxed source error from a collaborator (HTTP transport, test double, ...).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// All errors that can end a sync pass or a store read.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The header range of the sheet came back empty.
    #[error("no header row found in sheet '{sheet}'")]
    NoHeader { sheet: String },

    /// The named sheet tab is not part of the spreadsheet metadata.
    #[error("sheet '{sheet}' not found in spreadsheet metadata")]
    SheetMetadata { sheet: String },

    /// A read against the spreadsheet source failed (network, auth, quota).
    #[error("failed to fetch {context}: {source}")]
    UpstreamFetch {
        context: String,
        #[source]
        source: BoxError,
    },

    /// The access token exchange for the spreadsheet source failed.
    #[error("spreadsheet authentication failed: {source}")]
    Auth {
        #[source]
        source: BoxError,
    },

    /// The record store rejected a write.
    #[error("store write failed ({context}): {source}")]
    StoreWrite {
        context: String,
        #[source]
        source: BoxError,
    },

    /// The record store rejected a read.
    #[error("store read failed ({context}): {source}")]
    StoreRead {
        context: String,
        #[source]
        source: BoxError,
    },

    /// An upstream payload did not have the expected shape.
    #[error("malformed response from {context}: {source}")]
    Decode {
        context: String,
        #[source]
        source: BoxError,
    },

    /// Pass options that cannot be honoured.
    #[error("invalid sync options: {0}")]
    InvalidOptions(String),
}

/// Convenience constructor for [`SyncError::UpstreamFetch`].
pub fn fetch_err(context: impl Into<String>, source: impl Into<BoxError>) -> SyncError {
    SyncError::UpstreamFetch {
        context: context.into(),
        source: source.into(),
    }
}

/// Convenience constructor for [`SyncError::StoreWrite`].
pub fn write_err(context: impl Into<String>, source: impl Into<BoxError>) -> SyncError {
    SyncError::StoreWrite {
        context: context.into(),
        source: source.into(),
    }
}

/// Convenience constructor for [`SyncError::StoreRead`].
pub fn read_err(context: impl Into<String>, source: impl Into<BoxError>) -> SyncError {
    SyncError::StoreRead {
        context: context.into(),
        source: source.into(),
    }
}

/// Convenience constructor for [`SyncError::Decode`].
pub(crate) fn decode_err(context: impl Into<String>, source: impl Into<BoxError>) -> SyncError {
    SyncError::Decode {
        context: context.into(),
        source: source.into(),
    }
}
