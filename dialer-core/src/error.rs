//! Error types for dialer-core.

use thiserror::Error;

/// All errors that can arise while building a [`crate::Config`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// One or more required environment keys were absent or blank.
    ///
    /// Every missing key is reported at once so a single run surfaces the
    /// whole gap.
    #[error("missing required configuration: {}", keys.join(", "))]
    Missing { keys: Vec<String> },

    /// A key was present but its value could not be used.
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },
}

/// Convenience constructor for [`ConfigError::Invalid`].
pub(crate) fn invalid(key: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        reason: reason.into(),
    }
}
