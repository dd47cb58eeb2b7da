//! Dialer core library: domain types, configuration, errors.
//!
//! - [`types`]: sheet rows, lead records, sync results, lead pages
//! - [`config`]: explicit process configuration built from the environment
//! - [`error`]: [`ConfigError`]

pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, Secret, SheetsConfig, SheetsCredentials, StoreConfig, SyncDefaults};
pub use error::ConfigError;
pub use types::{
    LeadFields, LeadPage, LeadQuery, LeadRecord, SheetRow, SheetRowId, StoredLead, SyncResult,
};
