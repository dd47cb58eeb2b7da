//! # dialer-sync
//!
//! One-pass spreadsheet → record store synchronisation.
//!
//! [`SyncEngine::run`] reads a sheet's header and data rows through a
//! [`SheetSource`], maps each row into a [`LeadRecord`] keyed by normalized
//! header names, and upserts the whole set into a [`RecordStore`] in one
//! request. [`pipeline::run`] wires the engine to Google Sheets and a
//! PostgREST store from a [`dialer_core::Config`].
//!
//! [`LeadRecord`]: dialer_core::LeadRecord

pub mod engine;
pub mod error;
mod http;
pub mod mapping;
pub mod memory;
pub mod pipeline;
pub mod postgrest;
pub mod sheets;
pub mod source;
pub mod store;

pub use engine::{ErrorHook, FetchedSheet, SyncEngine, SyncOptions};
pub use error::SyncError;
pub use mapping::normalize_header;
pub use memory::{MemorySheet, MemoryStore};
pub use postgrest::PostgrestStore;
pub use sheets::GoogleSheets;
pub use source::SheetSource;
pub use store::RecordStore;
