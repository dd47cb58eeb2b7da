//! The record store side of a pass, plus the dashboard read path.

use dialer_core::types::{LeadPage, LeadQuery, LeadRecord, SheetRowId, StoredLead};

use crate::error::SyncError;

/// A table supporting keyed upsert and ordered, paginated reads.
pub trait RecordStore: Send + Sync {
    /// Insert-or-update every record in one request, resolving conflicts on
    /// `conflict_key`. Columns a record does not carry are left as stored.
    ///
    /// All or nothing: an error means no record of the batch was applied.
    fn upsert(&self, records: &[LeadRecord], conflict_key: &str) -> Result<(), SyncError>;

    /// One ordered page of stored leads.
    fn list(&self, query: LeadQuery) -> Result<LeadPage, SyncError>;

    /// The stored lead for a sheet row, if any.
    fn get(&self, sheet_row_id: &SheetRowId) -> Result<Option<StoredLead>, SyncError>;
}
