//! The spreadsheet side of a pass.

use crate::error::SyncError;

/// Last column read by the engine. Columns past it are never fetched.
pub const LAST_COLUMN: &str = "Z";

/// Row holding the header.
pub const HEADER_ROW: u32 = 1;

/// A sheet-addressable grid of string cells.
///
/// Every call is a blocking round-trip; the engine never issues two at once.
pub trait SheetSource: Send + Sync {
    /// First row of the sheet, bounded to `A..=LAST_COLUMN`.
    ///
    /// `Ok(None)` when the range holds no row at all.
    fn header_row(&self, sheet: &str) -> Result<Option<Vec<String>>, SyncError>;

    /// Grid row count declared by the spreadsheet metadata, header included.
    ///
    /// Fails with [`SyncError::SheetMetadata`] when the tab does not exist.
    fn row_count(&self, sheet: &str) -> Result<u32, SyncError>;

    /// Rows `first_row..=last_row` (1-based, inclusive).
    ///
    /// Trailing empty rows may be omitted, so the result can be shorter than
    /// the requested span; an empty result means the range holds no data.
    fn read_rows(
        &self,
        sheet: &str,
        first_row: u32,
        last_row: u32,
    ) -> Result<Vec<Vec<String>>, SyncError>;
}

/// A1 range for `first_row..=last_row` of `sheet`, columns `A..=LAST_COLUMN`.
///
/// The sheet name is always quoted so names with spaces or punctuation
/// address correctly; embedded quotes are doubled.
pub fn a1_range(sheet: &str, first_row: u32, last_row: u32) -> String {
    let quoted = sheet.replace('\'', "''");
    format!("'{quoted}'!A{first_row}:{LAST_COLUMN}{last_row}")
}
