//! Domain types shared by the sync engine, the daemon and the CLI.
//!
//! Lead records have no fixed schema: their columns come from whatever the
//! sheet's header row says on a given pass. They are modelled as an ordered
//! map of field name to optional string, with the two fields the engine owns
//! (`sheet_row_id`, `last_sync`) layered on top as typed fields.

use std::fmt;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Column holding the upsert conflict key.
pub const SHEET_ROW_ID: &str = "sheet_row_id";

/// Column holding the start time of the pass that last wrote a record.
pub const LAST_SYNC: &str = "last_sync";

/// Field names the engine owns. Header columns that normalize to one of
/// these are dropped from the dynamic field map.
pub const RESERVED_FIELDS: [&str; 2] = [SHEET_ROW_ID, LAST_SYNC];

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Stable identifier tying a record to a sheet row.
///
/// Derived from the row's 1-based position, so it follows the position and
/// not the content: inserting a row above shifts every identity below it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SheetRowId(pub String);

impl SheetRowId {
    /// Identifier for the row at `row_index` (1-based, header included).
    pub fn from_row_index(row_index: u32) -> Self {
        Self(row_index.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SheetRowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for SheetRowId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SheetRowId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Sync pass types
// ---------------------------------------------------------------------------

/// One data row fetched during a pass. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRow {
    /// Absolute 1-based position in the sheet (the header is row 1).
    pub row_index: u32,
    pub cells: Vec<String>,
}

/// Dynamic columns of a lead, in header order.
pub type LeadFields = IndexMap<String, Option<String>>;

/// A mapped sheet row, ready for upsert.
///
/// Serialises flat: the dynamic fields followed by `sheet_row_id` and
/// `last_sync`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadRecord {
    #[serde(flatten)]
    pub fields: LeadFields,
    pub sheet_row_id: SheetRowId,
    pub last_sync: DateTime<Utc>,
}

impl LeadRecord {
    /// Value of a dynamic field; `None` both for unknown keys and null cells.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(|v| v.as_deref())
    }
}

/// Outcome of one sync pass.
///
/// Serialises as `{success, syncStartTime, syncEndTime, rowsProcessed}` on
/// success and `{success, syncStartTime, syncEndTime, error}` on failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub success: bool,
    pub sync_start_time: DateTime<Utc>,
    pub sync_end_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows_processed: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncResult {
    pub fn succeeded(
        sync_start_time: DateTime<Utc>,
        sync_end_time: DateTime<Utc>,
        rows_processed: usize,
    ) -> Self {
        Self {
            success: true,
            sync_start_time,
            sync_end_time,
            rows_processed: Some(rows_processed),
            error: None,
        }
    }

    pub fn failed(
        sync_start_time: DateTime<Utc>,
        sync_end_time: DateTime<Utc>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            sync_start_time,
            sync_end_time,
            rows_processed: None,
            error: Some(error.into()),
        }
    }

    /// Wall-clock length of the pass in milliseconds.
    pub fn duration_ms(&self) -> i64 {
        (self.sync_end_time - self.sync_start_time).num_milliseconds()
    }
}

// ---------------------------------------------------------------------------
// Read path
// ---------------------------------------------------------------------------

/// A lead as returned by the record store: every column the table holds,
/// including ones the store adds itself (`id`, `created_at`, ...).
pub type StoredLead = IndexMap<String, Value>;

/// Largest page the read path will request.
pub const MAX_PER_PAGE: u32 = 200;

/// Default page size for lead listings.
pub const DEFAULT_PER_PAGE: u32 = 25;

/// A page request against the record store. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadQuery {
    pub page: u32,
    pub per_page: u32,
}

impl Default for LeadQuery {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl LeadQuery {
    /// Build a query, clamping `page` to at least 1 and `per_page` to
    /// `1..=MAX_PER_PAGE`.
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, MAX_PER_PAGE),
        }
    }

    /// Zero-based index of the first item on this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.max(1) - 1) * u64::from(self.per_page)
    }
}

/// One page of stored leads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadPage {
    pub leads: Vec<StoredLead>,
    pub page: u32,
    pub per_page: u32,
    /// Total rows in the table, when the store reports it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

impl LeadPage {
    /// Number of pages implied by `total`, if known.
    pub fn total_pages(&self) -> Option<u64> {
        self.total
            .map(|total| total.div_ceil(u64::from(self.per_page.max(1))))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;
    use serde_json::json;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn sheet_row_id_from_row_index() {
        assert_eq!(SheetRowId::from_row_index(2).as_str(), "2");
        assert_eq!(SheetRowId::from("17").to_string(), "17");
    }

    #[test]
    fn lead_record_serialises_flat_in_header_order() {
        let mut fields = LeadFields::new();
        fields.insert("name".into(), Some("Alice".into()));
        fields.insert("phone".into(), None);
        let record = LeadRecord {
            fields,
            sheet_row_id: SheetRowId::from_row_index(2),
            last_sync: ts(),
        };

        let encoded = serde_json::to_string(&record).expect("serialize");
        assert_eq!(
            encoded,
            r#"{"name":"Alice","phone":null,"sheet_row_id":"2","last_sync":"2024-05-01T12:00:00Z"}"#
        );
        assert_eq!(record.field("name"), Some("Alice"));
        assert_eq!(record.field("phone"), None);
    }

    #[test]
    fn sync_result_success_shape() {
        let value = serde_json::to_value(SyncResult::succeeded(ts(), ts(), 3)).unwrap();
        assert_eq!(
            value,
            json!({
                "success": true,
                "syncStartTime": "2024-05-01T12:00:00Z",
                "syncEndTime": "2024-05-01T12:00:00Z",
                "rowsProcessed": 3,
            })
        );
    }

    #[test]
    fn sync_result_failure_shape() {
        let value = serde_json::to_value(SyncResult::failed(ts(), ts(), "boom")).unwrap();
        assert_eq!(value["success"], json!(false));
        assert_eq!(value["error"], json!("boom"));
        assert!(value.get("rowsProcessed").is_none());
    }

    #[rstest]
    #[case(0, 0, 1, 1)]
    #[case(3, 10, 3, 10)]
    #[case(1, 5000, 1, MAX_PER_PAGE)]
    fn lead_query_clamps(
        #[case] page: u32,
        #[case] per_page: u32,
        #[case] want_page: u32,
        #[case] want_per_page: u32,
    ) {
        let q = LeadQuery::new(page, per_page);
        assert_eq!((q.page, q.per_page), (want_page, want_per_page));
    }

    #[test]
    fn lead_query_offset_and_total_pages() {
        let q = LeadQuery::new(3, 25);
        assert_eq!(q.offset(), 50);

        let page = LeadPage {
            leads: vec![],
            page: 3,
            per_page: 25,
            total: Some(51),
        };
        assert_eq!(page.total_pages(), Some(3));
    }
}
