//! In-process [`SheetSource`] and [`RecordStore`].
//!
//! Used by the test suites of every crate in the workspace, and handy for
//! exercising the engine without network access. Both can be told to fail
//! so the all-or-nothing behaviour of a pass can be observed.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use indexmap::IndexMap;
use serde_json::Value;

use dialer_core::types::{LeadPage, LeadQuery, LeadRecord, SheetRowId, StoredLead, SHEET_ROW_ID};

use crate::error::{decode_err, fetch_err, write_err, SyncError};
use crate::source::{a1_range, SheetSource};
use crate::store::RecordStore;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// MemorySheet
// ---------------------------------------------------------------------------

/// A single named sheet held in memory. Row 1 is `grid[0]`.
#[derive(Debug)]
pub struct MemorySheet {
    name: String,
    grid: Mutex<Vec<Vec<String>>>,
    declared_rows: Option<u32>,
    fail_on_batch: Option<usize>,
    data_reads: Mutex<Vec<(u32, u32)>>,
}

impl MemorySheet {
    pub fn new(name: impl Into<String>, grid: Vec<Vec<String>>) -> Self {
        Self {
            name: name.into(),
            grid: Mutex::new(grid),
            declared_rows: None,
            fail_on_batch: None,
            data_reads: Mutex::new(Vec::new()),
        }
    }

    /// Build from string slices, header first.
    pub fn from_rows(name: impl Into<String>, rows: &[&[&str]]) -> Self {
        Self::new(name, to_grid(rows))
    }

    /// Report `rows` as the grid row count instead of the populated length,
    /// like a real sheet whose grid extends past its data.
    pub fn with_row_count(mut self, rows: u32) -> Self {
        self.declared_rows = Some(rows);
        self
    }

    /// Make the `batch`-th data read (1-based) fail.
    pub fn failing_on_batch(mut self, batch: usize) -> Self {
        self.fail_on_batch = Some(batch);
        self
    }

    /// Replace the sheet content, e.g. to simulate edits between passes.
    pub fn replace_rows(&self, rows: &[&[&str]]) {
        *lock(&self.grid) = to_grid(rows);
    }

    /// Every data range requested so far, as `(first_row, last_row)`.
    pub fn data_reads(&self) -> Vec<(u32, u32)> {
        lock(&self.data_reads).clone()
    }

    fn check_name(&self, sheet: &str) -> Result<(), SyncError> {
        if sheet == self.name {
            Ok(())
        } else {
            Err(SyncError::SheetMetadata {
                sheet: sheet.to_string(),
            })
        }
    }
}

fn to_grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
    rows.iter()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect())
        .collect()
}

impl SheetSource for MemorySheet {
    fn header_row(&self, sheet: &str) -> Result<Option<Vec<String>>, SyncError> {
        if sheet != self.name {
            return Err(fetch_err(
                a1_range(sheet, 1, 1),
                format!("unable to parse range: {sheet}"),
            ));
        }
        Ok(lock(&self.grid).first().filter(|row| !row.is_empty()).cloned())
    }

    fn row_count(&self, sheet: &str) -> Result<u32, SyncError> {
        self.check_name(sheet)?;
        let populated = u32::try_from(lock(&self.grid).len())
            .map_err(|e| decode_err("memory sheet row count", e))?;
        Ok(self.declared_rows.unwrap_or(populated))
    }

    fn read_rows(
        &self,
        sheet: &str,
        first_row: u32,
        last_row: u32,
    ) -> Result<Vec<Vec<String>>, SyncError> {
        self.check_name(sheet)?;
        let batch = {
            let mut reads = lock(&self.data_reads);
            reads.push((first_row, last_row));
            reads.len()
        };
        if self.fail_on_batch == Some(batch) {
            return Err(fetch_err(
                a1_range(sheet, first_row, last_row),
                "injected read failure",
            ));
        }

        let grid = lock(&self.grid);
        let start = (first_row.max(1) - 1) as usize;
        let end = (last_row as usize).min(grid.len());
        let mut rows: Vec<Vec<String>> = grid.get(start..end).unwrap_or_default().to_vec();
        // The Sheets API drops trailing empty rows from a range.
        while rows.last().is_some_and(|row| row.iter().all(String::is_empty)) {
            rows.pop();
        }
        Ok(rows)
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// A table keyed by `sheet_row_id` with PostgREST merge-upsert semantics.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Mutex<IndexMap<SheetRowId, StoredLead>>,
    upsert_calls: AtomicUsize,
    reject_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent upsert fail (or succeed again).
    pub fn reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    /// Number of upsert calls received, failed ones included.
    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        lock(&self.rows).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All stored leads, ordered by numeric `sheet_row_id`.
    pub fn snapshot(&self) -> Vec<StoredLead> {
        let rows = lock(&self.rows);
        let mut leads: Vec<_> = rows.iter().collect();
        leads.sort_by_key(|(id, _)| row_order(id));
        leads.into_iter().map(|(_, lead)| lead.clone()).collect()
    }
}

fn row_order(id: &SheetRowId) -> (u64, String) {
    (id.as_str().parse().unwrap_or(u64::MAX), id.0.clone())
}

impl RecordStore for MemoryStore {
    fn upsert(&self, records: &[LeadRecord], conflict_key: &str) -> Result<(), SyncError> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(write_err("memory upsert", "write rejected by store"));
        }
        if conflict_key != SHEET_ROW_ID {
            return Err(write_err(
                "memory upsert",
                format!("no unique constraint on column '{conflict_key}'"),
            ));
        }

        let mut encoded = Vec::with_capacity(records.len());
        for record in records {
            let Value::Object(map) =
                serde_json::to_value(record).map_err(|e| write_err("memory upsert", e))?
            else {
                return Err(write_err("memory upsert", "record is not a JSON object"));
            };
            encoded.push((record.sheet_row_id.clone(), map));
        }

        let mut rows = lock(&self.rows);
        for (id, map) in encoded {
            let stored = rows.entry(id).or_default();
            for (column, value) in map {
                stored.insert(column, value);
            }
        }
        Ok(())
    }

    fn list(&self, query: LeadQuery) -> Result<LeadPage, SyncError> {
        let all = self.snapshot();
        let total = all.len() as u64;
        let leads = all
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.per_page as usize)
            .collect();
        Ok(LeadPage {
            leads,
            page: query.page,
            per_page: query.per_page,
            total: Some(total),
        })
    }

    fn get(&self, sheet_row_id: &SheetRowId) -> Result<Option<StoredLead>, SyncError> {
        Ok(lock(&self.rows).get(sheet_row_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use dialer_core::types::LeadFields;
    use serde_json::json;

    fn record(id: u32, fields: &[(&str, Option<&str>)]) -> LeadRecord {
        let mut map = LeadFields::new();
        for (k, v) in fields {
            map.insert(k.to_string(), v.map(str::to_string));
        }
        LeadRecord {
            fields: map,
            sheet_row_id: SheetRowId::from_row_index(id),
            last_sync: Utc::now(),
        }
    }

    #[test]
    fn sheet_range_reads_trim_trailing_blank_rows() {
        let sheet = MemorySheet::from_rows("Leads", &[&["Name"], &["A"], &[""], &[]]);
        let rows = sheet.read_rows("Leads", 2, 10).unwrap();
        assert_eq!(rows, vec![vec!["A".to_string()]]);
        assert!(sheet.read_rows("Leads", 5, 10).unwrap().is_empty());
    }

    #[test]
    fn unknown_sheet_has_no_metadata() {
        let sheet = MemorySheet::from_rows("Leads", &[&["Name"]]);
        assert!(matches!(
            sheet.row_count("Other"),
            Err(SyncError::SheetMetadata { .. })
        ));
    }

    #[test]
    fn upsert_merges_columns_and_keeps_unseen_ones() {
        let store = MemoryStore::new();
        store
            .upsert(&[record(2, &[("name", Some("A")), ("company", Some("Acme"))])], SHEET_ROW_ID)
            .unwrap();
        store
            .upsert(&[record(2, &[("name", Some("B"))])], SHEET_ROW_ID)
            .unwrap();

        let lead = store.get(&SheetRowId::from("2")).unwrap().expect("lead");
        assert_eq!(lead["name"], json!("B"));
        assert_eq!(lead["company"], json!("Acme"));
        assert_eq!(store.len(), 1);
        assert_eq!(store.upsert_calls(), 2);
    }

    #[test]
    fn stored_columns_keep_header_order() {
        let store = MemoryStore::new();
        store
            .upsert(
                &[record(2, &[("zip", Some("1")), ("name", Some("A")), ("email", None)])],
                SHEET_ROW_ID,
            )
            .unwrap();

        let lead = store.get(&SheetRowId::from("2")).unwrap().expect("lead");
        let keys: Vec<_> = lead.keys().map(String::as_str).collect();
        assert_eq!(keys, ["zip", "name", "email", SHEET_ROW_ID, "last_sync"]);
    }

    #[test]
    fn rejected_upsert_applies_nothing() {
        let store = MemoryStore::new();
        store.reject_writes(true);
        let err = store
            .upsert(&[record(2, &[]), record(3, &[])], SHEET_ROW_ID)
            .unwrap_err();
        assert!(matches!(err, SyncError::StoreWrite { .. }));
        assert!(store.is_empty());
    }

    #[test]
    fn list_orders_numerically_and_pages() {
        let store = MemoryStore::new();
        let records: Vec<_> = [10, 2, 3].iter().map(|id| record(*id, &[])).collect();
        store.upsert(&records, SHEET_ROW_ID).unwrap();

        let page = store.list(LeadQuery::new(1, 2)).unwrap();
        let ids: Vec<_> = page.leads.iter().map(|l| l[SHEET_ROW_ID].clone()).collect();
        assert_eq!(ids, vec![json!("2"), json!("3")]);
        assert_eq!(page.total, Some(3));

        let page = store.list(LeadQuery::new(2, 2)).unwrap();
        assert_eq!(page.leads[0][SHEET_ROW_ID], json!("10"));
    }
}
