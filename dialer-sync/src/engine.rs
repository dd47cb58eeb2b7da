//! The sync pass: fetch → map → upsert.
//!
//! A pass is a strictly sequential chain of blocking calls:
//!
//! 1. header read (`'<sheet>'!A1:Z1`)
//! 2. metadata read (grid row count)
//! 3. ranged data reads of `batch_size` rows each, from row 2, until a read
//!    comes back empty or the row count is exhausted
//! 4. one upsert of every mapped record, conflict key `sheet_row_id`
//!
//! Mapping and writing only start once every read has succeeded, so a
//! failed read discards the rows already fetched and nothing is written.
//! There is no retry and no mutual exclusion between passes; overlapping
//! passes both run and the store resolves them last-write-wins.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use dialer_core::config::{SyncDefaults, DEFAULT_BATCH_SIZE, DEFAULT_SHEET_NAME};
use dialer_core::types::{LeadRecord, SheetRow, SyncResult, SHEET_ROW_ID};

use crate::error::SyncError;
use crate::mapping::{dropped_headers, duplicate_fields, map_rows};
use crate::source::{SheetSource, HEADER_ROW};
use crate::store::RecordStore;

/// Callback invoked with the error of a failed pass before the failure
/// result is returned.
pub type ErrorHook = Arc<dyn Fn(&SyncError) + Send + Sync>;

/// Per-pass options.
#[derive(Clone)]
pub struct SyncOptions {
    /// Sheet tab to read.
    pub sheet_name: String,
    /// Rows requested per data read. Has no effect on the write, which is
    /// always a single request.
    pub batch_size: u32,
    /// Accepted for callers that already send it. Every pass is a full
    /// re-read regardless.
    pub force_full_sync: bool,
    pub on_error: Option<ErrorHook>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            sheet_name: DEFAULT_SHEET_NAME.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            force_full_sync: false,
            on_error: None,
        }
    }
}

impl fmt::Debug for SyncOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncOptions")
            .field("sheet_name", &self.sheet_name)
            .field("batch_size", &self.batch_size)
            .field("force_full_sync", &self.force_full_sync)
            .field("on_error", &self.on_error.as_ref().map(|_| "<hook>"))
            .finish()
    }
}

impl From<&SyncDefaults> for SyncOptions {
    fn from(defaults: &SyncDefaults) -> Self {
        Self {
            sheet_name: defaults.sheet_name.clone(),
            batch_size: defaults.batch_size,
            ..Self::default()
        }
    }
}

impl SyncOptions {
    pub fn with_on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&SyncError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(hook));
        self
    }
}

/// Rows fetched by a pass, with the header they map against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedSheet {
    pub header: Vec<String>,
    pub rows: Vec<SheetRow>,
}

/// Runs passes from one [`SheetSource`] into one [`RecordStore`].
///
/// Cheap to clone; clones share the underlying collaborators.
#[derive(Clone)]
pub struct SyncEngine {
    source: Arc<dyn SheetSource>,
    store: Arc<dyn RecordStore>,
}

impl SyncEngine {
    pub fn new(source: Arc<dyn SheetSource>, store: Arc<dyn RecordStore>) -> Self {
        Self { source, store }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Run one pass and report it. Never returns an error: every failure is
    /// handed to `on_error` and folded into a failed [`SyncResult`].
    pub fn run(&self, options: &SyncOptions) -> SyncResult {
        let started_at = Utc::now();
        tracing::info!(
            sheet = %options.sheet_name,
            batch_size = options.batch_size,
            force_full_sync = options.force_full_sync,
            "sync pass started",
        );

        match self.pass(options, started_at) {
            Ok(rows) => {
                let result = SyncResult::succeeded(started_at, Utc::now(), rows);
                tracing::info!(
                    sheet = %options.sheet_name,
                    rows_processed = rows,
                    duration_ms = result.duration_ms(),
                    "sync pass completed",
                );
                result
            }
            Err(err) => {
                tracing::error!(sheet = %options.sheet_name, error = %err, "sync pass failed");
                if let Some(hook) = &options.on_error {
                    hook(&err);
                }
                SyncResult::failed(started_at, Utc::now(), err.to_string())
            }
        }
    }

    /// The fallible body of [`SyncEngine::run`]. Returns the number of rows
    /// written.
    pub fn pass(&self, options: &SyncOptions, started_at: DateTime<Utc>) -> Result<usize, SyncError> {
        let fetched = self.fetch(options)?;
        let records = self.map(&fetched, started_at);
        self.write(&records)?;
        Ok(records.len())
    }

    /// Steps 1–3: header, metadata, then sequential ranged reads.
    pub fn fetch(&self, options: &SyncOptions) -> Result<FetchedSheet, SyncError> {
        if options.batch_size == 0 {
            return Err(SyncError::InvalidOptions(
                "batch_size must be at least 1".to_string(),
            ));
        }
        let sheet = options.sheet_name.as_str();
        if options.force_full_sync {
            tracing::debug!(sheet, "force_full_sync requested; every pass is a full re-read");
        }

        let header = self
            .source
            .header_row(sheet)?
            .ok_or_else(|| SyncError::NoHeader {
                sheet: sheet.to_string(),
            })?;
        let row_count = self.source.row_count(sheet)?;
        tracing::debug!(sheet, columns = header.len(), row_count, "sheet metadata read");

        let mut rows = Vec::new();
        let mut first_row = HEADER_ROW + 1;
        while first_row <= row_count {
            let last_row = first_row
                .saturating_add(options.batch_size - 1)
                .min(row_count);
            let batch = self.source.read_rows(sheet, first_row, last_row)?;
            tracing::debug!(sheet, first_row, last_row, fetched = batch.len(), "batch read");
            if batch.is_empty() {
                break;
            }
            rows.extend(batch.into_iter().zip(first_row..).map(|(cells, row_index)| SheetRow {
                row_index,
                cells,
            }));
            first_row = match last_row.checked_add(1) {
                Some(next) => next,
                None => break,
            };
        }

        Ok(FetchedSheet { header, rows })
    }

    /// Step 4: map every row against the pass header.
    pub fn map(&self, fetched: &FetchedSheet, started_at: DateTime<Utc>) -> Vec<LeadRecord> {
        let dropped = dropped_headers(&fetched.header);
        if !dropped.is_empty() {
            tracing::warn!(?dropped, "header columns without a usable field name were skipped");
        }
        let dupes = duplicate_fields(&fetched.header);
        if !dupes.is_empty() {
            tracing::warn!(?dupes, "duplicate header names; the rightmost column wins");
        }
        map_rows(&fetched.header, &fetched.rows, started_at)
    }

    /// Step 5: one upsert for the whole pass. Skipped when nothing was
    /// fetched.
    pub fn write(&self, records: &[LeadRecord]) -> Result<(), SyncError> {
        if records.is_empty() {
            tracing::info!("no data rows fetched; nothing to write");
            return Ok(());
        }
        self.store.upsert(records, SHEET_ROW_ID)
    }
}
