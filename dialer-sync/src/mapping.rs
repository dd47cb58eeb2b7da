//! Header normalization and row-to-record mapping.
//!
//! The record schema is recomputed from the header row on every pass. A
//! column renamed or removed in the sheet simply stops being written; the
//! store keeps whatever it last held for the old name.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use dialer_core::types::{LeadFields, LeadRecord, SheetRow, SheetRowId, RESERVED_FIELDS};

/// Normalize a header cell into a field name.
///
/// Outer whitespace is trimmed, the rest is lowercased, and every interior
/// whitespace run collapses into one `_`. `"Full  Name"` becomes `full_name`.
pub fn normalize_header(header: &str) -> String {
    header
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}

/// Field names for a header row, positionally aligned with it.
///
/// `None` marks a column that produces no field: blank headers and headers
/// that collide with an engine-owned field.
pub fn field_names(header: &[String]) -> Vec<Option<String>> {
    header
        .iter()
        .map(|cell| {
            let name = normalize_header(cell);
            if name.is_empty() || RESERVED_FIELDS.contains(&name.as_str()) {
                None
            } else {
                Some(name)
            }
        })
        .collect()
}

/// Header cells that will be dropped from every record of the pass.
pub fn dropped_headers(header: &[String]) -> Vec<String> {
    header
        .iter()
        .zip(field_names(header))
        .filter(|(_, name)| name.is_none())
        .map(|(cell, _)| cell.clone())
        .collect()
}

/// Normalized names that appear more than once in a header row.
pub fn duplicate_fields(header: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut dupes = Vec::new();
    for name in field_names(header).into_iter().flatten() {
        if !seen.insert(name.clone()) && !dupes.contains(&name) {
            dupes.push(name);
        }
    }
    dupes
}

/// Map one fetched row against pre-computed field names.
///
/// A row shorter than the header yields `None` for the missing positions;
/// cells past the header width are ignored. When two columns normalize to the
/// same name the later one's value wins.
pub fn map_row(names: &[Option<String>], row: &SheetRow, synced_at: DateTime<Utc>) -> LeadRecord {
    let mut fields = LeadFields::with_capacity(names.len());
    for (idx, name) in names.iter().enumerate() {
        let Some(name) = name else { continue };
        fields.insert(name.clone(), row.cells.get(idx).cloned());
    }
    LeadRecord {
        fields,
        sheet_row_id: SheetRowId::from_row_index(row.row_index),
        last_sync: synced_at,
    }
}

/// Map every fetched row of a pass.
pub fn map_rows(header: &[String], rows: &[SheetRow], synced_at: DateTime<Utc>) -> Vec<LeadRecord> {
    let names = field_names(header);
    rows.iter()
        .map(|row| map_row(&names, row, synced_at))
        .collect()
}
