//! PostgREST (Supabase REST) record store.

use std::time::Duration;

use dialer_core::config::StoreConfig;
use dialer_core::types::{LeadPage, LeadQuery, LeadRecord, SheetRowId, StoredLead, SHEET_ROW_ID};
use dialer_core::Secret;

use crate::error::{decode_err, read_err, write_err, SyncError};
use crate::http::{agent, describe};
use crate::store::RecordStore;

/// Upserts overwrite supplied columns on conflict and return nothing.
const UPSERT_PREFER: &str = "resolution=merge-duplicates,return=minimal";

/// [`RecordStore`] backed by a PostgREST endpoint.
pub struct PostgrestStore {
    agent: ureq::Agent,
    table_url: String,
    service_key: Secret,
    order_column: String,
}

impl PostgrestStore {
    pub fn new(config: &StoreConfig, timeout: Option<Duration>) -> Self {
        Self {
            agent: agent(timeout),
            table_url: format!(
                "{}/rest/v1/{}",
                config.base_url.trim_end_matches('/'),
                config.table
            ),
            service_key: config.service_key.clone(),
            order_column: config.order_column.clone(),
        }
    }

    fn request(&self, method: &str) -> ureq::Request {
        self.agent
            .request(method, &self.table_url)
            .set("apikey", self.service_key.expose())
            .set(
                "Authorization",
                &format!("Bearer {}", self.service_key.expose()),
            )
    }
}

impl RecordStore for PostgrestStore {
    fn upsert(&self, records: &[LeadRecord], conflict_key: &str) -> Result<(), SyncError> {
        if records.is_empty() {
            return Ok(());
        }
        let context = format!("upsert of {} records", records.len());
        self.request("POST")
            .query("on_conflict", conflict_key)
            .set("Prefer", UPSERT_PREFER)
            .send_json(records)
            .map_err(|e| write_err(context, describe(e)))?;
        Ok(())
    }

    fn list(&self, query: LeadQuery) -> Result<LeadPage, SyncError> {
        let first = query.offset();
        let last = (first + u64::from(query.per_page)).saturating_sub(1);
        let context = format!("page {} of leads", query.page);

        let response = self
            .request("GET")
            .query("select", "*")
            .query("order", &format!("{}.asc", self.order_column))
            .set("Range-Unit", "items")
            .set("Range", &format!("{first}-{last}"))
            .set("Prefer", "count=exact")
            .call()
            .map_err(|e| read_err(context.clone(), describe(e)))?;

        let total = response.header("Content-Range").and_then(parse_total);
        let leads: Vec<StoredLead> = response
            .into_json()
            .map_err(|e| decode_err(context, e))?;

        Ok(LeadPage {
            leads,
            page: query.page,
            per_page: query.per_page,
            total,
        })
    }

    fn get(&self, sheet_row_id: &SheetRowId) -> Result<Option<StoredLead>, SyncError> {
        let context = format!("lead {sheet_row_id}");
        let rows: Vec<StoredLead> = self
            .request("GET")
            .query("select", "*")
            .query(SHEET_ROW_ID, &format!("eq.{sheet_row_id}"))
            .query("limit", "1")
            .call()
            .map_err(|e| read_err(context.clone(), describe(e)))?
            .into_json()
            .map_err(|e| decode_err(context, e))?;
        Ok(rows.into_iter().next())
    }
}

/// Total from a `Content-Range` header such as `0-24/123`; `*` means the
/// server did not count.
fn parse_total(content_range: &str) -> Option<u64> {
    content_range.rsplit_once('/')?.1.trim().parse().ok()
}
