//! HTTP surface: the sync trigger plus the lead read API the dashboard uses.
//!
//! ```text
//! GET|POST /api/sync                 run one pass
//! GET      /api/leads?page&per_page  ordered page of stored leads
//! GET      /api/leads/:sheet_row_id  one lead
//! GET      /api/status               daemon status and last pass
//! ```

use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Deserializer};
use serde_json::{json, Map, Value};
use tower_http::trace::TraceLayer;

use dialer_core::types::{LeadQuery, SheetRowId, DEFAULT_PER_PAGE};
use dialer_core::SyncResult;
use dialer_sync::SyncOptions;

use crate::error::DaemonError;
use crate::state::{AppState, TriggerSource};

/// Query parameters accepted by the trigger. Unset values fall back to the
/// configured defaults.
#[derive(Debug, Default, Deserialize)]
pub struct TriggerParams {
    pub sheet_name: Option<String>,
    pub batch_size: Option<u32>,
    #[serde(default, deserialize_with = "flag")]
    pub force_full_sync: Option<bool>,
}

/// Query-string boolean: `true`/`false`/`1`/`0`, case-insensitive.
fn flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "" => Ok(None),
        "1" | "true" => Ok(Some(true)),
        "0" | "false" => Ok(Some(false)),
        other => Err(serde::de::Error::custom(format!(
            "force_full_sync must be true, false, 1 or 0, got '{other}'"
        ))),
    }
}

impl TriggerParams {
    fn into_options(self, state: &AppState) -> SyncOptions {
        let defaults = SyncOptions::from(&state.defaults);
        SyncOptions {
            sheet_name: self.sheet_name.unwrap_or(defaults.sheet_name),
            batch_size: self.batch_size.unwrap_or(defaults.batch_size),
            force_full_sync: self.force_full_sync.unwrap_or(false),
            on_error: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/sync", get(trigger_sync).post(trigger_sync))
        .route("/api/leads", get(list_leads))
        .route("/api/leads/:sheet_row_id", get(get_lead))
        .route("/api/status", get(status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn trigger_sync(
    method: Method,
    State(state): State<Arc<AppState>>,
    params: Result<Query<TriggerParams>, QueryRejection>,
) -> Response {
    // `get()` also routes HEAD; a HEAD must not run a pass.
    if method != Method::GET && method != Method::POST {
        return (
            StatusCode::METHOD_NOT_ALLOWED,
            [(axum::http::header::ALLOW, "GET, POST")],
        )
            .into_response();
    }
    let params = match params {
        Ok(Query(params)) => params,
        Err(rejection) => {
            tracing::warn!(error = %rejection.body_text(), "rejected sync trigger query");
            return sync_failed(rejection.body_text());
        }
    };
    let options = params.into_options(&state);
    match state.run_pass(options, TriggerSource::Http).await {
        Ok(result) if result.success => match success_payload(&result) {
            Ok(body) => (StatusCode::OK, Json(body)).into_response(),
            Err(err) => unexpected(&err),
        },
        Ok(result) => sync_failed(result.error.unwrap_or_default()),
        Err(err) => unexpected(&err),
    }
}

fn sync_failed(details: String) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": "Sync failed", "details": details})),
    )
        .into_response()
}

/// `{success, message, ...syncResult}`.
fn success_payload(result: &SyncResult) -> Result<Value, DaemonError> {
    let mut body = Map::new();
    body.insert("success".into(), Value::Bool(true));
    body.insert(
        "message".into(),
        Value::String(format!(
            "Successfully synced {} leads",
            result.rows_processed.unwrap_or(0)
        )),
    );
    if let Value::Object(fields) = serde_json::to_value(result)? {
        body.extend(fields);
    }
    Ok(Value::Object(body))
}

fn unexpected(err: &DaemonError) -> Response {
    tracing::error!(error = %err, "unexpected error during sync");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": "Unexpected error during sync",
            "message": err.to_string(),
        })),
    )
        .into_response()
}

fn store_failure(err: impl std::fmt::Display) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": "Failed to load leads", "details": err.to_string()})),
    )
        .into_response()
}

async fn list_leads(
    State(state): State<Arc<AppState>>,
    params: Result<Query<PageParams>, QueryRejection>,
) -> Response {
    let params = match params {
        Ok(Query(params)) => params,
        Err(rejection) => return store_failure(rejection.body_text()),
    };
    let query = LeadQuery::new(
        params.page.unwrap_or(1),
        params.per_page.unwrap_or(DEFAULT_PER_PAGE),
    );
    let store = state.engine.store().clone();
    match tokio::task::spawn_blocking(move || store.list(query)).await {
        Ok(Ok(page)) => Json(page).into_response(),
        Ok(Err(err)) => store_failure(err),
        Err(err) => store_failure(err),
    }
}

async fn get_lead(
    State(state): State<Arc<AppState>>,
    Path(sheet_row_id): Path<String>,
) -> Response {
    let store = state.engine.store().clone();
    let id = SheetRowId::from(sheet_row_id);
    let lookup = id.clone();
    match tokio::task::spawn_blocking(move || store.get(&lookup)).await {
        Ok(Ok(Some(lead))) => Json(lead).into_response(),
        Ok(Ok(None)) => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "Lead not found", "sheet_row_id": id})),
        )
            .into_response(),
        Ok(Err(err)) => store_failure(err),
        Err(err) => store_failure(err),
    }
}

async fn status(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(state.status_payload().await)
}
