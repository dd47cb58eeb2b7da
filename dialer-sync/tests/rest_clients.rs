//! The Google Sheets and PostgREST clients against local mock servers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use chrono::Utc;
use dialer_core::config::{SheetsConfig, SheetsCredentials, StoreConfig};
use dialer_core::types::{LeadFields, LeadQuery, LeadRecord, SheetRowId, SHEET_ROW_ID};
use dialer_core::Secret;
use dialer_sync::{
    GoogleSheets, MemoryStore, PostgrestStore, RecordStore, SheetSource, SyncEngine, SyncError,
    SyncOptions,
};
use serde_json::{json, Value};

const SERVICE_ACCOUNT_KEY: &str = include_str!("fixtures/service_account_key.pem");

/// Serve `router` on an ephemeral port. The runtime must outlive the test.
fn serve(router: Router) -> (String, tokio::runtime::Runtime) {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .expect("runtime");
    let listener = runtime
        .block_on(tokio::net::TcpListener::bind("127.0.0.1:0"))
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    runtime.spawn(async move {
        axum::serve(listener, router).await.expect("serve");
    });
    (format!("http://{addr}"), runtime)
}

// ---------------------------------------------------------------------------
// Google Sheets
// ---------------------------------------------------------------------------

#[derive(Default)]
struct SheetsMock {
    token_calls: AtomicUsize,
    ranges: Mutex<Vec<String>>,
}

fn bearer_ok(headers: &HeaderMap, token: &str) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {token}"))
}

fn grid() -> Vec<Vec<&'static str>> {
    vec![
        vec!["Name", "Email"],
        vec!["Alice", "a@x.com"],
        vec!["Bob", "b@x.com"],
    ]
}

/// Rows for an A1 range like `'Leads'!A2:Z3`.
fn rows_for(range: &str) -> Vec<Vec<&'static str>> {
    let cells = range.rsplit_once('!').map(|(_, c)| c).unwrap_or(range);
    let (start, end) = cells.split_once(':').expect("range with colon");
    let first: usize = start.trim_start_matches('A').parse().expect("first row");
    let last: usize = end.trim_start_matches('Z').parse().expect("last row");
    grid()
        .into_iter()
        .skip(first - 1)
        .take(last + 1 - first)
        .collect()
}

fn sheets_router(mock: Arc<SheetsMock>, token: &'static str) -> Router {
    async fn issue_token(
        State(mock): State<Arc<SheetsMock>>,
        Form(form): Form<HashMap<String, String>>,
    ) -> impl IntoResponse {
        mock.token_calls.fetch_add(1, Ordering::SeqCst);
        let grant_ok = form.get("grant_type").map(String::as_str)
            == Some("urn:ietf:params:oauth:grant-type:jwt-bearer");
        let assertion_ok = form.get("assertion").is_some_and(|a| a.split('.').count() == 3);
        if grant_ok && assertion_ok {
            (
                StatusCode::OK,
                Json(json!({"access_token": "minted-token", "expires_in": 3600, "token_type": "Bearer"})),
            )
        } else {
            (StatusCode::BAD_REQUEST, Json(json!({"error": "invalid_grant"})))
        }
    }

    let metadata = move |headers: HeaderMap| async move {
        if !bearer_ok(&headers, token) {
            return (StatusCode::UNAUTHORIZED, Json(json!({}))).into_response();
        }
        Json(json!({
            "sheets": [
                {"properties": {"title": "Archive", "gridProperties": {"rowCount": 10}}},
                {"properties": {"title": "Leads", "gridProperties": {"rowCount": 3}}},
            ]
        }))
        .into_response()
    };

    let values = move |State(mock): State<Arc<SheetsMock>>,
                       Path((_id, range)): Path<(String, String)>,
                       headers: HeaderMap| async move {
        if !bearer_ok(&headers, token) {
            return (StatusCode::UNAUTHORIZED, Json(json!({}))).into_response();
        }
        mock.ranges.lock().unwrap().push(range.clone());
        let rows = rows_for(&range);
        if rows.is_empty() {
            Json(json!({"range": range, "majorDimension": "ROWS"})).into_response()
        } else {
            Json(json!({"range": range, "majorDimension": "ROWS", "values": rows})).into_response()
        }
    };

    Router::new()
        .route("/token", post(issue_token))
        .route("/v4/spreadsheets/:id", get(metadata))
        .route("/v4/spreadsheets/:id/values/:range", get(values))
        .with_state(mock)
}

fn sheets_config(base: &str, credentials: SheetsCredentials) -> SheetsConfig {
    SheetsConfig {
        spreadsheet_id: "sheet-123".into(),
        credentials,
        api_base: base.to_string(),
        token_uri: format!("{base}/token"),
    }
}

#[test]
fn service_account_pass_end_to_end() {
    let mock = Arc::new(SheetsMock::default());
    let (base, _rt) = serve(sheets_router(mock.clone(), "minted-token"));
    let config = sheets_config(
        &base,
        SheetsCredentials::ServiceAccount {
            client_email: "sync@project.iam.gserviceaccount.com".into(),
            private_key: Secret::new(SERVICE_ACCOUNT_KEY),
        },
    );
    let source = GoogleSheets::new(&config, None).expect("client");
    let store = Arc::new(MemoryStore::new());
    let engine = SyncEngine::new(Arc::new(source), store.clone());

    let result = engine.run(&SyncOptions {
        sheet_name: "Leads".into(),
        batch_size: 1,
        ..SyncOptions::default()
    });

    assert!(result.success, "pass failed: {:?}", result.error);
    assert_eq!(result.rows_processed, Some(2));
    assert_eq!(mock.token_calls.load(Ordering::SeqCst), 1, "token is cached");
    assert_eq!(
        *mock.ranges.lock().unwrap(),
        vec!["'Leads'!A1:Z1", "'Leads'!A2:Z2", "'Leads'!A3:Z3"]
    );
    let bob = store.get(&SheetRowId::from("3")).unwrap().expect("bob");
    assert_eq!(bob["email"], json!("b@x.com"));
}

#[test]
fn static_token_reads_header_and_row_count() {
    let mock = Arc::new(SheetsMock::default());
    let (base, _rt) = serve(sheets_router(mock.clone(), "static-token"));
    let config = sheets_config(
        &base,
        SheetsCredentials::AccessToken {
            token: Secret::new("static-token"),
        },
    );
    let source = GoogleSheets::new(&config, None).expect("client");

    let header = source.header_row("Leads").expect("header");
    assert_eq!(header, Some(vec!["Name".to_string(), "Email".to_string()]));
    assert_eq!(source.row_count("Leads").expect("rows"), 3);
    assert!(matches!(
        source.row_count("Missing"),
        Err(SyncError::SheetMetadata { sheet }) if sheet == "Missing"
    ));
    assert!(source.read_rows("Leads", 4, 5).expect("rows").is_empty());
    assert_eq!(mock.token_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn rejected_token_is_an_upstream_fetch_error() {
    let mock = Arc::new(SheetsMock::default());
    let (base, _rt) = serve(sheets_router(mock, "expected-token"));
    let config = sheets_config(
        &base,
        SheetsCredentials::AccessToken {
            token: Secret::new("wrong-token"),
        },
    );
    let source = GoogleSheets::new(&config, None).expect("client");

    let err = source.header_row("Leads").expect_err("should fail");
    assert!(matches!(err, SyncError::UpstreamFetch { .. }));
    assert!(err.to_string().contains("HTTP 401"));
}

// ---------------------------------------------------------------------------
// PostgREST
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Captured {
    query: HashMap<String, String>,
    headers: HeaderMap,
    body: Value,
}

type Log = Arc<Mutex<Vec<Captured>>>;

fn postgrest_router(log: Log, upsert_status: StatusCode) -> Router {
    let upsert = move |State(log): State<Log>,
                       Query(query): Query<HashMap<String, String>>,
                       headers: HeaderMap,
                       Json(body): Json<Value>| async move {
        log.lock().unwrap().push(Captured {
            query,
            headers,
            body,
        });
        if upsert_status.is_success() {
            upsert_status.into_response()
        } else {
            (
                upsert_status,
                Json(json!({"code": "23505", "message": "duplicate key value"})),
            )
                .into_response()
        }
    };

    let select = |State(log): State<Log>,
                  Query(query): Query<HashMap<String, String>>,
                  headers: HeaderMap| async move {
        log.lock().unwrap().push(Captured {
            query: query.clone(),
            headers,
            body: Value::Null,
        });
        if let Some(filter) = query.get(SHEET_ROW_ID) {
            let rows = if filter == "eq.3" {
                json!([{"id": 2, "name": "Bob", "sheet_row_id": "3"}])
            } else {
                json!([])
            };
            return Json(rows).into_response();
        }
        (
            StatusCode::PARTIAL_CONTENT,
            [("content-range", "25-26/27")],
            Json(json!([
                {"id": 26, "name": "Yan", "sheet_row_id": "27"},
                {"id": 27, "name": "Zoe", "sheet_row_id": "28"},
            ])),
        )
            .into_response()
    };

    Router::new()
        .route("/rest/v1/leads", post(upsert).get(select))
        .with_state(log)
}

fn store_config(base: &str) -> StoreConfig {
    StoreConfig {
        base_url: base.to_string(),
        service_key: Secret::new("service-role-key"),
        table: "leads".into(),
        order_column: "id".into(),
    }
}

fn record(row: u32, name: &str) -> LeadRecord {
    let mut fields = LeadFields::new();
    fields.insert("name".into(), Some(name.into()));
    fields.insert("phone".into(), None);
    LeadRecord {
        fields,
        sheet_row_id: SheetRowId::from_row_index(row),
        last_sync: Utc::now(),
    }
}

fn header<'a>(captured: &'a Captured, name: &str) -> &'a str {
    captured
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

#[test]
fn upsert_is_one_merge_request_keyed_on_sheet_row_id() {
    let log: Log = Arc::default();
    let (base, _rt) = serve(postgrest_router(log.clone(), StatusCode::CREATED));
    let store = PostgrestStore::new(&store_config(&base), None);

    store
        .upsert(&[record(2, "Alice"), record(3, "Bob")], SHEET_ROW_ID)
        .expect("upsert");

    let log = log.lock().unwrap();
    assert_eq!(log.len(), 1);
    let request = &log[0];
    assert_eq!(request.query.get("on_conflict").map(String::as_str), Some("sheet_row_id"));
    assert_eq!(header(request, "apikey"), "service-role-key");
    assert_eq!(header(request, "authorization"), "Bearer service-role-key");
    assert!(header(request, "prefer").contains("resolution=merge-duplicates"));
    assert_eq!(request.body[0]["name"], json!("Alice"));
    assert_eq!(request.body[0]["phone"], json!(null));
    assert_eq!(request.body[1]["sheet_row_id"], json!("3"));
}

#[test]
fn empty_upsert_sends_nothing() {
    let log: Log = Arc::default();
    let (base, _rt) = serve(postgrest_router(log.clone(), StatusCode::CREATED));
    let store = PostgrestStore::new(&store_config(&base), None);

    store.upsert(&[], SHEET_ROW_ID).expect("upsert");
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn rejected_upsert_carries_status_and_body() {
    let log: Log = Arc::default();
    let (base, _rt) = serve(postgrest_router(log, StatusCode::CONFLICT));
    let store = PostgrestStore::new(&store_config(&base), None);

    let err = store
        .upsert(&[record(2, "Alice")], SHEET_ROW_ID)
        .expect_err("should fail");

    assert!(matches!(err, SyncError::StoreWrite { .. }));
    let message = err.to_string();
    assert!(message.contains("HTTP 409"), "{message}");
    assert!(message.contains("duplicate key value"), "{message}");
}

#[test]
fn list_pages_with_range_headers_and_reads_the_total() {
    let log: Log = Arc::default();
    let (base, _rt) = serve(postgrest_router(log.clone(), StatusCode::CREATED));
    let store = PostgrestStore::new(&store_config(&base), None);

    let page = store.list(LeadQuery::new(2, 25)).expect("list");

    assert_eq!(page.total, Some(27));
    assert_eq!(page.total_pages(), Some(2));
    assert_eq!(page.leads.len(), 2);
    assert_eq!(page.leads[1]["name"], json!("Zoe"));

    let log = log.lock().unwrap();
    assert_eq!(header(&log[0], "range"), "25-49");
    assert_eq!(header(&log[0], "range-unit"), "items");
    assert_eq!(log[0].query.get("order").map(String::as_str), Some("id.asc"));
}

#[test]
fn get_filters_on_sheet_row_id() {
    let log: Log = Arc::default();
    let (base, _rt) = serve(postgrest_router(log, StatusCode::CREATED));
    let store = PostgrestStore::new(&store_config(&base), None);

    let bob = store.get(&SheetRowId::from("3")).expect("get").expect("bob");
    assert_eq!(bob["name"], json!("Bob"));
    assert!(store.get(&SheetRowId::from("99")).expect("get").is_none());
}
