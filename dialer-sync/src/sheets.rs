//! Google Sheets v4 REST client.
//!
//! Authenticates either with a pre-minted bearer token or as a service
//! account: an RS256-signed JWT assertion is exchanged at the token URI for
//! an access token, which is cached until shortly before it expires.

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use dialer_core::config::{SheetsConfig, SheetsCredentials};
use dialer_core::Secret;

use crate::error::{decode_err, fetch_err, SyncError};
use crate::http::{agent, describe};
use crate::source::{a1_range, SheetSource, HEADER_ROW};

/// Read-only scope; the engine never writes to the sheet.
pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets.readonly";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime requested for a signed assertion (Google's maximum).
const ASSERTION_TTL_SECS: i64 = 3600;

/// A cached token is refreshed this long before it expires.
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    ASSERTION_TTL_SECS
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMetadata {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    title: String,
    #[serde(default)]
    grid_properties: Option<GridProperties>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GridProperties {
    #[serde(default)]
    row_count: u32,
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

enum Auth {
    Static(Secret),
    ServiceAccount {
        client_email: String,
        key: EncodingKey,
        token_uri: String,
        cached: Mutex<Option<CachedToken>>,
    },
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// [`SheetSource`] backed by the Google Sheets REST API.
pub struct GoogleSheets {
    agent: ureq::Agent,
    spreadsheet_id: String,
    api_base: String,
    auth: Auth,
}

impl GoogleSheets {
    /// Build a client. Fails with [`SyncError::Auth`] if the service account
    /// key is not a usable RSA PEM.
    pub fn new(config: &SheetsConfig, timeout: Option<Duration>) -> Result<Self, SyncError> {
        let auth = match &config.credentials {
            SheetsCredentials::AccessToken { token } => Auth::Static(token.clone()),
            SheetsCredentials::ServiceAccount {
                client_email,
                private_key,
            } => {
                let key = EncodingKey::from_rsa_pem(private_key.expose().as_bytes())
                    .map_err(|e| SyncError::Auth {
                        source: Box::new(e),
                    })?;
                Auth::ServiceAccount {
                    client_email: client_email.clone(),
                    key,
                    token_uri: config.token_uri.clone(),
                    cached: Mutex::new(None),
                }
            }
        };
        Ok(Self {
            agent: agent(timeout),
            spreadsheet_id: config.spreadsheet_id.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            auth,
        })
    }

    fn access_token(&self) -> Result<String, SyncError> {
        let (client_email, key, token_uri, cached) = match &self.auth {
            Auth::Static(token) => return Ok(token.expose().to_string()),
            Auth::ServiceAccount {
                client_email,
                key,
                token_uri,
                cached,
            } => (client_email, key, token_uri, cached),
        };

        let mut guard = cached.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let now = Utc::now();
        if let Some(token) = guard.as_ref() {
            if token.expires_at > now + chrono::Duration::seconds(TOKEN_REFRESH_MARGIN_SECS) {
                return Ok(token.token.clone());
            }
        }

        let claims = AssertionClaims {
            iss: client_email,
            scope: SHEETS_SCOPE,
            aud: token_uri,
            iat: now.timestamp(),
            exp: now.timestamp() + ASSERTION_TTL_SECS,
        };
        let assertion = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, key)
            .map_err(|e| SyncError::Auth {
                source: Box::new(e),
            })?;

        tracing::debug!(token_uri = %token_uri, "exchanging service account assertion");
        let response: TokenResponse = self
            .agent
            .post(token_uri)
            .send_form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .map_err(|e| SyncError::Auth { source: describe(e) })?
            .into_json()
            .map_err(|e| decode_err("token endpoint", e))?;

        *guard = Some(CachedToken {
            token: response.access_token.clone(),
            expires_at: now + chrono::Duration::seconds(response.expires_in),
        });
        Ok(response.access_token)
    }

    fn spreadsheet_url(&self) -> String {
        format!("{}/v4/spreadsheets/{}", self.api_base, self.spreadsheet_id)
    }

    /// `spreadsheets.values.get` for one A1 range.
    fn values(&self, range: &str) -> Result<Vec<Vec<String>>, SyncError> {
        let token = self.access_token()?;
        let url = format!(
            "{}/values/{}",
            self.spreadsheet_url(),
            urlencoding::encode(range)
        );
        let body: ValueRange = self
            .agent
            .get(&url)
            .set("Authorization", &format!("Bearer {token}"))
            .query("majorDimension", "ROWS")
            .call()
            .map_err(|e| fetch_err(format!("range {range}"), describe(e)))?
            .into_json()
            .map_err(|e| decode_err(format!("range {range}"), e))?;

        Ok(body
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect())
    }
}

/// Cells arrive as formatted strings; anything else is rendered as JSON text
/// and `null` becomes the empty string.
fn cell_to_string(cell: Value) -> String {
    match cell {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl SheetSource for GoogleSheets {
    fn header_row(&self, sheet: &str) -> Result<Option<Vec<String>>, SyncError> {
        let rows = self.values(&a1_range(sheet, HEADER_ROW, HEADER_ROW))?;
        Ok(rows.into_iter().next())
    }

    fn row_count(&self, sheet: &str) -> Result<u32, SyncError> {
        let token = self.access_token()?;
        let metadata: SpreadsheetMetadata = self
            .agent
            .get(&self.spreadsheet_url())
            .set("Authorization", &format!("Bearer {token}"))
            .query("fields", "sheets.properties(title,gridProperties.rowCount)")
            .call()
            .map_err(|e| fetch_err("spreadsheet metadata", describe(e)))?
            .into_json()
            .map_err(|e| decode_err("spreadsheet metadata", e))?;

        metadata
            .sheets
            .into_iter()
            .find(|entry| entry.properties.title == sheet)
            .map(|entry| {
                entry
                    .properties
                    .grid_properties
                    .map(|grid| grid.row_count)
                    .unwrap_or(0)
            })
            .ok_or_else(|| SyncError::SheetMetadata {
                sheet: sheet.to_string(),
            })
    }

    fn read_rows(
        &self,
        sheet: &str,
        first_row: u32,
        last_row: u32,
    ) -> Result<Vec<Vec<String>>, SyncError> {
        self.values(&a1_range(sheet, first_row, last_row))
    }
}
