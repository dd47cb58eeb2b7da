//! Explicit process configuration.
//!
//! A [`Config`] is built once at start-up and passed by reference to the
//! engine, the daemon and the CLI. Building it validates every key up front;
//! a missing credential is a start-up error, not a provider error halfway
//! through a pass.
//!
//! # API pattern
//!
//! - [`Config::from_lookup`]: takes any key lookup; used in tests with a map
//! - [`Config::from_env`]: reads the process environment, delegates to
//!   `from_lookup`

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::error::{invalid, ConfigError};

pub const ENV_SERVICE_ACCOUNT_EMAIL: &str = "GOOGLE_SERVICE_ACCOUNT_EMAIL";
pub const ENV_PRIVATE_KEY: &str = "GOOGLE_PRIVATE_KEY";
pub const ENV_ACCESS_TOKEN: &str = "GOOGLE_ACCESS_TOKEN";
pub const ENV_SHEET_ID: &str = "GOOGLE_SHEET_ID";
pub const ENV_SHEETS_API_BASE: &str = "GOOGLE_SHEETS_API_BASE";
pub const ENV_TOKEN_URI: &str = "GOOGLE_TOKEN_URI";
pub const ENV_STORE_URL: &str = "SUPABASE_URL";
pub const ENV_STORE_KEY: &str = "SUPABASE_SERVICE_ROLE_KEY";
pub const ENV_SHEET_NAME: &str = "DIALER_SHEET_NAME";
pub const ENV_BATCH_SIZE: &str = "DIALER_BATCH_SIZE";
pub const ENV_LEADS_TABLE: &str = "DIALER_LEADS_TABLE";
pub const ENV_LEADS_ORDER: &str = "DIALER_LEADS_ORDER";
pub const ENV_BIND: &str = "DIALER_BIND";
pub const ENV_SYNC_INTERVAL: &str = "DIALER_SYNC_INTERVAL_SECS";
pub const ENV_HTTP_TIMEOUT: &str = "DIALER_HTTP_TIMEOUT_SECS";

pub const DEFAULT_SHEET_NAME: &str = "Leads";
pub const DEFAULT_BATCH_SIZE: u32 = 50;
pub const DEFAULT_LEADS_TABLE: &str = "leads";
pub const DEFAULT_LEADS_ORDER: &str = "id";
pub const DEFAULT_BIND: &str = "127.0.0.1:3000";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_SHEETS_API_BASE: &str = "https://sheets.googleapis.com";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

// ---------------------------------------------------------------------------
// Secret
// ---------------------------------------------------------------------------

/// A credential that never shows up in logs, `Debug` output or JSON.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("***")
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// How the spreadsheet client authenticates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SheetsCredentials {
    /// Service account: a signed JWT is exchanged for an access token.
    ServiceAccount {
        client_email: String,
        private_key: Secret,
    },
    /// A pre-minted bearer token, used as is.
    AccessToken { token: Secret },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SheetsConfig {
    pub spreadsheet_id: String,
    pub credentials: SheetsCredentials,
    pub api_base: String,
    pub token_uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreConfig {
    pub base_url: String,
    pub service_key: Secret,
    pub table: String,
    pub order_column: String,
}

/// Defaults applied to passes that do not override them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncDefaults {
    pub sheet_name: String,
    pub batch_size: u32,
}

impl Default for SyncDefaults {
    fn default() -> Self {
        Self {
            sheet_name: DEFAULT_SHEET_NAME.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// Period of the in-process scheduler; `None` disables it.
    #[serde(serialize_with = "serialize_secs")]
    pub sync_interval: Option<Duration>,
}

/// Full process configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Config {
    pub sheets: SheetsConfig,
    pub store: StoreConfig,
    pub sync: SyncDefaults,
    pub server: ServerConfig,
    #[serde(serialize_with = "serialize_secs")]
    pub http_timeout: Option<Duration>,
}

fn serialize_secs<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(d) => s.serialize_some(&d.as_secs()),
        None => s.serialize_none(),
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Build from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Blank values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut missing = Vec::new();
        let mut require = |key: &str| {
            let value = get(key);
            if value.is_none() {
                missing.push(key.to_string());
            }
            value
        };

        let spreadsheet_id = require(ENV_SHEET_ID);
        let credentials = match get(ENV_ACCESS_TOKEN) {
            Some(token) => Some(SheetsCredentials::AccessToken {
                token: Secret::new(token),
            }),
            None => {
                let email = require(ENV_SERVICE_ACCOUNT_EMAIL);
                let key = require(ENV_PRIVATE_KEY);
                match (email, key) {
                    (Some(client_email), Some(key)) => Some(SheetsCredentials::ServiceAccount {
                        client_email,
                        private_key: Secret::new(unescape_private_key(&key)),
                    }),
                    _ => None,
                }
            }
        };
        let base_url = require(ENV_STORE_URL);
        let service_key = require(ENV_STORE_KEY);

        let (Some(spreadsheet_id), Some(credentials), Some(base_url), Some(service_key)) =
            (spreadsheet_id, credentials, base_url, service_key)
        else {
            return Err(ConfigError::Missing { keys: missing });
        };

        let sheets = SheetsConfig {
            spreadsheet_id,
            credentials,
            api_base: parse_base_url(
                ENV_SHEETS_API_BASE,
                &get(ENV_SHEETS_API_BASE).unwrap_or_else(|| DEFAULT_SHEETS_API_BASE.to_string()),
            )?,
            token_uri: get(ENV_TOKEN_URI).unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
        };

        let store = StoreConfig {
            base_url: parse_base_url(ENV_STORE_URL, &base_url)?,
            service_key: Secret::new(service_key),
            table: get(ENV_LEADS_TABLE).unwrap_or_else(|| DEFAULT_LEADS_TABLE.to_string()),
            order_column: get(ENV_LEADS_ORDER).unwrap_or_else(|| DEFAULT_LEADS_ORDER.to_string()),
        };

        let batch_size = match get(ENV_BATCH_SIZE) {
            Some(raw) => parse_batch_size(&raw)?,
            None => DEFAULT_BATCH_SIZE,
        };
        let sync = SyncDefaults {
            sheet_name: get(ENV_SHEET_NAME).unwrap_or_else(|| DEFAULT_SHEET_NAME.to_string()),
            batch_size,
        };

        let bind_raw = get(ENV_BIND).unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = bind_raw
            .parse::<SocketAddr>()
            .map_err(|e| invalid(ENV_BIND, e.to_string()))?;
        let sync_interval = match get(ENV_SYNC_INTERVAL) {
            Some(raw) => parse_secs(ENV_SYNC_INTERVAL, &raw)?,
            None => None,
        };

        let http_timeout = match get(ENV_HTTP_TIMEOUT) {
            Some(raw) => parse_secs(ENV_HTTP_TIMEOUT, &raw)?,
            None => Some(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS)),
        };

        Ok(Self {
            sheets,
            store,
            sync,
            server: ServerConfig {
                bind,
                sync_interval,
            },
            http_timeout,
        })
    }
}

/// Keys stored in env files often carry literal `\n` sequences.
fn unescape_private_key(raw: &str) -> String {
    raw.replace("\\n", "\n")
}

fn parse_base_url(key: &str, raw: &str) -> Result<String, ConfigError> {
    if !(raw.starts_with("http://") || raw.starts_with("https://")) {
        return Err(invalid(key, "expected an http:// or https:// URL"));
    }
    Ok(raw.trim_end_matches('/').to_string())
}

/// Parse a positive batch width.
pub fn parse_batch_size(raw: &str) -> Result<u32, ConfigError> {
    match raw.parse::<u32>() {
        Ok(0) => Err(invalid(ENV_BATCH_SIZE, "must be at least 1")),
        Ok(n) => Ok(n),
        Err(e) => Err(invalid(ENV_BATCH_SIZE, e.to_string())),
    }
}

/// Parse a whole number of seconds; `0` means "off".
fn parse_secs(key: &str, raw: &str) -> Result<Option<Duration>, ConfigError> {
    let secs = raw
        .parse::<u64>()
        .map_err(|e| invalid(key, e.to_string()))?;
    Ok((secs > 0).then(|| Duration::from_secs(secs)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
