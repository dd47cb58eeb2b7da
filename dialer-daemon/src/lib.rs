//! Dialer daemon: HTTP sync trigger, lead read API and interval scheduler.

mod error;
pub mod http;
mod runtime;
pub mod scheduler;
pub mod state;

pub use error::DaemonError;
pub use http::router;
pub use runtime::{init_tracing, run, serve, start_blocking};
pub use state::{AppState, LastSync, TriggerSource};
