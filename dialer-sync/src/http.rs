//! Shared `ureq` plumbing for the REST clients.

use std::time::Duration;

use crate::error::BoxError;

/// Longest slice of an error body carried into an error message.
const MAX_ERROR_BODY: usize = 512;

/// Build an agent with the configured per-request timeout.
pub(crate) fn agent(timeout: Option<Duration>) -> ureq::Agent {
    let mut builder = ureq::AgentBuilder::new();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build()
}

/// Turn a `ureq` failure into a boxed error that keeps the HTTP status and
/// the start of the response body, which is where PostgREST and Google put
/// the useful part.
pub(crate) fn describe(err: ureq::Error) -> BoxError {
    match err {
        ureq::Error::Status(code, response) => {
            let body = response.into_string().unwrap_or_default();
            let body = body.trim();
            let body = match body.char_indices().nth(MAX_ERROR_BODY) {
                Some((cut, _)) => &body[..cut],
                None => body,
            };
            if body.is_empty() {
                format!("HTTP {code}").into()
            } else {
                format!("HTTP {code}: {body}").into()
            }
        }
        ureq::Error::Transport(transport) => Box::new(transport),
    }
}
