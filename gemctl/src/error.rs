//! Error types for gemctl.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Errors surfaced by the client, poller and reconcilers.
///
/// Create and delete calls never return `Api`/`Http` for a failed remote call;
/// those outcomes are recorded in [`crate::model::CreateResult`] and
/// [`crate::model::DeleteResult`] instead.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("API error {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Operation {name} failed: {message}")]
    Operation { name: String, message: String },

    #[error("Timed out after {waited:?} waiting for operation {name}")]
    Timeout { name: String, waited: Duration },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True for a 404 from the remote API.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Api { status: 404, .. })
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
}

/// Builds an [`Error::Api`] from a non-2xx response body.
///
/// Google APIs wrap failures as `{"error": {"code", "status", "message"}}`;
/// anything else is kept verbatim as the message.
pub(crate) fn api_error(status: u16, body: &str) -> Error {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => Error::Api {
            status,
            code: envelope.error.status,
            message: envelope.error.message,
        },
        Err(_) => Error::Api {
            status,
            code: String::new(),
            message: body.trim().to_string(),
        },
    }
}
