//! Log enrichment for alerts
//!
//! Queries a Loki-style log backend for lines matching a per-alert query
//! string and renders them into a bounded block of human-readable text.

pub mod loki;

pub use loki::{format_logs, LokiClient, NO_LOG_CONTENT};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LokiError {
    /// The feature was invoked without a backend URL configured.
    #[error("Loki URL not configured")]
    NotConfigured,

    /// Connection or timeout failure talking to the backend.
    #[error("failed to query Loki: {0}")]
    Transport(#[from] reqwest::Error),

    /// The backend answered with a non-success HTTP status.
    #[error("Loki API returned status {status}: {body}")]
    Upstream {
        status: reqwest::StatusCode,
        body: String,
    },

    /// The response body was not a well-formed query_range payload.
    #[error("failed to decode Loki response: {0}")]
    Decode(#[source] serde_json::Error),
}
