//! Core domain types and service traits for the alert relay
//!
//! This module defines the inbound Alertmanager webhook data model and the
//! trait contracts that govern component interactions throughout the
//! application.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::enrichment::LokiError;
use crate::transport::SendError;

/// One inbound notification from Alertmanager: an ordered list of alerts
/// plus grouping metadata. Immutable once decoded; lives for one request.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AlertBatch {
    pub version: String,
    pub group_key: String,
    pub truncated_alerts: u64,
    /// Batch-level status string, carried through unchanged.
    pub status: String,
    pub receiver: String,
    pub group_labels: HashMap<String, String>,
    pub common_labels: HashMap<String, String>,
    pub common_annotations: HashMap<String, String>,
    #[serde(rename = "externalURL")]
    pub external_url: String,
    pub alerts: Vec<Alert>,
}

/// A single alert instance as sent by Alertmanager.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Alert {
    pub status: AlertStatus,
    /// Label set; contains `alertname` by convention, absence is tolerated.
    pub labels: HashMap<String, String>,
    /// Annotation set; recognized keys: `summary`, `description`,
    /// `trigger_logs`, `log_query`.
    pub annotations: HashMap<String, String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    /// Opaque source-system link, passed through verbatim.
    #[serde(rename = "generatorURL")]
    pub generator_url: String,
    /// Opaque unique identifier, passed through verbatim.
    pub fingerprint: String,
}

impl Alert {
    /// Returns a label value, or `None` when absent or empty.
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }

    /// Returns an annotation value, or `None` when absent or empty.
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// The `alertname` label, used wherever this alert is mentioned in logs.
    /// Falls back to a fixed literal so log lines never carry an empty name.
    pub fn name(&self) -> &str {
        self.label("alertname").unwrap_or("Unknown Alert")
    }
}

/// Delivery state of a single alert.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Firing,
    Resolved,
    #[default]
    #[serde(other)]
    Unknown,
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertStatus::Firing => write!(f, "firing"),
            AlertStatus::Resolved => write!(f, "resolved"),
            AlertStatus::Unknown => write!(f, "unknown"),
        }
    }
}

// =============================================================================
// Service Traits
// =============================================================================

/// Delivers one formatted message to one destination address.
///
/// Both the chat webhook and the syslog transports implement this; the
/// dispatcher is agnostic of which kind backs a target registry.
#[async_trait]
pub trait Transport: Send + Sync {
    /// A unique, descriptive name for the transport (e.g. "feishu",
    /// "syslog"). Used for logging and metrics.
    fn kind(&self) -> &'static str;

    /// Delivers `text` to `address`.
    ///
    /// # Returns
    /// * `Ok(())` if the message was handed to the destination
    /// * `Err` on connection, timeout, or encoding failure
    async fn deliver(&self, address: &str, text: &str) -> Result<(), SendError>;
}

/// Queries a log backend for recent lines matching a query string.
#[async_trait]
pub trait LogQuerier: Send + Sync {
    /// Returns up to `limit` raw log lines matching `query` within the last
    /// `range_minutes`, most recent first.
    async fn query_logs(
        &self,
        query: &str,
        limit: usize,
        range_minutes: i64,
    ) -> Result<Vec<String>, LokiError>;
}
