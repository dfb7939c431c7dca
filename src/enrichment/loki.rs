//! HTTP client for the Loki `query_range` API.

use chrono::{Duration, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::instrument;

use super::LokiError;

/// Placeholder rendered when a query matched no log lines.
pub const NO_LOG_CONTENT: &str = "(no log content)";

/// A client for the range-query endpoint of a Loki server.
#[derive(Debug, Clone)]
pub struct LokiClient {
    base_url: String,
    username: Option<String>,
    password: Option<String>,
    http: reqwest::Client,
}

/// Response shape of `/loki/api/v1/query_range`.
#[derive(Debug, Deserialize)]
struct QueryRangeResponse {
    #[allow(dead_code)]
    status: String,
    data: QueryRangeData,
}

#[derive(Debug, Deserialize)]
struct QueryRangeData {
    #[serde(default)]
    result: Vec<QueryStream>,
}

#[derive(Debug, Deserialize)]
struct QueryStream {
    #[serde(default)]
    #[allow(dead_code)]
    stream: HashMap<String, String>,
    /// Ordered `[timestamp, line]` pairs.
    #[serde(default)]
    values: Vec<Vec<String>>,
}

impl LokiClient {
    /// Creates a client for `base_url` (e.g. `http://loki:3100`) with the
    /// given per-request timeout. Basic auth is attached to queries only
    /// when both a username and a password are provided.
    pub fn new(
        base_url: String,
        username: Option<String>,
        password: Option<String>,
        timeout: std::time::Duration,
    ) -> Result<Self, LokiError> {
        if base_url.is_empty() {
            return Err(LokiError::NotConfigured);
        }
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url,
            username,
            password,
            http,
        })
    }

    /// Queries up to `limit` log lines matching `query` within the last
    /// `range_minutes`, most recent first.
    ///
    /// Collection stops as soon as `limit` lines are gathered, regardless
    /// of how many result streams remain.
    #[instrument(skip(self))]
    pub async fn query_logs(
        &self,
        query: &str,
        limit: usize,
        range_minutes: i64,
    ) -> Result<Vec<String>, LokiError> {
        let now = Utc::now();
        let end = now.timestamp_nanos_opt().unwrap_or(i64::MAX);
        let start = (now - Duration::minutes(range_minutes))
            .timestamp_nanos_opt()
            .unwrap_or(0);

        let url = format!("{}/loki/api/v1/query_range", self.base_url);
        let mut request = self.http.get(&url).query(&[
            ("query", query),
            ("limit", &limit.to_string()),
            ("start", &start.to_string()),
            ("end", &end.to_string()),
            // Newest lines first, so the cap keeps the most recent ones.
            ("direction", "backward"),
        ]);

        if let (Some(user), Some(pass)) = (&self.username, &self.password) {
            request = request.basic_auth(user, Some(pass));
        }

        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LokiError::Upstream { status, body });
        }

        let body = response.text().await?;
        let parsed: QueryRangeResponse =
            serde_json::from_str(&body).map_err(LokiError::Decode)?;

        let mut logs = Vec::new();
        for stream in parsed.data.result {
            for value in stream.values {
                if let Some(line) = value.get(1) {
                    logs.push(line.clone());
                    if logs.len() >= limit {
                        return Ok(logs);
                    }
                }
            }
        }

        Ok(logs)
    }
}

#[async_trait::async_trait]
impl crate::core::LogQuerier for LokiClient {
    async fn query_logs(
        &self,
        query: &str,
        limit: usize,
        range_minutes: i64,
    ) -> Result<Vec<String>, LokiError> {
        LokiClient::query_logs(self, query, limit, range_minutes).await
    }
}

/// Renders at most `max_lines` log entries as a numbered block, one entry
/// per line, with a trailing marker when more lines were available.
pub fn format_logs(logs: &[String], max_lines: usize) -> String {
    if logs.is_empty() {
        return NO_LOG_CONTENT.to_string();
    }

    let count = logs.len().min(max_lines);
    let mut out = String::new();
    for (i, line) in logs.iter().take(count).enumerate() {
        out.push_str(&format!("{}. {}\n", i + 1, clean_log_line(line)));
    }

    if logs.len() > max_lines {
        out.push_str(&format!("... ({} more not shown)\n", logs.len() - max_lines));
    }

    out.trim_end().to_string()
}

/// Collapses embedded whitespace so one log entry renders as one line.
///
/// Some collectors emit the octal escapes `#011` (tab) and `#012` (newline)
/// verbatim; those are flattened the same way as the real characters.
fn clean_log_line(line: &str) -> String {
    let mut cleaned = line
        .replace("#011", " ")
        .replace("#012", " ")
        .replace(['\t', '\n', '\r'], " ");

    while cleaned.contains("  ") {
        cleaned = cleaned.replace("  ", " ");
    }

    cleaned.trim().to_string()
}
