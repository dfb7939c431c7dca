//! Per-batch alert dispatch: target resolution, log enrichment and
//! best-effort fan-out.
//!
//! One `Dispatcher` is built at startup and shared read-only by every
//! request. Alerts within a batch are processed in input order; deliveries
//! for one alert run concurrently across its resolved targets, and every
//! (alert, target) failure is captured independently so it can never abort
//! sibling work.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{error, info, warn};

use crate::core::{Alert, AlertBatch, LogQuerier, Transport};
use crate::enrichment::format_logs;
use crate::formatting::format_alert;

/// Placeholder shown when the log query succeeded but matched nothing and
/// the alert carried no pre-supplied trigger-log text.
pub const NO_MATCHING_LOGS: &str = "(no matching logs in query range)";

/// Which target registry a request addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Feishu,
    Syslog,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Feishu => "feishu",
            ChannelKind::Syslog => "syslog",
        }
    }
}

/// A named-target registry paired with the transport that serves it.
pub struct ChannelSet {
    /// name → destination address (webhook URL or host:port).
    pub targets: BTreeMap<String, String>,
    pub transport: Arc<dyn Transport>,
}

/// Counts for one processed batch, used for logging and tests. Delivery
/// failures are never surfaced to the inbound caller.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSummary {
    pub attempted: usize,
    pub failed: usize,
}

pub struct Dispatcher {
    feishu: ChannelSet,
    syslog: ChannelSet,
    enricher: Option<Arc<dyn LogQuerier>>,
    log_limit: usize,
    query_range_minutes: i64,
}

impl Dispatcher {
    pub fn new(feishu: ChannelSet, syslog: ChannelSet) -> Self {
        Self {
            feishu,
            syslog,
            enricher: None,
            log_limit: 10,
            query_range_minutes: 5,
        }
    }

    /// Enables log enrichment for alerts carrying a `log_query` annotation.
    pub fn with_enricher(
        mut self,
        enricher: Arc<dyn LogQuerier>,
        log_limit: usize,
        query_range_minutes: i64,
    ) -> Self {
        self.enricher = Some(enricher);
        self.log_limit = log_limit;
        self.query_range_minutes = query_range_minutes;
        self
    }

    fn channel(&self, kind: ChannelKind) -> &ChannelSet {
        match kind {
            ChannelKind::Feishu => &self.feishu,
            ChannelKind::Syslog => &self.syslog,
        }
    }

    /// Processes one decoded batch against one channel kind.
    ///
    /// Resolution of `requested` never fails the batch: unknown names are
    /// logged and skipped, and an empty resolved set is a deliberate no-op.
    pub async fn dispatch(
        &self,
        kind: ChannelKind,
        batch: &AlertBatch,
        requested: Option<&str>,
    ) -> DispatchSummary {
        let mut summary = DispatchSummary::default();

        if batch.alerts.is_empty() {
            warn!(channel = kind.as_str(), "No alerts in payload");
            return summary;
        }
        metrics::counter!("alerts_received_total", "channel" => kind.as_str())
            .increment(batch.alerts.len() as u64);

        let channel = self.channel(kind);
        let targets = resolve_targets(requested, &channel.targets);
        if targets.is_empty() {
            warn!(channel = kind.as_str(), "No valid targets resolved");
            return summary;
        }

        for alert in &batch.alerts {
            let trigger_logs = self.trigger_log_text(alert).await;
            let text = format_alert(alert, &trigger_logs);

            let deliveries = targets.iter().map(|(name, address)| {
                let transport = channel.transport.clone();
                let text = &text;
                async move { (name, transport.deliver(address, text).await) }
            });

            for (target, result) in join_all(deliveries).await {
                summary.attempted += 1;
                match result {
                    Ok(()) => {
                        info!(
                            alert = alert.name(),
                            dest = %target,
                            channel = kind.as_str(),
                            "Alert delivered"
                        );
                        metrics::counter!("notifications_sent_total", "channel" => kind.as_str())
                            .increment(1);
                    }
                    Err(e) => {
                        summary.failed += 1;
                        error!(
                            alert = alert.name(),
                            dest = %target,
                            channel = kind.as_str(),
                            error = %e,
                            "Failed to deliver alert"
                        );
                        metrics::counter!("notifications_failed_total", "channel" => kind.as_str())
                            .increment(1);
                    }
                }
            }
        }

        summary
    }

    /// Resolves the trigger-log text displayed for one alert.
    ///
    /// The pre-supplied `trigger_logs` annotation is the fallback whenever
    /// enrichment is disabled, ineligible, or fails; enrichment failure is
    /// never allowed to discard the alert itself.
    async fn trigger_log_text(&self, alert: &Alert) -> String {
        let fallback = alert.annotation("trigger_logs").unwrap_or("").to_string();

        let Some(enricher) = &self.enricher else {
            return fallback;
        };
        let Some(query) = alert.annotation("log_query") else {
            return fallback;
        };

        let start = std::time::Instant::now();
        let result = enricher
            .query_logs(query, self.log_limit, self.query_range_minutes)
            .await;
        metrics::histogram!("log_query_duration_seconds").record(start.elapsed().as_secs_f64());

        match result {
            Ok(logs) if !logs.is_empty() => {
                info!(alert = alert.name(), count = logs.len(), "Queried logs for alert");
                format_logs(&logs, self.log_limit)
            }
            Ok(_) => {
                if fallback.is_empty() {
                    NO_MATCHING_LOGS.to_string()
                } else {
                    fallback
                }
            }
            Err(e) => {
                warn!(alert = alert.name(), error = %e, "Log query failed");
                if fallback.is_empty() {
                    format!("(log query failed: {e})")
                } else {
                    fallback
                }
            }
        }
    }
}

/// Intersects a caller-supplied comma-separated name list against the
/// configured registry. Names are trimmed and lowercased; unknown names
/// are logged and skipped. Absence of a list means broadcast.
fn resolve_targets(
    requested: Option<&str>,
    registry: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let Some(requested) = requested.filter(|r| !r.trim().is_empty()) else {
        return registry.clone();
    };

    let mut resolved = BTreeMap::new();
    for name in requested.split(',') {
        let name = name.trim().to_lowercase();
        if name.is_empty() {
            continue;
        }
        match registry.get(&name) {
            Some(address) => {
                resolved.insert(name, address.clone());
            }
            None => warn!(dest = %name, "Target not found in configuration"),
        }
    }
    resolved
}
