//! Destination-agnostic alert message composition.
//!
//! One formatter feeds every transport; the transports only differ in the
//! post-processing they apply (JSON envelope, syslog sanitize/chunk).

use crate::core::Alert;

pub const FALLBACK_ALERT_NAME: &str = "Unknown Alert";
pub const FALLBACK_SUMMARY: &str = "No summary";
pub const FALLBACK_DESCRIPTION: &str = "No description";

/// Builds the human-readable text block for one alert.
///
/// `trigger_logs` is the already-resolved trigger-log text (enrichment
/// output, the `trigger_logs` annotation, or a placeholder); an empty
/// string omits the block entirely.
pub fn format_alert(alert: &Alert, trigger_logs: &str) -> String {
    let name = alert.label("alertname").unwrap_or(FALLBACK_ALERT_NAME);
    let summary = alert.annotation("summary").unwrap_or(FALLBACK_SUMMARY);
    let description = alert
        .annotation("description")
        .unwrap_or(FALLBACK_DESCRIPTION);

    let mut text = format!(
        "Alert: {}\nStatus: {}\nSummary: {}\nDescription: {}\n",
        name, alert.status, summary, description
    );

    if !trigger_logs.is_empty() {
        text.push_str(&format!("Trigger Logs:\n{}\n", trigger_logs));
    }

    if !alert.generator_url.is_empty() {
        text.push_str(&format!("Source: {}\n", alert.generator_url));
    }

    text
}
