//! Alert Relay - an Alertmanager webhook fan-out adapter
//!
//! This library provides the core functionality for relaying alert
//! notifications to Feishu bot webhooks and syslog collectors, optionally
//! enriching each alert with recent log lines queried from Loki.

pub mod cli;
pub mod config;
pub mod core;
pub mod dispatch;
pub mod enrichment;
pub mod formatting;
pub mod server;
pub mod transport;

// Re-export core types for convenience
pub use crate::core::*;
