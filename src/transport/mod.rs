//! Outbound delivery channels.
//!
//! Each transport opens a fresh connection per send call and applies its
//! own wire-safety post-processing to the already-formatted message text.

pub mod feishu;
pub mod syslog;

pub use feishu::FeishuTransport;
pub use syslog::{SyslogProtocol, SyslogTransport};

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SendError {
    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{operation} to {address} timed out after {timeout:?}")]
    Timeout {
        address: String,
        operation: &'static str,
        timeout: Duration,
    },

    #[error("failed to write to {address}: {source}")]
    Write {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("http request to {address} failed: {source}")]
    Http {
        address: String,
        #[source]
        source: reqwest::Error,
    },
}
