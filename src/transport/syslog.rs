//! Syslog delivery with wire-safety guarantees.
//!
//! The syslog wire protocol is 7-bit and line-delimited, and collectors
//! commonly cap datagrams at 1 KiB. Before anything is written the message
//! text is sanitized to printable ASCII and split into size-bounded frames;
//! each frame is written as one alert-severity message over a connection
//! scoped to the send call.

use async_trait::async_trait;
use chrono::{Local, SecondsFormat};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, UdpSocket};
use tokio::time::timeout;
use tracing::debug;

use super::SendError;
use crate::core::Transport;

/// Maximum size of one syslog frame, part prefix included.
pub const MAX_FRAME_SIZE: usize = 1024;

/// Budget reserved for the `[Part i/N] ` prefix when a message is split.
const PART_PREFIX_RESERVE: usize = 24;

const TRUNCATION_MARKER: &str = "...(truncated)";

/// Facility local0 (16 << 3) + severity alert (1).
const PRIORITY: u8 = 129;

/// Application name stamped on every frame.
const APP_NAME: &str = "alertmanager-webhook";

/// Connection style used to reach syslog collectors.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SyslogProtocol {
    #[default]
    Tcp,
    Udp,
}

impl fmt::Display for SyslogProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyslogProtocol::Tcp => write!(f, "tcp"),
            SyslogProtocol::Udp => write!(f, "udp"),
        }
    }
}

impl std::str::FromStr for SyslogProtocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tcp" => Ok(SyslogProtocol::Tcp),
            "udp" => Ok(SyslogProtocol::Udp),
            other => Err(format!("unknown syslog protocol '{other}', expected tcp or udp")),
        }
    }
}

/// Strips `text` down to what the syslog wire can carry: printable ASCII
/// (32–126), newline and tab. Any other whitespace becomes a single space;
/// everything else (emoji, non-Latin scripts, control bytes) is dropped.
pub fn sanitize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c == '\n' || c == '\t' || (' '..='~').contains(&c) {
            out.push(c);
        } else if c.is_whitespace() {
            out.push(' ');
        }
    }
    out
}

/// Sanitizes `text` and splits it into frames of at most
/// [`MAX_FRAME_SIZE`] bytes.
///
/// Splitting happens on line boundaries, packing lines greedily. A single
/// line that alone exceeds the per-frame budget is hard-truncated with a
/// marker rather than split further. When more than one frame results,
/// each is prefixed with `[Part i/N]` so a reader can reconstruct ordering
/// and detect loss; the prefix is counted against the size limit.
pub fn chunk_message(text: &str) -> Vec<String> {
    let text = sanitize(text);
    if text.len() <= MAX_FRAME_SIZE {
        return vec![text];
    }

    let budget = MAX_FRAME_SIZE - PART_PREFIX_RESERVE;
    let mut bodies: Vec<String> = Vec::new();
    let mut current = String::new();

    for line in text.split('\n') {
        // Sanitized text is pure ASCII, so byte indexing is char-safe here.
        let line = if line.len() > budget {
            format!("{}{}", &line[..budget - TRUNCATION_MARKER.len()], TRUNCATION_MARKER)
        } else {
            line.to_string()
        };

        if !current.is_empty() && current.len() + 1 + line.len() > budget {
            bodies.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(&line);
    }
    if !current.is_empty() {
        bodies.push(current);
    }

    if bodies.len() <= 1 {
        return bodies;
    }

    let total = bodies.len();
    bodies
        .iter()
        .enumerate()
        .map(|(i, body)| format!("[Part {}/{}] {}", i + 1, total, body))
        .collect()
}

/// Renders one wire frame in the BSD syslog style: priority, timestamp,
/// hostname, tag and body, newline-terminated.
fn frame(hostname: &str, body: &str) -> String {
    format!(
        "<{}>{} {} {}[{}]: {}\n",
        PRIORITY,
        Local::now().to_rfc3339_opts(SecondsFormat::Secs, false),
        hostname,
        APP_NAME,
        std::process::id(),
        body
    )
}

/// Delivers messages to syslog collectors, one connection per send call.
pub struct SyslogTransport {
    protocol: SyslogProtocol,
    connect_timeout: Duration,
}

impl SyslogTransport {
    pub fn new(protocol: SyslogProtocol, connect_timeout: Duration) -> Self {
        Self {
            protocol,
            connect_timeout,
        }
    }

    async fn send_tcp(&self, address: &str, frames: &[String]) -> Result<(), SendError> {
        let mut stream = timeout(self.connect_timeout, TcpStream::connect(address))
            .await
            .map_err(|_| SendError::Timeout {
                address: address.to_string(),
                operation: "connect",
                timeout: self.connect_timeout,
            })?
            .map_err(|source| SendError::Connect {
                address: address.to_string(),
                source,
            })?;

        let hostname = stream
            .local_addr()
            .map(|a| a.ip().to_string())
            .unwrap_or_else(|_| "localhost".to_string());

        for body in frames {
            let data = frame(&hostname, body);
            timeout(self.connect_timeout, stream.write_all(data.as_bytes()))
                .await
                .map_err(|_| SendError::Timeout {
                    address: address.to_string(),
                    operation: "write",
                    timeout: self.connect_timeout,
                })?
                .map_err(|source| SendError::Write {
                    address: address.to_string(),
                    source,
                })?;
        }

        // Flush before the connection is dropped.
        stream
            .shutdown()
            .await
            .map_err(|source| SendError::Write {
                address: address.to_string(),
                source,
            })?;
        Ok(())
    }

    async fn send_udp(&self, address: &str, frames: &[String]) -> Result<(), SendError> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(|source| SendError::Connect {
                address: address.to_string(),
                source,
            })?;
        socket
            .connect(address)
            .await
            .map_err(|source| SendError::Connect {
                address: address.to_string(),
                source,
            })?;

        let hostname = socket
            .local_addr()
            .map(|a| a.ip().to_string())
            .unwrap_or_else(|_| "localhost".to_string());

        for body in frames {
            let data = frame(&hostname, body);
            timeout(self.connect_timeout, socket.send(data.as_bytes()))
                .await
                .map_err(|_| SendError::Timeout {
                    address: address.to_string(),
                    operation: "write",
                    timeout: self.connect_timeout,
                })?
                .map_err(|source| SendError::Write {
                    address: address.to_string(),
                    source,
                })?;
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for SyslogTransport {
    fn kind(&self) -> &'static str {
        "syslog"
    }

    /// Sanitizes, chunks and writes `text` to `address`. The first failed
    /// frame write aborts the remaining frames of this message.
    async fn deliver(&self, address: &str, text: &str) -> Result<(), SendError> {
        let frames = chunk_message(text);
        match self.protocol {
            SyslogProtocol::Tcp => self.send_tcp(address, &frames).await?,
            SyslogProtocol::Udp => self.send_udp(address, &frames).await?,
        }
        if frames.len() > 1 {
            debug!(
                frames = frames.len(),
                bytes = text.len(),
                "Sent split syslog message"
            );
        }
        Ok(())
    }
}
