//! A client for sending alert text to Feishu bot webhooks.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::info;

use super::SendError;
use crate::core::Transport;

/// The fixed message envelope the Feishu bot API expects.
#[derive(Debug, Serialize)]
struct FeishuMessage<'a> {
    msg_type: &'static str,
    content: FeishuContent<'a>,
}

#[derive(Debug, Serialize)]
struct FeishuContent<'a> {
    text: &'a str,
}

impl<'a> FeishuMessage<'a> {
    fn text(text: &'a str) -> Self {
        Self {
            msg_type: "text",
            content: FeishuContent { text },
        }
    }
}

/// Delivers messages to Feishu webhook URLs via HTTP POST.
pub struct FeishuTransport {
    http: reqwest::Client,
}

impl FeishuTransport {
    /// Creates a transport whose requests are bounded by `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl Transport for FeishuTransport {
    fn kind(&self) -> &'static str {
        "feishu"
    }

    /// POSTs the fixed JSON envelope to the webhook URL. Any HTTP response
    /// counts as delivered (the bot API reports errors in-band and the
    /// relay does not inspect them); only a failure to reach the endpoint
    /// or to serialize the body is an error.
    async fn deliver(&self, address: &str, text: &str) -> Result<(), SendError> {
        let response = self
            .http
            .post(address)
            .json(&FeishuMessage::text(text))
            .send()
            .await
            .map_err(|source| SendError::Http {
                address: address.to_string(),
                source,
            })?;

        info!(status = %response.status(), "Delivered message to Feishu webhook");
        Ok(())
    }
}
