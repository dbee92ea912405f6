//! Alert delivery.
//!
//! Pipelines only ever call [`Notifier::send`]. Which channel receives the
//! alert is decided once at startup from `[alerts]` in the config: a
//! Discord channel when bot credentials are present, the log otherwise.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde_json::json;
use tracing::{info, warn};

use crate::config::AlertsConfig;
use crate::error::{MonitorError, Result};

const DISCORD_API: &str = "https://discord.com/api/v10";

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send `message` with a text attachment named `attachment_kind`.
    async fn send(&self, message: &str, attachment_body: &str, attachment_kind: &str)
        -> Result<()>;
}

/// Pick the notifier for the configured alert settings.
pub fn from_config(config: &AlertsConfig) -> Box<dyn Notifier> {
    match config.discord() {
        Some((token, channel)) => Box::new(DiscordNotifier::new(token, channel)),
        None => Box::new(LogNotifier),
    }
}

/// Posts alerts to a Discord channel as a bot.
pub struct DiscordNotifier {
    token: String,
    channel_id: String,
    api_base: String,
    http: reqwest::Client,
}

impl DiscordNotifier {
    pub fn new(token: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            channel_id: channel_id.into(),
            api_base: DISCORD_API.to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// Point at a different API root.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/channels/{}/messages",
            self.api_base.trim_end_matches('/'),
            self.channel_id
        )
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn send(
        &self,
        message: &str,
        attachment_body: &str,
        attachment_kind: &str,
    ) -> Result<()> {
        let payload = json!({
            "content": message,
            "attachments": [{ "id": 0, "filename": attachment_kind }],
        });
        let file = Part::bytes(attachment_body.as_bytes().to_vec())
            .file_name(attachment_kind.to_string())
            .mime_str("text/plain")
            .map_err(MonitorError::notify)?;
        let form = Form::new()
            .text("payload_json", payload.to_string())
            .part("files[0]", file);

        let resp = self
            .http
            .post(self.messages_url())
            .header("Authorization", format!("Bot {}", self.token))
            .multipart(form)
            .send()
            .await
            .map_err(MonitorError::notify)?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Discord returned non-success");
            return Err(MonitorError::notify(format!("Discord returned {}", status)));
        }
        Ok(())
    }
}

/// Writes alerts to the log instead of a chat channel.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(
        &self,
        message: &str,
        attachment_body: &str,
        attachment_kind: &str,
    ) -> Result<()> {
        info!(
            kind = attachment_kind,
            attachment_length = attachment_body.len(),
            "alert: {}",
            message
        );
        Ok(())
    }
}
