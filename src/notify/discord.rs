use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

use super::{DeliveryError, Notification, NotificationSink};
use crate::model::SubscriberId;

/// Notification sink backed by the Discord REST API.
///
/// Direct messages go through a per-user DM channel that is opened once and
/// memoized; broadcasts go to the fixed shared channel. A 403 from either
/// endpoint maps to `DeliveryError::Forbidden` (blocked DMs, or the bot
/// lacking send permission on the channel).
pub struct DiscordNotifier {
    http: Client,
    token: String,
    /// Base URL for overriding in tests
    base_url: String,
    channel_id: u64,
    dm_channels: Mutex<HashMap<SubscriberId, u64>>,
}

impl DiscordNotifier {
    pub fn new(token: &str, channel_id: u64, base_url: Option<&str>) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(DiscordNotifier {
            http,
            token: token.to_string(),
            base_url: base_url
                .unwrap_or("https://discord.com/api/v10")
                .trim_end_matches('/')
                .to_string(),
            channel_id,
            dm_channels: Mutex::new(HashMap::new()),
        })
    }

    /// Open (or reuse) the DM channel for one subscriber.
    async fn dm_channel(&self, subscriber: SubscriberId) -> Result<u64, DeliveryError> {
        if let Some(id) = self.dm_channels.lock().await.get(&subscriber) {
            return Ok(*id);
        }

        let url = format!("{}/users/@me/channels", self.base_url);
        let resp = self
            .http
            .post(&url)
            .header("Authorization", format!("Bot {}", self.token))
            .json(&serde_json::json!({"recipient_id": subscriber.to_string()}))
            .send()
            .await?;

        let status = resp.status();
        if status.as_u16() == 403 {
            return Err(DeliveryError::Forbidden);
        }
        if !status.is_success() {
            return Err(DeliveryError::Status(status.as_u16()));
        }

        let raw: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| DeliveryError::Malformed(e.to_string()))?;
        let id = raw["id"]
            .as_str()
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(|| DeliveryError::Malformed("missing DM channel id".into()))?;

        self.dm_channels.lock().await.insert(subscriber, id);
        debug!("opened DM channel {} for subscriber {}", id, subscriber);
        Ok(id)
    }

    async fn post_embed(&self, channel: u64, note: &Notification) -> Result<(), DeliveryError> {
        let url = format!("{}/channels/{}/messages", self.base_url, channel);
        let payload = serde_json::json!({
            "embeds": [{
                "title": note.title,
                "description": note.body,
                "color": note.color,
            }]
        });

        let resp = self
            .http
            .post(&url)
            .header("Authorization", format!("Bot {}", self.token))
            .json(&payload)
            .send()
            .await?;

        let status = resp.status();
        if status.as_u16() == 403 {
            return Err(DeliveryError::Forbidden);
        }
        if !status.is_success() {
            return Err(DeliveryError::Status(status.as_u16()));
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationSink for DiscordNotifier {
    async fn send_direct(
        &self,
        subscriber: SubscriberId,
        note: &Notification,
    ) -> Result<(), DeliveryError> {
        let channel = self.dm_channel(subscriber).await?;
        self.post_embed(channel, note).await
    }

    async fn broadcast(&self, note: &Notification) -> Result<(), DeliveryError> {
        self.post_embed(self.channel_id, note).await
    }
}
