//! Discord bot message delivery.
//!
//! Follows Discord's rate limit guidance:
//! - No hardcoded rate limits
//! - Retries on 429 responses respecting the Retry-After header

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, warn};

use super::MessageSink;
use crate::Result;
use crate::notifier::Announcement;

/// Maximum number of attempts for rate-limited requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Upper bound on a single server-requested wait.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Discord bot configuration.
#[derive(Debug, Clone)]
pub struct DiscordConfig {
    pub bot_token: String,
    /// REST API base, without trailing slash.
    pub api_base: String,
}

impl DiscordConfig {
    pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            api_base: Self::DEFAULT_API_BASE.to_string(),
        }
    }
}

/// Sends announcements as embeds through the bot's REST API.
pub struct DiscordSink {
    config: DiscordConfig,
    client: Client,
}

impl DiscordSink {
    pub fn new(config: DiscordConfig, client: Client) -> Self {
        Self { config, client }
    }

    fn messages_url(&self, channel_id: &str) -> String {
        format!(
            "{}/channels/{}/messages",
            self.config.api_base.trim_end_matches('/'),
            channel_id
        )
    }

    fn build_payload(announcement: &Announcement) -> serde_json::Value {
        json!({
            "embeds": [announcement.to_embed()]
        })
    }

    /// Send request with rate limit handling.
    async fn send_with_retry(&self, url: &str, payload: &serde_json::Value) -> Result<()> {
        let mut attempts = 0;

        loop {
            attempts += 1;

            let response = self
                .client
                .post(url)
                .header(
                    reqwest::header::AUTHORIZATION,
                    format!("Bot {}", self.config.bot_token),
                )
                .json(payload)
                .send()
                .await?;

            let status = response.status();

            if status.is_success() {
                return Ok(());
            }

            if status.as_u16() == 429 {
                let retry_after = parse_retry_after(response.headers());

                if attempts >= MAX_RATE_LIMIT_RETRIES {
                    warn!(
                        "Discord rate limit: max retries ({}) exceeded, last retry_after was {:?}",
                        MAX_RATE_LIMIT_RETRIES, retry_after
                    );
                    return Err(crate::Error::Other(format!(
                        "Discord rate limit exceeded after {} retries",
                        MAX_RATE_LIMIT_RETRIES
                    )));
                }

                let wait_duration = retry_after.unwrap_or(Duration::from_secs(1));
                debug!(
                    "Discord rate limited (429), waiting {:?} before retry (attempt {}/{})",
                    wait_duration, attempts, MAX_RATE_LIMIT_RETRIES
                );
                tokio::time::sleep(wait_duration).await;
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            return Err(crate::Error::Other(format!(
                "Discord message failed: {} - {}",
                status, body
            )));
        }
    }
}

/// Parse the wait duration from a 429 response's headers, capped at [`MAX_RETRY_AFTER`].
fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    ["Retry-After", "X-RateLimit-Reset-After"]
        .iter()
        .filter_map(|name| headers.get(*name))
        .filter_map(|value| value.to_str().ok()?.trim().parse::<f64>().ok())
        .find(|secs| secs.is_finite() && *secs >= 0.0)
        .map(|secs| {
            Duration::try_from_secs_f64(secs)
                .unwrap_or(MAX_RETRY_AFTER)
                .min(MAX_RETRY_AFTER)
        })
}

#[async_trait]
impl MessageSink for DiscordSink {
    async fn send_message(&self, channel_id: &str, announcement: &Announcement) -> Result<()> {
        let payload = Self::build_payload(announcement);
        self.send_with_retry(&self.messages_url(channel_id), &payload)
            .await?;

        debug!(channel_id = %channel_id, "Discord announcement sent");
        Ok(())
    }
}
