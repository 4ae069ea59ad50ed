//! Outbound message delivery.

mod discord;

pub use discord::{DiscordConfig, DiscordSink};

use async_trait::async_trait;

use crate::Result;
use crate::notifier::Announcement;

/// Posts announcements to chat channels.
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn send_message(&self, channel_id: &str, announcement: &Announcement) -> Result<()>;
}

/// Logs announcements instead of sending them. Used when no bot token is configured.
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait]
impl MessageSink for LogSink {
    async fn send_message(&self, channel_id: &str, announcement: &Announcement) -> Result<()> {
        tracing::info!(
            channel_id = %channel_id,
            title = %announcement.title,
            author = %announcement.author.name,
            "Announcement (dry run)"
        );
        Ok(())
    }
}
