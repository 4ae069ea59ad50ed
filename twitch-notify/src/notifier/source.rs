//! Streaming-service lookups used by the notifier.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use twitch_api::{Stream, TwitchClient, TwitchError};

use crate::presence::MemberState;

/// Why a lookup produced nothing.
#[derive(Debug, Error)]
pub enum LookupError {
    /// The request itself failed (network, status, decoding).
    #[error("request failed: {0}")]
    RequestFailed(String),
    /// The member has no account on the streaming service.
    #[error("user not resolved: {0}")]
    UserNotResolved(String),
}

impl From<TwitchError> for LookupError {
    fn from(err: TwitchError) -> Self {
        if err.is_user_not_resolved() {
            Self::UserNotResolved(err.to_string())
        } else {
            Self::RequestFailed(err.to_string())
        }
    }
}

/// What the streaming service reports about a stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamMetadata {
    pub is_live: bool,
    pub game_name: Option<String>,
    pub title: Option<String>,
    pub preview_image_url: Option<String>,
    pub viewer_count: Option<u64>,
    pub started_at: Option<DateTime<Utc>>,
}

impl StreamMetadata {
    pub fn offline() -> Self {
        Self {
            is_live: false,
            game_name: None,
            title: None,
            preview_image_url: None,
            viewer_count: None,
            started_at: None,
        }
    }
}

/// Maps a chat member to an account id on the streaming service.
#[async_trait]
pub trait StreamerResolver: Send + Sync {
    async fn resolve_streamer_id(&self, member: &MemberState) -> Result<String, LookupError>;
}

/// Fetches live stream metadata by account id.
#[async_trait]
pub trait StreamSource: Send + Sync {
    async fn fetch_stream(&self, streamer_id: &str) -> Result<StreamMetadata, LookupError>;
}

/// Twitch-backed implementation of both lookups.
///
/// The member's streaming activity URL (`twitch.tv/<login>`) identifies the account.
#[derive(Clone)]
pub struct TwitchLookup {
    client: Arc<TwitchClient>,
    preview_width: u32,
    preview_height: u32,
}

impl TwitchLookup {
    pub fn new(client: Arc<TwitchClient>) -> Self {
        Self {
            client,
            preview_width: Stream::DEFAULT_PREVIEW_WIDTH,
            preview_height: Stream::DEFAULT_PREVIEW_HEIGHT,
        }
    }

    pub fn with_preview_size(mut self, width: u32, height: u32) -> Self {
        self.preview_width = width;
        self.preview_height = height;
        self
    }

    fn metadata_from(&self, stream: Option<Stream>) -> StreamMetadata {
        let Some(stream) = stream else {
            return StreamMetadata::offline();
        };

        let preview = stream.preview_url(self.preview_width, self.preview_height);
        StreamMetadata {
            is_live: stream.is_live(),
            game_name: Some(stream.game_name).filter(|g| !g.is_empty()),
            title: Some(stream.title).filter(|t| !t.is_empty()),
            preview_image_url: Some(preview).filter(|p| !p.is_empty()),
            viewer_count: Some(stream.viewer_count),
            started_at: stream.started_at,
        }
    }
}

#[async_trait]
impl StreamerResolver for TwitchLookup {
    async fn resolve_streamer_id(&self, member: &MemberState) -> Result<String, LookupError> {
        let url = member
            .streaming_activity()
            .and_then(|activity| activity.url.as_deref())
            .ok_or_else(|| {
                LookupError::UserNotResolved(format!(
                    "{} has no stream url",
                    member.display_name
                ))
            })?;

        Ok(self.client.user_id_from_url(url).await?)
    }
}

#[async_trait]
impl StreamSource for TwitchLookup {
    async fn fetch_stream(&self, streamer_id: &str) -> Result<StreamMetadata, LookupError> {
        let stream = self.client.stream(streamer_id).await?;
        Ok(self.metadata_from(stream))
    }
}
