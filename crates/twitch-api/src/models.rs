//! Helix response models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Envelope used by every Helix list endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct HelixResponse<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

/// Client-credentials token response.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    pub expires_in: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub login: String,
    pub display_name: String,
    #[serde(default)]
    pub profile_image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stream {
    pub id: String,
    pub user_id: String,
    pub user_login: String,
    pub user_name: String,
    #[serde(default)]
    pub game_id: String,
    #[serde(default)]
    pub game_name: String,
    /// `"live"` while broadcasting; Helix sends an empty string on errors.
    #[serde(rename = "type", default)]
    pub stream_type: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub viewer_count: u64,
    pub started_at: Option<DateTime<Utc>>,
    /// Template URL containing `{width}` and `{height}` placeholders.
    #[serde(default)]
    pub thumbnail_url: String,
}

impl Stream {
    pub const DEFAULT_PREVIEW_WIDTH: u32 = 320;
    pub const DEFAULT_PREVIEW_HEIGHT: u32 = 180;

    pub fn is_live(&self) -> bool {
        self.stream_type == "live"
    }

    /// Fill the thumbnail template with a concrete size.
    pub fn preview_url(&self, width: u32, height: u32) -> String {
        self.thumbnail_url
            .replace("{width}", &width.to_string())
            .replace("{height}", &height.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STREAMS_BODY: &str = r#"{
        "data": [{
            "id": "40952121085",
            "user_id": "101051819",
            "user_login": "afro",
            "user_name": "Afro",
            "game_id": "32982",
            "game_name": "Grand Theft Auto V",
            "type": "live",
            "title": "Jacob: Digital Den Laptops & Routers",
            "viewer_count": 1490,
            "started_at": "2021-03-10T03:18:11Z",
            "language": "en",
            "thumbnail_url": "https://static-cdn.jtvnw.net/previews-ttv/live_user_afro-{width}x{height}.jpg",
            "tag_ids": [],
            "is_mature": false
        }],
        "pagination": {}
    }"#;

    #[test]
    fn test_parse_streams_response() {
        let response: HelixResponse<Stream> = serde_json::from_str(STREAMS_BODY).unwrap();
        assert_eq!(response.data.len(), 1);

        let stream = &response.data[0];
        assert!(stream.is_live());
        assert_eq!(stream.game_name, "Grand Theft Auto V");
        assert_eq!(stream.viewer_count, 1490);
        assert!(stream.started_at.is_some());
    }

    #[test]
    fn test_offline_streams_response_is_empty() {
        let response: HelixResponse<Stream> =
            serde_json::from_str(r#"{"data": [], "pagination": {}}"#).unwrap();
        assert!(response.data.is_empty());
    }

    #[test]
    fn test_preview_url_fills_template() {
        let response: HelixResponse<Stream> = serde_json::from_str(STREAMS_BODY).unwrap();
        let url = response.data[0].preview_url(
            Stream::DEFAULT_PREVIEW_WIDTH,
            Stream::DEFAULT_PREVIEW_HEIGHT,
        );
        assert_eq!(
            url,
            "https://static-cdn.jtvnw.net/previews-ttv/live_user_afro-320x180.jpg"
        );
    }

    #[test]
    fn test_parse_user_without_profile_image() {
        let response: HelixResponse<User> = serde_json::from_str(
            r#"{"data": [{"id": "141981764", "login": "twitchdev", "display_name": "TwitchDev"}]}"#,
        )
        .unwrap();
        assert_eq!(response.data[0].id, "141981764");
        assert!(response.data[0].profile_image_url.is_none());
    }
}
