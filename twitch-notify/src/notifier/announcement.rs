//! Rendering of go-live announcements.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use url::Url;

use super::source::StreamMetadata;
use crate::presence::MemberState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnnouncementAuthor {
    pub name: String,
    pub url: Option<String>,
    pub icon_url: Option<String>,
}

/// A rendered go-live announcement, independent of the delivery channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Announcement {
    pub title: String,
    pub url: Option<String>,
    pub description: String,
    pub color: Option<u32>,
    pub author: AnnouncementAuthor,
    pub thumbnail_url: Option<String>,
}

impl Announcement {
    /// Build the announcement for `member` going live.
    ///
    /// The preview image gets a `date` query parameter so chat clients do not
    /// show a cached frame from an earlier stream.
    pub fn render(member: &MemberState, stream: &StreamMetadata, now: DateTime<Utc>) -> Self {
        let activity = member.streaming_activity();
        let activity_name = activity.map(|a| a.name.clone()).unwrap_or_default();
        let stream_url = activity.and_then(|a| a.url.clone());

        let title = match stream.game_name.as_deref() {
            Some(game) if !game.is_empty() => format!("Playing {game}"),
            _ => activity_name.clone(),
        };

        Self {
            title,
            url: stream_url.clone(),
            description: activity_name,
            color: member.color,
            author: AnnouncementAuthor {
                name: member.display_name.clone(),
                url: stream_url,
                icon_url: member.avatar_url.clone(),
            },
            thumbnail_url: stream
                .preview_image_url
                .as_deref()
                .map(|url| cache_busted(url, now)),
        }
    }

    /// Discord embed object for this announcement.
    pub fn to_embed(&self) -> Value {
        let mut embed = json!({
            "title": self.title,
            "description": self.description,
            "author": { "name": self.author.name },
        });

        if let Some(url) = &self.url {
            embed["url"] = json!(url);
        }
        if let Some(color) = self.color {
            embed["color"] = json!(color);
        }
        if let Some(url) = &self.author.url {
            embed["author"]["url"] = json!(url);
        }
        if let Some(icon_url) = &self.author.icon_url {
            embed["author"]["icon_url"] = json!(icon_url);
        }
        if let Some(thumbnail) = &self.thumbnail_url {
            embed["thumbnail"] = json!({ "url": thumbnail });
        }

        embed
    }
}

fn cache_busted(url: &str, now: DateTime<Utc>) -> String {
    let stamp = now.timestamp().to_string();
    match Url::parse(url) {
        Ok(mut parsed) => {
            parsed.query_pairs_mut().append_pair("date", &stamp);
            parsed.into()
        }
        Err(_) => {
            let sep = if url.contains('?') { '&' } else { '?' };
            format!("{url}{sep}date={stamp}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presence::Activity;

    fn member() -> MemberState {
        MemberState {
            member_id: "1".into(),
            server_id: "9".into(),
            display_name: "Afro".into(),
            avatar_url: Some("https://cdn.example/avatar.png".into()),
            color: Some(0x3498db),
            activity: Some(Activity::streaming("Any% attempts", "https://twitch.tv/afro")),
        }
    }

    fn live(game: Option<&str>) -> StreamMetadata {
        StreamMetadata {
            is_live: true,
            game_name: game.map(str::to_string),
            preview_image_url: Some("https://cdn.example/live_user_afro-320x180.jpg".into()),
            ..StreamMetadata::offline()
        }
    }

    #[test]
    fn test_render() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let announcement = Announcement::render(&member(), &live(Some("Celeste")), now);

        assert_eq!(announcement.title, "Playing Celeste");
        assert_eq!(announcement.description, "Any% attempts");
        assert_eq!(announcement.url.as_deref(), Some("https://twitch.tv/afro"));
        assert_eq!(announcement.author.name, "Afro");
        assert_eq!(
            announcement.thumbnail_url.as_deref(),
            Some("https://cdn.example/live_user_afro-320x180.jpg?date=1700000000")
        );
    }

    #[test]
    fn test_render_without_game_uses_activity_name() {
        let announcement = Announcement::render(&member(), &live(None), Utc::now());
        assert_eq!(announcement.title, "Any% attempts");
    }

    #[test]
    fn test_cache_busted_keeps_existing_query() {
        let now = DateTime::from_timestamp(10, 0).unwrap();
        assert_eq!(
            cache_busted("https://cdn.example/a.jpg?s=1", now),
            "https://cdn.example/a.jpg?s=1&date=10"
        );
        assert_eq!(cache_busted("not a url", now), "not a url?date=10");
    }

    #[test]
    fn test_to_embed() {
        let announcement = Announcement::render(&member(), &live(Some("Celeste")), Utc::now());
        let embed = announcement.to_embed();

        assert_eq!(embed["title"], "Playing Celeste");
        assert_eq!(embed["color"], 0x3498db);
        assert_eq!(embed["author"]["icon_url"], "https://cdn.example/avatar.png");
        assert!(
            embed["thumbnail"]["url"]
                .as_str()
                .unwrap()
                .contains("date=")
        );
    }

    #[test]
    fn test_to_embed_omits_missing_fields() {
        let mut member = member();
        member.color = None;
        member.avatar_url = None;
        let stream = StreamMetadata {
            preview_image_url: None,
            ..live(None)
        };

        let embed = Announcement::render(&member, &stream, Utc::now()).to_embed();
        assert!(embed.get("color").is_none());
        assert!(embed.get("thumbnail").is_none());
        assert!(embed["author"].get("icon_url").is_none());
    }
}
