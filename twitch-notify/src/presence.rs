//! Member presence snapshots as delivered by the chat platform.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Activity type, numbered the way the chat platform numbers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityKind {
    Playing,
    Streaming,
    Listening,
    Watching,
    Custom,
    Competing,
}

impl ActivityKind {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Playing => 0,
            Self::Streaming => 1,
            Self::Listening => 2,
            Self::Watching => 3,
            Self::Custom => 4,
            Self::Competing => 5,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::Playing,
            1 => Self::Streaming,
            2 => Self::Listening,
            3 => Self::Watching,
            4 => Self::Custom,
            5 => Self::Competing,
            _ => return None,
        })
    }
}

impl Serialize for ActivityKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for ActivityKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        value
            .as_u64()
            .and_then(|v| u8::try_from(v).ok())
            .and_then(Self::from_u8)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown activity type: {value}")))
    }
}

/// The member's current activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    /// For streams this is the stream title shown by the chat platform.
    pub name: String,
    /// Only set for streaming activities.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Activity {
    pub fn streaming(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            kind: ActivityKind::Streaming,
            name: name.into(),
            url: Some(url.into()),
        }
    }

    pub fn playing(name: impl Into<String>) -> Self {
        Self {
            kind: ActivityKind::Playing,
            name: name.into(),
            url: None,
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.kind == ActivityKind::Streaming
    }
}

/// Snapshot of a server member at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberState {
    pub member_id: String,
    pub server_id: String,
    pub display_name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Display color of the member's top role, `0xRRGGBB`.
    #[serde(default)]
    pub color: Option<u32>,
    #[serde(default)]
    pub activity: Option<Activity>,
}

impl MemberState {
    pub fn is_streaming(&self) -> bool {
        self.activity.as_ref().is_some_and(Activity::is_streaming)
    }

    /// The activity, if it is a stream.
    pub fn streaming_activity(&self) -> Option<&Activity> {
        self.activity.as_ref().filter(|a| a.is_streaming())
    }
}

/// A presence change for a single member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceUpdate {
    pub before: MemberState,
    pub after: MemberState,
}

impl PresenceUpdate {
    pub fn new(before: MemberState, after: MemberState) -> Self {
        Self { before, after }
    }

    pub fn member_id(&self) -> &str {
        &self.after.member_id
    }

    pub fn server_id(&self) -> &str {
        &self.after.server_id
    }
}
