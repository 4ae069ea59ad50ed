use thiserror::Error;

#[derive(Debug, Error)]
pub enum TwitchError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("twitch user not resolved: {0}")]
    UserNotResolved(String),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

impl TwitchError {
    /// Whether the error means there is no Twitch account to look at,
    /// as opposed to a failed request.
    pub fn is_user_not_resolved(&self) -> bool {
        matches!(self, Self::UserNotResolved(_) | Self::InvalidUrl(_))
    }
}

pub type Result<T> = std::result::Result<T, TwitchError>;
