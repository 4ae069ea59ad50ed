use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{Result, TwitchError};
use crate::models::{HelixResponse, Stream, TokenResponse, User};

pub static URL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://(?:www\.)?twitch\.tv/([^/?#]+)").unwrap());

/// Extract the channel login from a `twitch.tv/<login>` URL.
pub fn login_from_url(url: &str) -> Option<&str> {
    URL_REGEX
        .captures(url.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Application credentials registered on the Twitch developer console.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Tokens are refreshed this long before Twitch says they expire.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct AppToken {
    access_token: String,
    expires_at: Instant,
}

impl AppToken {
    fn new(access_token: String, expires_in: Duration) -> Self {
        Self {
            access_token,
            expires_at: Instant::now() + expires_in.saturating_sub(TOKEN_EXPIRY_MARGIN),
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Twitch Helix client using an app access token.
pub struct TwitchClient {
    client: Client,
    credentials: Credentials,
    api_base: String,
    auth_base: String,
    token: Mutex<Option<AppToken>>,
    /// login (lowercase) -> user id
    user_ids: RwLock<HashMap<String, String>>,
}

impl TwitchClient {
    const API_BASE: &str = "https://api.twitch.tv/helix";
    const AUTH_BASE: &str = "https://id.twitch.tv";

    pub fn new(client: Client, credentials: Credentials) -> Self {
        Self {
            client,
            credentials,
            api_base: Self::API_BASE.to_string(),
            auth_base: Self::AUTH_BASE.to_string(),
            token: Mutex::new(None),
            user_ids: RwLock::new(HashMap::new()),
        }
    }

    /// Point the client at different Helix / OAuth hosts.
    pub fn with_base_urls(
        mut self,
        api_base: impl Into<String>,
        auth_base: impl Into<String>,
    ) -> Self {
        let (api_base, auth_base): (String, String) = (api_base.into(), auth_base.into());
        self.api_base = api_base.trim_end_matches('/').to_string();
        self.auth_base = auth_base.trim_end_matches('/').to_string();
        self
    }

    /// Look up a user by login.
    pub async fn user(&self, login: &str) -> Result<User> {
        let users: Vec<User> = self.get_helix("/users", &[("login", login)]).await?;
        let user = users
            .into_iter()
            .next()
            .ok_or_else(|| TwitchError::UserNotResolved(login.to_string()))?;

        self.remember_user_id(login, &user.id);
        Ok(user)
    }

    /// Resolve a login to its user id, served from cache when possible.
    pub async fn user_id(&self, login: &str) -> Result<String> {
        if let Some(id) = self.user_ids.read().get(&login.to_lowercase()) {
            return Ok(id.clone());
        }
        Ok(self.user(login).await?.id)
    }

    /// Resolve a `twitch.tv/<login>` URL to a user id.
    pub async fn user_id_from_url(&self, url: &str) -> Result<String> {
        let login =
            login_from_url(url).ok_or_else(|| TwitchError::InvalidUrl(url.to_string()))?;
        self.user_id(login).await
    }

    /// Fetch the current stream of a user. `None` means offline.
    pub async fn stream(&self, user_id: &str) -> Result<Option<Stream>> {
        let streams: Vec<Stream> = self.get_helix("/streams", &[("user_id", user_id)]).await?;
        Ok(streams.into_iter().next())
    }

    fn remember_user_id(&self, login: &str, id: &str) {
        self.user_ids
            .write()
            .insert(login.to_lowercase(), id.to_string());
    }

    async fn get_helix<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>> {
        let url = format!("{}{}", self.api_base, path);
        let mut refreshed = false;

        loop {
            let token = self.access_token().await?;
            let response = self
                .client
                .get(&url)
                .query(query)
                .header("Client-Id", &self.credentials.client_id)
                .bearer_auth(&token)
                .send()
                .await?;

            let status = response.status();
            if status == StatusCode::UNAUTHORIZED && !refreshed {
                debug!("Twitch rejected app token, refreshing");
                self.token.lock().await.take();
                refreshed = true;
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(TwitchError::Status {
                    status: status.as_u16(),
                    body,
                });
            }

            let body = response.text().await?;
            let parsed: HelixResponse<T> = serde_json::from_str(&body)?;
            return Ok(parsed.data);
        }
    }

    /// Current app access token, fetching a new one when missing or expired.
    ///
    /// The lock is held across the refresh so concurrent callers share one request.
    async fn access_token(&self) -> Result<String> {
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref()
            && !token.is_expired()
        {
            return Ok(token.access_token.clone());
        }

        debug!("Requesting Twitch app access token");
        let response = self
            .client
            .post(format!("{}/oauth2/token", self.auth_base))
            .query(&[
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TwitchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse = serde_json::from_str(&response.text().await?)?;
        let access_token = token.access_token.clone();
        *guard = Some(AppToken::new(
            token.access_token,
            Duration::from_secs(token.expires_in),
        ));
        Ok(access_token)
    }
}
