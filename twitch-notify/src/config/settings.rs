//! Process settings loaded from the environment.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::notifier::NotifierConfig;
use crate::{Error, Result};

/// Process settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub twitch_client_id: String,
    pub twitch_client_secret: String,
    /// Bot token used to post announcements. Optional for lookup-only use.
    pub discord_bot_token: Option<String>,
    /// Directory holding `twitch-config.json`.
    pub config_dir: PathBuf,
    pub log_dir: String,
    pub cooldown: Duration,
    pub sweep_interval: Duration,
    pub http_timeout: Duration,
}

impl Settings {
    const DEFAULT_CONFIG_DIR: &str = "config";
    const DEFAULT_LOG_DIR: &str = "logs";
    const DEFAULT_COOLDOWN_SECS: u64 = 2 * 60 * 60;
    const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 15 * 60;
    const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

    /// Read settings from the process environment, after loading `.env` if present.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| {
            get(key).ok_or_else(|| Error::config(format!("{key} must be set")))
        };

        let sweep_interval_secs = parse_or(
            get("NOTIFY_SWEEP_INTERVAL_SECS"),
            "NOTIFY_SWEEP_INTERVAL_SECS",
            Self::DEFAULT_SWEEP_INTERVAL_SECS,
        )?;
        if sweep_interval_secs == 0 {
            return Err(Error::config("NOTIFY_SWEEP_INTERVAL_SECS must be at least 1"));
        }

        Ok(Self {
            twitch_client_id: required("TWITCH_CLIENT_ID")?,
            twitch_client_secret: required("TWITCH_CLIENT_SECRET")?,
            discord_bot_token: get("DISCORD_BOT_TOKEN"),
            config_dir: get("NOTIFY_CONFIG_DIR")
                .unwrap_or_else(|| Self::DEFAULT_CONFIG_DIR.to_string())
                .into(),
            log_dir: get("LOG_DIR").unwrap_or_else(|| Self::DEFAULT_LOG_DIR.to_string()),
            cooldown: Duration::from_secs(parse_or(
                get("NOTIFY_COOLDOWN_SECS"),
                "NOTIFY_COOLDOWN_SECS",
                Self::DEFAULT_COOLDOWN_SECS,
            )?),
            sweep_interval: Duration::from_secs(sweep_interval_secs),
            http_timeout: Duration::from_secs(parse_or(
                get("HTTP_TIMEOUT_SECS"),
                "HTTP_TIMEOUT_SECS",
                Self::DEFAULT_HTTP_TIMEOUT_SECS,
            )?),
        })
    }

    pub fn notifier_config(&self) -> NotifierConfig {
        NotifierConfig {
            cooldown: self.cooldown,
            sweep_interval: self.sweep_interval,
        }
    }
}

fn parse_or<T: FromStr>(value: Option<String>, key: &str, default: T) -> Result<T> {
    match value {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::config(format!("{key} is not a valid number: {raw}"))),
    }
}
