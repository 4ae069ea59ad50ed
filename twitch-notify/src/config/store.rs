//! Persistence for per-server notification settings.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Result;
use crate::utils::fs;

/// Notification settings of one server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Channels that receive announcements, in delivery order.
    #[serde(default)]
    pub notify_channels: Vec<String>,
}

/// The persisted record: server id -> settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub servers: HashMap<String, ServerConfig>,
}

/// Durable storage for [`NotifyConfig`].
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Load the record. A store that has never been saved yields the default.
    async fn load(&self) -> Result<NotifyConfig>;

    /// Replace the stored record.
    async fn save(&self, config: &NotifyConfig) -> Result<()>;
}

/// Stores the record as pretty-printed JSON at `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub const DEFAULT_KEY: &str = "twitch-config";

    pub fn new(dir: impl AsRef<Path>, key: &str) -> Self {
        Self {
            path: dir.as_ref().join(format!("{key}.json")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ConfigStore for JsonFileStore {
    async fn load(&self) -> Result<NotifyConfig> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No config file yet, using defaults");
                Ok(NotifyConfig::default())
            }
            Err(e) => Err(fs::io_error("reading", &self.path, e)),
        }
    }

    async fn save(&self, config: &NotifyConfig) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(config)?;
        fs::write_atomic(&self.path, &bytes).await
    }
}

/// Keeps the record in memory only.
#[derive(Debug, Default)]
pub struct MemoryStore {
    config: Mutex<NotifyConfig>,
}

impl MemoryStore {
    pub fn new(config: NotifyConfig) -> Self {
        Self {
            config: Mutex::new(config),
        }
    }

    /// The last saved record.
    pub fn snapshot(&self) -> NotifyConfig {
        self.config.lock().clone()
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn load(&self) -> Result<NotifyConfig> {
        Ok(self.snapshot())
    }

    async fn save(&self, config: &NotifyConfig) -> Result<()> {
        *self.config.lock() = config.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_json_store_missing_file_loads_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path(), JsonFileStore::DEFAULT_KEY);

        assert_eq!(store.load().await.unwrap(), NotifyConfig::default());
    }

    #[tokio::test]
    async fn test_json_store_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested"), "twitch-config");

        let mut config = NotifyConfig::default();
        config.servers.insert(
            "9".to_string(),
            ServerConfig {
                notify_channels: vec!["100".to_string(), "200".to_string()],
            },
        );
        store.save(&config).await.unwrap();

        assert!(store.path().ends_with("nested/twitch-config.json"));
        assert_eq!(store.load().await.unwrap(), config);
    }

    #[tokio::test]
    async fn test_json_store_tolerates_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path(), "twitch-config");
        std::fs::write(store.path(), br#"{"servers": {"9": {}}}"#).unwrap();

        let config = store.load().await.unwrap();
        assert!(config.servers["9"].notify_channels.is_empty());
    }

    #[tokio::test]
    async fn test_json_store_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path(), "twitch-config");
        std::fs::write(store.path(), b"not json").unwrap();

        assert!(matches!(
            store.load().await,
            Err(crate::Error::Serialization(_))
        ));
    }
}
