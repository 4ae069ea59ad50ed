//! In-memory view over the persisted notify configuration.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::store::{ConfigStore, NotifyConfig};
use crate::Result;

/// Serves reads from memory and writes through to a [`ConfigStore`].
///
/// Reads never suspend, which lets the presence handler check the server
/// configuration before its first await point.
pub struct ConfigService {
    store: Arc<dyn ConfigStore>,
    config: RwLock<NotifyConfig>,
    /// Serializes saves so an older snapshot never overwrites a newer one.
    save_lock: Mutex<()>,
}

impl ConfigService {
    /// Load the current record from `store`.
    pub async fn load(store: Arc<dyn ConfigStore>) -> Result<Self> {
        let config = store.load().await?;
        debug!(servers = config.servers.len(), "Loaded notify configuration");
        Ok(Self {
            store,
            config: RwLock::new(config),
            save_lock: Mutex::new(()),
        })
    }

    /// Notify channels of a server, empty when none are configured.
    pub fn notify_channels(&self, server_id: &str) -> Vec<String> {
        self.config
            .read()
            .servers
            .get(server_id)
            .map(|s| s.notify_channels.clone())
            .unwrap_or_default()
    }

    /// Whether a server has at least one notify channel.
    pub fn is_enabled(&self, server_id: &str) -> bool {
        self.config
            .read()
            .servers
            .get(server_id)
            .is_some_and(|s| !s.notify_channels.is_empty())
    }

    /// Replace the notify channels of a server and persist the change.
    pub async fn set_notify_channels(&self, server_id: &str, channels: Vec<String>) -> Result<()> {
        let _guard = self.save_lock.lock().await;

        let mut updated = self.config.read().clone();
        updated
            .servers
            .entry(server_id.to_string())
            .or_default()
            .notify_channels = channels;

        // Readers only see the change once it is persisted.
        self.store.save(&updated).await?;
        *self.config.write() = updated;
        info!(server_id = %server_id, "Notify channels updated");
        Ok(())
    }

    /// Copy of the current record.
    pub fn snapshot(&self) -> NotifyConfig {
        self.config.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::config::MemoryStore;

    /// Loads an empty record and refuses every save.
    struct ReadOnlyStore;

    #[async_trait]
    impl ConfigStore for ReadOnlyStore {
        async fn load(&self) -> Result<NotifyConfig> {
            Ok(NotifyConfig::default())
        }

        async fn save(&self, _config: &NotifyConfig) -> Result<()> {
            Err(crate::Error::config("store is read-only"))
        }
    }

    #[tokio::test]
    async fn test_unknown_server_has_no_channels() {
        let service = ConfigService::load(Arc::new(MemoryStore::default()))
            .await
            .unwrap();
        assert!(service.notify_channels("9").is_empty());
        assert!(!service.is_enabled("9"));
    }

    #[tokio::test]
    async fn test_set_notify_channels_persists() {
        let store = Arc::new(MemoryStore::default());
        let service = ConfigService::load(store.clone()).await.unwrap();

        service
            .set_notify_channels("9", vec!["1".into(), "2".into()])
            .await
            .unwrap();

        assert_eq!(service.notify_channels("9"), vec!["1", "2"]);
        assert_eq!(store.snapshot().servers["9"].notify_channels, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn test_empty_list_disables() {
        let service = ConfigService::load(Arc::new(MemoryStore::default()))
            .await
            .unwrap();
        service.set_notify_channels("9", vec!["1".into()]).await.unwrap();
        service.set_notify_channels("9", Vec::new()).await.unwrap();

        assert!(!service.is_enabled("9"));
        assert!(service.snapshot().servers.contains_key("9"));
    }

    #[tokio::test]
    async fn test_failed_save_leaves_config_unchanged() {
        let service = ConfigService::load(Arc::new(ReadOnlyStore)).await.unwrap();

        let err = service
            .set_notify_channels("9", vec!["1".into()])
            .await
            .unwrap_err();

        assert!(err.to_string().contains("read-only"));
        assert!(!service.is_enabled("9"));
        assert!(service.snapshot().servers.is_empty());
    }
}
