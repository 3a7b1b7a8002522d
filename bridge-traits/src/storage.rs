//! Storage Abstractions
//!
//! The core persists a handful of queue-adjacent lists (liked songs, play
//! history, playlists) as JSON strings under fixed namespace keys. Hosts map
//! this onto whatever preference store they have:
//! - iOS: UserDefaults / AsyncStorage
//! - Android: SharedPreferences / DataStore
//! - Desktop: SQLite key-value table (`bridge-desktop`)
//!
//! The live playback session is never written here.

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::error::Result;
use core_async::sync::RwLock;

/// Key-value settings storage trait
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::SettingsStore;
///
/// async fn save_likes(store: &dyn SettingsStore, json: &str) -> Result<()> {
///     store.set_string("@library/liked_songs", json).await
/// }
/// ```
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Store a string value, replacing any previous value
    async fn set_string(&self, key: &str, value: &str) -> Result<()>;

    /// Retrieve a string value
    async fn get_string(&self, key: &str) -> Result<Option<String>>;

    /// Delete a setting. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check if a setting exists
    async fn has_key(&self, key: &str) -> Result<bool> {
        Ok(self.get_string(key).await?.is_some())
    }

    /// List all setting keys
    async fn list_keys(&self) -> Result<Vec<String>>;

    /// Clear all settings
    async fn clear_all(&self) -> Result<()>;
}

/// Process-local store. Useful for tests and for hosts that opt out of
/// persistence entirely.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn set_string(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }

    async fn clear_all(&self) -> Result<()> {
        self.entries.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_round_trips_and_lists_keys() {
        let store = MemorySettingsStore::new();
        store.set_string("@library/history", "[]").await.unwrap();
        store.set_string("@library/liked_songs", "[1]").await.unwrap();

        assert_eq!(
            store.get_string("@library/liked_songs").await.unwrap(),
            Some("[1]".to_string())
        );
        assert!(store.has_key("@library/history").await.unwrap());
        assert_eq!(
            store.list_keys().await.unwrap(),
            vec!["@library/history".to_string(), "@library/liked_songs".to_string()]
        );

        store.delete("@library/history").await.unwrap();
        store.delete("@library/history").await.unwrap();
        assert!(!store.has_key("@library/history").await.unwrap());

        store.clear_all().await.unwrap();
        assert!(store.list_keys().await.unwrap().is_empty());
    }
}
