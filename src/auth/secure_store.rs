//! Secure credential store backends
//!
//! Everything the session layer persists (the account vault blob, the active
//! account pointer and the in-flight token scratch slot) goes through the
//! [`SecretStore`] trait. The default backend is the platform credential
//! manager, accessed through the keyring crate.

use std::collections::HashMap;

use async_trait::async_trait;
use keyring::Entry;
use thiserror::Error;
use tokio::sync::Mutex;

/// Key holding the serialized account vault
pub const ACCOUNTS_KEY: &str = "accounts";
/// Key holding the handle of the currently active account
pub const ACTIVE_ACCOUNT_KEY: &str = "active_account";
/// Key holding the tokens of the committed session
pub const INFLIGHT_TOKENS_KEY: &str = "inflight_tokens";

/// Errors raised by a store backend
#[derive(Debug, Error)]
pub enum StoreError {
    /// Keyring operation failed
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    /// File I/O failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Encryption or decryption failed
    #[error("Crypto error")]
    Crypto,

    /// Stored bytes are not in the expected format
    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    /// The blocking keyring task was aborted
    #[error("Background task failed")]
    Task,
}

/// Asynchronous, durable key-value store for secrets
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Returns the value for `key`, `None` if nothing is stored
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Stores `value` under `key`, replacing any previous value
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Deletes `key`; `Ok(false)` if it did not exist
    async fn remove(&self, key: &str) -> Result<bool, StoreError>;
}

/// Store backed by the OS credential manager
///
/// Uses Windows Credential Manager, macOS Keychain or the Linux Secret
/// Service. Keyring calls block, so each one runs on the blocking pool.
///
/// # Example
///
/// ```no_run
/// use vshop_lib::auth::{KeyringStore, SecretStore};
///
/// # async fn demo() -> Result<(), vshop_lib::auth::StoreError> {
/// let store = KeyringStore::new();
/// store.set("active_account", "Player#EUW").await?;
/// assert_eq!(store.get("active_account").await?, Some("Player#EUW".to_string()));
/// store.remove("active_account").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    /// Creates a store under the default service name
    pub fn new() -> Self {
        Self::with_service("VShop")
    }

    /// Creates a store under a custom service name
    ///
    /// Useful for testing or separating credential sets.
    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    /// Returns the service name used for this store
    pub fn service(&self) -> &str {
        &self.service
    }

    async fn blocking<T, F>(&self, key: &str, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(Entry) -> Result<T, StoreError> + Send + 'static,
    {
        let service = self.service.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || {
            let entry = Entry::new(&service, &key)?;
            op(entry)
        })
        .await
        .map_err(|_| StoreError::Task)?
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SecretStore for KeyringStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.blocking(key, |entry| match entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(StoreError::Keyring(e)),
        })
        .await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let value = value.to_string();
        self.blocking(key, move |entry| {
            entry.set_password(&value)?;
            Ok(())
        })
        .await
    }

    async fn remove(&self, key: &str) -> Result<bool, StoreError> {
        self.blocking(key, |entry| match entry.delete_credential() {
            Ok(()) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(e) => Err(StoreError::Keyring(e)),
        })
        .await
    }
}

/// Process-local store, for tests and sessions that must not touch disk
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecretStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.entries.lock().await.remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyring_store_service() {
        assert_eq!(KeyringStore::new().service(), "VShop");
        assert_eq!(KeyringStore::with_service("VShop-Test").service(), "VShop-Test");
    }

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        assert_eq!(store.get(ACTIVE_ACCOUNT_KEY).await.unwrap(), None);

        store.set(ACTIVE_ACCOUNT_KEY, "Player#EUW").await.unwrap();
        assert_eq!(
            store.get(ACTIVE_ACCOUNT_KEY).await.unwrap(),
            Some("Player#EUW".to_string())
        );

        store.set(ACTIVE_ACCOUNT_KEY, "Other#NA1").await.unwrap();
        assert_eq!(
            store.get(ACTIVE_ACCOUNT_KEY).await.unwrap(),
            Some("Other#NA1".to_string())
        );
    }

    #[tokio::test]
    async fn test_memory_store_remove() {
        let store = MemoryStore::new();
        store.set(INFLIGHT_TOKENS_KEY, "{}").await.unwrap();

        assert!(store.remove(INFLIGHT_TOKENS_KEY).await.unwrap());
        assert!(!store.remove(INFLIGHT_TOKENS_KEY).await.unwrap());
        assert_eq!(store.get(INFLIGHT_TOKENS_KEY).await.unwrap(), None);
    }

    // Needs a running platform credential service.
    #[tokio::test]
    #[ignore]
    async fn test_keyring_store_round_trip() {
        let store = KeyringStore::with_service("VShop-Test");
        let key = "test-round-trip";
        let _ = store.remove(key).await;

        store.set(key, "value").await.unwrap();
        assert_eq!(store.get(key).await.unwrap(), Some("value".to_string()));
        assert!(store.remove(key).await.unwrap());
        assert!(!store.remove(key).await.unwrap());
    }
}
