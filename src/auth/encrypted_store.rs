//! AES-256-GCM encrypted file store
//!
//! Some keyring backends cap the size of a single secret, which the account
//! vault blob can outgrow once several accounts are saved. This backend keeps
//! all entries in one JSON file of `key -> base64(nonce || ciphertext)` and
//! keeps only the 32-byte key in the OS keyring.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tokio::sync::Mutex;

use super::secure_store::{KeyringStore, SecretStore, StoreError};
use crate::security::SecureBytes;

const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;
const KEY_ENTRY: &str = "vault-file-key";

/// File-backed store encrypting each value with AES-256-GCM
pub struct EncryptedFileStore {
    path: PathBuf,
    cipher: Aes256Gcm,
    // Serializes read-modify-write of the file within this process
    io_lock: Mutex<()>,
}

impl EncryptedFileStore {
    /// Opens a store at `path` with an explicit 32-byte key
    pub fn new(path: impl Into<PathBuf>, key: &SecureBytes) -> Result<Self, StoreError> {
        if key.len() != KEY_LEN {
            return Err(StoreError::InvalidFormat(format!(
                "key must be {} bytes",
                KEY_LEN
            )));
        }

        let key = Key::<Aes256Gcm>::from_slice(key.as_bytes());
        Ok(Self {
            path: path.into(),
            cipher: Aes256Gcm::new(key),
            io_lock: Mutex::new(()),
        })
    }

    /// Opens a store at `path`, loading its key from the keyring
    ///
    /// A fresh random key is generated and saved on first use.
    pub async fn open_with_keyring(
        path: impl Into<PathBuf>,
        keyring: &KeyringStore,
    ) -> Result<Self, StoreError> {
        let key = match keyring.get(KEY_ENTRY).await? {
            Some(encoded) => SecureBytes::new(
                STANDARD
                    .decode(encoded.as_bytes())
                    .map_err(|e| StoreError::InvalidFormat(e.to_string()))?,
            ),
            None => {
                tracing::info!("Generating vault file key");
                let key = Self::generate_key();
                keyring.set(KEY_ENTRY, &STANDARD.encode(key.as_bytes())).await?;
                key
            }
        };

        Self::new(path, &key)
    }

    /// Generates a random 32-byte key
    pub fn generate_key() -> SecureBytes {
        let key = Aes256Gcm::generate_key(&mut OsRng);
        SecureBytes::from_slice(key.as_slice())
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn encrypt(&self, plaintext: &str) -> Result<String, StoreError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| StoreError::Crypto)?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(nonce.as_slice());
        sealed.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(sealed))
    }

    fn decrypt(&self, sealed: &str) -> Result<String, StoreError> {
        let bytes = STANDARD
            .decode(sealed.as_bytes())
            .map_err(|e| StoreError::InvalidFormat(e.to_string()))?;
        if bytes.len() < NONCE_LEN {
            return Err(StoreError::InvalidFormat("ciphertext too short".into()));
        }

        let (nonce, ciphertext) = bytes.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| StoreError::Crypto)?;

        String::from_utf8(plaintext).map_err(|e| StoreError::InvalidFormat(e.to_string()))
    }

    /// Loads every sealed entry
    ///
    /// A file that is not a valid entry map reads as empty, so the next write
    /// replaces it instead of failing forever.
    async fn read_entries(&self) -> Result<BTreeMap<String, String>, StoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(entries) => Ok(entries),
                Err(_) => {
                    tracing::warn!(
                        "Vault file {:?} is malformed ({} bytes), treating as empty",
                        self.path,
                        content.len()
                    );
                    Ok(BTreeMap::new())
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn write_entries(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(entries)
            .map_err(|e| StoreError::InvalidFormat(e.to_string()))?;

        // Write-then-rename so a crash never leaves a half-written file
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl SecretStore for EncryptedFileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.io_lock.lock().await;
        let entries = self.read_entries().await?;
        let Some(sealed) = entries.get(key) else {
            return Ok(None);
        };

        match self.decrypt(sealed) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!("Vault entry {} could not be unsealed ({}), treating as absent", key, e);
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _guard = self.io_lock.lock().await;
        let mut entries = self.read_entries().await?;
        entries.insert(key.to_string(), self.encrypt(value)?);
        self.write_entries(&entries).await
    }

    async fn remove(&self, key: &str) -> Result<bool, StoreError> {
        let _guard = self.io_lock.lock().await;
        let mut entries = self.read_entries().await?;
        if entries.remove(key).is_none() {
            return Ok(false);
        }
        self.write_entries(&entries).await?;
        Ok(true)
    }
}
