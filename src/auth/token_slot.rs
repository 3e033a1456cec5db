//! Volatile token slot
//!
//! Holds the credentials used for outbound data-fetch calls once an account
//! is active, so the player-data operations do not need to know which vault
//! entry they belong to. The slot is mirrored into the store under
//! [`INFLIGHT_TOKENS_KEY`], and the active handle under [`ACTIVE_ACCOUNT_KEY`].

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::error::AuthError;
use super::secure_store::{SecretStore, ACTIVE_ACCOUNT_KEY, INFLIGHT_TOKENS_KEY};
use super::token_extractor::TokenSet;
use crate::security::SecureString;

/// Token pair owned by a single login attempt
///
/// Passed by value into the bootstrap sequence, so two attempts never share
/// or overwrite each other's tokens.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedTokens {
    pub access_token: SecureString,
    pub id_token: SecureString,
    pub expires_at: Option<DateTime<Utc>>,
}

impl StagedTokens {
    pub fn new(access_token: impl Into<SecureString>, id_token: impl Into<SecureString>) -> Self {
        Self {
            access_token: access_token.into(),
            id_token: id_token.into(),
            expires_at: None,
        }
    }

    /// Stages a freshly extracted token set, resolving `expires_in` against `now`
    ///
    /// An `expires_in` too large to represent leaves the expiry unknown.
    pub fn from_token_set(tokens: TokenSet, now: DateTime<Utc>) -> Self {
        let expires_at = tokens
            .expires_in_secs
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(Duration::try_seconds)
            .and_then(|delta| now.checked_add_signed(delta));
        Self {
            access_token: tokens.access_token,
            id_token: tokens.id_token,
            expires_at,
        }
    }
}

/// Everything a regional request needs, captured after a successful bootstrap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionCredentials {
    pub handle: String,
    pub access_token: SecureString,
    pub id_token: SecureString,
    pub entitlements_token: SecureString,
    pub subject_id: String,
    pub region: String,
    pub client_version: String,
}

/// Committed credentials of the active account
pub struct VolatileTokenSlot {
    store: Arc<dyn SecretStore>,
    current: RwLock<Option<SessionCredentials>>,
}

impl VolatileTokenSlot {
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self {
            store,
            current: RwLock::new(None),
        }
    }

    /// Returns the committed credentials, if any account is active
    pub async fn current(&self) -> Option<SessionCredentials> {
        self.current.read().await.clone()
    }

    /// Replaces the slot and persists the scratch copy and active pointer
    pub async fn commit(&self, credentials: SessionCredentials) -> Result<(), AuthError> {
        let raw = serde_json::to_string(&credentials)
            .map_err(|_| AuthError::MalformedPersistedState)?;
        self.store.set(INFLIGHT_TOKENS_KEY, &raw).await?;
        self.store
            .set(ACTIVE_ACCOUNT_KEY, &credentials.handle)
            .await?;
        *self.current.write().await = Some(credentials);
        Ok(())
    }

    /// Empties the slot and removes both persisted keys
    pub async fn clear(&self) -> Result<(), AuthError> {
        *self.current.write().await = None;
        self.store.remove(INFLIGHT_TOKENS_KEY).await?;
        self.store.remove(ACTIVE_ACCOUNT_KEY).await?;
        Ok(())
    }

    /// Handle that was active when the process last ran
    pub async fn persisted_active_handle(&self) -> Result<Option<String>, AuthError> {
        Ok(self.store.get(ACTIVE_ACCOUNT_KEY).await?)
    }
}
