//! Credential vault - per-account records persisted as one blob
//!
//! The vault maps an account handle (`name#tag`) to everything the app knows
//! about that account. The whole mapping is serialized to JSON and stored
//! under [`ACCOUNTS_KEY`]; every write reads, modifies and rewrites the full
//! blob. There is no cross-task lock: concurrent writers resolve as
//! last-writer-wins.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::secure_store::{SecretStore, StoreError, ACCOUNTS_KEY};

/// Errors surfaced by vault operations
#[derive(Debug, Error)]
pub enum VaultError {
    /// The backing store failed
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A numeric field was given a value that does not parse
    #[error("Invalid value for field {0}")]
    InvalidValue(RecordField),

    /// The vault could not be serialized
    #[error("Serialization error")]
    Serialize,
}

/// In-game currency balances
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub valorant_points: u64,
    pub radianite_points: u64,
    pub kingdom_credits: u64,
}

/// Everything persisted for one saved account
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountRecord {
    pub account_handle: String,
    pub game_name: String,
    pub tag_line: String,
    pub access_token: Option<String>,
    pub id_token: Option<String>,
    pub entitlements_token: Option<String>,
    /// When the access token stops being valid, if the provider said so
    pub token_expires_at: Option<DateTime<Utc>>,
    /// Long-lived `ssid` cookie used for silent re-authentication
    pub session_cookie: Option<String>,
    pub subject_id: Option<String>,
    pub region_code: Option<String>,
    pub wallet: Wallet,
    pub rank: Option<String>,
    pub rr: Option<u32>,
    pub level: Option<u32>,
    pub xp: Option<u32>,
    pub player_card_id: Option<String>,
    pub favorite_ids: Vec<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl AccountRecord {
    /// Creates an empty record for `handle`
    pub fn new(handle: impl Into<String>) -> Self {
        Self {
            account_handle: handle.into(),
            ..Default::default()
        }
    }

    /// Returns true if the stored access token is known to be expired
    pub fn token_expired(&self, now: DateTime<Utc>) -> bool {
        self.token_expires_at.is_some_and(|at| at <= now)
    }
}

impl fmt::Debug for AccountRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("AccountRecord")
            .field("account_handle", &self.account_handle)
            .field("access_token", &redact(&self.access_token))
            .field("id_token", &redact(&self.id_token))
            .field("entitlements_token", &redact(&self.entitlements_token))
            .field("session_cookie", &redact(&self.session_cookie))
            .field("token_expires_at", &self.token_expires_at)
            .field("subject_id", &self.subject_id)
            .field("region_code", &self.region_code)
            .field("wallet", &self.wallet)
            .field("rank", &self.rank)
            .field("rr", &self.rr)
            .field("level", &self.level)
            .field("xp", &self.xp)
            .finish_non_exhaustive()
    }
}

/// Addressable fields for [`CredentialVault::get`] / [`CredentialVault::set`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordField {
    GameName,
    TagLine,
    AccessToken,
    IdToken,
    EntitlementsToken,
    SessionCookie,
    SubjectId,
    RegionCode,
    ValorantPoints,
    RadianitePoints,
    KingdomCredits,
    Rank,
    Rr,
    Level,
    Xp,
    PlayerCardId,
}

impl RecordField {
    pub fn name(&self) -> &'static str {
        match self {
            Self::GameName => "game_name",
            Self::TagLine => "tag_line",
            Self::AccessToken => "access_token",
            Self::IdToken => "id_token",
            Self::EntitlementsToken => "entitlements_token",
            Self::SessionCookie => "session_cookie",
            Self::SubjectId => "subject_id",
            Self::RegionCode => "region_code",
            Self::ValorantPoints => "valorant_points",
            Self::RadianitePoints => "radianite_points",
            Self::KingdomCredits => "kingdom_credits",
            Self::Rank => "rank",
            Self::Rr => "rr",
            Self::Level => "level",
            Self::Xp => "xp",
            Self::PlayerCardId => "player_card_id",
        }
    }

    fn read(&self, record: &AccountRecord) -> Option<String> {
        let text = |v: &str| (!v.is_empty()).then(|| v.to_string());
        match self {
            Self::GameName => text(&record.game_name),
            Self::TagLine => text(&record.tag_line),
            Self::AccessToken => record.access_token.clone(),
            Self::IdToken => record.id_token.clone(),
            Self::EntitlementsToken => record.entitlements_token.clone(),
            Self::SessionCookie => record.session_cookie.clone(),
            Self::SubjectId => record.subject_id.clone(),
            Self::RegionCode => record.region_code.clone(),
            Self::ValorantPoints => Some(record.wallet.valorant_points.to_string()),
            Self::RadianitePoints => Some(record.wallet.radianite_points.to_string()),
            Self::KingdomCredits => Some(record.wallet.kingdom_credits.to_string()),
            Self::Rank => record.rank.clone(),
            Self::Rr => record.rr.map(|v| v.to_string()),
            Self::Level => record.level.map(|v| v.to_string()),
            Self::Xp => record.xp.map(|v| v.to_string()),
            Self::PlayerCardId => record.player_card_id.clone(),
        }
    }

    fn write(&self, record: &mut AccountRecord, value: String) -> Result<(), VaultError> {
        let number = |v: &str| v.trim().parse::<u64>().map_err(|_| VaultError::InvalidValue(*self));
        let small = |v: &str| v.trim().parse::<u32>().map_err(|_| VaultError::InvalidValue(*self));
        match self {
            Self::GameName => record.game_name = value,
            Self::TagLine => record.tag_line = value,
            Self::AccessToken => record.access_token = Some(value),
            Self::IdToken => record.id_token = Some(value),
            Self::EntitlementsToken => record.entitlements_token = Some(value),
            Self::SessionCookie => record.session_cookie = Some(value),
            Self::SubjectId => record.subject_id = Some(value),
            Self::RegionCode => record.region_code = Some(value),
            Self::ValorantPoints => record.wallet.valorant_points = number(&value)?,
            Self::RadianitePoints => record.wallet.radianite_points = number(&value)?,
            Self::KingdomCredits => record.wallet.kingdom_credits = number(&value)?,
            Self::Rank => record.rank = Some(value),
            Self::Rr => record.rr = Some(small(&value)?),
            Self::Level => record.level = Some(small(&value)?),
            Self::Xp => record.xp = Some(small(&value)?),
            Self::PlayerCardId => record.player_card_id = Some(value),
        }
        Ok(())
    }
}

impl fmt::Display for RecordField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

type Accounts = BTreeMap<String, AccountRecord>;

/// Mapping from account handle to [`AccountRecord`], stored as one blob
#[derive(Clone)]
pub struct CredentialVault {
    store: Arc<dyn SecretStore>,
}

impl CredentialVault {
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self { store }
    }

    /// Returns every saved account
    ///
    /// A blob that fails to decode is treated as an empty vault: the accounts
    /// are lost, but the app keeps working and the user can sign in again.
    pub async fn get_all(&self) -> Result<Accounts, VaultError> {
        let Some(raw) = self.store.get(ACCOUNTS_KEY).await? else {
            return Ok(Accounts::new());
        };

        match serde_json::from_str::<Accounts>(&raw) {
            Ok(accounts) => Ok(accounts),
            Err(_) => {
                tracing::warn!("Account vault is malformed ({} bytes), treating as empty", raw.len());
                Ok(Accounts::new())
            }
        }
    }

    /// Saved handles, in sorted order
    pub async fn handles(&self) -> Result<Vec<String>, VaultError> {
        Ok(self.get_all().await?.into_keys().collect())
    }

    /// Returns the full record for `handle`
    pub async fn get_record(&self, handle: &str) -> Result<Option<AccountRecord>, VaultError> {
        Ok(self.get_all().await?.remove(handle))
    }

    /// Returns one field of one account, `None` if either is absent
    pub async fn get(&self, handle: &str, field: RecordField) -> Result<Option<String>, VaultError> {
        Ok(self
            .get_all()
            .await?
            .get(handle)
            .and_then(|record| field.read(record)))
    }

    /// Sets one field, creating a default record for a new handle
    pub async fn set(
        &self,
        handle: &str,
        field: RecordField,
        value: impl Into<String>,
    ) -> Result<(), VaultError> {
        let value = value.into();
        let mut accounts = self.get_all().await?;
        let record = accounts
            .entry(handle.to_string())
            .or_insert_with(|| AccountRecord::new(handle));
        field.write(record, value)?;
        record.updated_at = Some(Utc::now());
        self.save(&accounts).await
    }

    /// Applies `apply` to the record for `handle` in a single write
    ///
    /// The record is created if missing.
    pub async fn update<F>(&self, handle: &str, apply: F) -> Result<(), VaultError>
    where
        F: FnOnce(&mut AccountRecord),
    {
        let mut accounts = self.get_all().await?;
        let record = accounts
            .entry(handle.to_string())
            .or_insert_with(|| AccountRecord::new(handle));
        apply(record);
        record.account_handle = handle.to_string();
        record.updated_at = Some(Utc::now());
        self.save(&accounts).await
    }

    /// Deletes an account; removing an unknown handle is a no-op
    pub async fn remove(&self, handle: &str) -> Result<(), VaultError> {
        let mut accounts = self.get_all().await?;
        if accounts.remove(handle).is_some() {
            self.save(&accounts).await?;
        }
        Ok(())
    }

    /// Deletes every saved account
    pub async fn clear(&self) -> Result<(), VaultError> {
        self.store.remove(ACCOUNTS_KEY).await?;
        Ok(())
    }

    async fn save(&self, accounts: &Accounts) -> Result<(), VaultError> {
        let raw = serde_json::to_string(accounts).map_err(|_| VaultError::Serialize)?;
        self.store.set(ACCOUNTS_KEY, &raw).await?;
        Ok(())
    }
}
