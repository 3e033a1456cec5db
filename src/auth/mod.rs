//! Authentication module - accounts, tokens and session lifecycle
//!
//! Provides:
//! - Secure storage backends (OS keyring, encrypted file, in-memory)
//! - The credential vault of saved accounts
//! - Token extraction from implicit-grant redirects
//! - The session state machine and the strategy resolver driving it
//! - The interactive login driver for an embedded browser

mod encrypted_store;
mod error;
mod interactive;
mod notice;
mod resolver;
mod secure_store;
mod session;
mod strategy;
mod token_extractor;
mod token_slot;
mod vault;

pub use encrypted_store::EncryptedFileStore;
pub use error::AuthError;
pub use interactive::{
    InteractiveLogin, InteractiveOutcome, LoginSurface, SurfaceEvent, SESSION_COOKIE_NAME,
};
pub use notice::{NoticeCallback, NoticeLevel, SessionNotice};
pub use resolver::{AuthResolver, SelectOutcome};
pub use secure_store::{
    KeyringStore, MemoryStore, SecretStore, StoreError, ACCOUNTS_KEY, ACTIVE_ACCOUNT_KEY,
    INFLIGHT_TOKENS_KEY,
};
pub use session::{reduce, SessionEvent, SessionPhase, SessionState};
pub use strategy::{
    default_strategies, Attempt, AuthStrategy, CookieReauthStrategy, StrategyContext,
    TokenReuseStrategy,
};
pub use token_extractor::{extract_tokens, is_plausible_jwt, login_url, TokenSet, CLIENT_ID};
pub use token_slot::{SessionCredentials, StagedTokens, VolatileTokenSlot};
pub use vault::{AccountRecord, CredentialVault, RecordField, VaultError, Wallet};
