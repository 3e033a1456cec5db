//! VShop - Multi-account session core for a game shop companion app
//!
//! Acquires, validates, silently refreshes and securely persists the
//! authentication material of several game accounts, against an identity
//! provider that only offers a browser-based implicit-grant login.
//!
//! ## Features
//!
//! - Saved accounts in the OS credential manager (or an encrypted file)
//! - Silent re-activation from stored tokens or the long-lived session cookie
//! - Interactive login through an embedding-supplied browser surface
//! - Post-login bootstrap of wallet, level, loadout and rank
//! - Storefront, collection and favorites for the active account
//!
//! ## Architecture
//!
//! - **Auth**: storage, vault, token extraction, session state, strategies
//! - **Api**: HTTP client, bootstrap sequence, player data operations
//! - **Security**: zeroizing secrets and log-safe sanitization
//! - **Config**: endpoints, deadlines and storage backend

pub mod api;
pub mod auth;
pub mod config;
pub mod security;

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use api::PlayerData;
use auth::{AuthResolver, EncryptedFileStore, KeyringStore, SecretStore};
use config::{AppConfig, StorageBackend};

/// Default log directives when `RUST_LOG` is not set
const DEFAULT_LOG_FILTER: &str = "vshop_lib=debug,info";

/// Installs the global tracing subscriber
///
/// Honors `RUST_LOG`. Calling it more than once is harmless.
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Opens the secret store selected in `config`
pub async fn open_store(config: &AppConfig) -> anyhow::Result<Arc<dyn SecretStore>> {
    let keyring = KeyringStore::with_service(config.keyring_service.clone());
    match config.storage {
        StorageBackend::Keyring => Ok(Arc::new(keyring)),
        StorageBackend::EncryptedFile => {
            let path = AppConfig::vault_file_path().context("Could not determine vault path")?;
            let store = EncryptedFileStore::open_with_keyring(&path, &keyring)
                .await
                .with_context(|| format!("Failed to open vault file {:?}", path))?;
            Ok(Arc::new(store))
        }
    }
}

/// Application state shared with the UI
pub struct AppState {
    pub config: AppConfig,
    pub resolver: Arc<AuthResolver>,
    pub player: PlayerData,
}

impl AppState {
    /// Loads the configuration, opens the store and initializes the session
    pub async fn new() -> anyhow::Result<Self> {
        Self::with_config(AppConfig::load()).await
    }

    pub async fn with_config(config: AppConfig) -> anyhow::Result<Self> {
        let store = open_store(&config).await?;
        Self::with_store(config, store).await
    }

    /// Builds the state over an already opened store
    pub async fn with_store(config: AppConfig, store: Arc<dyn SecretStore>) -> anyhow::Result<Self> {
        let resolver = Arc::new(AuthResolver::new(store, &config)?);
        resolver
            .initialize()
            .await
            .context("Failed to initialize session")?;
        let player = resolver.player_data();

        tracing::info!("VShop session core ready ({:?} storage)", config.storage);
        Ok(Self {
            config,
            resolver,
            player,
        })
    }
}
