//! Configuration management for VShop
//!
//! Persistent settings: remote endpoints, request deadlines, the login
//! redirect and which secure store backend holds the vault.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use url::Url;

/// Base URLs of every remote service the session layer talks to
///
/// Per-region hosts contain a `{region}` placeholder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Endpoints {
    /// Hosted login and `/userinfo`
    pub auth: String,
    /// Entitlements token exchange
    pub entitlements: String,
    /// Regional affinity lookup
    pub geo: String,
    /// Per-region game services, e.g. `https://pd.{region}.a.pvp.net`
    pub regional: String,
    /// Public content API (client version)
    pub content: String,
    /// Third-party rank lookup
    pub rank: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            auth: "https://auth.riotgames.com".to_string(),
            entitlements: "https://entitlements.auth.riotgames.com".to_string(),
            geo: "https://riot-geo.pas.si.riotgames.com".to_string(),
            regional: "https://pd.{region}.a.pvp.net".to_string(),
            content: "https://valorant-api.com".to_string(),
            rank: "https://api.kyroskoh.xyz".to_string(),
        }
    }
}

impl Endpoints {
    /// Points every service at one base URL (for testing against a mock server)
    pub fn all_at(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/').to_string();
        Self {
            auth: base.clone(),
            entitlements: base.clone(),
            geo: base.clone(),
            regional: base.clone(),
            content: base.clone(),
            rank: base,
        }
    }

    /// Resolves the per-region host for `region`
    pub fn regional_for(&self, region: &str) -> String {
        self.regional.replace("{region}", region)
    }
}

/// Where the vault and session keys are persisted
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// Every key in the OS credential manager
    #[default]
    Keyring,
    /// AES-GCM encrypted file, key kept in the OS credential manager
    EncryptedFile,
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub endpoints: Endpoints,
    /// Deadline for each remote call, in seconds
    pub request_timeout_secs: u64,
    /// Deadline for the interactive login, in seconds
    pub interactive_timeout_secs: u64,
    /// Redirect target of the implicit grant; navigation to it ends a login
    pub redirect_uri: String,
    pub storage: StorageBackend,
    /// Service name under which keyring entries are created
    pub keyring_service: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            endpoints: Endpoints::default(),
            request_timeout_secs: 15,
            interactive_timeout_secs: 300,
            redirect_uri: "http://localhost/".to_string(),
            storage: StorageBackend::default(),
            keyring_service: "VShop".to_string(),
        }
    }
}

impl AppConfig {
    /// Gets the config directory path (cross-platform)
    pub fn config_dir() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            std::env::var("APPDATA")
                .ok()
                .map(|p| PathBuf::from(p).join("VShop"))
        }

        #[cfg(target_os = "macos")]
        {
            std::env::var("HOME")
                .ok()
                .map(|p| PathBuf::from(p).join("Library/Application Support/VShop"))
        }

        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            std::env::var("XDG_CONFIG_HOME")
                .ok()
                .map(PathBuf::from)
                .or_else(|| std::env::var("HOME").ok().map(|p| PathBuf::from(p).join(".config")))
                .map(|p| p.join("vshop"))
        }
    }

    fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("config.json"))
    }

    /// Path of the encrypted vault file
    pub fn vault_file_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("vault.json"))
    }

    /// Loads configuration from disk, falling back to defaults
    pub fn load() -> Self {
        if let Some(path) = Self::config_path() {
            if let Ok(content) = fs::read_to_string(&path) {
                match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => tracing::warn!("Ignoring unreadable config {:?}: {}", path, e),
                }
            }
        }
        Self::default()
    }

    /// Saves configuration to disk
    pub fn save(&self) -> anyhow::Result<()> {
        let path = Self::config_path().context("Could not determine config path")?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;
        }
        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&path, content).with_context(|| format!("Failed to write {:?}", path))?;
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn interactive_timeout(&self) -> Duration {
        Duration::from_secs(self.interactive_timeout_secs)
    }

    /// Parsed base URL of the identity provider
    pub fn auth_base(&self) -> anyhow::Result<Url> {
        Url::parse(&self.endpoints.auth)
            .with_context(|| format!("Invalid auth endpoint {}", self.endpoints.auth))
    }
}
