//! Error taxonomy for the session layer
//!
//! Variants carry at most the name of the step that failed. Response bodies,
//! tokens and cookies never end up in an error message.

use thiserror::Error;

use super::secure_store::StoreError;
use super::vault::VaultError;
use crate::security::SanitizerError;

/// Coarse, enumerable failure categories surfaced to callers
#[derive(Debug, Error)]
pub enum AuthError {
    /// A token required by the current step is absent
    #[error("Missing token")]
    MissingToken,

    /// The identity endpoint did not return a name, tag and subject
    #[error("Missing identity")]
    MissingIdentity,

    /// The provider rejected an otherwise well-formed access token
    #[error("Unauthorized")]
    Unauthorized,

    /// A remote call failed (transport error, unexpected status or body)
    #[error("Network failure during {0}")]
    NetworkFailure(&'static str),

    /// A remote call exceeded its deadline
    #[error("Timed out during {0}")]
    TimedOut(&'static str),

    /// Persisted session data could not be decoded
    #[error("Malformed persisted state")]
    MalformedPersistedState,

    /// The secure credential store failed
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    /// The interactive login was cancelled or closed
    #[error("Login cancelled")]
    Cancelled,

    /// The requested account handle is not a valid `name#tag`
    #[error("Invalid account handle: {0}")]
    InvalidHandle(#[from] SanitizerError),
}

impl AuthError {
    /// Stable label for notices and metrics-free diagnostics
    pub fn category(&self) -> &'static str {
        match self {
            Self::MissingToken => "missing_token",
            Self::MissingIdentity => "missing_identity",
            Self::Unauthorized => "unauthorized",
            Self::NetworkFailure(_) => "network_failure",
            Self::TimedOut(_) => "timed_out",
            Self::MalformedPersistedState => "malformed_persisted_state",
            Self::Storage(_) => "storage",
            Self::Cancelled => "cancelled",
            Self::InvalidHandle(_) => "invalid_handle",
        }
    }

    /// Maps a transport error from `step` without keeping its message
    pub(crate) fn from_transport(step: &'static str, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::TimedOut(step)
        } else {
            Self::NetworkFailure(step)
        }
    }
}

impl From<VaultError> for AuthError {
    fn from(err: VaultError) -> Self {
        match err {
            VaultError::Store(e) => Self::Storage(e),
            VaultError::InvalidValue(_) | VaultError::Serialize => Self::MalformedPersistedState,
        }
    }
}
