//! User-facing session notices
//!
//! Coarse notifications the UI shows as toasts. They carry a handle at most,
//! never a token or an error payload.

use serde::Serialize;

/// Notice level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// Something the user should be told about
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "handle", rename_all = "snake_case")]
pub enum SessionNotice {
    /// An interactive login completed
    LoginSucceeded(String),
    /// A stored account was activated without user interaction
    Reauthenticated(String),
    /// Silent strategies are exhausted; show the login surface
    SignInRequired(String),
    /// A login attempt failed with a non-recoverable error; the handle is
    /// unknown when an interactive login fails before identity resolution
    LoginFailed(Option<String>),
    /// A saved account was deleted
    AccountRemoved(String),
    /// Every saved account was deleted
    LoggedOut,
}

impl SessionNotice {
    pub fn level(&self) -> NoticeLevel {
        match self {
            Self::LoginSucceeded(_) | Self::Reauthenticated(_) => NoticeLevel::Success,
            Self::LoginFailed(_) => NoticeLevel::Error,
            Self::SignInRequired(_) | Self::AccountRemoved(_) | Self::LoggedOut => NoticeLevel::Info,
        }
    }

    /// Short text suitable for a toast
    pub fn message(&self) -> String {
        match self {
            Self::LoginSucceeded(handle) => format!("Signed in as {}", handle),
            Self::Reauthenticated(handle) => format!("Welcome back, {}", handle),
            Self::SignInRequired(handle) => format!("Please sign in again to use {}", handle),
            Self::LoginFailed(Some(handle)) => format!("Could not sign in to {}", handle),
            Self::LoginFailed(None) => "Sign-in failed".to_string(),
            Self::AccountRemoved(handle) => format!("Removed {}", handle),
            Self::LoggedOut => "Signed out of all accounts".to_string(),
        }
    }
}

/// Callback type for delivering notices
pub type NoticeCallback = Box<dyn Fn(&SessionNotice) + Send + Sync>;
