//! Interactive login driver
//!
//! The embedded browser is supplied by the UI through [`LoginSurface`]. The
//! driver opens it on the hosted-login page, watches navigation events for
//! the terminal redirect and tears the surface down on every exit path.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::error::AuthError;
use super::token_extractor::{extract_tokens, TokenSet};
use crate::security::{Sanitizer, SecureString};

/// Name of the long-lived session cookie set by the identity provider
pub const SESSION_COOKIE_NAME: &str = "ssid";

/// Navigation events reported by a [`LoginSurface`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    /// The surface navigated to (or was redirected to) this URL
    Navigated(String),
    /// The user closed the surface
    Closed,
}

/// Embedded browser capable of showing the hosted login
#[async_trait]
pub trait LoginSurface: Send + Sync {
    /// Loads `url` and starts reporting navigation on `events`
    async fn open(&self, url: &Url, events: mpsc::Sender<SurfaceEvent>) -> Result<(), AuthError>;

    /// Reads a cookie set during the login, if present
    async fn session_cookie(&self, name: &str) -> Option<SecureString>;

    /// Stops navigation and clears the surface's ephemeral cookies
    async fn teardown(&self);
}

/// Tokens and session cookie captured by a completed interactive login
#[derive(Debug)]
pub struct InteractiveOutcome {
    pub tokens: TokenSet,
    pub session_cookie: Option<SecureString>,
}

/// Runs one interactive login against a [`LoginSurface`]
pub struct InteractiveLogin {
    login_url: Url,
    redirect_uri: String,
    timeout: Duration,
}

impl InteractiveLogin {
    pub fn new(login_url: Url, redirect_uri: impl Into<String>, timeout: Duration) -> Self {
        Self {
            login_url,
            redirect_uri: redirect_uri.into(),
            timeout,
        }
    }

    /// Drives the surface until a token-bearing redirect, close, cancel or timeout
    ///
    /// If the returned future is dropped before completion, teardown is
    /// spawned onto the current runtime.
    pub async fn run(
        &self,
        surface: Arc<dyn LoginSurface>,
        cancel: CancellationToken,
    ) -> Result<InteractiveOutcome, AuthError> {
        let guard = TeardownGuard::new(surface.clone());

        let result = tokio::select! {
            _ = cancel.cancelled() => Err(AuthError::Cancelled),
            result = tokio::time::timeout(self.timeout, self.drive(surface.as_ref())) => {
                result.unwrap_or(Err(AuthError::TimedOut("interactive_login")))
            }
        };

        guard.finish().await;
        result
    }

    async fn drive(&self, surface: &dyn LoginSurface) -> Result<InteractiveOutcome, AuthError> {
        let (tx, mut rx) = mpsc::channel(32);
        surface.open(&self.login_url, tx).await?;

        while let Some(event) = rx.recv().await {
            let url = match event {
                SurfaceEvent::Navigated(url) => url,
                SurfaceEvent::Closed => {
                    tracing::info!("Login surface closed by the user");
                    return Err(AuthError::Cancelled);
                }
            };

            if !url.starts_with(&self.redirect_uri) {
                continue;
            }

            match extract_tokens(&url) {
                Some(tokens) => {
                    // Read before teardown, which clears the surface's cookies
                    let session_cookie = surface.session_cookie(SESSION_COOKIE_NAME).await;
                    return Ok(InteractiveOutcome {
                        tokens,
                        session_cookie,
                    });
                }
                None => tracing::debug!(
                    "Redirect without tokens: {}",
                    Sanitizer::sanitize_url(&url)
                ),
            }
        }

        // The surface dropped its sender without saying why
        Err(AuthError::Cancelled)
    }
}

/// Tears the surface down exactly once, even if the login future is dropped
struct TeardownGuard {
    surface: Option<Arc<dyn LoginSurface>>,
}

impl TeardownGuard {
    fn new(surface: Arc<dyn LoginSurface>) -> Self {
        Self {
            surface: Some(surface),
        }
    }

    async fn finish(mut self) {
        if let Some(surface) = self.surface.take() {
            surface.teardown().await;
        }
    }
}

impl Drop for TeardownGuard {
    fn drop(&mut self) {
        let Some(surface) = self.surface.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { surface.teardown().await });
            }
            Err(_) => tracing::warn!("Login surface dropped outside a runtime; teardown skipped"),
        }
    }
}
