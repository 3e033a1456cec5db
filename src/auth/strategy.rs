//! Silent authentication strategies
//!
//! Each strategy either establishes a session for the requested handle, or
//! reports [`Attempt::Skipped`] when it has nothing to try with. The resolver
//! walks them in order and falls back to the interactive login.

use async_trait::async_trait;
use chrono::Utc;
use url::Url;

use super::error::AuthError;
use super::token_extractor::{extract_tokens, is_plausible_jwt};
use super::token_slot::StagedTokens;
use super::vault::CredentialVault;
use crate::api::{BootstrapReport, BootstrapSequencer};
use crate::security::{Sanitizer, SecureString};

/// Shared dependencies handed to every strategy
#[derive(Clone)]
pub struct StrategyContext {
    pub vault: CredentialVault,
    pub bootstrap: BootstrapSequencer,
    /// Hosted-login URL replayed by cookie re-authentication
    pub login_url: Url,
}

/// Outcome of one strategy
#[derive(Debug)]
pub enum Attempt {
    /// A session was established and bootstrapped
    Established(BootstrapReport),
    /// The strategy had nothing to work with
    Skipped,
}

/// A way to activate a saved account without user interaction
#[async_trait]
pub trait AuthStrategy: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Tries to establish a session for `handle`
    ///
    /// `Err(AuthError::Unauthorized)` means the stored material was rejected
    /// and the next strategy may still succeed.
    async fn attempt(&self, handle: &str, ctx: &StrategyContext) -> Result<Attempt, AuthError>;
}

/// Reuses the stored access and id tokens as-is
pub struct TokenReuseStrategy;

#[async_trait]
impl AuthStrategy for TokenReuseStrategy {
    fn name(&self) -> &'static str {
        "token_reuse"
    }

    async fn attempt(&self, handle: &str, ctx: &StrategyContext) -> Result<Attempt, AuthError> {
        let Some(record) = ctx.vault.get_record(handle).await? else {
            return Ok(Attempt::Skipped);
        };

        let (Some(access), Some(id)) = (record.access_token.as_deref(), record.id_token.as_deref())
        else {
            return Ok(Attempt::Skipped);
        };
        if !is_plausible_jwt(access) || !is_plausible_jwt(id) {
            tracing::debug!("Stored tokens for {} are not plausible JWTs", handle);
            return Ok(Attempt::Skipped);
        }
        if record.token_expired(Utc::now()) {
            tracing::debug!("Stored tokens for {} are expired", handle);
            return Ok(Attempt::Skipped);
        }

        let staged = StagedTokens {
            access_token: SecureString::from(access),
            id_token: SecureString::from(id),
            expires_at: record.token_expires_at,
        };
        let report = ctx.bootstrap.run(staged).await?;
        Ok(Attempt::Established(report))
    }
}

/// Replays the hosted login with the stored `ssid` cookie
pub struct CookieReauthStrategy;

#[async_trait]
impl AuthStrategy for CookieReauthStrategy {
    fn name(&self) -> &'static str {
        "cookie_reauth"
    }

    async fn attempt(&self, handle: &str, ctx: &StrategyContext) -> Result<Attempt, AuthError> {
        let Some(cookie) = ctx
            .vault
            .get_record(handle)
            .await?
            .and_then(|record| record.session_cookie)
            .filter(|c| !c.is_empty())
        else {
            return Ok(Attempt::Skipped);
        };

        let replay = match ctx
            .bootstrap
            .client()
            .replay_login(&ctx.login_url, &SecureString::new(cookie))
            .await
        {
            Ok(replay) => replay,
            Err(e) => {
                tracing::warn!("Cookie re-authentication for {} failed: {}", handle, e);
                return Ok(Attempt::Skipped);
            }
        };

        if let Some(rotated) = &replay.rotated_cookie {
            ctx.vault
                .update(handle, |record| record.session_cookie = Some(rotated.to_plain()))
                .await?;
        }

        let Some(tokens) = replay.redirect.as_deref().and_then(extract_tokens) else {
            tracing::info!(
                "Cookie for {} no longer yields tokens ({})",
                handle,
                replay
                    .redirect
                    .as_deref()
                    .map(Sanitizer::sanitize_url)
                    .unwrap_or_default()
            );
            return Ok(Attempt::Skipped);
        };

        let staged = StagedTokens::from_token_set(tokens, Utc::now());
        ctx.vault
            .update(handle, |record| {
                record.access_token = Some(staged.access_token.to_plain());
                record.id_token = Some(staged.id_token.to_plain());
                record.token_expires_at = staged.expires_at;
            })
            .await?;

        let report = ctx.bootstrap.run(staged).await?;
        Ok(Attempt::Established(report))
    }
}

/// The default strategy order: token reuse, then cookie re-authentication
pub fn default_strategies() -> Vec<Box<dyn AuthStrategy>> {
    vec![Box::new(TokenReuseStrategy), Box::new(CookieReauthStrategy)]
}
