//! Auth strategy resolver
//!
//! Entry point for the UI: activates saved accounts through the silent
//! strategies, runs the interactive login when those are exhausted, and owns
//! the session state. State changes are published on a watch channel and
//! user-facing events through the notice callback.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use tokio::sync::{watch, RwLock};
use tokio_util::sync::CancellationToken;

use super::error::AuthError;
use super::interactive::{InteractiveLogin, LoginSurface};
use super::notice::{NoticeCallback, SessionNotice};
use super::secure_store::SecretStore;
use super::session::{reduce, SessionEvent, SessionState};
use super::strategy::{default_strategies, Attempt, AuthStrategy, StrategyContext};
use super::token_extractor::login_url;
use super::token_slot::{SessionCredentials, StagedTokens, VolatileTokenSlot};
use super::vault::CredentialVault;
use crate::api::{BootstrapReport, BootstrapSequencer, GameClient, PlayerData};
use crate::config::AppConfig;
use crate::security::Sanitizer;

/// Result of [`AuthResolver::select_account`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectOutcome {
    /// Silent strategies failed; the UI should show the login surface
    pub needs_interactive: bool,
}

/// Coordinates vault, strategies, bootstrap and session state
pub struct AuthResolver {
    ctx: StrategyContext,
    slot: Arc<VolatileTokenSlot>,
    strategies: Vec<Box<dyn AuthStrategy>>,
    redirect_uri: String,
    interactive_timeout: Duration,
    state: watch::Sender<SessionState>,
    notice_callback: RwLock<Option<NoticeCallback>>,
}

impl AuthResolver {
    /// Creates a resolver over `store` with the default strategy order
    pub fn new(store: Arc<dyn SecretStore>, config: &AppConfig) -> anyhow::Result<Self> {
        let client = GameClient::new(config).context("Failed to build HTTP client")?;
        let vault = CredentialVault::new(store.clone());
        let auth_base = config.auth_base()?;

        let ctx = StrategyContext {
            vault: vault.clone(),
            bootstrap: BootstrapSequencer::new(client, vault),
            login_url: login_url(&auth_base, &config.redirect_uri),
        };
        let (state, _) = watch::channel(SessionState::initial());

        Ok(Self {
            ctx,
            slot: Arc::new(VolatileTokenSlot::new(store)),
            strategies: default_strategies(),
            redirect_uri: config.redirect_uri.clone(),
            interactive_timeout: config.interactive_timeout(),
            state,
            notice_callback: RwLock::new(None),
        })
    }

    /// Replaces the silent strategies, tried in the given order
    pub fn with_strategies(mut self, strategies: Vec<Box<dyn AuthStrategy>>) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn vault(&self) -> &CredentialVault {
        &self.ctx.vault
    }

    /// Data-fetch operations bound to this resolver's token slot
    pub fn player_data(&self) -> PlayerData {
        PlayerData::new(
            self.ctx.bootstrap.client().clone(),
            self.slot.clone(),
            self.ctx.vault.clone(),
        )
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Receiver that observes every state change
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Sets the callback that receives user-facing notices
    pub async fn on_notice<F>(&self, callback: F)
    where
        F: Fn(&SessionNotice) + Send + Sync + 'static,
    {
        *self.notice_callback.write().await = Some(Box::new(callback));
    }

    /// Credentials of the active account, if any
    pub async fn credentials(&self) -> Option<SessionCredentials> {
        self.slot.current().await
    }

    /// Handles of every saved account
    pub async fn accounts(&self) -> Result<Vec<String>, AuthError> {
        Ok(self.ctx.vault.handles().await?)
    }

    /// Handle that was active when the app last ran
    ///
    /// Only a hint for the account picker; nothing is activated.
    pub async fn last_active_handle(&self) -> Result<Option<String>, AuthError> {
        self.slot.persisted_active_handle().await
    }

    /// Runs the start-up transition, ending unauthenticated
    pub async fn initialize(&self) -> Result<(), AuthError> {
        self.dispatch(SessionEvent::Init);
        let accounts = self.ctx.vault.handles().await?;
        tracing::info!("Session initialized with {} saved account(s)", accounts.len());
        self.dispatch(SessionEvent::InitDone);
        Ok(())
    }

    /// Activates a saved account without user interaction if possible
    pub async fn select_account(&self, handle: &str) -> Result<SelectOutcome, AuthError> {
        Sanitizer::validate_handle(handle)?;

        for strategy in &self.strategies {
            match strategy.attempt(handle, &self.ctx).await {
                Ok(Attempt::Established(report)) => {
                    tracing::info!("{} activated via {}", handle, strategy.name());
                    return match self.activate(handle, report).await {
                        Ok(active) => {
                            self.notify(SessionNotice::Reauthenticated(active)).await;
                            Ok(SelectOutcome {
                                needs_interactive: false,
                            })
                        }
                        Err(e) => {
                            tracing::warn!("Could not commit session for {}: {}", handle, e);
                            self.notify(SessionNotice::LoginFailed(Some(handle.to_string())))
                                .await;
                            Err(e)
                        }
                    };
                }
                Ok(Attempt::Skipped) => {
                    tracing::debug!("{} skipped for {}", strategy.name(), handle);
                }
                Err(AuthError::Unauthorized) => {
                    tracing::info!("{} rejected for {}, trying next", strategy.name(), handle);
                }
                Err(e) => {
                    tracing::warn!("{} failed for {}: {}", strategy.name(), handle, e);
                    self.notify(SessionNotice::LoginFailed(Some(handle.to_string())))
                        .await;
                    return Err(e);
                }
            }
        }

        tracing::info!("No silent strategy worked for {}", handle);
        self.notify(SessionNotice::SignInRequired(handle.to_string()))
            .await;
        Ok(SelectOutcome {
            needs_interactive: true,
        })
    }

    /// Runs the interactive login on `surface` and activates the account
    ///
    /// Returns the handle of the signed-in account. A cancelled login leaves
    /// the state untouched and emits no notice.
    pub async fn login_interactive(
        &self,
        surface: Arc<dyn LoginSurface>,
        cancel: CancellationToken,
    ) -> Result<String, AuthError> {
        let driver = InteractiveLogin::new(
            self.ctx.login_url.clone(),
            self.redirect_uri.clone(),
            self.interactive_timeout,
        );

        let result = self.complete_interactive(driver, surface, cancel).await;
        match &result {
            Ok(handle) => {
                self.notify(SessionNotice::LoginSucceeded(handle.clone()))
                    .await
            }
            Err(AuthError::Cancelled) => tracing::info!("Interactive login cancelled"),
            Err(e) => {
                tracing::warn!("Interactive login failed: {}", e);
                self.notify(SessionNotice::LoginFailed(None)).await;
            }
        }
        result
    }

    async fn complete_interactive(
        &self,
        driver: InteractiveLogin,
        surface: Arc<dyn LoginSurface>,
        cancel: CancellationToken,
    ) -> Result<String, AuthError> {
        let outcome = driver.run(surface, cancel).await?;
        let staged = StagedTokens::from_token_set(outcome.tokens, Utc::now());
        let report = self.ctx.bootstrap.run(staged).await?;

        if let Some(cookie) = outcome.session_cookie {
            self.ctx
                .vault
                .update(&report.handle, |record| {
                    record.session_cookie = Some(cookie.to_plain())
                })
                .await?;
        }

        let handle = report.handle.clone();
        self.activate(&handle, report).await
    }

    /// Removes one saved account
    ///
    /// Handles match case-insensitively. If it is the active account, the
    /// session ends too.
    pub async fn logout_user(&self, handle: &str) -> Result<(), AuthError> {
        let stored = self
            .ctx
            .vault
            .handles()
            .await?
            .into_iter()
            .find(|h| h.eq_ignore_ascii_case(handle))
            .unwrap_or_else(|| handle.to_string());
        self.ctx.vault.remove(&stored).await?;

        if self.state().is_active(handle) {
            self.slot.clear().await?;
            self.dispatch(SessionEvent::InitDone);
            tracing::info!("Logged out active account {}", stored);
        } else {
            tracing::info!("Removed saved account {}", stored);
        }

        self.notify(SessionNotice::AccountRemoved(stored)).await;
        Ok(())
    }

    /// Removes every saved account and ends the session
    pub async fn logout_all(&self) -> Result<(), AuthError> {
        self.ctx.vault.clear().await?;
        self.slot.clear().await?;
        self.dispatch(SessionEvent::LogoutAll);
        tracing::info!("Logged out of all accounts");
        self.notify(SessionNotice::LoggedOut).await;
        Ok(())
    }

    /// Commits the bootstrap result and flips the state to authenticated
    async fn activate(&self, requested: &str, report: BootstrapReport) -> Result<String, AuthError> {
        if !report.handle.eq_ignore_ascii_case(requested) {
            tracing::warn!(
                "Requested {} but the tokens belong to {}",
                requested,
                report.handle
            );
        }

        self.slot.commit(report.credentials).await?;
        self.dispatch(SessionEvent::LoginSuccess(report.handle.clone()));
        Ok(report.handle)
    }

    fn dispatch(&self, event: SessionEvent) {
        self.state.send_modify(|state| *state = reduce(state, event));
    }

    async fn notify(&self, notice: SessionNotice) {
        tracing::debug!("Notice: {}", notice.message());
        if let Some(ref callback) = *self.notice_callback.read().await {
            callback(&notice);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::*;
    use crate::auth::interactive::SurfaceEvent;
    use crate::auth::secure_store::{MemoryStore, ACTIVE_ACCOUNT_KEY, INFLIGHT_TOKENS_KEY};
    use crate::auth::session::SessionPhase;
    use crate::config::Endpoints;
    use crate::security::SecureString;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::sync::mpsc;
    use url::Url;
    use wiremock::matchers::{any, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const HANDLE: &str = "Player#EUW";

    struct Harness {
        resolver: AuthResolver,
        store: Arc<MemoryStore>,
        notices: Arc<Mutex<Vec<SessionNotice>>>,
    }

    async fn harness(server: &MockServer) -> Harness {
        let store = Arc::new(MemoryStore::new());
        let config = AppConfig {
            endpoints: Endpoints::all_at(&server.uri()),
            ..Default::default()
        };
        let resolver = AuthResolver::new(store.clone(), &config).unwrap();

        let notices = Arc::new(Mutex::new(Vec::new()));
        let sink = notices.clone();
        resolver
            .on_notice(move |notice| sink.lock().unwrap().push(notice.clone()))
            .await;
        resolver.initialize().await.unwrap();

        Harness {
            resolver,
            store,
            notices,
        }
    }

    impl Harness {
        fn notices(&self) -> Vec<SessionNotice> {
            self.notices.lock().unwrap().clone()
        }

        async fn save_tokens(&self) {
            self.resolver
                .vault()
                .update(HANDLE, |r| {
                    r.access_token = Some("acc.ess.tok".into());
                    r.id_token = Some("id.tok.en".into());
                })
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_initialize_ends_unauthenticated() {
        let server = MockServer::start().await;
        let h = harness(&server).await;

        let state = h.resolver.state();
        assert_eq!(state.phase, SessionPhase::Unauthenticated);
        assert!(state.active_handle.is_none());
    }

    #[tokio::test]
    async fn test_no_tokens_needs_interactive_without_network() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;
        let h = harness(&server).await;
        h.resolver.vault().update(HANDLE, |_| {}).await.unwrap();

        let outcome = h.resolver.select_account(HANDLE).await.unwrap();

        assert!(outcome.needs_interactive);
        assert!(!h.resolver.state().is_authenticated());
        assert_eq!(
            h.notices(),
            vec![SessionNotice::SignInRequired(HANDLE.to_string())]
        );
    }

    #[tokio::test]
    async fn test_invalid_handle_is_rejected() {
        let server = MockServer::start().await;
        let h = harness(&server).await;

        let result = h.resolver.select_account("no-tag").await;
        assert!(matches!(result, Err(AuthError::InvalidHandle(_))));
    }

    #[tokio::test]
    async fn test_token_reuse_activates_account() {
        let server = MockServer::start().await;
        mount_happy_path(&server).await;
        let h = harness(&server).await;
        h.save_tokens().await;
        let mut rx = h.resolver.subscribe();

        let outcome = h.resolver.select_account(HANDLE).await.unwrap();

        assert!(!outcome.needs_interactive);
        assert!(rx.has_changed().unwrap());
        let state = rx.borrow_and_update().clone();
        assert!(state.is_authenticated());
        assert_eq!(state.active_handle.as_deref(), Some(HANDLE));

        let creds = h.resolver.credentials().await.unwrap();
        assert_eq!(creds.region, "eu");
        assert_eq!(
            h.store.get(ACTIVE_ACCOUNT_KEY).await.unwrap().as_deref(),
            Some(HANDLE)
        );
        assert_eq!(
            h.notices(),
            vec![SessionNotice::Reauthenticated(HANDLE.to_string())]
        );
    }

    #[tokio::test]
    async fn test_rejected_tokens_without_cookie_needs_interactive() {
        let server = MockServer::start().await;
        mount_entitlements(&server).await;
        mount_identity(&server).await;
        mount_region(&server, 401).await;
        let h = harness(&server).await;
        h.save_tokens().await;

        let outcome = h.resolver.select_account(HANDLE).await.unwrap();

        assert!(outcome.needs_interactive);
        assert_eq!(h.resolver.state().phase, SessionPhase::Unauthenticated);
        assert!(h.resolver.credentials().await.is_none());
        assert_eq!(
            h.notices(),
            vec![SessionNotice::SignInRequired(HANDLE.to_string())]
        );
    }

    #[tokio::test]
    async fn test_rejected_tokens_fall_back_to_cookie() {
        let server = MockServer::start().await;
        mount_entitlements(&server).await;
        mount_identity(&server).await;
        Mock::given(method("PUT"))
            .and(path("/pas/v1/product/valorant"))
            .respond_with(ResponseTemplate::new(401))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        mount_region(&server, 200).await;
        mount_version(&server).await;
        mount_player_data(&server).await;
        mount_rank(&server, 200).await;
        Mock::given(method("GET"))
            .and(path("/authorize"))
            .respond_with(ResponseTemplate::new(303).insert_header(
                "Location",
                "http://localhost/#access_token=new.acc.tok&id_token=new.id.tok",
            ))
            .mount(&server)
            .await;
        let h = harness(&server).await;
        h.save_tokens().await;
        h.resolver
            .vault()
            .update(HANDLE, |r| r.session_cookie = Some("ssid".into()))
            .await
            .unwrap();

        let outcome = h.resolver.select_account(HANDLE).await.unwrap();

        assert!(!outcome.needs_interactive);
        assert!(h.resolver.state().is_active(HANDLE));
        let creds = h.resolver.credentials().await.unwrap();
        assert_eq!(creds.access_token, "new.acc.tok");
    }

    #[tokio::test]
    async fn test_network_failure_aborts_with_notice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/token/v1"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;
        let h = harness(&server).await;
        h.save_tokens().await;

        let result = h.resolver.select_account(HANDLE).await;

        assert!(matches!(result, Err(AuthError::NetworkFailure("entitlements"))));
        assert!(!h.resolver.state().is_authenticated());
        assert_eq!(
            h.notices(),
            vec![SessionNotice::LoginFailed(Some(HANDLE.to_string()))]
        );
    }

    #[tokio::test]
    async fn test_logout_active_account_clears_session() {
        let server = MockServer::start().await;
        mount_happy_path(&server).await;
        let h = harness(&server).await;
        h.save_tokens().await;
        h.resolver.select_account(HANDLE).await.unwrap();

        h.resolver.logout_user("player#euw").await.unwrap();

        assert!(h.resolver.accounts().await.unwrap().is_empty());
        assert_eq!(h.resolver.state().phase, SessionPhase::Unauthenticated);
        assert!(h.resolver.credentials().await.is_none());
        assert_eq!(h.store.get(ACTIVE_ACCOUNT_KEY).await.unwrap(), None);
        assert_eq!(h.store.get(INFLIGHT_TOKENS_KEY).await.unwrap(), None);
        assert_eq!(
            h.notices().last(),
            Some(&SessionNotice::AccountRemoved(HANDLE.to_string()))
        );
    }

    #[tokio::test]
    async fn test_logout_other_account_keeps_session() {
        let server = MockServer::start().await;
        mount_happy_path(&server).await;
        let h = harness(&server).await;
        h.save_tokens().await;
        h.resolver.vault().update("Other#NA1", |_| {}).await.unwrap();
        h.resolver.select_account(HANDLE).await.unwrap();

        h.resolver.logout_user("Other#NA1").await.unwrap();

        assert!(h.resolver.state().is_active(HANDLE));
        assert!(h.resolver.credentials().await.is_some());
        assert_eq!(h.resolver.accounts().await.unwrap(), vec![HANDLE.to_string()]);
        assert_eq!(
            h.notices().last(),
            Some(&SessionNotice::AccountRemoved("Other#NA1".to_string()))
        );
    }

    #[tokio::test]
    async fn test_logout_all() {
        let server = MockServer::start().await;
        mount_happy_path(&server).await;
        let h = harness(&server).await;
        h.save_tokens().await;
        h.resolver.select_account(HANDLE).await.unwrap();

        h.resolver.logout_all().await.unwrap();

        assert!(h.resolver.accounts().await.unwrap().is_empty());
        assert!(h.resolver.state().active_handle.is_none());
        assert!(h.resolver.last_active_handle().await.unwrap().is_none());
        assert_eq!(h.notices().last(), Some(&SessionNotice::LoggedOut));
    }

    struct RedirectingSurface {
        redirect: String,
        sender: Mutex<Option<mpsc::Sender<SurfaceEvent>>>,
    }

    #[async_trait]
    impl LoginSurface for RedirectingSurface {
        async fn open(&self, _url: &Url, events: mpsc::Sender<SurfaceEvent>) -> Result<(), AuthError> {
            events
                .try_send(SurfaceEvent::Navigated(self.redirect.clone()))
                .unwrap();
            *self.sender.lock().unwrap() = Some(events);
            Ok(())
        }

        async fn session_cookie(&self, _name: &str) -> Option<SecureString> {
            Some("fresh-ssid".into())
        }

        async fn teardown(&self) {
            self.sender.lock().unwrap().take();
        }
    }

    #[tokio::test]
    async fn test_interactive_login_saves_cookie_and_activates() {
        let server = MockServer::start().await;
        mount_happy_path(&server).await;
        let h = harness(&server).await;
        let surface = Arc::new(RedirectingSurface {
            redirect: "http://localhost/#access_token=acc.ess.tok&id_token=id.tok.en&expires_in=3600"
                .to_string(),
            sender: Mutex::new(None),
        });

        let handle = h
            .resolver
            .login_interactive(surface, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(handle, HANDLE);
        assert!(h.resolver.state().is_active(HANDLE));
        let record = h.resolver.vault().get_record(HANDLE).await.unwrap().unwrap();
        assert_eq!(record.session_cookie.as_deref(), Some("fresh-ssid"));
        assert!(record.token_expires_at.is_some());
        assert_eq!(
            h.notices(),
            vec![SessionNotice::LoginSucceeded(HANDLE.to_string())]
        );
    }

    #[tokio::test]
    async fn test_cancelled_interactive_login_is_quiet() {
        let server = MockServer::start().await;
        let h = harness(&server).await;
        let surface = Arc::new(RedirectingSurface {
            redirect: "https://auth.example/login".to_string(),
            sender: Mutex::new(None),
        });
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = h.resolver.login_interactive(surface, cancel).await;

        assert!(matches!(result, Err(AuthError::Cancelled)));
        assert!(h.notices().is_empty());
        assert_eq!(h.resolver.state().phase, SessionPhase::Unauthenticated);
    }
}
