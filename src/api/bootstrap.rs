//! Bootstrap sequence run after every successful token acquisition
//!
//! Each step depends on the output of the one before it, so the chain is
//! strictly ordered. Only the wallet, XP and loadout fetches are independent
//! of each other and run concurrently. Results are written to the vault as
//! soon as a step completes, so a later failure leaves earlier data in place.

use super::client::GameClient;
use crate::auth::{AuthError, CredentialVault, SessionCredentials, StagedTokens};
use crate::security::Sanitizer;

/// Outcome of a completed bootstrap
#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapReport {
    /// Handle resolved from the identity endpoint
    pub handle: String,
    /// Credentials to commit to the token slot
    pub credentials: SessionCredentials,
}

/// Runs the ordered post-login call chain and persists its results
#[derive(Clone)]
pub struct BootstrapSequencer {
    client: GameClient,
    vault: CredentialVault,
}

impl BootstrapSequencer {
    pub fn new(client: GameClient, vault: CredentialVault) -> Self {
        Self { client, vault }
    }

    pub fn client(&self) -> &GameClient {
        &self.client
    }

    /// Runs the full sequence for one login attempt
    ///
    /// Any failure before the rank lookup aborts and is returned unchanged;
    /// the caller decides whether it means "try something else".
    pub async fn run(&self, tokens: StagedTokens) -> Result<BootstrapReport, AuthError> {
        // 1. Entitlements
        let entitlements_token = self
            .client
            .exchange_entitlements(&tokens.access_token)
            .await?;

        // 2. Identity
        let identity = self.client.fetch_identity(&tokens.access_token).await?;
        let handle = identity.handle();
        tracing::debug!(
            "Bootstrapping {} (subject {})",
            handle,
            Sanitizer::mask_string(&identity.subject_id, 4)
        );

        self.vault
            .update(&handle, |record| {
                record.game_name = identity.game_name.clone();
                record.tag_line = identity.tag_line.clone();
                record.subject_id = Some(identity.subject_id.clone());
                record.access_token = Some(tokens.access_token.to_plain());
                record.id_token = Some(tokens.id_token.to_plain());
                record.entitlements_token = Some(entitlements_token.to_plain());
                record.token_expires_at = tokens.expires_at;
            })
            .await?;

        // 3. Region
        let region = self
            .client
            .resolve_region(&tokens.access_token, &tokens.id_token)
            .await?;
        self.vault
            .update(&handle, |record| record.region_code = Some(region.clone()))
            .await?;

        // 4. Client version
        let client_version = self.client.fetch_client_version().await?;

        let credentials = SessionCredentials {
            handle: handle.clone(),
            access_token: tokens.access_token,
            id_token: tokens.id_token,
            entitlements_token,
            subject_id: identity.subject_id.clone(),
            region: region.clone(),
            client_version,
        };

        // 5. Wallet, level and loadout
        let (wallet, (level, xp), loadout) = tokio::try_join!(
            self.client.fetch_wallet(&credentials),
            self.client.fetch_account_xp(&credentials),
            self.client.fetch_loadout(&credentials),
        )?;

        self.vault
            .update(&handle, |record| record.wallet = wallet)
            .await?;
        self.vault
            .update(&handle, |record| {
                record.level = Some(level);
                record.xp = Some(xp);
            })
            .await?;
        self.vault
            .update(&handle, |record| {
                record.player_card_id = loadout.identity.player_card_id.clone()
            })
            .await?;

        // 6. Rank, best effort
        match self.client.fetch_rank(&region, &identity).await {
            Ok((rank, rr)) => {
                self.vault
                    .update(&handle, |record| {
                        record.rank = Some(rank);
                        record.rr = rr;
                    })
                    .await?;
            }
            Err(e) => tracing::debug!("Rank lookup skipped: {}", e),
        }

        tracing::info!("Bootstrap complete for {}", handle);

        Ok(BootstrapReport {
            handle,
            credentials,
        })
    }
}
