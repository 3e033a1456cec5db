//! HTTP client for the identity provider and game services
//!
//! Every call has a deadline (the reqwest client timeout) and maps failures
//! onto [`AuthError`] categories. Status codes are logged; bodies are not.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, COOKIE, LOCATION};
use reqwest::{redirect, Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use url::Url;

use super::types::{
    parse_rank, AccountXpResponse, ClientPlatform, EntitlementsResponse, FavoritesResponse,
    GeoResponse, OwnedItems, PlayerLoadout, Storefront, UserInfoResponse, VersionResponse,
    WalletResponse, KINGDOM_CREDITS_ID, RADIANITE_POINTS_ID, VALORANT_POINTS_ID,
};
use crate::auth::{AuthError, SessionCredentials, Wallet};
use crate::config::{AppConfig, Endpoints};
use crate::security::{Sanitizer, SecureString};

const GAME: &str = "valorant";

const ENTITLEMENTS_HEADER: &str = "x-riot-entitlements-jwt";
const CLIENT_PLATFORM_HEADER: &str = "x-riot-clientplatform";
const CLIENT_VERSION_HEADER: &str = "x-riot-clientversion";

/// Identity returned by `/userinfo`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerIdentity {
    pub game_name: String,
    pub tag_line: String,
    pub subject_id: String,
}

impl PlayerIdentity {
    /// Account handle, `name#tag`
    pub fn handle(&self) -> String {
        format!("{}#{}", self.game_name, self.tag_line)
    }
}

/// Result of replaying the hosted login with a session cookie
#[derive(Debug, Default)]
pub struct LoginReplay {
    /// Redirect target, if the provider answered with one
    pub redirect: Option<String>,
    /// New `ssid` value, if the provider rotated the cookie
    pub rotated_cookie: Option<SecureString>,
}

/// Client for every remote call the session layer makes
#[derive(Clone)]
pub struct GameClient {
    client: Client,
    // Never follows redirects: the token-bearing Location header is the answer
    no_redirect: Client,
    endpoints: Endpoints,
    platform_header: String,
}

impl GameClient {
    /// Creates a client with the configured endpoints and per-call deadline
    pub fn new(config: &AppConfig) -> Result<Self, AuthError> {
        let timeout = config.request_timeout();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|_| AuthError::NetworkFailure("client"))?;
        let no_redirect = Client::builder()
            .timeout(timeout)
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|_| AuthError::NetworkFailure("client"))?;

        Ok(Self {
            client,
            no_redirect,
            endpoints: config.endpoints.clone(),
            platform_header: ClientPlatform::default().header_value(),
        })
    }

    /// Creates a client with every endpoint at `base_url` (for testing)
    pub fn new_with_base_url(base_url: &str) -> Result<Self, AuthError> {
        let config = AppConfig {
            endpoints: Endpoints::all_at(base_url),
            ..Default::default()
        };
        Self::new(&config)
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Exchanges the access token for an entitlements token
    pub async fn exchange_entitlements(
        &self,
        access_token: &SecureString,
    ) -> Result<SecureString, AuthError> {
        let url = format!("{}/api/token/v1", self.endpoints.entitlements);
        let request = self
            .client
            .post(url)
            .header(AUTHORIZATION, access_token.bearer())
            .json(&json!({}));

        let body: EntitlementsResponse = self.send_json("entitlements", request).await?;
        body.entitlements_token
            .filter(|t| !t.is_empty())
            .map(SecureString::new)
            .ok_or(AuthError::MissingToken)
    }

    /// Fetches name, tag and subject id of the token's owner
    pub async fn fetch_identity(
        &self,
        access_token: &SecureString,
    ) -> Result<PlayerIdentity, AuthError> {
        let url = format!("{}/userinfo", self.endpoints.auth);
        let request = self
            .client
            .get(url)
            .header(AUTHORIZATION, access_token.bearer());

        let body: UserInfoResponse = self.send_json("identity", request).await?;
        let acct = body.acct.ok_or(AuthError::MissingIdentity)?;
        match (acct.game_name, acct.tag_line, body.sub) {
            (Some(game_name), Some(tag_line), Some(subject_id))
                if !game_name.is_empty() && !tag_line.is_empty() && !subject_id.is_empty() =>
            {
                Ok(PlayerIdentity {
                    game_name,
                    tag_line,
                    subject_id,
                })
            }
            _ => Err(AuthError::MissingIdentity),
        }
    }

    /// Resolves the live region code
    ///
    /// A 401 or 403 here means the access token is well-formed but stale, and
    /// comes back as [`AuthError::Unauthorized`].
    pub async fn resolve_region(
        &self,
        access_token: &SecureString,
        id_token: &SecureString,
    ) -> Result<String, AuthError> {
        let url = format!("{}/pas/v1/product/{}", self.endpoints.geo, GAME);
        let response = self
            .client
            .put(url)
            .header(AUTHORIZATION, access_token.bearer())
            .json(&json!({ "id_token": id_token.expose() }))
            .send()
            .await
            .map_err(|e| AuthError::from_transport("region", &e))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            tracing::info!("Region lookup rejected the access token ({})", status);
            return Err(AuthError::Unauthorized);
        }
        if !status.is_success() {
            tracing::warn!("region request failed: HTTP {}", status);
            return Err(AuthError::NetworkFailure("region"));
        }

        let body: GeoResponse = response
            .json()
            .await
            .map_err(|_| AuthError::NetworkFailure("region"))?;
        body.affinities
            .and_then(|a| a.live)
            .filter(|r| !r.is_empty())
            .ok_or(AuthError::NetworkFailure("region"))
    }

    /// Fetches the current client version from the public content API
    pub async fn fetch_client_version(&self) -> Result<String, AuthError> {
        let url = format!("{}/v1/version", self.endpoints.content);
        let body: VersionResponse = self.send_json("version", self.client.get(url)).await?;
        body.data
            .and_then(|d| d.riot_client_version)
            .filter(|v| !v.is_empty())
            .ok_or(AuthError::NetworkFailure("version"))
    }

    pub async fn fetch_wallet(&self, creds: &SessionCredentials) -> Result<Wallet, AuthError> {
        let url = format!("{}/store/v1/wallet/{}", self.regional(creds), creds.subject_id);
        let request = self.client.get(url).headers(self.regional_headers(creds)?);
        let body: WalletResponse = self.send_json("wallet", request).await?;

        let amount = |id: &str| body.balances.get(id).copied().unwrap_or_default();
        Ok(Wallet {
            valorant_points: amount(VALORANT_POINTS_ID),
            radianite_points: amount(RADIANITE_POINTS_ID),
            kingdom_credits: amount(KINGDOM_CREDITS_ID),
        })
    }

    /// Returns `(level, xp)`
    pub async fn fetch_account_xp(
        &self,
        creds: &SessionCredentials,
    ) -> Result<(u32, u32), AuthError> {
        let url = format!(
            "{}/account-xp/v1/players/{}",
            self.regional(creds),
            creds.subject_id
        );
        let request = self.client.get(url).headers(self.regional_headers(creds)?);
        let body: AccountXpResponse = self.send_json("account_xp", request).await?;
        body.progress
            .map(|p| (p.level, p.xp))
            .ok_or(AuthError::NetworkFailure("account_xp"))
    }

    pub async fn fetch_loadout(&self, creds: &SessionCredentials) -> Result<PlayerLoadout, AuthError> {
        let request = self
            .client
            .get(self.loadout_url(creds))
            .headers(self.regional_headers(creds)?);
        self.send_json("loadout", request).await
    }

    /// Writes the loadout back and returns what the service now holds
    pub async fn set_loadout(
        &self,
        creds: &SessionCredentials,
        loadout: &PlayerLoadout,
    ) -> Result<PlayerLoadout, AuthError> {
        let request = self
            .client
            .put(self.loadout_url(creds))
            .headers(self.regional_headers(creds)?)
            .json(&loadout.update_body());
        self.send_json("set_loadout", request).await
    }

    pub async fn fetch_favorites(
        &self,
        creds: &SessionCredentials,
    ) -> Result<FavoritesResponse, AuthError> {
        let request = self
            .client
            .get(self.favorites_url(creds))
            .headers(self.regional_headers(creds)?);
        self.send_json("favorites", request).await
    }

    pub async fn add_favorite(
        &self,
        creds: &SessionCredentials,
        item_id: &str,
    ) -> Result<FavoritesResponse, AuthError> {
        let request = self
            .client
            .post(self.favorites_url(creds))
            .headers(self.regional_headers(creds)?)
            .json(&json!({ "ItemID": item_id }));
        self.send_json("favorites", request).await
    }

    /// Removes a favorite; the service expects the item id without dashes
    pub async fn remove_favorite(
        &self,
        creds: &SessionCredentials,
        item_id: &str,
    ) -> Result<FavoritesResponse, AuthError> {
        let url = format!("{}/{}", self.favorites_url(creds), item_id.replace('-', ""));
        let request = self
            .client
            .delete(url)
            .headers(self.regional_headers(creds)?);
        self.send_json("favorites", request).await
    }

    pub async fn fetch_storefront(&self, creds: &SessionCredentials) -> Result<Storefront, AuthError> {
        let url = format!(
            "{}/store/v3/storefront/{}",
            self.regional(creds),
            creds.subject_id
        );
        let request = self
            .client
            .post(url)
            .headers(self.regional_headers(creds)?)
            .json(&json!({}));
        self.send_json("storefront", request).await
    }

    pub async fn fetch_owned_items(
        &self,
        creds: &SessionCredentials,
        item_type_id: &str,
    ) -> Result<OwnedItems, AuthError> {
        let url = format!(
            "{}/store/v1/entitlements/{}/{}",
            self.regional(creds),
            creds.subject_id,
            item_type_id
        );
        let request = self.client.get(url).headers(self.regional_headers(creds)?);
        self.send_json("owned_items", request).await
    }

    /// Looks up competitive rank and RR from the third-party rank service
    pub async fn fetch_rank(
        &self,
        region: &str,
        identity: &PlayerIdentity,
    ) -> Result<(String, Option<u32>), AuthError> {
        let mut url = Url::parse(&self.endpoints.rank).map_err(|_| AuthError::NetworkFailure("rank"))?;
        url.path_segments_mut()
            .map_err(|_| AuthError::NetworkFailure("rank"))?
            .pop_if_empty()
            .extend([
                GAME,
                "v1",
                "mmr",
                region,
                identity.game_name.as_str(),
                identity.tag_line.as_str(),
            ]);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AuthError::from_transport("rank", &e))?;
        if !response.status().is_success() {
            return Err(AuthError::NetworkFailure("rank"));
        }

        let text = response
            .text()
            .await
            .map_err(|_| AuthError::NetworkFailure("rank"))?;
        parse_rank(&text).ok_or(AuthError::NetworkFailure("rank"))
    }

    /// Replays the hosted login non-interactively, carrying the `ssid` cookie
    ///
    /// Redirects are not followed; the `Location` header of a 3xx answer is
    /// returned as-is for the token extractor.
    pub async fn replay_login(
        &self,
        login_url: &Url,
        session_cookie: &SecureString,
    ) -> Result<LoginReplay, AuthError> {
        let response = self
            .no_redirect
            .get(login_url.clone())
            .header(COOKIE, format!("ssid={}", session_cookie.expose()))
            .send()
            .await
            .map_err(|e| AuthError::from_transport("cookie_reauth", &e))?;

        let rotated_cookie = response
            .cookies()
            .find(|c| c.name() == "ssid" && !c.value().is_empty())
            .map(|c| SecureString::new(c.value().to_string()));

        let redirect = if response.status().is_redirection() {
            response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        } else {
            Some(response.url().to_string())
        };

        if let Some(target) = &redirect {
            tracing::debug!(
                "Login replay answered {} -> {}",
                response.status(),
                Sanitizer::sanitize_url(target)
            );
        }

        Ok(LoginReplay {
            redirect,
            rotated_cookie,
        })
    }

    fn regional(&self, creds: &SessionCredentials) -> String {
        self.endpoints.regional_for(&creds.region)
    }

    fn loadout_url(&self, creds: &SessionCredentials) -> String {
        format!(
            "{}/personalization/v2/players/{}/playerloadout",
            self.regional(creds),
            creds.subject_id
        )
    }

    fn favorites_url(&self, creds: &SessionCredentials) -> String {
        format!(
            "{}/favorites/v1/players/{}/favorites",
            self.regional(creds),
            creds.subject_id
        )
    }

    /// The four headers every per-region endpoint requires
    fn regional_headers(&self, creds: &SessionCredentials) -> Result<HeaderMap, AuthError> {
        let value = |v: &str| HeaderValue::from_str(v).map_err(|_| AuthError::MissingToken);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, value(&creds.access_token.bearer())?);
        headers.insert(ENTITLEMENTS_HEADER, value(creds.entitlements_token.expose())?);
        headers.insert(CLIENT_PLATFORM_HEADER, value(&self.platform_header)?);
        headers.insert(CLIENT_VERSION_HEADER, value(&creds.client_version)?);
        Ok(headers)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        step: &'static str,
        request: RequestBuilder,
    ) -> Result<T, AuthError> {
        let response = request
            .send()
            .await
            .map_err(|e| AuthError::from_transport(step, &e))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!("{} request failed: HTTP {}", step, status);
            return Err(AuthError::NetworkFailure(step));
        }

        response.json().await.map_err(|e| {
            tracing::warn!("{} response did not decode", step);
            AuthError::from_transport(step, &e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn creds() -> SessionCredentials {
        SessionCredentials {
            handle: "Player#EUW".into(),
            access_token: "a.b.c".into(),
            id_token: "d.e.f".into(),
            entitlements_token: "ent-token".into(),
            subject_id: "puuid-1".into(),
            region: "eu".into(),
            client_version: "release-09.00".into(),
        }
    }

    #[tokio::test]
    async fn test_exchange_entitlements() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/token/v1"))
            .and(header("Authorization", "Bearer a.b.c"))
            .and(body_json(json!({})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"entitlements_token": "ent"})))
            .mount(&server)
            .await;

        let client = GameClient::new_with_base_url(&server.uri()).unwrap();
        let token = client.exchange_entitlements(&"a.b.c".into()).await.unwrap();
        assert_eq!(token, "ent");
    }

    #[tokio::test]
    async fn test_missing_entitlements_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/token/v1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let client = GameClient::new_with_base_url(&server.uri()).unwrap();
        let result = client.exchange_entitlements(&"a.b.c".into()).await;
        assert!(matches!(result, Err(AuthError::MissingToken)));
    }

    #[tokio::test]
    async fn test_fetch_identity_requires_all_fields() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"sub": "puuid-1", "acct": {"game_name": "Player"}})),
            )
            .mount(&server)
            .await;

        let client = GameClient::new_with_base_url(&server.uri()).unwrap();
        let result = client.fetch_identity(&"a.b.c".into()).await;
        assert!(matches!(result, Err(AuthError::MissingIdentity)));
    }

    #[tokio::test]
    async fn test_region_401_is_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/pas/v1/product/valorant"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = GameClient::new_with_base_url(&server.uri()).unwrap();
        let result = client.resolve_region(&"a.b.c".into(), &"d.e.f".into()).await;
        assert!(matches!(result, Err(AuthError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_region_500_is_network_failure() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/pas/v1/product/valorant"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = GameClient::new_with_base_url(&server.uri()).unwrap();
        let result = client.resolve_region(&"a.b.c".into(), &"d.e.f".into()).await;
        assert!(matches!(result, Err(AuthError::NetworkFailure("region"))));
    }

    #[tokio::test]
    async fn test_slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/version"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(std::time::Duration::from_secs(3))
                    .set_body_json(json!({"data": {"riotClientVersion": "x"}})),
            )
            .mount(&server)
            .await;

        let config = AppConfig {
            endpoints: Endpoints::all_at(&server.uri()),
            request_timeout_secs: 1,
            ..Default::default()
        };
        let client = GameClient::new(&config).unwrap();
        let result = client.fetch_client_version().await;
        assert!(matches!(result, Err(AuthError::TimedOut("version"))));
    }

    #[tokio::test]
    async fn test_wallet_sends_regional_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/store/v1/wallet/puuid-1"))
            .and(header("Authorization", "Bearer a.b.c"))
            .and(header("X-Riot-Entitlements-JWT", "ent-token"))
            .and(header("X-Riot-ClientVersion", "release-09.00"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Balances": {
                    VALORANT_POINTS_ID: 1000,
                    RADIANITE_POINTS_ID: 20,
                    KINGDOM_CREDITS_ID: 3500
                }
            })))
            .mount(&server)
            .await;

        let client = GameClient::new_with_base_url(&server.uri()).unwrap();
        let wallet = client.fetch_wallet(&creds()).await.unwrap();
        assert_eq!(wallet.valorant_points, 1000);
        assert_eq!(wallet.radianite_points, 20);
        assert_eq!(wallet.kingdom_credits, 3500);
    }

    #[tokio::test]
    async fn test_remove_favorite_strips_dashes() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/favorites/v1/players/puuid-1/favorites/abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"FavoritedContent": {}})))
            .expect(1)
            .mount(&server)
            .await;

        let client = GameClient::new_with_base_url(&server.uri()).unwrap();
        let favorites = client.remove_favorite(&creds(), "abc-123").await.unwrap();
        assert!(favorites.item_ids().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_rank_parses_text() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/valorant/v1/mmr/eu/Player/EUW"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Diamond 1 - 12RR."))
            .mount(&server)
            .await;

        let client = GameClient::new_with_base_url(&server.uri()).unwrap();
        let identity = PlayerIdentity {
            game_name: "Player".into(),
            tag_line: "EUW".into(),
            subject_id: "puuid-1".into(),
        };
        let rank = client.fetch_rank("eu", &identity).await.unwrap();
        assert_eq!(rank, ("Diamond 1".to_string(), Some(12)));
    }

    #[tokio::test]
    async fn test_replay_login_reads_location_and_rotated_cookie() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/authorize"))
            .and(header("Cookie", "ssid=old-cookie"))
            .respond_with(
                ResponseTemplate::new(303)
                    .insert_header(
                        "Location",
                        "https://playvalorant.com/opt_in#access_token=n.e.w&id_token=i.d.t&expires_in=3600",
                    )
                    .insert_header("Set-Cookie", "ssid=new-cookie; Path=/; HttpOnly; Secure"),
            )
            .mount(&server)
            .await;

        let client = GameClient::new_with_base_url(&server.uri()).unwrap();
        let url = Url::parse(&format!("{}/authorize?client_id=x", server.uri())).unwrap();
        let replay = client.replay_login(&url, &"old-cookie".into()).await.unwrap();

        assert!(replay.redirect.unwrap().contains("access_token=n.e.w"));
        assert_eq!(replay.rotated_cookie.unwrap(), "new-cookie");
    }
}
