//! Authenticated player-data operations
//!
//! Everything here runs against the credentials committed to the token slot.
//! With no active account every call fails with [`AuthError::MissingToken`]
//! before touching the network.

use std::sync::Arc;

use super::client::GameClient;
use super::types::{OwnedItems, PlayerLoadout, Storefront};
use crate::auth::{AuthError, CredentialVault, SessionCredentials, VolatileTokenSlot};

/// Item type id of weapon skins in the owned-items endpoint
pub const SKIN_ITEM_TYPE_ID: &str = "e7c63390-eda7-46e0-bb7a-a6abdacd2433";
/// Item type id of player cards
pub const PLAYER_CARD_ITEM_TYPE_ID: &str = "3f296c07-64c3-494c-923b-fe692a4fa1bd";

/// Data-fetch operations for the active account
#[derive(Clone)]
pub struct PlayerData {
    client: GameClient,
    slot: Arc<VolatileTokenSlot>,
    vault: CredentialVault,
}

impl PlayerData {
    pub fn new(client: GameClient, slot: Arc<VolatileTokenSlot>, vault: CredentialVault) -> Self {
        Self {
            client,
            slot,
            vault,
        }
    }

    async fn credentials(&self) -> Result<SessionCredentials, AuthError> {
        self.slot.current().await.ok_or(AuthError::MissingToken)
    }

    /// Today's offers, featured bundle and night market
    pub async fn storefront(&self) -> Result<Storefront, AuthError> {
        let creds = self.credentials().await?;
        self.client.fetch_storefront(&creds).await
    }

    /// Items of `item_type_id` owned by the active account
    pub async fn owned_items(&self, item_type_id: &str) -> Result<OwnedItems, AuthError> {
        let creds = self.credentials().await?;
        self.client.fetch_owned_items(&creds, item_type_id).await
    }

    pub async fn loadout(&self) -> Result<PlayerLoadout, AuthError> {
        let creds = self.credentials().await?;
        self.client.fetch_loadout(&creds).await
    }

    /// Equips a skin level and chroma on one gun of the current loadout
    pub async fn equip_skin(
        &self,
        gun_id: &str,
        skin_id: &str,
        level_id: &str,
        chroma_id: &str,
    ) -> Result<PlayerLoadout, AuthError> {
        let creds = self.credentials().await?;
        let mut loadout = self.client.fetch_loadout(&creds).await?;
        if !loadout.equip_skin(gun_id, skin_id, level_id, chroma_id) {
            tracing::debug!("Gun {} is not in the loadout, writing it back unchanged", gun_id);
        }
        self.client.set_loadout(&creds, &loadout).await
    }

    /// Favorited item ids; the vault copy is refreshed on success
    pub async fn favorites(&self) -> Result<Vec<String>, AuthError> {
        let creds = self.credentials().await?;
        let ids = self.client.fetch_favorites(&creds).await?.item_ids();
        self.store_favorites(&creds.handle, &ids).await?;
        Ok(ids)
    }

    pub async fn add_favorite(&self, item_id: &str) -> Result<Vec<String>, AuthError> {
        let creds = self.credentials().await?;
        let ids = self.client.add_favorite(&creds, item_id).await?.item_ids();
        self.store_favorites(&creds.handle, &ids).await?;
        Ok(ids)
    }

    pub async fn remove_favorite(&self, item_id: &str) -> Result<Vec<String>, AuthError> {
        let creds = self.credentials().await?;
        let ids = self.client.remove_favorite(&creds, item_id).await?.item_ids();
        self.store_favorites(&creds.handle, &ids).await?;
        Ok(ids)
    }

    async fn store_favorites(&self, handle: &str, ids: &[String]) -> Result<(), AuthError> {
        self.vault
            .update(handle, |record| record.favorite_ids = ids.to_vec())
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryStore;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credentials() -> SessionCredentials {
        SessionCredentials {
            handle: "Player#EUW".into(),
            access_token: "a.b.c".into(),
            id_token: "d.e.f".into(),
            entitlements_token: "ent".into(),
            subject_id: "puuid-1".into(),
            region: "eu".into(),
            client_version: "release-09.00".into(),
        }
    }

    async fn player_data(server: &MockServer, signed_in: bool) -> (PlayerData, CredentialVault) {
        let store = Arc::new(MemoryStore::new());
        let vault = CredentialVault::new(store.clone());
        let slot = Arc::new(VolatileTokenSlot::new(store));
        if signed_in {
            slot.commit(credentials()).await.unwrap();
        }
        let client = GameClient::new_with_base_url(&server.uri()).unwrap();
        (PlayerData::new(client, slot, vault.clone()), vault)
    }

    #[tokio::test]
    async fn test_requires_active_account() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let (data, _) = player_data(&server, false).await;

        let result = data.storefront().await;
        assert!(matches!(result, Err(AuthError::MissingToken)));
    }

    #[tokio::test]
    async fn test_storefront() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/store/v3/storefront/puuid-1"))
            .and(header("X-Riot-Entitlements-JWT", "ent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "SkinsPanelLayout": {
                    "SingleItemOffers": ["s1", "s2", "s3", "s4"],
                    "SingleItemOffersRemainingDurationInSeconds": 3600
                }
            })))
            .mount(&server)
            .await;
        let (data, _) = player_data(&server, true).await;

        let store = data.storefront().await.unwrap();
        assert_eq!(store.skins_panel.single_item_offers.len(), 4);
        assert_eq!(store.skins_panel.remaining_secs, 3600);
        assert!(store.night_market.is_none());
    }

    #[tokio::test]
    async fn test_owned_skins() {
        let server = MockServer::start().await;
        let url = format!("/store/v1/entitlements/puuid-1/{}", SKIN_ITEM_TYPE_ID);
        Mock::given(method("GET"))
            .and(path(url.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ItemTypeID": SKIN_ITEM_TYPE_ID,
                "Entitlements": [{"TypeID": "x", "ItemID": "skin-1"}]
            })))
            .mount(&server)
            .await;
        let (data, _) = player_data(&server, true).await;

        let owned = data.owned_items(SKIN_ITEM_TYPE_ID).await.unwrap();
        assert_eq!(owned.entitlements[0].item_id, "skin-1");
    }

    #[tokio::test]
    async fn test_add_favorite_updates_vault() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/favorites/v1/players/puuid-1/favorites"))
            .and(body_json(json!({"ItemID": "skin-1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "FavoritedContent": {"f1": {"FavoriteID": "f1", "ItemID": "skin-1"}}
            })))
            .mount(&server)
            .await;
        let (data, vault) = player_data(&server, true).await;

        let ids = data.add_favorite("skin-1").await.unwrap();

        assert_eq!(ids, vec!["skin-1"]);
        let record = vault.get_record("Player#EUW").await.unwrap().unwrap();
        assert_eq!(record.favorite_ids, vec!["skin-1"]);
    }

    #[tokio::test]
    async fn test_equip_skin_puts_updated_loadout() {
        let server = MockServer::start().await;
        let loadout_path = "/personalization/v2/players/puuid-1/playerloadout";
        Mock::given(method("GET"))
            .and(path(loadout_path))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Subject": "puuid-1",
                "Version": 12,
                "Guns": [
                    {"ID": "vandal", "SkinID": "old", "SkinLevelID": "old-l", "ChromaID": "old-c",
                     "Attachments": [{"ID": "a"}]},
                    {"ID": "phantom", "SkinID": "p", "SkinLevelID": "pl", "ChromaID": "pc", "Attachments": []}
                ],
                "Sprays": [],
                "Identity": {"PlayerCardID": "card"},
                "Incognito": false
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path(loadout_path))
            .and(header("X-Riot-Entitlements-JWT", "ent"))
            .and(body_json(json!({
                "Guns": [
                    {"ID": "vandal", "SkinID": "new", "SkinLevelID": "new-l", "ChromaID": "new-c",
                     "Attachments": []},
                    {"ID": "phantom", "SkinID": "p", "SkinLevelID": "pl", "ChromaID": "pc", "Attachments": []}
                ],
                "Sprays": [],
                "Identity": {"PlayerCardID": "card"},
                "Incognito": false
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Subject": "puuid-1",
                "Version": 13,
                "Guns": [
                    {"ID": "vandal", "SkinID": "new", "SkinLevelID": "new-l", "ChromaID": "new-c"}
                ],
                "Identity": {},
                "Incognito": false
            })))
            .expect(1)
            .mount(&server)
            .await;
        let (data, _) = player_data(&server, true).await;

        let loadout = data.equip_skin("vandal", "new", "new-l", "new-c").await.unwrap();

        assert_eq!(loadout.guns[0].skin_id, "new");
    }

    #[tokio::test]
    async fn test_equip_skin_requires_active_account() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let (data, _) = player_data(&server, false).await;

        let result = data.equip_skin("vandal", "s", "l", "c").await;
        assert!(matches!(result, Err(AuthError::MissingToken)));
    }
}
