//! Wire types for the identity provider and game services

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Currency id of Valorant Points in wallet responses
pub const VALORANT_POINTS_ID: &str = "85ad13f7-3d1b-5128-9eb2-7cd8ee0b5741";
/// Currency id of Radianite Points
pub const RADIANITE_POINTS_ID: &str = "e59aa87c-4cbf-517a-5983-6e81511be9b7";
/// Currency id of Kingdom Credits
pub const KINGDOM_CREDITS_ID: &str = "85ca954a-41f2-ce94-9b45-8ca3dd39a00d";

/// Entitlements exchange response
#[derive(Debug, Deserialize)]
pub(crate) struct EntitlementsResponse {
    pub entitlements_token: Option<String>,
}

/// `/userinfo` response
#[derive(Debug, Deserialize)]
pub(crate) struct UserInfoResponse {
    pub sub: Option<String>,
    pub acct: Option<UserInfoAccount>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserInfoAccount {
    pub game_name: Option<String>,
    pub tag_line: Option<String>,
}

/// Regional affinity response
#[derive(Debug, Deserialize)]
pub(crate) struct GeoResponse {
    pub affinities: Option<GeoAffinities>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GeoAffinities {
    pub live: Option<String>,
}

/// Public content API version response
#[derive(Debug, Deserialize)]
pub(crate) struct VersionResponse {
    pub data: Option<VersionData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VersionData {
    pub riot_client_version: Option<String>,
}

/// Wallet response: currency id -> amount
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct WalletResponse {
    #[serde(default)]
    pub balances: HashMap<String, u64>,
}

/// Account XP response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct AccountXpResponse {
    pub progress: Option<AccountProgress>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AccountProgress {
    #[serde(rename = "Level")]
    pub level: u32,
    #[serde(rename = "XP")]
    pub xp: u32,
}

/// Player identity identifiers from the loadout
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadoutIdentity {
    #[serde(rename = "PlayerCardID", default, skip_serializing_if = "Option::is_none")]
    pub player_card_id: Option<String>,
    #[serde(rename = "PlayerTitleID", default, skip_serializing_if = "Option::is_none")]
    pub player_title_id: Option<String>,
    #[serde(rename = "AccountLevel", default, skip_serializing_if = "Option::is_none")]
    pub account_level: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One equipped weapon in the loadout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadoutGun {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "SkinID")]
    pub skin_id: String,
    #[serde(rename = "SkinLevelID")]
    pub skin_level_id: String,
    #[serde(rename = "ChromaID")]
    pub chroma_id: String,
    /// Attachments, charms and anything else the service sends
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Player loadout
///
/// Fields this crate does not model (sprays, attachments) are kept in
/// `extra` so that writing a loadout back does not drop them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerLoadout {
    #[serde(rename = "Guns", default)]
    pub guns: Vec<LoadoutGun>,
    #[serde(rename = "Identity", default)]
    pub identity: LoadoutIdentity,
    #[serde(rename = "Incognito", default)]
    pub incognito: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PlayerLoadout {
    /// Puts a skin on the gun `gun_id`, clearing its attachments
    ///
    /// Returns `false` if the loadout has no such gun.
    pub fn equip_skin(&mut self, gun_id: &str, skin_id: &str, level_id: &str, chroma_id: &str) -> bool {
        let Some(gun) = self.guns.iter_mut().find(|gun| gun.id == gun_id) else {
            return false;
        };

        gun.skin_id = skin_id.to_string();
        gun.skin_level_id = level_id.to_string();
        gun.chroma_id = chroma_id.to_string();
        gun.extra = Map::from_iter([("Attachments".to_string(), Value::Array(Vec::new()))]);
        true
    }

    /// Body for the loadout PUT, which rejects the read-only `Subject` and `Version`
    pub fn update_body(&self) -> Self {
        let mut body = self.clone();
        body.extra.remove("Subject");
        body.extra.remove("Version");
        body
    }
}

/// Favorites response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FavoritesResponse {
    #[serde(rename = "FavoritedContent", default)]
    pub favorited_content: HashMap<String, FavoriteEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FavoriteEntry {
    #[serde(rename = "ItemID")]
    pub item_id: String,
}

impl FavoritesResponse {
    /// Favorited item ids, sorted
    pub fn item_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .favorited_content
            .values()
            .map(|entry| entry.item_id.clone())
            .collect();
        ids.sort();
        ids
    }
}

/// Daily skin offers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkinsPanel {
    #[serde(rename = "SingleItemOffers", default)]
    pub single_item_offers: Vec<String>,
    #[serde(rename = "SingleItemOffersRemainingDurationInSeconds", default)]
    pub remaining_secs: u64,
}

/// Storefront, with bundle and night market payloads left to the UI
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Storefront {
    #[serde(rename = "SkinsPanelLayout", default)]
    pub skins_panel: SkinsPanel,
    #[serde(rename = "FeaturedBundle", default)]
    pub featured_bundle: Option<serde_json::Value>,
    #[serde(rename = "BonusStore", default)]
    pub night_market: Option<serde_json::Value>,
    #[serde(rename = "AccessoryStore", default)]
    pub accessory_store: Option<serde_json::Value>,
}

/// Items of one type owned by the player
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OwnedItems {
    #[serde(rename = "ItemTypeID", default)]
    pub item_type_id: String,
    #[serde(rename = "Entitlements", default)]
    pub entitlements: Vec<OwnedEntitlement>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwnedEntitlement {
    #[serde(rename = "ItemID")]
    pub item_id: String,
}

/// Client platform descriptor sent base64-encoded in `X-Riot-ClientPlatform`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientPlatform {
    pub platform_type: &'static str,
    #[serde(rename = "platformOS")]
    pub platform_os: &'static str,
    #[serde(rename = "platformOSVersion")]
    pub platform_os_version: &'static str,
    pub platform_chipset: &'static str,
}

impl Default for ClientPlatform {
    fn default() -> Self {
        Self {
            platform_type: "PC",
            platform_os: "Windows",
            platform_os_version: "10.0.19042.1.256.64bit",
            platform_chipset: "Unknown",
        }
    }
}

impl ClientPlatform {
    /// Header value: base64 of the JSON descriptor
    pub fn header_value(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_default();
        STANDARD.encode(json)
    }
}

/// Parses the rank service's plain-text answer, e.g. `"Gold 2 - 45RR."`
pub(crate) fn parse_rank(text: &str) -> Option<(String, Option<u32>)> {
    let text = text.trim();
    let (rank, rest) = match text.split_once(" - ") {
        Some((rank, rest)) => (rank.trim(), Some(rest)),
        None => (text, None),
    };
    if rank.is_empty() {
        return None;
    }

    let rr = rest
        .and_then(|r| r.split("RR").next())
        .and_then(|r| r.trim().parse::<u32>().ok());
    Some((rank.to_string(), rr))
}
