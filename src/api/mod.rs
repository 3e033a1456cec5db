//! Remote game services
//!
//! - `client`: typed HTTP calls with deadlines and error classification
//! - `bootstrap`: the ordered post-login call chain
//! - `player`: data-fetch operations for the active account

mod bootstrap;
mod client;
mod player;
pub mod types;

pub use bootstrap::{BootstrapReport, BootstrapSequencer};
pub use client::{GameClient, LoginReplay, PlayerIdentity};
pub use player::{PlayerData, PLAYER_CARD_ITEM_TYPE_ID, SKIN_ITEM_TYPE_ID};

#[cfg(test)]
pub(crate) use bootstrap::test_support;
