//! Skin Shop
//!
//! Buying and selecting chicken skins with the coins earned in sessions.
//! Works over the same [`Progression`] as the engine, so a skin selected
//! here shows up on the chicken at the next session start.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{info, warn};

use crate::persistence::{PersistenceError, Progression, DEFAULT_SKIN};

/// A purchasable skin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SkinDef {
    /// Stable identifier, as persisted
    pub id: &'static str,
    /// Display name
    pub name: &'static str,
    /// Price in coins
    pub price: u32,
}

/// Every skin on sale, default first.
pub const SKINS: [SkinDef; 3] = [
    SkinDef { id: DEFAULT_SKIN, name: "Default", price: 0 },
    SkinDef { id: "gold", name: "Gold", price: 100 },
    SkinDef { id: "ninja", name: "Ninja", price: 200 },
];

/// Look a skin up by id.
pub fn find_skin(id: &str) -> Option<&'static SkinDef> {
    SKINS.iter().find(|s| s.id == id)
}

/// Look a skin up by id, falling back to the default skin.
pub fn resolve_skin(id: &str) -> &'static SkinDef {
    find_skin(id).unwrap_or(&SKINS[0])
}

/// Shop errors.
#[derive(Debug, thiserror::Error)]
pub enum ShopError {
    /// No skin has this id.
    #[error("Unknown skin: {0}")]
    UnknownSkin(String),

    /// The skin is already owned.
    #[error("Skin already owned: {0}")]
    AlreadyOwned(String),

    /// The skin must be bought first.
    #[error("Skin not owned: {0}")]
    NotOwned(String),

    /// Not enough coins.
    #[error("Need {price} coins, have {coins}")]
    InsufficientCoins {
        /// Skin price
        price: u32,
        /// Current balance
        coins: u32,
    },

    /// Storage failed.
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

/// One row of the shop screen.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SkinListing {
    /// The skin
    pub skin: SkinDef,
    /// Does the player own it?
    pub owned: bool,
    /// Is it on the chicken?
    pub selected: bool,
}

/// Everything the shop screen shows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ShopSnapshot {
    /// Coin balance
    pub coins: u32,
    /// Every skin with its status
    pub skins: Vec<SkinListing>,
}

/// Skin shop over the player's progression.
#[derive(Clone, Debug)]
pub struct Shop {
    progression: Progression,
}

impl Shop {
    /// Create a shop.
    pub fn new(progression: Progression) -> Self {
        Self { progression }
    }

    /// Current balance and every skin's status.
    pub fn listings(&self) -> ShopSnapshot {
        let owned: BTreeSet<String> = self.progression.owned_skins();
        let selected = resolve_skin(&self.progression.selected_skin()).id;

        ShopSnapshot {
            coins: self.progression.coins(),
            skins: SKINS
                .iter()
                .map(|skin| SkinListing {
                    skin: *skin,
                    owned: owned.contains(skin.id),
                    selected: skin.id == selected,
                })
                .collect(),
        }
    }

    /// Buy a skin. Returns the remaining balance.
    ///
    /// The whole purchase runs under the coin lock. The skin is recorded
    /// first and taken back if the coins cannot be charged, so a failed
    /// buy leaves both the balance and the owned set as they were.
    pub fn buy(&self, id: &str) -> Result<u32, ShopError> {
        let skin = find_skin(id).ok_or_else(|| ShopError::UnknownSkin(id.to_string()))?;
        let _coins = self.progression.lock_coins();

        let owned = self.progression.owned_skins();
        if owned.contains(skin.id) {
            return Err(ShopError::AlreadyOwned(id.to_string()));
        }

        let coins = self.progression.coins();
        if coins < skin.price {
            return Err(ShopError::InsufficientCoins { price: skin.price, coins });
        }

        let mut with_skin = owned.clone();
        with_skin.insert(skin.id.to_string());
        self.progression.set_owned_skins(&with_skin)?;

        let remaining = coins - skin.price;
        if let Err(e) = self.progression.set_coins(remaining) {
            if let Err(undo) = self.progression.set_owned_skins(&owned) {
                warn!(skin = skin.id, error = %undo, "Failed to take back unpaid skin");
            }
            return Err(e.into());
        }

        info!(skin = skin.id, price = skin.price, remaining, "Skin bought");
        Ok(remaining)
    }

    /// Put an owned skin on the chicken.
    pub fn select(&self, id: &str) -> Result<(), ShopError> {
        let skin = find_skin(id).ok_or_else(|| ShopError::UnknownSkin(id.to_string()))?;
        if !self.progression.owned_skins().contains(skin.id) {
            return Err(ShopError::NotOwned(id.to_string()));
        }
        self.progression.set_selected_skin(skin.id)?;
        info!(skin = skin.id, "Skin selected");
        Ok(())
    }

    /// Make purchases durable. May block.
    pub fn flush(&self) -> Result<(), ShopError> {
        Ok(self.progression.flush()?)
    }
}
