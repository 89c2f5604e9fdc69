//! Persistence Layer
//!
//! A narrow key-value port shared by the session engine and the shop.
//! Nothing reaches storage except through a [`PersistenceGateway`] handed in
//! by the caller.
//!
//! Implementations must answer `get_*`/`set_*` from memory: they are called
//! while the simulation lock is held. Durable writes belong in
//! [`PersistenceGateway::flush`], which the engine runs on the blocking pool.

use std::collections::BTreeSet;

pub mod file;
pub mod memory;
pub mod progression;

pub use file::JsonFileStore;
pub use memory::MemoryStore;
pub use progression::{Progression, SessionRecord};

/// Best score ever achieved.
pub const HIGH_SCORE_KEY: &str = "high_score";
/// Coin balance.
pub const COIN_KEY: &str = "coin";
/// Skin shown on the chicken.
pub const SELECTED_SKIN_KEY: &str = "selected_skin";
/// Skins the player has bought.
pub const OWNED_SKINS_KEY: &str = "owned_skins";
/// Skin everyone owns.
pub const DEFAULT_SKIN: &str = "default";

/// Persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// Storage I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored data could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A key holds a value of another type.
    #[error("Key {key} does not hold {expected}")]
    TypeMismatch {
        /// Key that was read
        key: String,
        /// Type the caller asked for
        expected: &'static str,
    },

    /// Storage cannot be reached at all.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Key-value storage port.
pub trait PersistenceGateway: Send + Sync {
    /// Read an integer, or `default` if the key is absent.
    fn get_int(&self, key: &str, default: i64) -> Result<i64, PersistenceError>;

    /// Store an integer.
    fn set_int(&self, key: &str, value: i64) -> Result<(), PersistenceError>;

    /// Read a string, or `default` if the key is absent.
    fn get_string(&self, key: &str, default: &str) -> Result<String, PersistenceError>;

    /// Store a string.
    fn set_string(&self, key: &str, value: &str) -> Result<(), PersistenceError>;

    /// Read a string set, or `default` if the key is absent.
    fn get_string_set(
        &self,
        key: &str,
        default: &BTreeSet<String>,
    ) -> Result<BTreeSet<String>, PersistenceError>;

    /// Store a string set.
    fn set_string_set(&self, key: &str, value: &BTreeSet<String>) -> Result<(), PersistenceError>;

    /// Make previous writes durable. May block.
    fn flush(&self) -> Result<(), PersistenceError> {
        Ok(())
    }
}
