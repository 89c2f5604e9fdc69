//! Player Progression
//!
//! Typed view over the gateway keys. Reads never fail: a storage error is
//! logged and the default is used instead, so a broken store can degrade a
//! session but never abort one.
//!
//! Every clone shares one coin lock. A coin balance is only ever changed
//! while holding it, so a payout and a purchase cannot overwrite each other.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Serialize, Deserialize};
use tracing::warn;

use super::{
    PersistenceError, PersistenceGateway, COIN_KEY, DEFAULT_SKIN, HIGH_SCORE_KEY,
    OWNED_SKINS_KEY, SELECTED_SKIN_KEY,
};

/// Score needed per coin earned.
pub const SCORE_PER_COIN: u32 = 10;

/// What a finished session did to the player's progression.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Score of the session
    pub final_score: u32,
    /// High score after the session
    pub high_score: u32,
    /// Coins awarded for the session
    pub coins_earned: u32,
    /// Coin balance after the session
    pub coins_total: u32,
    /// Did the session beat the previous high score?
    pub new_record: bool,
}

/// Shared handle to the player's stored progression.
#[derive(Clone)]
pub struct Progression {
    store: Arc<dyn PersistenceGateway>,
    coin_lock: Arc<Mutex<()>>,
}

/// Held while a coin balance is read, checked and written back.
pub type CoinGuard<'a> = MutexGuard<'a, ()>;

impl std::fmt::Debug for Progression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Progression").finish_non_exhaustive()
    }
}

fn to_u32(v: i64) -> u32 {
    v.clamp(0, u32::MAX as i64) as u32
}

fn or_default<T>(key: &str, result: Result<T, PersistenceError>, default: T) -> T {
    result.unwrap_or_else(|e| {
        warn!(key, error = %e, "Progression read failed, using default");
        default
    })
}

fn default_owned() -> BTreeSet<String> {
    [DEFAULT_SKIN.to_string()].into()
}

impl Progression {
    /// Wrap a gateway.
    pub fn new(store: Arc<dyn PersistenceGateway>) -> Self {
        Self {
            store,
            coin_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Take the coin lock. Hold the guard across any read-modify-write of
    /// the balance.
    pub fn lock_coins(&self) -> CoinGuard<'_> {
        // The guarded data is (), so a poisoned lock is still usable
        self.coin_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The underlying gateway.
    pub fn store(&self) -> &Arc<dyn PersistenceGateway> {
        &self.store
    }

    /// Best score ever recorded.
    pub fn high_score(&self) -> u32 {
        to_u32(or_default(HIGH_SCORE_KEY, self.store.get_int(HIGH_SCORE_KEY, 0), 0))
    }

    /// Current coin balance.
    pub fn coins(&self) -> u32 {
        to_u32(or_default(COIN_KEY, self.store.get_int(COIN_KEY, 0), 0))
    }

    /// Skin the player picked.
    pub fn selected_skin(&self) -> String {
        or_default(
            SELECTED_SKIN_KEY,
            self.store.get_string(SELECTED_SKIN_KEY, DEFAULT_SKIN),
            DEFAULT_SKIN.to_string(),
        )
    }

    /// Skins the player owns. Always contains the default skin.
    pub fn owned_skins(&self) -> BTreeSet<String> {
        let mut owned = or_default(
            OWNED_SKINS_KEY,
            self.store.get_string_set(OWNED_SKINS_KEY, &default_owned()),
            default_owned(),
        );
        owned.insert(DEFAULT_SKIN.to_string());
        owned
    }

    /// Record a finished session: keep the best score and pay out coins.
    ///
    /// Write failures are logged; the returned record reflects what the
    /// session earned either way.
    pub fn record_session(&self, final_score: u32) -> SessionRecord {
        let previous_high = self.high_score();
        let high_score = previous_high.max(final_score);
        if let Err(e) = self.store.set_int(HIGH_SCORE_KEY, high_score as i64) {
            warn!(error = %e, high_score, "Failed to store high score");
        }

        let coins_earned = final_score / SCORE_PER_COIN;
        let coins_total = {
            let _coins = self.lock_coins();
            let total = self.coins().saturating_add(coins_earned);
            if let Err(e) = self.store.set_int(COIN_KEY, total as i64) {
                warn!(error = %e, coins_total = total, "Failed to store coins");
            }
            total
        };

        SessionRecord {
            final_score,
            high_score,
            coins_earned,
            coins_total,
            new_record: final_score > previous_high,
        }
    }

    /// Overwrite the coin balance. Callers deriving the new balance from
    /// the old one should hold [`lock_coins`](Self::lock_coins).
    pub fn set_coins(&self, coins: u32) -> Result<(), PersistenceError> {
        self.store.set_int(COIN_KEY, coins as i64)
    }

    /// Add a skin to the owned set.
    pub fn add_owned_skin(&self, skin_id: &str) -> Result<(), PersistenceError> {
        let mut owned = self.owned_skins();
        owned.insert(skin_id.to_string());
        self.set_owned_skins(&owned)
    }

    /// Overwrite the owned set.
    pub fn set_owned_skins(&self, owned: &BTreeSet<String>) -> Result<(), PersistenceError> {
        self.store.set_string_set(OWNED_SKINS_KEY, owned)
    }

    /// Persist the selected skin.
    pub fn set_selected_skin(&self, skin_id: &str) -> Result<(), PersistenceError> {
        self.store.set_string(SELECTED_SKIN_KEY, skin_id)
    }

    /// Make all writes durable. May block.
    pub fn flush(&self) -> Result<(), PersistenceError> {
        self.store.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;

    /// Store where every call fails.
    struct BrokenStore;

    impl PersistenceGateway for BrokenStore {
        fn get_int(&self, _: &str, _: i64) -> Result<i64, PersistenceError> {
            Err(PersistenceError::Unavailable("offline".into()))
        }
        fn set_int(&self, _: &str, _: i64) -> Result<(), PersistenceError> {
            Err(PersistenceError::Unavailable("offline".into()))
        }
        fn get_string(&self, _: &str, _: &str) -> Result<String, PersistenceError> {
            Err(PersistenceError::Unavailable("offline".into()))
        }
        fn set_string(&self, _: &str, _: &str) -> Result<(), PersistenceError> {
            Err(PersistenceError::Unavailable("offline".into()))
        }
        fn get_string_set(
            &self,
            _: &str,
            _: &BTreeSet<String>,
        ) -> Result<BTreeSet<String>, PersistenceError> {
            Err(PersistenceError::Unavailable("offline".into()))
        }
        fn set_string_set(&self, _: &str, _: &BTreeSet<String>) -> Result<(), PersistenceError> {
            Err(PersistenceError::Unavailable("offline".into()))
        }
    }

    fn memory() -> (Arc<MemoryStore>, Progression) {
        let store = Arc::new(MemoryStore::new());
        let progression = Progression::new(store.clone());
        (store, progression)
    }

    #[test]
    fn test_defaults() {
        let (_, p) = memory();
        assert_eq!(p.high_score(), 0);
        assert_eq!(p.coins(), 0);
        assert_eq!(p.selected_skin(), "default");
        assert_eq!(p.owned_skins(), default_owned());
    }

    #[test]
    fn test_record_new_high_score() {
        let (store, p) = memory();
        store.set_int(HIGH_SCORE_KEY, 20).unwrap();
        store.set_int(COIN_KEY, 5).unwrap();

        let record = p.record_session(37);
        assert_eq!(record.high_score, 37);
        assert_eq!(record.coins_earned, 3);
        assert_eq!(record.coins_total, 8);
        assert!(record.new_record);

        assert_eq!(store.get_int(HIGH_SCORE_KEY, 0).unwrap(), 37);
        assert_eq!(store.get_int(COIN_KEY, 0).unwrap(), 8);
    }

    #[test]
    fn test_record_keeps_better_high_score() {
        let (store, p) = memory();
        store.set_int(HIGH_SCORE_KEY, 50).unwrap();

        let record = p.record_session(9);
        assert_eq!(record.high_score, 50);
        assert_eq!(record.coins_earned, 0);
        assert!(!record.new_record);
        assert_eq!(store.get_int(HIGH_SCORE_KEY, 0).unwrap(), 50);
    }

    #[test]
    fn test_negative_values_clamp() {
        let (store, p) = memory();
        store.set_int(COIN_KEY, -40).unwrap();
        assert_eq!(p.coins(), 0);
    }

    #[test]
    fn test_broken_store_falls_back() {
        let p = Progression::new(Arc::new(BrokenStore));
        assert_eq!(p.high_score(), 0);
        assert_eq!(p.selected_skin(), "default");
        assert!(p.owned_skins().contains("default"));

        let record = p.record_session(25);
        assert_eq!(record.high_score, 25);
        assert_eq!(record.coins_earned, 2);
        assert!(p.set_coins(10).is_err());
    }

    #[test]
    fn test_owned_skins_always_include_default() {
        let (store, p) = memory();
        store
            .set_string_set(OWNED_SKINS_KEY, &["gold".to_string()].into())
            .unwrap();
        let owned = p.owned_skins();
        assert!(owned.contains("gold"));
        assert!(owned.contains("default"));

        p.add_owned_skin("ninja").unwrap();
        assert_eq!(p.owned_skins().len(), 3);
    }

    #[test]
    fn test_clones_share_coin_lock() {
        let (store, p) = memory();
        let other = p.clone();

        let guard = p.lock_coins();
        let payout = std::thread::spawn(move || other.record_session(50));
        std::thread::sleep(std::time::Duration::from_millis(50));
        assert_eq!(store.get_int(COIN_KEY, 0).unwrap(), 0);

        // Balance changed while the payout waits; it must build on this
        store.set_int(COIN_KEY, 10).unwrap();
        drop(guard);

        assert_eq!(payout.join().unwrap().coins_total, 15);
        assert_eq!(store.get_int(COIN_KEY, 0).unwrap(), 15);
    }
}
