//! Game Events
//!
//! Informational record of what happened during a session. Events never
//! drive state; the engine logs them and fans them out to subscribers.

use serde::{Serialize, Deserialize};
use uuid::Uuid;

use crate::game::powerup::PowerUpType;
use crate::game::state::{EffectKind, Millis};

/// Game event data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum GameEventData {
    /// A session began
    SessionStarted {
        /// Fresh id of the session
        session_id: Uuid,
    },

    /// A tap scored on the target
    TargetHit {
        /// Combo after the hit
        combo: u32,
        /// Points awarded
        points: u32,
        /// Score after the hit
        score: u32,
    },

    /// A tap hit nothing
    TapMissed,

    /// A power-up appeared
    PowerUpSpawned {
        /// Power-up id
        id: u64,
        /// Kind of power-up
        power_up_type: PowerUpType,
    },

    /// A power-up was tapped
    PowerUpConsumed {
        /// Power-up id
        id: u64,
        /// Kind of power-up
        power_up_type: PowerUpType,
    },

    /// A power-up left unconsumed
    PowerUpExpired {
        /// Power-up id
        id: u64,
    },

    /// A timed effect ran out
    EffectExpired {
        /// Effect that ended
        effect: EffectKind,
    },

    /// The chicken was tapped and started raging
    ChickenEnraged,

    /// The chicken's rage ran out
    ChickenCalmed,

    /// The clock ran out
    SessionEnded {
        /// Score of the session
        final_score: u32,
        /// High score after the session
        high_score: u32,
        /// Coins paid out
        coins_earned: u32,
    },

    /// The session was abandoned
    SessionReset,
}

/// A game event with its timestamp.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    /// When the event occurred
    pub at: Millis,

    /// Event data
    pub data: GameEventData,
}

impl GameEvent {
    /// Create a new event.
    pub fn new(at: Millis, data: GameEventData) -> Self {
        Self { at, data }
    }

    /// Create target hit event.
    pub fn target_hit(at: Millis, combo: u32, points: u32, score: u32) -> Self {
        Self::new(at, GameEventData::TargetHit { combo, points, score })
    }

    /// Create power-up spawned event.
    pub fn power_up_spawned(at: Millis, id: u64, power_up_type: PowerUpType) -> Self {
        Self::new(at, GameEventData::PowerUpSpawned { id, power_up_type })
    }

    /// Create power-up consumed event.
    pub fn power_up_consumed(at: Millis, id: u64, power_up_type: PowerUpType) -> Self {
        Self::new(at, GameEventData::PowerUpConsumed { id, power_up_type })
    }

    /// Create session ended event.
    pub fn session_ended(at: Millis, final_score: u32, high_score: u32, coins_earned: u32) -> Self {
        Self::new(
            at,
            GameEventData::SessionEnded {
                final_score,
                high_score,
                coins_earned,
            },
        )
    }

    /// Is this one of the per-tap events that fire many times a second?
    pub fn is_chatty(&self) -> bool {
        matches!(
            self.data,
            GameEventData::TargetHit { .. } | GameEventData::TapMissed
        )
    }
}
