//! Game State Definitions
//!
//! The session state is a sum type: fields that only make sense while
//! playing (score, clock, target, combo, effects) exist only inside
//! [`GameState::Playing`], so a Ready or GameOver state can never carry a
//! stale score.

use serde::{Serialize, Deserialize};

use crate::core::geometry::clamp_unit;

/// Milliseconds of logical engine time.
pub type Millis = u64;

// =============================================================================
// SESSION STATE
// =============================================================================

/// Lifecycle of a session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[derive(Default)]
pub enum GameState {
    /// Waiting for a start command.
    #[default]
    Ready,
    /// Session in progress.
    Playing(PlayingState),
    /// Session finished and progression recorded.
    GameOver(GameOverState),
}

impl GameState {
    /// Is a session in progress?
    #[inline]
    pub fn is_playing(&self) -> bool {
        matches!(self, GameState::Playing(_))
    }

    /// Borrow the playing state, if any.
    pub fn playing(&self) -> Option<&PlayingState> {
        match self {
            GameState::Playing(p) => Some(p),
            GameState::Ready | GameState::GameOver(_) => None,
        }
    }

    /// Mutably borrow the playing state, if any.
    pub fn playing_mut(&mut self) -> Option<&mut PlayingState> {
        match self {
            GameState::Playing(p) => Some(p),
            GameState::Ready | GameState::GameOver(_) => None,
        }
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            GameState::Ready => "ready",
            GameState::Playing(_) => "playing",
            GameState::GameOver(_) => "game_over",
        }
    }
}

/// Result shown after the clock runs out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameOverState {
    /// Score of the finished session
    pub final_score: u32,
    /// Best score ever, including this session
    pub high_score: u32,
}

/// Everything that changes while a session is running.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayingState {
    /// Accumulated score
    pub score: u32,
    /// Seconds left on the clock
    pub time_left: f32,
    /// Current target
    pub target: Target,
    /// Consecutive-hit tracking
    pub combo: Combo,
    /// Timed power-up effects
    pub effects: Effects,
}

impl PlayingState {
    /// Fresh session state.
    pub fn new(time_left: f32, target: Target, now: Millis) -> Self {
        Self {
            score: 0,
            time_left,
            target,
            combo: Combo {
                count: 0,
                last_tap_at: now,
            },
            effects: Effects::default(),
        }
    }
}

// =============================================================================
// TARGET
// =============================================================================

/// The primary tappable circle.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Target {
    /// Normalized X in [0, 1]
    pub x: f32,
    /// Normalized Y in [0, 1]
    pub y: f32,
    /// Radius in pixels
    pub radius: f32,
}

impl Target {
    /// Create a target, clamping the position into the field.
    pub fn new(x: f32, y: f32, radius: f32) -> Self {
        Self {
            x: clamp_unit(x),
            y: clamp_unit(y),
            radius,
        }
    }
}

// =============================================================================
// COMBO
// =============================================================================

/// Consecutive target hits inside the combo window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Combo {
    /// Current streak length
    pub count: u32,
    /// Time of the last scoring tap (or power-up pickup)
    pub last_tap_at: Millis,
}

// =============================================================================
// EFFECTS
// =============================================================================

/// Timed effects a power-up can switch on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectKind {
    /// Target hits score double
    ScoreMultiplier,
    /// Clock stops counting down
    TimeFreeze,
    /// Chicken stops moving
    ChickenStop,
}

impl EffectKind {
    /// All effect kinds, in a fixed order.
    pub const ALL: [EffectKind; 3] = [
        EffectKind::ScoreMultiplier,
        EffectKind::TimeFreeze,
        EffectKind::ChickenStop,
    ];
}

/// One timed effect slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Effect {
    /// Is the effect on?
    pub active: bool,
    /// When the effect stops applying
    pub end_at: Millis,
}

/// All timed effect slots of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Effects {
    /// Double score
    pub score_multiplier: Effect,
    /// Frozen clock
    pub time_freeze: Effect,
    /// Frozen chicken
    pub chicken_stop: Effect,
}

impl Effects {
    /// Borrow one slot.
    pub fn get(&self, kind: EffectKind) -> &Effect {
        match kind {
            EffectKind::ScoreMultiplier => &self.score_multiplier,
            EffectKind::TimeFreeze => &self.time_freeze,
            EffectKind::ChickenStop => &self.chicken_stop,
        }
    }

    /// Mutably borrow one slot.
    pub fn get_mut(&mut self, kind: EffectKind) -> &mut Effect {
        match kind {
            EffectKind::ScoreMultiplier => &mut self.score_multiplier,
            EffectKind::TimeFreeze => &mut self.time_freeze,
            EffectKind::ChickenStop => &mut self.chicken_stop,
        }
    }

    /// Is an effect currently switched on?
    #[inline]
    pub fn is_active(&self, kind: EffectKind) -> bool {
        self.get(kind).active
    }

    /// Switch an effect on until `end_at`.
    pub fn activate(&mut self, kind: EffectKind, end_at: Millis) {
        *self.get_mut(kind) = Effect { active: true, end_at };
    }

    /// Clear every active effect whose end time has passed.
    ///
    /// Returns the kinds that were cleared.
    pub fn expire(&mut self, now: Millis) -> Vec<EffectKind> {
        let mut expired = Vec::new();
        for kind in EffectKind::ALL {
            let slot = self.get_mut(kind);
            if slot.active && now > slot.end_at {
                slot.active = false;
                expired.push(kind);
            }
        }
        expired
    }
}

// =============================================================================
// TESTS
// =============================================================================
