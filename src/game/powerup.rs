//! Power-Up Spawning, Expiry and Activation
//!
//! At most one power-up is on the field at a time. Types are dealt from a
//! shuffled bag holding one of each, so all four appear before any repeats.

use serde::{Serialize, Deserialize};

use crate::core::geometry::{clamp_unit, Point, Viewport};
use crate::core::rng::DeterministicRng;
use crate::game::rules::PowerUpConfig;
use crate::game::state::{EffectKind, Millis};

/// Kind of power-up.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum PowerUpType {
    /// Stops the clock for a while
    TimeFreeze = 0,
    /// Doubles target points for a while
    ScoreMultiplier = 1,
    /// Stops the chicken for a while
    ChickenStop = 2,
    /// Moves the target immediately
    TargetRefresh = 3,
}

impl PowerUpType {
    /// Every power-up type.
    pub const ALL: [PowerUpType; 4] = [
        PowerUpType::TimeFreeze,
        PowerUpType::ScoreMultiplier,
        PowerUpType::ChickenStop,
        PowerUpType::TargetRefresh,
    ];

    /// The timed effect this power-up switches on, and for how long.
    ///
    /// `None` for instant power-ups.
    pub fn timed_effect(self, config: &PowerUpConfig) -> Option<(EffectKind, Millis)> {
        match self {
            PowerUpType::TimeFreeze => Some((EffectKind::TimeFreeze, config.time_freeze_ms)),
            PowerUpType::ScoreMultiplier => {
                Some((EffectKind::ScoreMultiplier, config.score_multiplier_ms))
            }
            PowerUpType::ChickenStop => Some((EffectKind::ChickenStop, config.chicken_stop_ms)),
            PowerUpType::TargetRefresh => None,
        }
    }
}

/// A power-up on the field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PowerUp {
    /// Unique, monotonic across the engine lifetime
    pub id: u64,
    /// Normalized X in [0, 1]
    pub x: f32,
    /// Normalized Y in [0, 1]
    pub y: f32,
    /// Radius in pixels
    pub radius: f32,
    /// Kind of power-up
    pub power_up_type: PowerUpType,
    /// When it appeared
    pub spawned_at: Millis,
}

impl PowerUp {
    /// Has this power-up been on screen longer than `display_ms`?
    #[inline]
    pub fn is_expired(&self, now: Millis, display_ms: Millis) -> bool {
        now.saturating_sub(self.spawned_at) > display_ms
    }

    /// Did a tap at `point` land on this power-up?
    #[inline]
    pub fn is_hit(&self, point: Point, viewport: Viewport, hit_slop: f32) -> bool {
        viewport.within(point, self.x, self.y, self.radius + hit_slop)
    }
}

/// Shuffled bag of power-up types.
#[derive(Clone, Debug, Default)]
pub struct TypeBag {
    remaining: Vec<PowerUpType>,
}

impl TypeBag {
    /// Deal the next type, refilling and reshuffling once the bag is empty.
    pub fn draw(&mut self, rng: &mut DeterministicRng) -> PowerUpType {
        if self.remaining.is_empty() {
            self.remaining.extend_from_slice(&PowerUpType::ALL);
            rng.shuffle(&mut self.remaining);
        }
        // Refilled above, never empty here
        self.remaining.pop().unwrap_or(PowerUpType::TimeFreeze)
    }

    /// Forget the current deal.
    pub fn clear(&mut self) {
        self.remaining.clear();
    }
}

/// The single power-up slot plus its id counter and type bag.
#[derive(Clone, Debug, Default)]
pub struct PowerUpField {
    live: Option<PowerUp>,
    next_id: u64,
    bag: TypeBag,
}

impl PowerUpField {
    /// Create an empty field.
    pub fn new() -> Self {
        Self::default()
    }

    /// The live power-up, if any.
    pub fn live(&self) -> Option<&PowerUp> {
        self.live.as_ref()
    }

    /// Snapshot for observers.
    pub fn snapshot(&self) -> Vec<PowerUp> {
        self.live.iter().cloned().collect()
    }

    /// Spawn a power-up if the slot is empty.
    ///
    /// Returns the new power-up, if one was spawned.
    pub fn spawn_if_empty(
        &mut self,
        rng: &mut DeterministicRng,
        config: &PowerUpConfig,
        now: Millis,
    ) -> Option<&PowerUp> {
        if self.live.is_some() {
            return None;
        }

        let power_up_type = self.bag.draw(rng);
        let x = clamp_unit(rng.next_unit());
        let y = clamp_unit(rng.next_unit());
        let id = self.next_id;
        self.next_id += 1;

        self.live = Some(PowerUp {
            id,
            x,
            y,
            radius: config.radius,
            power_up_type,
            spawned_at: now,
        });
        self.live.as_ref()
    }

    /// Remove the live power-up if it has outstayed its display time.
    pub fn expire(&mut self, now: Millis, display_ms: Millis) -> Option<PowerUp> {
        if self.live.as_ref().is_some_and(|p| p.is_expired(now, display_ms)) {
            return self.live.take();
        }
        None
    }

    /// Take the live power-up if the tap landed on it.
    pub fn take_hit(&mut self, point: Point, viewport: Viewport, hit_slop: f32) -> Option<PowerUp> {
        if self.live.as_ref().is_some_and(|p| p.is_hit(point, viewport, hit_slop)) {
            return self.live.take();
        }
        None
    }

    /// Drop the live power-up and start a fresh type deal.
    ///
    /// The id counter keeps counting so ids stay unique across sessions.
    pub fn clear(&mut self) {
        self.live = None;
        self.bag.clear();
    }
}

// =============================================================================
// TESTS
// =============================================================================
