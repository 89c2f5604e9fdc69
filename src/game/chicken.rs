//! Chicken Actor
//!
//! A bouncing decoy with its own velocity. Tapping it breaks the combo and
//! sends it into a rage: velocity is scaled up once, and the rage flag
//! clears after a fixed duration. Speed is deliberately *not* scaled back
//! when the rage ends, so every rage leaves the chicken a little faster.

use serde::{Serialize, Deserialize};

use crate::core::geometry::{clamp_unit, Point, Viewport};
use crate::core::rng::DeterministicRng;
use crate::game::rules::ChickenConfig;
use crate::game::state::Millis;

/// Velocity in normalized units per movement tick.
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct Velocity {
    /// Horizontal component
    pub vx: f32,
    /// Vertical component
    pub vy: f32,
}

/// Rage status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rage {
    /// Is the chicken raging?
    pub active: bool,
    /// When the rage ends
    pub end_at: Millis,
}

/// State of the chicken actor. Lives for the whole engine lifetime.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChickenState {
    /// Normalized X in [0, 1]
    pub x: f32,
    /// Normalized Y in [0, 1]
    pub y: f32,
    /// Diameter in density-independent pixels
    pub size: f32,
    /// Current velocity
    pub velocity: Velocity,
    /// Heading in degrees, for display
    pub rotation: f32,
    /// Rage status
    pub rage: Rage,
    /// Can the chicken be seen (and tapped)?
    pub visible: bool,
    /// Resolved skin identifier
    pub skin_id: String,
}

impl ChickenState {
    /// Spawn the chicken at the center of the field.
    pub fn new(config: &ChickenConfig, skin_id: impl Into<String>) -> Self {
        let (vx, vy) = config.initial_velocity;
        Self {
            x: 0.5,
            y: 0.5,
            size: config.size,
            velocity: Velocity { vx, vy },
            rotation: 0.0,
            rage: Rage::default(),
            visible: true,
            skin_id: skin_id.into(),
        }
    }

    /// Advance one movement tick.
    ///
    /// Crossing an edge reflects that axis with a random damping factor;
    /// the position is then clamped back inside the field.
    pub fn step(&mut self, rng: &mut DeterministicRng, config: &ChickenConfig) {
        let (min_bounce, max_bounce) = config.bounce_factor;

        let next_x = self.x + self.velocity.vx;
        let next_y = self.y + self.velocity.vy;

        if !(0.0..=1.0).contains(&next_x) {
            self.velocity.vx = -self.velocity.vx * rng.next_range(min_bounce, max_bounce);
        }
        if !(0.0..=1.0).contains(&next_y) {
            self.velocity.vy = -self.velocity.vy * rng.next_range(min_bounce, max_bounce);
        }

        self.x = clamp_unit(next_x);
        self.y = clamp_unit(next_y);
        self.rotation = self.velocity.vy.atan2(self.velocity.vx).to_degrees();
    }

    /// Start raging if not already.
    ///
    /// Returns true if rage started.
    pub fn enrage(&mut self, now: Millis, config: &ChickenConfig) -> bool {
        if self.rage.active {
            return false;
        }
        self.velocity.vx *= config.rage_speed_multiplier;
        self.velocity.vy *= config.rage_speed_multiplier;
        self.rage = Rage {
            active: true,
            end_at: now.saturating_add(config.rage_duration_ms),
        };
        true
    }

    /// Clear the rage flag once it has run out.
    ///
    /// Returns true if rage ended on this call.
    pub fn calm_if_expired(&mut self, now: Millis) -> bool {
        if self.rage.active && now > self.rage.end_at {
            self.rage.active = false;
            return true;
        }
        false
    }

    /// Did a tap at `point` land on the chicken?
    pub fn is_hit(&self, point: Point, viewport: Viewport, density: f32) -> bool {
        if !self.visible {
            return false;
        }
        viewport.within(point, self.x, self.y, self.size * density / 2.0)
    }
}

// =============================================================================
// TESTS
// =============================================================================
