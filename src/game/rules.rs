//! Gameplay Tuning
//!
//! Every timing and size constant of a session, grouped per subsystem.
//! Durations are milliseconds of logical engine time; sizes are pixels
//! unless noted otherwise.

use serde::{Serialize, Deserialize};

/// Session length in seconds.
pub const SESSION_SECONDS: f32 = 30.0;

/// Extra pixels of tolerance around every tappable circle.
pub const HIT_SLOP_PX: f32 = 15.0;

/// Maximum gap between target hits that keeps a combo alive.
pub const COMBO_WINDOW_MS: u64 = 1500;

/// Configuration for a whole session.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameRules {
    /// Countdown clock
    pub clock: ClockConfig,
    /// Target placement and scoring
    pub target: TargetConfig,
    /// Chicken actor
    pub chicken: ChickenConfig,
    /// Power-up manager
    pub power_up: PowerUpConfig,
}

/// Countdown clock configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Starting time in seconds
    pub session_seconds: f32,
    /// Clock tick period; each unfrozen tick removes this much time
    pub tick_ms: u64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            session_seconds: SESSION_SECONDS,
            tick_ms: 100,
        }
    }
}

/// Target configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Smallest target radius
    pub min_radius: f32,
    /// Largest target radius
    pub max_radius: f32,
    /// Hit tolerance added to the radius
    pub hit_slop: f32,
    /// Combo keep-alive window
    pub combo_window_ms: u64,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            min_radius: 30.0,
            max_radius: 70.0,
            hit_slop: HIT_SLOP_PX,
            combo_window_ms: COMBO_WINDOW_MS,
        }
    }
}

/// Chicken actor configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChickenConfig {
    /// Movement tick period (~60 Hz)
    pub tick_ms: u64,
    /// Diameter in density-independent pixels
    pub size: f32,
    /// Initial velocity, normalized units per tick
    pub initial_velocity: (f32, f32),
    /// Velocity multiplier applied once when rage starts
    pub rage_speed_multiplier: f32,
    /// Rage duration
    pub rage_duration_ms: u64,
    /// Bounce damping range (min, max)
    pub bounce_factor: (f32, f32),
}

impl Default for ChickenConfig {
    fn default() -> Self {
        Self {
            tick_ms: 16,
            size: 60.0,
            initial_velocity: (0.005, 0.005),
            rage_speed_multiplier: 1.5,
            rage_duration_ms: 5000,
            bounce_factor: (0.75, 1.25),
        }
    }
}

/// Power-up manager configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerUpConfig {
    /// Manager tick period
    pub tick_ms: u64,
    /// How long an untouched power-up stays on screen
    pub display_ms: u64,
    /// Power-up radius
    pub radius: f32,
    /// Hit tolerance added to the radius
    pub hit_slop: f32,
    /// TimeFreeze effect duration
    pub time_freeze_ms: u64,
    /// ScoreMultiplier effect duration
    pub score_multiplier_ms: u64,
    /// ChickenStop effect duration
    pub chicken_stop_ms: u64,
}

impl Default for PowerUpConfig {
    fn default() -> Self {
        Self {
            tick_ms: 7000,
            display_ms: 5000,
            radius: 40.0,
            hit_slop: HIT_SLOP_PX,
            time_freeze_ms: 5000,
            score_multiplier_ms: 5000,
            chicken_stop_ms: 3000,
        }
    }
}

impl GameRules {
    /// Check the rules describe a playable session.
    pub fn validate(&self) -> Result<(), String> {
        if self.clock.session_seconds.is_nan() || self.clock.session_seconds <= 0.0 {
            return Err("clock.session_seconds must be positive".into());
        }
        if self.clock.tick_ms == 0 || self.chicken.tick_ms == 0 || self.power_up.tick_ms == 0 {
            return Err("tick periods must be non-zero".into());
        }
        if self.target.min_radius > self.target.max_radius {
            return Err("target.min_radius exceeds target.max_radius".into());
        }
        if self.chicken.bounce_factor.0 > self.chicken.bounce_factor.1 {
            return Err("chicken.bounce_factor is inverted".into());
        }
        Ok(())
    }
}
