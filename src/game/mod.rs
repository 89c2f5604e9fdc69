//! Game Logic Module
//!
//! All session simulation code. Synchronous and free of I/O; time comes in
//! as a parameter and randomness from a seeded [`DeterministicRng`].
//!
//! ## Module Structure
//!
//! - `rules`: Tuning constants and per-subsystem configuration
//! - `state`: Session state machine, target, combo and effects
//! - `combo`: Combo and point scoring
//! - `target`: Target placement and hit-testing
//! - `chicken`: Bouncing chicken actor and rage
//! - `powerup`: Power-up spawning, expiry and type dealing
//! - `world`: The session world driven by the engine
//! - `events`: Game events for logs and subscribers
//!
//! [`DeterministicRng`]: crate::core::DeterministicRng

pub mod chicken;
pub mod combo;
pub mod events;
pub mod powerup;
pub mod rules;
pub mod state;
pub mod target;
pub mod world;

// Re-export key types
pub use chicken::{ChickenState, Rage, Velocity};
pub use events::{GameEvent, GameEventData};
pub use powerup::{PowerUp, PowerUpType};
pub use rules::GameRules;
pub use state::{
    Combo, EffectKind, Effects, GameOverState, GameState, Millis, PlayingState, Target,
};
pub use world::{ClockStep, TapOutcome, World};
