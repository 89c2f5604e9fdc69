//! Core primitives.
//!
//! Randomness and screen geometry shared by every game subsystem.
//! Nothing in here knows about sessions, tasks or persistence.

pub mod geometry;
pub mod rng;

// Re-export core types
pub use geometry::{Point, Viewport, clamp_unit};
pub use rng::{DeterministicRng, derive_session_seed};
