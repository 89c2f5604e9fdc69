//! Session Module
//!
//! Runs the game world on tokio: owns the world lock, schedules the clock,
//! chicken and power-up tasks for each session, and publishes observable
//! state on watch channels.

pub mod config;
pub mod engine;
mod tasks;

pub use config::{ConfigError, EngineConfig};
pub use engine::GameEngine;
