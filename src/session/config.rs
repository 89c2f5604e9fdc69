//! Engine configuration.

use std::path::Path;

use serde::{Serialize, Deserialize};

use crate::game::rules::GameRules;

/// Event channel capacity when none is configured.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid JSON for this shape.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// Values parse but describe an unplayable engine.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Gameplay rules.
    pub rules: GameRules,
    /// Base seed for session randomness. Random when unset.
    pub rng_seed: Option<u64>,
    /// Capacity of the game event broadcast channel.
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rules: GameRules::default(),
            rng_seed: None,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON config. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Check the configuration is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.event_capacity == 0 {
            return Err(ConfigError::Invalid("event_capacity must be non-zero".into()));
        }
        self.rules.validate().map_err(ConfigError::Invalid)
    }

    /// Base seed to use, drawing a random one if none is configured.
    pub fn resolve_seed(&self) -> u64 {
        self.rng_seed
            .unwrap_or_else(|| uuid::Uuid::new_v4().as_u128() as u64)
    }
}
