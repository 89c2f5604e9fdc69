//! # TapTapTap Session Engine
//!
//! Real-time session engine for the TapTapTap arcade game: a 30 second
//! round of tapping a wandering target, dodging a bouncing chicken and
//! grabbing power-ups, with high score, coins and skins persisted between
//! sessions.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    TAPTAPTAP ENGINE                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Shared primitives                         │
//! │  ├── rng.rs      - Seeded Xorshift128+ PRNG                  │
//! │  └── geometry.rs - Normalized/pixel coordinates, hit tests   │
//! │                                                              │
//! │  game/           - Session logic (synchronous)               │
//! │  ├── rules.rs    - Timing and size tuning                    │
//! │  ├── state.rs    - Ready / Playing / GameOver                │
//! │  ├── combo.rs    - Combo scoring                             │
//! │  ├── target.rs   - Target placement                          │
//! │  ├── chicken.rs  - Chicken actor and rage                    │
//! │  ├── powerup.rs  - Power-up spawning and effects             │
//! │  └── world.rs    - Session world                             │
//! │                                                              │
//! │  session/        - Async runtime (tokio)                     │
//! │  ├── engine.rs   - Commands, world lock, watch outputs       │
//! │  └── tasks.rs    - Clock, chicken and power-up loops         │
//! │                                                              │
//! │  persistence/    - Key-value port and stores                 │
//! │  shop.rs         - Skin catalog, buy and select              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency
//!
//! Every mutation of a session happens under one lock, in a synchronous
//! step of [`game::World`]. Tasks belong to a session generation and are
//! cancelled and joined when a session is restarted or reset, so no task
//! ever writes into a session it did not start with.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod persistence;
pub mod session;
pub mod shop;

// Re-export commonly used types
pub use core::geometry::{Point, Viewport};
pub use core::rng::DeterministicRng;
pub use game::state::{GameOverState, GameState, PlayingState};
pub use game::world::TapOutcome;
pub use persistence::{JsonFileStore, MemoryStore, PersistenceGateway, Progression};
pub use session::{EngineConfig, GameEngine};
pub use shop::Shop;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
