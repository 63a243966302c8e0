//! # Ironhaven Simulation Core
//!
//! Real-time simulation for Ironhaven: a priority-ordered subsystem
//! scheduler, a synchronous event bus, an entity registry with a spatial
//! index, per-category AI state machines, damage resolution, and the boss
//! and enemy-group lifecycles.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   IRONHAVEN SIMULATION                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── vec2.rs     - 2D vector and rectangle                   │
//! │  ├── rng.rs      - Seeded Xorshift128+ streams               │
//! │  └── hash.rs     - State hashing for replay checks           │
//! │                                                              │
//! │  game/           - Simulation model                          │
//! │  ├── registry.rs - Entity registry + spatial grid            │
//! │  ├── bus.rs      - Event bus                                 │
//! │  ├── damage.rs   - Damage resolver                           │
//! │  ├── ai/         - Dispatcher, state machines, reactions     │
//! │  ├── lifecycle.rs- One boss per biome                        │
//! │  └── spawner.rs  - Enemy groups                              │
//! │                                                              │
//! │  runtime/        - Host-facing                               │
//! │  ├── scheduler.rs- Boot order and frame loop                 │
//! │  ├── systems.rs  - Subsystem adapters                        │
//! │  ├── clock.rs    - Fixed timestep                            │
//! │  └── simulation.rs - Service assembly                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism
//!
//! All randomness comes from seeded streams and every collection that is
//! iterated is ordered (`BTreeMap`), so the same seed, content and host
//! commands give the same registry hash frame for frame.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod runtime;

// Re-export commonly used types
pub use core::rng::DeterministicRng;
pub use core::vec2::Vec2;
pub use game::{Actor, ActorId, Category, EventBus, GameEvent, SimConfig};
pub use runtime::{ContentSource, Scheduler, Simulation};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default fixed step (ms), 20 Hz
pub const TICK_MS: f32 = 50.0;
