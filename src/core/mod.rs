//! Core deterministic primitives.
//!
//! Vector math, seeded randomness and state hashing. Nothing in here knows
//! about actors or subsystems.

pub mod vec2;
pub mod rng;
pub mod hash;

// Re-export core types
pub use vec2::{Vec2, Rect};
pub use rng::DeterministicRng;
pub use hash::{compute_state_hash, short_hex, HashTrail, Hashable, StateHash, StateHasher};
