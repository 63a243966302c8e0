//! Game Logic Module
//!
//! The simulation model: actors, the services that own and move them, and
//! the events they exchange. Single-threaded; services are shared through
//! `Rc` handles and mutate through `RefCell`.
//!
//! ## Module Structure
//!
//! - `actor`: ids, categories, components and behavior state
//! - `registry`: Entity Registry (master collection + type index)
//! - `spatial`: uniform grid behind proximity queries
//! - `events`: event payloads and tags
//! - `bus`: synchronous publish/subscribe
//! - `damage`: mitigation, crits and damage application
//! - `content`: templates and biome tables
//! - `config`: AI and spawn tuning
//! - `ai`: behavior dispatcher, state machines, combat reactions
//! - `lifecycle`: one boss per biome, with respawn timers
//! - `spawner`: enemy packs from biome spawn tables

pub mod actor;
pub mod registry;
pub mod spatial;
pub mod events;
pub mod bus;
pub mod damage;
pub mod content;
pub mod config;
pub mod ai;
pub mod lifecycle;
pub mod spawner;

// Re-export key types
pub use actor::{Actor, ActorId, AiMode, BiomeId, Category, GroupId};
pub use registry::{EntityRegistry, SharedRegistry};
pub use events::{EventTag, GameEvent};
pub use bus::{EventBus, Listener};
pub use damage::{calculate_damage, roll_crit, DamageResolver};
pub use content::{ContentTables, SharedContent};
pub use config::SimConfig;
pub use lifecycle::{BossLifecycle, BossSlot};
pub use spawner::{EnemySpawner, SpawnOptions};
