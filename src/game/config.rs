//! Simulation Configuration
//!
//! Tuning knobs for the AI state machines and the lifecycle managers.
//! All durations are milliseconds, distances world units.

use serde::{Serialize, Deserialize};

use crate::core::vec2::Vec2;

/// Enemy/boss/NPC state machine tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiTuning {
    /// Shortest wander leg
    pub wander_min_ms: f32,
    /// Longest wander leg
    pub wander_max_ms: f32,
    /// Wander destinations are picked within `patrol_radius * this`
    pub wander_radius_factor: f32,
    /// Wander speed as a fraction of base speed
    pub wander_speed_factor: f32,
    /// Return-to-spawn speed as a fraction of base speed
    pub return_speed_factor: f32,
    /// Distance to spawn that counts as home
    pub return_arrive_radius: f32,
    /// Attack keeps going until target is beyond `attack_range * this`
    pub attack_hysteresis: f32,
    /// Radius around the damaged actor for pack aggro
    pub pack_aggro_radius: f32,
    /// Per-tick chance to start an ability at medium range
    pub boss_ability_chance: f32,
    /// Ability windup
    pub boss_windup_ms: f32,
    /// Ability cooldown
    pub boss_ability_cooldown_ms: f32,
    /// Abilities start beyond `attack_range * this`
    pub boss_ability_min_range_factor: f32,
    /// Health regained per ms while returning
    pub boss_return_regen_per_ms: f32,
    /// Phase 2 speed multiplier
    pub phase2_speed: f32,
    /// Phase 2 attack rate multiplier
    pub phase2_attack_rate: f32,
    /// Phase 3 speed multiplier (on top of phase 2)
    pub phase3_speed: f32,
    /// Phase 3 damage multiplier
    pub phase3_damage: f32,
    /// NPC notices the hero within this radius
    pub npc_interact_radius: f32,
    /// NPC pause at each patrol point
    pub npc_patrol_wait_ms: f32,
    /// Distance that counts as reaching a patrol point
    pub npc_arrive_radius: f32,
}

impl Default for AiTuning {
    fn default() -> Self {
        Self {
            wander_min_ms: 3000.0,
            wander_max_ms: 5000.0,
            wander_radius_factor: 0.5,
            wander_speed_factor: 0.3,
            return_speed_factor: 0.8,
            return_arrive_radius: 20.0,
            attack_hysteresis: 1.2,
            pack_aggro_radius: 150.0,
            boss_ability_chance: 0.3,
            boss_windup_ms: 1000.0,
            boss_ability_cooldown_ms: 5000.0,
            boss_ability_min_range_factor: 1.5,
            boss_return_regen_per_ms: 0.1,
            phase2_speed: 1.2,
            phase2_attack_rate: 1.3,
            phase3_speed: 1.5,
            phase3_damage: 1.5,
            npc_interact_radius: 140.0,
            npc_patrol_wait_ms: 2000.0,
            npc_arrive_radius: 20.0,
        }
    }
}

/// Spawner and boss lifecycle tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnTuning {
    /// Delay before the first `spawn_all_bosses`
    pub boss_initial_delay_ms: f32,
    /// Used when neither the actor nor the biome names a respawn time
    pub boss_default_respawn_secs: f32,
    /// Origin of the hardcoded per-biome boss positions
    pub world_offset: Vec2,
    /// Max offset of a group member from the group centre, per axis
    pub group_spacing: f32,
    /// Chance that a spawned member is elite
    pub elite_chance: f32,
    /// Elite stat multiplier
    pub elite_multiplier: f32,
    /// Groups are kept this far inside biome bounds
    pub biome_padding: f32,
    /// Spawn table weight per group
    pub weight_per_group: u32,
    /// Delay before a wiped group comes back
    pub group_respawn_secs: f32,
    /// Fill every biome from its spawn table when the spawner boots
    pub populate_on_boot: bool,
}

impl Default for SpawnTuning {
    fn default() -> Self {
        Self {
            boss_initial_delay_ms: 1000.0,
            boss_default_respawn_secs: 300.0,
            world_offset: Vec2::new(10000.0, 10000.0),
            group_spacing: 50.0,
            elite_chance: 0.05,
            elite_multiplier: 2.0,
            biome_padding: 200.0,
            weight_per_group: 20,
            group_respawn_secs: 120.0,
            populate_on_boot: true,
        }
    }
}

/// Top-level simulation configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// World seed; every RNG stream derives from it
    pub seed: u64,
    /// Fixed step length
    pub tick_ms: f32,
    /// Real elapsed time is capped to this per frame
    pub max_frame_ms: f32,
    /// Spatial grid cell size
    pub spatial_cell_size: f32,
    /// State machine tuning
    pub ai: AiTuning,
    /// Lifecycle tuning
    pub spawn: SpawnTuning,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 0x1A0_4A7E,
            tick_ms: 50.0,       // 20 Hz
            max_frame_ms: 100.0, // Avoid spiral of death after a stall
            spatial_cell_size: crate::game::spatial::DEFAULT_CELL_SIZE,
            ai: AiTuning::default(),
            spawn: SpawnTuning::default(),
        }
    }
}

impl SimConfig {
    /// Parse from JSON; missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
