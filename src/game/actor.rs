//! Actor Definitions
//!
//! Everything the registry holds: identifiers, categories, the optional
//! components (health, stats, behavior state) and the per-actor behavior
//! state consumed by the AI state machines.

use std::fmt;
use serde::{Serialize, Deserialize};

use crate::core::vec2::Vec2;
use crate::core::hash::StateHasher;
use crate::game::ai::BehaviorKind;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Unique actor identifier, assigned by the registry on insertion.
///
/// Used as a weak reference everywhere: holders must re-resolve it against
/// the registry before use, since the actor may have been removed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct ActorId(pub u64);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Biome identifier (e.g. `grasslands`).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BiomeId(pub String);

impl BiomeId {
    /// Create from a string slice.
    pub fn new(id: &str) -> Self {
        Self(id.to_string())
    }

    /// Borrow as str.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BiomeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pack identifier shared by the members of one spawned group.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupId(pub String);

impl GroupId {
    /// Create from a string slice.
    pub fn new(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// CATEGORY
// =============================================================================

/// Actor category, used for the type index and for behavior routing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Category {
    /// Player-controlled hero
    Hero = 0,
    /// Dinosaur enemy
    EnemyDinosaur = 1,
    /// Humanoid enemy
    EnemySoldier = 2,
    /// Biome boss
    Boss = 3,
    /// Non-player character
    Npc = 4,
    /// Item lying on the ground
    DroppedItem = 5,
    /// Static prop
    Prop = 6,
}

impl Category {
    /// Behavior used when the actor carries no explicit override.
    ///
    /// `None` means the dispatcher falls back to its generic handler.
    pub fn default_behavior(self) -> Option<BehaviorKind> {
        match self {
            Category::EnemyDinosaur | Category::EnemySoldier => Some(BehaviorKind::Enemy),
            Category::Boss => Some(BehaviorKind::Boss),
            Category::Npc => Some(BehaviorKind::Npc),
            Category::Hero | Category::DroppedItem | Category::Prop => None,
        }
    }

    /// Hostile to the hero.
    pub fn is_hostile(self) -> bool {
        matches!(self, Category::EnemyDinosaur | Category::EnemySoldier | Category::Boss)
    }
}

// =============================================================================
// COMPONENTS
// =============================================================================

/// Health component.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Health {
    /// Current hit points (may go negative on the killing blow)
    pub current: f32,
    /// Maximum hit points
    pub max: f32,
}

impl Health {
    /// Full health.
    pub fn new(max: f32) -> Self {
        Self { current: max, max }
    }

    /// Current / max, 0 when max is not positive.
    pub fn ratio(&self) -> f32 {
        if self.max <= 0.0 {
            return 0.0;
        }
        self.current / self.max
    }

    /// Subtract damage. Returns true if this left the actor at or below zero.
    pub fn take_damage(&mut self, amount: f32) -> bool {
        self.current -= amount;
        self.is_depleted()
    }

    /// Heal, clamped to max.
    pub fn heal(&mut self, amount: f32) {
        self.current = (self.current + amount).min(self.max);
    }

    /// Restore to max.
    pub fn heal_full(&mut self) {
        self.current = self.max;
    }

    /// At or below zero.
    pub fn is_depleted(&self) -> bool {
        self.current <= 0.0
    }
}

/// Combat and movement tuning for one actor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Stats {
    /// Movement speed (units per second)
    pub speed: f32,
    /// Base damage per attack
    pub damage: f32,
    /// Flat defense fed into mitigation
    pub defense: f32,
    /// Attacks per second
    pub attack_rate: f32,
    /// Melee/ranged reach
    pub attack_range: f32,
    /// Distance at which the hero is noticed
    pub aggro_range: f32,
    /// Max distance from spawn while chasing
    pub leash_distance: f32,
    /// Wander area around spawn
    pub patrol_radius: f32,
    /// Critical hit probability [0, 1]
    pub crit_chance: f32,
    /// Critical hit multiplier
    pub crit_multiplier: f32,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            speed: 80.0,
            damage: 10.0,
            defense: 0.0,
            attack_rate: 1.0,
            attack_range: 50.0,
            aggro_range: 300.0,
            leash_distance: 600.0,
            patrol_radius: 200.0,
            crit_chance: 0.0,
            crit_multiplier: 1.5,
        }
    }
}

impl Stats {
    /// Cooldown between attacks in ms (`1 / attack_rate` seconds).
    pub fn attack_cooldown_ms(&self) -> f32 {
        1000.0 / self.attack_rate.max(0.001)
    }
}

// =============================================================================
// BEHAVIOR STATE
// =============================================================================

/// Behavior mode tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum AiMode {
    /// Standing still
    Idle = 0,
    /// Roaming around spawn
    #[default]
    Wander = 1,
    /// Closing in on target
    Chase = 2,
    /// In range, attacking
    Attack = 3,
    /// Walking back to spawn
    Returning = 4,
    /// Boss ability windup
    Ability = 5,
    /// NPC talking to the hero
    Dialogue = 6,
    /// NPC walking a route
    Patrol = 7,
    /// Dead, awaiting removal
    Dead = 8,
}

/// Boss-only phase and ability bookkeeping.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BossPhaseState {
    /// Phase computed on the last tick (1-3)
    pub phase: u8,
    /// Highest phase whose multipliers have been applied
    pub highest_applied: u8,
    /// Phase 3 reached
    pub enraged: bool,
    /// Ability names this boss may use
    pub abilities: Vec<String>,
    /// Time until another ability may start
    pub ability_cooldown_ms: f32,
    /// Windup remaining for the current ability
    pub windup_ms: f32,
    /// Ability being wound up
    pub current_ability: Option<String>,
}

impl BossPhaseState {
    /// Fresh phase-1 state.
    pub fn new(abilities: Vec<String>) -> Self {
        Self {
            phase: 1,
            highest_applied: 1,
            enraged: false,
            abilities,
            ability_cooldown_ms: 0.0,
            windup_ms: 0.0,
            current_ability: None,
        }
    }
}

/// NPC-only proximity and patrol bookkeeping.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NpcState {
    /// Hero was inside the interact radius last tick
    pub player_nearby: bool,
    /// Facing direction for presentation
    pub facing_right: bool,
    /// Patrol route
    pub patrol_points: Vec<Vec2>,
    /// Index of the point being walked to
    pub patrol_index: usize,
    /// Remaining wait at the current point
    pub patrol_wait_ms: f32,
    /// Mode to restore when dialogue ends
    pub prev_mode: Option<AiMode>,
}

/// Per-actor AI state, mutated only by the matching state machine
/// (and by the combat reactions on damage/death).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BehaviorState {
    /// Current mode
    pub mode: AiMode,
    /// Weak target reference
    pub target: Option<ActorId>,
    /// Home point for wandering and leashing
    pub spawn_point: Vec2,
    /// Current wander destination
    pub wander_target: Option<Vec2>,
    /// Time spent on the current wander leg
    pub wander_timer_ms: f32,
    /// Length of the current wander leg
    pub wander_interval_ms: f32,
    /// Time until the next attack may fire
    pub attack_cooldown_ms: f32,
    /// Joins group fights when a packmate is hit
    pub pack_aggro: bool,
    /// Pack membership
    pub group: Option<GroupId>,
    /// Boss flag
    pub is_boss: bool,
    /// Boss phase data
    pub boss: Option<BossPhaseState>,
    /// NPC data
    pub npc: Option<NpcState>,
}

impl BehaviorState {
    /// Wandering state anchored at `spawn_point`.
    pub fn new(spawn_point: Vec2) -> Self {
        Self {
            mode: AiMode::Wander,
            target: None,
            spawn_point,
            wander_target: None,
            wander_timer_ms: 0.0,
            wander_interval_ms: 0.0,
            attack_cooldown_ms: 0.0,
            pack_aggro: false,
            group: None,
            is_boss: false,
            boss: None,
            npc: None,
        }
    }

    /// Boss state with the given ability list.
    pub fn boss(spawn_point: Vec2, abilities: Vec<String>) -> Self {
        Self {
            is_boss: true,
            boss: Some(BossPhaseState::new(abilities)),
            ..Self::new(spawn_point)
        }
    }

    /// NPC state; patrols if a route is given, idles otherwise.
    pub fn npc(spawn_point: Vec2, patrol_points: Vec<Vec2>) -> Self {
        let mode = if patrol_points.is_empty() { AiMode::Idle } else { AiMode::Patrol };
        Self {
            mode,
            npc: Some(NpcState { patrol_points, ..NpcState::default() }),
            ..Self::new(spawn_point)
        }
    }

    /// Join a pack.
    pub fn in_group(mut self, group: GroupId, pack_aggro: bool) -> Self {
        self.group = Some(group);
        self.pack_aggro = pack_aggro;
        self
    }

    /// Dead flag.
    pub fn is_dead(&self) -> bool {
        self.mode == AiMode::Dead
    }

    /// Wipe transient state and mark dead.
    pub fn clear_for_death(&mut self) {
        self.mode = AiMode::Dead;
        self.target = None;
        self.wander_target = None;
        self.wander_timer_ms = 0.0;
        self.attack_cooldown_ms = 0.0;
        if let Some(boss) = self.boss.as_mut() {
            boss.current_ability = None;
            boss.windup_ms = 0.0;
        }
    }
}

// =============================================================================
// ACTOR
// =============================================================================

/// A simulated entity.
///
/// The registry owns every actor; nothing else holds one across ticks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    /// Assigned by the registry on `add`
    pub id: ActorId,
    /// Type index key and behavior routing key
    pub category: Category,
    /// World position
    pub position: Vec2,
    /// Cleared when the actor should be swept
    pub active: bool,
    /// Biome this actor belongs to
    pub biome: Option<BiomeId>,
    /// Content template it was built from
    pub template: Option<String>,
    /// Explicit behavior selection
    pub behavior_override: Option<BehaviorKind>,
    /// Health component
    pub health: Option<Health>,
    /// Stats component
    pub stats: Option<Stats>,
    /// AI component
    pub ai: Option<BehaviorState>,
    /// Seconds until a replacement spawns after death (bosses)
    pub respawn_secs: Option<f32>,
    /// Difficulty level
    pub level: u32,
    /// Elite roll succeeded
    pub elite: bool,
}

impl Actor {
    /// Bare actor with no components.
    pub fn new(category: Category, position: Vec2) -> Self {
        Self {
            id: ActorId::default(),
            category,
            position,
            active: true,
            biome: None,
            template: None,
            behavior_override: None,
            health: None,
            stats: None,
            ai: None,
            respawn_secs: None,
            level: 1,
            elite: false,
        }
    }

    /// Hero with the given max health and default stats.
    pub fn hero(position: Vec2, max_health: f32) -> Self {
        Self::new(Category::Hero, position)
            .with_health(max_health)
            .with_stats(Stats::default())
    }

    /// Attach a full health component.
    pub fn with_health(mut self, max: f32) -> Self {
        self.health = Some(Health::new(max));
        self
    }

    /// Attach stats.
    pub fn with_stats(mut self, stats: Stats) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Attach behavior state.
    pub fn with_ai(mut self, ai: BehaviorState) -> Self {
        self.ai = Some(ai);
        self
    }

    /// Assign to a biome.
    pub fn in_biome(mut self, biome: BiomeId) -> Self {
        self.biome = Some(biome);
        self
    }

    /// Force a specific behavior.
    pub fn with_behavior(mut self, kind: BehaviorKind) -> Self {
        self.behavior_override = Some(kind);
        self
    }

    /// Dead if the AI says so or health is depleted.
    pub fn is_dead(&self) -> bool {
        self.ai.as_ref().is_some_and(BehaviorState::is_dead)
            || self.health.as_ref().is_some_and(Health::is_depleted)
    }

    /// Active and not dead.
    pub fn is_alive(&self) -> bool {
        self.active && !self.is_dead()
    }

    /// Defense value, 0 without stats.
    pub fn defense(&self) -> f32 {
        self.stats.as_ref().map_or(0.0, |s| s.defense)
    }

    /// Current behavior mode, if the actor has an AI component.
    pub fn mode(&self) -> Option<AiMode> {
        self.ai.as_ref().map(|ai| ai.mode)
    }

    /// Add to a state hash.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher
            .write(&self.id.0)
            .write(&(self.category as u8))
            .write(&self.position)
            .write(&self.active);
        hasher.write_opt(self.health.as_ref().map(|h| h.current).as_ref());
        hasher.write_opt(self.ai.as_ref().map(|ai| ai.mode as u8).as_ref());
        hasher.write_opt(self.ai.as_ref().and_then(|ai| ai.target).map(|t| t.0).as_ref());
    }
}

// =============================================================================
// TESTS
// =============================================================================
