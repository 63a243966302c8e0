//! Content Tables
//!
//! Read-only tuning data: enemy, boss and NPC templates and biome
//! definitions. Loaded from JSON, either from a string or from disk.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::Path;
use std::rc::Rc;

use serde::{Serialize, Deserialize};
use thiserror::Error;
use tracing::info;

use crate::core::vec2::{Vec2, Rect};
use crate::game::actor::{Actor, BehaviorState, BiomeId, Category, GroupId, Stats};

/// Content loading errors.
#[derive(Debug, Error)]
pub enum ContentError {
    /// Content file unreadable
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Malformed JSON
    #[error("invalid content JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// Lookup of a template that does not exist
    #[error("unknown {kind} template: {id}")]
    UnknownTemplate { kind: &'static str, id: String },

    /// Biome points at a missing template
    #[error("biome {biome} references unknown {kind} template {id}")]
    Dangling {
        biome: String,
        kind: &'static str,
        id: String,
    },
}

/// Regular enemy template.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnemyTemplate {
    /// `enemy_dinosaur` or `enemy_soldier`
    pub category: Category,
    /// Max health at level 1
    pub health: f32,
    /// Combat/movement stats at level 1
    #[serde(default)]
    pub stats: Stats,
    /// Joins packmates' fights
    #[serde(default = "default_true")]
    pub pack_aggro: bool,
    /// XP granted on kill
    #[serde(default)]
    pub xp_reward: u32,
}

/// Boss template.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BossTemplate {
    /// Display name
    pub name: String,
    /// Max health
    pub health: f32,
    /// Combat/movement stats
    #[serde(default)]
    pub stats: Stats,
    /// Ability names
    #[serde(default)]
    pub abilities: Vec<String>,
    /// Seconds before a replacement spawns
    #[serde(default)]
    pub respawn_secs: Option<f32>,
}

/// NPC template.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NpcTemplate {
    /// Display name
    pub name: String,
    /// Patrol route relative to the spawn point; empty = stands still
    #[serde(default)]
    pub patrol: Vec<Vec2>,
}

/// One row of a biome's spawn table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpawnEntry {
    /// Enemy template id
    pub template: String,
    /// Relative abundance
    pub weight: u32,
    /// Members per group, inclusive
    #[serde(default = "default_group_size")]
    pub group_size: [u32; 2],
}

/// Biome definition.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BiomeDef {
    /// Boss template spawned here
    pub boss: Option<String>,
    /// Explicit boss position
    pub boss_spawn: Option<Vec2>,
    /// Playable area
    pub bounds: Option<Rect>,
    /// Boss respawn fallback
    pub respawn_secs: Option<f32>,
    /// Enemy levels, inclusive
    pub level_range: Option<[u32; 2]>,
    /// Regular enemy spawns
    pub spawn_table: Vec<SpawnEntry>,
}

fn default_true() -> bool {
    true
}

fn default_group_size() -> [u32; 2] {
    [1, 1]
}

/// Tables shared by the services that build actors. Replaced wholesale by
/// the content loader during boot.
pub type SharedContent = Rc<RefCell<ContentTables>>;

/// All tuning tables.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentTables {
    /// Enemy templates by key
    pub enemies: BTreeMap<String, EnemyTemplate>,
    /// Boss templates by key
    pub bosses: BTreeMap<String, BossTemplate>,
    /// NPC templates by key
    pub npcs: BTreeMap<String, NpcTemplate>,
    /// Biome definitions by id
    pub biomes: BTreeMap<String, BiomeDef>,
}

impl ContentTables {
    /// Wrap in a shared handle.
    pub fn shared(self) -> SharedContent {
        Rc::new(RefCell::new(self))
    }

    /// Parse and validate.
    pub fn from_json(json: &str) -> Result<Self, ContentError> {
        let tables: Self = serde_json::from_str(json)?;
        tables.validate()?;
        Ok(tables)
    }

    /// Read, parse and validate a file without blocking the runtime.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ContentError> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path).await.map_err(|source| ContentError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let tables = Self::from_json(&json)?;
        info!(
            "Loaded content from {}: {} enemies, {} bosses, {} npcs, {} biomes",
            path.display(),
            tables.enemies.len(),
            tables.bosses.len(),
            tables.npcs.len(),
            tables.biomes.len()
        );
        Ok(tables)
    }

    /// Tables shipped with the crate (`data/content.json`).
    pub fn bundled() -> Result<Self, ContentError> {
        Self::from_json(include_str!("../../data/content.json"))
    }

    /// Every template a biome names must exist.
    pub fn validate(&self) -> Result<(), ContentError> {
        for (biome, def) in &self.biomes {
            if let Some(boss) = &def.boss {
                if !self.bosses.contains_key(boss) {
                    return Err(ContentError::Dangling {
                        biome: biome.clone(),
                        kind: "boss",
                        id: boss.clone(),
                    });
                }
            }
            for entry in &def.spawn_table {
                if !self.enemies.contains_key(&entry.template) {
                    return Err(ContentError::Dangling {
                        biome: biome.clone(),
                        kind: "enemy",
                        id: entry.template.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Biome lookup.
    pub fn biome(&self, id: &BiomeId) -> Option<&BiomeDef> {
        self.biomes.get(id.as_str())
    }

    /// Biome ids in sorted order.
    pub fn biome_ids(&self) -> Vec<BiomeId> {
        self.biomes.keys().map(|k| BiomeId(k.clone())).collect()
    }

    /// Build a level-1 enemy actor from a template.
    pub fn build_enemy(&self, template: &str, position: Vec2) -> Result<Actor, ContentError> {
        let t = self.enemies.get(template).ok_or_else(|| ContentError::UnknownTemplate {
            kind: "enemy",
            id: template.to_string(),
        })?;

        let mut actor = Actor::new(t.category, position)
            .with_health(t.health)
            .with_stats(t.stats.clone())
            .with_ai(BehaviorState::new(position));
        actor.template = Some(template.to_string());
        if let Some(ai) = actor.ai.as_mut() {
            ai.pack_aggro = t.pack_aggro;
        }
        Ok(actor)
    }

    /// Build a boss actor from a template.
    pub fn build_boss(&self, template: &str, position: Vec2) -> Result<Actor, ContentError> {
        let t = self.bosses.get(template).ok_or_else(|| ContentError::UnknownTemplate {
            kind: "boss",
            id: template.to_string(),
        })?;

        let mut actor = Actor::new(Category::Boss, position)
            .with_health(t.health)
            .with_stats(t.stats.clone())
            .with_ai(BehaviorState::boss(position, t.abilities.clone()));
        actor.template = Some(template.to_string());
        actor.respawn_secs = t.respawn_secs;
        Ok(actor)
    }

    /// Build an NPC actor; the patrol route is offset by `position`.
    pub fn build_npc(&self, template: &str, position: Vec2) -> Result<Actor, ContentError> {
        let t = self.npcs.get(template).ok_or_else(|| ContentError::UnknownTemplate {
            kind: "npc",
            id: template.to_string(),
        })?;

        let route = t.patrol.iter().map(|p| position.add(*p)).collect();
        let mut actor = Actor::new(Category::Npc, position)
            .with_ai(BehaviorState::npc(position, route));
        actor.template = Some(template.to_string());
        Ok(actor)
    }
}

/// Group id for the `n`th pack spawned in a biome.
pub fn group_id(biome: &BiomeId, n: u64) -> GroupId {
    GroupId(format!("group_{}_{}", biome, n))
}
