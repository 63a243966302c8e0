//! Enemy Spawner
//!
//! Places packs of enemies from biome spawn tables. Members of one pack share
//! a `GroupId` so pack aggro can find them. Packs spawned by
//! `populate_biome` come back `group_respawn_secs` after their last member
//! dies.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use tracing::{debug, info, warn};

use crate::core::rng::DeterministicRng;
use crate::core::vec2::Vec2;
use crate::game::actor::{Actor, ActorId, BiomeId, Category, GroupId};
use crate::game::bus::EventBus;
use crate::game::config::SpawnTuning;
use crate::game::content::{group_id, ContentError, SharedContent};
use crate::game::events::GameEvent;
use crate::game::registry::{EntityRegistry, SharedRegistry};

/// Highest level with its own multipliers; higher levels use it.
pub const MAX_DIFFICULTY_LEVEL: u32 = 4;

/// Stat multipliers for a difficulty level.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Difficulty {
    /// Max health multiplier
    pub health: f32,
    /// Damage multiplier
    pub damage: f32,
}

/// Multipliers for `level` (clamped to 1..=4).
pub fn difficulty(level: u32) -> Difficulty {
    let (health, damage) = match level.clamp(1, MAX_DIFFICULTY_LEVEL) {
        1 => (1.0, 1.0),
        2 => (1.5, 1.3),
        3 => (2.0, 1.6),
        _ => (3.0, 2.0),
    };
    Difficulty { health, damage }
}

/// Knobs for one `spawn_enemy_group` call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SpawnOptions {
    /// Fixed level; otherwise rolled from the biome's level range
    pub level: Option<u32>,
    /// Reuse a group id; otherwise a fresh one is minted
    pub group: Option<GroupId>,
    /// Skip the elite roll
    pub force_normal: bool,
    /// Bring the pack back after it is wiped out
    pub respawn: bool,
}

#[derive(Clone, Debug)]
struct GroupRecord {
    biome: BiomeId,
    center: Vec2,
    template: String,
    count: u32,
    options: SpawnOptions,
    members: Vec<ActorId>,
    /// Set once every member is gone
    respawn_ms: Option<f32>,
}

/// Spawns and tracks enemy packs.
pub struct EnemySpawner {
    registry: SharedRegistry,
    bus: Rc<EventBus>,
    content: SharedContent,
    tuning: SpawnTuning,
    rng: RefCell<DeterministicRng>,
    groups: RefCell<BTreeMap<GroupId, GroupRecord>>,
    next_group: Cell<u64>,
}

impl EnemySpawner {
    /// Spawner drawing placement and rolls from `rng`.
    pub fn new(
        registry: SharedRegistry,
        bus: Rc<EventBus>,
        content: SharedContent,
        tuning: SpawnTuning,
        rng: DeterministicRng,
    ) -> Self {
        Self {
            registry,
            bus,
            content,
            tuning,
            rng: RefCell::new(rng),
            groups: RefCell::new(BTreeMap::new()),
            next_group: Cell::new(1),
        }
    }

    /// Place `count` members of `template` around `center`.
    ///
    /// Each member lands within `group_spacing` of the centre on both axes,
    /// is scaled by its level's difficulty and may roll elite.
    pub fn spawn_enemy_group(
        &self,
        biome: &BiomeId,
        center: Vec2,
        template: &str,
        count: u32,
        options: SpawnOptions,
    ) -> Result<Vec<ActorId>, ContentError> {
        let group = options.group.clone().unwrap_or_else(|| self.mint_group(biome));

        let actors = {
            let content = self.content.borrow();
            let level_range = content.biome(biome).and_then(|b| b.level_range);
            let mut rng = self.rng.borrow_mut();

            let mut actors = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let offset = Vec2::new(
                    (rng.next_f32() - 0.5) * self.tuning.group_spacing * 2.0,
                    (rng.next_f32() - 0.5) * self.tuning.group_spacing * 2.0,
                );
                let mut actor = content.build_enemy(template, center + offset)?;

                let level = options
                    .level
                    .or_else(|| level_range.map(|[min, max]| rng.next_int_range(min, max)))
                    .unwrap_or(1);
                let elite = !options.force_normal && rng.chance(self.tuning.elite_chance);
                self.scale(&mut actor, level, elite);

                actor.biome = Some(biome.clone());
                if let Some(ai) = actor.ai.as_mut() {
                    ai.group = Some(group.clone());
                }
                actors.push(actor);
            }
            actors
        };

        let members: Vec<ActorId> = {
            let mut reg = self.registry.borrow_mut();
            actors.into_iter().map(|a| reg.add(a)).collect()
        };

        debug!("Group {} spawned in {}: {} x {}", group, biome, members.len(), template);
        self.groups.borrow_mut().insert(
            group.clone(),
            GroupRecord {
                biome: biome.clone(),
                center,
                template: template.to_string(),
                count,
                options: SpawnOptions { group: Some(group.clone()), ..options },
                members: members.clone(),
                respawn_ms: None,
            },
        );

        self.bus.publish(&GameEvent::EnemyGroupSpawned {
            group,
            biome: biome.clone(),
            center,
            members: members.clone(),
        });
        Ok(members)
    }

    /// Fill a biome from its spawn table. Returns the number of enemies placed.
    ///
    /// Each entry yields `max(1, weight / weight_per_group)` packs at random
    /// positions inside the biome's padded bounds. Biomes without bounds get
    /// nothing.
    pub fn populate_biome(&self, biome: &BiomeId) -> usize {
        let plan: Vec<(String, Vec2, u32)> = {
            let content = self.content.borrow();
            let Some(def) = content.biome(biome) else {
                warn!("Cannot populate unknown biome {}", biome);
                return 0;
            };
            let Some(bounds) = def.bounds else {
                debug!("Biome {} has no bounds, skipping population", biome);
                return 0;
            };

            let pad = self.tuning.biome_padding;
            let mut rng = self.rng.borrow_mut();
            let mut plan = Vec::new();
            for entry in &def.spawn_table {
                let groups = (entry.weight / self.tuning.weight_per_group.max(1)).max(1);
                for _ in 0..groups {
                    let x = padded(&mut rng, bounds.x, bounds.width, pad);
                    let y = padded(&mut rng, bounds.y, bounds.height, pad);
                    let [min, max] = entry.group_size;
                    let size = rng.next_int_range(min, max).max(1);
                    plan.push((entry.template.clone(), Vec2::new(x, y), size));
                }
            }
            plan
        };

        let mut spawned = 0;
        for (template, center, size) in plan {
            let options = SpawnOptions { respawn: true, ..SpawnOptions::default() };
            match self.spawn_enemy_group(biome, center, &template, size, options) {
                Ok(members) => spawned += members.len(),
                Err(e) => warn!("Skipping {} group in {}: {}", template, biome, e),
            }
        }
        info!("Populated {} with {} enemies", biome, spawned);
        spawned
    }

    /// Live hostile non-boss actors assigned to a biome.
    pub fn enemies_in_biome(&self, biome: &BiomeId) -> Vec<ActorId> {
        let guard = self.registry.borrow();
        let reg: &EntityRegistry = &guard;
        [Category::EnemyDinosaur, Category::EnemySoldier]
            .into_iter()
            .flat_map(|cat| reg.by_type(cat))
            .filter(|a| a.is_alive() && a.biome.as_ref() == Some(biome))
            .map(|a| a.id)
            .collect()
    }

    /// Remove every enemy of a biome and forget its packs (no respawn).
    /// Returns the number removed.
    pub fn clear_biome_enemies(&self, biome: &BiomeId) -> usize {
        let removed = {
            let mut reg = self.registry.borrow_mut();
            let ids: Vec<ActorId> = [Category::EnemyDinosaur, Category::EnemySoldier]
                .into_iter()
                .flat_map(|cat| reg.ids_by_type(cat))
                .filter(|id| reg.get(*id).is_some_and(|a| a.biome.as_ref() == Some(biome)))
                .collect();
            ids.into_iter().filter(|id| reg.remove(*id).is_some()).count()
        };
        self.groups.borrow_mut().retain(|_, g| &g.biome != biome);
        info!("Cleared {} enemies from {}", removed, biome);
        removed
    }

    /// Start timers for wiped packs and respawn the ones that are due.
    pub fn update(&self, dt_ms: f32) {
        let respawn_ms = self.tuning.group_respawn_secs * 1000.0;
        let due: Vec<GroupRecord> = {
            let reg = self.registry.borrow();
            let mut groups = self.groups.borrow_mut();
            let mut due = Vec::new();
            for (id, group) in groups.iter_mut() {
                match group.respawn_ms.as_mut() {
                    Some(remaining) => {
                        *remaining -= dt_ms;
                        if *remaining <= 0.0 {
                            due.push(group.clone());
                        }
                    }
                    None => {
                        let wiped = group
                            .members
                            .iter()
                            .all(|m| reg.get(*m).map_or(true, |a| !a.is_alive()));
                        if wiped {
                            if group.options.respawn {
                                debug!("Group {} wiped, respawning in {}s", id, self.tuning.group_respawn_secs);
                                group.respawn_ms = Some(respawn_ms);
                            } else {
                                group.members.clear();
                            }
                        }
                    }
                }
            }
            // Due packs are re-inserted by the respawn below
            groups.retain(|_, g| match g.respawn_ms {
                Some(remaining) => remaining > 0.0,
                None => !g.members.is_empty(),
            });
            due
        };

        for group in due {
            let GroupRecord { biome, center, template, count, options, .. } = group;
            if let Err(e) = self.spawn_enemy_group(&biome, center, &template, count, options) {
                warn!("Group respawn in {} failed: {}", biome, e);
            }
        }
    }

    /// Packs currently tracked.
    pub fn group_count(&self) -> usize {
        self.groups.borrow().len()
    }

    /// Seconds until a wiped pack returns, rounded up.
    pub fn group_respawn_remaining_secs(&self, group: &GroupId) -> Option<u32> {
        self.groups
            .borrow()
            .get(group)
            .and_then(|g| g.respawn_ms)
            .map(|ms| (ms.max(0.0) / 1000.0).ceil() as u32)
    }

    fn mint_group(&self, biome: &BiomeId) -> GroupId {
        let n = self.next_group.get();
        self.next_group.set(n + 1);
        group_id(biome, n)
    }

    fn scale(&self, actor: &mut Actor, level: u32, elite: bool) {
        let diff = difficulty(level);
        let elite_mult = if elite { self.tuning.elite_multiplier } else { 1.0 };

        actor.level = level;
        actor.elite = elite;
        if let Some(health) = actor.health.as_mut() {
            health.max *= diff.health * elite_mult;
            health.current = health.max;
        }
        if let Some(stats) = actor.stats.as_mut() {
            stats.damage *= diff.damage * elite_mult;
            stats.defense *= elite_mult;
        }
    }
}

/// Random coordinate inside `[start + pad, start + len - pad]`, or the
/// middle when the span is narrower than the padding.
fn padded(rng: &mut DeterministicRng, start: f32, len: f32, pad: f32) -> f32 {
    if len <= pad * 2.0 {
        start + len / 2.0
    } else {
        rng.next_range(start + pad, start + len - pad)
    }
}

// =============================================================================
// TESTS
// =============================================================================
