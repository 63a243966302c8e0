//! Boss Lifecycle
//!
//! One slot per biome: either a live boss or a running respawn timer, never
//! both. Every spawn goes through `spawn_boss`, which refuses while the slot
//! is occupied, so a biome never holds two bosses.
//!
//! Driven by three inputs:
//! - `EntityDied` for a boss starts the biome's respawn timer
//! - `BiomeEntered` spawns the biome's boss if the slot is empty
//! - `update(dt)` counts timers down and respawns on expiry

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use tracing::{debug, info, warn};

use crate::core::vec2::Vec2;
use crate::game::actor::{ActorId, BiomeId, GroupId};
use crate::game::bus::{listener, EventBus, Subscriptions};
use crate::game::config::SpawnTuning;
use crate::game::content::SharedContent;
use crate::game::events::{EventTag, GameEvent};
use crate::game::registry::SharedRegistry;

/// Boss level when the biome has no level range.
pub const DEFAULT_BOSS_LEVEL: u32 = 10;

/// Per-biome boss state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BossSlot {
    /// A boss is in the world
    Active(ActorId),
    /// Waiting to respawn
    Respawning { remaining_ms: f32 },
}

/// Spawns, tracks and respawns biome bosses.
pub struct BossLifecycle {
    registry: SharedRegistry,
    bus: Rc<EventBus>,
    content: SharedContent,
    tuning: SpawnTuning,
    slots: RefCell<BTreeMap<BiomeId, BossSlot>>,
    /// Countdown to the first `spawn_all_bosses`; `None` once it has run
    initial_delay_ms: Cell<Option<f32>>,
    subscriptions: RefCell<Subscriptions>,
}

impl BossLifecycle {
    /// Manager with every biome slot empty.
    pub fn new(registry: SharedRegistry, bus: Rc<EventBus>, content: SharedContent, tuning: SpawnTuning) -> Rc<Self> {
        let initial = tuning.boss_initial_delay_ms;
        Rc::new(Self {
            registry,
            bus,
            content,
            tuning,
            slots: RefCell::new(BTreeMap::new()),
            initial_delay_ms: Cell::new(Some(initial)),
            subscriptions: RefCell::new(Subscriptions::new()),
        })
    }

    /// Register the `EntityDied` and `BiomeEntered` listeners.
    pub fn subscribe(self: &Rc<Self>) {
        let mut subs = self.subscriptions.borrow_mut();

        let me: Weak<Self> = Rc::downgrade(self);
        subs.add(&self.bus, EventTag::EntityDied, listener(move |event| {
            if let (Some(me), GameEvent::EntityDied { actor, is_boss: true, biome: Some(biome), respawn_secs, .. }) =
                (me.upgrade(), event)
            {
                me.on_boss_died(*actor, biome, *respawn_secs);
            }
            Ok(())
        }));

        let me: Weak<Self> = Rc::downgrade(self);
        subs.add(&self.bus, EventTag::BiomeEntered, listener(move |event| {
            if let (Some(me), GameEvent::BiomeEntered { biome, .. }) = (me.upgrade(), event) {
                me.spawn_boss(biome);
            }
            Ok(())
        }));
    }

    /// Remove this manager's listeners.
    pub fn unsubscribe(&self) {
        self.subscriptions.borrow_mut().clear(&self.bus);
    }

    /// Start the respawn timer for a dead boss's biome.
    ///
    /// Ignored if the biome already tracks a different boss or a timer.
    pub fn on_boss_died(&self, boss: ActorId, biome: &BiomeId, respawn_secs: Option<f32>) {
        let secs = respawn_secs
            .or_else(|| self.content.borrow().biome(biome).and_then(|b| b.respawn_secs))
            .unwrap_or(self.tuning.boss_default_respawn_secs);

        let mut slots = self.slots.borrow_mut();
        match slots.get(biome) {
            Some(BossSlot::Active(id)) if *id != boss => {
                debug!("Untracked boss {} died in {}", boss, biome);
                return;
            }
            Some(BossSlot::Respawning { .. }) => return,
            _ => {}
        }
        slots.insert(biome.clone(), BossSlot::Respawning { remaining_ms: secs * 1000.0 });
        info!("Boss of {} respawns in {}s", biome, secs);
    }

    /// Advance the initial spawn delay and every respawn timer.
    pub fn update(&self, dt_ms: f32) {
        if let Some(remaining) = self.initial_delay_ms.get() {
            let remaining = remaining - dt_ms;
            if remaining <= 0.0 {
                self.initial_delay_ms.set(None);
                self.spawn_all_bosses();
            } else {
                self.initial_delay_ms.set(Some(remaining));
            }
        }

        let due: Vec<BiomeId> = {
            let mut slots = self.slots.borrow_mut();
            let mut due = Vec::new();
            for (biome, slot) in slots.iter_mut() {
                if let BossSlot::Respawning { remaining_ms } = slot {
                    *remaining_ms -= dt_ms;
                    if *remaining_ms <= 0.0 {
                        due.push(biome.clone());
                    }
                }
            }
            for biome in &due {
                slots.remove(biome);
            }
            due
        };

        for biome in due {
            info!("Respawning boss for {}", biome);
            self.spawn_boss(&biome);
        }
    }

    /// Spawn every biome's boss. Returns how many spawned.
    pub fn spawn_all_bosses(&self) -> usize {
        let biomes = self.content.borrow().biome_ids();
        let spawned = biomes.iter().filter(|b| self.spawn_boss(b).is_some()).count();
        info!("Spawned {} boss(es)", spawned);
        spawned
    }

    /// Spawn a biome's boss if its slot is empty.
    ///
    /// Returns `None` (no-op) if a boss or a respawn timer already exists, or
    /// the biome has no boss configured.
    pub fn spawn_boss(&self, biome: &BiomeId) -> Option<ActorId> {
        if self.slots.borrow().contains_key(biome) {
            return None;
        }

        let actor = {
            let content = self.content.borrow();
            let def = content.biome(biome)?;
            let template = def.boss.as_deref()?;
            let position = self.spawn_position(biome);
            let mut actor = match content.build_boss(template, position) {
                Ok(actor) => actor,
                Err(e) => {
                    warn!("Cannot spawn boss for {}: {}", biome, e);
                    return None;
                }
            };
            actor.level = def.level_range.map_or(DEFAULT_BOSS_LEVEL, |[_, max]| max);
            actor.biome = Some(biome.clone());
            if let Some(ai) = actor.ai.as_mut() {
                ai.group = Some(GroupId(format!("boss_{}", biome)));
            }
            actor
        };

        let position = actor.position;
        let id = self.registry.borrow_mut().add(actor);
        self.slots.borrow_mut().insert(biome.clone(), BossSlot::Active(id));
        info!("Boss {} spawned in {} at {}", id, biome, position);

        self.bus.publish(&GameEvent::BossSpawned {
            boss: id,
            biome: biome.clone(),
            position,
        });
        Some(id)
    }

    /// Where a biome's boss appears: configured spawn, else bounds centre,
    /// else a fixed point per biome around the world offset.
    pub fn spawn_position(&self, biome: &BiomeId) -> Vec2 {
        let content = self.content.borrow();
        if let Some(def) = content.biome(biome) {
            if let Some(pos) = def.boss_spawn {
                return pos;
            }
            if let Some(bounds) = def.bounds {
                return bounds.center();
            }
        }

        let local = match biome.as_str() {
            "grasslands" => Vec2::new(5500.0, 3000.0),
            "tundra" => Vec2::new(3000.0, 5500.0),
            "desert" => Vec2::new(5500.0, 5500.0),
            "lava_crags" => Vec2::new(3000.0, 3000.0),
            _ => Vec2::new(3500.0, 3500.0),
        };
        self.tuning.world_offset + local
    }

    /// Current slot for a biome.
    pub fn slot(&self, biome: &BiomeId) -> Option<BossSlot> {
        self.slots.borrow().get(biome).copied()
    }

    /// The tracked boss of a biome.
    pub fn boss(&self, biome: &BiomeId) -> Option<ActorId> {
        match self.slot(biome) {
            Some(BossSlot::Active(id)) => Some(id),
            _ => None,
        }
    }

    /// Whether the biome's boss is in the world and alive.
    pub fn is_boss_alive(&self, biome: &BiomeId) -> bool {
        self.boss(biome)
            .is_some_and(|id| self.registry.borrow().get(id).is_some_and(|a| a.is_alive()))
    }

    /// Whole seconds until the biome's boss returns, rounded up.
    pub fn respawn_remaining_secs(&self, biome: &BiomeId) -> Option<u32> {
        match self.slot(biome) {
            Some(BossSlot::Respawning { remaining_ms }) => Some((remaining_ms.max(0.0) / 1000.0).ceil() as u32),
            _ => None,
        }
    }

    /// Whether the initial spawn has happened.
    pub fn initial_spawn_done(&self) -> bool {
        self.initial_delay_ms.get().is_none()
    }
}

// =============================================================================
// TESTS
// =============================================================================
