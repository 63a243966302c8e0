//! Simulation Assembly
//!
//! Builds the shared services, hands them to their subsystem adapters and
//! registers those with a scheduler. Hosts drive the result through
//! `boot`, then `advance` (real time) or `step` (one fixed step).

use std::rc::Rc;

use tracing::{info, warn};

use crate::core::hash::StateHash;
use crate::core::rng::DeterministicRng;
use crate::core::vec2::Vec2;
use crate::game::actor::{Actor, ActorId};
use crate::game::ai::npc::{end_dialogue, start_dialogue};
use crate::game::ai::{LineOfSight, OpenField};
use crate::game::bus::EventBus;
use crate::game::config::SimConfig;
use crate::game::content::{ContentError, ContentTables, SharedContent};
use crate::game::damage::DamageResolver;
use crate::game::events::GameEvent;
use crate::game::lifecycle::BossLifecycle;
use crate::game::registry::{EntityRegistry, SharedRegistry};
use crate::game::spawner::EnemySpawner;

use super::clock::FrameClock;
use super::scheduler::{default_descriptors, Scheduler, SchedulerError, Subsystem, SubsystemDescriptor};
use super::systems::{
    AiSystem, BossSystem, ContentLoader, ContentSource, DamageSystem, RegistrySystem, SpawnerSystem,
};

/// Every service plus the scheduler that drives them.
pub struct Simulation {
    config: SimConfig,
    registry: SharedRegistry,
    bus: Rc<EventBus>,
    content: SharedContent,
    lifecycle: Rc<BossLifecycle>,
    spawner: Rc<EnemySpawner>,
    scheduler: Scheduler,
    clock: FrameClock,
}

impl Simulation {
    /// Default descriptors, open-field line of sight.
    pub fn new(config: SimConfig, source: ContentSource) -> Self {
        Self::with_parts(config, source, Box::new(OpenField), default_descriptors())
    }

    /// Assemble with a custom line-of-sight check and descriptor table.
    pub fn with_parts(
        config: SimConfig,
        source: ContentSource,
        los: Box<dyn LineOfSight>,
        descriptors: Vec<SubsystemDescriptor>,
    ) -> Self {
        let registry = EntityRegistry::with_cell_size(config.spatial_cell_size).shared();
        let bus = Rc::new(EventBus::new());
        let content = ContentTables::default().shared();

        let resolver = Rc::new(DamageResolver::new(
            bus.clone(),
            DeterministicRng::for_stream(config.seed, "damage"),
        ));
        let lifecycle = BossLifecycle::new(
            registry.clone(),
            bus.clone(),
            content.clone(),
            config.spawn.clone(),
        );
        let spawner = Rc::new(EnemySpawner::new(
            registry.clone(),
            bus.clone(),
            content.clone(),
            config.spawn.clone(),
            DeterministicRng::for_stream(config.seed, "spawner"),
        ));

        let subsystems: Vec<Box<dyn Subsystem>> = vec![
            Box::new(ContentLoader::new(source, content.clone())),
            Box::new(RegistrySystem::new(registry.clone())),
            Box::new(AiSystem::new(
                registry.clone(),
                bus.clone(),
                config.ai.clone(),
                DeterministicRng::for_stream(config.seed, "ai"),
                los,
            )),
            Box::new(SpawnerSystem::new(spawner.clone(), content.clone(), config.spawn.populate_on_boot)),
            Box::new(DamageSystem::new(registry.clone(), bus.clone(), resolver)),
            Box::new(BossSystem::new(lifecycle.clone())),
        ];

        let mut scheduler = Scheduler::new(descriptors);
        for subsystem in subsystems {
            let name = subsystem.name().to_string();
            if let Err(e) = scheduler.register(subsystem) {
                warn!("Could not register {}: {}", name, e);
            }
        }

        Self {
            clock: FrameClock::from_config(&config),
            config,
            registry,
            bus,
            content,
            lifecycle,
            spawner,
            scheduler,
        }
    }

    /// Boot every subsystem.
    pub async fn boot(&mut self) -> Result<(), SchedulerError> {
        self.scheduler.boot().await?;
        info!(
            "Simulation booted (seed {:#x}, {} ms steps, {} actors)",
            self.config.seed,
            self.clock.tick_ms(),
            self.registry.borrow().len()
        );
        Ok(())
    }

    /// Run one fixed step. Returns the number of failed subsystem updates.
    pub fn step(&mut self) -> usize {
        self.scheduler.update(self.clock.tick_ms())
    }

    /// Feed real elapsed time; runs as many fixed steps as it covers.
    pub fn advance(&mut self, elapsed_ms: f32) -> u32 {
        let steps = self.clock.advance(elapsed_ms);
        for _ in 0..steps {
            self.step();
        }
        steps
    }

    /// Stop every subsystem, in reverse order.
    pub fn shutdown(&mut self) {
        self.scheduler.shutdown();
    }

    // =========================================================================
    // HOST COMMANDS
    // =========================================================================

    /// Add the hero.
    pub fn spawn_hero(&self, position: Vec2, max_health: f32) -> ActorId {
        self.registry.borrow_mut().add(Actor::hero(position, max_health))
    }

    /// Add an NPC from its content template.
    pub fn spawn_npc(&self, template: &str, position: Vec2) -> Result<ActorId, ContentError> {
        let npc = self.content.borrow().build_npc(template, position)?;
        Ok(self.registry.borrow_mut().add(npc))
    }

    /// Announce that the hero entered a biome.
    pub fn enter_biome(&self, biome: &str) {
        let hero = self.registry.borrow().hero().map(|h| h.id);
        self.bus.publish(&GameEvent::biome_entered(biome, hero));
    }

    /// Ask the damage system to resolve an attack.
    pub fn request_attack(&self, attacker: ActorId, target: ActorId, base_damage: u32) {
        self.bus.publish(&GameEvent::attack_requested(attacker, target, base_damage));
    }

    /// Put an NPC into dialogue with the hero.
    pub fn start_dialogue(&self, npc: ActorId) -> bool {
        start_dialogue(&self.registry, &self.bus, npc)
    }

    /// End an NPC's dialogue.
    pub fn end_dialogue(&self, npc: ActorId) -> bool {
        end_dialogue(&self.registry, &self.bus, npc)
    }

    /// Hash of the registry at the current frame.
    pub fn state_hash(&self) -> StateHash {
        self.registry.borrow().state_hash(self.scheduler.frame())
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    /// Config the simulation was built with.
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Shared entity registry.
    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    /// Event bus.
    pub fn bus(&self) -> &Rc<EventBus> {
        &self.bus
    }

    /// Content tables.
    pub fn content(&self) -> &SharedContent {
        &self.content
    }

    /// Boss lifecycle manager.
    pub fn lifecycle(&self) -> &Rc<BossLifecycle> {
        &self.lifecycle
    }

    /// Enemy group spawner.
    pub fn spawner(&self) -> &Rc<EnemySpawner> {
        &self.spawner
    }

    /// Subsystem scheduler.
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Frame clock.
    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    /// Scheduler frames run so far.
    pub fn frame(&self) -> u64 {
        self.scheduler.frame()
    }
}

// =============================================================================
// TESTS
// =============================================================================
