//! Subsystem Adapters
//!
//! Wraps the game services as schedulable subsystems. Each adapter
//! registers under one of the names in `scheduler::names`, wires its bus
//! listeners in `init`, and removes them again in `shutdown`.

use std::path::PathBuf;
use std::rc::Rc;

use futures_util::future::LocalBoxFuture;
use tracing::{debug, info};

use crate::core::rng::DeterministicRng;
use crate::game::ai::reactions::{attack_listener, damage_listener};
use crate::game::ai::{BehaviorDispatcher, LineOfSight};
use crate::game::bus::{EventBus, Subscriptions};
use crate::game::config::AiTuning;
use crate::game::content::{ContentTables, SharedContent};
use crate::game::damage::DamageResolver;
use crate::game::events::EventTag;
use crate::game::lifecycle::BossLifecycle;
use crate::game::registry::SharedRegistry;
use crate::game::spawner::EnemySpawner;

use super::scheduler::{names, Subsystem};

// =============================================================================
// CONTENT LOADER
// =============================================================================

/// Where the content loader gets its tables.
#[derive(Clone, Debug)]
pub enum ContentSource {
    /// `data/content.json`, compiled in
    Bundled,
    /// JSON file read at boot
    File(PathBuf),
    /// Tables built by the host
    Tables(ContentTables),
}

/// Fills the shared content tables during boot.
pub struct ContentLoader {
    source: ContentSource,
    content: SharedContent,
}

impl ContentLoader {
    /// Loader filling `content` from `source`.
    pub fn new(source: ContentSource, content: SharedContent) -> Self {
        Self { source, content }
    }

    fn install(&self, tables: ContentTables) {
        info!(
            "Content ready: {} enemies, {} bosses, {} npcs, {} biomes",
            tables.enemies.len(),
            tables.bosses.len(),
            tables.npcs.len(),
            tables.biomes.len()
        );
        *self.content.borrow_mut() = tables;
    }
}

impl Subsystem for ContentLoader {
    fn name(&self) -> &str {
        names::CONTENT_LOADER
    }

    fn init(&mut self) -> anyhow::Result<()> {
        let tables = match &self.source {
            ContentSource::Bundled => ContentTables::bundled()?,
            ContentSource::Tables(tables) => {
                tables.validate()?;
                tables.clone()
            }
            ContentSource::File(path) => {
                anyhow::bail!("{} can only be loaded by async init", path.display())
            }
        };
        self.install(tables);
        Ok(())
    }

    fn init_async(&mut self) -> LocalBoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async move {
            let ContentSource::File(path) = &self.source else {
                return self.init();
            };
            let tables = ContentTables::load(path).await?;
            self.install(tables);
            Ok(())
        })
    }

    fn update(&mut self, _dt_ms: f32) -> anyhow::Result<()> {
        Ok(())
    }
}

// =============================================================================
// ENTITY REGISTRY
// =============================================================================

/// Sweeps deactivated actors and refreshes the spatial index each frame.
pub struct RegistrySystem {
    registry: SharedRegistry,
}

impl RegistrySystem {
    /// System over `registry`.
    pub fn new(registry: SharedRegistry) -> Self {
        Self { registry }
    }
}

impl Subsystem for RegistrySystem {
    fn name(&self) -> &str {
        names::ENTITY_REGISTRY
    }

    fn init(&mut self) -> anyhow::Result<()> {
        let mut reg = self.registry.borrow_mut();
        reg.rebuild_spatial();
        info!("Entity registry ready with {} actors", reg.len());
        Ok(())
    }

    fn update(&mut self, _dt_ms: f32) -> anyhow::Result<()> {
        let mut reg = self.registry.borrow_mut();
        let removed = reg.sweep_inactive();
        if !removed.is_empty() {
            debug!("Swept {} inactive actors", removed.len());
        }
        reg.rebuild_spatial();
        Ok(())
    }
}

// =============================================================================
// AI
// =============================================================================

/// Runs the dispatch pass and owns the damage reactions (aggro, pack aggro,
/// death).
pub struct AiSystem {
    registry: SharedRegistry,
    bus: Rc<EventBus>,
    tuning: AiTuning,
    rng: DeterministicRng,
    los: Box<dyn LineOfSight>,
    dispatcher: BehaviorDispatcher,
    subscriptions: Subscriptions,
}

impl AiSystem {
    /// AI system; listeners are wired in `init`.
    pub fn new(
        registry: SharedRegistry,
        bus: Rc<EventBus>,
        tuning: AiTuning,
        rng: DeterministicRng,
        los: Box<dyn LineOfSight>,
    ) -> Self {
        Self {
            registry,
            bus,
            tuning,
            rng,
            los,
            dispatcher: BehaviorDispatcher::new(),
            subscriptions: Subscriptions::new(),
        }
    }
}

impl Subsystem for AiSystem {
    fn name(&self) -> &str {
        names::AI_SYSTEM
    }

    fn init(&mut self) -> anyhow::Result<()> {
        let reaction = damage_listener(
            self.registry.clone(),
            Rc::downgrade(&self.bus),
            self.tuning.pack_aggro_radius,
        );
        self.subscriptions.add(&self.bus, EventTag::DamageDealt, reaction);
        Ok(())
    }

    fn update(&mut self, dt_ms: f32) -> anyhow::Result<()> {
        self.dispatcher.run_pass(
            &self.registry,
            &self.bus,
            &self.tuning,
            &mut self.rng,
            &*self.los,
            dt_ms,
        );
        Ok(())
    }

    fn shutdown(&mut self) {
        self.subscriptions.clear(&self.bus);
    }
}

// =============================================================================
// DAMAGE
// =============================================================================

/// Turns `AttackRequested` into applied damage.
pub struct DamageSystem {
    registry: SharedRegistry,
    bus: Rc<EventBus>,
    resolver: Rc<DamageResolver>,
    subscriptions: Subscriptions,
}

impl DamageSystem {
    /// Damage system; the listener is wired in `init`.
    pub fn new(registry: SharedRegistry, bus: Rc<EventBus>, resolver: Rc<DamageResolver>) -> Self {
        Self { registry, bus, resolver, subscriptions: Subscriptions::new() }
    }
}

impl Subsystem for DamageSystem {
    fn name(&self) -> &str {
        names::DAMAGE_SYSTEM
    }

    fn init(&mut self) -> anyhow::Result<()> {
        let handler = attack_listener(self.registry.clone(), Rc::downgrade(&self.resolver));
        self.subscriptions.add(&self.bus, EventTag::AttackRequested, handler);
        Ok(())
    }

    // Damage is event driven; nothing to do per frame.
    fn update(&mut self, _dt_ms: f32) -> anyhow::Result<()> {
        Ok(())
    }

    fn shutdown(&mut self) {
        self.subscriptions.clear(&self.bus);
    }
}

// =============================================================================
// SPAWNER
// =============================================================================

/// Populates biomes at boot and runs group respawn timers.
pub struct SpawnerSystem {
    spawner: Rc<EnemySpawner>,
    content: SharedContent,
    populate_on_boot: bool,
}

impl SpawnerSystem {
    /// Spawner system; populates every biome at init when `populate_on_boot`.
    pub fn new(spawner: Rc<EnemySpawner>, content: SharedContent, populate_on_boot: bool) -> Self {
        Self { spawner, content, populate_on_boot }
    }
}

impl Subsystem for SpawnerSystem {
    fn name(&self) -> &str {
        names::ENEMY_SPAWNER
    }

    fn init(&mut self) -> anyhow::Result<()> {
        if !self.populate_on_boot {
            return Ok(());
        }
        let biomes = self.content.borrow().biome_ids();
        let spawned: usize = biomes.iter().map(|b| self.spawner.populate_biome(b)).sum();
        info!("Populated {} biomes with {} enemies", biomes.len(), spawned);
        Ok(())
    }

    fn update(&mut self, dt_ms: f32) -> anyhow::Result<()> {
        self.spawner.update(dt_ms);
        Ok(())
    }
}

// =============================================================================
// BOSSES
// =============================================================================

/// Drives the boss lifecycle timers.
pub struct BossSystem {
    lifecycle: Rc<BossLifecycle>,
}

impl BossSystem {
    /// System driving `lifecycle`.
    pub fn new(lifecycle: Rc<BossLifecycle>) -> Self {
        Self { lifecycle }
    }
}

impl Subsystem for BossSystem {
    fn name(&self) -> &str {
        names::BOSS_SYSTEM
    }

    fn init(&mut self) -> anyhow::Result<()> {
        self.lifecycle.subscribe();
        Ok(())
    }

    fn update(&mut self, dt_ms: f32) -> anyhow::Result<()> {
        self.lifecycle.update(dt_ms);
        Ok(())
    }

    fn shutdown(&mut self) {
        self.lifecycle.unsubscribe();
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::vec2::Vec2;
    use crate::game::actor::{Actor, Category};
    use crate::game::ai::OpenField;
    use crate::game::registry::EntityRegistry;

    #[tokio::test]
    async fn test_content_loader_fills_shared_tables() {
        let content = ContentTables::default().shared();
        let mut loader = ContentLoader::new(ContentSource::Bundled, content.clone());

        loader.init_async().await.unwrap();
        assert!(content.borrow().biomes.contains_key("grasslands"));
    }

    #[tokio::test]
    async fn test_content_loader_missing_file_fails() {
        let content = ContentTables::default().shared();
        let mut loader = ContentLoader::new(
            ContentSource::File(PathBuf::from("does/not/exist.json")),
            content.clone(),
        );

        assert!(loader.init_async().await.is_err());
        assert!(loader.init().is_err());
        assert!(content.borrow().biomes.is_empty());
    }

    #[test]
    fn test_registry_system_sweeps_inactive() {
        let registry = EntityRegistry::new().shared();
        let keep = registry.borrow_mut().add(Actor::new(Category::EnemyDinosaur, Vec2::new(0.0, 0.0)));
        let gone = registry.borrow_mut().add(Actor::new(Category::EnemyDinosaur, Vec2::new(5.0, 0.0)));
        if let Some(actor) = registry.borrow_mut().get_mut(gone) {
            actor.active = false;
        }

        let mut system = RegistrySystem::new(registry.clone());
        system.update(50.0).unwrap();

        let reg = registry.borrow();
        assert!(reg.contains(keep));
        assert!(!reg.contains(gone));
        assert_eq!(reg.query_radius(Vec2::new(0.0, 0.0), 10.0).len(), 1);
    }

    #[test]
    fn test_listeners_removed_on_shutdown() {
        let registry = EntityRegistry::new().shared();
        let bus = Rc::new(EventBus::new());
        let resolver = Rc::new(DamageResolver::new(bus.clone(), DeterministicRng::new(1)));

        let mut ai = AiSystem::new(
            registry.clone(),
            bus.clone(),
            AiTuning::default(),
            DeterministicRng::new(2),
            Box::new(OpenField),
        );
        let mut damage = DamageSystem::new(registry, bus.clone(), resolver);

        ai.init().unwrap();
        damage.init().unwrap();
        assert_eq!(bus.listener_count(EventTag::DamageDealt), 1);
        assert_eq!(bus.listener_count(EventTag::AttackRequested), 1);

        damage.shutdown();
        ai.shutdown();
        assert_eq!(bus.listener_count(EventTag::DamageDealt), 0);
        assert_eq!(bus.listener_count(EventTag::AttackRequested), 0);
    }
}
