//! Subsystem Scheduler
//!
//! Boots subsystems in priority order, then drives their per-frame updates
//! in that same order.
//!
//! ## Boot
//!
//! 1. Descriptors are stable-sorted by ascending priority.
//! 2. Each descriptor is matched to a registered subsystem by name.
//! 3. Flagged subsystems are initialized, async ones awaited.
//! 4. A critical failure aborts boot; any other failure drops the
//!    subsystem from the frame loop.
//!
//! ## Frame
//!
//! Every booted subsystem is updated once, in boot order. An error or panic
//! in one update is logged and counted; the rest of the frame still runs.

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use futures_util::future::{FutureExt, LocalBoxFuture};
use serde::{Serialize, Deserialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Static scheduling entry for one subsystem.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubsystemDescriptor {
    /// Name the subsystem registers under
    pub name: String,
    /// Lower runs earlier
    pub priority: i32,
    /// Call the init hook during boot
    #[serde(default)]
    pub requires_init: bool,
    /// Await `init_async` instead of calling `init`
    #[serde(default)]
    pub is_async_init: bool,
    /// Boot fails if this subsystem is missing or fails to initialize
    #[serde(default)]
    pub is_critical: bool,
}

impl SubsystemDescriptor {
    /// Descriptor with no init and not critical.
    pub fn new(name: &str, priority: i32) -> Self {
        Self {
            name: name.to_string(),
            priority,
            requires_init: false,
            is_async_init: false,
            is_critical: false,
        }
    }

    /// Call `init` at boot.
    pub fn with_init(mut self) -> Self {
        self.requires_init = true;
        self
    }

    /// Await `init_async` at boot.
    pub fn with_async_init(mut self) -> Self {
        self.requires_init = true;
        self.is_async_init = true;
        self
    }

    /// Make boot depend on this subsystem.
    pub fn critical(mut self) -> Self {
        self.is_critical = true;
        self
    }
}

/// Subsystem names used by `default_descriptors`.
pub mod names {
    /// Content tables
    pub const CONTENT_LOADER: &str = "content_loader";
    /// Registry sweep and spatial rebuild
    pub const ENTITY_REGISTRY: &str = "entity_registry";
    /// Behavior dispatch and combat reactions
    pub const AI_SYSTEM: &str = "ai_system";
    /// Enemy groups
    pub const ENEMY_SPAWNER: &str = "enemy_spawner";
    /// Attack resolution
    pub const DAMAGE_SYSTEM: &str = "damage_system";
    /// Boss lifecycle
    pub const BOSS_SYSTEM: &str = "boss_system";
}

/// Built-in boot and update order.
pub fn default_descriptors() -> Vec<SubsystemDescriptor> {
    vec![
        SubsystemDescriptor::new(names::CONTENT_LOADER, -6).with_async_init().critical(),
        SubsystemDescriptor::new(names::ENTITY_REGISTRY, 5).with_init().critical(),
        SubsystemDescriptor::new(names::AI_SYSTEM, 12).with_init(),
        SubsystemDescriptor::new(names::ENEMY_SPAWNER, 12).with_init(),
        SubsystemDescriptor::new(names::DAMAGE_SYSTEM, 19).with_init(),
        SubsystemDescriptor::new(names::BOSS_SYSTEM, 23).with_init(),
    ]
}

/// One schedulable unit of the simulation.
pub trait Subsystem {
    /// Registration name, matched against descriptors.
    fn name(&self) -> &str;

    /// Synchronous initialization.
    fn init(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Asynchronous initialization (e.g. loading data from disk).
    fn init_async(&mut self) -> LocalBoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async move { self.init() })
    }

    /// Per-frame update.
    fn update(&mut self, dt_ms: f32) -> anyhow::Result<()>;

    /// Release resources and listeners.
    fn shutdown(&mut self) {}
}

/// Scheduler errors. Only boot reports errors to the host.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A critical subsystem failed init
    #[error("critical subsystem {name} failed to initialize: {source:#}")]
    CriticalInit {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    /// A critical descriptor has no registered subsystem
    #[error("critical subsystem {0} is not registered")]
    MissingCritical(String),

    /// Same name registered twice
    #[error("subsystem {0} registered twice")]
    Duplicate(String),

    /// Registration or boot after boot
    #[error("scheduler already booted")]
    AlreadyBooted,
}

struct Running {
    descriptor: SubsystemDescriptor,
    subsystem: Box<dyn Subsystem>,
    errors: u64,
}

/// Owns subsystems and runs them in priority order.
pub struct Scheduler {
    descriptors: Vec<SubsystemDescriptor>,
    registered: BTreeMap<String, Box<dyn Subsystem>>,
    running: Vec<Running>,
    skipped: Vec<String>,
    frame: u64,
    booted: bool,
}

impl Scheduler {
    /// Scheduler for the given descriptor table.
    pub fn new(descriptors: Vec<SubsystemDescriptor>) -> Self {
        Self {
            descriptors,
            registered: BTreeMap::new(),
            running: Vec::new(),
            skipped: Vec::new(),
            frame: 0,
            booted: false,
        }
    }

    /// Register a subsystem under its own name.
    pub fn register(&mut self, subsystem: Box<dyn Subsystem>) -> Result<(), SchedulerError> {
        if self.booted {
            return Err(SchedulerError::AlreadyBooted);
        }
        let name = subsystem.name().to_string();
        if self.registered.contains_key(&name) {
            return Err(SchedulerError::Duplicate(name));
        }
        self.registered.insert(name, subsystem);
        Ok(())
    }

    /// Descriptors in update order (stable by priority).
    pub fn sorted_descriptors(&self) -> Vec<SubsystemDescriptor> {
        let mut sorted = self.descriptors.clone();
        sorted.sort_by_key(|d| d.priority);
        sorted
    }

    /// Initialize every subsystem and fix the frame order.
    ///
    /// On a critical failure the subsystems already initialized are shut
    /// down again, in reverse order, before the error is returned.
    pub async fn boot(&mut self) -> Result<(), SchedulerError> {
        if self.booted {
            return Err(SchedulerError::AlreadyBooted);
        }

        for descriptor in self.sorted_descriptors() {
            let Some(mut subsystem) = self.registered.remove(&descriptor.name) else {
                if descriptor.is_critical {
                    self.abort_boot();
                    return Err(SchedulerError::MissingCritical(descriptor.name));
                }
                warn!("Subsystem {} not registered, skipping", descriptor.name);
                self.skipped.push(descriptor.name);
                continue;
            };

            if descriptor.requires_init {
                let result = if descriptor.is_async_init {
                    AssertUnwindSafe(subsystem.init_async())
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|_| Err(anyhow::anyhow!("panicked during init")))
                } else {
                    catch_unwind(AssertUnwindSafe(|| subsystem.init()))
                        .unwrap_or_else(|_| Err(anyhow::anyhow!("panicked during init")))
                };

                if let Err(e) = result {
                    if descriptor.is_critical {
                        error!("Critical subsystem {} failed to initialize: {:#}", descriptor.name, e);
                        self.abort_boot();
                        return Err(SchedulerError::CriticalInit { name: descriptor.name, source: e });
                    }
                    error!("Subsystem {} failed to initialize, skipping: {:#}", descriptor.name, e);
                    self.skipped.push(descriptor.name);
                    continue;
                }
            }

            info!("Subsystem {} ready (priority {})", descriptor.name, descriptor.priority);
            self.running.push(Running { descriptor, subsystem, errors: 0 });
        }

        for name in self.registered.keys() {
            warn!("Subsystem {} has no descriptor and will not run", name);
        }
        self.booted = true;
        info!("Boot complete: {} running, {} skipped", self.running.len(), self.skipped.len());
        Ok(())
    }

    fn abort_boot(&mut self) {
        while let Some(mut running) = self.running.pop() {
            running.subsystem.shutdown();
        }
    }

    /// Run one frame. Returns the number of subsystems that failed.
    pub fn update(&mut self, dt_ms: f32) -> usize {
        let mut failed = 0;
        for running in &mut self.running {
            let outcome = catch_unwind(AssertUnwindSafe(|| running.subsystem.update(dt_ms)));
            let err = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => format!("{:#}", e),
                Err(_) => "panicked".to_string(),
            };
            running.errors += 1;
            failed += 1;
            error!("Subsystem {} update failed on frame {}: {}", running.descriptor.name, self.frame, err);
        }
        self.frame += 1;
        failed
    }

    /// Shut every subsystem down in reverse update order.
    pub fn shutdown(&mut self) {
        while let Some(mut running) = self.running.pop() {
            debug!("Shutting down {}", running.descriptor.name);
            running.subsystem.shutdown();
        }
        info!("Scheduler stopped after {} frames", self.frame);
    }

    /// Names of running subsystems, in update order.
    pub fn order(&self) -> Vec<&str> {
        self.running.iter().map(|r| r.descriptor.name.as_str()).collect()
    }

    /// Subsystems left out at boot.
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    /// Frames run so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Failed updates of one subsystem.
    pub fn error_count(&self, name: &str) -> u64 {
        self.running
            .iter()
            .find(|r| r.descriptor.name == name)
            .map_or(0, |r| r.errors)
    }

    /// `boot` has completed.
    pub fn is_booted(&self) -> bool {
        self.booted
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<String>>>;

    #[derive(Clone, Copy, PartialEq)]
    enum Fail {
        Never,
        Init,
        InitPanic,
        Update,
        UpdatePanic,
    }

    struct Probe {
        name: String,
        log: Log,
        fail: Fail,
    }

    impl Probe {
        fn boxed(name: &str, log: &Log, fail: Fail) -> Box<dyn Subsystem> {
            Box::new(Self { name: name.to_string(), log: log.clone(), fail })
        }
    }

    impl Subsystem for Probe {
        fn name(&self) -> &str {
            &self.name
        }

        fn init(&mut self) -> anyhow::Result<()> {
            self.log.borrow_mut().push(format!("init {}", self.name));
            match self.fail {
                Fail::Init => anyhow::bail!("no config"),
                Fail::InitPanic => panic!("init panic"),
                _ => Ok(()),
            }
        }

        fn update(&mut self, _dt_ms: f32) -> anyhow::Result<()> {
            self.log.borrow_mut().push(self.name.clone());
            match self.fail {
                Fail::Update => anyhow::bail!("bad frame"),
                Fail::UpdatePanic => panic!("update panic"),
                _ => Ok(()),
            }
        }

        fn shutdown(&mut self) {
            self.log.borrow_mut().push(format!("shutdown {}", self.name));
        }
    }

    fn updates(log: &Log) -> Vec<String> {
        log.borrow().iter().filter(|l| !l.contains(' ')).cloned().collect()
    }

    #[tokio::test]
    async fn test_priority_order_is_stable() {
        let log: Log = Rc::default();
        let mut scheduler = Scheduler::new(vec![
            SubsystemDescriptor::new("late", 90),
            SubsystemDescriptor::new("tie_a", 5),
            SubsystemDescriptor::new("early", -10),
            SubsystemDescriptor::new("tie_b", 5),
        ]);
        for name in ["late", "tie_a", "early", "tie_b"] {
            scheduler.register(Probe::boxed(name, &log, Fail::Never)).unwrap();
        }

        scheduler.boot().await.unwrap();
        assert_eq!(scheduler.order(), vec!["early", "tie_a", "tie_b", "late"]);

        scheduler.update(50.0);
        scheduler.update(50.0);
        assert_eq!(
            updates(&log),
            vec!["early", "tie_a", "tie_b", "late", "early", "tie_a", "tie_b", "late"]
        );
        assert_eq!(scheduler.frame(), 2);
    }

    #[tokio::test]
    async fn test_failing_update_is_isolated() {
        let log: Log = Rc::default();
        let mut scheduler = Scheduler::new(vec![
            SubsystemDescriptor::new("a", 1),
            SubsystemDescriptor::new("b", 2),
            SubsystemDescriptor::new("c", 3),
            SubsystemDescriptor::new("d", 4),
        ]);
        scheduler.register(Probe::boxed("a", &log, Fail::Never)).unwrap();
        scheduler.register(Probe::boxed("b", &log, Fail::Update)).unwrap();
        scheduler.register(Probe::boxed("c", &log, Fail::UpdatePanic)).unwrap();
        scheduler.register(Probe::boxed("d", &log, Fail::Never)).unwrap();
        scheduler.boot().await.unwrap();

        assert_eq!(scheduler.update(16.0), 2);
        assert_eq!(updates(&log), vec!["a", "b", "c", "d"]);
        assert_eq!(scheduler.error_count("b"), 1);
        assert_eq!(scheduler.error_count("c"), 1);
        assert_eq!(scheduler.error_count("d"), 0);
    }

    #[tokio::test]
    async fn test_non_critical_init_failure_is_skipped() {
        let log: Log = Rc::default();
        let mut scheduler = Scheduler::new(vec![
            SubsystemDescriptor::new("flaky", 1).with_init(),
            SubsystemDescriptor::new("panicky", 2).with_async_init(),
            SubsystemDescriptor::new("absent", 3),
            SubsystemDescriptor::new("solid", 4).with_init(),
        ]);
        scheduler.register(Probe::boxed("flaky", &log, Fail::Init)).unwrap();
        scheduler.register(Probe::boxed("panicky", &log, Fail::InitPanic)).unwrap();
        scheduler.register(Probe::boxed("solid", &log, Fail::Never)).unwrap();

        scheduler.boot().await.unwrap();
        assert_eq!(scheduler.order(), vec!["solid"]);
        assert_eq!(scheduler.skipped(), ["flaky", "panicky", "absent"]);
    }

    #[tokio::test]
    async fn test_critical_init_failure_aborts_boot() {
        let log: Log = Rc::default();
        let mut scheduler = Scheduler::new(vec![
            SubsystemDescriptor::new("first", 1).with_init(),
            SubsystemDescriptor::new("core", 2).with_async_init().critical(),
            SubsystemDescriptor::new("never", 3).with_init(),
        ]);
        scheduler.register(Probe::boxed("first", &log, Fail::Never)).unwrap();
        scheduler.register(Probe::boxed("core", &log, Fail::Init)).unwrap();
        scheduler.register(Probe::boxed("never", &log, Fail::Never)).unwrap();

        let err = scheduler.boot().await.unwrap_err();
        assert!(matches!(err, SchedulerError::CriticalInit { ref name, .. } if name == "core"));
        assert!(!scheduler.is_booted());
        assert_eq!(*log.borrow(), vec!["init first", "init core", "shutdown first"]);
    }

    #[tokio::test]
    async fn test_missing_critical_subsystem() {
        let mut scheduler = Scheduler::new(vec![SubsystemDescriptor::new("core", 0).critical()]);
        let err = scheduler.boot().await.unwrap_err();
        assert!(matches!(err, SchedulerError::MissingCritical(name) if name == "core"));
    }

    #[tokio::test]
    async fn test_duplicate_and_late_registration() {
        let log: Log = Rc::default();
        let mut scheduler = Scheduler::new(vec![SubsystemDescriptor::new("x", 0)]);
        scheduler.register(Probe::boxed("x", &log, Fail::Never)).unwrap();
        assert!(matches!(
            scheduler.register(Probe::boxed("x", &log, Fail::Never)),
            Err(SchedulerError::Duplicate(_))
        ));

        scheduler.boot().await.unwrap();
        assert!(matches!(
            scheduler.register(Probe::boxed("y", &log, Fail::Never)),
            Err(SchedulerError::AlreadyBooted)
        ));
        assert!(matches!(scheduler.boot().await, Err(SchedulerError::AlreadyBooted)));
    }

    #[tokio::test]
    async fn test_shutdown_runs_in_reverse() {
        let log: Log = Rc::default();
        let mut scheduler = Scheduler::new(vec![
            SubsystemDescriptor::new("a", 1),
            SubsystemDescriptor::new("b", 2),
        ]);
        scheduler.register(Probe::boxed("a", &log, Fail::Never)).unwrap();
        scheduler.register(Probe::boxed("b", &log, Fail::Never)).unwrap();
        scheduler.boot().await.unwrap();

        scheduler.shutdown();
        assert_eq!(*log.borrow(), vec!["shutdown b", "shutdown a"]);
        assert!(scheduler.order().is_empty());
    }

    #[test]
    fn test_descriptors_from_json() {
        let json = r#"[
            { "name": "content_loader", "priority": -6, "requires_init": true, "is_async_init": true, "is_critical": true },
            { "name": "ai_system", "priority": 12 }
        ]"#;
        let parsed: Vec<SubsystemDescriptor> = serde_json::from_str(json).unwrap();
        assert_eq!(parsed[0], default_descriptors()[0]);
        assert_eq!(parsed[1], SubsystemDescriptor::new("ai_system", 12));
    }

    #[test]
    fn test_default_order() {
        let scheduler = Scheduler::new(default_descriptors());
        let names: Vec<String> = scheduler.sorted_descriptors().into_iter().map(|d| d.name).collect();
        assert_eq!(
            names,
            vec!["content_loader", "entity_registry", "ai_system", "enemy_spawner", "damage_system", "boss_system"]
        );
    }
}
