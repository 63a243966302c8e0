//! Behavior Dispatch
//!
//! Fixed table of state machines plus the per-frame pass that runs them.
//!
//! Each actor is updated on a private copy. The copy is written back only if
//! the update returned `Ok`; an error or panic leaves the registry entry as
//! it was for the next frame. Queued events are published after the
//! write-back, once no registry borrow is held.

use std::cell::RefCell;
use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{debug, error, warn};

use crate::core::rng::DeterministicRng;
use crate::game::actor::Actor;
use crate::game::bus::EventBus;
use crate::game::config::AiTuning;
use crate::game::registry::EntityRegistry;

use super::boss::BossBehavior;
use super::enemy::EnemyBehavior;
use super::npc::NpcBehavior;
use super::{Behavior, BehaviorContext, BehaviorError, BehaviorKind, LineOfSight};

/// Counters for one dispatch pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Actors whose update ran
    pub visited: usize,
    /// Updates that errored or panicked
    pub failed: usize,
    /// Events published after write-back
    pub events: usize,
}

/// Routes each actor to its state machine.
#[derive(Clone, Copy, Debug, Default)]
pub struct BehaviorDispatcher {
    enemy: EnemyBehavior,
    boss: BossBehavior,
    npc: NpcBehavior,
}

impl BehaviorDispatcher {
    /// Dispatcher with the built-in machines.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override, else category default, else the generic enemy machine.
    pub fn select(actor: &Actor) -> BehaviorKind {
        actor
            .behavior_override
            .or_else(|| actor.category.default_behavior())
            .unwrap_or(BehaviorKind::Enemy)
    }

    /// The machine for a kind.
    pub fn behavior(&self, kind: BehaviorKind) -> &dyn Behavior {
        match kind {
            BehaviorKind::Enemy => &self.enemy,
            BehaviorKind::Boss => &self.boss,
            BehaviorKind::Npc => &self.npc,
        }
    }

    /// Advance one actor by one tick.
    pub fn update(&self, actor: &mut Actor, ctx: &mut BehaviorContext<'_>) -> Result<(), BehaviorError> {
        self.behavior(Self::select(actor)).update(actor, ctx)
    }

    /// Whether a pass should visit this actor.
    pub fn should_dispatch(actor: &Actor) -> bool {
        actor.active && actor.ai.is_some() && !actor.is_dead()
    }

    /// Run every eligible actor once, in registry id order.
    ///
    /// The id list is taken up front: actors added during the pass wait for
    /// the next one, actors removed during it are skipped. Events from one
    /// actor (pack aggro, deaths) are fully handled before the next actor
    /// is read, so later actors may already see their effect this pass.
    pub fn run_pass(
        &self,
        registry: &RefCell<EntityRegistry>,
        bus: &EventBus,
        tuning: &AiTuning,
        rng: &mut DeterministicRng,
        los: &dyn LineOfSight,
        dt_ms: f32,
    ) -> DispatchStats {
        let mut stats = DispatchStats::default();
        let ids = registry.borrow().ids();

        for id in ids {
            let (working, result, events) = {
                let reg = registry.borrow();
                let Some(actor) = reg.get(id) else {
                    continue;
                };
                if !Self::should_dispatch(actor) {
                    continue;
                }

                let mut working = actor.clone();
                let mut ctx = BehaviorContext::new(&reg, tuning, &mut *rng, los, dt_ms);
                let result = catch_unwind(AssertUnwindSafe(|| self.update(&mut working, &mut ctx)));
                let events = ctx.take_events();
                (working, result, events)
            };
            stats.visited += 1;

            match result {
                Ok(Ok(())) => {
                    #[cfg(feature = "debug-tracing")]
                    tracing::trace!("{} -> {:?} at {}", id, working.mode(), working.position);
                    registry.borrow_mut().replace(working);
                    stats.events += events.len();
                    bus.publish_all(events);
                }
                Ok(Err(e)) => {
                    stats.failed += 1;
                    warn!("Behavior update for {} skipped: {}", id, e);
                }
                Err(_) => {
                    stats.failed += 1;
                    error!("Behavior update for {} panicked", id);
                }
            }
        }

        debug!(
            "Dispatch pass: {} visited, {} failed, {} events",
            stats.visited, stats.failed, stats.events
        );
        stats
    }
}
