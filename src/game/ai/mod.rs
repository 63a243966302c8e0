//! AI Module
//!
//! Per-category state machines and the dispatcher that routes actors to
//! them.
//!
//! ## Module Structure
//!
//! - `dispatch`: behavior table and the per-frame dispatch pass
//! - `enemy`: wander / chase / attack / returning
//! - `boss`: enemy superset with phases and abilities
//! - `npc`: idle / patrol / dialogue
//! - `reactions`: bus listeners for attacks, damage, pack aggro and death

pub mod dispatch;
pub mod enemy;
pub mod boss;
pub mod npc;
pub mod reactions;

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::core::rng::DeterministicRng;
use crate::core::vec2::Vec2;
use crate::game::actor::{Actor, ActorId, BehaviorState, Health, Stats};
use crate::game::config::AiTuning;
use crate::game::events::GameEvent;
use crate::game::registry::EntityRegistry;

pub use dispatch::{BehaviorDispatcher, DispatchStats};

/// Behavior implementations known to the dispatcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorKind {
    /// Regular enemy (also the generic fallback)
    Enemy,
    /// Phased boss
    Boss,
    /// Non-player character
    Npc,
}

/// Errors from a single actor's update. Isolated by the dispatcher.
#[derive(Debug, Error)]
pub enum BehaviorError {
    /// A component the machine needs is absent
    #[error("actor {actor} has no {component} component")]
    MissingComponent {
        actor: ActorId,
        component: &'static str,
    },

    /// Position went NaN or infinite
    #[error("actor {actor} has non-finite position {position:?}")]
    NonFinitePosition { actor: ActorId, position: Vec2 },
}

/// Obstruction test between two points.
///
/// The world/collision layer supplies the real implementation.
pub trait LineOfSight {
    /// True if nothing blocks the segment `from -> to`.
    fn is_clear(&self, from: Vec2, to: Vec2) -> bool;
}

/// Line of sight that is never blocked.
#[derive(Clone, Copy, Debug, Default)]
pub struct OpenField;

impl LineOfSight for OpenField {
    fn is_clear(&self, _from: Vec2, _to: Vec2) -> bool {
        true
    }
}

/// Everything a state machine may read or produce during one update.
///
/// The registry is read-only here: machines mutate only the actor they were
/// given and communicate everything else through queued events.
pub struct BehaviorContext<'a> {
    /// Registry view (the updated actor's own entry is the pre-update copy)
    pub registry: &'a EntityRegistry,
    /// Tuning
    pub tuning: &'a AiTuning,
    /// AI random stream
    pub rng: &'a mut DeterministicRng,
    /// Obstruction test
    pub los: &'a dyn LineOfSight,
    /// Frame delta in ms
    pub dt_ms: f32,
    events: Vec<GameEvent>,
}

impl<'a> BehaviorContext<'a> {
    /// Create a context for one actor update.
    pub fn new(
        registry: &'a EntityRegistry,
        tuning: &'a AiTuning,
        rng: &'a mut DeterministicRng,
        los: &'a dyn LineOfSight,
        dt_ms: f32,
    ) -> Self {
        Self { registry, tuning, rng, los, dt_ms, events: Vec::new() }
    }

    /// Queue an event, published after the update is written back.
    pub fn push_event(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    /// Drain queued events.
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// The live hero, if any.
    pub fn hero(&self) -> Option<&'a Actor> {
        self.registry.hero()
    }

    /// Re-resolve a weak target; dead or removed targets resolve to `None`.
    pub fn resolve_live(&self, id: Option<ActorId>) -> Option<&'a Actor> {
        let registry: &'a EntityRegistry = self.registry;
        id.and_then(|id| registry.get(id)).filter(|a| a.is_alive())
    }

    /// Distance travelled this tick at `speed` units per second.
    pub fn step(&self, speed: f32) -> f32 {
        speed * self.dt_ms / 1000.0
    }
}

/// One state machine.
pub trait Behavior {
    /// Advance `actor` by one tick.
    fn update(&self, actor: &mut Actor, ctx: &mut BehaviorContext<'_>) -> Result<(), BehaviorError>;
}

/// Split borrows of the components a combat machine needs.
pub(crate) struct Body<'a> {
    pub id: ActorId,
    pub position: &'a mut Vec2,
    pub ai: &'a mut BehaviorState,
    pub stats: &'a mut Stats,
    pub health: Option<&'a mut Health>,
}

impl<'a> Body<'a> {
    /// Borrow an actor that has AI and stats components and a finite position.
    pub fn from_actor(actor: &'a mut Actor) -> Result<Self, BehaviorError> {
        let Actor { id, position, ai, stats, health, .. } = actor;
        let id = *id;
        if !position.is_finite() {
            return Err(BehaviorError::NonFinitePosition { actor: id, position: *position });
        }
        let ai = ai.as_mut().ok_or(BehaviorError::MissingComponent { actor: id, component: "ai" })?;
        let stats = stats.as_mut().ok_or(BehaviorError::MissingComponent { actor: id, component: "stats" })?;
        Ok(Self { id, position, ai, stats, health: health.as_mut() })
    }

    /// Step towards `target` at `speed` for this tick.
    pub fn move_towards(&mut self, target: Vec2, speed: f32, ctx: &BehaviorContext<'_>) {
        *self.position = self.position.move_towards(target, ctx.step(speed));
    }
}
