//! NPC State Machine
//!
//! `idle` watches for the hero, `patrol` walks a fixed route, `dialogue`
//! is entered and left only through `start_dialogue` / `end_dialogue`.

use std::cell::RefCell;

use tracing::debug;

use crate::core::vec2::Vec2;
use crate::game::actor::{Actor, ActorId, AiMode, NpcState};
use crate::game::bus::EventBus;
use crate::game::events::GameEvent;
use crate::game::registry::EntityRegistry;

use super::{Behavior, BehaviorContext, BehaviorError};

/// Walk speed when the NPC has no stats component.
pub const DEFAULT_NPC_SPEED: f32 = 50.0;

/// NPC behavior.
#[derive(Clone, Copy, Debug, Default)]
pub struct NpcBehavior;

impl Behavior for NpcBehavior {
    fn update(&self, actor: &mut Actor, ctx: &mut BehaviorContext<'_>) -> Result<(), BehaviorError> {
        let Actor { id, position, ai, stats, .. } = actor;
        let id = *id;
        if !position.is_finite() {
            return Err(BehaviorError::NonFinitePosition { actor: id, position: *position });
        }
        let ai = ai.as_mut().ok_or(BehaviorError::MissingComponent { actor: id, component: "ai" })?;
        let speed = stats.as_ref().map_or(DEFAULT_NPC_SPEED, |s| s.speed);
        let mode = ai.mode;
        let npc = ai.npc.get_or_insert_with(NpcState::default);

        match mode {
            AiMode::Idle => idle(id, *position, npc, ctx),
            AiMode::Patrol => {
                if !patrol(position, npc, speed, ctx) {
                    ai.mode = AiMode::Idle;
                }
            }
            AiMode::Dialogue => {
                if let Some(hero) = ctx.hero() {
                    npc.facing_right = hero.position.x > position.x;
                }
            }
            _ => ai.mode = AiMode::Idle,
        }
        Ok(())
    }
}

/// Edge-triggered proximity tracking.
fn idle(id: ActorId, position: Vec2, npc: &mut NpcState, ctx: &mut BehaviorContext<'_>) {
    let Some(hero) = ctx.hero() else {
        return;
    };

    let near = position.within(hero.position, ctx.tuning.npc_interact_radius);
    if near && !npc.player_nearby {
        npc.player_nearby = true;
        ctx.push_event(GameEvent::NpcPlayerNearby { npc: id, hero: hero.id });
    } else if !near && npc.player_nearby {
        npc.player_nearby = false;
        ctx.push_event(GameEvent::NpcPlayerLeft { npc: id, hero: hero.id });
    }

    if npc.player_nearby {
        npc.facing_right = hero.position.x > position.x;
    }
}

/// Walk the route. Returns false if there is no route to walk.
fn patrol(position: &mut Vec2, npc: &mut NpcState, speed: f32, ctx: &BehaviorContext<'_>) -> bool {
    if npc.patrol_points.is_empty() {
        return false;
    }
    npc.patrol_index %= npc.patrol_points.len();
    let target = npc.patrol_points[npc.patrol_index];

    if position.distance(target) < ctx.tuning.npc_arrive_radius {
        npc.patrol_wait_ms += ctx.dt_ms;
        if npc.patrol_wait_ms >= ctx.tuning.npc_patrol_wait_ms {
            npc.patrol_wait_ms = 0.0;
            npc.patrol_index = (npc.patrol_index + 1) % npc.patrol_points.len();
        }
    } else {
        *position = position.move_towards(target, ctx.step(speed));
        npc.facing_right = target.x > position.x;
    }
    true
}

/// Put an NPC into dialogue. Returns false if it is not a live NPC with AI.
pub fn start_dialogue(registry: &RefCell<EntityRegistry>, bus: &EventBus, npc: ActorId) -> bool {
    {
        let mut reg = registry.borrow_mut();
        let Some(ai) = reg.get_mut(npc).filter(|a| a.is_alive()).and_then(|a| a.ai.as_mut()) else {
            return false;
        };
        if ai.mode != AiMode::Dialogue {
            let prev = ai.mode;
            ai.npc.get_or_insert_with(NpcState::default).prev_mode = Some(prev);
            ai.mode = AiMode::Dialogue;
        }
    }
    debug!("Dialogue started with {}", npc);
    bus.publish(&GameEvent::NpcDialogueStarted { npc });
    true
}

/// Leave dialogue, restoring the mode the NPC was in before.
pub fn end_dialogue(registry: &RefCell<EntityRegistry>, bus: &EventBus, npc: ActorId) -> bool {
    {
        let mut reg = registry.borrow_mut();
        let Some(ai) = reg.get_mut(npc).and_then(|a| a.ai.as_mut()) else {
            return false;
        };
        if ai.mode != AiMode::Dialogue {
            return false;
        }
        let prev = ai.npc.as_mut().and_then(|n| n.prev_mode.take());
        ai.mode = prev.unwrap_or(AiMode::Idle);
    }
    debug!("Dialogue ended with {}", npc);
    bus.publish(&GameEvent::NpcDialogueEnded { npc });
    true
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;
    use crate::core::rng::DeterministicRng;
    use crate::game::actor::{BehaviorState, Category};
    use crate::game::ai::OpenField;
    use crate::game::bus::listener;
    use crate::game::config::AiTuning;
    use crate::game::events::EventTag;

    fn run(reg: &EntityRegistry, actor: &mut Actor, dt: f32) -> Vec<GameEvent> {
        let tuning = AiTuning::default();
        let mut rng = DeterministicRng::new(1);
        let mut ctx = BehaviorContext::new(reg, &tuning, &mut rng, &OpenField, dt);
        NpcBehavior.update(actor, &mut ctx).unwrap();
        ctx.take_events()
    }

    fn npc(route: Vec<Vec2>) -> Actor {
        Actor::new(Category::Npc, Vec2::ZERO).with_ai(BehaviorState::npc(Vec2::ZERO, route))
    }

    #[test]
    fn test_proximity_events_are_edge_triggered() {
        let mut reg = EntityRegistry::new();
        let hero = reg.add(Actor::hero(Vec2::new(100.0, 0.0), 100.0));
        let mut n = npc(vec![]);

        let first = run(&reg, &mut n, 50.0);
        assert_eq!(first, vec![GameEvent::NpcPlayerNearby { npc: n.id, hero }]);
        assert!(n.ai.as_ref().unwrap().npc.as_ref().unwrap().facing_right);

        // Still near: nothing new
        assert!(run(&reg, &mut n, 50.0).is_empty());

        reg.get_mut(hero).unwrap().position = Vec2::new(500.0, 0.0);
        let left = run(&reg, &mut n, 50.0);
        assert_eq!(left, vec![GameEvent::NpcPlayerLeft { npc: n.id, hero }]);
        assert!(run(&reg, &mut n, 50.0).is_empty());
    }

    #[test]
    fn test_patrol_waits_then_wraps() {
        let reg = EntityRegistry::new();
        let mut n = npc(vec![Vec2::ZERO, Vec2::new(10.0, 0.0)]);

        // At point 0 already: wait 2000 ms then advance
        for _ in 0..39 {
            run(&reg, &mut n, 50.0);
        }
        assert_eq!(n.ai.as_ref().unwrap().npc.as_ref().unwrap().patrol_index, 0);
        run(&reg, &mut n, 50.0);
        assert_eq!(n.ai.as_ref().unwrap().npc.as_ref().unwrap().patrol_index, 1);

        // Point 1 is within the arrive radius too: wait again, then wrap to 0
        for _ in 0..40 {
            run(&reg, &mut n, 50.0);
        }
        assert_eq!(n.ai.as_ref().unwrap().npc.as_ref().unwrap().patrol_index, 0);
    }

    #[test]
    fn test_patrol_moves_towards_point() {
        let reg = EntityRegistry::new();
        let mut n = npc(vec![Vec2::new(500.0, 0.0)]);

        run(&reg, &mut n, 1000.0);
        assert_eq!(n.position, Vec2::new(DEFAULT_NPC_SPEED, 0.0));
    }

    #[test]
    fn test_empty_patrol_falls_back_to_idle() {
        let reg = EntityRegistry::new();
        let mut n = npc(vec![]);
        n.ai.as_mut().unwrap().mode = AiMode::Patrol;

        run(&reg, &mut n, 50.0);
        assert_eq!(n.mode(), Some(AiMode::Idle));
    }

    #[test]
    fn test_dialogue_round_trip_restores_mode() {
        let mut reg = EntityRegistry::new();
        let id = reg.add(npc(vec![Vec2::new(300.0, 0.0)]));
        let reg = RefCell::new(reg);
        let bus = EventBus::new();

        let seen = Rc::new(RefCell::new(Vec::new()));
        for tag in [EventTag::NpcDialogueStarted, EventTag::NpcDialogueEnded] {
            let s = seen.clone();
            bus.subscribe(tag, listener(move |e| {
                s.borrow_mut().push(e.tag());
                Ok(())
            }));
        }

        assert!(start_dialogue(&reg, &bus, id));
        assert_eq!(reg.borrow().get(id).unwrap().mode(), Some(AiMode::Dialogue));

        // Dialogue runs no movement
        {
            let r = reg.borrow();
            let mut copy = r.get(id).unwrap().clone();
            run(&r, &mut copy, 1000.0);
            assert_eq!(copy.position, Vec2::ZERO);
        }

        assert!(end_dialogue(&reg, &bus, id));
        assert_eq!(reg.borrow().get(id).unwrap().mode(), Some(AiMode::Patrol));
        assert!(!end_dialogue(&reg, &bus, id));

        assert_eq!(*seen.borrow(), vec![EventTag::NpcDialogueStarted, EventTag::NpcDialogueEnded]);
    }
}
