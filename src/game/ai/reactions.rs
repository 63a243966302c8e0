//! Combat Reactions
//!
//! Bus listeners that turn combat events into state changes:
//!
//! - `AttackRequested` -> damage resolver
//! - `DamageDealt` -> victim aggro, pack aggro broadcast, death handling
//!
//! Listeners hold weak handles to the bus and resolver; the bus owns the
//! listeners, so strong handles would keep both alive forever.

use std::cell::RefCell;
use std::rc::Weak;

use tracing::{debug, info};

use crate::game::actor::{Actor, ActorId, AiMode, Category};
use crate::game::bus::{listener, EventBus, Listener};
use crate::game::damage::{DamageOutcome, DamageResolver};
use crate::game::events::GameEvent;
use crate::game::registry::{EntityRegistry, SharedRegistry};

/// Resolve an attack if the attacker is still alive.
pub fn on_attack_requested(
    registry: &RefCell<EntityRegistry>,
    resolver: &DamageResolver,
    attacker: ActorId,
    target: ActorId,
    base_damage: u32,
) -> Option<DamageOutcome> {
    let attacker_alive = registry.borrow().get(attacker).is_some_and(Actor::is_alive);
    if !attacker_alive {
        debug!("Dropping attack from dead or removed {}", attacker);
        return None;
    }
    resolver.strike(registry, attacker, target, base_damage)
}

/// React to a landed hit.
pub fn on_damage_dealt(
    registry: &RefCell<EntityRegistry>,
    bus: &EventBus,
    pack_radius: f32,
    attacker: Option<ActorId>,
    target: ActorId,
    killed: bool,
) {
    if let Some(aggressor) = attacker {
        if !killed {
            aggro_victim(registry, target, aggressor);
        }
        trigger_pack_aggro(registry, bus, pack_radius, target, aggressor);
    }
    if killed {
        handle_death(registry, bus, target, attacker);
    }
}

/// Point a hit actor at whoever hit it, unless it is already fighting.
///
/// Returns true if the victim's state changed.
pub fn aggro_victim(registry: &RefCell<EntityRegistry>, victim: ActorId, aggressor: ActorId) -> bool {
    if victim == aggressor {
        return false;
    }
    let mut reg = registry.borrow_mut();
    if !reg.get(aggressor).is_some_and(Actor::is_alive) {
        return false;
    }
    let Some(actor) = reg.get_mut(victim).filter(|a| a.is_alive()) else {
        return false;
    };
    let Some(ai) = actor.ai.as_mut() else {
        return false;
    };
    if matches!(ai.mode, AiMode::Chase | AiMode::Attack) {
        return false;
    }
    ai.target = Some(aggressor);
    ai.mode = AiMode::Chase;
    true
}

/// Force every grouped, pack-aggro member near `source` to chase `aggressor`.
///
/// Members already fighting the aggressor are still reset to chase. The
/// scan does not use the spatial grid, which can lag behind this frame's
/// movement. Returns the members that were pulled in (not including
/// `source`).
pub fn trigger_pack_aggro(
    registry: &RefCell<EntityRegistry>,
    bus: &EventBus,
    radius: f32,
    source: ActorId,
    aggressor: ActorId,
) -> Vec<ActorId> {
    let (group, members) = {
        let mut reg = registry.borrow_mut();
        if !reg.get(aggressor).is_some_and(Actor::is_alive) {
            return Vec::new();
        }
        let Some(victim) = reg.get(source) else {
            return Vec::new();
        };
        let Some(ai) = victim.ai.as_ref().filter(|ai| ai.pack_aggro) else {
            return Vec::new();
        };
        let Some(group) = ai.group.clone() else {
            return Vec::new();
        };
        let center = victim.position;

        let mut candidates: Vec<ActorId> = reg
            .in_radius(center, radius, None)
            .into_iter()
            .filter(|a| a.id != source && a.id != aggressor && a.is_alive())
            .filter(|a| {
                a.ai.as_ref()
                    .is_some_and(|ai| ai.pack_aggro && ai.group.as_ref() == Some(&group))
            })
            .map(|a| a.id)
            .collect();
        candidates.sort_unstable();

        let mut pulled = Vec::with_capacity(candidates.len());
        for id in candidates {
            let Some(ai) = reg.get_mut(id).and_then(|a| a.ai.as_mut()) else {
                continue;
            };
            ai.target = Some(aggressor);
            ai.mode = AiMode::Chase;
            pulled.push(id);
        }
        (group, pulled)
    };

    if !members.is_empty() {
        debug!("Pack {} aggro on {}: {} member(s)", group, aggressor, members.len());
        bus.publish(&GameEvent::PackAggroTriggered {
            source,
            aggressor,
            group,
            members: members.clone(),
        });
    }
    members
}

/// Mark an actor dead and announce it.
///
/// Actors with behavior state are switched to `Dead` and deactivated so the
/// registry sweeps them; others (the hero) are only announced. Returns false
/// if the actor is gone or its death was already handled.
pub fn handle_death(
    registry: &RefCell<EntityRegistry>,
    bus: &EventBus,
    id: ActorId,
    killer: Option<ActorId>,
) -> bool {
    let event = {
        let mut reg = registry.borrow_mut();
        let Some(actor) = reg.get_mut(id) else {
            return false;
        };
        let is_boss = actor.category == Category::Boss || actor.ai.as_ref().is_some_and(|ai| ai.is_boss);
        if let Some(ai) = actor.ai.as_mut() {
            if ai.is_dead() {
                return false;
            }
            ai.clear_for_death();
            actor.active = false;
        }
        GameEvent::EntityDied {
            actor: id,
            category: actor.category,
            killer,
            biome: actor.biome.clone(),
            is_boss,
            respawn_secs: actor.respawn_secs,
        }
    };

    if let GameEvent::EntityDied { is_boss: true, biome, .. } = &event {
        info!("Boss {} died in {}", id, biome.as_ref().map_or("-", |b| b.as_str()));
    } else {
        debug!("{} died", id);
    }
    bus.publish(&event);
    true
}

/// `AttackRequested` listener.
pub fn attack_listener(registry: SharedRegistry, resolver: Weak<DamageResolver>) -> Listener {
    listener(move |event| {
        let GameEvent::AttackRequested { attacker, target, base_damage } = event else {
            return Ok(());
        };
        if let Some(resolver) = resolver.upgrade() {
            on_attack_requested(&registry, &resolver, *attacker, *target, *base_damage);
        }
        Ok(())
    })
}

/// `DamageDealt` listener.
pub fn damage_listener(registry: SharedRegistry, bus: Weak<EventBus>, pack_radius: f32) -> Listener {
    listener(move |event| {
        let GameEvent::DamageDealt { attacker, target, killed, .. } = event else {
            return Ok(());
        };
        if let Some(bus) = bus.upgrade() {
            on_damage_dealt(&registry, &bus, pack_radius, *attacker, *target, *killed);
        }
        Ok(())
    })
}

// =============================================================================
// TESTS
// =============================================================================
