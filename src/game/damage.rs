//! Damage Resolution
//!
//! Mitigation and critical-hit math, plus `apply_damage` which writes the
//! result into the target's health and publishes `DamageDealt`.
//!
//! Death is derived (health <= 0) and only reported; reacting to it is the
//! caller's job.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;

use crate::core::rng::DeterministicRng;
use crate::game::actor::ActorId;
use crate::game::bus::EventBus;
use crate::game::events::GameEvent;
use crate::game::registry::EntityRegistry;

/// Defense at which damage is halved.
pub const DEFENSE_HALF_POINT: f32 = 100.0;

/// Mitigate `base` by `defense` with diminishing returns.
///
/// `reduction = d / (d + 100)`, floored, never below 1. Negative defense is
/// treated as 0.
pub fn calculate_damage(base: u32, defense: f32) -> u32 {
    let defense = if defense.is_finite() { defense.max(0.0) as f64 } else { 0.0 };
    let half = DEFENSE_HALF_POINT as f64;
    // 1 - d/(d+100) == 100/(d+100); this form stays monotone under rounding
    let kept = half / (defense + half);
    let mitigated = (base as f64 * kept).floor();
    (mitigated as u32).max(1)
}

/// Result of a critical roll.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CritRoll {
    /// Damage after the multiplier (floored)
    pub damage: u32,
    /// Whether the roll succeeded
    pub is_crit: bool,
}

/// Independent Bernoulli trial for a critical hit.
pub fn roll_crit(base: u32, crit_chance: f32, crit_multiplier: f32, rng: &mut DeterministicRng) -> CritRoll {
    if rng.chance(crit_chance.clamp(0.0, 1.0)) {
        CritRoll {
            damage: (base as f32 * crit_multiplier).floor() as u32,
            is_crit: true,
        }
    } else {
        CritRoll { damage: base, is_crit: false }
    }
}

/// What `apply_damage` did.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DamageOutcome {
    /// Damage subtracted from health
    pub final_damage: u32,
    /// Health after the hit
    pub remaining_health: f32,
    /// Health reached zero or below
    pub killed: bool,
}

/// Applies damage to registry actors and announces it on the bus.
pub struct DamageResolver {
    bus: Rc<EventBus>,
    rng: RefCell<DeterministicRng>,
}

impl DamageResolver {
    /// Create a resolver publishing to `bus`.
    pub fn new(bus: Rc<EventBus>, rng: DeterministicRng) -> Self {
        Self { bus, rng: RefCell::new(rng) }
    }

    /// Mitigate and subtract `base_damage` from `target`, then publish
    /// `DamageDealt`.
    ///
    /// Returns `None` without publishing if the target is gone, has no
    /// health, or is already dead. The attacker is never touched.
    pub fn apply_damage(
        &self,
        registry: &RefCell<EntityRegistry>,
        attacker: Option<ActorId>,
        target: ActorId,
        base_damage: u32,
    ) -> Option<DamageOutcome> {
        self.apply(registry, attacker, target, base_damage, false)
    }

    /// Roll a crit from the attacker's stats, then `apply_damage`.
    pub fn strike(
        &self,
        registry: &RefCell<EntityRegistry>,
        attacker: ActorId,
        target: ActorId,
        base_damage: u32,
    ) -> Option<DamageOutcome> {
        let (chance, multiplier) = registry
            .borrow()
            .get(attacker)
            .and_then(|a| a.stats.as_ref())
            .map_or((0.0, 1.0), |s| (s.crit_chance, s.crit_multiplier));

        let roll = roll_crit(base_damage, chance, multiplier, &mut self.rng.borrow_mut());
        self.apply(registry, Some(attacker), target, roll.damage, roll.is_crit)
    }

    fn apply(
        &self,
        registry: &RefCell<EntityRegistry>,
        attacker: Option<ActorId>,
        target: ActorId,
        base_damage: u32,
        is_crit: bool,
    ) -> Option<DamageOutcome> {
        // Registry borrow must end before listeners run
        let outcome = {
            let mut reg = registry.borrow_mut();
            let actor = reg.get_mut(target)?;
            if actor.is_dead() {
                return None;
            }
            let defense = actor.defense();
            let health = actor.health.as_mut()?;

            let final_damage = calculate_damage(base_damage, defense);
            let killed = health.take_damage(final_damage as f32);
            DamageOutcome {
                final_damage,
                remaining_health: health.current,
                killed,
            }
        };

        debug!(
            "Damage {} -> {}: {} (base {}, crit {}), hp {:.1}",
            attacker.map_or_else(|| "-".to_string(), |a| a.to_string()),
            target,
            outcome.final_damage,
            base_damage,
            is_crit,
            outcome.remaining_health
        );

        self.bus.publish(&GameEvent::DamageDealt {
            attacker,
            target,
            base_damage,
            final_damage: outcome.final_damage,
            is_crit,
            killed: outcome.killed,
        });

        Some(outcome)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use crate::core::vec2::Vec2;
    use crate::game::actor::{Actor, Category, Stats};
    use crate::game::bus::listener;
    use crate::game::events::EventTag;

    fn resolver() -> (Rc<EventBus>, DamageResolver) {
        let bus = Rc::new(EventBus::new());
        let resolver = DamageResolver::new(bus.clone(), DeterministicRng::new(1));
        (bus, resolver)
    }

    fn capture(bus: &EventBus) -> Rc<RefCell<Vec<GameEvent>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        bus.subscribe(EventTag::DamageDealt, listener(move |e| {
            s.borrow_mut().push(e.clone());
            Ok(())
        }));
        seen
    }

    #[test]
    fn test_calculate_damage_values() {
        assert_eq!(calculate_damage(15, 0.0), 15);
        assert_eq!(calculate_damage(100, 100.0), 50);
        assert_eq!(calculate_damage(10, 50.0), 6);
        assert_eq!(calculate_damage(1, 1_000_000.0), 1);
        assert_eq!(calculate_damage(20, -40.0), 20);
    }

    #[test]
    fn test_roll_crit() {
        let mut rng = DeterministicRng::new(5);
        assert_eq!(roll_crit(10, 1.0, 1.5, &mut rng), CritRoll { damage: 15, is_crit: true });
        assert_eq!(roll_crit(10, 0.0, 1.5, &mut rng), CritRoll { damage: 10, is_crit: false });
    }

    #[test]
    fn test_scenario_two_hits() {
        let (bus, resolver) = resolver();
        let seen = capture(&bus);

        let mut reg = EntityRegistry::new();
        let hero = reg.add(Actor::hero(Vec2::ZERO, 100.0));
        let enemy = reg.add(
            Actor::new(Category::EnemyDinosaur, Vec2::ZERO)
                .with_health(40.0)
                .with_stats(Stats { defense: 0.0, ..Stats::default() }),
        );
        let reg = RefCell::new(reg);

        let first = resolver.apply_damage(&reg, Some(hero), enemy, 15).unwrap();
        assert_eq!(first.final_damage, 15);
        assert_eq!(first.remaining_health, 25.0);
        assert!(!first.killed);

        let second = resolver.apply_damage(&reg, Some(hero), enemy, 30).unwrap();
        assert_eq!(second.final_damage, 30);
        assert_eq!(second.remaining_health, -5.0);
        assert!(second.killed);

        let events = seen.borrow();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], GameEvent::DamageDealt { killed: false, final_damage: 15, .. }));
        assert!(matches!(events[1], GameEvent::DamageDealt { killed: true, final_damage: 30, .. }));

        // Attacker untouched
        assert_eq!(reg.borrow().get(hero).unwrap().health.unwrap().current, 100.0);
    }

    #[test]
    fn test_dead_or_missing_target_is_ignored() {
        let (bus, resolver) = resolver();
        let seen = capture(&bus);

        let mut reg = EntityRegistry::new();
        let prop = reg.add(Actor::new(Category::Prop, Vec2::ZERO));
        let enemy = reg.add(Actor::new(Category::EnemySoldier, Vec2::ZERO).with_health(5.0));
        let reg = RefCell::new(reg);

        assert!(resolver.apply_damage(&reg, None, ActorId(999), 10).is_none());
        assert!(resolver.apply_damage(&reg, None, prop, 10).is_none());
        assert!(resolver.apply_damage(&reg, None, enemy, 10).unwrap().killed);
        assert!(resolver.apply_damage(&reg, None, enemy, 10).is_none());

        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn test_strike_uses_attacker_crit_stats() {
        let (_bus, resolver) = resolver();
        let mut reg = EntityRegistry::new();
        let attacker = reg.add(
            Actor::new(Category::EnemySoldier, Vec2::ZERO)
                .with_stats(Stats { crit_chance: 1.0, crit_multiplier: 2.0, ..Stats::default() }),
        );
        let target = reg.add(Actor::hero(Vec2::ZERO, 100.0));
        let reg = RefCell::new(reg);

        let out = resolver.strike(&reg, attacker, target, 10).unwrap();
        assert_eq!(out.final_damage, 20);
    }

    proptest! {
        #[test]
        fn prop_damage_bounded(base in 1u32..100_000, defense in 0.0f32..10_000.0) {
            let dmg = calculate_damage(base, defense);
            prop_assert!(dmg >= 1);
            prop_assert!(dmg <= base);
        }

        #[test]
        fn prop_damage_non_increasing_in_defense(
            base in 1u32..100_000,
            d1 in 0.0f32..10_000.0,
            delta in 0.0f32..10_000.0,
        ) {
            prop_assert!(calculate_damage(base, d1 + delta) <= calculate_damage(base, d1));
        }
    }
}
