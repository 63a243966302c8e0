//! Game Events
//!
//! Messages passed over the event bus. Payloads carry actor ids (lookup
//! keys), never references, so a listener must re-resolve them against the
//! registry.

use serde::{Serialize, Deserialize};

use crate::core::vec2::Vec2;
use crate::game::actor::{ActorId, BiomeId, Category, GroupId};

/// Subscription key: one per event variant, named after it.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventTag {
    AttackRequested,
    DamageDealt,
    EntityDied,
    EnemyAggroed,
    EnemyLeashed,
    PackAggroTriggered,
    BossPhaseChanged,
    BossAbilityExecuted,
    BossSpawned,
    BiomeEntered,
    EnemyGroupSpawned,
    NpcPlayerNearby,
    NpcPlayerLeft,
    NpcDialogueStarted,
    NpcDialogueEnded,
}

/// Game event payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    /// An actor wants to hit its target
    AttackRequested {
        attacker: ActorId,
        target: ActorId,
        base_damage: u32,
    },

    /// Damage landed on a target
    DamageDealt {
        attacker: Option<ActorId>,
        target: ActorId,
        base_damage: u32,
        final_damage: u32,
        is_crit: bool,
        killed: bool,
    },

    /// An actor died
    EntityDied {
        actor: ActorId,
        category: Category,
        killer: Option<ActorId>,
        biome: Option<BiomeId>,
        is_boss: bool,
        respawn_secs: Option<f32>,
    },

    /// Enemy noticed a target
    EnemyAggroed {
        enemy: ActorId,
        target: ActorId,
    },

    /// Enemy gave up the chase
    EnemyLeashed {
        enemy: ActorId,
    },

    /// Packmates were pulled into a fight
    PackAggroTriggered {
        source: ActorId,
        aggressor: ActorId,
        group: GroupId,
        members: Vec<ActorId>,
    },

    /// Boss crossed a health threshold
    BossPhaseChanged {
        boss: ActorId,
        old_phase: u8,
        new_phase: u8,
        enraged: bool,
    },

    /// Boss ability windup finished
    BossAbilityExecuted {
        boss: ActorId,
        ability: String,
        target: Option<ActorId>,
    },

    /// Boss placed in a biome
    BossSpawned {
        boss: ActorId,
        biome: BiomeId,
        position: Vec2,
    },

    /// Hero walked into a biome
    BiomeEntered {
        biome: BiomeId,
        actor: Option<ActorId>,
    },

    /// A pack was placed
    EnemyGroupSpawned {
        group: GroupId,
        biome: BiomeId,
        center: Vec2,
        members: Vec<ActorId>,
    },

    /// Hero entered an NPC's interact radius
    NpcPlayerNearby {
        npc: ActorId,
        hero: ActorId,
    },

    /// Hero left an NPC's interact radius
    NpcPlayerLeft {
        npc: ActorId,
        hero: ActorId,
    },

    /// Dialogue opened
    NpcDialogueStarted {
        npc: ActorId,
    },

    /// Dialogue closed
    NpcDialogueEnded {
        npc: ActorId,
    },
}

impl GameEvent {
    /// Subscription tag for this event.
    pub fn tag(&self) -> EventTag {
        match self {
            GameEvent::AttackRequested { .. } => EventTag::AttackRequested,
            GameEvent::DamageDealt { .. } => EventTag::DamageDealt,
            GameEvent::EntityDied { .. } => EventTag::EntityDied,
            GameEvent::EnemyAggroed { .. } => EventTag::EnemyAggroed,
            GameEvent::EnemyLeashed { .. } => EventTag::EnemyLeashed,
            GameEvent::PackAggroTriggered { .. } => EventTag::PackAggroTriggered,
            GameEvent::BossPhaseChanged { .. } => EventTag::BossPhaseChanged,
            GameEvent::BossAbilityExecuted { .. } => EventTag::BossAbilityExecuted,
            GameEvent::BossSpawned { .. } => EventTag::BossSpawned,
            GameEvent::BiomeEntered { .. } => EventTag::BiomeEntered,
            GameEvent::EnemyGroupSpawned { .. } => EventTag::EnemyGroupSpawned,
            GameEvent::NpcPlayerNearby { .. } => EventTag::NpcPlayerNearby,
            GameEvent::NpcPlayerLeft { .. } => EventTag::NpcPlayerLeft,
            GameEvent::NpcDialogueStarted { .. } => EventTag::NpcDialogueStarted,
            GameEvent::NpcDialogueEnded { .. } => EventTag::NpcDialogueEnded,
        }
    }

    /// Create attack requested event.
    pub fn attack_requested(attacker: ActorId, target: ActorId, base_damage: u32) -> Self {
        GameEvent::AttackRequested { attacker, target, base_damage }
    }

    /// Create enemy aggroed event.
    pub fn enemy_aggroed(enemy: ActorId, target: ActorId) -> Self {
        GameEvent::EnemyAggroed { enemy, target }
    }

    /// Create boss phase changed event.
    pub fn boss_phase_changed(boss: ActorId, old_phase: u8, new_phase: u8, enraged: bool) -> Self {
        GameEvent::BossPhaseChanged { boss, old_phase, new_phase, enraged }
    }

    /// Create biome entered event.
    pub fn biome_entered(biome: &str, actor: Option<ActorId>) -> Self {
        GameEvent::BiomeEntered { biome: BiomeId::new(biome), actor }
    }

    /// Actor the event is primarily about, if any.
    pub fn subject(&self) -> Option<ActorId> {
        match self {
            GameEvent::AttackRequested { attacker, .. } => Some(*attacker),
            GameEvent::DamageDealt { target, .. } => Some(*target),
            GameEvent::EntityDied { actor, .. } => Some(*actor),
            GameEvent::EnemyAggroed { enemy, .. } => Some(*enemy),
            GameEvent::EnemyLeashed { enemy } => Some(*enemy),
            GameEvent::PackAggroTriggered { source, .. } => Some(*source),
            GameEvent::BossPhaseChanged { boss, .. } => Some(*boss),
            GameEvent::BossAbilityExecuted { boss, .. } => Some(*boss),
            GameEvent::BossSpawned { boss, .. } => Some(*boss),
            GameEvent::BiomeEntered { actor, .. } => *actor,
            GameEvent::EnemyGroupSpawned { .. } => None,
            GameEvent::NpcPlayerNearby { npc, .. }
            | GameEvent::NpcPlayerLeft { npc, .. }
            | GameEvent::NpcDialogueStarted { npc }
            | GameEvent::NpcDialogueEnded { npc } => Some(*npc),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_matches_variant() {
        let ev = GameEvent::attack_requested(ActorId(1), ActorId(2), 15);
        assert_eq!(ev.tag(), EventTag::AttackRequested);
        assert_eq!(ev.subject(), Some(ActorId(1)));

        let ev = GameEvent::biome_entered("tundra", None);
        assert_eq!(ev.tag(), EventTag::BiomeEntered);
        assert_eq!(ev.subject(), None);
    }

    #[test]
    fn test_event_serializes_to_json() {
        let ev = GameEvent::boss_phase_changed(ActorId(9), 1, 2, false);
        let json = serde_json::to_string(&ev).unwrap();
        let back: GameEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ev);
    }
}
