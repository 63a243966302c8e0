//! Boss State Machine
//!
//! Enemy machine plus a health-driven phase system and windup abilities.
//!
//! Phases: 1 while health >= 66%, 2 while above 33%, 3 otherwise. Entering
//! a phase for the first time applies its multipliers permanently; phase 3
//! also sets the enrage flag.

use tracing::info;

use crate::game::actor::{Actor, AiMode, BossPhaseState};
use crate::game::config::AiTuning;
use crate::game::events::GameEvent;

use super::{Behavior, BehaviorContext, BehaviorError, Body};
use super::enemy;

/// Phase for a health ratio.
pub fn phase_for_ratio(ratio: f32) -> u8 {
    if ratio >= 0.66 {
        1
    } else if ratio > 0.33 {
        2
    } else {
        3
    }
}

/// Boss behavior.
#[derive(Clone, Copy, Debug, Default)]
pub struct BossBehavior;

impl Behavior for BossBehavior {
    fn update(&self, actor: &mut Actor, ctx: &mut BehaviorContext<'_>) -> Result<(), BehaviorError> {
        let mut body = Body::from_actor(actor)?;
        if body.ai.boss.is_none() {
            // Promoted at runtime without phase data
            body.ai.boss = Some(BossPhaseState::new(Vec::new()));
            body.ai.is_boss = true;
        }

        update_phase(&mut body, ctx);
        enemy::tick_cooldown(&mut body, ctx);
        if let Some(boss) = body.ai.boss.as_mut() {
            boss.ability_cooldown_ms = (boss.ability_cooldown_ms - ctx.dt_ms).max(0.0);
        }

        match body.ai.mode {
            AiMode::Idle | AiMode::Wander => enemy::wander(&mut body, ctx),
            AiMode::Chase => {
                if !try_start_ability(&mut body, ctx) {
                    enemy::chase(&mut body, ctx);
                }
            }
            AiMode::Attack => enemy::attack(&mut body, ctx),
            AiMode::Ability => ability(&mut body, ctx),
            AiMode::Returning => {
                let regen = ctx.dt_ms * ctx.tuning.boss_return_regen_per_ms;
                if let Some(health) = body.health.as_deref_mut() {
                    health.heal(regen);
                }
                enemy::returning(&mut body, ctx);
            }
            AiMode::Dead => {}
            AiMode::Dialogue | AiMode::Patrol => body.ai.mode = AiMode::Wander,
        }
        Ok(())
    }
}

/// Recompute the phase and apply first-time multipliers.
fn update_phase(body: &mut Body<'_>, ctx: &mut BehaviorContext<'_>) {
    let Some(ratio) = body.health.as_deref().map(|h| h.ratio()) else {
        return;
    };
    let Some(state) = body.ai.boss.as_mut() else {
        return;
    };

    let new_phase = phase_for_ratio(ratio);
    if new_phase == state.phase {
        return;
    }
    let old_phase = state.phase;
    state.phase = new_phase;

    // Multipliers are permanent: only phases never reached before apply
    while state.highest_applied < new_phase {
        state.highest_applied += 1;
        apply_phase_buff(state.highest_applied, body.stats, ctx.tuning);
        if state.highest_applied == 3 {
            state.enraged = true;
        }
    }

    info!("Boss {} entered phase {} (from {})", body.id, new_phase, old_phase);
    ctx.push_event(GameEvent::boss_phase_changed(body.id, old_phase, new_phase, state.enraged));
}

fn apply_phase_buff(phase: u8, stats: &mut crate::game::actor::Stats, tuning: &AiTuning) {
    match phase {
        2 => {
            stats.speed *= tuning.phase2_speed;
            stats.attack_rate *= tuning.phase2_attack_rate;
        }
        3 => {
            stats.speed *= tuning.phase3_speed;
            stats.damage *= tuning.phase3_damage;
        }
        _ => {}
    }
}

/// At medium range with the cooldown expired, maybe start an ability.
fn try_start_ability(body: &mut Body<'_>, ctx: &mut BehaviorContext<'_>) -> bool {
    let Some(target) = ctx.resolve_live(body.ai.target) else {
        return false;
    };
    let Some(state) = body.ai.boss.as_mut() else {
        return false;
    };
    if state.ability_cooldown_ms > 0.0 || state.abilities.is_empty() {
        return false;
    }

    let dist = body.position.distance(target.position);
    let min = body.stats.attack_range * ctx.tuning.boss_ability_min_range_factor;
    if dist <= min || dist >= body.stats.aggro_range {
        return false;
    }
    if !ctx.rng.chance(ctx.tuning.boss_ability_chance) {
        return false;
    }

    let Some(picked) = ctx.rng.choose(&state.abilities).cloned() else {
        return false;
    };
    state.current_ability = Some(picked);
    state.windup_ms = ctx.tuning.boss_windup_ms;
    state.ability_cooldown_ms = ctx.tuning.boss_ability_cooldown_ms;
    body.ai.mode = AiMode::Ability;
    true
}

/// Count down the windup, then fire and resume the chase.
fn ability(body: &mut Body<'_>, ctx: &mut BehaviorContext<'_>) {
    let target = body.ai.target;
    let Some(state) = body.ai.boss.as_mut() else {
        body.ai.mode = AiMode::Chase;
        return;
    };
    let Some(name) = state.current_ability.clone() else {
        body.ai.mode = AiMode::Chase;
        return;
    };

    state.windup_ms -= ctx.dt_ms;
    if state.windup_ms > 0.0 {
        return;
    }

    state.windup_ms = 0.0;
    state.current_ability = None;
    body.ai.mode = AiMode::Chase;
    info!("Boss {} used {}", body.id, name);
    ctx.push_event(GameEvent::BossAbilityExecuted { boss: body.id, ability: name, target });
}

// =============================================================================
// TESTS
// =============================================================================
