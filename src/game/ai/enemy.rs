//! Enemy State Machine
//!
//! `wander -> chase -> attack <-> chase`, `chase -> returning -> wander`.
//! The step functions are shared with the boss machine.

use tracing::trace;

use crate::game::actor::{Actor, AiMode};
use crate::game::events::GameEvent;

use super::{Behavior, BehaviorContext, BehaviorError, Body};

/// Regular enemy behavior; also the dispatcher's generic fallback.
#[derive(Clone, Copy, Debug, Default)]
pub struct EnemyBehavior;

impl Behavior for EnemyBehavior {
    fn update(&self, actor: &mut Actor, ctx: &mut BehaviorContext<'_>) -> Result<(), BehaviorError> {
        let mut body = Body::from_actor(actor)?;
        tick_cooldown(&mut body, ctx);

        match body.ai.mode {
            AiMode::Idle | AiMode::Wander => wander(&mut body, ctx),
            AiMode::Chase => chase(&mut body, ctx),
            AiMode::Attack => attack(&mut body, ctx),
            AiMode::Returning => returning(&mut body, ctx),
            AiMode::Dead => {}
            // Modes this machine does not own
            AiMode::Ability | AiMode::Dialogue | AiMode::Patrol => body.ai.mode = AiMode::Wander,
        }
        Ok(())
    }
}

/// Attack cooldown counts down in every mode.
pub(crate) fn tick_cooldown(body: &mut Body<'_>, ctx: &BehaviorContext<'_>) {
    if body.ai.attack_cooldown_ms > 0.0 {
        body.ai.attack_cooldown_ms = (body.ai.attack_cooldown_ms - ctx.dt_ms).max(0.0);
    }
}

/// Look for the hero; otherwise roam around the spawn point.
pub(crate) fn wander(body: &mut Body<'_>, ctx: &mut BehaviorContext<'_>) {
    body.ai.mode = AiMode::Wander;

    if let Some(hero) = ctx.hero() {
        if body.position.within(hero.position, body.stats.aggro_range)
            && ctx.los.is_clear(*body.position, hero.position)
        {
            body.ai.target = Some(hero.id);
            body.ai.mode = AiMode::Chase;
            trace!("{} aggroed on {}", body.id, hero.id);
            ctx.push_event(GameEvent::enemy_aggroed(body.id, hero.id));
            return;
        }
    }

    body.ai.wander_timer_ms += ctx.dt_ms;
    if body.ai.wander_target.is_none() || body.ai.wander_timer_ms >= body.ai.wander_interval_ms {
        let tuning = ctx.tuning;
        body.ai.wander_timer_ms = 0.0;
        body.ai.wander_interval_ms = ctx.rng.next_range(tuning.wander_min_ms, tuning.wander_max_ms);
        let radius = body.stats.patrol_radius * tuning.wander_radius_factor;
        body.ai.wander_target = Some(ctx.rng.point_near(body.ai.spawn_point, radius));
    }

    if let Some(dest) = body.ai.wander_target {
        let speed = body.stats.speed * ctx.tuning.wander_speed_factor;
        body.move_towards(dest, speed, ctx);
    }
}

/// Close in on the target, giving up past the leash.
pub(crate) fn chase(body: &mut Body<'_>, ctx: &mut BehaviorContext<'_>) {
    let Some(target) = ctx.resolve_live(body.ai.target) else {
        body.ai.target = None;
        body.ai.mode = AiMode::Returning;
        return;
    };

    if body.position.distance(body.ai.spawn_point) > body.stats.leash_distance {
        body.ai.target = None;
        body.ai.mode = AiMode::Returning;
        trace!("{} leashed", body.id);
        ctx.push_event(GameEvent::EnemyLeashed { enemy: body.id });
        return;
    }

    if body.position.distance(target.position) <= body.stats.attack_range {
        body.ai.mode = AiMode::Attack;
        return;
    }

    let speed = body.stats.speed;
    body.move_towards(target.position, speed, ctx);
}

/// Hit the target whenever the cooldown allows.
pub(crate) fn attack(body: &mut Body<'_>, ctx: &mut BehaviorContext<'_>) {
    let Some(target) = ctx.resolve_live(body.ai.target) else {
        body.ai.target = None;
        body.ai.mode = AiMode::Wander;
        return;
    };

    // Hysteresis keeps the machine from flapping at the range boundary
    if body.position.distance(target.position) > body.stats.attack_range * ctx.tuning.attack_hysteresis {
        body.ai.mode = AiMode::Chase;
        return;
    }

    if body.ai.attack_cooldown_ms <= 0.0 {
        let damage = body.stats.damage.max(0.0).round() as u32;
        ctx.push_event(GameEvent::attack_requested(body.id, target.id, damage));
        body.ai.attack_cooldown_ms = body.stats.attack_cooldown_ms();
    }
}

/// Walk home; on arrival reset and heal fully.
pub(crate) fn returning(body: &mut Body<'_>, ctx: &mut BehaviorContext<'_>) {
    let home = body.ai.spawn_point;
    if body.position.within(home, ctx.tuning.return_arrive_radius) {
        body.ai.mode = AiMode::Wander;
        body.ai.target = None;
        body.ai.wander_target = None;
        body.ai.wander_timer_ms = 0.0;
        if let Some(health) = body.health.as_deref_mut() {
            health.heal_full();
        }
        return;
    }

    let speed = body.stats.speed * ctx.tuning.return_speed_factor;
    body.move_towards(home, speed, ctx);
}

// =============================================================================
// TESTS
// =============================================================================
