// g_monster.rs — monster spawning, floor placement and activation
// Spawn keys arrive through g_spawn; behavior after the first think lives in g_ai.

use log::{debug, warn};

use crate::dispatch::{DieKind, PainKind, ThinkKind, UseKind};
use crate::g_ai::{found_target, set_state};
use crate::g_error::{GameError, GameResult};
use crate::g_gore::GoreZones;
use crate::g_local::*;
use crate::g_utils::{g_free_edict, killbox};
use crate::g_world::{link_entity, trace};
use crate::m_move::m_check_ground;
use crate::m_soldier::MonsterClass;

/// Stays put until it sees or hears something.
pub const MONSTER_AMBUSH: i32 = 1;
/// Hidden and non-solid until used.
pub const MONSTER_TRIGGER_SPAWN: i32 = 2;

const START_DELAY: f32 = 0.5;
const START_JITTER: f32 = 0.2;
const DROP_DISTANCE: f32 = 256.0;

/// Shared spawn function for every ground monster class.
pub fn walkmonster_start(ctx: &mut GameCtx, idx: usize, class: MonsterClass) -> GameResult<()> {
    if ctx.deathmatch != 0.0 {
        debug!("{} removed in deathmatch", class.info().classname);
        g_free_edict(ctx, idx);
        return Ok(());
    }

    let time = ctx.level.time;
    let model = format!("models/monsters/{}.ghb", class.info().classname.trim_start_matches("monster_"));
    let modelindex = ctx.configstrings.model_index(&model);

    let e = &mut ctx.edicts[idx];
    class.apply(e);
    e.s.modelindex = modelindex;
    e.s.old_origin = e.s.origin;
    e.ideal_yaw = e.s.angles[YAW];
    e.pain = Some(PainKind::Monster);
    e.die = Some(DieKind::Monster);
    e.use_fn = Some(UseKind::MonsterTrigger);
    e.gore = Some(GoreZones::default());
    e.svflags &= !SVF_DEADMONSTER;

    if e.spawnflags & MONSTER_TRIGGER_SPAWN != 0 {
        e.solid = Solid::Not;
        e.movetype = MoveType::None;
        e.svflags |= SVF_NOCLIENT;
        e.takedamage = Damage::No;
        e.think = None;
        e.nextthink = 0.0;
    } else {
        e.think = Some(ThinkKind::MonsterStart);
        e.nextthink = time + FRAMETIME;
    }

    ctx.level.total_monsters += 1;
    link_entity(ctx, idx);
    Ok(())
}

/// Settle onto whatever is below. Returns false when there is nothing
/// within reach or the monster starts inside a solid.
pub fn droptofloor(ctx: &mut GameCtx, idx: usize) -> bool {
    let (mut start, mins, maxs) = {
        let e = &ctx.edicts[idx];
        (e.s.origin, e.mins, e.maxs)
    };
    start[2] += 1.0;
    let end = [start[0], start[1], start[2] - DROP_DISTANCE];
    let tr = trace(ctx, &start, &mins, &maxs, &end, idx as i32, MASK_MONSTERSOLID);
    if tr.allsolid || tr.fraction == 1.0 {
        warn!(
            "{} at {} has no floor below it",
            ctx.edicts[idx].classname,
            vtos(&ctx.edicts[idx].s.origin)
        );
        return false;
    }
    ctx.edicts[idx].s.origin = tr.endpos;
    link_entity(ctx, idx);
    m_check_ground(ctx, idx);
    true
}

/// First think after spawn: find the floor, hook up the patrol route and
/// hand control to the state machine.
pub fn monster_start_go(ctx: &mut GameCtx, idx: usize) -> GameResult<()> {
    if !ctx.edicts[idx].is_alive() {
        return Ok(());
    }
    droptofloor(ctx, idx);

    let wake = ctx.level.time + START_DELAY + ctx.random() * START_JITTER;
    {
        let e = &mut ctx.edicts[idx];
        e.think = Some(ThinkKind::MonsterAi);
        e.nextthink = wake;
    }

    let target = ctx.edicts[idx].target.clone();
    if target.is_empty() {
        return Ok(());
    }

    let Some(corner) = ctx.find_by_targetname(&target).into_iter().next() else {
        ctx.edicts[idx].target.clear();
        return Err(GameError::EntityFault {
            index: idx,
            classname: ctx.edicts[idx].classname.clone(),
            reason: format!("can't find target {}", target),
        });
    };

    if ctx.edicts[corner].classname != "path_corner" {
        warn!(
            "{} targets {}, which is not a path_corner",
            ctx.edicts[idx].classname, ctx.edicts[corner].classname
        );
        return Ok(());
    }

    let handle = ctx.handle_of(corner);
    let to = vector_subtract(&ctx.edicts[corner].s.origin, &ctx.edicts[idx].s.origin);
    let e = &mut ctx.edicts[idx];
    e.movetarget = Some(handle);
    e.goalentity = Some(handle);
    e.ideal_yaw = vectoyaw(&to);
    e.s.angles[YAW] = e.ideal_yaw;
    Ok(())
}

/// Reveal a trigger-spawned monster where it was placed.
fn monster_triggered_spawn(ctx: &mut GameCtx, idx: usize, activator: usize) -> GameResult<()> {
    {
        let e = &mut ctx.edicts[idx];
        e.spawnflags &= !MONSTER_TRIGGER_SPAWN;
        e.s.origin[2] += 1.0;
        e.solid = Solid::Bbox;
        e.movetype = MoveType::Step;
        e.svflags &= !SVF_NOCLIENT;
        e.takedamage = Damage::Aim;
    }
    killbox(ctx, idx)?;

    let time = ctx.level.time;
    let angry = ctx.edicts[activator].client.is_some()
        && !ctx.edicts[activator].flags.contains(EntityFlags::NOTARGET);
    let handle = ctx.handle_of(activator);
    let e = &mut ctx.edicts[idx];
    e.think = Some(ThinkKind::MonsterStart);
    e.nextthink = time + FRAMETIME;
    if angry && e.spawnflags & MONSTER_AMBUSH == 0 {
        e.enemy = Some(handle);
    }
    Ok(())
}

/// Using a monster makes it angry at the activator, or brings a hidden
/// one into the level.
pub fn monster_use(ctx: &mut GameCtx, self_idx: usize, _other: usize, activator: usize) -> GameResult<()> {
    if ctx.edicts[self_idx].spawnflags & MONSTER_TRIGGER_SPAWN != 0 {
        return monster_triggered_spawn(ctx, self_idx, activator);
    }

    let e = &ctx.edicts[self_idx];
    if e.enemy.is_some() || !e.is_alive() {
        return Ok(());
    }
    let a = &ctx.edicts[activator];
    if a.client.is_none() || a.flags.contains(EntityFlags::NOTARGET) || !a.is_alive() {
        return Ok(());
    }

    ctx.edicts[self_idx].enemy = Some(ctx.handle_of(activator));
    found_target(ctx, self_idx);
    if ctx.edicts[self_idx].monsterinfo.ai_state == AiState::Idle {
        set_state(ctx, self_idx, AiState::Alert);
    }
    let time = ctx.level.time;
    let e = &mut ctx.edicts[self_idx];
    if e.think == Some(ThinkKind::MonsterAi) {
        e.nextthink = time + FRAMETIME;
    }
    Ok(())
}
