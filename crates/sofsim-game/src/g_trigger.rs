// g_trigger.rs — trigger volumes, relays and mission objectives

/*
Copyright (C) 1997-2001 Id Software, Inc.

This program is free software; you can redistribute it and/or
modify it under the terms of the GNU General Public License
as published by the Free Software Foundation; either version 2
of the License, or (at your option) any later version.

This program is distributed in the hope that it will be useful,
but WITHOUT ANY WARRANTY; without even the implied warranty of
MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.

See the GNU General Public License for more details.

You should have received a copy of the GNU General Public License
along with this program; if not, write to the Free Software
Foundation, Inc., 59 Temple Place - Suite 330, Boston, MA  02111-1307, USA.
*/

use log::{debug, info};

use crate::dispatch::{ThinkKind, TouchKind, UseKind};
use crate::g_combat::t_damage;
use crate::g_error::GameResult;
use crate::g_local::*;
use crate::g_utils::{g_free_edict, g_set_movedir, use_targets};
use crate::g_world::link_entity;
use crate::game_import::{ATTN_NORM, CHAN_AUTO};

// trigger_multiple / trigger_once
pub const TRIGGER_MONSTER: i32 = 1;
pub const TRIGGER_NOT_PLAYER: i32 = 2;
pub const TRIGGER_TRIGGERED: i32 = 4;

// trigger_hurt
pub const HURT_START_OFF: i32 = 1;
pub const HURT_SILENT: i32 = 4;
pub const HURT_NO_PROTECTION: i32 = 8;
pub const HURT_SLOW: i32 = 16;

// trigger_push
pub const PUSH_ONCE: i32 = 1;

/// Common setup: movedir from angles, invisible trigger volume.
pub fn init_trigger(ctx: &mut GameCtx, idx: usize) {
    let e = &mut ctx.edicts[idx];
    if !vector_compare(&e.s.angles, &VEC3_ORIGIN) {
        e.movedir = g_set_movedir(&mut e.s.angles);
    }
    e.solid = Solid::Trigger;
    e.movetype = MoveType::None;
    e.svflags |= SVF_NOCLIENT;
}

// ============================================================
// trigger_multiple / trigger_once
// ============================================================

/// The wait ran out. A trigger that only fires once removes itself here
/// instead of inside its own touch.
pub fn trigger_rearm(ctx: &mut GameCtx, idx: usize) -> GameResult<()> {
    if ctx.edicts[idx].wait < 0.0 {
        g_free_edict(ctx, idx);
    }
    Ok(())
}

fn multi_trigger(ctx: &mut GameCtx, idx: usize) -> GameResult<()> {
    if ctx.edicts[idx].nextthink != 0.0 {
        return Ok(()); // already been triggered
    }

    let activator = ctx.live_index(ctx.edicts[idx].activator).unwrap_or(idx);
    use_targets(ctx, idx, activator)?;
    if !ctx.edicts[idx].inuse {
        return Ok(());
    }

    let time = ctx.level.time;
    let e = &mut ctx.edicts[idx];
    e.think = Some(ThinkKind::TriggerRearm);
    if e.wait > 0.0 {
        e.nextthink = time + e.wait;
    } else {
        e.touch = None;
        e.nextthink = time + FRAMETIME;
    }
    Ok(())
}

/// Fires the trigger, or switches a dormant one on.
pub fn use_multiple(ctx: &mut GameCtx, self_idx: usize, activator: usize) -> GameResult<()> {
    if ctx.edicts[self_idx].solid == Solid::Not {
        let e = &mut ctx.edicts[self_idx];
        e.solid = Solid::Trigger;
        e.touch = Some(TouchKind::TriggerMultiple);
        debug!("{} ({}) enabled", e.classname, self_idx);
        link_entity(ctx, self_idx);
        return Ok(());
    }
    ctx.edicts[self_idx].activator = activator as i32;
    multi_trigger(ctx, self_idx)
}

pub fn touch_multiple(ctx: &mut GameCtx, self_idx: usize, other: usize) -> GameResult<()> {
    let (s, o) = (&ctx.edicts[self_idx], &ctx.edicts[other]);
    if o.client.is_some() {
        if s.spawnflags & TRIGGER_NOT_PLAYER != 0 {
            return Ok(());
        }
    } else if o.is_monster() {
        if s.spawnflags & TRIGGER_MONSTER == 0 {
            return Ok(());
        }
    } else {
        return Ok(());
    }

    // directional triggers only fire when entered facing the right way
    if !vector_compare(&s.movedir, &VEC3_ORIGIN) {
        let (forward, _, _) = angle_vectors_tuple(&o.s.angles);
        if dot_product(&forward, &s.movedir) < 0.0 {
            return Ok(());
        }
    }

    ctx.edicts[self_idx].activator = other as i32;
    multi_trigger(ctx, self_idx)
}

pub fn sp_trigger_multiple(ctx: &mut GameCtx, idx: usize) -> GameResult<()> {
    init_trigger(ctx, idx);
    let e = &mut ctx.edicts[idx];
    if e.wait == 0.0 {
        e.wait = 0.2;
    }
    e.use_fn = Some(UseKind::TriggerMultiple);
    if e.spawnflags & TRIGGER_TRIGGERED != 0 {
        e.solid = Solid::Not;
    } else {
        e.touch = Some(TouchKind::TriggerMultiple);
    }
    link_entity(ctx, idx);
    Ok(())
}

pub fn sp_trigger_once(ctx: &mut GameCtx, idx: usize) -> GameResult<()> {
    ctx.edicts[idx].wait = -1.0;
    sp_trigger_multiple(ctx, idx)
}

// ============================================================
// trigger_hurt
// ============================================================

pub fn hurt_touch(ctx: &mut GameCtx, self_idx: usize, other: usize) -> GameResult<()> {
    if ctx.edicts[other].takedamage == Damage::No {
        return Ok(());
    }
    let time = ctx.level.time;
    let (spawnflags, dmg) = {
        let s = &mut ctx.edicts[self_idx];
        if s.timestamp > time {
            return Ok(());
        }
        s.timestamp = if s.spawnflags & HURT_SLOW != 0 { time + 1.0 } else { time + FRAMETIME };
        (s.spawnflags, s.dmg)
    };

    if spawnflags & HURT_SILENT == 0 && ctx.level.framenum % 10 == 0 {
        let snd = ctx.configstrings.sound_index("world/electro.wav");
        ctx.gi.play_sound(other as i32, CHAN_AUTO, snd, 1.0, ATTN_NORM, 0.0);
    }

    let dflags = if spawnflags & HURT_NO_PROTECTION != 0 {
        DamageFlags::NO_PROTECTION
    } else {
        DamageFlags::empty()
    };
    let point = ctx.edicts[other].s.origin;
    t_damage(
        ctx,
        other,
        self_idx,
        self_idx,
        &VEC3_ORIGIN,
        &point,
        &VEC3_ORIGIN,
        dmg,
        dmg,
        dflags,
        MeansOfDeath::TriggerHurt,
    )?;
    Ok(())
}

pub fn sp_trigger_hurt(ctx: &mut GameCtx, idx: usize) -> GameResult<()> {
    init_trigger(ctx, idx);
    let e = &mut ctx.edicts[idx];
    e.touch = Some(TouchKind::TriggerHurt);
    if e.dmg == 0 {
        e.dmg = 5;
    }
    if e.spawnflags & HURT_START_OFF != 0 {
        e.solid = Solid::Not;
    }
    link_entity(ctx, idx);
    Ok(())
}

// ============================================================
// trigger_push
// ============================================================

pub fn push_touch(ctx: &mut GameCtx, self_idx: usize, other: usize) -> GameResult<()> {
    let (velocity, once) = {
        let s = &ctx.edicts[self_idx];
        (vector_scale(&s.movedir, s.speed), s.spawnflags & PUSH_ONCE != 0)
    };

    let o = &ctx.edicts[other];
    if o.classname == "grenade" || o.health > 0 {
        ctx.edicts[other].velocity = velocity;
        ctx.edicts[other].groundentity = -1;
        if let Some(c) = ctx.client_of_mut(other) {
            // no falling damage from the launch itself
            c.old_velocity = velocity;
        }
    }

    if once {
        g_free_edict(ctx, self_idx);
    }
    Ok(())
}

pub fn sp_trigger_push(ctx: &mut GameCtx, idx: usize) -> GameResult<()> {
    init_trigger(ctx, idx);
    let e = &mut ctx.edicts[idx];
    e.touch = Some(TouchKind::TriggerPush);
    if e.speed == 0.0 {
        e.speed = 1000.0;
    }
    link_entity(ctx, idx);
    Ok(())
}

// ============================================================
// trigger_secret
// ============================================================

pub fn secret_touch(ctx: &mut GameCtx, self_idx: usize, other: usize) -> GameResult<()> {
    if ctx.edicts[other].client.is_none() || ctx.edicts[other].health <= 0 {
        return Ok(());
    }

    ctx.level.found_secrets += 1;
    info!(
        "secret found ({}/{})",
        ctx.level.found_secrets, ctx.level.total_secrets
    );
    if ctx.edicts[self_idx].message.is_empty() {
        ctx.gi.centerprintf(other as i32, "You found a secret area!");
    }
    let snd = ctx.configstrings.sound_index("misc/secret.wav");
    ctx.gi.play_sound(other as i32, CHAN_AUTO, snd, 1.0, ATTN_NORM, 0.0);

    use_targets(ctx, self_idx, other)?;
    if ctx.edicts[self_idx].inuse {
        g_free_edict(ctx, self_idx);
    }
    Ok(())
}

pub fn sp_trigger_secret(ctx: &mut GameCtx, idx: usize) -> GameResult<()> {
    init_trigger(ctx, idx);
    ctx.edicts[idx].touch = Some(TouchKind::TriggerSecret);
    ctx.level.total_secrets += 1;
    link_entity(ctx, idx);
    Ok(())
}

// ============================================================
// target_relay / target_objective
// ============================================================

pub fn relay_use(ctx: &mut GameCtx, self_idx: usize, activator: usize) -> GameResult<()> {
    use_targets(ctx, self_idx, activator)
}

pub fn sp_target_relay(ctx: &mut GameCtx, idx: usize) -> GameResult<()> {
    let e = &mut ctx.edicts[idx];
    e.use_fn = Some(UseKind::Relay);
    e.svflags |= SVF_NOCLIENT;
    Ok(())
}

/// Publishes the entity's message as the current mission objective.
pub fn objective_use(ctx: &mut GameCtx, self_idx: usize) -> GameResult<()> {
    let text = ctx.edicts[self_idx].message.clone();
    info!("objective: {}", text);
    ctx.configstrings.set(CS_OBJECTIVE, &text);
    ctx.gi.bprintf(&format!("Objective: {}\n", text));
    ctx.level.objective = text;
    Ok(())
}

pub fn sp_target_objective(ctx: &mut GameCtx, idx: usize) -> GameResult<()> {
    let e = &mut ctx.edicts[idx];
    e.use_fn = Some(UseKind::Objective);
    e.svflags |= SVF_NOCLIENT;
    Ok(())
}
