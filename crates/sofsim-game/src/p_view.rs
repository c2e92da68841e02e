// p_view.rs — end-of-frame player view, damage over time and falling
//
// Copyright (C) 1997-2001 Id Software, Inc.
// Licensed under the GNU General Public License v2+

use log::trace;

use crate::g_combat::t_damage;
use crate::g_error::GameResult;
use crate::g_local::*;
use crate::game_import::{ATTN_NORM, CHAN_BODY};
use crate::p_client::view_height;

const BLEND_DECAY: f32 = 0.05;

const BURN_DAMAGE: i32 = 3;
const BURN_INTERVAL: f32 = 0.5;
const BLEED_DAMAGE: i32 = 1;
const BLEED_INTERVAL: f32 = 1.0;
const POISON_DAMAGE: i32 = 2;
const POISON_INTERVAL: f32 = 1.0;

const ROLL_ANGLE: f32 = 2.0;
const ROLL_SPEED: f32 = 200.0;
/// View kick per unit of fall damage, recovered at FALL_RECOVER per second.
const FALL_KICK: f32 = 0.5;
const FALL_RECOVER: f32 = 20.0;
const CONCUSS_JITTER: f32 = 2.0;

pub fn sv_add_blend(r: f32, g: f32, b: f32, a: f32, v_blend: &mut [f32; 4]) {
    if a <= 0.0 {
        return;
    }
    let a2 = v_blend[3] + (1.0 - v_blend[3]) * a; // new total alpha
    let a3 = v_blend[3] / a2; // fraction of color from old

    v_blend[0] = v_blend[0] * a3 + r * (1.0 - a3);
    v_blend[1] = v_blend[1] * a3 + g * (1.0 - a3);
    v_blend[2] = v_blend[2] * a3 + b * (1.0 - a3);
    v_blend[3] = a2;
}

/// Falling damage for a landing at `speed` units per second downward.
pub fn fall_damage(speed: f32) -> i32 {
    if speed > 700.0 {
        ((speed - 300.0) * 0.1) as i32
    } else if speed > 500.0 {
        ((speed - 300.0) * 0.05) as i32
    } else {
        0
    }
}

/// Roll the view into strafes.
pub fn sv_calc_roll(angles: &Vec3, velocity: &Vec3) -> f32 {
    let (_, right, _) = angle_vectors_tuple(angles);
    let side = dot_product(velocity, &right);
    let sign = if side < 0.0 { -1.0 } else { 1.0 };
    let side = side.abs();
    let roll = if side < ROLL_SPEED {
        side * ROLL_ANGLE / ROLL_SPEED
    } else {
        ROLL_ANGLE
    };
    roll * sign
}

// ============================================================
// Damage over time
// ============================================================

fn status_damage(ctx: &mut GameCtx, idx: usize) -> GameResult<()> {
    let now = ctx.level.time;
    let Some(client) = ctx.client_of_mut(idx) else {
        return Ok(());
    };
    let fx = &mut client.effects;
    let mut hits = Vec::new();
    if fx.burning_until > now && now >= fx.burn_next {
        hits.push((BURN_DAMAGE, MeansOfDeath::Burning));
        fx.burn_next += BURN_INTERVAL;
    }
    if fx.bleeding_until > now && now >= fx.bleed_next {
        hits.push((BLEED_DAMAGE, MeansOfDeath::Bleeding));
        fx.bleed_next += BLEED_INTERVAL;
    }
    if fx.poisoned_until > now && now >= fx.poison_next {
        hits.push((POISON_DAMAGE, MeansOfDeath::Poison));
        fx.poison_next += POISON_INTERVAL;
    }
    if hits.is_empty() {
        return Ok(());
    }
    let applied_by = fx.inflictor;

    // credit goes to whoever applied it, if they are still around
    let inflictor = ctx.live_index(applied_by).unwrap_or(0);
    let origin = ctx.edicts[idx].s.origin;
    for (damage, mod_) in hits {
        if !ctx.edicts[idx].is_alive() {
            break;
        }
        trace!("player {}: {:?} for {}", idx, mod_, damage);
        t_damage(
            ctx,
            idx,
            inflictor,
            inflictor,
            &VEC3_ORIGIN,
            &origin,
            &VEC3_ORIGIN,
            damage,
            0,
            DamageFlags::NO_ARMOR | DamageFlags::NO_KNOCKBACK,
            mod_,
        )?;
    }
    Ok(())
}

// ============================================================
// Falling
// ============================================================

fn p_falling_damage(ctx: &mut GameCtx, idx: usize) -> GameResult<()> {
    let on_ground = ctx.edicts[idx].groundentity >= 0;
    let alive = ctx.edicts[idx].is_alive();
    let Some(client) = ctx.client_of_mut(idx) else {
        return Ok(());
    };
    let landed = on_ground && !client.was_on_ground;
    client.was_on_ground = on_ground;
    if !landed || !alive {
        return Ok(());
    }

    let speed = -client.old_velocity[2];
    let damage = fall_damage(speed);
    if damage <= 0 {
        return Ok(());
    }
    client.fall_value = client.fall_value.max(damage as f32 * FALL_KICK);

    let snd = ctx.configstrings.sound_index(if damage >= 15 {
        "player/fall1.wav"
    } else {
        "player/fall2.wav"
    });
    ctx.gi.play_sound(idx as i32, CHAN_BODY, snd, 1.0, ATTN_NORM, 0.0);

    let origin = ctx.edicts[idx].s.origin;
    t_damage(
        ctx,
        idx,
        0,
        0,
        &[0.0, 0.0, 1.0],
        &origin,
        &VEC3_ORIGIN,
        damage,
        0,
        DamageFlags::NO_ARMOR | DamageFlags::NO_KNOCKBACK,
        MeansOfDeath::Falling,
    )?;
    Ok(())
}

// ============================================================
// View
// ============================================================

fn sv_calc_blend(ctx: &mut GameCtx, idx: usize) {
    let now = ctx.level.time;
    let Some(client) = ctx.client_of_mut(idx) else {
        return;
    };
    let blend = &mut client.ps.blend;
    blend[3] = (blend[3] - BLEND_DECAY).max(0.0);
    if blend[3] == 0.0 {
        *blend = [0.0; 4];
    }

    let count = client.damage_blood + client.damage_armor;
    if count > 0 {
        let a = (0.2 + count as f32 * 0.01).min(0.6);
        if client.damage_armor > client.damage_blood {
            sv_add_blend(1.0, 1.0, 1.0, a, blend);
        } else {
            sv_add_blend(1.0, 0.0, 0.0, a, blend);
        }
    }

    // a flashbang whites out the screen, fading over its last two seconds
    let flashed = client.effects.flashed_until - now;
    if flashed > 0.0 {
        sv_add_blend(1.0, 1.0, 1.0, (flashed / 2.0).min(1.0), blend);
    }

    if client.bonus_alpha > 0.0 {
        sv_add_blend(0.85, 0.7, 0.3, client.bonus_alpha, blend);
        client.bonus_alpha = (client.bonus_alpha - 0.1).max(0.0);
    }
}

fn sv_calc_view_offset(ctx: &mut GameCtx, idx: usize) {
    let now = ctx.level.time;
    let ft = ctx.frametime();
    let concussed = ctx.client_of(idx).is_some_and(|c| c.effects.concussed_until > now);
    let jitter = if concussed {
        [ctx.crandom() * CONCUSS_JITTER, ctx.crandom() * CONCUSS_JITTER, ctx.crandom() * CONCUSS_JITTER]
    } else {
        VEC3_ORIGIN
    };
    let velocity = ctx.edicts[idx].velocity;
    let dead = !ctx.edicts[idx].is_alive();
    let Some(client) = ctx.client_of_mut(idx) else {
        return;
    };

    let (_, right, _) = angle_vectors_tuple(&[0.0, client.v_angle[YAW], 0.0]);
    let mut offset = vector_scale(&right, client.lean_offset);
    offset[2] = view_height(client.stance);

    if client.fall_value > 0.0 {
        offset[2] -= client.fall_value;
        client.fall_value = (client.fall_value - FALL_RECOVER * ft).max(0.0);
    }
    client.ps.viewoffset = vector_add(&offset, &jitter);

    if dead {
        client.ps.viewangles[ROLL] = 40.0;
        client.ps.viewangles[PITCH] = -15.0;
        client.ps.viewoffset[2] = -8.0;
    } else {
        client.ps.viewangles[ROLL] = sv_calc_roll(&client.v_angle, &velocity) + client.lean as f32 * 10.0;
    }
}

fn g_set_client_effects(ctx: &mut GameCtx, idx: usize) {
    let now = ctx.level.time;
    let Some(client) = ctx.client_of(idx) else {
        return;
    };
    let alive = ctx.edicts[idx].is_alive();
    let mut effects = ctx.edicts[idx].s.effects & EF_MUZZLEFLASH;
    if client.flashlight && alive {
        effects |= EF_FLASHLIGHT;
    }
    if client.effects.burning_until > now {
        effects |= EF_BURNING;
    }
    ctx.edicts[idx].s.effects = effects;
}

/// Called for each player at the end of the frame, after all movement and
/// damage has been applied.
pub fn client_end_server_frame(ctx: &mut GameCtx, idx: usize) -> GameResult<()> {
    status_damage(ctx, idx)?;
    p_falling_damage(ctx, idx)?;

    sv_calc_blend(ctx, idx);
    sv_calc_view_offset(ctx, idx);
    g_set_client_effects(ctx, idx);

    if let Some(client) = ctx.client_of_mut(idx) {
        client.damage_blood = 0;
        client.damage_armor = 0;
    }
    let e = &mut ctx.edicts[idx];
    e.damage_taken = false;
    e.pending_damage = 0;
    Ok(())
}
