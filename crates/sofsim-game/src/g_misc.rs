// g_misc.rs — props, gibs, path markers and spawn points

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

use log::warn;

use crate::dispatch::{DieKind, ThinkKind};
use crate::g_error::GameResult;
use crate::g_local::*;
use crate::g_utils::{g_free_edict, g_spawn};
use crate::g_world::link_entity;
use crate::game_import::{EffectKind, ATTN_NORM, CHAN_BODY};

const GIB_COUNT: usize = 4;
const GIB_LIFE: f32 = 10.0;
const DEADSOLDIER_GIB_HEALTH: i32 = -80;

// ============================================================
// Gibs
// ============================================================

/// Scatter gib chunks from `idx`, scaled by the damage that caused them.
pub fn throw_gibs(ctx: &mut GameCtx, idx: usize, damage: i32) -> GameResult<()> {
    let origin = {
        let e = &ctx.edicts[idx];
        vector_add(&e.s.origin, &vector_scale(&vector_add(&e.mins, &e.maxs), 0.5))
    };
    ctx.gi.spawn_particle_effect(&origin, &[0.0, 0.0, 1.0], EffectKind::Gib, 12);
    let snd = ctx.configstrings.sound_index("misc/udeath.wav");
    ctx.gi.play_sound(idx as i32, CHAN_BODY, snd, 1.0, ATTN_NORM, 0.0);

    let kick = if damage < 50 { 0.7 } else { 1.2 };
    let modelindex = ctx.configstrings.model_index("models/gibs/chunk.ghb");
    let time = ctx.level.time;
    for _ in 0..GIB_COUNT {
        let velocity = [
            100.0 * ctx.crandom() * kick * 2.0,
            100.0 * ctx.crandom() * kick * 2.0,
            (200.0 + 100.0 * ctx.random()) * kick,
        ];
        let avelocity = [ctx.random() * 600.0, ctx.random() * 600.0, ctx.random() * 600.0];
        let g = g_spawn(ctx)?;
        let e = &mut ctx.edicts[g];
        e.classname = "gib".to_string();
        e.s.origin = origin;
        e.s.modelindex = modelindex;
        e.velocity = velocity;
        e.avelocity = avelocity;
        e.movetype = MoveType::Bounce;
        e.solid = Solid::Not;
        e.think = Some(ThinkKind::FreeEdict);
        e.nextthink = time + GIB_LIFE + (g % 5) as f32;
        link_entity(ctx, g);
    }
    Ok(())
}

// ============================================================
// misc_deadsoldier
// ============================================================

/// Decorative corpses only break up under heavy damage.
pub fn corpse_die(ctx: &mut GameCtx, self_idx: usize, point: &Vec3) -> GameResult<()> {
    let (health, gib_health) = (ctx.edicts[self_idx].health, ctx.edicts[self_idx].gib_health);
    if health > gib_health {
        return Ok(());
    }
    ctx.gi.spawn_particle_effect(point, &[0.0, 0.0, 1.0], EffectKind::Blood, 8);
    throw_gibs(ctx, self_idx, -health)?;
    g_free_edict(ctx, self_idx);
    Ok(())
}

pub fn sp_misc_deadsoldier(ctx: &mut GameCtx, idx: usize) -> GameResult<()> {
    if ctx.deathmatch != 0.0 {
        g_free_edict(ctx, idx);
        return Ok(());
    }
    let modelindex = ctx.configstrings.model_index("models/deadbods/soldier.ghb");
    let e = &mut ctx.edicts[idx];
    e.movetype = MoveType::None;
    e.solid = Solid::Bbox;
    e.s.modelindex = modelindex;
    // spawnflags 2..32 pick one of the death poses
    let spawnflags = e.spawnflags;
    e.s.frame = (1..=5).find(|k| spawnflags & (1 << k) != 0).unwrap_or(0);
    e.mins = [-16.0, -16.0, 0.0];
    e.maxs = [16.0, 16.0, 16.0];
    e.deadflag = DeadFlag::Dead;
    e.takedamage = Damage::Yes;
    e.gib_health = DEADSOLDIER_GIB_HEALTH;
    e.svflags |= SVF_DEADMONSTER;
    e.die = Some(DieKind::Corpse);
    link_entity(ctx, idx);
    Ok(())
}

// ============================================================
// misc_explobox_big
// ============================================================

/// Free-standing barrel; goes off like func_explosive.
pub fn sp_misc_explobox_big(ctx: &mut GameCtx, idx: usize) -> GameResult<()> {
    if ctx.deathmatch != 0.0 {
        g_free_edict(ctx, idx);
        return Ok(());
    }
    let modelindex = ctx.configstrings.model_index("models/objects/barrel.ghb");
    let e = &mut ctx.edicts[idx];
    e.solid = Solid::Bbox;
    e.movetype = MoveType::None;
    e.s.modelindex = modelindex;
    e.mins = [-16.0, -16.0, 0.0];
    e.maxs = [16.0, 16.0, 40.0];
    if e.mass == 0 {
        e.mass = 400;
    }
    if e.health <= 0 {
        e.health = 10;
    }
    if e.dmg == 0 {
        e.dmg = 150;
    }
    e.takedamage = Damage::Yes;
    e.die = Some(DieKind::Explosive);
    link_entity(ctx, idx);
    Ok(())
}

// ============================================================
// Markers
// ============================================================

/// Patrol waypoint. Monsters walk from one to the next through `target`.
pub fn sp_path_corner(ctx: &mut GameCtx, idx: usize) -> GameResult<()> {
    if ctx.edicts[idx].targetname.is_empty() {
        warn!("path_corner with no targetname at {}", vtos(&ctx.edicts[idx].s.origin));
        g_free_edict(ctx, idx);
        return Ok(());
    }
    let e = &mut ctx.edicts[idx];
    e.solid = Solid::Not;
    e.mins = [-8.0, -8.0, -8.0];
    e.maxs = [8.0, 8.0, 8.0];
    e.svflags |= SVF_NOCLIENT;
    link_entity(ctx, idx);
    Ok(())
}

/// `info_player_start` and `info_player_deathmatch`: just a position.
pub fn sp_info_player(ctx: &mut GameCtx, idx: usize) -> GameResult<()> {
    let e = &mut ctx.edicts[idx];
    e.solid = Solid::Not;
    e.svflags |= SVF_NOCLIENT;
    Ok(())
}
