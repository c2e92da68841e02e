// g_main.rs — game initialization, the fixed tick and session state

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

use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

use sofsim_common::cmodel::CollisionModel;
use sofsim_common::cvar::CvarFlags;

use crate::g_error::{GameError, GameResult};
use crate::g_local::*;
use crate::g_phys::g_run_entity;
use crate::g_world::{link_entity, SpatialIndex};

// ============================================================
// InitGame
// ============================================================

/// Register the game's variables and cache the ones read every tick.
fn register_cvars(ctx: &mut GameCtx) {
    let c = &mut ctx.cvars;
    c.get("sv_gravity", "800", CvarFlags::empty());
    c.get("sv_maxvelocity", "2000", CvarFlags::empty());
    c.get("skill", "1", CvarFlags::LATCH);
    c.get("deathmatch", "0", CvarFlags::LATCH | CvarFlags::SERVERINFO);
    c.get("friendly_fire", "0", CvarFlags::SERVERINFO);
    c.get("maxentities", &MAX_EDICTS.to_string(), CvarFlags::LATCH);
    c.get("maxclients", "1", CvarFlags::LATCH | CvarFlags::SERVERINFO);
    c.get("ai_freeze", "0", CvarFlags::empty());
    c.get("ai_maxcorpses", "8", CvarFlags::ARCHIVE);
    c.get("g_timescale", "1", CvarFlags::empty());
    c.get("spawn_protect", "2", CvarFlags::ARCHIVE);
    c.get("sv_seed", "0", CvarFlags::empty());
}

/// Copy the variable table into the cached floats on the context.
pub fn refresh_cvars(ctx: &mut GameCtx) {
    let c = &ctx.cvars;
    ctx.sv_gravity = c.variable_value("sv_gravity");
    ctx.sv_maxvelocity = c.variable_value("sv_maxvelocity");
    ctx.skill = c.variable_value("skill").clamp(0.0, 3.0);
    ctx.deathmatch = c.variable_value("deathmatch");
    ctx.friendly_fire = c.variable_value("friendly_fire");
    ctx.maxentities = c.variable_value("maxentities");
    ctx.maxclients = c.variable_value("maxclients");
    ctx.ai_freeze = c.variable_value("ai_freeze");
    ctx.ai_maxcorpses = c.variable_value("ai_maxcorpses");
    ctx.g_timescale = c.variable_value("g_timescale");
    ctx.spawn_protect = c.variable_value("spawn_protect");
    ctx.sv_seed = c.variable_value("sv_seed");
    if ctx.g_timescale <= 0.0 {
        warn!("g_timescale {} is not positive, using 1", ctx.g_timescale);
        ctx.g_timescale = 1.0;
    }
}

/// Set a variable and re-read the cached values.
pub fn set_cvar(ctx: &mut GameCtx, name: &str, value: &str) {
    ctx.cvars.set(name, value);
    refresh_cvars(ctx);
}

/// Called once when the simulation is created. Variables set before this
/// (from a config file) keep their values.
pub fn init_game(ctx: &mut GameCtx) {
    info!("==== InitGame ====");

    register_cvars(ctx);
    ctx.cvars.get_latched_vars();
    refresh_cvars(ctx);

    let maxentities = (ctx.maxentities.max(1.0) as usize).clamp(64, MAX_EDICTS);
    let maxclients = (ctx.maxclients.max(1.0) as usize).min(maxentities / 4);
    ctx.maxentities = maxentities as f32;
    ctx.maxclients = maxclients as f32;

    ctx.rng = if ctx.sv_seed == 0.0 {
        StdRng::from_entropy()
    } else {
        StdRng::seed_from_u64(ctx.sv_seed as u64)
    };

    ctx.game = GameLocals {
        maxclients,
        maxentities,
        ..Default::default()
    };

    ctx.edicts = (0..maxentities)
        .map(|i| {
            let mut e = Edict::init(i, 0);
            e.inuse = false;
            e
        })
        .collect();
    ctx.edicts[0] = Edict::init(0, 0);
    ctx.edicts[0].classname = "worldspawn".to_string();
    ctx.edicts[0].solid = Solid::Bsp;
    ctx.clients = (0..maxclients).map(|_| GClient::default()).collect();
    ctx.free_list.clear();
    ctx.num_edicts = maxclients as i32 + 1;
    ctx.max_edicts = maxentities as i32;

    ctx.level = LevelLocals {
        time_scale: ctx.g_timescale,
        ..Default::default()
    };

    let (mins, maxs) = ctx.world.bounds();
    ctx.area = SpatialIndex::new(&mins, &maxs);

    ctx.configstrings.clear();
    ctx.configstrings.set(CS_MAXCLIENTS, &maxclients.to_string());

    debug!(
        "init_game: {} entities, {} clients, skill {}, deathmatch {}",
        maxentities, maxclients, ctx.skill, ctx.deathmatch
    );
}

// ============================================================
// Configstrings
// ============================================================

pub fn get_configstring(ctx: &GameCtx, index: usize) -> &str {
    ctx.configstrings.get(index)
}

pub fn set_configstring(ctx: &mut GameCtx, index: usize, value: &str) {
    ctx.configstrings.set(index, value);
}

// ============================================================
// Input
// ============================================================

/// Queue a command for a player. It is consumed by the player's pre-think
/// during the next tick.
pub fn apply_player_input(ctx: &mut GameCtx, handle: EntityHandle, cmd: UserCmd) -> GameResult<()> {
    let idx = ctx.resolve(handle).ok_or(GameError::StaleHandle)?;
    let client = ctx.client_of_mut(idx).ok_or(GameError::InvalidEntity { index: handle.index })?;
    client.cmd = Some(cmd);
    Ok(())
}

// ============================================================
// Session state
// ============================================================

/// Scale every per-tick delta by `scale` for `duration` seconds of game time.
pub fn set_time_scale(ctx: &mut GameCtx, scale: f32, duration: f32) {
    let scale = if scale.is_finite() && scale > 0.0 { scale.min(4.0) } else { 1.0 };
    ctx.level.time_scale = scale;
    ctx.level.time_scale_until = ctx.level.time + duration.max(0.0);
    debug!("time scale {} until {}", scale, ctx.level.time_scale_until);
}

fn check_time_scale(ctx: &mut GameCtx) {
    let level = &mut ctx.level;
    if level.time_scale != ctx.g_timescale && level.time >= level.time_scale_until {
        level.time_scale = ctx.g_timescale;
        level.time_scale_until = 0.0;
    }
}

/// Open a vote. Fails if one is already running.
pub fn start_vote(ctx: &mut GameCtx, description: &str, seconds: f32) -> bool {
    if ctx.level.vote.is_some() {
        return false;
    }
    let vote = Vote {
        description: description.to_string(),
        yes: 0,
        no: 0,
        deadline: ctx.level.time + seconds,
    };
    ctx.configstrings.set(CS_VOTE, &vote_line(&vote));
    ctx.gi.bprintf(&format!("vote called: {}\n", description));
    ctx.level.vote = Some(vote);
    true
}

pub fn cast_vote(ctx: &mut GameCtx, yes: bool) -> bool {
    let Some(vote) = ctx.level.vote.as_mut() else {
        return false;
    };
    if yes {
        vote.yes += 1;
    } else {
        vote.no += 1;
    }
    let line = vote_line(vote);
    ctx.configstrings.set(CS_VOTE, &line);
    true
}

fn vote_line(vote: &Vote) -> String {
    format!("{} yes:{} no:{}", vote.description, vote.yes, vote.no)
}

/// Close the vote once its deadline passes. Returns whether it passed.
fn check_vote(ctx: &mut GameCtx) -> Option<bool> {
    let expired = ctx.level.vote.as_ref().is_some_and(|v| ctx.level.time >= v.deadline);
    if !expired {
        return None;
    }
    let vote = ctx.level.vote.take()?;
    let passed = vote.yes > vote.no;
    ctx.configstrings.set(CS_VOTE, "");
    let msg = format!(
        "vote {}: {} ({} yes, {} no)\n",
        if passed { "passed" } else { "failed" },
        vote.description,
        vote.yes,
        vote.no
    );
    info!("{}", msg.trim_end());
    ctx.gi.bprintf(&msg);
    Some(passed)
}

// ============================================================
// Frame
// ============================================================

/// Advance the simulation by one fixed quantum. Callers accumulate real
/// time and call this once per 100 ms.
pub fn tick(ctx: &mut GameCtx, delta_ms: i32) -> GameResult<()> {
    if delta_ms != SERVER_FRAMETIME_MS {
        warn!("tick: got {} ms, stepping a fixed {} ms", delta_ms, SERVER_FRAMETIME_MS);
    }
    g_run_frame(ctx)
}

/// Monsters standing on something that went away have to look for ground.
fn check_ground_entity(ctx: &mut GameCtx, i: usize) {
    let ground = ctx.edicts[i].groundentity;
    if ground <= 0 {
        return;
    }
    let gone = match ctx.live_index(ground) {
        Some(g) => ctx.edicts[g].solid == Solid::Not,
        None => true,
    };
    if gone {
        ctx.edicts[i].groundentity = -1;
        let e = &ctx.edicts[i];
        if e.is_monster() && !e.flags.intersects(EntityFlags::FLY | EntityFlags::SWIM) {
            crate::m_move::m_check_ground(ctx, i);
        }
    }
}

/// Run every entity once, in slot order.
pub fn g_run_frame(ctx: &mut GameCtx) -> GameResult<()> {
    ctx.level.framenum += 1;
    ctx.level.time += ctx.frametime();

    let mut i = 0;
    while i < ctx.num_edicts as usize {
        if !ctx.edicts[i].inuse {
            i += 1;
            continue;
        }

        ctx.level.current_entity = i as i32;
        ctx.edicts[i].s.old_origin = ctx.edicts[i].s.origin;
        check_ground_entity(ctx, i);

        if let Err(err) = g_run_entity(ctx, i) {
            if err.is_fatal() {
                error!("g_run_frame: {}", err);
                return Err(err);
            }
            error!(
                "entity {} ({}) faulted: {}",
                i,
                ctx.edicts.get(i).map_or("?", |e| e.classname.as_str()),
                err
            );
        }
        i += 1;
    }

    client_end_server_frames(ctx);
    relink_moved_entities(ctx);
    check_time_scale(ctx);
    check_vote(ctx);
    Ok(())
}

/// Build the view state of every player now that all pushing and damage
/// has been applied.
pub fn client_end_server_frames(ctx: &mut GameCtx) {
    for i in 1..=ctx.game.maxclients {
        if i >= ctx.edicts.len() {
            break;
        }
        if !ctx.edicts[i].inuse || ctx.edicts[i].client.is_none() {
            continue;
        }
        if let Err(err) = crate::p_view::client_end_server_frame(ctx, i) {
            error!("player {} end of frame: {}", i, err);
        }
    }
}

/// Anything whose origin was changed without a relink gets its absolute box
/// fixed before the tick is published.
fn relink_moved_entities(ctx: &mut GameCtx) {
    for i in 1..ctx.num_edicts as usize {
        let e = &ctx.edicts[i];
        if !e.inuse {
            continue;
        }
        let absmin = vector_add(&e.s.origin, &e.mins);
        let absmax = vector_add(&e.s.origin, &e.maxs);
        if !vector_compare(&absmin, &e.absmin) || !vector_compare(&absmax, &e.absmax) {
            link_entity(ctx, i);
        }
    }
}
