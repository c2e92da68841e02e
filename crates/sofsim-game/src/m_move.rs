// m_move.rs -- monster movement
//
// Copyright (C) 1997-2001 Id Software, Inc.
// Licensed under the GNU General Public License v2 or later.

use crate::g_error::GameResult;
use crate::g_local::*;
use crate::g_utils::g_touch_triggers;
use crate::g_world::{link_entity, point_contents, trace};

pub const STEPSIZE: f32 = 18.0;
const DI_NODIR: f32 = -1.0;

// ============================================================
// M_CheckGround
// ============================================================

/// Find out whether a monster is standing on something.
pub fn m_check_ground(ctx: &mut GameCtx, ent_idx: usize) {
    let e = &ctx.edicts[ent_idx];
    if e.flags.intersects(EntityFlags::SWIM | EntityFlags::FLY) {
        return;
    }
    if e.velocity[2] > 100.0 {
        ctx.edicts[ent_idx].groundentity = -1;
        return;
    }

    // if the hull point one-quarter unit down is solid the entity is on ground
    let point = [e.s.origin[0], e.s.origin[1], e.s.origin[2] - 0.25];
    let tr = trace(ctx, &e.s.origin, &e.mins, &e.maxs, &point, ent_idx as i32, MASK_MONSTERSOLID);

    let e = &mut ctx.edicts[ent_idx];
    if tr.fraction == 1.0 || (tr.plane.normal[2] < 0.7 && !tr.startsolid) {
        e.groundentity = -1;
        return;
    }
    if !tr.startsolid && !tr.allsolid {
        e.s.origin = tr.endpos;
        e.groundentity = tr.ent_index;
        e.velocity[2] = 0.0;
    }
}

// ============================================================
// M_CheckBottom
// ============================================================

/// False if any part of the bottom of the entity is off an edge that is
/// not a staircase.
pub fn m_check_bottom(ctx: &GameCtx, ent_idx: usize) -> bool {
    let e = &ctx.edicts[ent_idx];
    let mins = vector_add(&e.s.origin, &e.mins);
    let maxs = vector_add(&e.s.origin, &e.maxs);
    let corner = |x: usize, y: usize| -> (f32, f32) {
        (
            if x != 0 { maxs[0] } else { mins[0] },
            if y != 0 { maxs[1] } else { mins[1] },
        )
    };

    // if all of the points under the corners are solid world, don't bother
    // with the tougher checks
    let all_solid = (0..2).all(|x| {
        (0..2).all(|y| {
            let (cx, cy) = corner(x, y);
            point_contents(ctx, &[cx, cy, mins[2] - 1.0]) & CONTENTS_SOLID != 0
        })
    });
    if all_solid {
        return true;
    }

    // the midpoint must be within a step of the bottom
    let mid_x = (mins[0] + maxs[0]) * 0.5;
    let mid_y = (mins[1] + maxs[1]) * 0.5;
    let start = [mid_x, mid_y, mins[2]];
    let stop = [mid_x, mid_y, mins[2] - 2.0 * STEPSIZE];
    let tr = trace(ctx, &start, &VEC3_ORIGIN, &VEC3_ORIGIN, &stop, ent_idx as i32, MASK_MONSTERSOLID);
    if tr.fraction == 1.0 {
        return false;
    }
    let mid = tr.endpos[2];

    // the corners must be within a step of the midpoint
    for x in 0..2 {
        for y in 0..2 {
            let (cx, cy) = corner(x, y);
            let tr = trace(
                ctx,
                &[cx, cy, mins[2]],
                &VEC3_ORIGIN,
                &VEC3_ORIGIN,
                &[cx, cy, stop[2]],
                ent_idx as i32,
                MASK_MONSTERSOLID,
            );
            if tr.fraction == 1.0 || mid - tr.endpos[2] > STEPSIZE {
                return false;
            }
        }
    }
    true
}

// ============================================================
// Movestep
// ============================================================

fn relink(ctx: &mut GameCtx, ent_idx: usize) -> GameResult<()> {
    link_entity(ctx, ent_idx);
    g_touch_triggers(ctx, ent_idx)
}

/// Try to move a walking monster by `mov`, stepping up stairs and down
/// slopes. Nothing moves and false comes back if the move isn't possible.
pub fn movestep(ctx: &mut GameCtx, ent_idx: usize, mov: Vec3, do_relink: bool) -> GameResult<bool> {
    let (oldorg, mins, maxs, partial) = {
        let e = &ctx.edicts[ent_idx];
        (e.s.origin, e.mins, e.maxs, e.flags.contains(EntityFlags::PARTIALGROUND))
    };

    // push down from a step height above the wished position
    let mut neworg = vector_add(&oldorg, &mov);
    neworg[2] += STEPSIZE;
    let mut end = neworg;
    end[2] -= STEPSIZE * 2.0;

    let mut tr = trace(ctx, &neworg, &mins, &maxs, &end, ent_idx as i32, MASK_MONSTERSOLID);
    if tr.allsolid {
        return Ok(false);
    }
    if tr.startsolid {
        neworg[2] -= STEPSIZE;
        tr = trace(ctx, &neworg, &mins, &maxs, &end, ent_idx as i32, MASK_MONSTERSOLID);
        if tr.allsolid || tr.startsolid {
            return Ok(false);
        }
    }

    // don't go in to water
    let feet = [tr.endpos[0], tr.endpos[1], tr.endpos[2] + mins[2] + 1.0];
    if point_contents(ctx, &feet) & MASK_WATER != 0 {
        return Ok(false);
    }

    if tr.fraction == 1.0 {
        // the ground was pulled out, go ahead and fall
        if partial {
            ctx.edicts[ent_idx].s.origin = vector_add(&oldorg, &mov);
            ctx.edicts[ent_idx].groundentity = -1;
            if do_relink {
                relink(ctx, ent_idx)?;
            }
            return Ok(true);
        }
        return Ok(false); // walked off an edge
    }

    // check point traces down for dangling corners
    ctx.edicts[ent_idx].s.origin = tr.endpos;
    if !m_check_bottom(ctx, ent_idx) {
        if partial {
            // floor mostly pulled out from underneath, trying to correct
            if do_relink {
                relink(ctx, ent_idx)?;
            }
            return Ok(true);
        }
        ctx.edicts[ent_idx].s.origin = oldorg;
        return Ok(false);
    }

    let e = &mut ctx.edicts[ent_idx];
    e.flags.remove(EntityFlags::PARTIALGROUND);
    e.groundentity = tr.ent_index;

    if do_relink {
        relink(ctx, ent_idx)?;
    }
    Ok(true)
}

// ============================================================
// Turning
// ============================================================

/// Turn toward `ideal_yaw` by at most `yaw_speed` degrees.
pub fn change_yaw(ctx: &mut GameCtx, ent_idx: usize) {
    let e = &mut ctx.edicts[ent_idx];
    let current = anglemod(e.s.angles[YAW]);
    let ideal = e.ideal_yaw;
    if current == ideal {
        return;
    }

    let mut mov = ideal - current;
    if ideal > current {
        if mov >= 180.0 {
            mov -= 360.0;
        }
    } else if mov <= -180.0 {
        mov += 360.0;
    }
    let speed = e.yaw_speed.max(0.0);
    mov = mov.clamp(-speed, speed);

    e.s.angles[YAW] = anglemod(current + mov);
}

fn yaw_move(yaw: f32, dist: f32) -> Vec3 {
    let rad = yaw.to_radians();
    [rad.cos() * dist, rad.sin() * dist, 0.0]
}

/// Turn to the movement direction, and walk the distance if facing it.
pub fn step_direction(ctx: &mut GameCtx, ent_idx: usize, yaw: f32, dist: f32) -> GameResult<bool> {
    ctx.edicts[ent_idx].ideal_yaw = yaw;
    change_yaw(ctx, ent_idx);

    let oldorigin = ctx.edicts[ent_idx].s.origin;
    let moved = movestep(ctx, ent_idx, yaw_move(yaw, dist), false)?;
    if moved {
        let e = &ctx.edicts[ent_idx];
        let delta = anglemod(e.s.angles[YAW] - e.ideal_yaw);
        if delta > 45.0 && delta < 315.0 {
            // not turned far enough, so don't take the step
            ctx.edicts[ent_idx].s.origin = oldorigin;
        }
    }
    relink(ctx, ent_idx)?;
    Ok(moved)
}

// ============================================================
// Chasing
// ============================================================

/// Pick a new compass heading toward `goal` when the straight line is
/// blocked.
pub fn new_chase_dir(ctx: &mut GameCtx, ent_idx: usize, goal: &Vec3, dist: f32) -> GameResult<()> {
    let (origin, ideal_yaw) = {
        let e = &ctx.edicts[ent_idx];
        (e.s.origin, e.ideal_yaw)
    };
    let olddir = anglemod(((ideal_yaw / 45.0) as i32 as f32) * 45.0);
    let turnaround = anglemod(olddir - 180.0);

    let deltax = goal[0] - origin[0];
    let deltay = goal[1] - origin[1];

    let mut dx = if deltax > 10.0 {
        0.0
    } else if deltax < -10.0 {
        180.0
    } else {
        DI_NODIR
    };
    let mut dy = if deltay < -10.0 {
        270.0
    } else if deltay > 10.0 {
        90.0
    } else {
        DI_NODIR
    };

    // try direct route
    if dx != DI_NODIR && dy != DI_NODIR {
        let tdir = if dx == 0.0 {
            if dy == 90.0 { 45.0 } else { 315.0 }
        } else if dy == 90.0 {
            135.0
        } else {
            225.0
        };
        if tdir != turnaround && step_direction(ctx, ent_idx, tdir, dist)? {
            return Ok(());
        }
    }

    // try other directions
    if ctx.random() < 0.5 || deltay.abs() > deltax.abs() {
        std::mem::swap(&mut dx, &mut dy);
    }
    for d in [dx, dy] {
        if d != DI_NODIR && d != turnaround && step_direction(ctx, ent_idx, d, dist)? {
            return Ok(());
        }
    }

    // there is no direct path to the goal, so pick another direction
    if step_direction(ctx, ent_idx, olddir, dist)? {
        return Ok(());
    }

    let sweep: Vec<f32> = if ctx.random() < 0.5 {
        (0..8).map(|i| i as f32 * 45.0).collect()
    } else {
        (0..8).rev().map(|i| i as f32 * 45.0).collect()
    };
    for tdir in sweep {
        if tdir != turnaround && step_direction(ctx, ent_idx, tdir, dist)? {
            return Ok(());
        }
    }

    if step_direction(ctx, ent_idx, turnaround, dist)? {
        return Ok(());
    }

    ctx.edicts[ent_idx].ideal_yaw = olddir; // can't move

    // a bridge may have been pulled out from underneath
    if !m_check_bottom(ctx, ent_idx) {
        ctx.edicts[ent_idx].flags.insert(EntityFlags::PARTIALGROUND);
    }
    Ok(())
}

/// Whether `goal`'s box is within `dist` of the entity's box on every axis.
pub fn close_enough(ctx: &GameCtx, ent_idx: usize, goal: usize, dist: f32) -> bool {
    let e = &ctx.edicts[ent_idx];
    let g = &ctx.edicts[goal];
    (0..3).all(|i| g.absmin[i] <= e.absmax[i] + dist && g.absmax[i] >= e.absmin[i] - dist)
}

/// Walk up to `dist` toward a point, bumping around obstacles.
pub fn move_to_goal(ctx: &mut GameCtx, ent_idx: usize, goal: &Vec3, dist: f32) -> GameResult<()> {
    let e = &ctx.edicts[ent_idx];
    if e.groundentity < 0 && !e.flags.intersects(EntityFlags::FLY | EntityFlags::SWIM) {
        return Ok(());
    }

    // if the next step hits the enemy, stop
    if let Some(enemy) = ctx.resolve_opt(e.enemy) {
        let to_goal = vector_subtract(goal, &e.s.origin);
        let to_enemy = vector_subtract(&ctx.edicts[enemy].s.origin, &e.s.origin);
        if dot_product(&to_goal, &to_enemy) > 0.0 && close_enough(ctx, ent_idx, enemy, dist) {
            return Ok(());
        }
    }

    let yaw = vectoyaw(&vector_subtract(goal, &ctx.edicts[ent_idx].s.origin));
    ctx.edicts[ent_idx].ideal_yaw = yaw;

    let bump = ctx.random() < 0.25;
    if (bump || !step_direction(ctx, ent_idx, yaw, dist)?) && ctx.edicts[ent_idx].inuse {
        new_chase_dir(ctx, ent_idx, goal, dist)?;
    }
    Ok(())
}

/// Step a grounded monster `dist` units along `yaw`.
pub fn walkmove(ctx: &mut GameCtx, ent_idx: usize, yaw: f32, dist: f32) -> GameResult<bool> {
    let e = &ctx.edicts[ent_idx];
    if e.groundentity < 0 && !e.flags.intersects(EntityFlags::FLY | EntityFlags::SWIM) {
        return Ok(false);
    }
    movestep(ctx, ent_idx, yaw_move(yaw, dist), true)
}
