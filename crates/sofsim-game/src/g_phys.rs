// g_phys.rs — per-movetype entity physics

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

/*
pushmove objects do not obey gravity, and do not interact with each other or trigger fields,
but block normal movement and push normal objects when they move.

onground is set for toss objects when they come to a complete rest. it is set for stepping
or walking objects

doors, plats, etc are SOLID_BSP, and MOVETYPE_PUSH
bonus items are SOLID_TRIGGER touch, and MOVETYPE_TOSS
corpses are SOLID_NOT and MOVETYPE_TOSS
crates are SOLID_BBOX and MOVETYPE_TOSS
walking monsters are SOLID_SLIDEBOX and MOVETYPE_STEP
flying/floating monsters are SOLID_SLIDEBOX and MOVETYPE_FLY

solid_edge items only clip against bsp models.
players are MOVETYPE_WALK and are moved by their own prethink, not here.
*/

use log::trace;

use crate::dispatch::{self, call_blocked, call_touch};
use crate::g_error::GameResult;
use crate::g_local::*;
use crate::g_utils::g_touch_triggers;
use crate::g_world::{area_edicts, link_entity, trace};
use crate::m_move::{m_check_bottom, m_check_ground};

// ============================================================
// Physics constants
// ============================================================

const STOP_EPSILON: f32 = 0.1;

const SV_STOPSPEED: f32 = 100.0;
const SV_FRICTION: f32 = 6.0;

/// Toss-family entities come to rest on surfaces steeper than this.
const GROUND_NORMAL_Z: f32 = 0.7;
/// A bouncing entity settles once its rebound is slower than this.
const BOUNCE_SETTLE_SPEED: f32 = 60.0;

/// Returns the slot blocking `ent` at its current position, if any.
pub fn test_entity_position(ctx: &GameCtx, ent_idx: usize) -> Option<usize> {
    let ent = &ctx.edicts[ent_idx];
    let mask = if ent.clipmask != 0 { ent.clipmask } else { MASK_SOLID };
    let tr = trace(ctx, &ent.s.origin, &ent.mins, &ent.maxs, &ent.s.origin, ent_idx as i32, mask);
    if tr.startsolid {
        Some(tr.ent_index.max(0) as usize)
    } else {
        None
    }
}

/// Bounds velocity to sv_maxvelocity on every axis.
pub fn check_velocity(ctx: &mut GameCtx, ent_idx: usize) {
    let max = ctx.sv_maxvelocity;
    for v in ctx.edicts[ent_idx].velocity.iter_mut() {
        if !v.is_finite() {
            *v = 0.0;
        }
        *v = v.clamp(-max, max);
    }
}

// ============================================================
// Think
// ============================================================

/// Run the entity's think if its wake time has come.
///
/// Returns false when the think removed the entity, in which case the caller
/// must not touch it further this frame.
pub fn run_think(ctx: &mut GameCtx, ent_idx: usize) -> GameResult<bool> {
    let thinktime = ctx.edicts[ent_idx].nextthink;
    if thinktime <= 0.0 || thinktime > ctx.level.time + 0.001 {
        return Ok(true);
    }

    ctx.edicts[ent_idx].nextthink = 0.0;
    match ctx.edicts[ent_idx].think {
        Some(kind) => dispatch::run_think(ctx, ent_idx, kind)?,
        None => trace!("entity {} ({}) has a wake time but no think", ent_idx, ctx.edicts[ent_idx].classname),
    }

    Ok(ctx.edicts[ent_idx].inuse)
}

/// Two entities have touched, so run their touch functions.
pub fn impact(ctx: &mut GameCtx, e1: usize, tr: &Trace) -> GameResult<()> {
    let Some(e2) = ctx.live_index(tr.ent_index) else {
        return Ok(());
    };

    if ctx.edicts[e1].touch.is_some() && ctx.edicts[e1].solid != Solid::Not {
        call_touch(ctx, e1, e2, Some(&tr.plane), tr.surface_flags())?;
    }

    if ctx.edicts[e1].inuse && ctx.edicts[e2].touch.is_some() && ctx.edicts[e2].solid != Solid::Not {
        call_touch(ctx, e2, e1, None, 0)?;
    }
    Ok(())
}

/// Slide off of the impacting surface.
///
/// Returns the new velocity and the blocked flags: 1 = floor, 2 = step or wall.
pub fn clip_velocity(in_vel: &Vec3, normal: &Vec3, overbounce: f32) -> (Vec3, i32) {
    let mut blocked = 0;
    if normal[2] > 0.0 {
        blocked |= 1; // floor
    }
    if normal[2] == 0.0 {
        blocked |= 2; // step
    }

    let backoff = dot_product(in_vel, normal) * overbounce;

    let mut out = [0.0; 3];
    for i in 0..3 {
        out[i] = in_vel[i] - normal[i] * backoff;
        if out[i] > -STOP_EPSILON && out[i] < STOP_EPSILON {
            out[i] = 0.0;
        }
    }
    (out, blocked)
}

/// The basic solid body movement clip that slides along multiple planes.
///
/// Returns the clipflags if the velocity was modified (hit something solid):
/// 1 = floor, 2 = wall / step, 4 = dead stop.
pub fn fly_move(ctx: &mut GameCtx, ent_idx: usize, time: f32, mask: i32) -> GameResult<i32> {
    const NUMBUMPS: usize = 4;

    let mut blocked = 0;
    let original_velocity = ctx.edicts[ent_idx].velocity;
    let primal_velocity = original_velocity;
    let mut planes: Vec<Vec3> = Vec::with_capacity(MAX_CLIP_PLANES);
    let mut time_left = time;

    ctx.edicts[ent_idx].groundentity = -1;

    for _ in 0..NUMBUMPS {
        let (origin, mins, maxs, velocity) = {
            let e = &ctx.edicts[ent_idx];
            (e.s.origin, e.mins, e.maxs, e.velocity)
        };
        let end = vector_ma(&origin, time_left, &velocity);

        let tr = trace(ctx, &origin, &mins, &maxs, &end, ent_idx as i32, mask);

        if tr.allsolid {
            // entity is trapped in another solid
            ctx.edicts[ent_idx].velocity = VEC3_ORIGIN;
            return Ok(3);
        }

        if tr.fraction > 0.0 {
            // actually covered some distance
            ctx.edicts[ent_idx].s.origin = tr.endpos;
            planes.clear();
        }

        if tr.fraction == 1.0 {
            break; // moved the entire distance
        }

        if tr.plane.normal[2] > GROUND_NORMAL_Z {
            blocked |= 1; // floor
            if let Some(hit) = ctx.live_index(tr.ent_index) {
                if hit == 0 || ctx.edicts[hit].solid == Solid::Bsp {
                    ctx.edicts[ent_idx].groundentity = hit as i32;
                }
            }
        }
        if tr.plane.normal[2] == 0.0 {
            blocked |= 2; // step
        }

        impact(ctx, ent_idx, &tr)?;
        if !ctx.edicts[ent_idx].inuse {
            break; // removed by the impact function
        }

        time_left -= time_left * tr.fraction;

        // cliped to another plane
        if planes.len() >= MAX_CLIP_PLANES {
            ctx.edicts[ent_idx].velocity = VEC3_ORIGIN;
            return Ok(3);
        }
        planes.push(tr.plane.normal);

        // modify original_velocity so it parallels all of the clip planes
        let mut chosen = None;
        for (i, plane) in planes.iter().enumerate() {
            let (new_velocity, _) = clip_velocity(&original_velocity, plane, 1.0);
            let fits = planes
                .iter()
                .enumerate()
                .all(|(j, other)| j == i || vector_compare(plane, other) || dot_product(&new_velocity, other) >= 0.0);
            if fits {
                chosen = Some(new_velocity);
                break;
            }
        }

        match chosen {
            Some(v) => ctx.edicts[ent_idx].velocity = v,
            None => {
                // go along the crease
                if planes.len() != 2 {
                    ctx.edicts[ent_idx].velocity = VEC3_ORIGIN;
                    return Ok(7);
                }
                let dir = cross_product(&planes[0], &planes[1]);
                let d = dot_product(&dir, &ctx.edicts[ent_idx].velocity);
                ctx.edicts[ent_idx].velocity = vector_scale(&dir, d);
            }
        }

        // if velocity is against the original velocity, stop dead
        // to avoid tiny occilations in sloping corners
        if dot_product(&ctx.edicts[ent_idx].velocity, &primal_velocity) <= 0.0 {
            ctx.edicts[ent_idx].velocity = VEC3_ORIGIN;
            return Ok(blocked);
        }
    }

    Ok(blocked)
}

pub fn add_gravity(ctx: &mut GameCtx, ent_idx: usize) {
    let step = ctx.sv_gravity * ctx.frametime();
    let ent = &mut ctx.edicts[ent_idx];
    ent.velocity[2] -= ent.gravity * step;
}

// ============================================================
// PUSHMOVE
// ============================================================

/// Move an entity by `push` without changing its velocity.
pub fn push_entity(ctx: &mut GameCtx, ent_idx: usize, push: &Vec3) -> GameResult<Trace> {
    let (start, mins, maxs, clipmask) = {
        let e = &ctx.edicts[ent_idx];
        (e.s.origin, e.mins, e.maxs, e.clipmask)
    };
    let end = vector_add(&start, push);
    let mask = if clipmask != 0 { clipmask } else { MASK_SOLID };

    let mut tr = trace(ctx, &start, &mins, &maxs, &end, ent_idx as i32, mask);
    ctx.edicts[ent_idx].s.origin = tr.endpos;
    link_entity(ctx, ent_idx);

    if tr.fraction != 1.0 {
        impact(ctx, ent_idx, &tr)?;

        // if the pushed entity went away and the pusher is still there
        let gone = tr.ent_index > 0 && ctx.live_index(tr.ent_index).is_none();
        if gone && ctx.edicts[ent_idx].inuse {
            // move the pusher back and try again
            ctx.edicts[ent_idx].s.origin = start;
            link_entity(ctx, ent_idx);
            tr = trace(ctx, &start, &mins, &maxs, &end, ent_idx as i32, mask);
            ctx.edicts[ent_idx].s.origin = tr.endpos;
            link_entity(ctx, ent_idx);
            if tr.fraction != 1.0 {
                impact(ctx, ent_idx, &tr)?;
            }
        }
    }

    if ctx.edicts[ent_idx].inuse {
        g_touch_triggers(ctx, ent_idx)?;
    }
    Ok(tr)
}

#[derive(Debug, Clone, Copy)]
struct Pushed {
    ent: usize,
    origin: Vec3,
    angles: Vec3,
}

/// Move the pusher and everything in its way. On failure every moved
/// entity is put back and the blocking slot is returned.
fn push_move(ctx: &mut GameCtx, pusher: usize, move_vec: &Vec3, amove: &Vec3) -> GameResult<Option<usize>> {
    // clamp the move to 1/8 units, so the position will
    // be accurate for client side prediction
    let mut mv = [0.0f32; 3];
    for i in 0..3 {
        mv[i] = (move_vec[i] * 8.0).round() * 0.125;
    }

    // we need this for pushing things later
    let (forward, right, up) = angle_vectors_tuple(&vector_subtract(&VEC3_ORIGIN, amove));

    let mut pushed = vec![Pushed {
        ent: pusher,
        origin: ctx.edicts[pusher].s.origin,
        angles: ctx.edicts[pusher].s.angles,
    }];

    // move the pusher to its final position
    {
        let p = &mut ctx.edicts[pusher];
        p.s.origin = vector_add(&p.s.origin, &mv);
        p.s.angles = vector_add(&p.s.angles, amove);
    }
    link_entity(ctx, pusher);

    let (mins, maxs) = (ctx.edicts[pusher].absmin, ctx.edicts[pusher].absmax);

    // candidates: everything overlapping the new position, plus riders
    let mut candidates = area_edicts(ctx, &mins, &maxs, AREA_SOLID);
    for (i, e) in ctx.edicts.iter().enumerate().take(ctx.num_edicts as usize) {
        if e.inuse && e.groundentity == pusher as i32 && !candidates.contains(&i) {
            candidates.push(i);
        }
    }
    candidates.sort_unstable();

    let mut obstacle = None;
    for check in candidates {
        if check == pusher || check == 0 {
            continue;
        }
        let c = &ctx.edicts[check];
        if !c.inuse
            || matches!(c.movetype, MoveType::Push | MoveType::Stop | MoveType::None | MoveType::Noclip)
            || c.area_node.is_none()
        {
            continue;
        }

        let rider = c.groundentity == pusher as i32;
        if !rider {
            // see if the ent's bbox is inside the pusher's final position
            let inside = (0..3).all(|k| c.absmin[k] < maxs[k] && c.absmax[k] > mins[k]);
            if !inside {
                continue;
            }
        }

        pushed.push(Pushed {
            ent: check,
            origin: c.s.origin,
            angles: c.s.angles,
        });

        // figure movement due to the pusher's amove
        let org = vector_subtract(&vector_add(&c.s.origin, &mv), &ctx.edicts[pusher].s.origin);
        let org2 = [
            dot_product(&org, &forward),
            -dot_product(&org, &right),
            dot_product(&org, &up),
        ];
        let total = vector_add(&mv, &vector_subtract(&org2, &org));

        // sweep the entity with the pusher out of the way
        let pusher_solid = ctx.edicts[pusher].solid;
        ctx.edicts[pusher].solid = Solid::Not;
        let c = &ctx.edicts[check];
        let mask = if c.clipmask != 0 { c.clipmask } else { MASK_SOLID };
        let start = c.s.origin;
        let end = vector_add(&start, &total);
        let tr = trace(ctx, &start, &c.mins, &c.maxs, &end, check as i32, mask);
        ctx.edicts[pusher].solid = pusher_solid;

        if !tr.startsolid && tr.fraction == 1.0 {
            ctx.edicts[check].s.origin = end;
            ctx.edicts[check].s.angles[YAW] += amove[YAW];
            if !rider {
                // may have been pushed off an edge
                ctx.edicts[check].groundentity = -1;
            }
            link_entity(ctx, check);
            if test_entity_position(ctx, check).is_none() {
                continue; // pushed ok
            }
            ctx.edicts[check].s.origin = start;
            link_entity(ctx, check);
        }

        // if it is ok to leave in the old position, do it
        if rider && test_entity_position(ctx, check).is_none() {
            pushed.pop();
            continue;
        }

        obstacle = Some(check);
        break;
    }

    if let Some(blocker) = obstacle {
        // move back any entities we already moved, newest first so an
        // entity pushed twice ends up where it started
        for p in pushed.iter().rev() {
            ctx.edicts[p.ent].s.origin = p.origin;
            ctx.edicts[p.ent].s.angles = p.angles;
            link_entity(ctx, p.ent);
        }
        return Ok(Some(blocker));
    }

    // see if anything we moved has touched a trigger
    for p in pushed.iter().skip(1).rev() {
        if ctx.edicts[p.ent].inuse {
            g_touch_triggers(ctx, p.ent)?;
        }
    }
    Ok(None)
}

/// Kinematic movers. Objects are moved back on a failed push, otherwise
/// riders would continue to slide.
pub fn physics_pusher(ctx: &mut GameCtx, ent_idx: usize) -> GameResult<()> {
    let (velocity, avelocity) = (ctx.edicts[ent_idx].velocity, ctx.edicts[ent_idx].avelocity);
    if velocity == VEC3_ORIGIN && avelocity == VEC3_ORIGIN {
        return Ok(());
    }

    let ft = ctx.frametime();
    let move_vec = vector_scale(&velocity, ft);
    let amove = vector_scale(&avelocity, ft);

    if let Some(obstacle) = push_move(ctx, ent_idx, &move_vec, &amove)? {
        // the move failed, so the mover arrives a frame later
        if ctx.edicts[ent_idx].nextthink > 0.0 {
            ctx.edicts[ent_idx].nextthink += ft;
        }
        call_blocked(ctx, ent_idx, obstacle)?;
    }
    Ok(())
}

/// A moving object that doesn't obey physics.
pub fn physics_noclip(ctx: &mut GameCtx, ent_idx: usize) {
    let ft = ctx.frametime();
    check_velocity(ctx, ent_idx);
    let ent = &mut ctx.edicts[ent_idx];
    ent.s.angles = vector_ma(&ent.s.angles, ft, &ent.avelocity);
    ent.s.origin = vector_ma(&ent.s.origin, ft, &ent.velocity);
    link_entity(ctx, ent_idx);
}

// ============================================================
// TOSS / BOUNCE
// ============================================================

/// Toss, bounce, and fly movement. When onground, do nothing.
pub fn physics_toss(ctx: &mut GameCtx, ent_idx: usize) -> GameResult<()> {
    if ctx.edicts[ent_idx].velocity[2] > 0.0 {
        ctx.edicts[ent_idx].groundentity = -1;
    }

    // check for the groundentity going away
    let ground = ctx.edicts[ent_idx].groundentity;
    if ground >= 0 && ctx.live_index(ground).is_none() {
        ctx.edicts[ent_idx].groundentity = -1;
    }

    if ctx.edicts[ent_idx].groundentity != -1 {
        return Ok(());
    }

    check_velocity(ctx, ent_idx);

    let movetype = ctx.edicts[ent_idx].movetype;
    if movetype != MoveType::Fly && movetype != MoveType::FlyMissile {
        add_gravity(ctx, ent_idx);
    }

    let ft = ctx.frametime();
    let ent = &mut ctx.edicts[ent_idx];
    ent.s.angles = vector_ma(&ent.s.angles, ft, &ent.avelocity);
    let move_vec = vector_scale(&ent.velocity, ft);

    let tr = push_entity(ctx, ent_idx, &move_vec)?;
    if !ctx.edicts[ent_idx].inuse {
        return Ok(());
    }

    if tr.fraction < 1.0 {
        let backoff = if movetype == MoveType::Bounce { 1.5 } else { 1.0 };
        let (new_velocity, _) = clip_velocity(&ctx.edicts[ent_idx].velocity, &tr.plane.normal, backoff);
        let ent = &mut ctx.edicts[ent_idx];
        ent.velocity = new_velocity;

        // stop if on ground
        if tr.plane.normal[2] > GROUND_NORMAL_Z
            && (ent.velocity[2] < BOUNCE_SETTLE_SPEED || movetype != MoveType::Bounce)
        {
            ent.groundentity = tr.ent_index.max(0);
            ent.velocity = VEC3_ORIGIN;
            ent.avelocity = VEC3_ORIGIN;
        }
    }
    Ok(())
}

// ============================================================
// STEPPING MOVEMENT
// ============================================================

fn add_rotational_friction(ctx: &mut GameCtx, ent_idx: usize) {
    let ft = ctx.frametime();
    let ent = &mut ctx.edicts[ent_idx];
    ent.s.angles = vector_ma(&ent.s.angles, ft, &ent.avelocity);
    let adjustment = ft * SV_STOPSPEED * SV_FRICTION;

    for v in ent.avelocity.iter_mut() {
        if *v > 0.0 {
            *v = (*v - adjustment).max(0.0);
        } else {
            *v = (*v + adjustment).min(0.0);
        }
    }
}

/// Monsters freefall when they don't have a ground entity, otherwise
/// they slide to a stop under friction.
///
/// This is also used for objects that have become still on the ground, but
/// will fall if the floor is pulled out from under them.
pub fn physics_step(ctx: &mut GameCtx, ent_idx: usize) -> GameResult<()> {
    // airborne monsters should always check for ground
    if ctx.edicts[ent_idx].groundentity == -1 {
        m_check_ground(ctx, ent_idx);
    }

    check_velocity(ctx, ent_idx);

    let wasonground = ctx.edicts[ent_idx].groundentity != -1;

    if ctx.edicts[ent_idx].avelocity != VEC3_ORIGIN {
        add_rotational_friction(ctx, ent_idx);
    }

    let flying = ctx.edicts[ent_idx].flags.intersects(EntityFlags::FLY | EntityFlags::SWIM);
    if !wasonground && !flying {
        add_gravity(ctx, ent_idx);
    } else if wasonground && ctx.edicts[ent_idx].velocity[2] < 0.0 {
        ctx.edicts[ent_idx].velocity[2] = 0.0;
    }

    if ctx.edicts[ent_idx].velocity == VEC3_ORIGIN {
        return Ok(());
    }

    // friction for grounded monsters, unless dead and hanging off a ledge
    let dead_on_edge = ctx.edicts[ent_idx].health <= 0 && !m_check_bottom(ctx, ent_idx);
    if (wasonground || flying) && !dead_on_edge {
        let ft = ctx.frametime();
        let vel = &mut ctx.edicts[ent_idx].velocity;
        let speed = (vel[0] * vel[0] + vel[1] * vel[1]).sqrt();
        if speed != 0.0 {
            let control = speed.max(SV_STOPSPEED);
            let newspeed = (speed - ft * control * SV_FRICTION).max(0.0) / speed;
            vel[0] *= newspeed;
            vel[1] *= newspeed;
        }
    }

    let mask = if ctx.edicts[ent_idx].is_monster() {
        MASK_MONSTERSOLID
    } else {
        MASK_SOLID
    };
    let ft = ctx.frametime();
    fly_move(ctx, ent_idx, ft, mask)?;
    if !ctx.edicts[ent_idx].inuse {
        return Ok(());
    }

    link_entity(ctx, ent_idx);
    g_touch_triggers(ctx, ent_idx)?;
    Ok(())
}

// ============================================================
// G_RunEntity
// ============================================================

/// Prethink, scheduled think, then movement for one entity.
pub fn g_run_entity(ctx: &mut GameCtx, ent_idx: usize) -> GameResult<()> {
    if ctx.edicts[ent_idx].prethink.is_some() {
        dispatch::run_prethink(ctx, ent_idx)?;
        if !ctx.edicts[ent_idx].inuse {
            return Ok(());
        }
    }

    if !run_think(ctx, ent_idx)? {
        return Ok(());
    }

    match ctx.edicts[ent_idx].movetype {
        MoveType::None | MoveType::Walk => Ok(()),
        MoveType::Push | MoveType::Stop => physics_pusher(ctx, ent_idx),
        MoveType::Noclip => {
            physics_noclip(ctx, ent_idx);
            Ok(())
        }
        MoveType::Step => physics_step(ctx, ent_idx),
        MoveType::Toss | MoveType::Bounce | MoveType::Fly | MoveType::FlyMissile => physics_toss(ctx, ent_idx),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::BlockedKind;
    use crate::g_utils::test_support::{make_edict, make_monster, test_ctx};
    use sofsim_common::cmodel::Brush;

    fn floor(ctx: &mut GameCtx) {
        ctx.world.add_brush(Brush::solid([-512.0, -512.0, -64.0], [512.0, 512.0, 0.0]));
    }

    fn make_toss(ctx: &mut GameCtx, origin: Vec3, movetype: MoveType) -> usize {
        let idx = make_edict(ctx, origin);
        let e = &mut ctx.edicts[idx];
        e.movetype = movetype;
        e.solid = Solid::Bbox;
        e.mins = [-4.0; 3];
        e.maxs = [4.0; 3];
        e.clipmask = MASK_SHOT;
        link_entity(ctx, idx);
        idx
    }

    fn make_pusher(ctx: &mut GameCtx, origin: Vec3) -> usize {
        let idx = make_edict(ctx, origin);
        let e = &mut ctx.edicts[idx];
        e.classname = "func_rotating".to_string();
        e.movetype = MoveType::Push;
        e.solid = Solid::Bsp;
        e.mins = [-8.0, -32.0, -32.0];
        e.maxs = [8.0, 32.0, 32.0];
        link_entity(ctx, idx);
        idx
    }

    // ============================================================
    // Helpers
    // ============================================================

    #[test]
    fn test_clip_velocity_floor() {
        let (v, blocked) = clip_velocity(&[10.0, 0.0, -100.0], &[0.0, 0.0, 1.0], 1.0);
        assert_eq!(v, [10.0, 0.0, 0.0]);
        assert_eq!(blocked, 1);

        let (v, blocked) = clip_velocity(&[-50.0, 5.0, 0.0], &[1.0, 0.0, 0.0], 1.5);
        assert_eq!(v[0], 25.0);
        assert_eq!(v[1], 5.0);
        assert_eq!(blocked, 2);
    }

    #[test]
    fn test_clip_velocity_snaps_tiny_components() {
        let (v, _) = clip_velocity(&[0.05, 0.0, -10.0], &[0.0, 0.0, 1.0], 1.0);
        assert_eq!(v, [0.0; 3]);
    }

    #[test]
    fn test_velocity_is_clamped() {
        let mut ctx = test_ctx();
        let e = make_edict(&mut ctx, [0.0; 3]);
        ctx.edicts[e].velocity = [5000.0, -9000.0, f32::NAN];
        check_velocity(&mut ctx, e);
        assert_eq!(ctx.edicts[e].velocity, [2000.0, -2000.0, 0.0]);
    }

    // ============================================================
    // Think
    // ============================================================

    #[test]
    fn test_zero_wake_time_never_fires() {
        let mut ctx = test_ctx();
        let e = make_edict(&mut ctx, [0.0; 3]);
        ctx.edicts[e].think = Some(crate::dispatch::ThinkKind::FreeEdict);
        ctx.edicts[e].nextthink = 0.0;
        assert!(run_think(&mut ctx, e).unwrap());
        assert!(ctx.edicts[e].inuse);
    }

    #[test]
    fn test_think_that_frees_reports_removal() {
        let mut ctx = test_ctx();
        ctx.level.time = 3.0;
        let e = make_edict(&mut ctx, [0.0; 3]);
        ctx.edicts[e].think = Some(crate::dispatch::ThinkKind::FreeEdict);
        ctx.edicts[e].nextthink = 3.0;
        assert!(!run_think(&mut ctx, e).unwrap());
        assert!(!ctx.edicts[e].inuse);
    }

    #[test]
    fn test_future_wake_time_waits() {
        let mut ctx = test_ctx();
        ctx.level.time = 1.0;
        let e = make_edict(&mut ctx, [0.0; 3]);
        ctx.edicts[e].think = Some(crate::dispatch::ThinkKind::FreeEdict);
        ctx.edicts[e].nextthink = 1.1;
        assert!(run_think(&mut ctx, e).unwrap());
        assert_eq!(ctx.edicts[e].nextthink, 1.1);
    }

    // ============================================================
    // Toss / bounce
    // ============================================================

    #[test]
    fn test_toss_falls_under_gravity() {
        let mut ctx = test_ctx();
        let e = make_toss(&mut ctx, [0.0, 0.0, 500.0], MoveType::Toss);
        g_run_entity(&mut ctx, e).unwrap();
        assert!((ctx.edicts[e].velocity[2] + 80.0).abs() < 1e-3);
        assert!((ctx.edicts[e].s.origin[2] - 492.0).abs() < 1e-3);
    }

    #[test]
    fn test_fly_ignores_gravity() {
        let mut ctx = test_ctx();
        let e = make_toss(&mut ctx, [0.0, 0.0, 500.0], MoveType::FlyMissile);
        ctx.edicts[e].velocity = [100.0, 0.0, 0.0];
        g_run_entity(&mut ctx, e).unwrap();
        assert_eq!(ctx.edicts[e].velocity, [100.0, 0.0, 0.0]);
        assert!((ctx.edicts[e].s.origin[0] - 10.0).abs() < 1e-3);
    }

    #[test]
    fn test_scenario_f_bounce_settles() {
        let mut ctx = test_ctx();
        floor(&mut ctx);
        let e = make_toss(&mut ctx, [0.0, 0.0, 8.0], MoveType::Bounce);
        ctx.edicts[e].velocity = [50.0, 0.0, -30.0];
        ctx.edicts[e].avelocity = [0.0, 90.0, 0.0];

        // gravity takes vz to -110, the 1.5 rebound leaves +55: below the settle speed
        g_run_entity(&mut ctx, e).unwrap();

        assert_eq!(ctx.edicts[e].velocity, VEC3_ORIGIN);
        assert_eq!(ctx.edicts[e].avelocity, VEC3_ORIGIN);
        assert_eq!(ctx.edicts[e].groundentity, 0);
        assert!(ctx.edicts[e].s.origin[2] >= 4.0);

        // and it stays put
        let before = ctx.edicts[e].s.origin;
        g_run_entity(&mut ctx, e).unwrap();
        assert_eq!(ctx.edicts[e].s.origin, before);
    }

    #[test]
    fn test_fast_bounce_rebounds() {
        let mut ctx = test_ctx();
        floor(&mut ctx);
        let e = make_toss(&mut ctx, [0.0, 0.0, 30.0], MoveType::Bounce);
        ctx.edicts[e].velocity = [0.0, 0.0, -400.0];
        g_run_entity(&mut ctx, e).unwrap();
        assert!(ctx.edicts[e].velocity[2] > BOUNCE_SETTLE_SPEED);
        assert_eq!(ctx.edicts[e].groundentity, -1);
    }

    #[test]
    fn test_toss_stops_dead_on_floor() {
        let mut ctx = test_ctx();
        floor(&mut ctx);
        let e = make_toss(&mut ctx, [0.0, 0.0, 30.0], MoveType::Toss);
        ctx.edicts[e].velocity = [0.0, 0.0, -400.0];
        g_run_entity(&mut ctx, e).unwrap();
        assert_eq!(ctx.edicts[e].velocity, VEC3_ORIGIN);
    }

    // ============================================================
    // Noclip / step
    // ============================================================

    #[test]
    fn test_noclip_passes_through_walls() {
        let mut ctx = test_ctx();
        ctx.world.add_brush(Brush::solid([10.0, -64.0, -64.0], [20.0, 64.0, 64.0]));
        let e = make_toss(&mut ctx, [0.0; 3], MoveType::Noclip);
        ctx.edicts[e].velocity = [300.0, 0.0, 0.0];
        ctx.edicts[e].avelocity = [0.0, 100.0, 0.0];
        g_run_entity(&mut ctx, e).unwrap();
        assert!((ctx.edicts[e].s.origin[0] - 30.0).abs() < 1e-3);
        assert!((ctx.edicts[e].s.angles[YAW] - 10.0).abs() < 1e-3);
    }

    #[test]
    fn test_step_friction_on_ground() {
        let mut ctx = test_ctx();
        floor(&mut ctx);
        let m = make_monster(&mut ctx, [0.0, 0.0, 24.0], 100);
        ctx.edicts[m].velocity = [200.0, 0.0, -50.0];
        physics_step(&mut ctx, m).unwrap();
        // 200 - 0.1 * 200 * 6
        assert!((ctx.edicts[m].velocity[0] - 80.0).abs() < 1e-3);
        assert_eq!(ctx.edicts[m].velocity[2], 0.0);
        assert!((ctx.edicts[m].s.origin[0] - 8.0).abs() < 0.1);
        let e = &ctx.edicts[m];
        assert_eq!(e.absmin, vector_add(&e.s.origin, &e.mins));
    }

    #[test]
    fn test_step_falls_when_airborne() {
        let mut ctx = test_ctx();
        floor(&mut ctx);
        let m = make_monster(&mut ctx, [0.0, 0.0, 200.0], 100);
        physics_step(&mut ctx, m).unwrap();
        assert!(ctx.edicts[m].velocity[2] < 0.0);
        assert!(ctx.edicts[m].s.origin[2] < 200.0);
    }

    #[test]
    fn test_walk_is_not_integrated() {
        let mut ctx = test_ctx();
        let e = make_toss(&mut ctx, [0.0, 0.0, 500.0], MoveType::Walk);
        ctx.edicts[e].velocity = [100.0, 0.0, 0.0];
        g_run_entity(&mut ctx, e).unwrap();
        assert_eq!(ctx.edicts[e].s.origin, [0.0, 0.0, 500.0]);
    }

    // ============================================================
    // Push
    // ============================================================

    #[test]
    fn test_pusher_shoves_entity() {
        let mut ctx = test_ctx();
        let p = make_pusher(&mut ctx, [10.0, 0.0, 0.0]);
        let m = make_monster(&mut ctx, [40.0, 0.0, 0.0], 100);
        ctx.edicts[p].velocity = [100.0, 0.0, 0.0];
        physics_pusher(&mut ctx, p).unwrap();
        assert!((ctx.edicts[p].s.origin[0] - 20.0).abs() < 1e-3);
        assert!((ctx.edicts[m].s.origin[0] - 50.0).abs() < 1e-3);
    }

    #[test]
    fn test_pusher_blocked_reverts_and_calls_blocked() {
        let mut ctx = test_ctx();
        ctx.world.add_brush(Brush::solid([64.0, -64.0, -64.0], [80.0, 64.0, 64.0]));
        let p = make_pusher(&mut ctx, [10.0, 0.0, 0.0]);
        ctx.edicts[p].blocked = Some(BlockedKind::Rotating);
        ctx.edicts[p].dmg = 10;
        let m = make_monster(&mut ctx, [40.0, 0.0, 0.0], 100);
        ctx.edicts[p].velocity = [100.0, 0.0, 0.0];

        physics_pusher(&mut ctx, p).unwrap();

        assert_eq!(ctx.edicts[p].s.origin, [10.0, 0.0, 0.0]);
        assert_eq!(ctx.edicts[m].s.origin, [40.0, 0.0, 0.0]);
        assert_eq!(ctx.edicts[m].health, 90);
    }

    #[test]
    fn test_pusher_carries_rider() {
        let mut ctx = test_ctx();
        let p = make_pusher(&mut ctx, [0.0, 0.0, 0.0]);
        ctx.edicts[p].mins = [-64.0, -64.0, -8.0];
        ctx.edicts[p].maxs = [64.0, 64.0, 8.0];
        link_entity(&mut ctx, p);
        let m = make_monster(&mut ctx, [0.0, 0.0, 32.0], 100);
        ctx.edicts[m].groundentity = p as i32;
        ctx.edicts[p].velocity = [0.0, 0.0, 100.0];

        physics_pusher(&mut ctx, p).unwrap();
        assert!((ctx.edicts[m].s.origin[2] - 42.0).abs() < 1e-3);
    }
}
