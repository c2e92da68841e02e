// g_func.rs — brush entities: doors, platforms, rotating parts, walls, breakables, barrels, timers
// Movers are Push-kind entities whose bounds are relative to their origin.

use log::{debug, trace, warn};

use crate::dispatch::{BlockedKind, DieKind, ThinkKind, TouchKind, UseKind};
use crate::g_combat::{t_damage, t_radius_damage};
use crate::g_error::GameResult;
use crate::g_local::*;
use crate::g_utils::{g_free_edict, g_set_movedir, g_spawn, use_targets};
use crate::g_world::link_entity;
use crate::game_import::{EffectKind, ATTN_NORM, CHAN_AUTO, CHAN_VOICE};

// =========================================================
// Constants
// =========================================================

pub const DOOR_START_OPEN: i32 = 1;
pub const DOOR_CRUSHER: i32 = 4;
pub const DOOR_NOMONSTER: i32 = 8;
pub const DOOR_TOGGLE: i32 = 32;

pub const PLAT_LOW_TRIGGER: i32 = 1;

pub const ROTATING_START_ON: i32 = 1;
pub const ROTATING_REVERSE: i32 = 2;
pub const ROTATING_X_AXIS: i32 = 4;
pub const ROTATING_Y_AXIS: i32 = 8;

pub const TIMER_START_ON: i32 = 1;

const DOOR_TRIGGER_PAD: f32 = 60.0;
const ARRIVE_EPSILON: f32 = 0.1;
const DEBRIS_COUNT: usize = 4;
const DEBRIS_LIFE: f32 = 2.0;

// =========================================================
// Linear movement
// =========================================================

/// Start moving toward `dest`; `end` runs on arrival.
fn mover_calc(ctx: &mut GameCtx, idx: usize, dest: Vec3, end: MoverEnd) {
    let next = ctx.level.time + ctx.frametime();
    let e = &mut ctx.edicts[idx];
    e.moveinfo.dest = dest;
    e.moveinfo.endfunc = Some(end);
    e.think = Some(ThinkKind::MoverStep);
    e.nextthink = next;
    set_mover_velocity(ctx, idx);
}

/// Velocity that covers the rest of the trip at `speed` without overshooting
/// on the last frame. Returns the remaining distance.
fn set_mover_velocity(ctx: &mut GameCtx, idx: usize) -> f32 {
    let ft = ctx.frametime();
    let e = &mut ctx.edicts[idx];
    let mut dir = vector_subtract(&e.moveinfo.dest, &e.s.origin);
    let remaining = vector_normalize(&mut dir);
    let step = e.moveinfo.speed * ft;
    e.velocity = if remaining <= ARRIVE_EPSILON {
        VEC3_ORIGIN
    } else if remaining <= step {
        vector_scale(&dir, remaining / ft)
    } else {
        vector_scale(&dir, e.moveinfo.speed)
    };
    remaining
}

/// Per-frame think of a travelling door or platform.
pub fn mover_step(ctx: &mut GameCtx, idx: usize) -> GameResult<()> {
    let remaining = set_mover_velocity(ctx, idx);
    if remaining > ARRIVE_EPSILON {
        let next = ctx.level.time + ctx.frametime();
        let e = &mut ctx.edicts[idx];
        e.think = Some(ThinkKind::MoverStep);
        e.nextthink = next;
        return Ok(());
    }

    let end = {
        let e = &mut ctx.edicts[idx];
        e.s.origin = e.moveinfo.dest;
        e.velocity = VEC3_ORIGIN;
        e.think = None;
        e.moveinfo.endfunc.take()
    };
    link_entity(ctx, idx);
    match end {
        Some(MoverEnd::DoorHitTop) => door_hit_top(ctx, idx),
        Some(MoverEnd::DoorHitBottom) => door_hit_bottom(ctx, idx),
        Some(MoverEnd::PlatHitTop) => plat_hit_top(ctx, idx),
        Some(MoverEnd::PlatHitBottom) => plat_hit_bottom(ctx, idx),
        None => {}
    }
    Ok(())
}

/// Wait at the top ran out.
pub fn mover_return(ctx: &mut GameCtx, idx: usize) -> GameResult<()> {
    match ctx.edicts[idx].use_fn {
        Some(UseKind::Plat) => plat_go_down(ctx, idx),
        _ => door_go_down(ctx, idx),
    }
    Ok(())
}

fn mover_sound(ctx: &mut GameCtx, idx: usize, name: &str) {
    let snd = ctx.configstrings.sound_index(name);
    ctx.gi.play_sound(idx as i32, CHAN_VOICE, snd, 1.0, ATTN_NORM, 0.0);
}

/// Crush damage against whatever stopped a mover. Loose objects that cannot
/// take damage are removed instead.
fn crush(ctx: &mut GameCtx, self_idx: usize, other: usize) -> GameResult<()> {
    let o = &ctx.edicts[other];
    if o.client.is_none() && !o.is_monster() && o.takedamage == Damage::No {
        if other > ctx.game.maxclients {
            debug!("{} removes blocking {}", ctx.edicts[self_idx].classname, o.classname);
            g_free_edict(ctx, other);
        }
        return Ok(());
    }
    let dmg = ctx.edicts[self_idx].dmg;
    if dmg <= 0 {
        return Ok(());
    }
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
        1,
        DamageFlags::empty(),
        MeansOfDeath::Crush,
    )?;
    Ok(())
}

fn movedir_extent(movedir: &Vec3, size: &Vec3) -> f32 {
    movedir[0].abs() * size[0] + movedir[1].abs() * size[1] + movedir[2].abs() * size[2]
}

// =========================================================
// Doors
// =========================================================

fn door_hit_top(ctx: &mut GameCtx, idx: usize) {
    mover_sound(ctx, idx, "doors/dr1_end.wav");
    let time = ctx.level.time;
    let e = &mut ctx.edicts[idx];
    e.moveinfo.state = MoverState::Top;
    if e.spawnflags & DOOR_TOGGLE != 0 {
        return;
    }
    if e.moveinfo.wait >= 0.0 {
        e.think = Some(ThinkKind::MoverReturn);
        e.nextthink = time + e.moveinfo.wait;
    }
}

fn door_hit_bottom(ctx: &mut GameCtx, idx: usize) {
    mover_sound(ctx, idx, "doors/dr1_end.wav");
    ctx.edicts[idx].moveinfo.state = MoverState::Bottom;
}

fn door_go_down(ctx: &mut GameCtx, idx: usize) {
    mover_sound(ctx, idx, "doors/dr1_strt.wav");
    let dest = ctx.edicts[idx].pos1;
    ctx.edicts[idx].moveinfo.state = MoverState::Down;
    mover_calc(ctx, idx, dest, MoverEnd::DoorHitBottom);
}

fn door_go_up(ctx: &mut GameCtx, idx: usize, activator: usize) -> GameResult<()> {
    let time = ctx.level.time;
    match ctx.edicts[idx].moveinfo.state {
        MoverState::Up => return Ok(()),
        MoverState::Top => {
            // reset the return timer
            let e = &mut ctx.edicts[idx];
            if e.moveinfo.wait >= 0.0 && e.think == Some(ThinkKind::MoverReturn) {
                e.nextthink = time + e.moveinfo.wait;
            }
            return Ok(());
        }
        MoverState::Bottom | MoverState::Down => {}
    }

    mover_sound(ctx, idx, "doors/dr1_strt.wav");
    let dest = ctx.edicts[idx].pos2;
    ctx.edicts[idx].moveinfo.state = MoverState::Up;
    mover_calc(ctx, idx, dest, MoverEnd::DoorHitTop);
    use_targets(ctx, idx, activator)
}

pub fn door_use(ctx: &mut GameCtx, self_idx: usize, activator: usize) -> GameResult<()> {
    let e = &ctx.edicts[self_idx];
    let opening_or_open = matches!(e.moveinfo.state, MoverState::Up | MoverState::Top);
    if e.spawnflags & DOOR_TOGGLE != 0 && opening_or_open {
        door_go_down(ctx, self_idx);
        return Ok(());
    }
    door_go_up(ctx, self_idx, activator)
}

pub fn door_blocked(ctx: &mut GameCtx, self_idx: usize, other: usize) -> GameResult<()> {
    crush(ctx, self_idx, other)?;
    let e = &ctx.edicts[self_idx];
    if e.spawnflags & DOOR_CRUSHER != 0 {
        return Ok(());
    }
    // doors that stay open for good only reverse when they toggle
    if e.moveinfo.wait < 0.0 && e.spawnflags & DOOR_TOGGLE == 0 {
        return Ok(());
    }
    let (state, activator) = (e.moveinfo.state, e.activator);
    match state {
        MoverState::Down => {
            let activator = ctx.live_index(activator).unwrap_or(other);
            door_go_up(ctx, self_idx, activator)?;
        }
        MoverState::Up => door_go_down(ctx, self_idx),
        _ => {}
    }
    Ok(())
}

pub fn door_trigger_touch(ctx: &mut GameCtx, self_idx: usize, other: usize) -> GameResult<()> {
    let o = &ctx.edicts[other];
    if o.health <= 0 || (o.client.is_none() && !o.is_monster()) {
        return Ok(());
    }
    let Some(door) = ctx.live_index(ctx.edicts[self_idx].owner) else {
        return Ok(());
    };
    if o.is_monster() && ctx.edicts[door].spawnflags & DOOR_NOMONSTER != 0 {
        return Ok(());
    }
    let time = ctx.level.time;
    if time < ctx.edicts[self_idx].touch_debounce_time {
        return Ok(());
    }
    ctx.edicts[self_idx].touch_debounce_time = time + 1.0;
    ctx.edicts[door].activator = other as i32;
    door_use(ctx, door, other)
}

fn spawn_door_trigger(ctx: &mut GameCtx, door: usize) -> GameResult<()> {
    let (absmin, absmax) = {
        let d = &ctx.edicts[door];
        (vector_add(&d.s.origin, &d.mins), vector_add(&d.s.origin, &d.maxs))
    };
    let t = g_spawn(ctx)?;
    let e = &mut ctx.edicts[t];
    e.classname = "door_trigger".to_string();
    e.mins = [absmin[0] - DOOR_TRIGGER_PAD, absmin[1] - DOOR_TRIGGER_PAD, absmin[2]];
    e.maxs = [absmax[0] + DOOR_TRIGGER_PAD, absmax[1] + DOOR_TRIGGER_PAD, absmax[2]];
    e.owner = door as i32;
    e.solid = Solid::Trigger;
    e.movetype = MoveType::None;
    e.svflags |= SVF_NOCLIENT;
    e.touch = Some(TouchKind::DoorTrigger);
    link_entity(ctx, t);
    ctx.register_entity_in_index(t);
    Ok(())
}

pub fn sp_func_door(ctx: &mut GameCtx, idx: usize) -> GameResult<()> {
    let needs_trigger = {
        let e = &mut ctx.edicts[idx];
        e.movedir = g_set_movedir(&mut e.s.angles);
        e.movetype = MoveType::Push;
        e.solid = Solid::Bsp;
        e.blocked = Some(BlockedKind::Door);
        e.use_fn = Some(UseKind::Door);

        if e.speed == 0.0 {
            e.speed = 100.0;
        }
        if e.wait == 0.0 {
            e.wait = 3.0;
        }
        if e.lip == 0.0 {
            e.lip = 8.0;
        }
        if e.dmg == 0 {
            e.dmg = 2;
        }

        e.pos1 = e.s.origin;
        let size = vector_subtract(&e.maxs, &e.mins);
        let travel = movedir_extent(&e.movedir, &size) - e.lip;
        e.pos2 = vector_ma(&e.pos1, travel, &e.movedir);

        // the door moves the other way from where it was placed
        if e.spawnflags & DOOR_START_OPEN != 0 {
            std::mem::swap(&mut e.pos1, &mut e.pos2);
            e.s.origin = e.pos1;
        }

        e.moveinfo.state = MoverState::Bottom;
        e.moveinfo.speed = e.speed;
        e.moveinfo.wait = e.wait;
        e.moveinfo.start_origin = e.pos1;
        e.moveinfo.end_origin = e.pos2;
        e.targetname.is_empty()
    };
    link_entity(ctx, idx);
    if needs_trigger {
        spawn_door_trigger(ctx, idx)?;
    }
    Ok(())
}

// =========================================================
// Platforms
// =========================================================

fn plat_hit_top(ctx: &mut GameCtx, idx: usize) {
    mover_sound(ctx, idx, "plats/pt1_end.wav");
    let time = ctx.level.time;
    let e = &mut ctx.edicts[idx];
    e.moveinfo.state = MoverState::Top;
    e.think = Some(ThinkKind::MoverReturn);
    e.nextthink = time + e.moveinfo.wait;
}

fn plat_hit_bottom(ctx: &mut GameCtx, idx: usize) {
    mover_sound(ctx, idx, "plats/pt1_end.wav");
    ctx.edicts[idx].moveinfo.state = MoverState::Bottom;
}

fn plat_go_down(ctx: &mut GameCtx, idx: usize) {
    mover_sound(ctx, idx, "plats/pt1_strt.wav");
    let dest = ctx.edicts[idx].pos2;
    ctx.edicts[idx].moveinfo.state = MoverState::Down;
    mover_calc(ctx, idx, dest, MoverEnd::PlatHitBottom);
}

fn plat_go_up(ctx: &mut GameCtx, idx: usize) {
    mover_sound(ctx, idx, "plats/pt1_strt.wav");
    let dest = ctx.edicts[idx].pos1;
    ctx.edicts[idx].moveinfo.state = MoverState::Up;
    mover_calc(ctx, idx, dest, MoverEnd::PlatHitTop);
}

pub fn plat_use(ctx: &mut GameCtx, self_idx: usize) -> GameResult<()> {
    match ctx.edicts[self_idx].moveinfo.state {
        MoverState::Bottom => plat_go_up(ctx, self_idx),
        MoverState::Top => plat_go_down(ctx, self_idx),
        MoverState::Up | MoverState::Down => {}
    }
    Ok(())
}

pub fn plat_blocked(ctx: &mut GameCtx, self_idx: usize, other: usize) -> GameResult<()> {
    crush(ctx, self_idx, other)?;
    match ctx.edicts[self_idx].moveinfo.state {
        MoverState::Up => plat_go_down(ctx, self_idx),
        MoverState::Down => plat_go_up(ctx, self_idx),
        _ => {}
    }
    Ok(())
}

pub fn plat_trigger_touch(ctx: &mut GameCtx, self_idx: usize, other: usize) -> GameResult<()> {
    if ctx.edicts[other].client.is_none() || ctx.edicts[other].health <= 0 {
        return Ok(());
    }
    let Some(plat) = ctx.live_index(ctx.edicts[self_idx].owner) else {
        return Ok(());
    };
    let time = ctx.level.time;
    match ctx.edicts[plat].moveinfo.state {
        MoverState::Bottom => plat_go_up(ctx, plat),
        // someone is still on it
        MoverState::Top => ctx.edicts[plat].nextthink = time + 1.0,
        _ => {}
    }
    Ok(())
}

fn spawn_plat_trigger(ctx: &mut GameCtx, plat: usize) -> GameResult<()> {
    let (top, mins, maxs, low) = {
        let p = &ctx.edicts[plat];
        (p.pos1, p.mins, p.maxs, p.spawnflags & PLAT_LOW_TRIGGER != 0)
    };
    let mut tmin = [top[0] + mins[0] + 25.0, top[1] + mins[1] + 25.0, top[2] + mins[2]];
    let mut tmax = [top[0] + maxs[0] - 25.0, top[1] + maxs[1] - 25.0, top[2] + maxs[2] + 8.0];
    if low {
        tmax[2] = tmin[2] + 8.0;
    }
    for k in 0..2 {
        if tmax[k] <= tmin[k] {
            let mid = (tmin[k] + tmax[k]) * 0.5;
            tmin[k] = mid - 1.0;
            tmax[k] = mid + 1.0;
        }
    }
    // the trigger covers the full travel so riders keep it alive
    let travel = ctx.edicts[plat].pos1[2] - ctx.edicts[plat].pos2[2];
    tmin[2] -= travel;

    let t = g_spawn(ctx)?;
    let e = &mut ctx.edicts[t];
    e.classname = "plat_trigger".to_string();
    e.mins = tmin;
    e.maxs = tmax;
    e.owner = plat as i32;
    e.solid = Solid::Trigger;
    e.movetype = MoveType::None;
    e.svflags |= SVF_NOCLIENT;
    e.touch = Some(TouchKind::PlatTrigger);
    link_entity(ctx, t);
    ctx.register_entity_in_index(t);
    Ok(())
}

pub fn sp_func_plat(ctx: &mut GameCtx, idx: usize) -> GameResult<()> {
    {
        let e = &mut ctx.edicts[idx];
        e.s.angles = VEC3_ORIGIN;
        e.movetype = MoveType::Push;
        e.solid = Solid::Bsp;
        e.blocked = Some(BlockedKind::Plat);
        e.use_fn = Some(UseKind::Plat);

        if e.speed == 0.0 {
            e.speed = 200.0;
        }
        if e.wait == 0.0 {
            e.wait = 3.0;
        }
        if e.lip == 0.0 {
            e.lip = 8.0;
        }
        if e.dmg == 0 {
            e.dmg = 2;
        }

        // placed at the top, rests at the bottom
        e.pos1 = e.s.origin;
        e.pos2 = e.s.origin;
        let height = if e.count > 0 { e.count as f32 } else { e.maxs[2] - e.mins[2] - e.lip };
        e.pos2[2] -= height;
        e.s.origin = e.pos2;

        e.moveinfo.state = MoverState::Bottom;
        e.moveinfo.speed = e.speed;
        e.moveinfo.wait = e.wait;
        e.moveinfo.start_origin = e.pos1;
        e.moveinfo.end_origin = e.pos2;
    }
    link_entity(ctx, idx);
    spawn_plat_trigger(ctx, idx)
}

// =========================================================
// Rotating
// =========================================================

pub fn rotating_blocked(ctx: &mut GameCtx, self_idx: usize, other: usize) -> GameResult<()> {
    crush(ctx, self_idx, other)
}

pub fn sp_func_rotating(ctx: &mut GameCtx, idx: usize) -> GameResult<()> {
    {
        let e = &mut ctx.edicts[idx];
        e.solid = Solid::Bsp;
        e.movetype = MoveType::Push;
        e.blocked = Some(BlockedKind::Rotating);

        e.movedir = if e.spawnflags & ROTATING_X_AXIS != 0 {
            [0.0, 0.0, 1.0]
        } else if e.spawnflags & ROTATING_Y_AXIS != 0 {
            [1.0, 0.0, 0.0]
        } else {
            [0.0, 1.0, 0.0]
        };
        if e.spawnflags & ROTATING_REVERSE != 0 {
            e.movedir = vector_scale(&e.movedir, -1.0);
        }
        if e.speed == 0.0 {
            e.speed = 100.0;
        }
        if e.dmg == 0 {
            e.dmg = 2;
        }
        if e.spawnflags & ROTATING_START_ON != 0 {
            e.avelocity = vector_scale(&e.movedir, e.speed);
        }
    }
    link_entity(ctx, idx);
    Ok(())
}

// =========================================================
// Walls and breakables
// =========================================================

pub fn sp_func_wall(ctx: &mut GameCtx, idx: usize) -> GameResult<()> {
    let e = &mut ctx.edicts[idx];
    e.movetype = MoveType::Push;
    e.solid = Solid::Bsp;
    link_entity(ctx, idx);
    Ok(())
}

/// Throw short-lived debris chunks from the middle of `idx`.
fn throw_debris(ctx: &mut GameCtx, idx: usize, speed: f32) -> GameResult<()> {
    let center = {
        let e = &ctx.edicts[idx];
        vector_add(&e.s.origin, &vector_scale(&vector_add(&e.mins, &e.maxs), 0.5))
    };
    ctx.gi.spawn_particle_effect(&center, &[0.0, 0.0, 1.0], EffectKind::Debris, 16);
    let time = ctx.level.time;
    for _ in 0..DEBRIS_COUNT {
        let velocity = [
            ctx.crandom() * speed,
            ctx.crandom() * speed,
            100.0 + ctx.random() * speed,
        ];
        let d = g_spawn(ctx)?;
        let e = &mut ctx.edicts[d];
        e.classname = "debris".to_string();
        e.s.origin = center;
        e.velocity = velocity;
        e.movetype = MoveType::Toss;
        e.solid = Solid::Not;
        e.think = Some(ThinkKind::FreeEdict);
        e.nextthink = time + DEBRIS_LIFE;
        link_entity(ctx, d);
    }
    Ok(())
}

pub fn breakable_die(ctx: &mut GameCtx, self_idx: usize, attacker: usize) -> GameResult<()> {
    ctx.edicts[self_idx].takedamage = Damage::No;
    throw_debris(ctx, self_idx, 200.0)?;
    let snd = ctx.configstrings.sound_index("world/break.wav");
    let origin = ctx.edicts[self_idx].s.origin;
    ctx.gi.play_positioned_sound(&origin, self_idx as i32, CHAN_AUTO, snd, 1.0, ATTN_NORM, 0.0);
    use_targets(ctx, self_idx, attacker)?;
    g_free_edict(ctx, self_idx);
    Ok(())
}

pub fn breakable_use(ctx: &mut GameCtx, self_idx: usize, activator: usize) -> GameResult<()> {
    breakable_die(ctx, self_idx, activator)
}

pub fn sp_func_breakable(ctx: &mut GameCtx, idx: usize) -> GameResult<()> {
    let e = &mut ctx.edicts[idx];
    e.movetype = MoveType::Push;
    e.solid = Solid::Bsp;
    if e.health <= 0 {
        e.health = 10;
    }
    e.max_health = e.health;
    e.takedamage = Damage::Yes;
    e.die = Some(DieKind::Breakable);
    if !e.targetname.is_empty() {
        e.use_fn = Some(UseKind::Breakable);
    }
    link_entity(ctx, idx);
    Ok(())
}

// =========================================================
// Explosives
// =========================================================

/// Going off is delayed a frame so chains of barrels ripple.
pub fn explosive_die(ctx: &mut GameCtx, self_idx: usize, attacker: usize) -> GameResult<()> {
    let time = ctx.level.time;
    let e = &mut ctx.edicts[self_idx];
    e.takedamage = Damage::No;
    e.activator = attacker as i32;
    e.think = Some(ThinkKind::Explode);
    e.nextthink = time + FRAMETIME;
    trace!("{} ({}) primed", e.classname, self_idx);
    Ok(())
}

pub fn explode_think(ctx: &mut GameCtx, self_idx: usize) -> GameResult<()> {
    let (origin, dmg, activator) = {
        let e = &ctx.edicts[self_idx];
        let center = vector_add(&e.s.origin, &vector_scale(&vector_add(&e.mins, &e.maxs), 0.5));
        (center, e.dmg, e.activator)
    };
    let attacker = ctx.live_index(activator).unwrap_or(self_idx);

    t_radius_damage(
        ctx,
        self_idx,
        attacker,
        dmg as f32,
        None,
        (dmg + 40) as f32,
        MeansOfDeath::Explosive,
    )?;

    ctx.gi.spawn_particle_effect(&origin, &[0.0, 0.0, 1.0], EffectKind::Explosion, 1);
    ctx.gi.add_dynamic_light(&origin, &[1.0, 0.6, 0.2], 350.0, 0.5);
    let snd = ctx.configstrings.sound_index("weapons/explode.wav");
    ctx.gi.play_positioned_sound(&origin, self_idx as i32, CHAN_AUTO, snd, 1.0, ATTN_NORM, 0.0);
    throw_debris(ctx, self_idx, 300.0)?;

    use_targets(ctx, self_idx, attacker)?;
    g_free_edict(ctx, self_idx);
    Ok(())
}

pub fn sp_func_explosive(ctx: &mut GameCtx, idx: usize) -> GameResult<()> {
    let e = &mut ctx.edicts[idx];
    e.movetype = MoveType::Push;
    e.solid = Solid::Bsp;
    if e.health <= 0 {
        e.health = 100;
    }
    if e.dmg == 0 {
        e.dmg = 120;
    }
    e.takedamage = Damage::Yes;
    e.die = Some(DieKind::Explosive);
    link_entity(ctx, idx);
    Ok(())
}

// =========================================================
// Timer
// =========================================================

pub fn timer_think(ctx: &mut GameCtx, self_idx: usize) -> GameResult<()> {
    let activator = ctx.live_index(ctx.edicts[self_idx].activator).unwrap_or(self_idx);
    use_targets(ctx, self_idx, activator)?;
    if !ctx.edicts[self_idx].inuse {
        return Ok(());
    }
    let jitter = ctx.crandom() * ctx.edicts[self_idx].random;
    let time = ctx.level.time;
    let e = &mut ctx.edicts[self_idx];
    e.think = Some(ThinkKind::TimerFire);
    e.nextthink = time + (e.wait + jitter).max(FRAMETIME);
    Ok(())
}

/// Toggles the timer on and off.
pub fn timer_use(ctx: &mut GameCtx, self_idx: usize, activator: usize) -> GameResult<()> {
    ctx.edicts[self_idx].activator = activator as i32;
    if ctx.edicts[self_idx].nextthink > 0.0 {
        ctx.edicts[self_idx].nextthink = 0.0;
        return Ok(());
    }
    // start with a shot right away
    let delay = ctx.edicts[self_idx].delay;
    if delay > 0.0 {
        let time = ctx.level.time;
        ctx.edicts[self_idx].nextthink = time + delay;
        Ok(())
    } else {
        timer_think(ctx, self_idx)
    }
}

pub fn sp_func_timer(ctx: &mut GameCtx, idx: usize) -> GameResult<()> {
    let time = ctx.level.time;
    let e = &mut ctx.edicts[idx];
    if e.wait == 0.0 {
        e.wait = 1.0;
    }
    if e.random >= e.wait {
        e.random = e.wait - FRAMETIME;
        warn!("func_timer at {} has random >= wait", vtos(&e.s.origin));
    }
    e.use_fn = Some(UseKind::Timer);
    e.think = Some(ThinkKind::TimerFire);
    e.svflags |= SVF_NOCLIENT;
    if e.spawnflags & TIMER_START_ON != 0 {
        e.nextthink = time + 1.0 + e.delay + e.wait;
    }
    Ok(())
}
