// p_client.rs — player connection, spawning and per-command movement
//
// Input queued by apply_player_input is consumed in the player's pre-think,
// one command per tick.

use log::{debug, info, warn};

use sofsim_common::pmove::{PmoveData, PLAYER_MAXS_STAND, PLAYER_MINS};

use crate::dispatch::{call_touch, call_use, DieKind, PainKind, PrethinkKind};
use crate::g_error::{GameError, GameResult};
use crate::g_gore::GoreZones;
use crate::g_local::*;
use crate::g_misc::throw_gibs;
use crate::g_utils::{g_touch_triggers, killbox};
use crate::g_weapon::{AmmoKind, WeaponKind};
use crate::g_world::{link_entity, trace, unlink_entity, WorldTrace};
use crate::game_import::{EffectKind, ATTN_NORM, CHAN_BODY, CHAN_VOICE};
use crate::p_weapon::{drop_cooked_grenade, next_weapon, think_weapon, WEAPON_SWITCH_TIME};

pub const STAMINA_MAX: f32 = 100.0;
const SPRINT_SCALE: f32 = 1.5;
/// Stamina per second.
const SPRINT_DRAIN: f32 = 20.0;
const STAMINA_REGEN: f32 = 10.0;

pub const LEAN_DISTANCE: f32 = 16.0;

const DASH_SPEED: f32 = 400.0;
/// Upward kick that takes a dash off the ground for a moment.
const DASH_LIFT: f32 = 200.0;
const DASH_COOLDOWN: f32 = 1.5;
/// Two strafe presses this close together make a dash.
const DASH_WINDOW: f32 = 0.3;

const SLIDE_TIME: f32 = 0.75;
const SLIDE_SPEED: f32 = 450.0;

const CONCUSSED_SCALE: f32 = 0.6;
const USE_RANGE: f32 = 96.0;
const RESPAWN_DELAY: f32 = 1.0;
const PLAYER_GIB_HEALTH: i32 = -40;
const PAIN_DEBOUNCE: f32 = 0.7;

pub fn view_height(stance: Stance) -> f32 {
    match stance {
        Stance::Stand => 22.0,
        Stance::Crouch => -2.0,
        Stance::Prone => -14.0,
    }
}

/// Where the player's eyes are, including stance and lean. Leaning into a
/// wall stops at the wall.
pub fn eye_position(ctx: &GameCtx, idx: usize) -> Vec3 {
    let e = &ctx.edicts[idx];
    let Some(client) = ctx.client_of(idx) else {
        return [e.s.origin[0], e.s.origin[1], e.s.origin[2] + e.maxs[2] - 8.0];
    };
    let mut eye = e.s.origin;
    eye[2] += view_height(client.stance);
    if client.lean_offset == 0.0 {
        return eye;
    }
    let (_, right, _) = angle_vectors_tuple(&[0.0, client.v_angle[YAW], 0.0]);
    let leaned = vector_ma(&eye, client.lean_offset, &right);
    let tr = trace(ctx, &eye, &[-4.0; 3], &[4.0; 3], &leaned, idx as i32, MASK_SOLID);
    tr.endpos
}

fn client_slot(ctx: &GameCtx, idx: usize) -> GameResult<usize> {
    if idx == 0 || idx > ctx.game.maxclients || idx > ctx.clients.len() || idx >= ctx.edicts.len() {
        return Err(GameError::InvalidEntity { index: idx as i32 });
    }
    Ok(idx - 1)
}

// ============================================================
// Connection
// ============================================================

/// Starting loadout. Name and connection state survive.
pub fn init_client_persistant(pers: &mut ClientPersistant) {
    let netname = std::mem::take(&mut pers.netname);
    *pers = ClientPersistant {
        netname,
        connected: pers.connected,
        ..Default::default()
    };
    for kind in [WeaponKind::Knife, WeaponKind::Pistol2] {
        pers.has_weapon[kind as usize] = true;
        pers.mag[kind as usize] = kind.info().mag_size;
    }
    pers.ammo[AmmoKind::Nine as usize] = 45;
    pers.weapon = WeaponKind::Pistol2;
    pers.last_weapon = WeaponKind::Knife;
}

/// Claim the client slot behind entity `idx`. The player does not exist in
/// the world until `client_begin`.
pub fn client_connect(ctx: &mut GameCtx, idx: usize, netname: &str) -> GameResult<()> {
    let c = client_slot(ctx, idx)?;
    let client = &mut ctx.clients[c];
    if client.pers.connected {
        warn!("client {} reconnecting over {}", netname, client.pers.netname);
    }
    *client = GClient::default();
    client.pers.netname = netname.to_string();
    client.pers.connected = true;
    init_client_persistant(&mut client.pers);
    ctx.edicts[idx].client = Some(c);
    info!("{} connected", netname);
    Ok(())
}

/// Put a connected client into the level and hand back the handle input is
/// addressed to.
pub fn client_begin(ctx: &mut GameCtx, idx: usize) -> GameResult<EntityHandle> {
    let c = client_slot(ctx, idx)?;
    if !ctx.clients[c].pers.connected {
        return Err(GameError::InvalidEntity { index: idx as i32 });
    }
    put_client_in_server(ctx, idx)?;
    ctx.clients[c].resp.enter_time = ctx.level.time;
    let name = ctx.clients[c].pers.netname.clone();
    ctx.gi.bprintf(&format!("{} entered the game\n", name));
    Ok(ctx.handle_of(idx))
}

pub fn client_disconnect(ctx: &mut GameCtx, idx: usize) {
    let Ok(c) = client_slot(ctx, idx) else {
        return;
    };
    if !ctx.clients[c].pers.connected {
        return;
    }
    let name = ctx.clients[c].pers.netname.clone();
    ctx.gi.bprintf(&format!("{} disconnected\n", name));
    info!("{} disconnected", name);

    unlink_entity(ctx, idx);
    let generation = ctx.edicts[idx].generation.wrapping_add(1);
    let mut e = Edict::init(idx, generation);
    e.inuse = false;
    e.classname = "disconnected".to_string();
    ctx.edicts[idx] = e;
    ctx.clients[c] = GClient::default();
    ctx.build_entity_indices();
}

/// Copy what lives on the entity back into the persistent record before
/// the level goes away.
pub fn save_client_data(ctx: &mut GameCtx) {
    for i in 1..=ctx.game.maxclients.min(ctx.edicts.len().saturating_sub(1)) {
        let (inuse, health, max_health) = {
            let e = &ctx.edicts[i];
            (e.inuse, e.health, e.max_health)
        };
        if !inuse {
            continue;
        }
        if let Some(client) = ctx.client_of_mut(i) {
            client.pers.health = health;
            client.pers.max_health = max_health;
        }
    }
}

// ============================================================
// Spawning
// ============================================================

/// Distance from `spot` to the nearest living player other than `except`.
fn players_range_from_spot(ctx: &GameCtx, spot: usize, except: usize) -> f32 {
    let origin = ctx.edicts[spot].s.origin;
    (1..=ctx.game.maxclients)
        .filter(|&i| i != except && i < ctx.edicts.len())
        .filter(|&i| ctx.edicts[i].is_alive() && ctx.edicts[i].client.is_some())
        .map(|i| distance(&origin, &ctx.edicts[i].s.origin))
        .fold(f32::MAX, f32::min)
}

fn select_farthest_deathmatch_spawn_point(ctx: &GameCtx, idx: usize) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for spot in ctx.find_by_classname("info_player_deathmatch") {
        let range = players_range_from_spot(ctx, spot, idx);
        if best.map_or(true, |(_, r)| range > r) {
            best = Some((spot, range));
        }
    }
    best.map(|(spot, _)| spot)
}

/// Origin and angles for player `idx` to appear at.
pub fn select_spawn_point(ctx: &GameCtx, idx: usize) -> (Vec3, Vec3) {
    let deathmatch = if ctx.deathmatch != 0.0 {
        select_farthest_deathmatch_spawn_point(ctx, idx)
    } else {
        None
    };
    let spot = deathmatch.or_else(|| {
        let starts = ctx.find_by_classname("info_player_start");
        starts
            .iter()
            .copied()
            .find(|&s| ctx.edicts[s].targetname.eq_ignore_ascii_case(&ctx.game.spawnpoint))
            .or_else(|| starts.first().copied())
    });
    match spot {
        Some(s) => (ctx.edicts[s].s.origin, ctx.edicts[s].s.angles),
        None => {
            warn!("no spawn point for player {}, using the world origin", idx);
            (VEC3_ORIGIN, VEC3_ORIGIN)
        }
    }
}

/// (Re)create the player entity at a spawn point. Anything already standing
/// there is telefragged.
pub fn put_client_in_server(ctx: &mut GameCtx, idx: usize) -> GameResult<()> {
    let c = client_slot(ctx, idx)?;
    let (spawn_origin, spawn_angles) = select_spawn_point(ctx, idx);

    // deathmatch starts every life fresh; single player carries its inventory
    let resp = ctx.clients[c].resp.clone();
    let mut pers = ctx.clients[c].pers.clone();
    if ctx.deathmatch != 0.0 || pers.health <= 0 {
        init_client_persistant(&mut pers);
    }
    let (health, max_health) = (pers.health, pers.max_health);
    ctx.clients[c] = GClient {
        pers,
        resp,
        stamina: STAMINA_MAX,
        ..Default::default()
    };

    unlink_entity(ctx, idx);
    let modelindex = ctx.configstrings.model_index("players/soldier.ghb");
    let generation = ctx.edicts[idx].generation;
    let mut e = Edict::init(idx, generation);
    e.classname = "player".to_string();
    e.client = Some(c);
    e.health = health;
    e.max_health = max_health;
    e.gib_health = PLAYER_GIB_HEALTH;
    e.takedamage = Damage::Aim;
    e.solid = Solid::Bbox;
    e.movetype = MoveType::Walk;
    e.clipmask = MASK_PLAYERSOLID;
    e.mins = PLAYER_MINS;
    e.maxs = [16.0, 16.0, PLAYER_MAXS_STAND];
    e.mass = 200;
    e.gore = Some(GoreZones::default());
    e.prethink = Some(PrethinkKind::Player);
    e.pain = Some(PainKind::Player);
    e.die = Some(DieKind::Player);
    e.invuln_time = ctx.level.time + ctx.spawn_protect;
    e.s.modelindex = modelindex;
    e.s.origin = [spawn_origin[0], spawn_origin[1], spawn_origin[2] + 1.0];
    e.s.old_origin = e.s.origin;
    e.s.angles = [0.0, spawn_angles[YAW], 0.0];
    let origin = e.s.origin;
    ctx.edicts[idx] = e;

    let gravity = ctx.sv_gravity.clamp(i16::MIN as f32, i16::MAX as f32) as i16;
    let client = &mut ctx.clients[c];
    client.ps.fov = 90.0;
    client.ps.pmove.origin = origin;
    client.ps.pmove.gravity = gravity;
    client.ps.pmove.delta_angles = [0.0, spawn_angles[YAW], 0.0];
    client.ps.viewangles = [0.0, spawn_angles[YAW], 0.0];
    client.v_angle = client.ps.viewangles;

    killbox(ctx, idx)?;
    ctx.register_entity_in_index(idx);
    debug!("player {} spawned at {}", idx, vtos(&origin));
    Ok(())
}

/// Back into the fight after death.
pub fn respawn(ctx: &mut GameCtx, idx: usize) -> GameResult<()> {
    let c = client_slot(ctx, idx)?;
    init_client_persistant(&mut ctx.clients[c].pers);
    put_client_in_server(ctx, idx)?;
    let origin = ctx.edicts[idx].s.origin;
    ctx.gi.spawn_particle_effect(&origin, &[0.0, 0.0, 1.0], EffectKind::Smoke, 8);
    Ok(())
}

// ============================================================
// Pain and death
// ============================================================

pub fn player_pain(ctx: &mut GameCtx, self_idx: usize, _attacker: usize, _kick: f32, _damage: i32) -> GameResult<()> {
    let now = ctx.level.time;
    let e = &mut ctx.edicts[self_idx];
    if e.pain_debounce_time > now {
        return Ok(());
    }
    e.pain_debounce_time = now + PAIN_DEBOUNCE;
    let name = match e.health {
        h if h < 25 => "player/pain25.wav",
        h if h < 50 => "player/pain50.wav",
        h if h < 75 => "player/pain75.wav",
        _ => "player/pain100.wav",
    };
    let snd = ctx.configstrings.sound_index(name);
    ctx.gi.play_sound(self_idx as i32, CHAN_VOICE, snd, 1.0, ATTN_NORM, 0.0);
    Ok(())
}

pub fn player_die(ctx: &mut GameCtx, self_idx: usize, _inflictor: usize, attacker: usize, damage: i32) -> GameResult<()> {
    let now = ctx.level.time;

    if ctx.edicts[self_idx].deadflag == DeadFlag::No {
        drop_cooked_grenade(ctx, self_idx)?;

        let killer_yaw = if attacker != self_idx && attacker != 0 {
            let dir = vector_subtract(&ctx.edicts[attacker].s.origin, &ctx.edicts[self_idx].s.origin);
            Some(vectoyaw(&dir))
        } else {
            None
        };

        let e = &mut ctx.edicts[self_idx];
        e.deadflag = DeadFlag::Dead;
        e.takedamage = Damage::Yes;
        e.movetype = MoveType::Toss;
        e.maxs[2] = -8.0;
        e.svflags |= SVF_DEADMONSTER;
        e.s.effects = 0;
        e.avelocity = VEC3_ORIGIN;

        if let Some(client) = ctx.client_of_mut(self_idx) {
            client.respawn_time = now + RESPAWN_DELAY;
            client.sprinting = false;
            client.lean = 0;
            client.lean_offset = 0.0;
            client.slide_until = 0.0;
            client.reload_finished = 0.0;
            client.flashlight = false;
            client.effects = StatusEffects::default();
            client.ps.pmove.pm_type = PmType::Dead;
            if let Some(yaw) = killer_yaw {
                client.ps.viewangles[YAW] = yaw;
            }
        }

        let snd = ctx.configstrings.sound_index("player/death1.wav");
        ctx.gi.play_sound(self_idx as i32, CHAN_BODY, snd, 1.0, ATTN_NORM, 0.0);
        link_entity(ctx, self_idx);
    }

    let (health, gib_health) = (ctx.edicts[self_idx].health, ctx.edicts[self_idx].gib_health);
    if health <= gib_health && ctx.edicts[self_idx].s.modelindex != 0 {
        throw_gibs(ctx, self_idx, damage)?;
        let e = &mut ctx.edicts[self_idx];
        e.takedamage = Damage::No;
        e.solid = Solid::Not;
        e.s.modelindex = 0;
        if let Some(client) = ctx.client_of_mut(self_idx) {
            client.ps.pmove.pm_type = PmType::Gib;
        }
        link_entity(ctx, self_idx);
    }
    Ok(())
}

// ============================================================
// Per-command think
// ============================================================

/// Consume this tick's command: toggles, movement, touches, use and weapon.
pub fn client_think(ctx: &mut GameCtx, idx: usize) -> GameResult<()> {
    let now = ctx.level.time;
    let Some(c) = ctx.edicts[idx].client else {
        return Ok(());
    };
    let Some(mut cmd) = ctx.clients.get_mut(c).and_then(|cl| cl.cmd.take()) else {
        return Ok(());
    };
    cmd.msec = (ctx.frametime() * 1000.0).round().clamp(1.0, 250.0) as u8;

    ctx.edicts[idx].s.effects &= !EF_MUZZLEFLASH;
    {
        let client = &mut ctx.clients[c];
        client.oldbuttons = client.buttons;
        client.buttons = cmd.buttons;
        client.latched_buttons |= cmd.buttons & !client.oldbuttons;
    }

    if !ctx.edicts[idx].is_alive() {
        let client = &mut ctx.clients[c];
        let wants = client.latched_buttons & (BUTTON_ATTACK | BUTTON_USE) != 0;
        client.latched_buttons = 0;
        if wants && now >= client.respawn_time {
            return respawn(ctx, idx);
        }
        return Ok(());
    }

    if cmd.impulse != 0 {
        handle_impulse(ctx, idx, cmd.impulse);
    }

    let speed_scale = movement_modifiers(ctx, idx, &cmd);
    run_pmove(ctx, idx, &cmd, speed_scale)?;
    apply_slide(ctx, idx);

    if !ctx.edicts[idx].is_alive() {
        return Ok(());
    }
    if ctx.clients[c].latched_buttons & BUTTON_USE != 0 {
        player_use(ctx, idx)?;
    }
    think_weapon(ctx, idx)?;
    if let Some(client) = ctx.clients.get_mut(c) {
        client.latched_buttons = 0;
    }
    Ok(())
}

fn handle_impulse(ctx: &mut GameCtx, idx: usize, impulse: u8) {
    let now = ctx.level.time;
    match impulse {
        IMPULSE_NEXT_WEAPON => next_weapon(ctx, idx),
        IMPULSE_PRONE => toggle_prone(ctx, idx),
        IMPULSE_FLASHLIGHT => {
            if let Some(client) = ctx.client_of_mut(idx) {
                client.flashlight = !client.flashlight;
            }
        }
        IMPULSE_NIGHTVISION => {
            if let Some(client) = ctx.client_of_mut(idx) {
                if client.pers.has_weapon[WeaponKind::Goggles as usize] {
                    client.nightvision = !client.nightvision;
                }
            }
        }
        IMPULSE_HOLSTER => {
            let Some(client) = ctx.client_of_mut(idx) else {
                return;
            };
            if client.holstered {
                client.holstered = false;
                client.fire_finished = now + WEAPON_SWITCH_TIME;
            } else if client.grenade_cook_start.is_none() {
                client.holstered = true;
                client.reload_finished = 0.0;
            }
        }
        other => debug!("player {}: unknown impulse {}", idx, other),
    }
}

/// Drop to prone from any stance while on the ground; stand back up only
/// if there is headroom.
fn toggle_prone(ctx: &mut GameCtx, idx: usize) {
    let Some(client) = ctx.client_of(idx) else {
        return;
    };
    let prone = client.ps.pmove.pm_flags & PMF_PRONE != 0;
    let e = &ctx.edicts[idx];

    if prone {
        let standing = [16.0, 16.0, PLAYER_MAXS_STAND];
        let tr = trace(ctx, &e.s.origin, &PLAYER_MINS, &standing, &e.s.origin, idx as i32, MASK_PLAYERSOLID);
        if tr.allsolid || tr.startsolid {
            debug!("player {}: no room to stand", idx);
            return;
        }
        if let Some(client) = ctx.client_of_mut(idx) {
            client.ps.pmove.pm_flags &= !(PMF_PRONE | PMF_DUCKED);
            client.stance = Stance::Stand;
        }
    } else if e.groundentity >= 0 {
        if let Some(client) = ctx.client_of_mut(idx) {
            client.ps.pmove.pm_flags |= PMF_PRONE;
            client.stance = Stance::Prone;
            client.sprinting = false;
        }
    }
}

/// Sprint, lean, dash and slide. Returns the ground speed multiplier for
/// this command.
fn movement_modifiers(ctx: &mut GameCtx, idx: usize, cmd: &UserCmd) -> f32 {
    let now = ctx.level.time;
    let ft = ctx.frametime();
    let on_ground = ctx.edicts[idx].groundentity >= 0;
    let Some(c) = ctx.edicts[idx].client else {
        return 1.0;
    };
    let client = &mut ctx.clients[c];
    let (forward, right, _) = angle_vectors_tuple(&[0.0, client.v_angle[YAW], 0.0]);
    let crouching = cmd.upmove < 0;

    // a sprinting player who ducks goes into a slide
    if client.sprinting && crouching && on_ground && client.slide_until <= now {
        client.slide_until = now + SLIDE_TIME;
        client.slide_dir = forward;
    }

    let want_sprint = cmd.buttons & BUTTON_SPRINT != 0 && cmd.forwardmove > 0;
    client.sprinting = want_sprint && client.stance == Stance::Stand && !crouching && client.stamina > 0.0;
    client.stamina = if client.sprinting {
        (client.stamina - SPRINT_DRAIN * ft).max(0.0)
    } else {
        (client.stamina + STAMINA_REGEN * ft).min(STAMINA_MAX)
    };

    let lean = match (cmd.buttons & BUTTON_LEAN_LEFT != 0, cmd.buttons & BUTTON_LEAN_RIGHT != 0) {
        (true, false) => -1,
        (false, true) => 1,
        _ => 0,
    };
    client.lean = if client.sprinting { 0 } else { lean };
    client.lean_offset = client.lean as f32 * LEAN_DISTANCE;

    // double-tap strafe
    let sign = cmd.sidemove.signum() as i32;
    let mut dash = None;
    if sign != 0 && client.strafe_held != sign {
        let quick = sign == client.last_strafe_sign && now - client.last_strafe_time <= DASH_WINDOW;
        if quick && now >= client.dash_ready_time && on_ground && client.stance == Stance::Stand {
            dash = Some(vector_scale(&right, sign as f32 * DASH_SPEED));
            client.dash_ready_time = now + DASH_COOLDOWN;
            client.last_strafe_sign = 0;
        } else {
            client.last_strafe_sign = sign;
            client.last_strafe_time = now;
        }
    }
    client.strafe_held = sign;

    let mut scale = client.stance.speed_scale();
    if client.sprinting {
        scale *= SPRINT_SCALE;
    }
    if client.effects.concussed_until > now {
        scale *= CONCUSSED_SCALE;
    }

    if client.slide_until > now {
        scale = scale.max(1.0);
    }

    if let Some(push) = dash {
        let e = &mut ctx.edicts[idx];
        e.velocity[0] += push[0];
        e.velocity[1] += push[1];
        e.velocity[2] = e.velocity[2].max(DASH_LIFT);
    }
    scale
}

/// Keep a slide's forward speed up after movement has applied friction.
/// The boost decays linearly to nothing over the slide.
fn apply_slide(ctx: &mut GameCtx, idx: usize) {
    let now = ctx.level.time;
    let Some(client) = ctx.client_of(idx) else {
        return;
    };
    if client.slide_until <= now {
        return;
    }
    let boost = SLIDE_SPEED * (client.slide_until - now) / SLIDE_TIME;
    let dir = client.slide_dir;
    let e = &mut ctx.edicts[idx];
    if e.groundentity < 0 {
        return;
    }
    let along = dot_product(&e.velocity, &dir);
    if along < boost {
        e.velocity = vector_ma(&e.velocity, boost - along, &dir);
    }
}

fn run_pmove(ctx: &mut GameCtx, idx: usize, cmd: &UserCmd, speed_scale: f32) -> GameResult<()> {
    let Some(c) = ctx.edicts[idx].client else {
        return Ok(());
    };
    let was_on_ground = ctx.edicts[idx].groundentity >= 0;

    let mut state = ctx.clients[c].ps.pmove;
    {
        let e = &ctx.edicts[idx];
        state.origin = e.s.origin;
        state.velocity = e.velocity;
        state.gravity = ctx.sv_gravity.clamp(i16::MIN as f32, i16::MAX as f32) as i16;
        state.pm_type = PmType::Normal;
    }
    ctx.clients[c].old_velocity = ctx.edicts[idx].velocity;

    let mut pm = PmoveData::new(state, *cmd);
    pm.speed_scale = speed_scale;
    {
        let world = WorldTrace {
            ctx: &*ctx,
            passent: idx as i32,
            mask: MASK_PLAYERSOLID,
        };
        ctx.pm.resolve_player_movement(&mut pm, &world);
    }

    let client = &mut ctx.clients[c];
    client.stance = if pm.s.pm_flags & PMF_PRONE != 0 {
        Stance::Prone
    } else if pm.s.pm_flags & PMF_DUCKED != 0 {
        Stance::Crouch
    } else {
        Stance::Stand
    };
    client.v_angle = pm.viewangles;
    client.ps.viewangles = pm.viewangles;
    client.ps.pmove = pm.s;

    let e = &mut ctx.edicts[idx];
    e.s.origin = pm.s.origin;
    e.velocity = pm.s.velocity;
    e.mins = pm.mins;
    e.maxs = pm.maxs;
    e.groundentity = pm.groundentity;
    e.s.angles = [0.0, pm.viewangles[YAW], 0.0];

    if was_on_ground && pm.groundentity < 0 && cmd.upmove > 0 && pm.s.velocity[2] > 0.0 {
        let snd = ctx.configstrings.sound_index("player/jump1.wav");
        ctx.gi.play_sound(idx as i32, CHAN_VOICE, snd, 1.0, ATTN_NORM, 0.0);
    }

    link_entity(ctx, idx);
    g_touch_triggers(ctx, idx)?;

    let mut touched = pm.touchents;
    touched.sort_unstable();
    touched.dedup();
    for other in touched {
        let Some(other) = ctx.live_index(other) else {
            continue;
        };
        if other != 0 && ctx.edicts[other].touch.is_some() {
            call_touch(ctx, other, idx, None, 0)?;
        }
    }
    Ok(())
}

/// Press whatever is straight ahead within arm's reach.
fn player_use(ctx: &mut GameCtx, idx: usize) -> GameResult<()> {
    let start = eye_position(ctx, idx);
    let v_angle = ctx.client_of(idx).map_or(VEC3_ORIGIN, |cl| cl.v_angle);
    let (forward, _, _) = angle_vectors_tuple(&v_angle);
    let end = vector_ma(&start, USE_RANGE, &forward);
    let tr = trace(ctx, &start, &VEC3_ORIGIN, &VEC3_ORIGIN, &end, idx as i32, MASK_SHOT);
    let Some(hit) = ctx.live_index(tr.ent_index) else {
        return Ok(());
    };
    if hit == 0 || ctx.edicts[hit].use_fn.is_none() {
        return Ok(());
    }
    debug!("player {} uses {} ({})", idx, hit, ctx.edicts[hit].classname);
    call_use(ctx, hit, idx, idx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::UseKind;
    use crate::g_combat::t_damage;
    use crate::g_main::{apply_player_input, init_game, tick};
    use crate::g_utils::test_support::{make_edict, test_ctx};
    use sofsim_common::cmodel::Brush;
    use sofsim_common::pmove::{PLAYER_MAXS_CROUCH, PLAYER_MAXS_PRONE};

    fn add_floor(ctx: &mut GameCtx) {
        ctx.world.add_brush(Brush::solid([-2048.0, -2048.0, -64.0], [2048.0, 2048.0, 0.0]));
    }

    fn add_spot(ctx: &mut GameCtx, classname: &str, origin: Vec3, yaw: f32) -> usize {
        let s = make_edict(ctx, origin);
        ctx.edicts[s].classname = classname.to_string();
        ctx.edicts[s].s.angles = [0.0, yaw, 0.0];
        ctx.register_entity_in_index(s);
        s
    }

    /// A connected player standing on the floor at the origin.
    fn joined(ctx: &mut GameCtx) -> EntityHandle {
        add_floor(ctx);
        add_spot(ctx, "info_player_start", [0.0, 0.0, 24.0], 0.0);
        client_connect(ctx, 1, "hawk").unwrap();
        let h = client_begin(ctx, 1).unwrap();
        // let the player settle onto the floor
        for _ in 0..3 {
            send(ctx, h, UserCmd::default());
        }
        h
    }

    fn send(ctx: &mut GameCtx, h: EntityHandle, cmd: UserCmd) {
        apply_player_input(ctx, h, cmd).unwrap();
        tick(ctx, SERVER_FRAMETIME_MS).unwrap();
    }

    fn forward(buttons: u8) -> UserCmd {
        UserCmd {
            forwardmove: 300,
            buttons,
            ..Default::default()
        }
    }

    #[test]
    fn test_begin_places_player_at_start() {
        let mut ctx = test_ctx();
        add_spot(&mut ctx, "info_player_start", [64.0, 32.0, 24.0], 90.0);
        client_connect(&mut ctx, 1, "hawk").unwrap();
        let h = client_begin(&mut ctx, 1).unwrap();

        assert_eq!(ctx.resolve(h), Some(1));
        let e = &ctx.edicts[1];
        assert!(e.inuse);
        assert_eq!(e.classname, "player");
        assert_eq!(e.s.origin, [64.0, 32.0, 25.0]);
        assert_eq!(e.s.angles[YAW], 90.0);
        assert_eq!(e.health, 100);
        assert!(e.invuln_time > ctx.level.time);
        let client = &ctx.clients[0];
        assert_eq!(client.pers.weapon, WeaponKind::Pistol2);
        assert_eq!(client.pers.mag[WeaponKind::Pistol2 as usize], 15);
        assert_eq!(client.stamina, STAMINA_MAX);
        assert_eq!(ctx.find_by_classname("player"), vec![1]);
    }

    #[test]
    fn test_slot_outside_maxclients_is_rejected() {
        let mut ctx = test_ctx();
        assert!(matches!(client_connect(&mut ctx, 0, "x"), Err(GameError::InvalidEntity { .. })));
        assert!(matches!(client_connect(&mut ctx, 5, "x"), Err(GameError::InvalidEntity { .. })));
        assert!(client_begin(&mut ctx, 1).is_err());
    }

    #[test]
    fn test_spawning_telefrags_occupant() {
        let mut ctx = test_ctx();
        add_spot(&mut ctx, "info_player_start", [0.0, 0.0, 24.0], 0.0);
        let m = crate::g_utils::test_support::make_monster(&mut ctx, [0.0, 0.0, 24.0], 50);
        client_connect(&mut ctx, 1, "hawk").unwrap();
        client_begin(&mut ctx, 1).unwrap();
        assert!(ctx.edicts[m].health <= 0);
    }

    #[test]
    fn test_deathmatch_picks_spot_away_from_others() {
        let mut ctx = GameCtx::new();
        ctx.cvars.set("maxclients", "2");
        ctx.cvars.set("deathmatch", "1");
        init_game(&mut ctx);
        let near = add_spot(&mut ctx, "info_player_deathmatch", [0.0, 0.0, 24.0], 0.0);
        let far = add_spot(&mut ctx, "info_player_deathmatch", [1000.0, 0.0, 24.0], 0.0);

        client_connect(&mut ctx, 1, "a").unwrap();
        client_begin(&mut ctx, 1).unwrap();
        ctx.edicts[1].s.origin = ctx.edicts[near].s.origin;

        assert_eq!(select_spawn_point(&ctx, 2).0, ctx.edicts[far].s.origin);
    }

    #[test]
    fn test_command_moves_player() {
        let mut ctx = test_ctx();
        let h = joined(&mut ctx);
        assert!(ctx.edicts[1].groundentity >= 0);
        let x0 = ctx.edicts[1].s.origin[0];
        for _ in 0..10 {
            send(&mut ctx, h, forward(0));
        }
        assert!(ctx.edicts[1].s.origin[0] > x0 + 50.0);
        assert!((ctx.edicts[1].s.origin[2] - 24.0).abs() < 1.0);
    }

    #[test]
    fn test_no_command_no_movement() {
        let mut ctx = test_ctx();
        joined(&mut ctx);
        let before = ctx.edicts[1].s.origin;
        tick(&mut ctx, SERVER_FRAMETIME_MS).unwrap();
        assert_eq!(ctx.edicts[1].s.origin, before);
    }

    #[test]
    fn test_crouching_is_slower() {
        let run = |upmove: i16| {
            let mut ctx = test_ctx();
            let h = joined(&mut ctx);
            let x0 = ctx.edicts[1].s.origin[0];
            for _ in 0..10 {
                send(&mut ctx, h, UserCmd { forwardmove: 300, upmove, ..Default::default() });
            }
            (ctx.edicts[1].s.origin[0] - x0, ctx.clients[0].stance, ctx.edicts[1].maxs[2])
        };
        let (stand, _, _) = run(0);
        let (crouch, stance, maxs) = run(-200);
        assert_eq!(stance, Stance::Crouch);
        assert_eq!(maxs, PLAYER_MAXS_CROUCH);
        assert!(crouch < stand * 0.75);
    }

    #[test]
    fn test_sprint_drains_stamina_and_cancels_lean() {
        let mut ctx = test_ctx();
        let h = joined(&mut ctx);
        send(&mut ctx, h, forward(BUTTON_SPRINT | BUTTON_LEAN_LEFT));
        let client = &ctx.clients[0];
        assert!(client.sprinting);
        assert!(client.stamina < STAMINA_MAX);
        assert_eq!(client.lean, 0);

        ctx.clients[0].stamina = 0.0;
        send(&mut ctx, h, forward(BUTTON_SPRINT));
        assert!(!ctx.clients[0].sprinting);
    }

    #[test]
    fn test_lean_moves_the_eye() {
        let mut ctx = test_ctx();
        let h = joined(&mut ctx);
        send(&mut ctx, h, UserCmd { buttons: BUTTON_LEAN_RIGHT, ..Default::default() });
        assert_eq!(ctx.clients[0].lean, 1);
        let origin = ctx.edicts[1].s.origin;
        let eye = eye_position(&ctx, 1);
        // facing +x, right is -y
        assert!((eye[1] - (origin[1] - LEAN_DISTANCE)).abs() < 0.01);
        assert_eq!(eye[2], origin[2] + 22.0);
    }

    #[test]
    fn test_double_tap_strafe_dashes() {
        let mut ctx = test_ctx();
        let h = joined(&mut ctx);
        let strafe = UserCmd { sidemove: 200, ..Default::default() };
        send(&mut ctx, h, strafe);
        assert_eq!(ctx.clients[0].dash_ready_time, 0.0);
        send(&mut ctx, h, UserCmd::default());
        send(&mut ctx, h, strafe);
        assert!(ctx.clients[0].dash_ready_time > ctx.level.time);
        let v = ctx.edicts[1].velocity;
        assert!((v[0] * v[0] + v[1] * v[1]).sqrt() > 300.0);

        // cooldown
        let ready = ctx.clients[0].dash_ready_time;
        send(&mut ctx, h, UserCmd::default());
        send(&mut ctx, h, strafe);
        assert_eq!(ctx.clients[0].dash_ready_time, ready);
    }

    #[test]
    fn test_crouch_while_sprinting_slides() {
        let mut ctx = test_ctx();
        let h = joined(&mut ctx);
        send(&mut ctx, h, forward(BUTTON_SPRINT));
        send(&mut ctx, h, UserCmd { forwardmove: 300, upmove: -200, buttons: BUTTON_SPRINT, ..Default::default() });
        let client = &ctx.clients[0];
        assert!(client.slide_until > ctx.level.time);
        assert!(!client.sprinting);
        assert!(ctx.edicts[1].velocity[0] > 300.0);
    }

    #[test]
    fn test_prone_toggle() {
        let mut ctx = test_ctx();
        let h = joined(&mut ctx);
        send(&mut ctx, h, UserCmd { impulse: IMPULSE_PRONE, ..Default::default() });
        assert_eq!(ctx.clients[0].stance, Stance::Prone);
        assert_eq!(ctx.edicts[1].maxs[2], PLAYER_MAXS_PRONE);
        assert_eq!(eye_position(&ctx, 1)[2], ctx.edicts[1].s.origin[2] - 14.0);

        send(&mut ctx, h, UserCmd { impulse: IMPULSE_PRONE, ..Default::default() });
        assert_eq!(ctx.clients[0].stance, Stance::Stand);
        assert_eq!(ctx.edicts[1].maxs[2], PLAYER_MAXS_STAND);
    }

    #[test]
    fn test_toggles() {
        let mut ctx = test_ctx();
        let h = joined(&mut ctx);
        send(&mut ctx, h, UserCmd { impulse: IMPULSE_FLASHLIGHT, ..Default::default() });
        assert!(ctx.clients[0].flashlight);

        // no goggles, no night vision
        send(&mut ctx, h, UserCmd { impulse: IMPULSE_NIGHTVISION, ..Default::default() });
        assert!(!ctx.clients[0].nightvision);
        ctx.clients[0].pers.has_weapon[WeaponKind::Goggles as usize] = true;
        send(&mut ctx, h, UserCmd { impulse: IMPULSE_NIGHTVISION, ..Default::default() });
        assert!(ctx.clients[0].nightvision);

        send(&mut ctx, h, UserCmd { impulse: IMPULSE_HOLSTER, ..Default::default() });
        assert!(ctx.clients[0].holstered);
        let mag = ctx.clients[0].pers.mag[WeaponKind::Pistol2 as usize];
        send(&mut ctx, h, UserCmd { buttons: BUTTON_ATTACK, ..Default::default() });
        assert_eq!(ctx.clients[0].pers.mag[WeaponKind::Pistol2 as usize], mag);
    }

    #[test]
    fn test_use_presses_what_is_in_front() {
        let mut ctx = test_ctx();
        let h = joined(&mut ctx);
        let b = make_edict(&mut ctx, [60.0, 0.0, 46.0]);
        let e = &mut ctx.edicts[b];
        e.classname = "func_breakable".to_string();
        e.solid = Solid::Bbox;
        e.mins = [-8.0; 3];
        e.maxs = [8.0; 3];
        e.health = 10;
        e.takedamage = Damage::Yes;
        e.use_fn = Some(UseKind::Breakable);
        link_entity(&mut ctx, b);

        send(&mut ctx, h, UserCmd { buttons: BUTTON_USE, ..Default::default() });
        assert!(!ctx.edicts[b].inuse || ctx.edicts[b].health <= 0);
    }

    #[test]
    fn test_death_then_respawn_on_attack() {
        let mut ctx = test_ctx();
        let h = joined(&mut ctx);
        ctx.edicts[1].invuln_time = 0.0;
        t_damage(&mut ctx, 1, 0, 0, &VEC3_ORIGIN, &VEC3_ORIGIN, &VEC3_ORIGIN, 120, 0, DamageFlags::NO_ARMOR, MeansOfDeath::Unknown).unwrap();
        assert_eq!(ctx.edicts[1].deadflag, DeadFlag::Dead);
        assert_eq!(ctx.clients[0].ps.pmove.pm_type, PmType::Dead);
        assert_eq!(ctx.clients[0].resp.deaths, 1);

        // too early
        send(&mut ctx, h, UserCmd { buttons: BUTTON_ATTACK, ..Default::default() });
        assert_eq!(ctx.edicts[1].deadflag, DeadFlag::Dead);

        for _ in 0..10 {
            send(&mut ctx, h, UserCmd::default());
        }
        send(&mut ctx, h, UserCmd { buttons: BUTTON_ATTACK, ..Default::default() });
        let e = &ctx.edicts[1];
        assert_eq!(e.deadflag, DeadFlag::No);
        assert_eq!(e.health, 100);
        assert_eq!(ctx.clients[0].resp.deaths, 1);
        assert_eq!(ctx.clients[0].pers.weapon, WeaponKind::Pistol2);
        // the old handle still addresses the player
        assert_eq!(ctx.resolve(h), Some(1));
    }

    #[test]
    fn test_heavy_damage_gibs_player() {
        let mut ctx = test_ctx();
        joined(&mut ctx);
        ctx.edicts[1].invuln_time = 0.0;
        t_damage(&mut ctx, 1, 0, 0, &VEC3_ORIGIN, &VEC3_ORIGIN, &VEC3_ORIGIN, 500, 0, DamageFlags::NO_ARMOR, MeansOfDeath::Unknown).unwrap();
        let e = &ctx.edicts[1];
        assert_eq!(e.s.modelindex, 0);
        assert_eq!(e.takedamage, Damage::No);
        assert!(ctx.edicts.iter().any(|g| g.inuse && g.classname == "gib"));
    }

    #[test]
    fn test_disconnect_frees_slot() {
        let mut ctx = test_ctx();
        let h = joined(&mut ctx);
        client_disconnect(&mut ctx, 1);
        assert!(!ctx.edicts[1].inuse);
        assert!(!ctx.clients[0].pers.connected);
        assert_eq!(ctx.resolve(h), None);
        assert!(ctx.find_by_classname("player").is_empty());
        assert!(apply_player_input(&mut ctx, h, UserCmd::default()).is_err());
    }

    #[test]
    fn test_single_player_keeps_inventory_across_levels() {
        let mut ctx = test_ctx();
        joined(&mut ctx);
        ctx.edicts[1].health = 40;
        ctx.clients[0].pers.ammo[AmmoKind::Nine as usize] = 7;
        save_client_data(&mut ctx);
        put_client_in_server(&mut ctx, 1).unwrap();
        assert_eq!(ctx.edicts[1].health, 40);
        assert_eq!(ctx.clients[0].pers.ammo[AmmoKind::Nine as usize], 7);
    }
}
