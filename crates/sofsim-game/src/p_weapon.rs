// p_weapon.rs — player weapon handling: switching, firing, reloading, jams and grenades

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

use log::debug;

use crate::g_error::GameResult;
use crate::g_local::*;
use crate::g_weapon::{
    explode_in_hand, fire_grenade, fire_rocket, fire_weapon_pellets, AmmoKind, FireMode, WeaponKind, ALL_WEAPONS,
    C4_TIMER, GRENADE_RADIUS, GRENADE_SPEED, ROCKET_RADIUS, ROCKET_SPEED, WEAPON_KINDS,
};
use crate::game_import::{EffectKind, ATTN_NORM, CHAN_AUTO, CHAN_WEAPON};
use crate::p_client::eye_position;

/// Delay after switching before the new weapon can fire.
pub const WEAPON_SWITCH_TIME: f32 = 0.5;
/// Delay after a dry fire click.
const DRY_FIRE_TIME: f32 = 0.5;
/// Upward boost added to a thrown grenade.
const THROW_LIFT: f32 = 200.0;

fn weapon_sound(ctx: &mut GameCtx, idx: usize, name: &str) {
    let snd = ctx.configstrings.sound_index(name);
    ctx.gi.play_sound(idx as i32, CHAN_WEAPON, snd, 1.0, ATTN_NORM, 0.0);
}

// ============================================================
// Switching
// ============================================================

/// Bring up `kind` if the player owns it. Any reload, jam or cooked
/// grenade in progress is abandoned.
pub fn change_weapon(ctx: &mut GameCtx, idx: usize, kind: WeaponKind) {
    let now = ctx.level.time;
    let Some(client) = ctx.client_of_mut(idx) else {
        return;
    };
    if kind != WeaponKind::None && !client.pers.has_weapon[kind as usize] {
        return;
    }
    if client.pers.weapon == kind {
        return;
    }
    client.pers.last_weapon = client.pers.weapon;
    client.pers.weapon = kind;
    client.weapon_jammed = false;
    client.reload_finished = 0.0;
    client.grenade_cook_start = None;
    client.holstered = false;
    client.fire_finished = now + WEAPON_SWITCH_TIME;
    debug!("client {} switched to {:?}", idx, kind);
}

/// Cycle to the next owned weapon in table order.
pub fn next_weapon(ctx: &mut GameCtx, idx: usize) {
    let Some(client) = ctx.client_of(idx) else {
        return;
    };
    let current = client.pers.weapon as usize;
    let next = (1..WEAPON_KINDS)
        .map(|step| ALL_WEAPONS[(current + step) % WEAPON_KINDS])
        .find(|w| *w != WeaponKind::None && client.pers.has_weapon[*w as usize]);
    if let Some(kind) = next {
        change_weapon(ctx, idx, kind);
    }
}

/// Reserve rounds for the ammo `kind` uses.
fn reserve(client: &GClient, kind: WeaponKind) -> i32 {
    client.pers.ammo[kind.info().ammo as usize]
}

// ============================================================
// Reloading
// ============================================================

/// Start a reload. Clears a jam even with a full magazine.
pub fn start_reload(ctx: &mut GameCtx, idx: usize) -> bool {
    let now = ctx.level.time;
    let Some(client) = ctx.client_of_mut(idx) else {
        return false;
    };
    let kind = client.pers.weapon;
    let info = kind.info();
    if info.mag_size <= 0 || client.reload_finished > 0.0 {
        return false;
    }
    let full = client.pers.mag[kind as usize] >= info.mag_size;
    if !client.weapon_jammed && (full || reserve(client, kind) <= 0) {
        return false;
    }
    client.reload_finished = now + info.reload_time;
    weapon_sound(ctx, idx, "weapons/reload.wav");
    true
}

fn finish_reload(client: &mut GClient) {
    let kind = client.pers.weapon;
    let info = kind.info();
    let ammo = info.ammo as usize;
    let room = (info.mag_size - client.pers.mag[kind as usize]).max(0);
    let take = room.min(client.pers.ammo[ammo]);
    client.pers.mag[kind as usize] += take;
    client.pers.ammo[ammo] -= take;
    client.weapon_jammed = false;
    client.reload_finished = 0.0;
}

// ============================================================
// Per-frame
// ============================================================

/// Run the current weapon for one frame. Called from the player's
/// pre-think after the button state for this command is known.
pub fn think_weapon(ctx: &mut GameCtx, idx: usize) -> GameResult<()> {
    let now = ctx.level.time;
    let (kind, buttons, latched, reloading, holstered) = {
        let Some(client) = ctx.client_of(idx) else {
            return Ok(());
        };
        (
            client.pers.weapon,
            client.buttons,
            client.latched_buttons,
            client.reload_finished,
            client.holstered,
        )
    };
    if !ctx.edicts[idx].is_alive() || holstered || kind == WeaponKind::None {
        return Ok(());
    }

    if reloading > 0.0 {
        if now >= reloading {
            if let Some(client) = ctx.client_of_mut(idx) {
                finish_reload(client);
            }
        }
        return Ok(());
    }

    if latched & BUTTON_RELOAD != 0 {
        start_reload(ctx, idx);
        return Ok(());
    }

    if kind.info().mode == FireMode::Throw {
        return think_throw(ctx, idx, kind, buttons & BUTTON_ATTACK != 0);
    }

    let ready = ctx.client_of(idx).is_some_and(|c| now >= c.fire_finished);
    if buttons & BUTTON_ATTACK != 0 && ready {
        fire_weapon(ctx, idx)?;
    }
    Ok(())
}

/// Spread multiplier from stance and movement.
fn spread_scale(client: &GClient, now: f32) -> f32 {
    let mut scale = match client.stance {
        Stance::Stand => 1.0,
        Stance::Crouch => 0.75,
        Stance::Prone => 0.5,
    };
    if client.sprinting {
        scale *= 2.0;
    }
    if client.effects.concussed_until > now {
        scale *= 1.5;
    }
    scale
}

/// One trigger pull of a magazine or utility weapon.
pub fn fire_weapon(ctx: &mut GameCtx, idx: usize) -> GameResult<()> {
    let now = ctx.level.time;
    let jam_roll = ctx.random();
    let Some(client) = ctx.client_of_mut(idx) else {
        return Ok(());
    };
    let kind = client.pers.weapon;
    let info = kind.info();

    if info.mag_size > 0 {
        if client.weapon_jammed {
            client.fire_finished = now + DRY_FIRE_TIME;
            weapon_sound(ctx, idx, "weapons/noammo.wav");
            return Ok(());
        }
        if client.pers.mag[kind as usize] <= 0 {
            client.fire_finished = now + DRY_FIRE_TIME;
            let has_reserve = reserve(client, kind) > 0;
            if !has_reserve || !start_reload(ctx, idx) {
                weapon_sound(ctx, idx, "weapons/noammo.wav");
            }
            return Ok(());
        }
        if jam_roll < ctx.jam_chance {
            if let Some(client) = ctx.client_of_mut(idx) {
                client.weapon_jammed = true;
                client.fire_finished = now + DRY_FIRE_TIME;
            }
            ctx.gi.centerprintf(idx as i32, "weapon jammed");
            debug!("client {} jammed {:?}", idx, kind);
            return Ok(());
        }
        let Some(client) = ctx.client_of_mut(idx) else {
            return Ok(());
        };
        client.pers.mag[kind as usize] -= 1;
    }

    let Some(client) = ctx.client_of_mut(idx) else {
        return Ok(());
    };
    client.fire_finished = now + info.fire_interval;
    let scale = spread_scale(client, now);
    let v_angle = client.v_angle;

    let start = eye_position(ctx, idx);
    let (forward, _, _) = angle_vectors_tuple(&v_angle);

    match info.mode {
        FireMode::Melee | FireMode::Hitscan | FireMode::Flame => {
            fire_weapon_pellets(ctx, idx, info, &start, &forward, scale)?;
        }
        FireMode::Rocket => {
            fire_rocket(ctx, idx, &start, &forward, info.damage, ROCKET_SPEED, ROCKET_RADIUS)?;
        }
        FireMode::Heal(amount) => return use_heal(ctx, idx, kind, amount),
        FireMode::Goggles => {
            if let Some(client) = ctx.client_of_mut(idx) {
                client.nightvision = !client.nightvision;
            }
            return Ok(());
        }
        FireMode::Throw | FireMode::None => return Ok(()),
    }

    if info.mode != FireMode::Melee {
        ctx.edicts[idx].s.effects |= EF_MUZZLEFLASH;
        ctx.gi.spawn_particle_effect(&start, &forward, EffectKind::MuzzleFlash, 1);
        ctx.gi.add_dynamic_light(&start, &[1.0, 0.9, 0.6], 150.0, 0.1);
    }
    weapon_sound(ctx, idx, &format!("weapons/{}_fire.wav", info.classname.trim_start_matches("weapon_")));
    Ok(())
}

/// Medkits and field packs are used up on the spot.
fn use_heal(ctx: &mut GameCtx, idx: usize, kind: WeaponKind, amount: i32) -> GameResult<()> {
    let e = &mut ctx.edicts[idx];
    if e.health >= e.max_health {
        return Ok(());
    }
    e.health = (e.health + amount).min(e.max_health);
    let Some(client) = ctx.client_of_mut(idx) else {
        return Ok(());
    };
    client.pers.has_weapon[kind as usize] = false;
    client.effects.bleeding_until = 0.0;
    client.bonus_alpha = 0.25;
    let back = client.pers.last_weapon;
    client.pers.weapon = WeaponKind::None;
    let snd = ctx.configstrings.sound_index("items/m_health.wav");
    ctx.gi.play_sound(idx as i32, CHAN_AUTO, snd, 1.0, ATTN_NORM, 0.0);
    change_weapon(ctx, idx, back);
    Ok(())
}

// ============================================================
// Grenades and charges
// ============================================================

/// Holding fire cooks a grenade; letting go throws it with whatever fuse
/// is left. Holding past the fuse blows it up in hand. Charges are thrown
/// on press with a fixed timer.
fn think_throw(ctx: &mut GameCtx, idx: usize, kind: WeaponKind, attack: bool) -> GameResult<()> {
    let now = ctx.level.time;
    let fuse = ctx.grenade_fuse;
    let Some(client) = ctx.client_of_mut(idx) else {
        return Ok(());
    };
    let ammo = kind.info().ammo as usize;

    match client.grenade_cook_start {
        None => {
            if !attack || now < client.fire_finished {
                return Ok(());
            }
            if client.pers.ammo[ammo] <= 0 {
                client.fire_finished = now + DRY_FIRE_TIME;
                return Ok(());
            }
            if kind == WeaponKind::C4 {
                return throw_grenade(ctx, idx, kind, C4_TIMER);
            }
            client.grenade_cook_start = Some(now);
            weapon_sound(ctx, idx, "weapons/grenade_pin.wav");
            Ok(())
        }
        Some(start) => {
            let held = now - start;
            if held >= fuse {
                client.grenade_cook_start = None;
                client.pers.ammo[ammo] -= 1;
                client.fire_finished = now + kind.info().fire_interval;
                debug!("client {} held a grenade too long", idx);
                return explode_in_hand(ctx, idx, kind.info().damage);
            }
            if attack {
                return Ok(());
            }
            throw_grenade(ctx, idx, kind, fuse - held)
        }
    }
}

fn throw_grenade(ctx: &mut GameCtx, idx: usize, kind: WeaponKind, timer: f32) -> GameResult<()> {
    let now = ctx.level.time;
    let Some(client) = ctx.client_of_mut(idx) else {
        return Ok(());
    };
    client.grenade_cook_start = None;
    client.pers.ammo[kind.info().ammo as usize] -= 1;
    client.fire_finished = now + kind.info().fire_interval;
    let v_angle = client.v_angle;

    let start = eye_position(ctx, idx);
    let (forward, _, up) = angle_vectors_tuple(&v_angle);
    let mut velocity = vector_scale(&forward, GRENADE_SPEED);
    velocity = vector_ma(&velocity, THROW_LIFT, &up);
    fire_grenade(ctx, idx, &start, &velocity, kind.info().damage, timer, GRENADE_RADIUS, kind)?;
    weapon_sound(ctx, idx, "weapons/grenade_throw.wav");
    Ok(())
}

/// A player who dies holding a cooked grenade drops it live.
pub fn drop_cooked_grenade(ctx: &mut GameCtx, idx: usize) -> GameResult<()> {
    let now = ctx.level.time;
    let fuse = ctx.grenade_fuse;
    let Some(client) = ctx.client_of_mut(idx) else {
        return Ok(());
    };
    let Some(start) = client.grenade_cook_start.take() else {
        return Ok(());
    };
    let kind = client.pers.weapon;
    client.pers.ammo[kind.info().ammo as usize] -= 1;
    let origin = ctx.edicts[idx].s.origin;
    let left = (fuse - (now - start)).max(FRAMETIME);
    fire_grenade(ctx, idx, &origin, &VEC3_ORIGIN, kind.info().damage, left, GRENADE_RADIUS, kind)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::g_utils::test_support::{make_monster, make_player, test_ctx};

    fn armed(ctx: &mut GameCtx, kind: WeaponKind, reserve: i32) -> usize {
        let p = make_player(ctx, [0.0, 0.0, 0.0]);
        let pers = &mut ctx.clients[0].pers;
        pers.has_weapon[kind as usize] = true;
        pers.weapon = kind;
        pers.mag[kind as usize] = kind.info().mag_size;
        pers.ammo[kind.info().ammo as usize] = reserve;
        ctx.jam_chance = 0.0;
        p
    }

    fn count(ctx: &GameCtx, classname: &str) -> usize {
        ctx.edicts.iter().filter(|e| e.inuse && e.classname == classname).count()
    }

    /// Advance level time without running entities.
    fn wait(ctx: &mut GameCtx, seconds: f32) {
        ctx.level.time += seconds;
    }

    fn hold(ctx: &mut GameCtx, p: usize, buttons: u8) {
        let c = &mut ctx.clients[0];
        c.oldbuttons = c.buttons;
        c.buttons = buttons;
        c.latched_buttons = buttons & !c.oldbuttons;
        think_weapon(ctx, p).unwrap();
    }

    // ============================================================
    // Switching
    // ============================================================

    #[test]
    fn test_change_requires_ownership() {
        let mut ctx = test_ctx();
        let p = armed(&mut ctx, WeaponKind::Pistol1, 0);
        change_weapon(&mut ctx, p, WeaponKind::Sniper);
        assert_eq!(ctx.clients[0].pers.weapon, WeaponKind::Pistol1);

        ctx.clients[0].pers.has_weapon[WeaponKind::Sniper as usize] = true;
        change_weapon(&mut ctx, p, WeaponKind::Sniper);
        assert_eq!(ctx.clients[0].pers.weapon, WeaponKind::Sniper);
        assert_eq!(ctx.clients[0].pers.last_weapon, WeaponKind::Pistol1);
        assert!(ctx.clients[0].fire_finished > ctx.level.time);
    }

    #[test]
    fn test_next_weapon_wraps() {
        let mut ctx = test_ctx();
        let p = armed(&mut ctx, WeaponKind::Sniper, 0);
        ctx.clients[0].pers.has_weapon[WeaponKind::Knife as usize] = true;
        next_weapon(&mut ctx, p);
        assert_eq!(ctx.clients[0].pers.weapon, WeaponKind::Knife);
        next_weapon(&mut ctx, p);
        assert_eq!(ctx.clients[0].pers.weapon, WeaponKind::Sniper);
    }

    // ============================================================
    // Firing
    // ============================================================

    #[test]
    fn test_fire_rate_is_limited() {
        let mut ctx = test_ctx();
        let p = armed(&mut ctx, WeaponKind::Pistol1, 0);
        hold(&mut ctx, p, BUTTON_ATTACK);
        hold(&mut ctx, p, BUTTON_ATTACK);
        assert_eq!(ctx.clients[0].pers.mag[WeaponKind::Pistol1 as usize], 8);

        wait(&mut ctx, 0.3);
        hold(&mut ctx, p, BUTTON_ATTACK);
        assert_eq!(ctx.clients[0].pers.mag[WeaponKind::Pistol1 as usize], 7);
    }

    #[test]
    fn test_shot_hits_monster_in_front() {
        let mut ctx = test_ctx();
        let p = armed(&mut ctx, WeaponKind::Sniper, 0);
        // level with the player's eye
        let m = make_monster(&mut ctx, [200.0, 0.0, 0.0], 300);
        hold(&mut ctx, p, BUTTON_ATTACK);
        assert!(ctx.edicts[m].health < 300);
    }

    #[test]
    fn test_empty_magazine_reloads_from_reserve() {
        let mut ctx = test_ctx();
        let p = armed(&mut ctx, WeaponKind::Pistol1, 20);
        ctx.clients[0].pers.mag[WeaponKind::Pistol1 as usize] = 0;

        hold(&mut ctx, p, BUTTON_ATTACK);
        assert!(ctx.clients[0].reload_finished > 0.0);

        wait(&mut ctx, 1.5);
        hold(&mut ctx, p, 0);
        let pers = &ctx.clients[0].pers;
        assert_eq!(pers.mag[WeaponKind::Pistol1 as usize], 9);
        assert_eq!(pers.ammo[AmmoKind::FortyFour as usize], 11);
    }

    #[test]
    fn test_no_reserve_dry_fires() {
        let mut ctx = test_ctx();
        let p = armed(&mut ctx, WeaponKind::Pistol1, 0);
        ctx.clients[0].pers.mag[WeaponKind::Pistol1 as usize] = 0;
        hold(&mut ctx, p, BUTTON_ATTACK);
        assert_eq!(ctx.clients[0].reload_finished, 0.0);
        assert!(ctx.clients[0].fire_finished > ctx.level.time);
    }

    #[test]
    fn test_jam_blocks_until_reload() {
        let mut ctx = test_ctx();
        let p = armed(&mut ctx, WeaponKind::MachineGun, 30);
        ctx.jam_chance = 1.0;
        hold(&mut ctx, p, BUTTON_ATTACK);
        assert!(ctx.clients[0].weapon_jammed);
        assert_eq!(ctx.clients[0].pers.mag[WeaponKind::MachineGun as usize], 30);

        ctx.jam_chance = 0.0;
        wait(&mut ctx, 1.0);
        hold(&mut ctx, p, BUTTON_ATTACK);
        assert_eq!(ctx.clients[0].pers.mag[WeaponKind::MachineGun as usize], 30);

        hold(&mut ctx, p, BUTTON_RELOAD);
        wait(&mut ctx, 1.5);
        hold(&mut ctx, p, 0);
        assert!(!ctx.clients[0].weapon_jammed);

        wait(&mut ctx, 0.1);
        hold(&mut ctx, p, BUTTON_ATTACK);
        assert_eq!(ctx.clients[0].pers.mag[WeaponKind::MachineGun as usize], 29);
    }

    #[test]
    fn test_rocket_spawns_projectile() {
        let mut ctx = test_ctx();
        let p = armed(&mut ctx, WeaponKind::Rocket, 3);
        hold(&mut ctx, p, BUTTON_ATTACK);
        assert_eq!(count(&ctx, "rocket"), 1);
        assert_eq!(ctx.clients[0].pers.mag[WeaponKind::Rocket as usize], 0);
    }

    #[test]
    fn test_medkit_heals_and_is_used_up() {
        let mut ctx = test_ctx();
        let p = armed(&mut ctx, WeaponKind::Pistol1, 0);
        ctx.clients[0].pers.has_weapon[WeaponKind::Medkit as usize] = true;
        change_weapon(&mut ctx, p, WeaponKind::Medkit);
        ctx.edicts[p].health = 40;

        wait(&mut ctx, 1.0);
        hold(&mut ctx, p, BUTTON_ATTACK);
        assert_eq!(ctx.edicts[p].health, 65);
        assert!(!ctx.clients[0].pers.has_weapon[WeaponKind::Medkit as usize]);
        assert_eq!(ctx.clients[0].pers.weapon, WeaponKind::Pistol1);
    }

    // ============================================================
    // Grenades
    // ============================================================

    #[test]
    fn test_released_grenade_is_thrown() {
        let mut ctx = test_ctx();
        let p = armed(&mut ctx, WeaponKind::Grenade, 2);
        hold(&mut ctx, p, BUTTON_ATTACK);
        assert!(ctx.clients[0].grenade_cook_start.is_some());

        wait(&mut ctx, 1.0);
        hold(&mut ctx, p, 0);
        assert_eq!(count(&ctx, "grenade"), 1);
        assert_eq!(ctx.clients[0].pers.ammo[AmmoKind::Grenades as usize], 1);
        let fuse = ctx
            .edicts
            .iter()
            .find(|e| e.inuse && e.classname == "grenade")
            .map(|g| g.nextthink - ctx.level.time);
        // a second of the three second fuse is already gone
        assert!(fuse.is_some_and(|f| (f - 2.0).abs() < 0.01), "{fuse:?}");
    }

    #[test]
    fn test_cooked_too_long_explodes_in_hand() {
        let mut ctx = test_ctx();
        let p = armed(&mut ctx, WeaponKind::Grenade, 1);
        hold(&mut ctx, p, BUTTON_ATTACK);
        let past_fuse = ctx.grenade_fuse + 0.1;
        wait(&mut ctx, past_fuse);
        hold(&mut ctx, p, BUTTON_ATTACK);
        assert!(ctx.edicts[p].health < 100);
        assert_eq!(count(&ctx, "grenade"), 0);
        assert_eq!(ctx.clients[0].pers.ammo[AmmoKind::Grenades as usize], 0);
    }

    #[test]
    fn test_c4_throws_on_press() {
        let mut ctx = test_ctx();
        let p = armed(&mut ctx, WeaponKind::C4, 1);
        hold(&mut ctx, p, BUTTON_ATTACK);
        assert_eq!(count(&ctx, "c4"), 1);
        assert!(ctx.clients[0].grenade_cook_start.is_none());
    }
}
