// g_weapon.rs — weapon table, hitscan resolution and projectiles

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
use serde::{Deserialize, Serialize};

use crate::dispatch::{ThinkKind, TouchKind};
use crate::g_combat::{t_damage, t_radius_damage};
use crate::g_error::GameResult;
use crate::g_local::*;
use crate::g_utils::{g_free_edict, g_spawn};
use crate::g_world::{link_entity, trace};
use crate::game_import::{DecalKind, EffectKind, ATTN_NORM, CHAN_AUTO, CHAN_WEAPON};

pub const WEAPON_KINDS: usize = 18;
pub const AMMO_KINDS: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(usize)]
pub enum WeaponKind {
    #[default]
    None = 0,
    Knife,
    Pistol1,
    Pistol2,
    Shotgun,
    MachineGun,
    Assault,
    Sniper,
    Slugger,
    Rocket,
    FlameGun,
    Mpg,
    MPistol,
    Grenade,
    C4,
    Medkit,
    Goggles,
    Fpak,
}

pub const ALL_WEAPONS: [WeaponKind; WEAPON_KINDS] = [
    WeaponKind::None,
    WeaponKind::Knife,
    WeaponKind::Pistol1,
    WeaponKind::Pistol2,
    WeaponKind::Shotgun,
    WeaponKind::MachineGun,
    WeaponKind::Assault,
    WeaponKind::Sniper,
    WeaponKind::Slugger,
    WeaponKind::Rocket,
    WeaponKind::FlameGun,
    WeaponKind::Mpg,
    WeaponKind::MPistol,
    WeaponKind::Grenade,
    WeaponKind::C4,
    WeaponKind::Medkit,
    WeaponKind::Goggles,
    WeaponKind::Fpak,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(usize)]
pub enum AmmoKind {
    #[default]
    None = 0,
    Nine,
    FortyFour,
    Shells,
    Auto,
    Sniper,
    Slug,
    Rockets,
    Fuel,
    Cells,
    Grenades,
    Charges,
}

pub const ALL_AMMO: [AmmoKind; AMMO_KINDS] = [
    AmmoKind::None,
    AmmoKind::Nine,
    AmmoKind::FortyFour,
    AmmoKind::Shells,
    AmmoKind::Auto,
    AmmoKind::Sniper,
    AmmoKind::Slug,
    AmmoKind::Rockets,
    AmmoKind::Fuel,
    AmmoKind::Cells,
    AmmoKind::Grenades,
    AmmoKind::Charges,
];

impl AmmoKind {
    /// Carry limit and the amount one pickup gives.
    pub fn limits(self) -> (i32, i32) {
        match self {
            AmmoKind::None => (0, 0),
            AmmoKind::Nine => (200, 30),
            AmmoKind::FortyFour => (72, 18),
            AmmoKind::Shells => (50, 16),
            AmmoKind::Auto => (180, 60),
            AmmoKind::Sniper => (30, 12),
            AmmoKind::Slug => (30, 10),
            AmmoKind::Rockets => (10, 3),
            AmmoKind::Fuel => (300, 100),
            AmmoKind::Cells => (100, 40),
            AmmoKind::Grenades => (10, 3),
            AmmoKind::Charges => (5, 2),
        }
    }

    pub fn from_classname(classname: &str) -> Option<Self> {
        let kind = match classname {
            "ammo_9mm" => AmmoKind::Nine,
            "ammo_44" => AmmoKind::FortyFour,
            "ammo_shells" => AmmoKind::Shells,
            "ammo_556" => AmmoKind::Auto,
            "ammo_sniper" => AmmoKind::Sniper,
            "ammo_slugs" => AmmoKind::Slug,
            "ammo_rockets" => AmmoKind::Rockets,
            "ammo_fuel" => AmmoKind::Fuel,
            "ammo_cells" => AmmoKind::Cells,
            "ammo_grenades" => AmmoKind::Grenades,
            "ammo_c4" => AmmoKind::Charges,
            _ => return None,
        };
        Some(kind)
    }
}

/// How a weapon discharges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireMode {
    None,
    Melee,
    Hitscan,
    Flame,
    Rocket,
    Throw,
    Heal(i32),
    Goggles,
}

#[derive(Debug, Clone, Copy)]
pub struct WeaponInfo {
    pub kind: WeaponKind,
    pub classname: &'static str,
    pub damage: i32,
    /// Seconds between shots.
    pub fire_interval: f32,
    /// 0 means no magazine (melee and utility items).
    pub mag_size: i32,
    pub ammo: AmmoKind,
    pub spread: f32,
    pub range: f32,
    pub pellets: i32,
    /// No distance falloff.
    pub precision: bool,
    pub armor_piercing: bool,
    pub penetrates: bool,
    pub reload_time: f32,
    pub mode: FireMode,
}

const fn weapon(
    kind: WeaponKind,
    classname: &'static str,
    damage: i32,
    fire_interval: f32,
    mag_size: i32,
    ammo: AmmoKind,
    spread: f32,
    range: f32,
    mode: FireMode,
) -> WeaponInfo {
    WeaponInfo {
        kind,
        classname,
        damage,
        fire_interval,
        mag_size,
        ammo,
        spread,
        range,
        pellets: 1,
        precision: false,
        armor_piercing: false,
        penetrates: false,
        reload_time: 1.5,
        mode,
    }
}

static WEAPON_TABLE: [WeaponInfo; WEAPON_KINDS] = [
    weapon(WeaponKind::None, "", 0, 0.0, 0, AmmoKind::None, 0.0, 0.0, FireMode::None),
    weapon(WeaponKind::Knife, "weapon_knife", 30, 0.4, 0, AmmoKind::None, 0.0, 64.0, FireMode::Melee),
    weapon(WeaponKind::Pistol1, "weapon_pistol1", 40, 0.3, 9, AmmoKind::FortyFour, 0.02, 4096.0, FireMode::Hitscan),
    weapon(WeaponKind::Pistol2, "weapon_pistol2", 25, 0.15, 15, AmmoKind::Nine, 0.03, 4096.0, FireMode::Hitscan),
    WeaponInfo {
        pellets: 8,
        ..weapon(WeaponKind::Shotgun, "weapon_shotgun", 80, 0.8, 8, AmmoKind::Shells, 0.12, 1024.0, FireMode::Hitscan)
    },
    weapon(WeaponKind::MachineGun, "weapon_machinegun", 15, 0.1, 30, AmmoKind::Nine, 0.06, 4096.0, FireMode::Hitscan),
    WeaponInfo {
        penetrates: true,
        ..weapon(WeaponKind::Assault, "weapon_assault", 20, 0.1, 30, AmmoKind::Auto, 0.05, 4096.0, FireMode::Hitscan)
    },
    WeaponInfo {
        precision: true,
        armor_piercing: true,
        penetrates: true,
        reload_time: 2.0,
        ..weapon(WeaponKind::Sniper, "weapon_sniper", 90, 1.0, 6, AmmoKind::Sniper, 0.0, 8192.0, FireMode::Hitscan)
    },
    WeaponInfo {
        armor_piercing: true,
        penetrates: true,
        ..weapon(WeaponKind::Slugger, "weapon_slugger", 60, 0.5, 5, AmmoKind::Slug, 0.01, 4096.0, FireMode::Hitscan)
    },
    WeaponInfo {
        reload_time: 2.0,
        ..weapon(WeaponKind::Rocket, "weapon_rocket", 120, 0.8, 1, AmmoKind::Rockets, 0.0, 8192.0, FireMode::Rocket)
    },
    weapon(WeaponKind::FlameGun, "weapon_flamegun", 10, 0.05, 100, AmmoKind::Fuel, 0.1, 256.0, FireMode::Flame),
    WeaponInfo {
        armor_piercing: true,
        ..weapon(WeaponKind::Mpg, "weapon_mpg", 50, 0.4, 20, AmmoKind::Cells, 0.0, 2048.0, FireMode::Hitscan)
    },
    weapon(WeaponKind::MPistol, "weapon_mpistol", 12, 0.08, 30, AmmoKind::Nine, 0.08, 2048.0, FireMode::Hitscan),
    weapon(WeaponKind::Grenade, "weapon_grenade", 100, 1.0, 1, AmmoKind::Grenades, 0.0, 0.0, FireMode::Throw),
    weapon(WeaponKind::C4, "weapon_c4", 150, 1.0, 1, AmmoKind::Charges, 0.0, 0.0, FireMode::Throw),
    weapon(WeaponKind::Medkit, "weapon_medkit", 0, 1.0, 0, AmmoKind::None, 0.0, 0.0, FireMode::Heal(25)),
    weapon(WeaponKind::Goggles, "weapon_goggles", 0, 0.5, 0, AmmoKind::None, 0.0, 0.0, FireMode::Goggles),
    weapon(WeaponKind::Fpak, "weapon_fpak", 0, 1.0, 0, AmmoKind::None, 0.0, 0.0, FireMode::Heal(50)),
];

impl WeaponKind {
    pub fn info(self) -> &'static WeaponInfo {
        &WEAPON_TABLE[self as usize]
    }

    pub fn from_classname(classname: &str) -> Option<Self> {
        ALL_WEAPONS
            .iter()
            .copied()
            .find(|w| *w != WeaponKind::None && w.info().classname == classname)
    }
}

// projectile tuning
pub const ROCKET_SPEED: f32 = 650.0;
pub const ROCKET_RADIUS: f32 = 160.0;
pub const GRENADE_SPEED: f32 = 600.0;
pub const GRENADE_RADIUS: f32 = 180.0;
pub const C4_TIMER: f32 = 5.0;

/// Ricochets and penetrations stop after this many sub-traces.
pub const MAX_SUBTRACE_DEPTH: u32 = 2;
/// Units a penetrating round travels through a thin surface.
const PENETRATION_DEPTH: f32 = 16.0;
/// Falloff reaches its floor at max range.
const FALLOFF_FLOOR: f32 = 0.5;
/// Fraction of max range with no falloff at all.
const FALLOFF_NEAR: f32 = 0.25;

// ============================================================
// Hitscan
// ============================================================

#[derive(Debug, Clone, Copy)]
pub struct HitscanShot {
    pub start: Vec3,
    pub dir: Vec3,
    pub range: f32,
    pub damage: i32,
    pub kick: i32,
    pub weapon: WeaponKind,
    pub precision: bool,
    pub armor_piercing: bool,
    pub penetrates: bool,
    pub ricochets: bool,
}

impl HitscanShot {
    pub fn from_weapon(info: &WeaponInfo, start: Vec3, dir: Vec3, damage: i32) -> Self {
        Self {
            start,
            dir,
            range: info.range,
            damage,
            kick: damage / 2,
            weapon: info.kind,
            precision: info.precision,
            armor_piercing: info.armor_piercing,
            penetrates: info.penetrates,
            ricochets: info.mode == FireMode::Hitscan,
        }
    }
}

/// Damage scale for a hit `dist` units out on a weapon with `range`.
pub fn distance_falloff(dist: f32, range: f32) -> f32 {
    let near = range * FALLOFF_NEAR;
    if dist <= near || range <= near {
        return 1.0;
    }
    let t = ((dist - near) / (range - near)).clamp(0.0, 1.0);
    1.0 - (1.0 - FALLOFF_FLOOR) * t
}

/// Apply a random cone of `spread` (radians-ish, scaled by the aim vectors)
/// around `dir`.
pub fn apply_spread(ctx: &mut GameCtx, dir: &Vec3, spread: f32) -> Vec3 {
    if spread <= 0.0 {
        return *dir;
    }
    let angles = vectoangles(dir);
    let (forward, right, up) = angle_vectors_tuple(&angles);
    let r = ctx.crandom() * spread;
    let u = ctx.crandom() * spread;
    let mut out = vector_ma(&forward, r, &right);
    out = vector_ma(&out, u, &up);
    vector_normalize(&mut out);
    out
}

/// Resolve one hitscan shot from `attacker`.
pub fn fire_hitscan(ctx: &mut GameCtx, attacker: usize, shot: &HitscanShot) -> GameResult<()> {
    hitscan_segment(ctx, attacker, shot, attacker as i32, 0.0, 0)
}

fn hitscan_segment(
    ctx: &mut GameCtx,
    attacker: usize,
    shot: &HitscanShot,
    passent: i32,
    travelled: f32,
    depth: u32,
) -> GameResult<()> {
    let range_left = shot.range - travelled;
    if range_left <= 0.0 || shot.damage <= 0 {
        return Ok(());
    }

    let end = vector_ma(&shot.start, range_left, &shot.dir);
    let tr = trace(ctx, &shot.start, &VEC3_ORIGIN, &VEC3_ORIGIN, &end, passent, MASK_SHOT);
    ctx.gi.add_tracer(&shot.start, &tr.endpos, &[1.0, 0.9, 0.6]);

    if !tr.hit_something() {
        return Ok(());
    }

    let dist = travelled + tr.fraction * range_left;
    let hit = tr.ent_index;

    if hit > 0 && ctx.edicts[hit as usize].takedamage != Damage::No {
        let falloff = if shot.precision {
            1.0
        } else {
            distance_falloff(dist, shot.range)
        };
        let damage = (shot.damage as f32 * falloff) as i32;

        let mut dflags = DamageFlags::BULLET;
        if shot.armor_piercing {
            dflags |= DamageFlags::ARMOR_PIERCING;
        }
        let mod_ = if shot.weapon == WeaponKind::Knife {
            MeansOfDeath::Melee
        } else {
            MeansOfDeath::Weapon(shot.weapon)
        };
        t_damage(
            ctx,
            hit as usize,
            attacker,
            attacker,
            &shot.dir,
            &tr.endpos,
            &tr.plane.normal,
            damage,
            shot.kick,
            dflags,
            mod_,
        )?;
        ctx.gi.spawn_particle_effect(&tr.endpos, &tr.plane.normal, EffectKind::Blood, 8);
        return Ok(());
    }

    // struck a surface
    ctx.gi.spawn_particle_effect(&tr.endpos, &tr.plane.normal, EffectKind::Sparks, 4);
    ctx.gi.add_decal(&tr.endpos, &tr.plane.normal, DecalKind::BulletHole);

    if depth >= MAX_SUBTRACE_DEPTH {
        return Ok(());
    }

    let flags = tr.surface_flags();
    if shot.ricochets && flags & SURF_METAL != 0 {
        let n = tr.plane.normal;
        let d = dot_product(&shot.dir, &n);
        let mut dir = vector_ma(&shot.dir, -2.0 * d, &n);
        vector_normalize(&mut dir);
        ctx.gi.spawn_particle_effect(&tr.endpos, &n, EffectKind::Ricochet, 2);
        let sub = HitscanShot {
            start: vector_ma(&tr.endpos, 1.0, &n),
            dir,
            damage: shot.damage / 2,
            kick: shot.kick / 2,
            ..*shot
        };
        debug!("ricochet depth {} dmg {}", depth + 1, sub.damage);
        return hitscan_segment(ctx, attacker, &sub, -1, dist, depth + 1);
    }

    if shot.penetrates && flags & SURF_THIN != 0 {
        let sub = HitscanShot {
            start: vector_ma(&tr.endpos, PENETRATION_DEPTH, &shot.dir),
            damage: shot.damage / 3,
            kick: shot.kick / 3,
            ..*shot
        };
        debug!("penetration depth {} dmg {}", depth + 1, sub.damage);
        return hitscan_segment(ctx, attacker, &sub, -1, dist + PENETRATION_DEPTH, depth + 1);
    }

    Ok(())
}

/// Fire every pellet of a weapon, splitting its damage evenly.
pub fn fire_weapon_pellets(
    ctx: &mut GameCtx,
    attacker: usize,
    info: &WeaponInfo,
    start: &Vec3,
    aim: &Vec3,
    spread_scale: f32,
) -> GameResult<()> {
    let pellets = info.pellets.max(1);
    let per = (info.damage / pellets).max(1);
    for _ in 0..pellets {
        let dir = apply_spread(ctx, aim, info.spread * spread_scale);
        let mut shot = HitscanShot::from_weapon(info, *start, dir, per);
        if info.mode == FireMode::Melee {
            shot.ricochets = false;
        }
        fire_hitscan(ctx, attacker, &shot)?;
    }
    Ok(())
}

// ============================================================
// Projectiles
// ============================================================

pub fn fire_rocket(
    ctx: &mut GameCtx,
    owner: usize,
    start: &Vec3,
    dir: &Vec3,
    damage: i32,
    speed: f32,
    radius: f32,
) -> GameResult<usize> {
    let idx = g_spawn(ctx)?;
    let time = ctx.level.time;
    let modelindex = ctx.configstrings.model_index("models/objects/rocket.ghb");

    let rocket = &mut ctx.edicts[idx];
    rocket.classname = "rocket".to_string();
    rocket.s.origin = *start;
    rocket.s.angles = vectoangles(dir);
    rocket.movedir = *dir;
    rocket.velocity = vector_scale(dir, speed);
    rocket.movetype = MoveType::FlyMissile;
    rocket.clipmask = MASK_SHOT;
    rocket.solid = Solid::Bbox;
    rocket.svflags |= SVF_PROJECTILE;
    rocket.mins = [0.0; 3];
    rocket.maxs = [0.0; 3];
    rocket.s.modelindex = modelindex;
    rocket.owner = owner as i32;
    rocket.touch = Some(TouchKind::Rocket);
    rocket.think = Some(ThinkKind::FreeEdict);
    rocket.nextthink = time + 8000.0 / speed.max(1.0);
    rocket.dmg = damage;
    rocket.dmg_radius = radius;
    rocket.weapon = WeaponKind::Rocket;

    link_entity(ctx, idx);
    Ok(idx)
}

/// Spawn a bouncing grenade or charge with a fuse of `timer` seconds.
pub fn fire_grenade(
    ctx: &mut GameCtx,
    owner: usize,
    start: &Vec3,
    velocity: &Vec3,
    damage: i32,
    timer: f32,
    radius: f32,
    kind: WeaponKind,
) -> GameResult<usize> {
    let idx = g_spawn(ctx)?;
    let time = ctx.level.time;
    let model = if kind == WeaponKind::C4 {
        "models/objects/c4.ghb"
    } else {
        "models/objects/grenade.ghb"
    };
    let modelindex = ctx.configstrings.model_index(model);
    let spin = [300.0 * ctx.crandom(), 300.0 * ctx.crandom(), 300.0 * ctx.crandom()];

    let g = &mut ctx.edicts[idx];
    g.classname = if kind == WeaponKind::C4 { "c4" } else { "grenade" }.to_string();
    g.s.origin = *start;
    g.velocity = *velocity;
    g.avelocity = spin;
    g.movetype = MoveType::Bounce;
    g.clipmask = MASK_SHOT;
    g.solid = Solid::Bbox;
    g.svflags |= SVF_PROJECTILE;
    g.mins = [-2.0; 3];
    g.maxs = [2.0; 3];
    g.s.modelindex = modelindex;
    g.owner = owner as i32;
    g.touch = Some(TouchKind::Grenade);
    g.think = Some(ThinkKind::GrenadeExplode);
    g.nextthink = time + timer.max(FRAMETIME);
    g.dmg = damage;
    g.dmg_radius = radius;
    g.weapon = kind;

    link_entity(ctx, idx);
    Ok(idx)
}

/// Launch velocity for a lob from `from` to `to`. Horizontal speed is fixed;
/// the vertical component is solved from the flight time.
pub fn ballistic_velocity(from: &Vec3, to: &Vec3, horizontal_speed: f32, gravity: f32) -> Vec3 {
    let mut flat = [to[0] - from[0], to[1] - from[1], 0.0];
    let horiz = vector_normalize(&mut flat);
    let t = (horiz / horizontal_speed.max(1.0)).max(0.1);
    let dz = to[2] - from[2];
    let vz = (dz + 0.5 * gravity * t * t) / t;
    [flat[0] * horizontal_speed, flat[1] * horizontal_speed, vz]
}

pub fn rocket_touch(ctx: &mut GameCtx, self_idx: usize, other: usize, plane: Option<&CPlane>, surf_flags: i32) -> GameResult<()> {
    if other as i32 == ctx.edicts[self_idx].owner {
        return Ok(());
    }
    if surf_flags & SURF_SKY != 0 {
        g_free_edict(ctx, self_idx);
        return Ok(());
    }

    let owner = ctx.live_index(ctx.edicts[self_idx].owner).unwrap_or(self_idx);
    let origin = ctx.edicts[self_idx].s.origin;
    let normal = plane.map_or(VEC3_ORIGIN, |p| p.normal);
    let dmg = ctx.edicts[self_idx].dmg;

    if other != 0 && ctx.edicts[other].takedamage != Damage::No {
        let dir = ctx.edicts[self_idx].velocity;
        t_damage(
            ctx,
            other,
            self_idx,
            owner,
            &vector_normalized(&dir),
            &origin,
            &normal,
            dmg,
            0,
            DamageFlags::empty(),
            MeansOfDeath::Weapon(WeaponKind::Rocket),
        )?;
    }

    explode(ctx, self_idx, owner, Some(other))
}

pub fn grenade_touch(ctx: &mut GameCtx, self_idx: usize, other: usize) -> GameResult<()> {
    if other as i32 == ctx.edicts[self_idx].owner {
        return Ok(());
    }

    let takes_damage = other != 0 && ctx.edicts[other].takedamage != Damage::No;
    if !takes_damage || ctx.edicts[self_idx].weapon == WeaponKind::C4 {
        let snd = ctx.configstrings.sound_index("weapons/grenade_bounce.wav");
        ctx.gi.play_sound(self_idx as i32, CHAN_AUTO, snd, 1.0, ATTN_NORM, 0.0);
        return Ok(());
    }

    ctx.edicts[self_idx].enemy = Some(ctx.handle_of(other));
    grenade_explode(ctx, self_idx)
}

pub fn grenade_explode(ctx: &mut GameCtx, self_idx: usize) -> GameResult<()> {
    let owner = ctx.live_index(ctx.edicts[self_idx].owner).unwrap_or(self_idx);
    let kind = ctx.edicts[self_idx].weapon;

    // direct hit on whatever we touched
    let direct = ctx.resolve_opt(ctx.edicts[self_idx].enemy);
    if let Some(enemy) = direct {
        let origin = ctx.edicts[self_idx].s.origin;
        let center = vector_ma(&ctx.edicts[enemy].s.origin, 0.5, &vector_add(&ctx.edicts[enemy].mins, &ctx.edicts[enemy].maxs));
        let v = vector_subtract(&origin, &center);
        let points = (ctx.edicts[self_idx].dmg as f32 - 0.5 * vector_length(&v)) as i32;
        let dir = vector_normalized(&vector_subtract(&center, &origin));
        if points > 0 {
            t_damage(
                ctx,
                enemy,
                self_idx,
                owner,
                &dir,
                &origin,
                &VEC3_ORIGIN,
                points,
                points,
                DamageFlags::RADIUS,
                MeansOfDeath::Weapon(kind),
            )?;
        }
    }

    explode(ctx, self_idx, owner, direct)
}

/// Detonate a grenade the player held past its fuse.
pub fn explode_in_hand(ctx: &mut GameCtx, player: usize, damage: i32) -> GameResult<()> {
    let origin = ctx.edicts[player].s.origin;
    let idx = fire_grenade(ctx, player, &origin, &VEC3_ORIGIN, damage, 0.0, GRENADE_RADIUS, WeaponKind::Grenade)?;
    ctx.edicts[idx].solid = Solid::Not;
    link_entity(ctx, idx);
    radius_blast(ctx, idx, player, None, MeansOfDeath::HeldGrenade)?;
    g_free_edict(ctx, idx);
    Ok(())
}

fn explode(ctx: &mut GameCtx, self_idx: usize, owner: usize, ignore: Option<usize>) -> GameResult<()> {
    let kind = ctx.edicts[self_idx].weapon;
    radius_blast(ctx, self_idx, owner, ignore, MeansOfDeath::Splash(kind))?;
    g_free_edict(ctx, self_idx);
    Ok(())
}

fn radius_blast(ctx: &mut GameCtx, self_idx: usize, owner: usize, ignore: Option<usize>, mod_: MeansOfDeath) -> GameResult<()> {
    let origin = ctx.edicts[self_idx].s.origin;
    let dmg = ctx.edicts[self_idx].dmg as f32;
    let radius = ctx.edicts[self_idx].dmg_radius;

    t_radius_damage(ctx, self_idx, owner, dmg, ignore, radius, mod_)?;

    ctx.gi.spawn_particle_effect(&origin, &[0.0, 0.0, 1.0], EffectKind::Explosion, 1);
    ctx.gi.add_dynamic_light(&origin, &[1.0, 0.6, 0.2], 300.0, 0.5);
    ctx.gi.add_decal(&origin, &[0.0, 0.0, 1.0], DecalKind::Scorch);
    let snd = ctx.configstrings.sound_index("weapons/explode.wav");
    ctx.gi.play_positioned_sound(&origin, self_idx as i32, CHAN_WEAPON, snd, 1.0, ATTN_NORM, 0.0);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::g_utils::test_support::{make_monster, test_ctx};
    use sofsim_common::cmodel::Brush;

    // ============================================================
    // Table
    // ============================================================

    #[test]
    fn test_weapon_table_order_matches_enum() {
        for (i, w) in ALL_WEAPONS.iter().enumerate() {
            assert_eq!(w.info().kind, *w, "slot {}", i);
        }
        for (i, a) in ALL_AMMO.iter().enumerate() {
            assert_eq!(*a as usize, i);
        }
    }

    #[test]
    fn test_classic_damage_values() {
        assert_eq!(WeaponKind::Knife.info().damage, 30);
        assert_eq!(WeaponKind::Shotgun.info().pellets, 8);
        assert_eq!(WeaponKind::Sniper.info().fire_interval, 1.0);
        assert!(WeaponKind::Sniper.info().precision);
        assert_eq!(WeaponKind::from_classname("weapon_rocket"), Some(WeaponKind::Rocket));
        assert_eq!(WeaponKind::from_classname("weapon_bogus"), None);
        assert_eq!(AmmoKind::from_classname("ammo_shells"), Some(AmmoKind::Shells));
    }

    #[test]
    fn test_falloff_curve() {
        assert_eq!(distance_falloff(100.0, 4096.0), 1.0);
        assert_eq!(distance_falloff(1024.0, 4096.0), 1.0);
        assert!((distance_falloff(4096.0, 4096.0) - 0.5).abs() < 1e-5);
        let mid = distance_falloff(2560.0, 4096.0);
        assert!(mid > 0.5 && mid < 1.0);
    }

    #[test]
    fn test_ballistic_lands_on_target() {
        let from = [0.0, 0.0, 0.0];
        let to = [400.0, 0.0, 50.0];
        let v = ballistic_velocity(&from, &to, 400.0, 800.0);
        assert!((v[0] - 400.0).abs() < 1e-3);
        // after t = 1s: z = vz - 400
        assert!((v[2] - 800.0 * 0.5 - 50.0).abs() < 1e-3);
    }

    // ============================================================
    // Hitscan
    // ============================================================

    fn shot_at(target: Vec3, damage: i32) -> HitscanShot {
        let start = [200.0, 0.0, target[2]];
        let dir = vector_normalized(&vector_subtract(&target, &start));
        HitscanShot {
            start,
            dir,
            range: 4096.0,
            damage,
            kick: 0,
            weapon: WeaponKind::Pistol2,
            precision: false,
            armor_piercing: false,
            penetrates: false,
            ricochets: true,
        }
    }

    #[test]
    fn test_scenario_a_hitscan_unarmored_torso() {
        let mut ctx = test_ctx();
        let victim = make_monster(&mut ctx, [0.0, 0.0, 0.0], 100);
        let attacker = make_monster(&mut ctx, [400.0, 0.0, 0.0], 100);
        fire_hitscan(&mut ctx, attacker, &shot_at([0.0, 0.0, 10.0], 20)).unwrap();
        assert_eq!(ctx.edicts[victim].health, 80);
        let gore = ctx.edicts[victim].gore.as_ref().unwrap();
        assert_eq!(gore.severed_count(), 0);
        assert_eq!(gore.damage_of(crate::g_gore::GoreZone::Stomach), 20);
    }

    #[test]
    fn test_scenario_b_headshot() {
        let mut ctx = test_ctx();
        let victim = make_monster(&mut ctx, [0.0, 0.0, 0.0], 100);
        let attacker = make_monster(&mut ctx, [400.0, 0.0, 0.0], 100);
        fire_hitscan(&mut ctx, attacker, &shot_at([0.0, 0.0, 29.0], 20)).unwrap();
        assert_eq!(ctx.edicts[victim].health, 40);
        assert_eq!(ctx.edicts[victim].deadflag, DeadFlag::No);
    }

    #[test]
    fn test_ricochet_off_metal_reaches_victim() {
        let mut ctx = test_ctx();
        // metal wall at x = -64..-56 facing +x
        ctx.world.add_brush(
            Brush::solid([-64.0, -256.0, -64.0], [-56.0, 256.0, 128.0]).with_surface("metal", SURF_METAL),
        );
        // facing back along the bounced path so the round lands on the stomach
        let victim = make_monster(&mut ctx, [0.0, -88.0, 0.0], 100);
        ctx.edicts[victim].s.angles[YAW] = 225.0;
        let attacker = make_monster(&mut ctx, [400.0, 0.0, 0.0], 100);
        // fire toward the wall at 45 degrees so it bounces toward +x +y
        let start = [0.0, -200.0, 10.0];
        let mut dir = [-1.0, 1.0, 0.0];
        vector_normalize(&mut dir);
        let shot = HitscanShot { start, dir, ..shot_at([0.0, 0.0, 10.0], 40) };
        fire_hitscan(&mut ctx, attacker, &shot).unwrap();
        // half damage after one bounce
        assert_eq!(ctx.edicts[victim].health, 80);
    }

    #[test]
    fn test_penetration_through_thin_wall() {
        let mut ctx = test_ctx();
        ctx.world.add_brush(Brush::solid([100.0, -64.0, -64.0], [104.0, 64.0, 128.0]).with_surface("wood", SURF_THIN));
        let victim = make_monster(&mut ctx, [0.0, 0.0, 0.0], 100);
        let attacker = make_monster(&mut ctx, [400.0, 0.0, 0.0], 100);
        let shot = HitscanShot { penetrates: true, ..shot_at([0.0, 0.0, 10.0], 60) };
        fire_hitscan(&mut ctx, attacker, &shot).unwrap();
        assert_eq!(ctx.edicts[victim].health, 80);

        // without penetration the wall stops it
        let victim2 = make_monster(&mut ctx, [0.0, 0.0, 0.0], 100);
        ctx.edicts[victim].solid = Solid::Not;
        crate::g_world::link_entity(&mut ctx, victim);
        fire_hitscan(&mut ctx, attacker, &shot_at([0.0, 0.0, 10.0], 60)).unwrap();
        assert_eq!(ctx.edicts[victim2].health, 100);
    }

    // ============================================================
    // Projectiles
    // ============================================================

    #[test]
    fn test_grenade_explodes_on_schedule() {
        let mut ctx = test_ctx();
        let victim = make_monster(&mut ctx, [0.0, 0.0, 0.0], 200);
        let owner = make_monster(&mut ctx, [1000.0, 0.0, 0.0], 100);
        let g = fire_grenade(&mut ctx, owner, &[60.0, 0.0, 0.0], &VEC3_ORIGIN, 100, 0.3, GRENADE_RADIUS, WeaponKind::Grenade).unwrap();
        assert_eq!(ctx.edicts[g].think, Some(ThinkKind::GrenadeExplode));
        grenade_explode(&mut ctx, g).unwrap();
        assert!(!ctx.edicts[g].inuse);
        assert!(ctx.edicts[victim].health < 200);
    }
}
