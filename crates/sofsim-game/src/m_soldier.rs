// m_soldier.rs — humanoid monster classes and their attacks

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

use serde::{Deserialize, Serialize};

use crate::g_combat::t_damage;
use crate::g_error::GameResult;
use crate::g_local::*;
use crate::g_utils::g_project_source;
use crate::g_weapon::{apply_spread, fire_hitscan, HitscanShot, WeaponKind};
use crate::game_import::{ATTN_NORM, CHAN_WEAPON};

bitflags::bitflags! {
    /// Behavior switches looked up once per class.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct ClassFlags: u32 {
        const GRENADES      = 0x01;
        const DODGE         = 0x02;
        const STAND_GROUND  = 0x04;
        const PRECISE       = 0x08;
        const LEADER        = 0x10;
        const LOW_TOUGHNESS = 0x20;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MonsterClass {
    #[default]
    Soldier,
    SoldierLight,
    SoldierSs,
    Guard,
    Sniper,
    Boss,
    Medic,
}

pub const ALL_CLASSES: [MonsterClass; 7] = [
    MonsterClass::Soldier,
    MonsterClass::SoldierLight,
    MonsterClass::SoldierSs,
    MonsterClass::Guard,
    MonsterClass::Sniper,
    MonsterClass::Boss,
    MonsterClass::Medic,
];

#[derive(Debug, Clone, Copy)]
pub struct MonsterClassInfo {
    pub classname: &'static str,
    pub health: i32,
    pub damage: i32,
    pub speed: f32,
    pub sight: f32,
    pub yaw_speed: f32,
    pub accuracy: f32,
    /// Health fraction below which the class retreats. 0 never flees.
    pub flee_fraction: f32,
    pub weapon: WeaponKind,
    pub flags: ClassFlags,
}

// AI tuning shared by every class
pub const ATTACK_RANGE: f32 = 512.0;
pub const ATTACK_INTERVAL: f32 = 1.0;
pub const MELEE_INTERVAL: f32 = 0.8;
pub const MELEE_DAMAGE_SCALE: f32 = 1.5;

static CLASS_TABLE: [MonsterClassInfo; 7] = [
    MonsterClassInfo {
        classname: "monster_soldier",
        health: 100,
        damage: 10,
        speed: 200.0,
        sight: 1024.0,
        yaw_speed: 20.0,
        accuracy: 0.7,
        flee_fraction: 0.2,
        weapon: WeaponKind::MachineGun,
        flags: ClassFlags::empty(),
    },
    MonsterClassInfo {
        classname: "monster_soldier_light",
        health: 60,
        damage: 8,
        speed: 160.0,
        sight: 1024.0,
        yaw_speed: 20.0,
        accuracy: 0.6,
        flee_fraction: 0.3,
        weapon: WeaponKind::Pistol2,
        flags: ClassFlags::empty(),
    },
    MonsterClassInfo {
        classname: "monster_soldier_ss",
        health: 150,
        damage: 15,
        speed: 240.0,
        sight: 1024.0,
        yaw_speed: 20.0,
        accuracy: 0.8,
        flee_fraction: 0.15,
        weapon: WeaponKind::Assault,
        flags: ClassFlags::GRENADES.union(ClassFlags::DODGE),
    },
    MonsterClassInfo {
        classname: "monster_guard",
        health: 200,
        damage: 20,
        speed: 120.0,
        sight: 1024.0,
        yaw_speed: 20.0,
        accuracy: 0.7,
        flee_fraction: 0.0,
        weapon: WeaponKind::Shotgun,
        flags: ClassFlags::STAND_GROUND,
    },
    MonsterClassInfo {
        classname: "monster_sniper",
        health: 80,
        damage: 40,
        speed: 120.0,
        sight: 2048.0,
        yaw_speed: 20.0,
        accuracy: 0.95,
        flee_fraction: 0.25,
        weapon: WeaponKind::Sniper,
        flags: ClassFlags::STAND_GROUND.union(ClassFlags::PRECISE),
    },
    MonsterClassInfo {
        classname: "monster_boss",
        health: 500,
        damage: 30,
        speed: 100.0,
        sight: 1024.0,
        yaw_speed: 15.0,
        accuracy: 0.8,
        flee_fraction: 0.0,
        weapon: WeaponKind::Mpg,
        flags: ClassFlags::LEADER,
    },
    MonsterClassInfo {
        classname: "monster_medic",
        health: 80,
        damage: 6,
        speed: 180.0,
        sight: 1024.0,
        yaw_speed: 20.0,
        accuracy: 0.5,
        flee_fraction: 0.4,
        weapon: WeaponKind::Pistol1,
        flags: ClassFlags::LOW_TOUGHNESS,
    },
];

impl MonsterClass {
    pub fn info(self) -> &'static MonsterClassInfo {
        &CLASS_TABLE[self as usize]
    }

    pub fn flags(self) -> ClassFlags {
        self.info().flags
    }

    pub fn from_classname(classname: &str) -> Option<Self> {
        ALL_CLASSES.iter().copied().find(|c| c.info().classname == classname)
    }

    /// Copy the class data onto a freshly spawned entity.
    pub fn apply(self, e: &mut Edict) {
        let info = self.info();

        e.svflags |= SVF_MONSTER;
        e.solid = Solid::Bbox;
        e.movetype = MoveType::Step;
        e.clipmask = MASK_MONSTERSOLID;
        e.takedamage = Damage::Aim;
        e.mins = [-16.0, -16.0, -24.0];
        e.maxs = [16.0, 16.0, 32.0];
        e.mass = 200;
        e.yaw_speed = info.yaw_speed;
        e.weapon = info.weapon;
        e.deadflag = DeadFlag::No;

        if e.health <= 0 {
            e.health = info.health;
        }
        e.max_health = e.health;
        if e.gib_health == 0 {
            e.gib_health = -40;
        }

        let mi = &mut e.monsterinfo;
        mi.class = self;
        mi.ai_state = AiState::Idle;
        mi.tier = if info.flags.contains(ClassFlags::LOW_TOUGHNESS) {
            Toughness::Low
        } else {
            Toughness::from_max_health(e.max_health)
        };
        mi.damage = info.damage;
        mi.run_speed = info.speed;
        mi.sight_range = info.sight;
        mi.attack_range = ATTACK_RANGE;
        mi.melee_range = MELEE_DISTANCE;
        mi.accuracy = info.accuracy;
        mi.flee_health = info.flee_fraction;
        mi.flank_side = if e.s.number % 2 == 0 { 1.0 } else { -1.0 };
        if info.flags.contains(ClassFlags::STAND_GROUND) {
            mi.aiflags |= AiFlags::STAND_GROUND;
        }
    }
}

// ============================================================
// Attacks
// ============================================================

/// Point a monster aims at on its target: chest height.
pub fn aim_point(ctx: &GameCtx, target: usize) -> Vec3 {
    let t = &ctx.edicts[target];
    let mut p = t.s.origin;
    p[2] += (t.mins[2] + t.maxs[2]) * 0.5 + 4.0;
    p
}

/// Muzzle position from a monster's facing.
pub fn muzzle(ctx: &GameCtx, self_idx: usize) -> Vec3 {
    let e = &ctx.edicts[self_idx];
    let (forward, right, _) = angle_vectors_tuple(&e.s.angles);
    g_project_source(&e.s.origin, &[16.0, 6.0, e.maxs[2] - 8.0], &forward, &right)
}

/// Fire the class weapon at `target_point`. `spread_scale` widens the
/// class's natural inaccuracy, used for blind fire.
pub fn monster_fire(ctx: &mut GameCtx, self_idx: usize, target_point: &Vec3, spread_scale: f32) -> GameResult<()> {
    let (class, weapon, damage, accuracy) = {
        let e = &ctx.edicts[self_idx];
        (e.monsterinfo.class, e.weapon, e.monsterinfo.damage, e.monsterinfo.accuracy)
    };
    let info = weapon.info();
    let start = muzzle(ctx, self_idx);
    let mut aim = vector_subtract(target_point, &start);
    vector_normalize(&mut aim);

    let spread = (1.0 - accuracy).max(0.0) * 0.2 * spread_scale;
    let pellets = info.pellets.max(1);
    let per = (damage / pellets).max(1);
    for _ in 0..pellets {
        let dir = apply_spread(ctx, &aim, spread + info.spread * 0.5);
        let mut shot = HitscanShot::from_weapon(info, start, dir, per);
        shot.precision |= class.flags().contains(ClassFlags::PRECISE);
        fire_hitscan(ctx, self_idx, &shot)?;
        if !ctx.edicts[self_idx].inuse {
            break;
        }
    }

    let snd = ctx.configstrings.sound_index(&format!("soldier/{}.wav", info.classname));
    ctx.gi.play_sound(self_idx as i32, CHAN_WEAPON, snd, 1.0, ATTN_NORM, 0.0);
    Ok(())
}

/// Ranged attack on the current enemy.
pub fn monster_attack(ctx: &mut GameCtx, self_idx: usize, enemy: usize) -> GameResult<()> {
    let target = aim_point(ctx, enemy);
    monster_fire(ctx, self_idx, &target, 1.0)?;
    let time = ctx.level.time;
    ctx.edicts[self_idx].monsterinfo.attack_finished = time + ATTACK_INTERVAL;
    Ok(())
}

/// Close-range strike. Only lands if the enemy is within melee range.
pub fn monster_melee(ctx: &mut GameCtx, self_idx: usize, enemy: usize) -> GameResult<()> {
    let time = ctx.level.time;
    ctx.edicts[self_idx].monsterinfo.melee_finished = time + MELEE_INTERVAL;

    let (origin, range, base) = {
        let e = &ctx.edicts[self_idx];
        (e.s.origin, e.monsterinfo.melee_range, e.monsterinfo.damage)
    };
    let target = aim_point(ctx, enemy);
    let dir = vector_subtract(&target, &origin);
    if vector_length(&dir) > range + 16.0 {
        return Ok(());
    }

    let damage = (base as f32 * MELEE_DAMAGE_SCALE) as i32;
    t_damage(
        ctx,
        enemy,
        self_idx,
        self_idx,
        &dir,
        &target,
        &VEC3_ORIGIN,
        damage,
        damage / 2,
        DamageFlags::BULLET,
        MeansOfDeath::Melee,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::g_utils::test_support::{make_player, test_ctx};

    #[test]
    fn test_class_table_values() {
        let ss = MonsterClass::SoldierSs.info();
        assert_eq!((ss.health, ss.damage, ss.speed), (150, 15, 240.0));
        assert!(ss.flags.contains(ClassFlags::GRENADES | ClassFlags::DODGE));
        assert_eq!(MonsterClass::Sniper.info().sight, 2048.0);
        assert_eq!(MonsterClass::Boss.info().yaw_speed, 15.0);
        assert!(MonsterClass::Guard.flags().contains(ClassFlags::STAND_GROUND));
    }

    #[test]
    fn test_from_classname() {
        assert_eq!(MonsterClass::from_classname("monster_medic"), Some(MonsterClass::Medic));
        assert_eq!(MonsterClass::from_classname("monster_soldier"), Some(MonsterClass::Soldier));
        assert_eq!(MonsterClass::from_classname("monster_tank"), None);
    }

    #[test]
    fn test_apply_sets_tier_and_flags() {
        let mut e = Edict::init(5, 0);
        MonsterClass::Boss.apply(&mut e);
        assert_eq!(e.health, 500);
        assert_eq!(e.monsterinfo.tier, Toughness::Elite);
        assert!(e.is_monster());
        assert_eq!(e.movetype, MoveType::Step);

        let mut g = Edict::init(6, 0);
        MonsterClass::Guard.apply(&mut g);
        assert!(g.monsterinfo.aiflags.contains(AiFlags::STAND_GROUND));
        assert_eq!(g.monsterinfo.tier, Toughness::High);

        // a level-set health override is kept
        let mut l = Edict::init(7, 0);
        l.health = 120;
        MonsterClass::SoldierLight.apply(&mut l);
        assert_eq!(l.max_health, 120);
    }

    #[test]
    fn test_melee_out_of_reach_misses() {
        let mut ctx = test_ctx();
        let p = make_player(&mut ctx, [0.0; 3]);
        let m = crate::g_utils::test_support::make_monster(&mut ctx, [300.0, 0.0, 0.0], 100);
        monster_melee(&mut ctx, m, p).unwrap();
        assert_eq!(ctx.edicts[p].health, 100);
        assert!(ctx.edicts[m].monsterinfo.melee_finished > 0.0);
    }

    #[test]
    fn test_melee_hits_adjacent() {
        let mut ctx = test_ctx();
        let p = make_player(&mut ctx, [0.0; 3]);
        let m = crate::g_utils::test_support::make_monster(&mut ctx, [60.0, 0.0, 0.0], 100);
        monster_melee(&mut ctx, m, p).unwrap();
        assert!(ctx.edicts[p].health < 100);
    }
}
