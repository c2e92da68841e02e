// g_items.rs — pickups: weapons, ammunition, armor and medkits
//
// Copyright (C) 1997-2001 Id Software, Inc.
// Licensed under the GNU General Public License v2+

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::dispatch::{ThinkKind, TouchKind};
use crate::g_error::GameResult;
use crate::g_local::*;
use crate::g_utils::{g_free_edict, use_targets};
use crate::g_weapon::{AmmoKind, WeaponKind};
use crate::g_world::{link_entity, trace};
use crate::game_import::{EffectKind, ATTN_NORM, CHAN_ITEM};

pub const ARMOR_PICKUP: i32 = 50;
pub const ARMOR_MAX: i32 = 100;
pub const MEDKIT_HEAL: i32 = 25;
pub const ITEM_RESPAWN_TIME: f32 = 30.0;

/// Set once the item has fired its targets.
const ITEM_TARGETS_USED: i32 = 0x4000;

const ITEM_MINS: Vec3 = [-15.0, -15.0, -15.0];
const ITEM_MAXS: Vec3 = [15.0, 15.0, 15.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemKind {
    Weapon(WeaponKind),
    Ammo(AmmoKind),
    Armor,
    Medkit,
}

impl ItemKind {
    pub fn from_classname(classname: &str) -> Option<Self> {
        match classname {
            "item_armor" => Some(ItemKind::Armor),
            "item_medkit" => Some(ItemKind::Medkit),
            c if c.starts_with("weapon_") => WeaponKind::from_classname(c).map(ItemKind::Weapon),
            c if c.starts_with("ammo_") => AmmoKind::from_classname(c).map(ItemKind::Ammo),
            _ => None,
        }
    }

    fn pickup_sound(self) -> &'static str {
        match self {
            ItemKind::Weapon(_) => "misc/w_pkup.wav",
            ItemKind::Ammo(_) => "misc/am_pkup.wav",
            ItemKind::Armor => "misc/ar1_pkup.wav",
            ItemKind::Medkit => "items/l_health.wav",
        }
    }
}

// ============================================================
// Pickup rules
// ============================================================

/// Add up to `count` rounds. False when the player is already full.
pub fn add_ammo(client: &mut GClient, ammo: AmmoKind, count: i32) -> bool {
    if ammo == AmmoKind::None {
        return false;
    }
    let (max, _) = ammo.limits();
    let slot = &mut client.pers.ammo[ammo as usize];
    if *slot >= max {
        return false;
    }
    *slot = (*slot + count).min(max);
    true
}

fn pickup_weapon(ctx: &mut GameCtx, other: usize, kind: WeaponKind) -> bool {
    let info = kind.info();
    let Some(client) = ctx.client_of_mut(other) else {
        return false;
    };
    let owned = client.pers.has_weapon[kind as usize];
    let (_, per_pickup) = info.ammo.limits();
    let got_ammo = add_ammo(client, info.ammo, per_pickup);
    if owned {
        return got_ammo;
    }

    client.pers.has_weapon[kind as usize] = true;
    client.pers.mag[kind as usize] = info.mag_size;
    let current = client.pers.weapon;
    if matches!(current, WeaponKind::None | WeaponKind::Knife) && info.damage > 0 {
        crate::p_weapon::change_weapon(ctx, other, kind);
    }
    true
}

fn pickup_ammo(ctx: &mut GameCtx, item: usize, other: usize, kind: AmmoKind) -> bool {
    let count = match ctx.edicts[item].count {
        n if n > 0 => n,
        _ => kind.limits().1,
    };
    ctx.client_of_mut(other).is_some_and(|c| add_ammo(c, kind, count))
}

fn pickup_armor(ctx: &mut GameCtx, item: usize, other: usize) -> bool {
    let amount = match ctx.edicts[item].count {
        n if n > 0 => n,
        _ => ARMOR_PICKUP,
    };
    let Some(client) = ctx.client_of_mut(other) else {
        return false;
    };
    if client.pers.armor >= ARMOR_MAX {
        return false;
    }
    client.pers.armor = (client.pers.armor + amount).min(ARMOR_MAX);
    true
}

fn pickup_medkit(ctx: &mut GameCtx, item: usize, other: usize) -> bool {
    let amount = match ctx.edicts[item].count {
        n if n > 0 => n,
        _ => MEDKIT_HEAL,
    };
    let e = &mut ctx.edicts[other];
    if e.health >= e.max_health {
        return false;
    }
    e.health = (e.health + amount).min(e.max_health);
    let health = e.health;
    if let Some(c) = ctx.client_of_mut(other) {
        c.pers.health = health;
    }
    true
}

// ============================================================
// Touch / respawn
// ============================================================

pub fn touch_item(ctx: &mut GameCtx, self_idx: usize, other: usize) -> GameResult<()> {
    if ctx.edicts[other].client.is_none() || ctx.edicts[other].health < 1 {
        return Ok(());
    }
    let Some(kind) = ctx.edicts[self_idx].item else {
        return Ok(());
    };

    let taken = match kind {
        ItemKind::Weapon(w) => pickup_weapon(ctx, other, w),
        ItemKind::Ammo(a) => pickup_ammo(ctx, self_idx, other, a),
        ItemKind::Armor => pickup_armor(ctx, self_idx, other),
        ItemKind::Medkit => pickup_medkit(ctx, self_idx, other),
    };

    if taken {
        if let Some(c) = ctx.client_of_mut(other) {
            c.bonus_alpha = 0.25;
        }
        let snd = ctx.configstrings.sound_index(kind.pickup_sound());
        ctx.gi.play_sound(other as i32, CHAN_ITEM, snd, 1.0, ATTN_NORM, 0.0);
        debug!("{} picked up {}", other, ctx.edicts[self_idx].classname);
    }

    if ctx.edicts[self_idx].spawnflags & ITEM_TARGETS_USED == 0 {
        use_targets(ctx, self_idx, other)?;
        ctx.edicts[self_idx].spawnflags |= ITEM_TARGETS_USED;
    }

    if !taken || !ctx.edicts[self_idx].inuse {
        return Ok(());
    }

    if ctx.deathmatch != 0.0 {
        set_respawn(ctx, self_idx, ITEM_RESPAWN_TIME);
    } else {
        g_free_edict(ctx, self_idx);
    }
    Ok(())
}

/// Hide the item until `delay` seconds from now.
pub fn set_respawn(ctx: &mut GameCtx, idx: usize, delay: f32) {
    let time = ctx.level.time;
    let e = &mut ctx.edicts[idx];
    e.flags |= EntityFlags::RESPAWN;
    e.svflags |= SVF_NOCLIENT;
    e.solid = Solid::Not;
    e.think = Some(ThinkKind::ItemRespawn);
    e.nextthink = time + delay;
    link_entity(ctx, idx);
}

pub fn item_respawn(ctx: &mut GameCtx, self_idx: usize) -> GameResult<()> {
    let origin = {
        let e = &mut ctx.edicts[self_idx];
        e.svflags &= !SVF_NOCLIENT;
        e.solid = Solid::Trigger;
        e.think = None;
        e.s.origin
    };
    link_entity(ctx, self_idx);
    ctx.gi.spawn_particle_effect(&origin, &[0.0, 0.0, 1.0], EffectKind::Sparks, 8);
    trace!("{} ({}) respawned", ctx.edicts[self_idx].classname, self_idx);
    Ok(())
}

// ============================================================
// Spawning
// ============================================================

/// Turn a freshly parsed entity into a pickup resting on the floor.
pub fn spawn_item(ctx: &mut GameCtx, idx: usize, kind: ItemKind) -> GameResult<()> {
    let model = format!("models/items/{}.ghb", ctx.edicts[idx].classname);
    let modelindex = ctx.configstrings.model_index(&model);
    {
        let e = &mut ctx.edicts[idx];
        e.item = Some(kind);
        e.mins = ITEM_MINS;
        e.maxs = ITEM_MAXS;
        e.solid = Solid::Trigger;
        e.movetype = MoveType::None;
        e.touch = Some(TouchKind::Item);
        e.s.modelindex = modelindex;
    }

    let start = ctx.edicts[idx].s.origin;
    let end = [start[0], start[1], start[2] - 128.0];
    let tr = trace(ctx, &start, &ITEM_MINS, &ITEM_MAXS, &end, idx as i32, MASK_SOLID);
    if tr.startsolid {
        debug!("{} at {} starts in solid", ctx.edicts[idx].classname, vtos(&start));
    } else if tr.fraction < 1.0 {
        ctx.edicts[idx].s.origin = tr.endpos;
    }
    link_entity(ctx, idx);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::g_utils::test_support::{make_edict, make_player, test_ctx};

    fn item(ctx: &mut GameCtx, classname: &str) -> usize {
        let idx = make_edict(ctx, [64.0, 0.0, 16.0]);
        ctx.edicts[idx].classname = classname.to_string();
        let kind = ItemKind::from_classname(classname).unwrap();
        spawn_item(ctx, idx, kind).unwrap();
        idx
    }

    #[test]
    fn test_classnames() {
        assert_eq!(ItemKind::from_classname("item_armor"), Some(ItemKind::Armor));
        assert_eq!(
            ItemKind::from_classname("weapon_shotgun"),
            Some(ItemKind::Weapon(WeaponKind::Shotgun))
        );
        assert_eq!(ItemKind::from_classname("ammo_9mm"), Some(ItemKind::Ammo(AmmoKind::Nine)));
        assert_eq!(ItemKind::from_classname("weapon_bfg"), None);
        assert_eq!(ItemKind::from_classname("monster_soldier"), None);
    }

    #[test]
    fn test_medkit_heals_up_to_max() {
        let mut ctx = test_ctx();
        let p = make_player(&mut ctx, [0.0, 0.0, 24.0]);
        ctx.edicts[p].health = 90;
        let kit = item(&mut ctx, "item_medkit");

        touch_item(&mut ctx, kit, p).unwrap();
        assert_eq!(ctx.edicts[p].health, 100);
        assert!(!ctx.edicts[kit].inuse);
        assert!(ctx.clients[0].bonus_alpha > 0.0);
    }

    #[test]
    fn test_medkit_left_alone_at_full_health() {
        let mut ctx = test_ctx();
        let p = make_player(&mut ctx, [0.0, 0.0, 24.0]);
        let kit = item(&mut ctx, "item_medkit");
        touch_item(&mut ctx, kit, p).unwrap();
        assert!(ctx.edicts[kit].inuse);
        assert_eq!(ctx.edicts[p].health, 100);
    }

    #[test]
    fn test_armor_is_capped() {
        let mut ctx = test_ctx();
        let p = make_player(&mut ctx, [0.0, 0.0, 24.0]);
        ctx.clients[0].pers.armor = 80;
        let a = item(&mut ctx, "item_armor");
        touch_item(&mut ctx, a, p).unwrap();
        assert_eq!(ctx.clients[0].pers.armor, ARMOR_MAX);

        let b = item(&mut ctx, "item_armor");
        touch_item(&mut ctx, b, p).unwrap();
        assert!(ctx.edicts[b].inuse);
    }

    #[test]
    fn test_ammo_respects_carry_limit() {
        let mut ctx = test_ctx();
        let p = make_player(&mut ctx, [0.0, 0.0, 24.0]);
        let (max, per) = AmmoKind::Nine.limits();
        ctx.clients[0].pers.ammo[AmmoKind::Nine as usize] = max - 5;

        let a = item(&mut ctx, "ammo_9mm");
        touch_item(&mut ctx, a, p).unwrap();
        assert!(per > 5);
        assert_eq!(ctx.clients[0].pers.ammo[AmmoKind::Nine as usize], max);

        let b = item(&mut ctx, "ammo_9mm");
        touch_item(&mut ctx, b, p).unwrap();
        assert!(ctx.edicts[b].inuse);
    }

    #[test]
    fn test_weapon_pickup_loads_and_switches_from_knife() {
        let mut ctx = test_ctx();
        let p = make_player(&mut ctx, [0.0, 0.0, 24.0]);
        ctx.clients[0].pers.has_weapon[WeaponKind::Knife as usize] = true;
        ctx.clients[0].pers.weapon = WeaponKind::Knife;

        let w = item(&mut ctx, "weapon_shotgun");
        touch_item(&mut ctx, w, p).unwrap();
        let pers = &ctx.clients[0].pers;
        assert!(pers.has_weapon[WeaponKind::Shotgun as usize]);
        assert_eq!(pers.mag[WeaponKind::Shotgun as usize], WeaponKind::Shotgun.info().mag_size);
        assert_eq!(pers.ammo[AmmoKind::Shells as usize], AmmoKind::Shells.limits().1);
        assert_eq!(pers.weapon, WeaponKind::Shotgun);
    }

    #[test]
    fn test_deathmatch_items_come_back() {
        let mut ctx = test_ctx();
        ctx.deathmatch = 1.0;
        let p = make_player(&mut ctx, [0.0, 0.0, 24.0]);
        ctx.edicts[p].health = 50;
        let kit = item(&mut ctx, "item_medkit");

        touch_item(&mut ctx, kit, p).unwrap();
        assert!(ctx.edicts[kit].inuse);
        assert_eq!(ctx.edicts[kit].solid, Solid::Not);
        assert!((ctx.edicts[kit].nextthink - ITEM_RESPAWN_TIME).abs() < 1e-3);

        ctx.level.time = ITEM_RESPAWN_TIME;
        crate::g_phys::run_think(&mut ctx, kit).unwrap();
        assert_eq!(ctx.edicts[kit].solid, Solid::Trigger);
        assert_eq!(ctx.edicts[kit].svflags & SVF_NOCLIENT, 0);
    }

    #[test]
    fn test_pickup_fires_targets_once() {
        let mut ctx = test_ctx();
        let p = make_player(&mut ctx, [0.0, 0.0, 24.0]);
        let obj = make_edict(&mut ctx, [0.0; 3]);
        ctx.edicts[obj].targetname = "got_it".to_string();
        ctx.edicts[obj].message = "Find the exit".to_string();
        ctx.edicts[obj].use_fn = Some(crate::dispatch::UseKind::Objective);
        ctx.register_entity_in_index(obj);

        ctx.edicts[p].health = 60;
        let kit = item(&mut ctx, "item_medkit");
        ctx.edicts[kit].target = "got_it".to_string();
        touch_item(&mut ctx, kit, p).unwrap();
        assert_eq!(ctx.level.objective, "Find the exit");
        assert!(!ctx.edicts[kit].inuse);
    }
}
