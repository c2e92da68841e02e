// g_combat.rs — damage resolution, armor, radius damage and death

use log::{debug, info};
use rayon::prelude::*;

use crate::dispatch::{call_die, call_pain};
use crate::g_error::GameResult;
use crate::g_gore::map_hit_zone;
use crate::g_local::*;
use crate::g_world::{area_edicts, trace};
use crate::game_import::EffectKind;

/// Share of incoming damage armor soaks up.
pub const ARMOR_PROTECTION: f32 = 0.66;
/// Knockback is capped before mass scaling.
pub const MAX_KNOCKBACK: i32 = 200;

/// Timed impairments a hit can apply to a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Burning,
    Bleeding,
    Poisoned,
    Concussed,
    Flashed,
    Shielded,
}

struct RadiusDamageData {
    ent_idx: usize,
    dir: Vec3,
    points: i32,
}

// ============================================================
// Helpers
// ============================================================

/// Armor points used up by `damage`. Never more than the damage itself and
/// never more than the armor available.
pub fn armor_absorb(damage: i32, armor: i32) -> i32 {
    if damage <= 0 || armor <= 0 {
        return 0;
    }
    let save = (damage as f32 * ARMOR_PROTECTION) as i32;
    save.min(armor).min(damage)
}

fn on_same_team(ctx: &GameCtx, a: usize, b: usize) -> bool {
    let ta = ctx.edicts[a].team;
    ta != 0 && ta == ctx.edicts[b].team
}

fn spawn_protected(ctx: &GameCtx, targ: usize) -> bool {
    ctx.edicts[targ].invuln_time > ctx.level.time
}

fn shielded(ctx: &GameCtx, targ: usize) -> bool {
    ctx.client_of(targ)
        .is_some_and(|c| c.effects.shielded_until > ctx.level.time)
}

/// Start or extend a timed effect on a player. Monsters ignore these.
pub fn apply_status(ctx: &mut GameCtx, targ: usize, kind: StatusKind, seconds: f32, inflictor: usize) {
    let now = ctx.level.time;
    let Some(client) = ctx.client_of_mut(targ) else {
        return;
    };
    let until = now + seconds;
    let fx = &mut client.effects;
    match kind {
        StatusKind::Burning => {
            if fx.burning_until <= now {
                fx.burn_next = now + 0.5;
            }
            fx.burning_until = fx.burning_until.max(until);
        }
        StatusKind::Bleeding => {
            if fx.bleeding_until <= now {
                fx.bleed_next = now + 1.0;
            }
            fx.bleeding_until = fx.bleeding_until.max(until);
        }
        StatusKind::Poisoned => {
            if fx.poisoned_until <= now {
                fx.poison_next = now + 1.0;
            }
            fx.poisoned_until = fx.poisoned_until.max(until);
        }
        StatusKind::Concussed => fx.concussed_until = fx.concussed_until.max(until),
        StatusKind::Flashed => fx.flashed_until = fx.flashed_until.max(until),
        StatusKind::Shielded => fx.shielded_until = fx.shielded_until.max(until),
    }
    fx.inflictor = inflictor as i32;
}

/// Returns true if the inflictor can directly damage the target.
/// Used for explosions and melee attacks.
pub fn can_damage(ctx: &GameCtx, targ: usize, inflictor: usize) -> bool {
    let from = ctx.edicts[inflictor].s.origin;
    let t = &ctx.edicts[targ];

    // movers keep their origin at the model origin, aim for the middle
    if t.movetype == MoveType::Push {
        let dest = vector_scale(&vector_add(&t.absmin, &t.absmax), 0.5);
        let tr = trace(ctx, &from, &VEC3_ORIGIN, &VEC3_ORIGIN, &dest, inflictor as i32, MASK_SOLID);
        return tr.fraction == 1.0 || tr.ent_index == targ as i32;
    }

    let o = t.s.origin;
    let probes = [
        o,
        [o[0] + 15.0, o[1] + 15.0, o[2]],
        [o[0] + 15.0, o[1] - 15.0, o[2]],
        [o[0] - 15.0, o[1] + 15.0, o[2]],
        [o[0] - 15.0, o[1] - 15.0, o[2]],
    ];
    probes.iter().any(|dest| {
        let tr = trace(ctx, &from, &VEC3_ORIGIN, &VEC3_ORIGIN, dest, inflictor as i32, MASK_SOLID);
        tr.fraction == 1.0 || tr.ent_index == targ as i32
    })
}

// ============================================================
// Damage
// ============================================================

/// Apply one attack to `targ`. Returns the health actually removed.
///
/// The checks run in a fixed order: team, spawn protection, hit zone,
/// shield, armor, godmode. Knockback is applied even when nothing gets
/// through the armor.
#[allow(clippy::too_many_arguments)]
pub fn t_damage(
    ctx: &mut GameCtx,
    targ: usize,
    inflictor: usize,
    attacker: usize,
    dir: &Vec3,
    point: &Vec3,
    normal: &Vec3,
    damage: i32,
    knockback: i32,
    dflags: DamageFlags,
    mod_: MeansOfDeath,
) -> GameResult<i32> {
    if ctx.edicts[targ].takedamage == Damage::No {
        return Ok(0);
    }

    debug_assert!(damage >= 0, "negative damage {}", damage);
    let mut damage = damage.max(0);

    if targ != attacker && ctx.friendly_fire == 0.0 && on_same_team(ctx, targ, attacker) {
        return Ok(0);
    }

    if spawn_protected(ctx, targ) && !dflags.contains(DamageFlags::NO_PROTECTION) {
        return Ok(0);
    }

    ctx.means_of_death = mod_;
    let dir = vector_normalized(dir);

    // which body part got hit; only localized hits are zoned
    let zone = if ctx.edicts[targ].gore.is_some() && dflags.contains(DamageFlags::BULLET) {
        let e = &ctx.edicts[targ];
        let z = map_hit_zone(&e.s.origin, e.s.angles[YAW], &e.mins, &e.maxs, point, &dir);
        damage = (damage as f32 * z.multiplier()) as i32;
        Some(z)
    } else {
        None
    };

    if shielded(ctx, targ) && !dflags.contains(DamageFlags::NO_PROTECTION) {
        ctx.gi.spawn_particle_effect(point, normal, EffectKind::Sparks, 6);
        return Ok(0);
    }

    let mut take = damage;

    // armor
    let mut asave = 0;
    if !dflags.intersects(DamageFlags::NO_ARMOR | DamageFlags::ARMOR_PIERCING) {
        if let Some(client) = ctx.client_of_mut(targ) {
            asave = armor_absorb(take, client.pers.armor);
            client.pers.armor -= asave;
        }
    }
    take -= asave;
    if asave > 0 {
        ctx.gi.spawn_particle_effect(point, normal, EffectKind::Sparks, asave.min(16));
    }

    if ctx.edicts[targ].flags.contains(EntityFlags::GODMODE) && !dflags.contains(DamageFlags::NO_PROTECTION) {
        take = 0;
    }

    // knockback
    let mut knockback = knockback.min(MAX_KNOCKBACK);
    if ctx.edicts[targ].flags.contains(EntityFlags::NO_KNOCKBACK) {
        knockback = 0;
    }
    if knockback > 0 && !dflags.contains(DamageFlags::NO_KNOCKBACK) {
        let t = &mut ctx.edicts[targ];
        if !matches!(t.movetype, MoveType::None | MoveType::Bounce | MoveType::Push | MoveType::Stop) {
            let mass = t.mass.max(50) as f32;
            let kvel = vector_scale(&dir, 500.0 * knockback as f32 / mass);
            t.velocity = vector_add(&t.velocity, &kvel);
        }
    }

    if take <= 0 {
        return Ok(0);
    }

    // zone accumulation and dismemberment
    if let Some(z) = zone {
        let severed = ctx.edicts[targ]
            .gore
            .as_mut()
            .map(|g| g.apply(z, take))
            .unwrap_or_default();
        if !severed.is_empty() {
            debug!("{} severed {:?}", ctx.edicts[targ].classname, severed);
            ctx.gi.spawn_particle_effect(point, &dir, EffectKind::Gib, 4 * severed.len() as i32);
            apply_status(ctx, targ, StatusKind::Bleeding, 5.0, attacker);
        }
    }

    match mod_ {
        MeansOfDeath::Weapon(crate::g_weapon::WeaponKind::FlameGun) => {
            apply_status(ctx, targ, StatusKind::Burning, 3.0, attacker);
        }
        MeansOfDeath::Splash(_) | MeansOfDeath::Explosive if take >= 20 => {
            apply_status(ctx, targ, StatusKind::Concussed, 1.0, attacker);
        }
        _ => {}
    }

    let is_actor = ctx.edicts[targ].is_monster() || ctx.edicts[targ].client.is_some();
    let kind = if is_actor { EffectKind::Blood } else { EffectKind::Sparks };
    ctx.gi.spawn_particle_effect(point, normal, kind, take.min(32));

    {
        let t = &mut ctx.edicts[targ];
        t.health -= take;
        t.damage_taken = true;
        t.pending_damage += take;
    }

    if let Some(client) = ctx.client_of_mut(targ) {
        client.damage_blood += take;
        client.damage_armor += asave;
        client.damage_from = *point;
    }

    if ctx.edicts[targ].health <= 0 {
        if is_actor {
            ctx.edicts[targ].flags.insert(EntityFlags::NO_KNOCKBACK);
        }
        killed(ctx, targ, inflictor, attacker, take, point)?;
        return Ok(take);
    }

    if ctx.edicts[targ].is_monster() {
        react_to_damage(ctx, targ, attacker);
    }
    call_pain(ctx, targ, attacker, knockback as f32, take)?;

    Ok(take)
}

/// Two-phase radius damage: distances and falloff are computed in parallel,
/// then damage is applied in slot order.
pub fn t_radius_damage(
    ctx: &mut GameCtx,
    inflictor: usize,
    attacker: usize,
    damage: f32,
    ignore: Option<usize>,
    radius: f32,
    mod_: MeansOfDeath,
) -> GameResult<()> {
    if radius <= 0.0 || damage <= 0.0 {
        return Ok(());
    }
    let origin = ctx.edicts[inflictor].s.origin;
    let qmins = [origin[0] - radius, origin[1] - radius, origin[2] - radius];
    let qmaxs = [origin[0] + radius, origin[1] + radius, origin[2] + radius];

    let candidates: Vec<(usize, Vec3, Vec3, Vec3)> = area_edicts(ctx, &qmins, &qmaxs, AREA_SOLID)
        .into_iter()
        .filter(|&i| Some(i) != ignore && ctx.edicts[i].takedamage != Damage::No)
        .map(|i| {
            let e = &ctx.edicts[i];
            (i, e.s.origin, e.mins, e.maxs)
        })
        .collect();

    let mut hits: Vec<RadiusDamageData> = candidates
        .par_iter()
        .filter_map(|&(ent_idx, eorigin, mins, maxs)| {
            let center = vector_ma(&eorigin, 0.5, &vector_add(&mins, &maxs));
            let dist = vector_length(&vector_subtract(&center, &origin));
            let mut points = damage * (1.0 - dist / radius);
            if ent_idx == attacker {
                points *= 0.5;
            }
            if points < 1.0 {
                return None;
            }
            Some(RadiusDamageData {
                ent_idx,
                dir: vector_subtract(&center, &origin),
                points: points as i32,
            })
        })
        .collect();
    hits.sort_by_key(|h| h.ent_idx);

    for hit in hits {
        if !ctx.edicts[hit.ent_idx].inuse || !can_damage(ctx, hit.ent_idx, inflictor) {
            continue;
        }
        t_damage(
            ctx,
            hit.ent_idx,
            inflictor,
            attacker,
            &hit.dir,
            &origin,
            &VEC3_ORIGIN,
            hit.points,
            hit.points,
            DamageFlags::RADIUS,
            mod_,
        )?;
    }
    Ok(())
}

// ============================================================
// Reactions
// ============================================================

/// Monster reaction to being hurt: maybe switch enemies.
pub fn react_to_damage(ctx: &mut GameCtx, targ: usize, attacker: usize) {
    if attacker == targ || !ctx.edicts[attacker].inuse {
        return;
    }
    let att = &ctx.edicts[attacker];
    if att.client.is_none() && !att.is_monster() {
        return;
    }
    if ctx.edicts[targ].monsterinfo.aiflags.contains(AiFlags::SURRENDERED) {
        return;
    }

    let current = ctx.resolve_opt(ctx.edicts[targ].enemy);
    if current == Some(attacker) {
        return;
    }

    let new_enemy = if att.client.is_some() {
        Some(attacker)
    } else if att.classname != ctx.edicts[targ].classname
        || ctx.resolve_opt(att.enemy) == Some(targ)
    {
        // different kind of monster, or it meant to hit us
        Some(attacker)
    } else {
        // help our buddy with whoever it is fighting
        ctx.resolve_opt(att.enemy).filter(|&e| e != targ)
    };

    if let Some(e) = new_enemy {
        ctx.edicts[targ].oldenemy = ctx.edicts[targ].enemy;
        ctx.edicts[targ].enemy = Some(ctx.handle_of(e));
        crate::g_ai::found_target(ctx, targ);
    }
}

/// Called when an entity's health drops to zero or below.
///
/// Counting, scoring and the first death callback happen once. Hits on a
/// corpse only forward to the die callback so it can gib.
pub fn killed(
    ctx: &mut GameCtx,
    targ: usize,
    inflictor: usize,
    attacker: usize,
    damage: i32,
    point: &Vec3,
) -> GameResult<()> {
    if ctx.edicts[targ].health < -999 {
        ctx.edicts[targ].health = -999;
    }

    if ctx.edicts[targ].deadflag != DeadFlag::No {
        if ctx.edicts[targ].health <= ctx.edicts[targ].gib_health {
            call_die(ctx, targ, inflictor, attacker, damage, point)?;
        }
        return Ok(());
    }

    ctx.edicts[targ].enemy = Some(ctx.handle_of(attacker));

    if ctx.edicts[targ].is_monster() {
        ctx.level.killed_monsters += 1;
        ctx.edicts[targ].touch = None;
        crate::m_tactics::note_ally_death(ctx, targ);
    }

    if ctx.edicts[targ].client.is_some() {
        score_kill(ctx, targ, attacker);
    } else if ctx.edicts[attacker].client.is_some() && ctx.edicts[targ].is_monster() {
        if let Some(c) = ctx.client_of_mut(attacker) {
            c.resp.kills += 1;
            c.resp.score += 1;
        }
    }

    call_die(ctx, targ, inflictor, attacker, damage, point)
}

fn score_kill(ctx: &mut GameCtx, victim: usize, attacker: usize) {
    let victim_name = ctx.client_of(victim).map(|c| c.pers.netname.clone()).unwrap_or_default();

    if let Some(c) = ctx.client_of_mut(victim) {
        c.resp.deaths += 1;
        c.resp.streak = 0;
    }

    if attacker == victim || ctx.edicts[attacker].client.is_none() {
        if let Some(c) = ctx.client_of_mut(victim) {
            c.resp.score -= 1;
        }
        let msg = format!("{} died ({:?})\n", victim_name, ctx.means_of_death);
        info!("{}", msg.trim_end());
        ctx.gi.bprintf(&msg);
        return;
    }

    let mut killer_name = String::new();
    if let Some(c) = ctx.client_of_mut(attacker) {
        c.resp.score += 1;
        c.resp.kills += 1;
        c.resp.streak += 1;
        c.resp.best_streak = c.resp.best_streak.max(c.resp.streak);
        killer_name = c.pers.netname.clone();
    }
    let msg = format!("{} was killed by {} ({:?})\n", victim_name, killer_name, ctx.means_of_death);
    info!("{}", msg.trim_end());
    ctx.gi.bprintf(&msg);
}
