// m_tactics.rs — squad tactics layered over the monster state machine
//
// Every modifier here is gated on the monster's toughness tier and its own
// cooldown timestamps. All of them are called from the monster's think.

use log::{debug, trace};

use crate::g_ai::{alert_allies, eye_point, go_idle, range, valid_enemy};
use crate::g_error::GameResult;
use crate::g_local::*;
use crate::g_weapon::{ballistic_velocity, fire_grenade, WeaponKind, GRENADE_RADIUS};
use crate::g_world::{area_edicts, trace, trace_line_opaque};
use crate::game_import::{ATTN_NORM, CHAN_VOICE, CHAN_WEAPON};
use crate::m_move::{move_to_goal, walkmove, STEPSIZE};
use crate::m_soldier::{monster_fire, muzzle, ClassFlags, ATTACK_INTERVAL};

/// Squadmates inside this radius share information and morale.
pub const SQUAD_RADIUS: f32 = 512.0;

// morale
const ALLY_LOSS_RATIO: f32 = 0.5;
const SURRENDER_FRACTION: f32 = 0.2;
const FLEE_DISTANCE: f32 = 256.0;

// cover
const COVER_HEALTH_FRACTION: f32 = 0.5;
const COVER_PROBES: [f32; 2] = [128.0, 256.0];
const COVER_REACHED: f32 = 24.0;
const COVER_TIMEOUT: f32 = 4.0;
const COVER_HOLD: f32 = 3.0;
const COVER_RECHECK: f32 = 2.0;

// suppression
const SUPPRESS_DURATION: f32 = 1.5;
const SUPPRESS_COOLDOWN: f32 = 5.0;
const SUPPRESS_SPREAD: f32 = 3.0;

// approach
const FLANK_MIN_RANGE: f32 = 256.0;
const FLANK_OFFSET: f32 = 192.0;
const SEPARATION_DISTANCE: f32 = 64.0;

// squad
const CALLOUT_INTERVAL: f32 = 3.0;
const ORDER_INTERVAL: f32 = 2.0;

// grenades
const GRENADE_MIN_RANGE: f32 = 256.0;
const GRENADE_MAX_RANGE: f32 = 800.0;
const GRENADE_COOLDOWN: f32 = 5.0;
const GRENADE_THROW_SPEED: f32 = 400.0;

// dodging
const DODGE_CONE: f32 = 0.95;
const DODGE_RANGE: f32 = 512.0;
const DODGE_CHANCE: f32 = 0.3;
const DODGE_COOLDOWN: f32 = 1.5;
const DODGE_STEP: f32 = 32.0;

fn tier(ctx: &GameCtx, self_idx: usize) -> Toughness {
    ctx.edicts[self_idx].monsterinfo.tier
}

fn class_flags(ctx: &GameCtx, self_idx: usize) -> ClassFlags {
    ctx.edicts[self_idx].monsterinfo.class.flags()
}

fn health_fraction(e: &Edict) -> f32 {
    e.health as f32 / e.max_health.max(1) as f32
}

/// Live monsters other than `self_idx` within `radius` of `origin`.
pub fn allies_near(ctx: &GameCtx, self_idx: usize, origin: &Vec3, radius: f32) -> Vec<usize> {
    let r = [radius; 3];
    let mins = vector_subtract(origin, &r);
    let maxs = vector_add(origin, &r);
    area_edicts(ctx, &mins, &maxs, AREA_SOLID)
        .into_iter()
        .filter(|&i| {
            let e = &ctx.edicts[i];
            i != self_idx && e.is_monster() && e.is_alive() && distance(&e.s.origin, origin) <= radius
        })
        .collect()
}

// ============================================================
// Morale
// ============================================================

/// A squadmate went down: everyone close enough to notice remembers it.
/// Half of it is forgotten each time the monster settles back to idle.
pub fn note_ally_death(ctx: &mut GameCtx, dead: usize) {
    let origin = ctx.edicts[dead].s.origin;
    for i in allies_near(ctx, dead, &origin, SQUAD_RADIUS) {
        ctx.edicts[i].monsterinfo.allies_lost += 1;
    }
}

/// Whether morale has broken: badly hurt, or (for the weaker tiers) most of
/// the squad around it is gone.
pub fn should_flee(ctx: &GameCtx, self_idx: usize) -> bool {
    let e = &ctx.edicts[self_idx];
    let mi = &e.monsterinfo;
    if mi.flee_health > 0.0 && health_fraction(e) < mi.flee_health {
        return true;
    }
    if mi.tier > Toughness::Medium || mi.allies_lost == 0 {
        return false;
    }
    let alive = allies_near(ctx, self_idx, &e.s.origin, SQUAD_RADIUS).len() as f32;
    let lost = mi.allies_lost as f32;
    lost / (lost + alive) > ALLY_LOSS_RATIO
}

/// A point straight away from the enemy.
pub fn flee_goal(ctx: &GameCtx, self_idx: usize, enemy: usize) -> Vec3 {
    let origin = ctx.edicts[self_idx].s.origin;
    let mut away = vector_subtract(&origin, &ctx.edicts[enemy].s.origin);
    away[2] = 0.0;
    if vector_normalize(&mut away) == 0.0 {
        away = [1.0, 0.0, 0.0];
    }
    vector_ma(&origin, FLEE_DISTANCE, &away)
}

/// The weakest monsters give up instead of fighting to the death. They stay
/// killable.
pub fn check_surrender(ctx: &mut GameCtx, self_idx: usize) -> GameResult<bool> {
    let e = &ctx.edicts[self_idx];
    if e.monsterinfo.tier != Toughness::Low {
        return Ok(false);
    }
    if e.monsterinfo.aiflags.contains(AiFlags::SURRENDERED) {
        return Ok(true);
    }
    if health_fraction(e) >= SURRENDER_FRACTION {
        return Ok(false);
    }

    debug!("{} ({}) surrenders", e.classname, self_idx);
    {
        let e = &mut ctx.edicts[self_idx];
        e.monsterinfo.aiflags.insert(AiFlags::SURRENDERED);
        e.velocity[0] = 0.0;
        e.velocity[1] = 0.0;
    }
    let snd = ctx.configstrings.sound_index("soldier/surrender.wav");
    ctx.gi.play_sound(self_idx as i32, CHAN_VOICE, snd, 1.0, ATTN_NORM, 0.0);
    go_idle(ctx, self_idx)?;
    Ok(true)
}

// ============================================================
// Cover
// ============================================================

/// Probe eight compass directions for a reachable spot the enemy cannot
/// see. Nearer rings first.
pub fn find_cover(ctx: &GameCtx, self_idx: usize, enemy: usize) -> Option<Vec3> {
    let e = &ctx.edicts[self_idx];
    let (origin, mins, maxs) = (e.s.origin, e.mins, e.maxs);
    let enemy_eye = eye_point(&ctx.edicts[enemy]);
    let lift = [0.0, 0.0, STEPSIZE];

    for dist in COVER_PROBES {
        for k in 0..8 {
            let yaw = (k as f32 * 45.0).to_radians();
            let spot = [origin[0] + yaw.cos() * dist, origin[1] + yaw.sin() * dist, origin[2]];

            // a clear path at step height
            let from = vector_add(&origin, &lift);
            let to = vector_add(&spot, &lift);
            let path = trace(ctx, &from, &mins, &maxs, &to, self_idx as i32, MASK_MONSTERSOLID);
            if path.startsolid || path.fraction < 1.0 {
                continue;
            }
            // floor under it
            let below = [spot[0], spot[1], spot[2] - STEPSIZE];
            let floor = trace(ctx, &to, &mins, &maxs, &below, self_idx as i32, MASK_MONSTERSOLID);
            if floor.fraction == 1.0 {
                continue;
            }
            let eye = [spot[0], spot[1], spot[2] + maxs[2] - 8.0];
            let los = trace_line_opaque(ctx, &enemy_eye, &eye, enemy as i32);
            if los.fraction < 1.0 {
                return Some(spot);
            }
        }
    }
    None
}

/// Move toward cover while wounded. Returns true when this tick was spent
/// moving; a monster already in cover holds there until its hold expires.
pub fn cover_step(ctx: &mut GameCtx, self_idx: usize, enemy: usize) -> GameResult<bool> {
    let time = ctx.level.time;
    let (origin, wounded, mi) = {
        let e = &ctx.edicts[self_idx];
        (e.s.origin, health_fraction(e) < COVER_HEALTH_FRACTION, e.monsterinfo.clone())
    };

    if mi.aiflags.contains(AiFlags::IN_COVER) {
        if mi.cover_check_time <= time || mi.squad_order == SquadOrder::Advance {
            let mi = &mut ctx.edicts[self_idx].monsterinfo;
            mi.aiflags.remove(AiFlags::IN_COVER);
            mi.cover_check_time = time + COVER_RECHECK;
        }
        return Ok(false);
    }

    if let Some(goal) = mi.cover_goal {
        let flat = [goal[0] - origin[0], goal[1] - origin[1], 0.0];
        if vector_length(&flat) < COVER_REACHED {
            let mi = &mut ctx.edicts[self_idx].monsterinfo;
            mi.cover_goal = None;
            mi.aiflags.insert(AiFlags::IN_COVER);
            mi.cover_check_time = time + COVER_HOLD;
            trace!("monster {} in cover", self_idx);
            return Ok(false);
        }
        if mi.cover_check_time <= time {
            // never got there
            let mi = &mut ctx.edicts[self_idx].monsterinfo;
            mi.cover_goal = None;
            mi.cover_check_time = time + COVER_RECHECK;
            return Ok(false);
        }
        let step = mi.run_speed * ctx.frametime();
        move_to_goal(ctx, self_idx, &goal, step)?;
        return Ok(true);
    }

    if !wounded || mi.cover_check_time > time || tier(ctx, self_idx) < Toughness::Medium {
        return Ok(false);
    }
    ctx.edicts[self_idx].monsterinfo.cover_check_time = time + COVER_RECHECK;
    let Some(spot) = find_cover(ctx, self_idx, enemy) else {
        return Ok(false);
    };

    debug!("monster {} taking cover at {:?}", self_idx, spot);
    {
        let mi = &mut ctx.edicts[self_idx].monsterinfo;
        mi.cover_goal = Some(spot);
        mi.cover_check_time = time + COVER_TIMEOUT;
    }
    let step = mi.run_speed * ctx.frametime();
    move_to_goal(ctx, self_idx, &spot, step)?;
    Ok(true)
}

// ============================================================
// Suppression
// ============================================================

/// Blind fire at the last sighting after losing the target. Returns true
/// while a burst window is open.
pub fn try_suppress(ctx: &mut GameCtx, self_idx: usize) -> GameResult<bool> {
    if tier(ctx, self_idx) < Toughness::High {
        return Ok(false);
    }
    let time = ctx.level.time;
    {
        let mi = &mut ctx.edicts[self_idx].monsterinfo;
        if mi.suppress_until <= time {
            if mi.suppress_time > time {
                mi.aiflags.remove(AiFlags::SUPPRESSING);
                return Ok(false);
            }
            mi.suppress_until = time + SUPPRESS_DURATION;
            mi.suppress_time = time + SUPPRESS_COOLDOWN;
            mi.aiflags.insert(AiFlags::SUPPRESSING);
            debug!("monster {} suppressing", self_idx);
        }
    }

    let (target, attack_finished) = {
        let mi = &ctx.edicts[self_idx].monsterinfo;
        (mi.last_sighting, mi.attack_finished)
    };
    if attack_finished <= time {
        monster_fire(ctx, self_idx, &target, SUPPRESS_SPREAD)?;
        ctx.edicts[self_idx].monsterinfo.attack_finished = time + ATTACK_INTERVAL * 0.5;
    }
    Ok(true)
}

// ============================================================
// Approach
// ============================================================

/// Where to run when closing on the enemy. Heavier monsters swing out to
/// the side their slot parity picks.
pub fn flank_goal(ctx: &GameCtx, self_idx: usize, enemy: usize) -> Vec3 {
    let e = &ctx.edicts[self_idx];
    let enemy_origin = ctx.edicts[enemy].s.origin;
    if e.monsterinfo.tier < Toughness::Medium {
        return enemy_origin;
    }
    let mut to = vector_subtract(&enemy_origin, &e.s.origin);
    to[2] = 0.0;
    let dist = vector_normalize(&mut to);
    if dist < FLANK_MIN_RANGE {
        return enemy_origin;
    }
    let side = if e.monsterinfo.flank_side != 0.0 {
        e.monsterinfo.flank_side
    } else if self_idx % 2 == 0 {
        1.0
    } else {
        -1.0
    };
    let right = [to[1], -to[0], 0.0];
    vector_ma(&enemy_origin, side * (dist * 0.5).min(FLANK_OFFSET), &right)
}

/// Goal offset pushing away from squadmates on the same target that are
/// standing too close.
pub fn separation(ctx: &GameCtx, self_idx: usize) -> Vec3 {
    let e = &ctx.edicts[self_idx];
    let Some(enemy) = e.enemy else {
        return VEC3_ORIGIN;
    };
    let origin = e.s.origin;
    let mut push = VEC3_ORIGIN;
    for i in allies_near(ctx, self_idx, &origin, SEPARATION_DISTANCE) {
        let other = &ctx.edicts[i];
        if other.enemy != Some(enemy) {
            continue;
        }
        let mut away = vector_subtract(&origin, &other.s.origin);
        away[2] = 0.0;
        let d = vector_normalize(&mut away);
        if d == 0.0 {
            // stacked exactly; split by slot order
            away = if self_idx < i { [0.0, 1.0, 0.0] } else { [0.0, -1.0, 0.0] };
        }
        push = vector_ma(&push, (SEPARATION_DISTANCE - d) * 2.0, &away);
    }
    push
}

// ============================================================
// Squad
// ============================================================

/// Every few seconds, tell the squad where the enemy was last seen.
pub fn squad_callout(ctx: &mut GameCtx, self_idx: usize) {
    let time = ctx.level.time;
    if ctx.edicts[self_idx].monsterinfo.callout_time > time {
        return;
    }
    let Some(enemy) = valid_enemy(ctx, self_idx) else {
        return;
    };
    ctx.edicts[self_idx].monsterinfo.callout_time = time + CALLOUT_INTERVAL;

    alert_allies(ctx, self_idx);

    let origin = ctx.edicts[self_idx].s.origin;
    let sighting = ctx.edicts[self_idx].monsterinfo.last_sighting;
    let handle = ctx.handle_of(enemy);
    for i in allies_near(ctx, self_idx, &origin, SQUAD_RADIUS) {
        let ally = &mut ctx.edicts[i];
        if ally.enemy == Some(handle) && ally.monsterinfo.aiflags.contains(AiFlags::LOST_SIGHT) {
            ally.monsterinfo.last_sighting = sighting;
            ally.monsterinfo.aiflags.remove(AiFlags::PURSUIT_LAST_SEEN);
        }
    }

    let snd = ctx.configstrings.sound_index("soldier/callout.wav");
    ctx.gi.play_sound(self_idx as i32, CHAN_VOICE, snd, 1.0, ATTN_NORM, 0.0);
}

/// A leader tells nearby squadmates on the same target to advance or hold.
pub fn leader_orders(ctx: &mut GameCtx, self_idx: usize, enemy: usize) {
    let time = ctx.level.time;
    let leads = tier(ctx, self_idx) == Toughness::Elite || class_flags(ctx, self_idx).contains(ClassFlags::LEADER);
    if !leads || ctx.edicts[self_idx].monsterinfo.order_time > time {
        return;
    }
    ctx.edicts[self_idx].monsterinfo.order_time = time + ORDER_INTERVAL;

    let order = if range(ctx, self_idx, enemy) > ctx.edicts[self_idx].monsterinfo.attack_range {
        SquadOrder::Advance
    } else {
        SquadOrder::Hold
    };
    let origin = ctx.edicts[self_idx].s.origin;
    let handle = ctx.handle_of(enemy);
    for i in allies_near(ctx, self_idx, &origin, SQUAD_RADIUS) {
        if ctx.edicts[i].enemy == Some(handle) {
            ctx.edicts[i].monsterinfo.squad_order = order;
        }
    }
    trace!("monster {} orders {:?}", self_idx, order);
}

// ============================================================
// Grenades
// ============================================================

/// Lob a grenade at the enemy, or where it was last seen. Returns true if
/// one was thrown.
pub fn try_grenade(ctx: &mut GameCtx, self_idx: usize, enemy: usize) -> GameResult<bool> {
    if tier(ctx, self_idx) < Toughness::High || !class_flags(ctx, self_idx).contains(ClassFlags::GRENADES) {
        return Ok(false);
    }
    let time = ctx.level.time;
    let (origin, grenade_time, lost, last) = {
        let e = &ctx.edicts[self_idx];
        let mi = &e.monsterinfo;
        (e.s.origin, mi.grenade_time, mi.aiflags.contains(AiFlags::LOST_SIGHT), mi.last_sighting)
    };
    if grenade_time > time {
        return Ok(false);
    }
    let target = if lost { last } else { ctx.edicts[enemy].s.origin };
    let dist = distance(&origin, &target);
    if dist <= GRENADE_MIN_RANGE || dist > GRENADE_MAX_RANGE {
        return Ok(false);
    }

    let mut start = muzzle(ctx, self_idx);
    start[2] += 8.0;
    let velocity = ballistic_velocity(&start, &target, GRENADE_THROW_SPEED, ctx.sv_gravity);
    let damage = WeaponKind::Grenade.info().damage;
    let fuse = ctx.grenade_fuse;
    fire_grenade(ctx, self_idx, &start, &velocity, damage, fuse, GRENADE_RADIUS, WeaponKind::Grenade)?;

    {
        let mi = &mut ctx.edicts[self_idx].monsterinfo;
        mi.grenade_time = time + GRENADE_COOLDOWN;
        mi.attack_finished = time + ATTACK_INTERVAL;
    }
    let snd = ctx.configstrings.sound_index("soldier/grenade.wav");
    ctx.gi.play_sound(self_idx as i32, CHAN_WEAPON, snd, 1.0, ATTN_NORM, 0.0);
    debug!("monster {} throws a grenade {:.0} units", self_idx, dist);
    Ok(true)
}

// ============================================================
// Dodging
// ============================================================

/// Sidestep when the target is aiming right at us. Returns true if a step
/// was taken.
pub fn try_dodge(ctx: &mut GameCtx, self_idx: usize, enemy: usize) -> GameResult<bool> {
    if tier(ctx, self_idx) < Toughness::High || !class_flags(ctx, self_idx).contains(ClassFlags::DODGE) {
        return Ok(false);
    }
    let time = ctx.level.time;
    if ctx.edicts[self_idx].monsterinfo.dodge_time > time {
        return Ok(false);
    }
    let Some(client) = ctx.client_of(enemy) else {
        return Ok(false);
    };

    let (aim, _, _) = angle_vectors_tuple(&client.v_angle);
    let origin = ctx.edicts[self_idx].s.origin;
    let enemy_origin = ctx.edicts[enemy].s.origin;
    let mut to_me = vector_subtract(&origin, &eye_point(&ctx.edicts[enemy]));
    let dist = vector_normalize(&mut to_me);
    if dist > DODGE_RANGE || dot_product(&aim, &to_me) < DODGE_CONE {
        return Ok(false);
    }

    ctx.edicts[self_idx].monsterinfo.dodge_time = time + DODGE_COOLDOWN;
    if ctx.random() >= DODGE_CHANCE {
        return Ok(false);
    }

    let base = vectoyaw(&vector_subtract(&enemy_origin, &origin));
    let side = if ctx.random() < 0.5 { 90.0 } else { -90.0 };
    let moved = walkmove(ctx, self_idx, anglemod(base + side), DODGE_STEP)?
        || walkmove(ctx, self_idx, anglemod(base - side), DODGE_STEP)?;
    if moved {
        trace!("monster {} dodges", self_idx);
    }
    Ok(moved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::g_combat::t_damage;
    use crate::g_utils::test_support::{make_monster, make_player, test_ctx};
    use crate::m_move::m_check_ground;
    use crate::m_soldier::MonsterClass;
    use sofsim_common::cmodel::Brush;

    fn floor_ctx() -> GameCtx {
        let mut ctx = test_ctx();
        ctx.world.add_brush(Brush::solid([-2048.0, -2048.0, -64.0], [2048.0, 2048.0, 0.0]));
        ctx
    }

    fn monster(ctx: &mut GameCtx, class: MonsterClass, x: f32, y: f32) -> usize {
        let m = make_monster(ctx, [x, y, 24.0], 100);
        ctx.edicts[m].health = 0;
        ctx.edicts[m].classname = class.info().classname.to_string();
        class.apply(&mut ctx.edicts[m]);
        m_check_ground(ctx, m);
        m
    }

    fn live_grenades(ctx: &GameCtx) -> Vec<usize> {
        (0..ctx.edicts.len())
            .filter(|&i| ctx.edicts[i].inuse && ctx.edicts[i].classname == "grenade")
            .collect()
    }

    fn fighting(ctx: &mut GameCtx, m: usize, enemy: usize) {
        ctx.edicts[m].enemy = Some(ctx.handle_of(enemy));
        ctx.edicts[m].monsterinfo.ai_state = AiState::Chase;
    }

    // ============================================================
    // Morale
    // ============================================================

    #[test]
    fn test_ally_death_noticed_only_nearby() {
        let mut ctx = floor_ctx();
        let dead = monster(&mut ctx, MonsterClass::Soldier, 0.0, 0.0);
        let near = monster(&mut ctx, MonsterClass::Soldier, 200.0, 0.0);
        let far = monster(&mut ctx, MonsterClass::Soldier, 1000.0, 0.0);
        note_ally_death(&mut ctx, dead);
        assert_eq!(ctx.edicts[near].monsterinfo.allies_lost, 1);
        assert_eq!(ctx.edicts[far].monsterinfo.allies_lost, 0);
    }

    #[test]
    fn test_losses_fade_after_the_fight() {
        let mut ctx = floor_ctx();
        let p = make_player(&mut ctx, [300.0, 0.0, 24.0]);
        let weak = monster(&mut ctx, MonsterClass::SoldierLight, 0.0, 0.0);
        ctx.edicts[weak].monsterinfo.allies_lost = 4;
        assert!(should_flee(&ctx, weak));

        fighting(&mut ctx, weak, p);
        go_idle(&mut ctx, weak).unwrap();
        assert_eq!(ctx.edicts[weak].monsterinfo.allies_lost, 2);
        go_idle(&mut ctx, weak).unwrap();
        go_idle(&mut ctx, weak).unwrap();
        assert_eq!(ctx.edicts[weak].monsterinfo.allies_lost, 0);
        assert!(!should_flee(&ctx, weak));
    }

    #[test]
    fn test_flee_on_low_health() {
        let mut ctx = floor_ctx();
        let m = monster(&mut ctx, MonsterClass::Soldier, 0.0, 0.0);
        assert!(!should_flee(&ctx, m));
        ctx.edicts[m].health = 15;
        assert!(should_flee(&ctx, m));
    }

    #[test]
    fn test_flee_on_squad_losses_only_for_weak_tiers() {
        let mut ctx = floor_ctx();
        let weak = monster(&mut ctx, MonsterClass::SoldierLight, 0.0, 0.0);
        let tough = monster(&mut ctx, MonsterClass::SoldierSs, 0.0, 100.0);
        monster(&mut ctx, MonsterClass::Soldier, 100.0, 0.0);
        ctx.edicts[weak].monsterinfo.allies_lost = 2;
        ctx.edicts[tough].monsterinfo.allies_lost = 5;
        // two lost, two still standing nearby: exactly half is not enough
        assert!(!should_flee(&ctx, weak));
        ctx.edicts[weak].monsterinfo.allies_lost = 3;
        assert!(should_flee(&ctx, weak));
        assert!(!should_flee(&ctx, tough));
    }

    #[test]
    fn test_flee_goal_points_away() {
        let mut ctx = floor_ctx();
        let m = monster(&mut ctx, MonsterClass::Soldier, 0.0, 0.0);
        let p = make_player(&mut ctx, [300.0, 0.0, 24.0]);
        let goal = flee_goal(&ctx, m, p);
        assert!(goal[0] < 0.0);
    }

    #[test]
    fn test_surrender_low_tier_only() {
        let mut ctx = floor_ctx();
        let p = make_player(&mut ctx, [300.0, 0.0, 24.0]);
        let weak = monster(&mut ctx, MonsterClass::SoldierLight, 0.0, 0.0);
        let regular = monster(&mut ctx, MonsterClass::Soldier, 0.0, 200.0);
        for m in [weak, regular] {
            fighting(&mut ctx, m, p);
            ctx.edicts[m].health = 5;
        }
        assert!(check_surrender(&mut ctx, weak).unwrap());
        assert!(!check_surrender(&mut ctx, regular).unwrap());

        let e = &ctx.edicts[weak];
        assert!(e.monsterinfo.aiflags.contains(AiFlags::SURRENDERED));
        assert_eq!(e.monsterinfo.ai_state, AiState::Idle);
        assert!(e.enemy.is_none());
    }

    #[test]
    fn test_surrendered_monster_stays_killable_and_passive() {
        let mut ctx = floor_ctx();
        let p = make_player(&mut ctx, [300.0, 0.0, 24.0]);
        let m = monster(&mut ctx, MonsterClass::SoldierLight, 0.0, 0.0);
        fighting(&mut ctx, m, p);
        ctx.edicts[m].health = 10;
        assert!(check_surrender(&mut ctx, m).unwrap());

        t_damage(&mut ctx, m, p, p, &[-1.0, 0.0, 0.0], &VEC3_ORIGIN, &VEC3_ORIGIN, 4, 0, DamageFlags::empty(), MeansOfDeath::Unknown).unwrap();
        assert_eq!(ctx.edicts[m].health, 6);
        assert!(ctx.edicts[m].enemy.is_none());
        assert!(!crate::g_ai::find_target(&mut ctx, m));

        t_damage(&mut ctx, m, p, p, &[-1.0, 0.0, 0.0], &VEC3_ORIGIN, &VEC3_ORIGIN, 20, 0, DamageFlags::empty(), MeansOfDeath::Unknown).unwrap();
        assert_eq!(ctx.edicts[m].deadflag, DeadFlag::Dead);
    }

    // ============================================================
    // Cover
    // ============================================================

    #[test]
    fn test_no_cover_in_open_field() {
        let mut ctx = floor_ctx();
        let m = monster(&mut ctx, MonsterClass::Soldier, 0.0, 0.0);
        let p = make_player(&mut ctx, [400.0, 0.0, 24.0]);
        assert_eq!(find_cover(&ctx, m, p), None);
    }

    #[test]
    fn test_cover_behind_pillar() {
        let mut ctx = floor_ctx();
        let m = monster(&mut ctx, MonsterClass::Soldier, 0.0, 0.0);
        let p = make_player(&mut ctx, [400.0, 0.0, 24.0]);
        ctx.world.add_brush(Brush::solid([150.0, 60.0, 0.0], [200.0, 200.0, 200.0]));
        let spot = find_cover(&ctx, m, p).expect("cover");
        assert!(spot[1] > 0.0);
        let eye = [spot[0], spot[1], spot[2] + 24.0];
        let tr = trace_line_opaque(&ctx, &eye_point(&ctx.edicts[p]), &eye, p as i32);
        assert!(tr.fraction < 1.0);
    }

    #[test]
    fn test_wounded_monster_moves_to_cover() {
        let mut ctx = floor_ctx();
        let m = monster(&mut ctx, MonsterClass::Soldier, 0.0, 0.0);
        let p = make_player(&mut ctx, [400.0, 0.0, 24.0]);
        ctx.world.add_brush(Brush::solid([150.0, 60.0, 0.0], [200.0, 200.0, 200.0]));
        fighting(&mut ctx, m, p);

        assert!(!cover_step(&mut ctx, m, p).unwrap());
        ctx.edicts[m].health = 40;
        assert!(cover_step(&mut ctx, m, p).unwrap());
        assert!(ctx.edicts[m].monsterinfo.cover_goal.is_some());
    }

    #[test]
    fn test_reaching_cover_holds_then_releases() {
        let mut ctx = floor_ctx();
        let m = monster(&mut ctx, MonsterClass::Soldier, 0.0, 0.0);
        let p = make_player(&mut ctx, [400.0, 0.0, 24.0]);
        ctx.edicts[m].monsterinfo.cover_goal = Some([10.0, 0.0, 24.0]);
        ctx.edicts[m].monsterinfo.cover_check_time = 4.0;

        assert!(!cover_step(&mut ctx, m, p).unwrap());
        assert!(ctx.edicts[m].monsterinfo.aiflags.contains(AiFlags::IN_COVER));

        ctx.level.time = 10.0;
        cover_step(&mut ctx, m, p).unwrap();
        assert!(!ctx.edicts[m].monsterinfo.aiflags.contains(AiFlags::IN_COVER));
    }

    // ============================================================
    // Suppression
    // ============================================================

    #[test]
    fn test_suppression_window_for_tough_monsters() {
        let mut ctx = floor_ctx();
        let tough = monster(&mut ctx, MonsterClass::SoldierSs, 0.0, 0.0);
        let regular = monster(&mut ctx, MonsterClass::Soldier, 0.0, 200.0);
        ctx.edicts[tough].monsterinfo.last_sighting = [400.0, 0.0, 24.0];

        assert!(!try_suppress(&mut ctx, regular).unwrap());
        assert!(try_suppress(&mut ctx, tough).unwrap());
        assert!(ctx.edicts[tough].monsterinfo.aiflags.contains(AiFlags::SUPPRESSING));
        assert!(ctx.edicts[tough].monsterinfo.attack_finished > 0.0);

        // burst ends, cooldown blocks a new one
        ctx.level.time = SUPPRESS_DURATION + 0.1;
        assert!(!try_suppress(&mut ctx, tough).unwrap());
        ctx.level.time = SUPPRESS_COOLDOWN + 0.1;
        assert!(try_suppress(&mut ctx, tough).unwrap());
    }

    // ============================================================
    // Approach
    // ============================================================

    #[test]
    fn test_flank_sides_follow_slot_parity() {
        let mut ctx = floor_ctx();
        let a = monster(&mut ctx, MonsterClass::Soldier, 0.0, 0.0);
        let b = monster(&mut ctx, MonsterClass::Soldier, 0.0, 0.0);
        let p = make_player(&mut ctx, [800.0, 0.0, 24.0]);
        let ga = flank_goal(&ctx, a, p);
        let gb = flank_goal(&ctx, b, p);
        assert!(ga[1] * gb[1] < 0.0);
        assert!((ga[1].abs() - FLANK_OFFSET).abs() < 0.01);
    }

    #[test]
    fn test_weak_or_close_monsters_go_straight() {
        let mut ctx = floor_ctx();
        let weak = monster(&mut ctx, MonsterClass::SoldierLight, 0.0, 0.0);
        let close = monster(&mut ctx, MonsterClass::Soldier, 700.0, 0.0);
        let p = make_player(&mut ctx, [800.0, 0.0, 24.0]);
        assert_eq!(flank_goal(&ctx, weak, p), ctx.edicts[p].s.origin);
        assert_eq!(flank_goal(&ctx, close, p), ctx.edicts[p].s.origin);
    }

    #[test]
    fn test_separation_pushes_apart() {
        let mut ctx = floor_ctx();
        let a = monster(&mut ctx, MonsterClass::Soldier, 0.0, 0.0);
        let b = monster(&mut ctx, MonsterClass::Soldier, 40.0, 0.0);
        let p = make_player(&mut ctx, [0.0, 600.0, 24.0]);
        assert_eq!(separation(&ctx, a), VEC3_ORIGIN);
        fighting(&mut ctx, a, p);
        fighting(&mut ctx, b, p);
        assert!(separation(&ctx, a)[0] < 0.0);
        assert!(separation(&ctx, b)[0] > 0.0);
    }

    // ============================================================
    // Squad
    // ============================================================

    #[test]
    fn test_callout_shares_last_sighting() {
        let mut ctx = floor_ctx();
        let caller = monster(&mut ctx, MonsterClass::Soldier, 0.0, 0.0);
        let mate = monster(&mut ctx, MonsterClass::Soldier, 200.0, 0.0);
        let idle = monster(&mut ctx, MonsterClass::Soldier, 0.0, 200.0);
        let p = make_player(&mut ctx, [400.0, 300.0, 24.0]);
        fighting(&mut ctx, caller, p);
        fighting(&mut ctx, mate, p);
        ctx.edicts[caller].monsterinfo.last_sighting = [400.0, 300.0, 24.0];
        ctx.edicts[mate].monsterinfo.aiflags.insert(AiFlags::LOST_SIGHT);

        squad_callout(&mut ctx, caller);
        assert_eq!(ctx.edicts[mate].monsterinfo.last_sighting, [400.0, 300.0, 24.0]);
        assert_eq!(ctx.edicts[idle].monsterinfo.ai_state, AiState::Alert);

        // on cooldown
        ctx.edicts[mate].monsterinfo.last_sighting = VEC3_ORIGIN;
        squad_callout(&mut ctx, caller);
        assert_eq!(ctx.edicts[mate].monsterinfo.last_sighting, VEC3_ORIGIN);
    }

    #[test]
    fn test_leader_orders_advance_then_hold() {
        let mut ctx = floor_ctx();
        let boss = monster(&mut ctx, MonsterClass::Boss, 0.0, 0.0);
        let grunt = monster(&mut ctx, MonsterClass::Soldier, 0.0, 100.0);
        let p = make_player(&mut ctx, [900.0, 0.0, 24.0]);
        fighting(&mut ctx, boss, p);
        fighting(&mut ctx, grunt, p);

        leader_orders(&mut ctx, boss, p);
        assert_eq!(ctx.edicts[grunt].monsterinfo.squad_order, SquadOrder::Advance);

        ctx.edicts[p].s.origin = [300.0, 0.0, 24.0];
        ctx.level.time = ORDER_INTERVAL;
        leader_orders(&mut ctx, boss, p);
        assert_eq!(ctx.edicts[grunt].monsterinfo.squad_order, SquadOrder::Hold);
    }

    #[test]
    fn test_grunts_do_not_give_orders() {
        let mut ctx = floor_ctx();
        let grunt = monster(&mut ctx, MonsterClass::Soldier, 0.0, 0.0);
        let other = monster(&mut ctx, MonsterClass::Soldier, 0.0, 100.0);
        let p = make_player(&mut ctx, [900.0, 0.0, 24.0]);
        fighting(&mut ctx, grunt, p);
        fighting(&mut ctx, other, p);
        leader_orders(&mut ctx, grunt, p);
        assert_eq!(ctx.edicts[other].monsterinfo.squad_order, SquadOrder::None);
    }

    // ============================================================
    // Grenades
    // ============================================================

    #[test]
    fn test_grenade_thrown_at_range_with_cooldown() {
        let mut ctx = floor_ctx();
        let m = monster(&mut ctx, MonsterClass::SoldierSs, 0.0, 0.0);
        let p = make_player(&mut ctx, [500.0, 0.0, 24.0]);
        fighting(&mut ctx, m, p);

        assert!(try_grenade(&mut ctx, m, p).unwrap());
        let grenades = live_grenades(&ctx);
        assert_eq!(grenades.len(), 1);
        let g = &ctx.edicts[grenades[0]];
        assert!(g.velocity[0] > 0.0);
        assert!(g.velocity[2] > 0.0);
        assert!(!try_grenade(&mut ctx, m, p).unwrap());
    }

    #[test]
    fn test_no_grenade_up_close_or_without_training() {
        let mut ctx = floor_ctx();
        let ss = monster(&mut ctx, MonsterClass::SoldierSs, 0.0, 0.0);
        let grunt = monster(&mut ctx, MonsterClass::Soldier, 0.0, 100.0);
        let p = make_player(&mut ctx, [200.0, 0.0, 24.0]);
        assert!(!try_grenade(&mut ctx, ss, p).unwrap());
        ctx.edicts[p].s.origin = [500.0, 0.0, 24.0];
        assert!(!try_grenade(&mut ctx, grunt, p).unwrap());
    }

    #[test]
    fn test_grenade_aims_at_last_sighting_when_lost() {
        let mut ctx = floor_ctx();
        let m = monster(&mut ctx, MonsterClass::SoldierSs, 0.0, 0.0);
        let p = make_player(&mut ctx, [100.0, 0.0, 24.0]);
        fighting(&mut ctx, m, p);
        ctx.edicts[m].monsterinfo.aiflags.insert(AiFlags::LOST_SIGHT);
        ctx.edicts[m].monsterinfo.last_sighting = [0.0, -500.0, 24.0];
        assert!(try_grenade(&mut ctx, m, p).unwrap());
        let g = live_grenades(&ctx)[0];
        assert!(ctx.edicts[g].velocity[1] < 0.0);
    }

    // ============================================================
    // Dodging
    // ============================================================

    #[test]
    fn test_dodge_only_when_aimed_at() {
        let mut ctx = floor_ctx();
        let m = monster(&mut ctx, MonsterClass::SoldierSs, 0.0, 0.0);
        let p = make_player(&mut ctx, [300.0, 0.0, 24.0]);
        ctx.clients[0].v_angle = [0.0, 0.0, 0.0];
        for _ in 0..20 {
            ctx.edicts[m].monsterinfo.dodge_time = 0.0;
            assert!(!try_dodge(&mut ctx, m, p).unwrap());
        }

        ctx.clients[0].v_angle = [0.0, 180.0, 0.0];
        let start = ctx.edicts[m].s.origin;
        let mut dodged = false;
        for _ in 0..50 {
            ctx.edicts[m].monsterinfo.dodge_time = 0.0;
            if try_dodge(&mut ctx, m, p).unwrap() {
                dodged = true;
                break;
            }
        }
        assert!(dodged);
        let moved = vector_subtract(&ctx.edicts[m].s.origin, &start);
        assert!(moved[1].abs() > 16.0);
        assert!(moved[0].abs() < 1.0);
    }

    #[test]
    fn test_regular_soldier_never_dodges() {
        let mut ctx = floor_ctx();
        let m = monster(&mut ctx, MonsterClass::Soldier, 0.0, 0.0);
        let p = make_player(&mut ctx, [300.0, 0.0, 24.0]);
        ctx.clients[0].v_angle = [0.0, 180.0, 0.0];
        for _ in 0..20 {
            assert!(!try_dodge(&mut ctx, m, p).unwrap());
        }
    }
}
