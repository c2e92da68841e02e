// g_ai.rs — monster behaviour state machine

use log::{debug, trace};

use crate::dispatch::ThinkKind;
use crate::g_error::GameResult;
use crate::g_local::*;
use crate::g_utils::{g_free_edict, use_targets};
use crate::g_world::{area_edicts, link_entity, trace_line_opaque};
use crate::game_import::{EffectKind, ATTN_NORM, CHAN_BODY, CHAN_VOICE};
use crate::m_move::{change_yaw, move_to_goal};
use crate::m_soldier::{monster_attack, monster_melee};
use crate::m_tactics;

/// Idle allies inside this radius join a fight.
pub const ALERT_RADIUS: f32 = 512.0;
/// Stun after a hit. Doubled for heavy hits.
pub const PAIN_TIME: f32 = 0.5;
pub const HEAVY_PAIN_DAMAGE: i32 = 30;
/// Corpses start sinking this long after death.
pub const CORPSE_TIME: f32 = 10.0;
/// A chase is abandoned past this share of sight range.
pub const DISENGAGE_FRACTION: f32 = 0.8;

const IDLE_THINK: f32 = 0.5;
const PATROL_SPEED_SCALE: f32 = 0.4;
const CORNER_RADIUS: f32 = 32.0;
const SINK_STEPS: i32 = 10;
const SINK_DEPTH: f32 = 24.0;

// ============================================================
// Perception
// ============================================================

/// Eye position of any entity with a bounding box.
pub fn eye_point(e: &Edict) -> Vec3 {
    [e.s.origin[0], e.s.origin[1], e.s.origin[2] + e.maxs[2] - 8.0]
}

/// Returns true if `other` is visible to `self_idx`, even if not infront().
pub fn visible(ctx: &GameCtx, self_idx: usize, other: usize) -> bool {
    let spot1 = eye_point(&ctx.edicts[self_idx]);
    let spot2 = eye_point(&ctx.edicts[other]);
    let tr = trace_line_opaque(ctx, &spot1, &spot2, self_idx as i32);
    tr.fraction == 1.0 || tr.ent_index == other as i32
}

/// Returns true if `other` is in front of `self_idx`'s facing.
pub fn infront(ctx: &GameCtx, self_idx: usize, other: usize) -> bool {
    let me = &ctx.edicts[self_idx];
    let (forward, _, _) = angle_vectors_tuple(&me.s.angles);
    let mut vec = vector_subtract(&ctx.edicts[other].s.origin, &me.s.origin);
    vector_normalize(&mut vec);
    dot_product(&vec, &forward) > 0.3
}

pub fn range(ctx: &GameCtx, self_idx: usize, other: usize) -> f32 {
    distance(&ctx.edicts[self_idx].s.origin, &ctx.edicts[other].s.origin)
}

/// Multiplier on a monster's sight range against this target. Low and
/// still targets are harder to spot, sprinting ones easier.
pub fn stealth_scale(ctx: &GameCtx, target: usize) -> f32 {
    let Some(client) = ctx.client_of(target) else {
        return 1.0;
    };
    let mut scale = match client.stance {
        Stance::Stand => 1.0,
        Stance::Crouch => 0.6,
        Stance::Prone => 0.4,
    };
    let v = &ctx.edicts[target].velocity;
    let speed = (v[0] * v[0] + v[1] * v[1]).sqrt();
    if client.sprinting {
        scale *= 1.5;
    } else if speed < 50.0 {
        scale *= 0.8;
    }
    if client.flashlight {
        scale *= 1.25;
    }
    scale
}

/// The current enemy, if it is still worth fighting.
pub fn valid_enemy(ctx: &GameCtx, self_idx: usize) -> Option<usize> {
    ctx.resolve_opt(ctx.edicts[self_idx].enemy)
        .filter(|&e| ctx.edicts[e].is_alive())
}

/// Look for a player to fight. Sets the enemy and returns true on success.
pub fn find_target(ctx: &mut GameCtx, self_idx: usize) -> bool {
    let (origin, sight, surrendered) = {
        let e = &ctx.edicts[self_idx];
        (
            e.s.origin,
            e.monsterinfo.sight_range,
            e.monsterinfo.aiflags.contains(AiFlags::SURRENDERED),
        )
    };
    if surrendered {
        return false;
    }

    let mut best: Option<(usize, f32)> = None;
    for i in 1..=ctx.game.maxclients {
        let Some(ent) = ctx.edicts.get(i) else {
            break;
        };
        if ent.client.is_none() || !ent.is_alive() || ent.flags.contains(EntityFlags::NOTARGET) {
            continue;
        }
        let dist = distance(&origin, &ent.s.origin);
        if dist > sight * stealth_scale(ctx, i) {
            continue;
        }
        // things behind us are only noticed up close
        if dist > MELEE_DISTANCE * 2.0 && !infront(ctx, self_idx, i) {
            continue;
        }
        if !visible(ctx, self_idx, i) {
            continue;
        }
        if best.map_or(true, |(_, d)| dist < d) {
            best = Some((i, dist));
        }
    }

    let Some((target, _)) = best else {
        return false;
    };
    ctx.edicts[self_idx].enemy = Some(ctx.handle_of(target));
    found_target(ctx, self_idx);
    true
}

/// Record a freshly acquired enemy. The state change itself happens on the
/// monster's own think.
pub fn found_target(ctx: &mut GameCtx, self_idx: usize) {
    let Some(enemy) = ctx.resolve_opt(ctx.edicts[self_idx].enemy) else {
        return;
    };
    let enemy_origin = ctx.edicts[enemy].s.origin;
    let e = &mut ctx.edicts[self_idx];
    e.monsterinfo.last_sighting = enemy_origin;
    e.monsterinfo.aiflags.remove(AiFlags::LOST_SIGHT | AiFlags::PURSUIT_LAST_SEEN);
    e.ideal_yaw = vectoyaw(&vector_subtract(&enemy_origin, &e.s.origin));
    trace!("{} ({}) targets {}", e.classname, self_idx, enemy);
}

/// Wake idle monsters around `self_idx` straight into Alert against the
/// same enemy.
pub fn alert_allies(ctx: &mut GameCtx, self_idx: usize) {
    let Some(enemy) = ctx.resolve_opt(ctx.edicts[self_idx].enemy) else {
        return;
    };
    let origin = ctx.edicts[self_idx].s.origin;
    let radius = [ALERT_RADIUS; 3];
    let mins = vector_subtract(&origin, &radius);
    let maxs = vector_add(&origin, &radius);
    let handle = ctx.handle_of(enemy);
    let sighting = ctx.edicts[enemy].s.origin;
    let wake = ctx.level.time + ctx.frametime();

    for i in area_edicts(ctx, &mins, &maxs, AREA_SOLID) {
        if i == self_idx {
            continue;
        }
        let ally = &mut ctx.edicts[i];
        if !ally.is_monster()
            || !ally.is_alive()
            || ally.monsterinfo.ai_state != AiState::Idle
            || ally.monsterinfo.aiflags.contains(AiFlags::SURRENDERED)
        {
            continue;
        }
        if distance(&ally.s.origin, &origin) > ALERT_RADIUS {
            continue;
        }
        ally.enemy = Some(handle);
        ally.monsterinfo.last_sighting = sighting;
        ally.monsterinfo.ai_state = AiState::Alert;
        if ally.think == Some(ThinkKind::MonsterAi) {
            ally.nextthink = wake;
        }
        trace!("{} alerted by {}", i, self_idx);
    }
}

// ============================================================
// State helpers
// ============================================================

/// Move to `to` if the state machine allows it.
pub(crate) fn set_state(ctx: &mut GameCtx, self_idx: usize, to: AiState) -> bool {
    let mi = &mut ctx.edicts[self_idx].monsterinfo;
    if mi.ai_state == to {
        return true;
    }
    if !mi.ai_state.can_transition(to) {
        debug!("monster {}: refused {:?} -> {:?}", self_idx, mi.ai_state, to);
        return false;
    }
    trace!("monster {}: {:?} -> {:?}", self_idx, mi.ai_state, to);
    mi.ai_state = to;
    true
}

fn schedule(ctx: &mut GameCtx, self_idx: usize, delay: f32) {
    let time = ctx.level.time;
    let e = &mut ctx.edicts[self_idx];
    if e.is_alive() {
        e.nextthink = time + delay;
    }
}

/// Forget the fight and go back to idling.
pub(crate) fn go_idle(ctx: &mut GameCtx, self_idx: usize) -> GameResult<()> {
    let e = &mut ctx.edicts[self_idx];
    e.enemy = None;
    e.monsterinfo.aiflags.remove(
        AiFlags::LOST_SIGHT
            | AiFlags::PURSUIT_LAST_SEEN
            | AiFlags::FLEEING
            | AiFlags::IN_COVER
            | AiFlags::SUPPRESSING,
    );
    e.monsterinfo.cover_goal = None;
    e.monsterinfo.squad_order = SquadOrder::None;
    e.monsterinfo.allies_lost /= 2;
    set_state(ctx, self_idx, AiState::Idle);
    schedule(ctx, self_idx, IDLE_THINK);
    Ok(())
}

fn face(ctx: &mut GameCtx, self_idx: usize, point: &Vec3) {
    let dir = vector_subtract(point, &ctx.edicts[self_idx].s.origin);
    ctx.edicts[self_idx].ideal_yaw = vectoyaw(&dir);
    change_yaw(ctx, self_idx);
}

fn update_sighting(ctx: &mut GameCtx, self_idx: usize, enemy: usize, can_see: bool) {
    let enemy_origin = ctx.edicts[enemy].s.origin;
    let mi = &mut ctx.edicts[self_idx].monsterinfo;
    if can_see {
        mi.aiflags.remove(AiFlags::LOST_SIGHT | AiFlags::PURSUIT_LAST_SEEN);
        mi.last_sighting = enemy_origin;
    } else {
        mi.aiflags.insert(AiFlags::LOST_SIGHT);
    }
}

// ============================================================
// Think
// ============================================================

/// Per-tick behaviour. Every live state ends with a new wake time.
pub fn monster_think(ctx: &mut GameCtx, self_idx: usize) -> GameResult<()> {
    if !ctx.edicts[self_idx].is_alive() {
        return Ok(());
    }
    if ctx.ai_freeze != 0.0 {
        let ft = ctx.frametime();
        schedule(ctx, self_idx, ft);
        return Ok(());
    }
    if ctx.edicts[self_idx].monsterinfo.aiflags.contains(AiFlags::SURRENDERED) {
        let mi = &ctx.edicts[self_idx].monsterinfo;
        if mi.ai_state == AiState::Pain && mi.pausetime <= ctx.level.time {
            set_state(ctx, self_idx, AiState::Idle);
        }
        schedule(ctx, self_idx, IDLE_THINK * 2.0);
        return Ok(());
    }

    match ctx.edicts[self_idx].monsterinfo.ai_state {
        AiState::Idle => ai_idle(ctx, self_idx),
        AiState::Alert => ai_alert(ctx, self_idx),
        AiState::Chase => ai_chase(ctx, self_idx),
        AiState::Attack => ai_attack(ctx, self_idx),
        AiState::Pain => ai_pain_recover(ctx, self_idx),
        AiState::Dead => Ok(()),
    }
}

fn ai_idle(ctx: &mut GameCtx, self_idx: usize) -> GameResult<()> {
    let ft = ctx.frametime();
    if ctx.edicts[self_idx].enemy.is_some() && valid_enemy(ctx, self_idx).is_none() {
        ctx.edicts[self_idx].enemy = None;
    }

    if valid_enemy(ctx, self_idx).is_some() || find_target(ctx, self_idx) {
        set_state(ctx, self_idx, AiState::Alert);
        alert_allies(ctx, self_idx);
        let snd = ctx.configstrings.sound_index("soldier/sight.wav");
        ctx.gi.play_sound(self_idx as i32, CHAN_VOICE, snd, 1.0, ATTN_NORM, 0.0);
        schedule(ctx, self_idx, ft);
        return Ok(());
    }

    if patrol(ctx, self_idx)? {
        schedule(ctx, self_idx, ft);
    } else {
        schedule(ctx, self_idx, IDLE_THINK);
    }
    Ok(())
}

/// Walk the `path_corner` chain. Returns false when there is nothing to
/// follow.
fn patrol(ctx: &mut GameCtx, self_idx: usize) -> GameResult<bool> {
    let goal = match ctx.resolve_opt(ctx.edicts[self_idx].movetarget) {
        Some(g) => g,
        None => {
            let target = ctx.edicts[self_idx].target.clone();
            if target.is_empty() {
                return Ok(false);
            }
            let Some(&g) = ctx.find_by_targetname(&target).first() else {
                return Ok(false);
            };
            ctx.edicts[self_idx].movetarget = Some(ctx.handle_of(g));
            g
        }
    };

    let goal_origin = ctx.edicts[goal].s.origin;
    let origin = ctx.edicts[self_idx].s.origin;
    let flat = [goal_origin[0] - origin[0], goal_origin[1] - origin[1], 0.0];

    if vector_length(&flat) < CORNER_RADIUS {
        let next_name = ctx.edicts[goal].target.clone();
        let mut next = if next_name.is_empty() {
            None
        } else {
            ctx.find_by_targetname(&next_name).first().copied()
        };
        if next.is_none() {
            // end of the chain, loop to the first corner
            let first = ctx.edicts[self_idx].target.clone();
            next = ctx.find_by_targetname(&first).first().copied();
        }
        let handle = next.map(|n| ctx.handle_of(n));
        ctx.edicts[self_idx].movetarget = handle;
        return Ok(true);
    }

    let dist = ctx.edicts[self_idx].monsterinfo.run_speed * PATROL_SPEED_SCALE * ctx.frametime();
    move_to_goal(ctx, self_idx, &goal_origin, dist)?;
    Ok(true)
}

fn ai_alert(ctx: &mut GameCtx, self_idx: usize) -> GameResult<()> {
    let Some(enemy) = valid_enemy(ctx, self_idx) else {
        return go_idle(ctx, self_idx);
    };
    let target = ctx.edicts[enemy].s.origin;
    face(ctx, self_idx, &target);
    m_tactics::squad_callout(ctx, self_idx);
    set_state(ctx, self_idx, AiState::Chase);
    let ft = ctx.frametime();
    schedule(ctx, self_idx, ft);
    Ok(())
}

fn ai_chase(ctx: &mut GameCtx, self_idx: usize) -> GameResult<()> {
    let ft = ctx.frametime();
    let Some(enemy) = valid_enemy(ctx, self_idx) else {
        debug!("monster {}: target gone", self_idx);
        return go_idle(ctx, self_idx);
    };

    let (origin, sight, attack_range, run_speed, flags, order) = {
        let e = &ctx.edicts[self_idx];
        let mi = &e.monsterinfo;
        (e.s.origin, mi.sight_range, mi.attack_range, mi.run_speed, mi.aiflags, mi.squad_order)
    };
    let enemy_origin = ctx.edicts[enemy].s.origin;
    let dist = distance(&origin, &enemy_origin);

    if flags.intersects(AiFlags::LOST_SIGHT | AiFlags::FLEEING) && dist > sight * DISENGAGE_FRACTION {
        debug!("monster {}: disengaging at {:.0}", self_idx, dist);
        return go_idle(ctx, self_idx);
    }

    let can_see = visible(ctx, self_idx, enemy);
    update_sighting(ctx, self_idx, enemy, can_see);

    if m_tactics::check_surrender(ctx, self_idx)? {
        return Ok(());
    }
    if m_tactics::try_dodge(ctx, self_idx, enemy)? {
        schedule(ctx, self_idx, ft);
        return Ok(());
    }

    let step = run_speed * ft;
    if m_tactics::should_flee(ctx, self_idx) {
        ctx.edicts[self_idx].monsterinfo.aiflags.insert(AiFlags::FLEEING);
        if !m_tactics::cover_step(ctx, self_idx, enemy)? {
            let goal = m_tactics::flee_goal(ctx, self_idx, enemy);
            move_to_goal(ctx, self_idx, &goal, step)?;
        }
        schedule(ctx, self_idx, ft);
        return Ok(());
    }
    if m_tactics::cover_step(ctx, self_idx, enemy)? {
        schedule(ctx, self_idx, ft);
        return Ok(());
    }

    if can_see && dist < attack_range {
        set_state(ctx, self_idx, AiState::Attack);
        schedule(ctx, self_idx, ft);
        return Ok(());
    }

    m_tactics::leader_orders(ctx, self_idx, enemy);
    m_tactics::squad_callout(ctx, self_idx);

    let flags = ctx.edicts[self_idx].monsterinfo.aiflags;
    let holding = flags.intersects(AiFlags::STAND_GROUND | AiFlags::IN_COVER)
        || (order == SquadOrder::Hold && can_see);
    if holding {
        face(ctx, self_idx, &enemy_origin);
        schedule(ctx, self_idx, ft);
        return Ok(());
    }

    if can_see && m_tactics::try_grenade(ctx, self_idx, enemy)? {
        schedule(ctx, self_idx, ft);
        return Ok(());
    }

    let mut goal = if flags.contains(AiFlags::LOST_SIGHT) && !flags.contains(AiFlags::PURSUIT_LAST_SEEN) {
        let last = ctx.edicts[self_idx].monsterinfo.last_sighting;
        let flat = [last[0] - origin[0], last[1] - origin[1], 0.0];
        if vector_length(&flat) < CORNER_RADIUS {
            // nothing at the last sighting, start hunting
            ctx.edicts[self_idx].monsterinfo.aiflags.insert(AiFlags::PURSUIT_LAST_SEEN);
            enemy_origin
        } else {
            last
        }
    } else if can_see {
        m_tactics::flank_goal(ctx, self_idx, enemy)
    } else {
        enemy_origin
    };
    goal = vector_add(&goal, &m_tactics::separation(ctx, self_idx));

    move_to_goal(ctx, self_idx, &goal, step)?;
    schedule(ctx, self_idx, ft);
    Ok(())
}

fn ai_attack(ctx: &mut GameCtx, self_idx: usize) -> GameResult<()> {
    let ft = ctx.frametime();
    let time = ctx.level.time;
    let Some(enemy) = valid_enemy(ctx, self_idx) else {
        debug!("monster {}: target gone", self_idx);
        return go_idle(ctx, self_idx);
    };

    let can_see = visible(ctx, self_idx, enemy);
    update_sighting(ctx, self_idx, enemy, can_see);

    if !can_see {
        if !m_tactics::try_suppress(ctx, self_idx)? {
            set_state(ctx, self_idx, AiState::Chase);
        }
        schedule(ctx, self_idx, ft);
        return Ok(());
    }

    let dist = range(ctx, self_idx, enemy);
    let (attack_range, melee_range, attack_finished, melee_finished) = {
        let mi = &ctx.edicts[self_idx].monsterinfo;
        (mi.attack_range, mi.melee_range, mi.attack_finished, mi.melee_finished)
    };
    if dist > attack_range * 1.2 {
        set_state(ctx, self_idx, AiState::Chase);
        schedule(ctx, self_idx, ft);
        return Ok(());
    }

    let enemy_origin = ctx.edicts[enemy].s.origin;
    face(ctx, self_idx, &enemy_origin);

    if m_tactics::try_dodge(ctx, self_idx, enemy)? {
        schedule(ctx, self_idx, ft);
        return Ok(());
    }

    if dist < melee_range {
        if melee_finished <= time {
            monster_melee(ctx, self_idx, enemy)?;
        }
    } else if !m_tactics::try_grenade(ctx, self_idx, enemy)? && attack_finished <= time {
        monster_attack(ctx, self_idx, enemy)?;
    }

    m_tactics::leader_orders(ctx, self_idx, enemy);
    m_tactics::squad_callout(ctx, self_idx);
    schedule(ctx, self_idx, ft);
    Ok(())
}

fn ai_pain_recover(ctx: &mut GameCtx, self_idx: usize) -> GameResult<()> {
    let time = ctx.level.time;
    if ctx.edicts[self_idx].monsterinfo.pausetime > time {
        let wait = ctx.edicts[self_idx].monsterinfo.pausetime - time;
        schedule(ctx, self_idx, wait);
        return Ok(());
    }
    if valid_enemy(ctx, self_idx).is_none() {
        return go_idle(ctx, self_idx);
    }
    set_state(ctx, self_idx, AiState::Chase);
    alert_allies(ctx, self_idx);
    let ft = ctx.frametime();
    schedule(ctx, self_idx, ft);
    Ok(())
}

// ============================================================
// Pain and death
// ============================================================

pub fn monster_pain(ctx: &mut GameCtx, self_idx: usize, attacker: usize, _kick: f32, damage: i32) -> GameResult<()> {
    if damage <= 0 || !ctx.edicts[self_idx].is_alive() {
        return Ok(());
    }
    if !set_state(ctx, self_idx, AiState::Pain) {
        return Ok(());
    }

    let time = ctx.level.time;
    let stun = if damage > HEAVY_PAIN_DAMAGE { PAIN_TIME * 2.0 } else { PAIN_TIME };
    {
        let e = &mut ctx.edicts[self_idx];
        e.monsterinfo.pausetime = time + stun;
        e.nextthink = time + stun;
        e.monsterinfo.aiflags.remove(AiFlags::SUPPRESSING);
    }

    if damage > HEAVY_PAIN_DAMAGE
        && attacker != self_idx
        && !ctx.edicts[self_idx].flags.contains(EntityFlags::NO_KNOCKBACK)
    {
        let mut dir = vector_subtract(&ctx.edicts[self_idx].s.origin, &ctx.edicts[attacker].s.origin);
        dir[2] = 0.0;
        vector_normalize(&mut dir);
        let e = &mut ctx.edicts[self_idx];
        e.velocity = vector_scale(&dir, damage as f32 * 3.0);
        e.velocity[2] = 100.0;
        e.groundentity = -1;
    }

    let surrendered = ctx.edicts[self_idx].monsterinfo.aiflags.contains(AiFlags::SURRENDERED);
    if ctx.edicts[self_idx].enemy.is_none() && attacker != self_idx && !surrendered {
        let att = &ctx.edicts[attacker];
        if att.client.is_some() && att.is_alive() {
            ctx.edicts[self_idx].enemy = Some(ctx.handle_of(attacker));
            found_target(ctx, self_idx);
        }
    }

    if ctx.edicts[self_idx].pain_debounce_time <= time {
        ctx.edicts[self_idx].pain_debounce_time = time + 3.0;
        let name = if ctx.random() < 0.5 { "soldier/pain1.wav" } else { "soldier/pain2.wav" };
        let snd = ctx.configstrings.sound_index(name);
        ctx.gi.play_sound(self_idx as i32, CHAN_VOICE, snd, 1.0, ATTN_NORM, 0.0);
    }
    Ok(())
}

pub fn monster_die(ctx: &mut GameCtx, self_idx: usize, attacker: usize, _damage: i32) -> GameResult<()> {
    if ctx.edicts[self_idx].deadflag == DeadFlag::Dead {
        return Ok(());
    }
    let time = ctx.level.time;
    let ft = ctx.frametime();
    set_state(ctx, self_idx, AiState::Dead);

    let gibbed = {
        let e = &mut ctx.edicts[self_idx];
        e.deadflag = DeadFlag::Dead;
        e.takedamage = Damage::No;
        e.solid = Solid::Not;
        e.movetype = MoveType::Toss;
        e.svflags |= SVF_DEADMONSTER;
        e.velocity = [0.0, 0.0, e.velocity[2].min(0.0)];
        e.avelocity = VEC3_ORIGIN;
        e.maxs[2] = -8.0;
        e.monsterinfo.aiflags = AiFlags::empty();
        e.monsterinfo.cover_goal = None;
        e.touch = None;
        e.pain = None;
        e.die = None;
        e.use_fn = None;
        e.count = 0;
        e.health <= e.gib_health
    };

    let origin = ctx.edicts[self_idx].s.origin;
    if gibbed {
        ctx.gi.spawn_particle_effect(&origin, &[0.0, 0.0, 1.0], EffectKind::Gib, 12);
        let snd = ctx.configstrings.sound_index("misc/gibbed.wav");
        ctx.gi.play_sound(self_idx as i32, CHAN_BODY, snd, 1.0, ATTN_NORM, 0.0);
        let e = &mut ctx.edicts[self_idx];
        e.think = Some(ThinkKind::FreeEdict);
        e.nextthink = time + ft;
    } else {
        let snd = ctx.configstrings.sound_index("soldier/death.wav");
        ctx.gi.play_sound(self_idx as i32, CHAN_VOICE, snd, 1.0, ATTN_NORM, 0.0);
        let e = &mut ctx.edicts[self_idx];
        e.think = Some(ThinkKind::CorpseSink);
        e.nextthink = time + CORPSE_TIME;
        ctx.level.corpses.push_back(self_idx as i32);
        enforce_corpse_limit(ctx);
    }
    link_entity(ctx, self_idx);

    let deathtarget = ctx.edicts[self_idx].deathtarget.clone();
    if !deathtarget.is_empty() && ctx.edicts[self_idx].inuse {
        let saved = std::mem::replace(&mut ctx.edicts[self_idx].target, deathtarget);
        let result = use_targets(ctx, self_idx, attacker);
        ctx.edicts[self_idx].target = saved;
        result?;
    }
    Ok(())
}

fn is_corpse(e: &Edict) -> bool {
    e.inuse && e.is_monster() && e.deadflag == DeadFlag::Dead
}

fn forget_corpse(ctx: &mut GameCtx, self_idx: usize) {
    let slot = self_idx as i32;
    ctx.level.corpses.retain(|&c| c != slot);
}

/// Free the oldest corpses over the `ai_maxcorpses` limit.
fn enforce_corpse_limit(ctx: &mut GameCtx) {
    let max = ctx.ai_maxcorpses.max(0.0) as usize;
    while ctx.level.corpses.len() > max {
        let Some(oldest) = ctx.level.corpses.pop_front() else {
            break;
        };
        let slot = oldest as usize;
        if ctx.edicts.get(slot).is_some_and(is_corpse) {
            trace!("corpse limit: removing {}", slot);
            g_free_edict(ctx, slot);
        }
    }
}

/// Corpses sink into the floor over a second, then go away.
pub fn corpse_sink(ctx: &mut GameCtx, self_idx: usize) -> GameResult<()> {
    if ctx.edicts[self_idx].count >= SINK_STEPS {
        forget_corpse(ctx, self_idx);
        g_free_edict(ctx, self_idx);
        return Ok(());
    }
    let next = ctx.level.time + ctx.frametime();
    let e = &mut ctx.edicts[self_idx];
    e.movetype = MoveType::None;
    e.s.origin[2] -= SINK_DEPTH / SINK_STEPS as f32;
    e.count += 1;
    e.think = Some(ThinkKind::CorpseSink);
    e.nextthink = next;
    link_entity(ctx, self_idx);
    Ok(())
}
