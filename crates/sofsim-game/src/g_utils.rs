// g_utils.rs — entity pool, target firing and misc utilities

use log::{debug, error, warn};

use crate::dispatch::{call_touch, call_use, ThinkKind};
use crate::g_combat::t_damage;
use crate::g_error::{GameError, GameResult};
use crate::g_local::*;
use crate::g_world::{area_edicts, link_entity, unlink_entity};
use crate::game_import::{ATTN_NORM, CHAN_AUTO};

/// A freed slot is not handed out again for this long while fresh slots remain.
pub const FREED_SLOT_GRACE: f32 = 0.5;

/// Project a muzzle offset (forward, right, up) from `point`.
pub fn g_project_source(point: &Vec3, distance: &Vec3, forward: &Vec3, right: &Vec3) -> Vec3 {
    [
        point[0] + forward[0] * distance[0] + right[0] * distance[1],
        point[1] + forward[1] * distance[0] + right[1] * distance[1],
        point[2] + forward[2] * distance[0] + right[2] * distance[1] + distance[2],
    ]
}

/// Random entity with the given targetname.
pub fn g_pick_target(ctx: &mut GameCtx, targetname: &str) -> Option<usize> {
    let choices = ctx.find_by_targetname(targetname);
    if choices.is_empty() {
        warn!("g_pick_target: target {} not found", targetname);
        return None;
    }
    let pick = ((ctx.random() * choices.len() as f32) as usize).min(choices.len() - 1);
    Some(choices[pick])
}

// Special editor angles for straight up and down
const VEC_UP: Vec3 = [0.0, -1.0, 0.0];
const MOVEDIR_UP: Vec3 = [0.0, 0.0, 1.0];
const VEC_DOWN: Vec3 = [0.0, -2.0, 0.0];
const MOVEDIR_DOWN: Vec3 = [0.0, 0.0, -1.0];

/// Movement direction from editor angles. The angles are cleared.
pub fn g_set_movedir(angles: &mut Vec3) -> Vec3 {
    let dir = if vector_compare(angles, &VEC_UP) {
        MOVEDIR_UP
    } else if vector_compare(angles, &VEC_DOWN) {
        MOVEDIR_DOWN
    } else {
        angle_vectors_tuple(angles).0
    };
    *angles = VEC3_ORIGIN;
    dir
}

// ============================================================
// Entity pool
// ============================================================

/// Allocate an entity slot.
///
/// Prefers the oldest freed slot once it has been free for
/// `FREED_SLOT_GRACE`, then a never-used slot, then any freed slot.
pub fn g_spawn(ctx: &mut GameCtx) -> GameResult<usize> {
    let time = ctx.level.time;
    let reserved = ctx.maxclients as usize;

    let aged = ctx.free_list.front().copied().filter(|&i| {
        let freed = ctx.edicts[i].freetime;
        freed < 2.0 || time - freed > FREED_SLOT_GRACE
    });

    let idx = if let Some(i) = aged {
        ctx.free_list.pop_front();
        i
    } else if (ctx.num_edicts as usize) < ctx.max_edicts as usize {
        let i = ctx.num_edicts as usize;
        ctx.num_edicts += 1;
        if ctx.edicts.len() <= i {
            ctx.edicts.resize_with(i + 1, Edict::default);
        }
        i
    } else if let Some(i) = ctx.free_list.pop_front() {
        i
    } else {
        error!("g_spawn: no free edicts ({} in use)", ctx.max_edicts);
        return Err(GameError::PoolExhausted {
            max: ctx.max_edicts as usize,
        });
    };

    debug_assert!(idx > reserved, "handed out reserved slot {}", idx);
    let generation = ctx.edicts[idx].generation;
    ctx.edicts[idx] = Edict::init(idx, generation);
    Ok(idx)
}

/// Mark an entity free. Its slot goes to the back of the free list and
/// every handle taken before now goes stale.
pub fn g_free_edict(ctx: &mut GameCtx, idx: usize) {
    if idx <= ctx.maxclients as usize {
        debug!("g_free_edict: refusing to free reserved slot {}", idx);
        return;
    }
    if !ctx.edicts[idx].inuse {
        return;
    }

    unlink_entity(ctx, idx);
    ctx.unregister_entity_from_index(idx);

    let generation = ctx.edicts[idx].generation.wrapping_add(1);
    ctx.edicts[idx] = Edict {
        s: EntityState {
            number: idx as i32,
            ..Default::default()
        },
        generation,
        classname: "freed".to_string(),
        freetime: ctx.level.time,
        inuse: false,
        ..Default::default()
    };
    ctx.free_list.push_back(idx);
}

// ============================================================
// Targets
// ============================================================

/// Fire everything `ent` targets.
///
/// With a delay, a temporary relay entity carries the target list and fires
/// it later. Otherwise: print the message to the activator, remove
/// killtargets, then use every entity whose targetname matches.
pub fn use_targets(ctx: &mut GameCtx, ent: usize, activator: usize) -> GameResult<()> {
    let (delay, message, target, killtarget) = {
        let e = &ctx.edicts[ent];
        (e.delay, e.message.clone(), e.target.clone(), e.killtarget.clone())
    };

    if delay > 0.0 {
        let t = g_spawn(ctx)?;
        let time = ctx.level.time;
        let relay = &mut ctx.edicts[t];
        relay.classname = "delayed_use".to_string();
        relay.nextthink = time + delay;
        relay.think = Some(ThinkKind::DelayedUse);
        relay.activator = activator as i32;
        relay.message = message;
        relay.target = target;
        relay.killtarget = killtarget;
        ctx.register_entity_in_index(t);
        return Ok(());
    }

    if !message.is_empty() && ctx.edicts[activator].client.is_some() {
        ctx.gi.centerprintf(activator as i32, &message);
        let snd = ctx.configstrings.sound_index("misc/talk1.wav");
        ctx.gi.play_sound(activator as i32, CHAN_AUTO, snd, 1.0, ATTN_NORM, 0.0);
    }

    if !killtarget.is_empty() {
        for t in ctx.find_by_targetname(&killtarget) {
            g_free_edict(ctx, t);
            if !ctx.edicts[ent].inuse {
                warn!("entity was removed while using killtargets");
                return Ok(());
            }
        }
    }

    if !target.is_empty() {
        for t in ctx.find_by_targetname(&target) {
            if !ctx.edicts[t].inuse {
                continue;
            }
            if t == ent {
                warn!("{} used itself", ctx.edicts[ent].classname);
            } else {
                call_use(ctx, t, ent, activator)?;
            }
            if !ctx.edicts[ent].inuse {
                debug!("entity was removed while using targets");
                return Ok(());
            }
        }
    }
    Ok(())
}

/// Think for the temporary relay `use_targets` creates.
pub fn delayed_use(ctx: &mut GameCtx, idx: usize) -> GameResult<()> {
    let activator = ctx.live_index(ctx.edicts[idx].activator).unwrap_or(idx);
    let result = use_targets(ctx, idx, activator);
    g_free_edict(ctx, idx);
    result
}

// ============================================================
// Touch
// ============================================================

/// Run the touch behavior of every trigger overlapping `ent`.
pub fn g_touch_triggers(ctx: &mut GameCtx, ent: usize) -> GameResult<()> {
    {
        let e = &ctx.edicts[ent];
        if (e.client.is_some() || e.is_monster()) && e.health <= 0 {
            return Ok(());
        }
    }
    let (absmin, absmax) = (ctx.edicts[ent].absmin, ctx.edicts[ent].absmax);
    for hit in area_edicts(ctx, &absmin, &absmax, AREA_TRIGGERS) {
        if !ctx.edicts[hit].inuse || ctx.edicts[hit].touch.is_none() {
            continue;
        }
        call_touch(ctx, hit, ent, None, 0)?;
        if !ctx.edicts[ent].inuse {
            break;
        }
    }
    Ok(())
}

/// Make every solid the trigger covers touch it now. Used after linking a
/// trigger in mid-game.
pub fn g_touch_solids(ctx: &mut GameCtx, ent: usize) -> GameResult<()> {
    let (absmin, absmax) = (ctx.edicts[ent].absmin, ctx.edicts[ent].absmax);
    for hit in area_edicts(ctx, &absmin, &absmax, AREA_SOLID) {
        if ctx.edicts[ent].touch.is_none() || !ctx.edicts[ent].inuse {
            break;
        }
        call_touch(ctx, ent, hit, None, 0)?;
    }
    Ok(())
}

/// Kill everything standing where `ent` is about to appear.
pub fn killbox(ctx: &mut GameCtx, ent: usize) -> GameResult<()> {
    let e = &ctx.edicts[ent];
    let origin = e.s.origin;
    let mins = vector_add(&origin, &e.mins);
    let maxs = vector_add(&origin, &e.maxs);
    for hit in area_edicts(ctx, &mins, &maxs, AREA_SOLID) {
        if hit == ent || ctx.edicts[hit].takedamage == Damage::No {
            continue;
        }
        t_damage(
            ctx,
            hit,
            ent,
            ent,
            &VEC3_ORIGIN,
            &origin,
            &VEC3_ORIGIN,
            100_000,
            0,
            DamageFlags::NO_PROTECTION,
            MeansOfDeath::Crush,
        )?;
    }
    link_entity(ctx, ent);
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    // ============================================================
    // Pool
    // ============================================================

    #[test]
    fn test_spawn_skips_reserved_slots() {
        let mut ctx = test_ctx();
        let a = g_spawn(&mut ctx).unwrap();
        assert_eq!(a, ctx.maxclients as usize + 1);
    }

    #[test]
    fn test_fresh_slot_preferred_over_recently_freed() {
        let mut ctx = test_ctx();
        ctx.level.time = 10.0;
        let a = g_spawn(&mut ctx).unwrap();
        g_free_edict(&mut ctx, a);
        let b = g_spawn(&mut ctx).unwrap();
        assert_ne!(a, b);

        ctx.level.time = 10.6;
        let c = g_spawn(&mut ctx).unwrap();
        assert_eq!(c, a);
    }

    #[test]
    fn test_free_bumps_generation() {
        let mut ctx = test_ctx();
        let a = g_spawn(&mut ctx).unwrap();
        let h = ctx.handle_of(a);
        assert_eq!(ctx.resolve(h), Some(a));
        g_free_edict(&mut ctx, a);
        assert_eq!(ctx.resolve(h), None);

        ctx.level.time = 5.0;
        let b = g_spawn(&mut ctx).unwrap();
        assert_eq!(b, a);
        // same slot, still stale
        assert_eq!(ctx.resolve(h), None);
    }

    #[test]
    fn test_pool_exhaustion_is_an_error() {
        let mut ctx = test_ctx();
        ctx.level.time = 10.0;
        let room = ctx.max_edicts - ctx.num_edicts;
        for _ in 0..room {
            g_spawn(&mut ctx).unwrap();
        }
        let err = g_spawn(&mut ctx).unwrap_err();
        assert!(matches!(err, GameError::PoolExhausted { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_reserved_slots_never_freed() {
        let mut ctx = test_ctx();
        let p = make_player(&mut ctx, [0.0, 0.0, 0.0]);
        g_free_edict(&mut ctx, p);
        assert!(ctx.edicts[p].inuse);
        g_free_edict(&mut ctx, 0);
        assert!(ctx.edicts[0].inuse);
    }

    // ============================================================
    // Targets
    // ============================================================

    #[test]
    fn test_killtarget_removes_entities() {
        let mut ctx = test_ctx();
        let victim = make_edict(&mut ctx, [0.0, 0.0, 0.0]);
        ctx.edicts[victim].targetname = "doomed".to_string();
        ctx.register_entity_in_index(victim);
        let src = make_edict(&mut ctx, [0.0, 0.0, 0.0]);
        ctx.edicts[src].killtarget = "doomed".to_string();

        use_targets(&mut ctx, src, src).unwrap();
        assert!(!ctx.edicts[victim].inuse);
        assert!(ctx.find_by_targetname("doomed").is_empty());
    }

    #[test]
    fn test_delay_spawns_relay() {
        let mut ctx = test_ctx();
        let victim = make_edict(&mut ctx, [0.0, 0.0, 0.0]);
        ctx.edicts[victim].targetname = "doomed".to_string();
        ctx.register_entity_in_index(victim);
        let src = make_edict(&mut ctx, [0.0, 0.0, 0.0]);
        ctx.edicts[src].killtarget = "doomed".to_string();
        ctx.edicts[src].delay = 1.0;

        use_targets(&mut ctx, src, src).unwrap();
        assert!(ctx.edicts[victim].inuse);
        let relay = ctx.find_by_classname("delayed_use")[0];
        assert_eq!(ctx.edicts[relay].think, Some(ThinkKind::DelayedUse));

        delayed_use(&mut ctx, relay).unwrap();
        assert!(!ctx.edicts[victim].inuse);
        assert!(!ctx.edicts[relay].inuse);
    }

    #[test]
    fn test_set_movedir_special_angles() {
        let mut up = VEC_UP;
        assert_eq!(g_set_movedir(&mut up), MOVEDIR_UP);
        assert_eq!(up, VEC3_ORIGIN);
        let mut east = [0.0, 90.0, 0.0];
        let d = g_set_movedir(&mut east);
        assert!(d[0].abs() < 1e-5 && (d[1] - 1.0).abs() < 1e-5);
    }
}
