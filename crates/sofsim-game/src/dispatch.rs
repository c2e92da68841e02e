// dispatch.rs — behavior kinds stored on entities and the match that runs them
//
// Entities carry a tag per callback role instead of a function reference.
// Tags serialize cleanly; after a load they are rebuilt from the classname
// by `rebind_behaviors`.

use serde::{Deserialize, Serialize};

use crate::g_error::GameResult;
use crate::g_local::*;
use crate::{g_ai, g_func, g_items, g_misc, g_monster, g_trigger, g_utils, g_weapon, p_client};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrethinkKind {
    Player,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThinkKind {
    MonsterStart,
    MonsterAi,
    CorpseSink,
    FreeEdict,
    GrenadeExplode,
    MoverStep,
    MoverReturn,
    TriggerRearm,
    DelayedUse,
    ItemRespawn,
    Explode,
    TimerFire,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TouchKind {
    TriggerMultiple,
    TriggerHurt,
    TriggerPush,
    TriggerSecret,
    Item,
    DoorTrigger,
    PlatTrigger,
    Grenade,
    Rocket,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UseKind {
    Door,
    Plat,
    TriggerMultiple,
    Relay,
    Breakable,
    Timer,
    MonsterTrigger,
    Objective,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PainKind {
    Monster,
    Player,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DieKind {
    Monster,
    Player,
    Explosive,
    Breakable,
    Corpse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockedKind {
    Door,
    Plat,
    Rotating,
}

// ============================================================
// Dispatch
// ============================================================

pub fn run_prethink(ctx: &mut GameCtx, self_idx: usize) -> GameResult<()> {
    match ctx.edicts[self_idx].prethink {
        Some(PrethinkKind::Player) => p_client::client_think(ctx, self_idx),
        None => Ok(()),
    }
}

pub fn run_think(ctx: &mut GameCtx, self_idx: usize, kind: ThinkKind) -> GameResult<()> {
    match kind {
        ThinkKind::MonsterStart => g_monster::monster_start_go(ctx, self_idx),
        ThinkKind::MonsterAi => g_ai::monster_think(ctx, self_idx),
        ThinkKind::CorpseSink => g_ai::corpse_sink(ctx, self_idx),
        ThinkKind::FreeEdict => {
            g_utils::g_free_edict(ctx, self_idx);
            Ok(())
        }
        ThinkKind::GrenadeExplode => g_weapon::grenade_explode(ctx, self_idx),
        ThinkKind::MoverStep => g_func::mover_step(ctx, self_idx),
        ThinkKind::MoverReturn => g_func::mover_return(ctx, self_idx),
        ThinkKind::TriggerRearm => g_trigger::trigger_rearm(ctx, self_idx),
        ThinkKind::DelayedUse => g_utils::delayed_use(ctx, self_idx),
        ThinkKind::ItemRespawn => g_items::item_respawn(ctx, self_idx),
        ThinkKind::Explode => g_func::explode_think(ctx, self_idx),
        ThinkKind::TimerFire => g_func::timer_think(ctx, self_idx),
    }
}

pub fn call_touch(
    ctx: &mut GameCtx,
    self_idx: usize,
    other: usize,
    plane: Option<&CPlane>,
    surf_flags: i32,
) -> GameResult<()> {
    let Some(kind) = ctx.edicts[self_idx].touch else {
        return Ok(());
    };
    match kind {
        TouchKind::TriggerMultiple => g_trigger::touch_multiple(ctx, self_idx, other),
        TouchKind::TriggerHurt => g_trigger::hurt_touch(ctx, self_idx, other),
        TouchKind::TriggerPush => g_trigger::push_touch(ctx, self_idx, other),
        TouchKind::TriggerSecret => g_trigger::secret_touch(ctx, self_idx, other),
        TouchKind::Item => g_items::touch_item(ctx, self_idx, other),
        TouchKind::DoorTrigger => g_func::door_trigger_touch(ctx, self_idx, other),
        TouchKind::PlatTrigger => g_func::plat_trigger_touch(ctx, self_idx, other),
        TouchKind::Grenade => g_weapon::grenade_touch(ctx, self_idx, other),
        TouchKind::Rocket => g_weapon::rocket_touch(ctx, self_idx, other, plane, surf_flags),
    }
}

pub fn call_use(ctx: &mut GameCtx, self_idx: usize, other: usize, activator: usize) -> GameResult<()> {
    let Some(kind) = ctx.edicts[self_idx].use_fn else {
        return Ok(());
    };
    match kind {
        UseKind::Door => g_func::door_use(ctx, self_idx, activator),
        UseKind::Plat => g_func::plat_use(ctx, self_idx),
        UseKind::TriggerMultiple => g_trigger::use_multiple(ctx, self_idx, activator),
        UseKind::Relay => g_trigger::relay_use(ctx, self_idx, activator),
        UseKind::Breakable => g_func::breakable_use(ctx, self_idx, activator),
        UseKind::Timer => g_func::timer_use(ctx, self_idx, activator),
        UseKind::MonsterTrigger => g_monster::monster_use(ctx, self_idx, other, activator),
        UseKind::Objective => g_trigger::objective_use(ctx, self_idx),
    }
}

pub fn call_pain(ctx: &mut GameCtx, self_idx: usize, attacker: usize, kick: f32, damage: i32) -> GameResult<()> {
    match ctx.edicts[self_idx].pain {
        Some(PainKind::Monster) => g_ai::monster_pain(ctx, self_idx, attacker, kick, damage),
        Some(PainKind::Player) => p_client::player_pain(ctx, self_idx, attacker, kick, damage),
        None => Ok(()),
    }
}

pub fn call_die(
    ctx: &mut GameCtx,
    self_idx: usize,
    inflictor: usize,
    attacker: usize,
    damage: i32,
    point: &Vec3,
) -> GameResult<()> {
    match ctx.edicts[self_idx].die {
        Some(DieKind::Monster) => g_ai::monster_die(ctx, self_idx, attacker, damage),
        Some(DieKind::Player) => p_client::player_die(ctx, self_idx, inflictor, attacker, damage),
        Some(DieKind::Explosive) => g_func::explosive_die(ctx, self_idx, attacker),
        Some(DieKind::Breakable) => g_func::breakable_die(ctx, self_idx, attacker),
        Some(DieKind::Corpse) => g_misc::corpse_die(ctx, self_idx, point),
        None => Ok(()),
    }
}

pub fn call_blocked(ctx: &mut GameCtx, self_idx: usize, other: usize) -> GameResult<()> {
    match ctx.edicts[self_idx].blocked {
        Some(BlockedKind::Door) => g_func::door_blocked(ctx, self_idx, other),
        Some(BlockedKind::Plat) => g_func::plat_blocked(ctx, self_idx, other),
        Some(BlockedKind::Rotating) => g_func::rotating_blocked(ctx, self_idx, other),
        None => Ok(()),
    }
}

// ============================================================
// Rebinding after load
// ============================================================

/// Reattach behavior tags to a restored entity from its classname and
/// saved state.
pub fn rebind_behaviors(ctx: &mut GameCtx, idx: usize) {
    let e = &mut ctx.edicts[idx];
    e.prethink = None;
    e.think = None;
    e.touch = None;
    e.use_fn = None;
    e.pain = None;
    e.die = None;
    e.blocked = None;
    if !e.inuse {
        return;
    }

    let pending = e.nextthink > 0.0;
    let moving = matches!(e.moveinfo.state, MoverState::Up | MoverState::Down);
    let classname = e.classname.clone();

    match classname.as_str() {
        "player" => {
            e.prethink = Some(PrethinkKind::Player);
            e.pain = Some(PainKind::Player);
            e.die = Some(DieKind::Player);
        }
        "func_door" => {
            e.use_fn = Some(UseKind::Door);
            e.blocked = Some(BlockedKind::Door);
            if moving {
                e.think = Some(ThinkKind::MoverStep);
            } else if pending {
                e.think = Some(ThinkKind::MoverReturn);
            }
        }
        "door_trigger" => e.touch = Some(TouchKind::DoorTrigger),
        "func_plat" => {
            e.use_fn = Some(UseKind::Plat);
            e.blocked = Some(BlockedKind::Plat);
            if moving {
                e.think = Some(ThinkKind::MoverStep);
            } else if pending {
                e.think = Some(ThinkKind::MoverReturn);
            }
        }
        "plat_trigger" => e.touch = Some(TouchKind::PlatTrigger),
        "func_rotating" => e.blocked = Some(BlockedKind::Rotating),
        "func_breakable" => {
            e.use_fn = Some(UseKind::Breakable);
            e.die = Some(DieKind::Breakable);
        }
        "func_explosive" | "misc_explobox_big" => {
            e.die = Some(DieKind::Explosive);
            if pending {
                e.think = Some(ThinkKind::Explode);
            }
        }
        "func_timer" => {
            e.use_fn = Some(UseKind::Timer);
            e.think = Some(ThinkKind::TimerFire);
        }
        "trigger_once" | "trigger_multiple" => {
            e.use_fn = Some(UseKind::TriggerMultiple);
            if e.solid == Solid::Trigger || e.targetname.is_empty() {
                e.touch = Some(TouchKind::TriggerMultiple);
            }
            if pending {
                e.think = Some(ThinkKind::TriggerRearm);
            }
        }
        "trigger_hurt" => e.touch = Some(TouchKind::TriggerHurt),
        "trigger_push" => e.touch = Some(TouchKind::TriggerPush),
        "trigger_secret" => e.touch = Some(TouchKind::TriggerSecret),
        "target_relay" => e.use_fn = Some(UseKind::Relay),
        "target_objective" => e.use_fn = Some(UseKind::Objective),
        "delayed_use" => e.think = Some(ThinkKind::DelayedUse),
        "grenade" | "c4" => {
            e.touch = Some(TouchKind::Grenade);
            e.think = Some(ThinkKind::GrenadeExplode);
        }
        "rocket" => {
            e.touch = Some(TouchKind::Rocket);
            e.think = Some(ThinkKind::FreeEdict);
        }
        "debris" | "gib" => e.think = Some(ThinkKind::FreeEdict),
        "misc_deadsoldier" => e.die = Some(DieKind::Corpse),
        c if c.starts_with("monster_") => {
            if e.deadflag == DeadFlag::Dead {
                if pending {
                    e.think = Some(ThinkKind::CorpseSink);
                }
            } else {
                e.think = Some(ThinkKind::MonsterAi);
                e.pain = Some(PainKind::Monster);
                e.die = Some(DieKind::Monster);
                e.use_fn = Some(UseKind::MonsterTrigger);
            }
        }
        c if g_items::ItemKind::from_classname(c).is_some() => {
            e.touch = Some(TouchKind::Item);
            if e.solid == Solid::Not && pending {
                e.think = Some(ThinkKind::ItemRespawn);
            }
        }
        _ => {}
    }
}
