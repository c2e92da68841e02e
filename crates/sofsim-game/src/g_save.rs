// g_save.rs — save games as JSON
//
// A save holds the level, game and client records plus every in-use entity.
// Behavior tags are not written; they are rebuilt from classname and saved
// state after a load.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use sofsim_common::cmodel::CollisionModel;

use crate::dispatch::rebind_behaviors;
use crate::g_error::{GameError, GameResult};
use crate::g_local::*;
use crate::g_spawn::relink_all;

pub const SAVE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub struct SavedEntity {
    pub slot: usize,
    pub fields: Map<String, Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SaveGame {
    pub version: u32,
    pub level: LevelLocals,
    pub game: GameLocals,
    pub clients: Vec<GClient>,
    pub entities: Vec<SavedEntity>,
}

// ============================================================
// Writing
// ============================================================

pub fn build_save(ctx: &GameCtx) -> GameResult<SaveGame> {
    let mut entities = Vec::new();
    for (slot, e) in ctx.edicts.iter().enumerate().take(ctx.num_edicts.max(0) as usize) {
        if !e.inuse {
            continue;
        }
        let Value::Object(fields) = serde_json::to_value(e)? else {
            return Err(GameError::Save(format!("entity {} did not serialize to an object", slot)));
        };
        entities.push(SavedEntity { slot, fields });
    }
    Ok(SaveGame {
        version: SAVE_VERSION,
        level: ctx.level.clone(),
        game: ctx.game.clone(),
        clients: ctx.clients.clone(),
        entities,
    })
}

pub fn save_to_string(ctx: &GameCtx) -> GameResult<String> {
    Ok(serde_json::to_string_pretty(&build_save(ctx)?)?)
}

pub fn save_entities(ctx: &GameCtx, path: &Path) -> GameResult<()> {
    let save = build_save(ctx)?;
    let file = File::create(path).map_err(|err| {
        warn!("save: can't create {}: {}", path.display(), err);
        err
    })?;
    let mut out = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut out, &save)?;
    out.flush()?;
    info!("saved {} entities to {}", save.entities.len(), path.display());
    Ok(())
}

// ============================================================
// Reading
// ============================================================

/// Overlay saved fields on a live entity. Keys missing from the save keep
/// their current value.
fn merge_fields(base: &Edict, fields: &Map<String, Value>) -> GameResult<Edict> {
    let mut value = serde_json::to_value(base)?;
    if let Value::Object(map) = &mut value {
        for (key, v) in fields {
            map.insert(key.clone(), v.clone());
        }
    }
    Ok(serde_json::from_value(value)?)
}

/// Build the restored entity table without touching `ctx`.
fn restore_edicts(ctx: &GameCtx, save: &SaveGame) -> GameResult<(Vec<Edict>, i32)> {
    let mut edicts = ctx.edicts.clone();
    let mut saved = vec![false; edicts.len()];
    let mut num_edicts = ctx.num_edicts.max(ctx.game.maxclients as i32 + 1);

    for ent in &save.entities {
        let slot = ent.slot;
        if slot >= edicts.len() {
            return Err(GameError::Save(format!("entity slot {} out of range", slot)));
        }
        let mut e = merge_fields(&edicts[slot], &ent.fields)?;
        e.s.number = slot as i32;
        edicts[slot] = e;
        saved[slot] = true;
        num_edicts = num_edicts.max(slot as i32 + 1);
    }

    // anything spawned since the save goes away
    for (i, e) in edicts.iter_mut().enumerate().skip(1) {
        if e.inuse && !saved[i] {
            let generation = e.generation.wrapping_add(1);
            *e = Edict::init(i, generation);
            e.inuse = false;
            e.classname = "freed".to_string();
        }
        e.area_node = None;
    }
    Ok((edicts, num_edicts))
}

fn check_compatible(ctx: &GameCtx, save: &SaveGame) -> GameResult<()> {
    if save.version != SAVE_VERSION {
        return Err(GameError::SaveVersion {
            found: save.version,
            expected: SAVE_VERSION,
        });
    }
    if !save.level.mapname.eq_ignore_ascii_case(&ctx.level.mapname) {
        return Err(GameError::Save(format!(
            "save is for {}, running {}",
            save.level.mapname, ctx.level.mapname
        )));
    }
    if save.game.maxclients != ctx.game.maxclients || save.clients.len() != ctx.clients.len() {
        return Err(GameError::Save(format!(
            "save has {} clients, running {}",
            save.clients.len(),
            ctx.clients.len()
        )));
    }
    Ok(())
}

/// Restore a save into the running level. Everything is checked and built
/// in a scratch copy first; on error the live state is untouched.
pub fn load_from_str(ctx: &mut GameCtx, text: &str) -> GameResult<()> {
    let save: SaveGame = serde_json::from_str(text)?;
    check_compatible(ctx, &save)?;
    let (edicts, num_edicts) = restore_edicts(ctx, &save)?;

    let count = save.entities.len();
    ctx.edicts = edicts;
    ctx.num_edicts = num_edicts;
    ctx.clients = save.clients;
    ctx.level = save.level;
    ctx.game = save.game;

    let (mins, maxs) = ctx.world.bounds();
    ctx.area.clear(&mins, &maxs);
    ctx.free_list.clear();
    for i in 0..num_edicts as usize {
        if i > ctx.game.maxclients && !ctx.edicts[i].inuse {
            ctx.free_list.push_back(i);
        }
        rebind_behaviors(ctx, i);
    }
    ctx.build_entity_indices();
    relink_all(ctx);

    info!("restored {} entities at {:.1}s on {}", count, ctx.level.time, ctx.level.mapname);
    Ok(())
}

pub fn load_entities(ctx: &mut GameCtx, path: &Path) -> GameResult<()> {
    let result = std::fs::read_to_string(path)
        .map_err(GameError::from)
        .and_then(|text| load_from_str(ctx, &text));
    if let Err(err) = &result {
        warn!("load of {} aborted: {}", path.display(), err);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{PrethinkKind, ThinkKind};
    use crate::g_spawn::spawn_level;
    use crate::g_utils::g_spawn;
    use crate::g_utils::test_support::test_ctx;
    use crate::g_world::trace;
    use crate::p_client::client_connect;

    const MAP: &str = r#"
{
"classname" "worldspawn"
}
{
"classname" "world_brush"
"mins" "-512 -512 -16"
"maxs" "512 512 0"
}
{
"classname" "info_player_start"
"origin" "0 0 24"
}
{
"classname" "monster_soldier"
"origin" "200 0 24"
"targetname" "guard1"
}
{
"classname" "target_relay"
"targetname" "relay1"
}
"#;

    fn level() -> GameCtx {
        let mut ctx = test_ctx();
        client_connect(&mut ctx, 1, "hawk").unwrap();
        spawn_level(&mut ctx, "yard", MAP).unwrap();
        ctx
    }

    fn monster(ctx: &GameCtx) -> usize {
        ctx.find_by_targetname("guard1")[0]
    }

    // ============================================================
    // Round trip
    // ============================================================

    #[test]
    fn test_load_restores_saved_state() {
        let mut ctx = level();
        let m = monster(&ctx);
        ctx.edicts[m].health = 17;
        ctx.edicts[1].health = 64;
        ctx.clients[0].resp.score = 3;
        ctx.level.time = 12.5;
        let text = save_to_string(&ctx).unwrap();

        ctx.edicts[m].health = 99;
        ctx.edicts[1].health = 1;
        ctx.clients[0].resp.score = 0;
        ctx.level.time = 20.0;
        let extra = g_spawn(&mut ctx).unwrap();
        ctx.edicts[extra].classname = "debris".to_string();

        load_from_str(&mut ctx, &text).unwrap();

        assert_eq!(ctx.edicts[m].health, 17);
        assert_eq!(ctx.edicts[1].health, 64);
        assert_eq!(ctx.clients[0].resp.score, 3);
        assert_eq!(ctx.level.time, 12.5);
        assert!(!ctx.edicts[extra].inuse);
        assert!(ctx.free_list.contains(&extra));
    }

    #[test]
    fn test_load_rebinds_behaviors_and_indices() {
        let mut ctx = level();
        let m = monster(&ctx);
        let text = save_to_string(&ctx).unwrap();
        ctx.entity_by_targetname.clear();
        load_from_str(&mut ctx, &text).unwrap();

        assert_eq!(ctx.edicts[1].prethink, Some(PrethinkKind::Player));
        assert_eq!(ctx.edicts[m].think, Some(ThinkKind::MonsterAi));
        assert_eq!(ctx.find_by_targetname("relay1").len(), 1);
        assert_eq!(monster(&ctx), m);

        // relinked: a trace still runs into the monster
        let tr = trace(&ctx, &[100.0, 0.0, 24.0], &VEC3_ORIGIN, &VEC3_ORIGIN, &[300.0, 0.0, 24.0], -1, MASK_SHOT);
        assert_eq!(tr.ent_index, m as i32);
    }

    #[test]
    fn test_handles_survive_load() {
        let mut ctx = level();
        let m = monster(&ctx);
        let player = ctx.handle_of(1);
        ctx.edicts[m].enemy = Some(player);
        let text = save_to_string(&ctx).unwrap();
        ctx.edicts[m].enemy = None;

        load_from_str(&mut ctx, &text).unwrap();
        assert_eq!(ctx.resolve_opt(ctx.edicts[m].enemy), Some(1));
    }

    #[test]
    fn test_saved_document_shape() {
        let ctx = level();
        let doc: Value = serde_json::from_str(&save_to_string(&ctx).unwrap()).unwrap();
        assert_eq!(doc["version"], SAVE_VERSION);
        assert_eq!(doc["level"]["mapname"], "yard");
        let ents = doc["entities"].as_array().unwrap();
        assert!(ents.iter().all(|e| e["slot"].is_u64() && e["fields"].is_object()));
        // behavior tags are never written
        assert!(ents.iter().all(|e| e["fields"].get("think").is_none()));
    }

    #[test]
    fn test_partial_fields_keep_live_values() {
        let mut ctx = level();
        let m = monster(&ctx);
        let mut save = build_save(&ctx).unwrap();
        for ent in save.entities.iter_mut().filter(|e| e.slot == m) {
            ent.fields.retain(|k, _| k == "health" || k == "inuse" || k == "generation");
            ent.fields.insert("health".to_string(), Value::from(5));
        }
        ctx.edicts[m].targetname = "renamed".to_string();
        load_from_str(&mut ctx, &serde_json::to_string(&save).unwrap()).unwrap();
        assert_eq!(ctx.edicts[m].health, 5);
        assert_eq!(ctx.edicts[m].targetname, "renamed");
    }

    // ============================================================
    // Failures leave the level alone
    // ============================================================

    #[test]
    fn test_version_mismatch_is_rejected() {
        let mut ctx = level();
        let m = monster(&ctx);
        let mut save = build_save(&ctx).unwrap();
        save.version = SAVE_VERSION + 1;
        let text = serde_json::to_string(&save).unwrap();
        ctx.edicts[m].health = 33;

        let err = load_from_str(&mut ctx, &text).unwrap_err();
        assert!(matches!(err, GameError::SaveVersion { found: 2, expected: 1 }));
        assert_eq!(ctx.edicts[m].health, 33);
    }

    #[test]
    fn test_garbage_and_wrong_map_are_rejected() {
        let mut ctx = level();
        let before = ctx.num_edicts;
        assert!(matches!(load_from_str(&mut ctx, "{ not json"), Err(GameError::Json(_))));

        let mut save = build_save(&ctx).unwrap();
        save.level.mapname = "elsewhere".to_string();
        let err = load_from_str(&mut ctx, &serde_json::to_string(&save).unwrap()).unwrap_err();
        assert!(matches!(err, GameError::Save(_)));
        assert_eq!(ctx.num_edicts, before);
        assert_eq!(ctx.level.mapname, "yard");
    }

    #[test]
    fn test_bad_slot_is_rejected() {
        let mut ctx = level();
        let mut save = build_save(&ctx).unwrap();
        save.entities.push(SavedEntity {
            slot: 1_000_000,
            fields: Map::new(),
        });
        assert!(matches!(
            load_from_str(&mut ctx, &serde_json::to_string(&save).unwrap()),
            Err(GameError::Save(_))
        ));
    }

    #[test]
    fn test_file_round_trip_and_missing_file() {
        let mut ctx = level();
        let path = std::env::temp_dir().join(format!("sofsim-save-{}.json", std::process::id()));
        save_entities(&ctx, &path).unwrap();
        let m = monster(&ctx);
        ctx.edicts[m].health = 1;
        load_entities(&mut ctx, &path).unwrap();
        assert_ne!(ctx.edicts[m].health, 1);
        let _ = std::fs::remove_file(&path);

        let err = load_entities(&mut ctx, &path).unwrap_err();
        assert!(matches!(err, GameError::Io(_)));
    }
}
