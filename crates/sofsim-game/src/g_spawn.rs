// g_spawn.rs — entity string parsing and level setup
//
// Copyright (C) 1997-2001 Id Software, Inc.
// Licensed under the GNU General Public License v2+

use std::path::Path;

use log::{debug, info, warn};

use sofsim_common::cmodel::{Brush, CollisionModel};

use crate::g_error::{GameError, GameResult};
use crate::g_items::{spawn_item, ItemKind};
use crate::g_local::*;
use crate::g_main::{refresh_cvars, set_cvar};
use crate::g_utils::{g_free_edict, g_spawn};
use crate::g_world::link_entity;
use crate::game_import::FileSystem;
use crate::m_soldier::MonsterClass;
use crate::{g_func, g_misc, g_monster, g_trigger, p_client};

type SpawnFn = fn(&mut GameCtx, usize) -> GameResult<()>;

static SPAWNS: &[(&str, SpawnFn)] = &[
    ("info_player_start", g_misc::sp_info_player),
    ("info_player_deathmatch", g_misc::sp_info_player),
    ("path_corner", g_misc::sp_path_corner),
    ("misc_deadsoldier", g_misc::sp_misc_deadsoldier),
    ("misc_explobox_big", g_misc::sp_misc_explobox_big),
    ("func_door", g_func::sp_func_door),
    ("func_plat", g_func::sp_func_plat),
    ("func_rotating", g_func::sp_func_rotating),
    ("func_wall", g_func::sp_func_wall),
    ("func_breakable", g_func::sp_func_breakable),
    ("func_explosive", g_func::sp_func_explosive),
    ("func_timer", g_func::sp_func_timer),
    ("trigger_once", g_trigger::sp_trigger_once),
    ("trigger_multiple", g_trigger::sp_trigger_multiple),
    ("trigger_hurt", g_trigger::sp_trigger_hurt),
    ("trigger_push", g_trigger::sp_trigger_push),
    ("trigger_secret", g_trigger::sp_trigger_secret),
    ("target_relay", g_trigger::sp_target_relay),
    ("target_objective", g_trigger::sp_target_objective),
];

const SP_STATUSBAR: &str = "yb -24 xv 0 hnum xv 50 pic 0 xv 100 anum xv 150 rnum";
const DM_STATUSBAR: &str = "yb -24 xv 0 hnum xv 50 pic 0 xv 100 anum xv 150 rnum xr -50 yt 2 num 3 14";

const DEFAULT_SKY: &str = "sky_overcast";

// ============================================================
// Entity string parsing
// ============================================================

/// One `{ ... }` block of the entity string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityBlock {
    pub line: usize,
    pub pairs: Vec<(String, String)>,
}

impl EntityBlock {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn classname(&self) -> &str {
        self.get("classname").unwrap_or("")
    }
}

#[derive(Debug, PartialEq)]
enum Token {
    Open,
    Close,
    Str(String),
}

struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
    line: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self { src: src.as_bytes(), pos: 0, line: 1 }
    }

    fn error(&self, reason: impl Into<String>) -> GameError {
        GameError::Parse { line: self.line, reason: reason.into() }
    }

    fn skip_space(&mut self) {
        while self.pos < self.src.len() {
            match self.src[self.pos] {
                b'\n' => {
                    self.line += 1;
                    self.pos += 1;
                }
                b'/' if self.src.get(self.pos + 1) == Some(&b'/') => {
                    while self.pos < self.src.len() && self.src[self.pos] != b'\n' {
                        self.pos += 1;
                    }
                }
                c if c.is_ascii_whitespace() => self.pos += 1,
                _ => break,
            }
        }
    }

    fn next_token(&mut self) -> GameResult<Option<Token>> {
        self.skip_space();
        let Some(&c) = self.src.get(self.pos) else {
            return Ok(None);
        };
        match c {
            b'{' => {
                self.pos += 1;
                Ok(Some(Token::Open))
            }
            b'}' => {
                self.pos += 1;
                Ok(Some(Token::Close))
            }
            b'"' => {
                self.pos += 1;
                let start = self.pos;
                while self.pos < self.src.len() && self.src[self.pos] != b'"' {
                    if self.src[self.pos] == b'\n' {
                        self.line += 1;
                    }
                    self.pos += 1;
                }
                if self.pos >= self.src.len() {
                    return Err(self.error("unterminated quoted string"));
                }
                let text = String::from_utf8_lossy(&self.src[start..self.pos]).into_owned();
                self.pos += 1;
                Ok(Some(Token::Str(text)))
            }
            _ => {
                let start = self.pos;
                while self.pos < self.src.len() {
                    let b = self.src[self.pos];
                    if b.is_ascii_whitespace() || b == b'{' || b == b'}' || b == b'"' {
                        break;
                    }
                    self.pos += 1;
                }
                let text = String::from_utf8_lossy(&self.src[start..self.pos]).into_owned();
                Ok(Some(Token::Str(text)))
            }
        }
    }
}

/// `\n` in a value becomes a newline; any other backslash is kept.
fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' && chars.peek() == Some(&'n') {
            chars.next();
            out.push('\n');
        } else {
            out.push(c);
        }
    }
    out
}

/// Split an entity string into key/value blocks.
pub fn parse_entities(text: &str) -> GameResult<Vec<EntityBlock>> {
    let mut lexer = Lexer::new(text);
    let mut blocks = Vec::new();

    loop {
        match lexer.next_token()? {
            None => break,
            Some(Token::Open) => {}
            Some(other) => return Err(lexer.error(format!("expected '{{', found {:?}", other))),
        }

        let mut block = EntityBlock { line: lexer.line, pairs: Vec::new() };
        loop {
            let key = match lexer.next_token()? {
                Some(Token::Close) => break,
                Some(Token::Str(k)) => k,
                Some(Token::Open) => return Err(lexer.error("unexpected '{' inside entity")),
                None => return Err(lexer.error("EOF inside entity")),
            };
            let value = match lexer.next_token()? {
                Some(Token::Str(v)) => unescape(&v),
                _ => return Err(lexer.error(format!("key \"{}\" has no value", key))),
            };
            block.pairs.push((key, value));
        }
        blocks.push(block);
    }
    Ok(blocks)
}

// ============================================================
// Fields
// ============================================================

/// Keys that configure the level rather than a field of the entity.
#[derive(Debug, Clone, Default)]
struct SpawnTemp {
    sky: String,
    weather: String,
    weather_density: Option<f32>,
    gravity: Option<String>,
    surface: String,
    contents: String,
}

fn parse_num<T: std::str::FromStr + Default>(key: &str, value: &str) -> T {
    value.trim().parse().unwrap_or_else(|_| {
        debug!("bad number \"{}\" for {}", value, key);
        T::default()
    })
}

/// Apply one key/value pair. Returns false for keys nothing uses.
fn ed_parse_field(e: &mut Edict, st: &mut SpawnTemp, key: &str, value: &str) -> bool {
    match key.to_ascii_lowercase().as_str() {
        "classname" => e.classname = value.to_string(),
        "origin" => e.s.origin = parse_vec3(value),
        "angles" => e.s.angles = parse_vec3(value),
        "angle" => e.s.angles = [0.0, parse_num(key, value), 0.0],
        "mins" => e.mins = parse_vec3(value),
        "maxs" => e.maxs = parse_vec3(value),
        "targetname" => e.targetname = value.to_string(),
        "target" => e.target = value.to_string(),
        "killtarget" => e.killtarget = value.to_string(),
        "deathtarget" => e.deathtarget = value.to_string(),
        "pathtarget" => e.pathtarget = value.to_string(),
        "message" => e.message = value.to_string(),
        "model" => e.model = value.to_string(),
        "spawnflags" => e.spawnflags = parse_num(key, value),
        "health" => e.health = parse_num(key, value),
        "speed" => e.speed = parse_num(key, value),
        "wait" => e.wait = parse_num(key, value),
        "delay" => e.delay = parse_num(key, value),
        "random" => e.random = parse_num(key, value),
        "lip" => e.lip = parse_num(key, value),
        "dmg" => e.dmg = parse_num(key, value),
        "mass" => e.mass = parse_num(key, value),
        "team" => e.team = parse_num(key, value),
        "count" => e.count = parse_num(key, value),
        "style" => e.style = parse_num(key, value),
        "gravity" => {
            e.gravity = parse_num(key, value);
            st.gravity = Some(value.to_string());
        }
        "sky" => st.sky = value.to_string(),
        "weather" => st.weather = value.to_string(),
        "weather_density" => st.weather_density = Some(parse_num(key, value)),
        "surface" => st.surface = value.to_string(),
        "contents" => st.contents = value.to_string(),
        _ => return false,
    }
    true
}

fn parse_block(e: &mut Edict, block: &EntityBlock) -> SpawnTemp {
    let mut st = SpawnTemp::default();
    for (key, value) in &block.pairs {
        if !ed_parse_field(e, &mut st, key, value) {
            debug!("line {}: {} is not a field", block.line, key);
        }
    }
    st
}

/// Unknown classes stay allocated, so targets naming them still resolve,
/// but never think, touch or collide.
fn make_inert(e: &mut Edict) {
    e.solid = Solid::Not;
    e.think = None;
    e.touch = None;
    e.use_fn = None;
    e.blocked = None;
    e.pain = None;
    e.die = None;
    e.nextthink = 0.0;
}

/// Entities flagged out of the current skill or game mode.
fn inhibited(ctx: &GameCtx, spawnflags: i32) -> bool {
    if ctx.deathmatch != 0.0 {
        return spawnflags & SPAWNFLAG_NOT_DEATHMATCH != 0;
    }
    match ctx.skill as i32 {
        0 => spawnflags & SPAWNFLAG_NOT_EASY != 0,
        1 => spawnflags & SPAWNFLAG_NOT_MEDIUM != 0,
        _ => spawnflags & SPAWNFLAG_NOT_HARD != 0,
    }
}

// ============================================================
// Special spawns
// ============================================================

fn contents_from_name(name: &str) -> i32 {
    match name.to_ascii_lowercase().as_str() {
        "" | "solid" => CONTENTS_SOLID,
        "window" => CONTENTS_WINDOW,
        "water" => CONTENTS_WATER,
        "slime" => CONTENTS_SLIME,
        "lava" => CONTENTS_LAVA,
        "playerclip" => CONTENTS_PLAYERCLIP,
        "monsterclip" => CONTENTS_MONSTERCLIP,
        "ladder" => CONTENTS_LADDER | CONTENTS_SOLID,
        other => {
            warn!("unknown contents \"{}\", using solid", other);
            CONTENTS_SOLID
        }
    }
}

/// Static level geometry. The entity only carries the brush in; it is
/// released once the brush is added to the world.
fn sp_world_brush(ctx: &mut GameCtx, idx: usize, st: &SpawnTemp) -> GameResult<()> {
    let (origin, mins, maxs) = {
        let e = &ctx.edicts[idx];
        (e.s.origin, e.mins, e.maxs)
    };
    let abs_mins = vector_add(&origin, &mins);
    let abs_maxs = vector_add(&origin, &maxs);
    if (0..3).any(|i| abs_maxs[i] <= abs_mins[i]) {
        warn!("world_brush at {} has no volume", vtos(&origin));
    } else {
        let mut brush = Brush::solid(abs_mins, abs_maxs);
        brush.contents = contents_from_name(&st.contents);
        let flags = match st.surface.to_ascii_lowercase().as_str() {
            s if s.contains("metal") => SURF_METAL,
            s if s.contains("sky") => SURF_SKY,
            s if s.contains("glass") => SURF_THIN,
            _ => 0,
        };
        ctx.world.add_brush(brush.with_surface(&st.surface, flags));
    }
    g_free_edict(ctx, idx);
    Ok(())
}

/// The first entity. Sets up level-wide state and configstrings.
fn sp_worldspawn(ctx: &mut GameCtx, st: &SpawnTemp) {
    let message = ctx.edicts[0].message.clone();
    ctx.level.level_name = if message.is_empty() { ctx.level.mapname.clone() } else { message };
    ctx.configstrings.set(CS_NAME, &ctx.level.level_name.clone());

    let sky = if st.sky.is_empty() { DEFAULT_SKY } else { st.sky.as_str() };
    ctx.configstrings.set(CS_SKY, sky);

    ctx.level.weather = WeatherKind::from_name(&st.weather);
    if !st.weather.is_empty() && ctx.level.weather == WeatherKind::None {
        warn!("unknown weather \"{}\"", st.weather);
    }
    ctx.level.weather_density = st.weather_density.unwrap_or(0.5).clamp(0.0, 1.0);
    if ctx.level.weather != WeatherKind::None {
        let text = format!("{:?} {:.2}", ctx.level.weather, ctx.level.weather_density).to_lowercase();
        ctx.configstrings.set(CS_WEATHER, &text);
    }

    let gravity = st.gravity.clone().unwrap_or_else(|| "800".to_string());
    set_cvar(ctx, "sv_gravity", &gravity);

    let bar = if ctx.deathmatch != 0.0 { DM_STATUSBAR } else { SP_STATUSBAR };
    ctx.configstrings.set(CS_STATUSBAR, bar);

    for snd in ["misc/talk1.wav", "misc/udeath.wav", "items/respawn1.wav", "player/fall1.wav", "player/pain1.wav"] {
        ctx.configstrings.sound_index(snd);
    }

    let world = &mut ctx.edicts[0];
    world.movetype = MoveType::Push;
    world.solid = Solid::Bsp;
    world.inuse = true;
    world.s.modelindex = 1;
}

fn call_spawn(ctx: &mut GameCtx, idx: usize, st: &SpawnTemp) -> GameResult<bool> {
    let classname = ctx.edicts[idx].classname.clone();
    if classname == "world_brush" {
        sp_world_brush(ctx, idx, st)?;
        return Ok(true);
    }
    if let Some((_, spawn)) = SPAWNS.iter().find(|(name, _)| *name == classname) {
        spawn(ctx, idx)?;
        return Ok(true);
    }
    if let Some(kind) = ItemKind::from_classname(&classname) {
        spawn_item(ctx, idx, kind)?;
        return Ok(true);
    }
    if let Some(class) = MonsterClass::from_classname(&classname) {
        g_monster::walkmonster_start(ctx, idx, class)?;
        return Ok(true);
    }
    Ok(false)
}

// ============================================================
// Level
// ============================================================

/// Throw away the previous level. Client persistent data survives.
fn reset_level(ctx: &mut GameCtx, mapname: &str) {
    p_client::save_client_data(ctx);

    // pool sizes stay latched until a restart
    for name in ["skill", "deathmatch"] {
        if ctx.cvars.get_latched_var(name) {
            info!("{} is now {}", name, ctx.cvars.variable_string(name));
        }
    }
    refresh_cvars(ctx);
    ctx.skill = ctx.skill.floor().clamp(0.0, 3.0);

    for (i, e) in ctx.edicts.iter_mut().enumerate() {
        let generation = e.generation.wrapping_add(1);
        *e = Edict::init(i, generation);
        e.inuse = false;
    }
    ctx.edicts[0].inuse = true;
    ctx.edicts[0].classname = "worldspawn".to_string();

    for client in ctx.clients.iter_mut() {
        let pers = std::mem::take(&mut client.pers);
        *client = GClient { pers, ..Default::default() };
    }

    ctx.world.clear();
    let (mins, maxs) = ctx.world.bounds();
    ctx.area.clear(&mins, &maxs);
    ctx.free_list.clear();
    ctx.num_edicts = ctx.game.maxclients as i32 + 1;
    ctx.entity_by_targetname.clear();
    ctx.entity_by_classname.clear();
    ctx.means_of_death = MeansOfDeath::Unknown;

    ctx.level = LevelLocals {
        mapname: mapname.to_string(),
        time_scale: ctx.g_timescale,
        ..Default::default()
    };

    ctx.configstrings.clear();
    ctx.configstrings.set(CS_MAXCLIENTS, &ctx.game.maxclients.to_string());
}

/// Replace the running level with the one described by `entities`.
///
/// The string is parsed completely before anything is touched, so a
/// malformed level leaves the current one running.
pub fn spawn_level(ctx: &mut GameCtx, mapname: &str, entities: &str) -> GameResult<()> {
    let blocks = parse_entities(entities)?;
    reset_level(ctx, mapname);

    let mut world_seen = false;
    let (mut spawned, mut inhibit, mut unknown, mut faulted) = (0, 0, 0, 0);

    for (n, block) in blocks.iter().enumerate() {
        if n == 0 && block.classname().eq_ignore_ascii_case("worldspawn") {
            let st = parse_block(&mut ctx.edicts[0], block);
            ctx.edicts[0].classname = "worldspawn".to_string();
            sp_worldspawn(ctx, &st);
            world_seen = true;
            continue;
        }
        if block.classname().eq_ignore_ascii_case("worldspawn") {
            warn!("line {}: extra worldspawn ignored", block.line);
            continue;
        }

        let idx = g_spawn(ctx)?;
        let st = parse_block(&mut ctx.edicts[idx], block);

        if ctx.edicts[idx].classname == "noclass" {
            warn!("line {}: entity without a classname", block.line);
            g_free_edict(ctx, idx);
            unknown += 1;
            continue;
        }
        if inhibited(ctx, ctx.edicts[idx].spawnflags) {
            g_free_edict(ctx, idx);
            inhibit += 1;
            continue;
        }
        ctx.edicts[idx].spawnflags &=
            !(SPAWNFLAG_NOT_EASY | SPAWNFLAG_NOT_MEDIUM | SPAWNFLAG_NOT_HARD | SPAWNFLAG_NOT_DEATHMATCH);

        match call_spawn(ctx, idx, &st) {
            Ok(true) => spawned += 1,
            Ok(false) => {
                warn!("line {}: {} doesn't have a spawn function", block.line, ctx.edicts[idx].classname);
                make_inert(&mut ctx.edicts[idx]);
                unknown += 1;
            }
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                warn!("line {}: {} failed to spawn: {}", block.line, ctx.edicts[idx].classname, err);
                g_free_edict(ctx, idx);
                faulted += 1;
            }
        }
    }

    if !world_seen {
        warn!("{}: no worldspawn, using defaults", mapname);
        sp_worldspawn(ctx, &SpawnTemp::default());
    }

    ctx.build_entity_indices();

    for i in 1..=ctx.game.maxclients {
        if ctx.clients.get(i - 1).is_some_and(|c| c.pers.connected) {
            p_client::put_client_in_server(ctx, i)?;
        }
    }

    info!(
        "{}: {} entities spawned, {} inhibited, {} unknown, {} failed; {} monsters, {} secrets, {} brushes",
        mapname,
        spawned,
        inhibit,
        unknown,
        faulted,
        ctx.level.total_monsters,
        ctx.level.total_secrets,
        ctx.world.brushes.len()
    );
    Ok(())
}

/// Load `path` through `fs` and spawn it. The map name is the file stem.
pub fn spawn_level_from_file(ctx: &mut GameCtx, fs: &dyn FileSystem, path: &str) -> GameResult<()> {
    let bytes = fs.load_file(path)?;
    let text = String::from_utf8_lossy(&bytes);
    let mapname = Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string();
    spawn_level(ctx, &mapname, &text)
}

/// Spawn one entity into the running level, the same way a level block is
/// spawned. `worldspawn` and `world_brush` are level-only.
pub fn spawn_entity(ctx: &mut GameCtx, classname: &str, pairs: &[(&str, &str)]) -> GameResult<EntityHandle> {
    if classname.eq_ignore_ascii_case("worldspawn") || classname.eq_ignore_ascii_case("world_brush") {
        return Err(GameError::SpawnFailed(format!("{} can't be spawned at runtime", classname)));
    }
    let mut block = EntityBlock {
        line: 0,
        pairs: vec![("classname".to_string(), classname.to_string())],
    };
    block.pairs.extend(
        pairs
            .iter()
            .filter(|(k, _)| !k.eq_ignore_ascii_case("classname"))
            .map(|(k, v)| (k.to_string(), v.to_string())),
    );

    let idx = g_spawn(ctx)?;
    let st = parse_block(&mut ctx.edicts[idx], &block);
    match call_spawn(ctx, idx, &st) {
        Ok(true) => {}
        Ok(false) => {
            g_free_edict(ctx, idx);
            return Err(GameError::SpawnFailed(format!("no spawn function for {}", classname)));
        }
        Err(err) => {
            if ctx.edicts[idx].inuse {
                g_free_edict(ctx, idx);
            }
            return Err(err);
        }
    }
    if !ctx.edicts[idx].inuse {
        return Err(GameError::SpawnFailed(format!("{} removed itself", classname)));
    }
    ctx.register_entity_in_index(idx);
    debug!("spawned {} at {}", classname, vtos(&ctx.edicts[idx].s.origin));
    Ok(ctx.handle_of(idx))
}

/// Re-link every in-use entity, e.g. after the spatial index was rebuilt.
pub fn relink_all(ctx: &mut GameCtx) {
    for i in 1..ctx.num_edicts as usize {
        if ctx.edicts[i].inuse {
            link_entity(ctx, i);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::g_utils::test_support::test_ctx;
    use crate::g_world::trace;
    use std::collections::HashMap;

    const MAP: &str = r#"
// a small test level
{
"classname" "worldspawn"
"message" "Training\nGrounds"
"sky" "sky_night"
"weather" "rain"
"weather_density" "0.25"
"gravity" "600"
}
{
"classname" "world_brush"
"mins" "-512 -512 -16"
"maxs" "512 512 0"
}
{
"classname" "info_player_start"
"origin" "0 0 24"
"angle" "90"
}
{
"classname" "monster_soldier"
"origin" "200 0 24"
"targetname" "guard1"
}
{
"classname" "monster_guard"
"origin" "-200 0 24"
"spawnflags" "512"
}
{
"classname" "item_medkit"
"origin" "64 64 16"
}
{
"classname" "func_door"
"origin" "300 0 0"
"mins" "-8 -32 0"
"maxs" "8 32 96"
"angle" "90"
}
{
"classname" "misc_teapot"
"origin" "0 0 0"
}
"#;

    struct MemFs(HashMap<String, String>);

    impl FileSystem for MemFs {
        fn load_file(&self, path: &str) -> std::io::Result<Vec<u8>> {
            self.0
                .get(path)
                .map(|s| s.as_bytes().to_vec())
                .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, path.to_string()))
        }
    }

    // ============================================================
    // Parser
    // ============================================================

    #[test]
    fn test_parse_blocks_and_comments() {
        let blocks = parse_entities(MAP).unwrap();
        assert_eq!(blocks.len(), 8);
        assert_eq!(blocks[0].classname(), "worldspawn");
        assert_eq!(blocks[0].get("message"), Some("Training\nGrounds"));
        assert_eq!(blocks[3].get("TARGETNAME"), Some("guard1"));
    }

    #[test]
    fn test_parse_bare_words() {
        let blocks = parse_entities("{ classname info_player_start origin \"1 2 3\" }").unwrap();
        assert_eq!(blocks[0].classname(), "info_player_start");
        assert_eq!(blocks[0].get("origin"), Some("1 2 3"));
    }

    #[test]
    fn test_parse_errors_carry_line() {
        let err = parse_entities("{\n\"classname\" \"x\"\n\"origin\"\n}").unwrap_err();
        assert!(matches!(err, GameError::Parse { line: 4, .. }), "{err}");

        let err = parse_entities("{\n\"message\" \"never closed\n}").unwrap_err();
        assert!(matches!(err, GameError::Parse { .. }));

        assert!(parse_entities("\"classname\" \"x\"").is_err());
        assert!(parse_entities("{ \"a\" \"b\" { }").is_err());
        assert!(parse_entities("{ \"a\" \"b\"").is_err());
        assert!(parse_entities("").unwrap().is_empty());
    }

    // ============================================================
    // Level
    // ============================================================

    #[test]
    fn test_spawn_level_sets_world_state() {
        let mut ctx = test_ctx();
        spawn_level(&mut ctx, "train", MAP).unwrap();

        assert_eq!(ctx.level.mapname, "train");
        assert_eq!(ctx.level.level_name, "Training\nGrounds");
        assert_eq!(ctx.configstrings.get(CS_SKY), "sky_night");
        assert_eq!(ctx.level.weather, WeatherKind::Rain);
        assert!((ctx.level.weather_density - 0.25).abs() < 1e-6);
        assert_eq!(ctx.configstrings.get(CS_WEATHER), "rain 0.25");
        assert_eq!(ctx.sv_gravity, 600.0);
        assert_eq!(ctx.world.brushes.len(), 1);
    }

    #[test]
    fn test_spawn_level_populates_entities() {
        let mut ctx = test_ctx();
        spawn_level(&mut ctx, "train", MAP).unwrap();

        // skill 1 drops the NOT_MEDIUM guard
        assert_eq!(ctx.level.total_monsters, 1);
        assert_eq!(ctx.find_by_targetname("guard1").len(), 1);
        assert_eq!(ctx.find_by_classname("monster_guard").len(), 0);
        assert_eq!(ctx.find_by_classname("misc_teapot").len(), 1);
        assert_eq!(ctx.find_by_classname("item_medkit").len(), 1);
        assert_eq!(ctx.find_by_classname("door_trigger").len(), 1);

        let start = ctx.find_by_classname("info_player_start")[0];
        assert_eq!(ctx.edicts[start].s.angles, [0.0, 90.0, 0.0]);

        // the floor brush is real geometry
        let tr = trace(&ctx, &[0.0, 0.0, 64.0], &VEC3_ORIGIN, &VEC3_ORIGIN, &[0.0, 0.0, -64.0], -1, MASK_SOLID);
        assert!(tr.fraction < 1.0);
        assert!(tr.endpos[2].abs() < 0.1);
    }

    #[test]
    fn test_unknown_classname_stays_inert() {
        let mut ctx = test_ctx();
        let map = "{ \"classname\" \"worldspawn\" }\n\
                   { \"classname\" \"misc_teapot\" \"targetname\" \"pot\" \"origin\" \"8 8 8\" }";
        spawn_level(&mut ctx, "pots", map).unwrap();

        let pots = ctx.find_by_classname("misc_teapot");
        assert_eq!(pots.len(), 1);
        assert_eq!(ctx.find_by_targetname("pot"), pots);
        let pot = &ctx.edicts[pots[0]];
        assert!(pot.inuse);
        assert_eq!(pot.solid, Solid::Not);
        assert!(pot.think.is_none() && pot.touch.is_none() && pot.use_fn.is_none());
        assert_eq!(pot.s.origin, [8.0, 8.0, 8.0]);

        // a tick later it is still there
        crate::g_main::tick(&mut ctx, 100).unwrap();
        assert!(ctx.edicts[pots[0]].inuse);
    }

    #[test]
    fn test_skill_and_deathmatch_filters() {
        let mut ctx = test_ctx();
        set_cvar(&mut ctx, "skill", "2");
        // latched until the next level
        assert_eq!(ctx.skill, 1.0);
        spawn_level(&mut ctx, "train", MAP).unwrap();
        assert_eq!(ctx.skill, 2.0);
        assert_eq!(ctx.level.total_monsters, 2);

        set_cvar(&mut ctx, "deathmatch", "1");
        spawn_level(&mut ctx, "train", MAP).unwrap();
        // monsters never appear in deathmatch
        assert_eq!(ctx.level.total_monsters, 0);
        assert_eq!(ctx.configstrings.get(CS_STATUSBAR), DM_STATUSBAR);
    }

    #[test]
    fn test_respawning_a_level_invalidates_old_handles() {
        let mut ctx = test_ctx();
        spawn_level(&mut ctx, "train", MAP).unwrap();
        let guard = ctx.find_by_targetname("guard1")[0];
        let handle = ctx.handle_of(guard);
        assert!(ctx.resolve(handle).is_some());

        spawn_level(&mut ctx, "train", MAP).unwrap();
        assert!(ctx.resolve(handle).is_none());
        assert_eq!(ctx.world.brushes.len(), 1);
        assert_eq!(ctx.level.total_monsters, 1);
    }

    #[test]
    fn test_bad_string_keeps_current_level() {
        let mut ctx = test_ctx();
        spawn_level(&mut ctx, "train", MAP).unwrap();
        let err = spawn_level(&mut ctx, "broken", "{ \"classname\" ").unwrap_err();
        assert!(matches!(err, GameError::Parse { .. }));
        assert_eq!(ctx.level.mapname, "train");
        assert_eq!(ctx.find_by_targetname("guard1").len(), 1);
    }

    #[test]
    fn test_missing_worldspawn_uses_defaults() {
        let mut ctx = test_ctx();
        spawn_level(&mut ctx, "bare", "{ \"classname\" \"info_player_start\" }").unwrap();
        assert_eq!(ctx.configstrings.get(CS_SKY), DEFAULT_SKY);
        assert_eq!(ctx.level.level_name, "bare");
        assert_eq!(ctx.sv_gravity, 800.0);
    }

    #[test]
    fn test_spawn_from_file() {
        let mut ctx = test_ctx();
        let mut files = HashMap::new();
        files.insert("maps/train.ent".to_string(), MAP.to_string());
        let fs = MemFs(files);

        spawn_level_from_file(&mut ctx, &fs, "maps/train.ent").unwrap();
        assert_eq!(ctx.level.mapname, "train");

        let err = spawn_level_from_file(&mut ctx, &fs, "maps/none.ent").unwrap_err();
        assert!(matches!(err, GameError::Io(_)));
    }

    #[test]
    fn test_connected_players_enter_the_new_level() {
        let mut ctx = test_ctx();
        ctx.clients[0].pers.connected = true;
        ctx.clients[0].pers.netname = "hawk".to_string();
        spawn_level(&mut ctx, "train", MAP).unwrap();

        let player = &ctx.edicts[1];
        assert!(player.inuse);
        assert_eq!(player.client, Some(0));
        assert_eq!(player.s.origin[0], 0.0);
        assert_eq!(player.s.angles[YAW], 90.0);
        assert_eq!(ctx.clients[0].pers.netname, "hawk");
    }

    #[test]
    fn test_spawn_entity_at_runtime() {
        let mut ctx = test_ctx();
        spawn_level(&mut ctx, "train", MAP).unwrap();
        let before = ctx.find_by_classname("item_medkit").len();

        let handle = spawn_entity(
            &mut ctx,
            "item_medkit",
            &[("origin", "-64 -64 16"), ("targetname", "extra_kit")],
        )
        .unwrap();
        let idx = ctx.resolve(handle).unwrap();
        assert_eq!(ctx.edicts[idx].classname, "item_medkit");
        assert_eq!(ctx.find_by_targetname("extra_kit"), vec![idx]);
        assert_eq!(ctx.find_by_classname("item_medkit").len(), before + 1);
    }

    #[test]
    fn test_spawn_entity_rejects_unknown_and_level_only() {
        let mut ctx = test_ctx();
        spawn_level(&mut ctx, "train", MAP).unwrap();
        let used = ctx.edicts.iter().filter(|e| e.inuse).count();

        assert!(matches!(spawn_entity(&mut ctx, "misc_teapot", &[]), Err(GameError::SpawnFailed(_))));
        assert!(matches!(spawn_entity(&mut ctx, "worldspawn", &[]), Err(GameError::SpawnFailed(_))));
        assert!(matches!(spawn_entity(&mut ctx, "world_brush", &[]), Err(GameError::SpawnFailed(_))));
        assert_eq!(ctx.edicts.iter().filter(|e| e.inuse).count(), used);
    }
}
