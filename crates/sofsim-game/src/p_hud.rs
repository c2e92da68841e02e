// p_hud.rs — read-only views of a finished tick: player HUD, visible
// entities, scoreboard and level statistics
//
// Copyright (C) 1997-2001 Id Software, Inc.
//
// This program is free software; you can redistribute it and/or
// modify it under the terms of the GNU General Public License
// as published by the Free Software Foundation; either version 2
// of the License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
//
// See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program; if not, write to the Free Software
// Foundation, Inc., 59 Temple Place - Suite 330, Boston, MA  02111-1307, USA.

use std::fmt::Write as _;

use serde::Serialize;

use crate::g_local::*;
use crate::g_weapon::WeaponKind;

/// What a HUD needs about one player.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerSnapshot {
    pub health: i32,
    pub armor: i32,
    pub weapon: WeaponKind,
    pub ammo_in_mag: i32,
    pub ammo_reserve: i32,
    pub origin: Vec3,
    pub view_angles: Vec3,
    pub blend: [f32; 4],
}

/// What a renderer needs about one visible entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntitySnapshot {
    pub index: i32,
    pub origin: Vec3,
    pub angles: Vec3,
    pub model_index: i32,
    pub frame: i32,
    pub effects: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LevelStats {
    pub level_name: String,
    pub objective: String,
    pub killed_monsters: i32,
    pub total_monsters: i32,
    pub found_secrets: i32,
    pub total_secrets: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreRow {
    pub slot: usize,
    pub name: String,
    pub score: i32,
    pub kills: i32,
    pub deaths: i32,
    pub best_streak: i32,
    /// Seconds since the player entered the level.
    pub time: f32,
}

/// Everything published after one tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GameSnapshot {
    pub framenum: i32,
    pub time: f32,
    /// Indexed by client slot; `None` for slots with no player in the world.
    pub players: Vec<Option<PlayerSnapshot>>,
    pub entities: Vec<EntitySnapshot>,
    pub stats: LevelStats,
}

pub fn player_snapshot(ctx: &GameCtx, idx: usize) -> Option<PlayerSnapshot> {
    let e = ctx.edicts.get(idx)?;
    if !e.inuse {
        return None;
    }
    let client = ctx.client_of(idx)?;
    let pers = &client.pers;
    let weapon = pers.weapon;
    let info = weapon.info();
    Some(PlayerSnapshot {
        health: e.health,
        armor: pers.armor,
        weapon,
        ammo_in_mag: pers.mag[weapon as usize],
        ammo_reserve: pers.ammo[info.ammo as usize],
        origin: e.s.origin,
        view_angles: client.ps.viewangles,
        blend: client.ps.blend,
    })
}

/// Entities a renderer would draw, in slot order.
pub fn entity_snapshots(ctx: &GameCtx) -> Vec<EntitySnapshot> {
    ctx.edicts
        .iter()
        .take(ctx.num_edicts.max(0) as usize)
        .enumerate()
        .skip(1)
        .filter(|(_, e)| e.inuse && e.svflags & SVF_NOCLIENT == 0)
        .filter(|(_, e)| e.s.modelindex != 0 || e.s.effects != 0)
        .map(|(i, e)| EntitySnapshot {
            index: i as i32,
            origin: e.s.origin,
            angles: e.s.angles,
            model_index: e.s.modelindex,
            frame: e.s.frame,
            effects: e.s.effects,
        })
        .collect()
}

pub fn level_stats(ctx: &GameCtx) -> LevelStats {
    let level = &ctx.level;
    LevelStats {
        level_name: level.level_name.clone(),
        objective: level.objective.clone(),
        killed_monsters: level.killed_monsters,
        total_monsters: level.total_monsters,
        found_secrets: level.found_secrets,
        total_secrets: level.total_secrets,
    }
}

pub fn build_snapshot(ctx: &GameCtx) -> GameSnapshot {
    let players = (1..=ctx.game.maxclients).map(|i| player_snapshot(ctx, i)).collect();
    GameSnapshot {
        framenum: ctx.level.framenum,
        time: ctx.level.time,
        players,
        entities: entity_snapshots(ctx),
        stats: level_stats(ctx),
    }
}

// ============================================================
// Scoreboard
// ============================================================

/// Connected players, best score first. Ties go to fewer deaths, then slot.
pub fn scoreboard(ctx: &GameCtx) -> Vec<ScoreRow> {
    let mut rows: Vec<ScoreRow> = ctx
        .clients
        .iter()
        .enumerate()
        .filter(|(_, c)| c.pers.connected)
        .map(|(i, c)| ScoreRow {
            slot: i + 1,
            name: c.pers.netname.clone(),
            score: c.resp.score,
            kills: c.resp.kills,
            deaths: c.resp.deaths,
            best_streak: c.resp.best_streak,
            time: (ctx.level.time - c.resp.enter_time).max(0.0),
        })
        .collect();
    rows.sort_by(|a, b| b.score.cmp(&a.score).then(a.deaths.cmp(&b.deaths)).then(a.slot.cmp(&b.slot)));
    rows
}

/// Plain-text scoreboard, one line per player.
pub fn scoreboard_message(ctx: &GameCtx) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<16} {:>5} {:>5} {:>6} {:>5}", "name", "score", "kills", "deaths", "mins");
    for row in scoreboard(ctx) {
        let _ = writeln!(
            out,
            "{:<16} {:>5} {:>5} {:>6} {:>5}",
            row.name,
            row.score,
            row.kills,
            row.deaths,
            (row.time / 60.0) as i32
        );
    }
    out
}

/// Single player help screen: objective and progress.
pub fn help_message(ctx: &GameCtx) -> String {
    let stats = level_stats(ctx);
    let mut out = String::new();
    let _ = writeln!(out, "{}", stats.level_name);
    if !stats.objective.is_empty() {
        let _ = writeln!(out, "{}", stats.objective);
    }
    let _ = writeln!(out, "kills   {}/{}", stats.killed_monsters, stats.total_monsters);
    let _ = writeln!(out, "secrets {}/{}", stats.found_secrets, stats.total_secrets);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::g_utils::test_support::{make_edict, make_monster, make_player, test_ctx};

    #[test]
    fn test_player_snapshot_reports_current_weapon() {
        let mut ctx = test_ctx();
        let p = make_player(&mut ctx, [10.0, 20.0, 24.0]);
        let pers = &mut ctx.clients[0].pers;
        pers.weapon = WeaponKind::Pistol2;
        pers.mag[WeaponKind::Pistol2 as usize] = 12;
        pers.ammo[WeaponKind::Pistol2.info().ammo as usize] = 30;
        pers.armor = 25;

        let snap = player_snapshot(&ctx, p).unwrap();
        assert_eq!(snap.health, 100);
        assert_eq!(snap.armor, 25);
        assert_eq!(snap.weapon, WeaponKind::Pistol2);
        assert_eq!(snap.ammo_in_mag, 12);
        assert_eq!(snap.ammo_reserve, 30);
        assert_eq!(snap.origin, [10.0, 20.0, 24.0]);

        assert!(player_snapshot(&ctx, 0).is_none());
    }

    #[test]
    fn test_entity_snapshots_skip_invisible() {
        let mut ctx = test_ctx();
        let p = make_player(&mut ctx, [0.0, 0.0, 24.0]);
        ctx.edicts[p].s.modelindex = 255;
        let m = make_monster(&mut ctx, [100.0, 0.0, 24.0], 50);
        ctx.edicts[m].s.modelindex = 5;
        let hidden = make_edict(&mut ctx, [0.0; 3]);
        ctx.edicts[hidden].s.modelindex = 3;
        ctx.edicts[hidden].svflags |= SVF_NOCLIENT;
        let blank = make_edict(&mut ctx, [0.0; 3]);

        let ents = entity_snapshots(&ctx);
        let indices: Vec<i32> = ents.iter().map(|e| e.index).collect();
        assert!(indices.contains(&(p as i32)));
        assert!(indices.contains(&(m as i32)));
        assert!(!indices.contains(&(hidden as i32)));
        assert!(!indices.contains(&(blank as i32)));
        assert!(indices.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_build_snapshot_has_a_slot_per_client() {
        let mut ctx = test_ctx();
        let snap = build_snapshot(&ctx);
        assert_eq!(snap.players, vec![None]);

        make_player(&mut ctx, [0.0, 0.0, 24.0]);
        ctx.level.total_monsters = 3;
        ctx.level.killed_monsters = 1;
        let snap = build_snapshot(&ctx);
        assert!(snap.players[0].is_some());
        assert_eq!((snap.stats.killed_monsters, snap.stats.total_monsters), (1, 3));
        assert!(serde_json::to_string(&snap).is_ok());
    }

    #[test]
    fn test_scoreboard_order() {
        let mut ctx = test_ctx();
        ctx.clients.push(GClient::default());
        ctx.clients.push(GClient::default());
        for (i, (name, score, deaths)) in [("a", 2, 3), ("b", 5, 0), ("c", 2, 1)].into_iter().enumerate() {
            let c = &mut ctx.clients[i];
            c.pers.connected = true;
            c.pers.netname = name.to_string();
            c.resp.score = score;
            c.resp.deaths = deaths;
        }
        let names: Vec<String> = scoreboard(&ctx).into_iter().map(|r| r.name).collect();
        assert_eq!(names, ["b", "c", "a"]);
        let text = scoreboard_message(&ctx);
        assert_eq!(text.lines().count(), 4);
        assert!(text.lines().nth(1).unwrap().starts_with('b'));
    }

    #[test]
    fn test_help_lists_progress() {
        let mut ctx = test_ctx();
        ctx.level.level_name = "Train Yard".to_string();
        ctx.level.objective = "Find the detonator".to_string();
        ctx.level.total_secrets = 2;
        let text = help_message(&ctx);
        assert!(text.contains("Find the detonator"));
        assert!(text.contains("secrets 0/2"));
    }
}
