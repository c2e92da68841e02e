// sv_ccmds.rs — operator console commands
//
// Copyright (C) 1997-2001 Id Software, Inc.
// Licensed under the GNU General Public License v2.

use std::fmt::Write as _;
use std::path::PathBuf;

use log::info;

use sofsim_game::g_main::{cast_vote, set_cvar, set_time_scale, start_vote};
use sofsim_game::g_save::{load_entities, save_entities};
use sofsim_game::p_hud::{help_message, scoreboard_message};

use crate::server::*;
use crate::sv_init::{sv_connect_local, sv_spawn_server};
use crate::sv_main::{sv_exec_config, sv_publish_snapshot};

/// Split a command line into words. Double quotes group words.
pub fn tokenize(line: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = String::new();
    let mut quoted = false;
    let mut has_token = false;
    for ch in line.chars() {
        match ch {
            '"' => {
                quoted = !quoted;
                has_token = true;
            }
            c if c.is_whitespace() && !quoted => {
                if has_token {
                    out.push(std::mem::take(&mut cur));
                    has_token = false;
                }
            }
            c => {
                cur.push(c);
                has_token = true;
            }
        }
    }
    if has_token {
        out.push(cur);
    }
    out
}

fn save_path(ctx: &ServerContext, name: &str) -> ServerResult<PathBuf> {
    if name.is_empty() || name.contains(['/', '\\', '.', ':']) {
        return Err(ServerError::Usage("save <name>"));
    }
    Ok(ctx.savedir.join(format!("{}.json", name)))
}

fn require_game(ctx: &ServerContext) -> ServerResult<()> {
    if ctx.state != ServerState::Game {
        return Err(ServerError::NotRunning);
    }
    Ok(())
}

// ============================================================
// Commands
// ============================================================

fn sv_map_f(ctx: &mut ServerContext, args: &[String]) -> ServerResult<String> {
    let [name] = args else {
        return Err(ServerError::Usage("map <name>"));
    };
    sv_spawn_server(ctx, name)?;
    sv_connect_local(ctx)?;
    Ok(String::new())
}

fn sv_savegame_f(ctx: &mut ServerContext, args: &[String]) -> ServerResult<String> {
    let [name] = args else {
        return Err(ServerError::Usage("save <name>"));
    };
    require_game(ctx)?;
    let path = save_path(ctx, name)?;
    std::fs::create_dir_all(&ctx.savedir)?;
    save_entities(&ctx.game, &path)?;
    Ok(format!("saved {}\n", name))
}

fn sv_loadgame_f(ctx: &mut ServerContext, args: &[String]) -> ServerResult<String> {
    let [name] = args else {
        return Err(ServerError::Usage("load <name>"));
    };
    require_game(ctx)?;
    let path = save_path(ctx, name).map_err(|_| ServerError::Usage("load <name>"))?;
    load_entities(&mut ctx.game, &path)?;
    ctx.timing.reset();
    sv_publish_snapshot(ctx);
    Ok(format!("loaded {}\n", name))
}

fn sv_set_f(ctx: &mut ServerContext, args: &[String]) -> ServerResult<String> {
    let [name, value] = args else {
        return Err(ServerError::Usage("set <name> <value>"));
    };
    set_cvar(&mut ctx.game, name, value);
    Ok(String::new())
}

fn sv_cvarlist_f(ctx: &ServerContext) -> String {
    let mut out = ctx.game.cvars.write_variables();
    let info = ctx.game.cvars.serverinfo();
    if !info.is_empty() {
        let _ = writeln!(out, "serverinfo {}", info);
    }
    out
}

fn sv_status_f(ctx: &ServerContext) -> ServerResult<String> {
    require_game(ctx)?;
    let level = &ctx.game.level;
    let mut out = String::new();
    let _ = writeln!(out, "map: {} ({})", level.mapname, level.level_name);
    let _ = writeln!(out, "time: {:.1}s frame {}", level.time, level.framenum);
    let _ = writeln!(out, "entities: {}/{}", ctx.game.num_edicts, ctx.game.max_edicts);
    out.push_str(&scoreboard_message(&ctx.game));
    Ok(out)
}

fn sv_timescale_f(ctx: &mut ServerContext, args: &[String]) -> ServerResult<String> {
    let [scale, duration] = args else {
        return Err(ServerError::Usage("timescale <scale> <seconds>"));
    };
    let (Ok(scale), Ok(duration)) = (scale.parse::<f32>(), duration.parse::<f32>()) else {
        return Err(ServerError::Usage("timescale <scale> <seconds>"));
    };
    require_game(ctx)?;
    set_time_scale(&mut ctx.game, scale, duration);
    Ok(String::new())
}

fn sv_vote_f(ctx: &mut ServerContext, args: &[String]) -> ServerResult<String> {
    if args.is_empty() {
        return Err(ServerError::Usage("vote <description>"));
    }
    require_game(ctx)?;
    if start_vote(&mut ctx.game, &args.join(" "), 30.0) {
        Ok(String::new())
    } else {
        Ok("a vote is already in progress\n".to_string())
    }
}

fn sv_cast_f(ctx: &mut ServerContext, yes: bool) -> ServerResult<String> {
    require_game(ctx)?;
    if cast_vote(&mut ctx.game, yes) {
        Ok(String::new())
    } else {
        Ok("no vote in progress\n".to_string())
    }
}

/// Run one command line. Returns text for the operator.
pub fn sv_execute_command(ctx: &mut ServerContext, line: &str) -> ServerResult<String> {
    let words = tokenize(line);
    let Some((cmd, args)) = words.split_first() else {
        return Ok(String::new());
    };
    info!("] {}", line.trim());
    match cmd.to_ascii_lowercase().as_str() {
        "map" => sv_map_f(ctx, args),
        "save" => sv_savegame_f(ctx, args),
        "load" => sv_loadgame_f(ctx, args),
        "set" => sv_set_f(ctx, args),
        "exec" => match args {
            [name] => sv_exec_config(ctx, name).map(|n| format!("{} variables set\n", n)),
            _ => Err(ServerError::Usage("exec <file>")),
        },
        "cvarlist" => Ok(sv_cvarlist_f(ctx)),
        "status" => sv_status_f(ctx),
        "help" => {
            require_game(ctx)?;
            Ok(help_message(&ctx.game))
        }
        "timescale" => sv_timescale_f(ctx, args),
        "vote" => sv_vote_f(ctx, args),
        "yes" => sv_cast_f(ctx, true),
        "no" => sv_cast_f(ctx, false),
        _ => Err(ServerError::UnknownCommand(cmd.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sv_init::test_support::{mem_fs, running_server, scratch_savedir};
    use crate::sv_main::{sv_frame, sv_init};

    #[test]
    fn test_tokenize() {
        assert_eq!(tokenize("  map   yard "), ["map", "yard"]);
        assert_eq!(tokenize("vote \"change map\" now"), ["vote", "change map", "now"]);
        assert_eq!(tokenize("set name \"\""), ["set", "name", ""]);
        assert!(tokenize("   ").is_empty());
    }

    #[test]
    fn test_map_command_starts_level_with_player() {
        let mut sv = ServerContext::new(Box::new(mem_fs()), scratch_savedir("mapcmd"));
        sv_init(&mut sv);
        sv_execute_command(&mut sv, "map yard").unwrap();
        assert_eq!(sv.state, ServerState::Game);
        assert!(sv.local_handle().is_some());
        assert!(matches!(sv_execute_command(&mut sv, "map"), Err(ServerError::Usage(_))));
    }

    #[test]
    fn test_save_and_load_commands() {
        let mut sv = running_server();
        sv.savedir = scratch_savedir("saveload");
        sv_frame(&mut sv, 200).unwrap();
        sv_execute_command(&mut sv, "save slot1").unwrap();
        assert!(sv.savedir.join("slot1.json").is_file());

        let p = sv.local_client.unwrap();
        sv.game.edicts[p].health = 3;
        let out = sv_execute_command(&mut sv, "load slot1").unwrap();
        assert!(out.starts_with("loaded"));
        assert_eq!(sv.game.edicts[p].health, 100);
        assert_eq!(sv.snapshot.read().players[0].as_ref().unwrap().health, 100);

        assert!(matches!(sv_execute_command(&mut sv, "load nothing"), Err(ServerError::Game(_))));
        assert!(matches!(sv_execute_command(&mut sv, "save ../x"), Err(ServerError::Usage(_))));
        let _ = std::fs::remove_dir_all(&sv.savedir);
    }

    #[test]
    fn test_set_and_status() {
        let mut sv = running_server();
        sv_execute_command(&mut sv, "set sv_gravity 400").unwrap();
        assert_eq!(sv.game.sv_gravity, 400.0);
        let status = sv_execute_command(&mut sv, "status").unwrap();
        assert!(status.contains("map: yard (Test Yard)"));
        assert!(status.contains("player"));
        assert!(sv_execute_command(&mut sv, "cvarlist").unwrap().contains("ai_maxcorpses"));
    }

    #[test]
    fn test_vote_commands() {
        let mut sv = running_server();
        sv_execute_command(&mut sv, "vote restart map").unwrap();
        assert!(sv_execute_command(&mut sv, "vote again").unwrap().contains("already"));
        sv_execute_command(&mut sv, "yes").unwrap();
        let vote = sv.game.level.vote.as_ref().unwrap();
        assert_eq!((vote.yes, vote.no), (1, 0));
    }

    #[test]
    fn test_timescale_and_unknown() {
        let mut sv = running_server();
        sv_execute_command(&mut sv, "timescale 0.5 2").unwrap();
        assert_eq!(sv.game.level.time_scale, 0.5);
        assert!(matches!(
            sv_execute_command(&mut sv, "timescale fast 2"),
            Err(ServerError::Usage(_))
        ));
        assert!(matches!(
            sv_execute_command(&mut sv, "noclip"),
            Err(ServerError::UnknownCommand(_))
        ));
        assert_eq!(sv_execute_command(&mut sv, "").unwrap(), "");
    }
}
