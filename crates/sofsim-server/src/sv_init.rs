// sv_init.rs — level loading and the local player
//
// Copyright (C) 1997-2001 Id Software, Inc.
// Licensed under the GNU General Public License v2.

use log::{error, info};

use sofsim_game::g_error::GameError;
use sofsim_game::g_local::EntityHandle;
use sofsim_game::g_spawn::spawn_level_from_file;
use sofsim_game::p_client::{client_begin, client_connect};

use crate::server::*;
use crate::sv_main::sv_publish_snapshot;

/// Slot the local player always takes.
pub const LOCAL_CLIENT: usize = 1;

pub fn map_path(mapname: &str) -> String {
    format!("maps/{}.ent", mapname)
}

// ============================================================
// SV_SpawnServer
// ============================================================

/// Load `maps/<mapname>.ent` and start running it. Players already in the
/// game are carried over to the new level.
///
/// A map that can't be read or parsed leaves the previous level running.
pub fn sv_spawn_server(ctx: &mut ServerContext, mapname: &str) -> ServerResult<()> {
    if mapname.is_empty() || mapname.contains(['/', '\\', '.']) {
        return Err(ServerError::Usage("map <name>"));
    }
    let previous = ctx.state;
    ctx.state = ServerState::Loading;
    info!("------- Server Initialization -------");

    let path = map_path(mapname);
    if let Err(err) = spawn_level_from_file(&mut ctx.game, ctx.fs.as_ref(), &path) {
        ctx.state = match err {
            GameError::Io(_) | GameError::Parse { .. } => previous,
            _ => ServerState::Dead,
        };
        error!("couldn't spawn {}: {}", mapname, err);
        return Err(err.into());
    }

    ctx.timing.reset();
    ctx.state = ServerState::Game;
    sv_publish_snapshot(ctx);
    info!("------- {} running -------", ctx.game.level.level_name);
    Ok(())
}

/// Put the local player into the running level. Returns the existing
/// handle when the player is already in.
pub fn sv_connect_local(ctx: &mut ServerContext) -> ServerResult<EntityHandle> {
    if ctx.state != ServerState::Game {
        return Err(ServerError::NotRunning);
    }
    if let Some(handle) = ctx.local_handle() {
        return Ok(handle);
    }
    let name = ctx.local_name.clone();
    client_connect(&mut ctx.game, LOCAL_CLIENT, &name)?;
    let handle = client_begin(&mut ctx.game, LOCAL_CLIENT)?;
    ctx.local_client = Some(LOCAL_CLIENT);
    sv_publish_snapshot(ctx);
    Ok(handle)
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::sv_main::{sv_frame, sv_init};

    #[test]
    fn test_spawn_and_connect() {
        let sv = running_server();
        assert_eq!(sv.state, ServerState::Game);
        assert_eq!(sv.game.level.mapname, "yard");
        assert_eq!(sv.game.level.level_name, "Test Yard");
        assert_eq!(sv.game.level.total_monsters, 1);
        let handle = sv.local_handle().unwrap();
        assert_eq!(handle.index, LOCAL_CLIENT as i32);
        let snap = sv.snapshot.read();
        assert_eq!(snap.stats.level_name, "Test Yard");
        assert!(snap.players[0].is_some());
    }

    #[test]
    fn test_connect_twice_returns_same_player() {
        let mut sv = running_server();
        let a = sv.local_handle().unwrap();
        let b = sv_connect_local(&mut sv).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_connect_needs_a_level() {
        let mut sv = ServerContext::new(Box::new(mem_fs()), scratch_savedir("nolevel"));
        sv_init(&mut sv);
        assert!(matches!(sv_connect_local(&mut sv), Err(ServerError::NotRunning)));
    }

    #[test]
    fn test_map_change_keeps_player() {
        let mut sv = running_server();
        sv_frame(&mut sv, 300).unwrap();
        let before = sv.local_handle().unwrap();
        sv_spawn_server(&mut sv, "yard2").unwrap();
        assert_eq!(sv.game.level.mapname, "yard2");
        assert_eq!(sv.game.level.framenum, 0);
        let after = sv.local_handle().unwrap();
        assert_eq!(after.index, before.index);
        assert_ne!(after, before);
        assert_eq!(sv.game.edicts[after.index as usize].s.origin[0], 100.0);
    }

    #[test]
    fn test_bad_map_keeps_current_level() {
        let mut sv = running_server();
        assert!(matches!(
            sv_spawn_server(&mut sv, "nowhere"),
            Err(ServerError::Game(GameError::Io(_)))
        ));
        assert!(matches!(
            sv_spawn_server(&mut sv, "broken"),
            Err(ServerError::Game(GameError::Parse { .. }))
        ));
        assert_eq!(sv.state, ServerState::Game);
        assert_eq!(sv.game.level.mapname, "yard");
        assert!(sv.local_handle().is_some());

        assert!(matches!(sv_spawn_server(&mut sv, "../yard"), Err(ServerError::Usage(_))));
    }
}
