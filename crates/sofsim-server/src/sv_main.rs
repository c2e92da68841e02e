// sv_main.rs — main server loop and initialization
//
// Copyright (C) 1997-2001 Id Software, Inc.
// Licensed under the GNU General Public License v2.
//
// Real time is accumulated and the game is stepped in fixed 100 ms ticks.
// After every batch of ticks a snapshot is published for reader threads.

use log::{debug, error, info, warn};

use sofsim_common::q_shared::{UserCmd, SERVER_FRAMETIME_MS};
use sofsim_game::g_main::{apply_player_input, init_game, refresh_cvars, tick};
use sofsim_game::p_hud::build_snapshot;

use crate::server::*;

/// Most ticks run for one call to `sv_frame` before the backlog is dropped.
pub const MAX_CATCHUP_FRAMES: u32 = 5;

pub const DEFAULT_CONFIG: &str = "sofsim.cfg";

// =============================================================================
// Server timing
// =============================================================================

/// Fixed-timestep accumulator.
#[derive(Debug, Clone)]
pub struct ServerTiming {
    /// Tick length in milliseconds.
    pub sv_frametime: i32,

    /// Real time not yet consumed by a tick.
    pub time_residual: i32,

    /// Total real time fed in, for status output.
    pub realtime: i64,
}

impl ServerTiming {
    pub fn new() -> Self {
        Self {
            sv_frametime: SERVER_FRAMETIME_MS,
            time_residual: 0,
            realtime: 0,
        }
    }

    /// Reset the accumulator (e.g., on level change).
    pub fn reset(&mut self) {
        self.time_residual = 0;
    }
}

impl Default for ServerTiming {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================
// Init / config
// ============================================================

/// Run a config file through the variable table. Variables set here before
/// `sv_init` override the game's defaults.
pub fn sv_exec_config(ctx: &mut ServerContext, name: &str) -> ServerResult<usize> {
    let bytes = ctx.fs.load_file(name)?;
    let text = String::from_utf8_lossy(&bytes);
    let count = ctx.game.cvars.exec_text(&text);
    if ctx.state != ServerState::Dead {
        refresh_cvars(&mut ctx.game);
    }
    info!("execing {} ({} variables)", name, count);
    Ok(count)
}

/// Bring the game up. No level is loaded yet.
pub fn sv_init(ctx: &mut ServerContext) {
    init_game(&mut ctx.game);
    ctx.timing.reset();
    ctx.local_client = None;
    ctx.state = ServerState::Dead;
    *ctx.snapshot.write() = Default::default();
}

pub fn sv_shutdown(ctx: &mut ServerContext, reason: &str) {
    if ctx.state == ServerState::Dead {
        return;
    }
    info!("server shutdown: {}", reason);
    ctx.state = ServerState::Dead;
    ctx.timing.reset();
}

// ============================================================
// Input
// ============================================================

/// Queue a command for the local player; consumed by the next tick.
pub fn sv_local_input(ctx: &mut ServerContext, cmd: UserCmd) -> ServerResult<()> {
    let handle = ctx.local_handle().ok_or(ServerError::NotRunning)?;
    apply_player_input(&mut ctx.game, handle, cmd)?;
    Ok(())
}

// ============================================================
// SV_Frame
// ============================================================

/// Copy the finished tick out for readers. The snapshot is built before the
/// lock is taken so readers wait only for the swap.
pub fn sv_publish_snapshot(ctx: &ServerContext) {
    let snap = build_snapshot(&ctx.game);
    *ctx.snapshot.write() = snap;
}

fn sv_run_game_frame(ctx: &mut ServerContext) -> ServerResult<()> {
    if let Err(err) = tick(&mut ctx.game, ctx.timing.sv_frametime) {
        error!("game frame failed, stopping level: {}", err);
        ctx.state = ServerState::Dead;
        return Err(err.into());
    }
    Ok(())
}

/// Feed `msec` of real time. Runs as many whole ticks as have accumulated
/// and returns how many ran.
pub fn sv_frame(ctx: &mut ServerContext, msec: i32) -> ServerResult<u32> {
    if ctx.state != ServerState::Game {
        return Ok(0);
    }
    let msec = msec.max(0);
    ctx.timing.realtime += msec as i64;
    ctx.timing.time_residual += msec;

    let mut frames = 0;
    while ctx.timing.time_residual >= ctx.timing.sv_frametime {
        ctx.timing.time_residual -= ctx.timing.sv_frametime;
        sv_run_game_frame(ctx)?;
        frames += 1;

        if frames >= MAX_CATCHUP_FRAMES {
            if ctx.timing.time_residual > ctx.timing.sv_frametime * 2 {
                warn!("sv_frame: running behind, dropped {} ms", ctx.timing.time_residual);
                ctx.timing.time_residual = 0;
            }
            break;
        }
    }

    if frames > 0 {
        sv_publish_snapshot(ctx);
        debug!("frame {}: {} tick(s)", ctx.game.level.framenum, frames);
    }
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sv_init::test_support::running_server;
    use sofsim_common::q_shared::BUTTON_ATTACK;

    // ============================================================
    // Accumulator
    // ============================================================

    #[test]
    fn test_ticks_follow_accumulated_time() {
        let mut sv = running_server();
        assert_eq!(sv_frame(&mut sv, 40).unwrap(), 0);
        assert_eq!(sv_frame(&mut sv, 40).unwrap(), 0);
        assert_eq!(sv_frame(&mut sv, 40).unwrap(), 1);
        assert_eq!(sv.timing.time_residual, 20);
        assert_eq!(sv_frame(&mut sv, 180).unwrap(), 2);
        assert_eq!(sv.timing.time_residual, 0);
        assert_eq!(sv.game.level.framenum, 3);
        assert!((sv.game.level.time - 0.3).abs() < 1e-4);
    }

    #[test]
    fn test_backlog_is_dropped() {
        let mut sv = running_server();
        assert_eq!(sv_frame(&mut sv, 2000).unwrap(), MAX_CATCHUP_FRAMES);
        assert_eq!(sv.timing.time_residual, 0);
        assert_eq!(sv.game.level.framenum, MAX_CATCHUP_FRAMES as i32);
    }

    #[test]
    fn test_no_ticks_without_a_level() {
        let mut sv = running_server();
        sv_shutdown(&mut sv, "test");
        assert_eq!(sv_frame(&mut sv, 500).unwrap(), 0);
        assert_eq!(sv.game.level.framenum, 0);
    }

    // ============================================================
    // Snapshots
    // ============================================================

    #[test]
    fn test_snapshot_published_after_tick() {
        let mut sv = running_server();
        let snap = sv.snapshot_handle();
        sv_frame(&mut sv, 100).unwrap();
        let guard = snap.read();
        assert_eq!(guard.framenum, 1);
        let player = guard.players[0].as_ref().unwrap();
        assert_eq!(player.health, 100);
    }

    #[test]
    fn test_reader_thread_sees_whole_ticks() {
        let mut sv = running_server();
        let snap = sv.snapshot_handle();
        let reader = std::thread::spawn(move || {
            let mut last = 0;
            for _ in 0..200 {
                let s = snap.read();
                assert!(s.framenum >= last);
                assert!(s.framenum == 0 || (s.time - s.framenum as f32 * 0.1).abs() < 1e-3);
                last = s.framenum;
                drop(s);
                std::thread::yield_now();
            }
            last
        });
        for _ in 0..20 {
            sv_frame(&mut sv, 100).unwrap();
        }
        let last = reader.join().unwrap();
        assert!(last <= 20);
    }

    // ============================================================
    // Input / config
    // ============================================================

    #[test]
    fn test_local_input_moves_player() {
        let mut sv = running_server();
        let start = sv.snapshot.read().players[0].as_ref().unwrap().origin;
        for _ in 0..5 {
            let cmd = UserCmd {
                msec: 100,
                forwardmove: 200,
                ..Default::default()
            };
            sv_local_input(&mut sv, cmd).unwrap();
            sv_frame(&mut sv, 100).unwrap();
        }
        let end = sv.snapshot.read().players[0].as_ref().unwrap().origin;
        let moved = ((end[0] - start[0]).powi(2) + (end[1] - start[1]).powi(2)).sqrt();
        assert!(moved > 30.0, "moved {}", moved);

        // buttons alone are accepted too
        let cmd = UserCmd {
            buttons: BUTTON_ATTACK,
            ..Default::default()
        };
        sv_local_input(&mut sv, cmd).unwrap();
    }

    #[test]
    fn test_input_without_player_fails() {
        let mut sv = running_server();
        sv.local_client = None;
        assert!(matches!(
            sv_local_input(&mut sv, UserCmd::default()),
            Err(ServerError::NotRunning)
        ));
    }

    #[test]
    fn test_exec_config_sets_variables() {
        let mut sv = running_server();
        let count = sv_exec_config(&mut sv, "sofsim.cfg").unwrap();
        assert_eq!(count, 2);
        assert_eq!(sv.game.cvars.variable_value("ai_maxcorpses"), 4.0);
        assert_eq!(sv.game.ai_maxcorpses, 4.0);
        assert!(matches!(sv_exec_config(&mut sv, "missing.cfg"), Err(ServerError::Io(_))));
    }
}
