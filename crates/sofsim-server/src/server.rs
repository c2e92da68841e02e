// server.rs — core server types and errors
//
// Copyright (C) 1997-2001 Id Software, Inc.
// Licensed under the GNU General Public License v2 or later.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

use sofsim_game::g_error::GameError;
use sofsim_game::g_local::{EntityHandle, GameCtx};
use sofsim_game::game_import::FileSystem;
use sofsim_game::p_hud::GameSnapshot;

use crate::sv_main::ServerTiming;

// ============================================================
// Errors
// ============================================================

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Game(#[from] GameError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no level is running")]
    NotRunning,

    #[error("unknown command \"{0}\"")]
    UnknownCommand(String),

    #[error("usage: {0}")]
    Usage(&'static str),
}

pub type ServerResult<T> = Result<T, ServerError>;

// ============================================================
// server_state_t
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServerState {
    #[default]
    Dead,    // no map loaded
    Loading, // spawning level entities
    Game,    // actively running
}

/// Snapshot handle shared with renderer/HUD threads. Written once per tick.
pub type SharedSnapshot = Arc<RwLock<GameSnapshot>>;

// ============================================================
// ServerContext
// ============================================================

/// Everything the driver owns. The game context is only ever touched from
/// the thread that calls `sv_frame`.
pub struct ServerContext {
    pub state: ServerState,
    pub game: GameCtx,
    pub timing: ServerTiming,
    pub fs: Box<dyn FileSystem>,
    /// Where `save`/`load` put their files.
    pub savedir: PathBuf,
    pub snapshot: SharedSnapshot,

    /// Slot of the local player, if one has joined.
    pub local_client: Option<usize>,
    pub local_name: String,
}

impl ServerContext {
    pub fn new(fs: Box<dyn FileSystem>, savedir: PathBuf) -> Self {
        Self {
            state: ServerState::Dead,
            game: GameCtx::new(),
            timing: ServerTiming::new(),
            fs,
            savedir,
            snapshot: Arc::new(RwLock::new(GameSnapshot::default())),
            local_client: None,
            local_name: "player".to_string(),
        }
    }

    /// A clone of the snapshot handle for a reader thread.
    pub fn snapshot_handle(&self) -> SharedSnapshot {
        Arc::clone(&self.snapshot)
    }

    /// Current handle of the local player's entity. Changes on every level
    /// load since the entity is re-created.
    pub fn local_handle(&self) -> Option<EntityHandle> {
        let idx = self.local_client?;
        let e = self.game.edicts.get(idx)?;
        if !e.inuse || e.client.is_none() {
            return None;
        }
        Some(self.game.handle_of(idx))
    }
}
