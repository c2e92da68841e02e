// game.rs — entity-level types shared with the server driver

use serde::{Deserialize, Serialize};

// edict->svflags
pub const SVF_NOCLIENT: i32 = 0x00000001; // don't send entity to clients
pub const SVF_DEADMONSTER: i32 = 0x00000002; // treat as CONTENTS_DEADMONSTER for collision
pub const SVF_MONSTER: i32 = 0x00000004; // treat as CONTENTS_MONSTER for collision
pub const SVF_PROJECTILE: i32 = 0x00000008;

// edict->solid values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(i32)]
pub enum Solid {
    #[default]
    Not = 0, // no interaction with other objects
    Trigger, // only touch when inside, after moving
    Bbox,    // touch on edge
    Bsp,     // mover brush
}

/// Stable reference to an entity slot. Goes stale when the slot is freed,
/// even if the slot is later reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityHandle {
    pub index: i32,
    pub generation: u32,
}

impl EntityHandle {
    pub const fn new(index: i32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub fn slot(&self) -> usize {
        self.index as usize
    }
}
