//! Services the simulation core consumes from the rest of the engine.
//!
//! Renderer and audio calls are fire-and-forget: nothing the core does
//! depends on their result. Player movement is a pure function supplied
//! through [`PlayerMovement`]. Level files come through [`FileSystem`].

use log::trace;

use sofsim_common::pmove::{pmove, MoveWorld, PmoveData};
use sofsim_common::q_shared::Vec3;

// sound channels
pub const CHAN_AUTO: i32 = 0;
pub const CHAN_WEAPON: i32 = 1;
pub const CHAN_VOICE: i32 = 2;
pub const CHAN_ITEM: i32 = 3;
pub const CHAN_BODY: i32 = 4;

// sound attenuation values
pub const ATTN_NONE: f32 = 0.0; // full volume the entire level
pub const ATTN_NORM: f32 = 1.0;
pub const ATTN_IDLE: f32 = 2.0;
pub const ATTN_STATIC: f32 = 3.0; // diminish very rapidly with distance

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectKind {
    Blood,
    Sparks,
    Ricochet,
    Explosion,
    Gib,
    Debris,
    Smoke,
    Flame,
    Splash,
    MuzzleFlash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecalKind {
    BulletHole,
    Scorch,
    Blood,
}

/// Renderer, audio and text output used by the game.
pub trait GameImport {
    // Renderer
    fn spawn_particle_effect(&self, origin: &Vec3, dir: &Vec3, kind: EffectKind, count: i32);
    fn add_dynamic_light(&self, origin: &Vec3, color: &Vec3, intensity: f32, duration: f32);
    fn add_tracer(&self, start: &Vec3, end: &Vec3, color: &Vec3);
    fn add_decal(&self, origin: &Vec3, normal: &Vec3, kind: DecalKind);

    // Audio
    fn play_sound(&self, ent_idx: i32, channel: i32, soundindex: i32, volume: f32, attenuation: f32, timeofs: f32);
    fn play_positioned_sound(
        &self,
        origin: &Vec3,
        ent_idx: i32,
        channel: i32,
        soundindex: i32,
        volume: f32,
        attenuation: f32,
        timeofs: f32,
    );

    // Text
    fn centerprintf(&self, ent_idx: i32, msg: &str);
    fn bprintf(&self, msg: &str);
}

/// Headless implementation: everything goes to the trace log.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubGameImport;

impl GameImport for StubGameImport {
    fn spawn_particle_effect(&self, origin: &Vec3, _dir: &Vec3, kind: EffectKind, count: i32) {
        trace!("particles {:?} x{} at {:?}", kind, count, origin);
    }

    fn add_dynamic_light(&self, origin: &Vec3, _color: &Vec3, intensity: f32, duration: f32) {
        trace!("light {} for {}s at {:?}", intensity, duration, origin);
    }

    fn add_tracer(&self, start: &Vec3, end: &Vec3, _color: &Vec3) {
        trace!("tracer {:?} -> {:?}", start, end);
    }

    fn add_decal(&self, origin: &Vec3, _normal: &Vec3, kind: DecalKind) {
        trace!("decal {:?} at {:?}", kind, origin);
    }

    fn play_sound(&self, ent_idx: i32, channel: i32, soundindex: i32, _volume: f32, _attenuation: f32, _timeofs: f32) {
        trace!("sound {} on ent {} chan {}", soundindex, ent_idx, channel);
    }

    fn play_positioned_sound(
        &self,
        origin: &Vec3,
        _ent_idx: i32,
        _channel: i32,
        soundindex: i32,
        _volume: f32,
        _attenuation: f32,
        _timeofs: f32,
    ) {
        trace!("sound {} at {:?}", soundindex, origin);
    }

    fn centerprintf(&self, ent_idx: i32, msg: &str) {
        trace!("centerprint to {}: {}", ent_idx, msg);
    }

    fn bprintf(&self, msg: &str) {
        trace!("broadcast: {}", msg);
    }
}

/// Resolves one player movement command. Must be a pure function of its
/// inputs; all collision goes through `world`.
pub trait PlayerMovement {
    fn resolve_player_movement(&self, pm: &mut PmoveData, world: &dyn MoveWorld);
}

/// The stock movement code.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPlayerMovement;

impl PlayerMovement for DefaultPlayerMovement {
    fn resolve_player_movement(&self, pm: &mut PmoveData, world: &dyn MoveWorld) {
        pmove(pm, world);
    }
}

/// Read-only file access for level entity strings.
pub trait FileSystem {
    fn load_file(&self, path: &str) -> std::io::Result<Vec<u8>>;
}
