// q_shared.rs — foundational types and functions shared by all modules

use serde::{Deserialize, Serialize};

// ============================================================
// Basic types
// ============================================================

pub type Vec3 = [f32; 3];

pub const VEC3_ORIGIN: Vec3 = [0.0, 0.0, 0.0];

// Angle indexes
pub const PITCH: usize = 0; // up / down
pub const YAW: usize = 1; // left / right
pub const ROLL: usize = 2; // fall over

pub const RAD_TO_DEG: f32 = 180.0 / std::f32::consts::PI;

// ============================================================
// Limits
// ============================================================

pub const MAX_QPATH: usize = 64;
pub const MAX_CLIENTS: usize = 32;
pub const MAX_EDICTS: usize = 1024;
pub const MAX_MODELS: usize = 256;
pub const MAX_SOUNDS: usize = 256;
pub const MAX_IMAGES: usize = 256;
pub const MAX_LIGHTSTYLES: usize = 256;
pub const MAX_CLIP_PLANES: usize = 5;

// ============================================================
// Simulation timing
// ============================================================
// The simulation advances in fixed 100ms quanta. Everything that
// integrates over time uses these, never a measured frame delta.

/// Tick length in milliseconds.
pub const SERVER_FRAMETIME_MS: i32 = 100;

/// Tick length in seconds.
pub const SERVER_FRAMETIME_SEC: f32 = 0.1;

/// Ticks per second.
pub const SERVER_FRAMERATE_HZ: i32 = 10;

// ============================================================
// Content flags
// ============================================================

pub const CONTENTS_SOLID: i32 = 1;
pub const CONTENTS_WINDOW: i32 = 2;
pub const CONTENTS_LAVA: i32 = 8;
pub const CONTENTS_SLIME: i32 = 16;
pub const CONTENTS_WATER: i32 = 32;
pub const CONTENTS_MIST: i32 = 64;

pub const CONTENTS_PLAYERCLIP: i32 = 0x10000;
pub const CONTENTS_MONSTERCLIP: i32 = 0x20000;

pub const CONTENTS_MONSTER: i32 = 0x2000000;
pub const CONTENTS_DEADMONSTER: i32 = 0x4000000;
pub const CONTENTS_LADDER: i32 = 0x20000000;

// ============================================================
// Surface flags
// ============================================================

pub const SURF_LIGHT: i32 = 0x1;
pub const SURF_SLICK: i32 = 0x2;
pub const SURF_SKY: i32 = 0x4;
pub const SURF_NODRAW: i32 = 0x80;
/// Metal-like surfaces ricochet bullets.
pub const SURF_METAL: i32 = 0x400;
/// Thin non-metal surfaces (wood, glass, plaster) can be shot through.
pub const SURF_THIN: i32 = 0x800;

// ============================================================
// Content masks
// ============================================================

pub const MASK_ALL: i32 = -1;
pub const MASK_SOLID: i32 = CONTENTS_SOLID | CONTENTS_WINDOW;
pub const MASK_PLAYERSOLID: i32 =
    CONTENTS_SOLID | CONTENTS_PLAYERCLIP | CONTENTS_WINDOW | CONTENTS_MONSTER;
pub const MASK_DEADSOLID: i32 = CONTENTS_SOLID | CONTENTS_PLAYERCLIP | CONTENTS_WINDOW;
pub const MASK_MONSTERSOLID: i32 =
    CONTENTS_SOLID | CONTENTS_MONSTERCLIP | CONTENTS_WINDOW | CONTENTS_MONSTER;
pub const MASK_WATER: i32 = CONTENTS_WATER | CONTENTS_LAVA | CONTENTS_SLIME;
pub const MASK_OPAQUE: i32 = CONTENTS_SOLID | CONTENTS_SLIME | CONTENTS_LAVA;
pub const MASK_SHOT: i32 =
    CONTENTS_SOLID | CONTENTS_MONSTER | CONTENTS_WINDOW | CONTENTS_DEADMONSTER;

pub const AREA_SOLID: i32 = 1;
pub const AREA_TRIGGERS: i32 = 2;

// ============================================================
// Plane / surface
// ============================================================

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CPlane {
    pub normal: Vec3,
    pub dist: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CSurface {
    pub name: String,
    pub flags: i32,
    pub value: i32,
}

// ============================================================
// Trace
// ============================================================

#[derive(Debug, Clone)]
pub struct Trace {
    pub allsolid: bool,
    pub startsolid: bool,
    pub fraction: f32,
    pub endpos: Vec3,
    pub plane: CPlane,
    pub surface: Option<CSurface>,
    pub contents: i32,
    /// Entity that blocked the move: 0 = world, -1 = nothing.
    pub ent_index: i32,
}

impl Default for Trace {
    fn default() -> Self {
        Self {
            allsolid: false,
            startsolid: false,
            fraction: 1.0,
            endpos: [0.0; 3],
            plane: CPlane::default(),
            surface: None,
            contents: 0,
            ent_index: -1,
        }
    }
}

impl Trace {
    /// An unobstructed trace ending at `end`.
    pub fn clear_to(end: &Vec3) -> Self {
        Self {
            endpos: *end,
            ..Self::default()
        }
    }

    pub fn hit_something(&self) -> bool {
        self.fraction < 1.0 || self.startsolid
    }

    pub fn surface_flags(&self) -> i32 {
        self.surface.as_ref().map_or(0, |s| s.flags)
    }
}

// ============================================================
// Player movement types
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(i32)]
pub enum PmType {
    #[default]
    Normal = 0,
    Spectator = 1,
    Dead = 2,
    Gib = 3,
    Freeze = 4,
}

pub const PMF_DUCKED: u8 = 1;
pub const PMF_JUMP_HELD: u8 = 2;
pub const PMF_ON_GROUND: u8 = 4;
pub const PMF_TIME_LAND: u8 = 16;
pub const PMF_PRONE: u8 = 128;

/// Player physics state handed to and returned from player movement.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PmoveState {
    pub pm_type: PmType,
    pub origin: Vec3,
    pub velocity: Vec3,
    pub pm_flags: u8,
    /// Milliseconds of landing/teleport lockout remaining.
    pub pm_time: u8,
    pub gravity: i16,
    pub delta_angles: Vec3,
}

// ============================================================
// Entity effects
// ============================================================

pub const EF_FLASHLIGHT: u32 = 0x00000001;
pub const EF_BURNING: u32 = 0x00000002;
pub const EF_MUZZLEFLASH: u32 = 0x00000004;

// ============================================================
// Button bits
// ============================================================

pub const BUTTON_ATTACK: u8 = 1;
pub const BUTTON_USE: u8 = 2;
pub const BUTTON_SPRINT: u8 = 4;
pub const BUTTON_LEAN_LEFT: u8 = 8;
pub const BUTTON_LEAN_RIGHT: u8 = 16;
pub const BUTTON_RELOAD: u8 = 32;
pub const BUTTON_ALTATTACK: u8 = 64;
pub const BUTTON_ANY: u8 = 128;

// impulses
pub const IMPULSE_PRONE: u8 = 20;
pub const IMPULSE_NEXT_WEAPON: u8 = 10;
pub const IMPULSE_FLASHLIGHT: u8 = 21;
pub const IMPULSE_NIGHTVISION: u8 = 22;
pub const IMPULSE_HOLSTER: u8 = 23;

// ============================================================
// Usercmd
// ============================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UserCmd {
    pub msec: u8,
    pub buttons: u8,
    pub angles: [i16; 3],
    pub forwardmove: i16,
    pub sidemove: i16,
    pub upmove: i16,
    pub impulse: u8,
}

pub fn angle2short(x: f32) -> i32 {
    ((x * 65536.0 / 360.0) as i32) & 65535
}

pub fn short2angle(x: i16) -> f32 {
    x as f32 * (360.0 / 65536.0)
}

// ============================================================
// Config strings
// ============================================================
// Indices are partitioned by convention, not by type.

pub const CS_NAME: usize = 0;
pub const CS_SKY: usize = 2;
pub const CS_STATUSBAR: usize = 5;
pub const CS_OBJECTIVE: usize = 6;
pub const CS_WEATHER: usize = 7;
pub const CS_VOTE: usize = 8;
pub const CS_MAXCLIENTS: usize = 30;
pub const CS_MODELS: usize = 32;
pub const CS_SOUNDS: usize = CS_MODELS + MAX_MODELS;
pub const CS_IMAGES: usize = CS_SOUNDS + MAX_SOUNDS;
pub const CS_LIGHTS: usize = CS_IMAGES + MAX_IMAGES;
pub const MAX_CONFIGSTRINGS: usize = CS_LIGHTS + MAX_LIGHTSTYLES;

// ============================================================
// MATHLIB: vector operations
// ============================================================

#[inline]
pub fn dot_product(a: &Vec3, b: &Vec3) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
pub fn vector_subtract(a: &Vec3, b: &Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
pub fn vector_add(a: &Vec3, b: &Vec3) -> Vec3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

/// veca + scale * vecb
#[inline]
pub fn vector_ma(veca: &Vec3, scale: f32, vecb: &Vec3) -> Vec3 {
    [
        veca[0] + scale * vecb[0],
        veca[1] + scale * vecb[1],
        veca[2] + scale * vecb[2],
    ]
}

#[inline]
pub fn vector_scale(v: &Vec3, scale: f32) -> Vec3 {
    [v[0] * scale, v[1] * scale, v[2] * scale]
}

pub fn vector_compare(v1: &Vec3, v2: &Vec3) -> bool {
    v1[0] == v2[0] && v1[1] == v2[1] && v1[2] == v2[2]
}

pub fn vector_length(v: &Vec3) -> f32 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

/// Normalize in place, returns original length.
pub fn vector_normalize(v: &mut Vec3) -> f32 {
    let length = vector_length(v);
    if length != 0.0 {
        let ilength = 1.0 / length;
        v[0] *= ilength;
        v[1] *= ilength;
        v[2] *= ilength;
    }
    length
}

/// Returns the normalized copy of `v` (zero stays zero).
pub fn vector_normalized(v: &Vec3) -> Vec3 {
    let mut out = *v;
    vector_normalize(&mut out);
    out
}

pub fn cross_product(v1: &Vec3, v2: &Vec3) -> Vec3 {
    [
        v1[1] * v2[2] - v1[2] * v2[1],
        v1[2] * v2[0] - v1[0] * v2[2],
        v1[0] * v2[1] - v1[1] * v2[0],
    ]
}

pub fn distance(a: &Vec3, b: &Vec3) -> f32 {
    vector_length(&vector_subtract(a, b))
}

/// Replaces NaN/infinite components with zero. Returns true if anything changed.
pub fn vector_sanitize(v: &mut Vec3) -> bool {
    let mut changed = false;
    for c in v.iter_mut() {
        if !c.is_finite() {
            *c = 0.0;
            changed = true;
        }
    }
    changed
}

pub fn add_point_to_bounds(v: &Vec3, mins: &mut Vec3, maxs: &mut Vec3) {
    for i in 0..3 {
        if v[i] < mins[i] {
            mins[i] = v[i];
        }
        if v[i] > maxs[i] {
            maxs[i] = v[i];
        }
    }
}

/// Axis-aligned box overlap, inclusive on the faces.
pub fn boxes_overlap(amins: &Vec3, amaxs: &Vec3, bmins: &Vec3, bmaxs: &Vec3) -> bool {
    !(amins[0] > bmaxs[0]
        || amins[1] > bmaxs[1]
        || amins[2] > bmaxs[2]
        || amaxs[0] < bmins[0]
        || amaxs[1] < bmins[1]
        || amaxs[2] < bmins[2])
}

// ============================================================
// Angle functions
// ============================================================

pub fn angle_vectors(
    angles: &Vec3,
    forward: Option<&mut Vec3>,
    right: Option<&mut Vec3>,
    up: Option<&mut Vec3>,
) {
    let angle_yaw = angles[YAW].to_radians();
    let sy = angle_yaw.sin();
    let cy = angle_yaw.cos();

    let angle_pitch = angles[PITCH].to_radians();
    let sp = angle_pitch.sin();
    let cp = angle_pitch.cos();

    let angle_roll = angles[ROLL].to_radians();
    let sr = angle_roll.sin();
    let cr = angle_roll.cos();

    if let Some(fwd) = forward {
        fwd[0] = cp * cy;
        fwd[1] = cp * sy;
        fwd[2] = -sp;
    }
    if let Some(r) = right {
        r[0] = -sr * sp * cy + -cr * -sy;
        r[1] = -sr * sp * sy + -cr * cy;
        r[2] = -sr * cp;
    }
    if let Some(u) = up {
        u[0] = cr * sp * cy + -sr * -sy;
        u[1] = cr * sp * sy + -sr * cy;
        u[2] = cr * cp;
    }
}

/// Convenience version of angle_vectors that returns (forward, right, up).
pub fn angle_vectors_tuple(angles: &Vec3) -> (Vec3, Vec3, Vec3) {
    let mut forward = [0.0f32; 3];
    let mut right = [0.0f32; 3];
    let mut up = [0.0f32; 3];
    angle_vectors(angles, Some(&mut forward), Some(&mut right), Some(&mut up));
    (forward, right, up)
}

/// Direction vector to yaw in degrees, [0, 360).
pub fn vectoyaw(vec: &Vec3) -> f32 {
    if vec[PITCH] == 0.0 {
        if vec[YAW] > 0.0 {
            90.0
        } else if vec[YAW] < 0.0 {
            270.0
        } else {
            0.0
        }
    } else {
        let mut yaw = vec[YAW].atan2(vec[PITCH]) * RAD_TO_DEG;
        if yaw < 0.0 {
            yaw += 360.0;
        }
        yaw
    }
}

/// Direction vector to Euler angles (pitch is negated, Quake convention).
pub fn vectoangles(value1: &Vec3) -> Vec3 {
    let (yaw, pitch);
    if value1[1] == 0.0 && value1[0] == 0.0 {
        yaw = 0.0;
        pitch = if value1[2] > 0.0 { 90.0 } else { 270.0 };
    } else {
        let mut y = value1[1].atan2(value1[0]) * RAD_TO_DEG;
        if y < 0.0 {
            y += 360.0;
        }
        yaw = y;
        let forward = (value1[0] * value1[0] + value1[1] * value1[1]).sqrt();
        let mut p = value1[2].atan2(forward) * RAD_TO_DEG;
        if p < 0.0 {
            p += 360.0;
        }
        pitch = p;
    }
    [-pitch, yaw, 0.0]
}

pub fn anglemod(a: f32) -> f32 {
    (360.0 / 65536.0) * (((a * (65536.0 / 360.0)) as i32) & 65535) as f32
}

/// Signed shortest difference `to - from`, in (-180, 180].
pub fn angle_delta(from: f32, to: f32) -> f32 {
    let mut d = (to - from) % 360.0;
    if d > 180.0 {
        d -= 360.0;
    }
    if d <= -180.0 {
        d += 360.0;
    }
    d
}

// ============================================================
// String helpers
// ============================================================

pub fn q_streq_nocase(s1: &str, s2: &str) -> bool {
    s1.eq_ignore_ascii_case(s2)
}

/// Parses "x y z" into a vector; missing or malformed components are zero.
pub fn parse_vec3(s: &str) -> Vec3 {
    let mut v = [0.0f32; 3];
    for (slot, tok) in v.iter_mut().zip(s.split_whitespace()) {
        *slot = tok.parse().unwrap_or(0.0);
    }
    v
}

pub fn vtos(v: &Vec3) -> String {
    format!("({} {} {})", v[0] as i32, v[1] as i32, v[2] as i32)
}
