// cmodel.rs — static collision geometry and swept box clipping

use log::warn;
use serde::{Deserialize, Serialize};

use crate::q_shared::{
    vector_sanitize, CPlane, CSurface, Trace, Vec3, CONTENTS_SOLID,
};

/// Clip planes are pulled back by this much so a mover never ends exactly
/// on a surface.
pub const DIST_EPSILON: f32 = 0.03125;

/// Half size of the playable world on every axis.
pub const WORLD_EXTENT: f32 = 4096.0;

/// Static geometry queries used by the trace engine.
pub trait CollisionModel: Send + Sync {
    /// Sweep a box through the static world.
    fn box_trace(&self, start: &Vec3, mins: &Vec3, maxs: &Vec3, end: &Vec3, brushmask: i32) -> Trace;

    /// Contents bits at a point.
    fn point_contents(&self, p: &Vec3) -> i32;

    /// World bounds, used to size the spatial index.
    fn bounds(&self) -> (Vec3, Vec3) {
        ([-WORLD_EXTENT; 3], [WORLD_EXTENT; 3])
    }
}

/// An axis-aligned solid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Brush {
    pub mins: Vec3,
    pub maxs: Vec3,
    pub contents: i32,
    pub surface_name: String,
    pub surface_flags: i32,
}

impl Brush {
    pub fn solid(mins: Vec3, maxs: Vec3) -> Self {
        Self {
            mins,
            maxs,
            contents: CONTENTS_SOLID,
            surface_name: String::new(),
            surface_flags: 0,
        }
    }

    pub fn with_surface(mut self, name: &str, flags: i32) -> Self {
        self.surface_name = name.to_string();
        self.surface_flags = flags;
        self
    }

    fn surface(&self) -> CSurface {
        CSurface {
            name: self.surface_name.clone(),
            flags: self.surface_flags,
            value: 0,
        }
    }
}

/// World geometry built from axis-aligned brushes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrushWorld {
    pub brushes: Vec<Brush>,
}

impl BrushWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_brush(&mut self, brush: Brush) -> usize {
        self.brushes.push(brush);
        self.brushes.len() - 1
    }

    pub fn clear(&mut self) {
        self.brushes.clear();
    }
}

impl CollisionModel for BrushWorld {
    fn box_trace(&self, start: &Vec3, mins: &Vec3, maxs: &Vec3, end: &Vec3, brushmask: i32) -> Trace {
        let mut start = *start;
        let mut end = *end;
        if vector_sanitize(&mut start) | vector_sanitize(&mut end) {
            warn!("box_trace: non-finite endpoint clamped");
        }
        let (mins, maxs) = sanitize_extents(mins, maxs);

        let mut trace = Trace::default();
        for brush in &self.brushes {
            if brush.contents & brushmask == 0 {
                continue;
            }
            if clip_box_to_box(&start, &end, &mins, &maxs, &brush.mins, &brush.maxs, &mut trace) {
                trace.contents = brush.contents;
                trace.surface = Some(brush.surface());
            }
            if trace.allsolid {
                break;
            }
        }

        trace.endpos = if trace.fraction == 1.0 {
            end
        } else {
            lerp_point(&start, &end, trace.fraction)
        };
        trace
    }

    fn point_contents(&self, p: &Vec3) -> i32 {
        self.brushes
            .iter()
            .filter(|b| (0..3).all(|i| p[i] >= b.mins[i] && p[i] <= b.maxs[i]))
            .fold(0, |acc, b| acc | b.contents)
    }
}

/// Replaces invalid box extents (non-finite, or min above max) with a point.
pub fn sanitize_extents(mins: &Vec3, maxs: &Vec3) -> (Vec3, Vec3) {
    let bad = (0..3).any(|i| !mins[i].is_finite() || !maxs[i].is_finite() || mins[i] > maxs[i]);
    if bad {
        warn!("invalid box extents {:?} {:?}, treating as a point", mins, maxs);
        ([0.0; 3], [0.0; 3])
    } else {
        (*mins, *maxs)
    }
}

pub fn lerp_point(start: &Vec3, end: &Vec3, frac: f32) -> Vec3 {
    [
        start[0] + frac * (end[0] - start[0]),
        start[1] + frac * (end[1] - start[1]),
        start[2] + frac * (end[2] - start[2]),
    ]
}

/// Sweep the box `mins..maxs` from `p1` to `p2` against the solid box
/// `bmins..bmaxs`. Updates `trace` and returns true if this box became the
/// nearest blocker (or the move starts inside it).
///
/// A box that merely touches a face is outside; moving along the face is
/// free, moving into it stops at fraction 0.
pub fn clip_box_to_box(
    p1: &Vec3,
    p2: &Vec3,
    mins: &Vec3,
    maxs: &Vec3,
    bmins: &Vec3,
    bmaxs: &Vec3,
    trace: &mut Trace,
) -> bool {
    let mut enterfrac: f32 = -1.0;
    let mut leavefrac: f32 = 1.0;
    let mut clipplane = CPlane::default();

    let mut getout = false;
    let mut startout = false;

    for axis in 0..3 {
        for side in 0..2 {
            // side 0: +axis face of the expanded box, side 1: -axis face
            let (sign, dist) = if side == 0 {
                (1.0f32, bmaxs[axis] - mins[axis])
            } else {
                (-1.0f32, -(bmins[axis] - maxs[axis]))
            };

            let d1 = sign * p1[axis] - dist;
            let d2 = sign * p2[axis] - dist;

            if d2 > 0.0 {
                getout = true;
            }
            if d1 >= 0.0 {
                startout = true;
            }

            if d1 >= 0.0 && d2 >= d1 {
                return false;
            }
            if d1 < 0.0 && d2 <= 0.0 {
                continue;
            }

            if d1 > d2 {
                let f = (d1 - DIST_EPSILON) / (d1 - d2);
                if f > enterfrac {
                    enterfrac = f;
                    let mut normal = [0.0f32; 3];
                    normal[axis] = sign;
                    clipplane = CPlane {
                        normal,
                        dist: sign * if side == 0 { bmaxs[axis] } else { bmins[axis] },
                    };
                }
            } else {
                let f = (d1 + DIST_EPSILON) / (d1 - d2);
                if f < leavefrac {
                    leavefrac = f;
                }
            }
        }
    }

    if !startout {
        // original point was inside the box
        trace.startsolid = true;
        if !getout {
            trace.allsolid = true;
        }
        trace.fraction = 0.0;
        return true;
    }

    if enterfrac < leavefrac && enterfrac > -1.0 && enterfrac < trace.fraction {
        trace.fraction = enterfrac.max(0.0);
        trace.plane = clipplane;
        return true;
    }
    false
}
