// g_world.rs — spatial index and the trace engine built on it
//
// Copyright (C) 1997-2001 Id Software, Inc.
// Licensed under the GNU General Public License v2 or later.

use log::warn;

use sofsim_common::cmodel::{clip_box_to_box, lerp_point, sanitize_extents, CollisionModel, WORLD_EXTENT};
use sofsim_common::pmove::MoveWorld;

use crate::g_local::*;

/*
ENTITY AREA CHECKING

The world is split into a fixed binary tree of axis-aligned cells. An entity
lives in the deepest node its box does not straddle, so large or boundary
entities sit higher up the tree.
*/

const AREA_DEPTH: i32 = 4;
const AREA_NODES: usize = 32;

/// A node stops accepting entities past this count.
pub const MAX_NODE_ENTITIES: usize = 256;

/// Movement is clipped an epsilon away from surfaces, so queries look a
/// little further than the stored boxes.
const QUERY_PAD: f32 = 1.0;

#[derive(Debug, Clone)]
struct AreaNode {
    axis: i32, // -1 = leaf node
    dist: f32,
    children: [usize; 2],
    trigger_edicts: Vec<usize>,
    solid_edicts: Vec<usize>,
}

impl Default for AreaNode {
    fn default() -> Self {
        Self {
            axis: -1,
            dist: 0.0,
            children: [usize::MAX; 2],
            trigger_edicts: Vec::new(),
            solid_edicts: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SpatialIndex {
    nodes: Vec<AreaNode>,
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new(&[-WORLD_EXTENT; 3], &[WORLD_EXTENT; 3])
    }
}

impl SpatialIndex {
    pub fn new(world_mins: &Vec3, world_maxs: &Vec3) -> Self {
        let mut index = Self { nodes: Vec::with_capacity(AREA_NODES) };
        index.create_node(0, world_mins, world_maxs);
        index
    }

    /// Drop every entity and rebuild the tree for new world bounds.
    pub fn clear(&mut self, world_mins: &Vec3, world_maxs: &Vec3) {
        self.nodes.clear();
        self.create_node(0, world_mins, world_maxs);
    }

    fn create_node(&mut self, depth: i32, mins: &Vec3, maxs: &Vec3) -> usize {
        let idx = self.nodes.len();
        self.nodes.push(AreaNode::default());

        if depth == AREA_DEPTH {
            return idx;
        }

        let size = vector_subtract(maxs, mins);
        let axis = if size[0] > size[1] { 0 } else { 1 };
        let dist = 0.5 * (maxs[axis] + mins[axis]);

        let mut mins1 = *mins;
        let mut maxs2 = *maxs;
        mins1[axis] = dist;
        maxs2[axis] = dist;

        let child0 = self.create_node(depth + 1, &mins1, maxs);
        let child1 = self.create_node(depth + 1, mins, &maxs2);

        let node = &mut self.nodes[idx];
        node.axis = axis as i32;
        node.dist = dist;
        node.children = [child0, child1];
        idx
    }

    /// Insert an entity box. Returns the node it landed in, or None when
    /// that node is full.
    fn insert(&mut self, ent_idx: usize, absmin: &Vec3, absmax: &Vec3, solid: Solid) -> Option<usize> {
        let mut node_idx = 0;
        loop {
            let node = &self.nodes[node_idx];
            if node.axis == -1 {
                break;
            }
            let axis = node.axis as usize;
            if absmin[axis] - QUERY_PAD > node.dist {
                node_idx = node.children[0];
            } else if absmax[axis] + QUERY_PAD < node.dist {
                node_idx = node.children[1];
            } else {
                break; // crosses the node
            }
        }

        let node = &mut self.nodes[node_idx];
        let list = if solid == Solid::Trigger {
            &mut node.trigger_edicts
        } else {
            &mut node.solid_edicts
        };
        if list.len() >= MAX_NODE_ENTITIES {
            warn!("spatial index: node {} full, entity {} not indexed", node_idx, ent_idx);
            return None;
        }
        list.push(ent_idx);
        Some(node_idx)
    }

    fn remove(&mut self, node_idx: usize, ent_idx: usize) {
        if let Some(node) = self.nodes.get_mut(node_idx) {
            node.trigger_edicts.retain(|&e| e != ent_idx);
            node.solid_edicts.retain(|&e| e != ent_idx);
        }
    }

    /// Candidate entities whose node could overlap the box. The caller does
    /// the exact box test.
    fn candidates(&self, mins: &Vec3, maxs: &Vec3, areatype: i32, out: &mut Vec<usize>) {
        let mut stack = vec![0usize];
        while let Some(node_idx) = stack.pop() {
            let node = &self.nodes[node_idx];
            if areatype & AREA_SOLID != 0 {
                out.extend_from_slice(&node.solid_edicts);
            }
            if areatype & AREA_TRIGGERS != 0 {
                out.extend_from_slice(&node.trigger_edicts);
            }
            if node.axis == -1 {
                continue; // terminal node
            }
            let axis = node.axis as usize;
            if maxs[axis] > node.dist {
                stack.push(node.children[0]);
            }
            if mins[axis] < node.dist {
                stack.push(node.children[1]);
            }
        }
    }
}

// ============================================================
// Linking
// ============================================================

/// Remove an entity from the spatial index. Safe to call on unlinked entities.
pub fn unlink_entity(ctx: &mut GameCtx, ent_idx: usize) {
    if let Some(node) = ctx.edicts[ent_idx].area_node.take() {
        ctx.area.remove(node, ent_idx);
    }
}

/// Recompute the entity's absolute box and (re)insert it into the spatial
/// index. Must be called whenever origin or bounds change.
pub fn link_entity(ctx: &mut GameCtx, ent_idx: usize) {
    unlink_entity(ctx, ent_idx);

    let ent = &mut ctx.edicts[ent_idx];
    if !ent.inuse {
        return;
    }
    ent.set_abs_box();

    // if first time, make sure old_origin is valid
    if ent.linkcount == 0 {
        ent.s.old_origin = ent.s.origin;
    }
    ent.linkcount += 1;

    // the world is never indexed, it is checked through the brush model
    if ent_idx == 0 || ent.solid == Solid::Not {
        return;
    }

    let (absmin, absmax, solid) = (ent.absmin, ent.absmax, ent.solid);
    let node = ctx.area.insert(ent_idx, &absmin, &absmax, solid);
    ctx.edicts[ent_idx].area_node = node;
}

/// In-use entities whose box overlaps `mins..maxs`, in slot order.
pub fn area_edicts(ctx: &GameCtx, mins: &Vec3, maxs: &Vec3, areatype: i32) -> Vec<usize> {
    let qmins = [mins[0] - QUERY_PAD, mins[1] - QUERY_PAD, mins[2] - QUERY_PAD];
    let qmaxs = [maxs[0] + QUERY_PAD, maxs[1] + QUERY_PAD, maxs[2] + QUERY_PAD];

    let mut raw = Vec::new();
    ctx.area.candidates(&qmins, &qmaxs, areatype, &mut raw);

    let mut list: Vec<usize> = raw
        .into_iter()
        .filter(|&i| {
            let e = &ctx.edicts[i];
            e.inuse && boxes_overlap(&e.absmin, &e.absmax, &qmins, &qmaxs)
        })
        .collect();
    list.sort_unstable();
    list.dedup();

    if list.len() > MAX_EDICTS {
        warn!("area_edicts: query truncated at {} entities", MAX_EDICTS);
        list.truncate(MAX_EDICTS);
    }
    list
}

// ============================================================
// Tracing
// ============================================================

/// Contents an entity presents to traces.
pub fn entity_contents(ent: &Edict) -> i32 {
    if ent.solid == Solid::Bsp {
        CONTENTS_SOLID
    } else if ent.svflags & SVF_DEADMONSTER != 0 {
        CONTENTS_DEADMONSTER
    } else {
        CONTENTS_MONSTER
    }
}

/// Contents at a point, world plus solid entities.
pub fn point_contents(ctx: &GameCtx, p: &Vec3) -> i32 {
    let mut contents = ctx.world.point_contents(p);
    for i in area_edicts(ctx, p, p, AREA_SOLID) {
        let e = &ctx.edicts[i];
        if (0..3).all(|k| p[k] >= e.absmin[k] && p[k] <= e.absmax[k]) {
            contents |= entity_contents(e);
        }
    }
    contents
}

fn trace_bounds(start: &Vec3, mins: &Vec3, maxs: &Vec3, end: &Vec3) -> (Vec3, Vec3) {
    let mut boxmins = [0.0f32; 3];
    let mut boxmaxs = [0.0f32; 3];
    for i in 0..3 {
        if end[i] > start[i] {
            boxmins[i] = start[i] + mins[i];
            boxmaxs[i] = end[i] + maxs[i];
        } else {
            boxmins[i] = end[i] + mins[i];
            boxmaxs[i] = start[i] + maxs[i];
        }
    }
    (boxmins, boxmaxs)
}

/// Sweep the box `mins..maxs` from `start` to `end`.
///
/// Static world geometry is checked first; if that already blocks at
/// fraction 0 nothing else is examined. `passent` and anything it owns (and
/// its owner) are ignored, as are non-solid and trigger entities.
pub fn trace(
    ctx: &GameCtx,
    start: &Vec3,
    mins: &Vec3,
    maxs: &Vec3,
    end: &Vec3,
    passent: i32,
    contentmask: i32,
) -> Trace {
    let mut start = *start;
    let mut end = *end;
    if vector_sanitize(&mut start) | vector_sanitize(&mut end) {
        warn!("trace: non-finite endpoint clamped");
    }
    let (mins, maxs) = sanitize_extents(mins, maxs);

    // clip to world
    let mut best = ctx.world.box_trace(&start, &mins, &maxs, &end, contentmask);
    best.ent_index = if best.hit_something() { 0 } else { -1 };
    if best.fraction == 0.0 {
        return best; // blocked by the world
    }

    let (boxmins, boxmaxs) = trace_bounds(&start, &mins, &maxs, &end);
    let pass_owner = ctx.live_index(passent).map_or(-1, |p| ctx.edicts[p].owner);

    // clip to other solid entities
    for touch_idx in area_edicts(ctx, &boxmins, &boxmaxs, AREA_SOLID) {
        let touch = &ctx.edicts[touch_idx];

        if touch.solid == Solid::Not || touch.solid == Solid::Trigger {
            continue;
        }
        if touch_idx as i32 == passent {
            continue;
        }
        if passent >= 0 {
            if touch.owner == passent {
                continue; // don't clip against own missiles
            }
            if pass_owner == touch_idx as i32 {
                continue; // don't clip against owner
            }
        }
        let contents = entity_contents(touch);
        if contents & contentmask == 0 {
            continue;
        }
        if best.allsolid {
            break;
        }

        let mut t = Trace::default();
        if !clip_box_to_box(&start, &end, &mins, &maxs, &touch.absmin, &touch.absmax, &mut t) {
            continue;
        }
        if t.startsolid || t.fraction < best.fraction {
            let was_startsolid = best.startsolid;
            best = t;
            best.startsolid |= was_startsolid;
            best.contents = contents;
            best.surface = None;
            best.ent_index = touch_idx as i32;
        }
    }

    best.endpos = if best.fraction == 1.0 {
        end
    } else {
        lerp_point(&start, &end, best.fraction)
    };
    best
}

/// Line of sight test through opaque world geometry only.
pub fn trace_line_opaque(ctx: &GameCtx, start: &Vec3, end: &Vec3, passent: i32) -> Trace {
    trace(ctx, start, &VEC3_ORIGIN, &VEC3_ORIGIN, end, passent, MASK_OPAQUE)
}

/// Trace callbacks for player movement, bound to one player.
pub struct WorldTrace<'a> {
    pub ctx: &'a GameCtx,
    pub passent: i32,
    pub mask: i32,
}

impl MoveWorld for WorldTrace<'_> {
    fn trace(&self, start: &Vec3, mins: &Vec3, maxs: &Vec3, end: &Vec3) -> Trace {
        trace(self.ctx, start, mins, maxs, end, self.passent, self.mask)
    }

    fn point_contents(&self, point: &Vec3) -> i32 {
        point_contents(self.ctx, point)
    }
}
