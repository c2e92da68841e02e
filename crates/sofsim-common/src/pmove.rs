// pmove.rs — player movement
//
// Pure function of (state, command, world): the same inputs always give the
// same result. All collision goes through MoveWorld.

use crate::q_shared::{
    angle_vectors, cross_product, dot_product, short2angle, vector_length, vector_normalize,
    vector_scale, CPlane, CSurface, PmType, PmoveState, UserCmd, Vec3, CONTENTS_SLIME,
    CONTENTS_WATER, MASK_WATER, MAX_CLIP_PLANES, PITCH, PMF_DUCKED, PMF_JUMP_HELD,
    PMF_ON_GROUND, PMF_PRONE, PMF_TIME_LAND, SURF_SLICK, VEC3_ORIGIN,
};
use crate::q_shared::Trace;

const STEPSIZE: f32 = 18.0;
const STOP_EPSILON: f32 = 0.1;
const MIN_STEP_NORMAL: f32 = 0.7;

// movement parameters
const PM_STOPSPEED: f32 = 100.0;
const PM_MAXSPEED: f32 = 300.0;
const PM_ACCELERATE: f32 = 10.0;
const PM_FRICTION: f32 = 6.0;
const PM_WATERFRICTION: f32 = 1.0;
const PM_WATERSPEED: f32 = 400.0;
pub const PM_JUMPSPEED: f32 = 270.0;

pub const MAXTOUCH: usize = 32;

// player hull heights per stance
pub const PLAYER_MINS: Vec3 = [-16.0, -16.0, -24.0];
pub const PLAYER_MAXS_STAND: f32 = 32.0;
pub const PLAYER_MAXS_CROUCH: f32 = 4.0;
pub const PLAYER_MAXS_PRONE: f32 = -8.0;

/// Everything one pmove call reads and writes.
#[derive(Debug, Clone, Default)]
pub struct PmoveData {
    // in / out
    pub s: PmoveState,

    // in
    pub cmd: UserCmd,
    /// Multiplier on the maximum ground speed (stance, sprint, status effects).
    pub speed_scale: f32,

    // out
    pub touchents: Vec<i32>,
    pub viewangles: Vec3,
    pub viewheight: f32,
    pub mins: Vec3,
    pub maxs: Vec3,
    pub groundentity: i32,
    pub watertype: i32,
    pub waterlevel: i32,
}

impl PmoveData {
    pub fn new(s: PmoveState, cmd: UserCmd) -> Self {
        Self {
            s,
            cmd,
            speed_scale: 1.0,
            groundentity: -1,
            ..Default::default()
        }
    }
}

/// Collision queries supplied by the caller.
pub trait MoveWorld {
    fn trace(&self, start: &Vec3, mins: &Vec3, maxs: &Vec3, end: &Vec3) -> Trace;
    fn point_contents(&self, point: &Vec3) -> i32;
}

#[derive(Clone, Default)]
struct PlayerBody {
    origin: Vec3,
    velocity: Vec3,

    forward: Vec3,
    right: Vec3,
    up: Vec3,
    frametime: f32,

    groundsurface: Option<CSurface>,
    groundplane: CPlane,
}

struct Mover<'a, C: MoveWorld + ?Sized> {
    pm: &'a mut PmoveData,
    body: PlayerBody,
    world: &'a C,
}

/// Slide off of the impacting surface.
pub fn pm_clip_velocity(inv: &Vec3, normal: &Vec3, overbounce: f32) -> Vec3 {
    let backoff = dot_product(inv, normal) * overbounce;
    let mut out = [0.0f32; 3];
    for i in 0..3 {
        out[i] = inv[i] - normal[i] * backoff;
        if out[i] > -STOP_EPSILON && out[i] < STOP_EPSILON {
            out[i] = 0.0;
        }
    }
    out
}

impl<'a, C: MoveWorld + ?Sized> Mover<'a, C> {
    fn add_touch(&mut self, ent_index: i32) {
        if ent_index >= 0 && self.pm.touchents.len() < MAXTOUCH && !self.pm.touchents.contains(&ent_index) {
            self.pm.touchents.push(ent_index);
        }
    }

    fn slide_move(&mut self) {
        let numbumps = 4;
        let original_velocity = self.body.velocity;
        let mut plane_count: usize = 0;
        let mut planes = [[0.0f32; 3]; MAX_CLIP_PLANES];
        let mut remaining = self.body.frametime;

        for _ in 0..numbumps {
            let end = [
                self.body.origin[0] + remaining * self.body.velocity[0],
                self.body.origin[1] + remaining * self.body.velocity[1],
                self.body.origin[2] + remaining * self.body.velocity[2],
            ];

            let trace = self.world.trace(&self.body.origin, &self.pm.mins, &self.pm.maxs, &end);

            if trace.allsolid {
                // trapped in another solid
                self.body.velocity[2] = 0.0;
                return;
            }

            if trace.fraction > 0.0 {
                self.body.origin = trace.endpos;
                plane_count = 0;
            }

            if trace.fraction == 1.0 {
                break;
            }

            self.add_touch(trace.ent_index);

            remaining -= remaining * trace.fraction;

            if plane_count >= MAX_CLIP_PLANES {
                self.body.velocity = VEC3_ORIGIN;
                break;
            }

            planes[plane_count] = trace.plane.normal;
            plane_count += 1;

            // make velocity parallel to all clip planes
            let mut found = false;
            for i in 0..plane_count {
                self.body.velocity = pm_clip_velocity(&self.body.velocity, &planes[i], 1.01);
                let ok = (0..plane_count)
                    .all(|j| j == i || dot_product(&self.body.velocity, &planes[j]) >= 0.0);
                if ok {
                    found = true;
                    break;
                }
            }

            if !found {
                // go along the crease
                if plane_count != 2 {
                    self.body.velocity = VEC3_ORIGIN;
                    break;
                }
                let dir = cross_product(&planes[0], &planes[1]);
                let d = dot_product(&dir, &self.body.velocity);
                self.body.velocity = vector_scale(&dir, d);
            }

            // velocity turned against the original, stop dead
            if dot_product(&self.body.velocity, &original_velocity) <= 0.0 {
                self.body.velocity = VEC3_ORIGIN;
                break;
            }
        }

        if self.pm.s.pm_time != 0 {
            self.body.velocity = original_velocity;
        }
    }

    fn step_move(&mut self) {
        let start_o = self.body.origin;
        let start_v = self.body.velocity;

        self.slide_move();

        let down_o = self.body.origin;
        let down_v = self.body.velocity;

        let mut up = start_o;
        up[2] += STEPSIZE;

        let trace = self.world.trace(&up, &self.pm.mins, &self.pm.maxs, &up);
        if trace.allsolid {
            return; // can't step up
        }

        // try sliding above
        self.body.origin = up;
        self.body.velocity = start_v;

        self.slide_move();

        // push down the final amount
        let mut down = self.body.origin;
        down[2] -= STEPSIZE;
        let trace = self.world.trace(&self.body.origin, &self.pm.mins, &self.pm.maxs, &down);
        if !trace.allsolid {
            self.body.origin = trace.endpos;
        }

        let up = self.body.origin;

        let down_dist = (down_o[0] - start_o[0]).powi(2) + (down_o[1] - start_o[1]).powi(2);
        let up_dist = (up[0] - start_o[0]).powi(2) + (up[1] - start_o[1]).powi(2);

        if down_dist > up_dist || trace.plane.normal[2] < MIN_STEP_NORMAL {
            self.body.origin = down_o;
            self.body.velocity = down_v;
            return;
        }
        // walking along a plane, keep the vertical speed of the plain move
        self.body.velocity[2] = down_v[2];
    }

    fn friction(&mut self) {
        let speed = vector_length(&self.body.velocity);
        if speed < 1.0 {
            self.body.velocity[0] = 0.0;
            self.body.velocity[1] = 0.0;
            return;
        }

        let mut drop = 0.0f32;

        let slick = self
            .body
            .groundsurface
            .as_ref()
            .is_some_and(|s| (s.flags & SURF_SLICK) != 0);
        if self.pm.groundentity >= 0 && !slick {
            let control = if speed < PM_STOPSPEED { PM_STOPSPEED } else { speed };
            drop += control * PM_FRICTION * self.body.frametime;
        }

        if self.pm.waterlevel != 0 {
            drop += speed * PM_WATERFRICTION * self.pm.waterlevel as f32 * self.body.frametime;
        }

        let newspeed = (speed - drop).max(0.0) / speed;
        self.body.velocity = vector_scale(&self.body.velocity, newspeed);
    }

    fn accelerate(&mut self, wish_dir: &Vec3, wish_speed: f32, accel: f32) {
        let currentspeed = dot_product(&self.body.velocity, wish_dir);
        let addspeed = wish_speed - currentspeed;
        if addspeed <= 0.0 {
            return;
        }
        let accelspeed = (accel * self.body.frametime * wish_speed).min(addspeed);
        for i in 0..3 {
            self.body.velocity[i] += accelspeed * wish_dir[i];
        }
    }

    fn max_speed(&self) -> f32 {
        PM_MAXSPEED * self.pm.speed_scale
    }

    fn water_move(&mut self) {
        let fwd = self.pm.cmd.forwardmove as f32;
        let side = self.pm.cmd.sidemove as f32;
        let mut wish_vel = [0.0f32; 3];
        for i in 0..3 {
            wish_vel[i] = self.body.forward[i] * fwd + self.body.right[i] * side;
        }
        if fwd == 0.0 && side == 0.0 && self.pm.cmd.upmove == 0 {
            wish_vel[2] -= 60.0; // drift towards bottom
        } else {
            wish_vel[2] += self.pm.cmd.upmove as f32;
        }

        let mut wish_dir = wish_vel;
        let mut wish_speed = vector_normalize(&mut wish_dir);
        let maxspeed = self.max_speed();
        if wish_speed > maxspeed {
            wish_speed = maxspeed;
        }
        wish_speed *= 0.5;

        self.accelerate(&wish_dir, wish_speed.min(PM_WATERSPEED), PM_ACCELERATE);
        self.step_move();
    }

    fn air_move(&mut self) {
        let fwd = self.pm.cmd.forwardmove as f32;
        let side = self.pm.cmd.sidemove as f32;

        let mut wish_vel: Vec3 = [0.0; 3];
        for i in 0..2 {
            wish_vel[i] = self.body.forward[i] * fwd + self.body.right[i] * side;
        }

        let mut wish_dir = wish_vel;
        let mut wish_speed = vector_normalize(&mut wish_dir);

        let maxspeed = self.max_speed();
        if wish_speed > maxspeed {
            wish_speed = maxspeed;
        }

        let gravity = self.pm.s.gravity as f32;

        if self.pm.groundentity >= 0 {
            // walking on ground
            self.body.velocity[2] = 0.0;
            self.accelerate(&wish_dir, wish_speed, PM_ACCELERATE);
            if gravity > 0.0 {
                self.body.velocity[2] = 0.0;
            } else {
                self.body.velocity[2] -= gravity * self.body.frametime;
            }
            if self.body.velocity[0] == 0.0 && self.body.velocity[1] == 0.0 {
                return;
            }
            self.step_move();
        } else {
            // not on ground, so little effect on velocity
            self.accelerate(&wish_dir, wish_speed, 1.0);
            self.body.velocity[2] -= gravity * self.body.frametime;
            self.step_move();
        }
    }

    fn categorize_position(&mut self) {
        let mut point = self.body.origin;
        point[2] -= 0.25;

        if self.body.velocity[2] > 180.0 {
            self.pm.s.pm_flags &= !PMF_ON_GROUND;
            self.pm.groundentity = -1;
        } else {
            let trace = self.world.trace(&self.body.origin, &self.pm.mins, &self.pm.maxs, &point);
            self.body.groundplane = trace.plane;
            self.body.groundsurface = trace.surface.clone();

            if trace.ent_index < 0 || (trace.plane.normal[2] < 0.7 && !trace.startsolid) {
                self.pm.groundentity = -1;
                self.pm.s.pm_flags &= !PMF_ON_GROUND;
            } else {
                self.pm.groundentity = trace.ent_index;
                if (self.pm.s.pm_flags & PMF_ON_GROUND) == 0 {
                    // just hit the ground
                    self.pm.s.pm_flags |= PMF_ON_GROUND;
                    if self.body.velocity[2] < -200.0 {
                        self.pm.s.pm_flags |= PMF_TIME_LAND;
                        self.pm.s.pm_time = if self.body.velocity[2] < -400.0 { 25 } else { 18 };
                    }
                }
            }
            self.add_touch(trace.ent_index);
        }

        // waterlevel, accounting for stance
        self.pm.waterlevel = 0;
        self.pm.watertype = 0;

        let sample2 = self.pm.viewheight - self.pm.mins[2];
        let sample1 = sample2 / 2.0;

        let mut point = [
            self.body.origin[0],
            self.body.origin[1],
            self.body.origin[2] + self.pm.mins[2] + 1.0,
        ];
        let cont = self.world.point_contents(&point);
        if (cont & MASK_WATER) != 0 {
            self.pm.watertype = cont;
            self.pm.waterlevel = 1;
            point[2] = self.body.origin[2] + self.pm.mins[2] + sample1;
            if (self.world.point_contents(&point) & MASK_WATER) != 0 {
                self.pm.waterlevel = 2;
                point[2] = self.body.origin[2] + self.pm.mins[2] + sample2;
                if (self.world.point_contents(&point) & MASK_WATER) != 0 {
                    self.pm.waterlevel = 3;
                }
            }
        }
    }

    fn check_jump(&mut self) {
        if (self.pm.s.pm_flags & PMF_TIME_LAND) != 0 {
            return;
        }
        if self.pm.cmd.upmove < 10 {
            self.pm.s.pm_flags &= !PMF_JUMP_HELD;
            return;
        }
        // must wait for jump to be released
        if (self.pm.s.pm_flags & PMF_JUMP_HELD) != 0 {
            return;
        }
        if self.pm.s.pm_type == PmType::Dead {
            return;
        }
        // no jumping out of prone
        if (self.pm.s.pm_flags & PMF_PRONE) != 0 {
            return;
        }

        if self.pm.waterlevel >= 2 {
            self.pm.groundentity = -1;
            if self.body.velocity[2] <= -300.0 {
                return;
            }
            self.body.velocity[2] = if self.pm.watertype == CONTENTS_WATER {
                100.0
            } else if self.pm.watertype == CONTENTS_SLIME {
                80.0
            } else {
                50.0
            };
            return;
        }

        if self.pm.groundentity < 0 {
            return;
        }

        self.pm.s.pm_flags |= PMF_JUMP_HELD;
        self.pm.groundentity = -1;
        self.body.velocity[2] = (self.body.velocity[2] + PM_JUMPSPEED).max(PM_JUMPSPEED);
    }

    fn check_duck(&mut self) {
        self.pm.mins = PLAYER_MINS;
        self.pm.maxs = [16.0, 16.0, PLAYER_MAXS_STAND];

        if self.pm.s.pm_type == PmType::Gib {
            self.pm.mins[2] = 0.0;
            self.pm.maxs[2] = 16.0;
            self.pm.viewheight = 8.0;
            return;
        }

        if self.pm.s.pm_type == PmType::Dead {
            self.pm.s.pm_flags |= PMF_DUCKED;
        } else if self.pm.cmd.upmove < 0 && (self.pm.s.pm_flags & PMF_ON_GROUND) != 0 {
            self.pm.s.pm_flags |= PMF_DUCKED;
        } else if (self.pm.s.pm_flags & (PMF_DUCKED | PMF_PRONE)) == PMF_DUCKED {
            // try to stand up
            let trace = self.world.trace(&self.body.origin, &self.pm.mins, &self.pm.maxs, &self.body.origin);
            if !trace.allsolid {
                self.pm.s.pm_flags &= !PMF_DUCKED;
            }
        }

        if (self.pm.s.pm_flags & PMF_PRONE) != 0 {
            self.pm.maxs[2] = PLAYER_MAXS_PRONE;
            self.pm.viewheight = -14.0;
        } else if (self.pm.s.pm_flags & PMF_DUCKED) != 0 {
            self.pm.maxs[2] = PLAYER_MAXS_CROUCH;
            self.pm.viewheight = -2.0;
        } else {
            self.pm.viewheight = 22.0;
        }
    }

    fn dead_move(&mut self) {
        if self.pm.groundentity < 0 {
            return;
        }
        // extra friction
        let forward = vector_length(&self.body.velocity) - 20.0;
        if forward <= 0.0 {
            self.body.velocity = VEC3_ORIGIN;
        } else {
            vector_normalize(&mut self.body.velocity);
            self.body.velocity = vector_scale(&self.body.velocity, forward);
        }
    }

    fn clamp_angles(&mut self) {
        for i in 0..3 {
            self.pm.viewangles[i] = short2angle(self.pm.cmd.angles[i]) + self.pm.s.delta_angles[i];
        }
        // no looking up or down more than 89 degrees
        let pitch = self.pm.viewangles[PITCH].rem_euclid(360.0);
        if pitch > 89.0 && pitch < 180.0 {
            self.pm.viewangles[PITCH] = 89.0;
        } else if (180.0..271.0).contains(&pitch) {
            self.pm.viewangles[PITCH] = 271.0;
        }
        angle_vectors(
            &self.pm.viewangles,
            Some(&mut self.body.forward),
            Some(&mut self.body.right),
            Some(&mut self.body.up),
        );
    }

    fn fly_move(&mut self) {
        let speed = vector_length(&self.body.velocity);
        if speed < 1.0 {
            self.body.velocity = VEC3_ORIGIN;
        } else {
            let drop = speed.max(PM_STOPSPEED) * PM_FRICTION * 1.5 * self.body.frametime;
            let newspeed = (speed - drop).max(0.0) / speed;
            self.body.velocity = vector_scale(&self.body.velocity, newspeed);
        }

        let fwd = self.pm.cmd.forwardmove as f32;
        let side = self.pm.cmd.sidemove as f32;
        let mut wish_vel = [0.0f32; 3];
        for i in 0..3 {
            wish_vel[i] = self.body.forward[i] * fwd + self.body.right[i] * side;
        }
        wish_vel[2] += self.pm.cmd.upmove as f32;

        let mut wish_dir = wish_vel;
        let wish_speed = vector_normalize(&mut wish_dir).min(PM_MAXSPEED);
        self.accelerate(&wish_dir, wish_speed, PM_ACCELERATE);

        for i in 0..3 {
            self.body.origin[i] += self.body.frametime * self.body.velocity[i];
        }
    }

    fn execute(&mut self) {
        self.pm.touchents.clear();
        self.pm.viewangles = [0.0; 3];
        self.pm.viewheight = 0.0;
        self.pm.groundentity = -1;
        self.pm.watertype = 0;
        self.pm.waterlevel = 0;
        if self.pm.speed_scale <= 0.0 || !self.pm.speed_scale.is_finite() {
            self.pm.speed_scale = 1.0;
        }

        self.body = PlayerBody {
            origin: self.pm.s.origin,
            velocity: self.pm.s.velocity,
            frametime: self.pm.cmd.msec as f32 * 0.001,
            ..Default::default()
        };

        self.clamp_angles();

        if self.pm.s.pm_type == PmType::Spectator {
            self.fly_move();
            self.finish();
            return;
        }

        if self.pm.s.pm_type as i32 >= PmType::Dead as i32 {
            self.pm.cmd.forwardmove = 0;
            self.pm.cmd.sidemove = 0;
            self.pm.cmd.upmove = 0;
        }

        if self.pm.s.pm_type == PmType::Freeze {
            return;
        }

        self.check_duck();
        self.categorize_position();

        if self.pm.s.pm_type == PmType::Dead {
            self.dead_move();
        }

        // drop timing counter
        if self.pm.s.pm_time != 0 {
            let msec = ((self.pm.cmd.msec >> 3) as i32).max(1);
            if msec >= self.pm.s.pm_time as i32 {
                self.pm.s.pm_flags &= !PMF_TIME_LAND;
                self.pm.s.pm_time = 0;
            } else {
                self.pm.s.pm_time -= msec as u8;
            }
        }

        self.check_jump();
        self.friction();

        if self.pm.waterlevel >= 2 {
            self.water_move();
        } else {
            let mut angles = self.pm.viewangles;
            if angles[PITCH] > 180.0 {
                angles[PITCH] -= 360.0;
            }
            angles[PITCH] /= 3.0;
            angle_vectors(
                &angles,
                Some(&mut self.body.forward),
                Some(&mut self.body.right),
                Some(&mut self.body.up),
            );
            self.air_move();
        }

        self.categorize_position();
        self.finish();
    }

    fn finish(&mut self) {
        self.pm.s.origin = self.body.origin;
        self.pm.s.velocity = self.body.velocity;
    }
}

/// Run one player movement step.
pub fn pmove<C: MoveWorld + ?Sized>(pm: &mut PmoveData, world: &C) {
    let mut mover = Mover {
        pm,
        body: PlayerBody::default(),
        world,
    };
    mover.execute();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::q_shared::CONTENTS_SOLID;

    /// Open air, no collisions.
    struct OpenAir;

    impl MoveWorld for OpenAir {
        fn trace(&self, _start: &Vec3, _mins: &Vec3, _maxs: &Vec3, end: &Vec3) -> Trace {
            Trace::clear_to(end)
        }

        fn point_contents(&self, _point: &Vec3) -> i32 {
            0
        }
    }

    /// Solid floor at z=0.
    struct FlatFloor;

    impl MoveWorld for FlatFloor {
        fn trace(&self, start: &Vec3, mins: &Vec3, _maxs: &Vec3, end: &Vec3) -> Trace {
            let effective_floor = -mins[2];
            if end[2] < effective_floor {
                let frac = if (start[2] - end[2]).abs() > f32::EPSILON {
                    ((start[2] - effective_floor) / (start[2] - end[2])).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                Trace {
                    fraction: frac,
                    endpos: [
                        start[0] + frac * (end[0] - start[0]),
                        start[1] + frac * (end[1] - start[1]),
                        effective_floor,
                    ],
                    plane: CPlane {
                        normal: [0.0, 0.0, 1.0],
                        dist: 0.0,
                    },
                    surface: Some(CSurface::default()),
                    contents: CONTENTS_SOLID,
                    ent_index: 0,
                    ..Default::default()
                }
            } else {
                Trace::clear_to(end)
            }
        }

        fn point_contents(&self, point: &Vec3) -> i32 {
            if point[2] < 0.0 {
                CONTENTS_SOLID
            } else {
                0
            }
        }
    }

    fn standing_state(z: f32) -> PmoveState {
        PmoveState {
            origin: [0.0, 0.0, z],
            gravity: 800,
            ..Default::default()
        }
    }

    #[test]
    fn test_clip_velocity_floor_slide() {
        let out = pm_clip_velocity(&[10.0, 0.0, -10.0], &[0.0, 0.0, 1.0], 1.0);
        assert_eq!(out, [10.0, 0.0, 0.0]);
    }

    #[test]
    fn test_clip_velocity_overbounce() {
        let out = pm_clip_velocity(&[0.0, 0.0, -100.0], &[0.0, 0.0, 1.0], 1.01);
        assert!((out[2] - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_clip_velocity_stop_epsilon_clamping() {
        let out = pm_clip_velocity(&[0.05, 0.0, 0.0], &[0.0, 0.0, 1.0], 1.0);
        assert_eq!(out[0], 0.0);
    }

    #[test]
    fn test_pmove_gravity_in_air() {
        let cmd = UserCmd { msec: 100, ..Default::default() };
        let mut pm = PmoveData::new(standing_state(500.0), cmd);
        pmove(&mut pm, &OpenAir);
        assert!((pm.s.velocity[2] + 80.0).abs() < 0.5);
        assert!(pm.s.origin[2] < 500.0);
        assert_eq!(pm.groundentity, -1);
    }

    #[test]
    fn test_pmove_on_ground_walks_forward() {
        let cmd = UserCmd { msec: 100, forwardmove: 300, ..Default::default() };
        let mut state = standing_state(24.0);
        state.pm_flags = PMF_ON_GROUND;
        let mut pm = PmoveData::new(state, cmd);
        pmove(&mut pm, &FlatFloor);
        assert_eq!(pm.groundentity, 0);
        assert!(pm.s.velocity[0] > 0.0);
        assert!(pm.s.origin[0] > 0.0);
        assert!((pm.s.origin[2] - 24.0).abs() < 0.5);
    }

    #[test]
    fn test_speed_scale_limits_wishspeed() {
        let cmd = UserCmd { msec: 100, forwardmove: 400, ..Default::default() };
        let mut state = standing_state(24.0);
        state.pm_flags = PMF_ON_GROUND;
        state.velocity = [300.0, 0.0, 0.0];

        let mut full = PmoveData::new(state, cmd);
        pmove(&mut full, &FlatFloor);

        let mut slow = PmoveData::new(state, cmd);
        slow.speed_scale = 0.25;
        pmove(&mut slow, &FlatFloor);

        assert!(slow.s.velocity[0] < full.s.velocity[0]);
    }

    #[test]
    fn test_jump_from_ground() {
        let cmd = UserCmd { msec: 100, upmove: 200, ..Default::default() };
        let mut state = standing_state(24.0);
        state.pm_flags = PMF_ON_GROUND;
        let mut pm = PmoveData::new(state, cmd);
        pmove(&mut pm, &FlatFloor);
        assert!(pm.s.velocity[2] > 150.0);
        assert!(pm.s.pm_flags & PMF_JUMP_HELD != 0);
    }

    #[test]
    fn test_prone_hull_is_low() {
        let cmd = UserCmd { msec: 100, ..Default::default() };
        let mut state = standing_state(24.0);
        state.pm_flags = PMF_ON_GROUND | PMF_PRONE;
        let mut pm = PmoveData::new(state, cmd);
        pmove(&mut pm, &FlatFloor);
        assert_eq!(pm.maxs[2], PLAYER_MAXS_PRONE);
    }

    #[test]
    fn test_freeze_no_movement() {
        let cmd = UserCmd { msec: 100, forwardmove: 300, ..Default::default() };
        let mut state = standing_state(500.0);
        state.pm_type = PmType::Freeze;
        let mut pm = PmoveData::new(state, cmd);
        pmove(&mut pm, &OpenAir);
        assert_eq!(pm.s.origin, [0.0, 0.0, 500.0]);
    }

    #[test]
    fn test_pmove_is_deterministic() {
        let cmd = UserCmd { msec: 100, forwardmove: 200, sidemove: -50, ..Default::default() };
        let mut state = standing_state(24.0);
        state.pm_flags = PMF_ON_GROUND;
        let mut a = PmoveData::new(state, cmd);
        let mut b = PmoveData::new(state, cmd);
        pmove(&mut a, &FlatFloor);
        pmove(&mut b, &FlatFloor);
        assert_eq!(a.s, b.s);
    }
}
