// g_gore.rs — per-zone damage accumulation and dismemberment

use serde::{Deserialize, Serialize};

use crate::g_local::*;

pub const NUM_ZONES: usize = 26;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(usize)]
pub enum GoreZone {
    Head = 0,
    Face,
    Neck,
    ChestUpper,
    ChestLower,
    Stomach,
    Groin,
    LeftUpperArm,
    LeftLowerArm,
    LeftHand,
    RightUpperArm,
    RightLowerArm,
    RightHand,
    LeftUpperLeg,
    LeftLowerLeg,
    LeftFoot,
    RightUpperLeg,
    RightLowerLeg,
    RightFoot,
    BackUpper,
    BackLower,
    Butt,
    LeftShoulder,
    RightShoulder,
    LeftHip,
    RightHip,
}

pub const ALL_ZONES: [GoreZone; NUM_ZONES] = [
    GoreZone::Head,
    GoreZone::Face,
    GoreZone::Neck,
    GoreZone::ChestUpper,
    GoreZone::ChestLower,
    GoreZone::Stomach,
    GoreZone::Groin,
    GoreZone::LeftUpperArm,
    GoreZone::LeftLowerArm,
    GoreZone::LeftHand,
    GoreZone::RightUpperArm,
    GoreZone::RightLowerArm,
    GoreZone::RightHand,
    GoreZone::LeftUpperLeg,
    GoreZone::LeftLowerLeg,
    GoreZone::LeftFoot,
    GoreZone::RightUpperLeg,
    GoreZone::RightLowerLeg,
    GoreZone::RightFoot,
    GoreZone::BackUpper,
    GoreZone::BackLower,
    GoreZone::Butt,
    GoreZone::LeftShoulder,
    GoreZone::RightShoulder,
    GoreZone::LeftHip,
    GoreZone::RightHip,
];

/// Static per-zone tuning.
#[derive(Debug, Clone, Copy)]
pub struct ZoneInfo {
    pub name: &'static str,
    pub multiplier: f32,
    /// Cumulative damage that severs the zone, None if it can't be severed.
    pub sever_threshold: Option<i32>,
    /// Zones lost along with this one.
    pub distal: &'static [GoreZone],
}

use GoreZone::*;

static ZONE_TABLE: [ZoneInfo; NUM_ZONES] = [
    ZoneInfo { name: "head", multiplier: 3.0, sever_threshold: Some(100), distal: &[Face] },
    ZoneInfo { name: "face", multiplier: 3.0, sever_threshold: None, distal: &[] },
    ZoneInfo { name: "neck", multiplier: 2.0, sever_threshold: Some(100), distal: &[Head, Face] },
    ZoneInfo { name: "chest_upper", multiplier: 1.0, sever_threshold: None, distal: &[] },
    ZoneInfo { name: "chest_lower", multiplier: 1.0, sever_threshold: None, distal: &[] },
    ZoneInfo { name: "stomach", multiplier: 1.0, sever_threshold: None, distal: &[] },
    ZoneInfo { name: "groin", multiplier: 1.5, sever_threshold: None, distal: &[] },
    ZoneInfo { name: "left_upper_arm", multiplier: 0.75, sever_threshold: Some(80), distal: &[LeftLowerArm, LeftHand] },
    ZoneInfo { name: "left_lower_arm", multiplier: 0.6, sever_threshold: Some(60), distal: &[LeftHand] },
    ZoneInfo { name: "left_hand", multiplier: 0.5, sever_threshold: Some(40), distal: &[] },
    ZoneInfo { name: "right_upper_arm", multiplier: 0.75, sever_threshold: Some(80), distal: &[RightLowerArm, RightHand] },
    ZoneInfo { name: "right_lower_arm", multiplier: 0.6, sever_threshold: Some(60), distal: &[RightHand] },
    ZoneInfo { name: "right_hand", multiplier: 0.5, sever_threshold: Some(40), distal: &[] },
    ZoneInfo { name: "left_upper_leg", multiplier: 0.75, sever_threshold: Some(100), distal: &[LeftLowerLeg, LeftFoot] },
    ZoneInfo { name: "left_lower_leg", multiplier: 0.6, sever_threshold: Some(80), distal: &[LeftFoot] },
    ZoneInfo { name: "left_foot", multiplier: 0.5, sever_threshold: Some(50), distal: &[] },
    ZoneInfo { name: "right_upper_leg", multiplier: 0.75, sever_threshold: Some(100), distal: &[RightLowerLeg, RightFoot] },
    ZoneInfo { name: "right_lower_leg", multiplier: 0.6, sever_threshold: Some(80), distal: &[RightFoot] },
    ZoneInfo { name: "right_foot", multiplier: 0.5, sever_threshold: Some(50), distal: &[] },
    ZoneInfo { name: "back_upper", multiplier: 1.0, sever_threshold: None, distal: &[] },
    ZoneInfo { name: "back_lower", multiplier: 1.0, sever_threshold: None, distal: &[] },
    ZoneInfo { name: "butt", multiplier: 0.8, sever_threshold: None, distal: &[] },
    ZoneInfo { name: "left_shoulder", multiplier: 0.9, sever_threshold: None, distal: &[] },
    ZoneInfo { name: "right_shoulder", multiplier: 0.9, sever_threshold: None, distal: &[] },
    ZoneInfo { name: "left_hip", multiplier: 0.9, sever_threshold: None, distal: &[] },
    ZoneInfo { name: "right_hip", multiplier: 0.9, sever_threshold: None, distal: &[] },
];

impl GoreZone {
    pub fn info(self) -> &'static ZoneInfo {
        &ZONE_TABLE[self as usize]
    }

    pub fn multiplier(self) -> f32 {
        self.info().multiplier
    }
}

/// Damage and sever state for every zone of one humanoid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoreZones {
    pub damage: [i32; NUM_ZONES],
    pub severed: [bool; NUM_ZONES],
}

impl GoreZones {
    pub fn is_severed(&self, zone: GoreZone) -> bool {
        self.severed[zone as usize]
    }

    pub fn damage_of(&self, zone: GoreZone) -> i32 {
        self.damage[zone as usize]
    }

    /// Add damage to a zone. Returns every zone that became severed by this
    /// hit, the struck zone first. A zone already severed soaks up the hit.
    pub fn apply(&mut self, zone: GoreZone, damage: i32) -> Vec<GoreZone> {
        let z = zone as usize;
        self.damage[z] = self.damage[z].saturating_add(damage.max(0));

        if self.severed[z] {
            return Vec::new();
        }
        match zone.info().sever_threshold {
            Some(threshold) if self.damage[z] >= threshold => self.sever(zone),
            _ => Vec::new(),
        }
    }

    /// Sever a zone and everything distal to it.
    pub fn sever(&mut self, zone: GoreZone) -> Vec<GoreZone> {
        let mut out = Vec::new();
        if self.severed[zone as usize] {
            return out;
        }
        self.severed[zone as usize] = true;
        out.push(zone);
        for &d in zone.info().distal {
            if !self.severed[d as usize] {
                self.severed[d as usize] = true;
                out.push(d);
            }
        }
        out
    }

    pub fn severed_count(&self) -> usize {
        self.severed.iter().filter(|&&s| s).count()
    }
}

// ============================================================
// Hit zone mapping
// ============================================================

/// Pick the zone struck at `point` on a humanoid standing at `origin` with
/// the given yaw and bounds. `shot_dir` is the direction of travel.
pub fn map_hit_zone(
    origin: &Vec3,
    yaw: f32,
    mins: &Vec3,
    maxs: &Vec3,
    point: &Vec3,
    shot_dir: &Vec3,
) -> GoreZone {
    let height = (maxs[2] - mins[2]).max(1.0);
    let h = ((point[2] - (origin[2] + mins[2])) / height).clamp(0.0, 1.0);

    let forward = [yaw.to_radians().cos(), yaw.to_radians().sin(), 0.0];
    let offset = [point[0] - origin[0], point[1] - origin[1], 0.0];
    let side = cross_product(&forward, &offset)[2];
    let left = side > 0.0;

    let half_width = maxs[0].abs().max(maxs[1].abs()).max(1.0);
    let lateral = side.abs() / half_width;

    // shot travelling along our facing came from behind
    let from_behind = dot_product(shot_dir, &forward) > 0.0;

    let pick = |l: GoreZone, r: GoreZone| if left { l } else { r };

    if h < 0.08 {
        pick(LeftFoot, RightFoot)
    } else if h < 0.28 {
        pick(LeftLowerLeg, RightLowerLeg)
    } else if h < 0.45 {
        if lateral > 0.6 {
            pick(LeftHip, RightHip)
        } else {
            pick(LeftUpperLeg, RightUpperLeg)
        }
    } else if h < 0.52 {
        if lateral > 0.7 {
            pick(LeftHand, RightHand)
        } else if from_behind {
            Butt
        } else {
            Groin
        }
    } else if h < 0.62 {
        if lateral > 0.7 {
            pick(LeftLowerArm, RightLowerArm)
        } else if from_behind {
            BackLower
        } else {
            Stomach
        }
    } else if h < 0.72 {
        if lateral > 0.7 {
            pick(LeftLowerArm, RightLowerArm)
        } else if from_behind {
            BackLower
        } else {
            ChestLower
        }
    } else if h < 0.84 {
        if lateral > 0.7 {
            pick(LeftUpperArm, RightUpperArm)
        } else if lateral > 0.45 {
            pick(LeftShoulder, RightShoulder)
        } else if from_behind {
            BackUpper
        } else {
            ChestUpper
        }
    } else if h < 0.89 {
        Neck
    } else if from_behind {
        Head
    } else {
        Face
    }
}
