// g_local.rs — local definitions for the simulation core

use std::collections::{HashMap, VecDeque};

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

pub use sofsim_common::q_shared::*;
pub use crate::game::{EntityHandle, Solid, SVF_DEADMONSTER, SVF_MONSTER, SVF_NOCLIENT, SVF_PROJECTILE};

use sofsim_common::cmodel::BrushWorld;
use sofsim_common::cvar::CvarContext;

use crate::dispatch::{
    BlockedKind, DieKind, PainKind, PrethinkKind, ThinkKind, TouchKind, UseKind,
};
use crate::g_configstrings::ConfigStrings;
use crate::g_gore::GoreZones;
use crate::g_items::ItemKind;
use crate::g_weapon::{WeaponKind, AMMO_KINDS, WEAPON_KINDS};
use crate::g_world::SpatialIndex;
use crate::game_import::{DefaultPlayerMovement, GameImport, PlayerMovement, StubGameImport};
use crate::m_soldier::MonsterClass;

pub const GAMEVERSION: &str = "sofsim";

/// Seconds per tick.
pub const FRAMETIME: f32 = SERVER_FRAMETIME_SEC;

// edict->spawnflags
pub const SPAWNFLAG_NOT_EASY: i32 = 0x00000100;
pub const SPAWNFLAG_NOT_MEDIUM: i32 = 0x00000200;
pub const SPAWNFLAG_NOT_HARD: i32 = 0x00000400;
pub const SPAWNFLAG_NOT_DEATHMATCH: i32 = 0x00000800;

// edict->flags
bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct EntityFlags: i32 {
        const FLY            = 0x00000001;
        const SWIM           = 0x00000002;
        const GODMODE        = 0x00000010;
        const NOTARGET       = 0x00000020;
        const PARTIALGROUND  = 0x00000100;
        const NO_KNOCKBACK   = 0x00000800;
        const RESPAWN        = 0x00001000;
    }
}

pub const MELEE_DISTANCE: f32 = 80.0;

// ============================================================
// Enums
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(i32)]
pub enum Damage {
    #[default]
    No = 0,
    Yes, // will take damage if hit
    Aim, // auto targeting recognizes this
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(i32)]
pub enum DeadFlag {
    #[default]
    No = 0,
    Dying,
    Dead,
    Respawnable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(i32)]
pub enum MoveType {
    #[default]
    None = 0, // never moves
    Noclip,   // origin and angles change with no interaction
    Push,     // no clip to world, push on box contact
    Stop,     // no clip to world, stops on box contact
    Walk,     // player movement
    Step,     // gravity, special edge handling
    Fly,
    Toss,     // gravity
    FlyMissile,
    Bounce,
}

/// Monster behaviour state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(i32)]
pub enum AiState {
    #[default]
    Idle = 0,
    Alert,
    Chase,
    Attack,
    Pain,
    Dead,
}

impl AiState {
    /// Whether `self -> to` is an edge of the state machine.
    pub fn can_transition(self, to: AiState) -> bool {
        use AiState::*;
        match (self, to) {
            (Dead, _) => false,
            (_, Dead) | (_, Pain) => true,
            (Idle, Alert) => true,
            (Alert, Chase) | (Alert, Idle) => true,
            (Chase, Attack) | (Chase, Idle) => true,
            (Attack, Chase) | (Attack, Idle) => true,
            (Pain, Chase) | (Pain, Idle) => true,
            _ => false,
        }
    }
}

// Monster AI flags
bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct AiFlags: i32 {
        const STAND_GROUND      = 0x00000001;
        const LOST_SIGHT        = 0x00000008;
        const PURSUIT_LAST_SEEN = 0x00000010;
        const FLEEING           = 0x00000020;
        const SURRENDERED       = 0x00000040;
        const IN_COVER          = 0x00000080;
        const SUPPRESSING       = 0x00000100;
    }
}

/// Toughness band derived from max health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum Toughness {
    #[default]
    Low,
    Medium,
    High,
    Elite,
}

impl Toughness {
    pub fn from_max_health(max_health: i32) -> Self {
        if max_health >= 300 {
            Toughness::Elite
        } else if max_health >= 150 {
            Toughness::High
        } else if max_health >= 100 {
            Toughness::Medium
        } else {
            Toughness::Low
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SquadOrder {
    #[default]
    None,
    Advance,
    Hold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MoverState {
    #[default]
    Bottom,
    Up,
    Top,
    Down,
}

/// What a mover does when it reaches its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoverEnd {
    DoorHitTop,
    DoorHitBottom,
    PlatHitTop,
    PlatHitBottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Stance {
    #[default]
    Stand,
    Crouch,
    Prone,
}

impl Stance {
    pub fn speed_scale(self) -> f32 {
        match self {
            Stance::Stand => 1.0,
            Stance::Crouch => 0.5,
            Stance::Prone => 0.25,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WeatherKind {
    #[default]
    None,
    Rain,
    Snow,
    Fog,
}

impl WeatherKind {
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "rain" => WeatherKind::Rain,
            "snow" => WeatherKind::Snow,
            "fog" => WeatherKind::Fog,
            _ => WeatherKind::None,
        }
    }
}

/// How something died, for obituaries and scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MeansOfDeath {
    #[default]
    Unknown,
    Weapon(WeaponKind),
    Splash(WeaponKind),
    HeldGrenade,
    Explosive,
    Falling,
    Crush,
    TriggerHurt,
    Burning,
    Bleeding,
    Poison,
    Melee,
}

// Damage flags
bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct DamageFlags: i32 {
        const RADIUS         = 0x00000001;
        const NO_ARMOR       = 0x00000002; // armor does not protect from this damage
        const NO_KNOCKBACK   = 0x00000008;
        const BULLET         = 0x00000010;
        const NO_PROTECTION  = 0x00000020; // godmode and spawn protection do not help
        const ARMOR_PIERCING = 0x00000040;
    }
}

// ============================================================
// Structs
// ============================================================

/// The part of an entity renderers see.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    pub number: i32,
    pub origin: Vec3,
    pub angles: Vec3,
    pub old_origin: Vec3,
    pub modelindex: i32,
    pub frame: i32,
    pub effects: u32,
    pub renderfx: i32,
    pub sound: i32,
}

/// Door and platform travel state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MoveInfo {
    pub start_origin: Vec3,
    pub end_origin: Vec3,
    pub speed: f32,
    pub wait: f32,
    pub state: MoverState,
    pub dest: Vec3,
    pub endfunc: Option<MoverEnd>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonsterInfo {
    pub ai_state: AiState,
    pub aiflags: AiFlags,
    pub class: MonsterClass,
    pub tier: Toughness,

    // per-class data, copied from the class table at spawn
    pub damage: i32,
    pub run_speed: f32,
    pub sight_range: f32,
    pub attack_range: f32,
    pub melee_range: f32,
    pub accuracy: f32,
    pub flee_health: f32,

    pub pausetime: f32,
    pub attack_finished: f32,
    pub melee_finished: f32,
    pub grenade_time: f32,
    pub cover_check_time: f32,
    pub suppress_time: f32,
    pub suppress_until: f32,
    pub dodge_time: f32,
    pub callout_time: f32,
    pub order_time: f32,

    pub last_sighting: Vec3,
    pub cover_goal: Option<Vec3>,
    /// -1 or +1, chosen from the slot index.
    pub flank_side: f32,
    pub squad_order: SquadOrder,
    /// Nearby squadmates seen dying.
    pub allies_lost: i32,
}

/// Timers for damage-over-time and impairments. Absolute level times.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusEffects {
    pub burning_until: f32,
    pub burn_next: f32,
    pub bleeding_until: f32,
    pub bleed_next: f32,
    pub poisoned_until: f32,
    pub poison_next: f32,
    pub concussed_until: f32,
    pub flashed_until: f32,
    pub shielded_until: f32,
    /// Who applied the damage-over-time, for kill credit.
    pub inflictor: i32,
}

/// Saved across level changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientPersistant {
    pub netname: String,
    pub connected: bool,
    pub health: i32,
    pub max_health: i32,
    pub armor: i32,
    pub weapon: WeaponKind,
    pub last_weapon: WeaponKind,
    pub has_weapon: [bool; WEAPON_KINDS],
    pub ammo: [i32; AMMO_KINDS],
    /// Rounds loaded in each weapon.
    pub mag: [i32; WEAPON_KINDS],
}

impl Default for ClientPersistant {
    fn default() -> Self {
        Self {
            netname: String::new(),
            connected: false,
            health: 100,
            max_health: 100,
            armor: 0,
            weapon: WeaponKind::None,
            last_weapon: WeaponKind::None,
            has_weapon: [false; WEAPON_KINDS],
            ammo: [0; AMMO_KINDS],
            mag: [0; WEAPON_KINDS],
        }
    }
}

/// Reset on respawn, kept across deaths within a level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientRespawn {
    pub score: i32,
    pub kills: i32,
    pub deaths: i32,
    pub streak: i32,
    pub best_streak: i32,
    pub enter_time: f32,
}

/// View state sent to the player.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub pmove: PmoveState,
    pub viewangles: Vec3,
    pub viewoffset: Vec3,
    pub blend: [f32; 4],
    pub fov: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GClient {
    pub ps: PlayerState,
    pub pers: ClientPersistant,
    pub resp: ClientRespawn,

    #[serde(skip)]
    pub cmd: Option<UserCmd>,
    pub buttons: u8,
    pub oldbuttons: u8,
    pub latched_buttons: u8,
    pub v_angle: Vec3,

    // movement modifiers
    pub stance: Stance,
    pub sprinting: bool,
    pub stamina: f32,
    /// -1 left, 0 none, +1 right.
    pub lean: i32,
    pub lean_offset: f32,
    pub dash_ready_time: f32,
    pub last_strafe_sign: i32,
    pub last_strafe_time: f32,
    /// Strafe direction held in the previous command.
    pub strafe_held: i32,
    pub slide_until: f32,
    pub slide_dir: Vec3,
    pub old_velocity: Vec3,
    pub was_on_ground: bool,

    // weapon state
    pub fire_finished: f32,
    pub reload_finished: f32,
    pub weapon_jammed: bool,
    pub grenade_cook_start: Option<f32>,

    pub effects: StatusEffects,

    // toggles
    pub flashlight: bool,
    pub nightvision: bool,
    pub holstered: bool,

    // view feedback
    pub damage_blood: i32,
    pub damage_armor: i32,
    pub damage_from: Vec3,
    pub fall_value: f32,
    pub bonus_alpha: f32,

    pub respawn_time: f32,
}

/// Multiplayer vote in progress.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub description: String,
    pub yes: i32,
    pub no: i32,
    pub deadline: f32,
}

/// Reset on every level load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelLocals {
    pub framenum: i32,
    pub time: f32,

    pub level_name: String,
    pub mapname: String,

    pub total_secrets: i32,
    pub found_secrets: i32,
    pub total_monsters: i32,
    pub killed_monsters: i32,

    pub weather: WeatherKind,
    pub weather_density: f32,
    /// Multiplier on every per-tick delta. 1.0 outside slow-motion effects.
    pub time_scale: f32,
    pub time_scale_until: f32,

    pub vote: Option<Vote>,
    pub objective: String,

    pub current_entity: i32,
    /// Corpses in order of death, oldest first.
    pub corpses: VecDeque<i32>,
}

impl Default for LevelLocals {
    fn default() -> Self {
        Self {
            framenum: 0,
            time: 0.0,
            level_name: String::new(),
            mapname: String::new(),
            total_secrets: 0,
            found_secrets: 0,
            total_monsters: 0,
            killed_monsters: 0,
            weather: WeatherKind::None,
            weather_density: 0.0,
            time_scale: 1.0,
            time_scale_until: 0.0,
            vote: None,
            objective: String::new(),
            current_entity: 0,
            corpses: VecDeque::new(),
        }
    }
}

/// Exists for the whole game, across level changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameLocals {
    pub maxclients: usize,
    pub maxentities: usize,
    pub spawnpoint: String,
    pub autosaved: bool,
}

// ============================================================
// Edict
// ============================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Edict {
    pub s: EntityState,
    pub client: Option<usize>,
    pub inuse: bool,
    /// Bumped every time the slot is freed.
    pub generation: u32,
    #[serde(skip)]
    pub area_node: Option<usize>,
    pub linkcount: i32,
    pub svflags: i32,
    pub mins: Vec3,
    pub maxs: Vec3,
    pub absmin: Vec3,
    pub absmax: Vec3,
    pub size: Vec3,
    pub solid: Solid,
    pub clipmask: i32,
    pub owner: i32,

    pub movetype: MoveType,
    pub flags: EntityFlags,
    pub model: String,
    pub freetime: f32,
    pub message: String,
    pub classname: String,
    pub spawnflags: i32,
    pub timestamp: f32,

    pub target: String,
    pub targetname: String,
    pub killtarget: String,
    pub pathtarget: String,
    pub deathtarget: String,
    pub team: i32,

    pub speed: f32,
    pub movedir: Vec3,
    pub pos1: Vec3,
    pub pos2: Vec3,
    pub velocity: Vec3,
    pub avelocity: Vec3,
    pub mass: i32,
    pub gravity: f32,

    pub goalentity: Option<EntityHandle>,
    pub movetarget: Option<EntityHandle>,
    pub yaw_speed: f32,
    pub ideal_yaw: f32,

    pub nextthink: f32,
    #[serde(skip)]
    pub prethink: Option<PrethinkKind>,
    #[serde(skip)]
    pub think: Option<ThinkKind>,
    #[serde(skip)]
    pub blocked: Option<BlockedKind>,
    #[serde(skip)]
    pub touch: Option<TouchKind>,
    #[serde(skip)]
    pub use_fn: Option<UseKind>,
    #[serde(skip)]
    pub pain: Option<PainKind>,
    #[serde(skip)]
    pub die: Option<DieKind>,

    pub touch_debounce_time: f32,
    pub pain_debounce_time: f32,
    pub damage_debounce_time: f32,

    pub health: i32,
    pub max_health: i32,
    pub gib_health: i32,
    pub deadflag: DeadFlag,
    pub takedamage: Damage,
    /// Set when damage landed this frame; cleared by the owner.
    pub damage_taken: bool,
    /// Damage taken on the killing frame, used to pick gib vs corpse.
    pub pending_damage: i32,
    /// Spawn protection runs until this level time.
    pub invuln_time: f32,
    pub dmg: i32,
    pub dmg_radius: f32,
    pub count: i32,

    pub enemy: Option<EntityHandle>,
    pub oldenemy: Option<EntityHandle>,
    pub activator: i32,
    pub groundentity: i32,

    pub wait: f32,
    pub delay: f32,
    pub random: f32,
    pub style: i32,
    pub lip: f32,

    pub item: Option<ItemKind>,
    pub weapon: WeaponKind,

    pub moveinfo: MoveInfo,
    pub monsterinfo: MonsterInfo,
    pub gore: Option<GoreZones>,
}

impl Edict {
    /// A fresh entity in a given slot.
    pub fn init(index: usize, generation: u32) -> Self {
        Self {
            inuse: true,
            generation,
            s: EntityState {
                number: index as i32,
                ..Default::default()
            },
            classname: "noclass".to_string(),
            gravity: 1.0,
            owner: -1,
            activator: -1,
            groundentity: -1,
            ..Default::default()
        }
    }

    pub fn is_monster(&self) -> bool {
        self.svflags & SVF_MONSTER != 0
    }

    pub fn is_alive(&self) -> bool {
        self.inuse && self.health > 0 && self.deadflag == DeadFlag::No
    }

    /// absmin/absmax from origin and bounds. The spatial index pads its
    /// queries instead of the stored box.
    pub fn set_abs_box(&mut self) {
        self.size = vector_subtract(&self.maxs, &self.mins);
        self.absmin = vector_add(&self.s.origin, &self.mins);
        self.absmax = vector_add(&self.s.origin, &self.maxs);
    }
}

// ============================================================
// Game context
// ============================================================

/// Everything the simulation owns. Passed by reference into every entry point.
pub struct GameCtx {
    pub edicts: Vec<Edict>,
    pub clients: Vec<GClient>,
    pub game: GameLocals,
    pub level: LevelLocals,

    pub num_edicts: i32,
    pub max_edicts: i32,
    /// Freed slots, oldest first.
    pub free_list: VecDeque<usize>,

    // configuration
    pub cvars: CvarContext,
    pub deathmatch: f32,
    pub skill: f32,
    pub friendly_fire: f32,
    pub maxclients: f32,
    pub maxentities: f32,
    pub sv_gravity: f32,
    pub sv_maxvelocity: f32,
    pub ai_freeze: f32,
    pub ai_maxcorpses: f32,
    pub g_timescale: f32,
    pub spawn_protect: f32,
    pub sv_seed: f32,

    // balance constants
    pub jam_chance: f32,
    pub grenade_fuse: f32,

    pub configstrings: ConfigStrings,
    pub world: BrushWorld,
    pub area: SpatialIndex,
    pub gi: Box<dyn GameImport>,
    pub pm: Box<dyn PlayerMovement>,
    pub rng: StdRng,

    pub means_of_death: MeansOfDeath,

    // Entity lookup indices, lower-cased keys
    pub entity_by_targetname: HashMap<String, Vec<i32>>,
    pub entity_by_classname: HashMap<String, Vec<i32>>,
}

/// Convenience alias so every game module can refer to the context as `GameContext`.
pub type GameContext = GameCtx;

impl Default for GameCtx {
    fn default() -> Self {
        Self {
            edicts: Vec::new(),
            clients: Vec::new(),
            game: GameLocals::default(),
            level: LevelLocals::default(),
            num_edicts: 0,
            max_edicts: 0,
            free_list: VecDeque::new(),
            cvars: CvarContext::new(),
            deathmatch: 0.0,
            skill: 1.0,
            friendly_fire: 0.0,
            maxclients: 1.0,
            maxentities: MAX_EDICTS as f32,
            sv_gravity: 800.0,
            sv_maxvelocity: 2000.0,
            ai_freeze: 0.0,
            ai_maxcorpses: 8.0,
            g_timescale: 1.0,
            spawn_protect: 2.0,
            sv_seed: 0.0,
            jam_chance: 0.002,
            grenade_fuse: 3.0,
            configstrings: ConfigStrings::new(),
            world: BrushWorld::new(),
            area: SpatialIndex::default(),
            gi: Box::new(StubGameImport),
            pm: Box::new(DefaultPlayerMovement),
            rng: StdRng::seed_from_u64(0),
            means_of_death: MeansOfDeath::Unknown,
            entity_by_targetname: HashMap::new(),
            entity_by_classname: HashMap::new(),
        }
    }
}

impl GameCtx {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scaled tick length. Everything that integrates or schedules uses this.
    pub fn frametime(&self) -> f32 {
        FRAMETIME * self.level.time_scale
    }

    pub fn get_edict(&self, idx: usize) -> Option<&Edict> {
        self.edicts.get(idx)
    }

    pub fn get_edict_mut(&mut self, idx: usize) -> Option<&mut Edict> {
        self.edicts.get_mut(idx)
    }

    /// Index of a live entity, or None for -1 / out of range / free slots.
    pub fn live_index(&self, idx: i32) -> Option<usize> {
        if idx < 0 {
            return None;
        }
        let i = idx as usize;
        match self.edicts.get(i) {
            Some(e) if e.inuse => Some(i),
            _ => None,
        }
    }

    pub fn handle_of(&self, idx: usize) -> EntityHandle {
        EntityHandle::new(idx as i32, self.edicts[idx].generation)
    }

    /// Resolve a handle to a slot. Fails when the slot was freed since the
    /// handle was taken.
    pub fn resolve(&self, handle: EntityHandle) -> Option<usize> {
        let i = self.live_index(handle.index)?;
        if self.edicts[i].generation == handle.generation {
            Some(i)
        } else {
            None
        }
    }

    /// Resolve an optional link held by an entity.
    pub fn resolve_opt(&self, handle: Option<EntityHandle>) -> Option<usize> {
        handle.and_then(|h| self.resolve(h))
    }

    pub fn client_of(&self, ent_idx: usize) -> Option<&GClient> {
        self.edicts
            .get(ent_idx)
            .and_then(|e| e.client)
            .and_then(|c| self.clients.get(c))
    }

    pub fn client_of_mut(&mut self, ent_idx: usize) -> Option<&mut GClient> {
        let c = self.edicts.get(ent_idx).and_then(|e| e.client)?;
        self.clients.get_mut(c)
    }

    /// Rebuild the targetname/classname indices from scratch.
    pub fn build_entity_indices(&mut self) {
        self.entity_by_targetname.clear();
        self.entity_by_classname.clear();
        for i in 0..self.num_edicts as usize {
            self.register_entity_in_index(i);
        }
    }

    pub fn register_entity_in_index(&mut self, ent_idx: usize) {
        let ent = &self.edicts[ent_idx];
        if !ent.inuse {
            return;
        }
        if !ent.targetname.is_empty() {
            let list = self
                .entity_by_targetname
                .entry(ent.targetname.to_lowercase())
                .or_default();
            if !list.contains(&(ent_idx as i32)) {
                list.push(ent_idx as i32);
            }
        }
        if !ent.classname.is_empty() {
            let list = self
                .entity_by_classname
                .entry(ent.classname.to_lowercase())
                .or_default();
            if !list.contains(&(ent_idx as i32)) {
                list.push(ent_idx as i32);
            }
        }
    }

    pub fn unregister_entity_from_index(&mut self, ent_idx: usize) {
        let idx = ent_idx as i32;
        let ent = &self.edicts[ent_idx];
        if let Some(list) = self.entity_by_targetname.get_mut(&ent.targetname.to_lowercase()) {
            list.retain(|&i| i != idx);
        }
        if let Some(list) = self.entity_by_classname.get_mut(&ent.classname.to_lowercase()) {
            list.retain(|&i| i != idx);
        }
    }

    /// Entities with this targetname, in slot order.
    pub fn find_by_targetname(&self, targetname: &str) -> Vec<usize> {
        self.find_in(&self.entity_by_targetname, targetname)
    }

    /// Entities with this classname, in slot order.
    pub fn find_by_classname(&self, classname: &str) -> Vec<usize> {
        self.find_in(&self.entity_by_classname, classname)
    }

    fn find_in(&self, map: &HashMap<String, Vec<i32>>, key: &str) -> Vec<usize> {
        let mut out: Vec<usize> = map
            .get(&key.to_lowercase())
            .map(|v| {
                v.iter()
                    .filter_map(|&i| self.live_index(i))
                    .collect()
            })
            .unwrap_or_default();
        out.sort_unstable();
        out
    }

    /// Random float in [0, 1).
    pub fn random(&mut self) -> f32 {
        use rand::Rng;
        self.rng.gen::<f32>()
    }

    /// Random float in [-1, 1).
    pub fn crandom(&mut self) -> f32 {
        2.0 * (self.random() - 0.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toughness_bands() {
        assert_eq!(Toughness::from_max_health(60), Toughness::Low);
        assert_eq!(Toughness::from_max_health(99), Toughness::Low);
        assert_eq!(Toughness::from_max_health(100), Toughness::Medium);
        assert_eq!(Toughness::from_max_health(150), Toughness::High);
        assert_eq!(Toughness::from_max_health(299), Toughness::High);
        assert_eq!(Toughness::from_max_health(500), Toughness::Elite);
    }

    #[test]
    fn test_dead_has_no_outgoing_edges() {
        use AiState::*;
        for to in [Idle, Alert, Chase, Attack, Pain, Dead] {
            assert!(!Dead.can_transition(to));
        }
    }

    #[test]
    fn test_every_live_state_can_enter_pain_and_dead() {
        use AiState::*;
        for from in [Idle, Alert, Chase, Attack, Pain] {
            assert!(from.can_transition(Pain));
            assert!(from.can_transition(Dead));
        }
    }

    #[test]
    fn test_idle_cannot_skip_to_attack() {
        assert!(!AiState::Idle.can_transition(AiState::Attack));
        assert!(!AiState::Idle.can_transition(AiState::Chase));
        assert!(AiState::Idle.can_transition(AiState::Alert));
    }

    #[test]
    fn test_stance_speed_scale() {
        assert_eq!(Stance::Stand.speed_scale(), 1.0);
        assert_eq!(Stance::Crouch.speed_scale(), 0.5);
        assert_eq!(Stance::Prone.speed_scale(), 0.25);
    }

    #[test]
    fn test_set_abs_box_is_exact() {
        let mut e = Edict::init(5, 0);
        e.s.origin = [10.0, 20.0, 30.0];
        e.mins = [-16.0, -16.0, -24.0];
        e.maxs = [16.0, 16.0, 32.0];
        e.set_abs_box();
        assert_eq!(e.absmin, [-6.0, 4.0, 6.0]);
        assert_eq!(e.absmax, [26.0, 36.0, 62.0]);
        assert_eq!(e.size, [32.0, 32.0, 56.0]);
    }

    #[test]
    fn test_weather_from_name() {
        assert_eq!(WeatherKind::from_name("Rain"), WeatherKind::Rain);
        assert_eq!(WeatherKind::from_name("bogus"), WeatherKind::None);
    }
}
