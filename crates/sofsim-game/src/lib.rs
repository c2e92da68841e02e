#![allow(clippy::too_many_arguments, clippy::collapsible_if, clippy::collapsible_else_if,
         clippy::field_reassign_with_default, clippy::manual_range_contains,
         clippy::comparison_chain, clippy::float_cmp, clippy::needless_range_loop,
         clippy::type_complexity)]
// Simulation core: entities, physics, combat, AI, players and levels.

pub mod game;
pub mod game_import;
pub mod g_error;
pub mod g_local;
pub mod dispatch;
pub mod g_configstrings;
pub mod g_world;
pub mod g_utils;
pub mod g_combat;
pub mod g_gore;
pub mod g_weapon;
pub mod g_phys;
pub mod g_ai;
pub mod m_move;
pub mod m_soldier;
pub mod m_tactics;
pub mod g_monster;
pub mod g_items;
pub mod g_func;
pub mod g_trigger;
pub mod g_misc;
pub mod g_spawn;
pub mod g_save;
pub mod g_main;
pub mod p_client;
pub mod p_weapon;
pub mod p_view;
pub mod p_hud;
