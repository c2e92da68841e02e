#![allow(clippy::too_many_arguments, clippy::collapsible_if, clippy::comparison_chain)]

// Application driver: fixed tick loop, level loading, snapshots, operator commands

pub mod server;
pub mod sv_files;
pub mod sv_init;
pub mod sv_main;
pub mod sv_ccmds;
