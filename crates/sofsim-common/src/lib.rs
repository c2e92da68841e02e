#![allow(clippy::needless_range_loop, clippy::too_many_arguments, clippy::float_cmp,
         clippy::manual_range_contains, clippy::collapsible_else_if)]
// Shared math, collision primitives, configuration variables and player movement.

pub mod q_shared;
pub mod cmodel;
pub mod cvar;
pub mod pmove;
