//! Discrete-event engine: processes suspended on events, resumed in
//! time order by a single scheduler.

pub mod simulation;
pub mod resource;

pub use self::simulation::*;
