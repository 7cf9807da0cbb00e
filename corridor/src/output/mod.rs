//! Writers for the simulation results.

pub mod history;
pub mod json;
pub mod csv;
