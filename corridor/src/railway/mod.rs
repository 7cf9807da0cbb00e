//! Railway simulation: train physics, breakpoint extraction and the
//! dispatch of train journeys over a single-track corridor.

pub mod dynamics;
pub mod profiles;
pub mod breakpoints;
pub mod corridor;
pub mod journey;
pub mod sampler;

use serde::Serialize;
use std::fmt;

use crate::eventsim;
use self::corridor::Corridor;
pub type Sim<'a> = eventsim::Simulation<Corridor<'a>>;

pub type TrainId = usize;

/// Travel direction relative to route order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    pub fn between(from: usize, to: usize) -> Direction {
        if from <= to { Direction::Forward } else { Direction::Backward }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Direction::Forward => write!(f, "forward"),
            Direction::Backward => write!(f, "backward"),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrainStatus {
    Planned,
    WaitingForDeparture,
    EarlyReserved,
    Departing,
    InTransit,
    Waiting,
    Stopped,
    Arrived,
}
