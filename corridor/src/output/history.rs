use crate::railway::{Direction, TrainStatus};
use failure;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Default, Serialize)]
pub struct History {
    pub trains: Vec<TrainHistory>,
    pub failures: Vec<Failure>,
    #[serde(skip)]
    pub snapshots: Vec<Snapshot>,
}

#[derive(Debug, Serialize)]
pub struct TrainHistory {
    pub name: String,
    pub outcome: Outcome,
    pub events: Vec<TrainLogEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "lowercase")]
pub enum Outcome {
    /// Still running or blocked when the simulation stopped.
    Unfinished,
    Arrived { time: f64 },
    Failed { message: String },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementEvent {
    Reserved,
    Released,
    Entered,
    Arrived,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainLogEvent {
    pub time: f64,
    pub element: String,
    pub event: ElementEvent,
}

#[derive(Debug, Clone, Serialize)]
pub struct Failure {
    pub train: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainSnapshot {
    pub element: Option<String>,
    pub status: TrainStatus,
    pub direction: Direction,
    pub timing: Option<String>,
    pub reserved: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub time: f64,
    pub trains: BTreeMap<String, TrainSnapshot>,
}

/// Print one element visit per line on the following format:
/// `trainname time elementname`.
pub fn visits(h: &History) -> Result<String, failure::Error> {
    use std::fmt::Write;
    let mut s = String::new();
    for train in &h.trains {
        for ev in &train.events {
            if ev.event == ElementEvent::Entered {
                writeln!(s, "{} {} {}", train.name, ev.time, ev.element)?;
            }
        }
    }
    Ok(s)
}
