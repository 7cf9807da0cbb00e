use super::breakpoints::{BreakpointEntry, BreakpointTable};
use super::corridor::{Corridor, Timing};
use super::{Direction, Sim, TrainId, TrainStatus};
use crate::config::Config;
use crate::eventsim::resource::Acquire;
use crate::eventsim::{EventId, Process, ProcessState};
use crate::input::timetable::{Behaviour, TrainSpec};
use crate::input::track::{ElementIdx, Track};
use log::{debug, info};
use smallvec::SmallVec;

#[derive(Debug, Fail)]
pub enum JourneyError {
    #[fail(display = "train {}: unknown station {:?}", _0, _1)]
    UnknownStation(String, String),
    #[fail(display = "train {}: departs from and arrives at {:?}", _0, _1)]
    SameStation(String, String),
    #[fail(display = "train {}: {:?} is a section, not a station", _0, _1)]
    NotAStation(String, String),
    #[fail(display = "train {}: stop at {:?} is not on its route", _0, _1)]
    StopNotOnRoute(String, String),
    #[fail(display = "train {}: no {} breakpoints for section {:?}", _0, _2, _1)]
    MissingBreakpoints(String, String, Direction),
}

/// One element of a leg, with everything needed to time it.
#[derive(Debug, Clone)]
struct Stage {
    element: ElementIdx,
    refuge: bool,
    /// Sections only; stations take no running time.
    entry: Option<BreakpointEntry>,
    /// The train is at standstill here: departure, arrival or a listed stop.
    stop: bool,
    dwell: f64,
}

#[derive(Debug, Clone)]
struct Leg {
    direction: Direction,
    stages: Vec<Stage>,
}

/// A train's validated itinerary. Building one resolves every element and
/// breakpoint entry it needs, so a bad timetable entry fails here and not
/// in the middle of the simulation.
#[derive(Debug, Clone)]
pub struct Plan {
    name: String,
    legs: Vec<Leg>,
    departure: f64,
    lead: Option<f64>,
}

impl Plan {
    pub fn new(spec: &TrainSpec, track: &Track, table: &BreakpointTable) -> Result<Plan, JourneyError> {
        let lookup = |station: &str| -> Result<ElementIdx, JourneyError> {
            let idx = track.lookup(station)
                .ok_or_else(|| JourneyError::UnknownStation(spec.name.clone(), station.to_string()))?;
            if track.elements[idx].is_section() {
                return Err(JourneyError::NotAStation(spec.name.clone(), station.to_string()));
            }
            Ok(idx)
        };
        let from = lookup(&spec.from)?;
        let to = lookup(&spec.to)?;
        if from == to {
            return Err(JourneyError::SameStation(spec.name.clone(), spec.from.clone()));
        }
        let (lo, hi) = if from < to { (from, to) } else { (to, from) };
        for (station, _) in &spec.stops {
            match lookup(station) {
                Ok(idx) if lo <= idx && idx <= hi => {}
                Ok(_) | Err(JourneyError::UnknownStation(..)) => {
                    return Err(JourneyError::StopNotOnRoute(spec.name.clone(), station.clone()))
                }
                Err(e) => return Err(e),
            }
        }

        let mut legs = vec![leg(spec, track, table, from, to)?];
        if spec.behaviour == Behaviour::Return {
            legs.push(leg(spec, track, table, to, from)?);
        }
        Ok(Plan {
            name: spec.name.clone(),
            legs,
            departure: spec.departure,
            lead: spec.lead,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn direction(&self) -> Direction {
        self.legs[0].direction
    }

    /// Departure element of the outbound leg.
    pub fn origin(&self) -> ElementIdx {
        self.legs[0].stages[0].element
    }
}

fn leg(spec: &TrainSpec, track: &Track, table: &BreakpointTable, from: ElementIdx, to: ElementIdx)
       -> Result<Leg, JourneyError> {
    let direction = Direction::between(from, to);
    let route: Vec<ElementIdx> = match direction {
        Direction::Forward => (from..=to).collect(),
        Direction::Backward => (to..=from).rev().collect(),
    };
    let last = route.len() - 1;
    let mut stages = Vec::with_capacity(route.len());
    for (pos, &idx) in route.iter().enumerate() {
        let element = &track.elements[idx];
        let entry = if element.is_section() {
            let e = table.get(&element.name, direction).ok_or_else(|| {
                JourneyError::MissingBreakpoints(spec.name.clone(), element.name.clone(), direction)
            })?;
            Some(*e)
        } else {
            None
        };
        let dwell = spec.dwell(&element.name);
        stages.push(Stage {
            element: idx,
            refuge: element.is_refuge(),
            entry,
            stop: pos == 0 || pos == last || dwell.is_some(),
            dwell: dwell.unwrap_or(0.0),
        });
    }
    Ok(Leg { direction, stages })
}

#[derive(Debug, Copy, Clone, PartialEq)]
enum Step {
    Begin,
    EarlyRequest,
    EarlyGranted,
    Request,
    Departing,
    InitialLookahead,
    Enter(usize),
    Dwell(usize),
    Lookahead(usize),
    Arrive,
}

enum Next {
    Go(Step),
    Wait(Step, EventId),
    Done,
}

/// Runs one train through its legs, reserving elements ahead of it and
/// timing each element with the breakpoint table.
pub struct Journey {
    train: TrainId,
    plan: Plan,
    leg: usize,
    step: Step,
    waiting: bool,
    /// Refuge the train was planned to run through but has to stop at.
    held_at: Option<usize>,
    retry_interval: f64,
}

impl Journey {
    pub fn new(train: TrainId, plan: Plan, config: &Config) -> Journey {
        Journey {
            train,
            plan,
            leg: 0,
            step: Step::Begin,
            waiting: false,
            held_at: None,
            retry_interval: if config.retry_interval > 0.0 { config.retry_interval } else { 1.0 },
        }
    }

    fn stages(&self) -> &[Stage] {
        &self.plan.legs[self.leg].stages
    }

    fn direction(&self) -> Direction {
        self.plan.legs[self.leg].direction
    }

    fn stops_at(&self, pos: usize) -> bool {
        self.stages()[pos].stop || self.held_at == Some(pos)
    }

    fn last(&self) -> usize {
        self.stages().len() - 1
    }

    /// Leg position of the first refuge at or after `pos`; the end of the
    /// leg if there is none.
    fn refuge_at_or_after(&self, pos: usize) -> usize {
        let last = self.last();
        (pos..=last).find(|&k| self.stages()[k].refuge).unwrap_or(last)
    }

    fn after(&self, sim: &mut Sim, dt: f64, step: Step) -> Next {
        if dt > 0.0 {
            Next::Wait(step, sim.create_timeout(dt))
        } else {
            Next::Go(step)
        }
    }

    fn request(&self, sim: &mut Sim, element: ElementIdx, then: Step) -> Next {
        match sim.world.request(&mut sim.scheduler, self.train, element) {
            Acquire::Granted => Next::Go(then),
            Acquire::Queued(ev) => {
                sim.world.set_status(self.train, TrainStatus::Waiting, Some(Timing::Capacity));
                Next::Wait(then, ev)
            }
        }
    }

    fn try_reserve(&self, sim: &mut Sim, from: usize, to: usize) -> bool {
        let batch: SmallVec<[ElementIdx; 8]> = self.stages()[from..=to].iter().map(|s| s.element).collect();
        let now = sim.time();
        sim.world.reserve_batch(now, self.train, &batch)
    }

    /// Reserves leg positions `from..=to` as one batch. On failure the
    /// train reports waiting (once per episode) and retries `retry` later.
    fn reserve(&mut self, sim: &mut Sim, from: usize, to: usize, retry: Step) -> Option<Next> {
        if self.try_reserve(sim, from, to) {
            self.waiting = false;
            return None;
        }
        if !self.waiting {
            self.waiting = true;
            debug!("t={:.1} {} waits for {}..{} of its leg", sim.time(), self.plan.name,
                   sim.world.track.name(self.stages()[from].element),
                   sim.world.track.name(self.stages()[to].element));
            sim.world.set_status(self.train, TrainStatus::Waiting, Some(Timing::Capacity));
        }
        Some(Next::Wait(retry, sim.create_timeout(self.retry_interval)))
    }

    fn advance(&mut self, sim: &mut Sim) -> Next {
        let train = self.train;
        let now = sim.time();
        match self.step {
            Step::Begin => {
                sim.world.set_direction(train, self.direction());
                if self.leg > 0 {
                    return Next::Go(Step::Request);
                }
                match self.plan.lead {
                    Some(lead) if lead > 0.0 => {
                        let at = (self.plan.departure - lead).max(0.0);
                        self.after(sim, at - now, Step::EarlyRequest)
                    }
                    _ => {
                        let wait = self.plan.departure - now;
                        if wait > 0.0 {
                            sim.world.set_status(train, TrainStatus::WaitingForDeparture,
                                                 Some(Timing::Departure(wait)));
                        }
                        self.after(sim, wait, Step::Request)
                    }
                }
            }
            Step::EarlyRequest => {
                let first = self.stages()[0].element;
                self.request(sim, first, Step::EarlyGranted)
            }
            Step::EarlyGranted => {
                let first = self.stages()[0].element;
                sim.world.enter(now, train, first);
                sim.world.set_status(train, TrainStatus::EarlyReserved,
                                     Some(Timing::EarlyReservation(self.plan.lead.unwrap_or(0.0))));
                let wait = self.plan.departure - now;
                if wait > 0.0 {
                    sim.world.set_status(train, TrainStatus::WaitingForDeparture,
                                         Some(Timing::Departure(wait)));
                }
                self.after(sim, wait, Step::InitialLookahead)
            }
            Step::Request => {
                let first = self.stages()[0].element;
                if sim.world.holds(train, first) {
                    Next::Go(Step::InitialLookahead)
                } else {
                    self.request(sim, first, Step::Departing)
                }
            }
            Step::Departing => {
                let first = self.stages()[0].element;
                sim.world.enter(now, train, first);
                sim.world.set_status(train, TrainStatus::Departing, None);
                Next::Go(Step::InitialLookahead)
            }
            Step::InitialLookahead => {
                let to = self.refuge_at_or_after(1);
                if let Some(next) = self.reserve(sim, 1, to, Step::InitialLookahead) {
                    return next;
                }
                Next::Go(Step::Enter(1))
            }
            Step::Enter(i) => {
                let (prev, current) = (self.stages()[i - 1].clone(), self.stages()[i].clone());
                let stopped = self.stops_at(i - 1);
                sim.world.release(&mut sim.scheduler, train, prev.element);
                sim.world.enter(now, train, current.element);

                if i == self.last() {
                    if current.dwell > 0.0 {
                        sim.world.set_status(train, TrainStatus::Stopped, Some(Timing::Dwell(current.dwell)));
                    } else {
                        sim.world.set_status(train, TrainStatus::InTransit, None);
                    }
                    return self.after(sim, current.dwell, Step::Arrive);
                }

                match current.entry {
                    Some(entry) => {
                        let duration = entry.start(stopped);
                        let constant = if stopped { "time_at_breakpoint_start0" } else { "time_at_breakpoint_startV" };
                        sim.world.set_status(train, TrainStatus::InTransit, Some(Timing::Breakpoint {
                            constant,
                            direction: self.direction(),
                            duration,
                            next: None,
                        }));
                        self.after(sim, duration, Step::Dwell(i))
                    }
                    None => {
                        sim.world.set_status(train, TrainStatus::InTransit, None);
                        Next::Go(Step::Dwell(i))
                    }
                }
            }
            Step::Dwell(i) => {
                let dwell = self.stages()[i].dwell;
                if dwell > 0.0 {
                    sim.world.set_status(train, TrainStatus::Stopped, Some(Timing::Dwell(dwell)));
                }
                self.after(sim, dwell, Step::Lookahead(i))
            }
            Step::Lookahead(i) => {
                let next = i + 1;
                let (upcoming, current) = (self.stages()[next].clone(), self.stages()[i].clone());

                // Single track ahead: take everything up to the next refuge.
                // Stopping at a refuge: take only the refuge. Running
                // through a refuge: also take the stretch behind it, or stop
                // at the refuge if that stretch is taken.
                let mut stop = upcoming.stop;
                let why = if !upcoming.refuge {
                    let to = self.refuge_at_or_after(next);
                    if let Some(n) = self.reserve(sim, next, to, Step::Lookahead(i)) {
                        return n;
                    }
                    "single track"
                } else if upcoming.stop {
                    if let Some(n) = self.reserve(sim, next, next, Step::Lookahead(i)) {
                        return n;
                    }
                    "stopping at refuge"
                } else {
                    let to = self.refuge_at_or_after(next + 1);
                    if self.try_reserve(sim, next, to) {
                        self.waiting = false;
                        "through refuge"
                    } else {
                        if let Some(n) = self.reserve(sim, next, next, Step::Lookahead(i)) {
                            return n;
                        }
                        debug!("t={:.1} {} holds at {}, line ahead occupied",
                               now, self.plan.name, sim.world.track.name(upcoming.element));
                        self.held_at = Some(next);
                        stop = true;
                        "held at refuge"
                    }
                };

                match current.entry {
                    Some(entry) => {
                        let duration = entry.remaining(stop);
                        let constant = if stop { "remaining_time_stop0" } else { "remaining_time_stopV" };
                        let name = sim.world.track.name(upcoming.element).to_string();
                        sim.world.set_status(train, TrainStatus::InTransit, Some(Timing::Breakpoint {
                            constant,
                            direction: self.direction(),
                            duration,
                            next: Some((name, why)),
                        }));
                        self.after(sim, duration, Step::Enter(next))
                    }
                    None => {
                        sim.world.set_status(train, TrainStatus::InTransit, None);
                        Next::Go(Step::Enter(next))
                    }
                }
            }
            Step::Arrive => {
                let end = self.stages()[self.last()].element;
                sim.world.arrive(now, train, end);
                info!("t={:.1} {} arrived at {}", now, self.plan.name, sim.world.track.name(end));
                self.held_at = None;
                if self.leg + 1 < self.plan.legs.len() {
                    self.leg += 1;
                    return Next::Go(Step::Begin);
                }
                sim.world.release(&mut sim.scheduler, train, end);
                sim.world.retire(now, train);
                Next::Done
            }
        }
    }
}

impl<'a> Process<Corridor<'a>> for Journey {
    fn resume(&mut self, sim: &mut Sim<'a>) -> ProcessState {
        loop {
            match self.advance(sim) {
                Next::Go(step) => self.step = step,
                Next::Wait(step, ev) => {
                    self.step = step;
                    return ProcessState::Wait(SmallVec::from_slice(&[ev]));
                }
                Next::Done => return ProcessState::Finished,
            }
        }
    }
}
