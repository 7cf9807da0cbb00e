use super::{Direction, TrainId, TrainStatus};
use crate::eventsim::resource::{Acquire, Resource};
use crate::eventsim::Scheduler;
use crate::input::track::{ElementIdx, Track};
use crate::output::history::*;
use log::debug;
use std::collections::BTreeMap;
use std::fmt;

/// What a train is currently waiting for, shown in snapshots.
#[derive(Clone, Debug, PartialEq)]
pub enum Timing {
    Breakpoint {
        constant: &'static str,
        direction: Direction,
        duration: f64,
        /// The next element and why this constant was picked for it.
        next: Option<(String, &'static str)>,
    },
    Dwell(f64),
    Departure(f64),
    EarlyReservation(f64),
    Capacity,
}

impl fmt::Display for Timing {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Timing::Breakpoint { constant, direction, duration, ref next } => {
                write!(f, "{} ({}): {:.1}s", constant, direction, duration)?;
                if let Some((ref element, why)) = *next {
                    write!(f, " for {} ({})", element, why)?;
                }
                Ok(())
            }
            Timing::Dwell(t) => write!(f, "scheduled stop for {:.1}s", t),
            Timing::Departure(t) => write!(f, "departure in {:.1}s", t),
            Timing::EarlyReservation(t) => write!(f, "departure element reserved {:.1}s before departure", t),
            Timing::Capacity => write!(f, "waiting for free capacity"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct TrainState {
    pub element: Option<ElementIdx>,
    pub status: TrainStatus,
    pub direction: Direction,
    pub timing: Option<Timing>,
}

/// Shared state of the dispatch simulation: element reservations, the
/// table of live trains and everything recorded for the history.
pub struct Corridor<'a> {
    pub track: &'a Track,
    elements: Vec<Resource<TrainId>>,
    live: BTreeMap<TrainId, TrainState>,
    trains: Vec<TrainHistory>,
    failures: Vec<Failure>,
    snapshots: Vec<Snapshot>,
}

impl<'a> fmt::Debug for Corridor<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Corridor {{ elements: {:?}, live: {:?} }}", self.elements, self.live)
    }
}

impl<'a> Corridor<'a> {
    pub fn new(track: &'a Track) -> Corridor<'a> {
        Corridor {
            track,
            elements: track.elements.iter().map(|e| Resource::new(e.capacity)).collect(),
            live: BTreeMap::new(),
            trains: Vec::new(),
            failures: Vec::new(),
            snapshots: Vec::new(),
        }
    }

    /// Adds a train in the `planned` state, placed at its departure element
    /// without holding it.
    pub fn add_train(&mut self, name: &str, direction: Direction, origin: ElementIdx) -> TrainId {
        let id = self.trains.len();
        self.trains.push(TrainHistory {
            name: name.to_string(),
            outcome: Outcome::Unfinished,
            events: Vec::new(),
        });
        self.live.insert(id, TrainState {
            element: Some(origin),
            status: TrainStatus::Planned,
            direction,
            timing: None,
        });
        id
    }

    /// Records a train that could not be set up. It never holds anything.
    pub fn add_failed(&mut self, name: &str, message: String) {
        self.trains.push(TrainHistory {
            name: name.to_string(),
            outcome: Outcome::Failed { message: message.clone() },
            events: Vec::new(),
        });
        self.failures.push(Failure { train: name.to_string(), message });
    }

    pub fn is_live(&self) -> bool {
        !self.live.is_empty()
    }

    pub fn holders(&self, element: ElementIdx) -> &[TrainId] {
        self.elements[element].holders()
    }

    pub fn holds(&self, train: TrainId, element: ElementIdx) -> bool {
        self.elements[element].is_held_by(train)
    }

    fn record(&mut self, time: f64, train: TrainId, element: ElementIdx, event: ElementEvent) {
        debug!("t={:.1} {} {:?} {}", time, self.trains[train].name, event, self.track.name(element));
        self.trains[train].events.push(TrainLogEvent {
            time,
            element: self.track.name(element).to_string(),
            event,
        });
    }

    /// Blocking request for a single element.
    pub fn request(&mut self, scheduler: &mut Scheduler, train: TrainId, element: ElementIdx) -> Acquire {
        let held = self.holds(train, element);
        let result = self.elements[element].request(scheduler, train);
        if result == Acquire::Granted && !held {
            self.record(scheduler.now(), train, element, ElementEvent::Reserved);
        }
        result
    }

    /// Takes all of `batch` or nothing. Elements already held by the train
    /// count as available.
    pub fn reserve_batch(&mut self, now: f64, train: TrainId, batch: &[ElementIdx]) -> bool {
        if !batch.iter().all(|e| self.elements[*e].is_available_for(train)) {
            return false;
        }
        for &e in batch {
            if !self.holds(train, e) && self.elements[e].try_acquire(train) {
                self.record(now, train, e, ElementEvent::Reserved);
            }
        }
        true
    }

    /// Releases a holding. Queued trains that get the element are
    /// recorded as reserving it at the same instant.
    pub fn release(&mut self, scheduler: &mut Scheduler, train: TrainId, element: ElementIdx) {
        if !self.holds(train, element) {
            return;
        }
        let granted = self.elements[element].release(scheduler, train);
        let now = scheduler.now();
        self.record(now, train, element, ElementEvent::Released);
        for other in granted {
            self.record(now, other, element, ElementEvent::Reserved);
        }
    }

    pub fn set_status(&mut self, train: TrainId, status: TrainStatus, timing: Option<Timing>) {
        if let Some(s) = self.live.get_mut(&train) {
            s.status = status;
            s.timing = timing;
        }
    }

    pub fn set_direction(&mut self, train: TrainId, direction: Direction) {
        if let Some(s) = self.live.get_mut(&train) {
            s.direction = direction;
        }
    }

    pub fn enter(&mut self, now: f64, train: TrainId, element: ElementIdx) {
        if let Some(s) = self.live.get_mut(&train) {
            s.element = Some(element);
        }
        self.record(now, train, element, ElementEvent::Entered);
    }

    pub fn arrive(&mut self, now: f64, train: TrainId, element: ElementIdx) {
        self.set_status(train, TrainStatus::Arrived, None);
        self.record(now, train, element, ElementEvent::Arrived);
    }

    /// Removes a finished train from the live table.
    pub fn retire(&mut self, now: f64, train: TrainId) {
        self.live.remove(&train);
        self.trains[train].outcome = Outcome::Arrived { time: now };
    }

    /// Elements held by the train, in its travel order.
    pub fn held_by(&self, train: TrainId, direction: Direction) -> Vec<ElementIdx> {
        let mut held: Vec<ElementIdx> = (0..self.elements.len())
            .filter(|e| self.elements[*e].is_held_by(train))
            .collect();
        if direction == Direction::Backward {
            held.reverse();
        }
        held
    }

    pub fn snapshot(&mut self, time: f64) {
        let mut trains = BTreeMap::new();
        for (id, state) in &self.live {
            let reserved = self.held_by(*id, state.direction)
                .into_iter()
                .map(|e| self.track.name(e).to_string())
                .collect();
            trains.insert(self.trains[*id].name.clone(), TrainSnapshot {
                element: state.element.map(|e| self.track.name(e).to_string()),
                status: state.status,
                direction: state.direction,
                timing: state.timing.as_ref().map(|t| t.to_string()),
                reserved,
            });
        }
        self.snapshots.push(Snapshot {
            time: (time * 10.0).round() / 10.0,
            trains,
        });
    }

    pub fn into_history(self) -> History {
        History {
            trains: self.trains,
            failures: self.failures,
            snapshots: self.snapshots,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::track::{Element, ElementKind};

    fn track() -> Track {
        Track::new(vec![
            Element { name: "A".to_string(), kind: ElementKind::Station, length: 0.0, capacity: 2 },
            Element { name: "S1".to_string(), kind: ElementKind::Section, length: 100.0, capacity: 1 },
            Element { name: "B".to_string(), kind: ElementKind::Station, length: 0.0, capacity: 2 },
        ]).unwrap()
    }

    #[test]
    fn test_batch_all_or_nothing() {
        let t = track();
        let mut c = Corridor::new(&t);
        let mut s = Scheduler::new();
        let a = c.add_train("a", Direction::Forward, 0);
        let b = c.add_train("b", Direction::Backward, 2);
        assert_eq!(c.request(&mut s, b, 1), Acquire::Granted);
        assert!(!c.reserve_batch(0.0, a, &[0, 1, 2]));
        assert!(c.held_by(a, Direction::Forward).is_empty());
        c.release(&mut s, b, 1);
        assert!(c.reserve_batch(0.0, a, &[0, 1, 2]));
        assert_eq!(c.held_by(a, Direction::Forward), vec![0, 1, 2]);
        assert_eq!(c.held_by(a, Direction::Backward), vec![2, 1, 0]);
        // Already held elements do not block a repeated batch.
        assert!(c.reserve_batch(0.0, a, &[1, 2]));
    }

    #[test]
    fn test_release_grants_queued_train() {
        let t = track();
        let mut c = Corridor::new(&t);
        let mut s = Scheduler::new();
        let a = c.add_train("a", Direction::Forward, 0);
        let b = c.add_train("b", Direction::Forward, 0);
        c.request(&mut s, a, 1);
        match c.request(&mut s, b, 1) {
            Acquire::Queued(_) => {}
            x => panic!("unexpected {:?}", x),
        }
        c.release(&mut s, a, 1);
        assert_eq!(c.holders(1), &[b]);
        let h = c.into_history();
        let kinds: Vec<_> = h.trains[b].events.iter().map(|e| e.event).collect();
        assert_eq!(kinds, vec![ElementEvent::Reserved]);
    }

    #[test]
    fn test_snapshot_and_retire() {
        let t = track();
        let mut c = Corridor::new(&t);
        let mut s = Scheduler::new();
        let a = c.add_train("a", Direction::Forward, 0);
        c.add_failed("broken", "no such station".to_string());
        c.snapshot(0.0);
        c.request(&mut s, a, 0);
        c.enter(0.0, a, 0);
        c.set_status(a, TrainStatus::InTransit, Some(Timing::Breakpoint {
            constant: "remaining_time_stopV",
            direction: Direction::Forward,
            duration: 41.3,
            next: Some(("S1".to_string(), "single track")),
        }));
        c.snapshot(0.04);
        c.retire(5.0, a);
        c.snapshot(5.0);
        assert!(!c.is_live());

        let h = c.into_history();
        assert_eq!(h.snapshots.len(), 3);
        // A planned train sits at its departure element without holding it.
        let planned = &h.snapshots[0].trains["a"];
        assert_eq!(planned.status, TrainStatus::Planned);
        assert_eq!(planned.element, Some("A".to_string()));
        assert!(planned.reserved.is_empty());
        assert!(!h.snapshots[0].trains.contains_key("broken"));

        assert_eq!(h.snapshots[1].time, 0.0);
        let snap = &h.snapshots[1].trains["a"];
        assert_eq!(snap.element, Some("A".to_string()));
        assert_eq!(snap.reserved, vec!["A".to_string()]);
        assert_eq!(snap.timing.as_ref().map(|s| s.as_str()),
                   Some("remaining_time_stopV (forward): 41.3s for S1 (single track)"));
        assert!(h.snapshots[2].trains.is_empty());
        assert_eq!(h.failures.len(), 1);
        assert_eq!(h.trains[0].outcome, Outcome::Arrived { time: 5.0 });
    }
}
