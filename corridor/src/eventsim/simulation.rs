use smallvec::SmallVec;
use ordered_float::OrderedFloat;
use std::collections::BinaryHeap;
use std::cmp::Ordering;
use std::mem;

pub type EventId = usize;
pub type ProcessId = usize;

pub enum ProcessState {
    Finished,
    Wait(SmallVec<[EventId; 2]>),
}

/// A suspendable unit of work. `resume` runs until the process either
/// finishes or names the events it waits for.
pub trait Process<T> {
    fn resume(&mut self, sim: &mut Simulation<T>) -> ProcessState;
}

enum EventState {
    Ready,
    Firing,
    Fired,
}

#[derive(Eq, PartialEq, Debug)]
pub struct QueuedEvent {
    pub time: OrderedFloat<f64>,
    pub id: usize,
    pub event: EventId,
}

impl Ord for QueuedEvent {
    fn cmp(&self, other: &QueuedEvent) -> Ordering {
        // Flipped to turn the (maximum) BinaryHeap into a minimum heap.
        other.time.cmp(&self.time).then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for QueuedEvent {
    fn partial_cmp(&self, other: &QueuedEvent) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct Event {
    state: EventState,
    listeners: Vec<ProcessId>,
}

#[derive(Default)]
pub struct Scheduler {
    pub time: OrderedFloat<f64>,
    events: Vec<Event>,
    queue: BinaryHeap<QueuedEvent>,
    id_counter: usize,
}

impl Scheduler {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn now(&self) -> f64 {
        *self.time
    }

    pub fn new_event(&mut self) -> EventId {
        let event_id = self.events.len();
        self.events.push(Event {
            state: EventState::Ready,
            listeners: vec![],
        });
        event_id
    }

    /// Queue `id` to fire `dt` seconds from now. Negative delays are
    /// clamped to zero, infinite delays never fire.
    pub fn schedule(&mut self, id: EventId, dt: f64) {
        if dt.is_infinite() {
            return;
        }
        let dt = if dt > 0.0 { dt } else { 0.0 };
        let qe = QueuedEvent {
            time: OrderedFloat::from(*self.time + dt),
            id: self.id_counter,
            event: id,
        };
        self.id_counter += 1;
        self.queue.push(qe);
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    fn fire(&mut self, id: EventId) -> Vec<ProcessId> {
        self.events[id].state = EventState::Firing;
        mem::replace(&mut self.events[id].listeners, Vec::new())
    }

    fn finish(&mut self, id: EventId) {
        self.events[id].state = EventState::Fired;
    }
}

pub struct Simulation<T> {
    pub world: T,
    procs: Vec<Option<(EventId, Box<dyn Process<T>>)>>,
    pub scheduler: Scheduler,
}

impl<T> Simulation<T> {
    pub fn new(world: T) -> Self {
        Simulation::new_with_scheduler(world, Scheduler::new())
    }

    pub fn new_with_scheduler(world: T, scheduler: Scheduler) -> Self {
        Simulation {
            procs: Vec::new(),
            scheduler,
            world,
        }
    }

    pub fn has_fired(&self, event: EventId) -> bool {
        match self.scheduler.events[event].state {
            EventState::Ready => false,
            _ => true,
        }
    }

    pub fn time(&self) -> f64 {
        *self.scheduler.time
    }

    pub fn create_timeout(&mut self, dt: f64) -> EventId {
        let id = self.scheduler.new_event();
        self.scheduler.schedule(id, dt);
        id
    }

    /// Registers the process and runs it until its first suspension.
    /// The returned event fires when the process finishes.
    pub fn start_process(&mut self, p: Box<dyn Process<T>>) -> EventId {
        let eventid = self.scheduler.new_event();
        let process_id = self.procs.len();
        self.procs.push(Some((eventid, p)));
        self.resume(process_id);
        eventid
    }

    /// Processes every event up to and including `horizon`, then sets the
    /// clock to `horizon`. Events queued beyond it are left untouched.
    pub fn run_until(&mut self, horizon: f64) {
        let target = OrderedFloat::from(horizon);
        while let Some(&QueuedEvent { time, .. }) = self.scheduler.queue.peek() {
            if time > target {
                break;
            }
            self.step();
        }
        if self.scheduler.time < target {
            self.scheduler.time = target;
        }
    }

    pub fn step(&mut self) -> bool {
        match self.scheduler.queue.pop() {
            Some(ev) => {
                self.scheduler.time = ev.time;
                self.fire(ev.event);
                true
            }
            None => false,
        }
    }

    pub fn run(&mut self) {
        while self.step() {}
    }

    fn fire(&mut self, event_id: EventId) {
        let proc_ids = self.scheduler.fire(event_id);
        for process_id in proc_ids {
            self.resume(process_id);
        }
        self.scheduler.finish(event_id);
    }

    fn resume(&mut self, process_id: ProcessId) {
        // The process is taken out of the table while it runs, so that
        // nothing it fires can resume it re-entrantly.
        if let Some((event_id, mut process)) = self.procs[process_id].take() {
            loop {
                match process.resume(self) {
                    ProcessState::Finished => {
                        self.scheduler.schedule(event_id, 0.0);
                        break;
                    }
                    ProcessState::Wait(evs) => {
                        let mut waiting = false;
                        for x in evs {
                            if !self.has_fired(x) {
                                waiting = true;
                                let listeners = &mut self.scheduler.events[x].listeners;
                                if !listeners.contains(&process_id) {
                                    listeners.push(process_id);
                                }
                            }
                        }

                        if waiting {
                            self.procs[process_id] = Some((event_id, process));
                            break;
                        }

                        // None of the events are pending, resume immediately.
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_ordering() {
        let mut p = BinaryHeap::new();
        p.push(QueuedEvent { time: OrderedFloat::from(123.0), id: 0, event: 0 });
        p.push(QueuedEvent { time: OrderedFloat::from(0.0), id: 1, event: 0 });
        p.push(QueuedEvent { time: OrderedFloat::from(122.0), id: 2, event: 0 });
        assert_eq!(*p.pop().unwrap().time, 0.0);
        assert_eq!(*p.pop().unwrap().time, 122.0);
        assert_eq!(*p.pop().unwrap().time, 123.0);
    }

    #[test]
    fn test_ties_by_submission() {
        let mut p = BinaryHeap::new();
        p.push(QueuedEvent { time: OrderedFloat::from(5.0), id: 7, event: 70 });
        p.push(QueuedEvent { time: OrderedFloat::from(5.0), id: 3, event: 30 });
        p.push(QueuedEvent { time: OrderedFloat::from(5.0), id: 5, event: 50 });
        assert_eq!(p.pop().unwrap().event, 30);
        assert_eq!(p.pop().unwrap().event, 50);
        assert_eq!(p.pop().unwrap().event, 70);
    }

    struct Ticker {
        name: &'static str,
        period: f64,
        left: usize,
    }

    impl Process<Rc<RefCell<Vec<(f64, &'static str)>>>> for Ticker {
        fn resume(&mut self, sim: &mut Simulation<Rc<RefCell<Vec<(f64, &'static str)>>>>) -> ProcessState {
            let t = sim.time();
            sim.world.borrow_mut().push((t, self.name));
            if self.left == 0 {
                return ProcessState::Finished;
            }
            self.left -= 1;
            ProcessState::Wait(SmallVec::from_slice(&[sim.create_timeout(self.period)]))
        }
    }

    #[test]
    fn test_processes_interleave() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut sim = Simulation::new(log.clone());
        sim.start_process(Box::new(Ticker { name: "a", period: 2.0, left: 2 }));
        sim.start_process(Box::new(Ticker { name: "b", period: 1.0, left: 3 }));
        sim.run();
        let log = log.borrow();
        assert_eq!(
            *log,
            vec![(0.0, "a"), (0.0, "b"), (1.0, "b"), (2.0, "a"), (2.0, "b"), (3.0, "b"), (4.0, "a")]
        );
    }

    #[test]
    fn test_run_until_stops_at_horizon() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut sim = Simulation::new(log.clone());
        sim.start_process(Box::new(Ticker { name: "a", period: 10.0, left: 100 }));
        sim.run_until(35.0);
        assert_eq!(log.borrow().len(), 4);
        assert_eq!(sim.time(), 35.0);
        assert!(sim.scheduler.pending() > 0);
    }

    #[test]
    fn test_negative_delay_clamped() {
        let mut sim = Simulation::new(());
        let ev = sim.create_timeout(-3.0);
        sim.run();
        assert!(sim.has_fired(ev));
        assert_eq!(sim.time(), 0.0);
    }
}
