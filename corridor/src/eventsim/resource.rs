use super::simulation::{EventId, Scheduler};
use ordered_float::OrderedFloat;
use smallvec::SmallVec;
use std::collections::VecDeque;

/// Outcome of a blocking request.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Acquire {
    Granted,
    /// The owner is queued; the event fires when the holding is granted.
    Queued(EventId),
}

#[derive(Debug)]
struct Request<K> {
    since: OrderedFloat<f64>,
    owner: K,
    granted: EventId,
}

/// A resource shared by at most `capacity` owners at a time. Blocked
/// owners wait in a FIFO queue ordered by request time, ties broken by
/// owner.
#[derive(Debug)]
pub struct Resource<K> {
    capacity: usize,
    holders: SmallVec<[K; 2]>,
    queue: VecDeque<Request<K>>,
}

impl<K: Copy + Ord> Resource<K> {
    pub fn new(capacity: usize) -> Self {
        Resource {
            capacity,
            holders: SmallVec::new(),
            queue: VecDeque::new(),
        }
    }

    pub fn holders(&self) -> &[K] {
        &self.holders
    }

    pub fn count(&self) -> usize {
        self.holders.len()
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn is_held_by(&self, owner: K) -> bool {
        self.holders.contains(&owner)
    }

    /// Free, or already held by `owner`.
    pub fn is_available_for(&self, owner: K) -> bool {
        self.is_held_by(owner) || (self.queue.is_empty() && self.count() < self.capacity)
    }

    /// Takes a holding if it is available right now. Never queues.
    pub fn try_acquire(&mut self, owner: K) -> bool {
        if self.is_held_by(owner) {
            return true;
        }
        if !self.is_available_for(owner) {
            return false;
        }
        self.holders.push(owner);
        true
    }

    pub fn request(&mut self, scheduler: &mut Scheduler, owner: K) -> Acquire {
        if self.try_acquire(owner) {
            return Acquire::Granted;
        }
        if let Some(r) = self.queue.iter().find(|r| r.owner == owner) {
            return Acquire::Queued(r.granted);
        }
        let granted = scheduler.new_event();
        let since = scheduler.time;
        let pos = self.queue
            .iter()
            .position(|r| (since, owner) < (r.since, r.owner))
            .unwrap_or(self.queue.len());
        self.queue.insert(pos, Request { since, owner, granted });
        Acquire::Queued(granted)
    }

    /// Drops `owner`'s holding and hands freed capacity to the head of the
    /// queue. Returns the owners that were granted a holding.
    pub fn release(&mut self, scheduler: &mut Scheduler, owner: K) -> SmallVec<[K; 2]> {
        let mut granted = SmallVec::new();
        let before = self.holders.len();
        self.holders.retain(|h| *h != owner);
        if self.holders.len() == before {
            return granted;
        }
        while self.holders.len() < self.capacity {
            match self.queue.pop_front() {
                Some(r) => {
                    self.holders.push(r.owner);
                    scheduler.schedule(r.granted, 0.0);
                    granted.push(r.owner);
                }
                None => break,
            }
        }
        granted
    }
}
