use super::corridor::Corridor;
use super::Sim;
use crate::config::Config;
use crate::eventsim::{Process, ProcessState};
use smallvec::SmallVec;

/// Takes a snapshot of all live trains at a fixed interval, starting at
/// the time it is started. Stops at the horizon or when no train is left.
pub struct Sampler {
    interval: f64,
    horizon: f64,
}

impl Sampler {
    pub fn new(config: &Config) -> Sampler {
        Sampler {
            interval: if config.snapshot_interval > 0.0 { config.snapshot_interval } else { 1.0 },
            horizon: config.horizon,
        }
    }
}

impl<'a> Process<Corridor<'a>> for Sampler {
    fn resume(&mut self, sim: &mut Sim<'a>) -> ProcessState {
        let now = sim.time();
        sim.world.snapshot(now);
        if !sim.world.is_live() || now + self.interval > self.horizon + 1e-9 {
            return ProcessState::Finished;
        }
        ProcessState::Wait(SmallVec::from_slice(&[sim.create_timeout(self.interval)]))
    }
}
