use crate::railway::dynamics::TrainParams;

/// Tunable constants of the pipeline. The command line fills this in;
/// library callers can start from `Config::default()`.
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum acceleration, m/s².
    pub max_acc: f64,
    /// Maximum braking deceleration, m/s².
    pub max_brk: f64,
    /// Integration step of the kinematic profiles, s.
    pub time_step: f64,
    /// Accelerations below this magnitude count as constant speed when
    /// looking for braking and acceleration phases.
    pub accel_tolerance: f64,
    /// Allowed difference between derived breakpoint times and the
    /// profile's own braking onset before a warning is logged.
    pub crosscheck_tolerance: f64,
    pub snapshot_interval: f64,
    pub retry_interval: f64,
    /// Snapshots stop at this time even if trains are still running.
    pub horizon: f64,
    pub startv_continuity_tolerance: f64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_acc: 0.9,
            max_brk: 0.9,
            time_step: 0.1,
            accel_tolerance: 0.01,
            crosscheck_tolerance: 0.1,
            snapshot_interval: 1.0,
            retry_interval: 1.0,
            horizon: 3600.0,
            startv_continuity_tolerance: 0.1,
        }
    }
}

impl Config {
    pub fn train_params(&self) -> TrainParams {
        TrainParams {
            max_acc: self.max_acc,
            max_brk: self.max_brk,
        }
    }
}
