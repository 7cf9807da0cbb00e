use crate::input::speeds::SpeedSegment;
use log::warn;
use serde::Serialize;
use smallvec::SmallVec;

const MIN_TIME_STEP: f64 = 1e-3;
const MAX_STEPS: usize = 5_000_000;

#[derive(Copy, Clone, Debug)]
pub struct TrainParams {
    pub max_acc: f64,
    pub max_brk: f64,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverAction {
    Accelerate,
    Brake,
    Coast,
}

#[derive(Copy, Clone, Debug, Serialize)]
pub struct Sample {
    pub time: f64,
    pub position: f64,
    pub velocity: f64,
    pub acceleration: f64,
    pub action: DriverAction,
}

/// Where the train must already be braking to reach `v_exit` at `end`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BrakingZone {
    pub start: f64,
    pub end: f64,
    pub v_entry: f64,
    pub v_exit: f64,
}

/// Time series of a train running through one section. Never mutated
/// after generation.
#[derive(Clone, Debug)]
pub struct KinematicProfile {
    samples: Vec<Sample>,
}

impl KinematicProfile {
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn total_time(&self) -> f64 {
        self.samples.last().map(|s| s.time).unwrap_or(0.0)
    }

    pub fn final_velocity(&self) -> f64 {
        self.samples.last().map(|s| s.velocity).unwrap_or(0.0)
    }

    pub fn distance(&self) -> f64 {
        self.samples.last().map(|s| s.position).unwrap_or(0.0)
    }
}

#[derive(Debug, Fail)]
pub enum ProfileError {
    #[fail(display = "no speed segments")]
    NoSegments,
    #[fail(display = "acceleration and braking must be positive (a={}, b={})", _0, _1)]
    BadParams(f64, f64),
}

/// Braking distance from `v_from` down to `v_to`.
pub fn braking_distance(v_from: f64, v_to: f64, brk: f64) -> f64 {
    (v_from * v_from - v_to * v_to) / (2.0 * brk)
}

/// Braking zones of a section, computed backward from its end: the final
/// stop (if requested) first, then every drop in target speed.
pub fn braking_zones(segments: &[SpeedSegment], brk: f64, stop_at_end: bool)
                     -> SmallVec<[BrakingZone; 4]> {
    let total: f64 = segments.iter().map(|s| s.length).sum();
    let mut zones = SmallVec::new();
    if segments.is_empty() {
        return zones;
    }

    if stop_at_end {
        // The zone is sized by the speed of the segment it starts in.
        let mut pos = total;
        let mut zone = None;
        for seg in segments.iter().rev() {
            let s = braking_distance(seg.velocity, 0.0, brk);
            pos -= seg.length;
            if total - s >= pos {
                zone = Some(BrakingZone { start: total - s, end: total, v_entry: seg.velocity, v_exit: 0.0 });
                break;
            }
        }
        let zone = zone.unwrap_or_else(|| {
            let v = segments[0].velocity;
            BrakingZone { start: 0.0, end: total, v_entry: v, v_exit: 0.0 }
        });
        zones.push(zone);
    }

    let mut position = total;
    for i in (0..segments.len().saturating_sub(1)).rev() {
        let v_curr = segments[i].velocity;
        let v_next = segments[i + 1].velocity;
        position -= segments[i + 1].length;
        if v_curr > v_next {
            let start = position - braking_distance(v_curr, v_next, brk);
            if start >= 0.0 {
                zones.push(BrakingZone { start, end: position, v_entry: v_curr, v_exit: v_next });
            }
        }
    }

    zones
}

/// Integrates a train through a section in fixed time steps.
///
/// Each step accelerates or brakes toward the segment's target speed,
/// capped by the speed reachable before the next segment boundary, and is
/// then held under the braking curve of every zone ahead, measured where
/// the step ends. Deceleration never exceeds the braking rate unless the
/// section is too short to stop in. The recorded sample holds the position before the
/// step and the velocity after the update. A final sample is pinned to
/// the section end, at standstill when `stop_at_end` is set.
pub fn generate_profile(segments: &[SpeedSegment],
                        params: &TrainParams,
                        dt: f64,
                        start_velocity: f64,
                        stop_at_end: bool)
                        -> Result<KinematicProfile, ProfileError> {
    if segments.is_empty() {
        return Err(ProfileError::NoSegments);
    }
    if !(params.max_acc > 0.0) || !(params.max_brk > 0.0) {
        return Err(ProfileError::BadParams(params.max_acc, params.max_brk));
    }
    let dt = if dt > MIN_TIME_STEP { dt } else { MIN_TIME_STEP };
    let (acc, brk) = (params.max_acc, params.max_brk);

    let total: f64 = segments.iter().map(|s| s.length).sum();
    let mut bounds: SmallVec<[(f64, f64); 8]> = SmallVec::new();
    let mut cum = 0.0;
    for s in segments {
        cum += s.length;
        bounds.push((cum, s.velocity));
    }
    let last_velocity = segments[segments.len() - 1].velocity;
    let zones = braking_zones(segments, brk, stop_at_end);

    let mut x = 0.0;
    let mut t = 0.0;
    let mut v = start_velocity.max(0.0);
    let mut v_prev = v;
    let mut samples = vec![Sample {
        time: t,
        position: x,
        velocity: v,
        acceleration: 0.0,
        action: DriverAction::Coast,
    }];

    let mut steps = 0;
    while x <= total {
        if steps >= MAX_STEPS {
            warn!("Profile integration stopped after {} steps at {:.1} m of {:.1} m", steps, x, total);
            break;
        }
        if v <= 0.0 && x >= total {
            break;
        }
        // Close enough to the stop that one more braking step ends it.
        if stop_at_end && x > 0.0 && v <= brk * dt && total - x <= brk * dt * dt {
            break;
        }
        steps += 1;

        // Speed limit of the current segment and the room left before
        // its end boundary.
        let (available, v_limit) = bounds.iter()
            .find(|(end, _)| *end > x)
            .map(|&(end, v)| (end - x, v))
            .unwrap_or((total - x, last_velocity));
        let reachable = (v * v + 2.0 * acc * available).sqrt();
        let target = reachable.min(v_limit);

        let mut next = v;
        if v < target {
            next = (v + acc * dt).min(target);
        } else if v > target {
            next = (v - brk * dt).max(target);
        }

        // The step moves the train by `next * dt`; the speed must still be
        // on or under every braking curve where the step ends.
        let curve = zones.iter()
            .filter(|z| x <= z.end)
            .map(|z| curve_after_step(z, z.end - x, brk, dt))
            .fold(f64::INFINITY, f64::min);
        if next > curve {
            next = curve.max(v - brk * dt).max(0.0);
        }
        v = next;

        let a = if t > 0.0 { (v - v_prev) / dt } else { 0.0 };
        samples.push(Sample { time: t, position: x, velocity: v, acceleration: a, action: action(v - v_prev) });
        v_prev = v;
        x += v * dt;
        t += dt;
    }

    let last = samples[samples.len() - 1];
    if last.position < total || (stop_at_end && last.velocity > 0.0) {
        let v_final = if stop_at_end { 0.0 } else { last.velocity };
        let time = (t / dt).round() * dt;
        samples.push(Sample {
            time: if time < last.time { last.time } else { time },
            position: total,
            velocity: v_final,
            acceleration: (v_final - last.velocity) / dt,
            action: action(v_final - last.velocity),
        });
    }

    Ok(KinematicProfile { samples })
}

/// Highest speed `u` for which a step of `u * dt` from `s_rest` before the
/// zone end stays on its braking curve: `u² = v_exit² + 2b(s_rest − u·dt)`.
fn curve_after_step(zone: &BrakingZone, s_rest: f64, brk: f64, dt: f64) -> f64 {
    let bdt = brk * dt;
    let rhs = zone.v_exit * zone.v_exit + 2.0 * brk * s_rest.max(0.0);
    -bdt + (bdt * bdt + rhs).sqrt()
}

fn action(dv: f64) -> DriverAction {
    if dv > 1e-9 {
        DriverAction::Accelerate
    } else if dv < -1e-9 {
        DriverAction::Brake
    } else {
        DriverAction::Coast
    }
}
