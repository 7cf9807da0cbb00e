use super::dynamics::KinematicProfile;
use super::profiles::{BoundaryCondition, End, ProfileSet, SectionProfiles, Start};
use super::Direction;
use crate::config::Config;
use log::{info, warn};
use serde::Serialize;
use std::collections::BTreeMap;

/// Timing constants of one section traversed in one direction.
///
/// `start*` is the time from entering the section until the breakpoint,
/// `remaining*` the time from the breakpoint until leaving it. The `0`
/// variants assume a standstill at the respective end, the `V` variants
/// a train running through.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize)]
pub struct BreakpointEntry {
    pub time_at_breakpoint_start0: f64,
    #[serde(rename = "time_at_breakpoint_startV")]
    pub time_at_breakpoint_start_v: f64,
    pub remaining_time_stop0: f64,
    #[serde(rename = "remaining_time_stopV")]
    pub remaining_time_stop_v: f64,
}

impl BreakpointEntry {
    pub fn start(&self, stopped: bool) -> f64 {
        if stopped { self.time_at_breakpoint_start0 } else { self.time_at_breakpoint_start_v }
    }

    pub fn remaining(&self, stop: bool) -> f64 {
        if stop { self.remaining_time_stop0 } else { self.remaining_time_stop_v }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize)]
pub struct SectionBreakpoints {
    pub forward: BreakpointEntry,
    pub backward: BreakpointEntry,
}

#[derive(Clone, Debug, Default, Serialize)]
#[serde(transparent)]
pub struct BreakpointTable {
    sections: BTreeMap<String, SectionBreakpoints>,
}

impl BreakpointTable {
    pub fn insert(&mut self, section: &str, bp: SectionBreakpoints) {
        self.sections.insert(section.to_string(), bp);
    }

    pub fn get(&self, section: &str, dir: Direction) -> Option<&BreakpointEntry> {
        self.sections.get(section).map(|s| match dir {
            Direction::Forward => &s.forward,
            Direction::Backward => &s.backward,
        })
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct CrossCheckMismatch {
    pub section: String,
    pub quantity: &'static str,
    pub forward: f64,
    pub backward: f64,
}

/// Start time of the last braking phase: the last sample whose
/// deceleration exceeds the tolerance while the one before did not.
pub fn last_deceleration_onset(profile: &KinematicProfile, tol: f64) -> Option<f64> {
    let s = profile.samples();
    (1..s.len()).rev()
        .find(|&i| s[i].acceleration < -tol && s[i - 1].acceleration >= -tol)
        .map(|i| s[i].time)
}

/// Time at which the first acceleration phase is over.
pub fn first_acceleration_end(profile: &KinematicProfile, tol: f64) -> Option<f64> {
    let s = profile.samples();
    (1..s.len())
        .find(|&i| s[i - 1].acceleration > tol && s[i].acceleration <= tol)
        .map(|i| s[i].time)
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn clamp(x: f64, total: f64) -> f64 {
    round2(x).max(0.0).min(round2(total))
}

struct Totals {
    t00: f64,
    t0v: f64,
    tv0: f64,
}

fn totals(p: &SectionProfiles) -> Totals {
    let total = |start, end| p.get(BoundaryCondition { start, end }).total_time();
    Totals {
        t00: total(Start::Standing, End::Stop),
        t0v: total(Start::Standing, End::Pass),
        tv0: total(Start::Moving, End::Stop),
    }
}

/// Forward entry from the braking onset of the standing-start stopping
/// run. The moving-start breakpoint is that onset shifted by the
/// difference in total duration between the standing and moving runs,
/// an approximation rather than a scan of the moving run.
fn forward_entry(p: &SectionProfiles, t: &Totals, tol: f64) -> BreakpointEntry {
    let standing_stop = p.get(BoundaryCondition { start: Start::Standing, end: End::Stop });
    let start0 = last_deceleration_onset(standing_stop, tol).unwrap_or(t.t00);
    BreakpointEntry {
        time_at_breakpoint_start0: clamp(start0, t.t00),
        remaining_time_stop0: clamp(t.t00 - start0, t.t00),
        time_at_breakpoint_start_v: clamp(start0 - (t.t00 - t.tv0), t.tv0),
        remaining_time_stop_v: clamp(t.t0v - start0, t.t0v),
    }
}

/// Backward entry from the end of the first acceleration phase, which
/// becomes the final braking phase when the run is mirrored.
fn backward_entry(p: &SectionProfiles, t: &Totals, tol: f64) -> BreakpointEntry {
    let standing_stop = p.get(BoundaryCondition { start: Start::Standing, end: End::Stop });
    let e = first_acceleration_end(standing_stop, tol).unwrap_or(t.t00);
    BreakpointEntry {
        time_at_breakpoint_start0: clamp(t.t00 - e, t.t00),
        remaining_time_stop0: clamp(e, t.t00),
        time_at_breakpoint_start_v: clamp(t.t0v - e, t.tv0),
        remaining_time_stop_v: clamp(e - (t.t00 - t.tv0), t.t0v),
    }
}

pub fn extract(profiles: &ProfileSet, config: &Config) -> (BreakpointTable, Vec<CrossCheckMismatch>) {
    let mut table = BreakpointTable::default();
    let mut mismatches = Vec::new();

    for p in &profiles.sections {
        let t = totals(p);
        let forward = forward_entry(p, &t, config.accel_tolerance);
        let backward = backward_entry(p, &t, config.accel_tolerance);

        let checks = [
            ("stop0",
             forward.time_at_breakpoint_start0 + forward.remaining_time_stop0,
             backward.time_at_breakpoint_start0 + backward.remaining_time_stop0),
            ("stopV",
             forward.time_at_breakpoint_start_v + forward.remaining_time_stop_v,
             backward.time_at_breakpoint_start_v + backward.remaining_time_stop_v),
        ];
        for &(quantity, f, b) in checks.iter() {
            if (f - b).abs() > config.crosscheck_tolerance {
                warn!("Breakpoint cross-check for {} ({}): forward {:.2}s, backward {:.2}s",
                      p.name, quantity, f, b);
                mismatches.push(CrossCheckMismatch {
                    section: p.name.clone(),
                    quantity,
                    forward: f,
                    backward: b,
                });
            }
        }

        table.insert(&p.name, SectionBreakpoints { forward, backward });
    }

    info!("Extracted breakpoints for {} sections ({} cross-check warnings)",
          table.len(), mismatches.len());
    (table, mismatches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::speeds::SpeedTable;
    use crate::input::speeds::SpeedSegment;
    use crate::input::track::{Element, ElementKind, Track};
    use crate::railway::profiles;
    use std::collections::HashMap;

    fn single_section(segments: Vec<SpeedSegment>) -> ProfileSet {
        let length = segments.iter().map(|s| s.length).sum();
        let track = Track::new(vec![
            Element { name: "A".to_string(), kind: ElementKind::Station, length: 0.0, capacity: 2 },
            Element { name: "S".to_string(), kind: ElementKind::Section, length, capacity: 1 },
            Element { name: "B".to_string(), kind: ElementKind::Station, length: 0.0, capacity: 2 },
        ]).unwrap();
        let mut map = HashMap::new();
        map.insert(1, segments);
        let speeds = SpeedTable::new(&track, map).unwrap();
        profiles::generate(&track, &speeds, &Config::default()).unwrap()
    }

    #[test]
    fn test_breakpoints_within_bounds() {
        let set = single_section(vec![SpeedSegment { length: 600.0, velocity: 80.0 / 3.6 },
                                      SpeedSegment { length: 400.0, velocity: 40.0 / 3.6 }]);
        let (table, mismatches) = extract(&set, &Config::default());
        assert!(mismatches.is_empty());
        let t = totals(&set.sections[0]);
        for dir in [Direction::Forward, Direction::Backward].iter() {
            let e = table.get("S", *dir).unwrap();
            assert!(e.time_at_breakpoint_start0 >= 0.0 && e.time_at_breakpoint_start0 <= t.t00);
            assert!(e.time_at_breakpoint_start_v >= 0.0 && e.time_at_breakpoint_start_v <= t.tv0);
            assert!(e.remaining_time_stop0 >= 0.0);
            assert!(e.remaining_time_stop_v >= 0.0);
            assert!((e.time_at_breakpoint_start0 + e.remaining_time_stop0 - t.t00).abs() < 0.02);
        }
        assert!(table.get("A", Direction::Forward).is_none());
    }

    #[test]
    fn test_forward_breakpoint_is_final_braking_onset() {
        let set = single_section(vec![SpeedSegment { length: 1000.0, velocity: 20.0 }]);
        let (table, _) = extract(&set, &Config::default());
        let fwd = table.get("S", Direction::Forward).unwrap();
        let stop = set.sections[0].get(BoundaryCondition { start: Start::Standing, end: End::Stop });
        // Braking from 20 m/s at 0.9 m/s² takes about 22.2 s.
        assert!((fwd.remaining_time_stop0 - 20.0 / 0.9).abs() < 0.5,
                "remaining {} of {}", fwd.remaining_time_stop0, stop.total_time());
        // The mirrored run brakes as long as the forward run accelerates.
        let bwd = table.get("S", Direction::Backward).unwrap();
        assert!((bwd.remaining_time_stop0 - 20.0 / 0.9).abs() < 0.5);
    }

    #[test]
    fn test_onset_helpers() {
        let set = single_section(vec![SpeedSegment { length: 1000.0, velocity: 20.0 }]);
        let p = set.sections[0].get(BoundaryCondition { start: Start::Moving, end: End::Pass });
        // Coasting all the way: no phases at all.
        assert_eq!(last_deceleration_onset(p, 0.01), None);
        assert_eq!(first_acceleration_end(p, 0.01), None);
    }

    #[test]
    fn test_serialized_field_names() {
        let mut table = BreakpointTable::default();
        table.insert("S1", SectionBreakpoints::default());
        let json = serde_json::to_value(&table).unwrap();
        let fwd = &json["S1"]["forward"];
        assert!(fwd.get("time_at_breakpoint_start0").is_some());
        assert!(fwd.get("time_at_breakpoint_startV").is_some());
        assert!(fwd.get("remaining_time_stop0").is_some());
        assert!(fwd.get("remaining_time_stopV").is_some());
    }
}
