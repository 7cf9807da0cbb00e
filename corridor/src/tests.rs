use crate::config::Config;
use crate::input::timetable::parse_timetable;
use crate::input::track::Track;
use crate::output::history::*;
use crate::railway::breakpoints::{BreakpointEntry, BreakpointTable, SectionBreakpoints};
use crate::railway::TrainStatus;
use crate::*;
use maplit::btreemap;
use std::collections::{BTreeMap, HashMap};

/// A - S1 - B - S2 - C, stations with two tracks, sections with one.
fn corridor() -> Track {
    get_track_string("route [A, S1, B, S2, C]
                      station A { capacity 2 }
                      section S1 { length 1000 }
                      station B { capacity 2 }
                      section S2 { length 1000 }
                      station C { capacity 2 }").unwrap()
}

/// Start 10 s (5 s moving), remaining 20 s to a stop (10 s running on),
/// both ways on every section.
fn flat_breakpoints(sections: &[&str]) -> BreakpointTable {
    let entry = BreakpointEntry {
        time_at_breakpoint_start0: 10.0,
        time_at_breakpoint_start_v: 5.0,
        remaining_time_stop0: 20.0,
        remaining_time_stop_v: 10.0,
    };
    let mut table = BreakpointTable::default();
    for s in sections {
        table.insert(s, SectionBreakpoints { forward: entry, backward: entry });
    }
    table
}

fn simulate(track: &Track, table: &BreakpointTable, timetable: &str) -> History {
    let timetable = parse_timetable(timetable).unwrap();
    evaluate_timetable(track, table, &timetable, &Config::default())
}

fn arrivals(h: &History) -> BTreeMap<String, f64> {
    h.trains.iter()
        .filter_map(|t| match t.outcome {
            Outcome::Arrived { time } => Some((t.name.clone(), time)),
            _ => None,
        })
        .collect()
}

fn events<'a>(h: &'a History, train: &str) -> &'a [TrainLogEvent] {
    &h.trains.iter().find(|t| t.name == train).unwrap().events
}

fn first_time(h: &History, train: &str, element: &str, event: ElementEvent) -> f64 {
    events(h, train).iter()
        .find(|e| e.element == element && e.event == event)
        .map(|e| e.time)
        .unwrap()
}

fn snapshot_at(h: &History, time: f64) -> &Snapshot {
    h.snapshots.iter().find(|s| s.time == time).unwrap()
}

fn assert_capacity_respected(track: &Track, h: &History) {
    for snap in &h.snapshots {
        let mut count: HashMap<&str, usize> = HashMap::new();
        for train in snap.trains.values() {
            for e in &train.reserved {
                *count.entry(e.as_str()).or_insert(0) += 1;
            }
        }
        for (e, n) in count {
            let cap = track.elements[track.lookup(e).unwrap()].capacity;
            assert!(n <= cap, "{} held by {} trains at t={}", e, n, snap.time);
        }
    }
}

/// Every element is first reserved no earlier than the one before it in
/// travel order.
fn assert_route_order(h: &History, train: &str, route: &[&str]) {
    let times: Vec<f64> = route.iter()
        .map(|e| first_time(h, train, e, ElementEvent::Reserved))
        .collect();
    for w in times.windows(2) {
        assert!(w[0] <= w[1], "{}: reservations out of order {:?}", train, times);
    }
}

#[test]
fn shared_single_track_is_taken_in_turn() {
    let track = corridor();
    let h = simulate(&track, &flat_breakpoints(&["S1", "S2"]), "
        train T1 oneway from A at 0 to C
        train T2 oneway from A at 5 to C
    ");

    assert_eq!(arrivals(&h), btreemap! {
        "T1".to_string() => 45.0,
        "T2".to_string() => 80.0,
    });
    assert!(first_time(&h, "T2", "S1", ElementEvent::Reserved)
            >= first_time(&h, "T1", "S1", ElementEvent::Released));
    assert!(first_time(&h, "T2", "S2", ElementEvent::Reserved)
            >= first_time(&h, "T1", "S2", ElementEvent::Released));
    assert_eq!(snapshot_at(&h, 10.0).trains["T2"].status, TrainStatus::Waiting);
    assert_capacity_respected(&track, &h);
    for t in &["T1", "T2"] {
        assert_route_order(&h, t, &["A", "S1", "B", "S2", "C"]);
    }
}

#[test]
fn lead_time_reserves_departure_early() {
    let track = corridor();
    let h = simulate(&track, &flat_breakpoints(&["S1", "S2"]),
                     "train L oneway from A at 100 lead 60 to C");

    assert_eq!(first_time(&h, "L", "A", ElementEvent::Reserved), 40.0);
    let before = &snapshot_at(&h, 39.0).trains["L"];
    assert_eq!(before.status, TrainStatus::Planned);
    assert_eq!(before.element, Some("A".to_string()));
    assert!(before.reserved.is_empty());
    for t in &[40.0, 50.0, 99.0] {
        let waiting = &snapshot_at(&h, *t).trains["L"];
        assert_eq!(waiting.status, TrainStatus::WaitingForDeparture);
        assert_eq!(waiting.reserved, vec!["A".to_string()]);
    }
    assert_eq!(snapshot_at(&h, 50.0).trains["L"].timing.as_ref().map(|s| s.as_str()),
               Some("departure in 60.0s"));
    assert_eq!(snapshot_at(&h, 101.0).trains["L"].status, TrainStatus::InTransit);
    assert_eq!(first_time(&h, "L", "S1", ElementEvent::Reserved), 100.0);
    assert_eq!(arrivals(&h)["L"], 145.0);
}

#[test]
fn return_train_comes_back() {
    let track = corridor();
    let h = simulate(&track, &flat_breakpoints(&["S1", "S2"]),
                     "train R return from A at 0 to C");

    assert_eq!(arrivals(&h)["R"], 90.0);
    let evs = events(&h, "R");
    let arrived: Vec<_> = evs.iter()
        .filter(|e| e.event == ElementEvent::Arrived)
        .map(|e| (e.element.as_str(), e.time))
        .collect();
    assert_eq!(arrived, vec![("C", 45.0), ("A", 90.0)]);

    // Five elements out, four back: the turnaround is not entered twice.
    let visits = evs.iter().filter(|e| e.event == ElementEvent::Entered).count();
    assert_eq!(visits, 2 * track.len() - 1);

    let reserved = evs.iter().filter(|e| e.event == ElementEvent::Reserved).count();
    let released = evs.iter().filter(|e| e.event == ElementEvent::Released).count();
    assert_eq!(reserved, released);

    let back = &snapshot_at(&h, 60.0).trains["R"];
    assert_eq!(back.direction, crate::railway::Direction::Backward);
    assert_eq!(back.element, Some("S2".to_string()));
    assert!(h.snapshots.last().unwrap().trains.is_empty());
}

#[test]
fn opposing_trains_pass_at_refuge() {
    let track = corridor();
    let h = simulate(&track, &flat_breakpoints(&["S1", "S2"]), "
        train EAST oneway from A at 0 to C
        train WEST oneway from C at 0 to A
    ");

    assert_eq!(arrivals(&h), btreemap! {
        "EAST".to_string() => 61.0,
        "WEST".to_string() => 60.0,
    });
    let meet = snapshot_at(&h, 20.0);
    assert_eq!(meet.trains["EAST"].reserved, vec!["S1".to_string(), "B".to_string()]);
    assert_eq!(meet.trains["WEST"].reserved, vec!["S2".to_string(), "B".to_string()]);
    assert_eq!(meet.trains["EAST"].timing.as_ref().map(|s| s.as_str()),
               Some("remaining_time_stop0 (forward): 20.0s for B (held at refuge)"));
    assert_eq!(meet.trains["WEST"].direction, crate::railway::Direction::Backward);
    assert_capacity_respected(&track, &h);
    assert_route_order(&h, "EAST", &["A", "S1", "B", "S2", "C"]);
    assert_route_order(&h, "WEST", &["C", "S2", "B", "S1", "A"]);
}

#[test]
fn failed_journeys_are_isolated() {
    let track = corridor();
    let h = simulate(&track, &flat_breakpoints(&["S1"]), "
        train GOOD oneway from A at 0 to B
        train NOWHERE oneway from A at 0 to X
        train NODATA oneway from A at 0 to C
    ");

    assert_eq!(arrivals(&h), btreemap! { "GOOD".to_string() => 30.0 });
    assert_eq!(h.failures.len(), 2);
    assert_eq!(h.failures[0].train, "NOWHERE");
    assert_eq!(h.failures[1].train, "NODATA");
    assert!(h.failures[1].message.contains("S2"));
    for name in &["NOWHERE", "NODATA"] {
        assert!(events(&h, name).is_empty());
        assert!(h.snapshots.iter().all(|s| !s.trains.contains_key(*name)));
    }
}

#[test]
fn sections_are_not_terminals() {
    let track = corridor();
    let h = simulate(&track, &flat_breakpoints(&["S1", "S2"]), "
        train X oneway from A at 0 to S2
        train Y oneway from S1 at 0 to C
        train Z oneway from A at 0 to C
    ");

    assert_eq!(arrivals(&h), btreemap! { "Z".to_string() => 45.0 });
    let failed: Vec<_> = h.failures.iter().map(|f| f.train.as_str()).collect();
    assert_eq!(failed, vec!["X", "Y"]);
    assert!(h.failures.iter().all(|f| f.message.contains("not a station")));
}

#[test]
fn blocked_train_waits_until_horizon() {
    let track = get_track_string("route [A, S1, B]
                                  station A { capacity 1 }
                                  section S1 { length 500 }
                                  station B { capacity 1 }").unwrap();
    let table = flat_breakpoints(&["S1"]);
    let timetable = parse_timetable("train T oneway from A at 10 lead 5 to B
                                     train U oneway from B at 10 lead 5 to A").unwrap();
    let config = Config { horizon: 100.0, ..Config::default() };
    let h = evaluate_timetable(&track, &table, &timetable, &config);

    // Each train holds its own station and needs the other's to leave.
    assert!(arrivals(&h).is_empty());
    assert!(h.trains.iter().all(|t| t.outcome == Outcome::Unfinished));
    let last = h.snapshots.last().unwrap();
    assert_eq!(last.time, 100.0);
    assert_eq!(last.trains["T"].status, TrainStatus::Waiting);
    assert_eq!(h.snapshots.len(), 101);
}

#[test]
fn end_to_end_from_text() {
    let track = get_track_string("
        route [A, S1, B, S2, C]
        station A { capacity 2 }
        section S1 { length 1500 }
        station B { length 400 capacity 2 }
        section S2 { length 1200 }
        station C { capacity 2 }").unwrap();
    let speeds = get_speeds_string("section S1 [(1000, 80), (500, 60)]
                                    section S2 [(1200, 80)]", &track).unwrap();
    let config = Config::default();
    let profiles = generate_profiles(&track, &speeds, &config).unwrap();
    let (table, _) = extract_breakpoints(&profiles, &config);
    assert_eq!(table.len(), 2);

    let timetable = parse_timetable("
        train IC1 oneway from A at 0 to C stop B 30
        train IC2 oneway from C at 0 to A
        train R1 return from A at 120 lead 60 to C
    ").unwrap();
    let h = evaluate_timetable(&track, &table, &timetable, &config);

    let arrived = arrivals(&h);
    assert_eq!(arrived.len(), 3, "{:?}", h.trains);
    assert!(arrived["IC1"] > 30.0);
    assert!(h.failures.is_empty());
    assert_capacity_respected(&track, &h);
    assert_route_order(&h, "IC1", &["A", "S1", "B", "S2", "C"]);
    assert_route_order(&h, "IC2", &["C", "S2", "B", "S1", "A"]);

    assert_eq!(h.snapshots[0].time, 0.0);
    for w in h.snapshots.windows(2) {
        assert!((w[1].time - w[0].time - 1.0).abs() < 1e-6);
    }
    assert!(h.snapshots.last().unwrap().trains.is_empty());

    let visits = output::history::visits(&h).unwrap();
    assert!(visits.lines().any(|l| l.starts_with("IC1 ") && l.ends_with(" B")));
}
