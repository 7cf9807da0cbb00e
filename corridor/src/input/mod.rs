//! Track layout, speed profile and timetable ingestion.

pub mod parser_utils;
pub mod track;
pub mod speeds;
pub mod timetable;

#[derive(Debug, Fail)]
pub enum IngestError {
    #[fail(display = "element {:?} is used on the route but never defined", _0)]
    Undefined(String),
    #[fail(display = "element {:?} is defined but not on the route", _0)]
    NotOnRoute(String),
    #[fail(display = "element {:?} is defined more than once", _0)]
    Duplicate(String),
    #[fail(display = "element {:?} has capacity 0", _0)]
    ZeroCapacity(String),
    #[fail(display = "element {:?} has non-positive length {}", _0, _1)]
    BadLength(String, f64),
    #[fail(display = "route needs at least two elements, got {}", _0)]
    RouteTooShort(usize),
    #[fail(display = "no route statement in track file")]
    NoRoute,
    #[fail(display = "{:?} is not a section on the route", _0)]
    NotASection(String),
    #[fail(display = "section {:?} has no speed segments", _0)]
    MissingSpeeds(String),
    #[fail(display = "bad speed segment in {:?}: length {} m, speed {} km/h", _0, _1, _2)]
    BadSegment(String, f64, f64),
    #[fail(display = "speed segments of {:?} sum to {} m, expected {} m", section, actual, expected)]
    LengthMismatch { section: String, expected: f64, actual: f64 },
    #[fail(display = "speed file mixes a route-wide profile with per-section tables")]
    MixedSpeedForms,
}
