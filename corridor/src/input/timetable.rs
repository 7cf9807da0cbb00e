use regex::Regex;
use std::collections::HashSet;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Behaviour {
    Oneway,
    /// Runs to the arrival station and back again.
    Return,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TrainSpec {
    pub name: String,
    pub behaviour: Behaviour,
    pub from: String,
    pub departure: f64,
    /// Seconds before departure at which the departure element is taken.
    pub lead: Option<f64>,
    pub to: String,
    pub stops: Vec<(String, f64)>,
}

impl TrainSpec {
    pub fn dwell(&self, station: &str) -> Option<f64> {
        self.stops.iter().find(|(s, _)| s == station).map(|(_, d)| *d)
    }
}

#[derive(Clone, Debug, Default)]
pub struct Timetable {
    pub trains: Vec<TrainSpec>,
}

#[derive(Debug, Fail)]
pub enum TimetableError {
    #[fail(display = "error in regular expression: {}", _0)]
    RegexError(String),
    #[fail(display = "error converting number {:?}", _0)]
    NumberError(String),
    #[fail(display = "unrecognized timetable line: {}", _0)]
    Unrecognized(String),
    #[fail(display = "train {:?} is defined more than once", _0)]
    DuplicateTrain(String),
}

fn num(s: &str) -> Result<f64, TimetableError> {
    s.parse::<f64>().map_err(|_e| TimetableError::NumberError(s.to_string()))
}

/// Parses the timetable format, one train per line:
///
/// * train IC1 oneway from A at 0 to C stop B 30
/// * train R7 return from C at 120 lead 60 to A
///
/// Blank lines and lines starting with `#` are skipped.
pub fn parse_timetable(input: &str) -> Result<Timetable, TimetableError> {
    let mut trains: Vec<TrainSpec> = Vec::new();
    let mut names = HashSet::new();
    let skip_re = Regex::new(r"^\s*(#.*)?$")
        .map_err(|e| TimetableError::RegexError(format!("{:?}", e)))?;
    let train_re = Regex::new(r"(?x) ^ \s* train \s+ (?P<name>\w+) \s+
            (?P<behaviour>oneway|return) \s+
            from \s+ (?P<from>\w+) \s+
            at \s+ (?P<time>[\d\.]+) \s+
            (?: lead \s+ (?P<lead>[\d\.]+) \s+ )?
            to \s+ (?P<to>\w+)
            (?P<stops> (?: \s+ stop \s+ \w+ \s+ [\d\.]+ )* )
            \s* $").map_err(|e| TimetableError::RegexError(format!("{:?}", e)))?;
    let stop_re = Regex::new(r"stop\s+(?P<station>\w+)\s+(?P<dwell>[\d\.]+)")
        .map_err(|e| TimetableError::RegexError(format!("{:?}", e)))?;

    for line in input.lines() {
        if skip_re.is_match(line) {
            continue;
        }
        let groups = train_re.captures(line)
            .ok_or_else(|| TimetableError::Unrecognized(line.to_string()))?;
        let name = groups["name"].to_string();
        if !names.insert(name.clone()) {
            return Err(TimetableError::DuplicateTrain(name));
        }
        let behaviour = match &groups["behaviour"] {
            "return" => Behaviour::Return,
            _ => Behaviour::Oneway,
        };
        let lead = match groups.name("lead") {
            Some(m) => Some(num(m.as_str())?),
            None => None,
        };
        let mut stops = Vec::new();
        for stop in stop_re.captures_iter(&groups["stops"]) {
            stops.push((stop["station"].to_string(), num(&stop["dwell"])?));
        }
        trains.push(TrainSpec {
            name,
            behaviour,
            from: groups["from"].to_string(),
            departure: num(&groups["time"])?,
            lead,
            to: groups["to"].to_string(),
            stops,
        });
    }

    Ok(Timetable { trains })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timetable() {
        let tt = parse_timetable("
            # morning service
            train IC1 oneway from A at 0 to C stop B 30
            train R7 return from C at 120.5 lead 60 to A stop B 20 stop A 10
        ").unwrap();
        assert_eq!(tt.trains.len(), 2);
        assert_eq!(tt.trains[0],
                   TrainSpec {
                       name: "IC1".to_string(),
                       behaviour: Behaviour::Oneway,
                       from: "A".to_string(),
                       departure: 0.0,
                       lead: None,
                       to: "C".to_string(),
                       stops: vec![("B".to_string(), 30.0)],
                   });
        let r7 = &tt.trains[1];
        assert_eq!(r7.behaviour, Behaviour::Return);
        assert_eq!(r7.departure, 120.5);
        assert_eq!(r7.lead, Some(60.0));
        assert_eq!(r7.dwell("A"), Some(10.0));
        assert_eq!(r7.dwell("B"), Some(20.0));
        assert_eq!(r7.dwell("C"), None);
    }

    #[test]
    fn test_unrecognized() {
        match parse_timetable("train X sideways from A at 0 to B") {
            Err(TimetableError::Unrecognized(_)) => {}
            x => panic!("unexpected {:?}", x),
        }
    }

    #[test]
    fn test_duplicate() {
        match parse_timetable("train X oneway from A at 0 to B\ntrain X oneway from B at 5 to A") {
            Err(TimetableError::DuplicateTrain(n)) => assert_eq!(n, "X"),
            x => panic!("unexpected {:?}", x),
        }
    }

    #[test]
    fn test_bad_number() {
        match parse_timetable("train X oneway from A at 1.2.3 to B") {
            Err(TimetableError::NumberError(n)) => assert_eq!(n, "1.2.3"),
            x => panic!("unexpected {:?}", x),
        }
    }
}
