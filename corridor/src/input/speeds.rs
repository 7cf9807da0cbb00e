use super::parser_utils::*;
use super::track::{ElementIdx, Track};
use super::IngestError;
use log::debug;
use std::collections::HashMap;

const LENGTH_TOLERANCE: f64 = 1e-6;

/// A stretch of a section with a constant target speed (m/s).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SpeedSegment {
    pub length: f64,
    pub velocity: f64,
}

/// Raw speed file contents, lengths in metres and speeds in km/h.
#[derive(Debug, Clone)]
pub enum SpeedInput {
    RouteWide(Vec<(f64, f64)>),
    PerSection(Vec<(String, Vec<(f64, f64)>)>),
}

/// Ordered speed segments for every section of a track.
#[derive(Debug, Clone, Default)]
pub struct SpeedTable {
    sections: HashMap<ElementIdx, Vec<SpeedSegment>>,
}

impl SpeedTable {
    pub fn segments(&self, section: ElementIdx) -> Option<&[SpeedSegment]> {
        self.sections.get(&section).map(|s| s.as_slice())
    }

    /// Builds the table from per-section segments, checking that every
    /// section of the track is covered and that each section's segments
    /// add up to its length.
    pub fn new(track: &Track, sections: HashMap<ElementIdx, Vec<SpeedSegment>>)
               -> Result<SpeedTable, IngestError> {
        for (idx, e) in track.sections() {
            let segs = sections.get(&idx)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| IngestError::MissingSpeeds(e.name.clone()))?;
            let actual: f64 = segs.iter().map(|s| s.length).sum();
            if (actual - e.length).abs() > LENGTH_TOLERANCE {
                return Err(IngestError::LengthMismatch {
                    section: e.name.clone(),
                    expected: e.length,
                    actual,
                });
            }
        }
        for idx in sections.keys() {
            if !track.elements.get(*idx).map(|e| e.is_section()).unwrap_or(false) {
                return Err(IngestError::NotASection(format!("#{}", idx)));
            }
        }
        Ok(SpeedTable { sections })
    }
}

/// Parses the speed file format, either one route-wide profile
///
/// ```text
/// profile [ (600, 80), (1400, 40) ]
/// ```
///
/// or one table per section
///
/// ```text
/// section S1 [ (600, 80), (400, 40) ]
/// ```
pub fn parse(t: &[Token]) -> Result<Vec<(Option<String>, Vec<(f64, f64)>)>, ParseError> {
    let mut i = 0;
    let mut stmts = Vec::new();
    while t[i] != Token::EOF {
        let stmt: (Option<String>, Vec<(f64, f64)>) = alt(&mut i, t,&[&|i, t| {
                                      symbol(i, t, "profile")?;
                                      Ok((None, list(i, t, number_pair)?))
                                  },
                                  &|i, t| {
                                      symbol(i, t, "section")?;
                                      let name = identifier(i, t)?;
                                      Ok((Some(name), list(i, t, number_pair)?))
                                  }])?;
        stmts.push(stmt);
    }
    Ok(stmts)
}

pub fn input_from_ast(stmts: Vec<(Option<String>, Vec<(f64, f64)>)>) -> Result<SpeedInput, IngestError> {
    let route_wide = stmts.iter().filter(|(n, _)| n.is_none()).count();
    if route_wide > 1 || (route_wide == 1 && stmts.len() > 1) {
        return Err(IngestError::MixedSpeedForms);
    }
    let mut stmts = stmts;
    if route_wide == 1 {
        let (_, segs) = stmts.remove(0);
        return Ok(SpeedInput::RouteWide(segs));
    }
    Ok(SpeedInput::PerSection(stmts.into_iter()
        .filter_map(|(n, segs)| n.map(|n| (n, segs)))
        .collect()))
}

fn segment(owner: &str, (length, kmh): (f64, f64)) -> Result<SpeedSegment, IngestError> {
    if !(length > 0.0) || !(kmh > 0.0) {
        return Err(IngestError::BadSegment(owner.to_string(), length, kmh));
    }
    Ok(SpeedSegment { length, velocity: kmh / 3.6 })
}

pub fn speed_table(track: &Track, input: &SpeedInput) -> Result<SpeedTable, IngestError> {
    match *input {
        SpeedInput::RouteWide(ref segs) => {
            let segs = segs.iter()
                .map(|s| segment("profile", *s))
                .collect::<Result<Vec<_>, _>>()?;
            let sections = split_route_wide(track, &segs)?;
            SpeedTable::new(track, sections)
        }
        SpeedInput::PerSection(ref tables) => {
            let mut sections = HashMap::new();
            for (name, segs) in tables {
                let idx = track.lookup(name)
                    .filter(|i| track.elements[*i].is_section())
                    .ok_or_else(|| IngestError::NotASection(name.clone()))?;
                let segs = segs.iter()
                    .map(|s| segment(name, *s))
                    .collect::<Result<Vec<_>, _>>()?;
                if sections.insert(idx, segs).is_some() {
                    return Err(IngestError::Duplicate(name.clone()));
                }
            }
            SpeedTable::new(track, sections)
        }
    }
}

/// Cuts a route-wide profile at section boundaries. A segment that
/// straddles a boundary is split in two with the same speed.
fn split_route_wide(track: &Track, profile: &[SpeedSegment])
                    -> Result<HashMap<ElementIdx, Vec<SpeedSegment>>, IngestError> {
    let infra_total = track.total_section_length();
    let profile_total: f64 = profile.iter().map(|s| s.length).sum();
    if (infra_total - profile_total).abs() > LENGTH_TOLERANCE {
        return Err(IngestError::LengthMismatch {
            section: "route".to_string(),
            expected: infra_total,
            actual: profile_total,
        });
    }

    let mut sections = HashMap::new();
    let mut v_index = 0;
    let mut used_in_current = 0.0;
    for (idx, e) in track.sections() {
        let mut segs = Vec::new();
        let mut to_cover = e.length;
        while to_cover > LENGTH_TOLERANCE && v_index < profile.len() {
            let current = profile[v_index];
            let available = current.length - used_in_current;
            if available > to_cover + LENGTH_TOLERANCE {
                segs.push(SpeedSegment { length: to_cover, velocity: current.velocity });
                used_in_current += to_cover;
                to_cover = 0.0;
            } else {
                segs.push(SpeedSegment { length: available, velocity: current.velocity });
                to_cover -= available;
                v_index += 1;
                used_in_current = 0.0;
            }
        }
        debug!("Section {}: {} m in {} speed segment(s)", e.name, e.length, segs.len());
        sections.insert(idx, segs);
    }
    Ok(sections)
}
