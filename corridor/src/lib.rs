#[macro_use] extern crate failure_derive;

pub mod config;
pub mod input;
pub mod output;
pub mod eventsim;
pub mod railway;

#[cfg(test)]
mod tests;

use log::{error, info};
use std::path::Path;

use config::Config;
use input::speeds::SpeedTable;
use input::timetable::Timetable;
use input::track::Track;
use output::history::History;
use railway::breakpoints::{BreakpointTable, CrossCheckMismatch};
use railway::corridor::Corridor;
use railway::journey::{Journey, Plan};
use railway::profiles::ProfileSet;
use railway::sampler::Sampler;

pub type AppResult<T> = Result<T, failure::Error>;

pub fn read_file(f: &Path) -> AppResult<String> {
    use std::fs::File;
    use std::io::prelude::*;
    use std::io::BufReader;

    let file = File::open(f)?;
    let mut file = BufReader::new(&file);
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    Ok(contents)
}

pub fn get_track(s: &Path) -> AppResult<Track> {
    let contents = read_file(s)?;
    get_track_string(&contents)
}

pub fn get_track_string(s: &str) -> AppResult<Track> {
    use input::parser_utils::lexer;
    use input::track::{model_from_ast, parse};
    let lex = lexer(&mut s.chars())?;
    let stmts = parse(&lex)?;
    let model = model_from_ast(&stmts)?;
    Ok(model)
}

pub fn get_speeds(s: &Path, track: &Track) -> AppResult<SpeedTable> {
    let contents = read_file(s)?;
    get_speeds_string(&contents, track)
}

pub fn get_speeds_string(s: &str, track: &Track) -> AppResult<SpeedTable> {
    use input::parser_utils::lexer;
    use input::speeds::{input_from_ast, parse, speed_table};
    let lex = lexer(&mut s.chars())?;
    let stmts = parse(&lex)?;
    let table = speed_table(track, &input_from_ast(stmts)?)?;
    Ok(table)
}

pub fn get_timetable(s: &Path) -> AppResult<Timetable> {
    let contents = read_file(s)?;
    let t = input::timetable::parse_timetable(&contents)?;
    Ok(t)
}

pub fn generate_profiles(track: &Track, speeds: &SpeedTable, config: &Config) -> AppResult<ProfileSet> {
    railway::profiles::generate(track, speeds, config)
}

pub fn extract_breakpoints(profiles: &ProfileSet, config: &Config)
                           -> (BreakpointTable, Vec<CrossCheckMismatch>) {
    railway::breakpoints::extract(profiles, config)
}

/// Runs every train of the timetable concurrently over the track until
/// all have finished or the horizon is reached.
///
/// A train whose timetable entry does not fit the track or the breakpoint
/// table is recorded as failed and left out; the others run as usual.
pub fn evaluate_timetable(track: &Track,
                          breakpoints: &BreakpointTable,
                          timetable: &Timetable,
                          config: &Config)
                          -> History {
    let mut world = Corridor::new(track);
    let mut journeys = Vec::new();
    for spec in &timetable.trains {
        match Plan::new(spec, track, breakpoints) {
            Ok(plan) => {
                let id = world.add_train(plan.name(), plan.direction(), plan.origin());
                journeys.push(Journey::new(id, plan, config));
            }
            Err(e) => {
                error!("{}", e);
                world.add_failed(&spec.name, e.to_string());
            }
        }
    }

    let mut sim = eventsim::Simulation::new(world);
    sim.start_process(Box::new(Sampler::new(config)));
    for journey in journeys {
        sim.start_process(Box::new(journey));
    }
    sim.run_until(config.horizon);

    let end = sim.time();
    let history = sim.world.into_history();
    info!("Simulation stopped at t={:.1}: {} snapshots, {} failed trains",
          end, history.snapshots.len(), history.failures.len());
    history
}
