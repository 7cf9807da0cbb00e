use super::dynamics::{generate_profile, KinematicProfile};
use crate::config::Config;
use crate::input::speeds::SpeedTable;
use crate::input::track::{ElementIdx, Track};
use crate::input::IngestError;
use crate::AppResult;
use log::{debug, info};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Start {
    Standing,
    Moving,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum End {
    Stop,
    Pass,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BoundaryCondition {
    pub start: Start,
    pub end: End,
}

impl BoundaryCondition {
    pub const ALL: [BoundaryCondition; 4] = [
        BoundaryCondition { start: Start::Standing, end: End::Stop },
        BoundaryCondition { start: Start::Standing, end: End::Pass },
        BoundaryCondition { start: Start::Moving, end: End::Stop },
        BoundaryCondition { start: Start::Moving, end: End::Pass },
    ];

    /// `0_to_v` and friends, used for profile file names.
    pub fn file_stem(&self) -> &'static str {
        match (self.start, self.end) {
            (Start::Standing, End::Stop) => "0_to_0",
            (Start::Standing, End::Pass) => "0_to_v",
            (Start::Moving, End::Stop) => "v_to_0",
            (Start::Moving, End::Pass) => "v_to_v",
        }
    }
}

#[derive(Clone, Debug)]
pub struct SectionProfiles {
    pub section: ElementIdx,
    pub name: String,
    /// Initial velocity used for the two moving-start profiles.
    pub start_velocity: f64,
    standing_stop: KinematicProfile,
    standing_pass: KinematicProfile,
    moving_stop: KinematicProfile,
    moving_pass: KinematicProfile,
}

impl SectionProfiles {
    pub fn get(&self, bc: BoundaryCondition) -> &KinematicProfile {
        match (bc.start, bc.end) {
            (Start::Standing, End::Stop) => &self.standing_stop,
            (Start::Standing, End::Pass) => &self.standing_pass,
            (Start::Moving, End::Stop) => &self.moving_stop,
            (Start::Moving, End::Pass) => &self.moving_pass,
        }
    }
}

/// Profiles of every section, in route order.
#[derive(Clone, Debug, Default)]
pub struct ProfileSet {
    pub sections: Vec<SectionProfiles>,
}

impl ProfileSet {
    pub fn get(&self, section: ElementIdx) -> Option<&SectionProfiles> {
        self.sections.iter().find(|s| s.section == section)
    }
}

/// Runs the profile generator four times per section.
///
/// A moving train enters a section at its first segment's speed, unless
/// the previous section's standing-start pass profile ends at a clearly
/// different speed; then that speed carries over.
pub fn generate(track: &Track, speeds: &SpeedTable, config: &Config) -> AppResult<ProfileSet> {
    let params = config.train_params();
    let mut sections = Vec::new();
    let mut previous_exit: Option<f64> = None;

    for (idx, element) in track.sections() {
        let segments = speeds.segments(idx)
            .ok_or_else(|| IngestError::MissingSpeeds(element.name.clone()))?;
        let target = segments[0].velocity;
        let start_velocity = match previous_exit {
            Some(v) if (v - target).abs() > config.startv_continuity_tolerance => v,
            _ => target,
        };

        let run = |v0: f64, stop: bool| generate_profile(segments, &params, config.time_step, v0, stop);
        let profiles = SectionProfiles {
            section: idx,
            name: element.name.clone(),
            start_velocity,
            standing_stop: run(0.0, true)?,
            standing_pass: run(0.0, false)?,
            moving_stop: run(start_velocity, true)?,
            moving_pass: run(start_velocity, false)?,
        };
        debug!("Section {}: {:.1}s standing-stop, {:.1}s moving-pass, entry speed {:.2} m/s",
               element.name,
               profiles.standing_stop.total_time(),
               profiles.moving_pass.total_time(),
               start_velocity);
        previous_exit = Some(profiles.standing_pass.final_velocity());
        sections.push(profiles);
    }

    info!("Generated kinematic profiles for {} sections", sections.len());
    Ok(ProfileSet { sections })
}
