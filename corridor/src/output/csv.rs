use crate::railway::dynamics::KinematicProfile;
use crate::railway::profiles::{BoundaryCondition, ProfileSet};
use failure::Error;
use serde::Serialize;
use std::io;
use std::path::Path;

#[derive(Serialize)]
struct Row {
    time: f64,
    position: f64,
    velocity: f64,
    acceleration: f64,
}

pub fn csv_profile<W: io::Write>(profile: &KinematicProfile, f: W) -> Result<(), Error> {
    let mut writer = ::csv::Writer::from_writer(f);
    for s in profile.samples() {
        writer.serialize(Row {
            time: s.time,
            position: s.position,
            velocity: s.velocity,
            acceleration: s.acceleration,
        })?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes one file per section and boundary condition into `dir`, named
/// like `S1_0_to_v.csv`. Returns the number of files written.
pub fn write_profiles(dir: &Path, profiles: &ProfileSet) -> Result<usize, Error> {
    std::fs::create_dir_all(dir)?;
    let mut n = 0;
    for section in &profiles.sections {
        for bc in BoundaryCondition::ALL.iter() {
            let path = dir.join(format!("{}_{}.csv", section.name, bc.file_stem()));
            let file = std::fs::File::create(&path)?;
            csv_profile(section.get(*bc), io::BufWriter::new(file))?;
            n += 1;
        }
    }
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::speeds::SpeedSegment;
    use crate::railway::dynamics::{generate_profile, TrainParams};

    #[test]
    fn test_csv_columns() {
        let params = TrainParams { max_acc: 1.0, max_brk: 1.0 };
        let p = generate_profile(&[SpeedSegment { length: 10.0, velocity: 5.0 }], &params, 0.5, 0.0, true)
            .unwrap();
        let mut buf = Vec::new();
        csv_profile(&p, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("time,position,velocity,acceleration"));
        assert_eq!(lines.count(), p.samples().len());
    }
}
