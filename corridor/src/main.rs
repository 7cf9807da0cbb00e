use corridor::config::Config;
use corridor::output::history::Outcome;
use corridor::*;
use log::info;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use structopt::StructOpt;

/// Corridor -- train movement and capacity on a single-track line
#[derive(StructOpt, Debug)]
#[structopt(name = "corridor")]
struct Opt {
    /// Verbose mode (-v, -vv, -vvv)
    #[structopt(short = "v", long = "verbose", parse(from_occurrences))]
    verbose: u8,

    /// Track layout file
    #[structopt(parse(from_os_str))]
    track: PathBuf,

    /// Speed profile file
    #[structopt(parse(from_os_str))]
    speeds: PathBuf,

    /// Timetable file
    #[structopt(parse(from_os_str))]
    timetable: PathBuf,

    /// Output JSON snapshot stream
    #[structopt(short = "j", long = "json", parse(from_os_str))]
    json: Option<PathBuf>,

    /// Output JSON history of element events
    #[structopt(short = "H", long = "history", parse(from_os_str))]
    history: Option<PathBuf>,

    /// Output JSON breakpoint table
    #[structopt(short = "b", long = "breakpoints", parse(from_os_str))]
    breakpoints: Option<PathBuf>,

    /// Directory for kinematic profile CSV files
    #[structopt(short = "p", long = "profiles", parse(from_os_str))]
    profiles: Option<PathBuf>,

    /// Output element visit times to file
    #[structopt(short = "n", long = "visits", parse(from_os_str))]
    visits: Option<PathBuf>,

    /// Maximum acceleration (m/s²)
    #[structopt(long = "accel", default_value = "0.9")]
    accel: f64,

    /// Maximum braking deceleration (m/s²)
    #[structopt(long = "brake", default_value = "0.9")]
    brake: f64,

    /// Profile integration time step (s)
    #[structopt(short = "d", long = "time-step", default_value = "0.1")]
    time_step: f64,

    /// Snapshot interval (s)
    #[structopt(short = "i", long = "interval", default_value = "1")]
    interval: f64,

    /// Lookahead retry interval (s)
    #[structopt(long = "retry", default_value = "1")]
    retry: f64,

    /// Simulated time limit (s)
    #[structopt(long = "horizon", default_value = "3600")]
    horizon: f64,
}

impl Opt {
    fn config(&self) -> Config {
        Config {
            max_acc: self.accel,
            max_brk: self.brake,
            time_step: self.time_step,
            snapshot_interval: self.interval,
            retry_interval: self.retry,
            horizon: self.horizon,
            ..Config::default()
        }
    }
}

fn run(opt: &Opt) -> AppResult<()> {
    let config = opt.config();

    let track = get_track(&opt.track)?;
    info!("Track: {} elements, {:.0} m of sections", track.len(), track.total_section_length());
    let speeds = get_speeds(&opt.speeds, &track)?;
    let timetable = get_timetable(&opt.timetable)?;
    info!("Timetable: {} trains", timetable.trains.len());

    let profiles = generate_profiles(&track, &speeds, &config)?;
    if let Some(ref dir) = opt.profiles {
        let n = output::csv::write_profiles(dir, &profiles)?;
        info!("Wrote {} profile files to {}", n, dir.display());
    }

    let (breakpoints, _mismatches) = extract_breakpoints(&profiles, &config);
    if let Some(ref path) = opt.breakpoints {
        let mut writer = BufWriter::new(File::create(path)?);
        output::json::json_breakpoints(&breakpoints, &mut writer)?;
    }

    let history = evaluate_timetable(&track, &breakpoints, &timetable, &config);

    if let Some(ref path) = opt.json {
        let mut writer = BufWriter::new(File::create(path)?);
        output::json::json_snapshots(&history, &mut writer)?;
    }

    if let Some(ref path) = opt.history {
        let mut writer = BufWriter::new(File::create(path)?);
        output::json::json_history(&history, &mut writer)?;
    }

    if let Some(ref path) = opt.visits {
        use std::io::Write;
        let mut writer = BufWriter::new(File::create(path)?);
        let string = output::history::visits(&history)?;
        write!(writer, "{}", string)?;
    }

    for train in &history.trains {
        match train.outcome {
            Outcome::Arrived { time } => println!("{}: arrived at t={:.1}s", train.name, time),
            Outcome::Unfinished => println!("{}: not finished", train.name),
            Outcome::Failed { ref message } => println!("{}: failed: {}", train.name, message),
        }
    }

    Ok(())
}

pub fn main() {
    let opt = Opt::from_args();
    let level = match opt.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(&opt) {
        Ok(()) => {}
        Err(e) => {
            println!("Error:\n{}", e.as_fail());
            std::process::exit(1);
        }
    }
}
