//! Saber Sim headless runner
//!
//! Replays a beatmap through a full session with autopilot sabers and logs
//! the result. Useful for checking a map loads and plays end to end.
//!
//! ```text
//! saber-sim <beatmap.json> [settings.json] [--info <Info.dat> --difficulty <name>]
//! ```

#[cfg(not(target_arch = "wasm32"))]
use std::{cell::Cell, path::PathBuf, process::ExitCode, rc::Rc};

#[cfg(not(target_arch = "wasm32"))]
use clap::Parser;

#[cfg(not(target_arch = "wasm32"))]
use saber_sim::sim::{Hand, Session, SessionEvent, SessionInput, TickInput, WeaponTracker, tick};
#[cfg(not(target_arch = "wasm32"))]
use saber_sim::{Beatmap, BeatmapInfo, Result, Settings};

#[cfg(not(target_arch = "wasm32"))]
/// Frames per second of the simulated headset
const FRAME_RATE: f32 = 90.0;
#[cfg(not(target_arch = "wasm32"))]
/// Scroll speed when no info record is given (meters per second)
const DEFAULT_SPEED: f32 = 10.0;
#[cfg(not(target_arch = "wasm32"))]
/// Tempo when neither the map nor an info record carries one
const DEFAULT_BPM: f32 = 120.0;
#[cfg(not(target_arch = "wasm32"))]
/// Keep playing this many beats past the last object so everything despawns
const TAIL_BEATS: f32 = 4.0;

#[cfg(not(target_arch = "wasm32"))]
#[derive(Parser, Debug)]
#[clap(author, version, about = "Replay a beatmap headlessly with autopilot sabers", long_about = None)]
struct Args {
    /// Beatmap JSON file
    beatmap: PathBuf,
    /// Settings JSON file (defaults apply when omitted)
    settings: Option<PathBuf>,
    /// Info record carrying bpm and note jump speed per difficulty
    #[clap(long)]
    info: Option<PathBuf>,
    /// Difficulty to look up in the info record
    #[clap(long, default_value = "Normal")]
    difficulty: String,
}

#[cfg(not(target_arch = "wasm32"))]
fn run(args: Args) -> Result<()> {
    let settings = match &args.settings {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    let beatmap = Beatmap::load(&args.beatmap)?;
    let info = match &args.info {
        Some(path) => {
            let json = std::fs::read_to_string(path)?;
            BeatmapInfo::from_info_json(&json, &args.difficulty)?
        }
        None => BeatmapInfo::new(beatmap.bpm.unwrap_or(DEFAULT_BPM), DEFAULT_SPEED),
    };

    let mut session = Session::new(settings);
    let mut weapons = WeaponTracker::new(settings.weapon);

    let clashes = Rc::new(Cell::new(0u32));
    let clash_count = clashes.clone();
    session.subscribe(Box::new(move |event| {
        if let SessionEvent::WeaponClash { .. } = event {
            clash_count.set(clash_count.get() + 1);
        }
    }));

    session.handle(SessionInput::Ready);
    session.handle(SessionInput::Trigger(Hand::Right));
    session.load_complete(info, &beatmap)?;
    session.handle(SessionInput::Trigger(Hand::Right));

    let end_position = session
        .scheduler()
        .position_for_beat(session.scheduler().last_beat() + TAIL_BEATS);
    let step = info.note_jump_speed / FRAME_RATE;
    let mut position = 0.0;
    let mut frames = 0u64;
    while position <= end_position {
        let input = TickInput {
            position,
            autopilot: true,
            ..Default::default()
        };
        tick(&mut session, &mut weapons, &input);
        position += step;
        frames += 1;
    }
    session.handle(SessionInput::PlaybackEnded);

    log::info!(
        "Finished after {} frames: {}/{} scoring hits, {} saber clashes",
        frames,
        session.hit_count(),
        session.total_scorable_count(),
        clashes.get()
    );
    println!(
        "{}/{} notes hit ({} frames)",
        session.hit_count(),
        session.total_scorable_count(),
        frames
    );
    Ok(())
}

#[cfg(not(target_arch = "wasm32"))]
fn main() -> ExitCode {
    env_logger::init();

    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{}", err);
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // The library is driven by the host page; there is no headless runner on the web
}
