//! ghostlap Replay CLI
//!
//! Replays a recorded lap against a simulated (or recorded) player and
//! reports where the ghost and the camera ended up.

use clap::Parser;
use ghostlap_core::{
    GeoBounds, NudgeDirection, RaceSession, RasterSize, SessionConfig, TrajectoryStore,
};
use ghostlap_env::TokioClock;
use ghostlap_sim::{GpsNoise, RunMode, RunSummary, RunnerConfig, SessionRunner};
use std::sync::Arc;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Margin around the trajectory when no map config is given (~100 m).
const AUTO_BOUNDS_MARGIN_DEG: f64 = 0.001;

#[derive(Parser, Debug)]
#[command(name = "ghostlap-sim")]
#[command(about = "Ghost lap replay and follow-camera simulator")]
struct Args {
    /// Trajectory file (time_seconds,lat,lon per line)
    #[arg(short, long)]
    track: String,

    /// Session config JSON (map bounds, raster, calibration); fitted to the
    /// trajectory when omitted
    #[arg(short, long)]
    config: Option<String>,

    /// Player source: sim (replay the trajectory) or live (simulated GPS)
    #[arg(short, long, default_value = "sim")]
    mode: RunMode,

    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Race time to simulate in seconds
    #[arg(short, long, default_value = "30")]
    duration: f64,

    /// Tick interval override in milliseconds
    #[arg(long)]
    tick_ms: Option<u64>,

    /// Zoom level override
    #[arg(long)]
    zoom: Option<f64>,

    /// Calibration nudges applied before the start (up,down,left,right)
    #[arg(long, value_delimiter = ',')]
    nudge: Vec<NudgeDirection>,

    /// GPS position noise in meters (live mode)
    #[arg(long, default_value = "2.0")]
    gps_noise: f64,

    /// Fraction of GPS fixes dropped (live mode)
    #[arg(long, default_value = "0.0")]
    dropout: f64,

    /// Player pace relative to the recording (live mode)
    #[arg(long, default_value = "1.0")]
    pace: f64,

    /// Export frames to a JSON file
    #[arg(long)]
    export: Option<String>,

    /// Export every Nth tick
    #[arg(long, default_value = "6")]
    export_interval: u64,

    /// Run against the wall clock instead of virtual time (sim mode only)
    #[arg(long)]
    realtime: bool,

    /// JSON output for scripting
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    if !args.json {
        info!("ghostlap replay simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let (store, report) = TrajectoryStore::from_path(&args.track);
    if let Some(reason) = &report.source_error {
        warn!("Trajectory unavailable ({}); continuing without one", reason);
    }
    info!(
        "Loaded {} samples from {} ({} skipped, {:.1}s)",
        report.accepted,
        args.track,
        report.skipped_count(),
        store.duration_ms() as f64 / 1000.0
    );
    for skipped in &report.skipped {
        debug!("  line {}: {}", skipped.line, skipped.reason);
    }

    let mut session_config = match load_session_config(&args, &store) {
        Ok(config) => config,
        Err(e) => {
            error!("Cannot set up the map: {}", e);
            std::process::exit(1);
        }
    };
    if let Some(tick_ms) = args.tick_ms {
        session_config.tick_interval_ms = tick_ms;
    }
    if let Some(zoom) = args.zoom {
        session_config.zoom_level = zoom;
    }

    let seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(42)
    } else {
        args.seed
    };

    let store = Arc::new(store);

    if args.realtime {
        run_realtime(&args, session_config, store);
        return;
    }

    let runner = SessionRunner::new(RunnerConfig {
        seed,
        mode: args.mode,
        duration_secs: args.duration,
        export_interval: args.export_interval,
        noise: GpsNoise {
            position_std_m: args.gps_noise,
            dropout_rate: args.dropout,
            ..GpsNoise::default()
        },
        pace: args.pace,
    });

    let (summary, export) = match runner.run(session_config, store, &args.nudge) {
        Ok(result) => result,
        Err(e) => {
            error!("✗ Run failed: {}", e);
            std::process::exit(1);
        }
    };

    if let Some(path) = &args.export {
        match export.write_to_file(path) {
            Ok(()) => info!("Exported {} frames to {}", export.frames.len(), path),
            Err(e) => {
                error!("Cannot write export {}: {}", path, e);
                std::process::exit(1);
            }
        }
    }

    if args.json {
        print_json(seed, &summary);
    } else {
        print_summary(&summary);
    }
}

/// Loads the map config, or fits bounds around the trajectory.
fn load_session_config(
    args: &Args,
    store: &TrajectoryStore,
) -> Result<SessionConfig, ghostlap_core::ConfigError> {
    if let Some(path) = &args.config {
        return SessionConfig::from_json_file(path);
    }

    let points = store.samples().iter().map(|s| (s.lat, s.lon));
    let bounds = GeoBounds::enclosing(points, AUTO_BOUNDS_MARGIN_DEG).or_else(|_| {
        // No trajectory to fit: any valid box keeps the session running
        GeoBounds::new(AUTO_BOUNDS_MARGIN_DEG, 0.0, 0.0, AUTO_BOUNDS_MARGIN_DEG)
    })?;
    info!(
        "No map config given; fitted bounds ({:.5}, {:.5}) -> ({:.5}, {:.5})",
        bounds.top_left_lat, bounds.top_left_lon, bounds.bottom_right_lat, bounds.bottom_right_lon
    );
    Ok(SessionConfig::new(bounds, RasterSize::new(2048, 2048)))
}

/// Flags that the wall-clock loop cannot honor.
fn realtime_conflict(args: &Args) -> Option<&'static str> {
    if args.mode != RunMode::Simulation {
        Some("--realtime supports sim mode only")
    } else if args.export.is_some() {
        Some("--realtime does not record frames; drop --export")
    } else if args.json {
        Some("--realtime does not produce a summary; drop --json")
    } else {
        None
    }
}

/// Ticks a simulation session against the wall clock.
fn run_realtime(args: &Args, config: SessionConfig, store: Arc<TrajectoryStore>) {
    if let Some(problem) = realtime_conflict(args) {
        error!("{}", problem);
        std::process::exit(1);
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Cannot start runtime: {}", e);
            std::process::exit(1);
        }
    };

    let max_ticks = (args.duration * 1000.0 / config.tick_interval_ms.max(1) as f64).ceil() as u64;
    let mut session = match RaceSession::simulation(TokioClock::shared(), config, store) {
        Ok(session) => session,
        Err(e) => {
            error!("Invalid session config: {}", e);
            std::process::exit(1);
        }
    };
    for &direction in &args.nudge {
        session.nudge(direction);
    }

    let ticks = runtime.block_on(session.run(max_ticks, |_, output| {
        if output.tick % 60 == 0 {
            if let Some(fix) = output.player_fix {
                info!("{}  player=({:.6}, {:.6})", output.lap_time, fix.lat, fix.lon);
            }
        }
    }));
    session.stop();

    info!("✓ Realtime run finished after {} ticks", ticks);
    session.surface().log_calibration();
}

fn print_summary(summary: &RunSummary) {
    info!("");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("  {} run {}", summary.mode, summary.session_id);
    info!("    Ticks:          {}", summary.ticks);
    info!("    Race time:      {:.2}s", summary.final_race_time_secs);
    info!("    Player fixes:   {}", summary.player_fixes);
    info!("    Ghost fixes:    {}", summary.ghost_fixes);
    if summary.gps_dropped > 0 {
        info!("    GPS dropouts:   {}", summary.gps_dropped);
    }
    if let Some(gap) = summary.max_gap_m {
        info!("    Max ghost gap:  {:.1}m", gap);
    }
    info!("    Frames:         {}", summary.frames_exported);
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!(
        "Final calibration: lat_offset={} lon_offset={}",
        summary.final_calibration.lat_offset, summary.final_calibration.lon_offset
    );
}

fn print_json(seed: u64, summary: &RunSummary) {
    let json = serde_json::json!({
        "session_id": summary.session_id.to_string(),
        "mode": summary.mode.name(),
        "seed": seed,
        "ticks": summary.ticks,
        "race_time_secs": summary.final_race_time_secs,
        "player_fixes": summary.player_fixes,
        "ghost_fixes": summary.ghost_fixes,
        "gps_dropped": summary.gps_dropped,
        "max_gap_m": summary.max_gap_m,
        "frames_exported": summary.frames_exported,
        "final_calibration": summary.final_calibration,
    });
    match serde_json::to_string_pretty(&json) {
        Ok(text) => println!("{}", text),
        Err(e) => error!("Cannot serialize summary: {}", e),
    }
}
