//! Replay Demo - "Where is the ghost?"
//! ===================================
//!
//! Builds a short recorded lap, then walks the race clock forward printing:
//! - the interpolated ghost position
//! - its raster pixel after calibration
//! - where it lands on a 1080x1920 follow camera pinned to a parked player
//!
//! Run:
//! ```bash
//! cargo run -p ghostlap_core --example replay_demo
//! ```

use ghostlap_core::{
    format_lap_time, CalibrationOffset, GeoBounds, RasterSize, SessionConfig, TrackSurface,
    TrajectoryStore,
};
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("👻 Replay Demo");
    println!("==============\n");

    let (store, report) = TrajectoryStore::from_lines([
        "100.0,25.4975,51.4460",
        "101.0,25.4970,51.4465",
        "bad,row",
        "102.0,25.4965,51.4470",
        "103.5,25.4958,51.4481",
    ]);
    println!(
        "Loaded {} samples ({} skipped), {:.1}s recording\n",
        report.accepted,
        report.skipped_count(),
        store.duration_ms() as f64 / 1000.0
    );

    let bounds = GeoBounds::new(25.5000, 51.4400, 25.4850, 51.4560)?;
    let mut config = SessionConfig::new(bounds, RasterSize::new(2048, 2048));
    config.calibration = CalibrationOffset::new(-0.000045, -0.000035);

    let mut surface = TrackSurface::from_config(&config)?;
    surface.update_player_position(25.4968, 51.4466, 135.0);

    for step in 0..=8 {
        let race_time = Duration::from_millis(step * 500);
        let Some(ghost) = store.position_at(race_time.as_millis() as i64) else {
            println!("No trajectory available");
            break;
        };
        surface.update_ghost_position(ghost.lat, ghost.lon);

        let frame = surface.render();
        let pixel = frame.ghost.map(|g| g.position);
        let screen = frame.ghost_on_screen();
        println!(
            "{}  ghost=({:.6}, {:.6})  px={:?}  screen={:?}",
            format_lap_time(race_time),
            ghost.lat,
            ghost.lon,
            pixel.map(|p| (p.x.round(), p.y.round())),
            screen.map(|p| (p.x.round(), p.y.round())),
        );
    }

    surface.log_calibration();
    Ok(())
}
