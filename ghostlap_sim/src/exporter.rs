//! JSON exporter for session playback.
//!
//! Exports race ticks as JSON so a frontend (or a test) can redraw the
//! follow camera and both markers frame by frame.

use ghostlap_core::{CalibrationOffset, CameraState, RenderFrame, TickOutput};
use ghostlap_env::Fix;
use nalgebra::{Matrix3, Point2};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// A geographic position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl From<&Fix> for GeoPoint {
    fn from(fix: &Fix) -> Self {
        Self {
            lat: fix.lat,
            lon: fix.lon,
        }
    }
}

/// A single exported tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameRecord {
    pub tick: u64,

    /// Race time in seconds
    pub time_sec: f64,

    /// Race clock as shown on screen ("MM:SS.cc")
    pub lap_time: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub player: Option<GeoPoint>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ghost: Option<GeoPoint>,

    /// Player position on the map raster (pixels)
    pub player_pixel: [f64; 2],

    /// Ghost position on the map raster (pixels)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ghost_pixel: Option<[f64; 2]>,

    /// Ghost position on the viewport (pixels)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ghost_screen: Option<[f64; 2]>,

    /// Map-to-viewport transform, row-major 3x3
    pub world_to_screen: [f64; 9],

    pub heading_deg: f64,
    pub zoom_level: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed_kmh: Option<f64>,

    /// Events (nudges, source changes, etc.)
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub events: Vec<SessionEvent>,
}

impl FrameRecord {
    /// Builds a record from a tick and the camera state after it.
    pub fn from_tick(output: &TickOutput, camera: &CameraState) -> Self {
        let frame = &output.frame;
        Self {
            tick: output.tick,
            time_sec: output.race_time.as_secs_f64(),
            lap_time: output.lap_time.clone(),
            player: output.player_fix.as_ref().map(GeoPoint::from),
            ghost: output.ghost_fix.as_ref().map(GeoPoint::from),
            player_pixel: point(&frame.player_pixel),
            ghost_pixel: frame.ghost.as_ref().map(|g| point(&g.position)),
            ghost_screen: frame.ghost_on_screen().as_ref().map(point),
            world_to_screen: row_major(&frame.world_to_screen),
            heading_deg: camera.player_heading_deg,
            zoom_level: camera.zoom_level,
            speed_kmh: output.player_fix.as_ref().and_then(Fix::speed_kmh),
            events: Vec::new(),
        }
    }

    /// Attaches an event to this frame.
    pub fn with_event(mut self, event: SessionEvent) -> Self {
        self.events.push(event);
        self
    }
}

fn point(p: &Point2<f64>) -> [f64; 2] {
    [p.x, p.y]
}

fn row_major(m: &Matrix3<f64>) -> [f64; 9] {
    [
        m[(0, 0)], m[(0, 1)], m[(0, 2)],
        m[(1, 0)], m[(1, 1)], m[(1, 2)],
        m[(2, 0)], m[(2, 1)], m[(2, 2)],
    ]
}

/// Session event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEvent {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

impl SessionEvent {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level: Some("info".to_string()),
        }
    }
}

/// Complete session export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionExport {
    pub session_id: String,

    /// Track / configuration name
    pub name: String,

    /// "simulation" or "live"
    pub mode: String,

    /// Seed used
    pub seed: u64,

    /// Duration in seconds
    pub duration_sec: f64,

    /// Racing line in raster pixels, drawn under each frame's transform
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub ghost_line: Vec<[f64; 2]>,

    /// All exported frames
    pub frames: Vec<FrameRecord>,

    /// Calibration at the end of the run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_calibration: Option<CalibrationOffset>,
}

impl SessionExport {
    /// Creates a new export container.
    pub fn new(session_id: impl ToString, name: &str, mode: &str, seed: u64) -> Self {
        Self {
            session_id: session_id.to_string(),
            name: name.to_string(),
            mode: mode.to_string(),
            seed,
            duration_sec: 0.0,
            ghost_line: Vec::new(),
            frames: Vec::new(),
            final_calibration: None,
        }
    }

    /// Records the racing line from a composed frame.
    pub fn set_ghost_line(&mut self, frame: &RenderFrame) {
        self.ghost_line = frame.ghost_line.iter().map(point).collect();
    }

    /// Adds a frame.
    pub fn add_frame(&mut self, frame: FrameRecord) {
        self.duration_sec = frame.time_sec;
        self.frames.push(frame);
    }

    /// Finalizes the export.
    pub fn finalize(&mut self, calibration: CalibrationOffset) {
        self.final_calibration = Some(calibration);
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Writes to a JSON file.
    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let json = self.to_json()?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ghostlap_core::{
        GeoBounds, RasterSize, SessionConfig, TrackSurface, TrajectorySample, TrajectoryStore,
    };
    use std::time::Duration;

    fn tick_output() -> (TickOutput, CameraState) {
        let bounds = GeoBounds::new(1.0, 0.0, 0.0, 1.0).unwrap();
        let mut config = SessionConfig::new(bounds, RasterSize::new(1000, 1000));
        config.viewport = RasterSize::new(100, 200);
        config.zoom_level = 1.0;
        let mut surface = TrackSurface::from_config(&config).unwrap();
        surface.update_player_position(0.5, 0.5, 0.0);
        surface.update_ghost_position(0.5, 0.6);
        surface.set_ghost_line(&TrajectoryStore::new(vec![
            TrajectorySample::new(0, 0.5, 0.5),
            TrajectorySample::new(1000, 0.5, 0.6),
        ]));

        let output = TickOutput {
            tick: 3,
            race_time: Duration::from_millis(1500),
            lap_time: "00:01.50".to_string(),
            player_fix: Some(Fix::new(1500, 0.5, 0.5, 0.0).with_speed(10.0)),
            ghost_fix: Some(Fix::new(1500, 0.5, 0.6, 90.0)),
            frame: surface.render(),
        };
        (output, surface.camera())
    }

    #[test]
    fn test_frame_record_from_tick() {
        let (output, camera) = tick_output();
        let record = FrameRecord::from_tick(&output, &camera);

        assert_eq!(record.tick, 3);
        assert_eq!(record.time_sec, 1.5);
        assert_eq!(record.player_pixel, [500.0, 500.0]);
        assert_eq!(record.ghost.map(|g| g.lon), Some(0.6));
        assert!((record.speed_kmh.unwrap() - 36.0).abs() < 1e-9);

        // Player sits at viewport center, ghost 100px to its right
        let screen = record.ghost_screen.unwrap();
        assert!((screen[0] - 150.0).abs() < 1e-6);
        assert!((screen[1] - 100.0).abs() < 1e-6);

        // Bottom row of a 2D affine transform
        assert_eq!(&record.world_to_screen[6..], &[0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_export_json() {
        let (output, camera) = tick_output();
        let mut export = SessionExport::new("abcd1234", "test", "simulation", 42);
        export.add_frame(
            FrameRecord::from_tick(&output, &camera).with_event(SessionEvent::info("nudge up")),
        );
        export.set_ghost_line(&output.frame);
        export.finalize(CalibrationOffset::new(0.1, -0.1));

        assert_eq!(export.duration_sec, 1.5);
        assert_eq!(export.ghost_line.len(), 2);
        assert!((export.ghost_line[1][0] - 600.0).abs() < 1e-6);
        assert!((export.ghost_line[1][1] - 500.0).abs() < 1e-6);
        let json = export.to_json().unwrap();
        assert!(json.contains("\"seed\": 42"));
        assert!(json.contains("nudge up"));

        let parsed: SessionExport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.frames.len(), 1);
        assert_eq!(parsed.final_calibration, Some(CalibrationOffset::new(0.1, -0.1)));
    }
}
