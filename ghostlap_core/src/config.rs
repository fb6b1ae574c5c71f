//! Session configuration.
//!
//! A session is configured once: which raster and geographic box the map
//! covers, the viewport it renders into, the starting calibration and the
//! tick rate. Everything here is validated before the first tick so the
//! projection never sees degenerate bounds.

use crate::ghostlap_space::{CalibrationOffset, GeoBounds, RasterSize, DEFAULT_NUDGE_STEP_DEG};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors, caught before a session starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Degenerate map bounds: zero {axis} span")]
    DegenerateBounds { axis: &'static str },

    #[error("Map bounds contain a non-finite corner")]
    NonFiniteBounds,

    #[error("Raster has zero width or height")]
    EmptyRaster,

    #[error("Viewport has zero width or height")]
    EmptyViewport,

    #[error("Invalid {field}: {value}")]
    InvalidValue { field: &'static str, value: f64 },

    #[error("Cannot read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot parse config: {0}")]
    Json(#[from] serde_json::Error),
}

fn default_name() -> String {
    "ghostlap-session".to_string()
}

fn default_viewport() -> RasterSize {
    RasterSize::new(1080, 1920)
}

fn default_zoom() -> f64 {
    6.0
}

fn default_tick_interval_ms() -> u64 {
    16
}

fn default_nudge_step() -> f64 {
    DEFAULT_NUDGE_STEP_DEG
}

fn default_player_radius() -> f64 {
    30.0
}

fn default_ghost_radius() -> f64 {
    20.0
}

/// Configuration for a race session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Session name (for logging and exports)
    #[serde(default = "default_name")]
    pub name: String,

    /// Geographic box covered by the track raster
    pub bounds: GeoBounds,

    /// Track raster size in pixels
    pub raster: RasterSize,

    /// Screen size in pixels (default: 1080x1920 portrait)
    #[serde(default = "default_viewport")]
    pub viewport: RasterSize,

    /// Starting calibration offset (default: none)
    #[serde(default)]
    pub calibration: CalibrationOffset,

    /// Zoom factor; 1.0 draws the raster at native size (default: 6.0)
    #[serde(default = "default_zoom")]
    pub zoom_level: f64,

    /// Tick interval in milliseconds (default: 16, ~60 Hz)
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Calibration nudge step in degrees (default: 0.000005)
    #[serde(default = "default_nudge_step")]
    pub nudge_step_deg: f64,

    /// Player disc radius in screen pixels (default: 30)
    #[serde(default = "default_player_radius")]
    pub player_marker_radius: f64,

    /// Ghost disc radius in raster pixels (default: 20)
    #[serde(default = "default_ghost_radius")]
    pub ghost_marker_radius: f64,
}

impl SessionConfig {
    /// Creates a configuration with default viewport, zoom and tick rate.
    pub fn new(bounds: GeoBounds, raster: RasterSize) -> Self {
        Self {
            name: default_name(),
            bounds,
            raster,
            viewport: default_viewport(),
            calibration: CalibrationOffset::default(),
            zoom_level: default_zoom(),
            tick_interval_ms: default_tick_interval_ms(),
            nudge_step_deg: default_nudge_step(),
            player_marker_radius: default_player_radius(),
            ghost_marker_radius: default_ghost_radius(),
        }
    }

    /// Parses a JSON configuration and validates it.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON configuration file and validates it.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Checks everything the projection and compositor rely on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bounds.validate()?;
        if self.raster.is_empty() {
            return Err(ConfigError::EmptyRaster);
        }
        if self.viewport.is_empty() {
            return Err(ConfigError::EmptyViewport);
        }
        if !(self.zoom_level.is_finite() && self.zoom_level > 0.0) {
            return Err(ConfigError::InvalidValue {
                field: "zoom_level",
                value: self.zoom_level,
            });
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "tick_interval_ms",
                value: 0.0,
            });
        }
        if !(self.nudge_step_deg.is_finite() && self.nudge_step_deg > 0.0) {
            return Err(ConfigError::InvalidValue {
                field: "nudge_step_deg",
                value: self.nudge_step_deg,
            });
        }
        let offsets = [self.calibration.lat_offset, self.calibration.lon_offset];
        if offsets.iter().any(|o| !o.is_finite()) {
            return Err(ConfigError::InvalidValue {
                field: "calibration",
                value: f64::NAN,
            });
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}
