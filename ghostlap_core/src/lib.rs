//! ghostlap Core - Ghost Replay & Follow-Camera Engines
//!
//! Replays a recorded lap (the "ghost") next to a live or simulated player on
//! a static track map:
//! 1. **Time Engine**: sparse recordings become a continuous, clamped,
//!    piecewise-linear trajectory
//! 2. **Space Engine**: lat/lon to raster pixels through a calibrated box
//! 3. **Camera Engine**: a camera that sits on the player, turns with the
//!    heading and zooms in

pub mod ghostlap_time;
pub mod ghostlap_space;
pub mod ghostlap_camera;
pub mod config;
pub mod replay;
pub mod session;

// Re-export key types for convenience
pub use ghostlap_time::{LoadReport, ParseError, TrajectorySample, TrajectoryStore};
pub use ghostlap_space::{CalibrationOffset, GeoBounds, GeoProjector, NudgeDirection, RasterSize};
pub use ghostlap_camera::{CameraCompositor, CameraState, GhostState, Marker, RenderFrame, TrackSurface};
pub use config::{ConfigError, SessionConfig};
pub use replay::ReplaySource;
pub use session::{format_lap_time, RaceSession, TickOutput};
