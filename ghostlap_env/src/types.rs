//! Common types for the ghostlap environment abstraction.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a race session (one tick loop run).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Creates a new random SessionId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a deterministic SessionId from a seed (for simulation).
    pub fn from_seed(seed: u64) -> Self {
        let mut bytes = [0u8; 16];
        bytes[0..8].copy_from_slice(&seed.to_le_bytes());
        bytes[8..16].copy_from_slice(&seed.wrapping_mul(0x517cc1b727220a95).to_le_bytes());
        Self(Uuid::from_bytes(bytes))
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Show first 8 chars for readability
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// A single position fix delivered by a position source.
///
/// Live feeds deliver `(lat, lon, heading, speed)`; replayed fixes derive
/// heading and speed from consecutive trajectory positions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    /// Race time this fix belongs to (milliseconds since race start)
    pub time_ms: i64,

    /// Latitude in degrees
    pub lat: f64,

    /// Longitude in degrees
    pub lon: f64,

    /// Heading in degrees clockwise from north
    pub heading_deg: f64,

    /// Ground speed in m/s, if the source knows it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed_mps: Option<f64>,
}

impl Fix {
    /// Creates a fix without speed information.
    pub fn new(time_ms: i64, lat: f64, lon: f64, heading_deg: f64) -> Self {
        Self {
            time_ms,
            lat,
            lon,
            heading_deg,
            speed_mps: None,
        }
    }

    /// Sets the ground speed.
    pub fn with_speed(mut self, speed_mps: f64) -> Self {
        self.speed_mps = Some(speed_mps);
        self
    }

    /// Ground speed in km/h.
    pub fn speed_kmh(&self) -> Option<f64> {
        self.speed_mps.map(|s| s * 3.6)
    }

    /// True if every coordinate is finite.
    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lon.is_finite() && self.heading_deg.is_finite()
    }
}
