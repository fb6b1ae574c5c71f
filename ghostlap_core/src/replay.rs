//! Replay position source: drives a marker from a recorded trajectory.

use crate::ghostlap_space::{bearing_deg, distance_m};
use crate::ghostlap_time::{TrajectorySample, TrajectoryStore};
use ghostlap_env::{Fix, PositionSource};
use std::sync::Arc;
use std::time::Duration;

/// Replays a [`TrajectoryStore`] against the race clock.
///
/// Recordings carry no heading or speed, so both are derived from the
/// previous replayed position: heading is the great-circle bearing towards
/// the new position, speed the distance covered over the elapsed race time.
/// When the position does not move (stationary, or clamped at either end)
/// the previous heading is kept.
#[derive(Debug, Clone)]
pub struct ReplaySource {
    store: Arc<TrajectoryStore>,
    label: String,
    last: Option<(i64, TrajectorySample)>,
    heading_deg: f64,
}

impl ReplaySource {
    pub fn new(store: Arc<TrajectoryStore>) -> Self {
        Self {
            store,
            label: "replay".to_string(),
            last: None,
            heading_deg: 0.0,
        }
    }

    /// Sets the name used in logs.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn store(&self) -> &TrajectoryStore {
        &self.store
    }

    /// True once the race time has passed the end of the recording.
    pub fn is_finished(&self, race_time: Duration) -> bool {
        to_millis(race_time) >= self.store.duration_ms()
    }

    /// Forgets the previous position (heading restarts at north).
    pub fn reset(&mut self) {
        self.last = None;
        self.heading_deg = 0.0;
    }
}

fn to_millis(race_time: Duration) -> i64 {
    i64::try_from(race_time.as_millis()).unwrap_or(i64::MAX)
}

impl PositionSource for ReplaySource {
    fn current_position(&mut self, race_time: Duration) -> Option<Fix> {
        let query_ms = to_millis(race_time);
        let sample = self.store.position_at(query_ms)?;

        let mut speed_mps = None;
        if let Some((last_ms, last)) = self.last {
            let moved = last.lat != sample.lat || last.lon != sample.lon;
            if moved {
                self.heading_deg = bearing_deg(last.lat, last.lon, sample.lat, sample.lon);
            }
            let elapsed_ms = query_ms - last_ms;
            if elapsed_ms > 0 {
                let meters = if moved {
                    distance_m(last.lat, last.lon, sample.lat, sample.lon)
                } else {
                    0.0
                };
                speed_mps = Some(meters / (elapsed_ms as f64 / 1000.0));
            }
        }
        self.last = Some((query_ms, sample));

        let fix = Fix::new(query_ms, sample.lat, sample.lon, self.heading_deg);
        Some(match speed_mps {
            Some(speed) => fix.with_speed(speed),
            None => fix,
        })
    }

    fn label(&self) -> &str {
        &self.label
    }
}
