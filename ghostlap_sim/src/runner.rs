//! Session runner - drives a race session headlessly on virtual time.

use crate::context::SimClock;
use crate::exporter::{FrameRecord, SessionEvent, SessionExport};
use crate::oracle::{GpsNoise, GpsOracle};

use ghostlap_core::ghostlap_space::distance_m;
use ghostlap_core::{
    CalibrationOffset, ConfigError, NudgeDirection, RaceSession, ReplaySource, SessionConfig,
    TrajectoryStore,
};
use ghostlap_env::{EnvError, LiveFeed, SessionId};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// How the player marker is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// The player replays the recorded trajectory
    Simulation,

    /// The player follows a (simulated) GPS feed, the ghost replays the recording
    Live,
}

impl RunMode {
    pub fn name(&self) -> &'static str {
        match self {
            RunMode::Simulation => "simulation",
            RunMode::Live => "live",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sim" | "simulation" | "replay" => Ok(RunMode::Simulation),
            "live" | "gps" => Ok(RunMode::Live),
            other => Err(format!("unknown mode '{}' (expected sim or live)", other)),
        }
    }
}

/// Runner errors.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Invalid session config: {0}")]
    Config(#[from] ConfigError),

    #[error("Position feed failed: {0}")]
    Feed(#[from] EnvError),

    #[error("Invalid run duration: {0}s")]
    InvalidDuration(f64),
}

/// Runner settings that are not part of the session itself.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Seed for GPS noise and the session id
    pub seed: u64,

    pub mode: RunMode,

    /// Race time to simulate (seconds)
    pub duration_secs: f64,

    /// Export every Nth tick (0 is treated as 1)
    pub export_interval: u64,

    /// GPS noise model (live mode)
    pub noise: GpsNoise,

    /// Player pace relative to the recording (live mode)
    pub pace: f64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            mode: RunMode::Simulation,
            duration_secs: 30.0,
            export_interval: 6,
            noise: GpsNoise::default(),
            pace: 1.0,
        }
    }
}

/// Results from a run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub session_id: SessionId,
    pub mode: RunMode,

    /// Total ticks executed
    pub ticks: u64,

    /// Race time at the last tick (seconds)
    pub final_race_time_secs: f64,

    pub frames_exported: usize,

    /// Ticks where the player source produced a fix
    pub player_fixes: u64,

    /// Ticks where the ghost source produced a fix
    pub ghost_fixes: u64,

    /// GPS fixes dropped by the oracle (live mode)
    pub gps_dropped: u64,

    /// Largest player-to-ghost distance seen (meters)
    pub max_gap_m: Option<f64>,

    pub final_calibration: CalibrationOffset,
}

/// Runs a session on a [`SimClock`] for a fixed race duration.
pub struct SessionRunner {
    config: RunnerConfig,
}

impl SessionRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Runs a session over `store`.
    ///
    /// `nudges` are applied in order before the first tick, the way an
    /// operator lines the map up before the start.
    pub fn run(
        &self,
        session_config: SessionConfig,
        store: Arc<TrajectoryStore>,
        nudges: &[NudgeDirection],
    ) -> Result<(RunSummary, SessionExport), RunnerError> {
        let duration = self.config.duration_secs;
        if !(duration.is_finite() && duration > 0.0) {
            return Err(RunnerError::InvalidDuration(duration));
        }
        if store.is_empty() {
            warn!("Trajectory is empty: markers will not move");
        }

        let clock = SimClock::shared();
        let interval = session_config.tick_interval();
        let name = session_config.name.clone();
        let session_id = SessionId::from_seed(self.config.seed);

        let (session, mut oracle) = match self.config.mode {
            RunMode::Simulation => {
                let session =
                    RaceSession::simulation(clock.clone(), session_config, Arc::clone(&store))?;
                (session, None)
            }
            RunMode::Live => {
                let (sender, feed) = LiveFeed::channel();
                let oracle = GpsOracle::new(Arc::clone(&store), sender, self.config.seed)
                    .with_noise(self.config.noise)
                    .with_pace(self.config.pace);
                let ghost = ReplaySource::new(Arc::clone(&store)).with_label("ghost");
                let mut session = RaceSession::new(clock.clone(), session_config, Box::new(feed))?
                    .with_ghost(Box::new(ghost));
                session.surface_mut().set_ghost_line(&store);
                (session, Some(oracle))
            }
        };
        let mut session = session.with_id(session_id);

        info!(
            "Starting {} run {} (seed={}, {:.1}s, {} samples)",
            self.config.mode,
            session_id,
            self.config.seed,
            duration,
            store.len()
        );

        let mut pending_events: Vec<SessionEvent> = Vec::new();
        for &direction in nudges {
            let offset = session.surface_mut().nudge(direction);
            pending_events.push(SessionEvent::info(format!(
                "nudge {:?}: lat_offset={:.6} lon_offset={:.6}",
                direction, offset.lat_offset, offset.lon_offset
            )));
        }

        let interval_ms = interval.as_millis().max(1) as f64;
        let max_ticks = ((duration * 1000.0) / interval_ms).ceil() as u64;
        let export_every = self.config.export_interval.max(1);

        let mut export = SessionExport::new(session_id, &name, self.config.mode.name(), self.config.seed);
        let mut ticks = 0;
        let mut final_race_time_secs = 0.0;
        let mut player_fixes = 0;
        let mut ghost_fixes = 0;
        let mut max_gap_m: Option<f64> = None;

        session.start();
        while ticks < max_ticks {
            if let (Some(oracle), Some(race_time)) = (oracle.as_mut(), session.race_time()) {
                oracle.step(race_time)?;
            }

            let Some(output) = session.tick() else { break };
            ticks += 1;
            final_race_time_secs = output.race_time.as_secs_f64();

            if output.player_fix.is_some() {
                player_fixes += 1;
            }
            if output.ghost_fix.is_some() {
                ghost_fixes += 1;
            }
            if let (Some(player), Some(ghost)) = (&output.player_fix, &output.ghost_fix) {
                let gap = distance_m(player.lat, player.lon, ghost.lat, ghost.lon);
                max_gap_m = Some(max_gap_m.map_or(gap, |m| m.max(gap)));
            }

            if export.ghost_line.is_empty() {
                export.set_ghost_line(&output.frame);
            }
            if (output.tick - 1) % export_every == 0 {
                let mut record = FrameRecord::from_tick(&output, &session.surface().camera());
                for event in pending_events.drain(..) {
                    record = record.with_event(event);
                }
                export.add_frame(record);
            }

            clock.advance_time(interval);
        }
        session.stop();

        let final_calibration = session.surface().calibration();
        export.finalize(final_calibration);

        let gps_dropped = oracle.as_ref().map_or(0, |o| o.dropped());
        debug!(
            "Run {} done: {} ticks, {} frames, {} gps drops",
            session_id,
            ticks,
            export.frames.len(),
            gps_dropped
        );

        let summary = RunSummary {
            session_id,
            mode: self.config.mode,
            ticks,
            final_race_time_secs,
            frames_exported: export.frames.len(),
            player_fixes,
            ghost_fixes,
            gps_dropped,
            max_gap_m,
            final_calibration,
        };
        Ok((summary, export))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ghostlap_core::{GeoBounds, RasterSize};

    fn lap() -> Arc<TrajectoryStore> {
        let (store, _) = TrajectoryStore::from_lines([
            "0.0,25.4975,51.4460",
            "1.0,25.4970,51.4465",
            "2.0,25.4965,51.4470",
            "3.0,25.4958,51.4481",
        ]);
        Arc::new(store)
    }

    fn session_config() -> SessionConfig {
        let bounds = GeoBounds::new(25.5000, 51.4400, 25.4850, 51.4560).unwrap();
        let mut config = SessionConfig::new(bounds, RasterSize::new(2048, 2048));
        config.tick_interval_ms = 100;
        config
    }

    fn runner(mode: RunMode, duration_secs: f64) -> SessionRunner {
        SessionRunner::new(RunnerConfig {
            mode,
            duration_secs,
            export_interval: 5,
            ..RunnerConfig::default()
        })
    }

    #[test]
    fn test_run_mode_parse() {
        assert_eq!("sim".parse::<RunMode>().unwrap(), RunMode::Simulation);
        assert_eq!("LIVE".parse::<RunMode>().unwrap(), RunMode::Live);
        assert!("bogus".parse::<RunMode>().is_err());
    }

    #[test]
    fn test_simulation_run() {
        let (summary, export) = runner(RunMode::Simulation, 2.0)
            .run(session_config(), lap(), &[])
            .unwrap();

        assert_eq!(summary.ticks, 20);
        assert_eq!(summary.player_fixes, 20);
        assert_eq!(summary.ghost_fixes, 0);
        assert_eq!(summary.max_gap_m, None);
        assert_relative_eq!(summary.final_race_time_secs, 1.9, epsilon = 1e-9);

        // Ticks 1, 6, 11, 16
        assert_eq!(summary.frames_exported, 4);
        assert_eq!(export.frames[1].tick, 6);
        assert_eq!(export.mode, "simulation");
    }

    #[test]
    fn test_live_run_without_noise_tracks_ghost() {
        let runner = SessionRunner::new(RunnerConfig {
            mode: RunMode::Live,
            duration_secs: 3.0,
            noise: GpsNoise::none(),
            ..RunnerConfig::default()
        });
        let (summary, export) = runner.run(session_config(), lap(), &[]).unwrap();

        assert_eq!(export.ghost_line.len(), 4);
        assert_eq!(summary.player_fixes, 30);
        assert_eq!(summary.ghost_fixes, 30);
        // Same recording, same pace: player and ghost coincide
        assert!(summary.max_gap_m.unwrap() < 1e-6);
    }

    #[test]
    fn test_live_run_with_faster_pace_opens_gap() {
        let runner = SessionRunner::new(RunnerConfig {
            mode: RunMode::Live,
            duration_secs: 2.0,
            noise: GpsNoise::none(),
            pace: 1.5,
            ..RunnerConfig::default()
        });
        let (summary, _) = runner.run(session_config(), lap(), &[]).unwrap();
        assert!(summary.max_gap_m.unwrap() > 10.0);
    }

    #[test]
    fn test_run_is_deterministic() {
        let make = || SessionRunner::new(RunnerConfig {
            mode: RunMode::Live,
            duration_secs: 1.0,
            ..RunnerConfig::default()
        });
        let (_, a) = make().run(session_config(), lap(), &[]).unwrap();
        let (_, b) = make().run(session_config(), lap(), &[]).unwrap();
        assert_eq!(a.session_id, b.session_id);
        assert_eq!(a.to_json().unwrap(), b.to_json().unwrap());
    }

    #[test]
    fn test_nudges_apply_before_first_frame() {
        let nudges = [NudgeDirection::Up, NudgeDirection::Up, NudgeDirection::Left];
        let (summary, export) = runner(RunMode::Simulation, 1.0)
            .run(session_config(), lap(), &nudges)
            .unwrap();

        assert_relative_eq!(summary.final_calibration.lat_offset, 0.00001, epsilon = 1e-12);
        assert_relative_eq!(summary.final_calibration.lon_offset, -0.000005, epsilon = 1e-12);
        assert_eq!(export.frames[0].events.len(), 3);
        assert!(export.frames[1].events.is_empty());
    }

    #[test]
    fn test_empty_trajectory_runs_without_fixes() {
        let (summary, _) = runner(RunMode::Simulation, 1.0)
            .run(session_config(), Arc::new(TrajectoryStore::empty()), &[])
            .unwrap();
        assert_eq!(summary.ticks, 10);
        assert_eq!(summary.player_fixes, 0);
    }

    #[test]
    fn test_demo_lap() {
        let (store, report) = TrajectoryStore::from_reader(
            include_str!("../../demos/lusail_ghost.csv").as_bytes(),
        );
        // Header row
        assert_eq!(report.skipped_count(), 1);
        assert_eq!(report.accepted, 96);
        assert_eq!(store.samples()[0].time_ms, 0);

        let config = SessionConfig::from_json(include_str!("../../demos/lusail.json")).unwrap();
        let store = Arc::new(store);

        let (summary, export) = runner(RunMode::Simulation, 5.0)
            .run(config.clone(), Arc::clone(&store), &[])
            .unwrap();
        assert_eq!(summary.ticks, 313);
        assert_eq!(export.name, "lusail-short");
        assert_eq!(export.ghost_line.len(), 96);

        let live = SessionRunner::new(RunnerConfig {
            mode: RunMode::Live,
            duration_secs: 5.0,
            ..RunnerConfig::default()
        });
        let (summary, _) = live.run(config, store, &[]).unwrap();
        assert_eq!(summary.ghost_fixes, 313);
        // 2 m GPS noise keeps the player close to the ghost
        assert!(summary.max_gap_m.unwrap() < 20.0);
    }

    #[test]
    fn test_invalid_duration_rejected() {
        let result = runner(RunMode::Simulation, 0.0).run(session_config(), lap(), &[]);
        assert!(matches!(result, Err(RunnerError::InvalidDuration(_))));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = session_config();
        config.zoom_level = 0.0;
        let result = runner(RunMode::Simulation, 1.0).run(config, lap(), &[]);
        assert!(matches!(result, Err(RunnerError::Config(_))));
    }
}
