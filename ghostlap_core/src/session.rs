//! Race Session - the tick loop tying clock, position sources and surface together.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                       RaceSession                        │
//! │   RaceClock ──► race time = now - start                  │
//! │        │                                                 │
//! │        ├──► player: PositionSource ──► CameraState       │
//! │        └──► ghost:  PositionSource ──► GhostState        │
//! │                                          │               │
//! │                     TrackSurface::render ▼               │
//! │                                     RenderFrame          │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Sources are chosen once, at construction:
//! - **Simulation**: the player replays the recorded trajectory
//! - **Live**: the player follows a live feed and the recording is the ghost

use crate::config::{ConfigError, SessionConfig};
use crate::ghostlap_camera::{RenderFrame, TrackSurface};
use crate::ghostlap_space::NudgeDirection;
use crate::ghostlap_time::TrajectoryStore;
use crate::replay::ReplaySource;
use ghostlap_env::{Fix, LiveFeed, PositionSource, RaceClock, SessionId};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Everything produced by one tick.
#[derive(Debug, Clone, Serialize)]
pub struct TickOutput {
    pub tick: u64,
    pub race_time: Duration,
    /// `MM:SS.cc`
    pub lap_time: String,
    pub player_fix: Option<Fix>,
    pub ghost_fix: Option<Fix>,
    pub frame: RenderFrame,
}

/// Formats a race time as `MM:SS.cc` (minutes wrap at an hour).
pub fn format_lap_time(race_time: Duration) -> String {
    let ms = race_time.as_millis();
    let minutes = (ms / 60_000) % 60;
    let seconds = (ms / 1000) % 60;
    let centis = (ms % 1000) / 10;
    format!("{:02}:{:02}.{:02}", minutes, seconds, centis)
}

/// A single race: one clock, one player source, an optional ghost source.
pub struct RaceSession<C: RaceClock> {
    id: SessionId,
    clock: Arc<C>,
    config: SessionConfig,
    surface: TrackSurface,
    player: Box<dyn PositionSource>,
    ghost: Option<Box<dyn PositionSource>>,
    started_at: Option<Duration>,
    tick_count: u64,
}

impl<C: RaceClock> RaceSession<C> {
    /// Creates a session with the given player source and no ghost.
    pub fn new(
        clock: Arc<C>,
        config: SessionConfig,
        player: Box<dyn PositionSource>,
    ) -> Result<Self, ConfigError> {
        let surface = TrackSurface::from_config(&config)?;
        Ok(Self {
            id: SessionId::new(),
            clock,
            config,
            surface,
            player,
            ghost: None,
            started_at: None,
            tick_count: 0,
        })
    }

    /// Simulation mode: the player replays `store`, which is also drawn as
    /// the racing line.
    pub fn simulation(
        clock: Arc<C>,
        config: SessionConfig,
        store: Arc<TrajectoryStore>,
    ) -> Result<Self, ConfigError> {
        let player = ReplaySource::new(Arc::clone(&store)).with_label("sim-player");
        let mut session = Self::new(clock, config, Box::new(player))?;
        session.surface.set_ghost_line(&store);
        Ok(session)
    }

    /// Live mode: the player follows `feed`, the ghost replays `store` over
    /// its racing line.
    pub fn live(
        clock: Arc<C>,
        config: SessionConfig,
        feed: LiveFeed,
        store: Arc<TrajectoryStore>,
    ) -> Result<Self, ConfigError> {
        let ghost = ReplaySource::new(Arc::clone(&store)).with_label("ghost");
        let mut session = Self::new(clock, config, Box::new(feed))?.with_ghost(Box::new(ghost));
        session.surface.set_ghost_line(&store);
        Ok(session)
    }

    /// Adds (or replaces) the ghost source.
    pub fn with_ghost(mut self, ghost: Box<dyn PositionSource>) -> Self {
        self.ghost = Some(ghost);
        self
    }

    /// Overrides the session id (deterministic ids in simulation).
    pub fn with_id(mut self, id: SessionId) -> Self {
        self.id = id;
        self
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Starts the race clock. Calling it again while racing has no effect.
    pub fn start(&mut self) {
        if self.started_at.is_none() {
            let now = self.clock.now();
            self.started_at = Some(now);
            info!(
                "Race {} started: player={} ghost={}",
                self.id,
                self.player.label(),
                self.ghost.as_ref().map(|g| g.label()).unwrap_or("none")
            );
        }
    }

    /// Stops the race; later ticks produce nothing until restarted.
    pub fn stop(&mut self) {
        if let Some(race_time) = self.race_time() {
            info!("Race {} stopped at {}", self.id, format_lap_time(race_time));
        }
        self.started_at = None;
    }

    pub fn is_racing(&self) -> bool {
        self.started_at.is_some()
    }

    /// Time since `start`, or `None` before the race starts.
    pub fn race_time(&self) -> Option<Duration> {
        let start = self.started_at?;
        Some(self.clock.now().saturating_sub(start))
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn surface(&self) -> &TrackSurface {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut TrackSurface {
        &mut self.surface
    }

    /// Applies a calibration nudge between ticks.
    pub fn nudge(&mut self, direction: NudgeDirection) {
        self.surface.nudge(direction);
    }

    /// Runs one tick: samples the sources at the current race time,
    /// updates camera and ghost state, and composes a frame.
    ///
    /// Returns `None` before the race has started.
    pub fn tick(&mut self) -> Option<TickOutput> {
        let race_time = self.race_time()?;
        self.tick_count += 1;

        let player_fix = self.player.current_position(race_time);
        if let Some(fix) = &player_fix {
            self.surface
                .update_player_position(fix.lat, fix.lon, fix.heading_deg);
        }

        let ghost_fix = self
            .ghost
            .as_mut()
            .and_then(|ghost| ghost.current_position(race_time));
        if let Some(fix) = &ghost_fix {
            self.surface.update_ghost_position(fix.lat, fix.lon);
        }

        if self.tick_count % 60 == 0 {
            debug!(
                "tick={} t={} player={:?} ghost_active={}",
                self.tick_count,
                format_lap_time(race_time),
                player_fix.map(|f| (f.lat, f.lon)),
                self.surface.ghost().active
            );
        }

        Some(TickOutput {
            tick: self.tick_count,
            race_time,
            lap_time: format_lap_time(race_time),
            player_fix,
            ghost_fix,
            frame: self.surface.render(),
        })
    }

    /// Starts the race and ticks at the configured interval.
    ///
    /// Stops after `max_ticks` ticks or when the race is stopped from
    /// `on_tick`. Returns the number of ticks run.
    pub async fn run<F>(&mut self, max_ticks: u64, mut on_tick: F) -> u64
    where
        F: FnMut(&mut Self, TickOutput),
    {
        self.start();
        let interval = self.config.tick_interval();
        let mut ticks = 0;

        while ticks < max_ticks {
            let Some(output) = self.tick() else { break };
            ticks += 1;
            on_tick(self, output);
            if !self.is_racing() {
                break;
            }
            self.clock.sleep(interval).await;
        }

        ticks
    }
}
