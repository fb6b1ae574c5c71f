//! ghostlap Deterministic Replay Harness
//!
//! Runs a full race session without a screen or a phone: time is virtual,
//! GPS is simulated from a recorded lap, and every frame the compositor
//! produces can be exported as JSON.
//!
//! # Core Principle: Everything from the seed
//!
//! - **Time**: [`SimClock`] only moves when the runner advances it
//! - **GPS**: [`GpsOracle`] perturbs the true position with seeded noise
//! - **Identity**: the session id is derived from the seed
//!
//! Same seed + same trajectory + same config = byte-identical export.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                    SessionRunner                     │
//! │                                                      │
//! │  ┌───────────┐  fixes  ┌──────────┐                  │
//! │  │ GpsOracle ├────────►│ LiveFeed ├──┐               │
//! │  └───────────┘         └──────────┘  │ player        │
//! │                                      ▼               │
//! │  ┌──────────┐   ghost          ┌─────────────┐       │
//! │  │  Replay  ├─────────────────►│ RaceSession ├──► FrameRecord
//! │  └──────────┘                  └──────▲──────┘       │
//! │                                       │ now()        │
//! │                                 ┌─────┴────┐         │
//! │                                 │ SimClock │         │
//! │                                 └──────────┘         │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use ghostlap_sim::{RunMode, RunnerConfig, SessionRunner};
//!
//! let runner = SessionRunner::new(RunnerConfig {
//!     mode: RunMode::Live,
//!     seed: 42,
//!     ..Default::default()
//! });
//! let (summary, export) = runner.run(session_config, store, &[])?;
//! ```

mod context;
mod oracle;
pub mod runner;
pub mod exporter;

pub use context::SimClock;
pub use oracle::{GpsNoise, GpsOracle, METERS_PER_DEGREE};
pub use runner::{RunMode, RunSummary, RunnerConfig, RunnerError, SessionRunner};
pub use exporter::{FrameRecord, GeoPoint, SessionEvent, SessionExport};
