//! ghostlap Environment Abstraction Layer
//!
//! This crate provides the seams that let the ghostlap engines run against
//! either a **live** positioning feed or a **replayed** trajectory, on either
//! the wall clock or a virtual clock.
//!
//! # Core Concept: Capabilities, not flags
//!
//! The race loop never asks "are we simulating?". It is composed once with:
//! - a [`RaceClock`] (`now()`, `sleep()`)
//! - one [`PositionSource`] for the player
//! - an optional [`PositionSource`] for the ghost
//!
//! # Example
//!
//! ```ignore
//! use ghostlap_env::{LiveFeed, PositionSource, TokioClock};
//!
//! let (sender, mut player) = LiveFeed::channel();
//! sender.publish(fix)?;
//! let latest = player.current_position(race_time);
//! ```

mod context;
mod source;
mod live;
mod types;
mod error;
mod tokio_impl;

pub use context::RaceClock;
pub use source::PositionSource;
pub use live::{LiveFeed, LiveFeedSender};
pub use types::{Fix, SessionId};
pub use error::EnvError;
pub use tokio_impl::TokioClock;
