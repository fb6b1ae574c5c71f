//! Position source abstraction for the race loop.

use crate::types::Fix;
use std::time::Duration;

/// Abstraction over "where is this vehicle right now".
///
/// # Implementations
///
/// - **Replay**: interpolates a recorded trajectory at the race time
/// - **Live**: returns the most recent fix published by a positioning feed
///
/// The race loop is composed once with the sources it needs; it never
/// branches on which kind it was given.
pub trait PositionSource: Send {
    /// Returns the position for the given race time.
    ///
    /// # Returns
    /// * `Some(fix)` - A position is available
    /// * `None` - Nothing to show yet (empty trajectory, no fix received)
    fn current_position(&mut self, race_time: Duration) -> Option<Fix>;

    /// Short name for logging.
    fn label(&self) -> &str;
}

impl<P: PositionSource + ?Sized> PositionSource for Box<P> {
    fn current_position(&mut self, race_time: Duration) -> Option<Fix> {
        (**self).current_position(race_time)
    }

    fn label(&self) -> &str {
        (**self).label()
    }
}
