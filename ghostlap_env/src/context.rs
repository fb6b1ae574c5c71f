//! Race clock trait for the ghostlap tick loop.

use async_trait::async_trait;
use std::time::Duration;

/// The time source driving a race session.
///
/// # Implementations
///
/// - **Production**: `TokioClock` - wraps `Instant` and `tokio::time`
/// - **Simulation**: `SimClock` - a virtual clock advanced by the harness
///
/// # Determinism
///
/// Race time is always derived from `now()`, so a virtual clock makes a
/// whole session reproducible tick for tick.
#[async_trait]
pub trait RaceClock: Send + Sync + 'static {
    /// Returns the monotonic time since the clock was created.
    ///
    /// In simulation, this is the virtual clock time.
    fn now(&self) -> Duration;

    /// Suspends the tick loop for the given duration.
    ///
    /// In production: wraps `tokio::time::sleep`
    /// In simulation: advances the virtual clock
    async fn sleep(&self, duration: Duration);
}
