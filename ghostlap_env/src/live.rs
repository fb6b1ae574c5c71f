//! Live positioning feed adapter.
//!
//! A positioning provider (GPS callback, socket reader, test harness) holds a
//! [`LiveFeedSender`] and publishes fixes whenever they arrive. The race loop
//! holds the [`LiveFeed`] end and samples the latest fix once per tick.

use crate::error::EnvError;
use crate::source::PositionSource;
use crate::types::Fix;
use std::time::Duration;
use tokio::sync::watch;

/// Publishing half of a live feed.
#[derive(Debug, Clone)]
pub struct LiveFeedSender {
    tx: watch::Sender<Option<Fix>>,
}

impl LiveFeedSender {
    /// Publishes a new fix, replacing the previous one.
    ///
    /// # Returns
    /// * `Ok(())` - The fix is visible to the race loop
    /// * `Err(EnvError::InvalidFix)` - The fix has non-finite coordinates
    /// * `Err(EnvError::FeedClosed)` - The race loop dropped its end
    pub fn publish(&self, fix: Fix) -> Result<(), EnvError> {
        if !fix.is_finite() {
            return Err(EnvError::invalid_fix(format!(
                "non-finite fix at t={}ms",
                fix.time_ms
            )));
        }
        self.tx
            .send(Some(fix))
            .map_err(|_| EnvError::feed_closed("live"))
    }
}

/// Receiving half of a live feed; a [`PositionSource`] for the race loop.
#[derive(Debug)]
pub struct LiveFeed {
    rx: watch::Receiver<Option<Fix>>,
}

impl LiveFeed {
    /// Creates a connected sender/feed pair with no fix yet.
    pub fn channel() -> (LiveFeedSender, LiveFeed) {
        let (tx, rx) = watch::channel(None);
        (LiveFeedSender { tx }, LiveFeed { rx })
    }

    /// The most recent fix, if any has been published.
    pub fn latest(&self) -> Option<Fix> {
        *self.rx.borrow()
    }
}

impl PositionSource for LiveFeed {
    fn current_position(&mut self, _race_time: Duration) -> Option<Fix> {
        // Live fixes are not time-indexed: the newest one wins
        *self.rx.borrow_and_update()
    }

    fn label(&self) -> &str {
        "live"
    }
}
