//! Error types for the ghostlap environment abstraction.

use thiserror::Error;

/// Errors that can occur in the environment abstraction layer.
#[derive(Debug, Error)]
pub enum EnvError {
    /// Every receiver of a live feed has been dropped
    #[error("Live feed closed: {0}")]
    FeedClosed(String),

    /// A fix carried coordinates that cannot be rendered
    #[error("Invalid fix: {0}")]
    InvalidFix(String),
}

impl EnvError {
    /// Creates a feed-closed error.
    pub fn feed_closed(feed: impl std::fmt::Display) -> Self {
        Self::FeedClosed(feed.to_string())
    }

    /// Creates an invalid-fix error.
    pub fn invalid_fix(msg: impl Into<String>) -> Self {
        Self::InvalidFix(msg.into())
    }
}
