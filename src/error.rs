//! Error types for the feed multiplexer.

use thiserror::Error;

/// Terminal failures reported on a shared feed.
///
/// Errors are `Clone` because a single store failure fans out to every
/// current subscriber and is retained as the feed's terminal marker.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FeedError {
    /// The underlying cursor lost its connection to the store
    /// (network loss, store closed, auth failure). Not retried; the
    /// shared feed terminates for all subscribers.
    #[error("store connection error: {0}")]
    Connection(String),

    /// The store's idle timeout elapsed on the cursor.
    #[error("change cursor timed out")]
    Timeout,
}

/// Result type for feed operations.
pub type Result<T> = std::result::Result<T, FeedError>;
