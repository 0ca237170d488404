//! Dropping internal bookkeeping documents from a feed.
//!
//! Stores record index definitions and similar bookkeeping as ordinary
//! documents under a reserved name prefix. Those mutations ride the same
//! change sequence as user data but are never user-visible, so the filter
//! sits between the shared feed and consumers. It is applied downstream of
//! the multicast boundary: filtering never multiplies cursor opens, and a
//! filtered subscriber counts toward the feed's refcount like any other.

use crate::feed::{FeedSignal, FeedSubscription, SharedFeed};
use crossbeam_channel::{RecvError, RecvTimeoutError, TryRecvError};
use std::time::{Duration, Instant};

/// Reserved prefix for index-definition documents.
const INTERNAL_PREFIX: &str = "_design/";

/// Whether a document id denotes internal bookkeeping rather than user data.
pub fn is_internal_id(id: &str) -> bool {
    id.starts_with(INTERNAL_PREFIX)
}

/// A [`SharedFeed`] view that hides internal bookkeeping documents.
#[derive(Clone)]
pub struct FilteredFeed {
    feed: SharedFeed,
}

impl FilteredFeed {
    pub fn new(feed: SharedFeed) -> Self {
        Self { feed }
    }

    /// Attach a subscriber that only sees user-visible changes. Lifecycle
    /// is exactly that of a plain subscriber: this call can open the
    /// cursor, and dropping the handle can close it.
    pub fn subscribe(&self) -> FilteredSubscription {
        FilteredSubscription {
            inner: self.feed.subscribe(),
        }
    }

    /// The unfiltered feed underneath.
    pub fn shared(&self) -> &SharedFeed {
        &self.feed
    }
}

/// Subscription handle that skips internal change events.
///
/// Terminal signals pass through unchanged, in order.
pub struct FilteredSubscription {
    inner: FeedSubscription,
}

impl FilteredSubscription {
    /// Receive the next user-visible signal (blocking).
    pub fn recv(&self) -> Result<FeedSignal, RecvError> {
        loop {
            match self.inner.recv()? {
                FeedSignal::Change(event) if is_internal_id(&event.id) => continue,
                signal => return Ok(signal),
            }
        }
    }

    /// Try to receive a user-visible signal (non-blocking).
    pub fn try_recv(&self) -> Result<FeedSignal, TryRecvError> {
        loop {
            match self.inner.try_recv()? {
                FeedSignal::Change(event) if is_internal_id(&event.id) => continue,
                signal => return Ok(signal),
            }
        }
    }

    /// Receive a user-visible signal with timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<FeedSignal, RecvTimeoutError> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.inner.recv_timeout(remaining)? {
                FeedSignal::Change(event) if is_internal_id(&event.id) => continue,
                signal => return Ok(signal),
            }
        }
    }

    /// Detach from the feed. Equivalent to dropping the handle.
    pub fn unsubscribe(self) {}
}
