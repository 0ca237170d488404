//! Subscriber-facing side of a shared feed.

use crate::error::FeedError;
use crate::types::ChangeEvent;
use crossbeam_channel::{Receiver, RecvError, RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::time::Duration;

use super::multicast::{FeedInner, SubscriberId};

/// One delivery on a feed subscription.
///
/// `Error` and `Closed` are terminal: nothing follows them, and the channel
/// disconnects afterwards.
#[derive(Clone, Debug)]
pub enum FeedSignal {
    /// A mutation record from the store.
    Change(ChangeEvent),
    /// The underlying cursor failed.
    Error(FeedError),
    /// The feed closed: the cursor completed its backfill, or the last
    /// subscriber left.
    Closed,
}

impl FeedSignal {
    /// The change record, if this is a `Change` signal.
    pub fn into_change(self) -> Option<ChangeEvent> {
        match self {
            FeedSignal::Change(event) => Some(event),
            _ => None,
        }
    }
}

/// Handle to one subscription on a shared feed.
///
/// Dropping the handle unsubscribes; when the last handle on a feed goes,
/// the underlying cursor is cancelled and the feed deregisters itself.
pub struct FeedSubscription {
    id: SubscriberId,
    feed: Arc<FeedInner>,
    receiver: Receiver<FeedSignal>,
}

impl FeedSubscription {
    pub(crate) fn new(id: SubscriberId, receiver: Receiver<FeedSignal>, feed: Arc<FeedInner>) -> Self {
        Self { id, feed, receiver }
    }

    /// Receive the next signal (blocking).
    pub fn recv(&self) -> Result<FeedSignal, RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a signal (non-blocking).
    pub fn try_recv(&self) -> Result<FeedSignal, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<FeedSignal, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Detach from the feed. Equivalent to dropping the handle.
    pub fn unsubscribe(self) {}
}

impl Drop for FeedSubscription {
    fn drop(&mut self) {
        self.feed.remove_subscriber(self.id);
    }
}
