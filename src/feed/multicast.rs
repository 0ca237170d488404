//! Multicast change feed over a single live cursor.

use crate::error::FeedError;
use crate::store::{ChangeStore, Cursor};
use crate::types::{ChangeEvent, FeedConfig};
use crossbeam_channel::{bounded, Sender};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

use super::handle::{FeedSignal, FeedSubscription};

/// Per-subscriber buffered events before the subscriber is dropped.
const EVENT_BUFFER: usize = 1024;

/// Cleanup hook run exactly once when the feed tears down.
pub(crate) type TeardownHook = Box<dyn FnOnce() + Send>;

/// Identifier for one subscriber on a shared feed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct SubscriberId(pub(crate) u64);

/// Terminal state of a feed. Once set it never changes.
#[derive(Clone, Debug)]
enum Terminal {
    /// The cursor reported a failure.
    Error(FeedError),
    /// The cursor completed or the last subscriber left.
    Closed,
}

impl Terminal {
    fn signal(&self) -> FeedSignal {
        match self {
            Terminal::Error(error) => FeedSignal::Error(error.clone()),
            Terminal::Closed => FeedSignal::Closed,
        }
    }
}

struct FeedState {
    subscribers: HashMap<SubscriberId, Sender<FeedSignal>>,
    cursor: Option<Box<dyn Cursor>>,
    /// True while the first subscriber is opening the cursor outside the lock.
    opening: bool,
    terminal: Option<Terminal>,
}

pub(crate) struct FeedInner {
    store: Arc<dyn ChangeStore>,
    config: FeedConfig,
    state: Mutex<FeedState>,
    teardown: Mutex<Option<TeardownHook>>,
    next_id: AtomicU64,
}

impl FeedInner {
    /// Deliver a change to every current subscriber, in arrival order.
    ///
    /// Runs under the state lock: every subscriber has this event queued
    /// before the next one is processed. Subscribers with a full buffer
    /// are dropped.
    pub(crate) fn push_change(&self, event: ChangeEvent) {
        let drained = {
            let mut state = self.state.lock();
            if state.terminal.is_some() {
                return;
            }
            let mut dropped = Vec::new();
            for (id, sender) in state.subscribers.iter() {
                if sender.try_send(FeedSignal::Change(event.clone())).is_err() {
                    dropped.push(*id);
                }
            }
            for id in dropped {
                state.subscribers.remove(&id);
                warn!(subscriber = id.0, "dropping slow feed subscriber");
            }
            state.subscribers.is_empty()
        };
        if drained {
            self.shut_down(Terminal::Closed);
        }
    }

    /// Terminal error from the store: fan out to all subscribers, then
    /// tear down.
    pub(crate) fn push_error(&self, error: FeedError) {
        self.shut_down(Terminal::Error(error));
    }

    /// Terminal completion from the store (non-live cursor caught up).
    pub(crate) fn push_close(&self) {
        self.shut_down(Terminal::Closed);
    }

    pub(crate) fn remove_subscriber(&self, id: SubscriberId) {
        let drained = {
            let mut state = self.state.lock();
            state.subscribers.remove(&id).is_some()
                && state.subscribers.is_empty()
                && state.terminal.is_none()
        };
        if drained {
            self.shut_down(Terminal::Closed);
        }
    }

    /// Cancel the cursor, notify subscribers of the terminal signal, and
    /// run the teardown hook. Idempotent: the second invocation (e.g. a
    /// consumer unsubscribe racing a store error) is a no-op.
    fn shut_down(&self, terminal: Terminal) {
        let (cursor, senders) = {
            let mut state = self.state.lock();
            if state.terminal.is_some() {
                return;
            }
            state.terminal = Some(terminal.clone());
            let senders: Vec<_> = state.subscribers.drain().map(|(_, s)| s).collect();
            (state.cursor.take(), senders)
        };

        // Best effort: a full buffer loses the terminal signal and the
        // subscriber observes the channel disconnect instead.
        for sender in senders {
            let _ = sender.try_send(terminal.signal());
        }

        // Cancel outside the lock: a store may push into the sink
        // synchronously while cancelling.
        if let Some(cursor) = cursor {
            cursor.cancel();
        }

        let hook = self.teardown.lock().take();
        if let Some(hook) = hook {
            hook();
        }
        debug!("change feed torn down");
    }
}

/// A multicast stream of [`ChangeEvent`]s backed by at most one live cursor.
///
/// The cursor opens when the first subscriber attaches and is cancelled when
/// the subscriber count returns to zero or the store reports a terminal
/// signal. Cloning the handle shares the same feed; it does not subscribe.
///
/// A feed that has terminated stays terminated: subscribing to it yields the
/// retained terminal signal immediately. A fresh feed is obtained by
/// acquiring from the registry again.
#[derive(Clone)]
pub struct SharedFeed {
    inner: Arc<FeedInner>,
}

impl SharedFeed {
    /// Wrap a store in a multicast feed. The cursor is not opened until the
    /// first subscriber attaches.
    pub fn open(store: Arc<dyn ChangeStore>, config: FeedConfig) -> Self {
        Self::with_teardown(store, config, None)
    }

    pub(crate) fn with_teardown(
        store: Arc<dyn ChangeStore>,
        config: FeedConfig,
        hook: Option<TeardownHook>,
    ) -> Self {
        Self {
            inner: Arc::new(FeedInner {
                store,
                config,
                state: Mutex::new(FeedState {
                    subscribers: HashMap::new(),
                    cursor: None,
                    opening: false,
                    terminal: None,
                }),
                teardown: Mutex::new(hook),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Attach a subscriber. The first subscriber opens the underlying
    /// cursor; later ones share it. Dropping the returned handle
    /// unsubscribes.
    pub fn subscribe(&self) -> FeedSubscription {
        let inner = &self.inner;
        let id = SubscriberId(inner.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = bounded(EVENT_BUFFER);

        let open = {
            let mut state = inner.state.lock();
            if let Some(terminal) = &state.terminal {
                let _ = sender.try_send(terminal.signal());
                return FeedSubscription::new(id, receiver, Arc::clone(inner));
            }
            state.subscribers.insert(id, sender);
            if state.subscribers.len() == 1 && state.cursor.is_none() && !state.opening {
                state.opening = true;
                true
            } else {
                false
            }
        };

        if open {
            // Opened outside the state lock: the store may push into the
            // sink synchronously before returning the cursor.
            debug!(config = ?inner.config, "opening change cursor");
            let sink = CursorSink {
                feed: Arc::downgrade(inner),
            };
            let cursor = inner.store.open_cursor(&inner.config, sink);
            let mut state = inner.state.lock();
            state.opening = false;
            if state.terminal.is_some() {
                // The store terminated during open; teardown already ran
                // with no cursor to cancel, so cancel the orphan here.
                drop(state);
                cursor.cancel();
            } else {
                state.cursor = Some(cursor);
            }
        }

        FeedSubscription::new(id, receiver, Arc::clone(inner))
    }

    /// Number of currently attached subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.state.lock().subscribers.len()
    }

    /// Whether the feed has delivered its terminal signal.
    pub fn is_terminated(&self) -> bool {
        self.inner.state.lock().terminal.is_some()
    }
}

/// Push side of a cursor: the store's callbacks feed it.
///
/// Holds the feed weakly so a lingering cursor cannot keep a torn-down feed
/// alive; every push after the feed terminates is a no-op.
#[derive(Clone)]
pub struct CursorSink {
    feed: Weak<FeedInner>,
}

impl CursorSink {
    /// Push one change record.
    pub fn change(&self, event: ChangeEvent) {
        if let Some(feed) = self.feed.upgrade() {
            feed.push_change(event);
        }
    }

    /// Report a terminal failure. Every current subscriber receives it,
    /// then the feed tears down.
    pub fn error(&self, error: FeedError) {
        if let Some(feed) = self.feed.upgrade() {
            feed.push_error(error);
        }
    }

    /// Report completion (a non-live cursor finished its backfill).
    pub fn close(&self) {
        if let Some(feed) = self.feed.upgrade() {
            feed.push_close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Sequence;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    /// Store that records opens/cancels and exposes the sink for pushing.
    struct TestStore {
        opens: AtomicUsize,
        cancels: Arc<AtomicUsize>,
        sink: Mutex<Option<CursorSink>>,
    }

    struct TestCursor {
        cancels: Arc<AtomicUsize>,
    }

    impl Cursor for TestCursor {
        fn cancel(&self) {
            self.cancels.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl TestStore {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                opens: AtomicUsize::new(0),
                cancels: Arc::new(AtomicUsize::new(0)),
                sink: Mutex::new(None),
            })
        }

        fn emit(&self, event: ChangeEvent) {
            let sink = self.sink.lock().clone();
            sink.expect("cursor not open").change(event);
        }

        fn fail(&self, error: FeedError) {
            let sink = self.sink.lock().clone();
            sink.expect("cursor not open").error(error);
        }
    }

    impl ChangeStore for TestStore {
        fn open_cursor(&self, _config: &FeedConfig, sink: CursorSink) -> Box<dyn Cursor> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            *self.sink.lock() = Some(sink);
            Box::new(TestCursor {
                cancels: Arc::clone(&self.cancels),
            })
        }
    }

    fn test_feed(store: &Arc<TestStore>) -> SharedFeed {
        let handle: Arc<dyn ChangeStore> = Arc::clone(store) as Arc<dyn ChangeStore>;
        SharedFeed::open(handle, FeedConfig::default())
    }

    #[test]
    fn test_cursor_opens_lazily() {
        let store = TestStore::new();
        let feed = test_feed(&store);
        assert_eq!(store.opens.load(Ordering::SeqCst), 0);

        let sub = feed.subscribe();
        assert_eq!(store.opens.load(Ordering::SeqCst), 1);

        // Second subscriber shares the cursor
        let sub2 = feed.subscribe();
        assert_eq!(store.opens.load(Ordering::SeqCst), 1);

        drop(sub);
        drop(sub2);
    }

    #[test]
    fn test_fanout_preserves_order() {
        let store = TestStore::new();
        let feed = test_feed(&store);
        let a = feed.subscribe();
        let b = feed.subscribe();

        for seq in 1..=3 {
            store.emit(ChangeEvent::new(format!("docs/{seq}"), Sequence(seq)));
        }

        for sub in [&a, &b] {
            for seq in 1..=3 {
                match sub.recv_timeout(Duration::from_millis(100)).unwrap() {
                    FeedSignal::Change(event) => assert_eq!(event.seq, Sequence(seq)),
                    other => panic!("expected change, got {:?}", other),
                }
            }
        }
    }

    #[test]
    fn test_last_unsubscribe_cancels_once() {
        let store = TestStore::new();
        let feed = test_feed(&store);

        let sub = feed.subscribe();
        let sub2 = feed.subscribe();
        drop(sub);
        assert_eq!(store.cancels.load(Ordering::SeqCst), 0);

        drop(sub2);
        assert_eq!(store.cancels.load(Ordering::SeqCst), 1);
        assert!(feed.is_terminated());
    }

    #[test]
    fn test_error_fans_out_and_tears_down_once() {
        let store = TestStore::new();
        let feed = test_feed(&store);
        let a = feed.subscribe();
        let b = feed.subscribe();

        store.fail(FeedError::Connection("socket closed".into()));

        for sub in [&a, &b] {
            match sub.recv_timeout(Duration::from_millis(100)).unwrap() {
                FeedSignal::Error(FeedError::Connection(msg)) => {
                    assert_eq!(msg, "socket closed");
                }
                other => panic!("expected error, got {:?}", other),
            }
        }

        // Unsubscribing after the error is the double-teardown race;
        // absorbed as a no-op.
        drop(a);
        drop(b);
        assert_eq!(store.cancels.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_no_events_before_subscribe() {
        let store = TestStore::new();
        let feed = test_feed(&store);
        let a = feed.subscribe();

        store.emit(ChangeEvent::new("docs/1", Sequence(1)));

        let late = feed.subscribe();
        store.emit(ChangeEvent::new("docs/2", Sequence(2)));

        // The late subscriber sees only the second event.
        match late.recv_timeout(Duration::from_millis(100)).unwrap() {
            FeedSignal::Change(event) => assert_eq!(event.id, "docs/2"),
            other => panic!("expected change, got {:?}", other),
        }

        drop(a);
        drop(late);
    }

    #[test]
    fn test_subscribe_after_terminal_yields_terminal() {
        let store = TestStore::new();
        let feed = test_feed(&store);
        let sub = feed.subscribe();
        store.fail(FeedError::Timeout);
        drop(sub);

        let late = feed.subscribe();
        assert!(matches!(
            late.recv_timeout(Duration::from_millis(100)),
            Ok(FeedSignal::Error(FeedError::Timeout))
        ));
        // No reopen happened
        assert_eq!(store.opens.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_slow_subscriber_is_dropped() {
        let store = TestStore::new();
        let feed = test_feed(&store);
        let slow = feed.subscribe();
        let keeper = feed.subscribe();

        // Overflow the slow subscriber's buffer without draining it.
        for seq in 0..(EVENT_BUFFER as u64 + 10) {
            store.emit(ChangeEvent::new("docs/flood", Sequence(seq)));
            // Keep the other subscriber drained so only `slow` overflows.
            let _ = keeper.try_recv();
        }

        assert_eq!(feed.subscriber_count(), 1);
        drop(slow);
        drop(keeper);
    }
}
