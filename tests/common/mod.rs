//! Shared mock store for integration tests.

#![allow(dead_code)]

use feedmux::{ChangeEvent, ChangeStore, Cursor, CursorSink, FeedConfig, FeedError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Scriptable store collaborator: records every cursor open and cancel,
/// and keeps the latest sink so tests can push events at will.
pub struct MockStore {
    opens: Mutex<Vec<FeedConfig>>,
    cancels: Arc<AtomicUsize>,
    sink: Mutex<Option<CursorSink>>,
}

pub struct MockCursor {
    cancels: Arc<AtomicUsize>,
}

impl Cursor for MockCursor {
    fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }
}

impl MockStore {
    pub fn new() -> Arc<MockStore> {
        Arc::new(MockStore {
            opens: Mutex::new(Vec::new()),
            cancels: Arc::new(AtomicUsize::new(0)),
            sink: Mutex::new(None),
        })
    }

    /// Upcast for registry calls.
    pub fn as_store(self: &Arc<Self>) -> Arc<dyn ChangeStore> {
        Arc::clone(self) as Arc<dyn ChangeStore>
    }

    pub fn open_count(&self) -> usize {
        self.opens.lock().len()
    }

    pub fn cancel_count(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }

    /// Config the most recent cursor was opened with.
    pub fn last_config(&self) -> FeedConfig {
        self.opens.lock().last().expect("no cursor opened").clone()
    }

    /// Push a change record through the live cursor.
    pub fn emit(&self, event: ChangeEvent) {
        let sink = self.sink.lock().clone();
        sink.expect("cursor not open").change(event);
    }

    /// Fail the live cursor.
    pub fn fail(&self, error: FeedError) {
        let sink = self.sink.lock().clone();
        sink.expect("cursor not open").error(error);
    }

    /// Complete the live cursor (non-live backfill finished).
    pub fn complete(&self) {
        let sink = self.sink.lock().clone();
        sink.expect("cursor not open").close();
    }
}

impl ChangeStore for MockStore {
    fn open_cursor(&self, config: &FeedConfig, sink: CursorSink) -> Box<dyn Cursor> {
        self.opens.lock().push(config.clone());
        *self.sink.lock() = Some(sink);
        Box::new(MockCursor {
            cancels: Arc::clone(&self.cancels),
        })
    }
}

/// Install a test subscriber for tracing output; safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}
