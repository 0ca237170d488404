//! The store collaborator surface.
//!
//! The data store being observed is opaque to this crate: it only needs to
//! open a live change cursor with the options in [`FeedConfig`], push change
//! records and failures into a [`CursorSink`], and support cancellation.

use crate::feed::CursorSink;
use crate::types::FeedConfig;

/// A data store that can be observed for changes.
///
/// Implementations push records into the `sink` as they arrive; the sink
/// accepts pushes from any thread and ignores them once the feed has
/// terminated. A store that fails to open its cursor reports the failure
/// through `sink.error(..)` rather than returning an error, which keeps
/// subscription infallible: failures only ever surface on the feed itself.
pub trait ChangeStore: Send + Sync {
    /// Open exactly one live change cursor.
    fn open_cursor(&self, config: &FeedConfig, sink: CursorSink) -> Box<dyn Cursor>;
}

/// A live change cursor held open against a store.
pub trait Cursor: Send {
    /// Release the underlying connection.
    ///
    /// Called at most once by the feed, but must tolerate late delivery:
    /// pushes into the sink that race the cancel are discarded on the feed
    /// side, not here.
    fn cancel(&self);
}
