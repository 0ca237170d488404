//! Multicast change feeds.
//!
//! A [`SharedFeed`] wraps one live change cursor into a stream shared by any
//! number of subscribers:
//!
//! - the cursor is not opened until the first subscriber attaches
//! - later subscribers join the same running cursor
//! - every record is delivered to every current subscriber, in order
//! - when the subscriber count returns to zero, the cursor is cancelled and
//!   the feed's teardown hook runs
//!
//! A store failure terminates the feed for all subscribers; there is no
//! retry inside the feed. Re-acquiring from the registry builds a fresh one.
//!
//! # Example
//!
//! ```ignore
//! let feed = SharedFeed::open(store, FeedConfig::default());
//! let sub = feed.subscribe();
//!
//! loop {
//!     match sub.recv() {
//!         Ok(FeedSignal::Change(event)) => println!("changed: {}", event.id),
//!         Ok(FeedSignal::Error(e)) => {
//!             eprintln!("feed failed: {e}");
//!             break;
//!         }
//!         Ok(FeedSignal::Closed) | Err(_) => break,
//!     }
//! }
//! ```

mod handle;
mod multicast;

pub use handle::{FeedSignal, FeedSubscription};
pub use multicast::{CursorSink, SharedFeed};
