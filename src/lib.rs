//! # Feed Multiplexer
//!
//! A shared change-feed multiplexer: many independent consumers observe the
//! live mutation stream of a data store, while at most one underlying
//! cursor per store is ever open.
//!
//! ## Core Concepts
//!
//! - **Registry**: identity-keyed cache of store → active shared feed
//! - **Shared feed**: one live cursor, multicast to N subscribers with a
//!   reference-counted lifecycle
//! - **Filter**: drops internal bookkeeping documents (`_design/` prefix)
//!   downstream of the multicast boundary
//!
//! Opening a change cursor holds a live connection, so per-consumer cursors
//! would multiply connections with consumer count. Instead, the first
//! subscriber opens the cursor, later subscribers share it, and the last
//! one out cancels it and evicts the cache entry.
//!
//! ## Example
//!
//! ```ignore
//! use feedmux::{FeedConfig, FeedRegistry, FeedSignal};
//!
//! let registry = FeedRegistry::new();
//!
//! // `store` is any Arc<dyn ChangeStore>
//! let changes = registry.changes(&store, FeedConfig::default());
//! let sub = changes.subscribe();
//!
//! while let Ok(FeedSignal::Change(event)) = sub.recv() {
//!     println!("{} @ {}", event.id, event.seq);
//! }
//! // A terminal error ends the feed for everyone; re-acquire to rebuild.
//! ```

pub mod error;
pub mod feed;
pub mod filter;
pub mod registry;
pub mod store;
pub mod types;

// Re-exports
pub use error::{FeedError, Result};
pub use feed::{CursorSink, FeedSignal, FeedSubscription, SharedFeed};
pub use filter::{is_internal_id, FilteredFeed, FilteredSubscription};
pub use registry::FeedRegistry;
pub use store::{ChangeStore, Cursor};
pub use types::{ChangeEvent, FeedConfig, Sequence, Since};
