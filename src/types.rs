//! Core types for the feed multiplexer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Position in a store's change sequence.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Sequence(pub u64);

impl fmt::Debug for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Seq({})", self.0)
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where the cursor starts reading the change sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Since {
    /// Skip history; deliver only changes made after the cursor opens.
    Now,
    /// Backfill from the given sequence position.
    Seq(Sequence),
}

impl Default for Since {
    fn default() -> Self {
        Since::Now
    }
}

/// Options for opening a change cursor.
///
/// Supplied by the first consumer to acquire a feed for a given store;
/// configs from later consumers are ignored while that entry is cached
/// (first-writer-wins). All fields are passed through to the store
/// collaborator opaquely.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeedConfig {
    /// Keep the cursor open after catching up.
    /// Default: true
    pub live: bool,

    /// Attach full document bodies to change records.
    /// Default: true
    pub include_docs: bool,

    /// Deliver historical changes during backfill.
    /// Default: true
    pub return_docs: bool,

    /// Starting position (None sentinel is `Since::Now`).
    pub since: Since,

    /// Idle timeout for the cursor (None = disabled). If it fires, the
    /// store reports an ordinary terminal signal on the shared feed.
    pub timeout: Option<Duration>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            live: true,
            include_docs: true,
            return_docs: true,
            since: Since::Now,
            timeout: None,
        }
    }
}

impl FeedConfig {
    /// Config that backfills from a sequence position before going live.
    pub fn since(seq: Sequence) -> Self {
        Self {
            since: Since::Seq(seq),
            ..Default::default()
        }
    }
}

/// One mutation record from the store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Document identifier.
    pub id: String,

    /// Full document body, present when the feed was opened with
    /// `include_docs`.
    pub doc: Option<serde_json::Value>,

    /// Position of this change in the store's sequence.
    pub seq: Sequence,

    /// Whether this change is a deletion.
    #[serde(default)]
    pub deleted: bool,
}

impl ChangeEvent {
    /// Create a change record without a document body.
    pub fn new(id: impl Into<String>, seq: Sequence) -> Self {
        Self {
            id: id.into(),
            doc: None,
            seq,
            deleted: false,
        }
    }

    /// Attach a document body.
    pub fn with_doc(mut self, doc: serde_json::Value) -> Self {
        self.doc = Some(doc);
        self
    }

    /// Mark this change as a deletion.
    pub fn deleted(mut self) -> Self {
        self.deleted = true;
        self
    }
}
