//! Process-wide cache of shared feeds, one per store.

use crate::feed::SharedFeed;
use crate::filter::FilteredFeed;
use crate::store::ChangeStore;
use crate::types::FeedConfig;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Cache key: the identity of a store handle, not its contents.
///
/// Two distinct store connections with identical configuration stay
/// distinct entries. The entry holds the store's `Arc` strongly, so the
/// address cannot be reused while the entry is alive.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
struct StoreKey(usize);

impl StoreKey {
    fn of(store: &Arc<dyn ChangeStore>) -> Self {
        StoreKey(Arc::as_ptr(store) as *const () as usize)
    }
}

struct RegistryInner {
    entries: Mutex<HashMap<StoreKey, SharedFeed>>,
}

/// Caches at most one [`SharedFeed`] per store.
///
/// Construct one per application root and pass it by reference to anything
/// that needs change feeds. There is no explicit release: a cached entry
/// removes itself when its subscriber count returns to zero or its cursor
/// terminates, and the next [`acquire`](FeedRegistry::acquire) for that
/// store builds a fresh one.
pub struct FeedRegistry {
    inner: Arc<RegistryInner>,
}

impl FeedRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                entries: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Return the shared feed for `store`, building it on first demand.
    ///
    /// On a cache hit the `config` argument is ignored: the configuration
    /// of the first caller holds for the lifetime of the cached entry
    /// (first-writer-wins). This mirrors the reference behavior and is
    /// intentional, not a merge waiting to happen.
    ///
    /// Never fails; store failures surface on the returned feed.
    pub fn acquire(&self, store: &Arc<dyn ChangeStore>, config: FeedConfig) -> SharedFeed {
        let key = StoreKey::of(store);
        let mut entries = self.inner.entries.lock();
        if let Some(feed) = entries.get(&key) {
            return feed.clone();
        }

        let registry = Arc::downgrade(&self.inner);
        let feed = SharedFeed::with_teardown(
            Arc::clone(store),
            config,
            Some(Box::new(move || {
                if let Some(registry) = registry.upgrade() {
                    registry.entries.lock().remove(&key);
                }
            })),
        );
        entries.insert(key, feed.clone());
        feed
    }

    /// [`acquire`](FeedRegistry::acquire) composed with the internal-document
    /// filter. This is the stream consumers subscribe to.
    pub fn changes(&self, store: &Arc<dyn ChangeStore>, config: FeedConfig) -> FilteredFeed {
        FilteredFeed::new(self.acquire(store, config))
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.entries.lock().is_empty()
    }
}

impl Default for FeedRegistry {
    fn default() -> Self {
        Self::new()
    }
}
