//! Memoized key to content cache for remote resources.
//!
//! Each key owns a `OnceCell`, so a slow fetch only blocks callers asking
//! for the same key. A fetch runs at most once per key for the life of the
//! cache; failures are not cached and leave no entry behind.

use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use tracing::debug;

use crate::error::FetchError;

type Slot = Arc<OnceCell<Arc<str>>>;

#[derive(Debug, Default)]
pub struct ResourceCache {
    slots: DashMap<String, Slot>,
}

impl ResourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache key for a stylesheet held in the object store
    pub fn stylesheet_key(bucket: &str, key: &str) -> String {
        format!("s3://{}/{}", bucket, key)
    }

    fn cached(&self, key: &str) -> Option<Arc<str>> {
        self.slots.get(key).and_then(|slot| slot.value().get().cloned())
    }

    /// Cached content for `key`, calling `fetch` on a miss.
    ///
    /// Concurrent callers for the same cold key wait for the first fetch
    /// and share its result. When that fetch fails a waiting caller runs
    /// its own.
    pub fn get_or_fetch<F, E>(&self, key: &str, fetch: F) -> Result<Arc<str>, FetchError>
    where
        F: FnOnce() -> Result<String, E>,
        E: std::fmt::Display,
    {
        if let Some(value) = self.cached(key) {
            debug!(key, "resource cache hit");
            return Ok(value);
        }

        // Clone the cell out so no shard lock is held while fetching.
        let slot = Arc::clone(self.slots.entry(key.to_string()).or_default().value());
        let mut fetched = false;
        let result = slot.get_or_try_init(|| {
            fetched = true;
            debug!(key, "resource cache miss");
            fetch().map(Arc::<str>::from).map_err(|e| FetchError {
                key: key.to_string(),
                message: e.to_string(),
            })
        });

        match result {
            Ok(value) => {
                if !fetched {
                    debug!(key, "resource cache hit");
                }
                Ok(Arc::clone(value))
            }
            Err(e) => {
                self.slots
                    .remove_if(key, |_, current| Arc::ptr_eq(current, &slot) && current.get().is_none());
                Err(e)
            }
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.cached(key).is_some()
    }

    /// Number of populated entries
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.value().get().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry; fetches in flight finish into detached cells
    pub fn clear(&self) {
        let entries = self.slots.len();
        if entries > 0 {
            debug!(entries, "resource cache cleared");
        }
        self.slots.clear();
    }
}
