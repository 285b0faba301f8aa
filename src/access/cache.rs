//! Result cache keyed by request signature.
//!
//! [`ResultCache`] stores one value per [`Query`] (text plus parameters,
//! compared bit-exactly). Entries are never updated, expired or evicted:
//! a cached value is returned verbatim until the cache itself is dropped.
//!
//! # Concurrency
//!
//! Each signature owns a [`tokio::sync::OnceCell`]. Concurrent misses on
//! the same signature run `compute` once; the other callers wait for that
//! result. A failed `compute` leaves the cell empty, so the next caller
//! computes again; once nobody waits on it the empty cell is dropped.
//! Misses on different signatures never wait on each other.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{OnceCell, RwLock};

use crate::domain::Query;
use crate::error::DataGateError;

/// A cached value and the instant it was stored.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The computed result.
    pub value: V,
    /// When `compute` finished for this signature.
    pub cached_at: DateTime<Utc>,
}

type Slot<V> = Arc<OnceCell<CacheEntry<V>>>;

/// Memoizes read results by request signature.
///
/// Owned by the data-access layer instance; its lifetime is the cache
/// lifetime.
#[derive(Debug)]
pub struct ResultCache<V> {
    entries: RwLock<HashMap<Query, Slot<V>>>,
}

impl<V: Clone> ResultCache<V> {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the cached value for `signature`, computing it on a miss.
    ///
    /// # Errors
    ///
    /// Returns `compute`'s error unchanged; nothing is cached in that case.
    pub async fn get_or_compute<F, Fut>(
        &self,
        signature: &Query,
        compute: F,
    ) -> Result<V, DataGateError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, DataGateError>>,
    {
        let slot = self.slot(signature).await;
        if let Some(entry) = slot.get() {
            tracing::debug!(query = signature.text(), "cache hit");
            return Ok(entry.value.clone());
        }

        let computed = slot
            .get_or_try_init(|| async move {
                tracing::debug!(query = signature.text(), "cache miss; computing");
                let value = compute().await?;
                Ok::<_, DataGateError>(CacheEntry {
                    value,
                    cached_at: Utc::now(),
                })
            })
            .await;
        match computed {
            Ok(entry) => Ok(entry.value.clone()),
            Err(err) => {
                self.discard_empty(signature, &slot).await;
                Err(err)
            }
        }
    }

    /// Returns the cached value for `signature`, if any.
    pub async fn get(&self, signature: &Query) -> Option<V> {
        self.entry(signature).await.map(|e| e.value)
    }

    /// Returns the cached value and its timestamp for `signature`, if any.
    pub async fn entry(&self, signature: &Query) -> Option<CacheEntry<V>> {
        let map = self.entries.read().await;
        map.get(signature).and_then(|slot| slot.get().cloned())
    }

    /// Returns `true` if a value is cached for `signature`.
    pub async fn contains(&self, signature: &Query) -> bool {
        let map = self.entries.read().await;
        map.get(signature).is_some_and(|slot| slot.initialized())
    }

    /// Number of cached values.
    pub async fn len(&self) -> usize {
        let map = self.entries.read().await;
        map.values().filter(|slot| slot.initialized()).count()
    }

    /// Returns `true` if nothing has been cached yet.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Returns the slot for `signature`, inserting an empty one if needed.
    async fn slot(&self, signature: &Query) -> Slot<V> {
        if let Some(slot) = self.entries.read().await.get(signature) {
            return Arc::clone(slot);
        }
        let mut map = self.entries.write().await;
        Arc::clone(map.entry(signature.clone()).or_default())
    }

    /// Drops the slot for `signature` after a failed compute, unless it has
    /// been filled meanwhile or another caller is still waiting on it.
    async fn discard_empty(&self, signature: &Query, slot: &Slot<V>) {
        let mut map = self.entries.write().await;
        let removable = map.get(signature).is_some_and(|current| {
            Arc::ptr_eq(current, slot) && !current.initialized() && Arc::strong_count(slot) <= 2
        });
        if removable {
            map.remove(signature);
        }
    }
}

impl<V: Clone> Default for ResultCache<V> {
    fn default() -> Self {
        Self::new()
    }
}
