//! Keyed snapshot store with single-flight loading.

use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use lru::LruCache;
use metrics::counter;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::application::lists::SourceError;
use crate::domain::list_key::ListKey;
use crate::domain::movies::ListSnapshot;

use super::config::CacheConfig;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::snapshots";

const METRIC_CACHE_HIT_TOTAL: &str = "marquee_list_cache_hit_total";
const METRIC_CACHE_MISS_TOTAL: &str = "marquee_list_cache_miss_total";
const METRIC_CACHE_EVICT_TOTAL: &str = "marquee_list_cache_evict_total";

/// Failure of a snapshot load, fanned out to every waiter of that load.
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    #[error(transparent)]
    Source(#[from] SourceError),
    /// The load task died without publishing an outcome.
    #[error("list load aborted before completion")]
    Aborted,
}

type LoadOutcome = Result<Arc<ListSnapshot>, LoadError>;

struct CacheEntry {
    snapshot: Arc<ListSnapshot>,
    expires_at: Instant,
}

struct CacheInner {
    config: CacheConfig,
    entries: RwLock<LruCache<ListKey, CacheEntry>>,
    in_flight: DashMap<ListKey, watch::Receiver<Option<LoadOutcome>>>,
}

/// Keyed store of list snapshots with TTL expiry, an LRU bound on
/// tracked keys, and single-flight deduplication of concurrent loads.
///
/// Cloning is cheap and shares the underlying store.
#[derive(Clone)]
pub struct SnapshotCache {
    inner: Arc<CacheInner>,
}

impl SnapshotCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                entries: RwLock::new(LruCache::new(config.capacity_non_zero())),
                in_flight: DashMap::new(),
                config: config.clone(),
            }),
        }
    }

    /// Return the snapshot for `key`, invoking `loader` on miss or expiry.
    ///
    /// Concurrent callers for the same uncached key share one loader
    /// invocation and observe the same outcome. The load runs as a
    /// detached task: dropping a waiting caller does not cancel it, and a
    /// load that completes after its callers are gone still populates the
    /// cache. Failures are never memoized; the next call for the key
    /// starts a fresh load immediately.
    pub async fn get<L, Fut>(&self, key: ListKey, loader: L) -> LoadOutcome
    where
        L: FnOnce(ListKey) -> Fut + Send + 'static,
        Fut: Future<Output = Result<ListSnapshot, SourceError>> + Send + 'static,
    {
        if let Some(snapshot) = self.inner.lookup(&key) {
            counter!(METRIC_CACHE_HIT_TOTAL).increment(1);
            return Ok(snapshot);
        }
        counter!(METRIC_CACHE_MISS_TOTAL).increment(1);

        let mut rx = match self.inner.in_flight.entry(key.clone()) {
            Entry::Occupied(occupied) => occupied.get().clone(),
            Entry::Vacant(vacant) => {
                // A load may have completed between the lookup above and
                // winning this entry; re-check so its snapshot is reused
                // instead of reloaded.
                if let Some(snapshot) = self.inner.lookup(&key) {
                    return Ok(snapshot);
                }
                let (tx, rx) = watch::channel(None);
                vacant.insert(rx.clone());
                self.spawn_load(key.clone(), loader, tx);
                rx
            }
        };

        loop {
            if let Some(outcome) = rx.borrow_and_update().clone() {
                return outcome;
            }
            if rx.changed().await.is_err() {
                // The load task died without publishing. Drop its stale
                // entry (and only its entry) so the next caller starts a
                // fresh load instead of joining a dead channel.
                self.inner
                    .in_flight
                    .remove_if(&key, |_, stale| stale.same_channel(&rx));
                warn!(
                    target_module = SOURCE,
                    key = %key,
                    "list load task dropped its result channel"
                );
                return Err(LoadError::Aborted);
            }
        }
    }

    /// Number of tracked keys, fresh or expired.
    pub fn len(&self) -> usize {
        rw_read(&self.inner.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn spawn_load<L, Fut>(
        &self,
        key: ListKey,
        loader: L,
        tx: watch::Sender<Option<LoadOutcome>>,
    ) where
        L: FnOnce(ListKey) -> Fut + Send + 'static,
        Fut: Future<Output = Result<ListSnapshot, SourceError>> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            // Dropped on every exit path, including a panicking loader,
            // so the key can never be left pointing at a dead load.
            let in_flight = InFlightGuard {
                inner: Arc::clone(&inner),
                key: key.clone(),
            };

            let outcome = match loader(key.clone()).await {
                Ok(snapshot) => {
                    let snapshot = Arc::new(snapshot);
                    inner.store(key.clone(), Arc::clone(&snapshot));
                    Ok(snapshot)
                }
                Err(err) => {
                    debug!(target_module = SOURCE, key = %key, error = %err, "list load failed");
                    Err(LoadError::Source(err))
                }
            };
            // Stored before the in-flight entry disappears, so a caller
            // that misses the entry finds the snapshot in the store.
            drop(in_flight);
            let _ = tx.send(Some(outcome));
        });
    }
}

struct InFlightGuard {
    inner: Arc<CacheInner>,
    key: ListKey,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.inner.in_flight.remove(&self.key);
    }
}

impl CacheInner {
    fn lookup(&self, key: &ListKey) -> Option<Arc<ListSnapshot>> {
        let mut entries = rw_write(&self.entries, SOURCE, "lookup");
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(Arc::clone(&entry.snapshot)),
            Some(_) => {
                // Expired entries are dropped on observation so dead keys
                // do not pin LRU capacity.
                entries.pop(key);
                None
            }
            None => None,
        }
    }

    fn store(&self, key: ListKey, snapshot: Arc<ListSnapshot>) {
        let entry = CacheEntry {
            snapshot,
            expires_at: Instant::now() + self.config.ttl(),
        };
        let mut entries = rw_write(&self.entries, SOURCE, "store");
        if let Some((evicted, _)) = entries.push(key.clone(), entry) {
            if evicted != key {
                counter!(METRIC_CACHE_EVICT_TOTAL).increment(1);
                debug!(target_module = SOURCE, key = %evicted, "evicted least-recently-used list");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::domain::movies::MovieItem;

    fn key(name: &str) -> ListKey {
        name.parse().expect("test key should parse")
    }

    fn sample_items(count: usize) -> Vec<MovieItem> {
        (0..count)
            .map(|index| MovieItem {
                imdb_id: format!("tt{index:07}"),
                title: format!("Movie {index}"),
                year: Some(2000 + index as i32),
                rank: Some(index as u32 + 1),
                rating: 7.0,
                votes: 100,
            })
            .collect()
    }

    fn cache(ttl_seconds: u64, capacity: usize) -> SnapshotCache {
        SnapshotCache::new(&CacheConfig {
            ttl_seconds,
            capacity,
        })
    }

    #[tokio::test]
    async fn fresh_entry_is_served_without_loading() {
        let cache = cache(3600, 16);
        let loads = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let loads = Arc::clone(&loads);
            let snapshot = cache
                .get(key("top"), move |key| async move {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok(ListSnapshot::new(key, sample_items(2)))
                })
                .await
                .expect("load should succeed");
            assert_eq!(snapshot.len(), 2);
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_ttl_entry_reloads_every_time() {
        let cache = cache(0, 16);
        let loads = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let loads = Arc::clone(&loads);
            cache
                .get(key("popular"), move |key| async move {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok(ListSnapshot::new(key, sample_items(1)))
                })
                .await
                .expect("load should succeed");
        }

        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_load_is_not_memoized() {
        let cache = cache(3600, 16);
        let loads = Arc::new(AtomicUsize::new(0));

        let first = {
            let loads = Arc::clone(&loads);
            cache
                .get(key("popular"), move |_key| async move {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Err(SourceError::Status { status: 503 })
                })
                .await
        };
        assert!(matches!(
            first,
            Err(LoadError::Source(SourceError::Status { status: 503 }))
        ));
        assert!(cache.is_empty());

        let second = {
            let loads = Arc::clone(&loads);
            cache
                .get(key("popular"), move |key| async move {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok(ListSnapshot::new(key, sample_items(1)))
                })
                .await
        };
        assert!(second.is_ok());
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn capacity_overflow_evicts_least_recently_used() {
        let cache = cache(3600, 1);

        cache
            .get(key("popular"), |key| async move {
                Ok(ListSnapshot::new(key, sample_items(1)))
            })
            .await
            .expect("first load");
        cache
            .get(key("top"), |key| async move {
                Ok(ListSnapshot::new(key, sample_items(1)))
            })
            .await
            .expect("second load");

        assert_eq!(cache.len(), 1);

        // The evicted key loads again.
        let loads = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&loads);
        cache
            .get(key("popular"), move |key| async move {
                counted.fetch_add(1, Ordering::SeqCst);
                Ok(ListSnapshot::new(key, sample_items(1)))
            })
            .await
            .expect("reload");
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn loader_panic_surfaces_as_aborted() {
        let cache = cache(3600, 16);
        let outcome = cache
            .get(key("popular"), |_key| async move { panic!("loader blew up") })
            .await;
        assert!(matches!(outcome, Err(LoadError::Aborted)));
        assert!(cache.is_empty());

        // The key is not poisoned: the next call runs a fresh load.
        let retried = cache
            .get(key("popular"), |key| async move {
                Ok(ListSnapshot::new(key, sample_items(1)))
            })
            .await;
        assert!(retried.is_ok());
    }
}
