// Last-known-good snapshot per domain, with TTL, single-flight refresh and
// serve-stale-on-error.

use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::CollectError;
use crate::models::Domain;

struct CacheEntry<T> {
    data: Arc<T>,
    /// `None` once invalidated; the data is kept for serve-stale.
    captured_at: Option<Instant>,
    captured_wall: DateTime<Utc>,
}

struct Slot<T> {
    entry: Option<CacheEntry<T>>,
    /// Bumped by every invalidation. A refresh that started under an older epoch
    /// must not mark its result fresh.
    epoch: u64,
}

/// What a reader gets back: a shared read-only view plus where it came from.
#[derive(Debug)]
pub struct Served<T> {
    pub data: Arc<T>,
    pub captured_at: DateTime<Utc>,
    /// True when this is the previous snapshot because the refresh just failed.
    pub stale: bool,
    /// The failure that caused `stale`, for the caller to log or report.
    pub refresh_error: Option<CollectError>,
}

impl<T> Served<T> {
    fn from_entry(entry: &CacheEntry<T>) -> Self {
        Self {
            data: entry.data.clone(),
            captured_at: entry.captured_wall,
            stale: false,
            refresh_error: None,
        }
    }
}

pub struct SnapshotCache<T> {
    domain: Domain,
    ttl: Duration,
    slot: RwLock<Slot<T>>,
    inflight: Mutex<()>,
}

impl<T> SnapshotCache<T> {
    pub fn new(domain: Domain, ttl: Duration) -> Self {
        Self {
            domain,
            ttl,
            slot: RwLock::new(Slot {
                entry: None,
                epoch: 0,
            }),
            inflight: Mutex::new(()),
        }
    }

    fn fresh(&self, slot: &Slot<T>) -> Option<Served<T>> {
        let entry = slot.entry.as_ref()?;
        let at = entry.captured_at?;
        (at.elapsed() < self.ttl).then(|| Served::from_entry(entry))
    }

    /// Serve the cached snapshot if it is younger than the TTL, otherwise run `refresh`.
    ///
    /// Concurrent callers on an expired entry queue behind one refresh and reuse its result.
    /// When the refresh fails the previous snapshot is returned untouched with
    /// `stale = true`; with no previous snapshot the result is [`CollectError::Unavailable`].
    pub async fn get_or_refresh<F, Fut>(&self, refresh: F) -> Result<Served<T>, CollectError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, CollectError>>,
    {
        if let Some(hit) = self.fresh(&*self.slot.read().await) {
            return Ok(hit);
        }

        let _inflight = self.inflight.lock().await;
        let epoch = {
            let slot = self.slot.read().await;
            if let Some(hit) = self.fresh(&slot) {
                return Ok(hit);
            }
            slot.epoch
        };

        match refresh().await {
            Ok(data) => {
                let data = Arc::new(data);
                let captured_wall = Utc::now();
                let mut slot = self.slot.write().await;
                let current = slot.epoch == epoch;
                if !current {
                    debug!(domain = %self.domain, "invalidated during refresh; result stored as expired");
                }
                slot.entry = Some(CacheEntry {
                    data: data.clone(),
                    captured_at: current.then(Instant::now),
                    captured_wall,
                });
                Ok(Served {
                    data,
                    captured_at: captured_wall,
                    stale: false,
                    refresh_error: None,
                })
            }
            Err(e) => {
                let slot = self.slot.read().await;
                match slot.entry.as_ref() {
                    Some(entry) => {
                        warn!(domain = %self.domain, error = %e, "refresh failed; serving last good snapshot");
                        Ok(Served {
                            stale: true,
                            refresh_error: Some(e),
                            ..Served::from_entry(entry)
                        })
                    }
                    None => {
                        warn!(domain = %self.domain, error = %e, "refresh failed with no snapshot to fall back on");
                        Err(CollectError::unavailable(self.domain, e))
                    }
                }
            }
        }
    }

    /// Force the next read to refresh. Keeps the data so a failing refresh can still serve it.
    pub async fn invalidate(&self) {
        let mut slot = self.slot.write().await;
        slot.epoch = slot.epoch.wrapping_add(1);
        if let Some(entry) = slot.entry.as_mut() {
            entry.captured_at = None;
        }
    }

    /// Whatever is cached, regardless of age. Never refreshes.
    pub async fn peek(&self) -> Option<Served<T>> {
        self.slot.read().await.entry.as_ref().map(Served::from_entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{ProbeError, ProbeErrorKind, ProbeRequest};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn probe_failure() -> CollectError {
        ProbeError::new(
            ProbeErrorKind::Timeout,
            &ProbeRequest::ListContainers,
            "no result",
        )
        .into()
    }

    async fn counted(calls: &AtomicUsize, value: u32) -> Result<u32, CollectError> {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(value)
    }

    #[tokio::test]
    async fn second_read_within_ttl_does_not_refresh() {
        let cache = SnapshotCache::new(Domain::Services, Duration::from_secs(60));
        let calls = AtomicUsize::new(0);
        let a = cache.get_or_refresh(|| counted(&calls, 1)).await.unwrap();
        let b = cache.get_or_refresh(|| counted(&calls, 2)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(*a.data, 1);
        assert_eq!(*b.data, 1);
        assert!(Arc::ptr_eq(&a.data, &b.data));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entry_refreshes() {
        let cache = SnapshotCache::new(Domain::Gpu, Duration::from_secs(5));
        let calls = AtomicUsize::new(0);
        cache.get_or_refresh(|| counted(&calls, 1)).await.unwrap();
        tokio::time::advance(Duration::from_secs(6)).await;
        let b = cache.get_or_refresh(|| counted(&calls, 2)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(*b.data, 2);
    }

    #[tokio::test]
    async fn failed_refresh_serves_previous_snapshot_unchanged() {
        let cache = SnapshotCache::new(Domain::Services, Duration::ZERO);
        let first = cache
            .get_or_refresh(|| async { Ok(vec![1u32, 2, 3]) })
            .await
            .unwrap();
        let second = cache
            .get_or_refresh(|| async { Err(probe_failure()) })
            .await
            .unwrap();
        assert!(second.stale);
        assert!(second.refresh_error.is_some());
        assert!(Arc::ptr_eq(&first.data, &second.data));
        assert_eq!(first.captured_at, second.captured_at);
    }

    #[tokio::test]
    async fn cold_failure_is_unavailable() {
        let cache: SnapshotCache<u32> = SnapshotCache::new(Domain::System, Duration::ZERO);
        let err = cache
            .get_or_refresh(|| async { Err(probe_failure()) })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CollectError::Unavailable {
                domain: Domain::System,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn invalidate_forces_refresh_but_keeps_data_for_stale() {
        let cache = SnapshotCache::new(Domain::Services, Duration::from_secs(60));
        let calls = AtomicUsize::new(0);
        cache.get_or_refresh(|| counted(&calls, 1)).await.unwrap();
        cache.invalidate().await;
        assert_eq!(cache.peek().await.map(|s| *s.data), Some(1));

        let after = cache
            .get_or_refresh(|| async { Err(probe_failure()) })
            .await
            .unwrap();
        assert!(after.stale);
        assert_eq!(*after.data, 1);

        cache.get_or_refresh(|| counted(&calls, 2)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invalidation_during_refresh_is_not_overwritten() {
        let cache = SnapshotCache::new(Domain::Services, Duration::from_secs(60));
        let calls = AtomicUsize::new(0);
        let (calls_ref, cache_ref) = (&calls, &cache);
        let served = cache
            .get_or_refresh(move || async move {
                calls_ref.fetch_add(1, Ordering::SeqCst);
                // A control action lands while this refresh is in flight.
                cache_ref.invalidate().await;
                Ok(1u32)
            })
            .await
            .unwrap();
        assert_eq!(*served.data, 1);

        let next = cache.get_or_refresh(|| counted(&calls, 2)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(*next.data, 2);
    }

    #[tokio::test]
    async fn concurrent_expired_reads_share_one_refresh() {
        let cache = SnapshotCache::new(Domain::Gpu, Duration::from_secs(60));
        let calls = AtomicUsize::new(0);
        let calls_ref = &calls;
        let refresh = move || async move {
            calls_ref.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            Ok(7u32)
        };
        let (a, b, c) = tokio::join!(
            cache.get_or_refresh(refresh),
            cache.get_or_refresh(refresh),
            cache.get_or_refresh(refresh),
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(*a.unwrap().data, 7);
        assert_eq!(*b.unwrap().data, 7);
        assert_eq!(*c.unwrap().data, 7);
    }

    #[tokio::test]
    async fn peek_never_refreshes() {
        let cache: SnapshotCache<u32> = SnapshotCache::new(Domain::Gpu, Duration::ZERO);
        assert!(cache.peek().await.is_none());
    }
}
