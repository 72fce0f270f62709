//! LRU result cache with per-entry expiry.
//!
//! Entries are keyed by [`Fingerprint`] and dropped either when they expire
//! or when the least recently used entry is evicted at capacity. An expired
//! entry is removed on lookup and reported as a miss.
//!
//! [`ResultCache::get_or_insert_with`] is single-flight: concurrent callers
//! that miss on the same key share one computation instead of each running
//! the adapter.

use lookout_core::{CacheConfig, QueryKind, ResultRecord, ServiceId};
use lru::LruCache;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::time::Instant;

/// Cache key identifying one (service, query, kind) triple.
///
/// Queries are trimmed; usernames and emails are also lowercased so that
/// `Octocat` and `octocat` share an entry. Links keep their case because
/// paths are case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    service: ServiceId,
    query: String,
    kind: QueryKind,
}

impl Fingerprint {
    /// Build the fingerprint for a lookup.
    #[must_use]
    pub fn new(service: &ServiceId, query: &str, kind: QueryKind) -> Self {
        let query = query.trim();
        let query = if kind.is_identifier() {
            query.to_lowercase()
        } else {
            query.to_string()
        };

        Self {
            service: service.clone(),
            query,
            kind,
        }
    }

    /// Service part of the key.
    #[must_use]
    pub fn service(&self) -> &ServiceId {
        &self.service
    }
}

/// Whether a record may be stored.
///
/// Successful records are cacheable, including explicit not-found outcomes.
/// Failures never are, so that a transient error is not replayed.
#[must_use]
pub fn is_cacheable(record: &ResultRecord) -> bool {
    record.is_success()
}

/// Point-in-time cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    /// Fraction of lookups served from the cache.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct CacheEntry {
    record: ResultRecord,
    expires_at: Instant,
}

type Flight = Arc<OnceCell<ResultRecord>>;

struct Inner {
    entries: LruCache<Fingerprint, CacheEntry>,
    in_flight: HashMap<Fingerprint, Flight>,
    hits: u64,
    misses: u64,
}

impl Inner {
    fn lookup(&mut self, key: &Fingerprint) -> Option<ResultRecord> {
        let now = Instant::now();

        let live = match self.entries.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.record.clone()),
            Some(_) => {
                self.entries.pop(key);
                None
            }
            None => None,
        };

        if live.is_some() {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
        live
    }

    fn store(&mut self, key: Fingerprint, record: ResultRecord, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }

        let entry = CacheEntry {
            record,
            expires_at: Instant::now() + ttl,
        };

        if let Some((evicted, _)) = self.entries.push(key.clone(), entry) {
            if evicted != key {
                tracing::trace!(service = %evicted.service(), "evicted least recently used entry");
            }
        }
    }
}

/// Thread-safe result cache.
pub struct ResultCache {
    inner: Mutex<Inner>,
}

impl ResultCache {
    /// Create a cache holding at most `capacity` entries (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::new(capacity),
                in_flight: HashMap::new(),
                hits: 0,
                misses: 0,
            }),
        }
    }

    /// Create a cache sized from configuration.
    #[must_use]
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.capacity)
    }

    /// Look up a live entry, marking it most recently used.
    pub fn get(&self, key: &Fingerprint) -> Option<ResultRecord> {
        self.lock().lookup(key)
    }

    /// Store a record for `ttl`. A zero TTL stores nothing.
    pub fn put(&self, key: Fingerprint, record: ResultRecord, ttl: Duration) {
        self.lock().store(key, record, ttl);
    }

    /// Return the live entry for `key`, or compute it with `init`.
    ///
    /// While one caller is computing a key, other callers for the same key
    /// wait for its record instead of calling `init` themselves. If the
    /// computing caller is cancelled, one of the waiters takes over. The
    /// record is stored for `ttl` when [`is_cacheable`] allows it; waiters
    /// receive it either way.
    pub async fn get_or_insert_with<F, Fut>(
        &self,
        key: Fingerprint,
        ttl: Duration,
        init: F,
    ) -> ResultRecord
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ResultRecord>,
    {
        let flight = {
            let mut inner = self.lock();
            if let Some(record) = inner.lookup(&key) {
                tracing::debug!(service = %key.service(), "cache hit");
                return record;
            }
            Arc::clone(inner.in_flight.entry(key.clone()).or_default())
        };

        let record = flight.get_or_init(init).await.clone();

        let mut inner = self.lock();
        let current = inner
            .in_flight
            .get(&key)
            .is_some_and(|entry| Arc::ptr_eq(entry, &flight));
        if current {
            inner.in_flight.remove(&key);
            if is_cacheable(&record) {
                inner.store(key, record.clone(), ttl);
            }
        }
        record
    }

    /// Number of keys currently being computed.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.lock().in_flight.len()
    }

    /// Drop one entry.
    pub fn invalidate(&self, key: &Fingerprint) -> bool {
        self.lock().entries.pop(key).is_some()
    }

    /// Drop every entry and reset the counters.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.hits = 0;
        inner.misses = 0;
    }

    /// Number of stored entries, expired ones included until touched.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            entries: inner.entries.len(),
            capacity: inner.entries.cap().get(),
            hits: inner.hits,
            misses: inner.misses,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("acquire result cache lock")
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lookout_core::{FailureKind, Payload};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn service(id: &str) -> ServiceId {
        ServiceId::new(id).expect("valid service ID")
    }

    fn record(id: &str, query: &str) -> ResultRecord {
        ResultRecord::success(service(id), query, QueryKind::Username, Payload::new())
    }

    #[test]
    fn test_fingerprint_normalizes_identifiers() {
        let github = service("github");
        assert_eq!(
            Fingerprint::new(&github, " Octocat ", QueryKind::Username),
            Fingerprint::new(&github, "octocat", QueryKind::Username)
        );
        assert_ne!(
            Fingerprint::new(&github, "https://bit.ly/AbC", QueryKind::ShortLink),
            Fingerprint::new(&github, "https://bit.ly/abc", QueryKind::ShortLink)
        );
        assert_ne!(
            Fingerprint::new(&github, "octocat", QueryKind::Username),
            Fingerprint::new(&service("gitlab"), "octocat", QueryKind::Username)
        );
    }

    #[test]
    fn test_only_successes_are_cacheable() {
        assert!(is_cacheable(&record("github", "octocat")));
        assert!(is_cacheable(&ResultRecord::not_found(
            service("github"),
            "ghost",
            QueryKind::Username
        )));
        assert!(!is_cacheable(&ResultRecord::failed(
            service("github"),
            "octocat",
            QueryKind::Username,
            FailureKind::Transport,
            "reset"
        )));
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let cache = ResultCache::new(4);
        let key = Fingerprint::new(&service("github"), "octocat", QueryKind::Username);

        assert!(cache.get(&key).is_none());
        cache.put(key.clone(), record("github", "octocat"), Duration::from_secs(60));

        let cached = cache.get(&key).expect("entry should be live");
        assert_eq!(cached.query(), "octocat");

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_removed() {
        let cache = ResultCache::new(4);
        let key = Fingerprint::new(&service("github"), "octocat", QueryKind::Username);
        cache.put(key.clone(), record("github", "octocat"), Duration::from_secs(1));

        tokio::time::advance(Duration::from_millis(1001)).await;

        assert!(cache.get(&key).is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_zero_ttl_is_not_stored() {
        let cache = ResultCache::new(4);
        let key = Fingerprint::new(&service("github"), "octocat", QueryKind::Username);
        cache.put(key, record("github", "octocat"), Duration::ZERO);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_capacity_evicts_least_recently_used() {
        let cache = ResultCache::new(2);
        let ttl = Duration::from_secs(60);
        let a = Fingerprint::new(&service("github"), "alpha", QueryKind::Username);
        let b = Fingerprint::new(&service("github"), "bravo", QueryKind::Username);
        let c = Fingerprint::new(&service("github"), "charlie", QueryKind::Username);

        cache.put(a.clone(), record("github", "alpha"), ttl);
        cache.put(b.clone(), record("github", "bravo"), ttl);
        assert!(cache.get(&a).is_some());
        cache.put(c.clone(), record("github", "charlie"), ttl);

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&a).is_some());
        assert!(cache.get(&b).is_none());
        assert!(cache.get(&c).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_misses_share_one_computation() {
        let cache = ResultCache::new(4);
        let key = Fingerprint::new(&service("github"), "octocat", QueryKind::Username);
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let compute = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(1)).await;
            record("github", "octocat")
        };

        let (first, second) = tokio::join!(
            cache.get_or_insert_with(key.clone(), Duration::from_secs(60), compute),
            cache.get_or_insert_with(key.clone(), Duration::from_secs(60), compute),
        );

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.in_flight(), 0);

        let third = cache
            .get_or_insert_with(key, Duration::from_secs(60), compute)
            .await;
        assert_eq!(third, first);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shared_failure_is_not_stored() {
        let cache = ResultCache::new(4);
        let key = Fingerprint::new(&service("github"), "octocat", QueryKind::Username);
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let compute = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(100)).await;
            ResultRecord::failed(
                service("github"),
                "octocat",
                QueryKind::Username,
                FailureKind::Transport,
                "reset",
            )
        };

        let (first, second) = tokio::join!(
            cache.get_or_insert_with(key.clone(), Duration::from_secs(60), compute),
            cache.get_or_insert_with(key.clone(), Duration::from_secs(60), compute),
        );

        assert!(!first.is_success());
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.is_empty());
        assert_eq!(cache.in_flight(), 0);

        let _ = cache
            .get_or_insert_with(key, Duration::from_secs(60), compute)
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_and_clear() {
        let cache = ResultCache::new(0);
        assert_eq!(cache.stats().capacity, 1);

        let key = Fingerprint::new(&service("github"), "octocat", QueryKind::Username);
        cache.put(key.clone(), record("github", "octocat"), Duration::from_secs(60));
        assert!(cache.invalidate(&key));
        assert!(!cache.invalidate(&key));

        cache.put(key.clone(), record("github", "octocat"), Duration::from_secs(60));
        let _ = cache.get(&key);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats().hits, 0);
    }
}
