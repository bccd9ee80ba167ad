#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Keyed cache with per-entry time-to-live and a least-recently-used
//! capacity bound.
//!
//! Entries are evicted lazily: a read that finds a stale entry removes it
//! and reports a miss. There is no background sweeper. When the cache is
//! full, inserting a new key first drops any stale entries and then, if
//! still full, the least-recently-used one.
//!
//! [`GeoCache::get_or_try_insert_with`] coalesces concurrent misses for the
//! same key: the first caller runs the loader while later callers wait on a
//! per-key lock and then read the freshly cached value.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

/// Default time-to-live for entries stored without an explicit TTL.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Default maximum number of live entries.
pub const DEFAULT_MAX_ENTRIES: usize = 512;

/// A cached value with the bookkeeping needed for expiry and recency.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The cached value.
    pub value: V,
    /// When the value was stored.
    pub stored_at: Instant,
    /// How long the value stays fresh.
    pub ttl: Duration,
    last_used: u64,
}

impl<V> CacheEntry<V> {
    /// Returns `true` while `now - stored_at < ttl`.
    #[must_use]
    pub fn is_fresh(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) < self.ttl
    }
}

struct CacheState<V> {
    entries: HashMap<String, CacheEntry<V>>,
    /// `last_used` tick -> key, oldest first.
    recency: BTreeMap<u64, String>,
    tick: u64,
}

impl<V> CacheState<V> {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn remove(&mut self, key: &str) -> Option<CacheEntry<V>> {
        let entry = self.entries.remove(key)?;
        self.recency.remove(&entry.last_used);
        Some(entry)
    }

    fn purge_stale(&mut self, now: Instant) -> usize {
        let stale: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, e)| !e.is_fresh(now))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &stale {
            self.remove(key);
        }
        stale.len()
    }

    fn evict_least_recent(&mut self) -> Option<String> {
        let (_, key) = self.recency.pop_first()?;
        self.entries.remove(&key);
        Some(key)
    }
}

/// A TTL + LRU cache keyed by strings.
///
/// Safe to share between tasks behind an `Arc`. Values are cloned out on
/// read, so `V` is typically a cheap-to-clone type or an `Arc`.
pub struct GeoCache<V> {
    name: &'static str,
    default_ttl: Duration,
    max_entries: usize,
    state: Mutex<CacheState<V>>,
    in_flight: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl<V: Clone> GeoCache<V> {
    /// Creates an empty cache.
    ///
    /// `name` is used only to label log lines. A `max_entries` of zero is
    /// treated as one.
    #[must_use]
    pub fn new(name: &'static str, default_ttl: Duration, max_entries: usize) -> Self {
        Self {
            name,
            default_ttl,
            max_entries: max_entries.max(1),
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                recency: BTreeMap::new(),
                tick: 0,
            }),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a cache with [`DEFAULT_TTL`] and [`DEFAULT_MAX_ENTRIES`].
    #[must_use]
    pub fn with_defaults(name: &'static str) -> Self {
        Self::new(name, DEFAULT_TTL, DEFAULT_MAX_ENTRIES)
    }

    /// The TTL applied by [`Self::set`].
    #[must_use]
    pub const fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    fn lock(&self) -> MutexGuard<'_, CacheState<V>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the value stored under `key` if it is still fresh.
    ///
    /// A stale entry is removed and reported as a miss.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut state = self.lock();

        let fresh = state.entries.get(key).map(|e| e.is_fresh(now))?;
        if !fresh {
            state.remove(key);
            log::debug!("[{}] stale entry evicted: {key}", self.name);
            return None;
        }

        let tick = state.next_tick();
        let entry = state.entries.get_mut(key)?;
        let previous = std::mem::replace(&mut entry.last_used, tick);
        let value = entry.value.clone();
        state.recency.remove(&previous);
        state.recency.insert(tick, key.to_string());

        log::debug!("[{}] hit: {key}", self.name);
        Some(value)
    }

    /// Stores `value` under `key` with the cache's default TTL, replacing
    /// any existing entry.
    pub fn set(&self, key: &str, value: V) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    /// Stores `value` under `key` with an explicit TTL, replacing any
    /// existing entry.
    pub fn set_with_ttl(&self, key: &str, value: V, ttl: Duration) {
        let now = Instant::now();
        let mut state = self.lock();

        state.remove(key);

        if state.entries.len() >= self.max_entries {
            let purged = state.purge_stale(now);
            if purged > 0 {
                log::debug!("[{}] purged {purged} stale entries", self.name);
            }
        }
        while state.entries.len() >= self.max_entries {
            match state.evict_least_recent() {
                Some(evicted) => log::debug!("[{}] capacity eviction: {evicted}", self.name),
                None => break,
            }
        }

        let tick = state.next_tick();
        state.recency.insert(tick, key.to_string());
        state.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                stored_at: now,
                ttl,
                last_used: tick,
            },
        );
    }

    /// Removes the entry for `key`, returning its value if one was stored
    /// (fresh or not).
    pub fn remove(&self, key: &str) -> Option<V> {
        self.lock().remove(key).map(|e| e.value)
    }

    /// Number of stored entries, including stale ones not yet evicted.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every entry.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.recency.clear();
    }

    /// Returns the cached value for `key`, or runs `load` to produce it.
    ///
    /// Concurrent callers asking for the same key while a load is running
    /// wait for it and then read its result from the cache instead of
    /// issuing a second load. A failed load caches nothing, so a waiting
    /// caller runs its own `load` afterwards.
    ///
    /// # Errors
    ///
    /// Returns whatever error `load` returns.
    pub async fn get_or_try_insert_with<F, Fut, E>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        load: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }

        let key_lock = {
            let mut in_flight = self
                .in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            in_flight
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };

        let guard = key_lock.lock().await;

        if let Some(value) = self.get(key) {
            log::debug!("[{}] coalesced with in-flight load: {key}", self.name);
            drop(guard);
            self.release_in_flight(key, &key_lock);
            return Ok(value);
        }

        log::debug!("[{}] miss: {key}", self.name);
        let result = load().await;

        if let Ok(value) = &result {
            self.set_with_ttl(key, value.clone(), ttl.unwrap_or(self.default_ttl));
        }

        drop(guard);
        self.release_in_flight(key, &key_lock);

        result
    }

    /// Drops the per-key lock from `in_flight` once no waiter still holds
    /// it. The map and `key_lock` account for two references.
    fn release_in_flight(&self, key: &str, key_lock: &Arc<tokio::sync::Mutex<()>>) {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let ours = in_flight
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, key_lock));
        if ours && Arc::strong_count(key_lock) <= 2 {
            in_flight.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn value_is_returned_until_ttl_elapses() {
        let cache = GeoCache::with_defaults("test");
        cache.set_with_ttl("routeA", "R".to_string(), Duration::from_millis(1000));

        assert_eq!(cache.get("routeA").as_deref(), Some("R"));

        tokio::time::advance(Duration::from_millis(1100)).await;

        assert!(cache.get("routeA").is_none());
        assert!(cache.is_empty(), "stale entry should be evicted on read");
    }

    #[tokio::test(start_paused = true)]
    async fn entry_expires_exactly_at_ttl() {
        let cache = GeoCache::with_defaults("test");
        cache.set_with_ttl("k", 1, Duration::from_millis(500));

        tokio::time::advance(Duration::from_millis(499)).await;
        assert_eq!(cache.get("k"), Some(1));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(cache.get("k"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn set_uses_default_ttl() {
        let cache = GeoCache::new("test", Duration::from_secs(60), 8);
        cache.set("k", 7);

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(cache.get("k"), Some(7));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get("k"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_slot_is_reusable_by_fresh_set() {
        let cache = GeoCache::with_defaults("test");
        cache.set_with_ttl("k", 1, Duration::from_millis(10));
        tokio::time::advance(Duration::from_millis(20)).await;

        cache.set_with_ttl("k", 2, Duration::from_millis(10));
        assert_eq!(cache.get("k"), Some(2));
    }

    #[test]
    fn set_overwrites_existing_value() {
        let cache = GeoCache::with_defaults("test");
        cache.set("k", 1);
        cache.set("k", 2);
        assert_eq!(cache.get("k"), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn capacity_evicts_least_recently_used() {
        let cache = GeoCache::new("test", DEFAULT_TTL, 2);
        cache.set("a", 1);
        cache.set("b", 2);

        // Touch "a" so "b" becomes the eviction candidate.
        assert_eq!(cache.get("a"), Some(1));

        cache.set("c", 3);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), Some(1));
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("c"), Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn capacity_prefers_dropping_stale_entries() {
        let cache = GeoCache::new("test", DEFAULT_TTL, 2);
        cache.set_with_ttl("short", 1, Duration::from_millis(10));
        cache.set("long", 2);
        tokio::time::advance(Duration::from_millis(20)).await;

        // "short" is the least recently used but also stale; "long" must
        // survive.
        cache.set("new", 3);
        assert_eq!(cache.get("long"), Some(2));
        assert_eq!(cache.get("new"), Some(3));
    }

    #[test]
    fn remove_and_clear() {
        let cache = GeoCache::with_defaults("test");
        cache.set("a", 1);
        cache.set("b", 2);
        assert_eq!(cache.remove("a"), Some(1));
        assert_eq!(cache.remove("a"), None);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_misses_for_same_key_load_once() {
        let cache = GeoCache::<u32>::with_defaults("test");
        let counter = AtomicUsize::new(0);
        let loads = &counter;

        let load = move || async move {
            loads.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok::<_, String>(42)
        };

        let (a, b) = tokio::join!(
            cache.get_or_try_insert_with("k", None, load),
            cache.get_or_try_insert_with("k", None, load),
        );

        assert_eq!(a, Ok(42));
        assert_eq!(b, Ok(42));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn different_keys_load_independently() {
        let cache = GeoCache::<u32>::with_defaults("test");
        let counter = AtomicUsize::new(0);
        let loads = &counter;

        let load = move || async move {
            loads.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>(1)
        };

        let (a, b) = tokio::join!(
            cache.get_or_try_insert_with("x", None, load),
            cache.get_or_try_insert_with("y", None, load),
        );

        assert!(a.is_ok() && b.is_ok());
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_load_caches_nothing() {
        let cache = GeoCache::<u32>::with_defaults("test");

        let err = cache
            .get_or_try_insert_with("k", None, || async { Err::<u32, _>("boom") })
            .await;
        assert_eq!(err, Err("boom"));
        assert!(cache.get("k").is_none());

        let ok = cache
            .get_or_try_insert_with("k", None, || async { Ok::<_, &str>(5) })
            .await;
        assert_eq!(ok, Ok(5));
        assert_eq!(cache.get("k"), Some(5));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_load_keeps_later_callers_serialized() {
        let cache = GeoCache::<String>::with_defaults("test");
        let calls = AtomicUsize::new(0);
        let active = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);

        let load = |fail: bool| {
            let (calls, active, peak) = (&calls, &active, &peak);
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                let running = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(running, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(100)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                if fail {
                    Err("upstream down")
                } else {
                    Ok("R".to_string())
                }
            }
        };

        // The first load fails at 100ms while the second caller waits. The
        // third arrives during the second caller's retry.
        let (a, b, c) = tokio::join!(
            cache.get_or_try_insert_with("k", None, load(true)),
            async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                cache.get_or_try_insert_with("k", None, load(false)).await
            },
            async {
                tokio::time::sleep(Duration::from_millis(150)).await;
                cache.get_or_try_insert_with("k", None, load(false)).await
            },
        );

        assert_eq!(a, Err("upstream down"));
        assert_eq!(b, Ok("R".to_string()));
        assert_eq!(c, Ok("R".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert!(cache.in_flight.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_ttl_overrides_default() {
        let cache = GeoCache::<u32>::new("test", Duration::from_secs(1), 8);
        cache
            .get_or_try_insert_with("k", Some(Duration::from_secs(30)), || async {
                Ok::<_, String>(9)
            })
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(cache.get("k"), Some(9));
    }
}
