//! Keyed compute-once cache for slowly-changing aggregates (league baselines, fitted
//! correction parameters). Concurrent requests for the same cold key share one
//! computation; a stale entry is preferred over blocking while a refresh is in flight.

use std::hash::Hash;
use std::ops::AddAssign;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
}

impl AddAssign<bool> for CacheStats {
    fn add_assign(&mut self, cache_hit: bool) {
        if cache_hit {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
    }
}

impl AddAssign for CacheStats {
    fn add_assign(&mut self, rhs: Self) {
        self.hits += rhs.hits;
        self.misses += rhs.misses;
    }
}

#[derive(Debug)]
struct Entry<V> {
    value: Option<(Arc<V>, Instant)>,
    computing: bool,
}
impl<V> Default for Entry<V> {
    fn default() -> Self {
        Self {
            value: None,
            computing: false,
        }
    }
}

#[derive(Debug)]
struct State<K, V> {
    entries: FxHashMap<K, Entry<V>>,
    stats: CacheStats,
}

#[derive(Debug)]
pub struct SingleFlight<K, V> {
    ttl: Duration,
    state: Mutex<State<K, V>>,
    ready: Condvar,
}

impl<K: Eq + Hash + Clone, V> SingleFlight<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            state: Mutex::new(State {
                entries: FxHashMap::default(),
                stats: CacheStats::default(),
            }),
            ready: Condvar::new(),
        }
    }

    /// Returns the cached value for `key`, computing it at most once per expiry across
    /// all callers. Callers finding a stale value while another thread refreshes it get
    /// the stale value immediately; callers finding no value at all wait for the
    /// in-flight computation.
    pub fn get_or_compute(&self, key: K, compute: impl FnOnce() -> V) -> Arc<V> {
        let mut state = self.state.lock().unwrap();
        loop {
            let entry = state.entries.entry(key.clone()).or_default();
            if let Some((value, at)) = &entry.value {
                if at.elapsed() < self.ttl || entry.computing {
                    let value = Arc::clone(value);
                    state.stats += true;
                    return value;
                }
                // stale and nobody refreshing: this caller takes the refresh
            } else if entry.computing {
                state = self.ready.wait(state).unwrap();
                continue;
            }
            entry.computing = true;
            break;
        }
        state.stats += false;
        drop(state);

        let guard = ComputeGuard { owner: self, key: &key, done: false };
        let value = Arc::new(compute());
        guard.complete();

        let mut state = self.state.lock().unwrap();
        let entry = state.entries.entry(key).or_default();
        entry.value = Some((Arc::clone(&value), Instant::now()));
        entry.computing = false;
        drop(state);
        self.ready.notify_all();
        value
    }

    /// Drops the entry, forcing recomputation on the next request. The invalidation
    /// trigger (new data ingested) is an external collaborator's concern.
    pub fn invalidate(&self, key: &K) {
        let mut state = self.state.lock().unwrap();
        if let Some(entry) = state.entries.get_mut(key) {
            entry.value = None;
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.state.lock().unwrap().stats
    }
}

/// Clears the computing flag if the compute closure panics, so waiters are not
/// stranded on an entry nobody is refreshing.
struct ComputeGuard<'a, K: Eq + Hash + Clone, V> {
    owner: &'a SingleFlight<K, V>,
    key: &'a K,
    done: bool,
}
impl<K: Eq + Hash + Clone, V> ComputeGuard<'_, K, V> {
    fn complete(mut self) {
        self.done = true;
    }
}
impl<K: Eq + Hash + Clone, V> Drop for ComputeGuard<'_, K, V> {
    fn drop(&mut self) {
        if !self.done {
            if let Ok(mut state) = self.owner.state.lock() {
                if let Some(entry) = state.entries.get_mut(self.key) {
                    entry.computing = false;
                }
            }
            self.owner.ready.notify_all();
        }
    }
}
