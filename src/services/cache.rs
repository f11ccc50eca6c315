//! Process-wide memoization
//!
//! Bounded LRU of `OnceCell`s. Concurrent lookups of one key share a single
//! in-flight computation. Failed computations leave the cell empty, so the
//! next caller retries. Values classified as negative ("not found") expire
//! after a TTL; everything else lives until evicted.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::OnceCell;
use tracing::trace;

struct Stamped<V> {
    value: V,
    computed_at: Instant,
}

struct Entry<V> {
    cell: Arc<OnceCell<Stamped<V>>>,
    last_used: u64,
}

struct Inner<K, V> {
    entries: HashMap<K, Entry<V>>,
    tick: u64,
}

pub struct MemoCache<K, V> {
    name: &'static str,
    capacity: usize,
    negative_ttl: Option<Duration>,
    is_negative: fn(&V) -> bool,
    inner: Mutex<Inner<K, V>>,
}

impl<K, V> MemoCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(name: &'static str, capacity: usize) -> Self {
        Self {
            name,
            capacity: capacity.max(1),
            negative_ttl: None,
            is_negative: |_| false,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                tick: 0,
            }),
        }
    }

    /// Expire values matching `is_negative` once they are older than `ttl`
    pub fn with_negative_ttl(mut self, ttl: Duration, is_negative: fn(&V) -> bool) -> Self {
        self.negative_ttl = Some(ttl);
        self.is_negative = is_negative;
        self
    }

    /// Return the cached value for `key` or run `compute` once for it.
    ///
    /// `Err` results are returned to the caller whose `compute` failed and
    /// are not stored. A waiter queued behind a failed attempt runs its own
    /// `compute`, so only successes are shared.
    pub async fn get_or_try_compute<F, Fut, E>(&self, key: K, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let cell = self.cell_for(key);
        let stamped = cell
            .get_or_try_init(|| async {
                compute().await.map(|value| Stamped {
                    value,
                    computed_at: Instant::now(),
                })
            })
            .await?;
        Ok(stamped.value.clone())
    }

    /// Completed, unexpired value for `key`, if any
    pub fn get(&self, key: &K) -> Option<V> {
        let inner = self.inner.lock();
        let entry = inner.entries.get(key)?;
        if self.is_expired(entry) {
            return None;
        }
        entry.cell.get().map(|stamped| stamped.value.clone())
    }

    pub fn contains(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn cell_for(&self, key: K) -> Arc<OnceCell<Stamped<V>>> {
        let mut inner = self.inner.lock();
        inner.tick += 1;
        let tick = inner.tick;

        if inner
            .entries
            .get(&key)
            .is_some_and(|entry| self.is_expired(entry))
        {
            trace!(cache = self.name, "negative entry expired");
            inner.entries.remove(&key);
        }

        let entry = inner.entries.entry(key.clone()).or_insert_with(|| Entry {
            cell: Arc::new(OnceCell::new()),
            last_used: tick,
        });
        entry.last_used = tick;
        let cell = entry.cell.clone();

        if inner.entries.len() > self.capacity {
            let victim = inner
                .entries
                .iter()
                .filter(|(k, _)| **k != key)
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(k, _)| k.clone());
            if let Some(victim) = victim {
                trace!(cache = self.name, "evicting least recently used entry");
                inner.entries.remove(&victim);
            }
        }

        cell
    }

    fn is_expired(&self, entry: &Entry<V>) -> bool {
        let Some(ttl) = self.negative_ttl else {
            return false;
        };
        entry.cell.get().is_some_and(|stamped| {
            (self.is_negative)(&stamped.value) && stamped.computed_at.elapsed() >= ttl
        })
    }
}
