//! Concurrent string-keyed map whose entries expire a fixed time after insert.
//!
//! Backs both browser sessions and pending OAuth states. Expired entries are
//! invisible to readers and are evicted lazily on access or by a sweeper task.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// How often sweepers evict expired entries.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

struct Stamped<V> {
    value: V,
    inserted_at: Instant,
}

pub struct TtlMap<V> {
    entries: DashMap<String, Stamped<V>>,
    ttl: Duration,
}

impl<V: Clone> TtlMap<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn insert(&self, key: String, value: V) {
        self.insert_at(key, value, Instant::now());
    }

    /// Insert with an explicit timestamp.
    pub(crate) fn insert_at(&self, key: String, value: V, inserted_at: Instant) {
        self.entries.insert(key, Stamped { value, inserted_at });
    }

    /// Live value for `key`. An expired entry is evicted and reads as `None`.
    pub fn get(&self, key: &str) -> Option<V> {
        let entry = self.entries.get(key)?;
        if entry.inserted_at.elapsed() > self.ttl {
            drop(entry);
            self.entries.remove(key);
            return None;
        }
        Some(entry.value.clone())
    }

    /// Remove and return the value for `key`; `None` if absent or expired.
    /// At most one caller observes a given entry.
    pub fn take(&self, key: &str) -> Option<V> {
        let (_, entry) = self.entries.remove(key)?;
        (entry.inserted_at.elapsed() <= self.ttl).then_some(entry.value)
    }

    pub fn remove(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Evict expired entries, returning how many went.
    pub fn cleanup(&self) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.inserted_at.elapsed() <= self.ttl);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Run `sweep` every [`SWEEP_INTERVAL`] until `shutdown` is cancelled.
pub fn spawn_sweeper<F>(
    label: &'static str,
    shutdown: CancellationToken,
    sweep: F,
) -> tokio::task::JoinHandle<()>
where
    F: Fn() -> usize + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    let evicted = sweep();
                    if evicted > 0 {
                        debug!(label, evicted, "evicted expired entries");
                    }
                }
            }
        }
        debug!(label, "cleanup task stopped");
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn stale() -> Instant {
        Instant::now() - Duration::from_secs(120)
    }

    #[test]
    fn get_hides_and_evicts_expired() {
        let map = TtlMap::new(Duration::from_secs(60));
        map.insert("fresh".into(), 1);
        map.insert_at("stale".into(), 2, stale());

        assert_eq!(map.get("fresh"), Some(1));
        assert_eq!(map.get("fresh"), Some(1));
        assert_eq!(map.get("stale"), None);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn take_is_single_use() {
        let map = TtlMap::new(Duration::from_secs(60));
        map.insert("k".into(), "v");
        assert_eq!(map.take("k"), Some("v"));
        assert_eq!(map.take("k"), None);

        map.insert_at("old".into(), "v", stale());
        assert_eq!(map.take("old"), None);
        assert!(map.is_empty());
    }

    #[test]
    fn cleanup_counts_evictions() {
        let map = TtlMap::new(Duration::from_secs(60));
        map.insert("a".into(), ());
        map.insert_at("b".into(), (), stale());
        map.insert_at("c".into(), (), stale());

        assert_eq!(map.cleanup(), 2);
        assert_eq!(map.len(), 1);
        assert_eq!(map.cleanup(), 0);
    }

    #[tokio::test]
    async fn sweeper_runs_until_cancelled() {
        let calls = Arc::new(AtomicUsize::new(0));
        let shutdown = CancellationToken::new();
        let counter = calls.clone();
        let handle = spawn_sweeper("test", shutdown.clone(), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            0
        });

        // The first tick fires immediately.
        while calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        shutdown.cancel();
        handle.await.unwrap();
    }
}
