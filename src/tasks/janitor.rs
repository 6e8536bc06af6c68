//! Segment Janitor
//!
//! Background thread that periodically evicts expired entries from one
//! segment's expiring store.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{bounded, tick, Receiver, Sender, TryRecvError};
use tracing::{debug, trace, warn};

use crate::cache::ExpiringStore;
use crate::error::Result;

/// Maximum entries evicted per exclusive-lock acquisition.
pub const SWEEP_BATCH: usize = 1024;

/// Handle to a running janitor thread.
///
/// Dropping the handle signals the thread to stop without waiting for it.
pub struct Janitor {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Janitor {
    /// Spawns a janitor that sweeps `store` every `interval`.
    ///
    /// The thread is named `cache-janitor-<segment_id>`.
    pub fn spawn<V>(
        segment_id: usize,
        store: Arc<ExpiringStore<V>>,
        interval: Duration,
    ) -> Result<Self>
    where
        V: Send + Sync + 'static,
    {
        let (stop_tx, stop_rx) = bounded::<()>(1);

        let handle = thread::Builder::new()
            .name(format!("cache-janitor-{}", segment_id))
            .spawn(move || run(segment_id, &store, interval, stop_rx))?;

        debug!(segment = segment_id, ?interval, "Janitor started");

        Ok(Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// Signals the janitor to stop.
    ///
    /// The thread exits at its next tick or immediately if idle; a sweep in
    /// progress runs to completion first.
    pub fn stop(&mut self) {
        // Disconnecting the channel wakes the select
        self.stop_tx.take();
    }

    /// Signals the janitor to stop and waits for the thread to exit.
    pub fn stop_and_join(&mut self) {
        self.stop();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Janitor thread panicked");
            }
        }
    }

    /// Returns true while the janitor thread has not exited.
    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for Janitor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run<V>(
    segment_id: usize,
    store: &ExpiringStore<V>,
    interval: Duration,
    stop_rx: Receiver<()>,
) {
    let ticker = tick(interval);

    loop {
        crossbeam::select! {
            recv(ticker) -> _ => {
                // Both channels may be ready at once; stop wins
                if !matches!(stop_rx.try_recv(), Err(TryRecvError::Empty)) {
                    break;
                }
                let removed = sweep(store, Instant::now());
                if removed > 0 {
                    debug!(segment = segment_id, removed, "Janitor evicted expired entries");
                } else {
                    trace!(segment = segment_id, "Janitor found no expired entries");
                }
            }
            recv(stop_rx) -> _ => break,
        }
    }

    debug!(segment = segment_id, "Janitor stopped");
}

/// Evicts every entry that has expired as of `now`, in batches.
///
/// The store lock is released between batches so foreground callers are
/// not held up for the whole backlog.
pub(crate) fn sweep<V>(store: &ExpiringStore<V>, now: Instant) -> usize {
    let mut total = 0;
    loop {
        let removed = store.evict_expired(now, SWEEP_BATCH);
        total += removed;
        if removed < SWEEP_BATCH {
            return total;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn store_with(entries: &[(&str, Duration)]) -> Arc<ExpiringStore<&'static str>> {
        let store = Arc::new(ExpiringStore::new());
        let now = Instant::now();
        for (key, ttl) in entries {
            store.set(key, Arc::new("value"), now + *ttl);
        }
        store
    }

    #[test]
    fn test_sweep_removes_whole_backlog() {
        let store = Arc::new(ExpiringStore::new());
        let now = Instant::now();
        for i in 0..(SWEEP_BATCH * 2 + 10) {
            store.set(&format!("k{}", i), Arc::new(i), now);
        }
        store.set("live", Arc::new(0), now + Duration::from_secs(60));

        let removed = sweep(&store, now);

        assert_eq!(removed, SWEEP_BATCH * 2 + 10);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_janitor_removes_expired_entries() {
        let store = store_with(&[
            ("expire_soon", Duration::from_millis(50)),
            ("long_lived", Duration::from_secs(3600)),
        ]);

        let mut janitor = Janitor::spawn(0, store.clone(), Duration::from_millis(100)).unwrap();

        // Wait for entry to expire and a sweep to run
        sleep(Duration::from_millis(400));

        assert_eq!(store.len(), 1, "Expired entry should have been swept");
        assert!(store.get("long_lived", Instant::now()).is_some());

        janitor.stop_and_join();
    }

    #[test]
    fn test_janitor_removes_all_expired_in_one_tick() {
        let entries: Vec<(String, Duration)> = (0..50)
            .map(|i| (format!("k{}", i), Duration::from_millis(10 + i)))
            .collect();
        let store = Arc::new(ExpiringStore::new());
        let now = Instant::now();
        for (key, ttl) in &entries {
            store.set(key, Arc::new(()), now + *ttl);
        }

        // Only one tick can fire before the assertion
        let mut janitor = Janitor::spawn(0, store.clone(), Duration::from_millis(200)).unwrap();
        sleep(Duration::from_millis(300));

        assert!(store.is_empty());
        janitor.stop_and_join();
    }

    #[test]
    fn test_janitor_stops() {
        let store = store_with(&[]);
        let mut janitor = Janitor::spawn(0, store, Duration::from_millis(10)).unwrap();
        assert!(janitor.is_running());

        janitor.stop_and_join();

        assert!(!janitor.is_running());
    }

    #[test]
    fn test_stopped_janitor_does_not_sweep() {
        let store = store_with(&[("a", Duration::from_millis(20))]);
        let mut janitor = Janitor::spawn(0, store.clone(), Duration::from_millis(100)).unwrap();

        janitor.stop_and_join();
        sleep(Duration::from_millis(250));

        assert_eq!(store.len(), 1, "No sweep should run after stop");
    }

    #[test]
    fn test_drop_signals_stop() {
        let store = store_with(&[]);
        let janitor = Janitor::spawn(0, store.clone(), Duration::from_millis(10)).unwrap();
        drop(janitor);

        // The thread releases its store handle once it exits
        sleep(Duration::from_millis(200));
        assert_eq!(Arc::strong_count(&store), 1);
    }
}
