//! Timer registry - at most one pending wake-up per key.
//!
//! Arming a key aborts the previous pending timer for it. A timer removes its
//! own entry right before running its callback, so a callback already in
//! progress is never aborted by a later re-arm. Entries carry a generation
//! number so a superseded timer cannot remove its successor's entry.
//!
//! The registry is a disposable cache: the bet store can always rebuild it.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

struct TimerEntry {
    generation: u64,
    fire_at: DateTime<Utc>,
    handle: JoinHandle<()>,
}

/// Process-local map of pending timers.
#[derive(Clone, Default)]
pub struct TimerRegistry {
    timers: Arc<Mutex<HashMap<String, TimerEntry>>>,
    next_generation: Arc<AtomicU64>,
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `on_fire` for `fire_at`, replacing any pending timer for `key`.
    ///
    /// A `fire_at` in the past fires on the next scheduler tick.
    pub fn arm<F, Fut>(&self, key: &str, fire_at: DateTime<Utc>, on_fire: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let delay = (fire_at - Utc::now()).to_std().unwrap_or_default();

        let mut timers = self.timers.lock();
        if let Some(previous) = timers.remove(key) {
            previous.handle.abort();
            debug!(key = %key, "Replaced pending timer");
        }

        let registry = Arc::clone(&self.timers);
        let owned_key = key.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut timers = registry.lock();
                if timers.get(&owned_key).map(|e| e.generation) == Some(generation) {
                    timers.remove(&owned_key);
                }
            }
            on_fire().await;
        });

        timers.insert(
            key.to_string(),
            TimerEntry {
                generation,
                fire_at,
                handle,
            },
        );
        debug!(key = %key, fire_at = %fire_at, delay_ms = delay.as_millis() as u64, "Timer armed");
    }

    /// Cancel the pending timer for `key`. Returns true if one was pending.
    pub fn cancel(&self, key: &str) -> bool {
        match self.timers.lock().remove(key) {
            Some(entry) => {
                entry.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Cancel every pending timer (shutdown).
    pub fn cancel_all(&self) -> usize {
        let mut timers = self.timers.lock();
        let count = timers.len();
        for (_, entry) in timers.drain() {
            entry.handle.abort();
        }
        count
    }

    pub fn is_armed(&self, key: &str) -> bool {
        self.timers.lock().contains_key(key)
    }

    /// Scheduled instant of the pending timer for `key`.
    pub fn fire_at(&self, key: &str) -> Option<DateTime<Utc>> {
        self.timers.lock().get(key).map(|e| e.fire_at)
    }

    pub fn pending_count(&self) -> usize {
        self.timers.lock().len()
    }
}

impl std::fmt::Debug for TimerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerRegistry")
            .field("pending", &self.pending_count())
            .finish()
    }
}
