//! Background eviction of stale rate-limit entries.
//!
//! The sweeper only bounds memory; admission decisions never depend on it
//! having run.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::rate_limit::RateLimitStore;

/// Default time between sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

struct Running {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Periodic task that calls [`RateLimitStore::sweep`].
pub struct Sweeper {
    store: RateLimitStore,
    interval: Duration,
    running: Mutex<Option<Running>>,
}

impl Sweeper {
    pub fn new(store: RateLimitStore, interval: Duration) -> Self {
        Self {
            store,
            interval,
            running: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }

    /// Spawns the sweep loop on the current tokio runtime. No-op if running.
    pub fn start(&self) {
        let mut running = self.running.lock();
        if running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            return;
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let store = self.store.clone();
        let period = self.interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = store.sweep(Instant::now());
                        if removed > 0 {
                            tracing::info!(removed, remaining = store.len(), "Swept stale rate-limit entries");
                        } else {
                            tracing::debug!(remaining = store.len(), "Sweep found nothing to evict");
                        }
                    }
                }
            }
        });

        tracing::info!(interval_secs = period.as_secs(), "Rate-limit sweeper started");
        *running = Some(Running { cancel, handle });
    }

    /// Cancels the sweep loop and waits for it to exit. No-op if stopped.
    pub async fn stop(&self) {
        let running = self.running.lock().take();
        let Some(Running { cancel, handle }) = running else {
            return;
        };
        cancel.cancel();
        if let Err(e) = handle.await {
            tracing::error!("Sweeper task failed: {e}");
        }
        tracing::info!("Rate-limit sweeper stopped");
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        if let Some(running) = self.running.get_mut().take() {
            running.cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::metrics::Metrics;
    use crate::policy::{ActionKind, Policy, PolicyTable};

    fn short_lived_store() -> RateLimitStore {
        let table = PolicyTable::empty().with_policy(
            ActionKind::Contact,
            Policy::new(5, Duration::from_millis(20), Duration::from_millis(20)),
        );
        RateLimitStore::new(table, Arc::new(Metrics::new()))
    }

    #[tokio::test]
    async fn start_and_stop() {
        let sweeper = Sweeper::new(short_lived_store(), Duration::from_millis(10));
        assert!(!sweeper.is_running());

        sweeper.start();
        assert!(sweeper.is_running());
        sweeper.start(); // idempotent
        assert!(sweeper.is_running());

        sweeper.stop().await;
        assert!(!sweeper.is_running());
        sweeper.stop().await;
    }

    #[tokio::test]
    async fn evicts_expired_entries_in_background() {
        let store = short_lived_store();
        store.check("203.0.113.5", ActionKind::Contact).unwrap();
        store.check("198.51.100.7", ActionKind::Contact).unwrap();
        assert_eq!(store.len(), 2);

        let sweeper = Sweeper::new(store.clone(), Duration::from_millis(10));
        sweeper.start();

        let deadline = Instant::now() + Duration::from_secs(2);
        while !store.is_empty() && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        sweeper.stop().await;
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn stopped_sweeper_leaves_entries() {
        let store = short_lived_store();
        let sweeper = Sweeper::new(store.clone(), Duration::from_millis(5));
        sweeper.start();
        sweeper.stop().await;

        store.check("203.0.113.5", ActionKind::Contact).unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(store.len(), 1);
    }
}
