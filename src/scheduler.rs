//! Cancellable timers and background tasks
//!
//! Every task the client starts goes through a [`Scheduler`]: periodic
//! polls, one-shot delays and request tasks. All of them observe one
//! [`CancellationToken`] and are tracked by one [`TaskTracker`], so
//! [`Scheduler::shutdown`] stops everything and waits for it.

use std::future::Future;
use std::time::Duration;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::debug;

/// Owner of the client's background tasks
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    token: CancellationToken,
    tracker: TaskTracker,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token cancelled on shutdown
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Run `tick` every `period`, first after one full period.
    ///
    /// The timer stops when `tick` returns false or on shutdown.
    pub fn every<F>(&self, name: &'static str, period: Duration, mut tick: F)
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let token = self.token.clone();
        self.tracker.spawn(async move {
            let mut timer = interval_at(Instant::now() + period, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = timer.tick() => {
                        if !tick() {
                            break;
                        }
                    }
                }
            }
            debug!("Timer '{}' stopped", name);
        });
    }

    /// Run `fire` once after `delay`, unless shut down first
    pub fn after<F>(&self, delay: Duration, fire: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let token = self.token.clone();
        self.tracker.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = sleep(delay) => fire(),
            }
        });
    }

    /// Run `task` in the background, dropping it on shutdown
    pub fn spawn<T>(&self, task: T)
    where
        T: Future<Output = ()> + Send + 'static,
    {
        let token = self.token.clone();
        self.tracker.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = task => {}
            }
        });
    }

    /// Cancel every task and wait until all of them have returned
    pub async fn shutdown(&self) {
        self.token.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        debug!("Scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_every_fires_per_period() {
        let scheduler = Scheduler::new();
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        scheduler.every("test", Duration::from_secs(5), move || {
            seen.fetch_add(1, Ordering::SeqCst);
            true
        });

        sleep(Duration::from_millis(4_900)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        sleep(Duration::from_millis(10_200)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);

        scheduler.shutdown().await;
        sleep(Duration::from_secs(20)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_stops_when_tick_declines() {
        let scheduler = Scheduler::new();
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        scheduler.every("once", Duration::from_secs(1), move || {
            seen.fetch_add(1, Ordering::SeqCst);
            false
        });

        sleep(Duration::from_secs(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_after_is_cancelled_by_shutdown() {
        let scheduler = Scheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let early = fired.clone();
        scheduler.after(Duration::from_millis(500), move || {
            early.fetch_add(1, Ordering::SeqCst);
        });
        let late = fired.clone();
        scheduler.after(Duration::from_secs(60), move || {
            late.fetch_add(10, Ordering::SeqCst);
        });

        sleep(Duration::from_secs(1)).await;
        scheduler.shutdown().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(scheduler.token().is_cancelled());
    }
}
