// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Fixed-rate tick scheduler

use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Drives a synchronous tick at a fixed rate until disarmed.
///
/// The first tick fires one full interval after arming. Ticks missed while the
/// runtime was busy are skipped, never replayed in a burst.
pub struct TickScheduler {
    interval: Duration,
    token: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TickScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            token: CancellationToken::new(),
            handle: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start ticking. A scheduler arms at most once.
    pub fn arm<F>(&self, mut tick: F)
    where
        F: FnMut() + Send + 'static,
    {
        let mut handle = self.handle.lock();
        if handle.is_some() || self.token.is_cancelled() {
            warn!("Tick scheduler already armed or disarmed, ignoring");
            return;
        }

        let period = self.interval;
        let token = self.token.clone();
        *handle = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => tick(),
                }
            }
            debug!("Tick loop exited");
        }));

        debug!("Tick scheduler armed every {:?}", period);
    }

    /// Stop scheduling further ticks. Idempotent.
    pub fn disarm(&self) {
        if !self.token.is_cancelled() {
            self.token.cancel();
            debug!("Tick scheduler disarmed");
        }
    }

    pub fn is_armed(&self) -> bool {
        self.handle.lock().is_some() && !self.token.is_cancelled()
    }
}

impl Drop for TickScheduler {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_after_one_interval() {
        let scheduler = TickScheduler::new(Duration::from_millis(100));
        let fired = Arc::new(Mutex::new(Vec::new()));
        let start = Instant::now();

        let log = Arc::clone(&fired);
        scheduler.arm(move || log.lock().push(start.elapsed()));
        assert!(scheduler.is_armed());

        tokio::time::sleep(Duration::from_millis(350)).await;
        let fired = fired.lock().clone();
        assert_eq!(fired.len(), 3);
        assert!(fired[0] >= Duration::from_millis(100));
        for pair in fired.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(100));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_disarm_stops_ticks() {
        let scheduler = TickScheduler::new(Duration::from_millis(50));
        let count = Arc::new(Mutex::new(0u32));

        let counter = Arc::clone(&count);
        scheduler.arm(move || *counter.lock() += 1);
        tokio::time::sleep(Duration::from_millis(120)).await;

        scheduler.disarm();
        scheduler.disarm();
        let at_disarm = *count.lock();
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(at_disarm, 2);
        assert_eq!(*count.lock(), at_disarm);
        assert!(!scheduler.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_arm_once() {
        let scheduler = TickScheduler::new(Duration::from_millis(50));
        let count = Arc::new(Mutex::new(0u32));

        for _ in 0..2 {
            let counter = Arc::clone(&count);
            scheduler.arm(move || *counter.lock() += 1);
        }
        tokio::time::sleep(Duration::from_millis(110)).await;

        assert_eq!(*count.lock(), 2);
    }
}
