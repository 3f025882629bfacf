//! Frame scheduling
//!
//! The compositor never owns a clock. It subscribes its per-frame callbacks to
//! a [`FrameScheduler`], which calls them once per frame with a timestamp in
//! milliseconds.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Per-frame callback, receives the frame timestamp in milliseconds
pub type FrameCallback = Box<dyn FnMut(f64) + Send>;

/// Handle for cancelling a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameToken(u64);

pub trait FrameScheduler: Send + Sync {
    fn subscribe(&self, callback: FrameCallback) -> FrameToken;

    fn unsubscribe(&self, token: FrameToken);
}

/// Subscription list shared by the scheduler implementations
#[derive(Default)]
struct CallbackSet {
    callbacks: Mutex<Vec<(FrameToken, FrameCallback)>>,
    cancelled: Mutex<HashSet<FrameToken>>,
    next_token: AtomicU64,
}

impl CallbackSet {
    fn subscribe(&self, callback: FrameCallback) -> FrameToken {
        let token = FrameToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        self.callbacks.lock().push((token, callback));
        token
    }

    fn unsubscribe(&self, token: FrameToken) {
        self.callbacks.lock().retain(|(t, _)| *t != token);
        // the callback may be running right now, outside the list
        self.cancelled.lock().insert(token);
    }

    fn len(&self) -> usize {
        self.callbacks.lock().len()
    }

    /// Run every callback once. Callbacks run without the list locked so they
    /// may subscribe or unsubscribe.
    fn tick(&self, timestamp_ms: f64) {
        let mut running = std::mem::take(&mut *self.callbacks.lock());
        for (_, callback) in running.iter_mut() {
            callback(timestamp_ms);
        }

        let mut callbacks = self.callbacks.lock();
        let cancelled = std::mem::take(&mut *self.cancelled.lock());
        running.append(&mut callbacks);
        running.retain(|(token, _)| !cancelled.contains(token));
        *callbacks = running;
    }
}

/// Scheduler driven by the caller
///
/// Useful for offline rendering and tests: nothing happens until [`tick`](Self::tick).
#[derive(Default)]
pub struct ManualScheduler {
    set: CallbackSet,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(&self, timestamp_ms: f64) {
        self.set.tick(timestamp_ms);
    }

    pub fn subscriber_count(&self) -> usize {
        self.set.len()
    }
}

impl FrameScheduler for ManualScheduler {
    fn subscribe(&self, callback: FrameCallback) -> FrameToken {
        self.set.subscribe(callback)
    }

    fn unsubscribe(&self, token: FrameToken) {
        self.set.unsubscribe(token);
    }
}

/// Scheduler ticking on a tokio interval
pub struct IntervalScheduler {
    set: Arc<CallbackSet>,
    handle: JoinHandle<()>,
}

impl IntervalScheduler {
    /// Spawn the ticking task. Must be called inside a tokio runtime.
    pub fn spawn(fps: u32) -> Self {
        let set = Arc::new(CallbackSet::default());
        let ticking = Arc::clone(&set);
        let period = Duration::from_secs_f64(1.0 / fps.max(1) as f64);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let started = tokio::time::Instant::now();
            loop {
                let now = ticker.tick().await;
                ticking.tick(now.duration_since(started).as_secs_f64() * 1000.0);
            }
        });

        tracing::debug!("Frame scheduler running at {} fps", fps);
        Self { set, handle }
    }
}

impl FrameScheduler for IntervalScheduler {
    fn subscribe(&self, callback: FrameCallback) -> FrameToken {
        self.set.subscribe(callback)
    }

    fn unsubscribe(&self, token: FrameToken) {
        self.set.unsubscribe(token);
    }
}

impl Drop for IntervalScheduler {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_tick_runs_callbacks() {
        let scheduler = ManualScheduler::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        scheduler.subscribe(Box::new(move |ts| sink.lock().push(ts)));

        scheduler.tick(0.0);
        scheduler.tick(33.0);
        assert_eq!(*seen.lock(), vec![0.0, 33.0]);
    }

    #[test]
    fn test_unsubscribe_stops_callback() {
        let scheduler = ManualScheduler::new();
        let count = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&count);
        let token = scheduler.subscribe(Box::new(move |_| {
            counter.fetch_add(1, Ordering::Relaxed);
        }));

        scheduler.tick(0.0);
        scheduler.unsubscribe(token);
        scheduler.tick(1.0);
        assert_eq!(count.load(Ordering::Relaxed), 1);
        assert_eq!(scheduler.subscriber_count(), 0);
    }

    #[test]
    fn test_subscribe_from_callback() {
        let scheduler = Arc::new(ManualScheduler::new());
        let inner = Arc::clone(&scheduler);
        let mut subscribed = false;
        scheduler.subscribe(Box::new(move |_| {
            if !subscribed {
                subscribed = true;
                inner.subscribe(Box::new(|_| {}));
            }
        }));

        scheduler.tick(0.0);
        assert_eq!(scheduler.subscriber_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_scheduler_ticks() {
        let scheduler = IntervalScheduler::spawn(30);
        let count = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&count);
        scheduler.subscribe(Box::new(move |_| {
            counter.fetch_add(1, Ordering::Relaxed);
        }));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(count.load(Ordering::Relaxed) >= 5);
    }
}
