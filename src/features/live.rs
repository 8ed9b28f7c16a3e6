//! Live detection loop.
//!
//! Frames are submitted on a fixed period with at most one request in flight.
//! A tick that fires while the previous frame is still being processed is
//! dropped, never queued, so a slow backend cannot build up a backlog.

use crate::api::ApiError;
use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};
use tokio::{
    sync::mpsc,
    task::{JoinHandle, JoinSet},
    time::{MissedTickBehavior, interval},
};
use tracing::{debug, warn};

pub const DETECTION_PERIOD: Duration = Duration::from_millis(500);

#[derive(Debug, Default)]
pub struct LiveCounters {
    sent: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
}

impl LiveCounters {
    #[must_use]
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

// Clears the in-flight flag even if the request task is cancelled.
struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Periodic detection task. Dropping it cancels the loop and any request
/// still in flight.
#[derive(Debug)]
pub struct LiveDetector {
    handle: JoinHandle<()>,
    counters: Arc<LiveCounters>,
}

impl LiveDetector {
    /// Calls `detect` every `period` and forwards each outcome to `results`.
    pub fn spawn<F, Fut, T>(
        period: Duration,
        detect: F,
        results: mpsc::Sender<Result<T, ApiError>>,
    ) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
        T: Send + 'static,
    {
        let counters = Arc::new(LiveCounters::default());
        let stats = Arc::clone(&counters);
        let in_flight = Arc::new(AtomicBool::new(false));

        let handle = tokio::spawn(async move {
            let mut requests = JoinSet::new();
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                while requests.try_join_next().is_some() {}

                if results.is_closed() {
                    debug!("live detection receiver closed, stopping");
                    break;
                }

                if in_flight.swap(true, Ordering::AcqRel) {
                    stats.skipped.fetch_add(1, Ordering::Relaxed);
                    continue;
                }

                let guard = InFlight(Arc::clone(&in_flight));
                let request = detect();
                let results = results.clone();
                let stats = Arc::clone(&stats);
                stats.sent.fetch_add(1, Ordering::Relaxed);

                requests.spawn(async move {
                    let outcome = request.await;
                    drop(guard);
                    if let Err(err) = &outcome {
                        stats.failed.fetch_add(1, Ordering::Relaxed);
                        warn!("live detection frame failed: {err}");
                    }
                    let _ = results.send(outcome).await;
                });
            }
        });

        Self { handle, counters }
    }

    #[must_use]
    pub fn counters(&self) -> &LiveCounters {
        &self.counters
    }

    pub fn stop(self) {
        self.handle.abort();
    }
}

impl Drop for LiveDetector {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
