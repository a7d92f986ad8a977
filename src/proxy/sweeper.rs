//! Periodic expiry of pending requests.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::cache::RequestCache;
use crate::model::ConfigValue;
use crate::observability::metrics;
use crate::pending::{PendingRequest, PendingRequestSet};
use crate::proxy::timing::TimingValues;

/// Answers every request whose deadline has passed with whatever the cache holds.
#[derive(Debug, Clone)]
pub struct TimeoutSweeper {
    pending: PendingRequestSet,
    cache: RequestCache,
    initial_delay: Duration,
    interval: Duration,
}

impl TimeoutSweeper {
    pub fn new(pending: PendingRequestSet, cache: RequestCache, timing: &TimingValues) -> Self {
        Self {
            pending,
            cache,
            initial_delay: timing.sweep_initial_delay,
            interval: timing.sweep_interval,
        }
    }

    /// One sweep. Returns how many requests were answered.
    pub fn sweep(&self, now: Instant) -> usize {
        self.pending.for_each_expired(now, |request| {
            tracing::debug!(
                request = %request.id(),
                identity = %request.identity(),
                "Deadline passed, answering from cache"
            );
            reply_from_cache(&self.cache, &request, "sweep");
        })
    }

    /// Run on the current runtime until the handle is stopped.
    pub fn spawn(self) -> SweeperHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + self.initial_delay, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::debug!(
                initial_delay_ms = self.initial_delay.as_millis() as u64,
                interval_ms = self.interval.as_millis() as u64,
                "Timeout sweeper started"
            );

            loop {
                tokio::select! {
                    biased;
                    _ = stop_rx.changed() => break,
                    _ = ticker.tick() => {
                        let answered = self.sweep(Instant::now());
                        if answered > 0 {
                            tracing::debug!(answered, "Sweep answered expired requests");
                        }
                    }
                }
            }
            tracing::debug!("Timeout sweeper stopped");
        });
        SweeperHandle { stop_tx, task }
    }
}

/// Stops a running sweeper.
#[derive(Debug)]
pub struct SweeperHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signal the sweeper and wait for its current tick to finish.
    pub async fn stop(self) {
        self.stop_tx.send_replace(true);
        if let Err(e) = self.task.await {
            if !e.is_cancelled() {
                tracing::warn!(error = %e, "Timeout sweeper ended abnormally");
            }
        }
    }
}

/// Answer an already claimed request from the cache, or with an error sentinel
/// carrying the generation the client holds.
pub(crate) fn reply_from_cache(cache: &RequestCache, request: &PendingRequest, path: &'static str) {
    let value = cache.get(request.identity()).unwrap_or_else(|| {
        Arc::new(ConfigValue::error_sentinel(
            request.identity().clone(),
            request.requested_generation(),
            "no config available from upstream",
        ))
    });
    if request.deliver(value) {
        metrics::record_reply(path);
    }
}
