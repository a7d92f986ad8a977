//! A single upstream subscription and its receive loop.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

use crate::config::RetryConfig;
use crate::model::{ConfigIdentity, ConfigValue, KnownConfig, RESET_GENERATION};
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;
use crate::subscription::manager::Registry;
use crate::subscription::state::SubscriptionState;
use crate::upstream::{FetchRequest, UpstreamError, UpstreamSource};

/// Grace on top of the fetch budget before the worker gives up on an upstream call itself.
const FETCH_GRACE: Duration = Duration::from_secs(1);

/// Receives every value a subscription obtains.
pub trait UpdateListener: Send + Sync + 'static {
    fn on_update(&self, value: ConfigValue);
}

/// Per-worker timing.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Budget handed to each upstream fetch.
    pub fetch_timeout: Duration,
    pub retry: RetryConfig,
}

/// One upstream subscription for a single identity.
#[derive(Debug)]
pub struct Subscription {
    identity: ConfigIdentity,
    state: AtomicU8,
    cancel_tx: watch::Sender<bool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Subscription {
    pub(crate) fn new(identity: ConfigIdentity) -> Self {
        let (cancel_tx, _) = watch::channel(false);
        Self {
            identity,
            state: AtomicU8::new(SubscriptionState::Created as u8),
            cancel_tx,
            worker: Mutex::new(None),
        }
    }

    pub fn identity(&self) -> &ConfigIdentity {
        &self.identity
    }

    pub fn state(&self) -> SubscriptionState {
        self.state.load(Ordering::Acquire).into()
    }

    pub fn is_cancelled(&self) -> bool {
        self.state().is_terminal()
    }

    /// Move to `next` unless already cancelled. Returns whether the move happened.
    fn transition(&self, next: SubscriptionState) -> bool {
        self.state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                if SubscriptionState::from(current).is_terminal() {
                    None
                } else {
                    Some(next as u8)
                }
            })
            .is_ok()
    }

    /// Enter the terminal state and wake the worker.
    pub fn cancel(&self) {
        self.state.store(SubscriptionState::Cancelled as u8, Ordering::Release);
        self.cancel_tx.send_replace(true);
    }

    fn cancel_signal(&self) -> watch::Receiver<bool> {
        self.cancel_tx.subscribe()
    }

    pub(crate) fn attach_worker(&self, handle: JoinHandle<()>) {
        *self.worker.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    pub(crate) fn take_worker(&self) -> Option<JoinHandle<()>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

/// The receive loop of one subscription.
pub(crate) struct Worker<U: UpstreamSource> {
    pub(crate) subscription: Arc<Subscription>,
    pub(crate) upstream: Arc<U>,
    pub(crate) listener: Arc<dyn UpdateListener>,
    pub(crate) registry: Registry,
    pub(crate) settings: WorkerSettings,
}

impl<U: UpstreamSource> Worker<U> {
    pub(crate) async fn run(self) {
        let identity = self.subscription.identity().clone();
        let mut cancel = self.subscription.cancel_signal();
        let mut baseline = KnownConfig::default();
        let mut failures: u32 = 0;
        let hard_limit = self.settings.fetch_timeout + FETCH_GRACE;

        tracing::debug!(identity = %identity, "Subscription worker started");
        self.subscription.transition(SubscriptionState::Subscribing);

        loop {
            if *cancel.borrow_and_update() {
                break;
            }

            let request = FetchRequest {
                identity: identity.clone(),
                known: baseline.clone(),
                timeout: self.settings.fetch_timeout,
            };

            let result = tokio::select! {
                biased;
                _ = cancel.changed() => break,
                result = timeout(hard_limit, self.upstream.fetch(request)) => {
                    result.unwrap_or(Err(UpstreamError::Timeout(hard_limit)))
                }
            };

            match result.and_then(|value| accept(&identity, &baseline, value)) {
                Ok(value) => {
                    failures = 0;
                    if !self.subscription.transition(SubscriptionState::Active) {
                        break;
                    }
                    tracing::debug!(
                        identity = %identity,
                        generation = value.generation,
                        error = value.error,
                        "Received config from upstream"
                    );
                    baseline = KnownConfig::new(value.generation, value.content_checksum.clone());
                    self.listener.on_update(value);
                }
                Err(UpstreamError::Stale { generation, baseline: held }) => {
                    metrics::record_upstream_error("stale");
                    tracing::debug!(
                        identity = %identity,
                        generation,
                        baseline = held,
                        "Dropping stale upstream response"
                    );
                    // Fixed base delay; the failure counter only tracks transport errors.
                    tokio::select! {
                        biased;
                        _ = cancel.changed() => break,
                        _ = sleep(calculate_backoff(1, &self.settings.retry)) => {}
                    }
                }
                Err(e) if e.is_transient() => {
                    failures = failures.saturating_add(1);
                    metrics::record_upstream_error(e.kind());
                    let delay = calculate_backoff(failures, &self.settings.retry);
                    tracing::warn!(
                        identity = %identity,
                        error = %e,
                        attempt = failures,
                        retry_in_ms = delay.as_millis() as u64,
                        "Upstream fetch failed"
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.changed() => break,
                        _ = sleep(delay) => {}
                    }
                }
                Err(e) => {
                    metrics::record_upstream_error(e.kind());
                    tracing::info!(identity = %identity, error = %e, "Subscription failed, closing");
                    break;
                }
            }
        }

        self.finish(&identity);
    }

    /// Enter `Cancelled`, release upstream resources and deregister this subscription only.
    fn finish(&self, identity: &ConfigIdentity) {
        self.subscription.cancel();
        self.upstream.cancel(identity);
        let me = &self.subscription;
        self.registry.remove_if(identity, |_, current| Arc::ptr_eq(current, me));
        metrics::record_subscriptions(self.registry.len());
        tracing::info!(identity = %identity, "Subscription closed");
    }
}

/// Check an upstream answer before it reaches the coordinator.
///
/// Generations never go backwards for an identity, except for the reset sentinel.
fn accept(
    identity: &ConfigIdentity,
    baseline: &KnownConfig,
    value: ConfigValue,
) -> Result<ConfigValue, UpstreamError> {
    if &value.identity != identity {
        return Err(UpstreamError::Transport {
            endpoint: "upstream".to_string(),
            message: format!("answered for {} instead of {}", value.identity, identity),
        });
    }
    if value.generation < baseline.generation && value.generation != RESET_GENERATION {
        return Err(UpstreamError::Stale {
            generation: value.generation,
            baseline: baseline.generation,
        });
    }
    Ok(value)
}
