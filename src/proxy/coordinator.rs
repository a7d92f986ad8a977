//! Entry point for client requests and upstream updates.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

use crate::cache::{CacheEntry, RequestCache};
use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::model::{ConfigIdentity, ConfigValue, KnownConfig};
use crate::observability::metrics;
use crate::pending::{PendingRequest, PendingRequestSet, ReplyHandle};
use crate::proxy::sweeper::{reply_from_cache, SweeperHandle, TimeoutSweeper};
use crate::proxy::timing::TimingValues;
use crate::subscription::{
    EnsureOutcome, SubscriptionInfo, SubscriptionManager, UpdateListener, WorkerSettings,
};
use crate::upstream::UpstreamSource;

/// An inbound request for one configuration.
#[derive(Debug, Clone)]
pub struct ConfigRequest {
    pub namespace: String,
    pub name: String,
    pub def_checksum: String,
    /// What the client already holds.
    pub known: KnownConfig,
    /// Client deadline; the configured default when absent.
    pub timeout: Option<Duration>,
}

/// Outcome of admitting a request.
#[derive(Debug)]
pub enum Admission {
    /// Answered now; the reply handle was not used.
    Immediate(Arc<ConfigValue>),
    /// The reply handle will be called exactly once, later.
    Deferred,
    /// Refused; the reply handle was dropped unused.
    Rejected(ProxyError),
}

/// Point-in-time view of the proxy.
#[derive(Debug, Clone, Serialize)]
pub struct ProxyStatus {
    pub shutting_down: bool,
    pub pending_requests: usize,
    pub subscriptions: Vec<SubscriptionInfo>,
    pub cache_entries: usize,
    pub sources: Vec<String>,
}

/// Ties the cache, the pending set, the subscriptions and the sweeper together.
pub struct ProxyCoordinator<U: UpstreamSource> {
    cache: RequestCache,
    pending: PendingRequestSet,
    subscriptions: SubscriptionManager<U>,
    timing: TimingValues,
    grace_period: Duration,
    sweeper: Mutex<Option<SweeperHandle>>,
    shutting_down: AtomicBool,
}

impl<U: UpstreamSource> ProxyCoordinator<U> {
    pub fn new(upstream: Arc<U>, config: &ProxyConfig) -> Arc<Self> {
        let timing = TimingValues::from_config(&config.timing);
        let settings = WorkerSettings {
            fetch_timeout: timing.upstream_budget,
            retry: config.retries.clone(),
        };
        Arc::new(Self {
            cache: RequestCache::new(),
            pending: PendingRequestSet::new(),
            subscriptions: SubscriptionManager::new(upstream, settings),
            timing,
            grace_period: config.shutdown.grace_period(),
            sweeper: Mutex::new(None),
            shutting_down: AtomicBool::new(false),
        })
    }

    /// Admit one client request.
    ///
    /// Never blocks on I/O. With `Deferred`, `reply` is called exactly once by the
    /// update path, the sweeper or the shutdown drain.
    pub fn get_config(self: &Arc<Self>, request: ConfigRequest, reply: Box<dyn ReplyHandle>) -> Admission {
        if self.is_shutting_down() {
            return reject(ProxyError::ShuttingDown);
        }
        let identity = match ConfigIdentity::new(request.namespace, request.name, request.def_checksum) {
            Ok(identity) => identity,
            Err(e) => return reject(e.into()),
        };
        let timeout = match self.timing.admit_timeout(request.timeout) {
            Ok(timeout) => timeout,
            Err(e) => return reject(e),
        };

        let pending = Arc::new(PendingRequest::new(
            identity.clone(),
            request.known,
            Instant::now() + timeout,
            reply,
        ));
        self.pending.add(Arc::clone(&pending));

        // Admitted after the shutdown drain started; nothing else would answer it.
        if self.is_shutting_down() && self.pending.claim(&pending) {
            pending.discard();
            return reject(ProxyError::ShuttingDown);
        }

        let cached = self.cache.get(&identity);
        let needs_subscription = !cached.as_ref().is_some_and(|value| value.is_usable());

        let mut admission = Admission::Deferred;
        match cached {
            Some(cached) if cached.differs_from(pending.known()) => {
                if self.pending.claim(&pending) {
                    pending.discard();
                    metrics::record_reply("fast");
                    tracing::debug!(
                        request = %pending.id(),
                        identity = %identity,
                        generation = cached.generation,
                        error = cached.error,
                        "Serving cached config"
                    );
                    admission = Admission::Immediate(cached);
                } else {
                    metrics::record_claim_race("fast");
                    tracing::info!(
                        request = %pending.id(),
                        identity = %identity,
                        "Request already answered by an update"
                    );
                }
            }
            Some(cached) if !needs_subscription => {
                tracing::debug!(
                    request = %pending.id(),
                    identity = %identity,
                    generation = cached.generation,
                    "Client holds the cached config, waiting for a change"
                );
            }
            _ => {}
        }

        // An error or reset value in the cache is served, but upstream is still asked.
        if needs_subscription {
            let listener: Arc<dyn UpdateListener> = Arc::clone(self) as Arc<dyn UpdateListener>;
            if let EnsureOutcome::Failed(e) =
                self.subscriptions.ensure_subscription(&identity, &pending, listener)
            {
                tracing::debug!(
                    request = %pending.id(),
                    identity = %identity,
                    error = %e,
                    "No subscription started for config"
                );
            }
        }

        match admission {
            Admission::Immediate(_) => metrics::record_request("immediate"),
            _ => metrics::record_request("deferred"),
        }
        admission
    }

    /// Start the timeout sweeper on the current runtime. Idempotent.
    pub fn start_sweeper(self: &Arc<Self>) {
        let mut slot = self.sweeper.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() && !self.is_shutting_down() {
            let sweeper = TimeoutSweeper::new(self.pending.clone(), self.cache.clone(), &self.timing);
            *slot = Some(sweeper.spawn());
        }
    }

    /// Stop everything and answer whatever is still pending. Idempotent.
    ///
    /// Order: sweeper, subscriptions, workers (bounded by the grace period),
    /// upstream connections, remaining requests.
    pub async fn shutdown(&self) {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!("Shutting down config proxy");

        let sweeper = self.sweeper.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(sweeper) = sweeper {
            sweeper.stop().await;
        }

        let workers = self.subscriptions.cancel_all();
        let deadline = Instant::now() + self.grace_period;
        for mut worker in workers {
            match tokio::time::timeout_at(deadline, &mut worker).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    if !e.is_cancelled() {
                        tracing::warn!(error = %e, "Subscription worker ended abnormally");
                    }
                }
                Err(_) => {
                    tracing::warn!("Subscription worker still running after grace period, aborting");
                    worker.abort();
                }
            }
        }

        self.subscriptions.upstream().close();

        let remaining = self.pending.drain();
        for request in &remaining {
            reply_from_cache(&self.cache, request, "shutdown");
        }
        tracing::info!(answered = remaining.len(), "Config proxy stopped");
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> ProxyStatus {
        ProxyStatus {
            shutting_down: self.is_shutting_down(),
            pending_requests: self.pending.len(),
            subscriptions: self.subscriptions.list(),
            cache_entries: self.cache.len(),
            sources: self.subscriptions.upstream().sources(),
        }
    }

    pub fn cached(&self) -> Vec<CacheEntry> {
        self.cache.entries()
    }

    pub fn cache(&self) -> &RequestCache {
        &self.cache
    }

    pub fn pending(&self) -> &PendingRequestSet {
        &self.pending
    }

    pub fn subscriptions(&self) -> &SubscriptionManager<U> {
        &self.subscriptions
    }

    pub fn timing(&self) -> &TimingValues {
        &self.timing
    }
}

impl<U: UpstreamSource> UpdateListener for ProxyCoordinator<U> {
    fn on_update(&self, value: ConfigValue) {
        let value = Arc::new(value);
        self.cache.put(Arc::clone(&value));

        let waiting = self.pending.matching(&value.identity);
        let mut eligible = 0usize;
        let mut delivered = 0usize;
        for request in &waiting {
            if !value.satisfies(request.requested_generation()) {
                continue;
            }
            eligible += 1;
            if self.pending.claim(request) {
                if request.deliver(Arc::clone(&value)) {
                    metrics::record_reply("update");
                }
                delivered += 1;
            } else {
                metrics::record_claim_race("update");
            }
        }

        if eligible > 0 && delivered == 0 {
            tracing::info!(
                identity = %value.identity,
                "Matching requests were already answered elsewhere"
            );
        }
        tracing::debug!(
            identity = %value.identity,
            generation = value.generation,
            waiting = waiting.len(),
            delivered,
            "Delivered update"
        );
    }
}

fn reject(error: ProxyError) -> Admission {
    metrics::record_request("rejected");
    tracing::debug!(error = %error, "Rejected config request");
    Admission::Rejected(error)
}
