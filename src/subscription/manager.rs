//! Registry of live subscriptions, at most one per identity.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::model::ConfigIdentity;
use crate::observability::metrics;
use crate::pending::PendingRequest;
use crate::subscription::state::SubscriptionState;
use crate::subscription::subscriber::{Subscription, UpdateListener, Worker, WorkerSettings};
use crate::upstream::{UpstreamError, UpstreamSource};

pub(crate) type Registry = Arc<DashMap<ConfigIdentity, Arc<Subscription>>>;

/// Result of asking for a subscription.
#[derive(Debug, Clone)]
pub enum EnsureOutcome {
    /// A subscription for the identity was already registered.
    Existing,
    /// A new subscription was registered and its worker spawned.
    Started,
    /// The subscription could not be created and was not registered.
    Failed(UpstreamError),
}

/// Snapshot of one registered subscription.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionInfo {
    pub identity: ConfigIdentity,
    pub state: SubscriptionState,
}

/// Owns every upstream subscription.
pub struct SubscriptionManager<U: UpstreamSource> {
    upstream: Arc<U>,
    registry: Registry,
    settings: WorkerSettings,
    closed: AtomicBool,
}

impl<U: UpstreamSource> SubscriptionManager<U> {
    pub fn new(upstream: Arc<U>, settings: WorkerSettings) -> Self {
        Self {
            upstream,
            registry: Arc::new(DashMap::new()),
            settings,
            closed: AtomicBool::new(false),
        }
    }

    pub fn upstream(&self) -> &Arc<U> {
        &self.upstream
    }

    /// Make sure a subscription exists for `identity`.
    ///
    /// Check-then-register is atomic per identity. `initial` is the request that
    /// triggered the subscription and is only used for logging; its reply always
    /// comes through the listener or the sweeper.
    pub fn ensure_subscription(
        &self,
        identity: &ConfigIdentity,
        initial: &PendingRequest,
        listener: Arc<dyn UpdateListener>,
    ) -> EnsureOutcome {
        if self.closed.load(Ordering::Acquire) {
            return EnsureOutcome::Failed(UpstreamError::Cancelled);
        }

        let runtime = match Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!(identity = %identity, error = %e, "Cannot spawn subscription worker");
                return EnsureOutcome::Failed(UpstreamError::WorkerUnavailable);
            }
        };

        let subscription = match self.registry.entry(identity.clone()) {
            Entry::Occupied(_) => {
                tracing::debug!(
                    identity = %identity,
                    request = %initial.id(),
                    "Already a subscription running"
                );
                return EnsureOutcome::Existing;
            }
            Entry::Vacant(vacant) => {
                // Re-checked under the shard lock: `cancel_all` sets `closed` before
                // walking the registry, so nothing can slip in after it.
                if self.closed.load(Ordering::Acquire) {
                    return EnsureOutcome::Failed(UpstreamError::Cancelled);
                }
                tracing::debug!(
                    identity = %identity,
                    request = %initial.id(),
                    "No usable config cached, creating subscription"
                );
                let subscription = Arc::new(Subscription::new(identity.clone()));
                if let Err(e) = self.upstream.open(identity) {
                    subscription.cancel();
                    metrics::record_upstream_error(e.kind());
                    tracing::info!(identity = %identity, error = %e, "Subscribe failed, closing subscription");
                    return EnsureOutcome::Failed(e);
                }
                vacant.insert(Arc::clone(&subscription));
                subscription
            }
        };
        metrics::record_subscriptions(self.registry.len());

        let worker = Worker {
            subscription: Arc::clone(&subscription),
            upstream: Arc::clone(&self.upstream),
            listener,
            registry: Arc::clone(&self.registry),
            settings: self.settings.clone(),
        };
        subscription.attach_worker(runtime.spawn(worker.run()));
        EnsureOutcome::Started
    }

    /// Cancel every subscription, empty the registry and refuse new ones.
    ///
    /// Returns the worker handles so the caller can wait for them.
    pub fn cancel_all(&self) -> Vec<JoinHandle<()>> {
        self.closed.store(true, Ordering::Release);

        let subscriptions: Vec<Arc<Subscription>> =
            self.registry.iter().map(|entry| Arc::clone(entry.value())).collect();
        self.registry.clear();

        let handles = subscriptions
            .iter()
            .filter_map(|subscription| {
                subscription.cancel();
                subscription.take_worker()
            })
            .collect::<Vec<_>>();

        metrics::record_subscriptions(0);
        tracing::info!(count = subscriptions.len(), "Cancelled all subscriptions");
        handles
    }

    pub fn is_active(&self, identity: &ConfigIdentity) -> bool {
        self.registry.contains_key(identity)
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Registered subscriptions sorted by identity.
    pub fn list(&self) -> Vec<SubscriptionInfo> {
        let mut infos: Vec<SubscriptionInfo> = self
            .registry
            .iter()
            .map(|entry| SubscriptionInfo {
                identity: entry.key().clone(),
                state: entry.value().state(),
            })
            .collect();
        infos.sort_by(|a, b| a.identity.cmp(&b.identity));
        infos
    }
}
