//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

use config_proxy::config::ProxyConfig;
use config_proxy::model::{ConfigIdentity, ConfigValue, KnownConfig};
use config_proxy::pending::ReplyHandle;
use config_proxy::proxy::ConfigRequest;
use config_proxy::upstream::{FetchRequest, UpstreamError, UpstreamSource};

/// In-memory upstream driven by the test.
///
/// A fetch waits until the published value differs from what the caller
/// holds, or its timeout elapses; then it answers with the current value, or
/// a timeout error if nothing was ever published.
#[derive(Default)]
pub struct ScriptedUpstream {
    feeds: Mutex<HashMap<ConfigIdentity, watch::Sender<Option<ConfigValue>>>>,
    refuse_open: Mutex<HashSet<ConfigIdentity>>,
    refuse_fetch: Mutex<HashSet<ConfigIdentity>>,
    silent: AtomicBool,
    closed: AtomicBool,
    opens: AtomicUsize,
    fetches: AtomicUsize,
    cancels: AtomicUsize,
}

impl ScriptedUpstream {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make `value` the current upstream state for its identity.
    pub fn publish(&self, value: ConfigValue) {
        self.feeds
            .lock()
            .unwrap()
            .entry(value.identity.clone())
            .or_insert_with(|| watch::channel(None).0)
            .send_replace(Some(value));
    }

    /// Refuse the initial subscribe for `identity`.
    pub fn refuse_open(&self, identity: &ConfigIdentity, refuse: bool) {
        let mut set = self.refuse_open.lock().unwrap();
        if refuse {
            set.insert(identity.clone());
        } else {
            set.remove(identity);
        }
    }

    /// Answer every fetch for `identity` with a configuration error.
    pub fn refuse_fetch(&self, identity: &ConfigIdentity) {
        self.refuse_fetch.lock().unwrap().insert(identity.clone());
    }

    /// Never answer a fetch.
    pub fn go_silent(&self) {
        self.silent.store(true, Ordering::SeqCst);
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn cancels(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn feed(&self, identity: &ConfigIdentity) -> watch::Receiver<Option<ConfigValue>> {
        self.feeds
            .lock()
            .unwrap()
            .entry(identity.clone())
            .or_insert_with(|| watch::channel(None).0)
            .subscribe()
    }
}

impl UpstreamSource for ScriptedUpstream {
    fn open(&self, identity: &ConfigIdentity) -> Result<(), UpstreamError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if self.refuse_open.lock().unwrap().contains(identity) {
            return Err(UpstreamError::Configuration {
                identity: identity.to_string(),
                reason: "unknown config definition".to_string(),
            });
        }
        Ok(())
    }

    async fn fetch(&self, request: FetchRequest) -> Result<ConfigValue, UpstreamError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.silent.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.refuse_fetch.lock().unwrap().contains(&request.identity) {
            return Err(UpstreamError::Configuration {
                identity: request.identity.to_string(),
                reason: "definition removed".to_string(),
            });
        }

        let mut rx = self.feed(&request.identity);
        let known = request.known.clone();
        let changed = async {
            loop {
                let current = rx.borrow_and_update().clone();
                if let Some(value) = current {
                    if value.differs_from(&known) {
                        return value;
                    }
                }
                if rx.changed().await.is_err() {
                    std::future::pending::<()>().await;
                }
            }
        };

        match tokio::time::timeout(request.timeout, changed).await {
            Ok(value) => Ok(value),
            Err(_) => {
                let current = self.feed(&request.identity).borrow().clone();
                current.ok_or(UpstreamError::Timeout(request.timeout))
            }
        }
    }

    fn cancel(&self, _identity: &ConfigIdentity) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }

    async fn probe(&self) {}

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn sources(&self) -> Vec<String> {
        vec!["scripted".to_string()]
    }
}

/// Collects every reply sent to the handles it hands out.
#[derive(Debug, Clone, Default)]
pub struct Replies {
    inner: Arc<Mutex<Vec<Arc<ConfigValue>>>>,
}

impl Replies {
    pub fn handle(&self) -> Box<dyn ReplyHandle> {
        Box::new(RecordingReply { replies: self.clone() })
    }

    pub fn count(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<Arc<ConfigValue>> {
        self.inner.lock().unwrap().last().cloned()
    }
}

struct RecordingReply {
    replies: Replies,
}

impl ReplyHandle for RecordingReply {
    fn reply(self: Box<Self>, value: Arc<ConfigValue>) {
        self.replies.inner.lock().unwrap().push(value);
    }
}

/// Short timings: 10s client timeout, sweeps every second after one second.
pub fn test_config() -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.timing.client_timeout_ms = 10_000;
    config.timing.max_client_timeout_ms = 60_000;
    config.timing.sweep_initial_delay_ms = 1_000;
    config.timing.sweep_interval_ms = 1_000;
    config.shutdown.grace_period_secs = 1;
    config
}

pub fn identity(name: &str) -> ConfigIdentity {
    ConfigIdentity::new("test", name, "").unwrap()
}

pub fn value(name: &str, generation: i64, checksum: &str) -> ConfigValue {
    ConfigValue::new(
        identity(name),
        checksum,
        generation,
        serde_json::json!({ "name": name, "generation": generation }),
    )
}

pub fn request(name: &str, generation: i64, checksum: &str) -> ConfigRequest {
    ConfigRequest {
        namespace: "test".to_string(),
        name: name.to_string(),
        def_checksum: String::new(),
        known: KnownConfig::new(generation, checksum),
        timeout: None,
    }
}

/// Let spawned tasks run without moving far in (paused) time.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}
