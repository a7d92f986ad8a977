//! A single held client request and its one-shot reply handle.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::model::{ConfigIdentity, ConfigValue, KnownConfig};

/// Unique identifier of a pending request, ordered by admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

impl RequestId {
    pub(crate) const MAX: RequestId = RequestId(u64::MAX);

    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// Transport-side handle used to answer a client exactly once.
pub trait ReplyHandle: Send + 'static {
    fn reply(self: Box<Self>, value: Arc<ConfigValue>);
}

impl ReplyHandle for oneshot::Sender<Arc<ConfigValue>> {
    fn reply(self: Box<Self>, value: Arc<ConfigValue>) {
        if (*self).send(value).is_err() {
            tracing::debug!("Client went away before its reply was sent");
        }
    }
}

/// A client request waiting for a reply.
pub struct PendingRequest {
    id: RequestId,
    identity: ConfigIdentity,
    known: KnownConfig,
    deadline: Instant,
    reply: Mutex<Option<Box<dyn ReplyHandle>>>,
}

impl PendingRequest {
    pub fn new(
        identity: ConfigIdentity,
        known: KnownConfig,
        deadline: Instant,
        reply: Box<dyn ReplyHandle>,
    ) -> Self {
        Self {
            id: RequestId::next(),
            identity,
            known,
            deadline,
            reply: Mutex::new(Some(reply)),
        }
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn identity(&self) -> &ConfigIdentity {
        &self.identity
    }

    pub fn known(&self) -> &KnownConfig {
        &self.known
    }

    pub fn requested_generation(&self) -> i64 {
        self.known.generation
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Send `value` to the client. Only the winner of `claim` may call this.
    ///
    /// Returns false if the handle was already consumed.
    pub fn deliver(&self, value: Arc<ConfigValue>) -> bool {
        match self.take_handle() {
            Some(handle) => {
                handle.reply(value);
                true
            }
            None => {
                tracing::warn!(request = %self.id, identity = %self.identity, "Reply handle already consumed");
                false
            }
        }
    }

    /// Drop the reply handle without answering (the caller answers synchronously).
    pub fn discard(&self) {
        drop(self.take_handle());
    }

    fn take_handle(&self) -> Option<Box<dyn ReplyHandle>> {
        self.reply
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl fmt::Debug for PendingRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingRequest")
            .field("id", &self.id)
            .field("identity", &self.identity)
            .field("known", &self.known)
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn identity() -> ConfigIdentity {
        ConfigIdentity::new("ns", "app", "").unwrap()
    }

    #[test]
    fn test_ids_unique_and_ordered() {
        let a = RequestId::next();
        let b = RequestId::next();
        assert!(a < b);
    }

    #[tokio::test]
    async fn test_deliver_once() {
        let (tx, rx) = oneshot::channel();
        let request = PendingRequest::new(identity(), KnownConfig::new(5, "c5"), Instant::now(), Box::new(tx));
        assert_eq!(request.requested_generation(), 5);

        let value = Arc::new(ConfigValue::new(identity(), "c6", 6, json!({})));
        assert!(request.deliver(Arc::clone(&value)));
        assert!(!request.deliver(value));

        assert_eq!(rx.await.unwrap().generation, 6);
    }

    #[tokio::test]
    async fn test_discard_drops_handle() {
        let (tx, rx) = oneshot::channel::<Arc<ConfigValue>>();
        let request = PendingRequest::new(identity(), KnownConfig::default(), Instant::now(), Box::new(tx));
        request.discard();
        assert!(rx.await.is_err());
    }
}
