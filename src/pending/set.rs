//! Deadline-ordered set of pending requests with a per-identity index.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::time::Instant;

use crate::model::ConfigIdentity;
use crate::observability::metrics;
use crate::pending::request::{PendingRequest, RequestId};

/// Both indices live behind one lock so an entry is never in one and not the other.
#[derive(Debug, Default)]
struct PendingIndex {
    by_deadline: BTreeMap<(Instant, RequestId), Arc<PendingRequest>>,
    by_identity: HashMap<ConfigIdentity, BTreeMap<RequestId, Arc<PendingRequest>>>,
}

impl PendingIndex {
    fn remove(&mut self, deadline: Instant, id: RequestId, identity: &ConfigIdentity) -> bool {
        if self.by_deadline.remove(&(deadline, id)).is_none() {
            return false;
        }
        if let Some(for_identity) = self.by_identity.get_mut(identity) {
            for_identity.remove(&id);
            if for_identity.is_empty() {
                self.by_identity.remove(identity);
            }
        }
        true
    }
}

/// The set of client requests awaiting a reply.
///
/// Lock discipline: a single mutex guards both indices and is never held
/// while calling out (replies, callbacks, logging of payloads). Every
/// operation is O(log n) per entry touched.
#[derive(Debug, Clone, Default)]
pub struct PendingRequestSet {
    inner: Arc<Mutex<PendingIndex>>,
}

impl PendingRequestSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, PendingIndex> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add(&self, request: Arc<PendingRequest>) {
        let len = {
            let mut index = self.lock();
            index
                .by_identity
                .entry(request.identity().clone())
                .or_default()
                .insert(request.id(), Arc::clone(&request));
            index
                .by_deadline
                .insert((request.deadline(), request.id()), request);
            index.by_deadline.len()
        };
        metrics::record_pending(len);
    }

    /// Remove `request` if it is still present.
    ///
    /// Returns true only for the one caller that actually removed it.
    pub fn claim(&self, request: &PendingRequest) -> bool {
        let (claimed, len) = {
            let mut index = self.lock();
            let claimed = index.remove(request.deadline(), request.id(), request.identity());
            (claimed, index.by_deadline.len())
        };
        if claimed {
            metrics::record_pending(len);
        }
        claimed
    }

    /// Claim every entry with `deadline <= now` and hand each to `f`.
    ///
    /// Entries claimed elsewhere are skipped. Returns how many were handed out.
    pub fn for_each_expired<F>(&self, now: Instant, mut f: F) -> usize
    where
        F: FnMut(Arc<PendingRequest>),
    {
        let (expired, len) = {
            let mut index = self.lock();
            let keys: Vec<(Instant, RequestId)> = index
                .by_deadline
                .range(..=(now, RequestId::MAX))
                .map(|(key, _)| *key)
                .collect();

            let mut expired = Vec::with_capacity(keys.len());
            for (deadline, id) in keys {
                if let Some(request) = index.by_deadline.get(&(deadline, id)).cloned() {
                    if index.remove(deadline, id, request.identity()) {
                        expired.push(request);
                    }
                }
            }
            (expired, index.by_deadline.len())
        };

        if !expired.is_empty() {
            metrics::record_pending(len);
        }
        let count = expired.len();
        for request in expired {
            f(request);
        }
        count
    }

    /// Point-in-time snapshot of requests waiting on `identity`, in admission order.
    ///
    /// Each element must still be claimed before it is answered.
    pub fn matching(&self, identity: &ConfigIdentity) -> Vec<Arc<PendingRequest>> {
        self.lock()
            .by_identity
            .get(identity)
            .map(|requests| requests.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Claim everything that is left (used once, at shutdown).
    pub fn drain(&self) -> Vec<Arc<PendingRequest>> {
        let drained: Vec<Arc<PendingRequest>> = {
            let mut index = self.lock();
            index.by_identity.clear();
            std::mem::take(&mut index.by_deadline).into_values().collect()
        };
        metrics::record_pending(0);
        drained
    }

    pub fn len(&self) -> usize {
        self.lock().by_deadline.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of requests currently waiting on `identity`.
    pub fn count_for(&self, identity: &ConfigIdentity) -> usize {
        self.lock().by_identity.get(identity).map_or(0, BTreeMap::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ConfigValue, KnownConfig};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::oneshot;

    fn identity(name: &str) -> ConfigIdentity {
        ConfigIdentity::new("ns", name, "").unwrap()
    }

    fn pending(name: &str, deadline: Instant) -> Arc<PendingRequest> {
        let (tx, _rx) = oneshot::channel::<Arc<ConfigValue>>();
        Arc::new(PendingRequest::new(identity(name), KnownConfig::default(), deadline, Box::new(tx)))
    }

    #[test]
    fn test_add_and_claim_once() {
        let set = PendingRequestSet::new();
        let request = pending("a", Instant::now());
        set.add(Arc::clone(&request));
        assert_eq!(set.len(), 1);
        assert_eq!(set.count_for(&identity("a")), 1);

        assert!(set.claim(&request));
        assert!(!set.claim(&request));
        assert!(set.is_empty());
        assert_eq!(set.count_for(&identity("a")), 0);
        assert!(set.matching(&identity("a")).is_empty());
    }

    #[test]
    fn test_matching_is_a_snapshot() {
        let set = PendingRequestSet::new();
        let now = Instant::now();
        let first = pending("a", now + Duration::from_secs(5));
        let second = pending("a", now + Duration::from_secs(1));
        let other = pending("b", now);
        set.add(Arc::clone(&first));
        set.add(Arc::clone(&second));
        set.add(other);

        let snapshot = set.matching(&identity("a"));
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].id(), first.id());

        // Mutating after the snapshot does not change it.
        assert!(set.claim(&first));
        assert_eq!(snapshot.len(), 2);
        assert_eq!(set.matching(&identity("a")).len(), 1);
    }

    #[test]
    fn test_for_each_expired_skips_claimed() {
        let set = PendingRequestSet::new();
        let now = Instant::now();
        let expired = pending("a", now - Duration::from_millis(10));
        let also_expired = pending("b", now);
        let future = pending("a", now + Duration::from_secs(10));
        set.add(Arc::clone(&expired));
        set.add(Arc::clone(&also_expired));
        set.add(Arc::clone(&future));

        assert!(set.claim(&also_expired));

        let mut seen = Vec::new();
        let count = set.for_each_expired(now, |r| seen.push(r.id()));
        assert_eq!(count, 1);
        assert_eq!(seen, vec![expired.id()]);
        assert!(!set.claim(&expired));
        assert_eq!(set.len(), 1);
        assert_eq!(set.count_for(&identity("a")), 1);
    }

    #[test]
    fn test_drain_empties_both_indices() {
        let set = PendingRequestSet::new();
        let now = Instant::now();
        set.add(pending("a", now));
        set.add(pending("b", now));
        assert_eq!(set.drain().len(), 2);
        assert!(set.is_empty());
        assert!(set.matching(&identity("a")).is_empty());
    }

    #[test]
    fn test_concurrent_claim_single_winner() {
        for _ in 0..50 {
            let set = PendingRequestSet::new();
            let request = pending("a", Instant::now());
            set.add(Arc::clone(&request));

            let wins = Arc::new(AtomicUsize::new(0));
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let set = set.clone();
                    let request = Arc::clone(&request);
                    let wins = Arc::clone(&wins);
                    std::thread::spawn(move || {
                        if set.claim(&request) {
                            wins.fetch_add(1, Ordering::SeqCst);
                        }
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }
            assert_eq!(wins.load(Ordering::SeqCst), 1);
        }
    }
}
