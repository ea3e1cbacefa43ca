//! Single-flight execution keyed by fingerprint.
//!
//! At most one producer runs per fingerprint at a time. The first caller
//! (the leader) registers an in-flight entry and spawns the producer;
//! callers arriving while that entry exists (followers) wait for its
//! result instead of starting their own. The producer runs on its own
//! task, so a leader that stops waiting does not cancel the work the
//! followers depend on.
//!
//! A follower that joins while the leader is between retries still gets
//! the leader's final result: there is no separate window per attempt.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::debug;

use crate::cache::Fingerprint;
use crate::{GatewayError, Result, telemetry};

type Slot<T> = watch::Receiver<Option<Result<T>>>;

struct InFlight<T> {
    id: u64,
    rx: Slot<T>,
}

/// Whether a [`RequestCoalescer::run_once`] caller led or joined the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Leader,
    Follower,
}

/// In-flight call registry.
pub struct RequestCoalescer<T> {
    inflight: Arc<Mutex<HashMap<Fingerprint, InFlight<T>>>>,
    next_id: AtomicU64,
}

impl<T> Default for RequestCoalescer<T> {
    fn default() -> Self {
        Self {
            inflight: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        }
    }
}

impl<T> RequestCoalescer<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of fingerprints with a call in flight.
    pub fn in_flight(&self) -> usize {
        self.inflight.lock().len()
    }

    /// Run `producer` unless a call for `fingerprint` is already in flight,
    /// in which case wait for that call's result instead.
    ///
    /// `producer` is dropped unused when the caller is a follower. Leaders
    /// and followers receive clones of the same result, error included.
    pub async fn run_once(
        &self,
        fingerprint: &Fingerprint,
        producer: BoxFuture<'static, Result<T>>,
    ) -> (Result<T>, Role) {
        let (mut rx, role) = self.join_or_lead(fingerprint, producer);
        if role == Role::Follower {
            metrics::counter!(telemetry::COALESCED_TOTAL).increment(1);
            debug!(fingerprint = fingerprint.short(), "joined in-flight call");
        }

        let result = match rx.wait_for(Option::is_some).await {
            Ok(slot) => (*slot).clone().unwrap_or_else(|| Err(leader_lost())),
            Err(_) => Err(leader_lost()),
        };
        (result, role)
    }

    /// Check, decide and register under one lock acquisition.
    fn join_or_lead(
        &self,
        fingerprint: &Fingerprint,
        producer: BoxFuture<'static, Result<T>>,
    ) -> (Slot<T>, Role) {
        let mut map = self.inflight.lock();
        if let Some(entry) = map.get(fingerprint) {
            return (entry.rx.clone(), Role::Follower);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = watch::channel(None);
        map.insert(fingerprint.clone(), InFlight { id, rx: rx.clone() });

        let registration = Registration {
            inflight: Arc::clone(&self.inflight),
            fingerprint: fingerprint.clone(),
            id,
        };
        tokio::spawn(async move {
            let result = producer.await;
            registration.publish(tx, result);
        });

        (rx, Role::Leader)
    }
}

fn leader_lost() -> GatewayError {
    GatewayError::Internal("in-flight call ended without a result".to_string())
}

fn remove_if_current<T>(map: &mut HashMap<Fingerprint, InFlight<T>>, fp: &Fingerprint, id: u64) {
    if map.get(fp).is_some_and(|entry| entry.id == id) {
        map.remove(fp);
    }
}

/// A leader's entry in the registry, owned by its producer task.
///
/// Dropping it removes the entry, so a producer task that unwinds does not
/// wedge the fingerprint; waiters then see the sender dropped. Removal
/// checks the id, which makes the drop a no-op after [`publish`].
///
/// [`publish`]: Registration::publish
struct Registration<T> {
    inflight: Arc<Mutex<HashMap<Fingerprint, InFlight<T>>>>,
    fingerprint: Fingerprint,
    id: u64,
}

impl<T> Registration<T> {
    /// Send the result and deregister under one lock, so no caller can
    /// join an entry whose result has already been sent.
    fn publish(self, tx: watch::Sender<Option<Result<T>>>, result: Result<T>) {
        let mut map = self.inflight.lock();
        tx.send_replace(Some(result));
        remove_if_current(&mut map, &self.fingerprint, self.id);
    }
}

impl<T> Drop for Registration<T> {
    fn drop(&mut self) {
        remove_if_current(&mut self.inflight.lock(), &self.fingerprint, self.id);
    }
}
