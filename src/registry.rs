//! Per-key wait/wake coordination.
//!
//! A single mutex guards the key → wait-point map. Insert-if-absent and
//! remove+signal each happen inside one critical section (classic
//! test-and-set), which is what makes "is someone already computing this key"
//! and "I am now the computor" atomic.
//!
//! The wait-point is a `watch` channel rather than `Notify`: a receiver
//! subscribed while holding the registry lock observes a later signal even if
//! it only starts awaiting after the signal was sent, so there is no
//! lost-wakeup window between releasing the lock and parking. Waiters hold
//! their receiver directly and never re-look-up the map.

use std::{collections::HashMap, sync::Mutex};

use tokio::sync::watch;

/// Outcome of [`WaitRegistry::acquire_or_join`].
pub enum Join<'a> {
    /// This caller won the entry and must run the computation. Dropping the
    /// guard releases the entry and wakes all waiters.
    Computor(ComputeGuard<'a>),
    /// Someone else is computing; await a change on the receiver, then re-run
    /// the hit/computor/wait decision. The wakeup carries no result.
    Waiter(watch::Receiver<bool>),
}

/// Mapping from in-flight key to its wait-point.
#[derive(Debug, Default)]
pub struct WaitRegistry {
    inner: Mutex<HashMap<String, watch::Sender<bool>>>,
}

impl WaitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically join an in-flight computation or become the computor.
    ///
    /// This is the only place wait-points are created and inserted.
    pub fn acquire_or_join(&self, key: &str) -> Join<'_> {
        let mut map = self.inner.lock().unwrap();
        if let Some(tx) = map.get(key) {
            return Join::Waiter(tx.subscribe());
        }
        let (tx, _) = watch::channel(false);
        map.insert(key.to_string(), tx);
        Join::Computor(ComputeGuard {
            registry: self,
            key: key.to_string(),
        })
    }

    /// Number of keys currently in flight.
    pub fn in_flight(&self) -> usize {
        self.inner.lock().unwrap().len()
    }
}

/// Releases the registry entry for one key when dropped.
#[derive(Debug)]
pub struct ComputeGuard<'a> {
    registry: &'a WaitRegistry,
    key: String,
}

impl Drop for ComputeGuard<'_> {
    /// Runs on every exit path of the computor, success or failure: signal all
    /// waiters, then remove the entry, inside one critical section. A missed
    /// release would stall every future waiter for this key forever, which is
    /// why this lives in `Drop` and not on a success-only path.
    fn drop(&mut self) {
        let mut map = self.registry.inner.lock().unwrap();
        if let Some(tx) = map.get(&self.key) {
            let _ = tx.send(true);
        }
        map.remove(&self.key);
    }
}
