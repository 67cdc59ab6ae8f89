//! Single-flight orchestration: hit / become-computor / wait-then-retry.
//!
//! Core behavior for each call:
//! 1) Try the store. A hit is returned immediately for replay.
//! 2) Otherwise atomically inspect the wait registry: an existing entry makes
//!    this caller a waiter; no entry makes it the computor.
//! 3) Waiters block (bounded or unbounded) on the wait-point, then loop back
//!    to 1 — the wakeup carries no result, so the whole decision re-runs.
//! 4) The computor runs the computation, stores the snapshot if its status is
//!    cacheable, and releases the registry entry on every exit path.
//!
//! Design notes:
//! - The computor double-checks the store right after winning the registry
//!   entry, so a miss that raced against another computor's store-then-signal
//!   still resolves as a hit instead of a redundant recomputation.
//! - A failed computation caches nothing; every waiter woken by that cycle
//!   falls through to become its own computor. Failures therefore fan out to
//!   N independent retries rather than collapsing to one. That is the
//!   intended behavior, not a bug: error outcomes must never be shared from
//!   a partially-failed attempt.
//! - A waiter's timeout bounds only its own wait. The computor always runs to
//!   completion; there is no cancellation path from waiter to computor.
//! - Store failures degrade: a failing `get` counts as a miss, a failing
//!   `put` means the computation simply ran uncached. Neither crashes the
//!   coordinator.

use std::{future::Future, sync::Arc};

use tokio::time::timeout;
use tracing::{debug, warn};

use crate::{
    cache::CacheStore,
    config::CacheConfig,
    registry::{Join, WaitRegistry},
    snapshot::Snapshot,
};

/// Result of [`SingleFlightCoordinator::handle`].
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Served from the store; replay the snapshot and stop.
    Hit(Arc<Snapshot>),
    /// This caller ran the computation; the live channel already saw every
    /// byte through the recorder, so there is nothing left to send.
    Computed(Arc<Snapshot>),
    /// Bounded wait expired before the computor finished. The caller must
    /// invoke the operation itself, uncached and uncoordinated.
    PassThrough,
}

/// Guarantees at most one concurrent computation per key.
pub struct SingleFlightCoordinator {
    cfg: CacheConfig,
    store: Arc<dyn CacheStore>,
    registry: WaitRegistry,
}

impl SingleFlightCoordinator {
    pub fn new(cfg: CacheConfig, store: Arc<dyn CacheStore>) -> Self {
        Self {
            cfg,
            store,
            registry: WaitRegistry::new(),
        }
    }

    /// Resolve `key` to a snapshot, computing at most once across all
    /// concurrent callers.
    ///
    /// `compute` runs only if this caller becomes the computor; it should run
    /// the real handler through a recorder and return the finalized snapshot.
    /// On computation failure the registry entry is still released and all
    /// waiters are woken, then the error propagates to this caller alone.
    pub async fn handle<F, Fut>(&self, key: &str, compute: F) -> anyhow::Result<Outcome>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<Snapshot>>,
    {
        loop {
            if let Some(snap) = self.store_get(key) {
                debug!(key = %key, "cache hit");
                return Ok(Outcome::Hit(snap));
            }

            match self.registry.acquire_or_join(key) {
                Join::Computor(guard) => {
                    // Double-check after winning the entry: a concurrent
                    // computor may have stored and released between our miss
                    // above and the registry critical section.
                    if let Some(snap) = self.store_get(key) {
                        debug!(key = %key, "cache hit on double-check");
                        drop(guard);
                        return Ok(Outcome::Hit(snap));
                    }

                    debug!(key = %key, "computing");
                    // On error the guard still drops: entry removed, waiters
                    // woken, nothing cached.
                    let snapshot = Arc::new(compute().await?);
                    if self.cfg.is_cacheable(snapshot.status) {
                        if let Err(e) = self.store.put(key, snapshot.clone()) {
                            warn!(key = %key, error = %e, "store put failed; ran uncached");
                        }
                    } else {
                        debug!(
                            key = %key,
                            status = snapshot.status,
                            "status not cacheable; discarding snapshot"
                        );
                    }
                    drop(guard);
                    return Ok(Outcome::Computed(snapshot));
                }
                Join::Waiter(mut rx) => match self.cfg.wait_timeout() {
                    None => {
                        // Indefinite wait. A closed sender means the computor
                        // released; either way, re-run the decision loop.
                        let _ = rx.changed().await;
                        debug!(key = %key, "woken; rechecking");
                    }
                    Some(bound) => {
                        if timeout(bound, rx.changed()).await.is_err() {
                            warn!(key = %key, timeout_ms = self.cfg.wait_timeout_ms, "wait timed out; passing through");
                            return Ok(Outcome::PassThrough);
                        }
                        debug!(key = %key, "woken; rechecking");
                    }
                },
            }
        }
    }

    /// Store read that degrades to a miss on backend failure.
    fn store_get(&self, key: &str) -> Option<Arc<Snapshot>> {
        match self.store.get(key) {
            Ok(found) => found,
            Err(e) => {
                warn!(key = %key, error = %e, "store get failed; treating as miss");
                None
            }
        }
    }
}
