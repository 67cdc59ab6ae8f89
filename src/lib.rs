//! Single-flight response cache: at most one computation per key, replayable
//! snapshots for everyone else.
//!
//! Pieces:
//! - [`SingleFlightCoordinator`] decides hit / become-computor / wait-then-retry
//!   per request key and runs the retry loop with an optional bounded wait,
//! - [`ResponseRecorder`] streams a computation's output to the live channel
//!   while capturing it as a [`Snapshot`],
//! - [`Snapshot`] replays a captured response header-for-header and
//!   byte-for-byte onto any [`OutputChannel`],
//! - [`WaitRegistry`] is the per-key wait/wake primitive,
//! - [`CacheStore`] is the delegated storage boundary, with [`MemoryStore`]
//!   (LRU) built in.
//!
//! Typical flow: derive the request key (policy is yours; any deterministic
//! string works), call [`SingleFlightCoordinator::handle`] with a closure that
//! runs the real handler through a [`ResponseRecorder`], then act on the
//! [`Outcome`]: replay the snapshot on a hit, do nothing extra after
//! computing (the live channel already saw the bytes), or run the handler
//! uncached on a pass-through (a waiter whose bounded wait expired).

pub mod cache;
pub mod config;
pub mod coordinator;
pub mod recorder;
pub mod registry;
pub mod snapshot;

pub use cache::{CacheStore, MemoryStore};
pub use config::CacheConfig;
pub use coordinator::{Outcome, SingleFlightCoordinator};
pub use recorder::{OutputChannel, ResponseRecorder};
pub use registry::{ComputeGuard, Join, WaitRegistry};
pub use snapshot::{Cookie, HeaderValue, Snapshot};
