//! YAML configuration structures.
//!
//! All structures are `serde`-compatible; every field has a default so an
//! empty document (or `CacheConfig::default()`) yields a working setup.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};
use tokio::time::Duration;

/// Coordinator + store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Maximum number of snapshots kept by the in-memory store (LRU).
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    /// How long a waiter blocks for an in-flight computation, in milliseconds.
    /// `0` means wait indefinitely; waiters whose bound elapses get a
    /// pass-through miss instead of a snapshot.
    #[serde(default)]
    pub wait_timeout_ms: u64,
    /// Statuses whose snapshots are stored after computing; anything else is
    /// discarded (the response still reached the live channel).
    #[serde(default = "default_cacheable_statuses")]
    pub cacheable_statuses: Vec<u16>,
}

impl CacheConfig {
    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)?;
        let cfg: CacheConfig = serde_yaml::from_str(&raw)?;
        Ok(cfg)
    }

    /// Cacheable-status predicate, consulted once per computation.
    pub fn is_cacheable(&self, status: u16) -> bool {
        self.cacheable_statuses.contains(&status)
    }

    /// Waiter bound; `None` means wait indefinitely.
    pub fn wait_timeout(&self) -> Option<Duration> {
        if self.wait_timeout_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.wait_timeout_ms))
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            wait_timeout_ms: 0,
            cacheable_statuses: default_cacheable_statuses(),
        }
    }
}

fn default_max_entries() -> usize {
    10_000
}

fn default_cacheable_statuses() -> Vec<u16> {
    vec![200]
}
