// src/expiry.rs
//! TTL-based expiry of chain nodes
//!
//! Nodes expire once `now - created_at` strictly exceeds their TTL: 11 hours
//! by default, 8 hours for bumped nodes. Expiry is passive deletion; it
//! never cascades to children.

use chrono::Duration;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::time::interval;

use crate::clock::Clock;
use crate::config::ChainConfig;
use crate::store::ChainStore;
use crate::types::{Node, NodeId, Timestamp};

/// How long nodes live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPolicy {
    pub ttl: Duration,
    pub bumped_ttl: Duration,
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::hours(11),
            bumped_ttl: Duration::hours(8),
        }
    }
}

impl ExpiryPolicy {
    pub fn ttl_for(&self, node: &Node) -> Duration {
        if node.bumped {
            self.bumped_ttl
        } else {
            self.ttl
        }
    }

    pub fn is_expired(&self, node: &Node, now: Timestamp) -> bool {
        now.signed_duration_since(node.created_at) > self.ttl_for(node)
    }

    /// When the node becomes eligible for removal.
    pub fn expires_at(&self, node: &Node) -> Timestamp {
        node.created_at + self.ttl_for(node)
    }
}

/// Running totals across sweeps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepStats {
    /// Number of sweeps run
    pub sweeps: u64,

    /// Total nodes removed
    pub nodes_removed: u64,

    /// Time of the most recent sweep
    pub last_sweep: Option<Timestamp>,
}

pub struct ExpiryScheduler {
    store: Arc<ChainStore>,
    policy: ExpiryPolicy,
    interval: std::time::Duration,
    enabled: bool,
    stats: Mutex<SweepStats>,
}

impl ExpiryScheduler {
    pub fn new(store: Arc<ChainStore>, config: &ChainConfig) -> Self {
        Self {
            store,
            policy: config.policy(),
            interval: config.sweep_interval(),
            enabled: config.sweep_enabled,
            stats: Mutex::new(SweepStats::default()),
        }
    }

    pub fn policy(&self) -> &ExpiryPolicy {
        &self.policy
    }

    pub fn store(&self) -> &Arc<ChainStore> {
        &self.store
    }

    pub fn stats(&self) -> SweepStats {
        self.stats.lock().clone()
    }

    /// Remove every node expired at `now`. Returns removed ids ascending.
    pub fn sweep(&self, now: Timestamp) -> Vec<NodeId> {
        let removed = self.store.remove_expired(now, &self.policy);

        {
            let mut stats = self.stats.lock();
            stats.sweeps += 1;
            stats.nodes_removed += removed.len() as u64;
            stats.last_sweep = Some(now);
        }

        if !removed.is_empty() {
            tracing::info!(
                count = removed.len(),
                remaining = self.store.len(),
                "swept expired nodes"
            );
        }
        removed
    }

    /// Start the background sweep task
    ///
    /// Sweeps at the store clock's current time every interval. Returns a
    /// handle to the spawned task; abort it to stop sweeping.
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            if !self.enabled {
                tracing::info!("background sweeper disabled");
                return;
            }

            tracing::info!(
                interval_secs = self.interval.as_secs(),
                "starting background sweeper"
            );

            let clock: Arc<dyn Clock> = self.store.clock();
            let mut ticker = interval(self.interval);

            loop {
                ticker.tick().await;

                let scheduler = Arc::clone(&self);
                let now = clock.now();
                match tokio::task::spawn_blocking(move || scheduler.sweep(now)).await {
                    Ok(removed) => {
                        if !removed.is_empty() {
                            tracing::debug!(?removed, "background sweep removed nodes");
                        }
                    }
                    Err(e) => {
                        tracing::error!("background sweep failed: {}", e);
                    }
                }
            }
        })
    }
}
