// src/lib.rs
//! Append-only, hash-chained node registry with TTL-based expiry.
//!
//! Each appended payload becomes a [`Node`] linked to the current head and
//! carrying `SHA256(payload || parent_hash)` (domain-separated, see
//! [`HashChainer`]). Nodes are never mutated; the [`ExpiryScheduler`] removes
//! them once they outlive their TTL (11h, or 8h for bumped nodes).

pub mod clock;
pub mod config;
pub mod error;
pub mod expiry;
pub mod hasher;
pub mod store;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ChainConfig;
pub use error::{ChainError, Result};
pub use expiry::{ExpiryPolicy, ExpiryScheduler, SweepStats};
pub use hasher::HashChainer;
pub use store::ChainStore;
pub use types::{Hash256, Node, NodeId, Timestamp};

/// Everything needed to append, look up and expire nodes.
pub mod prelude {
    pub use crate::clock::{Clock, ManualClock, SystemClock};
    pub use crate::config::ChainConfig;
    pub use crate::error::{ChainError, Result};
    pub use crate::expiry::{ExpiryPolicy, ExpiryScheduler};
    pub use crate::store::ChainStore;
    pub use crate::types::*;
}
