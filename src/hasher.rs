// src/hasher.rs
//! Domain-separated SHA-256 accumulator for chain nodes.
//!
//! Genesis nodes hash as `SHA256(0x00 || payload)`, linked nodes as
//! `SHA256(0x01 || payload || parent_hash)`. The prefix byte keeps a
//! genesis digest from ever colliding with a linked one.

use sha2::{Digest, Sha256};

use crate::types::{Hash256, Node};

/// Prefix for nodes without a parent.
pub const GENESIS_PREFIX: u8 = 0x00;

/// Prefix for nodes linked to a parent hash.
pub const LINKED_PREFIX: u8 = 0x01;

/// Stateless hasher. All methods are pure.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashChainer;

impl HashChainer {
    /// Hash a payload, chaining it onto `parent` when present.
    pub fn chain(payload: &[u8], parent: Option<&Hash256>) -> Hash256 {
        let mut hasher = Sha256::new();
        match parent {
            None => {
                hasher.update([GENESIS_PREFIX]);
                hasher.update(payload);
            }
            Some(parent_hash) => {
                hasher.update([LINKED_PREFIX]);
                hasher.update(payload);
                hasher.update(parent_hash.as_bytes());
            }
        }
        Hash256(hasher.finalize().into())
    }

    /// Recompute a node's hash and compare with the stored one.
    pub fn verify(node: &Node, parent: Option<&Hash256>) -> bool {
        Self::chain(&node.payload, parent) == node.hash
    }
}
