// src/types.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::ChainError;

/// Identifier of a node in the chain. Assigned from 1 upwards, never reused.
pub type NodeId = u64;

/// Wall-clock time a node was created at.
pub type Timestamp = DateTime<Utc>;

/// A 32-byte SHA-256 digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First 8 hex characters, for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// `#rrggbb` color derived from the digest.
    pub fn fingerprint(&self) -> String {
        let folded = self
            .0
            .chunks(3)
            .fold([0u8; 3], |mut acc, chunk| {
                for (slot, byte) in acc.iter_mut().zip(chunk) {
                    *slot ^= byte;
                }
                acc
            });
        format!("#{}", hex::encode(folded))
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Hash256(bytes)
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({})", self.short())
    }
}

impl FromStr for Hash256 {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| ChainError::InvalidHash(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| ChainError::InvalidHash(format!("expected 32 bytes, got {}", v.len())))?;
        Ok(Hash256(arr))
    }
}

impl Serialize for Hash256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash256 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A single entry in the append-only chain.
///
/// Nodes are immutable once appended; the store hands out clones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(with = "hex")]
    pub payload: Vec<u8>,
    /// Parent at append time. May point at a node that has since expired.
    pub parent_id: Option<NodeId>,
    pub hash: Hash256,
    pub created_at: Timestamp,
    /// Shortened TTL applies.
    #[serde(default)]
    pub bumped: bool,
}

impl Node {
    pub fn is_genesis(&self) -> bool {
        self.parent_id.is_none()
    }
}
