// src/store.rs
//! Append-only node registry.
//!
//! Manages the node lifecycle:
//! - Appending payloads linked to the current head
//! - O(1) lookup by id
//! - Parent-pointer traversal back to the root
//! - Removal of expired nodes (driven by the expiry scheduler)
//!
//! A single `RwLock` serializes writers (`append`, `remove_expired`);
//! readers share it. Traversals re-acquire the lock per hop, so a sweep
//! may land between two hops and the walk reports `NotFound`.

use chrono::Duration;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::ChainConfig;
use crate::error::{ChainError, Result};
use crate::expiry::ExpiryPolicy;
use crate::hasher::HashChainer;
use crate::types::{Hash256, Node, NodeId, Timestamp};

#[derive(Debug)]
struct ChainState {
    nodes: HashMap<NodeId, Node>,
    head: Option<NodeId>,
    next_id: NodeId,
    /// Expiry queues per TTL class, ordered by `(created_at, id)`
    plain_queue: BTreeSet<(Timestamp, NodeId)>,
    bumped_queue: BTreeSet<(Timestamp, NodeId)>,
}

impl Default for ChainState {
    fn default() -> Self {
        Self {
            nodes: HashMap::new(),
            head: None,
            next_id: 1,
            plain_queue: BTreeSet::new(),
            bumped_queue: BTreeSet::new(),
        }
    }
}

pub struct ChainStore {
    state: RwLock<ChainState>,
    clock: Arc<dyn Clock>,
    auto_bump_above: Option<usize>,
}

impl ChainStore {
    /// Store stamped by the system clock.
    pub fn new(config: &ChainConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &ChainConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(ChainState::default()),
            clock,
            auto_bump_above: config.auto_bump_above,
        }
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Append a payload linked to the current head.
    pub fn append(&self, payload: impl AsRef<[u8]>) -> Result<NodeId> {
        self.append_node(payload.as_ref(), false)
    }

    /// Append a payload with the shortened TTL.
    pub fn append_bumped(&self, payload: impl AsRef<[u8]>) -> Result<NodeId> {
        self.append_node(payload.as_ref(), true)
    }

    fn append_node(&self, payload: &[u8], bumped: bool) -> Result<NodeId> {
        if payload.is_empty() {
            return Err(ChainError::InvalidPayload("payload must not be empty".into()));
        }

        let mut state = self.state.write();
        let created_at = self.clock.now();

        let auto_bumped = self
            .auto_bump_above
            .map_or(false, |limit| state.nodes.len() >= limit);

        let parent = state
            .head
            .and_then(|head| state.nodes.get(&head))
            .map(|node| (node.id, node.hash));
        let hash = HashChainer::chain(payload, parent.as_ref().map(|(_, h)| h));

        let id = state.next_id;
        state.next_id += 1;

        let node = Node {
            id,
            payload: payload.to_vec(),
            parent_id: parent.map(|(parent_id, _)| parent_id),
            hash,
            created_at,
            bumped: bumped || auto_bumped,
        };

        tracing::debug!(
            id,
            parent = ?node.parent_id,
            hash = %hash.short(),
            bumped = node.bumped,
            "appended node"
        );

        if node.bumped {
            state.bumped_queue.insert((created_at, id));
        } else {
            state.plain_queue.insert((created_at, id));
        }
        state.nodes.insert(id, node);
        state.head = Some(id);
        Ok(id)
    }

    /// Look up a live node.
    pub fn get(&self, id: NodeId) -> Option<Node> {
        self.state.read().nodes.get(&id).cloned()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.state.read().nodes.contains_key(&id)
    }

    /// Current chain tip
    pub fn head(&self) -> Option<NodeId> {
        self.state.read().head
    }

    /// Accumulated hash of the chain, i.e. the head's hash.
    pub fn head_hash(&self) -> Option<Hash256> {
        let state = self.state.read();
        state
            .head
            .and_then(|head| state.nodes.get(&head))
            .map(|node| node.hash)
    }

    pub fn len(&self) -> usize {
        self.state.read().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().nodes.is_empty()
    }

    /// Snapshot of all live nodes, ordered by id.
    pub fn nodes(&self) -> Vec<Node> {
        let state = self.state.read();
        let mut nodes: Vec<Node> = state.nodes.values().cloned().collect();
        nodes.sort_by_key(|node| node.id);
        nodes
    }

    /// Walk parent pointers from `id` to the root.
    ///
    /// Returns `[id, parent, grandparent, ..., root]`. Fails with `NotFound`
    /// carrying the first missing id, including ancestors expired mid-walk.
    pub fn path_to_root(&self, id: NodeId) -> Result<Vec<NodeId>> {
        self.walk_to_root(id, |_| {})
    }

    /// `between_hops` runs after each visited node, with no lock held.
    fn walk_to_root(
        &self,
        id: NodeId,
        mut between_hops: impl FnMut(NodeId),
    ) -> Result<Vec<NodeId>> {
        let mut path = Vec::new();
        let mut current = Some(id);

        while let Some(node_id) = current {
            // Lock per hop: writers may interleave with the walk
            let parent = {
                let state = self.state.read();
                match state.nodes.get(&node_id) {
                    Some(node) => node.parent_id,
                    None => {
                        if node_id != id {
                            tracing::warn!(
                                start = id,
                                missing = node_id,
                                "ancestor missing during traversal"
                            );
                        }
                        return Err(ChainError::NotFound(node_id));
                    }
                }
            };
            path.push(node_id);
            between_hops(node_id);
            current = parent;
        }

        Ok(path)
    }

    /// Recompute a node's hash against its parent's stored hash.
    pub fn verify(&self, id: NodeId) -> Result<bool> {
        let state = self.state.read();
        let node = state.nodes.get(&id).ok_or(ChainError::NotFound(id))?;
        let parent_hash = match node.parent_id {
            Some(parent_id) => Some(
                state
                    .nodes
                    .get(&parent_id)
                    .map(|parent| parent.hash)
                    .ok_or(ChainError::NotFound(parent_id))?,
            ),
            None => None,
        };
        Ok(HashChainer::verify(node, parent_hash.as_ref()))
    }

    /// Remove every node past its TTL at `now`. Returns removed ids ascending.
    ///
    /// Pops from the front of the per-TTL queues, so the cost is bounded by
    /// the number of expired nodes. Never cascades: children of removed
    /// nodes stay in place. If the head is removed, the newest surviving
    /// node becomes the head.
    pub fn remove_expired(&self, now: Timestamp, policy: &ExpiryPolicy) -> Vec<NodeId> {
        let mut guard = self.state.write();
        let state = &mut *guard;

        let mut expired = Vec::new();
        drain_expired(&mut state.plain_queue, now, policy.ttl, &mut expired);
        drain_expired(&mut state.bumped_queue, now, policy.bumped_ttl, &mut expired);
        expired.sort_unstable();

        for id in &expired {
            state.nodes.remove(id);
        }

        if let Some(head) = state.head {
            if !state.nodes.contains_key(&head) {
                let fallback = state.nodes.keys().max().copied();
                tracing::debug!(old = head, new = ?fallback, "head expired");
                state.head = fallback;
            }
        }

        expired
    }
}

fn drain_expired(
    queue: &mut BTreeSet<(Timestamp, NodeId)>,
    now: Timestamp,
    ttl: Duration,
    out: &mut Vec<NodeId>,
) {
    while let Some(&(created_at, id)) = queue.first() {
        if now.signed_duration_since(created_at) <= ttl {
            break;
        }
        queue.pop_first();
        out.push(id);
    }
}

impl Default for ChainStore {
    fn default() -> Self {
        Self::new(&ChainConfig::default())
    }
}
