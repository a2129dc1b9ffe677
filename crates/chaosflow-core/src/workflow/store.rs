//! The node store: authoritative mapping of identifiers to nodes for the
//! workflow being authored.
//!
//! Every mutation bumps the revision, takes an immutable [`StoreSnapshot`]
//! and publishes a [`StoreEvent`] on the store's [`EventBus`]. The mapping is
//! shared copy-on-write with outstanding snapshots, so taking a snapshot is
//! O(1) and a snapshot never changes after it was handed out.
//!
//! The store performs no cross-node validation and no cascading: last write
//! wins, and removing a node leaves references to it in place. Use
//! [`super::editor::WorkflowEditor`] for the guarded wizard operations.

use std::collections::BTreeMap;
use std::sync::Arc;

use chaosflow_types::event::{StoreChange, StoreEvent};
use chaosflow_types::workflow::{Node, NodeId, StoreSnapshot};
use chrono::Utc;
use tokio::sync::broadcast;

use super::tree::NodeMap;
use crate::event::EventBus;

/// Mutable node store with snapshot publishing.
///
/// All mutations take `&mut self`, so a single writer is enforced by the
/// borrow checker.
#[derive(Debug, Default)]
pub struct TemplateStore {
    nodes: Arc<NodeMap>,
    revision: u64,
    bus: EventBus,
}

impl TemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store publishing on an existing bus.
    pub fn with_bus(bus: EventBus) -> Self {
        Self {
            nodes: Arc::new(BTreeMap::new()),
            revision: 0,
            bus,
        }
    }

    /// Receive an event for every future mutation.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.bus.subscribe()
    }

    /// The current state as an immutable snapshot.
    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            revision: self.revision,
            nodes: Arc::clone(&self.nodes),
        }
    }

    pub fn nodes(&self) -> &NodeMap {
        &self.nodes
    }

    pub fn get(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Replace the entire mapping. No merge with the previous contents.
    pub fn import_nodes(&mut self, nodes: impl IntoIterator<Item = Node>) -> StoreSnapshot {
        let map: NodeMap = nodes.into_iter().map(|n| (n.id.clone(), n)).collect();
        let count = map.len();
        self.nodes = Arc::new(map);
        tracing::debug!(count, "imported nodes");
        self.publish(StoreChange::Imported { count })
    }

    /// Insert or fully replace the node at `node.id`.
    pub fn upsert_node(&mut self, node: Node) -> StoreSnapshot {
        let id = node.id.clone();
        let replaced = Arc::make_mut(&mut self.nodes).insert(id.clone(), node).is_some();
        tracing::debug!(%id, replaced, "upserted node");
        self.publish(StoreChange::Upserted { id })
    }

    /// Delete the entry for `id`, returning it. References to it elsewhere
    /// are left untouched.
    ///
    /// Removing an absent id changes nothing and publishes nothing.
    pub fn remove_node(&mut self, id: &NodeId) -> Option<Node> {
        if !self.nodes.contains_key(id) {
            return None;
        }
        let removed = Arc::make_mut(&mut self.nodes).remove(id);
        tracing::debug!(%id, "removed node");
        self.publish(StoreChange::Removed { id: id.clone() });
        removed
    }

    /// Empty the mapping.
    pub fn reset(&mut self) -> StoreSnapshot {
        self.nodes = Arc::new(BTreeMap::new());
        tracing::debug!("reset store");
        self.publish(StoreChange::Reset)
    }

    fn publish(&mut self, change: StoreChange) -> StoreSnapshot {
        self.revision += 1;
        let snapshot = self.snapshot();
        let observers = self.bus.publish(StoreEvent {
            revision: self.revision,
            change,
            snapshot: snapshot.clone(),
            at: Utc::now(),
        });
        tracing::trace!(revision = self.revision, observers, "published store event");
        snapshot
    }
}
