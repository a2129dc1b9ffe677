//! Wizard-level facade over the node store.
//!
//! The store itself accepts anything; the editor applies the rules a wizard
//! needs on every mutation: shape validation, no cycles, a locked template
//! type once a node has references, and reference cleanup on delete.
//! Whole-tree invariants (single root, no dangling references) are only
//! enforced at [`WorkflowEditor::submit`].

use chaosflow_types::event::StoreEvent;
use chaosflow_types::topology::Topology;
use chaosflow_types::workflow::{Node, NodeId, StoreSnapshot, Template, WorkflowMeta};
use serde_json::Value;
use tokio::sync::broadcast;

use super::codec::{EncodeOptions, Manifest, encode_manifest};
use super::definition::{WorkflowError, decode_document, parse_workflow};
use super::document::encode_nested;
use super::store::TemplateStore;
use super::template::validate_node;
use super::topology::build_topology;
use super::tree::{self, NodeMap};

#[derive(Debug, Default)]
pub struct WorkflowEditor {
    store: TemplateStore,
}

impl WorkflowEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_store(store: TemplateStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &TemplateStore {
        &self.store
    }

    pub fn nodes(&self) -> &NodeMap {
        self.store.nodes()
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.store.snapshot()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.store.subscribe()
    }

    pub fn topology(&self) -> Topology {
        build_topology(self.store.nodes())
    }

    // -----------------------------------------------------------------------
    // Node operations
    // -----------------------------------------------------------------------

    /// Create a node under a fresh id.
    pub fn add_node(
        &mut self,
        name: impl Into<String>,
        deadline: Option<String>,
        template: Template,
    ) -> Result<NodeId, WorkflowError> {
        let mut node = Node::new(name, template);
        node.deadline = deadline;
        validate_node(&node)?;
        self.ensure_acyclic(&node)?;

        let id = node.id.clone();
        self.store.upsert_node(node);
        Ok(id)
    }

    /// Replace an existing node.
    ///
    /// A node that already references other nodes keeps its template type.
    pub fn update_node(&mut self, node: Node) -> Result<(), WorkflowError> {
        let existing = self
            .store
            .get(&node.id)
            .ok_or_else(|| WorkflowError::NodeNotFound(node.id.clone()))?;
        let (from, to) = (existing.template_type(), node.template_type());
        if existing.template.has_references() && from != to {
            return Err(WorkflowError::TypeLocked {
                id: node.id.clone(),
                from,
                to,
            });
        }
        validate_node(&node)?;
        self.ensure_acyclic(&node)?;

        self.store.upsert_node(node);
        Ok(())
    }

    /// Remove a node and every reference to it.
    ///
    /// Parents left without children are kept; they fail validation at
    /// submit until the wizard fills them again.
    pub fn delete_node(&mut self, id: &NodeId) -> Result<Node, WorkflowError> {
        let removed = self
            .store
            .remove_node(id)
            .ok_or_else(|| WorkflowError::NodeNotFound(id.clone()))?;
        for parent in tree::scrub_references(self.store.nodes(), id) {
            tracing::debug!(parent = %parent.id, removed = %id, "scrubbed reference");
            self.store.upsert_node(parent);
        }
        Ok(removed)
    }

    fn ensure_acyclic(&self, node: &Node) -> Result<(), WorkflowError> {
        if tree::would_create_cycle(self.store.nodes(), node) {
            return Err(WorkflowError::CycleDetected(format!(
                "node '{}' would become its own descendant",
                node.id
            )));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Whole-workflow operations
    // -----------------------------------------------------------------------

    /// Decode a document (either form) and replace the store's contents with
    /// it. Nothing is imported when decoding fails.
    pub fn load(&mut self, text: &str) -> Result<NodeId, WorkflowError> {
        let decoded = parse_workflow(text)?;
        self.store.import_nodes(decoded.nodes);
        Ok(decoded.root)
    }

    pub fn load_value(&mut self, value: &Value) -> Result<NodeId, WorkflowError> {
        let decoded = decode_document(value)?;
        self.store.import_nodes(decoded.nodes);
        Ok(decoded.root)
    }

    pub fn reset(&mut self) -> StoreSnapshot {
        self.store.reset()
    }

    /// Encode the store as a backend manifest, enforcing every invariant.
    pub fn submit(
        &self,
        meta: &WorkflowMeta,
        options: &EncodeOptions,
    ) -> Result<Manifest, WorkflowError> {
        let manifest = encode_manifest(self.store.nodes(), meta, options)?;
        tracing::debug!(workflow = %meta.name, revision = self.store.revision(), "submitted workflow");
        Ok(manifest)
    }

    /// Encode the store as a nested authoring document.
    pub fn export_nested(&self) -> Result<Value, WorkflowError> {
        encode_nested(self.store.nodes())
    }
}
