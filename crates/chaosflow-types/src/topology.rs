//! Topology graph shapes handed to the graph-drawing collaborator.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::workflow::{NodeId, ReferenceKind, TemplateType};

/// Where a vertex sits relative to the rest of the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VertexState {
    /// Reachable from a root and not part of a cycle.
    Reachable,
    /// No path from any root leads here.
    Unreachable,
    /// Part of a reference cycle (including a self-reference).
    Cyclic,
}

/// One vertex per node in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vertex {
    pub id: NodeId,
    pub label: String,
    #[serde(rename = "type")]
    pub template_type: TemplateType,
    /// Breadth-first distance from the nearest root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<usize>,
    pub state: VertexState,
}

/// A directed edge between two existing vertices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyEdge {
    pub from: NodeId,
    pub to: NodeId,
    /// Branch expression for edges out of a `Custom` node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub kind: ReferenceKind,
}

/// Non-fatal problems found while deriving the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TopologyWarning {
    /// Every node is referenced by another node.
    NoRoot,

    /// More than one node has no incoming reference.
    MultipleRoots { roots: Vec<NodeId> },

    /// A reference points at an identifier that is not in the store.
    DanglingReference { from: NodeId, to: NodeId },

    /// A strongly connected group of nodes (or a self-reference).
    Cycle { nodes: Vec<NodeId> },

    /// The node cannot be reached from any root.
    Unreachable { id: NodeId },
}

impl fmt::Display for TopologyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TopologyWarning::NoRoot => write!(f, "workflow has no root node"),
            TopologyWarning::MultipleRoots { roots } => {
                let ids: Vec<&str> = roots.iter().map(|r| r.as_str()).collect();
                write!(f, "workflow has multiple root nodes: {}", ids.join(", "))
            }
            TopologyWarning::DanglingReference { from, to } => {
                write!(f, "node '{from}' references missing node '{to}'")
            }
            TopologyWarning::Cycle { nodes } => {
                let ids: Vec<&str> = nodes.iter().map(|n| n.as_str()).collect();
                write!(f, "cycle detected involving: {}", ids.join(", "))
            }
            TopologyWarning::Unreachable { id } => {
                write!(f, "node '{id}' is not reachable from the root")
            }
        }
    }
}

/// The derived graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    /// The single root, when there is exactly one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<NodeId>,
    pub vertices: Vec<Vertex>,
    pub edges: Vec<TopologyEdge>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<TopologyWarning>,
}

impl Topology {
    pub fn vertex(&self, id: &NodeId) -> Option<&Vertex> {
        self.vertices.iter().find(|v| &v.id == id)
    }

    /// Edges touching `id` on either end.
    pub fn edges_touching<'a>(&'a self, id: &'a NodeId) -> impl Iterator<Item = &'a TopologyEdge> {
        self.edges.iter().filter(move |e| &e.from == id || &e.to == id)
    }

    pub fn has_cycles(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| matches!(w, TopologyWarning::Cycle { .. }))
    }
}
