//! Derive the displayable graph from the node mapping.
//!
//! The builder is total: it accepts any mapping, including ones with dangling
//! references, cycles, several roots or orphans, and reports those as
//! [`TopologyWarning`]s instead of failing. It runs in linear time over nodes
//! plus references (one petgraph graph, one multi-source BFS, one Tarjan SCC
//! pass) and always terminates.

use std::collections::{HashSet, VecDeque};

use chaosflow_types::event::StoreEvent;
use chaosflow_types::topology::{Topology, TopologyEdge, TopologyWarning, Vertex, VertexState};
use chaosflow_types::workflow::NodeId;
use petgraph::algo::tarjan_scc;
use petgraph::graph::NodeIndex;
use tokio::sync::broadcast::{self, error::TryRecvError};

use super::store::TemplateStore;
use super::tree::{self, NodeMap};

/// Build the topology of a node mapping.
///
/// The vertex set equals the key set of `nodes` exactly, in key order. Edges
/// are emitted per node in reference order (children, then branches).
pub fn build_topology(nodes: &NodeMap) -> Topology {
    let mut warnings = Vec::new();

    // Edges; references to missing nodes become warnings only.
    let mut edges = Vec::new();
    for node in nodes.values() {
        for r in node.template.references() {
            if nodes.contains_key(r.target) {
                edges.push(TopologyEdge {
                    from: node.id.clone(),
                    to: r.target.clone(),
                    label: r.label.map(str::to_string),
                    kind: r.kind,
                });
            } else {
                warnings.push(TopologyWarning::DanglingReference {
                    from: node.id.clone(),
                    to: r.target.clone(),
                });
            }
        }
    }

    let roots = tree::find_roots(nodes);
    match roots.len() {
        0 if !nodes.is_empty() => warnings.push(TopologyWarning::NoRoot),
        0 | 1 => {}
        _ => warnings.push(TopologyWarning::MultipleRoots {
            roots: roots.clone(),
        }),
    }

    let graph = tree::reference_graph(nodes);
    let ids: Vec<&NodeId> = nodes.keys().collect();
    let index_of = |id: &NodeId| ids.binary_search(&id).ok().map(NodeIndex::new);

    // Multi-source BFS from every root.
    let mut depth: Vec<Option<usize>> = vec![None; ids.len()];
    let mut queue = VecDeque::new();
    for root in &roots {
        if let Some(ix) = index_of(root) {
            depth[ix.index()] = Some(0);
            queue.push_back(ix);
        }
    }
    while let Some(ix) = queue.pop_front() {
        let next = depth[ix.index()].map_or(0, |d| d + 1);
        for neighbor in graph.neighbors(ix) {
            if depth[neighbor.index()].is_none() {
                depth[neighbor.index()] = Some(next);
                queue.push_back(neighbor);
            }
        }
    }

    let mut cyclic: HashSet<usize> = HashSet::new();
    for component in tarjan_scc(&graph) {
        let is_cycle = component.len() > 1
            || component
                .first()
                .is_some_and(|&ix| graph.contains_edge(ix, ix));
        if !is_cycle {
            continue;
        }
        let mut members: Vec<NodeId> = component.iter().map(|&ix| graph[ix].clone()).collect();
        members.sort();
        cyclic.extend(component.iter().map(|ix| ix.index()));
        warnings.push(TopologyWarning::Cycle { nodes: members });
    }

    let mut vertices = Vec::with_capacity(nodes.len());
    for (i, node) in nodes.values().enumerate() {
        let state = if cyclic.contains(&i) {
            VertexState::Cyclic
        } else if depth[i].is_none() {
            VertexState::Unreachable
        } else {
            VertexState::Reachable
        };
        if depth[i].is_none() {
            warnings.push(TopologyWarning::Unreachable {
                id: node.id.clone(),
            });
        }
        vertices.push(Vertex {
            id: node.id.clone(),
            label: node.name.clone(),
            template_type: node.template_type(),
            depth: depth[i],
            state,
        });
    }

    let root = match roots.as_slice() {
        [only] => Some(only.clone()),
        _ => None,
    };
    tracing::debug!(
        vertices = vertices.len(),
        edges = edges.len(),
        warnings = warnings.len(),
        "built topology"
    );

    Topology {
        root,
        vertices,
        edges,
        warnings,
    }
}

/// A topology kept in step with a [`TemplateStore`] through its events.
///
/// Each [`refresh`](Self::refresh) drains pending events and rebuilds fully
/// from the most recent snapshot.
#[derive(Debug)]
pub struct LiveTopology {
    receiver: broadcast::Receiver<StoreEvent>,
    revision: u64,
    topology: Topology,
}

impl LiveTopology {
    pub fn new(store: &TemplateStore) -> Self {
        Self {
            receiver: store.subscribe(),
            revision: store.revision(),
            topology: build_topology(store.nodes()),
        }
    }

    /// Apply pending store events. Returns whether the topology was rebuilt.
    pub fn refresh(&mut self) -> bool {
        let mut latest = None;
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if event.revision > self.revision {
                        self.revision = event.revision;
                        latest = Some(event.snapshot);
                    }
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "topology subscriber lagged");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }

        match latest {
            Some(snapshot) => {
                self.topology = build_topology(&snapshot.nodes);
                true
            }
            None => false,
        }
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Store revision the current topology was built from.
    pub fn revision(&self) -> u64 {
        self.revision
    }
}
