//! Structural queries over the flat node mapping.
//!
//! The tree is an arena: nodes live in one identifier-keyed map and refer to
//! each other by id. These helpers find roots, dangling references and
//! cycles, walk the tree in pre-order without ever looping, scrub references
//! to a deleted node, and compare two trees structurally.

use std::collections::{BTreeMap, HashMap, HashSet};

use chaosflow_types::error::FieldPath;
use chaosflow_types::workflow::{Node, NodeId, Template};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

use super::definition::WorkflowError;

/// The store's mapping of identifiers to nodes.
pub type NodeMap = BTreeMap<NodeId, Node>;

/// Base path used when reporting problems against a stored node.
pub fn node_path(id: &NodeId) -> FieldPath {
    FieldPath::new("nodes").key(id.as_str())
}

// ---------------------------------------------------------------------------
// Roots
// ---------------------------------------------------------------------------

/// Nodes with no incoming reference from any *other* node, in key order.
///
/// References to missing nodes and self-references are ignored.
pub fn find_roots(nodes: &NodeMap) -> Vec<NodeId> {
    let referenced: HashSet<&NodeId> = nodes
        .values()
        .flat_map(|node| {
            node.template
                .references()
                .map(|r| r.target)
                .filter(move |target| *target != &node.id)
        })
        .collect();
    nodes
        .keys()
        .filter(|id| !referenced.contains(id))
        .cloned()
        .collect()
}

/// The single root, or an error when there are zero or several.
pub fn find_root(nodes: &NodeMap) -> Result<NodeId, WorkflowError> {
    let mut roots = find_roots(nodes);
    match roots.len() {
        0 => Err(WorkflowError::NoRoot),
        1 => Ok(roots.remove(0)),
        _ => Err(WorkflowError::MultipleRoots(roots)),
    }
}

// ---------------------------------------------------------------------------
// Dangling references and cycles
// ---------------------------------------------------------------------------

/// Every reference whose target is not in the map, with its field path.
pub fn find_dangling(nodes: &NodeMap) -> Vec<(FieldPath, NodeId)> {
    nodes
        .values()
        .flat_map(|node| {
            let base = node_path(&node.id);
            node.template
                .references()
                .filter(|r| !nodes.contains_key(r.target))
                .map(move |r| (r.path(&base), r.target.clone()))
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Build a graph over existing references (dangling ones are skipped).
///
/// Vertex `i` corresponds to the `i`-th key of the map.
pub(crate) fn reference_graph(nodes: &NodeMap) -> DiGraph<&NodeId, ()> {
    let mut graph = DiGraph::with_capacity(nodes.len(), nodes.len());
    let index: HashMap<&NodeId, NodeIndex> =
        nodes.keys().map(|id| (id, graph.add_node(id))).collect();
    for (i, node) in nodes.values().enumerate() {
        for r in node.template.references() {
            if let Some(&to) = index.get(r.target) {
                graph.add_edge(NodeIndex::new(i), to, ());
            }
        }
    }
    graph
}

/// A node that takes part in a cycle, if any cycle exists.
pub fn find_cycle(nodes: &NodeMap) -> Option<NodeId> {
    let self_loop = nodes
        .values()
        .find(|node| node.template.references().any(|r| r.target == &node.id));
    if let Some(node) = self_loop {
        return Some(node.id.clone());
    }
    let graph = reference_graph(nodes);
    toposort(&graph, None)
        .err()
        .map(|cycle| graph[cycle.node_id()].clone())
}

/// Whether replacing (or inserting) `candidate` would make some node its own
/// descendant.
///
/// Walks from the candidate's references looking for the candidate itself.
/// The stored version of the candidate is never consulted: reaching its id
/// already means a cycle.
pub fn would_create_cycle(nodes: &NodeMap, candidate: &Node) -> bool {
    let mut visited: HashSet<&NodeId> = HashSet::new();
    let mut stack: Vec<&NodeId> = candidate.template.references().map(|r| r.target).collect();
    while let Some(id) = stack.pop() {
        if id == &candidate.id {
            return true;
        }
        if !visited.insert(id) {
            continue;
        }
        if let Some(node) = nodes.get(id) {
            stack.extend(node.template.references().map(|r| r.target));
        }
    }
    false
}

/// Strict structural check used before encoding.
///
/// Fails on the first dangling reference, then on any cycle, then unless
/// there is exactly one root. Returns the root.
pub fn check_invariants(nodes: &NodeMap) -> Result<NodeId, WorkflowError> {
    if let Some((path, target)) = find_dangling(nodes).into_iter().next() {
        return Err(WorkflowError::DanglingReference { path, target });
    }
    if let Some(id) = find_cycle(nodes) {
        return Err(WorkflowError::CycleDetected(format!(
            "node '{id}' is its own descendant"
        )));
    }
    find_root(nodes)
}

// ---------------------------------------------------------------------------
// Walks
// ---------------------------------------------------------------------------

/// Pre-order walk from `root`: each node once, children before branch
/// targets, in array order. Missing targets are skipped; cycles terminate.
pub fn preorder(nodes: &NodeMap, root: &NodeId) -> Vec<NodeId> {
    let mut order = Vec::new();
    let mut visited: HashSet<&NodeId> = HashSet::new();
    let mut stack: Vec<&NodeId> = vec![root];

    while let Some(id) = stack.pop() {
        let Some(node) = nodes.get(id) else {
            continue;
        };
        if !visited.insert(id) {
            continue;
        }
        order.push(id.clone());
        let refs: Vec<&NodeId> = node.template.references().map(|r| r.target).collect();
        stack.extend(refs.into_iter().rev());
    }
    order
}

/// Copies of every node that referenced `removed`, with those references
/// dropped. Callers upsert the returned nodes.
pub fn scrub_references(nodes: &NodeMap, removed: &NodeId) -> Vec<Node> {
    nodes
        .values()
        .filter(|node| node.template.references().any(|r| r.target == removed))
        .map(|node| {
            let mut node = node.clone();
            node.template.remove_references_to(removed);
            node
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Structural equality
// ---------------------------------------------------------------------------

/// Whether two trees are equal up to a renaming of node identifiers.
///
/// Same node set (one-to-one), same names, deadlines and payloads, same
/// order of children and branches.
pub fn structurally_equal(a: &NodeMap, a_root: &NodeId, b: &NodeMap, b_root: &NodeId) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut forward: HashMap<&NodeId, &NodeId> = HashMap::new();
    let mut backward: HashMap<&NodeId, &NodeId> = HashMap::new();
    let mut stack: Vec<(&NodeId, &NodeId)> = vec![(a_root, b_root)];

    while let Some((a_id, b_id)) = stack.pop() {
        match (forward.get(a_id), backward.get(b_id)) {
            (Some(mapped), _) if *mapped != b_id => return false,
            (_, Some(mapped)) if *mapped != a_id => return false,
            (Some(_), Some(_)) => continue,
            _ => {}
        }
        forward.insert(a_id, b_id);
        backward.insert(b_id, a_id);

        let (Some(a_node), Some(b_node)) = (a.get(a_id), b.get(b_id)) else {
            return false;
        };
        if !shallow_equal(a_node, b_node) {
            return false;
        }
        let a_refs = a_node.template.references().map(|r| r.target);
        let b_refs = b_node.template.references().map(|r| r.target);
        stack.extend(a_refs.zip(b_refs));
    }

    forward.len() == a.len()
}

/// Compare everything except the identifiers references point at.
fn shallow_equal(a: &Node, b: &Node) -> bool {
    if a.name != b.name || a.deadline != b.deadline {
        return false;
    }
    match (&a.template, &b.template) {
        (Template::Single { experiment: x }, Template::Single { experiment: y }) => x == y,
        (Template::Serial { children: x }, Template::Serial { children: y })
        | (Template::Parallel { children: x }, Template::Parallel { children: y }) => {
            x.len() == y.len()
        }
        (Template::Suspend, Template::Suspend) => true,
        (Template::Custom(x), Template::Custom(y)) => {
            x.container == y.container
                && x.conditional_branches.len() == y.conditional_branches.len()
                && x.conditional_branches
                    .iter()
                    .zip(&y.conditional_branches)
                    .all(|(p, q)| p.expression == q.expression)
        }
        _ => false,
    }
}
