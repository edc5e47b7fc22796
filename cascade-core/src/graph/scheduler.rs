//! Cascade Scheduler
//!
//! The scheduler decides in which order an operation is applied to the
//! nodes of an object graph, so that a cascade executor never writes a child
//! before the parent it depends on (or deletes a parent before its children).
//!
//! # Algorithm
//!
//! 1. Starting from the head, collect every node reachable over links whose
//!    cascade set contains the operation, in breadth-first discovery order
//! 2. Sort them topologically with Kahn's algorithm, counting only links
//!    between collected nodes and ignoring self-links
//! 3. When the queue runs dry with nodes left over, they sit on a cycle
//!    (typically a bidirectional association). Release the earliest
//!    discovered one and carry on
//! 4. Parents come first for persist, merge, refresh and detach. The order
//!    is reversed for remove

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use super::link::NodeLink;
use super::node::NodeId;
use super::object_graph::ObjectGraph;
use crate::metadata::CascadeType;

/// Computes cascade orderings over one graph.
pub struct CascadeScheduler<'g> {
    graph: &'g ObjectGraph,
}

impl<'g> CascadeScheduler<'g> {
    pub fn new(graph: &'g ObjectGraph) -> Self {
        Self { graph }
    }

    /// Nodes `op` reaches from the head, and the links it travels.
    pub fn reachable(&self, op: CascadeType) -> (Vec<NodeId>, Vec<Arc<NodeLink>>) {
        let head = self.graph.head_node().id().clone();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        let mut nodes = Vec::new();
        let mut links = Vec::new();

        visited.insert(head.clone());
        queue.push_back(head);

        while let Some(node_id) = queue.pop_front() {
            for link in self.graph.links_from(&node_id) {
                if !link.cascades_on(op) {
                    continue;
                }
                if visited.insert(link.child().clone()) {
                    queue.push_back(link.child().clone());
                }
                links.push(link);
            }
            nodes.push(node_id);
        }

        (nodes, links)
    }

    /// Order in which to apply `op`.
    pub fn order(&self, op: CascadeType) -> Vec<NodeId> {
        let (nodes, links) = self.reachable(op);
        let mut order = self.topological_sort(&nodes, &links);
        if op == CascadeType::Remove {
            order.reverse();
        }
        order
    }

    /// Parents before children; cycles broken in discovery order.
    fn topological_sort(&self, nodes: &[NodeId], links: &[Arc<NodeLink>]) -> Vec<NodeId> {
        let mut in_degree: HashMap<&NodeId, usize> = nodes.iter().map(|id| (id, 0)).collect();
        let mut dependents: HashMap<&NodeId, Vec<&NodeId>> = HashMap::new();

        for link in links {
            if link.parent() == link.child() {
                continue;
            }
            if let Some(degree) = in_degree.get_mut(link.child()) {
                *degree += 1;
                dependents.entry(link.parent()).or_default().push(link.child());
            }
        }

        let mut result = Vec::with_capacity(nodes.len());
        let mut emitted: HashSet<&NodeId> = HashSet::new();
        let mut queue: VecDeque<&NodeId> = nodes
            .iter()
            .filter(|id| in_degree.get(id).copied() == Some(0))
            .collect();

        loop {
            // Kahn's algorithm
            while let Some(node_id) = queue.pop_front() {
                if !emitted.insert(node_id) {
                    continue;
                }
                result.push(node_id.clone());

                for &dependent in dependents.get(node_id).map(Vec::as_slice).unwrap_or(&[]) {
                    if let Some(degree) = in_degree.get_mut(dependent) {
                        *degree = degree.saturating_sub(1);
                        if *degree == 0 {
                            queue.push_back(dependent);
                        }
                    }
                }
            }

            match nodes.iter().find(|id| !emitted.contains(id)) {
                Some(blocked) => queue.push_back(blocked),
                None => break,
            }
        }

        result
    }
}
