//! Object Graph
//!
//! Read-only view over one generated graph. The graph stores only its head
//! node and a handle to the cache; every other node is reached through link
//! identities resolved against the cache.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use super::cache::NodeCache;
use super::link::NodeLink;
use super::node::{Node, NodeId};
use super::scheduler::CascadeScheduler;
use crate::entity::EntityType;
use crate::metadata::{CascadeType, Relation};

/// An association skipped during generation, to be expanded on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeferredAssociation {
    pub parent: NodeId,
    pub property: String,
    pub target: EntityType,
}

impl DeferredAssociation {
    pub(crate) fn new(parent: NodeId, relation: &Relation) -> Self {
        Self {
            parent,
            property: relation.property.clone(),
            target: relation.target.clone(),
        }
    }
}

/// Handle to a generated graph.
#[derive(Debug, Clone)]
pub struct ObjectGraph {
    head: Arc<Node>,
    cache: NodeCache,
    deferred: Vec<DeferredAssociation>,
}

impl ObjectGraph {
    pub(crate) fn new(head: Arc<Node>, cache: NodeCache, deferred: Vec<DeferredAssociation>) -> Self {
        Self {
            head,
            cache,
            deferred,
        }
    }

    /// The node generation started from.
    pub fn head_node(&self) -> &Arc<Node> {
        &self.head
    }

    pub fn cache(&self) -> &NodeCache {
        &self.cache
    }

    pub fn node(&self, id: &NodeId) -> Option<Arc<Node>> {
        self.cache.get(id)
    }

    /// Outgoing links of a node.
    pub fn links_from(&self, id: &NodeId) -> Vec<Arc<NodeLink>> {
        self.node(id).map(|node| node.children()).unwrap_or_default()
    }

    /// Incoming links of a node.
    pub fn links_to(&self, id: &NodeId) -> Vec<Arc<NodeLink>> {
        self.node(id).map(|node| node.parents()).unwrap_or_default()
    }

    /// Distinct children of a node, in link order.
    pub fn children_of(&self, id: &NodeId) -> Vec<Arc<Node>> {
        let ids: IndexSet<NodeId> = self
            .links_from(id)
            .iter()
            .map(|link| link.child().clone())
            .collect();
        self.resolve(ids)
    }

    /// Distinct parents of a node, in link order.
    pub fn parents_of(&self, id: &NodeId) -> Vec<Arc<Node>> {
        let ids: IndexSet<NodeId> = self
            .links_to(id)
            .iter()
            .map(|link| link.parent().clone())
            .collect();
        self.resolve(ids)
    }

    fn resolve(&self, ids: IndexSet<NodeId>) -> Vec<Arc<Node>> {
        ids.iter().filter_map(|id| self.cache.get(id)).collect()
    }

    /// Every node reachable from the head, breadth-first.
    pub fn nodes(&self) -> Vec<Arc<Node>> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        let mut nodes = Vec::new();

        visited.insert(self.head.id().clone());
        queue.push_back(Arc::clone(&self.head));

        while let Some(node) = queue.pop_front() {
            for link in node.children() {
                if visited.insert(link.child().clone()) {
                    if let Some(child) = self.cache.get(link.child()) {
                        queue.push_back(child);
                    }
                }
            }
            nodes.push(node);
        }

        nodes
    }

    /// Outgoing links of every reachable node.
    pub fn links(&self) -> Vec<Arc<NodeLink>> {
        self.nodes().iter().flat_map(|node| node.children()).collect()
    }

    pub fn node_count(&self) -> usize {
        self.nodes().len()
    }

    pub fn link_count(&self) -> usize {
        self.nodes().iter().map(|node| node.child_count()).sum()
    }

    /// Associations that were not walked because they were not loaded.
    pub fn deferred(&self) -> &[DeferredAssociation] {
        &self.deferred
    }

    pub(crate) fn resolve_deferred(&mut self, deferred: &DeferredAssociation) {
        self.deferred.retain(|entry| entry != deferred);
    }

    pub(crate) fn extend_deferred(&mut self, more: Vec<DeferredAssociation>) {
        for entry in more {
            if !self.deferred.contains(&entry) {
                self.deferred.push(entry);
            }
        }
    }

    /// Order in which to apply `op` across the graph.
    ///
    /// See [`CascadeScheduler`].
    pub fn cascade_order(&self, op: CascadeType) -> Vec<NodeId> {
        CascadeScheduler::new(self).order(op)
    }

    /// Serializable copy of the graph's structure.
    pub fn snapshot(&self) -> GraphSnapshot {
        let nodes = self.nodes();
        GraphSnapshot {
            head: self.head.id().clone(),
            links: nodes
                .iter()
                .flat_map(|node| node.children())
                .map(|link| NodeLink::clone(&link))
                .collect(),
            nodes: nodes.iter().map(|node| node.id().clone()).collect(),
            deferred: self.deferred.clone(),
        }
    }
}

/// Structure of a graph, detached from live objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub head: NodeId,
    pub nodes: Vec<NodeId>,
    pub links: Vec<NodeLink>,
    #[serde(default)]
    pub deferred: Vec<DeferredAssociation>,
}

impl GraphSnapshot {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// MessagePack with named fields.
    pub fn to_msgpack(&self) -> Result<Vec<u8>, rmp_serde::encode::Error> {
        rmp_serde::to_vec_named(self)
    }

    pub fn from_msgpack(bytes: &[u8]) -> Result<Self, rmp_serde::decode::Error> {
        rmp_serde::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{DynamicEntity, EntityRef};
    use crate::graph::GraphGenerator;
    use crate::idgen::SequenceGenerator;
    use crate::metadata::{EntityMetadata, MetadataRegistry};

    fn registry() -> MetadataRegistry {
        MetadataRegistry::new()
            .with(
                EntityMetadata::new("Album", "id")
                    .relation(Relation::one_to_many("photos", "Photo"))
                    .relation(Relation::many_to_one("owner", "Person")),
            )
            .with(EntityMetadata::new("Photo", "id").relation(Relation::many_to_one("owner", "Person")))
            .with(EntityMetadata::new("Person", "id"))
    }

    fn album() -> EntityRef {
        let owner = DynamicEntity::new("Person").with_key("id", "kuldeep").into_ref();
        let photos = (1..=2)
            .map(|key| {
                DynamicEntity::new("Photo")
                    .with_key("id", key)
                    .with_one("owner", &owner)
                    .into_ref()
            })
            .collect();
        DynamicEntity::new("Album")
            .with_key("id", "album_1")
            .with_many("photos", photos)
            .with_one("owner", &owner)
            .into_ref()
    }

    fn generate() -> ObjectGraph {
        GraphGenerator::new(Arc::new(registry()), Arc::new(SequenceGenerator::new()))
            .generate_graph(&album(), &NodeCache::new())
            .unwrap()
    }

    #[test]
    fn nodes_are_listed_breadth_first_from_head() {
        let graph = generate();
        let ids: Vec<String> = graph.nodes().iter().map(|n| n.id().to_string()).collect();

        assert_eq!(ids, vec!["Album#album_1", "Photo#1", "Photo#2", "Person#kuldeep"]);
        assert_eq!(graph.link_count(), 5);
    }

    #[test]
    fn shared_child_has_every_parent() {
        let graph = generate();
        let owner = NodeId::new("Person", "kuldeep");

        let parents: Vec<String> = graph
            .parents_of(&owner)
            .iter()
            .map(|n| n.id().to_string())
            .collect();
        assert_eq!(parents, vec!["Photo#1", "Photo#2", "Album#album_1"]);
        assert!(graph.children_of(&owner).is_empty());
    }

    #[test]
    fn unknown_node_has_no_neighbours() {
        let graph = generate();
        let ghost = NodeId::new("Ghost", 1);

        assert!(graph.node(&ghost).is_none());
        assert!(graph.links_from(&ghost).is_empty());
        assert!(graph.children_of(&ghost).is_empty());
    }

    #[test]
    fn snapshot_survives_msgpack() {
        let snapshot = generate().snapshot();
        let bytes = snapshot.to_msgpack().unwrap();

        assert_eq!(GraphSnapshot::from_msgpack(&bytes).unwrap(), snapshot);
    }

    #[test]
    fn snapshot_json_names_links() {
        let json = generate().snapshot().to_json().unwrap();

        assert!(json.contains(r#""link_name":"photos""#));
        assert!(json.contains(r#""head":{"entity":"Album","key":"album_1"}"#));
    }
}
