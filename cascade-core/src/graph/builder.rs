//! Graph Builder
//!
//! Node factory plus the fluent step that turns one associated object into
//! a child node linked under its parent.

use std::sync::Arc;

use tracing::debug;

use super::cache::NodeCache;
use super::generator::Pass;
use super::node::{Node, NodeId};
use crate::entity::{EntityRef, Key, PropertyAccessor};
use crate::error::Result;
use crate::metadata::{EntityMetadata, Relation};

/// Creates nodes and relation steps.
#[derive(Debug, Default, Clone, Copy)]
pub struct GraphBuilder;

impl GraphBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Get the cached node for `(metadata.entity, key)`, or create and
    /// register one wrapping `entity`.
    ///
    /// The caller holds a claim on the node for the rest of the unit of
    /// work, so a failed generation pass never evicts it.
    pub fn build_node(
        &self,
        entity: &EntityRef,
        metadata: &EntityMetadata,
        cache: &NodeCache,
        key: Key,
    ) -> Arc<Node> {
        self.build_node_tracked(entity, metadata, cache, key).0
    }

    /// Like [`build_node`](Self::build_node), also reporting whether the
    /// node was created by this call.
    pub(crate) fn build_node_tracked(
        &self,
        entity: &EntityRef,
        metadata: &EntityMetadata,
        cache: &NodeCache,
        key: Key,
    ) -> (Arc<Node>, bool) {
        let id = NodeId::new(metadata.entity.clone(), key);
        let (node, created) = cache.claim_or_insert_with(id.clone(), || {
            Node::new(id, metadata.store.clone(), Arc::clone(entity))
        });
        if created {
            debug!(node = %node.id(), store = node.store(), "created node");
        }
        (node, created)
    }

    /// Start the step that links `child` under `parent` through `relation`.
    pub(crate) fn relation_builder<'a>(
        &self,
        child: EntityRef,
        relation: &'a Relation,
        parent: &'a Arc<Node>,
    ) -> RelationBuilder<'a> {
        RelationBuilder {
            child,
            relation,
            parent,
            child_metadata: None,
        }
    }
}

/// One pending parent-to-child association.
pub(crate) struct RelationBuilder<'a> {
    child: EntityRef,
    relation: &'a Relation,
    parent: &'a Arc<Node>,
    child_metadata: Option<Arc<EntityMetadata>>,
}

impl<'a> RelationBuilder<'a> {
    /// Supply the metadata of the relation's target type.
    pub(crate) fn assign_resources(mut self, child_metadata: Arc<EntityMetadata>) -> Self {
        self.child_metadata = Some(child_metadata);
        self
    }

    /// Apply shared-key propagation, walk the child and link it.
    pub(crate) fn build(self, pass: &mut Pass<'_>) -> Result<Arc<Node>> {
        let child_metadata = match self.child_metadata {
            Some(metadata) => metadata,
            None => pass.target_metadata(self.relation)?,
        };

        let shared_key = if self.relation.joined_by_primary_key {
            let key = self.parent.key().clone();
            debug!(
                parent = %self.parent.id(),
                property = %self.relation.property,
                key = %key,
                "sharing primary key with child"
            );
            PropertyAccessor::set_key(&self.child, &child_metadata, key.clone());
            Some(key)
        } else {
            None
        };

        pass.on_build_child_node(&self.child, self.parent, self.relation, shared_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::DynamicEntity;

    #[test]
    fn build_node_reuses_cached_identity() {
        let builder = GraphBuilder::new();
        let cache = NodeCache::new();
        let metadata = EntityMetadata::new("Album", "album_id").store("mongo");

        let first = DynamicEntity::new("Album").with_key("album_id", "a1").into_ref();
        let second = DynamicEntity::new("Album").with_key("album_id", "a1").into_ref();

        let node = builder.build_node(&first, &metadata, &cache, Key::from("a1"));
        let again = builder.build_node(&second, &metadata, &cache, Key::from("a1"));

        assert!(Arc::ptr_eq(&node, &again));
        assert!(Arc::ptr_eq(node.object(), &first));
        assert_eq!(node.store(), "mongo");
        assert_eq!(node.claims(), 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn tracked_build_reports_creation() {
        let builder = GraphBuilder::new();
        let cache = NodeCache::new();
        let metadata = EntityMetadata::new("Album", "album_id");
        let album = DynamicEntity::new("Album").with_key("album_id", 1).into_ref();

        let (_, created) = builder.build_node_tracked(&album, &metadata, &cache, Key::Int(1));
        assert!(created);
        let (_, created) = builder.build_node_tracked(&album, &metadata, &cache, Key::Int(1));
        assert!(!created);
    }
}
