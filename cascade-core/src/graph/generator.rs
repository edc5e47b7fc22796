//! Graph Generator
//!
//! Walks a root object and its declared associations and produces an
//! [`ObjectGraph`] whose nodes live in a unit-of-work [`NodeCache`].
//!
//! # Algorithm
//!
//! For the root, and recursively for every associated object:
//!
//! 1. Pre-checks: the object must be mapped; a missing key is generated once
//!    if the type allows it; the key must be present afterwards.
//! 2. Get or create the node for `(type, key)` in the cache.
//! 3. Stop if this pass already expanded the node. This is the cycle guard
//!    that makes self-referencing and bidirectional associations terminate.
//! 4. For each declared relation, read the live value. Null values are
//!    skipped, unloaded values are recorded as deferred and never forced.
//! 5. If the relation shares the parent's key, write it onto the child
//!    before the child's node is resolved.
//! 6. Recurse into the child, then link parent and child with one shared
//!    [`NodeLink`] record.
//!
//! A pass is all-or-nothing. It journals the nodes and links it claimed and
//! releases those claims if any step fails. A node or link is removed only
//! once no pass holds it any more, so a failure never takes anything away
//! from a concurrent pass working in the same cache.
//!
//! A key is checked, generated and written back under one upgradable lock on
//! the object, so concurrent passes reaching the same unkeyed object agree on
//! one key.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLockUpgradableReadGuard;
use tracing::{debug, trace, warn};

use super::builder::GraphBuilder;
use super::cache::NodeCache;
use super::link::{LinkProperties, NodeLink};
use super::node::{Node, NodeId};
use super::object_graph::{DeferredAssociation, ObjectGraph};
use crate::config::GeneratorConfig;
use crate::entity::{Entity, EntityRef, Key, Lazy, PropertyAccessor, Value};
use crate::error::{GraphError, Result};
use crate::idgen::IdGenerator;
use crate::metadata::{EntityMetadata, MetadataProvider, Relation};
use crate::validation::{PrimaryKeyRule, ValidEntityRule};

/// Builds object graphs from live objects.
///
/// A generator holds no per-call state and can be shared between threads;
/// each call gets its own private visited set.
pub struct GraphGenerator {
    metadata: Arc<dyn MetadataProvider>,
    ids: Arc<dyn IdGenerator>,
    builder: GraphBuilder,
    config: GeneratorConfig,
}

impl GraphGenerator {
    pub fn new(metadata: Arc<dyn MetadataProvider>, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            metadata,
            ids,
            builder: GraphBuilder::new(),
            config: GeneratorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: GeneratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn builder(&self) -> &GraphBuilder {
        &self.builder
    }

    /// Generate the graph rooted at `root`.
    ///
    /// On error nothing this call registered remains in `cache`.
    pub fn generate_graph(&self, root: &EntityRef, cache: &NodeCache) -> Result<ObjectGraph> {
        let mut pass = Pass::new(self, cache);
        match pass.generate(root, None) {
            Ok(head) => {
                head.mark_head();
                debug!(
                    head = %head.id(),
                    claimed = pass.journal.claimed.len(),
                    links = pass.journal.linked.len(),
                    deferred = pass.deferred.len(),
                    "generated object graph"
                );
                Ok(ObjectGraph::new(head, cache.clone(), pass.deferred))
            }
            Err(err) => {
                pass.rollback(&err);
                Err(err)
            }
        }
    }

    /// Walk an association that was skipped while the graph was generated.
    ///
    /// The parent's property is read again; if it is loaded now, its
    /// sub-graph is generated and linked under the parent and the entry is
    /// removed from the graph's deferred list. Returns `false`, changing
    /// nothing, if the association is still unloaded.
    pub fn expand_deferred(
        &self,
        graph: &mut ObjectGraph,
        deferred: &DeferredAssociation,
    ) -> Result<bool> {
        let cache = graph.cache().clone();
        let parent = cache.get(&deferred.parent).ok_or_else(|| {
            GraphError::invalid_entity(
                deferred.parent.entity().as_str(),
                format!("node {} is not in the cache", deferred.parent),
            )
        })?;
        let metadata = ValidEntityRule::new(self.metadata.as_ref()).resolve(parent.object())?;
        let relation = metadata.find_relation(&deferred.property).ok_or_else(|| {
            GraphError::unsupported_relation(
                metadata.entity.as_str(),
                &deferred.property,
                "relation is not declared",
            )
        })?;

        let mut pass = Pass::new(self, &cache);
        pass.visited.insert(parent.id().clone());

        let value = PropertyAccessor::association(parent.object(), relation);
        match pass.walk_relation(&parent, &metadata, relation, value, true) {
            Ok(false) => {
                trace!(parent = %parent.id(), property = %relation.property, "association still unloaded");
                Ok(false)
            }
            Ok(true) => {
                debug!(
                    parent = %parent.id(),
                    property = %relation.property,
                    links = pass.journal.linked.len(),
                    "expanded deferred association"
                );
                graph.resolve_deferred(deferred);
                graph.extend_deferred(pass.deferred);
                Ok(true)
            }
            Err(err) => {
                pass.rollback(&err);
                Err(err)
            }
        }
    }
}

/// Nodes and links claimed by one pass, for rollback.
#[derive(Default)]
struct Journal {
    claimed: Vec<NodeId>,
    linked: Vec<Arc<NodeLink>>,
}

/// State of one generation call.
pub(crate) struct Pass<'g> {
    generator: &'g GraphGenerator,
    cache: &'g NodeCache,
    visited: HashSet<NodeId>,
    journal: Journal,
    deferred: Vec<DeferredAssociation>,
    /// Association hops from the root to the object being generated.
    depth: usize,
}

impl<'g> Pass<'g> {
    fn new(generator: &'g GraphGenerator, cache: &'g NodeCache) -> Self {
        Self {
            generator,
            cache,
            visited: HashSet::new(),
            journal: Journal::default(),
            deferred: Vec::new(),
            depth: 0,
        }
    }

    /// `shared_key` is the parent's key when the object shares it; it has
    /// already been written onto the object and is never regenerated.
    fn generate(&mut self, entity: &EntityRef, shared_key: Option<Key>) -> Result<Arc<Node>> {
        let metadata = ValidEntityRule::new(self.generator.metadata.as_ref()).resolve(entity)?;
        let key = self.on_pre_checks(entity, &metadata, shared_key)?;

        let id = NodeId::new(metadata.entity.clone(), key);
        if self.visited.contains(&id) {
            trace!(node = %id, "already expanded in this pass");
            return self.cache.get(&id).ok_or_else(|| {
                GraphError::invalid_entity(id.entity().as_str(), format!("node {} left the cache", id))
            });
        }

        let (node, _) = self
            .generator
            .builder
            .build_node_tracked(entity, &metadata, self.cache, id.key().clone());
        self.journal.claimed.push(id.clone());
        self.visited.insert(id);

        let limit = self.generator.config.max_depth;
        if self.depth > limit {
            return Err(GraphError::DepthExceeded { limit });
        }

        self.expand(&node, entity, &metadata)?;
        node.mark_graph_completed();
        Ok(node)
    }

    /// Validate the object's key, generating it if allowed and missing.
    fn on_pre_checks(
        &self,
        entity: &EntityRef,
        metadata: &EntityMetadata,
        shared_key: Option<Key>,
    ) -> Result<Key> {
        let rule = PrimaryKeyRule::new(metadata.entity.as_str());
        if let Some(key) = shared_key {
            return rule.require(Some(key));
        }
        if !metadata.generation.allows_generation() {
            return rule.require(PropertyAccessor::key_of(entity, metadata)?);
        }

        let guard = entity.upgradable_read();
        let key = PropertyAccessor::read_key(&*guard, metadata)?;
        if !key.as_ref().map_or(true, Key::is_unassigned) {
            return rule.require(key);
        }

        let generated = self.generator.ids.generate(entity, metadata, &metadata.store)?;
        debug!(entity = %metadata.entity, key = %generated, "generated primary key");
        RwLockUpgradableReadGuard::upgrade(guard)
            .set(&metadata.id_attribute, Value::Key(generated.clone()));
        Ok(generated)
    }

    fn expand(&mut self, node: &Arc<Node>, entity: &EntityRef, metadata: &EntityMetadata) -> Result<()> {
        for relation in &metadata.relations {
            let value = PropertyAccessor::association(entity, relation);
            if !self.walk_relation(node, metadata, relation, value, false)? {
                self.defer(node, relation);
            }
        }
        Ok(())
    }

    /// Walk one relation's value. Returns `false` if it was left for later.
    ///
    /// `explicit` walks collections even when the configuration does not
    /// follow them.
    fn walk_relation(
        &mut self,
        parent: &Arc<Node>,
        metadata: &EntityMetadata,
        relation: &Relation,
        value: Option<Value>,
        explicit: bool,
    ) -> Result<bool> {
        relation.validate(&metadata.entity)?;

        let Some(value) = value else {
            trace!(parent = %parent.id(), property = %relation.property, "null association");
            return Ok(true);
        };

        match value {
            Value::Key(_) => Err(GraphError::unsupported_relation(
                metadata.entity.as_str(),
                &relation.property,
                "property holds a key, not an association",
            )),
            Value::One(Lazy::Unloaded(_)) | Value::Many(Lazy::Unloaded(_)) => {
                trace!(parent = %parent.id(), property = %relation.property, "unloaded association");
                Ok(false)
            }
            Value::One(Lazy::Loaded(child)) => {
                if relation.multiplicity.is_to_many() {
                    return Err(GraphError::unsupported_relation(
                        metadata.entity.as_str(),
                        &relation.property,
                        "to-many relation holds a single object",
                    ));
                }
                self.link_child(parent, relation, child)?;
                Ok(true)
            }
            Value::Many(Lazy::Loaded(children)) => {
                if !relation.multiplicity.is_to_many() {
                    return Err(GraphError::unsupported_relation(
                        metadata.entity.as_str(),
                        &relation.property,
                        "to-one relation holds a collection",
                    ));
                }
                if !explicit && !self.generator.config.follow_collections {
                    trace!(parent = %parent.id(), property = %relation.property, "collection left deferred");
                    return Ok(false);
                }
                for child in children {
                    self.link_child(parent, relation, child)?;
                }
                Ok(true)
            }
        }
    }

    fn link_child(&mut self, parent: &Arc<Node>, relation: &Relation, child: EntityRef) -> Result<()> {
        let child_metadata = self.target_metadata(relation)?;
        let builder = self.generator.builder;
        builder
            .relation_builder(child, relation, parent)
            .assign_resources(child_metadata)
            .build(self)?;
        Ok(())
    }

    pub(crate) fn target_metadata(&self, relation: &Relation) -> Result<Arc<EntityMetadata>> {
        let target = PropertyAccessor::generic_target_type(relation);
        self.generator
            .metadata
            .entity_metadata(target.as_str())
            .ok_or_else(|| GraphError::invalid_entity(target.as_str(), "association target has no metadata"))
    }

    /// Generate the child's sub-graph and link it under `parent`.
    pub(crate) fn on_build_child_node(
        &mut self,
        child: &EntityRef,
        parent: &Arc<Node>,
        relation: &Relation,
        shared_key: Option<Key>,
    ) -> Result<Arc<Node>> {
        self.depth += 1;
        let generated = self.generate(child, shared_key);
        self.depth -= 1;

        let child_node = generated?;
        self.assign_link(parent, relation, &child_node);
        Ok(child_node)
    }

    fn assign_link(&mut self, parent: &Arc<Node>, relation: &Relation, child: &Arc<Node>) {
        let link = NodeLink::new(
            parent.id().clone(),
            child.id().clone(),
            relation.multiplicity,
            LinkProperties::from_relation(relation, parent.store()),
        );

        let (link, inserted) = parent.attach_child(Arc::new(link));
        if inserted {
            child.attach_parent(Arc::clone(&link));
            debug!(
                parent = %link.parent(),
                child = %link.child(),
                link = link.link_name(),
                "linked nodes"
            );
        } else {
            trace!(parent = %parent.id(), child = %child.id(), property = %relation.property, "link already present");
        }
        self.journal.linked.push(link);
    }

    fn defer(&mut self, parent: &Arc<Node>, relation: &Relation) {
        let deferred = DeferredAssociation::new(parent.id().clone(), relation);
        if !self.deferred.contains(&deferred) {
            self.deferred.push(deferred);
        }
    }

    /// Release everything this pass claimed, removing what nobody else holds.
    fn rollback(self, err: &GraphError) {
        warn!(
            error = %err,
            nodes = self.journal.claimed.len(),
            links = self.journal.linked.len(),
            "graph generation aborted, rolling back"
        );

        for link in self.journal.linked.iter().rev() {
            let Some(parent) = self.cache.get(link.parent()) else {
                continue;
            };
            if parent.release_child(link) {
                if let Some(child) = self.cache.get(link.child()) {
                    child.detach_parent(link);
                }
            }
        }
        for id in self.journal.claimed.iter().rev() {
            if let Some(node) = self.cache.get(id) {
                node.release();
            }
            if self.cache.evict_unclaimed(id) {
                trace!(node = %id, "evicted node");
            }
        }
    }
}
