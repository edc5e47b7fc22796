//! Graph Nodes
//!
//! This module defines the node type that lives in the object graph: one
//! persistable unit, addressed by its `(type, primary key)` identity.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::link::NodeLink;
use crate::entity::{EntityRef, EntityType, Key};

/// Identity of a node: its type and primary key.
///
/// Unique within one unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId {
    entity: EntityType,
    key: Key,
}

impl NodeId {
    pub fn new(entity: impl Into<EntityType>, key: impl Into<Key>) -> Self {
        Self {
            entity: entity.into(),
            key: key.into(),
        }
    }

    pub fn entity(&self) -> &EntityType {
        &self.entity
    }

    pub fn key(&self) -> &Key {
        &self.key
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.entity, self.key)
    }
}

type Adjacency = SmallVec<[Arc<NodeLink>; 4]>;

/// An outgoing link and the number of passes that reached it.
struct ChildLink {
    link: Arc<NodeLink>,
    claims: usize,
}

/// Mutable part of a node, guarded by the node's lock.
#[derive(Default)]
struct NodeState {
    /// Links where this node is the parent.
    children: SmallVec<[ChildLink; 4]>,

    /// Links where this node is the child.
    parents: Adjacency,

    /// All relations of this node have been visited.
    graph_completed: bool,

    /// Head of at least one generated graph.
    head: bool,

    /// Set by a cascade executor once it has handled this node.
    processed: bool,
}

/// A node in the object graph.
///
/// Nodes are owned by the [`NodeCache`](super::NodeCache). Links refer to
/// other nodes by [`NodeId`], never by pointer, so cycles between objects
/// never become cycles between nodes.
pub struct Node {
    /// Unique identity of this node.
    id: NodeId,

    /// Store the node's type is persisted in.
    store: String,

    /// The live object this node wraps.
    object: EntityRef,

    /// Generation passes holding this node. A failed pass may only evict
    /// the node once nobody else holds it.
    claims: AtomicUsize,

    state: RwLock<NodeState>,
}

impl Node {
    pub fn new(id: NodeId, store: impl Into<String>, object: EntityRef) -> Self {
        Self {
            id,
            store: store.into(),
            object,
            claims: AtomicUsize::new(0),
            state: RwLock::new(NodeState::default()),
        }
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn data_type(&self) -> &EntityType {
        self.id.entity()
    }

    pub fn key(&self) -> &Key {
        self.id.key()
    }

    pub fn store(&self) -> &str {
        &self.store
    }

    pub fn object(&self) -> &EntityRef {
        &self.object
    }

    pub fn is_graph_completed(&self) -> bool {
        self.state.read().graph_completed
    }

    pub(crate) fn mark_graph_completed(&self) {
        self.state.write().graph_completed = true;
    }

    pub fn is_head(&self) -> bool {
        self.state.read().head
    }

    pub(crate) fn mark_head(&self) {
        self.state.write().head = true;
    }

    pub fn is_processed(&self) -> bool {
        self.state.read().processed
    }

    /// Record that a cascade executor has handled this node.
    pub fn mark_processed(&self) {
        self.state.write().processed = true;
    }

    /// Links where this node is the parent, in attach order.
    pub fn children(&self) -> Vec<Arc<NodeLink>> {
        self.state
            .read()
            .children
            .iter()
            .map(|child| Arc::clone(&child.link))
            .collect()
    }

    /// Links where this node is the child, in attach order.
    pub fn parents(&self) -> Vec<Arc<NodeLink>> {
        self.state.read().parents.to_vec()
    }

    pub fn child_count(&self) -> usize {
        self.state.read().children.len()
    }

    pub fn parent_count(&self) -> usize {
        self.state.read().parents.len()
    }

    pub(crate) fn claims(&self) -> usize {
        self.claims.load(Ordering::SeqCst)
    }

    pub(crate) fn claim(&self) {
        self.claims.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn release(&self) {
        let _ = self
            .claims
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |claims| claims.checked_sub(1));
    }

    /// Claim an outgoing link, attaching it unless an equivalent one exists.
    ///
    /// Returns the link now held by this node and whether it was inserted.
    pub(crate) fn attach_child(&self, link: Arc<NodeLink>) -> (Arc<NodeLink>, bool) {
        let mut state = self.state.write();
        if let Some(existing) = state
            .children
            .iter_mut()
            .find(|child| child.link.same_association(&link))
        {
            existing.claims += 1;
            return (Arc::clone(&existing.link), false);
        }
        state.children.push(ChildLink {
            link: Arc::clone(&link),
            claims: 1,
        });
        (link, true)
    }

    pub(crate) fn attach_parent(&self, link: Arc<NodeLink>) {
        self.state.write().parents.push(link);
    }

    /// Drop one claim on an outgoing link.
    ///
    /// Returns `true` when that was the last claim and the link was removed.
    pub(crate) fn release_child(&self, link: &Arc<NodeLink>) -> bool {
        let mut state = self.state.write();
        let Some(pos) = state
            .children
            .iter()
            .position(|child| Arc::ptr_eq(&child.link, link))
        else {
            return false;
        };
        let slot = &mut state.children[pos];
        slot.claims = slot.claims.saturating_sub(1);
        if slot.claims > 0 {
            return false;
        }
        state.children.remove(pos);
        true
    }

    pub(crate) fn detach_parent(&self, link: &Arc<NodeLink>) {
        self.state
            .write()
            .parents
            .retain(|existing| !Arc::ptr_eq(existing, link));
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("store", &self.store)
            .field("children", &state.children.len())
            .field("parents", &state.parents.len())
            .field("claims", &self.claims())
            .field("graph_completed", &state.graph_completed)
            .field("head", &state.head)
            .finish()
    }
}
