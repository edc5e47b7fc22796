//! Node Cache
//!
//! The cache is the unit-of-work scoped owner of every node. Its
//! get-or-create is atomic per identity, which is what keeps at most one
//! node per `(type, key)` even when several graphs are generated
//! concurrently against the same cache.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::node::{Node, NodeId};

/// Cloneable handle to a shared node store.
#[derive(Debug, Clone, Default)]
pub struct NodeCache {
    nodes: Arc<DashMap<NodeId, Arc<Node>>>,
}

impl NodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &NodeId) -> Option<Arc<Node>> {
        self.nodes.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Return the node for `id`, creating it with `create` if absent.
    ///
    /// The boolean is `true` when this call inserted the node. `create` runs
    /// while the shard is locked and must not touch the cache.
    pub fn get_or_insert_with<F>(&self, id: NodeId, create: F) -> (Arc<Node>, bool)
    where
        F: FnOnce() -> Node,
    {
        match self.nodes.entry(id) {
            Entry::Occupied(entry) => (Arc::clone(entry.get()), false),
            Entry::Vacant(entry) => {
                let node = Arc::new(create());
                entry.insert(Arc::clone(&node));
                (node, true)
            }
        }
    }

    /// Like [`get_or_insert_with`](Self::get_or_insert_with), also taking a
    /// claim on the node while its shard is locked.
    pub(crate) fn claim_or_insert_with<F>(&self, id: NodeId, create: F) -> (Arc<Node>, bool)
    where
        F: FnOnce() -> Node,
    {
        match self.nodes.entry(id) {
            Entry::Occupied(entry) => {
                let node = Arc::clone(entry.get());
                node.claim();
                (node, false)
            }
            Entry::Vacant(entry) => {
                let node = Arc::new(create());
                node.claim();
                entry.insert(Arc::clone(&node));
                (node, true)
            }
        }
    }

    /// Remove the node for `id` if no pass holds a claim on it.
    pub(crate) fn evict_unclaimed(&self, id: &NodeId) -> bool {
        self.nodes.remove_if(id, |_, node| node.claims() == 0).is_some()
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn remove(&self, id: &NodeId) -> Option<Arc<Node>> {
        self.nodes.remove(id).map(|(_, node)| node)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All identities, sorted.
    pub fn ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<_> = self.nodes.iter().map(|entry| entry.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Drop every node, ending the unit of work.
    pub fn clear(&self) {
        self.nodes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::DynamicEntity;

    fn album(key: i64) -> Node {
        let object = DynamicEntity::new("Album").with_key("album_id", key).into_ref();
        Node::new(NodeId::new("Album", key), "default", object)
    }

    #[test]
    fn get_or_insert_creates_once() {
        let cache = NodeCache::new();

        let (first, created) = cache.get_or_insert_with(NodeId::new("Album", 1), || album(1));
        assert!(created);

        let (second, created) = cache.get_or_insert_with(NodeId::new("Album", 1), || album(1));
        assert!(!created);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn clones_share_storage() {
        let cache = NodeCache::new();
        let handle = cache.clone();

        cache.get_or_insert_with(NodeId::new("Album", 1), || album(1));
        assert!(handle.contains(&NodeId::new("Album", 1)));

        handle.remove(&NodeId::new("Album", 1));
        assert!(cache.is_empty());
    }

    #[test]
    fn concurrent_get_or_insert_has_single_winner() {
        let cache = NodeCache::new();

        let winners: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let cache = cache.clone();
                    scope.spawn(move || {
                        let (_, created) = cache.get_or_insert_with(NodeId::new("Album", 1), || album(1));
                        usize::from(created)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum()
        });

        assert_eq!(winners, 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn claimed_nodes_are_not_evicted() {
        let cache = NodeCache::new();
        let id = NodeId::new("Album", 1);

        let (node, created) = cache.claim_or_insert_with(id.clone(), || album(1));
        assert!(created);
        cache.claim_or_insert_with(id.clone(), || album(1));
        assert_eq!(node.claims(), 2);

        node.release();
        assert!(!cache.evict_unclaimed(&id));
        node.release();
        assert!(cache.evict_unclaimed(&id));
        assert!(cache.is_empty());
    }

    #[test]
    fn ids_are_sorted() {
        let cache = NodeCache::new();
        cache.get_or_insert_with(NodeId::new("Album", 2), || album(2));
        cache.get_or_insert_with(NodeId::new("Album", 1), || album(1));

        assert_eq!(cache.ids(), vec![NodeId::new("Album", 1), NodeId::new("Album", 2)]);
    }
}
