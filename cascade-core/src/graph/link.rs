//! Node Links
//!
//! A [`NodeLink`] is the directed edge between a parent node and a child
//! node. It carries everything a cascade executor needs to decide whether an
//! operation crosses it and how the association is mapped in its store.
//!
//! One link record is shared (behind an `Arc`) by the parent's child list
//! and the child's parent list.

use serde::{Deserialize, Serialize};

use super::node::NodeId;
use crate::metadata::{CascadeSet, CascadeType, JoinTableMetadata, Multiplicity, Relation};

/// Mapping details of a link, copied from the relation it was built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkProperties {
    /// Logical name of the association in the parent's store.
    pub link_name: String,
    /// Property on the parent the association was read from.
    pub property: String,
    /// Store of the parent node.
    pub store: String,
    pub shared_by_primary_key: bool,
    pub bidirectional: bool,
    pub related_via_join_table: bool,
    pub cascades: CascadeSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_table: Option<JoinTableMetadata>,
}

impl LinkProperties {
    pub fn from_relation(relation: &Relation, store: &str) -> Self {
        Self {
            link_name: relation.mapped_name().to_owned(),
            property: relation.property.clone(),
            store: store.to_owned(),
            shared_by_primary_key: relation.joined_by_primary_key,
            bidirectional: relation.is_bidirectional(),
            related_via_join_table: relation.via_join_table,
            cascades: relation.cascades.clone(),
            join_table: if relation.via_join_table {
                relation.join_table.clone()
            } else {
                None
            },
        }
    }
}

/// Directed relation between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeLink {
    parent: NodeId,
    child: NodeId,
    multiplicity: Multiplicity,
    properties: LinkProperties,
}

impl NodeLink {
    pub fn new(
        parent: NodeId,
        child: NodeId,
        multiplicity: Multiplicity,
        properties: LinkProperties,
    ) -> Self {
        Self {
            parent,
            child,
            multiplicity,
            properties,
        }
    }

    pub fn parent(&self) -> &NodeId {
        &self.parent
    }

    pub fn child(&self) -> &NodeId {
        &self.child
    }

    pub fn multiplicity(&self) -> Multiplicity {
        self.multiplicity
    }

    pub fn properties(&self) -> &LinkProperties {
        &self.properties
    }

    pub fn link_name(&self) -> &str {
        &self.properties.link_name
    }

    pub fn is_shared_by_primary_key(&self) -> bool {
        self.properties.shared_by_primary_key
    }

    pub fn is_bidirectional(&self) -> bool {
        self.properties.bidirectional
    }

    pub fn is_related_via_join_table(&self) -> bool {
        self.properties.related_via_join_table
    }

    pub fn join_table(&self) -> Option<&JoinTableMetadata> {
        self.properties.join_table.as_ref()
    }

    /// Whether `op` propagates from parent to child across this link.
    pub fn cascades_on(&self, op: CascadeType) -> bool {
        self.properties.cascades.contains(op)
    }

    /// Same endpoints, reached through the same property.
    pub fn same_association(&self, other: &NodeLink) -> bool {
        self.parent == other.parent
            && self.child == other.child
            && self.properties.property == other.properties.property
    }
}
