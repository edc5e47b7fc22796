//! Validation Rules
//!
//! Pre-checks run on every object before it becomes a node: the object must
//! be mapped, and after any generation attempt its primary key must be set.

use std::sync::Arc;

use crate::entity::{EntityRef, Key, PropertyAccessor};
use crate::error::{GraphError, Result};
use crate::metadata::{EntityMetadata, MetadataProvider};

/// A pluggable check.
pub trait Rule<T: ?Sized> {
    fn validate(&self, value: &T) -> Result<()>;
}

/// Rejects objects whose type has no mapping.
pub struct ValidEntityRule<'a> {
    metadata: &'a dyn MetadataProvider,
}

impl<'a> ValidEntityRule<'a> {
    pub fn new(metadata: &'a dyn MetadataProvider) -> Self {
        Self { metadata }
    }

    /// Validate and hand back the object's metadata.
    pub fn resolve(&self, entity: &EntityRef) -> Result<Arc<EntityMetadata>> {
        let entity_type = PropertyAccessor::type_of(entity);
        self.metadata
            .entity_metadata(entity_type.as_str())
            .ok_or_else(|| GraphError::invalid_entity(entity_type.as_str(), "no metadata registered"))
    }
}

impl Rule<EntityRef> for ValidEntityRule<'_> {
    fn validate(&self, entity: &EntityRef) -> Result<()> {
        self.resolve(entity).map(|_| ())
    }
}

/// Rejects a missing primary key.
pub struct PrimaryKeyRule<'a> {
    entity: &'a str,
}

impl<'a> PrimaryKeyRule<'a> {
    pub fn new(entity: &'a str) -> Self {
        Self { entity }
    }

    /// Validate and unwrap the key.
    pub fn require(&self, key: Option<Key>) -> Result<Key> {
        key.ok_or_else(|| GraphError::PrimaryKey {
            entity: self.entity.to_owned(),
        })
    }
}

impl Rule<Option<Key>> for PrimaryKeyRule<'_> {
    fn validate(&self, key: &Option<Key>) -> Result<()> {
        match key {
            Some(_) => Ok(()),
            None => Err(GraphError::PrimaryKey {
                entity: self.entity.to_owned(),
            }),
        }
    }
}
