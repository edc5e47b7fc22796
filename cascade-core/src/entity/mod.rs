//! Entities and Property Access
//!
//! The graph never introspects objects. Every persistable type exposes a
//! small capability interface, [`Entity`], that reads and writes named
//! properties. Primary keys and associations both travel through it as a
//! [`Value`].
//!
//! # Lazy Associations
//!
//! An association that has not been fetched from its store yet is modelled
//! as [`Lazy::Unloaded`]. Graph generation only follows [`Lazy::Loaded`]
//! values and never forces a load mid-traversal.

mod dynamic;

pub use dynamic::DynamicEntity;

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};
use crate::metadata::{EntityMetadata, Relation};

/// Name of a persistable type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityType(String);

impl EntityType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for EntityType {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntityType {
    fn from(name: &str) -> Self {
        Self(name.to_owned())
    }
}

impl From<String> for EntityType {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// A primary-key value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Key {
    Int(i64),
    Text(String),
}

impl Key {
    /// Whether this is the type's default value (`0` or empty text).
    ///
    /// Such keys are still present, but are eligible for replacement when
    /// the type declares a generation strategy.
    pub fn is_unassigned(&self) -> bool {
        match self {
            Key::Int(value) => *value == 0,
            Key::Text(value) => value.is_empty(),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(value) => write!(f, "{}", value),
            Key::Text(value) => f.write_str(value),
        }
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Key::Int(value)
    }
}

impl From<i32> for Key {
    fn from(value: i32) -> Self {
        Key::Int(i64::from(value))
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Text(value.to_owned())
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::Text(value)
    }
}

/// Reference to an association that has not been loaded from its store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LazyRef {
    /// Type the association points at.
    pub target: EntityType,
    /// Key of the referenced object, when the owner knows it.
    pub key: Option<Key>,
}

impl LazyRef {
    pub fn new(target: impl Into<EntityType>, key: Option<Key>) -> Self {
        Self {
            target: target.into(),
            key,
        }
    }
}

/// Either a materialized value or a placeholder for one.
#[derive(Debug, Clone)]
pub enum Lazy<T> {
    Loaded(T),
    Unloaded(LazyRef),
}

impl<T> Lazy<T> {
    pub fn is_unmaterialized(&self) -> bool {
        matches!(self, Lazy::Unloaded(_))
    }

    pub fn loaded(&self) -> Option<&T> {
        match self {
            Lazy::Loaded(value) => Some(value),
            Lazy::Unloaded(_) => None,
        }
    }
}

/// A property value as seen through [`Entity::get`].
#[derive(Debug, Clone)]
pub enum Value {
    /// A primary-key (or other scalar identity) value.
    Key(Key),
    /// A to-one association.
    One(Lazy<EntityRef>),
    /// A to-many association.
    Many(Lazy<Vec<EntityRef>>),
}

impl Value {
    pub fn is_unmaterialized(&self) -> bool {
        match self {
            Value::Key(_) => false,
            Value::One(lazy) => lazy.is_unmaterialized(),
            Value::Many(lazy) => lazy.is_unmaterialized(),
        }
    }
}

impl From<Key> for Value {
    fn from(key: Key) -> Self {
        Value::Key(key)
    }
}

/// Property access capability implemented by every persistable type.
pub trait Entity: Send + Sync + fmt::Debug {
    /// The name metadata is registered under.
    fn entity_type(&self) -> &str;

    /// Read a property. `None` means the property is null.
    fn get(&self, property: &str) -> Option<Value>;

    /// Overwrite a property.
    fn set(&mut self, property: &str, value: Value);
}

/// Shared handle to a live object.
pub type EntityRef = Arc<RwLock<dyn Entity>>;

/// Wrap an entity in a shareable handle.
pub fn entity_ref<E: Entity + 'static>(entity: E) -> EntityRef {
    Arc::new(RwLock::new(entity))
}

/// Metadata-driven property access.
///
/// Locks are held only for the duration of a single read or write, so the
/// traversal never holds one while recursing into an association.
pub struct PropertyAccessor;

impl PropertyAccessor {
    /// Type name reported by the object.
    pub fn type_of(entity: &EntityRef) -> EntityType {
        EntityType::new(entity.read().entity_type())
    }

    /// Read the primary key through the type's id attribute.
    pub fn key_of(entity: &EntityRef, metadata: &EntityMetadata) -> Result<Option<Key>> {
        Self::read_key(&*entity.read(), metadata)
    }

    /// Like [`key_of`](Self::key_of), for a caller already holding the lock.
    pub fn read_key(entity: &dyn Entity, metadata: &EntityMetadata) -> Result<Option<Key>> {
        match entity.get(&metadata.id_attribute) {
            None => Ok(None),
            Some(Value::Key(key)) => Ok(Some(key)),
            Some(_) => Err(GraphError::invalid_entity(
                metadata.entity.as_str(),
                format!("id attribute `{}` holds an association", metadata.id_attribute),
            )),
        }
    }

    /// Write the primary key through the type's id attribute.
    pub fn set_key(entity: &EntityRef, metadata: &EntityMetadata, key: Key) {
        entity.write().set(&metadata.id_attribute, Value::Key(key));
    }

    /// Read the value behind a declared relation.
    pub fn association(entity: &EntityRef, relation: &Relation) -> Option<Value> {
        entity.read().get(&relation.property)
    }

    /// Declared element type of a relation, for collections as well.
    pub fn generic_target_type(relation: &Relation) -> &EntityType {
        &relation.target
    }
}
