//! Map-backed entity.

use std::fmt;

use indexmap::IndexMap;

use super::{entity_ref, Entity, EntityRef, EntityType, Key, Lazy, LazyRef, Value};

/// An [`Entity`] whose properties live in an ordered map.
///
/// Handy for metadata-driven callers that do not have a concrete struct per
/// type, and for building fixtures.
#[derive(Clone)]
pub struct DynamicEntity {
    entity_type: EntityType,
    fields: IndexMap<String, Value>,
}

impl DynamicEntity {
    pub fn new(entity_type: impl Into<EntityType>) -> Self {
        Self {
            entity_type: entity_type.into(),
            fields: IndexMap::new(),
        }
    }

    pub fn with(mut self, property: impl Into<String>, value: Value) -> Self {
        self.fields.insert(property.into(), value);
        self
    }

    pub fn with_key(self, property: impl Into<String>, key: impl Into<Key>) -> Self {
        self.with(property, Value::Key(key.into()))
    }

    pub fn with_one(self, property: impl Into<String>, child: &EntityRef) -> Self {
        self.with(property, Value::One(Lazy::Loaded(child.clone())))
    }

    pub fn with_many(self, property: impl Into<String>, children: Vec<EntityRef>) -> Self {
        self.with(property, Value::Many(Lazy::Loaded(children)))
    }

    pub fn with_unloaded(self, property: impl Into<String>, reference: LazyRef) -> Self {
        self.with(property, Value::One(Lazy::Unloaded(reference)))
    }

    /// Null out a property.
    pub fn remove(&mut self, property: &str) -> Option<Value> {
        self.fields.shift_remove(property)
    }

    pub fn into_ref(self) -> EntityRef {
        entity_ref(self)
    }
}

impl Entity for DynamicEntity {
    fn entity_type(&self) -> &str {
        self.entity_type.as_str()
    }

    fn get(&self, property: &str) -> Option<Value> {
        self.fields.get(property).cloned()
    }

    fn set(&mut self, property: &str, value: Value) {
        self.fields.insert(property.to_owned(), value);
    }
}

// Associations are summarized so self-referencing objects can be printed.
impl fmt::Debug for DynamicEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("DynamicEntity");
        out.field("type", &self.entity_type);
        for (name, value) in &self.fields {
            match value {
                Value::Key(key) => out.field(name, key),
                Value::One(Lazy::Loaded(_)) => out.field(name, &"<loaded>"),
                Value::Many(Lazy::Loaded(children)) => out.field(name, &children.len()),
                Value::One(Lazy::Unloaded(r)) | Value::Many(Lazy::Unloaded(r)) => out.field(name, r),
            };
        }
        out.finish()
    }
}
