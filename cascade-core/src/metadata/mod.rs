//! Entity Metadata
//!
//! Metadata tells the generator, per entity type, which attribute holds the
//! primary key, whether that key may be generated, which store the type
//! lives in, and which associations to walk.
//!
//! Relation order is significant: it is the order in which associations are
//! visited, and therefore the order in which nodes and links are created.

mod relation;

pub use relation::{CascadeSet, CascadeType, JoinTableMetadata, Multiplicity, Relation};

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::entity::EntityType;
use crate::error::Result;

/// How a missing primary key may be filled in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStrategy {
    /// Keys are always assigned by the application.
    #[default]
    None,
    Auto,
    Identity,
    Sequence,
    Table,
}

impl GenerationStrategy {
    pub fn allows_generation(&self) -> bool {
        !matches!(self, GenerationStrategy::None)
    }
}

fn default_store() -> String {
    "default".to_owned()
}

/// Mapping of one entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMetadata {
    pub entity: EntityType,
    pub id_attribute: String,
    #[serde(default)]
    pub generation: GenerationStrategy,
    /// Persistence unit (back-end) the type is stored in.
    #[serde(default = "default_store")]
    pub store: String,
    #[serde(default)]
    pub relations: Vec<Relation>,
}

impl EntityMetadata {
    pub fn new(entity: impl Into<EntityType>, id_attribute: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            id_attribute: id_attribute.into(),
            generation: GenerationStrategy::None,
            store: default_store(),
            relations: Vec::new(),
        }
    }

    pub fn generated(mut self, strategy: GenerationStrategy) -> Self {
        self.generation = strategy;
        self
    }

    pub fn store(mut self, store: impl Into<String>) -> Self {
        self.store = store.into();
        self
    }

    pub fn relation(mut self, relation: Relation) -> Self {
        self.relations.push(relation);
        self
    }

    pub fn find_relation(&self, property: &str) -> Option<&Relation> {
        self.relations.iter().find(|r| r.property == property)
    }
}

/// Source of entity metadata.
pub trait MetadataProvider: Send + Sync {
    /// Metadata for a type, or `None` if the type is not mapped.
    fn entity_metadata(&self, entity: &str) -> Option<Arc<EntityMetadata>>;

    fn relations_of(&self, entity: &str) -> Vec<Relation> {
        self.entity_metadata(entity)
            .map(|m| m.relations.clone())
            .unwrap_or_default()
    }

    fn id_attribute_of(&self, entity: &str) -> Option<String> {
        self.entity_metadata(entity).map(|m| m.id_attribute.clone())
    }

    fn generation_strategy_of(&self, entity: &str) -> GenerationStrategy {
        self.entity_metadata(entity)
            .map(|m| m.generation)
            .unwrap_or_default()
    }
}

/// In-memory metadata, in registration order.
#[derive(Debug, Clone, Default)]
pub struct MetadataRegistry {
    entities: IndexMap<EntityType, Arc<EntityMetadata>>,
}

impl MetadataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON array of entity mappings.
    pub fn from_json(json: &str) -> Result<Self> {
        let entities: Vec<EntityMetadata> = serde_json::from_str(json)?;
        Ok(entities.into_iter().fold(Self::new(), Self::with))
    }

    /// Register (or replace) the mapping of a type.
    pub fn register(&mut self, metadata: EntityMetadata) {
        self.entities
            .insert(metadata.entity.clone(), Arc::new(metadata));
    }

    pub fn with(mut self, metadata: EntityMetadata) -> Self {
        self.register(metadata);
        self
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn entity_types(&self) -> impl Iterator<Item = &EntityType> {
        self.entities.keys()
    }
}

impl MetadataProvider for MetadataRegistry {
    fn entity_metadata(&self, entity: &str) -> Option<Arc<EntityMetadata>> {
        self.entities.get(entity).cloned()
    }
}
