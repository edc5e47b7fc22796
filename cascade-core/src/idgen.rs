//! Identifier Generation
//!
//! Graph generation asks an [`IdGenerator`] for a key exactly once per
//! object whose key is missing and whose type allows generation. The call is
//! synchronous and may block on a store. Failures abort the whole build and
//! are never retried here.

use std::sync::atomic::{AtomicI64, Ordering};

use dashmap::DashMap;

use crate::entity::{EntityRef, EntityType, Key};
use crate::error::IdGenerationError;
use crate::metadata::{EntityMetadata, GenerationStrategy};

/// Allocates primary keys.
pub trait IdGenerator: Send + Sync {
    /// Produce a key for `entity`, stored in `store`.
    ///
    /// The caller writes the key back onto the object. It holds an
    /// upgradable read lock on `entity` during the call: implementations may
    /// read the object but must not lock it for writing.
    fn generate(
        &self,
        entity: &EntityRef,
        metadata: &EntityMetadata,
        store: &str,
    ) -> Result<Key, IdGenerationError>;
}

impl<F> IdGenerator for F
where
    F: Fn(&EntityRef, &EntityMetadata, &str) -> Result<Key, IdGenerationError> + Send + Sync,
{
    fn generate(
        &self,
        entity: &EntityRef,
        metadata: &EntityMetadata,
        store: &str,
    ) -> Result<Key, IdGenerationError> {
        self(entity, metadata, store)
    }
}

/// In-memory counter per entity type.
#[derive(Debug)]
pub struct SequenceGenerator {
    start: i64,
    counters: DashMap<EntityType, AtomicI64>,
}

impl SequenceGenerator {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(start: i64) -> Self {
        Self {
            start,
            counters: DashMap::new(),
        }
    }

    /// Last key handed out for a type, if any.
    pub fn current(&self, entity: &str) -> Option<i64> {
        self.counters
            .get(entity)
            .map(|counter| counter.load(Ordering::SeqCst) - 1)
    }
}

impl Default for SequenceGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for SequenceGenerator {
    fn generate(
        &self,
        _entity: &EntityRef,
        metadata: &EntityMetadata,
        _store: &str,
    ) -> Result<Key, IdGenerationError> {
        if metadata.generation == GenerationStrategy::None {
            return Err(IdGenerationError::new(
                metadata.entity.as_str(),
                "type does not declare a generation strategy",
            ));
        }

        let counter = self
            .counters
            .entry(metadata.entity.clone())
            .or_insert_with(|| AtomicI64::new(self.start));
        Ok(Key::Int(counter.fetch_add(1, Ordering::SeqCst)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::DynamicEntity;

    #[test]
    fn sequence_counts_per_type() {
        let ids = SequenceGenerator::new();
        let album = EntityMetadata::new("Album", "album_id").generated(GenerationStrategy::Sequence);
        let photo = EntityMetadata::new("Photo", "photo_id").generated(GenerationStrategy::Auto);
        let object = DynamicEntity::new("Album").into_ref();

        assert_eq!(ids.generate(&object, &album, "default").unwrap(), Key::Int(1));
        assert_eq!(ids.generate(&object, &album, "default").unwrap(), Key::Int(2));
        assert_eq!(ids.generate(&object, &photo, "default").unwrap(), Key::Int(1));
        assert_eq!(ids.current("Album"), Some(2));
        assert_eq!(ids.current("Tag"), None);
    }

    #[test]
    fn sequence_refuses_types_without_strategy() {
        let ids = SequenceGenerator::starting_at(100);
        let person = EntityMetadata::new("Person", "person_id");
        let object = DynamicEntity::new("Person").into_ref();

        assert!(ids.generate(&object, &person, "default").is_err());
    }

    #[test]
    fn closures_are_generators() {
        let fixed = |_: &EntityRef, _: &EntityMetadata, store: &str| {
            Ok::<_, IdGenerationError>(Key::from(format!("{}-1", store)))
        };
        let metadata = EntityMetadata::new("Tag", "tag_id").generated(GenerationStrategy::Auto);
        let object = DynamicEntity::new("Tag").into_ref();

        assert_eq!(
            fixed.generate(&object, &metadata, "couch").unwrap(),
            Key::from("couch-1")
        );
    }
}
