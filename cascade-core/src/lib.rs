//! Cascade Core
//!
//! This crate builds the object graph that drives cascading persistence
//! across one or more storage back-ends. Given a root object, it:
//!
//! - Validates each reachable object and resolves (or generates) its key
//! - Walks declared associations recursively, without forcing lazy loads
//! - Propagates shared primary keys from parent to child
//! - Deduplicates nodes per unit of work and terminates on cycles
//! - Produces links rich enough to order cascading writes and deletes
//!
//! It performs no I/O against a datastore itself. Metadata, property access
//! and key generation come in through narrow traits.
//!
//! # Architecture
//!
//! - `entity`: property-access capability and lazy association values
//! - `metadata`: entity mappings and relation descriptors
//! - `idgen`: primary-key generation
//! - `validation`: pre-checks run on every object
//! - `graph`: nodes, links, the cache, the generator and the graph view
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use cascade_core::entity::DynamicEntity;
//! use cascade_core::graph::{GraphGenerator, NodeCache};
//! use cascade_core::idgen::SequenceGenerator;
//! use cascade_core::metadata::{EntityMetadata, MetadataRegistry, Relation};
//!
//! let registry = MetadataRegistry::new()
//!     .with(EntityMetadata::new("Person", "person_id").relation(Relation::one_to_one("address", "Address")))
//!     .with(EntityMetadata::new("Address", "address_id"));
//!
//! let address = DynamicEntity::new("Address").with_key("address_id", "a").into_ref();
//! let person = DynamicEntity::new("Person")
//!     .with_key("person_id", "1")
//!     .with_one("address", &address)
//!     .into_ref();
//!
//! let generator = GraphGenerator::new(Arc::new(registry), Arc::new(SequenceGenerator::new()));
//! let graph = generator.generate_graph(&person, &NodeCache::new()).unwrap();
//!
//! assert_eq!(graph.node_count(), 2);
//! assert_eq!(graph.link_count(), 1);
//! ```

pub mod config;
pub mod entity;
pub mod error;
pub mod graph;
pub mod idgen;
pub mod metadata;
pub mod validation;

pub use config::GeneratorConfig;
pub use error::{GraphError, IdGenerationError, Result};
pub use idgen::IdGenerator;
