//! Error Types
//!
//! Every failure aborts graph construction as a whole. The generator rolls
//! back whatever it registered in the cache before handing one of these
//! back, so callers never observe a half-built graph.
//!
//! Conditions that are *not* errors: a null association, an unloaded lazy
//! association, and revisiting an already expanded node.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = GraphError> = std::result::Result<T, E>;

/// Failure raised while generating an object graph.
#[derive(Debug, Error)]
pub enum GraphError {
    /// The object has no resolvable mapping.
    #[error("invalid entity `{entity}`: {reason}")]
    InvalidEntity {
        /// Type name reported by the object.
        entity: String,
        /// Why the object was rejected.
        reason: String,
    },

    /// The primary key is absent and could not be generated.
    #[error("primary key of `{entity}` is not set and cannot be generated")]
    PrimaryKey {
        /// Type name of the offending object.
        entity: String,
    },

    /// The identifier generator failed.
    #[error(transparent)]
    IdGeneration(#[from] IdGenerationError),

    /// A relation declares a combination the graph cannot represent.
    #[error("unsupported relation `{entity}.{property}`: {reason}")]
    UnsupportedRelation {
        /// Owning type of the relation.
        entity: String,
        /// Property the relation is declared on.
        property: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Association nesting went deeper than the configured limit.
    #[error("association depth exceeded the limit of {limit}")]
    DepthExceeded {
        /// The configured `max_depth`.
        limit: usize,
    },

    /// Configuration or metadata could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl GraphError {
    pub fn invalid_entity(entity: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEntity {
            entity: entity.into(),
            reason: reason.into(),
        }
    }

    pub fn unsupported_relation(
        entity: impl Into<String>,
        property: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::UnsupportedRelation {
            entity: entity.into(),
            property: property.into(),
            reason: reason.into(),
        }
    }
}

/// Failure reported by an [`IdGenerator`](crate::IdGenerator).
///
/// Kept separate from [`GraphError`] so generator implementations do not
/// have to know about graph construction.
#[derive(Debug, Error)]
#[error("id generation failed for `{entity}`: {message}")]
pub struct IdGenerationError {
    pub entity: String,
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl IdGenerationError {
    pub fn new(entity: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}
