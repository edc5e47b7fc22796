//! Generator Configuration

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Tuning knobs for [`GraphGenerator`](crate::graph::GraphGenerator).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Deepest association chain walked before the build is aborted.
    pub max_depth: usize,

    /// Walk to-many associations. When disabled they are recorded as
    /// deferred and can be expanded later on demand.
    pub follow_collections: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            max_depth: 256,
            follow_collections: true,
        }
    }
}

impl GeneratorConfig {
    /// Parse a configuration, filling omitted fields with defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_follow_collections(mut self, follow: bool) -> Self {
        self.follow_collections = follow;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn omitted_fields_use_defaults() {
        let config = GeneratorConfig::from_json(r#"{ "max_depth": 8 }"#).unwrap();
        assert_eq!(config.max_depth, 8);
        assert!(config.follow_collections);
    }

    #[test]
    fn empty_object_is_default() {
        let config = GeneratorConfig::from_json("{}").unwrap();
        assert_eq!(config, GeneratorConfig::default());
    }
}
