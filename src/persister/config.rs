use crate::core::{PersistError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What a flush does with objects the mapper refuses to store on their own.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UnsupportedEntityPolicy {
    /// Fail the flush with `PersistError::UnsupportedEntity` before any write.
    Reject,
    /// Drop the object with a warning and write the rest.
    Skip,
}

impl Default for UnsupportedEntityPolicy {
    fn default() -> Self {
        Self::Reject
    }
}

/// Persister configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PersisterConfig {
    /// Handling of embeddables, mapped superclasses and unmapped types.
    pub unsupported_entities: UnsupportedEntityPolicy,

    /// Buffer a handle only once when it is persisted repeatedly before a flush.
    pub dedupe_handles: bool,
}

impl Default for PersisterConfig {
    fn default() -> Self {
        Self {
            unsupported_entities: UnsupportedEntityPolicy::default(),
            dedupe_handles: true,
        }
    }
}

impl PersisterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the unsupported entity policy
    pub fn unsupported_entities(mut self, policy: UnsupportedEntityPolicy) -> Self {
        self.unsupported_entities = policy;
        self
    }

    /// Enable or disable handle deduplication
    pub fn dedupe_handles(mut self, enabled: bool) -> Self {
        self.dedupe_handles = enabled;
        self
    }

    /// Parse from a JSON document
    ///
    /// Missing keys fall back to their defaults.
    ///
    /// ```
    /// use rustmemodb_fixtures::{PersisterConfig, UnsupportedEntityPolicy};
    ///
    /// let config = PersisterConfig::from_json_str(r#"{"unsupported_entities": "skip"}"#).unwrap();
    /// assert_eq!(config.unsupported_entities, UnsupportedEntityPolicy::Skip);
    /// assert!(config.dedupe_handles);
    /// ```
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PersistError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&raw)
    }
}
