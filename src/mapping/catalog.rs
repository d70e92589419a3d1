use super::{EntityMapping, IdGenerationDescriptor};
use crate::core::{MapperError, MapperResult};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of per-type mapping metadata.
///
/// Immutable once built: every change returns a new catalog, so a commit can
/// hold a snapshot while the descriptor of a type is being swapped.
#[derive(Debug, Clone)]
pub struct MappingCatalog {
    mappings: Arc<HashMap<String, EntityMapping>>,
}

impl MappingCatalog {
    pub fn new() -> Self {
        Self {
            mappings: Arc::new(HashMap::new()),
        }
    }

    /// Adds a mapping, returning the new catalog.
    pub fn with_mapping(self, mapping: EntityMapping) -> MapperResult<Self> {
        if self.mappings.contains_key(&mapping.type_name) {
            return Err(MapperError::DuplicateMapping(mapping.type_name));
        }

        let mut new_mappings = (*self.mappings).clone();
        new_mappings.insert(mapping.type_name.clone(), mapping);

        Ok(Self {
            mappings: Arc::new(new_mappings),
        })
    }

    /// Replaces the identifier-generation descriptor of one type.
    pub fn with_id_generation(
        self,
        type_name: &str,
        descriptor: IdGenerationDescriptor,
    ) -> MapperResult<Self> {
        let mut mapping = self.get(type_name)?.clone();
        mapping.id_generation = descriptor;

        let mut new_mappings = (*self.mappings).clone();
        new_mappings.insert(type_name.to_string(), mapping);

        Ok(Self {
            mappings: Arc::new(new_mappings),
        })
    }

    pub fn get(&self, type_name: &str) -> MapperResult<&EntityMapping> {
        self.mappings
            .get(type_name)
            .ok_or_else(|| MapperError::UnknownType(type_name.to_string()))
    }

    pub fn lookup(&self, type_name: &str) -> Option<&EntityMapping> {
        self.mappings.get(type_name)
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.mappings.contains_key(type_name)
    }

    pub fn list_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.mappings.keys().map(|s| s.as_str()).collect();
        types.sort_unstable();
        types
    }
}

impl Default for MappingCatalog {
    fn default() -> Self {
        Self::new()
    }
}
