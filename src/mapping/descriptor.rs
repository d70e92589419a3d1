use serde::{Deserialize, Serialize};
use std::fmt;

/// How the store produces primary keys for a store-generated type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeneratorKind {
    /// Per-table auto-increment counter.
    Identity,
    /// Named sequence, possibly shared between several types.
    Sequence { name: String, allocation_size: u32 },
}

/// Per-type metadata describing who assigns the primary key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdGenerationDescriptor {
    StoreGenerated(GeneratorKind),
    ApplicationAssigned,
}

impl IdGenerationDescriptor {
    pub fn identity() -> Self {
        Self::StoreGenerated(GeneratorKind::Identity)
    }

    pub fn sequence(name: impl Into<String>) -> Self {
        Self::StoreGenerated(GeneratorKind::Sequence {
            name: name.into(),
            allocation_size: 1,
        })
    }

    pub fn is_store_generated(&self) -> bool {
        matches!(self, Self::StoreGenerated(_))
    }
}

impl Default for IdGenerationDescriptor {
    fn default() -> Self {
        Self::identity()
    }
}

impl fmt::Display for IdGenerationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StoreGenerated(GeneratorKind::Identity) => write!(f, "IDENTITY"),
            Self::StoreGenerated(GeneratorKind::Sequence { name, .. }) => {
                write!(f, "SEQUENCE({})", name)
            }
            Self::ApplicationAssigned => write!(f, "ASSIGNED"),
        }
    }
}

/// What a mapped type is from the store's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MappingKind {
    /// Has its own table and identity.
    Entity,
    /// Value object stored inside its owning entity's row.
    Embeddable,
    /// Abstract base that only contributes fields to subclasses.
    MappedSuperclass,
}

impl MappingKind {
    pub fn is_persistable(&self) -> bool {
        matches!(self, Self::Entity)
    }
}

impl fmt::Display for MappingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entity => write!(f, "entity"),
            Self::Embeddable => write!(f, "embeddable"),
            Self::MappedSuperclass => write!(f, "mapped superclass"),
        }
    }
}

/// Mapping metadata registered for one type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMapping {
    pub type_name: String,
    pub table_name: String,
    pub kind: MappingKind,
    pub id_generation: IdGenerationDescriptor,
}

impl EntityMapping {
    /// Entity stored in a table named after the type, with an identity generator.
    pub fn entity(type_name: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            table_name: default_table_name(type_name),
            kind: MappingKind::Entity,
            id_generation: IdGenerationDescriptor::identity(),
        }
    }

    pub fn embeddable(type_name: &str) -> Self {
        Self {
            kind: MappingKind::Embeddable,
            ..Self::entity(type_name)
        }
    }

    pub fn mapped_superclass(type_name: &str) -> Self {
        Self {
            kind: MappingKind::MappedSuperclass,
            ..Self::entity(type_name)
        }
    }

    pub fn table(mut self, table_name: &str) -> Self {
        self.table_name = table_name.to_string();
        self
    }

    pub fn id_generation(mut self, descriptor: IdGenerationDescriptor) -> Self {
        self.id_generation = descriptor;
        self
    }
}

/// `DummyWithIdentifier` -> `dummy_with_identifier`
pub fn default_table_name(type_name: &str) -> String {
    let mut out = String::with_capacity(type_name.len() + 4);
    for (idx, ch) in type_name.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if idx > 0 {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}
