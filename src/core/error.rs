use crate::mapping::MappingKind;
use thiserror::Error;

/// Errors raised by an object mapper (the collaborator behind the persister).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MapperError {
    #[error("Type '{0}' is not mapped")]
    UnknownType(String),

    #[error("Type '{type_name}' is a {kind} and cannot be persisted on its own")]
    NotPersistable { type_name: String, kind: MappingKind },

    #[error("Entity of type '{0}' has no identifier and its mapping does not generate one")]
    MissingIdentifier(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Type '{0}' is already mapped")]
    DuplicateMapping(String),

    #[error("Store error: {0}")]
    Store(String),
}

impl From<std::cell::BorrowError> for MapperError {
    fn from(err: std::cell::BorrowError) -> Self {
        Self::Store(format!("entity is mutably borrowed elsewhere: {}", err))
    }
}

impl From<std::cell::BorrowMutError> for MapperError {
    fn from(err: std::cell::BorrowMutError) -> Self {
        Self::Store(format!("entity is borrowed elsewhere: {}", err))
    }
}

/// Errors surfaced to the fixture-loading driver.
#[derive(Error, Debug)]
pub enum PersistError {
    #[error(
        "Type '{type_name}' mixes explicit identifiers ({assigned} objects) with generated ones ({generated} objects) in one flush"
    )]
    ConfigurationConflict {
        type_name: String,
        assigned: usize,
        generated: usize,
    },

    #[error("Type '{type_name}' is not persistable: {kind}")]
    UnsupportedEntity {
        type_name: String,
        kind: UnsupportedKind,
    },

    #[error("Write failed: {source}")]
    WriteFailure {
        #[source]
        source: MapperError,
    },

    #[error("Mapper error: {0}")]
    Mapper(#[from] MapperError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PersistError {
    /// Wraps a failure raised while tracking or committing objects.
    pub fn write(source: MapperError) -> Self {
        Self::WriteFailure { source }
    }
}

impl From<serde_json::Error> for PersistError {
    fn from(err: serde_json::Error) -> Self {
        PersistError::Config(err.to_string())
    }
}

/// Why a mapper refused to treat an object as a storable entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsupportedKind {
    /// The type has no mapping at all.
    Unmapped,
    /// The type is mapped, but as an embeddable or mapped superclass.
    Mapped(MappingKind),
}

impl std::fmt::Display for UnsupportedKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnsupportedKind::Unmapped => write!(f, "no mapping registered"),
            UnsupportedKind::Mapped(kind) => write!(f, "mapped as {}", kind),
        }
    }
}

pub type Result<T> = std::result::Result<T, PersistError>;
pub type MapperResult<T> = std::result::Result<T, MapperError>;
