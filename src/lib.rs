// ============================================================================
// RustMemDB Fixtures Library
// ============================================================================

//! Loads fixture objects into an object mapper, mixing caller-assigned and
//! store-generated primary keys.
//!
//! The [`IdentifierAwarePersister`] buffers objects per concrete type and, on
//! flush, switches a type's identifier generation off when every fresh object
//! of that type carries its own identifier. Types mixing both modes are
//! rejected before anything is written.

pub mod core;
pub mod mapping;
pub mod persister;

pub use crate::core::{Identifier, MapperError, PersistError, Result, UnsupportedKind};
pub use crate::mapping::{
    CommitSummary, DescriptorEvent, EntityHandle, EntityMapping, EntityProfile, FixtureEntity,
    GeneratorKind, IdGenerationDescriptor, InMemoryMapper, MappingCatalog, MappingKind,
    ObjectMapper, Persistability, StoredRow, entity_handle,
};
pub use crate::persister::{
    BatchMode, FlushReport, IdGenerationOverride, IdentifierAwarePersister, Persister,
    PersisterConfig, UnsupportedEntityPolicy,
};
