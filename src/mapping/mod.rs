pub mod catalog;
pub mod descriptor;
pub mod entity;
pub mod mapper;
pub mod memory;

pub use catalog::MappingCatalog;
pub use descriptor::{
    EntityMapping, GeneratorKind, IdGenerationDescriptor, MappingKind, default_table_name,
};
pub use entity::{EntityHandle, EntityProfile, FixtureEntity, Persistability, entity_handle};
pub use mapper::{CommitSummary, ObjectMapper};
pub use memory::{DescriptorEvent, InMemoryMapper, StoredRow};
