use super::{EntityHandle, FixtureEntity, IdGenerationDescriptor, Persistability};
use crate::core::MapperResult;

/// Result of one successful commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitSummary {
    pub inserted: usize,
    pub updated: usize,
}

impl CommitSummary {
    pub fn written(&self) -> usize {
        self.inserted + self.updated
    }
}

/// Unit of work the persister delegates to.
///
/// Implementations own the per-type mapping metadata and the pending write
/// queue. They are confined to one thread and are never shared between
/// persisters.
pub trait ObjectMapper {
    /// Classifies an object without side effects.
    fn classify(&self, entity: &dyn FixtureEntity) -> Persistability;

    /// Current identifier-generation descriptor of a mapped type.
    fn id_generation(&self, type_name: &str) -> MapperResult<IdGenerationDescriptor>;

    /// Replaces the identifier-generation descriptor of a mapped type.
    fn set_id_generation(
        &mut self,
        type_name: &str,
        descriptor: IdGenerationDescriptor,
    ) -> MapperResult<()>;

    /// Registers an object for the next commit.
    fn track(&mut self, entity: EntityHandle) -> MapperResult<()>;

    /// Writes every tracked object, all or nothing.
    ///
    /// The pending queue is empty afterwards whether the commit succeeded or not.
    fn commit(&mut self) -> MapperResult<CommitSummary>;

    /// Drops tracked objects that were not committed yet.
    fn discard_pending(&mut self);
}
