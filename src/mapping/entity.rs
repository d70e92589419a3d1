use crate::core::{Identifier, UnsupportedKind};
use std::cell::RefCell;
use std::rc::Rc;

/// Domain object that can be handed to the persister.
///
/// The mapper only needs the type tag, the identifier field and a field
/// snapshot for the row; everything else stays with the domain type.
pub trait FixtureEntity {
    /// Concrete type name, used to look up the mapping.
    fn type_name(&self) -> &'static str;
    /// Current identifier, `None` when the field was never set.
    fn identifier(&self) -> Option<Identifier>;
    /// Writes a store-generated identifier back into the object.
    fn assign_identifier(&mut self, id: Identifier);
    /// Snapshot of the persisted fields (identifier excluded).
    fn fields(&self) -> serde_json::Value;
}

/// Shared, single-threaded handle to a buffered object.
///
/// The caller keeps its own clone and observes generated identifiers after
/// a flush.
pub type EntityHandle = Rc<RefCell<dyn FixtureEntity>>;

/// Wraps a domain object into a handle the caller can keep and persist.
pub fn entity_handle<E: FixtureEntity + 'static>(entity: E) -> Rc<RefCell<E>> {
    Rc::new(RefCell::new(entity))
}

/// Capability description the mapper reports for one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityProfile {
    pub type_name: String,
    /// Identifier field holds a non-default value.
    pub identifier_set: bool,
    /// Object is already known to the mapper (written by an earlier flush or cascade).
    pub managed: bool,
}

/// Outcome of asking the mapper whether an object is storable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Persistability {
    Entity(EntityProfile),
    Unsupported {
        type_name: String,
        kind: UnsupportedKind,
    },
}

impl Persistability {
    pub fn type_name(&self) -> &str {
        match self {
            Persistability::Entity(profile) => &profile.type_name,
            Persistability::Unsupported { type_name, .. } => type_name,
        }
    }
}
