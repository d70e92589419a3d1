use crate::core::{PersistError, Result, UnsupportedKind};
use crate::mapping::{EntityHandle, Persistability};
use std::rc::Rc;

/// A buffered object together with the profile reported when it was persisted.
#[derive(Clone)]
pub struct PendingObject {
    pub handle: EntityHandle,
    pub profile: Persistability,
}

impl PendingObject {
    /// Counts towards mode detection: a storable object not yet managed by the mapper.
    fn fresh_identifier(&self) -> Option<bool> {
        match &self.profile {
            Persistability::Entity(profile) if !profile.managed => Some(profile.identifier_set),
            _ => None,
        }
    }
}

/// How identifiers of one type are produced during a flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchMode {
    /// No fresh object carries an identifier; mapping metadata stays as is.
    StoreGenerated,
    /// Every fresh object carries an identifier; generation is switched off for the write.
    ApplicationAssigned,
}

/// Objects of one concrete type buffered since the last flush.
pub struct TypeBatch {
    type_name: String,
    objects: Vec<PendingObject>,
}

impl TypeBatch {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            objects: Vec::new(),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn contains(&self, handle: &EntityHandle) -> bool {
        self.objects
            .iter()
            .any(|object| Rc::ptr_eq(&object.handle, handle))
    }

    pub fn push(&mut self, object: PendingObject) {
        self.objects.push(object);
    }

    /// Removes the objects the mapper reported as unsupported.
    ///
    /// Returns the kind of the first one and how many were removed. A type
    /// registered between two `persist` calls leaves both kinds in one batch.
    pub fn take_unsupported(&mut self) -> Option<(UnsupportedKind, usize)> {
        let mut first = None;
        let before = self.objects.len();
        self.objects.retain(|object| match &object.profile {
            Persistability::Unsupported { kind, .. } => {
                first.get_or_insert(*kind);
                false
            }
            Persistability::Entity(_) => true,
        });
        first.map(|kind| (kind, before - self.objects.len()))
    }

    /// Decides the identifier mode of the batch.
    ///
    /// Objects the mapper already manages are ignored: they keep the
    /// identifier they were stored with and are written as updates.
    /// Unsupported objects are expected to be taken out first and do not count.
    pub fn classify(&self) -> Result<BatchMode> {
        let (assigned, generated) = self
            .objects
            .iter()
            .filter_map(PendingObject::fresh_identifier)
            .fold((0, 0), |(assigned, generated), identifier_set| {
                if identifier_set {
                    (assigned + 1, generated)
                } else {
                    (assigned, generated + 1)
                }
            });

        match (assigned, generated) {
            (0, _) => Ok(BatchMode::StoreGenerated),
            (_, 0) => Ok(BatchMode::ApplicationAssigned),
            (assigned, generated) => Err(PersistError::ConfigurationConflict {
                type_name: self.type_name.clone(),
                assigned,
                generated,
            }),
        }
    }

    /// Handles in buffering order.
    pub fn into_handles(self) -> impl Iterator<Item = EntityHandle> {
        self.objects.into_iter().map(|object| object.handle)
    }
}

/// Per-type batches in the order their type was first persisted.
#[derive(Default)]
pub struct PendingBatches {
    batches: Vec<TypeBatch>,
}

impl PendingBatches {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffers an object; returns `false` when `dedupe` is set and the handle is already buffered.
    pub fn push(&mut self, object: PendingObject, dedupe: bool) -> bool {
        let type_name = object.profile.type_name();

        let batch = match self
            .batches
            .iter()
            .position(|batch| batch.type_name() == type_name)
        {
            Some(idx) => &mut self.batches[idx],
            None => {
                self.batches.push(TypeBatch::new(type_name));
                let last = self.batches.len() - 1;
                &mut self.batches[last]
            }
        };

        if dedupe && batch.contains(&object.handle) {
            return false;
        }
        batch.push(object);
        true
    }

    /// Number of buffered objects across all types.
    pub fn len(&self) -> usize {
        self.batches.iter().map(TypeBatch::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.iter().all(TypeBatch::is_empty)
    }

    pub fn type_names(&self) -> Vec<&str> {
        self.batches.iter().map(TypeBatch::type_name).collect()
    }

    /// Takes every batch, leaving the buffer empty.
    pub fn drain(&mut self) -> Vec<TypeBatch> {
        std::mem::take(&mut self.batches)
    }

    pub fn clear(&mut self) {
        self.batches.clear();
    }
}
