use super::{
    CommitSummary, EntityHandle, EntityMapping, EntityProfile, FixtureEntity, GeneratorKind,
    IdGenerationDescriptor, MappingCatalog, ObjectMapper, Persistability,
};
use crate::core::{Identifier, MapperError, MapperResult, UnsupportedKind};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::{Rc, Weak};

/// One row of an in-memory table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRow {
    pub id: Identifier,
    pub fields: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Bumped on every update of an already stored row.
    pub version: i64,
}

#[derive(Debug, Clone)]
struct TableState {
    rows: BTreeMap<Identifier, StoredRow>,
    next_identity: i64,
}

impl Default for TableState {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_identity: 1,
        }
    }
}

/// Descriptor activity recorded by the mapper, oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorEvent {
    /// `set_id_generation` was called.
    Set {
        type_name: String,
        descriptor: IdGenerationDescriptor,
    },
    /// A commit wrote objects of this type under this descriptor.
    Commit {
        type_name: String,
        descriptor: IdGenerationDescriptor,
    },
}

type IdentityKey = (String, Identifier);

/// Object mapper backed by in-memory tables.
///
/// Commits are staged against a copy of the tables and swapped in only when
/// every tracked object was written, so a failed commit leaves no rows behind.
pub struct InMemoryMapper {
    catalog: MappingCatalog,
    tables: HashMap<String, TableState>,
    sequences: HashMap<String, i64>,
    identity_map: HashMap<IdentityKey, Weak<RefCell<dyn FixtureEntity>>>,
    pending: Vec<EntityHandle>,
    fail_next_commit: Option<String>,
    descriptor_log: Vec<DescriptorEvent>,
}

impl InMemoryMapper {
    pub fn new() -> Self {
        Self {
            catalog: MappingCatalog::new(),
            tables: HashMap::new(),
            sequences: HashMap::new(),
            identity_map: HashMap::new(),
            pending: Vec::new(),
            fail_next_commit: None,
            descriptor_log: Vec::new(),
        }
    }

    pub fn with_mappings(
        mappings: impl IntoIterator<Item = EntityMapping>,
    ) -> MapperResult<Self> {
        let mut mapper = Self::new();
        for mapping in mappings {
            mapper.register(mapping)?;
        }
        Ok(mapper)
    }

    /// Registers the mapping metadata of one type.
    pub fn register(&mut self, mapping: EntityMapping) -> MapperResult<()> {
        debug!(
            "Registering {} '{}' (table '{}', ids {})",
            mapping.kind, mapping.type_name, mapping.table_name, mapping.id_generation
        );
        self.catalog = self.catalog.clone().with_mapping(mapping)?;
        Ok(())
    }

    pub fn catalog(&self) -> &MappingCatalog {
        &self.catalog
    }

    pub fn find(&self, type_name: &str, id: &Identifier) -> Option<&StoredRow> {
        self.table_of(type_name)?.rows.get(id)
    }

    pub fn find_all(&self, type_name: &str) -> Vec<&StoredRow> {
        self.table_of(type_name)
            .map(|table| table.rows.values().collect())
            .unwrap_or_default()
    }

    pub fn row_count(&self, type_name: &str) -> usize {
        self.table_of(type_name)
            .map(|table| table.rows.len())
            .unwrap_or(0)
    }

    pub fn contains(&self, type_name: &str, id: &Identifier) -> bool {
        self.find(type_name, id).is_some()
    }

    /// Number of objects tracked but not committed yet.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Number of identity-map entries, live or not yet pruned.
    pub fn managed_len(&self) -> usize {
        self.identity_map.len()
    }

    /// Deletes every row and resets generators; mappings are kept.
    pub fn purge(&mut self) {
        debug!("Purging {} tables", self.tables.len());
        self.tables.clear();
        self.sequences.clear();
        self.identity_map.clear();
        self.pending.clear();
    }

    /// Detaches every managed object; rows stay in the store.
    pub fn clear_identity_map(&mut self) {
        self.identity_map.clear();
    }

    /// Makes the next commit fail with a store error.
    pub fn fail_next_commit(&mut self, reason: impl Into<String>) {
        self.fail_next_commit = Some(reason.into());
    }

    pub fn descriptor_log(&self) -> &[DescriptorEvent] {
        &self.descriptor_log
    }

    pub fn take_descriptor_log(&mut self) -> Vec<DescriptorEvent> {
        std::mem::take(&mut self.descriptor_log)
    }

    fn table_of(&self, type_name: &str) -> Option<&TableState> {
        let mapping = self.catalog.lookup(type_name)?;
        self.tables.get(&mapping.table_name)
    }

    fn is_managed(&self, entity: &dyn FixtureEntity) -> bool {
        let Some(id) = entity.identifier() else {
            return false;
        };

        self.identity_map
            .get(&(entity.type_name().to_string(), id))
            .and_then(Weak::upgrade)
            .is_some_and(|handle| std::ptr::addr_eq(handle.as_ptr().cast_const(), entity))
    }

    fn persistable_mapping<'a>(
        catalog: &'a MappingCatalog,
        type_name: &str,
    ) -> MapperResult<&'a EntityMapping> {
        let mapping = catalog.get(type_name)?;
        if !mapping.kind.is_persistable() {
            return Err(MapperError::NotPersistable {
                type_name: type_name.to_string(),
                kind: mapping.kind,
            });
        }
        Ok(mapping)
    }

    fn stage(&mut self, pending: &[EntityHandle]) -> MapperResult<CommitSummary> {
        let catalog = self.catalog.clone();
        let mut tables = self.tables.clone();
        let mut sequences = self.sequences.clone();
        let mut assignments: Vec<(EntityHandle, String, Identifier)> = Vec::new();
        let mut summary = CommitSummary::default();
        let mut logged_types = HashSet::new();
        let now = Utc::now();

        for handle in pending {
            let entity = handle.try_borrow()?;
            let type_name = entity.type_name();
            let mapping = Self::persistable_mapping(&catalog, type_name)?;
            if logged_types.insert(type_name) {
                self.descriptor_log.push(DescriptorEvent::Commit {
                    type_name: type_name.to_string(),
                    descriptor: mapping.id_generation.clone(),
                });
            }

            let table = tables.entry(mapping.table_name.clone()).or_default();

            if self.is_managed(&*entity) {
                let id = entity
                    .identifier()
                    .ok_or_else(|| MapperError::MissingIdentifier(type_name.to_string()))?;
                let row = table.rows.get_mut(&id).ok_or_else(|| {
                    MapperError::Store(format!(
                        "managed {} '{}' has no row in table '{}'",
                        type_name, id, mapping.table_name
                    ))
                })?;
                row.fields = entity.fields();
                row.updated_at = now;
                row.version += 1;
                summary.updated += 1;
                continue;
            }

            let id = match &mapping.id_generation {
                IdGenerationDescriptor::StoreGenerated(GeneratorKind::Identity) => {
                    let id = table.next_identity;
                    table.next_identity = id
                        .checked_add(1)
                        .ok_or_else(|| exhausted("identity", &mapping.table_name))?;
                    Identifier::Integer(id)
                }
                IdGenerationDescriptor::StoreGenerated(GeneratorKind::Sequence {
                    name,
                    allocation_size,
                }) => {
                    let next = sequences.entry(name.clone()).or_insert(1);
                    let id = *next;
                    *next = id
                        .checked_add(i64::from((*allocation_size).max(1)))
                        .ok_or_else(|| exhausted("sequence", name))?;
                    Identifier::Integer(id)
                }
                IdGenerationDescriptor::ApplicationAssigned => {
                    let id = entity
                        .identifier()
                        .filter(|id| !id.is_default())
                        .ok_or_else(|| MapperError::MissingIdentifier(type_name.to_string()))?;
                    // An assigned i64::MAX leaves the identity counter pinned; the
                    // next generated insert then fails as exhausted.
                    if let Some(value) = id.as_i64() {
                        table.next_identity = table.next_identity.max(value.saturating_add(1));
                    }
                    id
                }
            };

            if table.rows.contains_key(&id) {
                return Err(MapperError::ConstraintViolation(format!(
                    "duplicate primary key {} in table '{}'",
                    id, mapping.table_name
                )));
            }

            table.rows.insert(
                id.clone(),
                StoredRow {
                    id: id.clone(),
                    fields: entity.fields(),
                    created_at: now,
                    updated_at: now,
                    version: 0,
                },
            );
            assignments.push((handle.clone(), type_name.to_string(), id));
            summary.inserted += 1;
        }

        // Write-back must not fail halfway once the tables are swapped in.
        for (handle, _, _) in &assignments {
            handle.try_borrow_mut()?;
        }

        self.tables = tables;
        self.sequences = sequences;

        for (handle, type_name, id) in assignments {
            handle.try_borrow_mut()?.assign_identifier(id.clone());
            self.identity_map.insert((type_name, id), Rc::downgrade(&handle));
        }

        Ok(summary)
    }

    fn prune_identity_map(&mut self) {
        let before = self.identity_map.len();
        self.identity_map.retain(|_, handle| handle.strong_count() > 0);
        let pruned = before - self.identity_map.len();
        if pruned > 0 {
            debug!("Pruned {} dropped objects from the identity map", pruned);
        }
    }
}

fn exhausted(generator: &str, name: &str) -> MapperError {
    MapperError::Store(format!("{} generator '{}' exhausted", generator, name))
}

impl Default for InMemoryMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectMapper for InMemoryMapper {
    fn classify(&self, entity: &dyn FixtureEntity) -> Persistability {
        let type_name = entity.type_name();

        let Some(mapping) = self.catalog.lookup(type_name) else {
            return Persistability::Unsupported {
                type_name: type_name.to_string(),
                kind: UnsupportedKind::Unmapped,
            };
        };

        if !mapping.kind.is_persistable() {
            return Persistability::Unsupported {
                type_name: type_name.to_string(),
                kind: UnsupportedKind::Mapped(mapping.kind),
            };
        }

        Persistability::Entity(EntityProfile {
            type_name: type_name.to_string(),
            identifier_set: entity.identifier().is_some_and(|id| !id.is_default()),
            managed: self.is_managed(entity),
        })
    }

    fn id_generation(&self, type_name: &str) -> MapperResult<IdGenerationDescriptor> {
        Ok(self.catalog.get(type_name)?.id_generation.clone())
    }

    fn set_id_generation(
        &mut self,
        type_name: &str,
        descriptor: IdGenerationDescriptor,
    ) -> MapperResult<()> {
        self.catalog = self
            .catalog
            .clone()
            .with_id_generation(type_name, descriptor.clone())?;
        self.descriptor_log.push(DescriptorEvent::Set {
            type_name: type_name.to_string(),
            descriptor,
        });
        Ok(())
    }

    fn track(&mut self, entity: EntityHandle) -> MapperResult<()> {
        {
            let borrowed = entity.try_borrow()?;
            Self::persistable_mapping(&self.catalog, borrowed.type_name())?;
        }

        if !self.pending.iter().any(|queued| Rc::ptr_eq(queued, &entity)) {
            self.pending.push(entity);
        }
        Ok(())
    }

    fn commit(&mut self) -> MapperResult<CommitSummary> {
        let pending = std::mem::take(&mut self.pending);
        self.prune_identity_map();

        if let Some(reason) = self.fail_next_commit.take() {
            warn!("Commit of {} objects aborted: {}", pending.len(), reason);
            return Err(MapperError::Store(reason));
        }

        match self.stage(&pending) {
            Ok(summary) => {
                debug!(
                    "Committed {} objects ({} inserted, {} updated)",
                    summary.written(),
                    summary.inserted,
                    summary.updated
                );
                Ok(summary)
            }
            Err(err) => {
                warn!("Commit of {} objects rolled back: {}", pending.len(), err);
                Err(err)
            }
        }
    }

    fn discard_pending(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::entity_handle;
    use serde_json::json;

    struct Tag {
        id: Option<i64>,
        label: String,
    }

    impl FixtureEntity for Tag {
        fn type_name(&self) -> &'static str {
            "Tag"
        }

        fn identifier(&self) -> Option<Identifier> {
            self.id.map(Identifier::Integer)
        }

        fn assign_identifier(&mut self, id: Identifier) {
            self.id = id.as_i64();
        }

        fn fields(&self) -> serde_json::Value {
            json!({ "label": self.label })
        }
    }

    fn tag(id: Option<i64>, label: &str) -> Rc<RefCell<Tag>> {
        entity_handle(Tag {
            id,
            label: label.to_string(),
        })
    }

    fn mapper() -> InMemoryMapper {
        InMemoryMapper::with_mappings([EntityMapping::entity("Tag")]).unwrap()
    }

    #[test]
    fn test_identity_assigns_sequential_ids() {
        let mut mapper = mapper();
        let first = tag(None, "a");
        let second = tag(None, "b");

        mapper.track(first.clone()).unwrap();
        mapper.track(second.clone()).unwrap();
        let summary = mapper.commit().unwrap();

        assert_eq!(summary.inserted, 2);
        assert_eq!(first.borrow().id, Some(1));
        assert_eq!(second.borrow().id, Some(2));
        assert_eq!(
            mapper.find("Tag", &Identifier::Integer(2)).unwrap().fields,
            json!({ "label": "b" })
        );
    }

    #[test]
    fn test_identity_ignores_explicit_id() {
        let mut mapper = mapper();
        let explicit = tag(Some(100), "explicit");

        mapper.track(explicit.clone()).unwrap();
        mapper.commit().unwrap();

        assert_eq!(explicit.borrow().id, Some(1));
        assert!(!mapper.contains("Tag", &Identifier::Integer(100)));
    }

    #[test]
    fn test_assigned_requires_identifier() {
        let mut mapper = mapper();
        mapper
            .set_id_generation("Tag", IdGenerationDescriptor::ApplicationAssigned)
            .unwrap();

        mapper.track(tag(None, "missing")).unwrap();
        let err = mapper.commit().unwrap_err();

        assert_eq!(err, MapperError::MissingIdentifier("Tag".to_string()));
        assert_eq!(mapper.row_count("Tag"), 0);
        assert_eq!(mapper.pending_len(), 0);
    }

    #[test]
    fn test_assigned_ids_advance_identity() {
        let mut mapper = mapper();
        mapper
            .set_id_generation("Tag", IdGenerationDescriptor::ApplicationAssigned)
            .unwrap();
        mapper.track(tag(Some(41), "explicit")).unwrap();
        mapper.commit().unwrap();

        mapper
            .set_id_generation("Tag", IdGenerationDescriptor::identity())
            .unwrap();
        let generated = tag(None, "generated");
        mapper.track(generated.clone()).unwrap();
        mapper.commit().unwrap();

        assert_eq!(generated.borrow().id, Some(42));
    }

    #[test]
    fn test_duplicate_key_rolls_back_whole_commit() {
        let mut mapper = mapper();
        mapper
            .set_id_generation("Tag", IdGenerationDescriptor::ApplicationAssigned)
            .unwrap();
        mapper.track(tag(Some(5), "first")).unwrap();
        mapper.commit().unwrap();

        let fresh = tag(Some(6), "fresh");
        mapper.track(fresh.clone()).unwrap();
        mapper.track(tag(Some(5), "clash")).unwrap();
        let err = mapper.commit().unwrap_err();

        assert!(matches!(err, MapperError::ConstraintViolation(_)));
        assert_eq!(mapper.row_count("Tag"), 1);
        assert!(!mapper.contains("Tag", &Identifier::Integer(6)));
    }

    #[test]
    fn test_managed_object_is_updated() {
        let mut mapper = mapper();
        let handle = tag(None, "before");
        mapper.track(handle.clone()).unwrap();
        mapper.commit().unwrap();

        assert!(matches!(
            mapper.classify(&*handle.borrow()),
            Persistability::Entity(EntityProfile { managed: true, identifier_set: true, .. })
        ));

        handle.borrow_mut().label = "after".to_string();
        mapper.track(handle.clone()).unwrap();
        let summary = mapper.commit().unwrap();

        assert_eq!(summary.updated, 1);
        let row = mapper.find("Tag", &Identifier::Integer(1)).unwrap();
        assert_eq!(row.fields, json!({ "label": "after" }));
        assert_eq!(row.version, 1);
    }

    #[test]
    fn test_equal_id_on_other_object_is_not_managed() {
        let mut mapper = mapper();
        let stored = tag(None, "stored");
        mapper.track(stored.clone()).unwrap();
        mapper.commit().unwrap();

        let lookalike = tag(Some(1), "lookalike");
        assert!(matches!(
            mapper.classify(&*lookalike.borrow()),
            Persistability::Entity(EntityProfile { managed: false, .. })
        ));
    }

    #[test]
    fn test_purge_resets_sequences() {
        let mut mapper = InMemoryMapper::with_mappings([
            EntityMapping::entity("Tag").id_generation(IdGenerationDescriptor::sequence("global")),
        ])
        .unwrap();

        let first = tag(None, "a");
        mapper.track(first.clone()).unwrap();
        mapper.commit().unwrap();
        assert_eq!(first.borrow().id, Some(1));

        mapper.purge();
        let second = tag(None, "b");
        mapper.track(second.clone()).unwrap();
        mapper.commit().unwrap();
        assert_eq!(second.borrow().id, Some(1));
    }

    #[test]
    fn test_track_rejects_embeddable() {
        let mut mapper = InMemoryMapper::with_mappings([EntityMapping::embeddable("Tag")]).unwrap();
        let err = mapper.track(tag(None, "x")).unwrap_err();
        assert_eq!(
            err,
            MapperError::NotPersistable {
                type_name: "Tag".to_string(),
                kind: crate::mapping::MappingKind::Embeddable,
            }
        );
    }

    #[test]
    fn test_assigned_max_id_does_not_overflow() {
        let mut mapper = mapper();
        mapper
            .set_id_generation("Tag", IdGenerationDescriptor::ApplicationAssigned)
            .unwrap();
        mapper.track(tag(Some(i64::MAX), "last")).unwrap();
        mapper.commit().unwrap();
        assert!(mapper.contains("Tag", &Identifier::Integer(i64::MAX)));

        mapper
            .set_id_generation("Tag", IdGenerationDescriptor::identity())
            .unwrap();
        let generated = tag(None, "generated");
        mapper.track(generated.clone()).unwrap();
        let err = mapper.commit().unwrap_err();

        assert!(matches!(err, MapperError::Store(_)));
        assert_eq!(generated.borrow().id, None);
        assert_eq!(mapper.row_count("Tag"), 1);
    }

    #[test]
    fn test_exhausted_sequence_is_store_error() {
        let mut mapper = InMemoryMapper::with_mappings([
            EntityMapping::entity("Tag").id_generation(IdGenerationDescriptor::sequence("tag_seq")),
        ])
        .unwrap();
        mapper.sequences.insert("tag_seq".to_string(), i64::MAX);

        mapper.track(tag(None, "overflow")).unwrap();
        let err = mapper.commit().unwrap_err();

        assert_eq!(
            err,
            MapperError::Store("sequence generator 'tag_seq' exhausted".to_string())
        );
        assert_eq!(mapper.row_count("Tag"), 0);
    }

    #[test]
    fn test_commit_prunes_dropped_objects() {
        let mut mapper = mapper();
        {
            let transient = tag(None, "transient");
            mapper.track(transient.clone()).unwrap();
            mapper.commit().unwrap();
        }
        assert_eq!(mapper.managed_len(), 1);

        let kept = tag(None, "kept");
        mapper.track(kept.clone()).unwrap();
        mapper.commit().unwrap();

        assert_eq!(mapper.managed_len(), 1);
        assert_eq!(mapper.row_count("Tag"), 2);
        assert!(matches!(
            mapper.classify(&*kept.borrow()),
            Persistability::Entity(EntityProfile { managed: true, .. })
        ));
    }

    #[test]
    fn test_fail_next_commit_discards_pending() {
        let mut mapper = mapper();
        mapper.track(tag(None, "lost")).unwrap();
        mapper.fail_next_commit("connection reset");

        let err = mapper.commit().unwrap_err();
        assert_eq!(err, MapperError::Store("connection reset".to_string()));
        assert_eq!(mapper.pending_len(), 0);
        assert_eq!(mapper.row_count("Tag"), 0);

        mapper.track(tag(None, "kept")).unwrap();
        mapper.commit().unwrap();
        assert_eq!(mapper.row_count("Tag"), 1);
    }
}
