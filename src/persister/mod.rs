//! Fixture persister that reconciles explicit and store-generated identifiers.
//!
//! Objects are buffered per concrete type by `persist` and written by
//! `flush`. A type whose fresh objects all carry an identifier is written with
//! identifier generation switched off; the mapping is restored before `flush`
//! returns, whatever the outcome.

pub mod batch;
pub mod config;
pub mod guard;

pub use batch::{BatchMode, PendingBatches, PendingObject, TypeBatch};
pub use config::{PersisterConfig, UnsupportedEntityPolicy};
pub use guard::IdGenerationOverride;

use crate::core::{MapperError, MapperResult, PersistError, Result};
use crate::mapping::{CommitSummary, EntityHandle, IdGenerationDescriptor, ObjectMapper};
use tracing::{Level, event, info_span};

/// Driver-facing persistence contract.
pub trait Persister {
    /// Buffers an object for the next flush.
    fn persist(&mut self, entity: EntityHandle) -> Result<()>;

    /// Writes every buffered object.
    fn flush(&mut self) -> Result<FlushReport>;
}

/// Outcome of a successful flush.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Types written, in first-encounter order.
    pub types: Vec<String>,
    pub inserted: usize,
    pub updated: usize,
    /// Types written with identifier generation switched off.
    pub overridden: Vec<String>,
    /// Objects dropped under `UnsupportedEntityPolicy::Skip`.
    pub skipped: usize,
}

impl FlushReport {
    pub fn written(&self) -> usize {
        self.inserted + self.updated
    }
}

struct PlannedBatch {
    batch: TypeBatch,
    mode: BatchMode,
}

/// Buffers fixtures and writes them through an [`ObjectMapper`].
///
/// # Examples
///
/// ```
/// use rustmemodb_fixtures::{
///     EntityMapping, FixtureEntity, Identifier, IdentifierAwarePersister, InMemoryMapper,
///     entity_handle,
/// };
///
/// struct User {
///     id: Option<i64>,
///     name: String,
/// }
///
/// impl FixtureEntity for User {
///     fn type_name(&self) -> &'static str {
///         "User"
///     }
///     fn identifier(&self) -> Option<Identifier> {
///         self.id.map(Identifier::Integer)
///     }
///     fn assign_identifier(&mut self, id: Identifier) {
///         self.id = id.as_i64();
///     }
///     fn fields(&self) -> serde_json::Value {
///         serde_json::json!({ "name": self.name })
///     }
/// }
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mapper = InMemoryMapper::with_mappings([EntityMapping::entity("User")])?;
/// let mut persister = IdentifierAwarePersister::new(mapper);
///
/// let alice = entity_handle(User { id: Some(100), name: "alice".into() });
/// let bob = entity_handle(User { id: Some(200), name: "bob".into() });
/// persister.persist(alice.clone())?;
/// persister.persist(bob.clone())?;
///
/// let report = persister.flush()?;
/// assert_eq!(report.overridden, vec!["User".to_string()]);
/// assert!(persister.mapper().contains("User", &Identifier::Integer(200)));
/// # Ok(())
/// # }
/// ```
pub struct IdentifierAwarePersister<M: ObjectMapper> {
    mapper: M,
    config: PersisterConfig,
    pending: PendingBatches,
}

impl<M: ObjectMapper> IdentifierAwarePersister<M> {
    pub fn new(mapper: M) -> Self {
        Self::with_config(mapper, PersisterConfig::default())
    }

    pub fn with_config(mapper: M, config: PersisterConfig) -> Self {
        Self {
            mapper,
            config,
            pending: PendingBatches::new(),
        }
    }

    pub fn config(&self) -> &PersisterConfig {
        &self.config
    }

    pub fn mapper(&self) -> &M {
        &self.mapper
    }

    pub fn mapper_mut(&mut self) -> &mut M {
        &mut self.mapper
    }

    pub fn into_mapper(self) -> M {
        self.mapper
    }

    /// Number of buffered objects.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Buffered types in first-encounter order.
    pub fn pending_types(&self) -> Vec<&str> {
        self.pending.type_names()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drops every buffered object without writing anything.
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Buffers an object for the next flush.
    ///
    /// The mapper classifies the object now; nothing reaches the store until
    /// `flush`. Fails only when the object is mutably borrowed elsewhere.
    pub fn persist(&mut self, entity: EntityHandle) -> Result<()> {
        let profile = {
            let borrowed = entity.try_borrow().map_err(MapperError::from)?;
            self.mapper.classify(&*borrowed)
        };

        let buffered = self.pending.push(
            PendingObject {
                handle: entity,
                profile,
            },
            self.config.dedupe_handles,
        );
        if !buffered {
            event!(Level::TRACE, "object already buffered");
        }
        Ok(())
    }

    /// Writes every buffered object in one commit.
    ///
    /// Each type is classified first; a type mixing explicit and missing
    /// identifiers fails the whole flush before anything is written. Buffers
    /// are consumed whether the flush succeeds or not.
    pub fn flush(&mut self) -> Result<FlushReport> {
        if self.pending.is_empty() {
            return Ok(FlushReport::default());
        }

        let batches = self.pending.drain();
        let span = info_span!(
            "persister.flush",
            types = batches.len(),
            objects = batches.iter().map(TypeBatch::len).sum::<usize>()
        );
        let _enter = span.enter();

        let mut report = FlushReport::default();
        let plan = self.plan(batches, &mut report)?;
        if plan.is_empty() {
            event!(Level::DEBUG, skipped = report.skipped, "nothing to write");
            return Ok(report);
        }

        let mut guard = IdGenerationOverride::new(&mut self.mapper);
        for planned in &plan {
            if planned.mode == BatchMode::ApplicationAssigned
                && guard.install(
                    planned.batch.type_name(),
                    IdGenerationDescriptor::ApplicationAssigned,
                )?
            {
                report.overridden.push(planned.batch.type_name().to_string());
            }
        }

        let written = Self::write(guard.mapper(), plan);
        let restored = guard.release();

        let summary = match written {
            Ok(summary) => summary,
            Err(err) => {
                event!(Level::ERROR, error = %err, "flush write failed");
                return Err(PersistError::write(err));
            }
        };
        restored?;

        report.inserted = summary.inserted;
        report.updated = summary.updated;
        event!(
            Level::INFO,
            inserted = report.inserted,
            updated = report.updated,
            overridden = report.overridden.len(),
            "flush committed"
        );
        Ok(report)
    }

    fn plan(
        &self,
        batches: Vec<TypeBatch>,
        report: &mut FlushReport,
    ) -> Result<Vec<PlannedBatch>> {
        let mut plan = Vec::with_capacity(batches.len());

        for mut batch in batches {
            if let Some((kind, count)) = batch.take_unsupported() {
                match self.config.unsupported_entities {
                    UnsupportedEntityPolicy::Reject => {
                        event!(Level::WARN, type_name = %batch.type_name(), reason = %kind, "batch rejected");
                        return Err(PersistError::UnsupportedEntity {
                            type_name: batch.type_name().to_string(),
                            kind,
                        });
                    }
                    UnsupportedEntityPolicy::Skip => {
                        event!(
                            Level::WARN,
                            type_name = %batch.type_name(),
                            objects = count,
                            reason = %kind,
                            "skipping objects that cannot be persisted"
                        );
                        report.skipped += count;
                        if batch.is_empty() {
                            continue;
                        }
                    }
                }
            }

            let mode = match batch.classify() {
                Ok(mode) => mode,
                Err(err) => {
                    event!(Level::WARN, type_name = %batch.type_name(), error = %err, "batch rejected");
                    return Err(err);
                }
            };
            event!(
                Level::DEBUG,
                type_name = %batch.type_name(),
                objects = batch.len(),
                mode = ?mode,
                "batch classified"
            );

            report.types.push(batch.type_name().to_string());
            plan.push(PlannedBatch { batch, mode });
        }

        Ok(plan)
    }

    fn write(mapper: &mut M, plan: Vec<PlannedBatch>) -> MapperResult<CommitSummary> {
        for planned in plan {
            for handle in planned.batch.into_handles() {
                if let Err(err) = mapper.track(handle) {
                    mapper.discard_pending();
                    return Err(err);
                }
            }
        }
        mapper.commit()
    }
}

impl<M: ObjectMapper> Persister for IdentifierAwarePersister<M> {
    fn persist(&mut self, entity: EntityHandle) -> Result<()> {
        IdentifierAwarePersister::persist(self, entity)
    }

    fn flush(&mut self) -> Result<FlushReport> {
        IdentifierAwarePersister::flush(self)
    }
}
