use crate::core::MapperResult;
use crate::mapping::{IdGenerationDescriptor, ObjectMapper};
use tracing::{Level, event};

/// Scoped override of identifier-generation descriptors.
///
/// Holds the mapper for as long as overrides are installed. Originals are put
/// back by `release`, or by `Drop` when the owner bails out early, in reverse
/// installation order.
pub struct IdGenerationOverride<'m, M: ObjectMapper> {
    mapper: &'m mut M,
    originals: Vec<(String, IdGenerationDescriptor)>,
}

impl<'m, M: ObjectMapper> IdGenerationOverride<'m, M> {
    pub fn new(mapper: &'m mut M) -> Self {
        Self {
            mapper,
            originals: Vec::new(),
        }
    }

    /// Switches `type_name` to `descriptor`.
    ///
    /// Returns `false` without touching the mapper when the type already uses it.
    pub fn install(
        &mut self,
        type_name: &str,
        descriptor: IdGenerationDescriptor,
    ) -> MapperResult<bool> {
        let original = self.mapper.id_generation(type_name)?;
        if original == descriptor {
            return Ok(false);
        }

        self.mapper.set_id_generation(type_name, descriptor.clone())?;
        event!(
            Level::DEBUG,
            type_name = %type_name,
            original = %original,
            descriptor = %descriptor,
            "id generation overridden"
        );
        self.originals.push((type_name.to_string(), original));
        Ok(true)
    }

    pub fn mapper(&mut self) -> &mut M {
        self.mapper
    }

    pub fn overridden_types(&self) -> Vec<&str> {
        self.originals
            .iter()
            .map(|(type_name, _)| type_name.as_str())
            .collect()
    }

    /// Restores every original descriptor.
    ///
    /// All restores are attempted; the first failure is returned.
    pub fn release(mut self) -> MapperResult<()> {
        self.restore_all()
    }

    fn restore_all(&mut self) -> MapperResult<()> {
        let mut first_err = None;

        while let Some((type_name, original)) = self.originals.pop() {
            match self.mapper.set_id_generation(&type_name, original) {
                Ok(()) => {
                    event!(Level::DEBUG, type_name = %type_name, "id generation restored");
                }
                Err(err) => {
                    event!(
                        Level::ERROR,
                        type_name = %type_name,
                        error = %err,
                        "failed to restore id generation"
                    );
                    first_err.get_or_insert(err);
                }
            }
        }

        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl<M: ObjectMapper> Drop for IdGenerationOverride<'_, M> {
    fn drop(&mut self) {
        let _ = self.restore_all();
    }
}
