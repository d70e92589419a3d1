#![allow(dead_code)]

use rustmemodb_fixtures::{
    EntityMapping, FixtureEntity, IdGenerationDescriptor, Identifier, InMemoryMapper,
};
use serde_json::json;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dummy {
    pub id: Option<i64>,
}

impl FixtureEntity for Dummy {
    fn type_name(&self) -> &'static str {
        "Dummy"
    }

    fn identifier(&self) -> Option<Identifier> {
        self.id.map(Identifier::Integer)
    }

    fn assign_identifier(&mut self, id: Identifier) {
        self.id = id.as_i64();
    }

    fn fields(&self) -> serde_json::Value {
        json!({})
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DummyWithIdentifier {
    pub id: Option<i64>,
}

impl DummyWithIdentifier {
    pub fn with_id(id: i64) -> Self {
        Self { id: Some(id) }
    }
}

impl FixtureEntity for DummyWithIdentifier {
    fn type_name(&self) -> &'static str {
        "DummyWithIdentifier"
    }

    fn identifier(&self) -> Option<Identifier> {
        self.id.map(Identifier::Integer)
    }

    fn assign_identifier(&mut self, id: Identifier) {
        self.id = id.as_i64();
    }

    fn fields(&self) -> serde_json::Value {
        json!({})
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DummyEmbeddable {
    pub street: Option<String>,
}

impl FixtureEntity for DummyEmbeddable {
    fn type_name(&self) -> &'static str {
        "DummyEmbeddable"
    }

    fn identifier(&self) -> Option<Identifier> {
        None
    }

    fn assign_identifier(&mut self, _id: Identifier) {}

    fn fields(&self) -> serde_json::Value {
        json!({ "street": self.street })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DummyWithEmbeddable {
    pub id: Option<i64>,
    pub embeddable: DummyEmbeddable,
}

impl FixtureEntity for DummyWithEmbeddable {
    fn type_name(&self) -> &'static str {
        "DummyWithEmbeddable"
    }

    fn identifier(&self) -> Option<Identifier> {
        self.id.map(Identifier::Integer)
    }

    fn assign_identifier(&mut self, id: Identifier) {
        self.id = id.as_i64();
    }

    fn fields(&self) -> serde_json::Value {
        json!({ "embeddable": self.embeddable.fields() })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappedSuperclassDummy {
    pub status: Option<i64>,
}

impl FixtureEntity for MappedSuperclassDummy {
    fn type_name(&self) -> &'static str {
        "MappedSuperclassDummy"
    }

    fn identifier(&self) -> Option<Identifier> {
        None
    }

    fn assign_identifier(&mut self, _id: Identifier) {}

    fn fields(&self) -> serde_json::Value {
        json!({ "status": self.status })
    }
}

/// Concrete entity inheriting the fields of `MappedSuperclassDummy`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DummySubClass {
    pub id: Option<i64>,
    pub parent: MappedSuperclassDummy,
}

impl FixtureEntity for DummySubClass {
    fn type_name(&self) -> &'static str {
        "DummySubClass"
    }

    fn identifier(&self) -> Option<Identifier> {
        self.id.map(Identifier::Integer)
    }

    fn assign_identifier(&mut self, id: Identifier) {
        self.id = id.as_i64();
    }

    fn fields(&self) -> serde_json::Value {
        json!({ "status": self.parent.status })
    }
}

/// Entity keyed by a natural text key; never store-generated in practice.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Country {
    pub code: String,
    pub name: String,
}

impl FixtureEntity for Country {
    fn type_name(&self) -> &'static str {
        "Country"
    }

    fn identifier(&self) -> Option<Identifier> {
        Some(Identifier::Text(self.code.clone()))
    }

    fn assign_identifier(&mut self, id: Identifier) {
        if let Identifier::Text(code) = id {
            self.code = code;
        }
    }

    fn fields(&self) -> serde_json::Value {
        json!({ "name": self.name })
    }
}

pub fn mapper() -> InMemoryMapper {
    InMemoryMapper::with_mappings([
        EntityMapping::entity("Dummy"),
        EntityMapping::entity("DummyWithIdentifier"),
        EntityMapping::embeddable("DummyEmbeddable"),
        EntityMapping::entity("DummyWithEmbeddable"),
        EntityMapping::mapped_superclass("MappedSuperclassDummy"),
        EntityMapping::entity("DummySubClass"),
        EntityMapping::entity("Country")
            .id_generation(IdGenerationDescriptor::ApplicationAssigned),
    ])
    .unwrap()
}
