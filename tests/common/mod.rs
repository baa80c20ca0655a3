//! Shared fixtures for integration tests
//!
//! Ownership in the fixture schema:
//!
//! ```text
//! Base --owns Mids--> Mid
//! Subclass (extends Base) --owns Related--> Related --owns Attachments--> Attachment
//! Banner --owned_by Owner--> Subclass
//! VirtualPage (extends Page) --derived from CopyContentFrom--> Page
//! CycleA <--owns--> CycleB
//! Twin --owns Twins (custom, same Title)--> Twin
//! Broken --owns Nothing (undeclared)
//! ```

#![allow(dead_code)]

use serde_json::Value;
use stagegraph::graph::SchemaResolver;
use stagegraph::{Actor, Engine, Fields, RecordKey, Schema, Stage, TypeDef};

pub fn schema() -> Schema {
    Schema::from_types(vec![
        TypeDef::new("Base")
            .field("Title")
            .has_many("Mids", "Mid", "BaseID")
            .owns("Mids"),
        TypeDef::new("Mid").field("Title").field("BaseID"),
        TypeDef::new("Subclass")
            .extends("Base")
            .field("RelatedID")
            .has_one("Related", "Related", "RelatedID")
            .owns("Related"),
        TypeDef::new("Related")
            .field("Title")
            .has_many("Attachments", "Attachment", "ParentID")
            .owns("Attachments"),
        TypeDef::new("Attachment").field("Title").field("ParentID"),
        TypeDef::new("Banner")
            .field("Title")
            .field("OwnerID")
            .has_one("Owner", "Subclass", "OwnerID")
            .owned_by("Owner"),
        TypeDef::new("Page").field("Title").field("Content"),
        TypeDef::new("VirtualPage")
            .extends("Page")
            .field("CopyContentFromID")
            .has_one("CopyContentFrom", "Page", "CopyContentFromID")
            .derived_from("CopyContentFrom", ["Content"]),
        TypeDef::new("CycleA")
            .field("Title")
            .field("BID")
            .has_one("B", "CycleB", "BID")
            .owns("B"),
        TypeDef::new("CycleB")
            .field("Title")
            .field("AID")
            .has_one("A", "CycleA", "AID")
            .owns("A"),
        TypeDef::new("Twin")
            .field("Title")
            .custom("Twins", "Twin")
            .owns("Twins"),
        TypeDef::new("Broken").field("Title").owns("Nothing"),
    ])
    .expect("fixture schema is valid")
}

/// Twins of a record are the other twins sharing its title.
pub fn resolver() -> SchemaResolver {
    SchemaResolver::new().with_accessor("Twin", "Twins", |view, record, stage| {
        let title = view
            .snapshot(record, stage)
            .and_then(|fields| fields.get("Title"))
            .cloned();
        view.records_of("Twin", stage)
            .into_iter()
            .filter(|(key, fields)| key != record && fields.get("Title") == title.as_ref())
            .map(|(key, _)| key)
            .collect()
    })
}

pub fn engine() -> Engine {
    Engine::new(schema()).with_resolver(resolver())
}

pub fn admin() -> Actor {
    Actor::service_role()
}

pub fn fields(pairs: &[(&str, Value)]) -> Fields {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
}

pub fn create(engine: &mut Engine, type_name: &str, pairs: &[(&str, Value)]) -> RecordKey {
    engine
        .create(&admin(), type_name, fields(pairs))
        .expect("create succeeds")
}

pub fn write(engine: &mut Engine, key: &RecordKey, pairs: &[(&str, Value)]) {
    engine
        .write(&admin(), key, fields(pairs))
        .expect("write succeeds");
}

pub fn id(key: &RecordKey) -> Value {
    Value::from(key.id().value())
}

pub fn field(engine: &Engine, key: &RecordKey, stage: Stage, name: &str) -> Option<Value> {
    engine
        .snapshot(key, stage)
        .and_then(|fields| fields.get(name))
        .cloned()
}

/// A Base with three owned Mids, all on draft only.
pub fn base_with_mids(engine: &mut Engine) -> (RecordKey, Vec<RecordKey>) {
    let base = create(engine, "Base", &[("Title", "Base".into())]);
    let mids = (1..=3)
        .map(|n| {
            create(
                engine,
                "Mid",
                &[("Title", format!("Mid {}", n).into()), ("BaseID", id(&base))],
            )
        })
        .collect();
    (base, mids)
}

/// Subclass owning a Related with one Attachment, plus a Banner owned by the
/// Subclass. Everything on draft only.
pub struct OwnershipTree {
    pub subclass: RecordKey,
    pub related: RecordKey,
    pub attachment: RecordKey,
    pub banner: RecordKey,
}

pub fn ownership_tree(engine: &mut Engine) -> OwnershipTree {
    let related = create(engine, "Related", &[("Title", "Related".into())]);
    let attachment = create(
        engine,
        "Attachment",
        &[("Title", "File".into()), ("ParentID", id(&related))],
    );
    let subclass = create(
        engine,
        "Subclass",
        &[("Title", "Subclass".into()), ("RelatedID", id(&related))],
    );
    let banner = create(
        engine,
        "Banner",
        &[("Title", "Banner".into()), ("OwnerID", id(&subclass))],
    );
    OwnershipTree {
        subclass,
        related,
        attachment,
        banner,
    }
}
