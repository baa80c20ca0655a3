//! Derived records
//!
//! A derived type mirrors a set of fields from the record its `has_one`
//! source relation points at. Rules:
//!
//! - Draft writes of a derived record copy the mirrored fields from the
//!   source's draft; draft writes of a source refresh its derived records
//! - A derived record cannot publish while its source is not on LIVE
//! - Publishing a source refreshes its live derived records
//! - A source leaving LIVE takes its derived records off LIVE with it

use std::collections::{BTreeSet, VecDeque};

use uuid::Uuid;

use super::core::Engine;
use super::errors::{EngineError, EngineResult};
use crate::observability::{log_event, Event};
use crate::record::{field_as_id, Fields, Identity, RecordKey, Stage};
use crate::schema::{EdgeOrigin, RelationKind};
use crate::version::VersionNumber;

impl Engine {
    /// Storage identity of the source named by a derived record's fields.
    fn source_identity(&self, type_name: &str, fields: &Fields) -> Option<Identity> {
        let (_, relation) = self.schema.derived_of(type_name)?;
        let RelationKind::HasOne { field } = &relation.kind else {
            return None;
        };
        let id = field_as_id(fields, field)?;
        let base = self.schema.base_of(&relation.target).ok()?;
        Some(Identity::new(base, id))
    }

    /// The source a derived record points at on DRAFT, if it has one.
    pub fn source_of(&self, key: &RecordKey) -> Option<RecordKey> {
        let fields = self.snapshot(key, Stage::Draft)?;
        let identity = self.source_identity(key.type_name(), fields)?;
        self.view()
            .key_of(&identity, Stage::Draft)
            .or_else(|| self.view().key_of(&identity, Stage::Live))
    }

    /// True when `key` is on DRAFT and, for a derived record, its source is
    /// on LIVE.
    pub fn can_publish(&self, key: &RecordKey) -> bool {
        let Ok((key, identity)) = self.resolve(key) else {
            return false;
        };
        let Some(fields) = self.state.snapshot(&identity, Stage::Draft) else {
            return false;
        };
        if !self.schema.is_derived(key.type_name()) {
            return true;
        }
        self.source_identity(key.type_name(), fields)
            .map_or(false, |source| self.state.exists(&source, Stage::Live))
    }

    pub(crate) fn ensure_publishable(&self, key: &RecordKey) -> EngineResult<()> {
        if !self.is_on_draft(key) {
            return Err(EngineError::NotOnDraft(key.clone()));
        }
        if !self.can_publish(key) {
            return Err(EngineError::SourceNotPublished(key.clone()));
        }
        Ok(())
    }

    /// Copies mirrored fields from the source's `stage` snapshot into
    /// `fields`. Returns true when anything changed.
    pub(crate) fn mirror_source(&self, type_name: &str, fields: &mut Fields, stage: Stage) -> bool {
        if !self.config.sync_derived_records {
            return false;
        }
        let Some((derived, _)) = self.schema.derived_of(type_name) else {
            return false;
        };
        let Some(source) = self
            .source_identity(type_name, fields)
            .and_then(|identity| self.state.snapshot(&identity, stage))
        else {
            return false;
        };

        let mut changed = false;
        for field in &derived.mirrored_fields {
            if let Some(value) = source.get(field) {
                if fields.get(field) != Some(value) {
                    fields.insert(field.clone(), value.clone());
                    changed = true;
                }
            }
        }
        changed
    }

    /// Derived records on `stage` whose source is `key`. Only derived edges
    /// are resolved, so other relations never need to resolve here.
    pub(crate) fn dependents_of(&self, key: &RecordKey, stage: Stage) -> EngineResult<Vec<RecordKey>> {
        let view = self.view();
        let mut dependents = Vec::new();
        for edge in self.ownership.owner_edges_for(&self.schema, key.type_name()) {
            if edge.origin != EdgeOrigin::Derived {
                continue;
            }
            for owner in self.resolver.resolve_inverse(&view, key, &edge.relation, stage)? {
                if self.schema.is_a(owner.type_name(), &edge.owner_type) && !dependents.contains(&owner) {
                    dependents.push(owner);
                }
            }
        }
        Ok(dependents)
    }

    /// Rewrites mirrored fields of `source`'s derived records on `stage`.
    pub(crate) fn refresh_dependents(
        &mut self,
        source: &RecordKey,
        stage: Stage,
        author: Option<Uuid>,
    ) -> EngineResult<Vec<RecordKey>> {
        if !self.config.sync_derived_records {
            return Ok(Vec::new());
        }

        let mut refreshed = Vec::new();
        for dependent in self.dependents_of(source, stage)? {
            let identity = self.schema.identity_of(&dependent)?;
            let Some(mut fields) = self.state.snapshot(&identity, stage).cloned() else {
                continue;
            };
            if !self.mirror_source(dependent.type_name(), &mut fields, stage) {
                continue;
            }

            let draft = self
                .state
                .version_on(&identity, Stage::Draft)
                .filter(|draft| stage == Stage::Live && draft.fields() == &fields)
                .map(|draft| draft.number());
            let version = match draft {
                Some(number) => {
                    self.state.bind(&identity, Stage::Live, number)?;
                    number
                }
                None => {
                    self.metrics.increment_version_writes();
                    self.state
                        .write_version(&identity, dependent.type_name(), fields, stage, author)
                }
            };
            log_event(
                Event::DerivedRefreshed,
                &[
                    ("record", &dependent.to_string()),
                    ("source", &source.to_string()),
                    ("stage", stage.as_str()),
                    ("version", &version.to_string()),
                ],
            );
            refreshed.push(dependent);
        }
        Ok(refreshed)
    }

    /// Unbinds `key` from LIVE together with every derived record that
    /// depends on it, transitively. Returns every record removed with the
    /// version it had on LIVE.
    pub(crate) fn remove_from_live(
        &mut self,
        key: &RecordKey,
    ) -> EngineResult<Vec<(RecordKey, VersionNumber)>> {
        let mut removed = Vec::new();
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::from([key.clone()]);

        while let Some(current) = queue.pop_front() {
            let identity = self.schema.identity_of(&current)?;
            if !seen.insert(identity.clone()) {
                continue;
            }
            // Resolve dependents before the source leaves LIVE.
            let dependents = self.dependents_of(&current, Stage::Live)?;
            let Some(previous) = self.state.unbind(&identity, Stage::Live) else {
                continue;
            };
            self.metrics.increment_live_removals();
            log_event(
                Event::RecordRemovedFromLive,
                &[("record", &current.to_string()), ("trigger", &key.to_string())],
            );
            removed.push((current, previous));
            queue.extend(dependents);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authority::Actor;
    use crate::schema::{Schema, TypeDef};
    use serde_json::json;

    fn engine() -> Engine {
        Engine::new(
            Schema::from_types(vec![
                TypeDef::new("Page").field("Title").field("Content"),
                TypeDef::new("VirtualPage")
                    .extends("Page")
                    .field("CopyContentFromID")
                    .has_one("CopyContentFrom", "Page", "CopyContentFromID")
                    .derived_from("CopyContentFrom", ["Content"]),
            ])
            .unwrap(),
        )
    }

    fn fields(pairs: &[(&str, serde_json::Value)]) -> Fields {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_derived_copies_source_on_create() {
        let mut engine = engine();
        let actor = Actor::service_role();
        let source = engine
            .create(&actor, "Page", fields(&[("Title", json!("Src")), ("Content", json!("Body"))]))
            .unwrap();
        let virtual_page = engine
            .create(
                &actor,
                "VirtualPage",
                fields(&[
                    ("Title", json!("Mine")),
                    ("CopyContentFromID", json!(source.id().value())),
                ]),
            )
            .unwrap();

        let draft = engine.snapshot(&virtual_page, Stage::Draft).unwrap();
        assert_eq!(draft["Content"], json!("Body"));
        // Only mirrored fields are copied
        assert_eq!(draft["Title"], json!("Mine"));
        assert_eq!(engine.source_of(&virtual_page), Some(source));
    }

    #[test]
    fn test_source_write_refreshes_draft_dependents() {
        let mut engine = engine();
        let actor = Actor::service_role();
        let source = engine
            .create(&actor, "Page", fields(&[("Content", json!("v1"))]))
            .unwrap();
        let virtual_page = engine
            .create(
                &actor,
                "VirtualPage",
                fields(&[("CopyContentFromID", json!(source.id().value()))]),
            )
            .unwrap();

        engine
            .write(&actor, &source, fields(&[("Content", json!("v2"))]))
            .unwrap();
        assert_eq!(
            engine.snapshot(&virtual_page, Stage::Draft).unwrap()["Content"],
            json!("v2")
        );
    }

    #[test]
    fn test_cannot_publish_without_live_source() {
        let mut engine = engine();
        let actor = Actor::service_role();
        let source = engine.create(&actor, "Page", Fields::new()).unwrap();
        let virtual_page = engine
            .create(
                &actor,
                "VirtualPage",
                fields(&[("CopyContentFromID", json!(source.id().value()))]),
            )
            .unwrap();
        let orphan = engine.create(&actor, "VirtualPage", Fields::new()).unwrap();

        assert!(engine.can_publish(&source));
        assert!(!engine.can_publish(&virtual_page));
        assert!(!engine.can_publish(&orphan));
        assert!(matches!(
            engine.ensure_publishable(&virtual_page),
            Err(EngineError::SourceNotPublished(_))
        ));
    }
}
