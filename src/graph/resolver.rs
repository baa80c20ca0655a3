//! Relation resolution
//!
//! The graph never reads relation keys itself. It asks a `RelationResolver`
//! which records a relation currently links, on an explicit stage. The
//! default `SchemaResolver` reads stored key fields and dispatches custom
//! relations to registered accessors.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::errors::{GraphError, GraphResult};
use crate::record::{field_as_id, field_as_ids, RecordKey, Stage};
use crate::schema::{RelationDef, RelationKind};
use crate::storage::StageView;

/// Computes a custom relation's targets for one record on one stage.
pub type Accessor = Arc<dyn Fn(&StageView<'_>, &RecordKey, Stage) -> Vec<RecordKey> + Send + Sync>;

pub trait RelationResolver: Send + Sync {
    /// Records that `record` links to through `relation` on `stage`.
    fn resolve(
        &self,
        view: &StageView<'_>,
        record: &RecordKey,
        relation: &RelationDef,
        stage: Stage,
    ) -> GraphResult<Vec<RecordKey>>;

    /// Records on `stage` that link to `target` through `relation`.
    fn resolve_inverse(
        &self,
        view: &StageView<'_>,
        target: &RecordKey,
        relation: &RelationDef,
        stage: Stage,
    ) -> GraphResult<Vec<RecordKey>>;
}

/// Resolves stored relations from key fields and custom ones by accessor.
#[derive(Clone, Default)]
pub struct SchemaResolver {
    accessors: BTreeMap<(String, String), Accessor>,
}

impl SchemaResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the accessor for custom relation `relation` declared on
    /// `type_name`.
    pub fn with_accessor<F>(mut self, type_name: &str, relation: &str, accessor: F) -> Self
    where
        F: Fn(&StageView<'_>, &RecordKey, Stage) -> Vec<RecordKey> + Send + Sync + 'static,
    {
        self.register(type_name, relation, accessor);
        self
    }

    pub fn register<F>(&mut self, type_name: &str, relation: &str, accessor: F)
    where
        F: Fn(&StageView<'_>, &RecordKey, Stage) -> Vec<RecordKey> + Send + Sync + 'static,
    {
        self.accessors.insert(
            (type_name.to_string(), relation.to_string()),
            Arc::new(accessor),
        );
    }

    fn accessor(&self, relation: &RelationDef) -> GraphResult<&Accessor> {
        self.accessors
            .get(&(relation.declared_on.clone(), relation.name.clone()))
            .ok_or_else(|| GraphError::MissingAccessor {
                type_name: relation.declared_on.clone(),
                relation: relation.name.clone(),
            })
    }
}

impl RelationResolver for SchemaResolver {
    fn resolve(
        &self,
        view: &StageView<'_>,
        record: &RecordKey,
        relation: &RelationDef,
        stage: Stage,
    ) -> GraphResult<Vec<RecordKey>> {
        if let RelationKind::Custom = relation.kind {
            let accessor = self.accessor(relation)?;
            return Ok((**accessor)(view, record, stage));
        }

        let Some(fields) = view.snapshot(record, stage) else {
            return Ok(Vec::new());
        };

        let keys = match &relation.kind {
            RelationKind::HasOne { field } => field_as_id(fields, field)
                .and_then(|id| view.key_for(&relation.target, id, stage))
                .into_iter()
                .collect(),
            RelationKind::HasMany { foreign_key } => view
                .records_of(&relation.target, stage)
                .into_iter()
                .filter(|(_, target)| field_as_id(target, foreign_key) == Some(record.id()))
                .map(|(key, _)| key)
                .collect(),
            RelationKind::ManyMany { ids_field } => field_as_ids(fields, ids_field)
                .into_iter()
                .filter_map(|id| view.key_for(&relation.target, id, stage))
                .collect(),
            RelationKind::Custom => Vec::new(),
        };
        Ok(keys)
    }

    fn resolve_inverse(
        &self,
        view: &StageView<'_>,
        target: &RecordKey,
        relation: &RelationDef,
        stage: Stage,
    ) -> GraphResult<Vec<RecordKey>> {
        match &relation.kind {
            RelationKind::HasOne { field } => Ok(view
                .records_of(&relation.declared_on, stage)
                .into_iter()
                .filter(|(_, fields)| field_as_id(fields, field) == Some(target.id()))
                .map(|(key, _)| key)
                .collect()),
            RelationKind::HasMany { foreign_key } => Ok(view
                .snapshot(target, stage)
                .and_then(|fields| field_as_id(fields, foreign_key))
                .and_then(|id| view.key_for(&relation.declared_on, id, stage))
                .into_iter()
                .collect()),
            RelationKind::ManyMany { ids_field } => Ok(view
                .records_of(&relation.declared_on, stage)
                .into_iter()
                .filter(|(_, fields)| field_as_ids(fields, ids_field).contains(&target.id()))
                .map(|(key, _)| key)
                .collect()),
            RelationKind::Custom => {
                let accessor = self.accessor(relation)?;
                let schema = view.schema();
                let Ok(wanted) = schema.identity_of(target) else {
                    return Ok(Vec::new());
                };
                Ok(view
                    .records_of(&relation.declared_on, stage)
                    .into_iter()
                    .map(|(key, _)| key)
                    .filter(|candidate| {
                        (**accessor)(view, candidate, stage).iter().any(|linked| {
                            schema
                                .identity_of(linked)
                                .map_or(false, |identity| identity == wanted)
                        })
                    })
                    .collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Fields, Identity, RecordId};
    use crate::schema::{Schema, TypeDef};
    use crate::storage::StoreState;
    use serde_json::json;

    fn schema() -> Schema {
        Schema::from_types(vec![
            TypeDef::new("Gallery")
                .field("Title")
                .field("CoverID")
                .field("TagIDs")
                .has_one("Cover", "Image", "CoverID")
                .has_many("Images", "Image", "GalleryID")
                .many_many("Tags", "Tag", "TagIDs")
                .custom("Siblings", "Gallery"),
            TypeDef::new("Image").field("GalleryID"),
            TypeDef::new("Tag").field("Title"),
        ])
        .unwrap()
    }

    fn put(state: &mut StoreState, type_name: &str, id: u64, fields: serde_json::Value) {
        let fields: Fields = serde_json::from_value(fields).unwrap();
        state.write_version(
            &Identity::new(type_name, RecordId::new(id)),
            type_name,
            fields,
            Stage::Draft,
            None,
        );
    }

    fn fixture() -> (Schema, StoreState) {
        let mut state = StoreState::new();
        put(&mut state, "Gallery", 1, json!({"CoverID": 10, "TagIDs": [5, 6, 99]}));
        put(&mut state, "Image", 10, json!({"GalleryID": 1}));
        put(&mut state, "Image", 11, json!({"GalleryID": 1}));
        put(&mut state, "Image", 12, json!({"GalleryID": 2}));
        put(&mut state, "Tag", 5, json!({}));
        put(&mut state, "Tag", 6, json!({}));
        (schema(), state)
    }

    #[test]
    fn test_stored_relations() {
        let (schema, state) = fixture();
        let view = StageView::new(&state, &schema);
        let resolver = SchemaResolver::new();
        let gallery = RecordKey::new("Gallery", 1);

        let cover = schema.relation("Gallery", "Cover").unwrap();
        assert_eq!(
            resolver.resolve(&view, &gallery, &cover, Stage::Draft).unwrap(),
            vec![RecordKey::new("Image", 10)]
        );

        let images = schema.relation("Gallery", "Images").unwrap();
        assert_eq!(
            resolver.resolve(&view, &gallery, &images, Stage::Draft).unwrap(),
            vec![RecordKey::new("Image", 10), RecordKey::new("Image", 11)]
        );

        // Tag 99 does not exist and is skipped.
        let tags = schema.relation("Gallery", "Tags").unwrap();
        assert_eq!(
            resolver.resolve(&view, &gallery, &tags, Stage::Draft).unwrap(),
            vec![RecordKey::new("Tag", 5), RecordKey::new("Tag", 6)]
        );

        // Nothing is live yet.
        assert!(resolver
            .resolve(&view, &gallery, &images, Stage::Live)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_inverse_relations() {
        let (schema, state) = fixture();
        let view = StageView::new(&state, &schema);
        let resolver = SchemaResolver::new();
        let gallery = vec![RecordKey::new("Gallery", 1)];

        let images = schema.relation("Gallery", "Images").unwrap();
        assert_eq!(
            resolver
                .resolve_inverse(&view, &RecordKey::new("Image", 11), &images, Stage::Draft)
                .unwrap(),
            gallery
        );

        let tags = schema.relation("Gallery", "Tags").unwrap();
        assert_eq!(
            resolver
                .resolve_inverse(&view, &RecordKey::new("Tag", 6), &tags, Stage::Draft)
                .unwrap(),
            gallery
        );

        let cover = schema.relation("Gallery", "Cover").unwrap();
        assert!(resolver
            .resolve_inverse(&view, &RecordKey::new("Image", 11), &cover, Stage::Draft)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_custom_relation_requires_accessor() {
        let (schema, state) = fixture();
        let view = StageView::new(&state, &schema);
        let siblings = schema.relation("Gallery", "Siblings").unwrap();
        let gallery = RecordKey::new("Gallery", 1);

        let err = SchemaResolver::new()
            .resolve(&view, &gallery, &siblings, Stage::Draft)
            .unwrap_err();
        assert!(matches!(err, GraphError::MissingAccessor { .. }));

        let resolver = SchemaResolver::new().with_accessor("Gallery", "Siblings", |_, record, _| {
            vec![RecordKey::new("Gallery", record.id().value() + 1)]
        });
        assert_eq!(
            resolver.resolve(&view, &gallery, &siblings, Stage::Draft).unwrap(),
            vec![RecordKey::new("Gallery", 2)]
        );
    }

    #[test]
    fn test_custom_inverse_matches_identity_not_id() {
        let (schema, state) = fixture();
        let view = StageView::new(&state, &schema);
        let siblings = schema.relation("Gallery", "Siblings").unwrap();
        let target = RecordKey::new("Gallery", 2);

        // Same id in another hierarchy
        let stray = SchemaResolver::new().with_accessor("Gallery", "Siblings", |_, _, _| {
            vec![RecordKey::new("Image", 2)]
        });
        assert!(stray
            .resolve_inverse(&view, &target, &siblings, Stage::Draft)
            .unwrap()
            .is_empty());

        let linked = SchemaResolver::new().with_accessor("Gallery", "Siblings", |_, _, _| {
            vec![RecordKey::new("Gallery", 2)]
        });
        assert_eq!(
            linked
                .resolve_inverse(&view, &target, &siblings, Stage::Draft)
                .unwrap(),
            vec![RecordKey::new("Gallery", 1)]
        );
    }
}
