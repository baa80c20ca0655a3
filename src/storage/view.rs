//! Read-only view of committed state, handed to relation resolvers

use super::state::StoreState;
use crate::record::{Fields, Identity, RecordId, RecordKey, Stage};
use crate::schema::Schema;

/// Reads records on a given stage. Keys are returned with the concrete type
/// of the version bound on that stage.
#[derive(Clone, Copy)]
pub struct StageView<'a> {
    state: &'a StoreState,
    schema: &'a Schema,
}

impl<'a> StageView<'a> {
    pub fn new(state: &'a StoreState, schema: &'a Schema) -> Self {
        Self { state, schema }
    }

    pub fn schema(&self) -> &'a Schema {
        self.schema
    }

    pub fn state(&self) -> &'a StoreState {
        self.state
    }

    fn identity(&self, key: &RecordKey) -> Option<Identity> {
        self.schema.identity_of(key).ok()
    }

    /// Fields of `key` on `stage`, if it exists there.
    pub fn snapshot(&self, key: &RecordKey, stage: Stage) -> Option<&'a Fields> {
        self.state.snapshot(&self.identity(key)?, stage)
    }

    pub fn exists(&self, key: &RecordKey, stage: Stage) -> bool {
        self.identity(key)
            .map_or(false, |identity| self.state.exists(&identity, stage))
    }

    /// Concrete key of the record `id` in `target_type`'s id space, if it
    /// exists on `stage` and is a `target_type`.
    pub fn key_for(&self, target_type: &str, id: RecordId, stage: Stage) -> Option<RecordKey> {
        let base = self.schema.base_of(target_type).ok()?;
        let key = self.key_of(&Identity::new(base, id), stage)?;
        self.schema
            .is_a(key.type_name(), target_type)
            .then_some(key)
    }

    /// Concrete key of an identity on `stage`.
    pub fn key_of(&self, identity: &Identity, stage: Stage) -> Option<RecordKey> {
        let version = self.state.version_on(identity, stage)?;
        Some(RecordKey::with_id(version.type_name(), identity.id()))
    }

    /// Every record on `stage` that is a `type_name`, in id order.
    pub fn records_of(&self, type_name: &str, stage: Stage) -> Vec<(RecordKey, &'a Fields)> {
        let Ok(base) = self.schema.base_of(type_name) else {
            return Vec::new();
        };
        self.state
            .stages()
            .identities_of_base(base, stage)
            .filter_map(|identity| {
                let version = self.state.version_on(identity, stage)?;
                self.schema
                    .is_a(version.type_name(), type_name)
                    .then(|| (RecordKey::with_id(version.type_name(), identity.id()), version.fields()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TypeDef;
    use serde_json::json;

    fn schema() -> Schema {
        Schema::from_types(vec![
            TypeDef::new("Page").field("Title"),
            TypeDef::new("RedirectorPage").extends("Page").field("Url"),
            TypeDef::new("File").field("Name"),
        ])
        .unwrap()
    }

    #[test]
    fn test_key_for_respects_type() {
        let schema = schema();
        let mut state = StoreState::new();
        let identity = Identity::new("Page", RecordId::new(1));
        state.write_version(&identity, "RedirectorPage", Fields::new(), Stage::Draft, None);

        let view = StageView::new(&state, &schema);
        assert_eq!(
            view.key_for("Page", RecordId::new(1), Stage::Draft),
            Some(RecordKey::new("RedirectorPage", 1))
        );
        assert_eq!(view.key_for("Page", RecordId::new(1), Stage::Live), None);
        assert_eq!(view.key_for("File", RecordId::new(1), Stage::Draft), None);
    }

    #[test]
    fn test_records_of_filters_subtypes() {
        let schema = schema();
        let mut state = StoreState::new();
        let mut titled = Fields::new();
        titled.insert("Title".into(), json!("x"));
        state.write_version(&Identity::new("Page", RecordId::new(1)), "Page", titled.clone(), Stage::Draft, None);
        state.write_version(&Identity::new("Page", RecordId::new(2)), "RedirectorPage", titled, Stage::Draft, None);

        let view = StageView::new(&state, &schema);
        assert_eq!(view.records_of("Page", Stage::Draft).len(), 2);
        let redirectors = view.records_of("RedirectorPage", Stage::Draft);
        assert_eq!(redirectors.len(), 1);
        assert_eq!(redirectors[0].0, RecordKey::new("RedirectorPage", 2));
        assert!(view.records_of("Page", Stage::Live).is_empty());
    }

    #[test]
    fn test_snapshot_through_subtype_key() {
        let schema = schema();
        let mut state = StoreState::new();
        state.write_version(&Identity::new("Page", RecordId::new(3)), "Page", Fields::new(), Stage::Draft, None);

        let view = StageView::new(&state, &schema);
        assert!(view.snapshot(&RecordKey::new("Page", 3), Stage::Draft).is_some());
        assert!(view.exists(&RecordKey::new("RedirectorPage", 3), Stage::Draft));
    }
}
