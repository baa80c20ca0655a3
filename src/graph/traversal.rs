//! OwnershipGraph - cycle-safe ownership traversal
//!
//! Breadth-first worklist over the edge table. Every visited record is
//! tracked by storage identity, the start record included, so cyclic
//! graphs terminate and each reachable record is reported exactly once.
//!
//! Derived edges are only followed in the owner direction: a derived record
//! depends on its source but does not carry it along when it publishes.

use std::collections::{BTreeSet, VecDeque};

use super::errors::{GraphError, GraphResult};
use super::resolver::RelationResolver;
use crate::record::{Identity, RecordKey, Stage};
use crate::schema::{EdgeOrigin, OwnershipTable};
use crate::storage::StageView;

/// How a record was reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnershipLink {
    /// The record reached.
    pub record: RecordKey,
    /// The record it was reached from.
    pub via: RecordKey,
    pub relation: String,
    pub declared_on: String,
    pub origin: EdgeOrigin,
    /// Field on the owned record that links it to the owner, if any.
    pub link_field: Option<String>,
}

#[derive(Clone, Copy)]
enum Direction {
    Owned,
    Owners,
}

pub struct OwnershipGraph<'a> {
    view: StageView<'a>,
    table: &'a OwnershipTable,
    resolver: &'a dyn RelationResolver,
}

impl<'a> OwnershipGraph<'a> {
    pub fn new(
        view: StageView<'a>,
        table: &'a OwnershipTable,
        resolver: &'a dyn RelationResolver,
    ) -> Self {
        Self {
            view,
            table,
            resolver,
        }
    }

    /// Records owned by `record` on `stage`; depth 1 unless `recursive`.
    pub fn find_owned(
        &self,
        record: &RecordKey,
        stage: Stage,
        recursive: bool,
    ) -> GraphResult<Vec<RecordKey>> {
        Ok(self
            .find_owned_links(record, stage, recursive)?
            .into_iter()
            .map(|link| link.record)
            .collect())
    }

    /// Records that own `record` on `stage`; depth 1 unless `recursive`.
    pub fn find_owners(
        &self,
        record: &RecordKey,
        stage: Stage,
        recursive: bool,
    ) -> GraphResult<Vec<RecordKey>> {
        Ok(self
            .find_owner_links(record, stage, recursive)?
            .into_iter()
            .map(|link| link.record)
            .collect())
    }

    pub fn find_owned_links(
        &self,
        record: &RecordKey,
        stage: Stage,
        recursive: bool,
    ) -> GraphResult<Vec<OwnershipLink>> {
        self.walk(record, stage, recursive, Direction::Owned)
    }

    pub fn find_owner_links(
        &self,
        record: &RecordKey,
        stage: Stage,
        recursive: bool,
    ) -> GraphResult<Vec<OwnershipLink>> {
        self.walk(record, stage, recursive, Direction::Owners)
    }

    fn walk(
        &self,
        start: &RecordKey,
        stage: Stage,
        recursive: bool,
        direction: Direction,
    ) -> GraphResult<Vec<OwnershipLink>> {
        let schema = self.view.schema();
        let mut visited: BTreeSet<Identity> = BTreeSet::new();
        visited.insert(schema.identity_of(start)?);

        let mut found = Vec::new();
        let mut queue = VecDeque::from([(start.clone(), 0usize)]);

        while let Some((current, depth)) = queue.pop_front() {
            if depth > 0 && !recursive {
                break;
            }
            let links = match direction {
                Direction::Owned => self.direct_owned(&current, stage)?,
                Direction::Owners => self.direct_owners(&current, stage)?,
            };
            for link in links {
                if visited.insert(schema.identity_of(&link.record)?) {
                    queue.push_back((link.record.clone(), depth + 1));
                    found.push(link);
                }
            }
        }

        Ok(found)
    }

    fn direct_owned(&self, record: &RecordKey, stage: Stage) -> GraphResult<Vec<OwnershipLink>> {
        let schema = self.view.schema();
        if let Some(edge) = self
            .table
            .unresolved_for(schema, record.type_name(), EdgeOrigin::Owns)
        {
            return Err(GraphError::UnresolvedRelation {
                type_name: edge.type_name.clone(),
                relation: edge.relation.clone(),
            });
        }

        let mut links = Vec::new();
        for edge in self.table.owned_edges_for(schema, record.type_name()) {
            let targets = match edge.origin {
                EdgeOrigin::Derived => continue,
                EdgeOrigin::Owns => {
                    self.resolver
                        .resolve(&self.view, record, &edge.relation, stage)?
                }
                EdgeOrigin::OwnedBy => {
                    self.resolver
                        .resolve_inverse(&self.view, record, &edge.relation, stage)?
                }
            };
            for target in targets {
                if schema.is_a(target.type_name(), &edge.owned_type) {
                    links.push(OwnershipLink {
                        record: target,
                        via: record.clone(),
                        relation: edge.relation.name.clone(),
                        declared_on: edge.relation.declared_on.clone(),
                        origin: edge.origin,
                        link_field: edge.owned_link_field().map(str::to_string),
                    });
                }
            }
        }
        Ok(links)
    }

    fn direct_owners(&self, record: &RecordKey, stage: Stage) -> GraphResult<Vec<OwnershipLink>> {
        let schema = self.view.schema();
        if let Some(edge) = self
            .table
            .unresolved_for(schema, record.type_name(), EdgeOrigin::OwnedBy)
        {
            return Err(GraphError::UnresolvedRelation {
                type_name: edge.type_name.clone(),
                relation: edge.relation.clone(),
            });
        }

        let mut links = Vec::new();
        for edge in self.table.owner_edges_for(schema, record.type_name()) {
            let owners = if edge.is_forward() {
                self.resolver
                    .resolve_inverse(&self.view, record, &edge.relation, stage)?
            } else {
                self.resolver
                    .resolve(&self.view, record, &edge.relation, stage)?
            };
            for owner in owners {
                if schema.is_a(owner.type_name(), &edge.owner_type) {
                    links.push(OwnershipLink {
                        record: owner,
                        via: record.clone(),
                        relation: edge.relation.name.clone(),
                        declared_on: edge.relation.declared_on.clone(),
                        origin: edge.origin,
                        link_field: edge.owned_link_field().map(str::to_string),
                    });
                }
            }
        }
        Ok(links)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::SchemaResolver;
    use crate::record::{Fields, RecordId};
    use crate::schema::{Schema, TypeDef};
    use crate::storage::StoreState;
    use serde_json::json;

    fn put(state: &mut StoreState, base: &str, type_name: &str, id: u64, fields: serde_json::Value) {
        let fields: Fields = serde_json::from_value(fields).unwrap();
        state.write_version(
            &Identity::new(base, RecordId::new(id)),
            type_name,
            fields,
            Stage::Draft,
            None,
        );
    }

    #[test]
    fn test_cycle_terminates() {
        let schema = Schema::from_types(vec![
            TypeDef::new("CycleA")
                .field("BID")
                .has_one("B", "CycleB", "BID")
                .owns("B"),
            TypeDef::new("CycleB")
                .field("AID")
                .has_one("A", "CycleA", "AID")
                .owns("A"),
        ])
        .unwrap();
        let table = OwnershipTable::build(&schema);
        let mut state = StoreState::new();
        put(&mut state, "CycleA", "CycleA", 1, json!({"BID": 1}));
        put(&mut state, "CycleB", "CycleB", 1, json!({"AID": 1}));

        let resolver = SchemaResolver::new();
        let graph = OwnershipGraph::new(StageView::new(&state, &schema), &table, &resolver);

        let owned = graph
            .find_owned(&RecordKey::new("CycleA", 1), Stage::Draft, true)
            .unwrap();
        assert_eq!(owned, vec![RecordKey::new("CycleB", 1)]);

        let owners = graph
            .find_owners(&RecordKey::new("CycleA", 1), Stage::Draft, true)
            .unwrap();
        assert_eq!(owners, vec![RecordKey::new("CycleB", 1)]);
    }

    #[test]
    fn test_non_recursive_stops_at_depth_one() {
        let schema = Schema::from_types(vec![
            TypeDef::new("Base")
                .has_many("Mids", "Mid", "BaseID")
                .owns("Mids"),
            TypeDef::new("Mid")
                .field("BaseID")
                .has_many("Leaves", "Leaf", "MidID")
                .owns("Leaves"),
            TypeDef::new("Leaf").field("MidID"),
        ])
        .unwrap();
        let table = OwnershipTable::build(&schema);
        let mut state = StoreState::new();
        put(&mut state, "Base", "Base", 1, json!({}));
        put(&mut state, "Mid", "Mid", 1, json!({"BaseID": 1}));
        put(&mut state, "Leaf", "Leaf", 1, json!({"MidID": 1}));

        let resolver = SchemaResolver::new();
        let graph = OwnershipGraph::new(StageView::new(&state, &schema), &table, &resolver);
        let base = RecordKey::new("Base", 1);

        assert_eq!(
            graph.find_owned(&base, Stage::Draft, false).unwrap(),
            vec![RecordKey::new("Mid", 1)]
        );
        assert_eq!(
            graph.find_owned(&base, Stage::Draft, true).unwrap(),
            vec![RecordKey::new("Mid", 1), RecordKey::new("Leaf", 1)]
        );

        let leaf = RecordKey::new("Leaf", 1);
        let direct = graph.find_owners(&leaf, Stage::Draft, false).unwrap();
        let all = graph.find_owners(&leaf, Stage::Draft, true).unwrap();
        assert_eq!(direct, vec![RecordKey::new("Mid", 1)]);
        assert!(direct.iter().all(|owner| all.contains(owner)));
        assert_eq!(all.len(), 2);

        let links = graph.find_owned_links(&base, Stage::Draft, true).unwrap();
        assert_eq!(links[1].via, RecordKey::new("Mid", 1));
        assert_eq!(links[1].link_field.as_deref(), Some("MidID"));
    }

    #[test]
    fn test_unresolved_owns_fails_traversal() {
        let schema = Schema::from_types(vec![TypeDef::new("Base").owns("Missing")]).unwrap();
        let table = OwnershipTable::build(&schema);
        let mut state = StoreState::new();
        put(&mut state, "Base", "Base", 1, json!({}));

        let resolver = SchemaResolver::new();
        let graph = OwnershipGraph::new(StageView::new(&state, &schema), &table, &resolver);
        let err = graph
            .find_owned(&RecordKey::new("Base", 1), Stage::Draft, true)
            .unwrap_err();
        assert!(matches!(err, GraphError::UnresolvedRelation { .. }));

        // The owner direction never needs the `owns` declaration.
        assert!(graph
            .find_owners(&RecordKey::new("Base", 1), Stage::Draft, true)
            .unwrap()
            .is_empty());
    }
}
