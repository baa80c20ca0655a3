//! Ownership edge table
//!
//! Built once from a validated schema. Every `owns` declaration yields a
//! forward edge, every `owned_by` declaration yields the same edge seen from
//! the owned side, and every `derived` type owns its source. Both indexes
//! (by owner type and by owned type) are filled from each declaration, so a
//! one-sided declaration is enough to traverse in either direction.
//!
//! When the same link is declared from both sides (a `has_many` owned by the
//! parent and the matching `has_one` marked `owned_by` on the child), the
//! owner-side declaration wins and only one edge is kept.

use std::collections::BTreeMap;

use super::registry::Schema;
use super::types::{KeySide, RelationDef};

/// Where an edge came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EdgeOrigin {
    /// `owns` on the owner type.
    Owns,
    /// `owned_by` on the owned type.
    OwnedBy,
    /// Derived type owning its source.
    Derived,
}

impl EdgeOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeOrigin::Owns => "owns",
            EdgeOrigin::OwnedBy => "owned_by",
            EdgeOrigin::Derived => "derived",
        }
    }
}

/// A directed owner -> owned edge.
///
/// `relation` is declared on `relation.declared_on`. For `Owns` and
/// `Derived` edges that is the owner; for `OwnedBy` it is the owned type and
/// the relation points at the owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnershipEdge {
    pub owner_type: String,
    pub owned_type: String,
    pub relation: RelationDef,
    pub origin: EdgeOrigin,
}

impl OwnershipEdge {
    /// True when the relation is declared on the owner side.
    pub fn is_forward(&self) -> bool {
        self.origin != EdgeOrigin::OwnedBy
    }

    /// The field on the owned record that links it to its owner, if there is
    /// one. Clearing it detaches the owned record.
    pub fn owned_link_field(&self) -> Option<&str> {
        let (field, side) = self.relation.key_field()?;
        match (self.is_forward(), side) {
            (true, KeySide::Target) | (false, KeySide::Declaring) => Some(field),
            _ => None,
        }
    }
}

/// An `owns` / `owned_by` name that does not match any relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedEdge {
    pub type_name: String,
    pub relation: String,
    pub origin: EdgeOrigin,
}

/// Bidirectional ownership edge index.
#[derive(Debug, Clone, Default)]
pub struct OwnershipTable {
    edges: Vec<OwnershipEdge>,
    by_owner: BTreeMap<String, Vec<usize>>,
    by_owned: BTreeMap<String, Vec<usize>>,
    unresolved: Vec<UnresolvedEdge>,
}

impl OwnershipTable {
    pub fn build(schema: &Schema) -> Self {
        let mut table = Self::default();

        for name in schema.type_names() {
            let Ok(def) = schema.get(name) else { continue };

            for relation in &def.owns {
                match schema.relation(name, relation) {
                    Some(rel) => table.insert(OwnershipEdge {
                        owner_type: name.to_string(),
                        owned_type: rel.target.clone(),
                        relation: rel,
                        origin: EdgeOrigin::Owns,
                    }),
                    None => table.unresolved.push(UnresolvedEdge {
                        type_name: name.to_string(),
                        relation: relation.clone(),
                        origin: EdgeOrigin::Owns,
                    }),
                }
            }

            if def.derived.is_some() {
                if let Some((_, source)) = schema.derived_of(name) {
                    table.insert(OwnershipEdge {
                        owner_type: name.to_string(),
                        owned_type: source.target.clone(),
                        relation: source,
                        origin: EdgeOrigin::Derived,
                    });
                }
            }
        }

        // Second pass so owner-side declarations are already present.
        for name in schema.type_names() {
            let Ok(def) = schema.get(name) else { continue };
            for relation in &def.owned_by {
                match schema.relation(name, relation) {
                    Some(rel) => table.insert(OwnershipEdge {
                        owner_type: rel.target.clone(),
                        owned_type: name.to_string(),
                        relation: rel,
                        origin: EdgeOrigin::OwnedBy,
                    }),
                    None => table.unresolved.push(UnresolvedEdge {
                        type_name: name.to_string(),
                        relation: relation.clone(),
                        origin: EdgeOrigin::OwnedBy,
                    }),
                }
            }
        }

        table
    }

    fn insert(&mut self, edge: OwnershipEdge) {
        let duplicate = self.edges.iter().any(|existing| {
            let same_relation = existing.relation.name == edge.relation.name
                && existing.relation.declared_on == edge.relation.declared_on;
            let same_link = existing.owner_type == edge.owner_type
                && existing.owned_type == edge.owned_type
                && existing.owned_link_field().is_some()
                && existing.owned_link_field() == edge.owned_link_field();
            same_relation || same_link
        });
        if duplicate {
            return;
        }

        let index = self.edges.len();
        self.by_owner
            .entry(edge.owner_type.clone())
            .or_default()
            .push(index);
        self.by_owned
            .entry(edge.owned_type.clone())
            .or_default()
            .push(index);
        self.edges.push(edge);
    }

    pub fn edges(&self) -> &[OwnershipEdge] {
        &self.edges
    }

    pub fn unresolved(&self) -> &[UnresolvedEdge] {
        &self.unresolved
    }

    /// Edges whose owner is `type_name` or one of its ancestors.
    pub fn owned_edges_for(&self, schema: &Schema, type_name: &str) -> Vec<&OwnershipEdge> {
        self.collect(schema, type_name, &self.by_owner)
    }

    /// Edges whose owned side is `type_name` or one of its ancestors.
    pub fn owner_edges_for(&self, schema: &Schema, type_name: &str) -> Vec<&OwnershipEdge> {
        self.collect(schema, type_name, &self.by_owned)
    }

    /// Unresolved declarations made by `type_name` or one of its ancestors.
    pub fn unresolved_for(
        &self,
        schema: &Schema,
        type_name: &str,
        origin: EdgeOrigin,
    ) -> Option<&UnresolvedEdge> {
        let chain = schema.ancestry(type_name).ok()?;
        self.unresolved.iter().find(|edge| {
            edge.origin == origin && chain.iter().any(|def| def.name == edge.type_name)
        })
    }

    fn collect<'a>(
        &'a self,
        schema: &Schema,
        type_name: &str,
        index: &BTreeMap<String, Vec<usize>>,
    ) -> Vec<&'a OwnershipEdge> {
        let Ok(chain) = schema.ancestry(type_name) else {
            return Vec::new();
        };
        chain
            .iter()
            .filter_map(|def| index.get(&def.name))
            .flatten()
            .filter_map(|i| self.edges.get(*i))
            .collect()
    }
}
