//! Structural schema validation
//!
//! Runs once when a schema is built. Rejects:
//! - parents that are not declared
//! - inheritance cycles
//! - a field declared twice within one hierarchy
//! - relation names reused within one hierarchy
//! - relation targets that are not declared
//! - key fields missing from the hierarchy that stores them
//! - derived types whose source is not a `has_one`, or whose mirrored
//!   fields are missing on either side
//!
//! `owns` / `owned_by` names are deliberately not checked here. An
//! unresolvable ownership name is reported when a traversal reaches it.

use std::collections::{BTreeMap, BTreeSet};

use super::errors::{SchemaError, SchemaResult};
use super::types::{RelationKind, TypeDef};

/// Walks from `name` to the root of its hierarchy, `name` first.
pub(crate) fn ancestry_of<'a>(
    types: &'a BTreeMap<String, TypeDef>,
    name: &str,
) -> SchemaResult<Vec<&'a TypeDef>> {
    let mut chain = Vec::new();
    let mut seen = BTreeSet::new();
    let mut current = types
        .get(name)
        .ok_or_else(|| SchemaError::UnknownType(name.to_string()))?;

    loop {
        if !seen.insert(current.name.as_str()) {
            return Err(SchemaError::InheritanceCycle(current.name.clone()));
        }
        chain.push(current);
        match &current.parent {
            None => return Ok(chain),
            Some(parent) => {
                current = types.get(parent).ok_or_else(|| SchemaError::UnknownParent {
                    type_name: current.name.clone(),
                    parent: parent.clone(),
                })?;
            }
        }
    }
}

fn hierarchy_has_field(chain: &[&TypeDef], field: &str) -> bool {
    chain.iter().any(|def| def.fields.iter().any(|f| f == field))
}

/// Validates a set of type declarations as a whole.
pub struct SchemaValidator<'a> {
    types: &'a BTreeMap<String, TypeDef>,
}

impl<'a> SchemaValidator<'a> {
    pub fn new(types: &'a BTreeMap<String, TypeDef>) -> Self {
        Self { types }
    }

    pub fn validate(&self) -> SchemaResult<()> {
        for def in self.types.values() {
            let chain = ancestry_of(self.types, &def.name)?;
            self.validate_fields(&chain)?;
            self.validate_relations(def, &chain)?;
            self.validate_derived(def, &chain)?;
        }
        Ok(())
    }

    fn validate_fields(&self, chain: &[&TypeDef]) -> SchemaResult<()> {
        let mut declared: BTreeMap<&str, &str> = BTreeMap::new();
        for def in chain {
            for field in &def.fields {
                if let Some(first) = declared.insert(field.as_str(), def.name.as_str()) {
                    return Err(SchemaError::DuplicateField {
                        field: field.clone(),
                        first: first.to_string(),
                        second: def.name.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn validate_relations(&self, def: &TypeDef, chain: &[&TypeDef]) -> SchemaResult<()> {
        let mut names = BTreeSet::new();
        for ancestor in chain {
            for relation in ancestor.relations() {
                if !names.insert(relation.name.clone()) {
                    return Err(SchemaError::DuplicateRelation {
                        type_name: def.name.clone(),
                        relation: relation.name,
                    });
                }
            }
        }

        for relation in def.relations() {
            if !self.types.contains_key(&relation.target) {
                return Err(SchemaError::UnknownTarget {
                    type_name: def.name.clone(),
                    relation: relation.name,
                    target: relation.target,
                });
            }

            let (field, owner_chain, owner) = match &relation.kind {
                RelationKind::HasOne { field } | RelationKind::ManyMany { ids_field: field } => {
                    (field.as_str(), chain.to_vec(), def.name.as_str())
                }
                RelationKind::HasMany { foreign_key } => (
                    foreign_key.as_str(),
                    ancestry_of(self.types, &relation.target)?,
                    relation.target.as_str(),
                ),
                RelationKind::Custom => continue,
            };

            if !hierarchy_has_field(&owner_chain, field) {
                return Err(SchemaError::UndeclaredKeyField {
                    type_name: def.name.clone(),
                    relation: relation.name.clone(),
                    field: field.to_string(),
                    owner: owner.to_string(),
                });
            }
        }
        Ok(())
    }

    fn validate_derived(&self, def: &TypeDef, chain: &[&TypeDef]) -> SchemaResult<()> {
        let Some(derived) = &def.derived else {
            return Ok(());
        };
        let invalid = |reason: String| SchemaError::InvalidDerived {
            type_name: def.name.clone(),
            reason,
        };

        let source = chain
            .iter()
            .find_map(|ancestor| ancestor.relation(&derived.source))
            .ok_or_else(|| invalid(format!("source relation '{}' is not declared", derived.source)))?;

        if !matches!(source.kind, RelationKind::HasOne { .. }) {
            return Err(invalid(format!(
                "source relation '{}' must be a has_one, found {}",
                derived.source,
                source.kind.as_str()
            )));
        }

        let source_chain = ancestry_of(self.types, &source.target)?;
        for field in &derived.mirrored_fields {
            if !hierarchy_has_field(chain, field) {
                return Err(invalid(format!("mirrored field '{}' is not declared on it", field)));
            }
            if !hierarchy_has_field(&source_chain, field) {
                return Err(invalid(format!(
                    "mirrored field '{}' is not declared on source type '{}'",
                    field, source.target
                )));
            }
        }
        Ok(())
    }
}
