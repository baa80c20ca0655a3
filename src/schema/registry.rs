//! Validated schema registry

use std::collections::BTreeMap;

use super::errors::{SchemaError, SchemaResult};
use super::types::{DerivedFrom, RelationDef, SchemaFile, TypeDef};
use super::validator::{ancestry_of, SchemaValidator};
use crate::record::{Fields, Identity, RecordKey};

/// The set of declared types, validated as a whole.
///
/// Built once at startup; immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    types: BTreeMap<String, TypeDef>,
}

impl Schema {
    /// Builds and validates a schema from type declarations.
    pub fn from_types(types: impl IntoIterator<Item = TypeDef>) -> SchemaResult<Self> {
        let mut map = BTreeMap::new();
        for def in types {
            if map.contains_key(&def.name) {
                return Err(SchemaError::DuplicateType(def.name));
            }
            map.insert(def.name.clone(), def);
        }
        SchemaValidator::new(&map).validate()?;
        Ok(Self { types: map })
    }

    pub fn from_file(file: SchemaFile) -> SchemaResult<Self> {
        Self::from_types(file.types)
    }

    pub fn to_file(&self) -> SchemaFile {
        SchemaFile {
            types: self.types.values().cloned().collect(),
        }
    }

    pub fn get(&self, name: &str) -> SchemaResult<&TypeDef> {
        self.types
            .get(name)
            .ok_or_else(|| SchemaError::UnknownType(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// The type followed by its ancestors, nearest first.
    pub fn ancestry(&self, name: &str) -> SchemaResult<Vec<&TypeDef>> {
        ancestry_of(&self.types, name)
    }

    /// Root of the hierarchy `name` belongs to. Ids are unique per root.
    pub fn base_of(&self, name: &str) -> SchemaResult<&str> {
        self.ancestry(name)?
            .into_iter()
            .last()
            .map(|def| def.name.as_str())
            .ok_or_else(|| SchemaError::UnknownType(name.into()))
    }

    /// True when `name` is `ancestor` or inherits from it.
    pub fn is_a(&self, name: &str, ancestor: &str) -> bool {
        self.ancestry(name)
            .map(|chain| chain.iter().any(|def| def.name == ancestor))
            .unwrap_or(false)
    }

    /// Storage identity of a record key.
    pub fn identity_of(&self, key: &RecordKey) -> SchemaResult<Identity> {
        Ok(Identity::new(self.base_of(key.type_name())?, key.id()))
    }

    /// All fields of a type including inherited ones, root fields first.
    pub fn fields_of(&self, name: &str) -> SchemaResult<Vec<&str>> {
        let chain = self.ancestry(name)?;
        Ok(chain
            .iter()
            .rev()
            .flat_map(|def| def.fields.iter().map(String::as_str))
            .collect())
    }

    pub fn has_field(&self, name: &str, field: &str) -> bool {
        self.ancestry(name)
            .map(|chain| chain.iter().any(|def| def.fields.iter().any(|f| f == field)))
            .unwrap_or(false)
    }

    /// Rejects the first field not declared anywhere in the type's hierarchy.
    pub fn check_fields(&self, name: &str, fields: &Fields) -> SchemaResult<()> {
        let chain = self.ancestry(name)?;
        for field in fields.keys() {
            if !chain.iter().any(|def| def.fields.iter().any(|f| f == field)) {
                return Err(SchemaError::UnknownField {
                    type_name: name.to_string(),
                    field: field.clone(),
                });
            }
        }
        Ok(())
    }

    /// Resolves a relation declared on `type_name` or one of its ancestors.
    pub fn relation(&self, type_name: &str, relation: &str) -> Option<RelationDef> {
        self.ancestry(type_name)
            .ok()?
            .into_iter()
            .find_map(|def| def.relation(relation))
    }

    /// The derivation rule for `type_name` (possibly inherited) together with
    /// the `has_one` relation that reaches the source.
    pub fn derived_of(&self, type_name: &str) -> Option<(&DerivedFrom, RelationDef)> {
        let chain = self.ancestry(type_name).ok()?;
        let derived = chain.iter().find_map(|def| def.derived.as_ref())?;
        let source = chain.iter().find_map(|def| def.relation(&derived.source))?;
        Some((derived, source))
    }

    pub fn is_derived(&self, type_name: &str) -> bool {
        self.derived_of(type_name).is_some()
    }
}
