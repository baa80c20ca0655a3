//! Type and relation declarations
//!
//! A type declares its own fields, the relations it holds, which of those
//! relations it owns (`owns`), which relations point at its owners
//! (`owned_by`), and optionally that it mirrors another record (`derived`).

use serde::{Deserialize, Serialize};

/// `has_one`: the declaring record stores the target id in `field`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HasOne {
    pub name: String,
    pub target: String,
    pub field: String,
}

/// `has_many`: each target record stores the declaring record's id in
/// `foreign_key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HasMany {
    pub name: String,
    pub target: String,
    pub foreign_key: String,
}

/// `many_many`: the declaring record stores a list of target ids in
/// `ids_field`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManyMany {
    pub name: String,
    pub target: String,
    pub ids_field: String,
}

/// A relation computed by a named accessor instead of stored keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomRelation {
    pub name: String,
    pub target: String,
}

/// Marks a type as mirroring a source record reached through a `has_one`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedFrom {
    /// Name of the `has_one` relation pointing at the source.
    pub source: String,
    /// Fields copied from the source.
    #[serde(default)]
    pub mirrored_fields: Vec<String>,
}

/// Declaration of a single type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub has_one: Vec<HasOne>,
    #[serde(default)]
    pub has_many: Vec<HasMany>,
    #[serde(default)]
    pub many_many: Vec<ManyMany>,
    #[serde(default)]
    pub custom: Vec<CustomRelation>,
    /// Relations (declared on this type) whose targets this type owns.
    #[serde(default)]
    pub owns: Vec<String>,
    /// Relations (declared on this type) whose targets own this type.
    #[serde(default)]
    pub owned_by: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derived: Option<DerivedFrom>,
}

impl TypeDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            fields: Vec::new(),
            has_one: Vec::new(),
            has_many: Vec::new(),
            many_many: Vec::new(),
            custom: Vec::new(),
            owns: Vec::new(),
            owned_by: Vec::new(),
            derived: None,
        }
    }

    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.fields.push(name.into());
        self
    }

    pub fn has_one(
        mut self,
        name: impl Into<String>,
        target: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        self.has_one.push(HasOne {
            name: name.into(),
            target: target.into(),
            field: field.into(),
        });
        self
    }

    pub fn has_many(
        mut self,
        name: impl Into<String>,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        self.has_many.push(HasMany {
            name: name.into(),
            target: target.into(),
            foreign_key: foreign_key.into(),
        });
        self
    }

    pub fn many_many(
        mut self,
        name: impl Into<String>,
        target: impl Into<String>,
        ids_field: impl Into<String>,
    ) -> Self {
        self.many_many.push(ManyMany {
            name: name.into(),
            target: target.into(),
            ids_field: ids_field.into(),
        });
        self
    }

    pub fn custom(mut self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.custom.push(CustomRelation {
            name: name.into(),
            target: target.into(),
        });
        self
    }

    pub fn owns(mut self, relation: impl Into<String>) -> Self {
        self.owns.push(relation.into());
        self
    }

    pub fn owned_by(mut self, relation: impl Into<String>) -> Self {
        self.owned_by.push(relation.into());
        self
    }

    pub fn derived_from<I, S>(mut self, source: impl Into<String>, mirrored_fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.derived = Some(DerivedFrom {
            source: source.into(),
            mirrored_fields: mirrored_fields.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Looks up a relation declared directly on this type.
    pub fn relation(&self, name: &str) -> Option<RelationDef> {
        let declared_on = self.name.clone();
        if let Some(rel) = self.has_one.iter().find(|r| r.name == name) {
            return Some(RelationDef {
                name: rel.name.clone(),
                declared_on,
                target: rel.target.clone(),
                kind: RelationKind::HasOne {
                    field: rel.field.clone(),
                },
            });
        }
        if let Some(rel) = self.has_many.iter().find(|r| r.name == name) {
            return Some(RelationDef {
                name: rel.name.clone(),
                declared_on,
                target: rel.target.clone(),
                kind: RelationKind::HasMany {
                    foreign_key: rel.foreign_key.clone(),
                },
            });
        }
        if let Some(rel) = self.many_many.iter().find(|r| r.name == name) {
            return Some(RelationDef {
                name: rel.name.clone(),
                declared_on,
                target: rel.target.clone(),
                kind: RelationKind::ManyMany {
                    ids_field: rel.ids_field.clone(),
                },
            });
        }
        self.custom
            .iter()
            .find(|r| r.name == name)
            .map(|rel| RelationDef {
                name: rel.name.clone(),
                declared_on,
                target: rel.target.clone(),
                kind: RelationKind::Custom,
            })
    }

    /// Every relation declared directly on this type.
    pub fn relations(&self) -> Vec<RelationDef> {
        let names = self
            .has_one
            .iter()
            .map(|r| r.name.as_str())
            .chain(self.has_many.iter().map(|r| r.name.as_str()))
            .chain(self.many_many.iter().map(|r| r.name.as_str()))
            .chain(self.custom.iter().map(|r| r.name.as_str()));
        names.filter_map(|name| self.relation(name)).collect()
    }
}

/// How a relation's links are stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationKind {
    HasOne { field: String },
    HasMany { foreign_key: String },
    ManyMany { ids_field: String },
    Custom,
}

impl RelationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::HasOne { .. } => "has_one",
            RelationKind::HasMany { .. } => "has_many",
            RelationKind::ManyMany { .. } => "many_many",
            RelationKind::Custom => "custom",
        }
    }
}

/// A relation together with the type that declares it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationDef {
    pub name: String,
    pub declared_on: String,
    pub target: String,
    pub kind: RelationKind,
}

impl RelationDef {
    /// The field storing the link, if any, and whether that field lives on
    /// the target record rather than the declaring one.
    pub fn key_field(&self) -> Option<(&str, KeySide)> {
        match &self.kind {
            RelationKind::HasOne { field } => Some((field, KeySide::Declaring)),
            RelationKind::HasMany { foreign_key } => Some((foreign_key, KeySide::Target)),
            RelationKind::ManyMany { ids_field } => Some((ids_field, KeySide::Declaring)),
            RelationKind::Custom => None,
        }
    }
}

/// Which end of a relation stores its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySide {
    Declaring,
    Target,
}

/// On-disk schema document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaFile {
    #[serde(default)]
    pub types: Vec<TypeDef>,
}
