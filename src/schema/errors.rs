//! Schema error types
//!
//! Every variant is a configuration error: it describes a schema that cannot
//! be used, or a write that names a type or field the schema does not know.

use thiserror::Error;

/// Result type for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Schema errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("Malformed schema file '{path}': {reason}")]
    Malformed { path: String, reason: String },

    #[error("Type '{0}' is declared more than once")]
    DuplicateType(String),

    #[error("Type '{type_name}' extends unknown type '{parent}'")]
    UnknownParent { type_name: String, parent: String },

    #[error("Inheritance cycle through type '{0}'")]
    InheritanceCycle(String),

    #[error("Field '{field}' is declared on both '{first}' and '{second}'")]
    DuplicateField {
        field: String,
        first: String,
        second: String,
    },

    #[error("Relation '{relation}' on '{type_name}' is declared more than once")]
    DuplicateRelation { type_name: String, relation: String },

    #[error("Relation '{relation}' on '{type_name}' targets unknown type '{target}'")]
    UnknownTarget {
        type_name: String,
        relation: String,
        target: String,
    },

    #[error("Relation '{relation}' on '{type_name}' keys on undeclared field '{field}' of '{owner}'")]
    UndeclaredKeyField {
        type_name: String,
        relation: String,
        field: String,
        owner: String,
    },

    #[error("Derived type '{type_name}' is invalid: {reason}")]
    InvalidDerived { type_name: String, reason: String },

    #[error("Unknown type '{0}'")]
    UnknownType(String),

    #[error("Field '{field}' is not declared for type '{type_name}'")]
    UnknownField { type_name: String, field: String },
}

impl SchemaError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            SchemaError::Malformed { .. } => "STAGE_SCHEMA_MALFORMED",
            SchemaError::DuplicateType(_) => "STAGE_SCHEMA_DUPLICATE_TYPE",
            SchemaError::UnknownParent { .. } => "STAGE_SCHEMA_UNKNOWN_PARENT",
            SchemaError::InheritanceCycle(_) => "STAGE_SCHEMA_INHERITANCE_CYCLE",
            SchemaError::DuplicateField { .. } => "STAGE_SCHEMA_DUPLICATE_FIELD",
            SchemaError::DuplicateRelation { .. } => "STAGE_SCHEMA_DUPLICATE_RELATION",
            SchemaError::UnknownTarget { .. } => "STAGE_SCHEMA_UNKNOWN_TARGET",
            SchemaError::UndeclaredKeyField { .. } => "STAGE_SCHEMA_UNDECLARED_KEY_FIELD",
            SchemaError::InvalidDerived { .. } => "STAGE_SCHEMA_INVALID_DERIVED",
            SchemaError::UnknownType(_) => "STAGE_UNKNOWN_TYPE",
            SchemaError::UnknownField { .. } => "STAGE_UNKNOWN_FIELD",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_the_type() {
        let err = SchemaError::UnknownParent {
            type_name: "Subclass".into(),
            parent: "Missing".into(),
        };
        let display = err.to_string();
        assert!(display.contains("Subclass"));
        assert!(display.contains("Missing"));
        assert_eq!(err.code(), "STAGE_SCHEMA_UNKNOWN_PARENT");
    }
}
