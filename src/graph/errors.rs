//! Graph traversal errors
//!
//! All of these are configuration errors. They fail the traversal that hit
//! them and leave stored state untouched.

use thiserror::Error;

use crate::schema::SchemaError;

pub type GraphResult<T> = Result<T, GraphError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// An `owns` / `owned_by` entry names no relation of the type.
    #[error("Ownership of '{type_name}' names undeclared relation '{relation}'")]
    UnresolvedRelation { type_name: String, relation: String },

    /// A custom relation has no registered accessor.
    #[error("No accessor registered for custom relation '{relation}' on '{type_name}'")]
    MissingAccessor { type_name: String, relation: String },

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl GraphError {
    pub fn code(&self) -> &'static str {
        match self {
            GraphError::UnresolvedRelation { .. } => "STAGE_UNRESOLVED_RELATION",
            GraphError::MissingAccessor { .. } => "STAGE_MISSING_ACCESSOR",
            GraphError::Schema(err) => err.code(),
        }
    }
}
