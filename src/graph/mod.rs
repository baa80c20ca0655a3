//! Ownership graph subsystem
//!
//! Answers "what does this record own" and "what owns this record" on an
//! explicit stage. Relations are resolved through the `RelationResolver`
//! collaborator; ownership edges come from the schema's `OwnershipTable`.
//!
//! Cycles are a normal graph shape, not an error.

mod errors;
mod resolver;
mod traversal;

pub use errors::{GraphError, GraphResult};
pub use resolver::{Accessor, RelationResolver, SchemaResolver};
pub use traversal::{OwnershipGraph, OwnershipLink};
