//! Schema subsystem
//!
//! Declares record types, their single-inheritance hierarchy, the relations
//! between them and which of those relations carry ownership.
//!
//! # Design Principles
//!
//! - Declarations are data, loaded once at startup
//! - The whole schema is validated before it is used
//! - Ownership edges are indexed in both directions up front
//! - Unresolvable ownership names fail the traversal that reaches them, not
//!   the load

mod edges;
mod errors;
mod loader;
mod registry;
mod types;
mod validator;

pub use edges::{EdgeOrigin, OwnershipEdge, OwnershipTable, UnresolvedEdge};
pub use errors::{SchemaError, SchemaResult};
pub use loader::SchemaLoader;
pub use registry::Schema;
pub use types::{
    CustomRelation, DerivedFrom, HasMany, HasOne, KeySide, ManyMany, RelationDef, RelationKind,
    SchemaFile, TypeDef,
};
pub use validator::SchemaValidator;
