//! Staging engine
//!
//! `Engine` owns the schema, the ownership table and the store state, and
//! is the only way to change any of them. Every public mutation is:
//!
//! - gated: resolved, authorized and audited
//! - atomic: the whole state is restored if any step fails
//! - persisted: saved to the state file before returning, when configured
//!
//! # Operations
//!
//! - Record IO: `create`, `write`, `delete_from_stage`
//! - Publishing: `publish`, `publish_recursive`
//! - Removal: `unpublish`, `archive`
//! - History: `revert_to_live`, `rollback_to`
//! - ChangeSets: `create_changeset`, `add_object`, `remove_object`, `sync`,
//!   `publish_changeset`, `revert_changeset`

mod changesets;
mod core;
mod derived;
mod errors;
mod publish;
mod revert;
mod unpublish;

pub use self::changesets::{ItemStatus, CHANGESET_TYPE};
pub use self::core::Engine;
pub use self::errors::{EngineError, EngineResult, ErrorCategory};
pub use self::publish::{PublishFailure, PublishReport, PublishedRecord, RemovedRecord};
pub use self::revert::{RevertOutcome, RollbackOutcome};
