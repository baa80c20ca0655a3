//! stagegraph - versioned draft/live content staging
//!
//! Every record lives in two parallel stages (draft and live) backed by an
//! append-only version history. Records declare ownership edges to each
//! other; publishing, unpublishing, archiving, reverting and rolling back
//! walk that ownership graph. Changesets group explicit and implicit
//! changes so they can be published together.

pub mod authority;
pub mod changeset;
pub mod config;
pub mod engine;
pub mod graph;
pub mod observability;
pub mod record;
pub mod schema;
pub mod stage;
pub mod storage;
pub mod version;

pub use authority::{Actor, PublishAction, PublishAuthority};
pub use changeset::{Added, ChangeSet, ChangeSetId, ChangeSetItem, ChangeSetState, ChangeType};
pub use config::EngineConfig;
pub use engine::{
    Engine, EngineError, EngineResult, ErrorCategory, ItemStatus, PublishReport, RevertOutcome,
    RollbackOutcome,
};
pub use record::{Fields, RecordId, RecordKey, Stage};
pub use schema::{Schema, TypeDef};
pub use version::{Version, VersionNumber};
