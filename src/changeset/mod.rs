//! ChangeSet subsystem
//!
//! A changeset groups records that publish together. Callers add records
//! explicitly; `sync` pulls in everything those records own as implicit
//! items. Change types are always computed from current stage pointers and
//! never stored.

mod errors;
mod item;
mod set;

pub use errors::{ChangeSetError, ChangeSetResult};
pub use item::{Added, ChangeSetItem, ChangeType};
pub use set::{ChangeSet, ChangeSetId, ChangeSetState, ImplicitMembers, SyncOutcome};
