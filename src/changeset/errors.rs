//! ChangeSet errors

use thiserror::Error;

use super::set::{ChangeSetId, ChangeSetState};
use crate::record::RecordKey;

pub type ChangeSetResult<T> = Result<T, ChangeSetError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChangeSetError {
    /// Mutation or publish of a changeset that is already closed.
    #[error("ChangeSet {id} is {state} and can no longer be changed or published")]
    NotOpen { id: ChangeSetId, state: ChangeSetState },

    #[error("ChangeSet {id} is {state}; only a published changeset can be reverted")]
    NotPublished { id: ChangeSetId, state: ChangeSetState },

    #[error("Record '{object}' is not an explicit item of changeset {id}")]
    ItemNotFound { id: ChangeSetId, object: RecordKey },
}

impl ChangeSetError {
    pub fn code(&self) -> &'static str {
        match self {
            ChangeSetError::NotOpen { .. } => "STAGE_CHANGESET_CLOSED",
            ChangeSetError::NotPublished { .. } => "STAGE_CHANGESET_NOT_PUBLISHED",
            ChangeSetError::ItemNotFound { .. } => "STAGE_CHANGESET_ITEM_NOT_FOUND",
        }
    }
}
