//! Engine error types
//!
//! Every subsystem error converts into `EngineError`. Callers branch on
//! `category()`:
//!
//! - `Configuration`: schema or ownership declarations are wrong; fix the
//!   schema, not the data
//! - `State`: a precondition failed before anything was written; the caller
//!   may retry once the state is fixed
//! - `Authorization`: the authority refused the actor
//! - `Storage`: persistence failed; the transaction was rolled back
//!
//! Only storage corruption is fatal.

use std::fmt;

use thiserror::Error;

use crate::authority::AuthorityError;
use crate::changeset::{ChangeSetError, ChangeSetId};
use crate::config::ConfigError;
use crate::graph::GraphError;
use crate::record::RecordKey;
use crate::schema::SchemaError;
use crate::storage::StorageError;
use crate::version::{VersionError, VersionNumber};

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    State,
    Authorization,
    Storage,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Configuration => "CONFIGURATION",
            ErrorCategory::State => "STATE",
            ErrorCategory::Authorization => "AUTHORIZATION",
            ErrorCategory::Storage => "STORAGE",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Record '{0}' does not exist on DRAFT")]
    NotOnDraft(RecordKey),

    #[error("Record '{0}' does not exist on LIVE")]
    NotOnLive(RecordKey),

    /// A derived record's source has no LIVE version.
    #[error("Cannot publish '{0}' before its source is published")]
    SourceNotPublished(RecordKey),

    #[error("Version {version} of '{record}' does not exist")]
    VersionNotFound {
        record: RecordKey,
        version: VersionNumber,
    },

    #[error("Record '{0}' has never been written")]
    UnknownRecord(RecordKey),

    #[error("ChangeSet {0} does not exist")]
    UnknownChangeSet(ChangeSetId),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Version(#[from] VersionError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    ChangeSet(#[from] ChangeSetError),

    #[error(transparent)]
    Authority(#[from] AuthorityError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl EngineError {
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::NotOnDraft(_) => "STAGE_NOT_ON_DRAFT",
            EngineError::NotOnLive(_) => "STAGE_NOT_ON_LIVE",
            EngineError::SourceNotPublished(_) => "STAGE_SOURCE_NOT_PUBLISHED",
            EngineError::VersionNotFound { .. } => "STAGE_VERSION_NOT_FOUND",
            EngineError::UnknownRecord(_) => "STAGE_UNKNOWN_RECORD",
            EngineError::UnknownChangeSet(_) => "STAGE_UNKNOWN_CHANGESET",
            EngineError::Schema(err) => err.code(),
            EngineError::Version(err) => err.code(),
            EngineError::Storage(err) => err.code(),
            EngineError::Graph(err) => err.code(),
            EngineError::ChangeSet(err) => err.code(),
            EngineError::Authority(err) => err.code(),
            EngineError::Config(err) => err.code(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            EngineError::NotOnDraft(_)
            | EngineError::NotOnLive(_)
            | EngineError::SourceNotPublished(_)
            | EngineError::VersionNotFound { .. }
            | EngineError::UnknownRecord(_)
            | EngineError::UnknownChangeSet(_)
            | EngineError::Version(_)
            | EngineError::ChangeSet(_) => ErrorCategory::State,
            // Caller passed a name the schema does not know
            EngineError::Schema(SchemaError::UnknownType(_))
            | EngineError::Schema(SchemaError::UnknownField { .. }) => ErrorCategory::State,
            EngineError::Schema(_) | EngineError::Graph(_) | EngineError::Config(_) => {
                ErrorCategory::Configuration
            }
            EngineError::Authority(_) => ErrorCategory::Authorization,
            EngineError::Storage(_) => ErrorCategory::Storage,
        }
    }

    /// True when the process must stop instead of failing one operation.
    pub fn is_fatal(&self) -> bool {
        match self {
            EngineError::Storage(err) => err.is_fatal(),
            _ => false,
        }
    }

    /// True for failures raised before any write was attempted.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::State | ErrorCategory::Authorization
        )
    }
}
