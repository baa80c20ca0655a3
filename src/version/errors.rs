//! Version store errors

use thiserror::Error;

use super::number::VersionNumber;
use crate::record::Identity;

/// Result type for version store operations
pub type VersionResult<T> = Result<T, VersionError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("Record '{0}' has no version history")]
    NoHistory(Identity),

    #[error("Version {version} of record '{identity}' does not exist")]
    NotFound {
        identity: Identity,
        version: VersionNumber,
    },
}

impl VersionError {
    pub fn code(&self) -> &'static str {
        match self {
            VersionError::NoHistory(_) => "STAGE_NO_HISTORY",
            VersionError::NotFound { .. } => "STAGE_VERSION_NOT_FOUND",
        }
    }
}
