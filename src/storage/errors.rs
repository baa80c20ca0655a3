//! Storage error types
//!
//! Error codes:
//! - STAGE_STORAGE_IO_ERROR (ERROR severity)
//! - STAGE_STORAGE_ENCODE_FAILED (ERROR severity)
//! - STAGE_STORAGE_MISSING_VERSION (ERROR severity)
//! - STAGE_DATA_CORRUPTION (FATAL severity)

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::record::Identity;
use crate::version::VersionNumber;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("State file '{}' is corrupt: {reason}", path.display())]
    Corruption { path: PathBuf, reason: String },

    #[error("Failed to encode state: {0}")]
    Encode(String),

    /// A stage pointer would reference a version that was never written.
    #[error("Cannot bind missing version {version} of '{identity}'")]
    MissingVersion {
        identity: Identity,
        version: VersionNumber,
    },
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn corruption(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        StorageError::Corruption {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            StorageError::Io { .. } => "STAGE_STORAGE_IO_ERROR",
            StorageError::Corruption { .. } => "STAGE_DATA_CORRUPTION",
            StorageError::Encode(_) => "STAGE_STORAGE_ENCODE_FAILED",
            StorageError::MissingVersion { .. } => "STAGE_STORAGE_MISSING_VERSION",
        }
    }

    /// Corruption must stop the process; everything else fails one operation.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StorageError::Corruption { .. })
    }
}
