//! Version numbers and the global write sequence
//!
//! - `VersionNumber` totally orders the versions of one record and is never
//!   reused or decremented.
//! - `Sequence` totally orders every version write and stage pointer change
//!   across all records. It is the engine's logical clock and is independent
//!   of wall-clock time.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Version number scoped to one record identity. The first version is 1.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionNumber(u64);

impl VersionNumber {
    pub const FIRST: VersionNumber = VersionNumber(1);

    #[inline]
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn value(&self) -> u64 {
        self.0
    }

    /// The number allocated after this one.
    #[inline]
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Converts an optional pointer to the 0-means-absent convention used by
    /// changeset items.
    pub fn or_zero(version: Option<VersionNumber>) -> u64 {
        version.map_or(0, |v| v.0)
    }
}

impl fmt::Display for VersionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position in the global order of writes and bindings.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sequence(u64);

impl Sequence {
    #[inline]
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn value(&self) -> u64 {
        self.0
    }

    #[inline]
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
