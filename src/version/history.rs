//! VersionHistory - Append-only version list of one record

use serde::{Deserialize, Serialize};

use super::number::{Sequence, VersionNumber};
use super::snapshot::Version;

/// All versions of one record identity, in ascending number order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionHistory {
    versions: Vec<Version>,
}

impl VersionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.versions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    #[inline]
    pub fn versions(&self) -> &[Version] {
        &self.versions
    }

    pub fn latest(&self) -> Option<&Version> {
        self.versions.last()
    }

    /// Highest allocated number. Numbers are allocated in order, so this is
    /// the last entry.
    pub fn max_number(&self) -> Option<VersionNumber> {
        self.latest().map(Version::number)
    }

    pub fn next_number(&self) -> VersionNumber {
        self.max_number()
            .map_or(VersionNumber::FIRST, |n| n.next())
    }

    pub fn get(&self, number: VersionNumber) -> Option<&Version> {
        self.versions
            .binary_search_by_key(&number, Version::number)
            .ok()
            .and_then(|i| self.versions.get(i))
    }

    pub(crate) fn get_mut(&mut self, number: VersionNumber) -> Option<&mut Version> {
        self.versions
            .binary_search_by_key(&number, Version::number)
            .ok()
            .and_then(|i| self.versions.get_mut(i))
    }

    /// The last version written at or before `sequence`.
    pub fn at_or_before(&self, sequence: Sequence) -> Option<&Version> {
        self.versions
            .iter()
            .rev()
            .find(|version| version.sequence() <= sequence)
    }

    /// Appends a version. Returns false, leaving the history unchanged, when
    /// the number does not follow the current maximum.
    pub fn push(&mut self, version: Version) -> bool {
        if version.number() != self.next_number() {
            return false;
        }
        self.versions.push(version);
        true
    }
}
