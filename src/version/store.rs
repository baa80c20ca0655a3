//! VersionStore - per-record append-only histories
//!
//! Version numbers are allocated as `max + 1` per identity. The store is
//! only ever mutated through `&mut self`, so allocation is serialized by the
//! borrow checker; the engine holds the only mutable handle.

use std::collections::BTreeMap;
use std::ops::Bound;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::{VersionError, VersionResult};
use super::history::VersionHistory;
use super::number::{Sequence, VersionNumber};
use super::snapshot::Version;
use crate::record::{Fields, Identity, RecordId, Stage};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionStore {
    histories: BTreeMap<Identity, VersionHistory>,
}

impl VersionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the next number for `identity` and stores the snapshot.
    pub fn append(
        &mut self,
        identity: &Identity,
        type_name: &str,
        fields: Fields,
        written_to: Stage,
        sequence: Sequence,
        author: Option<Uuid>,
    ) -> VersionNumber {
        let history = self.histories.entry(identity.clone()).or_default();
        let number = history.next_number();
        history.push(Version::new(
            number, type_name, fields, written_to, sequence, author,
        ));
        number
    }

    pub fn get(&self, identity: &Identity, number: VersionNumber) -> VersionResult<&Version> {
        self.history(identity)?
            .get(number)
            .ok_or_else(|| VersionError::NotFound {
                identity: identity.clone(),
                version: number,
            })
    }

    /// Flags an existing version as published. False when it does not exist.
    pub(crate) fn mark_published(&mut self, identity: &Identity, number: VersionNumber) -> bool {
        match self
            .histories
            .get_mut(identity)
            .and_then(|history| history.get_mut(number))
        {
            Some(version) => {
                version.mark_published();
                true
            }
            None => false,
        }
    }

    pub fn history(&self, identity: &Identity) -> VersionResult<&VersionHistory> {
        self.histories
            .get(identity)
            .ok_or_else(|| VersionError::NoHistory(identity.clone()))
    }

    pub fn contains(&self, identity: &Identity) -> bool {
        self.histories.contains_key(identity)
    }

    pub fn latest(&self, identity: &Identity) -> Option<&Version> {
        self.histories.get(identity).and_then(VersionHistory::latest)
    }

    /// Highest record id ever written under `base`.
    pub fn max_record_id(&self, base: &str) -> Option<RecordId> {
        let start = Identity::new(base, RecordId::new(0));
        self.histories
            .range((Bound::Included(start), Bound::Unbounded))
            .take_while(|(identity, _)| identity.base() == base)
            .map(|(identity, _)| identity.id())
            .last()
    }

    pub fn identities(&self) -> impl Iterator<Item = &Identity> {
        self.histories.keys()
    }

    /// Total number of versions across all records.
    pub fn version_count(&self) -> usize {
        self.histories.values().map(VersionHistory::len).sum()
    }
}
