//! StoreState - everything the engine persists
//!
//! Version histories, stage pointers (with their binding log), changesets
//! and the counters that allocate sequences and changeset ids. The engine
//! clones the whole state as a transaction checkpoint, so it stays plain
//! owned data.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::{StorageError, StorageResult};
use crate::changeset::{ChangeSet, ChangeSetId};
use crate::record::{Fields, Identity, RecordId, Stage};
use crate::stage::StageTable;
use crate::version::{Sequence, Version, VersionNumber, VersionStore};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreState {
    #[serde(default)]
    versions: VersionStore,
    #[serde(default)]
    stages: StageTable,
    #[serde(default)]
    changesets: BTreeMap<ChangeSetId, ChangeSet>,
    /// Last sequence handed out.
    #[serde(default)]
    sequence: Sequence,
    /// Last changeset id handed out.
    #[serde(default)]
    last_changeset_id: ChangeSetId,
}

impl StoreState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn versions(&self) -> &VersionStore {
        &self.versions
    }

    pub fn stages(&self) -> &StageTable {
        &self.stages
    }

    /// Current position of the logical clock.
    pub fn sequence(&self) -> Sequence {
        self.sequence
    }

    fn tick(&mut self) -> Sequence {
        self.sequence = self.sequence.next();
        self.sequence
    }

    /// Stores a new version and points `stage` at it.
    pub fn write_version(
        &mut self,
        identity: &Identity,
        type_name: &str,
        fields: Fields,
        stage: Stage,
        author: Option<Uuid>,
    ) -> VersionNumber {
        let sequence = self.tick();
        let number = self
            .versions
            .append(identity, type_name, fields, stage, sequence, author);
        self.stages.bind(identity, stage, number, sequence);
        number
    }

    /// Points `stage` at an existing version. Binding LIVE marks the
    /// version published.
    pub fn bind(
        &mut self,
        identity: &Identity,
        stage: Stage,
        version: VersionNumber,
    ) -> StorageResult<Option<VersionNumber>> {
        if self.versions.get(identity, version).is_err() {
            return Err(StorageError::MissingVersion {
                identity: identity.clone(),
                version,
            });
        }
        if stage == Stage::Live {
            self.versions.mark_published(identity, version);
        }
        let sequence = self.tick();
        Ok(self.stages.bind(identity, stage, version, sequence))
    }

    /// Removes the record from `stage`; returns what was bound.
    pub fn unbind(&mut self, identity: &Identity, stage: Stage) -> Option<VersionNumber> {
        if !self.stages.exists(identity, stage) {
            return None;
        }
        let sequence = self.tick();
        self.stages.unbind(identity, stage, sequence)
    }

    pub fn current(&self, identity: &Identity, stage: Stage) -> Option<VersionNumber> {
        self.stages.current(identity, stage)
    }

    pub fn exists(&self, identity: &Identity, stage: Stage) -> bool {
        self.stages.exists(identity, stage)
    }

    /// The version currently bound on `stage`.
    pub fn version_on(&self, identity: &Identity, stage: Stage) -> Option<&Version> {
        let number = self.current(identity, stage)?;
        self.versions.get(identity, number).ok()
    }

    pub fn snapshot(&self, identity: &Identity, stage: Stage) -> Option<&Fields> {
        self.version_on(identity, stage).map(Version::fields)
    }

    /// Next unused id in `base`'s id space.
    pub fn allocate_record_id(&self, base: &str) -> RecordId {
        let max = self.versions.max_record_id(base).map_or(0, |id| id.value());
        RecordId::new(max + 1)
    }

    pub fn create_changeset(&mut self, title: &str, owner: Option<Uuid>) -> ChangeSetId {
        self.last_changeset_id = self.last_changeset_id.next();
        let id = self.last_changeset_id;
        self.changesets.insert(id, ChangeSet::new(id, title, owner));
        id
    }

    pub fn changeset(&self, id: ChangeSetId) -> Option<&ChangeSet> {
        self.changesets.get(&id)
    }

    pub fn changeset_mut(&mut self, id: ChangeSetId) -> Option<&mut ChangeSet> {
        self.changesets.get_mut(&id)
    }

    pub fn changesets(&self) -> impl Iterator<Item = &ChangeSet> {
        self.changesets.values()
    }
}
