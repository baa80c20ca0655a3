//! StageTable - stage pointers and their binding log
//!
//! A record exists on a stage iff its pointer for that stage is bound.
//! Unbinding never touches version history, so an unbound record can be
//! restored by rebinding an older version.
//!
//! Every pointer change is appended to a per-record binding log stamped with
//! the global sequence. The log answers "which version was bound on stage S
//! at time T", which rollback needs for owned records.

use std::collections::BTreeMap;
use std::ops::Bound;

use serde::{Deserialize, Serialize};

use crate::record::{Identity, Stage};
use crate::version::{Sequence, VersionNumber};

/// Current pointers of one record. `None` means absent from that stage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagePointers {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft: Option<VersionNumber>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub live: Option<VersionNumber>,
}

impl StagePointers {
    pub fn get(&self, stage: Stage) -> Option<VersionNumber> {
        match stage {
            Stage::Draft => self.draft,
            Stage::Live => self.live,
        }
    }

    fn set(&mut self, stage: Stage, version: Option<VersionNumber>) {
        match stage {
            Stage::Draft => self.draft = version,
            Stage::Live => self.live = version,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.draft.is_none() && self.live.is_none()
    }
}

/// One pointer change. `version: None` records an unbind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    pub sequence: Sequence,
    pub stage: Stage,
    pub version: Option<VersionNumber>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTable {
    pointers: BTreeMap<Identity, StagePointers>,
    #[serde(default)]
    log: BTreeMap<Identity, Vec<Binding>>,
}

impl StageTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pointers(&self, identity: &Identity) -> StagePointers {
        self.pointers.get(identity).copied().unwrap_or_default()
    }

    pub fn current(&self, identity: &Identity, stage: Stage) -> Option<VersionNumber> {
        self.pointers(identity).get(stage)
    }

    pub fn exists(&self, identity: &Identity, stage: Stage) -> bool {
        self.current(identity, stage).is_some()
    }

    /// Points `stage` at `version`. Returns the previously bound version.
    pub fn bind(
        &mut self,
        identity: &Identity,
        stage: Stage,
        version: VersionNumber,
        sequence: Sequence,
    ) -> Option<VersionNumber> {
        self.set(identity, stage, Some(version), sequence)
    }

    /// Removes the record from `stage`. Returns the version that was bound,
    /// or `None` (without logging anything) if it was already absent.
    pub fn unbind(
        &mut self,
        identity: &Identity,
        stage: Stage,
        sequence: Sequence,
    ) -> Option<VersionNumber> {
        if !self.exists(identity, stage) {
            return None;
        }
        self.set(identity, stage, None, sequence)
    }

    fn set(
        &mut self,
        identity: &Identity,
        stage: Stage,
        version: Option<VersionNumber>,
        sequence: Sequence,
    ) -> Option<VersionNumber> {
        let pointers = self.pointers.entry(identity.clone()).or_default();
        let previous = pointers.get(stage);
        pointers.set(stage, version);
        if pointers.is_empty() {
            self.pointers.remove(identity);
        }

        self.log.entry(identity.clone()).or_default().push(Binding {
            sequence,
            stage,
            version,
        });
        previous
    }

    /// Version bound on `stage` at `sequence`, inclusive.
    pub fn bound_at(
        &self,
        identity: &Identity,
        stage: Stage,
        sequence: Sequence,
    ) -> Option<VersionNumber> {
        self.log
            .get(identity)?
            .iter()
            .rev()
            .filter(|binding| binding.stage == stage)
            .find(|binding| binding.sequence <= sequence)
            .and_then(|binding| binding.version)
    }

    pub fn bindings(&self, identity: &Identity) -> &[Binding] {
        self.log.get(identity).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Identities currently bound on `stage`.
    pub fn identities_on(&self, stage: Stage) -> impl Iterator<Item = &Identity> {
        self.pointers
            .iter()
            .filter(move |(_, pointers)| pointers.get(stage).is_some())
            .map(|(identity, _)| identity)
    }

    /// Identities under `base` currently bound on `stage`.
    pub fn identities_of_base<'a>(
        &'a self,
        base: &'a str,
        stage: Stage,
    ) -> impl Iterator<Item = &'a Identity> + 'a {
        let start = Identity::new(base, crate::record::RecordId::new(0));
        self.pointers
            .range((Bound::Included(start), Bound::Unbounded))
            .take_while(move |(identity, _)| identity.base() == base)
            .filter(move |(_, pointers)| pointers.get(stage).is_some())
            .map(|(identity, _)| identity)
    }

    pub fn len(&self) -> usize {
        self.pointers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pointers.is_empty()
    }
}
