//! Revert to live and rollback
//!
//! Both rebind DRAFT to versions that already exist instead of writing
//! copies, and both cascade over what the record owns on DRAFT.
//!
//! Rollback picks, for each owned record, the version that was bound on
//! DRAFT when the target version was written. Ownership is read from the
//! current graph; it is not reconstructed as it was at that time.

use serde::Serialize;
use serde_json::Value;

use super::core::{Engine, Subject};
use super::errors::{EngineError, EngineResult};
use crate::authority::{Actor, PublishAction};
use crate::graph::OwnershipLink;
use crate::observability::{log_event, AuditAction, Event, ObservationScope};
use crate::record::{RecordKey, Stage};
use crate::version::VersionNumber;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RevertOutcome {
    /// Records whose DRAFT was rebound to their LIVE version.
    pub reverted: Vec<RecordKey>,
    /// Draft-only owned records detached from their owner.
    pub unlinked: Vec<RecordKey>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollbackOutcome {
    pub record: RecordKey,
    pub version: VersionNumber,
    /// Owned records and the version each was rolled back to.
    pub owned: Vec<(RecordKey, VersionNumber)>,
    /// Owned records that did not exist on DRAFT at that point.
    pub skipped: Vec<RecordKey>,
}

impl Engine {
    /// Replaces DRAFT with LIVE for `key` and everything it owns.
    pub fn revert_to_live(&mut self, actor: &Actor, key: &RecordKey) -> EngineResult<RevertOutcome> {
        self.gated(actor, AuditAction::RevertToLive, Subject::Record(key), |engine| {
            let (key, _) = engine.resolve(key)?;
            engine.authorize(actor, PublishAction::Revert, key.type_name())?;
            if !engine.is_published(&key) {
                return Err(EngineError::NotOnLive(key));
            }

            let scope = ObservationScope::with_fields("REVERT_TO_LIVE", vec![("record", key.to_string())]);
            let result = engine.atomically("REVERT_TO_LIVE", |engine| engine.revert_tree(actor, &key));
            match &result {
                Ok(outcome) => scope.complete_with_fields(&[
                    ("reverted", &outcome.reverted.len().to_string()),
                    ("unlinked", &outcome.unlinked.len().to_string()),
                ]),
                Err(err) => scope.fail(&err.to_string()),
            }
            result
        })
    }

    fn revert_tree(&mut self, actor: &Actor, root: &RecordKey) -> EngineResult<RevertOutcome> {
        let draft_links = self.graph().find_owned_links(root, Stage::Draft, true)?;
        let live_owned = self.graph().find_owned(root, Stage::Live, true)?;

        let mut outcome = RevertOutcome::default();
        for record in std::iter::once(root.clone()).chain(live_owned) {
            if self.revert_one(&record)? {
                outcome.reverted.push(record);
            }
        }

        for link in draft_links {
            if self.is_published(&link.record) {
                if self.revert_one(&link.record)? {
                    outcome.reverted.push(link.record);
                }
            } else if self.is_published(&link.via) && self.unlink(actor, &link)? {
                outcome.unlinked.push(link.record);
            }
        }
        Ok(outcome)
    }

    /// Rebinds DRAFT to the LIVE version. False when they already match.
    fn revert_one(&mut self, key: &RecordKey) -> EngineResult<bool> {
        let identity = self.schema.identity_of(key)?;
        let Some(live) = self.state.current(&identity, Stage::Live) else {
            return Ok(false);
        };
        if self.state.current(&identity, Stage::Draft) == Some(live) {
            return Ok(false);
        }

        self.state.bind(&identity, Stage::Draft, live)?;
        self.metrics.increment_reverts();
        log_event(
            Event::RecordReverted,
            &[("record", &key.to_string()), ("version", &live.to_string())],
        );
        self.refresh_dependents(key, Stage::Draft, None)?;
        Ok(true)
    }

    /// Clears the owned record's link field on DRAFT.
    fn unlink(&mut self, actor: &Actor, link: &OwnershipLink) -> EngineResult<bool> {
        let Some(field) = &link.link_field else {
            return Ok(false);
        };
        let identity = self.schema.identity_of(&link.record)?;
        let Some(mut fields) = self.state.snapshot(&identity, Stage::Draft).cloned() else {
            return Ok(false);
        };
        if fields.get(field).map_or(true, Value::is_null) {
            return Ok(false);
        }

        fields.insert(field.clone(), Value::Null);
        let version = self.state.write_version(
            &identity,
            link.record.type_name(),
            fields,
            Stage::Draft,
            actor.user_id,
        );
        self.metrics.increment_version_writes();
        log_event(
            Event::OwnedRecordUnlinked,
            &[
                ("record", &link.record.to_string()),
                ("owner", &link.via.to_string()),
                ("field", field),
                ("version", &version.to_string()),
            ],
        );
        Ok(true)
    }

    /// Binds DRAFT to historical `version` of `key`, and each record it owns
    /// to the version it had on DRAFT when `version` was written.
    pub fn rollback_to(
        &mut self,
        actor: &Actor,
        key: &RecordKey,
        version: VersionNumber,
    ) -> EngineResult<RollbackOutcome> {
        self.gated(actor, AuditAction::Rollback, Subject::Record(key), |engine| {
            let (key, identity) = engine.resolve(key)?;
            engine.authorize(actor, PublishAction::Rollback, key.type_name())?;
            if engine.state.versions().get(&identity, version).is_err() {
                return Err(EngineError::VersionNotFound {
                    record: key,
                    version,
                });
            }

            let scope = ObservationScope::with_fields(
                "ROLLBACK",
                vec![("record", key.to_string()), ("version", version.to_string())],
            );
            let result = engine.atomically("ROLLBACK", |engine| engine.rollback_tree(&key, version));
            match &result {
                Ok(outcome) => scope.complete_with_fields(&[
                    ("owned", &outcome.owned.len().to_string()),
                    ("skipped", &outcome.skipped.len().to_string()),
                ]),
                Err(err) => scope.fail(&err.to_string()),
            }
            result
        })
    }

    fn rollback_tree(&mut self, root: &RecordKey, version: VersionNumber) -> EngineResult<RollbackOutcome> {
        let identity = self.schema.identity_of(root)?;
        let sequence = self.state.versions().get(&identity, version)?.sequence();
        let owned = self.graph().find_owned(root, Stage::Draft, true)?;

        self.state.bind(&identity, Stage::Draft, version)?;
        self.metrics.increment_rollbacks();
        log_event(
            Event::RecordRolledBack,
            &[("record", &root.to_string()), ("version", &version.to_string())],
        );

        let mut outcome = RollbackOutcome {
            record: root.clone(),
            version,
            owned: Vec::new(),
            skipped: Vec::new(),
        };

        for record in owned {
            let owned_identity = self.schema.identity_of(&record)?;
            let Some(past) = self
                .state
                .stages()
                .bound_at(&owned_identity, Stage::Draft, sequence)
            else {
                outcome.skipped.push(record);
                continue;
            };

            if self.state.current(&owned_identity, Stage::Draft) != Some(past) {
                self.state.bind(&owned_identity, Stage::Draft, past)?;
                log_event(
                    Event::RecordRolledBack,
                    &[
                        ("record", &record.to_string()),
                        ("version", &past.to_string()),
                        ("owner", &root.to_string()),
                    ],
                );
            }
            outcome.owned.push((record, past));
        }

        self.refresh_dependents(root, Stage::Draft, None)?;
        Ok(outcome)
    }
}
