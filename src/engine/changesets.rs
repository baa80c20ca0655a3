//! ChangeSet operations
//!
//! Implicit membership is recomputed from the ownership graph on every
//! membership change and again right before publishing, so a changeset is
//! never published against a stale item set.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::core::{Engine, Subject};
use super::errors::{EngineError, EngineResult};
use crate::authority::{Actor, PublishAction};
use crate::changeset::{ChangeSet, ChangeSetId, ChangeSetItem, ChangeType, ImplicitMembers, SyncOutcome};
use crate::observability::{log_event, AuditAction, Event, ObservationScope};
use crate::record::{RecordKey, Stage};
use crate::version::VersionNumber;

/// Type name changesets are authorized under.
pub const CHANGESET_TYPE: &str = "ChangeSet";

/// An item together with its pending change, computed at read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemStatus {
    pub item: ChangeSetItem,
    pub change: ChangeType,
}

/// LIVE pointer of each record before and after a changeset publish.
struct LiveMoves(BTreeMap<RecordKey, (Option<VersionNumber>, Option<VersionNumber>)>);

impl LiveMoves {
    fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Keeps the first `before` seen for a record and the latest `after`.
    fn note(&mut self, record: RecordKey, before: Option<VersionNumber>, after: Option<VersionNumber>) {
        self.0
            .entry(record)
            .and_modify(|(_, last)| *last = after)
            .or_insert((before, after));
    }
}

impl Engine {
    pub fn create_changeset(&mut self, actor: &Actor, title: &str) -> EngineResult<ChangeSetId> {
        self.gated(actor, AuditAction::ChangeSetCreate, Subject::Type(CHANGESET_TYPE), |engine| {
            engine.authorize(actor, PublishAction::ManageChangeSet, CHANGESET_TYPE)?;
            engine.atomically("CHANGESET_CREATE", |engine| {
                let id = engine.state.create_changeset(title, actor.user_id);
                log_event(
                    Event::ChangeSetCreated,
                    &[("changeset", &id.to_string()), ("title", title)],
                );
                Ok(id)
            })
        })
    }

    pub fn changeset(&self, id: ChangeSetId) -> EngineResult<&ChangeSet> {
        self.state
            .changeset(id)
            .ok_or(EngineError::UnknownChangeSet(id))
    }

    pub fn changesets(&self) -> impl Iterator<Item = &ChangeSet> {
        self.state.changesets()
    }

    fn changeset_mut(&mut self, id: ChangeSetId) -> EngineResult<&mut ChangeSet> {
        self.state
            .changeset_mut(id)
            .ok_or(EngineError::UnknownChangeSet(id))
    }

    /// Adds `key` as an explicit item and re-syncs. Returns false when it
    /// already was explicit.
    pub fn add_object(&mut self, actor: &Actor, id: ChangeSetId, key: &RecordKey) -> EngineResult<bool> {
        self.gated(actor, AuditAction::ChangeSetAdd, Subject::ChangeSet(id), |engine| {
            engine.authorize(actor, PublishAction::ManageChangeSet, CHANGESET_TYPE)?;
            let (key, _) = engine.resolve(key)?;
            engine.changeset(id)?.ensure_open()?;

            engine.atomically("CHANGESET_ADD", |engine| {
                let added = engine.changeset_mut(id)?.add_explicit(key)?;
                engine.sync_changeset(id)?;
                Ok(added)
            })
        })
    }

    /// Removes an explicit item and re-syncs, dropping implicit items only
    /// it pulled in.
    pub fn remove_object(&mut self, actor: &Actor, id: ChangeSetId, key: &RecordKey) -> EngineResult<()> {
        self.gated(actor, AuditAction::ChangeSetRemove, Subject::ChangeSet(id), |engine| {
            engine.authorize(actor, PublishAction::ManageChangeSet, CHANGESET_TYPE)?;
            let (key, _) = engine.resolve(key)?;
            engine.changeset(id)?.ensure_open()?;

            engine.atomically("CHANGESET_REMOVE", |engine| {
                engine.changeset_mut(id)?.remove_explicit(&key)?;
                engine.sync_changeset(id)?;
                Ok(())
            })
        })
    }

    pub fn sync(&mut self, actor: &Actor, id: ChangeSetId) -> EngineResult<SyncOutcome> {
        self.gated(actor, AuditAction::ChangeSetSync, Subject::ChangeSet(id), |engine| {
            engine.authorize(actor, PublishAction::ManageChangeSet, CHANGESET_TYPE)?;
            engine.changeset(id)?.ensure_open()?;
            engine.atomically("CHANGESET_SYNC", |engine| engine.sync_changeset(id))
        })
    }

    /// True when a sync would change nothing.
    pub fn is_synced(&self, id: ChangeSetId) -> EngineResult<bool> {
        let implicit = self.implicit_members(id)?;
        Ok(self.changeset(id)?.is_synced_with(&implicit))
    }

    /// Everything the explicit roots own on DRAFT, plus what they own on
    /// LIVE that has been deleted from DRAFT, mapped to the roots reaching
    /// it. Explicit roots are never implicit members.
    pub fn implicit_members(&self, id: ChangeSetId) -> EngineResult<ImplicitMembers> {
        let roots = self.changeset(id)?.explicit_roots();
        let explicit: BTreeSet<&RecordKey> = roots.iter().collect();
        let graph = self.graph();

        let mut implicit = ImplicitMembers::new();
        for root in &roots {
            let on_draft = graph.find_owned(root, Stage::Draft, true)?;
            let live_only = graph
                .find_owned(root, Stage::Live, true)?
                .into_iter()
                .filter(|key| !self.is_on_draft(key));

            for owned in on_draft.into_iter().chain(live_only) {
                if explicit.contains(&owned) {
                    continue;
                }
                implicit.entry(owned).or_default().insert(root.clone());
            }
        }
        Ok(implicit)
    }

    fn sync_changeset(&mut self, id: ChangeSetId) -> EngineResult<SyncOutcome> {
        let implicit = self.implicit_members(id)?;
        let outcome = self.changeset_mut(id)?.apply_sync(&implicit)?;
        self.metrics.increment_syncs();
        if !outcome.is_empty() {
            log_event(
                Event::ChangeSetSynced,
                &[
                    ("changeset", &id.to_string()),
                    ("added", &outcome.added.len().to_string()),
                    ("removed", &outcome.removed.len().to_string()),
                    ("relinked", &outcome.relinked.len().to_string()),
                ],
            );
        }
        Ok(outcome)
    }

    /// Items with their computed change type.
    pub fn changes(&self, id: ChangeSetId) -> EngineResult<Vec<ItemStatus>> {
        Ok(self
            .changeset(id)?
            .items()
            .iter()
            .map(|item| ItemStatus {
                change: self.change_type(item.object()),
                item: item.clone(),
            })
            .collect())
    }

    pub fn has_changes(&self, id: ChangeSetId) -> EngineResult<bool> {
        Ok(self
            .changes(id)?
            .iter()
            .any(|status| status.change.is_pending()))
    }

    /// Publishes every item in one transaction: items on DRAFT are copied
    /// to LIVE, items deleted from DRAFT are removed from LIVE. Any failure
    /// leaves both the records and the changeset as they were.
    pub fn publish_changeset(&mut self, actor: &Actor, id: ChangeSetId) -> EngineResult<Vec<ChangeSetItem>> {
        self.gated(actor, AuditAction::ChangeSetPublish, Subject::ChangeSet(id), |engine| {
            engine.authorize(actor, PublishAction::ManageChangeSet, CHANGESET_TYPE)?;
            engine.changeset(id)?.ensure_open()?;

            let scope = ObservationScope::with_fields(
                "CHANGESET_PUBLISH",
                vec![("changeset", id.to_string())],
            );
            let result = engine.atomically("CHANGESET_PUBLISH", |engine| engine.publish_items(actor, id));
            match &result {
                Ok(items) => scope.complete_with_fields(&[("items", &items.len().to_string())]),
                Err(err) => scope.fail(&err.to_string()),
            }
            result
        })
    }

    fn publish_items(&mut self, actor: &Actor, id: ChangeSetId) -> EngineResult<Vec<ChangeSetItem>> {
        self.sync_changeset(id)?;

        // Sources before the records derived from them
        let (derived, plain): (Vec<RecordKey>, Vec<RecordKey>) = self
            .changeset(id)?
            .items()
            .iter()
            .map(|item| item.object().clone())
            .partition(|key| self.schema.is_derived(key.type_name()));

        let mut moves = LiveMoves::new();
        // Derived records moved on LIVE by their source, with that source
        let mut cascaded = Vec::new();
        for object in plain.into_iter().chain(derived) {
            self.authorize(actor, PublishAction::Publish, object.type_name())?;
            let before = self.current_version(&object, Stage::Live);

            if self.is_on_draft(&object) {
                if !self.change_type(&object).is_pending() {
                    moves.note(object, before, before);
                    continue;
                }
                let dependents: Vec<_> = self
                    .dependents_of(&object, Stage::Live)?
                    .into_iter()
                    .map(|dependent| {
                        let live = self.current_version(&dependent, Stage::Live);
                        (dependent, live)
                    })
                    .collect();

                let after = self.publish_one(&object, actor.user_id)?;
                moves.note(object.clone(), before, Some(after));

                for (dependent, live_before) in dependents {
                    let live_after = self.current_version(&dependent, Stage::Live);
                    if live_after != live_before {
                        moves.note(dependent.clone(), live_before, live_after);
                        cascaded.push((dependent, object.clone()));
                    }
                }
            } else {
                for (removed, previous) in self.remove_from_live(&object)? {
                    if removed != object {
                        cascaded.push((removed.clone(), object.clone()));
                    }
                    moves.note(removed, Some(previous), None);
                }
                moves.note(object, before, None);
            }
        }

        let changeset = self.changeset_mut(id)?;
        for (record, source) in cascaded {
            changeset.add_cascaded(record, source);
        }
        for (object, (before, after)) in moves.0 {
            if let Some(item) = changeset.item_mut(&object) {
                item.record_publish(before, after);
            }
        }
        changeset.mark_published(actor.user_id)?;
        let items = changeset.items().to_vec();

        self.metrics.increment_changeset_publishes();
        log_event(
            Event::ChangeSetPublished,
            &[
                ("changeset", &id.to_string()),
                ("items", &items.len().to_string()),
            ],
        );
        Ok(items)
    }

    /// Restores each item's LIVE pointer to what it was before the
    /// changeset was published. Only a PUBLISHED changeset can be reverted.
    pub fn revert_changeset(&mut self, actor: &Actor, id: ChangeSetId) -> EngineResult<()> {
        self.gated(actor, AuditAction::ChangeSetRevert, Subject::ChangeSet(id), |engine| {
            engine.authorize(actor, PublishAction::ManageChangeSet, CHANGESET_TYPE)?;
            engine.atomically("CHANGESET_REVERT", |engine| {
                let changeset = engine.changeset_mut(id)?;
                changeset.mark_reverted()?;
                let restores: Vec<_> = changeset
                    .items()
                    .iter()
                    .map(|item| (item.object().clone(), item.live_before()))
                    .collect();

                for (object, before) in &restores {
                    let identity = engine.schema.identity_of(object)?;
                    match before {
                        Some(version) => {
                            engine.state.bind(&identity, Stage::Live, *version)?;
                        }
                        None => {
                            engine.state.unbind(&identity, Stage::Live);
                        }
                    }
                }

                engine.metrics.increment_changeset_reverts();
                log_event(
                    Event::ChangeSetReverted,
                    &[
                        ("changeset", &id.to_string()),
                        ("items", &restores.len().to_string()),
                    ],
                );
                Ok(())
            })
        })
    }
}
