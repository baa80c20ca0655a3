//! Publishing
//!
//! Publishing writes the draft snapshot to LIVE as a new version. When the
//! live snapshot equals the draft, DRAFT is rebound to that version as well,
//! so both stages point at the same version afterwards. The two only differ
//! for derived records whose source differs between stages.
//!
//! `publish_recursive` publishes the root, then fans out over everything
//! the root owns. A failing owned record is skipped and reported; records
//! already published in the same call stay published.

use serde::Serialize;
use uuid::Uuid;

use super::core::{Engine, Subject};
use super::errors::{EngineError, EngineResult};
use crate::authority::{Actor, PublishAction};
use crate::changeset::{ChangeSetId, ImplicitMembers};
use crate::observability::{log_event, AuditAction, Event, ObservationScope};
use crate::record::{RecordKey, Stage};
use crate::version::VersionNumber;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedRecord {
    pub record: RecordKey,
    pub before: Option<VersionNumber>,
    pub after: VersionNumber,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemovedRecord {
    pub record: RecordKey,
    pub before: VersionNumber,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishFailure {
    pub record: RecordKey,
    pub code: &'static str,
    pub message: String,
}

impl PublishFailure {
    fn new(record: RecordKey, err: &EngineError) -> Self {
        Self {
            record,
            code: err.code(),
            message: err.to_string(),
        }
    }
}

/// Outcome of a recursive publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishReport {
    pub root: RecordKey,
    /// Root first, then owned records in publish order.
    pub published: Vec<PublishedRecord>,
    /// Owned records that were deleted from draft, and derived records that
    /// went down with them.
    pub removed: Vec<RemovedRecord>,
    /// Owned records with nothing to publish.
    pub unchanged: Vec<RecordKey>,
    pub failures: Vec<PublishFailure>,
    /// Changeset recording this publish, when enabled.
    pub changeset: Option<ChangeSetId>,
}

impl PublishReport {
    fn new(root: RecordKey) -> Self {
        Self {
            root,
            published: Vec::new(),
            removed: Vec::new(),
            unchanged: Vec::new(),
            failures: Vec::new(),
            changeset: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// LIVE version `record` was published as.
    pub fn published_version(&self, record: &RecordKey) -> Option<VersionNumber> {
        self.published
            .iter()
            .find(|published| &published.record == record)
            .map(|published| published.after)
    }

    pub fn was_removed(&self, record: &RecordKey) -> bool {
        self.removed.iter().any(|removed| &removed.record == record)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl Engine {
    /// Publishes one record. Fails without writing when the record is not
    /// on draft, or is derived and its source is not live.
    pub fn publish(&mut self, actor: &Actor, key: &RecordKey) -> EngineResult<VersionNumber> {
        self.gated(actor, AuditAction::Publish, Subject::Record(key), |engine| {
            let (key, _) = engine.resolve(key)?;
            engine.authorize(actor, PublishAction::Publish, key.type_name())?;
            engine.ensure_publishable(&key)?;

            engine.atomically("PUBLISH", |engine| engine.publish_one(&key, actor.user_id))
        })
    }

    pub(crate) fn publish_one(
        &mut self,
        key: &RecordKey,
        author: Option<Uuid>,
    ) -> EngineResult<VersionNumber> {
        self.ensure_publishable(key)?;
        let identity = self.schema.identity_of(key)?;
        let draft = self
            .state
            .version_on(&identity, Stage::Draft)
            .ok_or_else(|| EngineError::NotOnDraft(key.clone()))?;
        let draft_number = draft.number();
        let draft_fields = draft.fields().clone();
        let before = self.state.current(&identity, Stage::Live);

        let mut fields = draft_fields.clone();
        self.mirror_source(key.type_name(), &mut fields, Stage::Live);

        // LIVE shares the draft version unless mirroring changed the snapshot
        let version = if fields == draft_fields {
            if before != Some(draft_number) {
                self.state.bind(&identity, Stage::Live, draft_number)?;
            }
            draft_number
        } else {
            self.metrics.increment_version_writes();
            self.state
                .write_version(&identity, key.type_name(), fields, Stage::Live, author)
        };
        self.metrics.increment_publishes();

        log_event(
            Event::RecordPublished,
            &[
                ("record", &key.to_string()),
                ("draft_version", &draft_number.to_string()),
                ("live_before", &VersionNumber::or_zero(before).to_string()),
                ("version", &version.to_string()),
            ],
        );

        self.refresh_dependents(key, Stage::Live, author)?;
        Ok(version)
    }

    /// Publishes `key` and then every record it owns that has a pending
    /// change. Owned records deleted from draft are removed from LIVE.
    pub fn publish_recursive(
        &mut self,
        actor: &Actor,
        key: &RecordKey,
    ) -> EngineResult<PublishReport> {
        self.gated(actor, AuditAction::PublishRecursive, Subject::Record(key), |engine| {
            let (root, _) = engine.resolve(key)?;
            engine.authorize(actor, PublishAction::Publish, root.type_name())?;
            engine.ensure_publishable(&root)?;

            let scope = ObservationScope::with_fields(
                "PUBLISH_RECURSIVE",
                vec![("record", root.to_string())],
            );
            let result =
                engine.atomically("PUBLISH_RECURSIVE", |engine| engine.publish_tree(actor, &root));

            match &result {
                Ok(report) => scope.complete_with_fields(&[
                    ("published", &report.published.len().to_string()),
                    ("removed", &report.removed.len().to_string()),
                    ("failed", &report.failures.len().to_string()),
                ]),
                Err(err) => scope.fail(&err.to_string()),
            }
            result
        })
    }

    fn publish_tree(&mut self, actor: &Actor, root: &RecordKey) -> EngineResult<PublishReport> {
        // Both stages are read before anything is written.
        let owned_draft = self.graph().find_owned(root, Stage::Draft, true)?;
        let owned_live = self.graph().find_owned(root, Stage::Live, true)?;

        let mut report = PublishReport::new(root.clone());
        let before = self.current_version(root, Stage::Live);
        let after = self.publish_one(root, actor.user_id)?;
        report.published.push(PublishedRecord {
            record: root.clone(),
            before,
            after,
        });

        // Sources before the records derived from them
        let (derived, plain): (Vec<_>, Vec<_>) = owned_draft
            .into_iter()
            .partition(|key| self.schema.is_derived(key.type_name()));

        for child in plain.into_iter().chain(derived) {
            if !self.change_type(&child).is_pending() {
                report.unchanged.push(child);
                continue;
            }
            let before = self.current_version(&child, Stage::Live);
            let result = self
                .authorize(actor, PublishAction::Publish, child.type_name())
                .and_then(|_| self.attempt(|engine| engine.publish_one(&child, actor.user_id)));
            match result {
                Ok(after) => report.published.push(PublishedRecord {
                    record: child,
                    before,
                    after,
                }),
                Err(err) => report.failures.push(PublishFailure::new(child, &err)),
            }
        }

        for child in owned_live {
            if self.is_on_draft(&child) {
                continue;
            }
            let result = self
                .authorize(actor, PublishAction::Publish, child.type_name())
                .and_then(|_| self.attempt(|engine| engine.remove_from_live(&child)));
            match result {
                Ok(removed) => report.removed.extend(
                    removed
                        .into_iter()
                        .map(|(record, before)| RemovedRecord { record, before }),
                ),
                Err(err) => report.failures.push(PublishFailure::new(child, &err)),
            }
        }

        if !report.is_complete() {
            let failed: Vec<String> = report
                .failures
                .iter()
                .map(|failure| failure.record.to_string())
                .collect();
            log_event(
                Event::RecursivePublishPartial,
                &[("record", &root.to_string()), ("failed", &failed.join(","))],
            );
        }

        if self.config.record_recursive_publishes {
            report.changeset = Some(self.record_publish(actor, &report)?);
        }
        Ok(report)
    }

    /// Stores a PUBLISHED changeset describing a recursive publish.
    fn record_publish(&mut self, actor: &Actor, report: &PublishReport) -> EngineResult<ChangeSetId> {
        let mut implicit = ImplicitMembers::new();
        let owned = report
            .published
            .iter()
            .skip(1)
            .map(|published| &published.record)
            .chain(report.removed.iter().map(|removed| &removed.record));
        for record in owned {
            implicit
                .entry(record.clone())
                .or_default()
                .insert(report.root.clone());
        }

        let title = format!("Publish {}", report.root);
        let id = self.state.create_changeset(&title, actor.user_id);
        let changeset = self
            .state
            .changeset_mut(id)
            .ok_or(EngineError::UnknownChangeSet(id))?;
        changeset.add_explicit(report.root.clone())?;
        changeset.apply_sync(&implicit)?;

        for published in &report.published {
            if let Some(item) = changeset.item_mut(&published.record) {
                item.record_publish(published.before, Some(published.after));
            }
        }
        for removed in &report.removed {
            if let Some(item) = changeset.item_mut(&removed.record) {
                item.record_publish(Some(removed.before), None);
            }
        }
        changeset.mark_published(actor.user_id)?;

        log_event(
            Event::ChangeSetCreated,
            &[
                ("changeset", &id.to_string()),
                ("title", &title),
                ("state", changeset.state().as_str()),
            ],
        );
        Ok(id)
    }
}
