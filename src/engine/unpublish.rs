//! Unpublish and archive
//!
//! Taking a record off LIVE also takes down everything that owns it, on
//! the assumption that an owner's published state depends on what it owns.
//! Owned records are never touched.

use std::iter;

use super::core::{Engine, Subject};
use super::errors::EngineResult;
use crate::authority::{Actor, PublishAction};
use crate::observability::{log_event, AuditAction, Event, ObservationScope};
use crate::record::{RecordKey, Stage};

impl Engine {
    /// Removes `key` and, transitively, its owners from LIVE. DRAFT is
    /// untouched. Returns false when `key` was not published.
    pub fn unpublish(&mut self, actor: &Actor, key: &RecordKey) -> EngineResult<bool> {
        self.gated(actor, AuditAction::Unpublish, Subject::Record(key), |engine| {
            let (key, _) = engine.resolve(key)?;
            engine.authorize(actor, PublishAction::Unpublish, key.type_name())?;
            if !engine.is_published(&key) {
                return Ok(false);
            }

            let scope = ObservationScope::with_fields("UNPUBLISH", vec![("record", key.to_string())]);
            let result = engine.atomically("UNPUBLISH", |engine| engine.unpublish_cascade(actor, &key));
            match &result {
                Ok(removed) => {
                    scope.complete_with_fields(&[("unpublished", &removed.len().to_string())])
                }
                Err(err) => scope.fail(&err.to_string()),
            }
            result.map(|_| true)
        })
    }

    /// Removes `key` from both stages, unpublishing its owners when it was
    /// live. History is kept. Returns false when it was on neither stage.
    pub fn archive(&mut self, actor: &Actor, key: &RecordKey) -> EngineResult<bool> {
        self.gated(actor, AuditAction::Archive, Subject::Record(key), |engine| {
            let (key, identity) = engine.resolve(key)?;
            engine.authorize(actor, PublishAction::Archive, key.type_name())?;

            let on_draft = engine.state.exists(&identity, Stage::Draft);
            let on_live = engine.state.exists(&identity, Stage::Live);
            if !on_draft && !on_live {
                return Ok(false);
            }

            engine.atomically("ARCHIVE", |engine| {
                if on_live {
                    engine.unpublish_cascade(actor, &key)?;
                }
                engine.state.unbind(&identity, Stage::Draft);
                engine.metrics.increment_archives();
                log_event(
                    Event::RecordArchived,
                    &[
                        ("record", &key.to_string()),
                        ("was_live", if on_live { "true" } else { "false" }),
                    ],
                );
                Ok(true)
            })
        })
    }

    /// Owners are resolved on LIVE before anything is removed.
    fn unpublish_cascade(&mut self, actor: &Actor, key: &RecordKey) -> EngineResult<Vec<RecordKey>> {
        let owners = self.graph().find_owners(key, Stage::Live, true)?;
        for owner in &owners {
            self.authorize(actor, PublishAction::Unpublish, owner.type_name())?;
        }

        let mut unpublished = Vec::new();
        for record in iter::once(key.clone()).chain(owners) {
            for (removed, version) in self.remove_from_live(&record)? {
                self.metrics.increment_unpublishes();
                log_event(
                    Event::RecordUnpublished,
                    &[
                        ("record", &removed.to_string()),
                        ("trigger", &key.to_string()),
                        ("live_version", &version.to_string()),
                    ],
                );
                unpublished.push(removed);
            }
        }
        Ok(unpublished)
    }
}
