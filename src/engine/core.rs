//! Engine - entry point for staged record IO
//!
//! Owns the schema, the ownership edge table and the complete `StoreState`.
//! Every mutating operation runs inside `atomically`: the state is
//! checkpointed first and restored on any error, so a failed operation
//! leaves no visible change. Committed state is saved when a data
//! directory is configured.
//!
//! Gated operations go through `gated`, which appends one audit record per
//! call whatever the outcome.

use uuid::Uuid;

use super::errors::{EngineError, EngineResult};
use crate::authority::{Actor, AllowAll, PublishAction, PublishAuthority};
use crate::changeset::{ChangeSetId, ChangeType};
use crate::config::{ConfigError, EngineConfig};
use crate::graph::{OwnershipGraph, RelationResolver, SchemaResolver};
use crate::observability::{
    log_event, AuditAction, AuditLog, AuditOutcome, AuditRecord, Event, FileAuditLog, Logger,
    MetricsRegistry,
};
use crate::record::{Fields, Identity, RecordKey, Stage};
use crate::schema::{OwnershipTable, Schema, SchemaLoader};
use crate::storage::{StageView, StateFile, StorageError, StorageResult, StoreState};
use crate::version::{Version, VersionNumber};

/// What an audited operation acted on.
#[derive(Clone, Copy)]
pub(crate) enum Subject<'a> {
    Record(&'a RecordKey),
    ChangeSet(ChangeSetId),
    Type(&'a str),
}

pub struct Engine {
    pub(super) schema: Schema,
    pub(super) ownership: OwnershipTable,
    pub(super) state: StoreState,
    pub(super) resolver: Box<dyn RelationResolver>,
    authority: Box<dyn PublishAuthority>,
    audit: Option<Box<dyn AuditLog>>,
    pub(super) metrics: MetricsRegistry,
    pub(super) config: EngineConfig,
    state_file: Option<StateFile>,
}

impl Engine {
    /// In-memory engine with default configuration.
    pub fn new(schema: Schema) -> Self {
        let ownership = OwnershipTable::build(&schema);
        Self {
            schema,
            ownership,
            state: StoreState::new(),
            resolver: Box::new(SchemaResolver::new()),
            authority: Box::new(AllowAll),
            audit: None,
            metrics: MetricsRegistry::new(),
            config: EngineConfig::default(),
            state_file: None,
        }
    }

    /// Builds an engine from `config`, reloading saved state from its data
    /// directory. A corrupt state file fails startup.
    pub fn with_config(schema: Schema, config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        Logger::set_min_severity(config.severity()?);

        let mut engine = Self::new(schema);

        if let Some(dir) = &config.data_dir {
            let file = StateFile::in_dir(dir);
            let path = file.path().display().to_string();
            match file.load() {
                Ok(Some(state)) => {
                    log_event(
                        Event::StateLoaded,
                        &[
                            ("path", &path),
                            ("versions", &state.versions().version_count().to_string()),
                        ],
                    );
                    engine.state = state;
                }
                Ok(None) => {}
                Err(err) => {
                    if err.is_fatal() {
                        log_event(
                            Event::StateCorrupted,
                            &[("path", &path), ("reason", &err.to_string())],
                        );
                    }
                    return Err(err.into());
                }
            }
            engine.state_file = Some(file);
        }

        if let Some(path) = &config.audit_log_path {
            let log = FileAuditLog::open(path).map_err(|e| StorageError::io(path, e))?;
            engine.audit = Some(Box::new(log));
        }

        engine.config = config;
        Ok(engine)
    }

    /// Loads the schema named by `config.schema_path`, then behaves like
    /// `with_config`.
    pub fn open(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        Logger::set_min_severity(config.severity()?);

        let schema_path = config
            .schema_path
            .clone()
            .ok_or_else(|| ConfigError::Invalid("schema_path is required".into()))?;
        log_event(
            Event::ConfigLoaded,
            &[("schema_path", &schema_path.display().to_string())],
        );

        let schema = SchemaLoader::new(&schema_path).load()?;
        log_event(Event::SchemaLoaded, &[("types", &schema.len().to_string())]);

        Self::with_config(schema, config)
    }

    pub fn with_resolver(mut self, resolver: impl RelationResolver + 'static) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    pub fn with_authority(mut self, authority: impl PublishAuthority + 'static) -> Self {
        self.authority = Box::new(authority);
        self
    }

    pub fn with_audit_log(mut self, audit: impl AuditLog + 'static) -> Self {
        self.audit = Some(Box::new(audit));
        self
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn ownership(&self) -> &OwnershipTable {
        &self.ownership
    }

    pub fn state(&self) -> &StoreState {
        &self.state
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    pub fn view(&self) -> StageView<'_> {
        StageView::new(&self.state, &self.schema)
    }

    pub(crate) fn graph(&self) -> OwnershipGraph<'_> {
        OwnershipGraph::new(self.view(), &self.ownership, self.resolver.as_ref())
    }

    // =========================================================================
    // TRANSACTIONS
    // =========================================================================

    /// Runs `f` as one transaction. On error, or when saving the committed
    /// state fails, the state is restored to what it was before `f` ran.
    pub(crate) fn atomically<T>(
        &mut self,
        operation: &'static str,
        f: impl FnOnce(&mut Self) -> EngineResult<T>,
    ) -> EngineResult<T> {
        let checkpoint = self.state.clone();
        let result = f(self).and_then(|value| {
            self.persist()?;
            Ok(value)
        });

        if let Err(err) = &result {
            self.state = checkpoint;
            self.metrics.increment_rolled_back_transactions();
            log_event(
                Event::TransactionRolledBack,
                &[
                    ("operation", operation),
                    ("code", err.code()),
                    ("reason", &err.to_string()),
                ],
            );
        }
        result
    }

    /// Runs `f` inside an enclosing transaction, undoing only its own writes
    /// when it fails.
    pub(crate) fn attempt<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> EngineResult<T>,
    ) -> EngineResult<T> {
        let checkpoint = self.state.clone();
        let result = f(self);
        if result.is_err() {
            self.state = checkpoint;
        }
        result
    }

    fn persist(&self) -> StorageResult<()> {
        let Some(file) = &self.state_file else {
            return Ok(());
        };
        file.save(&self.state)?;
        self.metrics.increment_state_saves();
        log_event(
            Event::StatePersisted,
            &[
                ("path", &file.path().display().to_string()),
                ("sequence", &self.state.sequence().to_string()),
            ],
        );
        Ok(())
    }

    // =========================================================================
    // GATING AND AUDIT
    // =========================================================================

    /// Runs a gated operation and audits its outcome.
    pub(crate) fn gated<T>(
        &mut self,
        actor: &Actor,
        action: AuditAction,
        subject: Subject<'_>,
        f: impl FnOnce(&mut Self) -> EngineResult<T>,
    ) -> EngineResult<T> {
        let result = f(self);
        let outcome = match &result {
            Ok(_) => AuditOutcome::Success,
            Err(err) if err.is_rejection() => AuditOutcome::Rejected,
            Err(_) => AuditOutcome::Failed,
        };

        if let Err(err) = &result {
            if outcome == AuditOutcome::Rejected {
                self.metrics.increment_rejected_operations();
                log_event(
                    Event::OperationRejected,
                    &[
                        ("action", action.as_str()),
                        ("code", err.code()),
                        ("reason", &err.to_string()),
                    ],
                );
            }
        }

        self.audit(actor, action, subject, outcome, result.as_ref().err());
        result
    }

    fn audit(
        &self,
        actor: &Actor,
        action: AuditAction,
        subject: Subject<'_>,
        outcome: AuditOutcome,
        error: Option<&EngineError>,
    ) {
        let Some(log) = &self.audit else {
            return;
        };

        let mut record =
            AuditRecord::new(action, outcome).with_actor(actor.user_id, actor.is_service_role);
        record = match subject {
            Subject::Record(key) => record.with_record(key),
            Subject::ChangeSet(id) => record.with_changeset(id.value()),
            Subject::Type(type_name) => record.with_record(type_name),
        };
        if let Some(err) = error {
            record = record.with_error(err.code(), err.to_string());
        }

        if let Err(err) = log.append(&record) {
            Logger::error(
                "AUDIT_APPEND_FAILED",
                &[("action", action.as_str()), ("reason", &err.to_string())],
            );
        }
    }

    pub(crate) fn authorize(
        &self,
        actor: &Actor,
        action: PublishAction,
        type_name: &str,
    ) -> EngineResult<()> {
        Ok(self.authority.check(actor, action, type_name)?)
    }

    // =========================================================================
    // KEYS
    // =========================================================================

    /// Canonical key (concrete stored type) and storage identity of a record
    /// that has been written at least once. `key` may name any ancestor of
    /// the stored type.
    pub(crate) fn resolve(&self, key: &RecordKey) -> EngineResult<(RecordKey, Identity)> {
        let identity = self.schema.identity_of(key)?;
        let latest = self
            .state
            .versions()
            .latest(&identity)
            .ok_or_else(|| EngineError::UnknownRecord(key.clone()))?;
        if !self.schema.is_a(latest.type_name(), key.type_name()) {
            return Err(EngineError::UnknownRecord(key.clone()));
        }
        Ok((RecordKey::with_id(latest.type_name(), identity.id()), identity))
    }

    fn identity(&self, key: &RecordKey) -> Option<Identity> {
        self.schema.identity_of(key).ok()
    }

    // =========================================================================
    // RECORD IO
    // =========================================================================

    /// Creates a record on DRAFT with the next id of its hierarchy.
    pub fn create(
        &mut self,
        actor: &Actor,
        type_name: &str,
        fields: Fields,
    ) -> EngineResult<RecordKey> {
        self.gated(actor, AuditAction::RecordCreate, Subject::Type(type_name), |engine| {
            engine.authorize(actor, PublishAction::Edit, type_name)?;
            engine.schema.check_fields(type_name, &fields)?;

            engine.atomically("CREATE", |engine| {
                let base = engine.schema.base_of(type_name)?.to_string();
                let id = engine.state.allocate_record_id(&base);
                let key = RecordKey::with_id(type_name, id);
                let identity = Identity::new(base, id);

                let mut fields = fields;
                engine.mirror_source(type_name, &mut fields, Stage::Draft);
                let version = engine.state.write_version(
                    &identity,
                    type_name,
                    fields,
                    Stage::Draft,
                    actor.user_id,
                );
                engine.metrics.increment_version_writes();

                log_event(
                    Event::RecordCreated,
                    &[("record", &key.to_string()), ("version", &version.to_string())],
                );
                Ok(key)
            })
        })
    }

    /// Writes `fields` over the record's current draft (or live, when it is
    /// not on draft) and binds DRAFT to the new version.
    pub fn write(
        &mut self,
        actor: &Actor,
        key: &RecordKey,
        fields: Fields,
    ) -> EngineResult<VersionNumber> {
        self.gated(actor, AuditAction::RecordWrite, Subject::Record(key), |engine| {
            let (key, identity) = engine.resolve(key)?;
            engine.authorize(actor, PublishAction::Edit, key.type_name())?;
            engine.schema.check_fields(key.type_name(), &fields)?;

            engine.atomically("WRITE", |engine| {
                engine.write_draft(&key, &identity, fields, actor.user_id)
            })
        })
    }

    pub(crate) fn write_draft(
        &mut self,
        key: &RecordKey,
        identity: &Identity,
        fields: Fields,
        author: Option<Uuid>,
    ) -> EngineResult<VersionNumber> {
        let mut merged = self
            .state
            .snapshot(identity, Stage::Draft)
            .or_else(|| self.state.snapshot(identity, Stage::Live))
            .cloned()
            .unwrap_or_default();
        merged.extend(fields);
        self.mirror_source(key.type_name(), &mut merged, Stage::Draft);

        let version =
            self.state
                .write_version(identity, key.type_name(), merged, Stage::Draft, author);
        self.metrics.increment_version_writes();
        log_event(
            Event::RecordWritten,
            &[("record", &key.to_string()), ("version", &version.to_string())],
        );

        self.refresh_dependents(key, Stage::Draft, author)?;
        Ok(version)
    }

    /// Removes the record from one stage; history is kept. Removing from
    /// LIVE also takes down derived records that depend on it. Returns false
    /// when the record was not on `stage`.
    pub fn delete_from_stage(
        &mut self,
        actor: &Actor,
        key: &RecordKey,
        stage: Stage,
    ) -> EngineResult<bool> {
        let (audit_action, action) = match stage {
            Stage::Draft => (AuditAction::RecordDelete, PublishAction::Edit),
            Stage::Live => (AuditAction::Unpublish, PublishAction::Unpublish),
        };

        self.gated(actor, audit_action, Subject::Record(key), |engine| {
            let (key, identity) = engine.resolve(key)?;
            engine.authorize(actor, action, key.type_name())?;
            if !engine.state.exists(&identity, stage) {
                return Ok(false);
            }

            engine.atomically("DELETE", |engine| {
                match stage {
                    Stage::Draft => {
                        engine.state.unbind(&identity, Stage::Draft);
                        log_event(
                            Event::RecordDeleted,
                            &[("record", &key.to_string()), ("stage", stage.as_str())],
                        );
                    }
                    Stage::Live => {
                        engine.remove_from_live(&key)?;
                    }
                }
                Ok(true)
            })
        })
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// Fields of the record on `stage`.
    pub fn snapshot(&self, key: &RecordKey, stage: Stage) -> Option<&Fields> {
        self.state.snapshot(&self.identity(key)?, stage)
    }

    pub fn current_version(&self, key: &RecordKey, stage: Stage) -> Option<VersionNumber> {
        self.state.current(&self.identity(key)?, stage)
    }

    /// Full history, oldest first.
    pub fn versions(&self, key: &RecordKey) -> EngineResult<&[Version]> {
        let identity = self.schema.identity_of(key)?;
        Ok(self.state.versions().history(&identity)?.versions())
    }

    pub fn version(&self, key: &RecordKey, number: VersionNumber) -> EngineResult<&Version> {
        let identity = self.schema.identity_of(key)?;
        Ok(self.state.versions().get(&identity, number)?)
    }

    pub fn exists(&self, key: &RecordKey, stage: Stage) -> bool {
        self.identity(key)
            .map_or(false, |identity| self.state.exists(&identity, stage))
    }

    pub fn is_on_draft(&self, key: &RecordKey) -> bool {
        self.exists(key, Stage::Draft)
    }

    pub fn is_published(&self, key: &RecordKey) -> bool {
        self.exists(key, Stage::Live)
    }

    /// Written at some point but on neither stage now.
    pub fn is_archived(&self, key: &RecordKey) -> bool {
        let Some(identity) = self.identity(key) else {
            return false;
        };
        self.state.versions().contains(&identity)
            && self.state.stages().pointers(&identity).is_empty()
    }

    /// Published but removed from draft.
    pub fn is_on_live_only(&self, key: &RecordKey) -> bool {
        self.is_published(key) && !self.is_on_draft(key)
    }

    /// On both stages with different versions bound.
    pub fn is_modified_on_draft(&self, key: &RecordKey) -> bool {
        self.is_on_draft(key) && self.is_published(key) && self.stages_differ(key)
    }

    pub fn stages_differ(&self, key: &RecordKey) -> bool {
        self.current_version(key, Stage::Draft) != self.current_version(key, Stage::Live)
    }

    /// Pending change of a record, computed from its stage pointers.
    pub fn change_type(&self, key: &RecordKey) -> ChangeType {
        ChangeType::compute(
            self.current_version(key, Stage::Draft),
            self.current_version(key, Stage::Live),
        )
    }

    /// Records owned by `key` on `stage`.
    pub fn find_owned(
        &self,
        key: &RecordKey,
        stage: Stage,
        recursive: bool,
    ) -> EngineResult<Vec<RecordKey>> {
        let (key, _) = self.resolve(key)?;
        Ok(self.graph().find_owned(&key, stage, recursive)?)
    }

    /// Records owning `key` on `stage`.
    pub fn find_owners(
        &self,
        key: &RecordKey,
        stage: Stage,
        recursive: bool,
    ) -> EngineResult<Vec<RecordKey>> {
        let (key, _) = self.resolve(key)?;
        Ok(self.graph().find_owners(&key, stage, recursive)?)
    }
}
