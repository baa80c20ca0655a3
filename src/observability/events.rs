//! Observable staging events
//!
//! Events are explicit and typed. Multi-record operations additionally get
//! `_BEGIN` / `_COMPLETE` / `_FAILED` lines from `ObservationScope`.

use std::fmt;

use super::logger::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Lifecycle
    ConfigLoaded,
    SchemaLoaded,
    StateLoaded,
    StatePersisted,
    /// State file failed its checksum (FATAL)
    StateCorrupted,

    // Record IO
    RecordCreated,
    RecordWritten,
    RecordDeleted,
    DerivedRefreshed,

    // Publishing
    RecordPublished,
    RecordRemovedFromLive,
    RecordUnpublished,
    RecordArchived,
    RecordReverted,
    RecordRolledBack,
    OwnedRecordUnlinked,
    RecursivePublishPartial,

    // ChangeSets
    ChangeSetCreated,
    ChangeSetSynced,
    ChangeSetPublished,
    ChangeSetReverted,

    // Transactions
    OperationRejected,
    TransactionRolledBack,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::SchemaLoaded => "SCHEMA_LOADED",
            Event::StateLoaded => "STATE_LOADED",
            Event::StatePersisted => "STATE_PERSISTED",
            Event::StateCorrupted => "STATE_CORRUPTED",
            Event::RecordCreated => "RECORD_CREATED",
            Event::RecordWritten => "RECORD_WRITTEN",
            Event::RecordDeleted => "RECORD_DELETED",
            Event::DerivedRefreshed => "DERIVED_REFRESHED",
            Event::RecordPublished => "RECORD_PUBLISHED",
            Event::RecordRemovedFromLive => "RECORD_REMOVED_FROM_LIVE",
            Event::RecordUnpublished => "RECORD_UNPUBLISHED",
            Event::RecordArchived => "RECORD_ARCHIVED",
            Event::RecordReverted => "RECORD_REVERTED",
            Event::RecordRolledBack => "RECORD_ROLLED_BACK",
            Event::OwnedRecordUnlinked => "OWNED_RECORD_UNLINKED",
            Event::RecursivePublishPartial => "RECURSIVE_PUBLISH_PARTIAL",
            Event::ChangeSetCreated => "CHANGESET_CREATED",
            Event::ChangeSetSynced => "CHANGESET_SYNCED",
            Event::ChangeSetPublished => "CHANGESET_PUBLISHED",
            Event::ChangeSetReverted => "CHANGESET_REVERTED",
            Event::OperationRejected => "OPERATION_REJECTED",
            Event::TransactionRolledBack => "TRANSACTION_ROLLED_BACK",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Event::StateCorrupted => Severity::Fatal,
            Event::OperationRejected
            | Event::TransactionRolledBack
            | Event::RecursivePublishPartial => Severity::Warn,
            Event::RecordWritten | Event::DerivedRefreshed | Event::StatePersisted => {
                Severity::Trace
            }
            _ => Severity::Info,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
