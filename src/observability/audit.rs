//! Audit logging of gated staging operations
//!
//! - Every gated operation appends one record, whatever its outcome
//! - The file log is append-only and synced before `append` returns
//! - One JSON record per line

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Audited operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    RecordCreate,
    RecordWrite,
    RecordDelete,
    Publish,
    PublishRecursive,
    Unpublish,
    Archive,
    RevertToLive,
    Rollback,
    ChangeSetCreate,
    ChangeSetAdd,
    ChangeSetRemove,
    ChangeSetSync,
    ChangeSetPublish,
    ChangeSetRevert,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::RecordCreate => "RECORD_CREATE",
            AuditAction::RecordWrite => "RECORD_WRITE",
            AuditAction::RecordDelete => "RECORD_DELETE",
            AuditAction::Publish => "PUBLISH",
            AuditAction::PublishRecursive => "PUBLISH_RECURSIVE",
            AuditAction::Unpublish => "UNPUBLISH",
            AuditAction::Archive => "ARCHIVE",
            AuditAction::RevertToLive => "REVERT_TO_LIVE",
            AuditAction::Rollback => "ROLLBACK",
            AuditAction::ChangeSetCreate => "CHANGESET_CREATE",
            AuditAction::ChangeSetAdd => "CHANGESET_ADD",
            AuditAction::ChangeSetRemove => "CHANGESET_REMOVE",
            AuditAction::ChangeSetSync => "CHANGESET_SYNC",
            AuditAction::ChangeSetPublish => "CHANGESET_PUBLISH",
            AuditAction::ChangeSetRevert => "CHANGESET_REVERT",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditOutcome {
    Success,
    /// Refused before any write: permission or precondition.
    Rejected,
    /// Failed while running; the transaction was rolled back.
    Failed,
}

impl AuditOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditOutcome::Success => "SUCCESS",
            AuditOutcome::Rejected => "REJECTED",
            AuditOutcome::Failed => "FAILED",
        }
    }
}

impl fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub action: AuditAction,
    pub outcome: AuditOutcome,
    /// Target record, as `Type#id`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changeset: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<Uuid>,
    #[serde(default)]
    pub service_role: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuditRecord {
    pub fn new(action: AuditAction, outcome: AuditOutcome) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            action,
            outcome,
            record: None,
            changeset: None,
            actor: None,
            service_role: false,
            error_code: None,
            error: None,
        }
    }

    pub fn with_record(mut self, record: impl fmt::Display) -> Self {
        self.record = Some(record.to_string());
        self
    }

    pub fn with_changeset(mut self, id: u64) -> Self {
        self.changeset = Some(id);
        self
    }

    pub fn with_actor(mut self, actor: Option<Uuid>, service_role: bool) -> Self {
        self.actor = actor;
        self.service_role = service_role;
        self
    }

    pub fn with_error(mut self, code: &str, message: impl Into<String>) -> Self {
        self.error_code = Some(code.to_string());
        self.error = Some(message.into());
        self
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

pub trait AuditLog: Send + Sync {
    /// Appends a record. The record is durable when this returns.
    fn append(&self, record: &AuditRecord) -> io::Result<()>;

    fn sync(&self) -> io::Result<()>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panic while holding the lock leaves whole lines behind; keep going.
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Append-only JSON lines file, fsynced per record
pub struct FileAuditLog {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl FileAuditLog {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditLog for FileAuditLog {
    fn append(&self, record: &AuditRecord) -> io::Result<()> {
        let json = record
            .to_json()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let mut writer = lock(&self.writer);
        writeln!(writer, "{}", json)?;
        writer.flush()?;
        writer.get_ref().sync_all()
    }

    fn sync(&self) -> io::Result<()> {
        lock(&self.writer).get_ref().sync_all()
    }
}

/// In-memory audit log. Clones share the same records.
#[derive(Debug, Clone, Default)]
pub struct MemoryAuditLog {
    records: Arc<Mutex<Vec<AuditRecord>>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        lock(&self.records).clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.records).is_empty()
    }
}

impl AuditLog for MemoryAuditLog {
    fn append(&self, record: &AuditRecord) -> io::Result<()> {
        lock(&self.records).push(record.clone());
        Ok(())
    }

    fn sync(&self) -> io::Result<()> {
        Ok(())
    }
}
