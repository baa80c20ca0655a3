//! ChangeSet items and computed change types

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::record::RecordKey;
use crate::version::VersionNumber;

/// How an item entered its changeset.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Added {
    /// Added by the caller.
    Explicit,
    /// Pulled in by ownership from an explicit item.
    Implicit,
}

impl Added {
    pub fn as_str(&self) -> &'static str {
        match self {
            Added::Explicit => "EXPLICIT",
            Added::Implicit => "IMPLICIT",
        }
    }
}

/// Pending change of a record, derived from its stage pointers on every read.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeType {
    Created,
    Modified,
    Deleted,
    None,
}

impl ChangeType {
    pub fn compute(draft: Option<VersionNumber>, live: Option<VersionNumber>) -> Self {
        match (draft, live) {
            (Some(_), None) => ChangeType::Created,
            (None, Some(_)) => ChangeType::Deleted,
            (Some(draft), Some(live)) if draft != live => ChangeType::Modified,
            _ => ChangeType::None,
        }
    }

    /// True for changes that publishing would carry to LIVE.
    pub fn is_pending(&self) -> bool {
        *self != ChangeType::None
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Created => "CREATED",
            ChangeType::Modified => "MODIFIED",
            ChangeType::Deleted => "DELETED",
            ChangeType::None => "NONE",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One record in a changeset.
///
/// `version_before` / `version_after` are the LIVE pointers around the
/// changeset's publish; both are unset until then.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSetItem {
    object: RecordKey,
    added: Added,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version_before: Option<VersionNumber>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version_after: Option<VersionNumber>,
    /// Records that pulled this one in: explicit roots through ownership,
    /// or a source whose publish moved this derived record.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    referenced_by: BTreeSet<RecordKey>,
}

impl ChangeSetItem {
    pub fn explicit(object: RecordKey) -> Self {
        Self {
            object,
            added: Added::Explicit,
            version_before: None,
            version_after: None,
            referenced_by: BTreeSet::new(),
        }
    }

    pub fn implicit(object: RecordKey, referenced_by: BTreeSet<RecordKey>) -> Self {
        Self {
            object,
            added: Added::Implicit,
            version_before: None,
            version_after: None,
            referenced_by,
        }
    }

    #[inline]
    pub fn object(&self) -> &RecordKey {
        &self.object
    }

    #[inline]
    pub fn added(&self) -> Added {
        self.added
    }

    pub fn is_explicit(&self) -> bool {
        self.added == Added::Explicit
    }

    /// LIVE version before publish, 0 when absent.
    pub fn version_before(&self) -> u64 {
        VersionNumber::or_zero(self.version_before)
    }

    /// LIVE version after publish, 0 when unbound.
    pub fn version_after(&self) -> u64 {
        VersionNumber::or_zero(self.version_after)
    }

    pub fn live_before(&self) -> Option<VersionNumber> {
        self.version_before
    }

    pub fn live_after(&self) -> Option<VersionNumber> {
        self.version_after
    }

    pub fn referenced_by(&self) -> &BTreeSet<RecordKey> {
        &self.referenced_by
    }

    pub(crate) fn promote(&mut self) {
        self.added = Added::Explicit;
        self.referenced_by.clear();
    }

    pub(crate) fn set_referenced_by(&mut self, roots: BTreeSet<RecordKey>) {
        self.referenced_by = roots;
    }

    pub(crate) fn record_publish(
        &mut self,
        before: Option<VersionNumber>,
        after: Option<VersionNumber>,
    ) {
        self.version_before = before;
        self.version_after = after;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(n: u64) -> Option<VersionNumber> {
        Some(VersionNumber::new(n))
    }

    #[test]
    fn test_change_type_compute() {
        assert_eq!(ChangeType::compute(v(1), None), ChangeType::Created);
        assert_eq!(ChangeType::compute(None, v(1)), ChangeType::Deleted);
        assert_eq!(ChangeType::compute(v(3), v(2)), ChangeType::Modified);
        assert_eq!(ChangeType::compute(v(2), v(2)), ChangeType::None);
        assert_eq!(ChangeType::compute(None, None), ChangeType::None);
        assert!(!ChangeType::None.is_pending());
    }

    #[test]
    fn test_versions_default_to_zero() {
        let mut item = ChangeSetItem::explicit(RecordKey::new("Page", 1));
        assert_eq!(item.version_before(), 0);
        assert_eq!(item.version_after(), 0);

        item.record_publish(v(2), None);
        assert_eq!(item.version_before(), 2);
        assert_eq!(item.version_after(), 0);
    }

    #[test]
    fn test_promote_clears_references() {
        let roots = BTreeSet::from([RecordKey::new("Page", 1)]);
        let mut item = ChangeSetItem::implicit(RecordKey::new("Image", 4), roots);
        assert!(!item.is_explicit());
        item.promote();
        assert!(item.is_explicit());
        assert!(item.referenced_by().is_empty());
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(serde_json::to_string(&Added::Implicit).unwrap(), "\"IMPLICIT\"");
        assert_eq!(serde_json::to_string(&ChangeType::None).unwrap(), "\"NONE\"");
    }
}
