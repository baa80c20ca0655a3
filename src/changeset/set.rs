//! ChangeSet - a named group of records published together
//!
//! A changeset only stores membership. Which records are pending, and how,
//! is computed from stage pointers whenever it is asked for. Resolving the
//! ownership graph is the engine's job; this type reconciles membership
//! against a computed implicit set and enforces the state machine:
//!
//! ```text
//! OPEN --publish--> PUBLISHED --revert--> REVERTED
//! ```
//!
//! Only an OPEN changeset may change membership or be published.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::{ChangeSetError, ChangeSetResult};
use super::item::ChangeSetItem;
use crate::record::RecordKey;

#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ChangeSetId(u64);

impl ChangeSetId {
    #[inline]
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn value(&self) -> u64 {
        self.0
    }

    #[inline]
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for ChangeSetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeSetState {
    Open,
    Published,
    Reverted,
}

impl ChangeSetState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeSetState::Open => "OPEN",
            ChangeSetState::Published => "PUBLISHED",
            ChangeSetState::Reverted => "REVERTED",
        }
    }
}

impl fmt::Display for ChangeSetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Implicit membership: each owned record mapped to the explicit roots that
/// reach it.
pub type ImplicitMembers = BTreeMap<RecordKey, BTreeSet<RecordKey>>;

/// What a sync changed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    pub added: Vec<RecordKey>,
    pub removed: Vec<RecordKey>,
    /// Implicit items whose set of referencing roots changed.
    pub relinked: Vec<RecordKey>,
}

impl SyncOutcome {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.relinked.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    id: ChangeSetId,
    title: String,
    state: ChangeSetState,
    items: Vec<ChangeSetItem>,
    created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    owner: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    published_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    publisher: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reverted_at: Option<DateTime<Utc>>,
}

impl ChangeSet {
    pub fn new(id: ChangeSetId, title: impl Into<String>, owner: Option<Uuid>) -> Self {
        Self {
            id,
            title: title.into(),
            state: ChangeSetState::Open,
            items: Vec::new(),
            created_at: Utc::now(),
            owner,
            published_at: None,
            publisher: None,
            reverted_at: None,
        }
    }

    #[inline]
    pub fn id(&self) -> ChangeSetId {
        self.id
    }

    #[inline]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[inline]
    pub fn state(&self) -> ChangeSetState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == ChangeSetState::Open
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn owner(&self) -> Option<Uuid> {
        self.owner
    }

    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        self.published_at
    }

    pub fn publisher(&self) -> Option<Uuid> {
        self.publisher
    }

    pub fn reverted_at(&self) -> Option<DateTime<Utc>> {
        self.reverted_at
    }

    pub fn items(&self) -> &[ChangeSetItem] {
        &self.items
    }

    pub fn item(&self, object: &RecordKey) -> Option<&ChangeSetItem> {
        self.items.iter().find(|item| item.object() == object)
    }

    pub(crate) fn item_mut(&mut self, object: &RecordKey) -> Option<&mut ChangeSetItem> {
        self.items.iter_mut().find(|item| item.object() == object)
    }

    /// Records added by the caller, in insertion order.
    pub fn explicit_roots(&self) -> Vec<RecordKey> {
        self.items
            .iter()
            .filter(|item| item.is_explicit())
            .map(|item| item.object().clone())
            .collect()
    }

    /// Summary such as `3 items (1 explicit, 2 implicit)`.
    pub fn description(&self) -> String {
        let explicit = self.items.iter().filter(|item| item.is_explicit()).count();
        let total = self.items.len();
        let noun = if total == 1 { "item" } else { "items" };
        format!(
            "{} {} ({} explicit, {} implicit)",
            total,
            noun,
            explicit,
            total - explicit
        )
    }

    pub fn ensure_open(&self) -> ChangeSetResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(ChangeSetError::NotOpen {
                id: self.id,
                state: self.state,
            })
        }
    }

    /// Adds `object` as an explicit item, promoting an implicit one.
    /// Returns false when it already was explicit.
    pub fn add_explicit(&mut self, object: RecordKey) -> ChangeSetResult<bool> {
        self.ensure_open()?;
        match self.item_mut(&object) {
            Some(item) if item.is_explicit() => Ok(false),
            Some(item) => {
                item.promote();
                Ok(true)
            }
            None => {
                self.items.push(ChangeSetItem::explicit(object));
                Ok(true)
            }
        }
    }

    /// Drops an explicit item. Implicit items it pulled in stay until the
    /// next sync.
    pub fn remove_explicit(&mut self, object: &RecordKey) -> ChangeSetResult<()> {
        self.ensure_open()?;
        let before = self.items.len();
        self.items
            .retain(|item| !(item.is_explicit() && item.object() == object));
        if self.items.len() == before {
            return Err(ChangeSetError::ItemNotFound {
                id: self.id,
                object: object.clone(),
            });
        }
        Ok(())
    }

    /// Diff between current membership and `implicit`, without applying it.
    pub fn plan_sync(&self, implicit: &ImplicitMembers) -> SyncOutcome {
        let mut outcome = SyncOutcome::default();

        for (object, roots) in implicit {
            match self.item(object) {
                None => outcome.added.push(object.clone()),
                Some(item) if !item.is_explicit() && item.referenced_by() != roots => {
                    outcome.relinked.push(object.clone())
                }
                Some(_) => {}
            }
        }

        for item in &self.items {
            if !item.is_explicit() && !implicit.contains_key(item.object()) {
                outcome.removed.push(item.object().clone());
            }
        }

        outcome
    }

    pub fn is_synced_with(&self, implicit: &ImplicitMembers) -> bool {
        self.plan_sync(implicit).is_empty()
    }

    /// Reconciles implicit items with `implicit`. Explicit items are never
    /// removed. Running it again with the same input changes nothing.
    pub fn apply_sync(&mut self, implicit: &ImplicitMembers) -> ChangeSetResult<SyncOutcome> {
        self.ensure_open()?;
        let outcome = self.plan_sync(implicit);

        self.items
            .retain(|item| item.is_explicit() || implicit.contains_key(item.object()));

        for object in &outcome.relinked {
            if let (Some(item), Some(roots)) = (
                self.items.iter_mut().find(|item| item.object() == object),
                implicit.get(object),
            ) {
                item.set_referenced_by(roots.clone());
            }
        }

        for object in &outcome.added {
            let roots = implicit.get(object).cloned().unwrap_or_default();
            self.items
                .push(ChangeSetItem::implicit(object.clone(), roots));
        }

        Ok(outcome)
    }

    /// Adds a record a publish moved on LIVE on behalf of `source` as an
    /// implicit item, unless it already is an item.
    pub(crate) fn add_cascaded(&mut self, object: RecordKey, source: RecordKey) {
        if self.item(&object).is_none() {
            self.items
                .push(ChangeSetItem::implicit(object, BTreeSet::from([source])));
        }
    }

    pub(crate) fn mark_published(&mut self, publisher: Option<Uuid>) -> ChangeSetResult<()> {
        self.ensure_open()?;
        self.state = ChangeSetState::Published;
        self.published_at = Some(Utc::now());
        self.publisher = publisher;
        Ok(())
    }

    pub(crate) fn mark_reverted(&mut self) -> ChangeSetResult<()> {
        if self.state != ChangeSetState::Published {
            return Err(ChangeSetError::NotPublished {
                id: self.id,
                state: self.state,
            });
        }
        self.state = ChangeSetState::Reverted;
        self.reverted_at = Some(Utc::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(type_name: &str, id: u64) -> RecordKey {
        RecordKey::new(type_name, id)
    }

    fn implicit(entries: &[(RecordKey, RecordKey)]) -> ImplicitMembers {
        let mut map = ImplicitMembers::new();
        for (object, root) in entries {
            map.entry(object.clone()).or_default().insert(root.clone());
        }
        map
    }

    #[test]
    fn test_add_explicit_is_idempotent() {
        let mut cs = ChangeSet::new(ChangeSetId::new(1), "Batch", None);
        assert!(cs.add_explicit(key("Page", 1)).unwrap());
        assert!(!cs.add_explicit(key("Page", 1)).unwrap());
        assert_eq!(cs.items().len(), 1);
    }

    #[test]
    fn test_sync_adds_removes_and_is_idempotent() {
        let root = key("Page", 1);
        let mut cs = ChangeSet::new(ChangeSetId::new(1), "Batch", None);
        cs.add_explicit(root.clone()).unwrap();

        let members = implicit(&[(key("Image", 1), root.clone()), (key("Image", 2), root.clone())]);
        let outcome = cs.apply_sync(&members).unwrap();
        assert_eq!(outcome.added.len(), 2);
        assert_eq!(cs.description(), "3 items (1 explicit, 2 implicit)");

        let again = cs.apply_sync(&members).unwrap();
        assert!(again.is_empty());
        assert!(cs.is_synced_with(&members));

        let fewer = implicit(&[(key("Image", 2), root)]);
        assert!(!cs.is_synced_with(&fewer));
        let outcome = cs.apply_sync(&fewer).unwrap();
        assert_eq!(outcome.removed, vec![key("Image", 1)]);
        assert_eq!(cs.items().len(), 2);
    }

    #[test]
    fn test_sync_never_removes_explicit() {
        let mut cs = ChangeSet::new(ChangeSetId::new(1), "Batch", None);
        cs.add_explicit(key("Page", 1)).unwrap();
        cs.add_explicit(key("Image", 9)).unwrap();
        cs.apply_sync(&ImplicitMembers::new()).unwrap();
        assert_eq!(cs.items().len(), 2);
    }

    #[test]
    fn test_sync_tracks_referencing_roots() {
        let a = key("Page", 1);
        let b = key("Page", 2);
        let mut cs = ChangeSet::new(ChangeSetId::new(1), "Batch", None);
        cs.add_explicit(a.clone()).unwrap();
        cs.add_explicit(b.clone()).unwrap();

        cs.apply_sync(&implicit(&[(key("Image", 1), a.clone())])).unwrap();
        let outcome = cs
            .apply_sync(&implicit(&[(key("Image", 1), a.clone()), (key("Image", 1), b.clone())]))
            .unwrap();
        assert_eq!(outcome.relinked, vec![key("Image", 1)]);
        assert_eq!(cs.item(&key("Image", 1)).unwrap().referenced_by().len(), 2);
    }

    #[test]
    fn test_closed_changeset_rejects_changes() {
        let mut cs = ChangeSet::new(ChangeSetId::new(7), "Batch", None);
        cs.mark_published(None).unwrap();
        assert_eq!(cs.state(), ChangeSetState::Published);
        assert!(cs.published_at().is_some());

        assert!(matches!(
            cs.add_explicit(key("Page", 1)),
            Err(ChangeSetError::NotOpen { .. })
        ));
        assert!(matches!(
            cs.mark_published(None),
            Err(ChangeSetError::NotOpen { .. })
        ));

        cs.mark_reverted().unwrap();
        assert_eq!(cs.state(), ChangeSetState::Reverted);
        assert!(matches!(
            cs.mark_reverted(),
            Err(ChangeSetError::NotPublished { .. })
        ));
    }

    #[test]
    fn test_remove_explicit() {
        let mut cs = ChangeSet::new(ChangeSetId::new(1), "Batch", None);
        cs.add_explicit(key("Page", 1)).unwrap();
        cs.remove_explicit(&key("Page", 1)).unwrap();
        assert!(cs.items().is_empty());
        assert!(matches!(
            cs.remove_explicit(&key("Page", 1)),
            Err(ChangeSetError::ItemNotFound { .. })
        ));
    }

    #[test]
    fn test_description_singular() {
        let mut cs = ChangeSet::new(ChangeSetId::new(1), "Batch", None);
        cs.add_explicit(key("Page", 1)).unwrap();
        assert_eq!(cs.description(), "1 item (1 explicit, 0 implicit)");
    }
}
