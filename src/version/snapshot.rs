//! Version - Immutable record snapshot
//!
//! A version holds the complete field set of a record at one point in time.
//! Once appended to a history it never changes; updates append new versions
//! and deletion only unbinds stage pointers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::number::{Sequence, VersionNumber};
use crate::record::{Fields, Stage};

/// A single immutable record version.
///
/// All fields are private to enforce immutability.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Version {
    number: VersionNumber,
    /// Concrete type at the time of the write.
    type_name: String,
    fields: Fields,
    /// Stage the write targeted. Live writes only come from publishing.
    written_to: Stage,
    sequence: Sequence,
    written_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    author: Option<Uuid>,
    /// First time the version was bound to LIVE.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    published_at: Option<DateTime<Utc>>,
}

impl Version {
    pub fn new(
        number: VersionNumber,
        type_name: impl Into<String>,
        fields: Fields,
        written_to: Stage,
        sequence: Sequence,
        author: Option<Uuid>,
    ) -> Self {
        let written_at = Utc::now();
        Self {
            number,
            type_name: type_name.into(),
            fields,
            written_to,
            sequence,
            written_at,
            author,
            published_at: (written_to == Stage::Live).then_some(written_at),
        }
    }

    #[inline]
    pub fn number(&self) -> VersionNumber {
        self.number
    }

    #[inline]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    #[inline]
    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    #[inline]
    pub fn written_to(&self) -> Stage {
        self.written_to
    }

    /// True once the version has been bound to LIVE.
    #[inline]
    pub fn was_published(&self) -> bool {
        self.published_at.is_some()
    }

    #[inline]
    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        self.published_at
    }

    /// Only the publication mark changes; the snapshot stays as written.
    pub(crate) fn mark_published(&mut self) {
        if self.published_at.is_none() {
            self.published_at = Some(Utc::now());
        }
    }

    #[inline]
    pub fn sequence(&self) -> Sequence {
        self.sequence
    }

    #[inline]
    pub fn written_at(&self) -> DateTime<Utc> {
        self.written_at
    }

    #[inline]
    pub fn author(&self) -> Option<Uuid> {
        self.author
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_version_accessors() {
        let mut fields = Fields::new();
        fields.insert("Title".into(), json!("Hello"));
        let author = Uuid::new_v4();

        let version = Version::new(
            VersionNumber::new(2),
            "Page",
            fields.clone(),
            Stage::Live,
            Sequence::new(9),
            Some(author),
        );

        assert_eq!(version.number(), VersionNumber::new(2));
        assert_eq!(version.type_name(), "Page");
        assert_eq!(version.fields(), &fields);
        assert!(version.was_published());
        assert_eq!(version.sequence(), Sequence::new(9));
        assert_eq!(version.author(), Some(author));
    }

    #[test]
    fn test_version_json_shape() {
        let version = Version::new(
            VersionNumber::FIRST,
            "Page",
            Fields::new(),
            Stage::Draft,
            Sequence::new(1),
            None,
        );
        let value = serde_json::to_value(&version).unwrap();
        assert_eq!(value["number"], json!(1));
        assert_eq!(value["written_to"], json!("draft"));
        assert!(value.get("author").is_none());
        assert!(value.get("published_at").is_none());

        let back: Version = serde_json::from_value(value).unwrap();
        assert_eq!(back, version);
    }

    #[test]
    fn test_draft_version_marked_published() {
        let mut version = Version::new(
            VersionNumber::FIRST,
            "Page",
            Fields::new(),
            Stage::Draft,
            Sequence::new(1),
            None,
        );
        assert!(!version.was_published());

        version.mark_published();
        let first = version.published_at();
        assert!(version.was_published());
        assert_eq!(version.written_to(), Stage::Draft);

        version.mark_published();
        assert_eq!(version.published_at(), first);
    }
}
