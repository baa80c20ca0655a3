//! Record keys and storage identities

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

/// A positive record id, unique within a base type's hierarchy.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(u64);

impl RecordId {
    #[inline]
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A record as callers see it: concrete type name plus id.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    type_name: String,
    id: RecordId,
}

impl RecordKey {
    pub fn new(type_name: impl Into<String>, id: u64) -> Self {
        Self {
            type_name: type_name.into(),
            id: RecordId::new(id),
        }
    }

    pub fn with_id(type_name: impl Into<String>, id: RecordId) -> Self {
        Self {
            type_name: type_name.into(),
            id,
        }
    }

    #[inline]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    #[inline]
    pub fn id(&self) -> RecordId {
        self.id
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.type_name, self.id)
    }
}

/// Storage identity of a record: the root of its type hierarchy plus id.
///
/// Serialized as `"Base#42"` so it can key JSON maps.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identity {
    base: String,
    id: RecordId,
}

impl Identity {
    pub fn new(base: impl Into<String>, id: RecordId) -> Self {
        Self {
            base: base.into(),
            id,
        }
    }

    #[inline]
    pub fn base(&self) -> &str {
        &self.base
    }

    #[inline]
    pub fn id(&self) -> RecordId {
        self.id
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.base, self.id)
    }
}

/// Returned when a serialized identity is not of the form `Base#id`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid record identity '{0}'")]
pub struct ParseIdentityError(String);

impl FromStr for Identity {
    type Err = ParseIdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (base, id) = s
            .rsplit_once('#')
            .ok_or_else(|| ParseIdentityError(s.to_string()))?;
        let id: u64 = id.parse().map_err(|_| ParseIdentityError(s.to_string()))?;
        if base.is_empty() || id == 0 {
            return Err(ParseIdentityError(s.to_string()));
        }
        Ok(Identity::new(base, RecordId::new(id)))
    }
}

impl Serialize for Identity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Identity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_key_display() {
        let key = RecordKey::new("Page", 12);
        assert_eq!(key.to_string(), "Page#12");
        assert_eq!(key.type_name(), "Page");
        assert_eq!(key.id(), RecordId::new(12));
    }

    #[test]
    fn test_identity_parse() {
        let identity: Identity = "SiteTree#3".parse().unwrap();
        assert_eq!(identity.base(), "SiteTree");
        assert_eq!(identity.id().value(), 3);

        assert!("SiteTree".parse::<Identity>().is_err());
        assert!("#3".parse::<Identity>().is_err());
        assert!("SiteTree#0".parse::<Identity>().is_err());
        assert!("SiteTree#x".parse::<Identity>().is_err());
    }

    #[test]
    fn test_identity_as_json_map_key() {
        let mut map = std::collections::BTreeMap::new();
        map.insert(Identity::new("Base", RecordId::new(1)), 5u64);

        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"Base#1":5}"#);

        let back: std::collections::BTreeMap<Identity, u64> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn test_identity_orders_by_base_then_id() {
        let a = Identity::new("A", RecordId::new(9));
        let b = Identity::new("B", RecordId::new(1));
        let a2 = Identity::new("A", RecordId::new(10));
        assert!(a < b);
        assert!(a < a2);
    }
}
