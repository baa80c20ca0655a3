//! Record identity and stages
//!
//! Callers address a record by its concrete type name and id (`RecordKey`).
//! Subclasses share the id space of their base type, so storage is keyed by
//! `Identity` (base type, id): a subclass row and its base-class row are one
//! logical record.

mod key;
mod stage;

use std::collections::BTreeMap;

use serde_json::Value;

pub use key::{Identity, ParseIdentityError, RecordId, RecordKey};
pub use stage::Stage;

/// A record's field snapshot: field name to JSON value.
pub type Fields = BTreeMap<String, Value>;

/// Reads a field as a record id. `null`, missing and `0` all mean "unset".
pub fn field_as_id(fields: &Fields, field: &str) -> Option<RecordId> {
    fields
        .get(field)
        .and_then(Value::as_u64)
        .filter(|id| *id > 0)
        .map(RecordId::new)
}

/// Reads a field as a list of record ids, skipping anything that is not a
/// positive integer.
pub fn field_as_ids(fields: &Fields, field: &str) -> Vec<RecordId> {
    match fields.get(field) {
        Some(Value::Array(values)) => values
            .iter()
            .filter_map(Value::as_u64)
            .filter(|id| *id > 0)
            .map(RecordId::new)
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_as_id() {
        let mut fields = Fields::new();
        fields.insert("ParentID".into(), json!(7));
        fields.insert("OtherID".into(), json!(0));
        fields.insert("Null".into(), Value::Null);

        assert_eq!(field_as_id(&fields, "ParentID"), Some(RecordId::new(7)));
        assert_eq!(field_as_id(&fields, "OtherID"), None);
        assert_eq!(field_as_id(&fields, "Null"), None);
        assert_eq!(field_as_id(&fields, "Missing"), None);
    }

    #[test]
    fn test_field_as_ids_skips_junk() {
        let mut fields = Fields::new();
        fields.insert("TagIDs".into(), json!([1, "x", 0, 3]));

        assert_eq!(
            field_as_ids(&fields, "TagIDs"),
            vec![RecordId::new(1), RecordId::new(3)]
        );
        assert!(field_as_ids(&fields, "Missing").is_empty());
    }
}
