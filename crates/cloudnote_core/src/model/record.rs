//! Generic store record.
//!
//! # Responsibility
//! - Mirror the shape of one entity held by the remote record store.
//! - Keep field storage untyped so projections decide how to read it.
//!
//! # Invariants
//! - `id` is stable and never reused for another record.
//! - `modified_at` is assigned by the store only; callers never set it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Stable identifier for one store record.
///
/// Kept as a type alias to make semantic intent explicit in signatures.
pub type RecordId = Uuid;

/// One value stored under a record field name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    /// Unix epoch milliseconds.
    Timestamp(i64),
}

impl FieldValue {
    /// Short type name used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Integer(_) => "integer",
            Self::Timestamp(_) => "timestamp",
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Remote key-value entity with identity and type tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    /// Serialized as `type` to match the store schema naming.
    #[serde(rename = "type")]
    pub record_type: String,
    pub fields: BTreeMap<String, FieldValue>,
    /// Unix epoch milliseconds of the last store-side write.
    pub modified_at: Option<i64>,
}

impl Record {
    /// Creates an unsaved record with a generated stable ID.
    pub fn new(record_type: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), record_type)
    }

    /// Creates an unsaved record with a caller-provided ID.
    ///
    /// Used by store backends and tests where identity already exists.
    pub fn with_id(id: RecordId, record_type: impl Into<String>) -> Self {
        Self {
            id,
            record_type: record_type.into(),
            fields: BTreeMap::new(),
            modified_at: None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Whether the store has ever assigned a modification timestamp.
    pub fn is_saved(&self) -> bool {
        self.modified_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::{FieldValue, Record};

    #[test]
    fn new_record_is_unsaved_and_empty() {
        let record = Record::new("Document");
        assert!(!record.id.is_nil());
        assert_eq!(record.record_type, "Document");
        assert!(record.fields.is_empty());
        assert!(!record.is_saved());
    }

    #[test]
    fn set_replaces_existing_field() {
        let mut record = Record::new("Document");
        record.set("title", "first");
        record.set("title", FieldValue::Integer(3));
        assert_eq!(record.get("title"), Some(&FieldValue::Integer(3)));
    }

    #[test]
    fn serialization_uses_type_key() {
        let mut record = Record::new("Document");
        record.set("title", "hello");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "Document");
        assert_eq!(json["fields"]["title"]["kind"], "text");
        assert_eq!(json["fields"]["title"]["value"], "hello");
    }
}
