//! Document projection over a store record.
//!
//! # Responsibility
//! - Expose `title`/`content` as typed accessors over record fields.
//! - Create fresh records tagged with the document record type.
//!
//! # Invariants
//! - Reads never panic; malformed fields surface as `FieldError`.
//! - `modified()` is `None` until the store has saved the record.

use crate::model::record::{FieldValue, Record, RecordId};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Record type tag for documents in the store.
pub const DOCUMENT_RECORD_TYPE: &str = "Document";

const TITLE_KEY: &str = "title";
const CONTENT_KEY: &str = "content";

/// Typed field read failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    Missing {
        record_id: RecordId,
        field: &'static str,
    },
    TypeMismatch {
        record_id: RecordId,
        field: &'static str,
        expected: &'static str,
        found: &'static str,
    },
}

impl Display for FieldError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing { record_id, field } => {
                write!(f, "record {record_id} is missing field `{field}`")
            }
            Self::TypeMismatch {
                record_id,
                field,
                expected,
                found,
            } => write!(
                f,
                "record {record_id} field `{field}` is malformed: expected {expected}, found {found}"
            ),
        }
    }
}

impl Error for FieldError {}

/// Plain-text document backed by one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    record: Record,
}

impl Document {
    /// Creates an unsaved document with a generated record ID.
    pub fn new() -> Self {
        Self {
            record: Record::new(DOCUMENT_RECORD_TYPE),
        }
    }

    /// Creates an unsaved document with initial title and content.
    pub fn with_fields(title: impl Into<String>, content: impl Into<String>) -> Self {
        let mut document = Self::new();
        document.set_title(title);
        document.set_content(content);
        document
    }

    /// Wraps a record loaded from the store.
    ///
    /// The record is not validated here; accessors report malformed fields.
    pub fn from_record(record: Record) -> Self {
        Self { record }
    }

    pub fn id(&self) -> RecordId {
        self.record.id
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn into_record(self) -> Record {
        self.record
    }

    pub fn title(&self) -> Result<&str, FieldError> {
        self.text_field(TITLE_KEY)
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.record.set(TITLE_KEY, FieldValue::Text(title.into()));
    }

    pub fn content(&self) -> Result<&str, FieldError> {
        self.text_field(CONTENT_KEY)
    }

    pub fn set_content(&mut self, content: impl Into<String>) {
        self.record.set(CONTENT_KEY, FieldValue::Text(content.into()));
    }

    /// Store-assigned modification time in epoch milliseconds.
    pub fn modified(&self) -> Option<i64> {
        self.record.modified_at
    }

    /// Builds the list-row projection for this document.
    pub fn summary(&self) -> Result<DocumentSummary, FieldError> {
        Ok(DocumentSummary {
            id: self.id(),
            title: self.title()?.to_string(),
            size_bytes: self.content()?.len(),
            modified: self.modified(),
        })
    }

    fn text_field(&self, field: &'static str) -> Result<&str, FieldError> {
        let value = self.record.get(field).ok_or(FieldError::Missing {
            record_id: self.record.id,
            field,
        })?;
        value.as_text().ok_or(FieldError::TypeMismatch {
            record_id: self.record.id,
            field,
            expected: "text",
            found: value.type_name(),
        })
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

/// List-row projection used by document list screens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSummary {
    pub id: RecordId,
    pub title: String,
    /// UTF-8 byte length of `content`.
    pub size_bytes: usize,
    /// `None` for documents the store has not saved yet.
    pub modified: Option<i64>,
}
