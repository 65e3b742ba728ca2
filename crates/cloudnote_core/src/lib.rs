//! Core domain logic for CloudNote.
//! This crate owns document reconciliation against a remote record store.

pub mod config;
pub mod db;
pub mod documents;
pub mod logging;
pub mod model;
pub mod notify;
pub mod store;

pub use config::{ConfigError, CoreConfig, LoggingConfig, StoreBackend, StoreConfig};
pub use documents::model::{DocumentsModel, DocumentsObserver, ModelError, SubscriptionId};
pub use documents::reconcile::SyncState;
pub use logging::{default_log_level, init_logging, init_logging_from_config, logging_status};
pub use model::document::{Document, DocumentSummary, FieldError, DOCUMENT_RECORD_TYPE};
pub use model::record::{FieldValue, Record, RecordId};
pub use notify::{InlineContext, NotificationContext, QueueContext};
pub use store::memory::{CompletionMode, MemoryRecordStore, StoreOperation, StoreRequest};
pub use store::sqlite::SqliteRecordStore;
pub use store::{open_store, QueryPredicate, RecordStore, StoreError, StoreResult};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
