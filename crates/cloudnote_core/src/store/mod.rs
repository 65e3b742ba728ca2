//! Record store contracts and in-repo backends.
//!
//! # Responsibility
//! - Define the asynchronous completion-based store interface consumed by
//!   the documents model.
//! - Provide memory and SQLite backends for tests, CLI and FFI hosts.
//!
//! # Invariants
//! - Every request invokes its completion exactly once.
//! - Completions may run on any thread; callers must not assume the
//!   calling context.
//! - Store errors are opaque transport failures from the model's view.

use crate::config::{StoreBackend, StoreConfig};
use crate::db::{open_db, DbError};
use crate::model::record::{Record, RecordId};
use log::info;
use memory::{CompletionMode, MemoryRecordStore};
use sqlite::SqliteRecordStore;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub mod memory;
pub mod sqlite;

pub type StoreResult<T> = Result<T, StoreError>;

/// Completion for `RecordStore::query`.
pub type QueryCompletion = Box<dyn FnOnce(StoreResult<Vec<Record>>) + Send + 'static>;
/// Completion for `RecordStore::save`; receives the stored copy.
pub type SaveCompletion = Box<dyn FnOnce(StoreResult<Record>) + Send + 'static>;
/// Completion for `RecordStore::delete`; receives the deleted ID.
pub type DeleteCompletion = Box<dyn FnOnce(StoreResult<RecordId>) + Send + 'static>;

/// Transport-level failure reported by a record store.
#[derive(Debug)]
pub enum StoreError {
    /// Store could not be reached.
    Unavailable(String),
    /// Caller is not signed in to the store account.
    NotAuthenticated,
    /// Account storage quota is exhausted.
    QuotaExceeded,
    /// Target record does not exist in the store.
    RecordNotFound(RecordId),
    /// Backend-specific failure without a finer classification.
    Backend(String),
    /// Local database failure in the SQLite backend.
    Db(DbError),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(details) => write!(f, "record store unavailable: {details}"),
            Self::NotAuthenticated => write!(f, "record store account is not authenticated"),
            Self::QuotaExceeded => write!(f, "record store quota exceeded"),
            Self::RecordNotFound(id) => write!(f, "record not found: {id}"),
            Self::Backend(details) => write!(f, "record store failure: {details}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl StoreError {
    /// Stable machine-readable error code for logs and FFI envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "store_unavailable",
            Self::NotAuthenticated => "store_not_authenticated",
            Self::QuotaExceeded => "store_quota_exceeded",
            Self::RecordNotFound(_) => "store_record_not_found",
            Self::Backend(_) => "store_backend_failed",
            Self::Db(_) => "store_db_failed",
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Record filter for `RecordStore::query`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryPredicate {
    /// Every record of the requested type.
    #[default]
    MatchAll,
}

impl QueryPredicate {
    pub fn matches(&self, _record: &Record) -> bool {
        match self {
            Self::MatchAll => true,
        }
    }
}

/// Completion-based remote record store.
///
/// Calls return immediately; results arrive through the completion on a
/// context chosen by the implementation.
pub trait RecordStore: Send + Sync {
    fn query(&self, record_type: &str, predicate: QueryPredicate, completion: QueryCompletion);
    fn save(&self, record: Record, completion: SaveCompletion);
    fn delete(&self, record_id: RecordId, completion: DeleteCompletion);
}

/// Opens the backend selected by host configuration.
///
/// The memory backend completes inline; pair it with any context.
pub fn open_store(config: &StoreConfig) -> StoreResult<Arc<dyn RecordStore>> {
    match (config.backend, config.database_path.as_ref()) {
        (StoreBackend::Memory, _) => {
            info!("event=store_open module=store status=ok backend=memory");
            Ok(Arc::new(MemoryRecordStore::new(CompletionMode::Inline)))
        }
        (StoreBackend::Sqlite, Some(path)) => {
            let conn = open_db(path)?;
            info!("event=store_open module=store status=ok backend=sqlite");
            Ok(Arc::new(SqliteRecordStore::new(conn)))
        }
        (StoreBackend::Sqlite, None) => Err(StoreError::Backend(
            "sqlite backend requires a database path".to_string(),
        )),
    }
}
