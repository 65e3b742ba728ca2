//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose the documents list and its mutations to Dart via FRB.
//! - Drain model notifications on the calling thread before returning.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Every response carries the visible list after the call completes.
//! - Calls are serialized on the session lock; each drains only what it queued.

use cloudnote_core::db::open_db;
use cloudnote_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    Document, DocumentsModel, DocumentsObserver, QueueContext, SqliteRecordStore, StoreError,
};
use log::warn;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

const DOCUMENTS_DB_FILE_NAME: &str = "cloudnote_documents.sqlite3";
/// Opened lazily; a failed open leaves the slot empty so the next call retries.
static SESSION: Mutex<Option<Session>> = Mutex::new(None);

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir`.
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// One row of the documents list screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentItem {
    /// Stable record ID in string form.
    pub record_id: String,
    /// Empty when the record is malformed; see `problem`.
    pub title: String,
    /// UTF-8 byte length of the content.
    pub size_bytes: u64,
    /// Store-assigned modification time; `None` while unsaved.
    pub modified_at_ms: Option<i64>,
    /// Field error for malformed records.
    pub problem: Option<String>,
}

/// Response envelope shared by all documents calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentsResponse {
    /// Whether the call itself was accepted.
    pub ok: bool,
    /// Affected record ID for mutations.
    pub record_id: Option<String>,
    /// Visible documents after the call.
    pub items: Vec<DocumentItem>,
    /// Human-readable message, including store failures raised during the call.
    pub message: String,
}

/// Fetches the store snapshot and returns the reconciled list.
#[flutter_rust_bridge::frb(sync)]
pub fn documents_refresh() -> DocumentsResponse {
    with_session(|session| {
        session.model.refresh();
        Ok(None)
    })
}

/// Returns the currently visible list without contacting the store.
#[flutter_rust_bridge::frb(sync)]
pub fn documents_list() -> DocumentsResponse {
    with_session(|_| Ok(None))
}

/// Creates a document; blank title or content is rejected.
#[flutter_rust_bridge::frb(sync)]
pub fn documents_add(title: String, content: String) -> DocumentsResponse {
    with_session(|session| {
        let (title, content) = validate_fields(title, content)?;
        let document = session.model.add_document(title, content);
        Ok(Some(document.id().to_string()))
    })
}

/// Replaces title and content of the document at `index`.
#[flutter_rust_bridge::frb(sync)]
pub fn documents_update(index: u32, title: String, content: String) -> DocumentsResponse {
    with_session(|session| {
        let (title, content) = validate_fields(title, content)?;
        let record_id = session
            .model
            .update_document(index as usize, title, content)
            .map_err(|err| err.to_string())?;
        Ok(Some(record_id.to_string()))
    })
}

/// Deletes the document at `index`.
#[flutter_rust_bridge::frb(sync)]
pub fn documents_delete(index: u32) -> DocumentsResponse {
    with_session(|session| {
        let record_id = session
            .model
            .delete(index as usize)
            .map_err(|err| err.to_string())?;
        Ok(Some(record_id.to_string()))
    })
}

struct Session {
    model: DocumentsModel,
    context: Arc<QueueContext>,
    errors: Arc<ErrorSink>,
}

#[derive(Default)]
struct ErrorSink {
    messages: Mutex<Vec<String>>,
}

impl ErrorSink {
    fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.messages.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl DocumentsObserver for ErrorSink {
    fn on_error(&self, error: &StoreError) {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(error.to_string());
    }
}

impl Session {
    fn over(store: SqliteRecordStore) -> Self {
        let context = Arc::new(QueueContext::new());
        let model = DocumentsModel::new(Arc::new(store), context.clone());
        let errors = Arc::new(ErrorSink::default());
        model.subscribe(errors.clone());
        Self {
            model,
            context,
            errors,
        }
    }
}

fn with_session(
    f: impl FnOnce(&Session) -> Result<Option<String>, String>,
) -> DocumentsResponse {
    run_in_slot(&SESSION, open_session, f)
}

/// Runs one call against the session in `slot`, opening it first if needed.
///
/// The slot lock is held until the response is built, so a call only ever
/// drains the notifications it queued itself.
fn run_in_slot(
    slot: &Mutex<Option<Session>>,
    open: impl FnOnce() -> Result<Session, String>,
    f: impl FnOnce(&Session) -> Result<Option<String>, String>,
) -> DocumentsResponse {
    let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
    if guard.is_none() {
        match open() {
            Ok(session) => *guard = Some(session),
            Err(message) => return rejected(message, Vec::new()),
        }
    }
    let Some(session) = guard.as_ref() else {
        return rejected("documents session unavailable".to_string(), Vec::new());
    };

    let outcome = f(session);
    session.context.run_pending();
    let store_errors = session.errors.take();
    let items = session.model.documents().iter().map(to_item).collect();

    match outcome {
        Ok(record_id) => DocumentsResponse {
            ok: true,
            record_id,
            items,
            message: if store_errors.is_empty() {
                "OK".to_string()
            } else {
                store_errors.join("; ")
            },
        },
        Err(message) => rejected(message, items),
    }
}

fn rejected(message: String, items: Vec<DocumentItem>) -> DocumentsResponse {
    DocumentsResponse {
        ok: false,
        record_id: None,
        items,
        message,
    }
}

fn open_session() -> Result<Session, String> {
    let db_path = resolve_documents_db_path();
    let conn = open_db(&db_path).map_err(|err| {
        warn!("event=ffi_session_open module=ffi status=error error={err}");
        format!("documents DB open failed: {err}")
    })?;
    Ok(Session::over(SqliteRecordStore::new(conn)))
}

fn resolve_documents_db_path() -> PathBuf {
    if let Ok(raw) = std::env::var("CLOUDNOTE_DB_PATH") {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }
    std::env::temp_dir().join(DOCUMENTS_DB_FILE_NAME)
}

fn validate_fields(title: String, content: String) -> Result<(String, String), String> {
    let title = title.trim().to_string();
    if title.is_empty() {
        return Err("title must not be empty".to_string());
    }
    if content.trim().is_empty() {
        return Err("content must not be empty".to_string());
    }
    Ok((title, content))
}

fn to_item(document: &Document) -> DocumentItem {
    match document.summary() {
        Ok(summary) => DocumentItem {
            record_id: summary.id.to_string(),
            title: summary.title,
            size_bytes: summary.size_bytes as u64,
            modified_at_ms: summary.modified,
            problem: None,
        },
        Err(err) => DocumentItem {
            record_id: document.id().to_string(),
            title: String::new(),
            size_bytes: 0,
            modified_at_ms: document.modified(),
            problem: Some(err.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::{
        core_version, documents_add, documents_delete, documents_list, documents_refresh,
        documents_update, init_logging, ping, run_in_slot, Session,
    };
    use cloudnote_core::db::open_db_in_memory;
    use cloudnote_core::SqliteRecordStore;
    use std::sync::Mutex;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn in_memory_session() -> Result<Session, String> {
        open_db_in_memory()
            .map(|conn| Session::over(SqliteRecordStore::new(conn)))
            .map_err(|err| err.to_string())
    }

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }

    #[test]
    fn init_logging_rejects_relative_log_dir() {
        let error = init_logging("info".to_string(), "tmp/logs".to_string());
        assert!(error.contains("absolute"));
    }

    #[test]
    fn documents_add_rejects_blank_fields() {
        let response = documents_add("   ".to_string(), "body".to_string());
        assert!(!response.ok);
        assert!(response.message.contains("title"));

        let response = documents_add("title".to_string(), "\n".to_string());
        assert!(!response.ok);
        assert!(response.message.contains("content"));
    }

    #[test]
    fn documents_add_update_delete_flow() {
        let title = unique_token("ffi-doc");
        let created = documents_add(title.clone(), "first body".to_string());
        assert!(created.ok, "{}", created.message);
        let record_id = created.record_id.expect("add should return record_id");

        let refreshed = documents_refresh();
        let index = refreshed
            .items
            .iter()
            .position(|item| item.record_id == record_id)
            .expect("created document should be listed");
        assert_eq!(refreshed.items[index].title, title);
        assert!(refreshed.items[index].modified_at_ms.is_some());

        let renamed = format!("{title}-renamed");
        let updated = documents_update(index as u32, renamed.clone(), "second".to_string());
        assert!(updated.ok, "{}", updated.message);
        assert_eq!(updated.record_id.as_deref(), Some(record_id.as_str()));

        let deleted = documents_delete(index as u32);
        assert!(deleted.ok, "{}", deleted.message);
        assert!(documents_list()
            .items
            .iter()
            .all(|item| item.record_id != record_id));
    }

    #[test]
    fn documents_delete_out_of_bounds_fails_without_panicking() {
        let response = documents_delete(u32::MAX);
        assert!(!response.ok);
        assert!(response.message.contains("out of bounds"));
    }

    #[test]
    fn concurrent_refreshes_each_return_their_own_result() {
        static SLOT: Mutex<Option<Session>> = Mutex::new(None);

        let workers: Vec<_> = (0..2)
            .map(|worker| {
                std::thread::spawn(move || {
                    for round in 0..25 {
                        let added = run_in_slot(&SLOT, in_memory_session, |session| {
                            let document =
                                session.model.add_document(format!("w{worker}-{round}"), "body");
                            Ok(Some(document.id().to_string()))
                        });
                        let record_id = added.record_id.expect("add should return record_id");

                        let refreshed = run_in_slot(&SLOT, in_memory_session, |session| {
                            session.model.refresh();
                            Ok(None)
                        });
                        let item = refreshed
                            .items
                            .iter()
                            .find(|item| item.record_id == record_id)
                            .expect("added document should be listed");
                        assert!(
                            item.modified_at_ms.is_some(),
                            "refresh must be applied before the response is built"
                        );
                    }
                })
            })
            .collect();

        for worker in workers {
            worker.join().expect("worker should not panic");
        }
    }

    #[test]
    fn failed_session_open_is_retried_on_next_call() {
        static SLOT: Mutex<Option<Session>> = Mutex::new(None);

        let failed = run_in_slot(
            &SLOT,
            || Err("documents DB open failed: disk busy".to_string()),
            |_| Ok(None),
        );
        assert!(!failed.ok);
        assert!(failed.message.contains("disk busy"));

        let recovered = run_in_slot(&SLOT, in_memory_session, |_| Ok(None));
        assert!(recovered.ok, "{}", recovered.message);
        assert!(recovered.items.is_empty());
    }

    fn unique_token(prefix: &str) -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time went backwards")
            .as_nanos();
        format!("{prefix}-{nanos}")
    }
}
