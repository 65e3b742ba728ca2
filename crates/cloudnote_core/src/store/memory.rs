//! In-process record store.
//!
//! # Responsibility
//! - Stand in for the remote store in tests and ephemeral sessions.
//! - Record every request so callers can assert what was issued.
//! - Inject one-shot failures per operation kind.
//!
//! # Invariants
//! - Requests are logged synchronously at call time, before completion.
//! - `modified_at` assigned on save is strictly increasing.

use crate::model::record::{Record, RecordId};
use crate::store::{
    DeleteCompletion, QueryCompletion, QueryPredicate, RecordStore, SaveCompletion, StoreError,
    StoreResult,
};
use log::debug;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

/// Where completions of a `MemoryRecordStore` run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionMode {
    /// On the calling thread, before the request method returns.
    Inline,
    /// On a freshly spawned thread.
    Background,
}

/// Operation kind used for failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    Query,
    Save,
    Delete,
}

/// One request received by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreRequest {
    Query { record_type: String },
    Save { record_id: RecordId },
    Delete { record_id: RecordId },
}

#[derive(Default)]
struct MemoryState {
    records: Vec<Record>,
    requests: Vec<StoreRequest>,
    failures: HashMap<StoreOperation, StoreError>,
    last_modified_ms: i64,
}

impl MemoryState {
    fn next_modified_ms(&mut self) -> i64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as i64)
            .unwrap_or(0);
        self.last_modified_ms = now.max(self.last_modified_ms + 1);
        self.last_modified_ms
    }
}

/// Thread-safe in-memory `RecordStore`.
#[derive(Clone)]
pub struct MemoryRecordStore {
    state: Arc<Mutex<MemoryState>>,
    mode: CompletionMode,
}

impl MemoryRecordStore {
    pub fn new(mode: CompletionMode) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            mode,
        }
    }

    /// Places records directly in the store, as if written by another device.
    ///
    /// Records without `modified_at` receive one.
    pub fn seed(&self, records: impl IntoIterator<Item = Record>) {
        let mut state = self.lock();
        for mut record in records {
            if record.modified_at.is_none() {
                record.modified_at = Some(state.next_modified_ms());
            }
            upsert(&mut state.records, record);
        }
    }

    /// Removes a record directly, bypassing the request log.
    pub fn remove(&self, record_id: RecordId) -> Option<Record> {
        let mut state = self.lock();
        let position = state.records.iter().position(|r| r.id == record_id)?;
        Some(state.records.remove(position))
    }

    /// Snapshot of stored records in insertion order.
    pub fn records(&self) -> Vec<Record> {
        self.lock().records.clone()
    }

    /// Snapshot of every request received so far.
    pub fn requests(&self) -> Vec<StoreRequest> {
        self.lock().requests.clone()
    }

    /// Makes the next request of `operation` fail with `error`.
    pub fn fail_next(&self, operation: StoreOperation, error: StoreError) {
        self.lock().failures.insert(operation, error);
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn log_request(&self, request: StoreRequest) {
        self.lock().requests.push(request);
    }

    fn complete<F>(&self, work: F)
    where
        F: FnOnce(&Mutex<MemoryState>) + Send + 'static,
    {
        let state = Arc::clone(&self.state);
        match self.mode {
            CompletionMode::Inline => work(&*state),
            CompletionMode::Background => {
                std::thread::spawn(move || work(&*state));
            }
        }
    }
}

impl RecordStore for MemoryRecordStore {
    fn query(&self, record_type: &str, predicate: QueryPredicate, completion: QueryCompletion) {
        self.log_request(StoreRequest::Query {
            record_type: record_type.to_string(),
        });
        let record_type = record_type.to_string();
        self.complete(move |state| {
            let result = {
                let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
                match state.failures.remove(&StoreOperation::Query) {
                    Some(err) => Err(err),
                    None => Ok(state
                        .records
                        .iter()
                        .filter(|record| record.record_type == record_type)
                        .filter(|record| predicate.matches(record))
                        .cloned()
                        .collect::<Vec<_>>()),
                }
            };
            debug!(
                "event=store_query module=store.memory status={} record_type={}",
                status_label(&result),
                record_type
            );
            completion(result);
        });
    }

    fn save(&self, record: Record, completion: SaveCompletion) {
        self.log_request(StoreRequest::Save {
            record_id: record.id,
        });
        self.complete(move |state| {
            let result = {
                let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
                match state.failures.remove(&StoreOperation::Save) {
                    Some(err) => Err(err),
                    None => {
                        let mut stored = record;
                        stored.modified_at = Some(state.next_modified_ms());
                        upsert(&mut state.records, stored.clone());
                        Ok(stored)
                    }
                }
            };
            debug!(
                "event=store_save module=store.memory status={}",
                status_label(&result)
            );
            completion(result);
        });
    }

    fn delete(&self, record_id: RecordId, completion: DeleteCompletion) {
        self.log_request(StoreRequest::Delete { record_id });
        self.complete(move |state| {
            let result = {
                let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
                match state.failures.remove(&StoreOperation::Delete) {
                    Some(err) => Err(err),
                    None => match state.records.iter().position(|r| r.id == record_id) {
                        Some(position) => {
                            state.records.remove(position);
                            Ok(record_id)
                        }
                        None => Err(StoreError::RecordNotFound(record_id)),
                    },
                }
            };
            debug!(
                "event=store_delete module=store.memory status={}",
                status_label(&result)
            );
            completion(result);
        });
    }
}

fn upsert(records: &mut Vec<Record>, record: Record) {
    match records.iter_mut().find(|existing| existing.id == record.id) {
        Some(existing) => *existing = record,
        None => records.push(record),
    }
}

fn status_label<T>(result: &StoreResult<T>) -> &'static str {
    if result.is_ok() {
        "ok"
    } else {
        "error"
    }
}

#[cfg(test)]
mod tests {
    use super::{CompletionMode, MemoryRecordStore, StoreOperation, StoreRequest};
    use crate::model::record::Record;
    use crate::store::{QueryPredicate, RecordStore, StoreError};
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn save_assigns_increasing_modification_times() {
        let store = MemoryRecordStore::new(CompletionMode::Inline);
        let (tx, rx) = mpsc::channel();
        for _ in 0..2 {
            let tx = tx.clone();
            store.save(
                Record::new("Document"),
                Box::new(move |result| tx.send(result.unwrap().modified_at).unwrap()),
            );
        }
        let first = rx.recv().unwrap().unwrap();
        let second = rx.recv().unwrap().unwrap();
        assert!(second > first);
    }

    #[test]
    fn query_filters_by_record_type() {
        let store = MemoryRecordStore::new(CompletionMode::Inline);
        store.seed([Record::new("Document"), Record::new("Folder")]);
        let (tx, rx) = mpsc::channel();
        store.query(
            "Document",
            QueryPredicate::MatchAll,
            Box::new(move |result| tx.send(result.unwrap().len()).unwrap()),
        );
        assert_eq!(rx.recv().unwrap(), 1);
        assert_eq!(
            store.requests(),
            vec![StoreRequest::Query {
                record_type: "Document".to_string()
            }]
        );
    }

    #[test]
    fn delete_of_unknown_record_reports_not_found() {
        let store = MemoryRecordStore::new(CompletionMode::Inline);
        let missing = Record::new("Document").id;
        let (tx, rx) = mpsc::channel();
        store.delete(missing, Box::new(move |result| tx.send(result).unwrap()));
        let err = rx.recv().unwrap().unwrap_err();
        assert!(matches!(err, StoreError::RecordNotFound(id) if id == missing));
    }

    #[test]
    fn injected_failure_applies_once() {
        let store = MemoryRecordStore::new(CompletionMode::Inline);
        store.fail_next(StoreOperation::Save, StoreError::QuotaExceeded);
        let (tx, rx) = mpsc::channel();
        for _ in 0..2 {
            let tx = tx.clone();
            store.save(
                Record::new("Document"),
                Box::new(move |result| tx.send(result.is_ok()).unwrap()),
            );
        }
        assert!(!rx.recv().unwrap());
        assert!(rx.recv().unwrap());
        assert_eq!(store.records().len(), 1);
    }

    #[test]
    fn background_mode_completes_off_the_calling_thread() {
        let store = MemoryRecordStore::new(CompletionMode::Background);
        let caller = std::thread::current().id();
        let (tx, rx) = mpsc::channel();
        store.save(
            Record::new("Document"),
            Box::new(move |_| tx.send(std::thread::current().id()).unwrap()),
        );
        let completed_on = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_ne!(completed_on, caller);
    }
}
