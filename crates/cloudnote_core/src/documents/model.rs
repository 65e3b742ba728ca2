//! Observable documents model over a record store.
//!
//! # Responsibility
//! - Apply optimistic inserts, edits and deletes locally, then issue the
//!   matching store request.
//! - Recompute the visible document list after every mutation and refresh.
//! - Deliver change and error notifications on one notification context.
//!
//! # Invariants
//! - Every committed mutation or successful refresh schedules exactly one
//!   change notification.
//! - Every failed store request schedules exactly one error notification.
//! - Optimistic state is never rolled back; the next refresh reconciles it.
//! - The state lock is never held while the store or observers run.

use crate::documents::reconcile::SyncState;
use crate::model::document::{Document, DOCUMENT_RECORD_TYPE};
use crate::model::record::{Record, RecordId};
use crate::notify::NotificationContext;
use crate::store::{QueryPredicate, RecordStore, StoreError, StoreResult};
use log::{debug, error, info};
use std::collections::BTreeSet;
use std::convert::Infallible;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Handle returned by `DocumentsModel::subscribe`.
pub type SubscriptionId = u64;

/// Model-level error for direct caller mistakes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// Index does not address a currently visible document.
    IndexOutOfBounds { index: usize, len: usize },
}

impl Display for ModelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IndexOutOfBounds { index, len } => {
                write!(f, "document index {index} out of bounds for {len} documents")
            }
        }
    }
}

impl Error for ModelError {}

/// Receiver of model notifications.
///
/// Callbacks run on the model's notification context.
pub trait DocumentsObserver: Send + Sync {
    /// The visible document list was recomputed.
    fn on_change(&self) {}

    /// A store request failed.
    fn on_error(&self, _error: &StoreError) {}
}

#[derive(Default)]
struct ModelState {
    sync: SyncState,
    documents: Vec<Document>,
}

#[derive(Default)]
struct Observers {
    next_id: SubscriptionId,
    entries: Vec<(SubscriptionId, Arc<dyn DocumentsObserver>)>,
}

struct Shared {
    store: Arc<dyn RecordStore>,
    context: Arc<dyn NotificationContext>,
    state: Mutex<ModelState>,
    observers: Mutex<Observers>,
}

/// Documents list kept in sync with a `RecordStore`.
pub struct DocumentsModel {
    shared: Arc<Shared>,
}

impl DocumentsModel {
    /// Creates an empty model; call `refresh` to load the store snapshot.
    pub fn new(store: Arc<dyn RecordStore>, context: Arc<dyn NotificationContext>) -> Self {
        Self {
            shared: Arc::new(Shared {
                store,
                context,
                state: Mutex::new(ModelState::default()),
                observers: Mutex::new(Observers::default()),
            }),
        }
    }

    /// Registers an observer for change and error notifications.
    pub fn subscribe(&self, observer: Arc<dyn DocumentsObserver>) -> SubscriptionId {
        let mut observers = self.shared.lock_observers();
        observers.next_id += 1;
        let id = observers.next_id;
        observers.entries.push((id, observer));
        id
    }

    /// Removes an observer. Returns `false` for unknown ids.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.shared.lock_observers();
        let before = observers.entries.len();
        observers.entries.retain(|(entry_id, _)| *entry_id != id);
        observers.entries.len() != before
    }

    /// Snapshot of the visible documents.
    pub fn documents(&self) -> Vec<Document> {
        self.shared.lock_state().documents.clone()
    }

    /// Visible document at `index`.
    pub fn document(&self, index: usize) -> Option<Document> {
        self.shared.lock_state().documents.get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.shared.lock_state().documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.lock_state().documents.is_empty()
    }

    /// Snapshot of the store records and pending buffers.
    pub fn sync_state(&self) -> SyncState {
        self.shared.lock_state().sync.clone()
    }

    /// Ids hidden locally while their store delete is unconfirmed.
    pub fn pending_deletes(&self) -> BTreeSet<RecordId> {
        self.shared.lock_state().sync.deleted_object_ids.clone()
    }

    /// Documents created locally and not yet seen in a store snapshot.
    pub fn pending_inserts(&self) -> Vec<Document> {
        self.shared.lock_state().sync.inserted_objects.clone()
    }

    /// Fetches every document record and reconciles on completion.
    ///
    /// On failure the state is unchanged and one error notification is sent.
    pub fn refresh(&self) {
        info!("event=documents_refresh module=documents status=start");
        let shared = Arc::clone(&self.shared);
        self.shared.store.query(
            DOCUMENT_RECORD_TYPE,
            QueryPredicate::MatchAll,
            Box::new(move |result| {
                let target = Arc::clone(&shared);
                shared
                    .context
                    .dispatch(Box::new(move || target.apply_refresh(result)));
            }),
        );
    }

    /// Creates a document, shows it immediately and saves it in the background.
    ///
    /// A failed save is reported but the local insert is kept.
    pub fn add_document(&self, title: impl Into<String>, content: impl Into<String>) -> Document {
        let document = Document::with_fields(title, content);
        let inserted = document.clone();
        self.shared
            .commit(move |state| state.sync.inserted_objects.push(inserted));

        info!(
            "event=documents_add module=documents status=ok record_id={}",
            document.id()
        );
        self.shared.save(document.record().clone(), "documents_add");
        document
    }

    /// Replaces title and content of the visible document at `index` and
    /// saves it in the background.
    ///
    /// # Errors
    /// - `ModelError::IndexOutOfBounds` when `index` is not visible; nothing
    ///   is changed and no request is issued.
    pub fn update_document(
        &self,
        index: usize,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<RecordId, ModelError> {
        let title = title.into();
        let content = content.into();
        let edited = self.shared.try_commit(move |state| {
            let record_id = resolve_index(&state.documents, index)?;
            edit_document(&mut state.sync, record_id, title, content).ok_or(
                ModelError::IndexOutOfBounds {
                    index,
                    len: state.documents.len(),
                },
            )
        })?;

        let record_id = edited.id;
        info!("event=documents_update module=documents status=ok record_id={record_id}");
        self.shared.save(edited, "documents_update");
        Ok(record_id)
    }

    /// Hides the visible document at `index` and deletes it in the background.
    ///
    /// A failed delete is reported but the document stays hidden.
    ///
    /// # Errors
    /// - `ModelError::IndexOutOfBounds` when `index` is not visible; nothing
    ///   is changed and no request is issued.
    pub fn delete(&self, index: usize) -> Result<RecordId, ModelError> {
        let record_id = self.shared.try_commit(|state| {
            let record_id = resolve_index(&state.documents, index)?;
            state.sync.deleted_object_ids.insert(record_id);
            Ok(record_id)
        })?;

        info!("event=documents_delete module=documents status=ok record_id={record_id}");
        let shared = Arc::clone(&self.shared);
        self.shared.store.delete(
            record_id,
            Box::new(move |result| shared.report_failure("documents_delete", result)),
        );
        Ok(record_id)
    }
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, ModelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_observers(&self) -> MutexGuard<'_, Observers> {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn commit<F>(self: &Arc<Self>, mutate: F)
    where
        F: FnOnce(&mut ModelState),
    {
        let committed: Result<(), Infallible> = self.try_commit(|state| {
            mutate(state);
            Ok(())
        });
        match committed {
            Ok(()) => {}
            Err(never) => match never {},
        }
    }

    /// Applies `mutate` and reconciles under one lock, then publishes.
    ///
    /// Nothing is published when `mutate` fails.
    fn try_commit<T, E, F>(self: &Arc<Self>, mutate: F) -> Result<T, E>
    where
        F: FnOnce(&mut ModelState) -> Result<T, E>,
    {
        let mut state = self.lock_state();
        let output = mutate(&mut *state)?;
        let documents = state.sync.reconcile();
        debug!(
            "event=documents_reconcile module=documents status=ok records={} pending_inserts={} pending_deletes={} visible={}",
            state.sync.records.len(),
            state.sync.inserted_objects.len(),
            state.sync.deleted_object_ids.len(),
            documents.len()
        );
        self.set_documents(state, documents);
        Ok(output)
    }

    /// Assigns the visible list and schedules one change notification.
    ///
    /// Takes the state guard so assignment stays atomic with reconcile; the
    /// guard is released before dispatch.
    fn set_documents(self: &Arc<Self>, mut state: MutexGuard<'_, ModelState>, documents: Vec<Document>) {
        state.documents = documents;
        drop(state);

        let shared = Arc::clone(self);
        self.context.dispatch(Box::new(move || shared.notify_change()));
    }

    fn apply_refresh(self: &Arc<Self>, result: StoreResult<Vec<Record>>) {
        match result {
            Ok(records) => {
                info!(
                    "event=documents_refresh module=documents status=ok records={}",
                    records.len()
                );
                self.commit(move |state| state.sync.records = records);
            }
            Err(err) => {
                error!(
                    "event=documents_refresh module=documents status=error error_code={} error={}",
                    err.code(),
                    err
                );
                self.notify_error(&err);
            }
        }
    }

    fn save(self: &Arc<Self>, record: Record, event: &'static str) {
        let shared = Arc::clone(self);
        self.store.save(
            record,
            Box::new(move |result| shared.report_failure(event, result)),
        );
    }

    /// Completion handler for fire-and-forget requests.
    fn report_failure<T>(self: &Arc<Self>, event: &'static str, result: StoreResult<T>) {
        let err = match result {
            Ok(_) => {
                debug!("event={event} module=documents status=confirmed");
                return;
            }
            Err(err) => err,
        };
        error!(
            "event={} module=documents status=error error_code={} error={}",
            event,
            err.code(),
            err
        );
        let shared = Arc::clone(self);
        self.context
            .dispatch(Box::new(move || shared.notify_error(&err)));
    }

    fn observer_snapshot(&self) -> Vec<Arc<dyn DocumentsObserver>> {
        self.lock_observers()
            .entries
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect()
    }

    fn notify_change(&self) {
        for observer in self.observer_snapshot() {
            observer.on_change();
        }
    }

    fn notify_error(&self, err: &StoreError) {
        for observer in self.observer_snapshot() {
            observer.on_error(err);
        }
    }
}

fn resolve_index(documents: &[Document], index: usize) -> Result<RecordId, ModelError> {
    documents
        .get(index)
        .map(Document::id)
        .ok_or(ModelError::IndexOutOfBounds {
            index,
            len: documents.len(),
        })
}

/// Edits the document wherever it currently lives and returns the record
/// to save.
fn edit_document(
    sync: &mut SyncState,
    record_id: RecordId,
    title: String,
    content: String,
) -> Option<Record> {
    if let Some(document) = sync
        .inserted_objects
        .iter_mut()
        .find(|document| document.id() == record_id)
    {
        document.set_title(title);
        document.set_content(content);
        return Some(document.record().clone());
    }

    let record = sync
        .records
        .iter_mut()
        .find(|record| record.id == record_id)?;
    let mut document = Document::from_record(record.clone());
    document.set_title(title);
    document.set_content(content);
    *record = document.into_record();
    Some(record.clone())
}

#[cfg(test)]
mod tests {
    use super::{DocumentsModel, ModelError};
    use crate::notify::InlineContext;
    use crate::store::memory::{CompletionMode, MemoryRecordStore, StoreRequest};
    use std::sync::Arc;

    fn model() -> (DocumentsModel, MemoryRecordStore) {
        let store = MemoryRecordStore::new(CompletionMode::Inline);
        let model = DocumentsModel::new(Arc::new(store.clone()), Arc::new(InlineContext));
        (model, store)
    }

    #[test]
    fn delete_out_of_bounds_changes_nothing() {
        let (model, store) = model();
        model.add_document("only", "doc");

        let err = model.delete(3).unwrap_err();
        assert_eq!(err, ModelError::IndexOutOfBounds { index: 3, len: 1 });
        assert!(model.pending_deletes().is_empty());
        assert!(!store
            .requests()
            .iter()
            .any(|request| matches!(request, StoreRequest::Delete { .. })));
    }

    #[test]
    fn update_pending_insert_edits_the_buffered_document() {
        let (model, store) = model();
        let created = model.add_document("draft", "one");

        let updated_id = model.update_document(0, "final", "two").unwrap();
        assert_eq!(updated_id, created.id());
        assert_eq!(model.pending_inserts()[0].title(), Ok("final"));
        assert_eq!(
            store.requests(),
            vec![
                StoreRequest::Save {
                    record_id: created.id()
                },
                StoreRequest::Save {
                    record_id: created.id()
                },
            ]
        );
    }
}
