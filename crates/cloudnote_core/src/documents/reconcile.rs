//! Reconciliation of the store snapshot with pending local changes.
//!
//! # Responsibility
//! - Merge the last fetched records with optimistic inserts and deletes.
//! - Retire pending entries once the snapshot confirms or contradicts them.
//!
//! # Invariants
//! - Output never contains an id in `deleted_object_ids`.
//! - Output never contains an inserted document whose id is in `records`.
//! - After reconcile, `deleted_object_ids ⊆ ids(records) ∪ ids(inserted_objects)`.
//! - Reconcile is idempotent for unchanged inputs.

use crate::model::document::Document;
use crate::model::record::{Record, RecordId};
use std::collections::BTreeSet;

/// Snapshot plus pending-change buffers owned by the documents model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncState {
    /// Last full snapshot returned by the store, in store order.
    pub records: Vec<Record>,
    /// Locally created documents not yet seen in `records`.
    pub inserted_objects: Vec<Document>,
    /// Ids requested for deletion and still present somewhere locally.
    pub deleted_object_ids: BTreeSet<RecordId>,
}

impl SyncState {
    /// Prunes both pending buffers and returns the visible document list.
    ///
    /// Order: records-derived documents in snapshot order, then surviving
    /// inserts in insertion order.
    pub fn reconcile(&mut self) -> Vec<Document> {
        let mut known_ids: BTreeSet<RecordId> =
            self.records.iter().map(|record| record.id).collect();

        self.inserted_objects
            .retain(|document| !known_ids.contains(&document.id()));

        known_ids.extend(self.inserted_objects.iter().map(Document::id));

        self.deleted_object_ids
            .retain(|record_id| known_ids.contains(record_id));

        self.records
            .iter()
            .cloned()
            .map(Document::from_record)
            .chain(self.inserted_objects.iter().cloned())
            .filter(|document| !self.deleted_object_ids.contains(&document.id()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::SyncState;
    use crate::model::document::{Document, DOCUMENT_RECORD_TYPE};
    use crate::model::record::Record;

    fn record(title: &str) -> Record {
        let mut record = Record::new(DOCUMENT_RECORD_TYPE);
        record.set("title", title);
        record.set("content", "");
        record.modified_at = Some(1);
        record
    }

    fn titles(documents: &[Document]) -> Vec<&str> {
        documents
            .iter()
            .map(|document| document.title().unwrap())
            .collect()
    }

    #[test]
    fn reconcile_is_idempotent() {
        let first = record("A");
        let mut state = SyncState {
            records: vec![first.clone(), record("B")],
            inserted_objects: vec![Document::with_fields("C", "")],
            deleted_object_ids: [first.id].into_iter().collect(),
        };

        let once = state.reconcile();
        let snapshot = state.clone();
        let twice = state.reconcile();

        assert_eq!(once, twice);
        assert_eq!(state, snapshot);
    }

    #[test]
    fn confirmed_insert_is_replaced_by_server_copy() {
        let local = Document::with_fields("local", "draft");
        let mut server_copy = local.record().clone();
        server_copy.set("title", "server");
        server_copy.modified_at = Some(10);

        let mut state = SyncState {
            records: vec![server_copy],
            inserted_objects: vec![local.clone()],
            ..SyncState::default()
        };
        let documents = state.reconcile();

        assert!(state.inserted_objects.is_empty());
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].id(), local.id());
        assert_eq!(documents[0].title(), Ok("server"));
        assert_eq!(documents[0].modified(), Some(10));
    }

    #[test]
    fn stale_delete_markers_are_dropped() {
        let gone = record("gone");
        let mut state = SyncState {
            records: vec![record("kept")],
            deleted_object_ids: [gone.id].into_iter().collect(),
            ..SyncState::default()
        };
        let documents = state.reconcile();

        assert!(state.deleted_object_ids.is_empty());
        assert_eq!(titles(&documents), vec!["kept"]);
    }

    #[test]
    fn delete_marker_on_pending_insert_hides_it_and_survives() {
        let pending = Document::with_fields("pending", "");
        let mut state = SyncState {
            inserted_objects: vec![pending.clone()],
            deleted_object_ids: [pending.id()].into_iter().collect(),
            ..SyncState::default()
        };
        let documents = state.reconcile();

        assert!(documents.is_empty());
        assert!(state.deleted_object_ids.contains(&pending.id()));
    }

    #[test]
    fn records_come_first_then_inserts_in_insertion_order() {
        let mut state = SyncState {
            records: vec![record("r1"), record("r2")],
            inserted_objects: vec![
                Document::with_fields("i1", ""),
                Document::with_fields("i2", ""),
            ],
            ..SyncState::default()
        };
        let documents = state.reconcile();
        assert_eq!(titles(&documents), vec!["r1", "r2", "i1", "i2"]);
    }
}
