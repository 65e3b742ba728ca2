//! SQLite-backed record store.
//!
//! # Responsibility
//! - Persist records for single-device hosts (CLI, FFI shell).
//! - Keep SQL details behind the `RecordStore` contract.
//!
//! # Invariants
//! - Query results follow first-insert order; updates keep position.
//! - Read paths reject malformed rows instead of masking them.
//! - Completions run on the calling thread after the statement finishes.

use crate::db::{DbError, DbResult};
use crate::model::record::{FieldValue, Record, RecordId};
use crate::store::{
    DeleteCompletion, QueryCompletion, QueryPredicate, RecordStore, SaveCompletion, StoreError,
    StoreResult,
};
use log::{debug, warn};
use rusqlite::{params, Connection, Row};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

const RECORD_SELECT_SQL: &str = "SELECT id, record_type, fields_json, modified_at FROM records";

/// `RecordStore` over one SQLite connection.
pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
}

impl SqliteRecordStore {
    /// Wraps a connection returned by `db::open_db*`.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn query_records(&self, record_type: &str, predicate: QueryPredicate) -> StoreResult<Vec<Record>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "{RECORD_SELECT_SQL} WHERE record_type = ?1 ORDER BY seq ASC;"
        ))?;
        let mut rows = stmt.query([record_type])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            let record = parse_record_row(row)?;
            if predicate.matches(&record) {
                records.push(record);
            }
        }
        Ok(records)
    }

    fn save_record(&self, mut record: Record) -> StoreResult<Record> {
        let conn = self.lock();
        let fields_json = serde_json::to_string(&record.fields).map_err(|err| {
            StoreError::Backend(format!("failed to encode fields of {}: {err}", record.id))
        })?;
        let last_modified: i64 = conn.query_row(
            "SELECT COALESCE(MAX(modified_at), 0) FROM records;",
            [],
            |row| row.get(0),
        )?;
        let modified_at = now_epoch_ms().max(last_modified + 1);

        conn.execute(
            "INSERT INTO records (id, record_type, fields_json, modified_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                record_type = excluded.record_type,
                fields_json = excluded.fields_json,
                modified_at = excluded.modified_at;",
            params![
                record.id.to_string(),
                record.record_type.as_str(),
                fields_json,
                modified_at
            ],
        )?;

        record.modified_at = Some(modified_at);
        Ok(record)
    }

    fn delete_record(&self, record_id: RecordId) -> StoreResult<RecordId> {
        let changed = self
            .lock()
            .execute("DELETE FROM records WHERE id = ?1;", [record_id.to_string()])?;
        if changed == 0 {
            return Err(StoreError::RecordNotFound(record_id));
        }
        Ok(record_id)
    }
}

impl RecordStore for SqliteRecordStore {
    fn query(&self, record_type: &str, predicate: QueryPredicate, completion: QueryCompletion) {
        let result = self.query_records(record_type, predicate);
        log_outcome("store_query", &result);
        completion(result);
    }

    fn save(&self, record: Record, completion: SaveCompletion) {
        let result = self.save_record(record);
        log_outcome("store_save", &result);
        completion(result);
    }

    fn delete(&self, record_id: RecordId, completion: DeleteCompletion) {
        let result = self.delete_record(record_id);
        log_outcome("store_delete", &result);
        completion(result);
    }
}

fn parse_record_row(row: &Row<'_>) -> DbResult<Record> {
    let id_text: String = row.get("id")?;
    let id = Uuid::parse_str(&id_text)
        .map_err(|_| DbError::InvalidData(format!("invalid uuid value `{id_text}` in records.id")))?;

    let fields_json: String = row.get("fields_json")?;
    let fields: BTreeMap<String, FieldValue> =
        serde_json::from_str(&fields_json).map_err(|err| {
            DbError::InvalidData(format!("invalid fields_json for record {id}: {err}"))
        })?;

    Ok(Record {
        id,
        record_type: row.get("record_type")?,
        fields,
        modified_at: Some(row.get("modified_at")?),
    })
}

fn log_outcome<T>(event: &str, result: &StoreResult<T>) {
    match result {
        Ok(_) => debug!("event={event} module=store.sqlite status=ok"),
        Err(err) => warn!(
            "event={event} module=store.sqlite status=error error_code={} error={}",
            err.code(),
            err
        ),
    }
}

fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}
