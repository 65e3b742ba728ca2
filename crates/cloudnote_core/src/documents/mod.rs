//! Documents list synchronization.
//!
//! # Responsibility
//! - Reconcile the store snapshot with optimistic local changes.
//! - Expose the reconciled list to UI callers with change notifications.
//!
//! # Invariants
//! - Reconciliation is pure over `SyncState`; all I/O lives in `model`.

pub mod model;
pub mod reconcile;
