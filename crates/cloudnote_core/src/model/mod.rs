//! Domain model for documents synchronized with a record store.
//!
//! # Responsibility
//! - Define the generic store record shape.
//! - Project records into typed documents for UI consumption.
//!
//! # Invariants
//! - Every document is identified by the stable `RecordId` of its record.
//! - Field reads are fallible; malformed records never crash callers.

pub mod document;
pub mod record;
