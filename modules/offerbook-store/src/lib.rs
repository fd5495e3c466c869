//! Document-store seam for canonical placement records.
//!
//! The engine talks to a `RecordStore` trait; the Postgres implementation
//! keeps each record as a JSONB document with a version counter for
//! compare-and-swap writes. An in-memory implementation backs the tests.

pub mod postgres;
pub mod store;

#[cfg(any(test, feature = "test-support"))]
pub mod memory;

pub use postgres::PgRecordStore;
pub use store::{InsertOutcome, RecordStore, StoredRecord};

#[cfg(any(test, feature = "test-support"))]
pub use memory::MemoryStore;
