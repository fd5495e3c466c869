//! Placement offer reconciliation engine.
//!
//! Folds batches of scraped placement offers into one canonical,
//! ever-growing record per company. Facts only accumulate: packages are
//! monotonic maxima, students are keyed by enrollment number, and records
//! are never deleted here.
//!
//! The pieces, leaf first:
//! - `merger` — pure merge of one offer into a record.
//! - `resolver` — which stored record (if any) is the merge target.
//! - `reconciler` — per-offer resolve/merge/persist with CAS retry,
//!   batch counters, continue-on-error.
//! - `janitor` — read-only report of duplicate canonical records.

pub mod janitor;
pub mod merger;
pub mod reconciler;
pub mod resolver;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use janitor::{scan, DuplicateReport};
pub use merger::{merge, MergeOutcome};
pub use reconciler::Reconciler;
pub use resolver::{resolve, Resolution};
