use async_trait::async_trait;
use uuid::Uuid;

use offerbook_common::{OfferbookError, PlacementRecord};

/// A canonical record together with its storage identity. The id is
/// store-assigned and distinct from `company`; `version` guards writes.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub id: Uuid,
    pub version: i64,
    pub record: PlacementRecord,
}

/// Outcome of an insert-if-absent write. A structured variant, never
/// inferred from driver error strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    AlreadyExists,
}

/// Storage operations the reconciliation engine needs. The concrete
/// transport lives behind this seam.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Cheap connectivity probe, run once at batch start.
    async fn ping(&self) -> Result<(), OfferbookError>;

    /// All records whose `company` field equals `company` exactly.
    /// No normalization is applied on either side.
    async fn find_by_company(&self, company: &str) -> Result<Vec<StoredRecord>, OfferbookError>;

    /// Re-read a single record, used for retry after a lost write race.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<StoredRecord>, OfferbookError>;

    /// Insert a new record. Returns it with a fresh id and version 1.
    async fn insert(&self, record: &PlacementRecord) -> Result<StoredRecord, OfferbookError>;

    /// Conditional overwrite: succeeds only if the stored version still
    /// equals `expected_version`. Returns `false` when the record changed
    /// underneath the caller.
    async fn update_versioned(
        &self,
        id: Uuid,
        expected_version: i64,
        record: &PlacementRecord,
    ) -> Result<bool, OfferbookError>;

    /// Every canonical record. Used by the duplicate janitor's scan.
    async fn all_records(&self) -> Result<Vec<StoredRecord>, OfferbookError>;

    /// Whether an offer content fingerprint has been folded in before.
    async fn fingerprint_seen(&self, fingerprint: &str) -> Result<bool, OfferbookError>;

    /// Record a fingerprint after a successful persist.
    async fn record_fingerprint(&self, fingerprint: &str)
        -> Result<InsertOutcome, OfferbookError>;
}
