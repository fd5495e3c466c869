//! In-memory RecordStore for tests. Stateful, with fault-injection knobs
//! for exercising the orchestrator's unavailability and conflict paths.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use offerbook_common::{OfferbookError, PlacementRecord};

use crate::store::{InsertOutcome, RecordStore, StoredRecord};

#[derive(Default)]
struct Inner {
    records: HashMap<Uuid, (i64, PlacementRecord)>,
    fingerprints: HashSet<String>,
}

/// HashMap-backed store. `seed` preloads records; `force_conflicts` makes
/// the next N conditional writes report a lost race without touching state.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    unavailable: AtomicBool,
    forced_conflicts: AtomicU32,
    forced_write_errors: AtomicU32,
    update_calls: AtomicU32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record directly, bypassing the trait. Returns its identity.
    pub fn seed(&self, record: PlacementRecord) -> StoredRecord {
        let id = Uuid::new_v4();
        let mut inner = self.inner.lock().unwrap();
        inner.records.insert(id, (1, record.clone()));
        StoredRecord {
            id,
            version: 1,
            record,
        }
    }

    /// Read a record directly for assertions.
    pub fn get(&self, id: Uuid) -> Option<StoredRecord> {
        let inner = self.inner.lock().unwrap();
        inner.records.get(&id).map(|(version, record)| StoredRecord {
            id,
            version: *version,
            record: record.clone(),
        })
    }

    pub fn record_count(&self) -> usize {
        self.inner.lock().unwrap().records.len()
    }

    /// Make every call fail with `StoreUnavailable` until unset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Fail the next `n` conditional writes as if another writer won the race.
    pub fn force_conflicts(&self, n: u32) {
        self.forced_conflicts.store(n, Ordering::SeqCst);
    }

    /// Fail the next `n` writes (insert or conditional update) with a store
    /// error, while reads and pings keep working.
    pub fn force_write_errors(&self, n: u32) {
        self.forced_write_errors.store(n, Ordering::SeqCst);
    }

    fn take_write_error(&self) -> Result<(), OfferbookError> {
        if self
            .forced_write_errors
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            Err(OfferbookError::Store("injected write failure".to_string()))
        } else {
            Ok(())
        }
    }

    /// Number of `update_versioned` calls observed, forced failures included.
    pub fn update_calls(&self) -> u32 {
        self.update_calls.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), OfferbookError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(OfferbookError::StoreUnavailable(
                "memory store marked unavailable".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn ping(&self) -> Result<(), OfferbookError> {
        self.check_available()
    }

    async fn find_by_company(&self, company: &str) -> Result<Vec<StoredRecord>, OfferbookError> {
        self.check_available()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .records
            .iter()
            .filter(|(_, (_, r))| r.company == company)
            .map(|(id, (version, record))| StoredRecord {
                id: *id,
                version: *version,
                record: record.clone(),
            })
            .collect())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<StoredRecord>, OfferbookError> {
        self.check_available()?;
        Ok(self.get(id))
    }

    async fn insert(&self, record: &PlacementRecord) -> Result<StoredRecord, OfferbookError> {
        self.check_available()?;
        self.take_write_error()?;
        Ok(self.seed(record.clone()))
    }

    async fn update_versioned(
        &self,
        id: Uuid,
        expected_version: i64,
        record: &PlacementRecord,
    ) -> Result<bool, OfferbookError> {
        self.check_available()?;
        self.take_write_error()?;
        self.update_calls.fetch_add(1, Ordering::SeqCst);

        if self
            .forced_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Ok(false);
        }

        let mut inner = self.inner.lock().unwrap();
        match inner.records.get_mut(&id) {
            Some((version, stored)) if *version == expected_version => {
                *version += 1;
                *stored = record.clone();
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Ok(false),
        }
    }

    async fn all_records(&self) -> Result<Vec<StoredRecord>, OfferbookError> {
        self.check_available()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .records
            .iter()
            .map(|(id, (version, record))| StoredRecord {
                id: *id,
                version: *version,
                record: record.clone(),
            })
            .collect())
    }

    async fn fingerprint_seen(&self, fingerprint: &str) -> Result<bool, OfferbookError> {
        self.check_available()?;
        Ok(self.inner.lock().unwrap().fingerprints.contains(fingerprint))
    }

    async fn record_fingerprint(
        &self,
        fingerprint: &str,
    ) -> Result<InsertOutcome, OfferbookError> {
        self.check_available()?;
        let mut inner = self.inner.lock().unwrap();
        if inner.fingerprints.insert(fingerprint.to_string()) {
            Ok(InsertOutcome::Inserted)
        } else {
            Ok(InsertOutcome::AlreadyExists)
        }
    }
}
