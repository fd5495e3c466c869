//! Duplicate janitor — read-only report of companies with more than one
//! canonical record. Surfaces them for operator remediation; never writes.
//! Auto-merging diverged duplicates could double-count students, so the
//! engine does not do it.

use std::collections::BTreeMap;

use tracing::warn;
use uuid::Uuid;

use offerbook_common::OfferbookError;
use offerbook_store::{RecordStore, StoredRecord};

use crate::resolver::newest_first;

/// One company with duplicate canonical records. `target_id` is the record
/// the resolver currently directs merges to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateReport {
    pub company: String,
    pub record_ids: Vec<Uuid>,
    pub target_id: Uuid,
}

/// Group all records by exact company string and report every group with
/// more than one member, ordered by company for stable output.
pub async fn scan(store: &dyn RecordStore) -> Result<Vec<DuplicateReport>, OfferbookError> {
    let records = store.all_records().await?;

    let mut by_company: BTreeMap<String, Vec<StoredRecord>> = BTreeMap::new();
    for r in records {
        by_company.entry(r.record.company.clone()).or_default().push(r);
    }

    let mut reports = Vec::new();
    for (company, mut group) in by_company {
        if group.len() < 2 {
            continue;
        }
        group.sort_by(newest_first);
        warn!(
            company = %company,
            records = group.len(),
            "Company has multiple canonical records"
        );
        reports.push(DuplicateReport {
            target_id: group[0].id,
            record_ids: group.iter().map(|r| r.id).collect(),
            company,
        });
    }

    Ok(reports)
}
