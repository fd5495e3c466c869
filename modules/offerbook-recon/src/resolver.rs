//! Identity resolution: which stored record receives an incoming offer.
//!
//! Matching is exact string equality on `company`, no normalization —
//! the ingest side owns data quality for company names.

use std::cmp::Ordering;

use offerbook_common::OfferbookError;
use offerbook_store::{RecordStore, StoredRecord};

/// Outcome of looking a company up in the store.
#[derive(Debug)]
pub enum Resolution {
    /// No record exists; the caller creates one.
    None,
    /// Exactly one candidate; it is the merge target.
    One(StoredRecord),
    /// More than one canonical record exists (a prior insert race).
    /// `target` is the one merges converge on; `duplicates` are left
    /// untouched for the janitor to report. They are never merged together.
    Many {
        target: StoredRecord,
        duplicates: Vec<StoredRecord>,
    },
}

/// Find the merge target for `company`.
pub async fn resolve(
    store: &dyn RecordStore,
    company: &str,
) -> Result<Resolution, OfferbookError> {
    let mut candidates = store.find_by_company(company).await?;
    match candidates.len() {
        0 => Ok(Resolution::None),
        1 => Ok(Resolution::One(candidates.remove(0))),
        _ => {
            candidates.sort_by(newest_first);
            let target = candidates.remove(0);
            Ok(Resolution::Many {
                target,
                duplicates: candidates,
            })
        }
    }
}

/// Target ordering shared with the janitor: latest `updated_at` first,
/// ties broken by id so concurrent resolvers agree on the same target.
pub(crate) fn newest_first(a: &StoredRecord, b: &StoredRecord) -> Ordering {
    b.record
        .updated_at
        .cmp(&a.record.updated_at)
        .then_with(|| b.id.cmp(&a.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{offer_with, student};
    use chrono::{Duration, Utc};
    use offerbook_store::MemoryStore;

    fn record_updated_at(company: &str, updated_at: chrono::DateTime<Utc>) -> offerbook_common::PlacementRecord {
        let o = offer_with(company, vec![], vec![student("A", "E001", "SDE", 10.0)]);
        crate::merger::merge(None, &o, updated_at).record
    }

    #[tokio::test]
    async fn resolves_none_for_unknown_company() {
        let store = MemoryStore::new();
        assert!(matches!(resolve(&store, "Acme").await.unwrap(), Resolution::None));
    }

    #[tokio::test]
    async fn resolves_one_without_sorting() {
        let store = MemoryStore::new();
        let seeded = store.seed(record_updated_at("Acme", Utc::now()));
        match resolve(&store, "Acme").await.unwrap() {
            Resolution::One(r) => assert_eq!(r.id, seeded.id),
            other => panic!("expected One, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn company_match_is_exact_and_case_sensitive() {
        let store = MemoryStore::new();
        store.seed(record_updated_at("Acme", Utc::now()));
        assert!(matches!(resolve(&store, "acme").await.unwrap(), Resolution::None));
        assert!(matches!(resolve(&store, "Acme ").await.unwrap(), Resolution::None));
    }

    #[tokio::test]
    async fn many_picks_latest_updated_at() {
        let store = MemoryStore::new();
        let t = Utc::now();
        let older = store.seed(record_updated_at("Acme", t - Duration::hours(2)));
        let newer = store.seed(record_updated_at("Acme", t));

        match resolve(&store, "Acme").await.unwrap() {
            Resolution::Many { target, duplicates } => {
                assert_eq!(target.id, newer.id);
                assert_eq!(duplicates.len(), 1);
                assert_eq!(duplicates[0].id, older.id);
            }
            other => panic!("expected Many, got {other:?}"),
        }
    }
}
