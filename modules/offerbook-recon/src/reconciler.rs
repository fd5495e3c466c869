//! Batch orchestration: resolve, merge, persist — per offer, with bounded
//! CAS retries and continue-on-error accounting.
//!
//! One bad offer never aborts a batch. Only batch setup (a store that
//! cannot be reached at all) propagates out of `reconcile`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};
use uuid::Uuid;

use offerbook_common::{
    BatchResult, MergeEvent, Offer, OfferFailure, OfferbookError, ReconcilerConfig,
};
use offerbook_store::RecordStore;

use crate::merger::merge;
use crate::resolver::{resolve, Resolution};

pub struct Reconciler {
    store: Arc<dyn RecordStore>,
    config: ReconcilerConfig,
}

enum Applied {
    Created { id: Uuid, event: MergeEvent },
    Updated { id: Uuid, event: Option<MergeEvent> },
}

enum Attempt {
    Done(Applied),
    /// The conditional write found a different version than it read.
    LostRace(Uuid),
}

impl Reconciler {
    pub fn new(store: Arc<dyn RecordStore>, config: ReconcilerConfig) -> Self {
        Self { store, config }
    }

    /// Fold a batch of offers into the store. Fails fast only when the
    /// store is unreachable at batch start; everything after that is
    /// per-offer and lands in `BatchResult::failed`.
    pub async fn reconcile(&self, batch: &[Offer]) -> Result<BatchResult, OfferbookError> {
        self.bounded(self.store.ping()).await?;

        info!(offers = batch.len(), "Reconciling offer batch");
        let mut result = BatchResult::default();

        for offer in batch {
            result.processed += 1;

            if let Err(error) = offer.validate() {
                warn!(company = %offer.company, %error, "Skipping invalid offer");
                result.failed.push(OfferFailure {
                    offer: offer.clone(),
                    error,
                });
                continue;
            }

            let fingerprint = offer.fingerprint();
            if self.config.skip_seen_offers {
                match self.bounded(self.store.fingerprint_seen(&fingerprint)).await {
                    Ok(true) => {
                        debug!(company = %offer.company, "Offer content already folded in");
                        result.skipped += 1;
                        continue;
                    }
                    Ok(false) => {}
                    Err(error) => {
                        result.failed.push(OfferFailure {
                            offer: offer.clone(),
                            error,
                        });
                        continue;
                    }
                }
            }

            match self.apply(offer).await {
                Ok(Applied::Created { id, event }) => {
                    info!(company = %offer.company, %id, "Created placement record");
                    result.created += 1;
                    result.events.push(event);
                    self.remember(&fingerprint).await;
                }
                Ok(Applied::Updated { id, event }) => {
                    info!(company = %offer.company, %id, "Updated placement record");
                    result.updated += 1;
                    result.events.extend(event);
                    self.remember(&fingerprint).await;
                }
                Err(error) => {
                    warn!(company = %offer.company, %error, "Failed to reconcile offer");
                    result.failed.push(OfferFailure {
                        offer: offer.clone(),
                        error,
                    });
                }
            }
        }

        info!(
            created = result.created,
            updated = result.updated,
            skipped = result.skipped,
            failed = result.failed.len(),
            "Batch complete"
        );
        Ok(result)
    }

    /// One offer, with bounded retries and exponential backoff. Two
    /// conditions retry: a conditional write that lost a race (fresh
    /// read-merge-write) and a store that reported itself unavailable.
    /// Anything else fails the offer immediately.
    async fn apply(&self, offer: &Offer) -> Result<Applied, OfferbookError> {
        let mut conflict_with: Option<Uuid> = None;

        for attempt in 1..=self.config.max_write_attempts {
            if attempt > 1 {
                sleep(Duration::from_millis(
                    self.config.retry_backoff_ms << (attempt - 2).min(16),
                ))
                .await;
            }

            match self.try_apply(offer).await {
                Ok(Attempt::Done(applied)) => return Ok(applied),
                Ok(Attempt::LostRace(id)) => {
                    conflict_with = Some(id);
                    debug!(
                        company = %offer.company,
                        %id,
                        attempt,
                        "Conditional write lost a race; re-reading"
                    );
                }
                Err(OfferbookError::StoreUnavailable(msg)) => {
                    warn!(company = %offer.company, attempt, error = %msg, "Store unavailable");
                    if attempt == self.config.max_write_attempts {
                        return Err(OfferbookError::StoreUnavailable(msg));
                    }
                }
                Err(other) => return Err(other),
            }
        }

        Err(OfferbookError::Conflict {
            id: conflict_with.unwrap_or_else(Uuid::nil),
            attempts: self.config.max_write_attempts,
        })
    }

    /// One read-merge-write cycle.
    async fn try_apply(&self, offer: &Offer) -> Result<Attempt, OfferbookError> {
        let resolution = self
            .bounded(resolve(self.store.as_ref(), &offer.company))
            .await?;

        let target = match resolution {
            Resolution::None => {
                // Two runs can both land here and both insert; the resolver's
                // latest-updated_at rule converges later merges onto one of
                // the duplicates, and the janitor reports the other.
                let outcome = merge(None, offer, Utc::now());
                let stored = self.bounded(self.store.insert(&outcome.record)).await?;
                let event = MergeEvent::NewCompany {
                    company: offer.company.clone(),
                    record_id: stored.id,
                    total_students: outcome.record.number_of_offers,
                    roles: outcome.record.roles.keys().cloned().collect(),
                };
                return Ok(Attempt::Done(Applied::Created {
                    id: stored.id,
                    event,
                }));
            }
            Resolution::One(target) => target,
            Resolution::Many { target, duplicates } => {
                warn!(
                    company = %offer.company,
                    duplicates = duplicates.len(),
                    target = %target.id,
                    "Multiple canonical records; merging into the latest"
                );
                target
            }
        };

        let outcome = merge(Some(&target.record), offer, Utc::now());
        let written = self
            .bounded(
                self.store
                    .update_versioned(target.id, target.version, &outcome.record),
            )
            .await?;

        if !written {
            return Ok(Attempt::LostRace(target.id));
        }

        let event = (!outcome.newly_added_students.is_empty()).then(|| MergeEvent::StudentsAdded {
            company: offer.company.clone(),
            record_id: target.id,
            students: outcome.newly_added_students,
            total_students: outcome.record.number_of_offers,
        });
        Ok(Attempt::Done(Applied::Updated {
            id: target.id,
            event,
        }))
    }

    /// Best-effort: a fingerprint that fails to persist only costs a
    /// redundant (idempotent) merge on the next batch.
    async fn remember(&self, fingerprint: &str) {
        if !self.config.skip_seen_offers {
            return;
        }
        if let Err(error) = self.bounded(self.store.record_fingerprint(fingerprint)).await {
            warn!(%error, "Failed to record offer fingerprint");
        }
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, OfferbookError>
    where
        F: Future<Output = Result<T, OfferbookError>>,
    {
        match timeout(Duration::from_millis(self.config.store_timeout_ms), fut).await {
            Ok(result) => result,
            Err(_) => Err(OfferbookError::Timeout(self.config.store_timeout_ms)),
        }
    }
}
