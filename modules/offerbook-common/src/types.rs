use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::OfferbookError;

// --- Input types ---

/// One role/package pair asserted by an offer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RolePackage {
    pub role: String,
    /// Compensation in LPA.
    pub package: f64,
    /// Free-text breakdown (base, stipend, bonuses). Travels with the package.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_details: Option<String>,
}

/// A student selection asserted by an offer. Identity is `enrollment_number`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub name: String,
    pub enrollment_number: String,
    pub role: String,
    pub package: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// One scraped placement announcement: a company hiring N students at
/// given roles/packages. Immutable once received.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offer {
    pub company: String,
    pub roles: Vec<RolePackage>,
    pub students_selected: Vec<Student>,
    /// Informational only. The engine always recomputes the real count.
    pub number_of_offers: usize,
    pub received_at: DateTime<Utc>,
    /// Provenance from the ingesting pipeline, carried through to events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_sent: Option<String>,
}

impl Offer {
    /// Check the fields the engine cannot work without: a company name and
    /// an enrollment number on every student.
    pub fn validate(&self) -> Result<(), OfferbookError> {
        if self.company.is_empty() {
            return Err(OfferbookError::Validation(
                "offer has no company name".to_string(),
            ));
        }
        for s in &self.students_selected {
            if s.enrollment_number.is_empty() {
                return Err(OfferbookError::Validation(format!(
                    "student '{}' in offer for '{}' has no enrollment number",
                    s.name, self.company
                )));
            }
        }
        Ok(())
    }

    /// Content fingerprint over company, roles and students. Order-insensitive
    /// and independent of `received_at`, so a re-scrape of the same notice
    /// hashes identically.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.company.as_bytes());
        hasher.update([0]);

        let mut roles: Vec<&RolePackage> = self.roles.iter().collect();
        roles.sort_by(|a, b| a.role.cmp(&b.role));
        for r in roles {
            hasher.update(r.role.as_bytes());
            hasher.update(r.package.to_le_bytes());
            hasher.update([0]);
        }

        let mut students: Vec<&Student> = self.students_selected.iter().collect();
        students.sort_by(|a, b| a.enrollment_number.cmp(&b.enrollment_number));
        for s in students {
            hasher.update(s.enrollment_number.as_bytes());
            hasher.update(s.name.as_bytes());
            hasher.update(s.role.as_bytes());
            hasher.update(s.package.to_le_bytes());
            hasher.update([0]);
        }

        hex::encode(hasher.finalize())
    }
}

// --- Canonical record ---

/// Per-role state on a canonical record: the highest package ever observed
/// for that role name, plus the breakdown that came with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleInfo {
    pub package: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_details: Option<String>,
}

/// The canonical, continuously-merged per-company document.
///
/// Map keys enforce the uniqueness invariants structurally: one entry per
/// role name, one entry per enrollment number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementRecord {
    pub company: String,
    pub roles: BTreeMap<String, RoleInfo>,
    /// Keyed by enrollment number.
    pub students_selected: BTreeMap<String, Student>,
    /// Always `students_selected.len()`. Never read from input.
    pub number_of_offers: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// --- Batch output ---

/// Change event emitted for the downstream notification step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MergeEvent {
    NewCompany {
        company: String,
        record_id: Uuid,
        total_students: usize,
        roles: Vec<String>,
    },
    StudentsAdded {
        company: String,
        record_id: Uuid,
        students: Vec<Student>,
        total_students: usize,
    },
}

/// An offer the batch could not fold in, with enough context for replay.
#[derive(Debug)]
pub struct OfferFailure {
    pub offer: Offer,
    pub error: OfferbookError,
}

/// Aggregate outcome of one `reconcile` call.
#[derive(Debug, Default)]
pub struct BatchResult {
    pub processed: usize,
    pub created: usize,
    pub updated: usize,
    /// Offers whose fingerprint was already folded in by an earlier batch.
    pub skipped: usize,
    pub failed: Vec<OfferFailure>,
    pub events: Vec<MergeEvent>,
}

impl BatchResult {
    pub fn ok(&self) -> bool {
        self.failed.is_empty()
    }
}
