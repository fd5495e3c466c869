//! Pure merge of one offer into a canonical record.
//!
//! Never reads the store, never looks at the wall clock, never logs.
//! The caller supplies `now` and persists the outcome; replaying the same
//! offer against the same record produces the same outcome.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use offerbook_common::{Offer, PlacementRecord, RoleInfo, Student};

/// What a merge produced, beyond the record itself.
#[derive(Debug)]
pub struct MergeOutcome {
    pub record: PlacementRecord,
    /// Students not previously on the record, for downstream notification.
    pub newly_added_students: Vec<Student>,
    /// False when the offer asserted nothing the record didn't already hold.
    pub changed: bool,
}

/// Merge `offer` into `existing`, or build a fresh record when there is none.
///
/// Conflict rules:
/// - role packages are monotonic maxima; `package_details` travels with a
///   package increase.
/// - students are keyed by enrollment number. A known student's package
///   only ever goes up, and `role` moves with it; a lower-package offer
///   must not overwrite the role tied to the higher package.
/// - `name` and `email` are non-authoritative metadata, refreshed from the
///   incoming value.
///
/// An offer with duplicate role names or enrollment numbers folds onto
/// itself under the same rules, so the maxima win within one offer too.
pub fn merge(
    existing: Option<&PlacementRecord>,
    offer: &Offer,
    now: DateTime<Utc>,
) -> MergeOutcome {
    let created = existing.is_none();
    let mut record = match existing {
        Some(r) => r.clone(),
        None => PlacementRecord {
            company: offer.company.clone(),
            roles: BTreeMap::new(),
            students_selected: BTreeMap::new(),
            number_of_offers: 0,
            created_at: now,
            updated_at: now,
        },
    };

    let mut changed = created;
    let mut newly_added = Vec::new();

    for rp in &offer.roles {
        if rp.role.is_empty() {
            continue;
        }
        match record.roles.get_mut(&rp.role) {
            Some(info) => {
                if rp.package > info.package {
                    info.package = rp.package;
                    if rp.package_details.is_some() {
                        info.package_details = rp.package_details.clone();
                    }
                    changed = true;
                }
            }
            None => {
                record.roles.insert(
                    rp.role.clone(),
                    RoleInfo {
                        package: rp.package,
                        package_details: rp.package_details.clone(),
                    },
                );
                changed = true;
            }
        }
    }

    for s in &offer.students_selected {
        if s.enrollment_number.is_empty() {
            continue;
        }
        match record.students_selected.get_mut(&s.enrollment_number) {
            Some(entry) => {
                if s.package > entry.package {
                    entry.package = s.package;
                    entry.role = s.role.clone();
                    changed = true;
                }
                if entry.name != s.name {
                    entry.name = s.name.clone();
                    changed = true;
                }
                if s.email.is_some() && entry.email != s.email {
                    entry.email = s.email.clone();
                    changed = true;
                }
            }
            None => {
                record
                    .students_selected
                    .insert(s.enrollment_number.clone(), s.clone());
                newly_added.push(s.clone());
                changed = true;
            }
        }
    }

    record.number_of_offers = record.students_selected.len();
    record.updated_at = now;

    MergeOutcome {
        record,
        newly_added_students: newly_added,
        changed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{offer_with, role, student};
    use chrono::Duration;

    #[test]
    fn new_record_from_offer() {
        let o = offer_with(
            "Acme",
            vec![role("SDE", 10.0)],
            vec![student("Alice", "E001", "SDE", 10.0), student("Bob", "E002", "SDE", 10.0)],
        );
        let now = Utc::now();
        let out = merge(None, &o, now);

        assert_eq!(out.record.students_selected.len(), 2);
        assert_eq!(out.record.number_of_offers, 2);
        assert_eq!(out.record.roles["SDE"].package, 10.0);
        assert_eq!(out.record.created_at, now);
        assert_eq!(out.record.updated_at, now);
        assert_eq!(out.newly_added_students.len(), 2);
        assert!(out.changed);
    }

    #[test]
    fn in_offer_duplicates_keep_the_maximum() {
        let o = offer_with(
            "Acme",
            vec![role("SDE", 10.0), role("SDE", 14.0)],
            vec![
                student("Alice", "E001", "Analyst", 9.0),
                student("Alice", "E001", "SDE", 12.0),
            ],
        );
        let out = merge(None, &o, Utc::now());

        assert_eq!(out.record.roles.len(), 1);
        assert_eq!(out.record.roles["SDE"].package, 14.0);
        assert_eq!(out.record.students_selected.len(), 1);
        let alice = &out.record.students_selected["E001"];
        assert_eq!(alice.package, 12.0);
        assert_eq!(alice.role, "SDE");
    }

    #[test]
    fn additive_merge_grows_the_student_set() {
        let base = merge(
            None,
            &offer_with(
                "Acme",
                vec![role("SDE", 10.0)],
                vec![student("Alice", "E001", "SDE", 10.0), student("Bob", "E002", "SDE", 10.0)],
            ),
            Utc::now(),
        )
        .record;

        let out = merge(
            Some(&base),
            &offer_with("Acme", vec![], vec![student("Charlie", "E003", "SDE", 10.0)]),
            Utc::now(),
        );

        assert_eq!(out.record.students_selected.len(), 3);
        assert_eq!(out.record.number_of_offers, 3);
        assert_eq!(out.newly_added_students.len(), 1);
        assert_eq!(out.newly_added_students[0].enrollment_number, "E003");
    }

    #[test]
    fn package_upgrade_is_accepted_and_role_travels() {
        let base = merge(
            None,
            &offer_with(
                "Acme",
                vec![role("SDE", 10.0)],
                vec![student("Alice", "E001", "SDE", 10.0)],
            ),
            Utc::now(),
        )
        .record;

        let out = merge(
            Some(&base),
            &offer_with(
                "Acme",
                vec![role("SDE", 12.0)],
                vec![student("Alice", "E001", "SDE II", 12.0)],
            ),
            Utc::now(),
        );

        assert_eq!(out.record.roles["SDE"].package, 12.0);
        let alice = &out.record.students_selected["E001"];
        assert_eq!(alice.package, 12.0);
        assert_eq!(alice.role, "SDE II");
        assert!(out.changed);
    }

    #[test]
    fn package_downgrade_is_rejected() {
        let base = merge(
            None,
            &offer_with("Acme", vec![], vec![student("Bob", "E002", "SDE", 10.0)]),
            Utc::now(),
        )
        .record;

        let out = merge(
            Some(&base),
            &offer_with("Acme", vec![], vec![student("Bob", "E002", "Intern", 8.0)]),
            Utc::now(),
        );

        let bob = &out.record.students_selected["E002"];
        assert_eq!(bob.package, 10.0);
        // The role tied to the higher package survives the downgrade offer.
        assert_eq!(bob.role, "SDE");
        assert!(!out.changed);
    }

    #[test]
    fn name_refresh_is_unconditional() {
        let base = merge(
            None,
            &offer_with("Acme", vec![], vec![student("Bob", "E002", "SDE", 10.0)]),
            Utc::now(),
        )
        .record;

        let out = merge(
            Some(&base),
            &offer_with("Acme", vec![], vec![student("Robert", "E002", "Intern", 8.0)]),
            Utc::now(),
        );

        let bob = &out.record.students_selected["E002"];
        assert_eq!(bob.name, "Robert");
        assert_eq!(bob.package, 10.0);
    }

    #[test]
    fn repeated_identical_offer_is_idempotent() {
        let o = offer_with(
            "Acme",
            vec![role("SDE", 10.0)],
            vec![student("Alice", "E001", "SDE", 10.0)],
        );
        let t0 = Utc::now();
        let first = merge(None, &o, t0);
        let second = merge(Some(&first.record), &o, t0 + Duration::seconds(5));

        assert_eq!(second.record.students_selected, first.record.students_selected);
        assert_eq!(second.record.roles, first.record.roles);
        assert_eq!(second.record.number_of_offers, first.record.number_of_offers);
        assert!(second.newly_added_students.is_empty());
        assert!(!second.changed);
        // updated_at still moves; "this offer was processed" bookkeeping.
        assert!(second.record.updated_at > first.record.updated_at);
        assert_eq!(second.record.created_at, first.record.created_at);
    }

    #[test]
    fn empty_student_list_updates_roles_only() {
        let base = merge(
            None,
            &offer_with("Acme", vec![], vec![student("Alice", "E001", "SDE", 10.0)]),
            Utc::now(),
        )
        .record;

        let out = merge(
            Some(&base),
            &offer_with("Acme", vec![role("Quant", 24.0)], vec![]),
            Utc::now(),
        );

        assert_eq!(out.record.roles["Quant"].package, 24.0);
        assert_eq!(out.record.students_selected.len(), 1);
        assert_eq!(out.record.number_of_offers, 1);
        assert!(out.changed);
    }

    #[test]
    fn student_role_absent_from_roles_map_is_accepted() {
        let o = offer_with(
            "Acme",
            vec![role("SDE", 10.0)],
            vec![student("Dana", "E004", "Data Scientist", 11.0)],
        );
        let out = merge(None, &o, Utc::now());

        assert!(out.record.roles.contains_key("SDE"));
        assert!(!out.record.roles.contains_key("Data Scientist"));
        assert_eq!(out.record.students_selected["E004"].role, "Data Scientist");
    }

    #[test]
    fn package_details_travel_with_the_increase() {
        let mut first = role("SDE", 10.0);
        first.package_details = Some("8 base + 2 bonus".to_string());
        let base = merge(None, &offer_with("Acme", vec![first], vec![]), Utc::now()).record;

        // Downgrade offer with different details: both rejected.
        let mut lower = role("SDE", 9.0);
        lower.package_details = Some("9 flat".to_string());
        let kept = merge(Some(&base), &offer_with("Acme", vec![lower], vec![]), Utc::now());
        assert_eq!(
            kept.record.roles["SDE"].package_details.as_deref(),
            Some("8 base + 2 bonus")
        );

        // Upgrade carries its own breakdown in.
        let mut higher = role("SDE", 12.0);
        higher.package_details = Some("10 base + 2 bonus".to_string());
        let upgraded = merge(Some(&base), &offer_with("Acme", vec![higher], vec![]), Utc::now());
        assert_eq!(upgraded.record.roles["SDE"].package, 12.0);
        assert_eq!(
            upgraded.record.roles["SDE"].package_details.as_deref(),
            Some("10 base + 2 bonus")
        );
    }

    #[test]
    fn monotonic_package_across_a_merge_sequence() {
        let packages = [10.0, 7.0, 13.0, 13.0, 2.0, 15.5, 1.0];
        let mut record: Option<PlacementRecord> = None;
        let mut floor = f64::MIN;

        for pkg in packages {
            let o = offer_with("Acme", vec![], vec![student("Alice", "E001", "SDE", pkg)]);
            let out = merge(record.as_ref(), &o, Utc::now());
            let stored = out.record.students_selected["E001"].package;
            assert!(stored >= floor);
            assert!(stored >= pkg);
            floor = stored;
            record = Some(out.record);
        }

        assert_eq!(record.unwrap().students_selected["E001"].package, 15.5);
    }
}
