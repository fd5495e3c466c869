//! Fixture helpers for merger/resolver/reconciler tests.

use chrono::Utc;
use offerbook_common::{Offer, RolePackage, Student};

pub fn student(name: &str, enrollment: &str, role: &str, package: f64) -> Student {
    Student {
        name: name.to_string(),
        enrollment_number: enrollment.to_string(),
        role: role.to_string(),
        package,
        email: None,
    }
}

pub fn role(name: &str, package: f64) -> RolePackage {
    RolePackage {
        role: name.to_string(),
        package,
        package_details: None,
    }
}

pub fn offer_with(company: &str, roles: Vec<RolePackage>, students: Vec<Student>) -> Offer {
    Offer {
        company: company.to_string(),
        roles,
        number_of_offers: students.len(),
        students_selected: students,
        received_at: Utc::now(),
        source: None,
        time_sent: None,
    }
}
