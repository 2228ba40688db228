use serde::Serialize;

use super::domain::{
    Application, ApplicationStatus, FlatType, MaritalStatus, Nric, User,
};
use super::project::Project;

/// Snapshot handed to the buyer after a successful booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingReceipt {
    pub applicant_name: String,
    pub applicant_nric: Nric,
    pub age: u32,
    pub marital_status: MaritalStatus,
    pub flat_type: FlatType,
    pub price: u32,
    pub project: String,
    pub neighborhood: String,
}

impl BookingReceipt {
    pub fn new(buyer: &User, project: &Project, flat_type: FlatType) -> Self {
        Self {
            applicant_name: buyer.name.clone(),
            applicant_nric: buyer.nric.clone(),
            age: buyer.age,
            marital_status: buyer.marital_status,
            flat_type,
            price: project.price(flat_type),
            project: project.name.clone(),
            neighborhood: project.neighborhood.clone(),
        }
    }
}

/// One row of the manager-facing booking report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingReportRow {
    pub applicant_nric: Nric,
    pub applicant_name: String,
    pub age: u32,
    pub marital_status: MaritalStatus,
    pub flat_type: FlatType,
    pub project: String,
    pub neighborhood: String,
}

/// Optional narrowing criteria for the booking report.
#[derive(Debug, Clone, Copy, Default)]
pub struct BookingReportFilter {
    pub marital_status: Option<MaritalStatus>,
    pub flat_type: Option<FlatType>,
}

/// Joins booked applications against the people and project registries.
/// Rows whose applicant or project cannot be resolved are skipped.
pub fn booking_report(
    applications: &[Application],
    users: &[User],
    projects: &[Project],
    filter: BookingReportFilter,
) -> Vec<BookingReportRow> {
    let mut rows: Vec<BookingReportRow> = applications
        .iter()
        .filter(|app| app.status() == ApplicationStatus::Booked)
        .filter_map(|app| {
            let buyer = users.iter().find(|user| user.nric == app.applicant)?;
            let project = projects.iter().find(|project| project.name == app.project)?;
            Some(BookingReportRow {
                applicant_nric: buyer.nric.clone(),
                applicant_name: buyer.name.clone(),
                age: buyer.age,
                marital_status: buyer.marital_status,
                flat_type: app.flat_type,
                project: project.name.clone(),
                neighborhood: project.neighborhood.clone(),
            })
        })
        .filter(|row| {
            filter
                .marital_status
                .map_or(true, |status| row.marital_status == status)
                && filter.flat_type.map_or(true, |flat| row.flat_type == flat)
        })
        .collect();

    rows.sort_by(|a, b| a.applicant_nric.cmp(&b.applicant_nric));
    rows
}
