//! Pure eligibility predicates shared by the lifecycle services.
//!
//! Every function here is side-effect free: callers gather the relevant
//! records and pass them in, so the rules can be exercised in isolation.

use chrono::NaiveDate;

use super::domain::{
    Application, FlatType, MaritalStatus, Registration, RuleViolation, User, UserRole,
};
use super::project::{windows_overlap, Project};

const SINGLE_MINIMUM_AGE: u32 = 35;
const MARRIED_MINIMUM_AGE: u32 = 21;

/// Application window of a project an officer is already approved for.
#[derive(Debug, Clone)]
pub struct ApprovedWindow {
    pub project: String,
    pub open_date: NaiveDate,
    pub close_date: NaiveDate,
}

/// Decides whether `applicant` may apply to `project` for `flat_type`.
///
/// `active_application` is the applicant's current non-concluded application,
/// if any; `has_registration_for_project` reports whether the applicant holds
/// an officer registration (any status) for this same project.
pub fn check_applicant_eligibility(
    applicant: &User,
    project: &Project,
    flat_type: FlatType,
    active_application: Option<&Application>,
    has_registration_for_project: bool,
    today: NaiveDate,
) -> Result<(), RuleViolation> {
    if !project.is_open(today) {
        return Err(RuleViolation::ProjectNotOpen(project.name.clone()));
    }
    if active_application.is_some_and(Application::is_active) {
        return Err(RuleViolation::ActiveApplicationExists);
    }
    if applicant.role == UserRole::Manager {
        return Err(RuleViolation::ManagerCannotApply);
    }
    if applicant.role == UserRole::Officer && has_registration_for_project {
        return Err(RuleViolation::RegisteredAsOfficer);
    }

    match applicant.marital_status {
        MaritalStatus::Single => {
            if applicant.age < SINGLE_MINIMUM_AGE || flat_type != FlatType::smallest() {
                return Err(RuleViolation::SingleApplicantIneligible);
            }
        }
        MaritalStatus::Married => {
            if applicant.age < MARRIED_MINIMUM_AGE {
                return Err(RuleViolation::MarriedApplicantTooYoung);
            }
        }
    }

    if project.units(flat_type) == 0 {
        return Err(RuleViolation::NoUnitsAvailable {
            project: project.name.clone(),
            flat_type,
        });
    }

    Ok(())
}

/// Decides whether `officer` may submit a registration for `project`.
///
/// `registrations` and `applications` are the officer's own records across
/// all projects; `approved_windows` carries the application windows of the
/// projects behind the officer's Approved registrations.
pub fn check_officer_registration_eligibility(
    officer: &User,
    project: &Project,
    registrations: &[Registration],
    approved_windows: &[ApprovedWindow],
    applications: &[Application],
) -> Result<(), RuleViolation> {
    if registrations.iter().any(|reg| reg.project == project.name) {
        return Err(RuleViolation::AlreadyRegistered(project.name.clone()));
    }
    if project.manager == officer.nric {
        return Err(RuleViolation::OwnProjectRegistration);
    }
    if applications.iter().any(|app| app.project == project.name) {
        return Err(RuleViolation::AppliedToProject);
    }

    for window in approved_windows {
        if windows_overlap(
            project.open_date,
            project.close_date,
            window.open_date,
            window.close_date,
        ) {
            return Err(RuleViolation::OverlappingRegistration(
                window.project.clone(),
            ));
        }
    }

    Ok(())
}
