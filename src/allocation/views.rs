use serde::Serialize;

use super::domain::{Application, Nric, Registration};

/// Plain snapshot of an application for presentation layers.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationView {
    pub applicant: Nric,
    pub project: String,
    pub flat_type: &'static str,
    pub status: &'static str,
    pub withdrawal_requested: bool,
}

impl From<&Application> for ApplicationView {
    fn from(application: &Application) -> Self {
        Self {
            applicant: application.applicant.clone(),
            project: application.project.clone(),
            flat_type: application.flat_type.label(),
            status: application.status().label(),
            withdrawal_requested: application.withdrawal_requested(),
        }
    }
}

/// Plain snapshot of an officer registration for presentation layers.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationView {
    pub officer: Nric,
    pub project: String,
    pub status: &'static str,
}

impl From<&Registration> for RegistrationView {
    fn from(registration: &Registration) -> Self {
        Self {
            officer: registration.officer.clone(),
            project: registration.project.clone(),
            status: registration.status().label(),
        }
    }
}
