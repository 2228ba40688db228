use std::sync::Arc;

use tracing::{error, warn};

use super::domain::{Nric, Registration, RegistrationStatus, RuleViolation, User, UserRole};
use super::eligibility::{check_officer_registration_eligibility, ApprovedWindow};
use super::project::Project;
use super::service::{ensure_manages, integrity, LifecycleError};
use super::store::{ApplicationStore, IntegrityError, ProjectStore, RegistrationStore};

/// Orchestrates officer registrations: submission, manager approval with the
/// officer-slot handover, and rejection.
pub struct RegistrationLifecycleService<S> {
    store: Arc<S>,
}

impl<S> RegistrationLifecycleService<S>
where
    S: RegistrationStore + ProjectStore + ApplicationStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn registrations_for_officer(
        &self,
        officer: &Nric,
    ) -> Result<Vec<Registration>, LifecycleError> {
        self.store
            .registrations_for_officer(officer)
            .map_err(integrity)
    }

    pub fn registrations_for_project(
        &self,
        project: &str,
    ) -> Result<Vec<Registration>, LifecycleError> {
        self.store
            .registrations_for_project(project)
            .map_err(integrity)
    }

    /// Submit a registration for `project_name` once the eligibility rules
    /// pass, leaving it Pending for the managing manager.
    pub fn register(
        &self,
        officer: &User,
        project_name: &str,
    ) -> Result<Registration, LifecycleError> {
        if officer.role != UserRole::Officer {
            return Err(RuleViolation::NotAnOfficer.into());
        }

        let project = self
            .store
            .fetch_project(project_name)
            .map_err(integrity)?
            .ok_or_else(|| RuleViolation::UnknownProject(project_name.to_string()))?;

        let registrations = self
            .store
            .registrations_for_officer(&officer.nric)
            .map_err(integrity)?;
        let approved_windows = self.approved_windows(&registrations, None)?;
        let applications = self
            .store
            .applications_for_applicant(&officer.nric)
            .map_err(integrity)?;

        check_officer_registration_eligibility(
            officer,
            &project,
            &registrations,
            &approved_windows,
            &applications,
        )?;

        let registration = Registration::new(officer.nric.clone(), project.name)?;
        self.store
            .insert_registration(registration)
            .map_err(integrity)
    }

    /// Approve a pending registration: the officer takes a project slot and
    /// the registration becomes Approved, persisted in that order. A failed
    /// persistence step is rolled back best-effort and the original failure
    /// re-raised; rollback failures escalate to
    /// [`LifecycleError::Compensation`].
    pub fn manager_approve(
        &self,
        manager: &User,
        officer: &Nric,
        project_name: &str,
    ) -> Result<Registration, LifecycleError> {
        let mut registration = self.require_registration(officer, project_name)?;
        let mut project = self
            .store
            .fetch_project(project_name)
            .map_err(integrity)?
            .ok_or_else(|| IntegrityError::MissingProject(project_name.to_string()))?;
        ensure_manages(manager, &project)?;

        if registration.status() != RegistrationStatus::Pending {
            return Err(RuleViolation::RegistrationNotPending(registration.status()).into());
        }
        if !project.can_add_officer() {
            return Err(RuleViolation::NoOfficerSlots(project.name.clone()).into());
        }

        // Two pending registrations for overlapping windows may both reach
        // approval; the officer's other Approved windows are re-checked here.
        let registrations = self
            .store
            .registrations_for_officer(officer)
            .map_err(integrity)?;
        let approved_windows = self.approved_windows(&registrations, Some(project_name))?;
        for window in &approved_windows {
            if project_overlaps(&project, window) {
                return Err(RuleViolation::OverlappingRegistration(window.project.clone()).into());
            }
        }

        project.add_officer(officer)?;

        if let Err(err) = self.store.update_project(project.clone()) {
            return Err(self.compensate_approval(
                integrity(err),
                &registration,
                None,
                officer,
            ));
        }

        registration.transition_to(RegistrationStatus::Approved)?;
        if let Err(err) = self.store.update_registration(registration.clone()) {
            return Err(self.compensate_approval(
                integrity(err),
                &registration,
                Some(&project),
                officer,
            ));
        }

        Ok(registration)
    }

    pub fn manager_reject(
        &self,
        manager: &User,
        officer: &Nric,
        project_name: &str,
    ) -> Result<Registration, LifecycleError> {
        let mut registration = self.require_registration(officer, project_name)?;
        let project = self
            .store
            .fetch_project(project_name)
            .map_err(integrity)?
            .ok_or_else(|| IntegrityError::MissingProject(project_name.to_string()))?;
        ensure_manages(manager, &project)?;

        if registration.status() != RegistrationStatus::Pending {
            return Err(RuleViolation::RegistrationNotPending(registration.status()).into());
        }

        registration.transition_to(RegistrationStatus::Rejected)?;
        self.store
            .update_registration(registration.clone())
            .map_err(integrity)?;
        Ok(registration)
    }

    fn compensate_approval(
        &self,
        original: LifecycleError,
        registration: &Registration,
        officer_added: Option<&Project>,
        officer: &Nric,
    ) -> LifecycleError {
        warn!(
            project = %registration.project,
            officer = %officer,
            %original,
            "registration approval failed, rolling back",
        );
        let mut rollback_failures = Vec::new();

        let reverted = match Registration::from_parts(
            registration.officer.clone(),
            registration.project.clone(),
            RegistrationStatus::Pending,
        ) {
            Ok(reverted) => Some(reverted),
            Err(err) => {
                rollback_failures.push(format!("rebuild pending registration: {err}"));
                None
            }
        };
        if let Some(reverted) = reverted {
            if let Err(err) = self.store.update_registration(reverted) {
                error!(officer = %officer, %err, "could not revert registration status");
                rollback_failures.push(format!("revert registration status: {err}"));
            }
        }

        if let Some(project) = officer_added {
            let mut restored = project.clone();
            restored.remove_officer(officer);
            if let Err(err) = self.store.update_project(restored) {
                error!(project = %project.name, %err, "could not remove officer during rollback");
                rollback_failures.push(format!("remove officer from project: {err}"));
            }
        }

        if rollback_failures.is_empty() {
            original
        } else {
            LifecycleError::Compensation {
                original: Box::new(original),
                rollback_failures,
            }
        }
    }

    fn require_registration(
        &self,
        officer: &Nric,
        project: &str,
    ) -> Result<Registration, LifecycleError> {
        self.store
            .fetch_registration(officer, project)
            .map_err(integrity)?
            .ok_or_else(|| {
                IntegrityError::MissingRegistration {
                    officer: officer.clone(),
                    project: project.to_string(),
                }
                .into()
            })
    }

    /// Windows of the projects behind the officer's Approved registrations.
    /// Registrations pointing at a vanished project are skipped.
    fn approved_windows(
        &self,
        registrations: &[Registration],
        exclude_project: Option<&str>,
    ) -> Result<Vec<ApprovedWindow>, LifecycleError> {
        let mut windows = Vec::new();
        for registration in registrations {
            if registration.status() != RegistrationStatus::Approved {
                continue;
            }
            if exclude_project == Some(registration.project.as_str()) {
                continue;
            }
            if let Some(project) = self
                .store
                .fetch_project(&registration.project)
                .map_err(integrity)?
            {
                windows.push(ApprovedWindow {
                    project: project.name,
                    open_date: project.open_date,
                    close_date: project.close_date,
                });
            }
        }
        Ok(windows)
    }
}

fn project_overlaps(project: &Project, window: &ApprovedWindow) -> bool {
    super::project::windows_overlap(
        project.open_date,
        project.close_date,
        window.open_date,
        window.close_date,
    )
}
