use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{error, warn};

use super::domain::{
    Application, ApplicationStatus, FlatType, Nric, RuleViolation, User, UserRole, ValidationError,
};
use super::eligibility::check_applicant_eligibility;
use super::project::Project;
use super::report::BookingReceipt;
use super::store::{
    ApplicationStore, IntegrityError, ProjectStore, RegistrationStore, StoreError, UserDirectory,
};

/// Outcome classification for every lifecycle operation.
///
/// `Rule` rejections are ordinary and recoverable; `Integrity` means the
/// registry contradicted the lifecycle's assumptions; `Compensation` means a
/// rollback itself failed and the registry needs operator attention.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Rule(#[from] RuleViolation),
    #[error(transparent)]
    Integrity(#[from] IntegrityError),
    #[error("rollback incomplete after '{original}': {}", .rollback_failures.join("; "))]
    Compensation {
        original: Box<LifecycleError>,
        rollback_failures: Vec<String>,
    },
}

pub(crate) fn integrity(err: StoreError) -> LifecycleError {
    LifecycleError::Integrity(IntegrityError::Store(err))
}

/// Orchestrates the application lifecycle: apply, withdrawal handling,
/// manager decisions, and flat booking against the shared project inventory.
pub struct ApplicationLifecycleService<S> {
    store: Arc<S>,
}

impl<S> ApplicationLifecycleService<S>
where
    S: ApplicationStore + ProjectStore + RegistrationStore + UserDirectory,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn active_application(&self, applicant: &Nric) -> Result<Option<Application>, LifecycleError> {
        self.store.active_for_applicant(applicant).map_err(integrity)
    }

    pub fn applications_for_project(&self, project: &str) -> Result<Vec<Application>, LifecycleError> {
        self.store.applications_for_project(project).map_err(integrity)
    }

    /// Submit a new application after the eligibility rules pass.
    pub fn apply(
        &self,
        applicant: &User,
        project_name: &str,
        flat_type: FlatType,
        today: NaiveDate,
    ) -> Result<Application, LifecycleError> {
        let project = self
            .store
            .fetch_project(project_name)
            .map_err(integrity)?
            .ok_or_else(|| RuleViolation::UnknownProject(project_name.to_string()))?;

        let active = self
            .store
            .active_for_applicant(&applicant.nric)
            .map_err(integrity)?;
        let has_registration = self
            .store
            .fetch_registration(&applicant.nric, &project.name)
            .map_err(integrity)?
            .is_some();

        check_applicant_eligibility(
            applicant,
            &project,
            flat_type,
            active.as_ref(),
            has_registration,
            today,
        )?;

        let application = Application::new(applicant.nric.clone(), project.name.clone(), flat_type)?;
        self.store.insert_application(application).map_err(integrity)
    }

    /// Flag the applicant's current application for withdrawal; the status
    /// stays unchanged until a manager decides.
    pub fn request_withdrawal(&self, applicant: &Nric) -> Result<Application, LifecycleError> {
        let mut application = self.require_active(applicant)?;
        application.request_withdrawal()?;
        self.store
            .update_application(application.clone())
            .map_err(integrity)?;
        Ok(application)
    }

    /// Approve a pending application, consuming no inventory yet. When the
    /// requested flat type has run out the application is concluded as
    /// Unsuccessful on the spot and the failure is reported.
    pub fn manager_approve(
        &self,
        manager: &User,
        applicant: &Nric,
    ) -> Result<Application, LifecycleError> {
        let mut application = self.require_active(applicant)?;
        let project = self.require_project(&application.project)?;
        ensure_manages(manager, &project)?;

        if application.status() != ApplicationStatus::Pending {
            return Err(RuleViolation::ApplicationNotPending(application.status()).into());
        }
        if application.withdrawal_requested() {
            return Err(RuleViolation::WithdrawalPending.into());
        }

        if project.units(application.flat_type) == 0 {
            application.transition_to(ApplicationStatus::Unsuccessful)?;
            self.store
                .update_application(application.clone())
                .map_err(integrity)?;
            return Err(RuleViolation::NoUnitsAvailable {
                project: project.name,
                flat_type: application.flat_type,
            }
            .into());
        }

        application.transition_to(ApplicationStatus::Successful)?;
        self.store
            .update_application(application.clone())
            .map_err(integrity)?;
        Ok(application)
    }

    pub fn manager_reject(
        &self,
        manager: &User,
        applicant: &Nric,
    ) -> Result<Application, LifecycleError> {
        let mut application = self.require_active(applicant)?;
        let project = self.require_project(&application.project)?;
        ensure_manages(manager, &project)?;

        if application.status() != ApplicationStatus::Pending {
            return Err(RuleViolation::ApplicationNotPending(application.status()).into());
        }

        application.transition_to(ApplicationStatus::Unsuccessful)?;
        self.store
            .update_application(application.clone())
            .map_err(integrity)?;
        Ok(application)
    }

    /// Conclude a flagged application. A booked flat returns to the project
    /// inventory before the application record is persisted.
    pub fn manager_approve_withdrawal(
        &self,
        manager: &User,
        applicant: &Nric,
    ) -> Result<Application, LifecycleError> {
        let mut application = self.require_active(applicant)?;
        let project = self.require_project(&application.project)?;
        ensure_manages(manager, &project)?;

        if !application.withdrawal_requested() {
            return Err(RuleViolation::NoWithdrawalRequested.into());
        }

        if application.status() == ApplicationStatus::Booked {
            let mut restored = project;
            restored.increment_units(application.flat_type);
            self.store.update_project(restored).map_err(integrity)?;
        }

        application.transition_to(ApplicationStatus::Unsuccessful)?;
        application.clear_withdrawal();
        self.store
            .update_application(application.clone())
            .map_err(integrity)?;
        Ok(application)
    }

    pub fn manager_reject_withdrawal(
        &self,
        manager: &User,
        applicant: &Nric,
    ) -> Result<Application, LifecycleError> {
        let mut application = self.require_active(applicant)?;
        let project = self.require_project(&application.project)?;
        ensure_manages(manager, &project)?;

        if !application.withdrawal_requested() {
            return Err(RuleViolation::NoWithdrawalRequested.into());
        }

        application.clear_withdrawal();
        self.store
            .update_application(application.clone())
            .map_err(integrity)?;
        Ok(application)
    }

    /// Book a flat for a successful application.
    ///
    /// The unit decrement, project persistence, and application persistence
    /// do not share a transaction; on a persistence failure the already
    /// applied mutations are rolled back best-effort, the original failure is
    /// re-raised, and a rollback failure is escalated to
    /// [`LifecycleError::Compensation`].
    pub fn book_flat(
        &self,
        officer: &User,
        applicant: &Nric,
    ) -> Result<BookingReceipt, LifecycleError> {
        let mut application = self.require_active(applicant)?;
        let mut project = self.require_project(&application.project)?;

        if officer.role != UserRole::Officer || !project.is_assigned_officer(&officer.nric) {
            return Err(RuleViolation::NotAssignedOfficer.into());
        }
        if application.status() != ApplicationStatus::Successful {
            return Err(RuleViolation::ApplicationNotSuccessful(application.status()).into());
        }

        let buyer = self
            .store
            .find_user_by_nric(applicant)
            .map_err(integrity)?
            .ok_or_else(|| IntegrityError::MissingUser(applicant.clone()))?;

        let flat_type = application.flat_type;
        if !project.decrement_units(flat_type) {
            // Definitive outcome, not retried: the application concludes here.
            application.transition_to(ApplicationStatus::Unsuccessful)?;
            self.store
                .update_application(application)
                .map_err(integrity)?;
            return Err(RuleViolation::NoUnitsAvailable {
                project: project.name,
                flat_type,
            }
            .into());
        }

        // Snapshot for rollback before any persistence happens.
        let fallback = application.clone();

        if let Err(err) = self.store.update_project(project.clone()) {
            return Err(self.compensate_booking(integrity(err), &fallback, &project, flat_type));
        }

        application.transition_to(ApplicationStatus::Booked)?;
        if let Err(err) = self.store.update_application(application) {
            return Err(self.compensate_booking(integrity(err), &fallback, &project, flat_type));
        }

        Ok(BookingReceipt::new(&buyer, &project, flat_type))
    }

    fn compensate_booking(
        &self,
        original: LifecycleError,
        fallback: &Application,
        decremented: &Project,
        flat_type: FlatType,
    ) -> LifecycleError {
        warn!(
            project = %decremented.name,
            applicant = %fallback.applicant,
            %original,
            "booking failed, rolling back",
        );
        let mut rollback_failures = Vec::new();

        if let Err(err) = self.store.update_application(fallback.clone()) {
            error!(applicant = %fallback.applicant, %err, "could not restore application status");
            rollback_failures.push(format!("restore application status: {err}"));
        }

        let mut restored = decremented.clone();
        restored.increment_units(flat_type);
        if let Err(err) = self.store.update_project(restored) {
            error!(project = %decremented.name, %err, "could not restore project inventory");
            rollback_failures.push(format!("restore project inventory: {err}"));
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

    fn require_active(&self, applicant: &Nric) -> Result<Application, LifecycleError> {
        self.store
            .active_for_applicant(applicant)
            .map_err(integrity)?
            .ok_or_else(|| RuleViolation::NoActiveApplication.into())
    }

    fn require_project(&self, name: &str) -> Result<Project, LifecycleError> {
        self.store
            .fetch_project(name)
            .map_err(integrity)?
            .ok_or_else(|| IntegrityError::MissingProject(name.to_string()).into())
    }
}

pub(crate) fn ensure_manages(manager: &User, project: &Project) -> Result<(), LifecycleError> {
    if manager.role != UserRole::Manager || project.manager != manager.nric {
        return Err(RuleViolation::NotProjectManager.into());
    }
    Ok(())
}
