use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use super::domain::{Enquiry, Nric, RuleViolation, User, UserRole};
use super::service::{integrity, LifecycleError};
use super::store::{ApplicationStore, EnquiryStore, ProjectStore};

static ENQUIRY_SEQUENCE: AtomicU32 = AtomicU32::new(1);

fn next_enquiry_id() -> u32 {
    ENQUIRY_SEQUENCE.fetch_add(1, Ordering::Relaxed)
}

/// Applicant enquiries about projects, answered by project staff.
pub struct EnquiryService<S> {
    store: Arc<S>,
}

impl<S> EnquiryService<S>
where
    S: EnquiryStore + ApplicationStore + ProjectStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn enquiries_for_applicant(&self, nric: &Nric) -> Result<Vec<Enquiry>, LifecycleError> {
        self.store.enquiries_for_applicant(nric).map_err(integrity)
    }

    pub fn enquiries_for_project(&self, project: &str) -> Result<Vec<Enquiry>, LifecycleError> {
        self.store.enquiries_for_project(project).map_err(integrity)
    }

    pub fn all_enquiries(&self) -> Result<Vec<Enquiry>, LifecycleError> {
        self.store.all_enquiries().map_err(integrity)
    }

    pub fn submit(
        &self,
        applicant: &User,
        project_name: &str,
        text: &str,
    ) -> Result<Enquiry, LifecycleError> {
        if text.trim().is_empty() {
            return Err(RuleViolation::EmptyEnquiryText.into());
        }
        if self
            .store
            .fetch_project(project_name)
            .map_err(integrity)?
            .is_none()
        {
            return Err(RuleViolation::UnknownProject(project_name.to_string()).into());
        }

        let enquiry = Enquiry::new(
            next_enquiry_id(),
            applicant.nric.clone(),
            project_name,
            text,
        )?;
        self.store.insert_enquiry(enquiry).map_err(integrity)
    }

    pub fn edit(
        &self,
        applicant: &User,
        enquiry_id: u32,
        new_text: &str,
    ) -> Result<Enquiry, LifecycleError> {
        let mut enquiry = self.require_enquiry(enquiry_id)?;
        if enquiry.applicant != applicant.nric {
            return Err(RuleViolation::NotEnquiryOwner.into());
        }

        enquiry.edit_text(new_text)?;
        self.store
            .update_enquiry(enquiry.clone())
            .map_err(integrity)?;
        Ok(enquiry)
    }

    pub fn delete(&self, applicant: &User, enquiry_id: u32) -> Result<(), LifecycleError> {
        let enquiry = self.require_enquiry(enquiry_id)?;
        if enquiry.applicant != applicant.nric {
            return Err(RuleViolation::NotEnquiryOwner.into());
        }
        if enquiry.is_replied() {
            return Err(RuleViolation::EnquiryAlreadyReplied.into());
        }

        self.store.delete_enquiry(enquiry_id).map_err(integrity)
    }

    /// Record a reply from the managing manager or an assigned officer.
    pub fn reply(
        &self,
        responder: &User,
        enquiry_id: u32,
        text: &str,
    ) -> Result<Enquiry, LifecycleError> {
        let mut enquiry = self.require_enquiry(enquiry_id)?;
        let project = self
            .store
            .fetch_project(&enquiry.project)
            .map_err(integrity)?
            .ok_or_else(|| {
                LifecycleError::from(super::store::IntegrityError::MissingProject(
                    enquiry.project.clone(),
                ))
            })?;

        let authorized = match responder.role {
            UserRole::Manager => project.manager == responder.nric,
            UserRole::Officer => project.is_assigned_officer(&responder.nric),
            UserRole::Applicant => false,
        };
        if !authorized {
            return Err(RuleViolation::NotEnquiryResponder.into());
        }

        enquiry.set_reply(text)?;
        self.store
            .update_enquiry(enquiry.clone())
            .map_err(integrity)?;
        Ok(enquiry)
    }

    fn require_enquiry(&self, id: u32) -> Result<Enquiry, LifecycleError> {
        self.store
            .fetch_enquiry(id)
            .map_err(integrity)?
            .ok_or_else(|| LifecycleError::Integrity(super::store::IntegrityError::Store(
                super::store::StoreError::NotFound,
            )))
    }
}
