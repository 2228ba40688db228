use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use super::domain::{Application, Enquiry, Nric, Registration, User};
use super::project::Project;

/// Error enumeration for store failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Consistency problems the lifecycle logic did not expect: a referenced
/// record is missing, or the store contradicts a precondition just checked.
/// Unlike a rule violation this indicates corrupted state, not user error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntegrityError {
    #[error("project '{0}' missing from the registry")]
    MissingProject(String),
    #[error("user '{0}' missing from the registry")]
    MissingUser(Nric),
    #[error("registration for officer '{officer}' on '{project}' missing from the registry")]
    MissingRegistration { officer: Nric, project: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub trait ProjectStore: Send + Sync {
    fn insert_project(&self, project: Project) -> Result<Project, StoreError>;
    fn update_project(&self, project: Project) -> Result<(), StoreError>;
    fn fetch_project(&self, name: &str) -> Result<Option<Project>, StoreError>;
    fn delete_project(&self, name: &str) -> Result<(), StoreError>;
    fn all_projects(&self) -> Result<Vec<Project>, StoreError>;
}

pub trait ApplicationStore: Send + Sync {
    /// Fails with [`StoreError::Conflict`] when the applicant already holds a
    /// non-concluded application.
    fn insert_application(&self, application: Application) -> Result<Application, StoreError>;
    fn update_application(&self, application: Application) -> Result<(), StoreError>;
    fn active_for_applicant(&self, nric: &Nric) -> Result<Option<Application>, StoreError>;
    fn applications_for_applicant(&self, nric: &Nric) -> Result<Vec<Application>, StoreError>;
    fn applications_for_project(&self, project: &str) -> Result<Vec<Application>, StoreError>;
    fn all_applications(&self) -> Result<Vec<Application>, StoreError>;
}

pub trait RegistrationStore: Send + Sync {
    fn insert_registration(&self, registration: Registration) -> Result<Registration, StoreError>;
    fn update_registration(&self, registration: Registration) -> Result<(), StoreError>;
    fn fetch_registration(
        &self,
        officer: &Nric,
        project: &str,
    ) -> Result<Option<Registration>, StoreError>;
    fn registrations_for_officer(&self, officer: &Nric) -> Result<Vec<Registration>, StoreError>;
    fn registrations_for_project(&self, project: &str) -> Result<Vec<Registration>, StoreError>;
    fn all_registrations(&self) -> Result<Vec<Registration>, StoreError>;
}

pub trait UserDirectory: Send + Sync {
    fn insert_user(&self, user: User) -> Result<User, StoreError>;
    fn update_user(&self, user: User) -> Result<(), StoreError>;
    fn find_user_by_nric(&self, nric: &Nric) -> Result<Option<User>, StoreError>;
    fn all_users(&self) -> Result<Vec<User>, StoreError>;
}

pub trait EnquiryStore: Send + Sync {
    fn insert_enquiry(&self, enquiry: Enquiry) -> Result<Enquiry, StoreError>;
    fn update_enquiry(&self, enquiry: Enquiry) -> Result<(), StoreError>;
    fn fetch_enquiry(&self, id: u32) -> Result<Option<Enquiry>, StoreError>;
    fn delete_enquiry(&self, id: u32) -> Result<(), StoreError>;
    fn enquiries_for_applicant(&self, nric: &Nric) -> Result<Vec<Enquiry>, StoreError>;
    fn enquiries_for_project(&self, project: &str) -> Result<Vec<Enquiry>, StoreError>;
    fn all_enquiries(&self) -> Result<Vec<Enquiry>, StoreError>;
}

/// Convenience bound for code needing the full registry surface.
pub trait AllocationStores:
    ProjectStore + ApplicationStore + RegistrationStore + UserDirectory + EnquiryStore
{
}

impl<T> AllocationStores for T where
    T: ProjectStore + ApplicationStore + RegistrationStore + UserDirectory + EnquiryStore
{
}

#[derive(Default)]
struct RegistryState {
    users: HashMap<Nric, User>,
    projects: HashMap<String, Project>,
    applications: HashMap<(Nric, String), Application>,
    registrations: HashMap<(Nric, String), Registration>,
    enquiries: BTreeMap<u32, Enquiry>,
}

/// In-process registry owning every record, used by the demo command, the
/// HTTP state, and tests. The single lock serializes each check-then-act
/// sequence against the shared inventory.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<RegistryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, RegistryState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("registry lock poisoned".to_string()))
    }
}

impl ProjectStore for MemoryStore {
    fn insert_project(&self, project: Project) -> Result<Project, StoreError> {
        let mut state = self.lock()?;
        if state.projects.contains_key(&project.name) {
            return Err(StoreError::Conflict);
        }
        state.projects.insert(project.name.clone(), project.clone());
        Ok(project)
    }

    fn update_project(&self, project: Project) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        if !state.projects.contains_key(&project.name) {
            return Err(StoreError::NotFound);
        }
        state.projects.insert(project.name.clone(), project);
        Ok(())
    }

    fn fetch_project(&self, name: &str) -> Result<Option<Project>, StoreError> {
        Ok(self.lock()?.projects.get(name).cloned())
    }

    fn delete_project(&self, name: &str) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state
            .projects
            .remove(name)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    fn all_projects(&self) -> Result<Vec<Project>, StoreError> {
        let mut projects: Vec<Project> = self.lock()?.projects.values().cloned().collect();
        projects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(projects)
    }
}

impl ApplicationStore for MemoryStore {
    fn insert_application(&self, application: Application) -> Result<Application, StoreError> {
        let mut state = self.lock()?;
        let has_active = state
            .applications
            .values()
            .any(|app| app.applicant == application.applicant && app.is_active());
        if has_active {
            return Err(StoreError::Conflict);
        }
        // A concluded row for the same (applicant, project) pair is replaced.
        let key = (application.applicant.clone(), application.project.clone());
        state.applications.insert(key, application.clone());
        Ok(application)
    }

    fn update_application(&self, application: Application) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        let key = (application.applicant.clone(), application.project.clone());
        if !state.applications.contains_key(&key) {
            return Err(StoreError::NotFound);
        }
        state.applications.insert(key, application);
        Ok(())
    }

    fn active_for_applicant(&self, nric: &Nric) -> Result<Option<Application>, StoreError> {
        Ok(self
            .lock()?
            .applications
            .values()
            .find(|app| &app.applicant == nric && app.is_active())
            .cloned())
    }

    fn applications_for_applicant(&self, nric: &Nric) -> Result<Vec<Application>, StoreError> {
        Ok(self
            .lock()?
            .applications
            .values()
            .filter(|app| &app.applicant == nric)
            .cloned()
            .collect())
    }

    fn applications_for_project(&self, project: &str) -> Result<Vec<Application>, StoreError> {
        Ok(self
            .lock()?
            .applications
            .values()
            .filter(|app| app.project == project)
            .cloned()
            .collect())
    }

    fn all_applications(&self) -> Result<Vec<Application>, StoreError> {
        Ok(self.lock()?.applications.values().cloned().collect())
    }
}

impl RegistrationStore for MemoryStore {
    fn insert_registration(&self, registration: Registration) -> Result<Registration, StoreError> {
        let mut state = self.lock()?;
        let key = (registration.officer.clone(), registration.project.clone());
        if state.registrations.contains_key(&key) {
            return Err(StoreError::Conflict);
        }
        state.registrations.insert(key, registration.clone());
        Ok(registration)
    }

    fn update_registration(&self, registration: Registration) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        let key = (registration.officer.clone(), registration.project.clone());
        if !state.registrations.contains_key(&key) {
            return Err(StoreError::NotFound);
        }
        state.registrations.insert(key, registration);
        Ok(())
    }

    fn fetch_registration(
        &self,
        officer: &Nric,
        project: &str,
    ) -> Result<Option<Registration>, StoreError> {
        Ok(self
            .lock()?
            .registrations
            .get(&(officer.clone(), project.to_string()))
            .cloned())
    }

    fn registrations_for_officer(&self, officer: &Nric) -> Result<Vec<Registration>, StoreError> {
        Ok(self
            .lock()?
            .registrations
            .values()
            .filter(|reg| &reg.officer == officer)
            .cloned()
            .collect())
    }

    fn registrations_for_project(&self, project: &str) -> Result<Vec<Registration>, StoreError> {
        Ok(self
            .lock()?
            .registrations
            .values()
            .filter(|reg| reg.project == project)
            .cloned()
            .collect())
    }

    fn all_registrations(&self) -> Result<Vec<Registration>, StoreError> {
        Ok(self.lock()?.registrations.values().cloned().collect())
    }
}

impl UserDirectory for MemoryStore {
    fn insert_user(&self, user: User) -> Result<User, StoreError> {
        let mut state = self.lock()?;
        if state.users.contains_key(&user.nric) {
            return Err(StoreError::Conflict);
        }
        state.users.insert(user.nric.clone(), user.clone());
        Ok(user)
    }

    fn update_user(&self, user: User) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        if !state.users.contains_key(&user.nric) {
            return Err(StoreError::NotFound);
        }
        state.users.insert(user.nric.clone(), user);
        Ok(())
    }

    fn find_user_by_nric(&self, nric: &Nric) -> Result<Option<User>, StoreError> {
        Ok(self.lock()?.users.get(nric).cloned())
    }

    fn all_users(&self) -> Result<Vec<User>, StoreError> {
        let mut users: Vec<User> = self.lock()?.users.values().cloned().collect();
        users.sort_by(|a, b| a.nric.cmp(&b.nric));
        Ok(users)
    }
}

impl EnquiryStore for MemoryStore {
    fn insert_enquiry(&self, enquiry: Enquiry) -> Result<Enquiry, StoreError> {
        let mut state = self.lock()?;
        if state.enquiries.contains_key(&enquiry.id) {
            return Err(StoreError::Conflict);
        }
        state.enquiries.insert(enquiry.id, enquiry.clone());
        Ok(enquiry)
    }

    fn update_enquiry(&self, enquiry: Enquiry) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        if !state.enquiries.contains_key(&enquiry.id) {
            return Err(StoreError::NotFound);
        }
        state.enquiries.insert(enquiry.id, enquiry);
        Ok(())
    }

    fn fetch_enquiry(&self, id: u32) -> Result<Option<Enquiry>, StoreError> {
        Ok(self.lock()?.enquiries.get(&id).cloned())
    }

    fn delete_enquiry(&self, id: u32) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state
            .enquiries
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    fn enquiries_for_applicant(&self, nric: &Nric) -> Result<Vec<Enquiry>, StoreError> {
        Ok(self
            .lock()?
            .enquiries
            .values()
            .filter(|enquiry| &enquiry.applicant == nric)
            .cloned()
            .collect())
    }

    fn enquiries_for_project(&self, project: &str) -> Result<Vec<Enquiry>, StoreError> {
        Ok(self
            .lock()?
            .enquiries
            .values()
            .filter(|enquiry| enquiry.project == project)
            .cloned()
            .collect())
    }

    fn all_enquiries(&self) -> Result<Vec<Enquiry>, StoreError> {
        Ok(self.lock()?.enquiries.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::domain::{Application, ApplicationStatus, FlatType};

    fn nric(raw: &str) -> Nric {
        Nric::parse(raw).expect("valid nric")
    }

    fn application(project: &str) -> Application {
        Application::new(nric("S1234567A"), project, FlatType::TwoRoom).expect("valid application")
    }

    #[test]
    fn a_second_active_application_for_the_same_applicant_conflicts() {
        let store = MemoryStore::new();
        store
            .insert_application(application("Oak"))
            .expect("first insert");

        assert_eq!(
            store.insert_application(application("Pine")),
            Err(StoreError::Conflict)
        );
    }

    #[test]
    fn a_concluded_application_no_longer_blocks_inserts() {
        let store = MemoryStore::new();
        let mut first = application("Oak");
        store.insert_application(first.clone()).expect("insert");

        first
            .transition_to(ApplicationStatus::Unsuccessful)
            .expect("conclude");
        store.update_application(first).expect("update");

        store
            .insert_application(application("Pine"))
            .expect("new application accepted");
        let active = store
            .active_for_applicant(&nric("S1234567A"))
            .expect("query");
        assert_eq!(active.expect("present").project, "Pine");
    }

    #[test]
    fn updates_require_an_existing_record() {
        let store = MemoryStore::new();
        assert_eq!(
            store.update_application(application("Oak")),
            Err(StoreError::NotFound)
        );
    }
}
