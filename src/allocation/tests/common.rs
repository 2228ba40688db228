use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;

use crate::allocation::domain::{
    Application, Enquiry, FlatType, MaritalStatus, Nric, Registration, User, UserRole,
};
use crate::allocation::enquiry::EnquiryService;
use crate::allocation::project::{FlatInventory, Project};
use crate::allocation::registration::RegistrationLifecycleService;
use crate::allocation::service::ApplicationLifecycleService;
use crate::allocation::store::{
    ApplicationStore, EnquiryStore, MemoryStore, ProjectStore, RegistrationStore, StoreError,
    UserDirectory,
};

pub(super) const MANAGER_NRIC: &str = "S5000001A";
pub(super) const OTHER_MANAGER_NRIC: &str = "S5000002B";
pub(super) const OFFICER_NRIC: &str = "T7000001C";
pub(super) const SECOND_OFFICER_NRIC: &str = "T7000002D";
pub(super) const APPLICANT_NRIC: &str = "S8000001E";
pub(super) const SECOND_APPLICANT_NRIC: &str = "S8000002F";

/// Fixed evaluation date inside every test project's window.
pub(super) fn today() -> NaiveDate {
    date(2024, 2, 15)
}

pub(super) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub(super) fn nric(raw: &str) -> Nric {
    Nric::parse(raw).expect("valid nric")
}

pub(super) fn user(
    name: &str,
    raw_nric: &str,
    age: u32,
    marital_status: MaritalStatus,
    role: UserRole,
) -> User {
    User::new(name, nric(raw_nric), age, marital_status, "secret", role).expect("valid user")
}

pub(super) fn manager() -> User {
    user(
        "Priya Nair",
        MANAGER_NRIC,
        47,
        MaritalStatus::Married,
        UserRole::Manager,
    )
}

pub(super) fn other_manager() -> User {
    user(
        "Marcus Chen",
        OTHER_MANAGER_NRIC,
        51,
        MaritalStatus::Married,
        UserRole::Manager,
    )
}

pub(super) fn officer() -> User {
    user(
        "Aisha Rahman",
        OFFICER_NRIC,
        33,
        MaritalStatus::Single,
        UserRole::Officer,
    )
}

pub(super) fn second_officer() -> User {
    user(
        "Wei Jie Ong",
        SECOND_OFFICER_NRIC,
        29,
        MaritalStatus::Married,
        UserRole::Officer,
    )
}

pub(super) fn married_applicant() -> User {
    user(
        "Daniel Lim",
        APPLICANT_NRIC,
        25,
        MaritalStatus::Married,
        UserRole::Applicant,
    )
}

pub(super) fn second_applicant() -> User {
    user(
        "Sofia Goh",
        SECOND_APPLICANT_NRIC,
        30,
        MaritalStatus::Married,
        UserRole::Applicant,
    )
}

pub(super) fn single_applicant(age: u32) -> User {
    user(
        "Farhan Yusof",
        "T8100007G",
        age,
        MaritalStatus::Single,
        UserRole::Applicant,
    )
}

/// Project "Oak" managed by [`manager`], open around [`today`].
pub(super) fn oak(two_room_units: u32) -> Project {
    project("Oak", two_room_units, date(2024, 1, 1), date(2024, 3, 31))
}

pub(super) fn project(
    name: &str,
    two_room_units: u32,
    open_date: NaiveDate,
    close_date: NaiveDate,
) -> Project {
    Project::new(
        name,
        "Tampines",
        FlatInventory {
            units: two_room_units,
            price: 118_000,
        },
        FlatInventory {
            units: 3,
            price: 221_000,
        },
        open_date,
        close_date,
        nric(MANAGER_NRIC),
        3,
        Vec::new(),
        true,
    )
    .expect("valid project")
}

/// Registry preloaded with the standard cast of users.
pub(super) fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    for user in [
        manager(),
        other_manager(),
        officer(),
        second_officer(),
        married_applicant(),
        second_applicant(),
        single_applicant(40),
    ] {
        store.insert_user(user).expect("seed user");
    }
    store
}

pub(super) fn application_service(
    store: &Arc<MemoryStore>,
) -> ApplicationLifecycleService<MemoryStore> {
    ApplicationLifecycleService::new(store.clone())
}

pub(super) fn registration_service(
    store: &Arc<MemoryStore>,
) -> RegistrationLifecycleService<MemoryStore> {
    RegistrationLifecycleService::new(store.clone())
}

pub(super) fn enquiry_service(store: &Arc<MemoryStore>) -> EnquiryService<MemoryStore> {
    EnquiryService::new(store.clone())
}

/// Assigns `officer_nric` to the stored project through the guarded mutation.
pub(super) fn assign_officer(store: &MemoryStore, project_name: &str, officer_nric: &str) {
    let mut project = store
        .fetch_project(project_name)
        .expect("fetch project")
        .expect("project present");
    project
        .add_officer(&nric(officer_nric))
        .expect("slot available");
    store.update_project(project).expect("persist project");
}

/// Store double that injects failures into the next N writes of a given
/// entity, exercising the rollback paths of the lifecycle services.
#[derive(Default)]
pub(super) struct FaultyStore {
    inner: MemoryStore,
    fail_project_updates: AtomicUsize,
    fail_application_updates: AtomicUsize,
    fail_registration_updates: AtomicUsize,
}

impl FaultyStore {
    pub(super) fn new() -> Self {
        Self::default()
    }

    pub(super) fn fail_next_project_updates(&self, count: usize) {
        self.fail_project_updates.store(count, Ordering::SeqCst);
    }

    pub(super) fn fail_next_application_updates(&self, count: usize) {
        self.fail_application_updates.store(count, Ordering::SeqCst);
    }

    pub(super) fn fail_next_registration_updates(&self, count: usize) {
        self.fail_registration_updates.store(count, Ordering::SeqCst);
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                current.checked_sub(1)
            })
            .is_ok()
    }

    fn injected(op: &str) -> StoreError {
        StoreError::Unavailable(format!("injected {op} failure"))
    }
}

impl ProjectStore for FaultyStore {
    fn insert_project(&self, project: Project) -> Result<Project, StoreError> {
        self.inner.insert_project(project)
    }

    fn update_project(&self, project: Project) -> Result<(), StoreError> {
        if Self::take_failure(&self.fail_project_updates) {
            return Err(Self::injected("project update"));
        }
        self.inner.update_project(project)
    }

    fn fetch_project(&self, name: &str) -> Result<Option<Project>, StoreError> {
        self.inner.fetch_project(name)
    }

    fn delete_project(&self, name: &str) -> Result<(), StoreError> {
        self.inner.delete_project(name)
    }

    fn all_projects(&self) -> Result<Vec<Project>, StoreError> {
        self.inner.all_projects()
    }
}

impl ApplicationStore for FaultyStore {
    fn insert_application(&self, application: Application) -> Result<Application, StoreError> {
        self.inner.insert_application(application)
    }

    fn update_application(&self, application: Application) -> Result<(), StoreError> {
        if Self::take_failure(&self.fail_application_updates) {
            return Err(Self::injected("application update"));
        }
        self.inner.update_application(application)
    }

    fn active_for_applicant(&self, nric: &Nric) -> Result<Option<Application>, StoreError> {
        self.inner.active_for_applicant(nric)
    }

    fn applications_for_applicant(&self, nric: &Nric) -> Result<Vec<Application>, StoreError> {
        self.inner.applications_for_applicant(nric)
    }

    fn applications_for_project(&self, project: &str) -> Result<Vec<Application>, StoreError> {
        self.inner.applications_for_project(project)
    }

    fn all_applications(&self) -> Result<Vec<Application>, StoreError> {
        self.inner.all_applications()
    }
}

impl RegistrationStore for FaultyStore {
    fn insert_registration(&self, registration: Registration) -> Result<Registration, StoreError> {
        self.inner.insert_registration(registration)
    }

    fn update_registration(&self, registration: Registration) -> Result<(), StoreError> {
        if Self::take_failure(&self.fail_registration_updates) {
            return Err(Self::injected("registration update"));
        }
        self.inner.update_registration(registration)
    }

    fn fetch_registration(
        &self,
        officer: &Nric,
        project: &str,
    ) -> Result<Option<Registration>, StoreError> {
        self.inner.fetch_registration(officer, project)
    }

    fn registrations_for_officer(&self, officer: &Nric) -> Result<Vec<Registration>, StoreError> {
        self.inner.registrations_for_officer(officer)
    }

    fn registrations_for_project(&self, project: &str) -> Result<Vec<Registration>, StoreError> {
        self.inner.registrations_for_project(project)
    }

    fn all_registrations(&self) -> Result<Vec<Registration>, StoreError> {
        self.inner.all_registrations()
    }
}

impl UserDirectory for FaultyStore {
    fn insert_user(&self, user: User) -> Result<User, StoreError> {
        self.inner.insert_user(user)
    }

    fn update_user(&self, user: User) -> Result<(), StoreError> {
        self.inner.update_user(user)
    }

    fn find_user_by_nric(&self, nric: &Nric) -> Result<Option<User>, StoreError> {
        self.inner.find_user_by_nric(nric)
    }

    fn all_users(&self) -> Result<Vec<User>, StoreError> {
        self.inner.all_users()
    }
}

impl EnquiryStore for FaultyStore {
    fn insert_enquiry(&self, enquiry: Enquiry) -> Result<Enquiry, StoreError> {
        self.inner.insert_enquiry(enquiry)
    }

    fn update_enquiry(&self, enquiry: Enquiry) -> Result<(), StoreError> {
        self.inner.update_enquiry(enquiry)
    }

    fn fetch_enquiry(&self, id: u32) -> Result<Option<Enquiry>, StoreError> {
        self.inner.fetch_enquiry(id)
    }

    fn delete_enquiry(&self, id: u32) -> Result<(), StoreError> {
        self.inner.delete_enquiry(id)
    }

    fn enquiries_for_applicant(&self, nric: &Nric) -> Result<Vec<Enquiry>, StoreError> {
        self.inner.enquiries_for_applicant(nric)
    }

    fn enquiries_for_project(&self, project: &str) -> Result<Vec<Enquiry>, StoreError> {
        self.inner.enquiries_for_project(project)
    }

    fn all_enquiries(&self) -> Result<Vec<Enquiry>, StoreError> {
        self.inner.all_enquiries()
    }
}

/// Seeds a [`FaultyStore`] with the cast, a one-unit project, and an
/// application already approved and ready to book.
pub(super) fn booking_fixture() -> (
    Arc<FaultyStore>,
    ApplicationLifecycleService<FaultyStore>,
) {
    let store = Arc::new(FaultyStore::new());
    for user in [manager(), officer(), married_applicant()] {
        store.insert_user(user).expect("seed user");
    }
    store.insert_project(oak(1)).expect("seed project");
    assign_officer_faulty(&store, "Oak", OFFICER_NRIC);

    let service = ApplicationLifecycleService::new(store.clone());
    service
        .apply(&married_applicant(), "Oak", FlatType::TwoRoom, today())
        .expect("application accepted");
    service
        .manager_approve(&manager(), &nric(APPLICANT_NRIC))
        .expect("application approved");

    (store, service)
}

fn assign_officer_faulty(store: &FaultyStore, project_name: &str, officer_nric: &str) {
    let mut project = store
        .fetch_project(project_name)
        .expect("fetch project")
        .expect("project present");
    project
        .add_officer(&nric(officer_nric))
        .expect("slot available");
    store.update_project(project).expect("persist project");
}
